//! Force converters: compute forces from displacements through a stiffness.

use std::collections::VecDeque;
use std::fmt;

use hs_core::{DMatrix, DVector};
use hs_tangent::{TangentStiffEstimator, solve_checked};

use crate::error::{ControlError, ControlResult};

fn check_len(filter: &'static str, expected: usize, v: &DVector<f64>) -> ControlResult<()> {
    if v.len() != expected {
        return Err(ControlError::Filter {
            filter,
            what: format!("expected {expected} entries, found {}", v.len()),
        });
    }
    Ok(())
}

fn check_stiffness(k: &DMatrix<f64>) -> ControlResult<()> {
    if !k.is_square() || k.nrows() == 0 {
        return Err(ControlError::InvalidArg {
            what: "initial stiffness must be a non-empty square matrix",
        });
    }
    if k.iter().any(|v| !v.is_finite()) {
        return Err(ControlError::InvalidArg {
            what: "initial stiffness must be finite",
        });
    }
    Ok(())
}

/// Converts displacements to forces with a tangent stiffness that is
/// either held at `k_init` or updated on every daq step by an estimator.
pub struct TangentForceConverter {
    k_init: DMatrix<f64>,
    k_prev: DMatrix<f64>,
    k_tang: DMatrix<f64>,
    estimator: Option<Box<dyn TangentStiffEstimator>>,
    disp_past: DVector<f64>,
    force_past: DVector<f64>,
}

impl fmt::Debug for TangentForceConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TangentForceConverter")
            .field("k_tang", &self.k_tang)
            .field("estimator", &self.estimator.as_ref().map(|e| e.name()))
            .finish()
    }
}

impl TangentForceConverter {
    const NAME: &'static str = "tangent_force";

    pub fn new(
        k_init: DMatrix<f64>,
        estimator: Option<Box<dyn TangentStiffEstimator>>,
    ) -> ControlResult<Self> {
        check_stiffness(&k_init)?;
        let n = k_init.nrows();
        Ok(Self {
            k_prev: k_init.clone(),
            k_tang: k_init.clone(),
            k_init,
            estimator,
            disp_past: DVector::zeros(n),
            force_past: DVector::zeros(n),
        })
    }

    pub fn size(&self) -> usize {
        self.k_init.nrows()
    }

    pub fn stiffness(&self) -> &DMatrix<f64> {
        &self.k_tang
    }

    pub fn set_size(&mut self, len: usize) -> ControlResult<()> {
        if len != self.size() {
            return Err(ControlError::Filter {
                filter: Self::NAME,
                what: format!("stiffness is {0}x{0} but channel has {len} entries", self.size()),
            });
        }
        Ok(())
    }

    /// Force expected at `disp` from the last measured state.
    pub fn trial_force(&mut self, disp: &DVector<f64>) -> ControlResult<DVector<f64>> {
        check_len(Self::NAME, self.size(), disp)?;
        Ok(&self.force_past + &self.k_tang * (disp - &self.disp_past))
    }

    /// Updates the stiffness from the measured pair, converts, and stores
    /// the pair as the new reference state.
    pub fn daq_force(
        &mut self,
        disp: &DVector<f64>,
        force: &DVector<f64>,
    ) -> ControlResult<DVector<f64>> {
        check_len(Self::NAME, self.size(), disp)?;
        check_len(Self::NAME, self.size(), force)?;
        let incr_disp = disp - &self.disp_past;
        if let Some(est) = self.estimator.as_mut() {
            let incr_force = force - &self.force_past;
            self.k_tang = est.update(&incr_disp, &incr_force, &self.k_init, &self.k_prev)?;
            self.k_prev = self.k_tang.clone();
        }
        let converted = &self.force_past + &self.k_tang * incr_disp;
        self.disp_past = disp.clone();
        self.force_past = force.clone();
        Ok(converted)
    }
}

/// Converts displacements to forces through the span of recent measured
/// increments (a Krylov subspace), using `k_init` only for the part of an
/// increment outside that span.
#[derive(Debug, Clone)]
pub struct KrylovForceConverter {
    k_init: DMatrix<f64>,
    subspace: usize,
    window: VecDeque<(DVector<f64>, DVector<f64>)>,
    disp_past: DVector<f64>,
    force_past: DVector<f64>,
}

impl KrylovForceConverter {
    const NAME: &'static str = "krylov_force";

    pub fn new(k_init: DMatrix<f64>, subspace: usize) -> ControlResult<Self> {
        check_stiffness(&k_init)?;
        if subspace == 0 {
            return Err(ControlError::InvalidArg {
                what: "krylov subspace size must be at least 1",
            });
        }
        let n = k_init.nrows();
        Ok(Self {
            k_init,
            subspace,
            window: VecDeque::with_capacity(subspace),
            disp_past: DVector::zeros(n),
            force_past: DVector::zeros(n),
        })
    }

    pub fn size(&self) -> usize {
        self.k_init.nrows()
    }

    pub fn set_size(&mut self, len: usize) -> ControlResult<()> {
        if len != self.size() {
            return Err(ControlError::Filter {
                filter: Self::NAME,
                what: format!("stiffness is {0}x{0} but channel has {len} entries", self.size()),
            });
        }
        Ok(())
    }

    fn matrices(&self) -> (DMatrix<f64>, DMatrix<f64>) {
        let n = self.size();
        let cols = self.window.len();
        let mut d = DMatrix::zeros(n, cols);
        let mut f = DMatrix::zeros(n, cols);
        for (j, (dj, fj)) in self.window.iter().enumerate() {
            d.set_column(j, dj);
            f.set_column(j, fj);
        }
        (d, f)
    }

    pub fn trial_force(&mut self, disp: &DVector<f64>) -> ControlResult<DVector<f64>> {
        check_len(Self::NAME, self.size(), disp)?;
        let incr = disp - &self.disp_past;
        if self.window.is_empty() {
            return Ok(&self.force_past + &self.k_init * incr);
        }

        let (d, f) = self.matrices();
        let rhs = DMatrix::from_column_slice(incr.len(), 1, incr.as_slice());
        let coeffs = if self.window.len() <= self.size() {
            // over-determined: least squares for the subspace coefficients
            let dtd = d.transpose() * &d;
            solve_checked(Self::NAME, dtd, &(d.transpose() * rhs))?
        } else {
            // under-determined: minimum-norm coefficients
            let ddt = &d * d.transpose();
            d.transpose() * solve_checked(Self::NAME, ddt, &rhs)?
        };
        let coeffs = coeffs.column(0).into_owned();
        let residual = &incr - &d * &coeffs;
        Ok(&self.force_past + &f * coeffs + &self.k_init * residual)
    }

    pub fn daq_force(
        &mut self,
        disp: &DVector<f64>,
        force: &DVector<f64>,
    ) -> ControlResult<DVector<f64>> {
        check_len(Self::NAME, self.size(), force)?;
        let converted = self.trial_force(disp)?;
        if self.window.len() == self.subspace {
            self.window.pop_front();
        }
        self.window
            .push_back((disp - &self.disp_past, force - &self.force_past));
        self.disp_past = disp.clone();
        self.force_past = force.clone();
        Ok(converted)
    }
}
