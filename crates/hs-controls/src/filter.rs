//! Signal filters applied to one response-kind slot of a control.
//!
//! Error-simulation filters act element-wise on a sub-vector and are used
//! to inject realistic actuator errors into otherwise perfect simulated
//! specimens. Force converters replace the force slot with a force computed
//! from the displacement slot through a stiffness matrix.

use hs_core::{DMatrix, DVector, Response, ResponseKind};
use hs_tangent::EstimatorSpec;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};
use crate::force::{KrylovForceConverter, TangentForceConverter};

/// Displacements below this magnitude count as "at rest" for undershoot.
const UNDERSHOOT_REST_TOL: f64 = 1.0e-6;

/// Additive undershoot: moving signals fall short of their target by a
/// fixed amount, signals at rest are offset by it.
#[derive(Clone, Debug)]
pub struct Undershoot {
    undershoot: f64,
    previous: Vec<f64>,
}

impl Undershoot {
    pub fn new(undershoot: f64) -> ControlResult<Self> {
        if !undershoot.is_finite() {
            return Err(ControlError::InvalidArg {
                what: "undershoot must be finite",
            });
        }
        Ok(Self {
            undershoot,
            previous: Vec::new(),
        })
    }

    pub fn apply(&mut self, values: &mut DVector<f64>) {
        if self.previous.len() != values.len() {
            self.previous = vec![0.0; values.len()];
        }
        for (x, prev) in values.iter_mut().zip(self.previous.iter_mut()) {
            let d = *x;
            let mut out = d;
            if d > *prev {
                out -= self.undershoot;
            } else if d < *prev {
                out += self.undershoot;
            }
            if d.abs() < UNDERSHOOT_REST_TOL {
                out += self.undershoot;
            }
            *prev = d;
            *x = out;
        }
    }
}

/// Additive Gaussian noise with a seeded generator.
#[derive(Clone, Debug)]
pub struct RandomGauss {
    mean: f64,
    std_dev: f64,
    rng: StdRng,
}

impl RandomGauss {
    pub fn new(mean: f64, std_dev: f64, seed: u64) -> ControlResult<Self> {
        if !mean.is_finite() || !std_dev.is_finite() || std_dev < 0.0 {
            return Err(ControlError::InvalidArg {
                what: "gauss filter needs finite mean and non-negative std_dev",
            });
        }
        Ok(Self {
            mean,
            std_dev,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Box-Muller sample.
    fn sample(&mut self) -> f64 {
        let u1: f64 = 1.0 - self.rng.r#gen::<f64>();
        let u2: f64 = self.rng.r#gen::<f64>();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        self.mean + self.std_dev * z
    }

    pub fn apply(&mut self, values: &mut DVector<f64>) {
        for x in values.iter_mut() {
            *x += self.sample();
        }
    }
}

/// One filter slot.
#[derive(Debug)]
pub enum Filter {
    Undershoot(Undershoot),
    RandomGauss(RandomGauss),
    TangentForce(TangentForceConverter),
    KrylovForce(KrylovForceConverter),
}

impl Filter {
    pub fn name(&self) -> &'static str {
        match self {
            Filter::Undershoot(_) => "undershoot",
            Filter::RandomGauss(_) => "random_gauss",
            Filter::TangentForce(_) => "tangent_force",
            Filter::KrylovForce(_) => "krylov_force",
        }
    }

    /// Force converters only make sense in the force slot and need a
    /// displacement sub-vector of the same length.
    pub fn is_force_converter(&self) -> bool {
        matches!(self, Filter::TangentForce(_) | Filter::KrylovForce(_))
    }

    /// Prepares the filter for sub-vectors of `len` entries.
    pub fn set_size(&mut self, len: usize) -> ControlResult<()> {
        match self {
            Filter::Undershoot(f) => {
                f.previous = vec![0.0; len];
                Ok(())
            }
            Filter::RandomGauss(_) => Ok(()),
            Filter::TangentForce(f) => f.set_size(len),
            Filter::KrylovForce(f) => f.set_size(len),
        }
    }

    /// Filters the `kind` slot of an outgoing control response.
    pub fn apply_ctrl(&mut self, kind: ResponseKind, response: &mut Response) -> ControlResult<()> {
        let name = self.name();
        match self {
            Filter::Undershoot(f) => {
                if let Some(v) = response.get_mut(kind) {
                    f.apply(v);
                }
            }
            Filter::RandomGauss(f) => {
                if let Some(v) = response.get_mut(kind) {
                    f.apply(v);
                }
            }
            Filter::TangentForce(f) => {
                let force = f.trial_force(&force_input(name, response)?)?;
                response.set(ResponseKind::Force, Some(force));
            }
            Filter::KrylovForce(f) => {
                let force = f.trial_force(&force_input(name, response)?)?;
                response.set(ResponseKind::Force, Some(force));
            }
        }
        Ok(())
    }

    /// Filters the `kind` slot of an incoming daq response.
    pub fn apply_daq(&mut self, kind: ResponseKind, response: &mut Response) -> ControlResult<()> {
        if !self.is_force_converter() {
            return self.apply_ctrl(kind, response);
        }
        let name = self.name();
        let (disp, force) = force_pair(name, response)?;
        let converted = match self {
            Filter::TangentForce(f) => f.daq_force(&disp, &force)?,
            Filter::KrylovForce(f) => f.daq_force(&disp, &force)?,
            Filter::Undershoot(_) | Filter::RandomGauss(_) => return Ok(()),
        };
        response.set(ResponseKind::Force, Some(converted));
        Ok(())
    }
}

fn force_input(filter: &'static str, response: &Response) -> ControlResult<DVector<f64>> {
    response
        .get(ResponseKind::Disp)
        .cloned()
        .ok_or_else(|| ControlError::Filter {
            filter,
            what: "displacement sub-vector required".to_string(),
        })
}

fn force_pair(
    filter: &'static str,
    response: &Response,
) -> ControlResult<(DVector<f64>, DVector<f64>)> {
    let disp = force_input(filter, response)?;
    let force = response
        .get(ResponseKind::Force)
        .cloned()
        .ok_or_else(|| ControlError::Filter {
            filter,
            what: "measured force sub-vector required".to_string(),
        })?;
    Ok((disp, force))
}

/// Serializable description of a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FilterSpec {
    Undershoot {
        undershoot: f64,
    },
    RandomGauss {
        #[serde(default)]
        mean: f64,
        std_dev: f64,
        #[serde(default)]
        seed: u64,
    },
    /// Rows of the initial stiffness; with no estimator the stiffness is
    /// held fixed.
    TangentForce {
        k_init: Vec<Vec<f64>>,
        #[serde(default)]
        estimator: Option<EstimatorSpec>,
    },
    KrylovForce {
        k_init: Vec<Vec<f64>>,
        subspace: usize,
    },
}

impl FilterSpec {
    pub fn build(&self) -> ControlResult<Filter> {
        Ok(match self {
            FilterSpec::Undershoot { undershoot } => Filter::Undershoot(Undershoot::new(*undershoot)?),
            FilterSpec::RandomGauss {
                mean,
                std_dev,
                seed,
            } => Filter::RandomGauss(RandomGauss::new(*mean, *std_dev, *seed)?),
            FilterSpec::TangentForce { k_init, estimator } => {
                let estimator = estimator.as_ref().map(|e| e.build()).transpose()?;
                Filter::TangentForce(TangentForceConverter::new(square(k_init)?, estimator)?)
            }
            FilterSpec::KrylovForce { k_init, subspace } => {
                Filter::KrylovForce(KrylovForceConverter::new(square(k_init)?, *subspace)?)
            }
        })
    }
}

/// Builds a square matrix from rows.
pub fn square(rows: &[Vec<f64>]) -> ControlResult<DMatrix<f64>> {
    let n = rows.len();
    if n == 0 || rows.iter().any(|r| r.len() != n) {
        return Err(ControlError::InvalidArg {
            what: "stiffness must be a non-empty square matrix",
        });
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Ok(DMatrix::from_row_slice(n, n, &flat))
}
