//! The estimator capability and its configuration form.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{EstimatorError, EstimatorResult};
use crate::{Bfgs, Broyden, Transpose};

/// Produces the next stiffness estimate from one increment pair.
pub trait TangentStiffEstimator: Send {
    /// Short name used in error messages and logs.
    fn name(&self) -> &'static str;

    /// Computes the next estimate.
    ///
    /// # Arguments
    ///
    /// * `incr_disp` - basic displacement increment of the last step
    /// * `incr_force` - basic force increment of the last step
    /// * `k_init` - nominal initial stiffness
    /// * `k_prev` - previous stiffness estimate
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` when the inputs disagree in size and
    /// `EstimationFailed` when a required solve is singular.
    fn update(
        &mut self,
        incr_disp: &DVector<f64>,
        incr_force: &DVector<f64>,
        k_init: &DMatrix<f64>,
        k_prev: &DMatrix<f64>,
    ) -> EstimatorResult<DMatrix<f64>>;

    /// Drops any history kept between calls.
    fn reset(&mut self) {}
}

/// Serializable description of an estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EstimatorSpec {
    Broyden,
    Bfgs {
        #[serde(default = "default_bfgs_eps")]
        eps: f64,
    },
    Transpose {
        num_col: usize,
    },
}

fn default_bfgs_eps() -> f64 {
    Bfgs::DEFAULT_EPS
}

impl EstimatorSpec {
    pub fn build(&self) -> EstimatorResult<Box<dyn TangentStiffEstimator>> {
        Ok(match self {
            EstimatorSpec::Broyden => Box::new(Broyden::new()),
            EstimatorSpec::Bfgs { eps } => Box::new(Bfgs::new(*eps)?),
            EstimatorSpec::Transpose { num_col } => Box::new(Transpose::new(*num_col)?),
        })
    }
}

/// Validates that both increments and both matrices describe the same
/// `n`-dimensional basic space; returns `n`.
pub(crate) fn check_dims(
    estimator: &'static str,
    incr_disp: &DVector<f64>,
    incr_force: &DVector<f64>,
    k_init: &DMatrix<f64>,
    k_prev: &DMatrix<f64>,
) -> EstimatorResult<usize> {
    let n = incr_disp.len();
    let mismatch = |what, found| EstimatorError::DimensionMismatch {
        estimator,
        what,
        expected: n,
        found,
    };
    if incr_force.len() != n {
        return Err(mismatch("force increment", incr_force.len()));
    }
    for (what, k) in [("initial stiffness", k_init), ("previous stiffness", k_prev)] {
        if k.nrows() != n {
            return Err(mismatch(what, k.nrows()));
        }
        if k.ncols() != n {
            return Err(mismatch(what, k.ncols()));
        }
    }
    Ok(n)
}

/// Relative pivot threshold below which an LU factorization is treated as
/// singular.
const PIVOT_RATIO_MIN: f64 = 1e-13;

/// Solves `a * x = b` and reports singular or near-singular systems.
pub fn solve_checked(
    estimator: &'static str,
    a: DMatrix<f64>,
    b: &DMatrix<f64>,
) -> EstimatorResult<DMatrix<f64>> {
    let lu = a.lu();
    let diag = lu.u().diagonal();
    let max = diag.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let min = diag.iter().fold(f64::INFINITY, |m, v| m.min(v.abs()));
    let ratio = if max > 0.0 { min / max } else { 0.0 };
    if ratio.is_nan() || ratio <= PIVOT_RATIO_MIN {
        return Err(EstimatorError::EstimationFailed {
            estimator,
            what: format!("singular increment matrix (pivot ratio {ratio:.3e})"),
        });
    }
    lu.solve(b).ok_or_else(|| EstimatorError::EstimationFailed {
        estimator,
        what: "LU solve failed".to_string(),
    })
}
