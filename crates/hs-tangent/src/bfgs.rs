//! BFGS-style stiffness update (Thewalt/Igarashi variant).

use nalgebra::{DMatrix, DVector};

use crate::error::{EstimatorError, EstimatorResult};
use crate::estimator::{TangentStiffEstimator, check_dims};

/// Two-candidate BFGS update.
///
/// With `fD = d · f`, a step is degenerate when `eps * |d| * |f| >= fD`;
/// the previous estimate is then returned unchanged. Otherwise a correction
/// is computed relative to both the initial and the previous stiffness and
/// the candidate whose correction has the smaller Frobenius norm wins. Ties
/// go to the initial-stiffness candidate.
#[derive(Debug, Clone)]
pub struct Bfgs {
    eps: f64,
}

impl Bfgs {
    pub const DEFAULT_EPS: f64 = 0.1;

    /// # Errors
    ///
    /// `eps` must be finite and non-negative.
    pub fn new(eps: f64) -> EstimatorResult<Self> {
        if !eps.is_finite() || eps < 0.0 {
            return Err(EstimatorError::InvalidArg {
                estimator: "bfgs",
                what: "eps must be finite and non-negative",
            });
        }
        Ok(Self { eps })
    }

    pub fn eps(&self) -> f64 {
        self.eps
    }
}

impl Default for Bfgs {
    fn default() -> Self {
        Self {
            eps: Self::DEFAULT_EPS,
        }
    }
}

/// Correction term for base stiffness `k`:
/// `kf * f fᵀ - (f dᵀ / fD) k - k (d fᵀ / fD)` with `kf = (1 + dᵀ k d / fD) / fD`.
fn delta_k(f_d: f64, d: &DVector<f64>, f: &DVector<f64>, k: &DMatrix<f64>) -> DMatrix<f64> {
    let inv_fd = 1.0 / f_d;
    let kd = k * d;
    let k_factor = (1.0 + inv_fd * d.dot(&kd)) * inv_fd;

    let ff = f * f.transpose();
    let fd = (f * d.transpose()) * inv_fd;
    let df = (d * f.transpose()) * inv_fd;

    ff * k_factor - &fd * k - k * &df
}

impl TangentStiffEstimator for Bfgs {
    fn name(&self) -> &'static str {
        "bfgs"
    }

    fn update(
        &mut self,
        incr_disp: &DVector<f64>,
        incr_force: &DVector<f64>,
        k_init: &DMatrix<f64>,
        k_prev: &DMatrix<f64>,
    ) -> EstimatorResult<DMatrix<f64>> {
        check_dims(self.name(), incr_disp, incr_force, k_init, k_prev)?;

        let f_d = incr_disp.dot(incr_force);
        let e_factor = self.eps * incr_disp.norm() * incr_force.norm();
        if e_factor >= f_d {
            tracing::debug!(f_d, e_factor, "bfgs: degenerate step, keeping previous stiffness");
            return Ok(k_prev.clone());
        }

        let dk_init = delta_k(f_d, incr_disp, incr_force, k_init);
        let dk_prev = delta_k(f_d, incr_disp, incr_force, k_prev);

        if dk_init.norm() <= dk_prev.norm() {
            Ok(k_init + dk_init)
        } else {
            Ok(k_prev + dk_prev)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step() -> (DVector<f64>, DVector<f64>) {
        (
            DVector::from_vec(vec![1.0, 0.0]),
            DVector::from_vec(vec![2.0, 0.0]),
        )
    }

    #[test]
    fn orthogonal_increments_keep_previous() {
        let d = DVector::from_vec(vec![1.0, 0.0]);
        let f = DVector::from_vec(vec![0.0, 1.0]);
        let k_init = DMatrix::identity(2, 2);
        let k_prev = DMatrix::from_row_slice(2, 2, &[3.0, 0.0, 0.0, 7.0]);
        let out = Bfgs::default().update(&d, &f, &k_init, &k_prev).unwrap();
        assert_eq!(out, k_prev);
    }

    #[test]
    fn smaller_correction_wins() {
        let (d, f) = step();
        let k_init = DMatrix::identity(2, 2);
        // correction from k_prev has norm sqrt(0.5) < 1
        let k_prev = DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 0.5, 5.0]);
        let out = Bfgs::default().update(&d, &f, &k_init, &k_prev).unwrap();
        let expected = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 5.0]);
        assert!((out - expected).norm() < 1e-12);
    }

    #[test]
    fn equal_corrections_favor_initial_stiffness() {
        let (d, f) = step();
        let k_init = DMatrix::identity(2, 2);
        // both corrections have Frobenius norm 1
        let k_prev = DMatrix::from_row_slice(2, 2, &[3.0, 0.0, 0.0, 7.0]);
        let out = Bfgs::default().update(&d, &f, &k_init, &k_prev).unwrap();
        let expected = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 1.0]);
        assert!((out - expected).norm() < 1e-12);
    }

    #[test]
    fn threshold_equality_counts_as_degenerate() {
        // fD = 1, eps * |d| * |f| = 1 * 1 * 1
        let d = DVector::from_vec(vec![1.0]);
        let f = DVector::from_vec(vec![1.0]);
        let k_init = DMatrix::from_element(1, 1, 10.0);
        let k_prev = DMatrix::from_element(1, 1, 4.0);
        let mut est = Bfgs::new(1.0).unwrap();
        assert_eq!(est.update(&d, &f, &k_init, &k_prev).unwrap(), k_prev);
    }
}
