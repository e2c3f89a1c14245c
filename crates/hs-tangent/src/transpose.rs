//! Sliding-window secant estimator.
//!
//! The last `num_col` increments are kept as columns of `D` (displacement)
//! and `F` (force). Once the window holds `dim` columns the stiffness `K`
//! satisfying `K D = F` is solved for directly; with more columns the
//! normal equations `(D Dᵀ) Kᵀ = D Fᵀ` are used instead.

use std::collections::VecDeque;

use nalgebra::{DMatrix, DVector};

use crate::error::{EstimatorError, EstimatorResult};
use crate::estimator::{TangentStiffEstimator, check_dims, solve_checked};

#[derive(Debug, Clone)]
pub struct Transpose {
    num_col: usize,
    window: VecDeque<(DVector<f64>, DVector<f64>)>,
}

impl Transpose {
    /// # Errors
    ///
    /// `num_col` must be at least 1.
    pub fn new(num_col: usize) -> EstimatorResult<Self> {
        if num_col == 0 {
            return Err(EstimatorError::InvalidArg {
                estimator: "transpose",
                what: "num_col must be at least 1",
            });
        }
        Ok(Self {
            num_col,
            window: VecDeque::with_capacity(num_col),
        })
    }

    pub fn num_col(&self) -> usize {
        self.num_col
    }

    /// Number of increments currently held.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    fn push(&mut self, incr_disp: &DVector<f64>, incr_force: &DVector<f64>) {
        if self.window.len() == self.num_col {
            self.window.pop_front();
        }
        self.window
            .push_back((incr_disp.clone(), incr_force.clone()));
    }

    fn matrices(&self, dim: usize) -> (DMatrix<f64>, DMatrix<f64>) {
        let cols = self.window.len();
        let mut d = DMatrix::zeros(dim, cols);
        let mut f = DMatrix::zeros(dim, cols);
        for (j, (dj, fj)) in self.window.iter().enumerate() {
            d.set_column(j, dj);
            f.set_column(j, fj);
        }
        (d, f)
    }
}

impl TangentStiffEstimator for Transpose {
    fn name(&self) -> &'static str {
        "transpose"
    }

    fn update(
        &mut self,
        incr_disp: &DVector<f64>,
        incr_force: &DVector<f64>,
        k_init: &DMatrix<f64>,
        k_prev: &DMatrix<f64>,
    ) -> EstimatorResult<DMatrix<f64>> {
        let dim = check_dims(self.name(), incr_disp, incr_force, k_init, k_prev)?;
        if let Some((held, _)) = self.window.front() {
            if held.len() != dim {
                return Err(EstimatorError::DimensionMismatch {
                    estimator: self.name(),
                    what: "increment window",
                    expected: held.len(),
                    found: dim,
                });
            }
        }
        self.push(incr_disp, incr_force);

        let cols = self.window.len();
        if cols < dim {
            return Ok(k_init.clone());
        }

        let (d, f) = self.matrices(dim);
        let k_t = if cols == dim {
            solve_checked(self.name(), d.transpose(), &f.transpose())?
        } else {
            let ddt = &d * d.transpose();
            let dft = &d * f.transpose();
            solve_checked(self.name(), ddt, &dft)?
        };
        Ok(k_t.transpose())
    }

    fn reset(&mut self) {
        self.window.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_column_scalar_is_exact_ratio() {
        let mut est = Transpose::new(1).unwrap();
        let d = DVector::from_vec(vec![0.5]);
        let f = DVector::from_vec(vec![3.0]);
        let k = DMatrix::from_element(1, 1, 1.0);
        let out = est.update(&d, &f, &k, &k).unwrap();
        assert_eq!(out[(0, 0)], 6.0);
    }

    #[test]
    fn returns_initial_until_window_reaches_dim() {
        let mut est = Transpose::new(4).unwrap();
        let k_init = DMatrix::from_row_slice(2, 2, &[5.0, 0.0, 0.0, 5.0]);
        let k_prev = DMatrix::identity(2, 2);
        let d = DVector::from_vec(vec![1.0, 0.0]);
        let f = DVector::from_vec(vec![2.0, 1.0]);
        assert_eq!(est.update(&d, &f, &k_init, &k_prev).unwrap(), k_init);
        assert_eq!(est.len(), 1);
    }

    #[test]
    fn exact_and_least_squares_recover_linear_stiffness() {
        let k_true = DMatrix::from_row_slice(2, 2, &[4.0, -1.0, -1.0, 3.0]);
        let k0 = DMatrix::identity(2, 2);
        let mut est = Transpose::new(3).unwrap();
        let steps = [[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [2.0, -1.0]];
        let mut last = k0.clone();
        for (i, s) in steps.iter().enumerate() {
            let d = DVector::from_column_slice(s);
            let f = &k_true * &d;
            last = est.update(&d, &f, &k0, &last).unwrap();
            if i >= 1 {
                assert!((&last - &k_true).norm() < 1e-10, "step {i}");
            }
        }
        assert_eq!(est.len(), 3);
    }

    #[test]
    fn collinear_increments_fail() {
        let mut est = Transpose::new(2).unwrap();
        let k0 = DMatrix::identity(2, 2);
        let d = DVector::from_vec(vec![1.0, 1.0]);
        let f = DVector::from_vec(vec![1.0, 1.0]);
        est.update(&d, &f, &k0, &k0).unwrap();
        let d2 = DVector::from_vec(vec![2.0, 2.0]);
        let err = est.update(&d2, &f, &k0, &k0).unwrap_err();
        assert!(matches!(err, EstimatorError::EstimationFailed { .. }));
    }

    #[test]
    fn reset_clears_history() {
        let mut est = Transpose::new(2).unwrap();
        let k = DMatrix::from_element(1, 1, 1.0);
        let d = DVector::from_vec(vec![1.0]);
        est.update(&d, &d, &k, &k).unwrap();
        est.reset();
        assert!(est.is_empty());
    }
}
