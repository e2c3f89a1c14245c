//! Broyden rank-one stiffness update.

use nalgebra::{DMatrix, DVector};

use crate::error::EstimatorResult;
use crate::estimator::{TangentStiffEstimator, check_dims};

/// `k_new = k_prev + ((k_prev * d - f) ⊗ d) / (d · d)`.
///
/// A zero displacement increment leaves `k_prev` unchanged.
#[derive(Debug, Clone, Default)]
pub struct Broyden;

impl Broyden {
    pub fn new() -> Self {
        Self
    }
}

impl TangentStiffEstimator for Broyden {
    fn name(&self) -> &'static str {
        "broyden"
    }

    fn update(
        &mut self,
        incr_disp: &DVector<f64>,
        incr_force: &DVector<f64>,
        k_init: &DMatrix<f64>,
        k_prev: &DMatrix<f64>,
    ) -> EstimatorResult<DMatrix<f64>> {
        check_dims(self.name(), incr_disp, incr_force, k_init, k_prev)?;

        let dd = incr_disp.dot(incr_disp);
        if dd == 0.0 {
            tracing::debug!("broyden: zero displacement increment, keeping previous stiffness");
            return Ok(k_prev.clone());
        }

        let residual = k_prev * incr_disp - incr_force;
        Ok(k_prev + (residual * incr_disp.transpose()) / dd)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn directions_orthogonal_to_increment_are_unchanged(
            d in prop::collection::vec(-10.0_f64..10.0, 2),
            f in prop::collection::vec(-10.0_f64..10.0, 2),
        ) {
            let d = DVector::from_vec(d);
            prop_assume!(d.norm() > 1e-3);
            let f = DVector::from_vec(f);
            let k_prev = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
            let out = Broyden::new().update(&d, &f, &k_prev, &k_prev).unwrap();
            let v = DVector::from_vec(vec![-d[1], d[0]]);
            let r = &out * &v - &k_prev * &v;
            prop_assert!(r.norm() <= 1e-9 * (1.0 + v.norm()));
        }
    }
}
