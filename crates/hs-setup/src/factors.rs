//! Per-kind, per-entry scale factors on the four sides of a setup.

use hs_core::{DVector, Response, ResponseKind, SizeSpec};
use serde::{Deserialize, Serialize};

use crate::error::{SetupError, SetupResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorSide {
    /// Applied to basic trial vectors before the geometry.
    Trial,
    /// Applied to basic output vectors after the inverse geometry.
    Output,
    /// Applied to actuator commands after the geometry.
    Ctrl,
    /// Applied to actuator measurements before the inverse geometry.
    Daq,
}

impl FactorSide {
    pub const ALL: [FactorSide; 4] = [
        FactorSide::Trial,
        FactorSide::Output,
        FactorSide::Ctrl,
        FactorSide::Daq,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            FactorSide::Trial => "trial",
            FactorSide::Output => "output",
            FactorSide::Ctrl => "ctrl",
            FactorSide::Daq => "daq",
        }
    }
}

/// Missing factors are 1.0.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Factors {
    sides: [[Option<DVector<f64>>; ResponseKind::COUNT]; 4],
}

impl Factors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, side: FactorSide, kind: ResponseKind, values: Vec<f64>) -> SetupResult<()> {
        if values.iter().any(|f| !f.is_finite()) {
            return Err(SetupError::InvalidArg {
                what: "scale factors must be finite",
            });
        }
        self.sides[side.index()][kind.index()] = Some(DVector::from_vec(values));
        Ok(())
    }

    pub fn get(&self, side: FactorSide, kind: ResponseKind) -> Option<&DVector<f64>> {
        self.sides[side.index()][kind.index()].as_ref()
    }

    /// Checks factor lengths against the full arity of one side.
    pub fn check(&self, side: FactorSide, size: &SizeSpec, setup: &str) -> SetupResult<()> {
        for kind in ResponseKind::ALL {
            if let Some(f) = self.get(side, kind) {
                if f.len() != size.get(kind) {
                    return Err(SetupError::Invalid {
                        setup: setup.to_string(),
                        op: "set_size",
                        what: format!(
                            "{} factor for {kind} has {} entries, expected {}",
                            side.name(),
                            f.len(),
                            size.get(kind)
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Multiplies every present slot element-wise.
    pub fn apply(&self, side: FactorSide, response: &mut Response) {
        for kind in ResponseKind::ALL {
            if let (Some(f), Some(v)) = (self.get(side, kind), response.get_mut(kind)) {
                if f.len() == v.len() {
                    v.component_mul_assign(f);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_factors_are_identity() {
        let f = Factors::new();
        let mut r = Response::new().with(ResponseKind::Disp, DVector::from_vec(vec![1.0, 2.0]));
        let before = r.clone();
        f.apply(FactorSide::Trial, &mut r);
        assert_eq!(r, before);
    }

    #[test]
    fn factors_scale_per_entry() {
        let mut f = Factors::new();
        f.set(FactorSide::Ctrl, ResponseKind::Force, vec![2.0, -1.0])
            .unwrap();
        let mut r = Response::new().with(ResponseKind::Force, DVector::from_vec(vec![3.0, 4.0]));
        f.apply(FactorSide::Ctrl, &mut r);
        assert_eq!(r.get(ResponseKind::Force).unwrap().as_slice(), &[6.0, -4.0]);
        // other sides untouched
        f.apply(FactorSide::Daq, &mut r);
        assert_eq!(r.get(ResponseKind::Force).unwrap().as_slice(), &[6.0, -4.0]);
    }

    #[test]
    fn factor_length_must_match_arity() {
        let mut f = Factors::new();
        f.set(FactorSide::Trial, ResponseKind::Disp, vec![1.0]).unwrap();
        let size = SizeSpec::default().with(ResponseKind::Disp, 3);
        assert!(f.check(FactorSide::Trial, &size, "one_actuator#1").is_err());
    }
}
