//! Control points: which node directions a control addresses.
//!
//! A control point lists ordered signals, each a `(direction, kind, factor)`
//! triple, and optional lower/upper limits per signal. The signals of one
//! kind, taken across a control's points in order, form that kind's
//! sub-vector in actuator space.

use std::collections::BTreeSet;

use hs_core::{ControlPointTag, ResponseKind, SizeSpec};

use crate::error::{ControlError, ControlResult};

#[derive(Clone, Debug, PartialEq)]
pub struct ControlPoint {
    tag: ControlPointTag,
    node_tag: u32,
    ndf: usize,
    directions: Vec<usize>,
    kinds: Vec<ResponseKind>,
    factors: Vec<f64>,
    limits: Option<(Vec<f64>, Vec<f64>)>,
}

impl ControlPoint {
    /// Creates a control point on a node with `ndf` degrees of freedom.
    ///
    /// # Arguments
    ///
    /// * `directions` - node direction index per signal (0-based)
    /// * `kinds` - response kind per signal
    /// * `factors` - scale factor per signal; `None` means 1.0 for all
    ///
    /// # Errors
    ///
    /// Returns error if the sequences differ in length, a direction is not
    /// below `ndf`, more unique directions are used than the node has, or a
    /// factor is zero or non-finite.
    pub fn new(
        tag: ControlPointTag,
        node_tag: u32,
        ndf: usize,
        directions: Vec<usize>,
        kinds: Vec<ResponseKind>,
        factors: Option<Vec<f64>>,
    ) -> ControlResult<Self> {
        let mut cp = Self {
            tag,
            node_tag,
            ndf,
            directions: Vec::new(),
            kinds: Vec::new(),
            factors: Vec::new(),
            limits: None,
        };
        cp.set_data(node_tag, directions, kinds, factors)?;
        Ok(cp)
    }

    /// Replaces the signal definition wholesale.
    ///
    /// Nothing changes if validation fails. Limits are dropped when the
    /// signal count changes.
    pub fn set_data(
        &mut self,
        node_tag: u32,
        directions: Vec<usize>,
        kinds: Vec<ResponseKind>,
        factors: Option<Vec<f64>>,
    ) -> ControlResult<()> {
        if directions.is_empty() {
            return Err(ControlError::InvalidArg {
                what: "control point needs at least one signal",
            });
        }
        if kinds.len() != directions.len() {
            return Err(ControlError::InvalidArg {
                what: "direction and response sequences need the same length",
            });
        }
        let factors = match factors {
            Some(f) if f.len() != directions.len() => {
                return Err(ControlError::InvalidArg {
                    what: "direction, response and factor sequences need the same length",
                });
            }
            Some(f) => f,
            None => vec![1.0; directions.len()],
        };
        if factors.iter().any(|f| !f.is_finite() || *f == 0.0) {
            return Err(ControlError::InvalidArg {
                what: "factors must be finite and non-zero",
            });
        }
        if directions.iter().any(|&d| d >= self.ndf) {
            return Err(ControlError::InvalidArg {
                what: "direction exceeds node degrees of freedom",
            });
        }
        let unique: BTreeSet<usize> = directions.iter().copied().collect();
        if unique.len() > self.ndf {
            return Err(ControlError::InvalidArg {
                what: "more unique directions than node degrees of freedom",
            });
        }

        if self.directions.len() != directions.len() {
            self.limits = None;
        }
        self.node_tag = node_tag;
        self.directions = directions;
        self.kinds = kinds;
        self.factors = factors;
        Ok(())
    }

    /// Sets lower and upper limits, one pair per signal.
    pub fn set_limits(&mut self, lower: Vec<f64>, upper: Vec<f64>) -> ControlResult<()> {
        if lower.len() != self.num_signals() || upper.len() != self.num_signals() {
            return Err(ControlError::InvalidArg {
                what: "lower and upper limits need one entry per signal",
            });
        }
        if lower
            .iter()
            .zip(upper.iter())
            .any(|(l, u)| l.is_nan() || u.is_nan() || l > u)
        {
            return Err(ControlError::InvalidArg {
                what: "lower limit must not exceed upper limit",
            });
        }
        self.limits = Some((lower, upper));
        Ok(())
    }

    pub fn with_limits(mut self, lower: Vec<f64>, upper: Vec<f64>) -> ControlResult<Self> {
        self.set_limits(lower, upper)?;
        Ok(self)
    }

    pub fn tag(&self) -> ControlPointTag {
        self.tag
    }

    pub fn node_tag(&self) -> u32 {
        self.node_tag
    }

    pub fn ndf(&self) -> usize {
        self.ndf
    }

    pub fn num_signals(&self) -> usize {
        self.directions.len()
    }

    pub fn directions(&self) -> &[usize] {
        &self.directions
    }

    pub fn kinds(&self) -> &[ResponseKind] {
        &self.kinds
    }

    pub fn factors(&self) -> &[f64] {
        &self.factors
    }

    /// Limits of signal `i`, if limits are set.
    pub fn limits(&self, i: usize) -> Option<(f64, f64)> {
        self.limits
            .as_ref()
            .and_then(|(lo, up)| Some((*lo.get(i)?, *up.get(i)?)))
    }

    /// Number of signals per response kind.
    pub fn size_per_kind(&self) -> SizeSpec {
        let mut size = SizeSpec::default();
        for kind in &self.kinds {
            size.set(*kind, size.get(*kind) + 1);
        }
        size
    }

    /// Distinct directions in ascending order.
    pub fn unique_directions(&self) -> Vec<usize> {
        let unique: BTreeSet<usize> = self.directions.iter().copied().collect();
        unique.into_iter().collect()
    }

    pub fn num_unique_directions(&self) -> usize {
        self.unique_directions().len()
    }

    /// Same node, directions and kinds; factors and limits are not compared.
    pub fn same_channels(&self, other: &ControlPoint) -> bool {
        self.node_tag == other.node_tag
            && self.directions == other.directions
            && self.kinds == other.kinds
    }

    /// Signal indices of one kind, in order.
    pub fn signals_of(&self, kind: ResponseKind) -> impl Iterator<Item = usize> + '_ {
        self.kinds
            .iter()
            .enumerate()
            .filter(move |(_, k)| **k == kind)
            .map(|(i, _)| i)
    }
}

/// Sums the per-kind sizes of several control points.
pub fn total_size(points: &[ControlPoint]) -> SizeSpec {
    points
        .iter()
        .fold(SizeSpec::default(), |acc, cp| acc.add(&cp.size_per_kind()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_core::Tag;

    fn cp() -> ControlPoint {
        ControlPoint::new(
            Tag::new(1),
            3,
            3,
            vec![0, 1, 0],
            vec![ResponseKind::Disp, ResponseKind::Disp, ResponseKind::Force],
            None,
        )
        .unwrap()
    }

    #[test]
    fn factors_default_to_one() {
        assert_eq!(cp().factors(), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn size_per_kind_counts_signals() {
        let size = cp().size_per_kind();
        assert_eq!(size, SizeSpec::new([2, 0, 0, 1, 0]));
        assert_eq!(cp().num_unique_directions(), 2);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = ControlPoint::new(
            Tag::new(1),
            1,
            2,
            vec![0, 1],
            vec![ResponseKind::Disp],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ControlError::InvalidArg { .. }));

        let err = ControlPoint::new(
            Tag::new(1),
            1,
            2,
            vec![0],
            vec![ResponseKind::Disp],
            Some(vec![1.0, 2.0]),
        );
        assert!(err.is_err());
    }

    #[test]
    fn directions_must_fit_the_node() {
        let err = ControlPoint::new(
            Tag::new(1),
            1,
            2,
            vec![0, 2],
            vec![ResponseKind::Disp, ResponseKind::Disp],
            None,
        );
        assert!(err.is_err());
    }

    #[test]
    fn failed_set_data_leaves_point_unchanged() {
        let mut p = cp();
        let before = p.clone();
        assert!(p.set_data(9, vec![0], vec![], None).is_err());
        assert_eq!(p, before);
    }

    #[test]
    fn limits_need_one_pair_per_signal() {
        let p = cp();
        assert!(p.clone().with_limits(vec![-1.0], vec![1.0]).is_err());
        let p = p
            .with_limits(vec![-1.0, -2.0, -3.0], vec![1.0, 2.0, 3.0])
            .unwrap();
        assert_eq!(p.limits(1), Some((-2.0, 2.0)));
        assert_eq!(p.limits(3), None);
    }

    #[test]
    fn equality_of_channels_ignores_factors() {
        let a = cp();
        let mut b = cp();
        b.set_data(
            3,
            vec![0, 1, 0],
            vec![ResponseKind::Disp, ResponseKind::Disp, ResponseKind::Force],
            Some(vec![2.0, 2.0, 2.0]),
        )
        .unwrap();
        assert!(a.same_channels(&b));
        assert_ne!(a, b);
    }
}
