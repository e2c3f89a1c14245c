//! Inverted V-brace frame: a horizontal actuator at one end of a rigid
//! beam and two vertical actuators under its ends, `l0` left and `l1`
//! right of the control node.
//!
//! The six load-cell forces are reported as measured.

use hs_core::{Response, ResponseKind, SizeSpec};

use crate::error::{SetupError, SetupResult};
use crate::geometry::{Geometry, GeometrySizes, TransformResult};
use crate::linkage::{Arm, Linkage};
use crate::two_actuators::ActuatorSide;

/// Load-cell channels passed through on the daq and output sides.
pub const LOAD_CELLS: usize = 6;

#[derive(Clone, Debug, PartialEq)]
pub struct InvertedVBrace2d {
    la: [f64; 3],
    l0: f64,
    l1: f64,
    side: ActuatorSide,
    link: Linkage,
}

impl InvertedVBrace2d {
    /// # Arguments
    ///
    /// * `la` - initial lengths of the horizontal and the two vertical actuators
    /// * `l0`, `l1` - distances of the beam ends from the control node
    /// * `side` - end of the beam the horizontal actuator pushes from
    /// * `phi_loc_x` - angle of the local x axis in degrees
    pub fn new(
        la: [f64; 3],
        l0: f64,
        l1: f64,
        nl_geom: bool,
        side: ActuatorSide,
        phi_loc_x: f64,
    ) -> SetupResult<Self> {
        if !la.iter().all(|&x| x.is_finite() && x > 0.0) {
            return Err(SetupError::InvalidArg {
                what: "actuator lengths must be positive",
            });
        }
        if !(l0.is_finite() && l1.is_finite() && l0 > 0.0 && l1 > 0.0) {
            return Err(SetupError::InvalidArg {
                what: "rigid link lengths must be positive",
            });
        }
        let horizontal = match side {
            ActuatorSide::Left => Arm::new([-l0, 0.0], [1.0, 0.0], la[0]),
            ActuatorSide::Right => Arm::new([l1, 0.0], [-1.0, 0.0], la[0]),
        };
        let arms = [
            horizontal,
            Arm::new([-l0, 0.0], [0.0, 1.0], la[1]),
            Arm::new([l1, 0.0], [0.0, 1.0], la[2]),
        ];
        Ok(Self {
            la,
            l0,
            l1,
            side,
            link: Linkage::new(arms, nl_geom, phi_loc_x)?,
        })
    }

    pub fn actuator_lengths(&self) -> [f64; 3] {
        self.la
    }

    pub fn rigid_lengths(&self) -> (f64, f64) {
        (self.l0, self.l1)
    }

    pub fn side(&self) -> ActuatorSide {
        self.side
    }

    pub fn nl_geom(&self) -> bool {
        self.link.nl_geom()
    }
}

impl Geometry for InvertedVBrace2d {
    fn name(&self) -> &'static str {
        "inverted_vbrace_2d"
    }

    fn sizes(&self) -> GeometrySizes {
        let mut sizes = GeometrySizes::kinematic(3, 3, 3);
        sizes.daq.set(ResponseKind::Force, LOAD_CELLS);
        sizes.output.set(ResponseKind::Force, LOAD_CELLS);
        sizes
    }

    fn check_kinds(&self, trial: &SizeSpec, output: &SizeSpec) -> TransformResult<()> {
        self.link.check_kinds(trial, output)
    }

    fn transform_trial(&self, trial: &Response) -> TransformResult<Response> {
        self.link.transform_trial(trial)
    }

    fn transform_daq(&self, daq: &Response) -> TransformResult<Response> {
        let mut output = Response::new();
        for (kind, values) in daq.iter() {
            let out = match kind {
                ResponseKind::Time | ResponseKind::Force => values.clone(),
                _ => self.link.basic_motion(kind, values)?,
            };
            output.set(kind, Some(out));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rejection;
    use hs_core::DVector;

    fn v(x: &[f64]) -> DVector<f64> {
        DVector::from_column_slice(x)
    }

    fn close(a: &DVector<f64>, b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn load_cells_widen_the_force_channels() {
        let g = InvertedVBrace2d::new([1.0; 3], 1.0, 1.0, false, ActuatorSide::Left, 0.0).unwrap();
        let sizes = g.sizes();
        assert_eq!(sizes.ctrl, SizeSpec::new([3, 3, 3, 3, 1]));
        assert_eq!(sizes.daq, SizeSpec::new([3, 3, 3, 6, 1]));
        assert_eq!(sizes.output, SizeSpec::new([3, 3, 3, 6, 1]));
    }

    #[test]
    fn linear_right_kinematics() {
        let g = InvertedVBrace2d::new([1.0; 3], 1.0, 2.0, false, ActuatorSide::Right, 0.0).unwrap();
        let trial = Response::new()
            .with(ResponseKind::Disp, v(&[1.0, 2.0, 0.5]))
            .with(ResponseKind::Force, v(&[3.0, 3.0, 3.0]));
        let ctrl = g.transform_trial(&trial).unwrap();
        assert!(close(ctrl.get(ResponseKind::Disp).unwrap(), &[-1.0, 1.5, 3.0]));
        assert!(close(ctrl.get(ResponseKind::Force).unwrap(), &[-3.0, 1.0, 2.0]));

        let cells = v(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let daq = Response::new()
            .with(ResponseKind::Disp, v(&[-1.0, 1.5, 3.0]))
            .with(ResponseKind::Force, cells.clone());
        let out = g.transform_daq(&daq).unwrap();
        assert!(close(out.get(ResponseKind::Disp).unwrap(), &[1.0, 2.0, 0.5]));
        assert_eq!(out.get(ResponseKind::Force).unwrap(), &cells);
    }

    #[test]
    fn nonlinear_displacement_round_trips_on_both_sides() {
        for side in [ActuatorSide::Left, ActuatorSide::Right] {
            let g = InvertedVBrace2d::new([1.2, 1.5, 1.5], 0.8, 0.8, true, side, 0.0).unwrap();
            let trial = Response::new().with(ResponseKind::Disp, v(&[0.2, -0.1, 0.15]));
            let ctrl = g.transform_trial(&trial).unwrap();
            let out = g.transform_daq(&ctrl).unwrap();
            assert!(close(out.get(ResponseKind::Disp).unwrap(), &[0.2, -0.1, 0.15]));
        }
    }

    #[test]
    fn nonlinear_horizontal_stroke_is_exact() {
        let g = InvertedVBrace2d::new([1.0; 3], 1.0, 1.0, true, ActuatorSide::Left, 0.0).unwrap();
        // a pure rotation stretches the horizontal actuator
        let theta: f64 = 0.3;
        let trial = Response::new().with(ResponseKind::Disp, v(&[0.0, 0.0, theta]));
        let ctrl = g.transform_trial(&trial).unwrap();
        let expected = ((2.0 - theta.cos()).powi(2) + theta.sin().powi(2)).sqrt() - 1.0;
        assert!((ctrl.get(ResponseKind::Disp).unwrap()[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn unreachable_strokes_are_reported() {
        let g = InvertedVBrace2d::new([1.0; 3], 0.5, 0.5, true, ActuatorSide::Left, 0.0).unwrap();
        let daq = Response::new().with(ResponseKind::Disp, v(&[0.0, 0.0, 10.0]));
        assert!(matches!(g.transform_daq(&daq), Err(Rejection::Invalid(_))));
        let daq = Response::new().with(ResponseKind::Vel, v(&[0.0, 0.0, 1.0]));
        assert!(matches!(g.transform_daq(&daq), Err(Rejection::NotImplemented(_))));
    }
}
