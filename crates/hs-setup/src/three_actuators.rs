//! Three actuators on a vertical link: one vertical actuator at the control
//! node, two horizontal ones a distance `l0` above and `l1` below it.

use hs_core::{Response, ResponseKind, SizeSpec};

use crate::error::{SetupError, SetupResult};
use crate::geometry::{Geometry, GeometrySizes, Rejection, TransformResult};
use crate::linkage::{Arm, Linkage};
use crate::two_actuators::ActuatorSide;

#[derive(Clone, Debug, PartialEq)]
pub struct ThreeActuators2d {
    la: [f64; 3],
    l0: f64,
    l1: f64,
    side: ActuatorSide,
    link: Linkage,
}

impl ThreeActuators2d {
    /// # Arguments
    ///
    /// * `la` - initial actuator lengths
    /// * `l0`, `l1` - distances of actuators 1 and 2 from the control node
    /// * `side` - `Left` puts the vertical actuator's base above the node
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
        let vertical = match side {
            ActuatorSide::Left => [0.0, -1.0],
            ActuatorSide::Right => [0.0, 1.0],
        };
        let arms = [
            Arm::new([0.0, 0.0], vertical, la[0]),
            Arm::new([0.0, l0], [1.0, 0.0], la[1]),
            Arm::new([0.0, -l1], [1.0, 0.0], la[2]),
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

impl Geometry for ThreeActuators2d {
    fn name(&self) -> &'static str {
        "three_actuators_2d"
    }

    fn sizes(&self) -> GeometrySizes {
        GeometrySizes::kinematic(3, 3, 3)
    }

    fn check_kinds(&self, trial: &SizeSpec, output: &SizeSpec) -> TransformResult<()> {
        self.link.check_kinds(trial, output)?;
        if self.link.nl_geom() && output.has(ResponseKind::Force) && !output.has(ResponseKind::Disp)
        {
            return Err(Rejection::Invalid(
                "nonlinear daq force needs daq displacement".to_string(),
            ));
        }
        Ok(())
    }

    fn transform_trial(&self, trial: &Response) -> TransformResult<Response> {
        self.link.transform_trial(trial)
    }

    fn transform_daq(&self, daq: &Response) -> TransformResult<Response> {
        let mut output = Response::new();
        for (kind, values) in daq.iter() {
            let out = match kind {
                ResponseKind::Time => values.clone(),
                ResponseKind::Force => self
                    .link
                    .basic_force(values, daq.get(ResponseKind::Disp))?,
                _ => self.link.basic_motion(kind, values)?,
            };
            output.set(kind, Some(out));
        }
        Ok(output)
    }
}
