//! Two horizontal actuators driving a rigid link in a vertical plane.
//!
//! Basic coordinates are `(x, y, rotation)`; actuator 0 acts on the link
//! axis, actuator 1 sits a distance `l` below it. Linear kinematics hold
//! for small rotations; the nonlinear variant uses exact link geometry
//! with `la1` the initial length of actuator 1.

use hs_core::{DVector, Response, ResponseKind, SizeSpec};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{SetupError, SetupResult};
use crate::geometry::{Geometry, GeometrySizes, Rejection, TransformResult};

/// Side of the specimen the actuators push from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorSide {
    #[default]
    Left,
    Right,
}

impl ActuatorSide {
    fn sign(self) -> f64 {
        match self {
            ActuatorSide::Left => 1.0,
            ActuatorSide::Right => -1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TwoActuators2d {
    la0: f64,
    la1: f64,
    l: f64,
    nl_geom: bool,
    side: ActuatorSide,
    phi_loc_x: f64,
    rot: Matrix3<f64>,
}

impl TwoActuators2d {
    /// # Arguments
    ///
    /// * `la0`, `la1` - initial actuator lengths
    /// * `l` - distance between the actuators along the link
    /// * `nl_geom` - use exact instead of small-rotation kinematics
    /// * `phi_loc_x` - angle of the local x axis in degrees
    pub fn new(
        la0: f64,
        la1: f64,
        l: f64,
        nl_geom: bool,
        side: ActuatorSide,
        phi_loc_x: f64,
    ) -> SetupResult<Self> {
        if !(la0.is_finite() && la1.is_finite() && la0 > 0.0 && la1 > 0.0) {
            return Err(SetupError::InvalidArg {
                what: "actuator lengths must be positive",
            });
        }
        if !(l.is_finite() && l > 0.0) {
            return Err(SetupError::InvalidArg {
                what: "link length must be positive",
            });
        }
        if !phi_loc_x.is_finite() {
            return Err(SetupError::InvalidArg {
                what: "phi_loc_x must be finite",
            });
        }
        let (s, c) = phi_loc_x.to_radians().sin_cos();
        #[rustfmt::skip]
        let rot = Matrix3::new(
            c, -s, 0.0,
            s, c, 0.0,
            0.0, 0.0, 1.0,
        );
        Ok(Self {
            la0,
            la1,
            l,
            nl_geom,
            side,
            phi_loc_x,
            rot,
        })
    }

    pub fn la0(&self) -> f64 {
        self.la0
    }

    pub fn nl_geom(&self) -> bool {
        self.nl_geom
    }

    fn basic(&self, values: &DVector<f64>) -> Vector3<f64> {
        self.rot * Vector3::new(values[0], values[1], values[2])
    }

    fn back_rotate(&self, v: Vector3<f64>) -> DVector<f64> {
        let v = if self.phi_loc_x != 0.0 {
            self.rot.transpose() * v
        } else {
            v
        };
        DVector::from_column_slice(v.as_slice())
    }

    /// Position of the actuator 1 attachment relative to its base, and the
    /// resulting actuator length.
    fn link(&self, d: &Vector3<f64>) -> (f64, f64, f64) {
        let s = self.side.sign();
        let x = s * (d[0] - self.l * d[2].sin()) + self.la1;
        let y = self.l * d[2].cos() - self.l;
        (x, y, (x * x + y * y).sqrt())
    }

    fn trial_disp(&self, d: &Vector3<f64>) -> [f64; 2] {
        let s = self.side.sign();
        if self.nl_geom {
            let (_, _, len) = self.link(d);
            [s * d[0], len - self.la1]
        } else {
            [s * d[0], s * (d[0] - self.l * d[2])]
        }
    }

    fn trial_vel(&self, d: &Vector3<f64>, v: &Vector3<f64>) -> [f64; 2] {
        let s = self.side.sign();
        if self.nl_geom {
            let (x, y, len) = self.link(d);
            let (sin, cos) = d[2].sin_cos();
            let xd = s * (v[0] - self.l * cos * v[2]);
            let yd = -self.l * sin * v[2];
            [s * v[0], (x * xd + y * yd) / len]
        } else {
            [s * v[0], s * (v[0] - self.l * v[2])]
        }
    }

    fn trial_accel(&self, d: &Vector3<f64>, v: &Vector3<f64>, a: &Vector3<f64>) -> [f64; 2] {
        let s = self.side.sign();
        if self.nl_geom {
            let l = self.l;
            let (x, y, len) = self.link(d);
            let (sin, cos) = d[2].sin_cos();
            let xd = s * (v[0] - l * cos * v[2]);
            let yd = -l * sin * v[2];
            let xdd = s * (a[0] + l * sin * v[2] * v[2] - l * cos * a[2]);
            let ydd = -l * cos * v[2] * v[2] - l * sin * a[2];
            let rate = x * xd + y * yd;
            [
                s * a[0],
                (xd * xd + x * xdd + yd * yd + y * ydd) / len - rate * rate / len.powi(3),
            ]
        } else {
            [s * a[0], s * (a[0] - self.l * a[2])]
        }
    }

    fn trial_force(&self, f: &Vector3<f64>) -> [f64; 2] {
        let s = self.side.sign();
        [s * (f[0] + f[2] / self.l), -s * f[2] / self.l]
    }

    /// Link rotation from measured actuator displacements.
    fn rotation_nl(&self, daq_disp: &DVector<f64>) -> TransformResult<f64> {
        let l = self.l;
        let d0 = self.la1 + daq_disp[0];
        let d1 = self.la1 + daq_disp[1];
        let cos_arg = (d1 * d1 - 2.0 * l * l - d0 * d0) / (-2.0 * l * (l * l + d0 * d0).sqrt());
        if !(-1.0..=1.0).contains(&cos_arg) {
            return Err(Rejection::Invalid(format!(
                "measured actuator lengths ({d0}, {d1}) are inconsistent with the link geometry"
            )));
        }
        Ok(self.side.sign() * (d0.atan2(l) - cos_arg.acos()))
    }

    fn daq_linear(&self, dq: &DVector<f64>) -> Vector3<f64> {
        let s = self.side.sign();
        Vector3::new(s * dq[0], 0.0, s * (dq[0] - dq[1]) / self.l)
    }
}

impl Geometry for TwoActuators2d {
    fn name(&self) -> &'static str {
        "two_actuators_2d"
    }

    fn sizes(&self) -> GeometrySizes {
        GeometrySizes::kinematic(3, 3, 2)
    }

    fn check_kinds(&self, trial: &SizeSpec, output: &SizeSpec) -> TransformResult<()> {
        if !self.nl_geom {
            return Ok(());
        }
        if trial.has(ResponseKind::Force) {
            return Err(Rejection::NotImplemented(
                "trial force with nonlinear geometry".to_string(),
            ));
        }
        for kind in [ResponseKind::Vel, ResponseKind::Accel] {
            if output.has(kind) {
                return Err(Rejection::NotImplemented(format!(
                    "daq {kind} with nonlinear geometry"
                )));
            }
        }
        if output.has(ResponseKind::Force) && !output.has(ResponseKind::Disp) {
            return Err(Rejection::Invalid(
                "nonlinear daq force needs daq displacement".to_string(),
            ));
        }
        if trial.has(ResponseKind::Vel) && !trial.has(ResponseKind::Disp) {
            return Err(Rejection::Invalid(
                "nonlinear trial velocity needs trial displacement".to_string(),
            ));
        }
        if trial.has(ResponseKind::Accel)
            && !(trial.has(ResponseKind::Disp) && trial.has(ResponseKind::Vel))
        {
            return Err(Rejection::Invalid(
                "nonlinear trial acceleration needs trial displacement and velocity".to_string(),
            ));
        }
        Ok(())
    }

    fn transform_trial(&self, trial: &Response) -> TransformResult<Response> {
        let disp = trial.get(ResponseKind::Disp).map(|v| self.basic(v));
        let vel = trial.get(ResponseKind::Vel).map(|v| self.basic(v));
        let need = |what: &str| Rejection::Invalid(format!("{what} missing in this step"));

        let mut ctrl = Response::new();
        for (kind, values) in trial.iter() {
            let out = match kind {
                ResponseKind::Disp => self.trial_disp(&self.basic(values)),
                ResponseKind::Vel => {
                    let v = self.basic(values);
                    match (self.nl_geom, disp.as_ref()) {
                        (false, _) => self.trial_vel(&Vector3::zeros(), &v),
                        (true, Some(d)) => self.trial_vel(d, &v),
                        (true, None) => return Err(need("trial displacement")),
                    }
                }
                ResponseKind::Accel => {
                    let a = self.basic(values);
                    match (self.nl_geom, disp.as_ref(), vel.as_ref()) {
                        (false, ..) => {
                            self.trial_accel(&Vector3::zeros(), &Vector3::zeros(), &a)
                        }
                        (true, Some(d), Some(v)) => self.trial_accel(d, v, &a),
                        (true, ..) => return Err(need("trial displacement or velocity")),
                    }
                }
                ResponseKind::Force => {
                    if self.nl_geom {
                        return Err(Rejection::NotImplemented(
                            "trial force with nonlinear geometry".to_string(),
                        ));
                    }
                    self.trial_force(&self.basic(values))
                }
                ResponseKind::Time => {
                    ctrl.set(kind, Some(values.clone()));
                    continue;
                }
            };
            ctrl.set(kind, Some(DVector::from_column_slice(&out)));
        }
        Ok(ctrl)
    }

    fn transform_daq(&self, daq: &Response) -> TransformResult<Response> {
        let s = self.side.sign();
        let mut output = Response::new();
        for (kind, values) in daq.iter() {
            let out = match (kind, self.nl_geom) {
                (ResponseKind::Time, _) => {
                    output.set(kind, Some(values.clone()));
                    continue;
                }
                (ResponseKind::Disp | ResponseKind::Vel | ResponseKind::Accel, false) => {
                    self.daq_linear(values)
                }
                (ResponseKind::Force, false) => Vector3::new(
                    s * (values[0] + values[1]),
                    0.0,
                    -s * self.l * values[1],
                ),
                (ResponseKind::Disp, true) => {
                    Vector3::new(s * values[0], 0.0, self.rotation_nl(values)?)
                }
                (ResponseKind::Force, true) => {
                    let dq = daq.get(ResponseKind::Disp).ok_or_else(|| {
                        Rejection::Invalid("daq displacement missing in this step".to_string())
                    })?;
                    let rot = self.rotation_nl(dq)?;
                    let d1 = self.la1 + dq[1];
                    let theta1 = (self.l * (1.0 - rot.cos()) / d1).asin();
                    let fx1 = values[1] * theta1.cos();
                    let fy1 = values[1] * theta1.sin();
                    Vector3::new(
                        s * (values[0] + fx1),
                        0.0,
                        -s * (fx1 * self.l * rot.cos() + fy1 * self.l * rot.sin()),
                    )
                }
                (ResponseKind::Vel | ResponseKind::Accel, true) => {
                    return Err(Rejection::NotImplemented(format!(
                        "daq {kind} with nonlinear geometry"
                    )));
                }
            };
            output.set(kind, Some(self.back_rotate(out)));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: &[f64]) -> DVector<f64> {
        DVector::from_column_slice(x)
    }

    fn close(a: &DVector<f64>, b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn linear_left_kinematics() {
        let g = TwoActuators2d::new(1.0, 1.0, 2.0, false, ActuatorSide::Left, 0.0).unwrap();
        let trial = Response::new()
            .with(ResponseKind::Disp, v(&[1.0, 5.0, 0.25]))
            .with(ResponseKind::Force, v(&[1.0, 0.0, 4.0]));
        let ctrl = g.transform_trial(&trial).unwrap();
        assert!(close(ctrl.get(ResponseKind::Disp).unwrap(), &[1.0, 0.5]));
        assert!(close(ctrl.get(ResponseKind::Force).unwrap(), &[3.0, -2.0]));

        let daq = Response::new()
            .with(ResponseKind::Disp, v(&[1.0, 0.5]))
            .with(ResponseKind::Force, v(&[3.0, -2.0]));
        let out = g.transform_daq(&daq).unwrap();
        assert!(close(out.get(ResponseKind::Disp).unwrap(), &[1.0, 0.0, 0.25]));
        assert!(close(out.get(ResponseKind::Force).unwrap(), &[1.0, 0.0, 4.0]));
    }

    #[test]
    fn right_side_flips_signs() {
        let g = TwoActuators2d::new(1.0, 1.0, 2.0, false, ActuatorSide::Right, 0.0).unwrap();
        let trial = Response::new().with(ResponseKind::Disp, v(&[1.0, 0.0, 0.25]));
        let ctrl = g.transform_trial(&trial).unwrap();
        assert!(close(ctrl.get(ResponseKind::Disp).unwrap(), &[-1.0, -0.5]));
        let out = g.transform_daq(&ctrl).unwrap();
        assert!(close(out.get(ResponseKind::Disp).unwrap(), &[1.0, 0.0, 0.25]));
    }

    #[test]
    fn rotation_of_local_axis_round_trips_in_plane_motion() {
        let g = TwoActuators2d::new(1.0, 1.0, 2.0, false, ActuatorSide::Left, 90.0).unwrap();
        // global y becomes local x after rotating by 90 degrees
        let trial = Response::new().with(ResponseKind::Disp, v(&[0.0, -1.0, 0.0]));
        let ctrl = g.transform_trial(&trial).unwrap();
        assert!(close(ctrl.get(ResponseKind::Disp).unwrap(), &[1.0, 1.0]));
        let out = g.transform_daq(&ctrl).unwrap();
        assert!(close(out.get(ResponseKind::Disp).unwrap(), &[0.0, -1.0, 0.0]));
    }

    #[test]
    fn nonlinear_displacement_round_trips() {
        let g = TwoActuators2d::new(1.0, 1.5, 0.8, true, ActuatorSide::Left, 0.0).unwrap();
        let trial = Response::new().with(ResponseKind::Disp, v(&[0.1, 0.0, 0.05]));
        let ctrl = g.transform_trial(&trial).unwrap();
        let out = g.transform_daq(&ctrl).unwrap();
        assert!(close(out.get(ResponseKind::Disp).unwrap(), &[0.1, 0.0, 0.05]));
    }

    #[test]
    fn nonlinear_velocity_matches_finite_difference() {
        let g = TwoActuators2d::new(1.0, 1.5, 0.8, true, ActuatorSide::Right, 0.0).unwrap();
        let d = Vector3::new(0.1, 0.0, 0.05);
        let vel = Vector3::new(0.3, 0.0, -0.2);
        let h = 1e-6;
        let ahead = g.trial_disp(&(d + vel * h));
        let behind = g.trial_disp(&(d - vel * h));
        let fd = (ahead[1] - behind[1]) / (2.0 * h);
        let analytic = g.trial_vel(&d, &vel);
        assert!((analytic[1] - fd).abs() < 1e-6);
    }

    #[test]
    fn nonlinear_gaps_are_rejected() {
        let g = TwoActuators2d::new(1.0, 1.5, 0.8, true, ActuatorSide::Left, 0.0).unwrap();
        let used = SizeSpec::new([3, 0, 0, 3, 0]);
        assert!(matches!(
            g.check_kinds(&used, &SizeSpec::new([3, 0, 0, 0, 0])),
            Err(Rejection::NotImplemented(_))
        ));
        assert!(matches!(
            g.check_kinds(&SizeSpec::new([3, 0, 0, 0, 0]), &SizeSpec::new([3, 3, 0, 0, 0])),
            Err(Rejection::NotImplemented(_))
        ));
        assert!(g
            .check_kinds(&SizeSpec::new([3, 0, 0, 0, 0]), &SizeSpec::new([3, 0, 0, 3, 0]))
            .is_ok());
    }

    #[test]
    fn impossible_measurement_is_reported() {
        let g = TwoActuators2d::new(1.0, 1.0, 1.0, true, ActuatorSide::Left, 0.0).unwrap();
        let daq = Response::new().with(ResponseKind::Disp, v(&[0.0, 10.0]));
        assert!(matches!(g.transform_daq(&daq), Err(Rejection::Invalid(_))));
    }
}
