//! Rigid link in a plane driven by three pinned actuators.
//!
//! Basic coordinates are `(x, y, rotation)` of the control node. Each arm
//! is pinned to the link at `pin` (link coordinates relative to the control
//! node) and points along `dir` in the undeformed state, with its base
//! `length` behind the pin. A stroke is the change of the base-to-pin
//! distance.

use hs_core::{DVector, Response, ResponseKind, SizeSpec};
use nalgebra::{Matrix3, Vector2, Vector3};

use crate::error::{SetupError, SetupResult};
use crate::geometry::{Rejection, TransformResult};

const MAX_ITER: usize = 15;
const TOL: f64 = 1e-9;

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Arm {
    pin: Vector2<f64>,
    dir: Vector2<f64>,
    length: f64,
}

impl Arm {
    /// `dir` must be a unit vector.
    pub(crate) fn new(pin: [f64; 2], dir: [f64; 2], length: f64) -> Self {
        Self {
            pin: Vector2::new(pin[0], pin[1]),
            dir: Vector2::new(dir[0], dir[1]),
            length,
        }
    }

    fn rotated_pin(&self, theta: f64) -> Vector2<f64> {
        let (s, c) = theta.sin_cos();
        Vector2::new(c * self.pin.x - s * self.pin.y, s * self.pin.x + c * self.pin.y)
    }

    /// Derivative of the rotated pin with respect to the rotation.
    fn swing(&self, theta: f64) -> Vector2<f64> {
        let (s, c) = theta.sin_cos();
        Vector2::new(-s * self.pin.x - c * self.pin.y, c * self.pin.x - s * self.pin.y)
    }

    /// Base-to-pin vector for a link displaced by `d`.
    fn span(&self, d: &Vector3<f64>) -> Vector2<f64> {
        Vector2::new(d[0], d[1]) + self.rotated_pin(d[2]) - self.pin + self.dir * self.length
    }

    fn linear_row(&self) -> [f64; 3] {
        [
            self.dir.x,
            self.dir.y,
            self.dir.y * self.pin.x - self.dir.x * self.pin.y,
        ]
    }

    fn stroke(&self, d: &Vector3<f64>) -> f64 {
        self.span(d).norm() - self.length
    }

    fn span_rate(&self, d: &Vector3<f64>, v: &Vector3<f64>) -> Vector2<f64> {
        Vector2::new(v[0], v[1]) + self.swing(d[2]) * v[2]
    }

    fn stroke_rate(&self, d: &Vector3<f64>, v: &Vector3<f64>) -> f64 {
        let p = self.span(d);
        p.dot(&self.span_rate(d, v)) / p.norm()
    }

    fn stroke_accel(&self, d: &Vector3<f64>, v: &Vector3<f64>, a: &Vector3<f64>) -> f64 {
        let p = self.span(d);
        let pd = self.span_rate(d, v);
        let pdd = Vector2::new(a[0], a[1]) + self.swing(d[2]) * a[2]
            - self.rotated_pin(d[2]) * (v[2] * v[2]);
        let len = p.norm();
        let rate = p.dot(&pd);
        (pd.dot(&pd) + p.dot(&pdd)) / len - rate * rate / len.powi(3)
    }

    /// Partial derivatives of the stroke with respect to `d`.
    fn gradient(&self, d: &Vector3<f64>) -> [f64; 3] {
        let p = self.span(d);
        let len = p.norm();
        [p.x / len, p.y / len, p.dot(&self.swing(d[2])) / len]
    }
}

/// Three arms, a local axis rotation and the choice of kinematics.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Linkage {
    arms: [Arm; 3],
    linear: Matrix3<f64>,
    inverse: Matrix3<f64>,
    nl_geom: bool,
    phi_loc_x: f64,
    rot: Matrix3<f64>,
}

impl Linkage {
    pub(crate) fn new(arms: [Arm; 3], nl_geom: bool, phi_loc_x: f64) -> SetupResult<Self> {
        if !phi_loc_x.is_finite() {
            return Err(SetupError::InvalidArg {
                what: "phi_loc_x must be finite",
            });
        }
        let rows = arms.each_ref().map(Arm::linear_row);
        #[rustfmt::skip]
        let linear = Matrix3::new(
            rows[0][0], rows[0][1], rows[0][2],
            rows[1][0], rows[1][1], rows[1][2],
            rows[2][0], rows[2][1], rows[2][2],
        );
        let inverse = linear.try_inverse().ok_or(SetupError::InvalidArg {
            what: "actuator layout does not determine the link position",
        })?;
        let (s, c) = phi_loc_x.to_radians().sin_cos();
        #[rustfmt::skip]
        let rot = Matrix3::new(
            c, -s, 0.0,
            s, c, 0.0,
            0.0, 0.0, 1.0,
        );
        Ok(Self {
            arms,
            linear,
            inverse,
            nl_geom,
            phi_loc_x,
            rot,
        })
    }

    pub(crate) fn nl_geom(&self) -> bool {
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

    fn strokes(&self, d: &Vector3<f64>) -> Vector3<f64> {
        Vector3::from_fn(|i, _| self.arms[i].stroke(d))
    }

    fn stroke_rates(&self, d: &Vector3<f64>, v: &Vector3<f64>) -> Vector3<f64> {
        Vector3::from_fn(|i, _| self.arms[i].stroke_rate(d, v))
    }

    fn stroke_accels(&self, d: &Vector3<f64>, v: &Vector3<f64>, a: &Vector3<f64>) -> Vector3<f64> {
        Vector3::from_fn(|i, _| self.arms[i].stroke_accel(d, v, a))
    }

    fn jacobian(&self, d: &Vector3<f64>) -> Matrix3<f64> {
        let g = self.arms.each_ref().map(|arm| arm.gradient(d));
        Matrix3::from_fn(|i, j| g[i][j])
    }

    /// Newton iteration from the small-rotation estimate.
    fn solve(&self, strokes: &Vector3<f64>) -> TransformResult<Vector3<f64>> {
        let mut d = self.inverse * strokes;
        for _ in 0..MAX_ITER {
            let residual = self.strokes(&d) - strokes;
            let Some(step) = self.jacobian(&d).lu().solve(&residual) else {
                break;
            };
            d -= step;
            if !d.iter().all(|x| x.is_finite()) {
                break;
            }
            if step.norm() < TOL {
                return Ok(d);
            }
        }
        Err(Rejection::Invalid(format!(
            "no link position matches actuator strokes ({}, {}, {})",
            strokes[0], strokes[1], strokes[2]
        )))
    }

    pub(crate) fn check_kinds(&self, trial: &SizeSpec, output: &SizeSpec) -> TransformResult<()> {
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

    pub(crate) fn transform_trial(&self, trial: &Response) -> TransformResult<Response> {
        let disp = trial.get(ResponseKind::Disp).map(|v| self.basic(v));
        let vel = trial.get(ResponseKind::Vel).map(|v| self.basic(v));
        let need = |what: &str| Rejection::Invalid(format!("{what} missing in this step"));

        let mut ctrl = Response::new();
        for (kind, values) in trial.iter() {
            let out = match kind {
                ResponseKind::Time => {
                    ctrl.set(kind, Some(values.clone()));
                    continue;
                }
                ResponseKind::Force if self.nl_geom => {
                    return Err(Rejection::NotImplemented(
                        "trial force with nonlinear geometry".to_string(),
                    ));
                }
                ResponseKind::Force => self.inverse.transpose() * self.basic(values),
                _ if !self.nl_geom => self.linear * self.basic(values),
                ResponseKind::Disp => self.strokes(&self.basic(values)),
                ResponseKind::Vel => {
                    let d = disp.as_ref().ok_or_else(|| need("trial displacement"))?;
                    self.stroke_rates(d, &self.basic(values))
                }
                ResponseKind::Accel => match (disp.as_ref(), vel.as_ref()) {
                    (Some(d), Some(v)) => self.stroke_accels(d, v, &self.basic(values)),
                    _ => return Err(need("trial displacement or velocity")),
                },
            };
            ctrl.set(kind, Some(DVector::from_column_slice(out.as_slice())));
        }
        Ok(ctrl)
    }

    /// Measured strokes, rates or accelerations to basic motion.
    pub(crate) fn basic_motion(
        &self,
        kind: ResponseKind,
        values: &DVector<f64>,
    ) -> TransformResult<DVector<f64>> {
        let q = Vector3::new(values[0], values[1], values[2]);
        let out = match (kind, self.nl_geom) {
            (_, false) => self.inverse * q,
            (ResponseKind::Disp, true) => self.solve(&q)?,
            (_, true) => {
                return Err(Rejection::NotImplemented(format!(
                    "daq {kind} with nonlinear geometry"
                )));
            }
        };
        Ok(self.back_rotate(out))
    }

    /// Actuator forces to basic forces through the transposed Jacobian,
    /// taken at the measured position for nonlinear geometry.
    pub(crate) fn basic_force(
        &self,
        values: &DVector<f64>,
        daq_disp: Option<&DVector<f64>>,
    ) -> TransformResult<DVector<f64>> {
        let jacobian = if self.nl_geom {
            let dq = daq_disp.ok_or_else(|| {
                Rejection::Invalid("daq displacement missing in this step".to_string())
            })?;
            self.jacobian(&self.solve(&Vector3::new(dq[0], dq[1], dq[2]))?)
        } else {
            self.linear
        };
        let q = Vector3::new(values[0], values[1], values[2]);
        Ok(self.back_rotate(jacobian.transpose() * q))
    }
}
