//! The control wrapper shared by every specimen backend.

use std::fmt;

use hs_core::{ControlTag, DVector, Response, ResponseKind, SizeSpec};

use crate::control_point::{ControlPoint, total_size};
use crate::error::{ControlError, ControlResult};
use crate::filter::Filter;

/// The specimen-specific half of a control.
///
/// A backend sees commands after scaling and control-side filtering and
/// returns raw measurements before daq-side filtering.
pub trait ControlBackend: Send {
    /// Short name used in error messages and logs.
    fn name(&self) -> &'static str;

    /// Checks that the backend can serve these sizes and allocates for them.
    fn setup(&mut self, size_ctrl: &SizeSpec, size_daq: &SizeSpec) -> ControlResult<()>;

    /// Drives the specimen to the commanded state.
    fn control(&mut self, ctrl: &Response) -> ControlResult<()>;

    /// Reads the specimen; must return every kind with a non-zero daq count.
    fn acquire(&mut self) -> ControlResult<Response>;

    /// Accepts the current state as converged.
    fn commit(&mut self) -> ControlResult<()>;

    /// Whether the last commit can be undone.
    fn supports_rollback(&self) -> bool {
        false
    }

    /// Undoes the last commit.
    fn rollback(&mut self) -> ControlResult<()> {
        Err(ControlError::StateError {
            control: self.name().to_string(),
            op: "rollback",
            what: "backend cannot undo a commit".to_string(),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Unsized,
    Sized,
    Commanded,
}

/// One experimental control: sizing, filters, control points and a backend.
pub struct ExperimentalControl {
    tag: ControlTag,
    backend: Box<dyn ControlBackend>,
    ctrl_filters: [Option<Filter>; ResponseKind::COUNT],
    daq_filters: [Option<Filter>; ResponseKind::COUNT],
    ctrl_points: Vec<ControlPoint>,
    daq_points: Vec<ControlPoint>,
    size_ctrl: SizeSpec,
    size_daq: SizeSpec,
    phase: Phase,
}

impl fmt::Debug for ExperimentalControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExperimentalControl")
            .field("tag", &self.tag)
            .field("backend", &self.backend.name())
            .field("size_ctrl", &self.size_ctrl)
            .field("size_daq", &self.size_daq)
            .field("phase", &self.phase)
            .finish()
    }
}

impl ExperimentalControl {
    pub fn new(tag: ControlTag, backend: Box<dyn ControlBackend>) -> Self {
        Self {
            tag,
            backend,
            ctrl_filters: Default::default(),
            daq_filters: Default::default(),
            ctrl_points: Vec::new(),
            daq_points: Vec::new(),
            size_ctrl: SizeSpec::default(),
            size_daq: SizeSpec::default(),
            phase: Phase::Unsized,
        }
    }

    pub fn with_ctrl_filter(mut self, kind: ResponseKind, filter: Filter) -> Self {
        self.ctrl_filters[kind.index()] = Some(filter);
        self
    }

    pub fn with_daq_filter(mut self, kind: ResponseKind, filter: Filter) -> Self {
        self.daq_filters[kind.index()] = Some(filter);
        self
    }

    pub fn with_ctrl_points(mut self, points: Vec<ControlPoint>) -> Self {
        self.ctrl_points = points;
        self
    }

    pub fn with_daq_points(mut self, points: Vec<ControlPoint>) -> Self {
        self.daq_points = points;
        self
    }

    pub fn tag(&self) -> ControlTag {
        self.tag
    }

    /// `backend#tag`, used to identify the control in errors.
    pub fn label(&self) -> String {
        format!("{}#{}", self.backend.name(), self.tag)
    }

    pub fn ctrl_points(&self) -> &[ControlPoint] {
        &self.ctrl_points
    }

    pub fn daq_points(&self) -> &[ControlPoint] {
        &self.daq_points
    }

    /// Sizes implied by the control points, if any are attached.
    pub fn point_sizes(&self) -> (Option<SizeSpec>, Option<SizeSpec>) {
        let size = |pts: &[ControlPoint]| (!pts.is_empty()).then(|| total_size(pts));
        (size(&self.ctrl_points), size(&self.daq_points))
    }

    pub fn is_sized(&self) -> bool {
        self.phase != Phase::Unsized
    }

    pub fn size_ctrl(&self) -> &SizeSpec {
        &self.size_ctrl
    }

    pub fn size_daq(&self) -> &SizeSpec {
        &self.size_daq
    }

    fn mismatch(&self, op: &'static str, kind: ResponseKind, expected: usize, found: usize) -> ControlError {
        ControlError::SizeMismatch {
            control: self.label(),
            op,
            kind,
            expected,
            found,
        }
    }

    fn state_error(&self, op: &'static str, what: &str) -> ControlError {
        ControlError::StateError {
            control: self.label(),
            op,
            what: what.to_string(),
        }
    }

    /// Fixes the control and daq sizes for the rest of the session.
    ///
    /// # Errors
    ///
    /// Fails when a used kind disagrees with attached control points, with a
    /// filter's requirements, or with what the backend can serve.
    pub fn set_size(&mut self, size_ctrl: &SizeSpec, size_daq: &SizeSpec) -> ControlResult<()> {
        const OP: &str = "set_size";
        let (cp_ctrl, cp_daq) = self.point_sizes();
        for (expected, actual) in [(cp_ctrl, size_ctrl), (cp_daq, size_daq)] {
            if let Some(expected) = expected {
                for kind in ResponseKind::ALL {
                    let found = actual.get(kind);
                    if found != 0 && found != expected.get(kind) {
                        return Err(self.mismatch(OP, kind, expected.get(kind), found));
                    }
                }
            }
        }

        let label = self.label();
        for (filters, size) in [
            (&mut self.ctrl_filters, size_ctrl),
            (&mut self.daq_filters, size_daq),
        ] {
            for kind in ResponseKind::ALL {
                let Some(filter) = filters[kind.index()].as_mut() else {
                    continue;
                };
                if filter.is_force_converter() {
                    if kind != ResponseKind::Force
                        || size.get(ResponseKind::Disp) != size.get(ResponseKind::Force)
                    {
                        return Err(ControlError::Unsupported {
                            control: label,
                            op: OP,
                            kind,
                            what: "force converter needs equally sized disp and force slots"
                                .to_string(),
                        });
                    }
                }
                filter.set_size(size.get(kind))?;
            }
        }

        self.backend.setup(size_ctrl, size_daq)?;
        self.size_ctrl = *size_ctrl;
        self.size_daq = *size_daq;
        self.phase = Phase::Sized;
        tracing::debug!(control = %label, ctrl = %size_ctrl, daq = %size_daq, "control sized");
        Ok(())
    }

    /// Scales, filters and limit-checks the command, then drives the backend.
    pub fn set_trial_response(&mut self, ctrl: &Response) -> ControlResult<()> {
        const OP: &str = "set_trial_response";
        if self.phase == Phase::Unsized {
            return Err(self.state_error(OP, "set_size has not been called"));
        }
        for (kind, values) in ctrl.iter() {
            let expected = self.size_ctrl.get(kind);
            if values.len() != expected {
                return Err(self.mismatch(OP, kind, expected, values.len()));
            }
        }

        let mut cmd = ctrl.clone();
        self.scale(&mut cmd, false);
        for kind in ResponseKind::ALL {
            if let Some(filter) = self.ctrl_filters[kind.index()].as_mut() {
                filter.apply_ctrl(kind, &mut cmd)?;
            }
        }
        self.check_limits(&cmd)?;

        self.backend.control(&cmd)?;
        self.phase = Phase::Commanded;
        Ok(())
    }

    /// Reads the backend, filters and unscales the measurement.
    pub fn get_daq_response(&mut self) -> ControlResult<Response> {
        const OP: &str = "get_daq_response";
        if self.phase == Phase::Unsized {
            return Err(self.state_error(OP, "set_size has not been called"));
        }
        let mut daq = self.backend.acquire()?;
        for kind in ResponseKind::ALL {
            let expected = self.size_daq.get(kind);
            let found = daq.get(kind).map_or(0, |v| v.len());
            if found != expected {
                return Err(self.mismatch(OP, kind, expected, found));
            }
        }
        for kind in ResponseKind::ALL {
            if let Some(filter) = self.daq_filters[kind.index()].as_mut() {
                filter.apply_daq(kind, &mut daq)?;
            }
        }
        self.scale(&mut daq, true);
        Ok(daq)
    }

    /// True once a command has been sent since sizing.
    pub fn ready_to_commit(&self) -> bool {
        self.phase == Phase::Commanded
    }

    pub fn commit_state(&mut self) -> ControlResult<()> {
        if !self.ready_to_commit() {
            return Err(self.state_error("commit_state", "no trial response to commit"));
        }
        self.backend.commit()?;
        self.phase = Phase::Sized;
        Ok(())
    }

    pub fn supports_rollback(&self) -> bool {
        self.backend.supports_rollback()
    }

    /// Undoes the last successful commit.
    pub fn rollback_commit(&mut self) -> ControlResult<()> {
        self.backend.rollback()?;
        self.phase = Phase::Commanded;
        tracing::warn!(control = %self.label(), "commit rolled back");
        Ok(())
    }

    /// Applies control-point factors: multiply on the way out, divide on
    /// the way back.
    fn scale(&self, response: &mut Response, inverse: bool) {
        let points = if inverse {
            &self.daq_points
        } else {
            &self.ctrl_points
        };
        if points.is_empty() {
            return;
        }
        for kind in ResponseKind::ALL {
            let Some(values) = response.get_mut(kind) else {
                continue;
            };
            for (i, factor) in factors_of(points, kind).enumerate() {
                if let Some(x) = values.get_mut(i) {
                    *x = if inverse { *x / factor } else { *x * factor };
                }
            }
        }
    }

    fn check_limits(&self, cmd: &Response) -> ControlResult<()> {
        for kind in ResponseKind::ALL {
            let Some(values) = cmd.get(kind) else {
                continue;
            };
            for (i, limits) in limits_of(&self.ctrl_points, kind).enumerate() {
                let (Some((lower, upper)), Some(&value)) = (limits, values.get(i)) else {
                    continue;
                };
                if value < lower || value > upper {
                    return Err(ControlError::LimitExceeded {
                        control: self.label(),
                        kind,
                        index: i,
                        value,
                        lower,
                        upper,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Factors of every `kind` signal across points, in sub-vector order.
fn factors_of(points: &[ControlPoint], kind: ResponseKind) -> impl Iterator<Item = f64> + '_ {
    points
        .iter()
        .flat_map(move |cp| cp.signals_of(kind).map(move |i| cp.factors()[i]))
}

fn limits_of(
    points: &[ControlPoint],
    kind: ResponseKind,
) -> impl Iterator<Item = Option<(f64, f64)>> + '_ {
    points
        .iter()
        .flat_map(move |cp| cp.signals_of(kind).map(move |i| cp.limits(i)))
}

/// Copies `values` into a zero vector of `len` entries; used by backends to
/// keep their last state per kind.
pub(crate) fn resized(values: Option<&DVector<f64>>, len: usize) -> DVector<f64> {
    match values {
        Some(v) if v.len() == len => v.clone(),
        _ => DVector::zeros(len),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Undershoot;
    use crate::loopback::Loopback;
    use hs_core::Tag;

    fn sizes() -> (SizeSpec, SizeSpec) {
        let s = SizeSpec::default()
            .with(ResponseKind::Disp, 2)
            .with(ResponseKind::Force, 2);
        (s, s)
    }

    fn loopback() -> ExperimentalControl {
        ExperimentalControl::new(Tag::new(1), Box::new(Loopback::new()))
    }

    fn trial(d: [f64; 2], f: [f64; 2]) -> Response {
        Response::new()
            .with(ResponseKind::Disp, DVector::from_column_slice(&d))
            .with(ResponseKind::Force, DVector::from_column_slice(&f))
    }

    #[test]
    fn use_before_sizing_is_a_state_error() {
        let mut c = loopback();
        let err = c.set_trial_response(&trial([0.0; 2], [0.0; 2])).unwrap_err();
        assert!(matches!(err, ControlError::StateError { op: "set_trial_response", .. }));
        assert!(c.commit_state().is_err());
    }

    #[test]
    fn loopback_returns_command() {
        let mut c = loopback();
        let (sc, sd) = sizes();
        c.set_size(&sc, &sd).unwrap();
        let t = trial([1.0, 2.0], [3.0, 4.0]);
        c.set_trial_response(&t).unwrap();
        assert_eq!(c.get_daq_response().unwrap(), t);
        c.commit_state().unwrap();
        assert!(!c.ready_to_commit());
    }

    #[test]
    fn wrong_length_is_rejected_with_control_name() {
        let mut c = loopback();
        let (sc, sd) = sizes();
        c.set_size(&sc, &sd).unwrap();
        let bad = Response::new().with(ResponseKind::Disp, DVector::zeros(3));
        let err = c.set_trial_response(&bad).unwrap_err();
        assert!(err.to_string().contains("loopback#1"));
    }

    #[test]
    fn control_points_fix_sizes_and_limits() {
        let cp = ControlPoint::new(
            Tag::new(1),
            1,
            2,
            vec![0, 1],
            vec![ResponseKind::Disp, ResponseKind::Disp],
            Some(vec![2.0, 1.0]),
        )
        .unwrap()
        .with_limits(vec![-1.0, -1.0], vec![1.0, 1.0])
        .unwrap();
        let mut c = loopback().with_ctrl_points(vec![cp]);

        let wrong = SizeSpec::default().with(ResponseKind::Disp, 3);
        assert!(c.set_size(&wrong, &wrong).is_err());

        let size = SizeSpec::default().with(ResponseKind::Disp, 2);
        c.set_size(&size, &size).unwrap();

        // factor 2 on the first signal pushes 0.6 to 1.2
        let t = Response::new().with(ResponseKind::Disp, DVector::from_vec(vec![0.6, 0.5]));
        let err = c.set_trial_response(&t).unwrap_err();
        assert!(matches!(err, ControlError::LimitExceeded { index: 0, .. }));

        let t = Response::new().with(ResponseKind::Disp, DVector::from_vec(vec![0.4, 0.5]));
        c.set_trial_response(&t).unwrap();
        let daq = c.get_daq_response().unwrap();
        assert_eq!(daq.get(ResponseKind::Disp).unwrap().as_slice(), &[0.8, 0.5]);
    }

    #[test]
    fn ctrl_filter_distorts_command() {
        let mut c = loopback().with_ctrl_filter(
            ResponseKind::Disp,
            Filter::Undershoot(Undershoot::new(0.5).unwrap()),
        );
        let (sc, sd) = sizes();
        c.set_size(&sc, &sd).unwrap();
        c.set_trial_response(&trial([1.0, -1.0], [0.0, 0.0])).unwrap();
        let daq = c.get_daq_response().unwrap();
        assert_eq!(daq.get(ResponseKind::Disp).unwrap().as_slice(), &[0.5, -0.5]);
    }

    #[test]
    fn misplaced_force_converter_is_rejected() {
        use crate::force::TangentForceConverter;
        let conv = TangentForceConverter::new(hs_core::DMatrix::identity(2, 2), None).unwrap();
        let mut c = loopback().with_ctrl_filter(ResponseKind::Disp, Filter::TangentForce(conv));
        let (sc, sd) = sizes();
        assert!(matches!(
            c.set_size(&sc, &sd),
            Err(ControlError::Unsupported { .. })
        ));
    }
}
