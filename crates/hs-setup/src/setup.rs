//! A geometry plus the controls it drives.

use hs_controls::ExperimentalControl;
use hs_core::{DVector, Response, ResponseKind, SetupTag, SizeSpec};

use crate::error::{SetupError, SetupResult};
use crate::factors::{FactorSide, Factors};
use crate::geometry::{Geometry, Rejection};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Sizes {
    trial: SizeSpec,
    output: SizeSpec,
    ctrl: SizeSpec,
    daq: SizeSpec,
}

/// Maps basic trial vectors onto one or more controls and their
/// measurements back.
///
/// The geometry's actuator vector is split across controls in order: each
/// control takes as many entries per kind as its control points declare. A
/// single control takes the whole vector.
#[derive(Debug)]
pub struct ExperimentalSetup {
    tag: SetupTag,
    geometry: Box<dyn Geometry>,
    controls: Vec<ExperimentalControl>,
    factors: Factors,
    sizes: Option<Sizes>,
    /// Per-control share of the actuator vectors, parallel to `controls`.
    parts: Vec<(SizeSpec, SizeSpec)>,
}

impl ExperimentalSetup {
    pub fn new(
        tag: SetupTag,
        geometry: Box<dyn Geometry>,
        controls: Vec<ExperimentalControl>,
    ) -> SetupResult<Self> {
        if controls.is_empty() {
            return Err(SetupError::InvalidArg {
                what: "a setup needs at least one control",
            });
        }
        Ok(Self {
            tag,
            geometry,
            controls,
            factors: Factors::new(),
            sizes: None,
            parts: Vec::new(),
        })
    }

    /// A setup without controls of its own: the caller moves actuator
    /// vectors elsewhere, e.g. across a network to a control.
    pub fn detached(tag: SetupTag, geometry: Box<dyn Geometry>) -> Self {
        Self {
            tag,
            geometry,
            controls: Vec::new(),
            factors: Factors::new(),
            sizes: None,
            parts: Vec::new(),
        }
    }

    pub fn with_factors(mut self, factors: Factors) -> Self {
        self.factors = factors;
        self
    }

    pub fn tag(&self) -> SetupTag {
        self.tag
    }

    /// `geometry#tag`, used to identify the setup in errors.
    pub fn label(&self) -> String {
        format!("{}#{}", self.geometry.name(), self.tag)
    }

    pub fn geometry(&self) -> &dyn Geometry {
        self.geometry.as_ref()
    }

    pub fn controls(&self) -> &[ExperimentalControl] {
        &self.controls
    }

    pub fn is_sized(&self) -> bool {
        self.sizes.is_some()
    }

    pub fn size_trial(&self) -> Option<&SizeSpec> {
        self.sizes.as_ref().map(|s| &s.trial)
    }

    pub fn size_output(&self) -> Option<&SizeSpec> {
        self.sizes.as_ref().map(|s| &s.output)
    }

    pub fn size_ctrl(&self) -> Option<&SizeSpec> {
        self.sizes.as_ref().map(|s| &s.ctrl)
    }

    pub fn size_daq(&self) -> Option<&SizeSpec> {
        self.sizes.as_ref().map(|s| &s.daq)
    }

    fn rejected(&self, op: &'static str, rejection: Rejection) -> SetupError {
        match rejection {
            Rejection::NotImplemented(what) => SetupError::NotImplemented {
                setup: self.label(),
                op,
                what,
            },
            Rejection::Invalid(what) => SetupError::Invalid {
                setup: self.label(),
                op,
                what,
            },
        }
    }

    fn sized(&self, op: &'static str) -> SetupResult<Sizes> {
        self.sizes.ok_or_else(|| SetupError::NotSized {
            setup: self.label(),
            op,
        })
    }

    /// Fixes the basic trial and output sizes and sizes every control.
    ///
    /// Each used kind must have exactly the geometry's arity. Kinds unused on
    /// the basic side are also unused on the actuator side.
    ///
    /// # Errors
    ///
    /// `ArityMismatch` for a wrong count, `NotImplemented`/`Invalid` for kind
    /// combinations the geometry cannot serve, and control errors from
    /// sizing the controls.
    pub fn set_size(&mut self, size_trial: &SizeSpec, size_output: &SizeSpec) -> SetupResult<()> {
        const OP: &str = "set_size";
        let arity = self.geometry.sizes();
        for (side, requested, fixed) in [
            ("trial", size_trial, &arity.trial),
            ("output", size_output, &arity.output),
        ] {
            for kind in requested.used_kinds() {
                if requested.get(kind) != fixed.get(kind) {
                    return Err(SetupError::ArityMismatch {
                        setup: self.label(),
                        side,
                        kind,
                        expected: fixed.get(kind),
                        found: requested.get(kind),
                    });
                }
            }
        }
        self.geometry
            .check_kinds(size_trial, size_output)
            .map_err(|r| self.rejected(OP, r))?;

        let label = self.label();
        for (side, size) in [
            (FactorSide::Trial, &arity.trial),
            (FactorSide::Output, &arity.output),
            (FactorSide::Ctrl, &arity.ctrl),
            (FactorSide::Daq, &arity.daq),
        ] {
            self.factors.check(side, size, &label)?;
        }

        let mut size_ctrl = SizeSpec::default();
        let mut size_daq = SizeSpec::default();
        for kind in size_trial.used_kinds() {
            size_ctrl.set(kind, arity.ctrl.get(kind));
        }
        for kind in size_output.used_kinds() {
            size_daq.set(kind, arity.daq.get(kind));
        }

        let parts = self.partition(&size_ctrl, &size_daq)?;
        for (control, (ctrl, daq)) in self.controls.iter_mut().zip(parts.iter()) {
            control.set_size(ctrl, daq)?;
        }

        self.sizes = Some(Sizes {
            trial: *size_trial,
            output: *size_output,
            ctrl: size_ctrl,
            daq: size_daq,
        });
        self.parts = parts;
        tracing::debug!(
            setup = %label,
            trial = %size_trial,
            output = %size_output,
            controls = self.controls.len(),
            "setup sized"
        );
        Ok(())
    }

    fn partition(
        &self,
        size_ctrl: &SizeSpec,
        size_daq: &SizeSpec,
    ) -> SetupResult<Vec<(SizeSpec, SizeSpec)>> {
        match self.controls.len() {
            0 => return Ok(Vec::new()),
            1 => return Ok(vec![(*size_ctrl, *size_daq)]),
            _ => {}
        }
        let mask = |declared: SizeSpec, used: &SizeSpec| {
            let mut out = SizeSpec::default();
            for kind in used.used_kinds() {
                out.set(kind, declared.get(kind));
            }
            out
        };
        let mut parts = Vec::with_capacity(self.controls.len());
        let mut sum_ctrl = SizeSpec::default();
        let mut sum_daq = SizeSpec::default();
        for control in &self.controls {
            let (Some(ctrl), Some(daq)) = control.point_sizes() else {
                return Err(SetupError::Invalid {
                    setup: self.label(),
                    op: "set_size",
                    what: format!(
                        "control '{}' needs control points to share a setup",
                        control.label()
                    ),
                });
            };
            let part = (mask(ctrl, size_ctrl), mask(daq, size_daq));
            sum_ctrl = sum_ctrl.add(&part.0);
            sum_daq = sum_daq.add(&part.1);
            parts.push(part);
        }
        if sum_ctrl != *size_ctrl || sum_daq != *size_daq {
            return Err(SetupError::Invalid {
                setup: self.label(),
                op: "set_size",
                what: format!(
                    "controls cover ctrl {sum_ctrl} / daq {sum_daq}, geometry needs ctrl {size_ctrl} / daq {size_daq}"
                ),
            });
        }
        Ok(parts)
    }

    /// Basic trial response to actuator commands, without sending them.
    ///
    /// Only kinds present in `trial` and used by the session are mapped.
    pub fn transform_trial(&self, trial: &Response) -> SetupResult<Response> {
        const OP: &str = "set_trial_response";
        let sizes = self.sized(OP)?;
        trial.check(&sizes.trial)?;

        let mut basic = Response::new();
        for kind in sizes.trial.used_kinds() {
            basic.set(kind, trial.get(kind).cloned());
        }
        self.factors.apply(FactorSide::Trial, &mut basic);
        let mut ctrl = self
            .geometry
            .transform_trial(&basic)
            .map_err(|r| self.rejected(OP, r))?;
        self.factors.apply(FactorSide::Ctrl, &mut ctrl);
        Ok(ctrl)
    }

    /// Actuator measurements to basic output.
    pub fn transform_daq(&self, daq: &Response) -> SetupResult<Response> {
        const OP: &str = "transf_daq_response";
        let sizes = self.sized(OP)?;
        daq.check(&sizes.daq)?;

        let mut daq = daq.clone();
        self.factors.apply(FactorSide::Daq, &mut daq);
        let mut output = self
            .geometry
            .transform_daq(&daq)
            .map_err(|r| self.rejected(OP, r))?;
        self.factors.apply(FactorSide::Output, &mut output);
        Ok(output)
    }

    /// Transforms a basic trial response and sends each control its share.
    pub fn set_trial_response(&mut self, trial: &Response) -> SetupResult<()> {
        let ctrl = self.transform_trial(trial)?;
        let mut offsets = [0_usize; ResponseKind::COUNT];
        for (control, (part, _)) in self.controls.iter_mut().zip(self.parts.iter()) {
            let mut share = Response::new();
            for (kind, values) in ctrl.iter() {
                let n = part.get(kind);
                if n == 0 {
                    continue;
                }
                let start = offsets[kind.index()];
                share.set(kind, Some(values.rows(start, n).into_owned()));
                offsets[kind.index()] += n;
            }
            control.set_trial_response(&share)?;
        }
        Ok(())
    }

    /// Collects every control's measurement and maps it to basic output.
    pub fn transf_daq_response(&mut self) -> SetupResult<Response> {
        let sizes = self.sized("transf_daq_response")?;

        let mut gathered: [Vec<f64>; ResponseKind::COUNT] = Default::default();
        for control in &mut self.controls {
            let daq = control.get_daq_response()?;
            for (kind, values) in daq.iter() {
                gathered[kind.index()].extend_from_slice(values.as_slice());
            }
        }
        let mut daq = Response::new();
        for kind in sizes.daq.used_kinds() {
            daq.set(
                kind,
                Some(DVector::from_vec(std::mem::take(&mut gathered[kind.index()]))),
            );
        }
        self.transform_daq(&daq)
    }

    /// Commits every control or none.
    ///
    /// Controls that have nothing to commit refuse before anything happens.
    /// If a commit fails part way, earlier commits are rolled back when all
    /// of them support it; otherwise the returned error is fatal.
    pub fn commit_state(&mut self) -> SetupResult<()> {
        let label = self.label();
        if let Some(idle) = self.controls.iter().find(|c| !c.ready_to_commit()) {
            return Err(SetupError::CommitRefused {
                setup: label,
                control: idle.label(),
            });
        }

        for i in 0..self.controls.len() {
            let Err(source) = self.controls[i].commit_state() else {
                continue;
            };
            let failed = self.controls[i].label();
            let done = &mut self.controls[..i];
            let rolled_back = done.iter().all(|c| c.supports_rollback())
                && done.iter_mut().all(|c| c.rollback_commit().is_ok());
            if rolled_back {
                tracing::warn!(setup = %label, control = %failed, "commit failed, earlier controls rolled back");
            } else {
                tracing::error!(setup = %label, control = %failed, "commit failed, controls partially committed");
            }
            return Err(SetupError::CommitFailed {
                setup: label,
                control: failed,
                rolled_back,
                source,
            });
        }
        Ok(())
    }
}
