//! Geometric transforms between basic and actuator coordinates.

use std::collections::BTreeSet;

use hs_core::{DVector, Response, ResponseKind, SizeSpec};
use serde::{Deserialize, Serialize};

use crate::error::{SetupError, SetupResult};
use crate::inverted_vbrace::InvertedVBrace2d;
use crate::three_actuators::ThreeActuators2d;
use crate::two_actuators::{ActuatorSide, TwoActuators2d};

/// Fixed arity of a geometry on each of its four sides.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeometrySizes {
    pub trial: SizeSpec,
    pub output: SizeSpec,
    pub ctrl: SizeSpec,
    pub daq: SizeSpec,
}

impl GeometrySizes {
    /// `n` entries for disp/vel/accel/force on each side, one time entry.
    pub fn kinematic(trial: usize, output: usize, actuators: usize) -> Self {
        let side = |n| SizeSpec::new([n, n, n, n, 1]);
        Self {
            trial: side(trial),
            output: side(output),
            ctrl: side(actuators),
            daq: side(actuators),
        }
    }
}

/// Why a geometry refused a request; the setup adds its own label.
#[derive(Clone, Debug, PartialEq)]
pub enum Rejection {
    NotImplemented(String),
    Invalid(String),
}

pub type TransformResult<T> = Result<T, Rejection>;

/// One geometry: a fixed-arity map from basic to actuator space and back.
pub trait Geometry: Send + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn sizes(&self) -> GeometrySizes;

    /// Rejects combinations of used kinds the geometry cannot serve.
    ///
    /// `trial` and `output` hold the counts actually requested by the site
    /// (0 for unused kinds).
    fn check_kinds(&self, _trial: &SizeSpec, _output: &SizeSpec) -> TransformResult<()> {
        Ok(())
    }

    /// Basic trial response to actuator commands. Only kinds present in
    /// `trial` are produced.
    fn transform_trial(&self, trial: &Response) -> TransformResult<Response>;

    /// Actuator measurements to basic output. Only kinds present in `daq`
    /// are produced.
    fn transform_daq(&self, daq: &Response) -> TransformResult<Response>;
}

/// Picks selected basic DOFs as actuator channels; time passes through.
#[derive(Clone, Debug, PartialEq)]
pub struct NoTransformation {
    dofs: Vec<usize>,
    size_trial: usize,
    size_output: usize,
}

impl NoTransformation {
    /// # Errors
    ///
    /// Returns error if `dofs` is empty, repeats a DOF, or names a DOF
    /// outside the trial or output vectors.
    pub fn new(dofs: Vec<usize>, size_trial: usize, size_output: usize) -> SetupResult<Self> {
        if dofs.is_empty() {
            return Err(SetupError::InvalidArg {
                what: "at least one DOF is required",
            });
        }
        let unique: BTreeSet<_> = dofs.iter().collect();
        if unique.len() != dofs.len() {
            return Err(SetupError::InvalidArg {
                what: "DOFs must be distinct",
            });
        }
        if dofs.iter().any(|&d| d >= size_trial || d >= size_output) {
            return Err(SetupError::InvalidArg {
                what: "DOF exceeds trial or output size",
            });
        }
        Ok(Self {
            dofs,
            size_trial,
            size_output,
        })
    }

    pub fn dofs(&self) -> &[usize] {
        &self.dofs
    }
}

impl Geometry for NoTransformation {
    fn name(&self) -> &'static str {
        "no_transformation"
    }

    fn sizes(&self) -> GeometrySizes {
        GeometrySizes::kinematic(self.size_trial, self.size_output, self.dofs.len())
    }

    fn transform_trial(&self, trial: &Response) -> TransformResult<Response> {
        let mut ctrl = Response::new();
        for (kind, values) in trial.iter() {
            let out = match kind {
                ResponseKind::Time => values.clone(),
                _ => DVector::from_iterator(self.dofs.len(), self.dofs.iter().map(|&d| values[d])),
            };
            ctrl.set(kind, Some(out));
        }
        Ok(ctrl)
    }

    fn transform_daq(&self, daq: &Response) -> TransformResult<Response> {
        let mut output = Response::new();
        for (kind, values) in daq.iter() {
            let out = match kind {
                ResponseKind::Time => values.clone(),
                _ => {
                    let mut o = DVector::zeros(self.size_output);
                    for (i, &d) in self.dofs.iter().enumerate() {
                        o[d] = values[i];
                    }
                    o
                }
            };
            output.set(kind, Some(out));
        }
        Ok(output)
    }
}

/// One actuator along one basic direction.
#[derive(Clone, Debug, PartialEq)]
pub struct OneActuator {
    inner: NoTransformation,
}

impl OneActuator {
    pub fn new(direction: usize, size_trial: usize, size_output: usize) -> SetupResult<Self> {
        if direction >= size_trial || direction >= size_output {
            return Err(SetupError::InvalidArg {
                what: "direction exceeds trial or output size",
            });
        }
        Ok(Self {
            inner: NoTransformation::new(vec![direction], size_trial, size_output)?,
        })
    }

    pub fn direction(&self) -> usize {
        self.inner.dofs[0]
    }
}

impl Geometry for OneActuator {
    fn name(&self) -> &'static str {
        "one_actuator"
    }

    fn sizes(&self) -> GeometrySizes {
        self.inner.sizes()
    }

    fn transform_trial(&self, trial: &Response) -> TransformResult<Response> {
        self.inner.transform_trial(trial)
    }

    fn transform_daq(&self, daq: &Response) -> TransformResult<Response> {
        self.inner.transform_daq(daq)
    }
}

/// Serializable description of a geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeometrySpec {
    NoTransformation {
        dofs: Vec<usize>,
        size_trial: usize,
        size_output: usize,
    },
    OneActuator {
        direction: usize,
        size_trial: usize,
        size_output: usize,
    },
    TwoActuators2d {
        la0: f64,
        la1: f64,
        l: f64,
        #[serde(default)]
        nl_geom: bool,
        #[serde(default)]
        side: ActuatorSide,
        #[serde(default)]
        phi_loc_x: f64,
    },
    ThreeActuators2d {
        la: [f64; 3],
        l0: f64,
        l1: f64,
        #[serde(default)]
        nl_geom: bool,
        #[serde(default)]
        side: ActuatorSide,
        #[serde(default)]
        phi_loc_x: f64,
    },
    InvertedVBrace2d {
        la: [f64; 3],
        l0: f64,
        l1: f64,
        #[serde(default)]
        nl_geom: bool,
        #[serde(default)]
        side: ActuatorSide,
        #[serde(default)]
        phi_loc_x: f64,
    },
}

impl GeometrySpec {
    pub fn build(&self) -> SetupResult<Box<dyn Geometry>> {
        Ok(match self {
            GeometrySpec::NoTransformation {
                dofs,
                size_trial,
                size_output,
            } => Box::new(NoTransformation::new(dofs.clone(), *size_trial, *size_output)?),
            GeometrySpec::OneActuator {
                direction,
                size_trial,
                size_output,
            } => Box::new(OneActuator::new(*direction, *size_trial, *size_output)?),
            GeometrySpec::TwoActuators2d {
                la0,
                la1,
                l,
                nl_geom,
                side,
                phi_loc_x,
            } => Box::new(TwoActuators2d::new(
                *la0, *la1, *l, *nl_geom, *side, *phi_loc_x,
            )?),
            GeometrySpec::ThreeActuators2d {
                la,
                l0,
                l1,
                nl_geom,
                side,
                phi_loc_x,
            } => Box::new(ThreeActuators2d::new(
                *la, *l0, *l1, *nl_geom, *side, *phi_loc_x,
            )?),
            GeometrySpec::InvertedVBrace2d {
                la,
                l0,
                l1,
                nl_geom,
                side,
                phi_loc_x,
            } => Box::new(InvertedVBrace2d::new(
                *la, *l0, *l1, *nl_geom, *side, *phi_loc_x,
            )?),
        })
    }
}
