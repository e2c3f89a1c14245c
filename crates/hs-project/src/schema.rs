//! Project schema definitions.

use hs_controls::{FilterSpec, MaterialLaw};
use hs_core::{ResponseKind, SizeSpec};
use hs_setup::{FactorSide, GeometrySpec};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub control_points: Vec<ControlPointDef>,
    #[serde(default)]
    pub controls: Vec<ControlDef>,
    #[serde(default)]
    pub setups: Vec<SetupDef>,
    #[serde(default)]
    pub sites: Vec<SiteDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlPointDef {
    pub id: String,
    pub tag: u32,
    pub node: u32,
    /// Degrees of freedom of the node.
    pub ndf: usize,
    pub signals: Vec<SignalDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalDef {
    pub direction: usize,
    pub kind: ResponseKind,
    #[serde(default = "unit_factor")]
    pub factor: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
}

fn unit_factor() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlDef {
    pub id: String,
    pub tag: u32,
    pub kind: ControlKind,
    #[serde(default)]
    pub ctrl_points: Vec<String>,
    #[serde(default)]
    pub daq_points: Vec<String>,
    #[serde(default)]
    pub ctrl_filters: Vec<FilterSlotDef>,
    #[serde(default)]
    pub daq_filters: Vec<FilterSlotDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ControlKind {
    Loopback,
    SimUniaxialMaterials { materials: Vec<MaterialLaw> },
}

/// A filter bound to the slot of one response kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterSlotDef {
    pub kind: ResponseKind,
    pub filter: FilterSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetupDef {
    pub id: String,
    pub tag: u32,
    pub geometry: GeometrySpec,
    /// Controls driven by the setup, in actuator order. Empty for a setup
    /// that runs on the simulation side of a remote site.
    #[serde(default)]
    pub controls: Vec<String>,
    #[serde(default)]
    pub factors: Vec<FactorDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactorDef {
    pub side: FactorSide,
    pub kind: ResponseKind,
    pub values: Vec<f64>,
}

/// For local and remote sites the sizes are what the simulation will ask
/// for. Actor sites learn their sizes from the handshake and ignore them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteDef {
    pub id: String,
    pub tag: u32,
    pub kind: SiteKind,
    #[serde(default)]
    pub size_trial: SizeDef,
    #[serde(default)]
    pub size_daq: SizeDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum SiteKind {
    Local {
        delegate: DelegateRef,
    },
    /// Serves a remote site from `bind`.
    Actor {
        delegate: DelegateRef,
        bind: String,
    },
    /// Connects to an actor at `address`; `setup` names a setup without
    /// controls that runs here.
    Remote {
        address: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        setup: Option<String>,
        #[serde(default)]
        commit_guard: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        read_timeout_ms: Option<u64>,
    },
}

/// `{ type: setup, id: frame }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum DelegateRef {
    Setup(String),
    Control(String),
}

/// Per-kind counts; omitted kinds are unused.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SizeDef {
    #[serde(default)]
    pub disp: usize,
    #[serde(default)]
    pub vel: usize,
    #[serde(default)]
    pub accel: usize,
    #[serde(default)]
    pub force: usize,
    #[serde(default)]
    pub time: usize,
}

impl SizeDef {
    pub fn to_spec(&self) -> SizeSpec {
        SizeSpec::new([self.disp, self.vel, self.accel, self.force, self.time])
    }
}

impl From<SizeSpec> for SizeDef {
    fn from(size: SizeSpec) -> Self {
        let [disp, vel, accel, force, time] = *size.counts();
        Self {
            disp,
            vel,
            accel,
            force,
            time,
        }
    }
}

impl Project {
    pub fn control_point(&self, id: &str) -> Option<&ControlPointDef> {
        self.control_points.iter().find(|c| c.id == id)
    }

    pub fn control(&self, id: &str) -> Option<&ControlDef> {
        self.controls.iter().find(|c| c.id == id)
    }

    pub fn setup(&self, id: &str) -> Option<&SetupDef> {
        self.setups.iter().find(|s| s.id == id)
    }

    pub fn site(&self, id: &str) -> Option<&SiteDef> {
        self.sites.iter().find(|s| s.id == id)
    }
}
