//! Experimental controls for hybrid simulation.
//!
//! An experimental control drives one specimen, physical or simulated, in its
//! own actuator coordinates. The simulation side hands it a control vector
//! per response kind and reads back the acquired (daq) vector per kind.
//!
//! # Architecture
//!
//! - [`ExperimentalControl`] owns sizing, control points, signal filters and
//!   the commit bookkeeping shared by every specimen
//! - [`ControlBackend`] is the specimen-specific part: it receives filtered
//!   commands and produces raw measurements
//! - [`Filter`] slots, one per response kind on each side, distort or convert
//!   signals right before they reach the backend and right after they leave it
//! - [`ControlPoint`]s describe which node directions a control addresses and
//!   fix the sizes, scale factors and limits of its channels
//!
//! # Design Principles
//!
//! - **Explicit absence**: a missing sub-vector means "no value this step"
//! - **Hard sizing**: every vector is checked against the sizes set once
//! - **Rollback where possible**: backends that can undo a commit say so, so
//!   that a setup owning several controls can commit all-or-none

pub mod control;
pub mod control_point;
pub mod error;
pub mod filter;
pub mod force;
pub mod loopback;
pub mod material;
pub mod sim_materials;

pub use control::{ControlBackend, ExperimentalControl};
pub use control_point::ControlPoint;
pub use error::{ControlError, ControlResult};
pub use filter::{Filter, FilterSpec, RandomGauss, Undershoot};
pub use force::{KrylovForceConverter, TangentForceConverter};
pub use loopback::Loopback;
pub use material::{MaterialLaw, MaterialState, SimMaterial};
pub use sim_materials::SimUniaxialMaterials;
