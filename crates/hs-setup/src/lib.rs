//! Experimental setups: coordinate transforms between the structural
//! ("basic") degrees of freedom seen by the simulation and the actuator
//! channels of one or more experimental controls.
//!
//! A setup has a fixed arity per response kind on four sides: trial and
//! output (basic space), ctrl and daq (actuator space). The trial path is
//! `trial * t_factor -> geometry -> * c_factor -> controls`; the daq path is
//! `controls -> * d_factor -> inverse geometry -> * o_factor`.

pub mod error;
pub mod factors;
pub mod geometry;
pub mod inverted_vbrace;
mod linkage;
pub mod setup;
pub mod three_actuators;
pub mod two_actuators;

pub use error::{SetupError, SetupResult};
pub use factors::{FactorSide, Factors};
pub use geometry::{
    Geometry, GeometrySizes, GeometrySpec, NoTransformation, OneActuator, Rejection,
    TransformResult,
};
pub use inverted_vbrace::InvertedVBrace2d;
pub use setup::ExperimentalSetup;
pub use three_actuators::ThreeActuators2d;
pub use two_actuators::{ActuatorSide, TwoActuators2d};
