//! hs-core: shared vocabulary for hybridsim.
//!
//! Contains:
//! - kind (the five response kinds and their canonical wire order)
//! - size (per-kind element counts negotiated once per session)
//! - response (per-kind optional sub-vectors and flat buffer packing)
//! - ids (externally assigned object tags)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod kind;
pub mod response;
pub mod size;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use kind::*;
pub use response::*;
pub use size::*;

pub use nalgebra::{DMatrix, DVector};
