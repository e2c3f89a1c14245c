//! Shared application service layer for hybridsim.
//!
//! Turns a validated project into live controls, setups and sites, and
//! runs them: serving one actor session or driving a site through a ramp.

pub mod build;
pub mod error;
pub mod project_service;
pub mod registry;
pub mod run_service;

pub use build::{
    build_control, build_control_point, build_delegate, build_local_site, build_setup,
    connect_remote_site, open_site,
};
pub use error::{AppError, AppResult};
pub use project_service::{SiteSummary, list_sites, load_project, save_project, validate_project};
pub use registry::SiteRegistry;
pub use run_service::{DemoOptions, DemoStep, actor_bind, run_demo, serve_actor, serve_on};
