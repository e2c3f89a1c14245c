//! Error types for the hs-app service layer.

use std::path::PathBuf;

use hs_core::SiteTag;

/// Errors from loading a project, building its objects and running them.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Project error: {0}")]
    Project(#[from] hs_project::ProjectError),

    #[error("Failed to read project file: {path}")]
    ProjectFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write project file: {path}")]
    ProjectFileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Project validation failed: {0}")]
    Validation(String),

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("Site tag {0} is already registered")]
    DuplicateSite(SiteTag),

    #[error("Unsupported: {message}")]
    Unsupported { message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Control(#[from] hs_controls::ControlError),

    #[error(transparent)]
    Setup(#[from] hs_setup::SetupError),

    #[error(transparent)]
    Site(#[from] hs_site::SiteError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for hs-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<hs_project::ValidationError> for AppError {
    fn from(err: hs_project::ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}
