//! Project loading, saving, validation, and introspection.

use std::path::Path;

use hs_core::SizeSpec;
use hs_project::schema::{DelegateRef, Project, SiteKind};

use crate::error::{AppError, AppResult};

/// Summary of a site for listing.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteSummary {
    pub id: String,
    pub tag: u32,
    pub kind: &'static str,
    /// Delegate for local and actor sites, address for remote ones.
    pub target: String,
    pub size_trial: SizeSpec,
    pub size_daq: SizeSpec,
}

/// Load and validate a project from a YAML file.
pub fn load_project(path: &Path) -> AppResult<Project> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::ProjectFileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(hs_project::from_yaml_str(&content)?)
}

/// Save project to a YAML file.
pub fn save_project(path: &Path, project: &Project) -> AppResult<()> {
    validate_project(project)?;
    let content = serde_yaml::to_string(project)
        .map_err(|e| AppError::Project(hs_project::ProjectError::Yaml(e)))?;
    std::fs::write(path, content).map_err(|e| AppError::ProjectFileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

pub fn validate_project(project: &Project) -> AppResult<()> {
    hs_project::validate_project(project)?;
    Ok(())
}

/// List all sites in the project with summaries.
pub fn list_sites(project: &Project) -> Vec<SiteSummary> {
    project
        .sites
        .iter()
        .map(|site| {
            let delegate = |d: &DelegateRef| match d {
                DelegateRef::Setup(id) => format!("setup {id}"),
                DelegateRef::Control(id) => format!("control {id}"),
            };
            let (kind, target) = match &site.kind {
                SiteKind::Local { delegate: d } => ("local", delegate(d)),
                SiteKind::Actor { delegate: d, bind } => ("actor", format!("{} on {bind}", delegate(d))),
                SiteKind::Remote { address, .. } => ("remote", address.clone()),
            };
            SiteSummary {
                id: site.id.clone(),
                tag: site.tag,
                kind,
                target,
                size_trial: site.size_trial.to_spec(),
                size_daq: site.size_daq.to_spec(),
            }
        })
        .collect()
}
