//! Project validation logic.

use std::collections::{HashMap, HashSet};

use hs_controls::ControlPoint;
use hs_core::Tag;

use crate::schema::{
    ControlDef, ControlKind, ControlPointDef, DelegateRef, Project, SetupDef, SiteDef, SiteKind,
};

pub const LATEST_VERSION: u32 = 1;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported feature: {feature} - {reason}")]
    Unsupported { feature: String, reason: String },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

fn invalid(field: String, value: impl ToString, reason: impl ToString) -> ValidationError {
    ValidationError::InvalidValue {
        field,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Checks ids and tags for uniqueness within one collection.
fn unique<'a>(
    context: &str,
    items: impl Iterator<Item = (&'a String, u32)>,
) -> Result<HashSet<&'a String>, ValidationError> {
    let mut ids = HashSet::new();
    let mut tags = HashSet::new();
    for (id, tag) in items {
        if !ids.insert(id) {
            return Err(ValidationError::DuplicateId {
                id: id.clone(),
                context: context.to_string(),
            });
        }
        if !tags.insert(tag) {
            return Err(ValidationError::DuplicateId {
                id: format!("tag {tag}"),
                context: context.to_string(),
            });
        }
    }
    Ok(ids)
}

pub fn validate_project(project: &Project) -> Result<(), ValidationError> {
    if project.version == 0 || project.version > LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: project.version,
        });
    }

    let point_ids = unique(
        "control_points",
        project.control_points.iter().map(|c| (&c.id, c.tag)),
    )?;
    for cp in &project.control_points {
        validate_control_point(cp)?;
    }

    let control_ids = unique("controls", project.controls.iter().map(|c| (&c.id, c.tag)))?;
    for control in &project.controls {
        validate_control(control, &point_ids)?;
    }

    let setup_ids = unique("setups", project.setups.iter().map(|s| (&s.id, s.tag)))?;
    // a control belongs to at most one owner
    let mut owners: HashMap<&String, String> = HashMap::new();
    for setup in &project.setups {
        validate_setup(setup, &control_ids)?;
        for control in &setup.controls {
            claim(&mut owners, control, format!("setup '{}'", setup.id))?;
        }
    }

    unique("sites", project.sites.iter().map(|s| (&s.id, s.tag)))?;
    for site in &project.sites {
        validate_site(project, site, &control_ids, &setup_ids)?;
        match &site.kind {
            SiteKind::Local { delegate } | SiteKind::Actor { delegate, .. } => {
                let id = match delegate {
                    DelegateRef::Setup(id) | DelegateRef::Control(id) => id,
                };
                claim(&mut owners, id, format!("site '{}'", site.id))?;
            }
            SiteKind::Remote {
                setup: Some(id), ..
            } => claim(&mut owners, id, format!("site '{}'", site.id))?,
            SiteKind::Remote { .. } => {}
        }
    }

    Ok(())
}

fn claim<'a>(
    owners: &mut HashMap<&'a String, String>,
    id: &'a String,
    owner: String,
) -> Result<(), ValidationError> {
    if let Some(previous) = owners.insert(id, owner.clone()) {
        return Err(ValidationError::Unsupported {
            feature: format!("shared '{id}'"),
            reason: format!("owned by both {previous} and {owner}"),
        });
    }
    Ok(())
}

fn validate_control_point(cp: &ControlPointDef) -> Result<(), ValidationError> {
    let field = |name: &str| format!("control_point '{}' {name}", cp.id);
    if cp.signals.is_empty() {
        return Err(invalid(field("signals"), "[]", "at least one signal is required"));
    }
    let result = ControlPoint::new(
        Tag::new(cp.tag),
        cp.node,
        cp.ndf,
        cp.signals.iter().map(|s| s.direction).collect(),
        cp.signals.iter().map(|s| s.kind).collect(),
        Some(cp.signals.iter().map(|s| s.factor).collect()),
    );
    if let Err(e) = result {
        return Err(invalid(field("signals"), cp.signals.len(), e));
    }
    for (i, s) in cp.signals.iter().enumerate() {
        match (s.lower, s.upper) {
            (None, None) => {}
            (Some(lo), Some(hi)) if lo <= hi => {}
            (lo, hi) => {
                return Err(invalid(
                    field(&format!("signals[{i}] limits")),
                    format!("{lo:?}..{hi:?}"),
                    "lower and upper must both be given with lower <= upper",
                ));
            }
        }
    }
    Ok(())
}

fn validate_control(
    control: &ControlDef,
    point_ids: &HashSet<&String>,
) -> Result<(), ValidationError> {
    let field = |name: &str| format!("control '{}' {name}", control.id);
    for id in control.ctrl_points.iter().chain(control.daq_points.iter()) {
        if !point_ids.contains(id) {
            return Err(ValidationError::MissingReference {
                id: id.clone(),
                context: field("control points"),
            });
        }
    }

    if let ControlKind::SimUniaxialMaterials { materials } = &control.kind {
        if materials.is_empty() {
            return Err(invalid(field("materials"), "[]", "at least one material is required"));
        }
        for (i, m) in materials.iter().enumerate() {
            m.validate()
                .map_err(|e| invalid(field(&format!("materials[{i}]")), format!("{m:?}"), e))?;
        }
    }

    for (side, slots) in [("ctrl_filters", &control.ctrl_filters), ("daq_filters", &control.daq_filters)] {
        let mut kinds = HashSet::new();
        for slot in slots {
            if !kinds.insert(slot.kind) {
                return Err(ValidationError::DuplicateId {
                    id: slot.kind.to_string(),
                    context: field(side),
                });
            }
            slot.filter
                .build()
                .map_err(|e| invalid(field(side), slot.kind, e))?;
        }
    }
    Ok(())
}

fn validate_setup(setup: &SetupDef, control_ids: &HashSet<&String>) -> Result<(), ValidationError> {
    let field = |name: &str| format!("setup '{}' {name}", setup.id);
    setup
        .geometry
        .build()
        .map_err(|e| invalid(field("geometry"), format!("{:?}", setup.geometry), e))?;
    let mut seen = HashSet::new();
    for id in &setup.controls {
        if !control_ids.contains(id) {
            return Err(ValidationError::MissingReference {
                id: id.clone(),
                context: field("controls"),
            });
        }
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateId {
                id: id.clone(),
                context: field("controls"),
            });
        }
    }
    for f in &setup.factors {
        if f.values.iter().any(|v| !v.is_finite()) {
            return Err(invalid(
                field("factors"),
                format!("{:?}", f.values),
                "factors must be finite",
            ));
        }
    }
    Ok(())
}

fn validate_site(
    project: &Project,
    site: &SiteDef,
    control_ids: &HashSet<&String>,
    setup_ids: &HashSet<&String>,
) -> Result<(), ValidationError> {
    let field = |name: &str| format!("site '{}' {name}", site.id);
    let needs_sizes = !matches!(site.kind, SiteKind::Actor { .. });
    if needs_sizes && site.size_trial.to_spec().is_empty() {
        return Err(invalid(field("size_trial"), "0", "a site must exchange something"));
    }

    let check_delegate = |delegate: &DelegateRef| -> Result<(), ValidationError> {
        let (id, known, what) = match delegate {
            DelegateRef::Setup(id) => (id, setup_ids, "delegate setup"),
            DelegateRef::Control(id) => (id, control_ids, "delegate control"),
        };
        if !known.contains(id) {
            return Err(ValidationError::MissingReference {
                id: id.clone(),
                context: field(what),
            });
        }
        if let DelegateRef::Setup(id) = delegate {
            if project.setup(id).is_some_and(|s| s.controls.is_empty()) {
                return Err(invalid(
                    field("delegate setup"),
                    id,
                    "a local or actor setup needs controls",
                ));
            }
        }
        Ok(())
    };

    match &site.kind {
        SiteKind::Local { delegate } => check_delegate(delegate)?,
        SiteKind::Actor { delegate, bind } => {
            check_delegate(delegate)?;
            if bind.trim().is_empty() {
                return Err(invalid(field("bind"), "\"\"", "bind address is required"));
            }
        }
        SiteKind::Remote {
            address,
            setup,
            read_timeout_ms,
            ..
        } => {
            if address.trim().is_empty() {
                return Err(invalid(field("address"), "\"\"", "actor address is required"));
            }
            if let Some(id) = setup {
                match project.setup(id) {
                    None => {
                        return Err(ValidationError::MissingReference {
                            id: id.clone(),
                            context: field("setup"),
                        });
                    }
                    Some(s) if !s.controls.is_empty() => {
                        return Err(invalid(
                            field("setup"),
                            id,
                            "a remote site's setup cannot own controls",
                        ));
                    }
                    Some(_) => {}
                }
            }
            if *read_timeout_ms == Some(0) {
                return Err(invalid(field("read_timeout_ms"), 0, "timeout must be positive"));
            }
        }
    }
    Ok(())
}
