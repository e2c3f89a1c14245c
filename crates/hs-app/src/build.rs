//! Builds live objects from project definitions.
//!
//! Each builder consumes nothing from the project; it can be called again to
//! get a fresh object, which is how a site gets sole ownership of its
//! delegate.

use std::net::TcpStream;
use std::time::Duration;

use hs_controls::{
    ControlBackend, ControlPoint, ExperimentalControl, Loopback, SimUniaxialMaterials,
};
use hs_core::Tag;
use hs_project::schema::{ControlKind, ControlPointDef, DelegateRef, Project, SiteKind};
use hs_setup::{ExperimentalSetup, Factors};
use hs_site::{ChannelOptions, Delegate, LocalSite, RemoteSite, Site, TcpChannel};

use crate::error::{AppError, AppResult};

fn not_found(what: &'static str, id: &str) -> AppError {
    AppError::NotFound {
        what,
        id: id.to_string(),
    }
}

/// Signals without limits get an unbounded range when any sibling has one.
pub fn build_control_point(def: &ControlPointDef) -> AppResult<ControlPoint> {
    let cp = ControlPoint::new(
        Tag::new(def.tag),
        def.node,
        def.ndf,
        def.signals.iter().map(|s| s.direction).collect(),
        def.signals.iter().map(|s| s.kind).collect(),
        Some(def.signals.iter().map(|s| s.factor).collect()),
    )?;
    if def.signals.iter().all(|s| s.lower.is_none() && s.upper.is_none()) {
        return Ok(cp);
    }
    let lower = def
        .signals
        .iter()
        .map(|s| s.lower.unwrap_or(f64::NEG_INFINITY))
        .collect();
    let upper = def
        .signals
        .iter()
        .map(|s| s.upper.unwrap_or(f64::INFINITY))
        .collect();
    Ok(cp.with_limits(lower, upper)?)
}

fn build_points(project: &Project, ids: &[String]) -> AppResult<Vec<ControlPoint>> {
    ids.iter()
        .map(|id| {
            let def = project
                .control_point(id)
                .ok_or_else(|| not_found("Control point", id))?;
            build_control_point(def)
        })
        .collect()
}

pub fn build_control(project: &Project, id: &str) -> AppResult<ExperimentalControl> {
    let def = project.control(id).ok_or_else(|| not_found("Control", id))?;
    let backend: Box<dyn ControlBackend> = match &def.kind {
        ControlKind::Loopback => Box::new(Loopback::new()),
        ControlKind::SimUniaxialMaterials { materials } => {
            Box::new(SimUniaxialMaterials::new(materials.clone())?)
        }
    };
    let mut control = ExperimentalControl::new(Tag::new(def.tag), backend)
        .with_ctrl_points(build_points(project, &def.ctrl_points)?)
        .with_daq_points(build_points(project, &def.daq_points)?);
    for slot in &def.ctrl_filters {
        control = control.with_ctrl_filter(slot.kind, slot.filter.build()?);
    }
    for slot in &def.daq_filters {
        control = control.with_daq_filter(slot.kind, slot.filter.build()?);
    }
    tracing::debug!(control = %control.label(), "control built");
    Ok(control)
}

/// A setup without controls comes back detached.
pub fn build_setup(project: &Project, id: &str) -> AppResult<ExperimentalSetup> {
    let def = project.setup(id).ok_or_else(|| not_found("Setup", id))?;
    let geometry = def.geometry.build()?;
    let controls = def
        .controls
        .iter()
        .map(|c| build_control(project, c))
        .collect::<AppResult<Vec<_>>>()?;
    let setup = if controls.is_empty() {
        ExperimentalSetup::detached(Tag::new(def.tag), geometry)
    } else {
        ExperimentalSetup::new(Tag::new(def.tag), geometry, controls)?
    };

    let mut factors = Factors::new();
    for f in &def.factors {
        factors.set(f.side, f.kind, f.values.clone())?;
    }
    Ok(setup.with_factors(factors))
}

pub fn build_delegate(project: &Project, delegate: &DelegateRef) -> AppResult<Delegate> {
    Ok(match delegate {
        DelegateRef::Setup(id) => Delegate::Setup(build_setup(project, id)?),
        DelegateRef::Control(id) => Delegate::Control(build_control(project, id)?),
    })
}

/// Builds the in-process site of a local or actor definition.
pub fn build_local_site(project: &Project, id: &str) -> AppResult<LocalSite> {
    let def = project.site(id).ok_or_else(|| not_found("Site", id))?;
    match &def.kind {
        SiteKind::Local { delegate } | SiteKind::Actor { delegate, .. } => Ok(LocalSite::new(
            Tag::new(def.tag),
            build_delegate(project, delegate)?,
        )),
        SiteKind::Remote { .. } => Err(AppError::Unsupported {
            message: format!("site '{id}' is remote and has no local delegate"),
        }),
    }
}

/// Connects a remote site to its actor. `address` overrides the project's.
pub fn connect_remote_site(
    project: &Project,
    id: &str,
    address: Option<&str>,
) -> AppResult<RemoteSite<TcpStream>> {
    let def = project.site(id).ok_or_else(|| not_found("Site", id))?;
    let SiteKind::Remote {
        address: configured,
        setup,
        commit_guard,
        read_timeout_ms,
    } = &def.kind
    else {
        return Err(AppError::Unsupported {
            message: format!("site '{id}' is not remote"),
        });
    };
    let options = ChannelOptions {
        read_timeout: read_timeout_ms.map(Duration::from_millis),
        ..ChannelOptions::default()
    };
    let address = address.unwrap_or(configured.as_str());
    let channel = TcpChannel::connect(address, &options)?;
    tracing::info!(site = %id, %address, "connected to actor");

    let mut site = RemoteSite::new(Tag::new(def.tag), channel).with_commit_guard(*commit_guard);
    if let Some(setup) = setup {
        site = site.with_setup(build_setup(project, setup)?);
    }
    Ok(site)
}

/// Any site a simulation can drive directly. Actor sites are served, not
/// driven, and are refused here.
pub fn open_site(project: &Project, id: &str, address: Option<&str>) -> AppResult<Box<dyn Site>> {
    let def = project.site(id).ok_or_else(|| not_found("Site", id))?;
    Ok(match &def.kind {
        SiteKind::Local { .. } => Box::new(build_local_site(project, id)?),
        SiteKind::Remote { .. } => Box::new(connect_remote_site(project, id, address)?),
        SiteKind::Actor { .. } => {
            return Err(AppError::Unsupported {
                message: format!("site '{id}' is an actor; serve it instead"),
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_core::ResponseKind;
    use hs_project::schema::SignalDef;

    fn cp(signals: Vec<SignalDef>) -> ControlPointDef {
        ControlPointDef {
            id: "cp".to_string(),
            tag: 1,
            node: 1,
            ndf: 2,
            signals,
        }
    }

    fn signal(direction: usize, lower: Option<f64>, upper: Option<f64>) -> SignalDef {
        SignalDef {
            direction,
            kind: ResponseKind::Disp,
            factor: 1.0,
            lower,
            upper,
        }
    }

    #[test]
    fn unlimited_point_has_no_limits() {
        let point = build_control_point(&cp(vec![signal(0, None, None)])).unwrap();
        assert_eq!(point.limits(0), None);
    }

    #[test]
    fn partial_limits_are_widened() {
        let point = build_control_point(&cp(vec![
            signal(0, Some(-1.0), Some(1.0)),
            signal(1, None, None),
        ]))
        .unwrap();
        assert_eq!(point.limits(0), Some((-1.0, 1.0)));
        assert_eq!(point.limits(1), Some((f64::NEG_INFINITY, f64::INFINITY)));
    }

    #[test]
    fn missing_objects_are_named() {
        let project = Project {
            version: 1,
            name: "empty".to_string(),
            control_points: vec![],
            controls: vec![],
            setups: vec![],
            sites: vec![],
        };
        let err = build_control(&project, "ghost").unwrap_err();
        assert_eq!(err.to_string(), "Control not found: ghost");
        assert!(matches!(
            open_site(&project, "nowhere", None),
            Err(AppError::NotFound { what: "Site", .. })
        ));
    }
}
