use hs_controls::{FilterSpec, MaterialLaw};
use hs_core::ResponseKind;
use hs_project::schema::*;
use hs_project::{ValidationError, validate_project};
use hs_setup::GeometrySpec;

fn signal(direction: usize, kind: ResponseKind) -> SignalDef {
    SignalDef {
        direction,
        kind,
        factor: 1.0,
        lower: None,
        upper: None,
    }
}

fn base_project() -> Project {
    Project {
        version: 1,
        name: "Validation".to_string(),
        control_points: vec![ControlPointDef {
            id: "cp1".to_string(),
            tag: 1,
            node: 3,
            ndf: 1,
            signals: vec![signal(0, ResponseKind::Disp)],
        }],
        controls: vec![ControlDef {
            id: "c1".to_string(),
            tag: 1,
            kind: ControlKind::SimUniaxialMaterials {
                materials: vec![MaterialLaw::Elastic { e: 100.0, eta: 0.0 }],
            },
            ctrl_points: vec!["cp1".to_string()],
            daq_points: vec!["cp1".to_string()],
            ctrl_filters: vec![],
            daq_filters: vec![],
        }],
        setups: vec![SetupDef {
            id: "s1".to_string(),
            tag: 1,
            geometry: GeometrySpec::OneActuator {
                direction: 0,
                size_trial: 1,
                size_output: 1,
            },
            controls: vec!["c1".to_string()],
            factors: vec![],
        }],
        sites: vec![SiteDef {
            id: "site1".to_string(),
            tag: 1,
            kind: SiteKind::Local {
                delegate: DelegateRef::Setup("s1".to_string()),
            },
            size_trial: SizeDef {
                disp: 1,
                ..SizeDef::default()
            },
            size_daq: SizeDef {
                disp: 1,
                ..SizeDef::default()
            },
        }],
    }
}

#[test]
fn base_project_is_valid() {
    validate_project(&base_project()).unwrap();
}

#[test]
fn unsupported_version_is_rejected() {
    let mut project = base_project();
    project.version = 7;
    assert!(matches!(
        validate_project(&project),
        Err(ValidationError::UnsupportedVersion { version: 7 })
    ));
}

#[test]
fn duplicate_tags_are_rejected() {
    let mut project = base_project();
    let mut second = project.controls[0].clone();
    second.id = "c2".to_string();
    project.controls.push(second);
    let err = validate_project(&project).unwrap_err();
    assert!(matches!(err, ValidationError::DuplicateId { .. }));
    assert!(err.to_string().contains("tag 1"));
}

#[test]
fn missing_control_point_is_reported() {
    let mut project = base_project();
    project.controls[0].daq_points = vec!["nope".to_string()];
    assert!(matches!(
        validate_project(&project),
        Err(ValidationError::MissingReference { id, .. }) if id == "nope"
    ));
}

#[test]
fn direction_beyond_node_is_invalid() {
    let mut project = base_project();
    project.control_points[0].signals[0].direction = 1;
    assert!(matches!(
        validate_project(&project),
        Err(ValidationError::InvalidValue { .. })
    ));
}

#[test]
fn half_given_limits_are_invalid() {
    let mut project = base_project();
    project.control_points[0].signals[0].lower = Some(-1.0);
    assert!(matches!(
        validate_project(&project),
        Err(ValidationError::InvalidValue { .. })
    ));
    project.control_points[0].signals[0].upper = Some(-2.0);
    assert!(validate_project(&project).is_err());
    project.control_points[0].signals[0].upper = Some(1.0);
    validate_project(&project).unwrap();
}

#[test]
fn bad_filter_is_invalid() {
    let mut project = base_project();
    project.controls[0].ctrl_filters.push(FilterSlotDef {
        kind: ResponseKind::Disp,
        filter: FilterSpec::RandomGauss {
            mean: 0.0,
            std_dev: -1.0,
            seed: 0,
        },
    });
    assert!(matches!(
        validate_project(&project),
        Err(ValidationError::InvalidValue { .. })
    ));
}

#[test]
fn control_cannot_have_two_owners() {
    let mut project = base_project();
    project.sites.push(SiteDef {
        id: "site2".to_string(),
        tag: 2,
        kind: SiteKind::Local {
            delegate: DelegateRef::Control("c1".to_string()),
        },
        size_trial: project.sites[0].size_trial,
        size_daq: project.sites[0].size_daq,
    });
    assert!(matches!(
        validate_project(&project),
        Err(ValidationError::Unsupported { .. })
    ));
}

#[test]
fn remote_setup_must_be_detached() {
    let mut project = base_project();
    project.sites[0].kind = SiteKind::Remote {
        address: "127.0.0.1:9000".to_string(),
        setup: Some("s1".to_string()),
        commit_guard: false,
        read_timeout_ms: None,
    };
    assert!(matches!(
        validate_project(&project),
        Err(ValidationError::InvalidValue { .. })
    ));

    project.setups[0].controls.clear();
    validate_project(&project).unwrap();
}

#[test]
fn actor_sites_need_no_sizes() {
    let mut project = base_project();
    project.sites[0].kind = SiteKind::Actor {
        delegate: DelegateRef::Setup("s1".to_string()),
        bind: "0.0.0.0:9000".to_string(),
    };
    project.sites[0].size_trial = SizeDef::default();
    project.sites[0].size_daq = SizeDef::default();
    validate_project(&project).unwrap();

    project.sites[0].kind = SiteKind::Local {
        delegate: DelegateRef::Setup("s1".to_string()),
    };
    assert!(validate_project(&project).is_err());
}
