use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::thread;

use hs_app::{
    AppError, DemoOptions, SiteRegistry, build_local_site, connect_remote_site, list_sites,
    load_project, open_site, run_demo, serve_on,
};
use hs_core::ResponseKind;
use hs_site::{SessionState, Site};

fn demo(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos")
        .join(name)
}

#[test]
fn frame_demo_tracks_the_ramp() {
    let project = load_project(&demo("frame_local.yaml")).expect("Failed to load project");
    let def = project.site("local").unwrap();
    let (size_trial, size_daq) = (def.size_trial.to_spec(), def.size_daq.to_spec());

    let mut registry = SiteRegistry::new();
    let tag = registry
        .insert("local", open_site(&project, "local", None).unwrap())
        .unwrap();
    let site = registry.get_mut(tag).unwrap();

    let options = DemoOptions {
        steps: 5,
        amplitude: 0.05,
        dof: 0,
    };
    let history = run_demo(site.as_mut(), &size_trial, &size_daq, &options).unwrap();
    assert_eq!(history.len(), 5);

    let last = history.last().unwrap();
    let disp = last.daq.get(ResponseKind::Disp).unwrap();
    assert!((disp[0] - 0.05).abs() < 1e-9, "disp {disp}");
    assert!(disp[1].abs() < 1e-9 && disp[2].abs() < 1e-9, "disp {disp}");
    assert_eq!(last.daq.get(ResponseKind::Force).unwrap().len(), 3);

    registry.close_all().unwrap();
}

#[test]
fn frame_demo_stops_at_actuator_limits() {
    let project = load_project(&demo("frame_local.yaml")).unwrap();
    let def = project.site("local").unwrap();
    let mut site = open_site(&project, "local", None).unwrap();
    let options = DemoOptions {
        steps: 2,
        amplitude: 0.5,
        dof: 0,
    };
    let result = run_demo(
        site.as_mut(),
        &def.size_trial.to_spec(),
        &def.size_daq.to_spec(),
        &options,
    );
    assert!(matches!(result, Err(AppError::Site(_))), "{result:?}");
}

#[test]
fn shadow_pair_runs_over_tcp() {
    let project = load_project(&demo("shadow_pair.yaml")).unwrap();
    let summaries = list_sites(&project);
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].kind, "actor");
    assert_eq!(summaries[1].kind, "remote");

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let lab = build_local_site(&project, "lab").unwrap();
    let actor = thread::spawn(move || serve_on(&listener, lab));

    let def = project.site("sim").unwrap();
    let mut sim = connect_remote_site(&project, "sim", Some(&address)).unwrap();
    let options = DemoOptions {
        steps: 4,
        amplitude: 0.02,
        dof: 0,
    };
    let history = run_demo(
        &mut sim,
        &def.size_trial.to_spec(),
        &def.size_daq.to_spec(),
        &options,
    )
    .unwrap();
    for step in &history {
        let trial = step.trial.get(ResponseKind::Disp).unwrap();
        let daq = step.daq.get(ResponseKind::Disp).unwrap();
        // the actuator undershoots each move by a fixed amount
        assert!((daq[0] - trial[0]).abs() < 2e-4, "step {}", step.step);
    }
    sim.close().unwrap();

    assert_eq!(actor.join().unwrap().unwrap(), SessionState::Terminated);
}

#[test]
fn actor_sites_cannot_be_driven() {
    let project = load_project(&demo("shadow_pair.yaml")).unwrap();
    assert!(matches!(
        open_site(&project, "lab", None),
        Err(AppError::Unsupported { .. })
    ));
    assert!(matches!(
        build_local_site(&project, "sim"),
        Err(AppError::Unsupported { .. })
    ));
}

#[test]
fn missing_file_names_the_path() {
    let path = demo("does_not_exist.yaml");
    match load_project(&path) {
        Err(AppError::ProjectFileRead { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected a read error, got {other:?}"),
    }
}
