//! Running sites: serving an actor session or driving a site by hand.

use std::net::TcpListener;

use hs_core::{DVector, Response, ResponseKind, SizeSpec};
use hs_project::schema::{Project, SiteKind};
use hs_site::{ActorSite, ChannelOptions, LocalSite, SessionState, Site};

use crate::build::build_local_site;
use crate::error::{AppError, AppResult};

/// Bind address of an actor site. `bind` overrides the project's.
pub fn actor_bind(project: &Project, id: &str, bind: Option<&str>) -> AppResult<String> {
    let def = project.site(id).ok_or_else(|| AppError::NotFound {
        what: "Site",
        id: id.to_string(),
    })?;
    match (&def.kind, bind) {
        (SiteKind::Actor { .. }, Some(bind)) => Ok(bind.to_string()),
        (SiteKind::Actor { bind, .. }, None) => Ok(bind.clone()),
        _ => Err(AppError::Unsupported {
            message: format!("site '{id}' is not an actor"),
        }),
    }
}

/// Serves exactly one session of an actor site.
pub fn serve_actor(project: &Project, id: &str, bind: Option<&str>) -> AppResult<SessionState> {
    let address = actor_bind(project, id, bind)?;
    let site = build_local_site(project, id)?;
    let listener = TcpListener::bind(&address)?;
    tracing::info!(site = %id, address = %listener.local_addr()?, "actor listening");
    serve_on(&listener, site)
}

/// Accepts one connection on `listener` and serves it until `die`.
pub fn serve_on(listener: &TcpListener, site: LocalSite) -> AppResult<SessionState> {
    let mut actor = ActorSite::accept(listener, site, &ChannelOptions::default())?;
    actor.serve()?;
    Ok(actor.session_state())
}

#[derive(Debug, Clone, PartialEq)]
pub struct DemoOptions {
    pub steps: usize,
    /// Peak value of the ramp.
    pub amplitude: f64,
    /// Entry of each trial vector that carries the ramp; the rest stay zero.
    pub dof: usize,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            steps: 10,
            amplitude: 0.01,
            dof: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DemoStep {
    pub step: usize,
    pub trial: Response,
    pub daq: Response,
}

/// Trial response of step `step` (1-based) of a linear ramp.
fn ramp_trial(size: &SizeSpec, options: &DemoOptions, step: usize) -> Response {
    let rate = options.amplitude / options.steps as f64;
    let value = rate * step as f64;
    let mut trial = Response::new();
    for kind in size.used_kinds() {
        let n = size.get(kind);
        let values = match kind {
            ResponseKind::Disp | ResponseKind::Force => {
                DVector::from_fn(n, |i, _| if i == options.dof { value } else { 0.0 })
            }
            ResponseKind::Vel => DVector::from_fn(n, |i, _| if i == options.dof { rate } else { 0.0 }),
            ResponseKind::Accel => DVector::zeros(n),
            ResponseKind::Time => DVector::from_element(n, step as f64),
        };
        trial.set(kind, Some(values));
    }
    trial
}

/// Configures `site` and runs a ramp through it, committing every step.
pub fn run_demo(
    site: &mut dyn Site,
    size_trial: &SizeSpec,
    size_daq: &SizeSpec,
    options: &DemoOptions,
) -> AppResult<Vec<DemoStep>> {
    if options.steps == 0 {
        return Err(AppError::InvalidInput("steps must be positive".to_string()));
    }
    if !options.amplitude.is_finite() {
        return Err(AppError::InvalidInput("amplitude must be finite".to_string()));
    }
    if let Some(kind) = size_trial
        .used_kinds()
        .find(|&k| k != ResponseKind::Time && options.dof >= size_trial.get(k))
    {
        return Err(AppError::InvalidInput(format!(
            "dof {} is outside the {} trial vector of size {}",
            options.dof,
            kind,
            size_trial.get(kind)
        )));
    }

    site.configure(size_trial, size_daq)?;
    let mut history = Vec::with_capacity(options.steps);
    for step in 1..=options.steps {
        let trial = ramp_trial(size_trial, options, step);
        site.set_trial_response(&trial)?;
        let daq = site.get_daq_response()?;
        site.commit_state()?;
        tracing::debug!(site = %site.label(), step, "step committed");
        history.push(DemoStep { step, trial, daq });
    }
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_controls::{ExperimentalControl, Loopback};
    use hs_core::Tag;

    fn loopback_site() -> LocalSite {
        let control = ExperimentalControl::new(Tag::new(1), Box::new(Loopback::new()));
        LocalSite::with_control(Tag::new(1), control)
    }

    #[test]
    fn ramp_reaches_amplitude() {
        let size = SizeSpec::default()
            .with(ResponseKind::Disp, 2)
            .with(ResponseKind::Vel, 2)
            .with(ResponseKind::Time, 1);
        let options = DemoOptions {
            steps: 4,
            amplitude: 2.0,
            dof: 1,
        };
        let trial = ramp_trial(&size, &options, 4);
        assert_eq!(trial.get(ResponseKind::Disp).unwrap().as_slice(), &[0.0, 2.0]);
        assert_eq!(trial.get(ResponseKind::Vel).unwrap().as_slice(), &[0.0, 0.5]);
        assert_eq!(trial.get(ResponseKind::Time).unwrap().as_slice(), &[4.0]);
        assert!(!trial.has(ResponseKind::Force));
    }

    #[test]
    fn loopback_demo_echoes_trial() {
        let size = SizeSpec::default().with(ResponseKind::Disp, 1);
        let mut site = loopback_site();
        let history = run_demo(&mut site, &size, &size, &DemoOptions::default()).unwrap();
        assert_eq!(history.len(), 10);
        for step in &history {
            assert_eq!(step.daq.get(ResponseKind::Disp), step.trial.get(ResponseKind::Disp));
        }
    }

    #[test]
    fn dof_outside_trial_is_refused() {
        let size = SizeSpec::default().with(ResponseKind::Disp, 1);
        let options = DemoOptions {
            dof: 3,
            ..DemoOptions::default()
        };
        let mut site = loopback_site();
        assert!(matches!(
            run_demo(&mut site, &size, &size, &options),
            Err(AppError::InvalidInput(_))
        ));
        assert!(site.size_trial().is_none());
    }
}
