//! In-process site.

use hs_controls::ExperimentalControl;
use hs_core::{DVector, Response, ResponseKind, SiteTag, SizeSpec};
use hs_setup::ExperimentalSetup;

use crate::error::{SiteError, SiteResult};
use crate::site::{Buffers, Site};

/// What a site drives: a setup in basic coordinates, or a bare control
/// whose actuator space is the basic space.
#[derive(Debug)]
pub enum Delegate {
    Setup(ExperimentalSetup),
    Control(ExperimentalControl),
}

impl Delegate {
    fn set_size(&mut self, size_trial: &SizeSpec, size_daq: &SizeSpec) -> SiteResult<()> {
        match self {
            Delegate::Setup(s) => s.set_size(size_trial, size_daq)?,
            Delegate::Control(c) => c.set_size(size_trial, size_daq)?,
        }
        Ok(())
    }

    fn set_trial_response(&mut self, trial: &Response) -> SiteResult<()> {
        match self {
            Delegate::Setup(s) => s.set_trial_response(trial)?,
            Delegate::Control(c) => c.set_trial_response(trial)?,
        }
        Ok(())
    }

    fn daq_response(&mut self) -> SiteResult<Response> {
        Ok(match self {
            Delegate::Setup(s) => s.transf_daq_response()?,
            Delegate::Control(c) => c.get_daq_response()?,
        })
    }

    fn commit_state(&mut self) -> SiteResult<()> {
        match self {
            Delegate::Setup(s) => s.commit_state()?,
            Delegate::Control(c) => c.commit_state()?,
        }
        Ok(())
    }

    pub fn label(&self) -> String {
        match self {
            Delegate::Setup(s) => s.label(),
            Delegate::Control(c) => c.label(),
        }
    }
}

#[derive(Debug)]
pub struct LocalSite {
    tag: SiteTag,
    delegate: Delegate,
    buffers: Buffers,
}

impl LocalSite {
    pub fn new(tag: SiteTag, delegate: Delegate) -> Self {
        Self {
            tag,
            delegate,
            buffers: Buffers::default(),
        }
    }

    pub fn with_setup(tag: SiteTag, setup: ExperimentalSetup) -> Self {
        Self::new(tag, Delegate::Setup(setup))
    }

    pub fn with_control(tag: SiteTag, control: ExperimentalControl) -> Self {
        Self::new(tag, Delegate::Control(control))
    }

    pub fn delegate(&self) -> &Delegate {
        &self.delegate
    }

    pub fn is_configured(&self) -> bool {
        self.buffers.is_configured()
    }

    /// Last trial response, restricted to the used kinds.
    pub fn trial(&self) -> &Response {
        self.buffers.trial()
    }

    fn refresh_daq(&mut self, op: &'static str) -> SiteResult<()> {
        if !self.buffers.daq_fresh() {
            let daq = self.delegate.daq_response()?;
            let label = self.label();
            self.buffers.store_daq(&label, op, daq)?;
        }
        Ok(())
    }
}

impl Site for LocalSite {
    fn tag(&self) -> SiteTag {
        self.tag
    }

    fn label(&self) -> String {
        format!("local#{}", self.tag)
    }

    fn size_trial(&self) -> Option<&SizeSpec> {
        self.buffers.size_trial()
    }

    fn size_daq(&self) -> Option<&SizeSpec> {
        self.buffers.size_daq()
    }

    fn configure(&mut self, size_trial: &SizeSpec, size_daq: &SizeSpec) -> SiteResult<()> {
        let label = self.label();
        if self.buffers.is_configured() {
            return Err(SiteError::AlreadyConfigured { site: label });
        }
        self.delegate.set_size(size_trial, size_daq)?;
        self.buffers.configure(&label, size_trial, size_daq)?;
        tracing::info!(
            site = %label,
            delegate = %self.delegate.label(),
            trial = %size_trial,
            daq = %size_daq,
            "site configured"
        );
        Ok(())
    }

    fn set_trial_response(&mut self, trial: &Response) -> SiteResult<()> {
        let label = self.label();
        let kept = self.buffers.store_trial(&label, trial)?;
        self.delegate.set_trial_response(kept)?;
        Ok(())
    }

    fn get_daq_response(&mut self) -> SiteResult<Response> {
        const OP: &str = "get_daq_response";
        self.buffers.sizes(&self.label(), OP)?;
        self.refresh_daq(OP)?;
        Ok(self.buffers.daq().clone())
    }

    fn get_daq_kind(&mut self, kind: ResponseKind) -> SiteResult<DVector<f64>> {
        const OP: &str = "get_daq_kind";
        self.buffers.require_kind(&self.label(), OP, kind)?;
        self.refresh_daq(OP)?;
        Ok(self.buffers.response(&self.label(), kind)?.clone())
    }

    fn commit_state(&mut self) -> SiteResult<()> {
        self.buffers.sizes(&self.label(), "commit_state")?;
        self.delegate.commit_state()
    }

    fn get_response(&self, kind: ResponseKind) -> SiteResult<&DVector<f64>> {
        self.buffers.response(&self.label(), kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_controls::Loopback;
    use hs_core::Tag;
    use hs_setup::NoTransformation;

    fn site_with_setup() -> LocalSite {
        let control = ExperimentalControl::new(Tag::new(1), Box::new(Loopback::new()));
        let geometry = NoTransformation::new(vec![0, 1], 2, 2).unwrap();
        let setup = ExperimentalSetup::new(Tag::new(1), Box::new(geometry), vec![control]).unwrap();
        LocalSite::with_setup(Tag::new(3), setup)
    }

    fn sizes() -> (SizeSpec, SizeSpec) {
        let t = SizeSpec::default()
            .with(ResponseKind::Disp, 2)
            .with(ResponseKind::Vel, 2);
        (t, t)
    }

    #[test]
    fn operations_before_configure_fail() {
        let mut site = site_with_setup();
        let trial = Response::new().with(ResponseKind::Disp, DVector::zeros(2));
        assert!(matches!(
            site.set_trial_response(&trial),
            Err(SiteError::NotConfigured { .. })
        ));
        assert!(matches!(
            site.get_daq_response(),
            Err(SiteError::NotConfigured { .. })
        ));
        assert!(matches!(
            site.commit_state(),
            Err(SiteError::NotConfigured { .. })
        ));
    }

    #[test]
    fn second_configure_fails() {
        let mut site = site_with_setup();
        let (t, d) = sizes();
        site.configure(&t, &d).unwrap();
        assert!(matches!(
            site.configure(&t, &d),
            Err(SiteError::AlreadyConfigured { .. })
        ));
    }

    #[test]
    fn pass_through_returns_trial() {
        let mut site = site_with_setup();
        let (t, d) = sizes();
        site.configure(&t, &d).unwrap();
        site.set_trial_parts(
            Some(DVector::from_vec(vec![0.1, 0.2])),
            Some(DVector::from_vec(vec![1.0, 2.0])),
            None,
            None,
            None,
        )
        .unwrap();
        let daq = site.get_daq_response().unwrap();
        assert_eq!(daq.get(ResponseKind::Disp).unwrap().as_slice(), &[0.1, 0.2]);
        assert_eq!(daq.get(ResponseKind::Vel).unwrap().as_slice(), &[1.0, 2.0]);
        assert_eq!(site.get_daq_response().unwrap(), daq);
        site.commit_state().unwrap();
    }

    #[test]
    fn zero_count_kind_fails_right_after_configure() {
        let mut site = site_with_setup();
        let (t, d) = sizes();
        site.configure(&t, &d).unwrap();
        assert!(matches!(
            site.get_daq_kind(ResponseKind::Force),
            Err(SiteError::NoSuchKind { .. })
        ));
        assert!(matches!(
            site.get_response(ResponseKind::Time),
            Err(SiteError::NoSuchKind { .. })
        ));
    }

    #[test]
    fn bare_control_site() {
        let control = ExperimentalControl::new(Tag::new(2), Box::new(Loopback::new()));
        let mut site = LocalSite::with_control(Tag::new(4), control);
        let size = SizeSpec::default().with(ResponseKind::Force, 1);
        site.configure(&size, &size).unwrap();
        site.set_trial_response(&Response::new().with(ResponseKind::Force, DVector::from_vec(vec![5.0])))
            .unwrap();
        assert_eq!(site.get_daq_kind(ResponseKind::Force).unwrap().as_slice(), &[5.0]);
        assert_eq!(site.get_response(ResponseKind::Force).unwrap().as_slice(), &[5.0]);
    }
}
