//! The site contract and the per-session buffers every site keeps.

use hs_core::{CoreError, DVector, Response, ResponseKind, SiteTag, SizeSpec};

use crate::error::{SiteError, SiteResult};

/// What a simulation calls on every step.
///
/// `configure` comes exactly once, before anything else. Each step is
/// `set_trial_response`, then one or more daq reads, then `commit_state`
/// once the step has converged.
pub trait Site: Send {
    fn tag(&self) -> SiteTag;

    /// `kind#tag`, used in errors and logs.
    fn label(&self) -> String;

    fn size_trial(&self) -> Option<&SizeSpec>;

    fn size_daq(&self) -> Option<&SizeSpec>;

    /// Fixes the sizes of the session and sizes the delegate.
    fn configure(&mut self, size_trial: &SizeSpec, size_daq: &SizeSpec) -> SiteResult<()>;

    /// Stores and forwards a trial response. Absent kinds carry no value
    /// this step; the daq buffers become stale.
    fn set_trial_response(&mut self, trial: &Response) -> SiteResult<()>;

    /// Every sized daq kind, fetched from the delegate if stale.
    fn get_daq_response(&mut self) -> SiteResult<Response>;

    /// One daq kind, fetched if stale.
    ///
    /// # Errors
    ///
    /// `NoSuchKind` if the kind has a zero count in this session.
    fn get_daq_kind(&mut self, kind: ResponseKind) -> SiteResult<DVector<f64>>;

    fn commit_state(&mut self) -> SiteResult<()>;

    /// Last fetched daq vector of one kind.
    fn get_response(&self, kind: ResponseKind) -> SiteResult<&DVector<f64>>;

    /// Ends the session. Sites without a peer have nothing to do.
    fn close(&mut self) -> SiteResult<()> {
        Ok(())
    }

    fn set_trial_parts(
        &mut self,
        disp: Option<DVector<f64>>,
        vel: Option<DVector<f64>>,
        accel: Option<DVector<f64>>,
        force: Option<DVector<f64>>,
        time: Option<DVector<f64>>,
    ) -> SiteResult<()> {
        self.set_trial_response(&Response::from_parts(disp, vel, accel, force, time))
    }
}

/// Sizes and vectors of one session, in basic coordinates.
#[derive(Clone, Debug, Default)]
pub(crate) struct Buffers {
    sizes: Option<(SizeSpec, SizeSpec)>,
    trial: Response,
    daq: Response,
    daq_fresh: bool,
    /// Kinds refreshed on their own since the last trial.
    kind_fresh: [bool; ResponseKind::COUNT],
    daq_fetched_since_trial: bool,
}

impl Buffers {
    pub(crate) fn configure(
        &mut self,
        site: &str,
        size_trial: &SizeSpec,
        size_daq: &SizeSpec,
    ) -> SiteResult<()> {
        if self.sizes.is_some() {
            return Err(SiteError::AlreadyConfigured {
                site: site.to_string(),
            });
        }
        self.sizes = Some((*size_trial, *size_daq));
        self.trial = Response::new();
        self.daq = Response::zeros(size_daq);
        self.daq_fresh = false;
        self.kind_fresh = [false; ResponseKind::COUNT];
        self.daq_fetched_since_trial = true;
        Ok(())
    }

    pub(crate) fn is_configured(&self) -> bool {
        self.sizes.is_some()
    }

    pub(crate) fn size_trial(&self) -> Option<&SizeSpec> {
        self.sizes.as_ref().map(|(t, _)| t)
    }

    pub(crate) fn size_daq(&self) -> Option<&SizeSpec> {
        self.sizes.as_ref().map(|(_, d)| d)
    }

    pub(crate) fn sizes(&self, site: &str, op: &'static str) -> SiteResult<(SizeSpec, SizeSpec)> {
        self.sizes.ok_or_else(|| SiteError::NotConfigured {
            site: site.to_string(),
            op,
        })
    }

    /// Validates and keeps the used kinds of `trial`; marks daq stale.
    pub(crate) fn store_trial(&mut self, site: &str, trial: &Response) -> SiteResult<&Response> {
        const OP: &str = "set_trial_response";
        let (size_trial, _) = self.sizes(site, OP)?;
        for (kind, values) in trial.iter() {
            let expected = size_trial.get(kind);
            if values.len() != expected {
                return Err(SiteError::SizeMismatch {
                    site: site.to_string(),
                    op: OP,
                    kind,
                    expected,
                    found: values.len(),
                });
            }
        }
        trial.ensure_finite("trial response")?;
        let mut kept = Response::new();
        for kind in size_trial.used_kinds() {
            kept.set(kind, trial.get(kind).cloned());
        }
        self.trial = kept;
        self.daq_fresh = false;
        self.kind_fresh = [false; ResponseKind::COUNT];
        self.daq_fetched_since_trial = false;
        Ok(&self.trial)
    }

    pub(crate) fn trial(&self) -> &Response {
        &self.trial
    }

    pub(crate) fn daq_fresh(&self) -> bool {
        self.daq_fresh
    }

    pub(crate) fn kind_fresh(&self, kind: ResponseKind) -> bool {
        self.daq_fresh || self.kind_fresh[kind.index()]
    }

    pub(crate) fn daq_fetched_since_trial(&self) -> bool {
        self.daq_fetched_since_trial
    }

    /// Keeps a fetched measurement after checking it against the sizes.
    pub(crate) fn store_daq(&mut self, site: &str, op: &'static str, daq: Response) -> SiteResult<()> {
        let (_, size_daq) = self.sizes(site, op)?;
        for kind in ResponseKind::ALL {
            let expected = size_daq.get(kind);
            let found = daq.get(kind).map_or(0, |v| v.len());
            if found != expected {
                return Err(SiteError::SizeMismatch {
                    site: site.to_string(),
                    op,
                    kind,
                    expected,
                    found,
                });
            }
        }
        daq.ensure_finite("daq response")?;
        self.daq = daq;
        self.daq_fresh = true;
        self.daq_fetched_since_trial = true;
        Ok(())
    }

    /// Keeps one fetched daq kind; the other kinds stay stale.
    pub(crate) fn store_daq_kind(
        &mut self,
        site: &str,
        op: &'static str,
        kind: ResponseKind,
        values: DVector<f64>,
    ) -> SiteResult<()> {
        let expected = self.require_kind(site, op, kind)?;
        if values.len() != expected {
            return Err(SiteError::SizeMismatch {
                site: site.to_string(),
                op,
                kind,
                expected,
                found: values.len(),
            });
        }
        if let Some(&value) = values.iter().find(|x| !x.is_finite()) {
            return Err(CoreError::NonFinite {
                what: "daq response",
                value,
            }
            .into());
        }
        self.daq.set(kind, Some(values));
        self.kind_fresh[kind.index()] = true;
        self.daq_fetched_since_trial = true;
        Ok(())
    }

    pub(crate) fn daq(&self) -> &Response {
        &self.daq
    }

    /// Fails with `NoSuchKind` for a zero-count kind.
    pub(crate) fn require_kind(
        &self,
        site: &str,
        op: &'static str,
        kind: ResponseKind,
    ) -> SiteResult<usize> {
        let (_, size_daq) = self.sizes(site, op)?;
        match size_daq.get(kind) {
            0 => Err(SiteError::NoSuchKind {
                site: site.to_string(),
                op,
                kind,
            }),
            n => Ok(n),
        }
    }

    pub(crate) fn response(&self, site: &str, kind: ResponseKind) -> SiteResult<&DVector<f64>> {
        const OP: &str = "get_response";
        self.require_kind(site, OP, kind)?;
        self.daq.get(kind).ok_or_else(|| SiteError::NoSuchKind {
            site: site.to_string(),
            op: OP,
            kind,
        })
    }
}
