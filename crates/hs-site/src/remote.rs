//! Simulation-side half of the site protocol.

use std::io::{Read, Write};

use hs_core::{DVector, Response, ResponseKind, SiteTag, SizeSpec};
use hs_setup::ExperimentalSetup;

use crate::channel::Channel;
use crate::codec::{Action, Header, PROTOCOL_VERSION, Reply};
use crate::error::{SiteError, SiteResult};
use crate::session::{Session, SessionState};
use crate::site::{Buffers, Site};

/// A site whose delegate lives behind a channel.
///
/// With a local setup (a shadow site) the geometry runs here and the
/// channel carries actuator vectors; the actor then drives a bare control.
///
/// `commit_state` must follow a daq read of the same step. By default this
/// is left to the caller, as the protocol itself does not check it;
/// [`with_commit_guard`](Self::with_commit_guard) makes the site refuse.
#[derive(Debug)]
pub struct RemoteSite<S> {
    tag: SiteTag,
    channel: Channel<S>,
    session: Session,
    setup: Option<ExperimentalSetup>,
    buffers: Buffers,
    /// Sizes on the wire: the setup's actuator sizes, or the site sizes.
    wire: Option<(SizeSpec, SizeSpec)>,
    /// Last trial vectors sent, in wire coordinates. Kinds missing from a
    /// step are resent from here so the actor holds its previous command.
    sent: Response,
    peer_tag: Option<i32>,
    commit_guard: bool,
}

impl<S: Read + Write + Send> RemoteSite<S> {
    pub fn new(tag: SiteTag, channel: Channel<S>) -> Self {
        Self {
            tag,
            session: Session::new(format!("remote#{tag}")),
            channel,
            setup: None,
            buffers: Buffers::default(),
            wire: None,
            sent: Response::new(),
            peer_tag: None,
            commit_guard: false,
        }
    }

    /// Runs `setup` locally; it should be [`ExperimentalSetup::detached`].
    pub fn with_setup(mut self, setup: ExperimentalSetup) -> Self {
        self.setup = Some(setup);
        self
    }

    /// Refuse `commit_state` until the step's daq response was fetched.
    pub fn with_commit_guard(mut self, enabled: bool) -> Self {
        self.commit_guard = enabled;
        self
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// Tag the actor reported in its open acknowledgement.
    pub fn peer_tag(&self) -> Option<i32> {
        self.peer_tag
    }

    fn protocol(&self, op: &'static str, what: String) -> SiteError {
        SiteError::Protocol {
            site: self.label(),
            op,
            what,
        }
    }

    /// Marks the session failed when `result` is a fatal error.
    fn guard<T>(&mut self, result: SiteResult<T>) -> SiteResult<T> {
        if let Err(e) = &result {
            if e.is_fatal() {
                self.session.fail();
            }
        }
        result
    }

    fn expect_ack(&mut self, op: &'static str) -> SiteResult<Header> {
        let header = self.channel.recv_header()?;
        match header.reply() {
            Some(Reply::Completed) => Ok(header),
            Some(Reply::Failed) => Err(SiteError::Refused {
                site: self.label(),
                op,
                what: format!("actor {} answered with a failure header", header.words[1]),
            }),
            None => Err(self.protocol(op, format!("expected an ack, got {:?}", header.words))),
        }
    }

    /// Sends `open` and checks the actor's protocol version.
    pub fn open(&mut self) -> SiteResult<i32> {
        self.session.check(Action::Open)?;
        let result = self.open_inner();
        let result = self.guard(result);
        if result.is_ok() {
            self.session.complete(Action::Open);
        }
        result
    }

    fn open_inner(&mut self) -> SiteResult<i32> {
        let client_tag = i32::try_from(self.tag.get()).map_err(|_| {
            self.protocol("open", format!("tag {} exceeds the wire range", self.tag))
        })?;
        self.channel.send_header(&Header::open(client_tag))?;
        let ack = self.expect_ack("open")?;
        let version = ack.words[2];
        if version != PROTOCOL_VERSION {
            return Err(self.protocol(
                "open",
                format!("actor speaks protocol {version}, expected {PROTOCOL_VERSION}"),
            ));
        }
        self.peer_tag = Some(ack.words[1]);
        tracing::info!(site = %self.label(), peer = %self.channel.peer(), actor = ack.words[1], "site opened");
        Ok(ack.words[1])
    }

    fn send_sizes(&mut self, size: &SizeSpec) -> SiteResult<()> {
        self.session.check(Action::Setup)?;
        let result = self.send_sizes_inner(size);
        let result = self.guard(result);
        if result.is_ok() {
            self.session.complete(Action::Setup);
        }
        result
    }

    fn send_sizes_inner(&mut self, size: &SizeSpec) -> SiteResult<()> {
        self.channel.send_header(&Header::setup(size)?)?;
        self.expect_ack("configure")?;
        Ok(())
    }

    fn wire_sizes(&self, op: &'static str) -> SiteResult<(SizeSpec, SizeSpec)> {
        self.wire.ok_or_else(|| SiteError::NotConfigured {
            site: self.label(),
            op,
        })
    }

    fn fetch_daq(&mut self) -> SiteResult<Response> {
        const OP: &str = "get_daq_response";
        let (_, wire_daq) = self.wire_sizes(OP)?;
        self.channel.send_header(&Header::action(Action::GetDaqResponse))?;
        let flat = self.channel.recv_vector(wire_daq.total())?;
        let daq = Response::assemble(&flat, &wire_daq)?;
        Ok(match &self.setup {
            Some(setup) => setup.transform_daq(&daq)?,
            None => daq,
        })
    }

    fn refresh_daq(&mut self, op: &'static str) -> SiteResult<()> {
        if self.buffers.daq_fresh() {
            return Ok(());
        }
        self.session.check(Action::GetDaqResponse)?;
        let result = self.fetch_daq();
        let daq = self.guard(result)?;
        let label = self.label();
        self.buffers.store_daq(&label, op, daq)
    }
}

impl<S: Read + Write + Send> Site for RemoteSite<S> {
    fn tag(&self) -> SiteTag {
        self.tag
    }

    fn label(&self) -> String {
        format!("remote#{}", self.tag)
    }

    fn size_trial(&self) -> Option<&SizeSpec> {
        self.buffers.size_trial()
    }

    fn size_daq(&self) -> Option<&SizeSpec> {
        self.buffers.size_daq()
    }

    /// Opens the session if needed, then exchanges trial and daq sizes.
    fn configure(&mut self, size_trial: &SizeSpec, size_daq: &SizeSpec) -> SiteResult<()> {
        let label = self.label();
        if self.buffers.is_configured() {
            return Err(SiteError::AlreadyConfigured { site: label });
        }
        if self.session.state() == SessionState::Open {
            self.open()?;
        }

        let (wire_trial, wire_daq) = match &mut self.setup {
            Some(setup) => {
                setup.set_size(size_trial, size_daq)?;
                setup
                    .size_ctrl()
                    .copied()
                    .zip(setup.size_daq().copied())
                    .ok_or_else(|| SiteError::NotConfigured {
                        site: label.clone(),
                        op: "configure",
                    })?
            }
            None => (*size_trial, *size_daq),
        };

        self.send_sizes(&wire_trial)?;
        self.send_sizes(&wire_daq)?;
        self.buffers.configure(&label, size_trial, size_daq)?;
        self.wire = Some((wire_trial, wire_daq));
        self.sent = Response::zeros(&wire_trial);
        tracing::info!(site = %label, trial = %wire_trial, daq = %wire_daq, "remote session ready");
        Ok(())
    }

    fn set_trial_response(&mut self, trial: &Response) -> SiteResult<()> {
        const OP: &str = "set_trial_response";
        let label = self.label();
        let (wire_trial, _) = self.wire_sizes(OP)?;
        self.session.check(Action::SetTrialResponse)?;
        let kept = self.buffers.store_trial(&label, trial)?.clone();
        let mut ctrl = match &self.setup {
            Some(setup) => setup.transform_trial(&kept)?,
            None => kept,
        };
        for kind in wire_trial.used_kinds() {
            if !ctrl.has(kind) {
                ctrl.set(kind, self.sent.get(kind).cloned());
            }
        }
        let flat = ctrl.flatten(&wire_trial)?;
        let result = self
            .channel
            .send_header(&Header::action(Action::SetTrialResponse))
            .and_then(|_| self.channel.send_vector(&flat));
        self.guard(result)?;
        self.sent = ctrl;
        Ok(())
    }

    fn get_daq_response(&mut self) -> SiteResult<Response> {
        const OP: &str = "get_daq_response";
        self.buffers.sizes(&self.label(), OP)?;
        self.refresh_daq(OP)?;
        Ok(self.buffers.daq().clone())
    }

    /// With a local setup the whole measurement is fetched, since the
    /// inverse geometry may need every kind.
    fn get_daq_kind(&mut self, kind: ResponseKind) -> SiteResult<DVector<f64>> {
        const OP: &str = "get_daq_kind";
        let label = self.label();
        let count = self.buffers.require_kind(&label, OP, kind)?;
        if self.setup.is_some() {
            self.refresh_daq(OP)?;
        } else if !self.buffers.kind_fresh(kind) {
            let action = Action::get_kind(kind);
            self.session.check(action)?;
            let result = self
                .channel
                .send_header(&Header::action(action))
                .and_then(|_| self.channel.recv_vector(count));
            let values = self.guard(result)?;
            self.buffers
                .store_daq_kind(&label, OP, kind, DVector::from_vec(values))?;
        }
        Ok(self.buffers.response(&label, kind)?.clone())
    }

    fn commit_state(&mut self) -> SiteResult<()> {
        let label = self.label();
        self.buffers.sizes(&label, "commit_state")?;
        self.session.check(Action::CommitState)?;
        if self.commit_guard && !self.buffers.daq_fetched_since_trial() {
            return Err(SiteError::CommitBeforeDaq { site: label });
        }
        if let Some(setup) = &mut self.setup {
            setup.commit_state()?;
        }
        let result = self
            .channel
            .send_header(&Header::action(Action::CommitState));
        self.guard(result)
    }

    fn get_response(&self, kind: ResponseKind) -> SiteResult<&DVector<f64>> {
        self.buffers.response(&self.label(), kind)
    }

    /// Sends `die` and waits for the acknowledgement.
    fn close(&mut self) -> SiteResult<()> {
        self.session.check(Action::Die)?;
        let result = self
            .channel
            .send_header(&Header::action(Action::Die))
            .and_then(|_| self.expect_ack("close").map(|_| ()));
        self.session.complete(Action::Die);
        tracing::info!(site = %self.label(), "site closed");
        result
    }
}
