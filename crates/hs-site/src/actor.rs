//! Equipment-side half of the site protocol.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};

use hs_core::{Response, SizeSpec};

use crate::channel::{Channel, ChannelOptions};
use crate::codec::{Action, Header, PROTOCOL_VERSION, Reply};
use crate::error::{SiteError, SiteResult};
use crate::local::LocalSite;
use crate::session::{Session, SessionState};
use crate::site::Site;

/// Serves one remote site against a local setup or control.
///
/// The daq response is read right after each trial response, so that a
/// following `get_daq_response` or single-kind request only sends data.
#[derive(Debug)]
pub struct ActorSite<S> {
    site: LocalSite,
    channel: Channel<S>,
    session: Session,
    pending_trial: Option<SizeSpec>,
    peer_tag: Option<i32>,
    wire_tag: i32,
}

impl ActorSite<TcpStream> {
    /// Waits for one connection on `listener`.
    pub fn accept(
        listener: &TcpListener,
        site: LocalSite,
        options: &ChannelOptions,
    ) -> SiteResult<Self> {
        Self::new(site, Channel::accept(listener, options)?)
    }
}

impl<S: Read + Write> ActorSite<S> {
    /// Fails when the site's tag cannot be sent in a header.
    pub fn new(site: LocalSite, channel: Channel<S>) -> SiteResult<Self> {
        let label = format!("actor#{}", site.tag());
        let wire_tag = site.tag().to_wire().ok_or_else(|| SiteError::Protocol {
            site: label.clone(),
            op: "new",
            what: format!("tag {} exceeds the wire range", site.tag()),
        })?;
        Ok(Self {
            session: Session::new(label),
            site,
            channel,
            pending_trial: None,
            peer_tag: None,
            wire_tag,
        })
    }

    pub fn site(&self) -> &LocalSite {
        &self.site
    }

    pub fn into_site(self) -> LocalSite {
        self.site
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// Tag the remote site sent with `open`.
    pub fn peer_tag(&self) -> Option<i32> {
        self.peer_tag
    }

    fn label(&self) -> String {
        format!("actor#{}", self.site.tag())
    }

    fn protocol(&self, op: &'static str, what: String) -> SiteError {
        SiteError::Protocol {
            site: self.label(),
            op,
            what,
        }
    }

    fn refuse(&mut self) -> SiteResult<()> {
        self.channel
            .send_header(&Header::ack(Reply::Failed, self.wire_tag))
    }

    /// Handles messages until `die` or a failure. The session is over
    /// either way.
    pub fn serve(&mut self) -> SiteResult<()> {
        tracing::info!(site = %self.label(), peer = %self.channel.peer(), "actor serving");
        loop {
            let header = match self.channel.try_recv_header() {
                Ok(Some(header)) => header,
                Ok(None) => {
                    self.session.disconnect();
                    return Err(self.protocol("serve", "channel closed before die".to_string()));
                }
                Err(e) => {
                    self.session.fail();
                    return Err(e);
                }
            };
            match self.handle(&header) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::info!(site = %self.label(), "actor terminated");
                    return Ok(());
                }
                Err(e) => {
                    self.session.fail();
                    tracing::error!(site = %self.label(), error = %e, "actor session failed");
                    return Err(e);
                }
            }
        }
    }

    /// Returns `false` once the session has terminated.
    fn handle(&mut self, header: &Header) -> SiteResult<bool> {
        let Some(action) = header.action_code() else {
            return Err(self.protocol(
                "serve",
                format!("unknown action code {}", header.words[0]),
            ));
        };
        tracing::trace!(site = %self.label(), %action, "message");
        let replies_with_header = matches!(action, Action::Open | Action::Setup | Action::Die);
        if let Err(e) = self.session.check(action) {
            if replies_with_header {
                self.refuse()?;
            }
            return Err(e);
        }

        match action {
            Action::Open => self.on_open(header)?,
            Action::Setup => self.on_setup(header)?,
            Action::SetTrialResponse => {
                let (size_trial, _) = self.sizes(action)?;
                let flat = self.channel.recv_vector(size_trial.total())?;
                let trial = Response::assemble(&flat, &size_trial)?;
                self.site.set_trial_response(&trial)?;
                self.site.get_daq_response()?;
            }
            Action::CommitState => self.site.commit_state()?,
            Action::GetDaqResponse => {
                let (_, size_daq) = self.sizes(action)?;
                let flat = self.site.get_daq_response()?.flatten(&size_daq)?;
                self.channel.send_vector(&flat)?;
            }
            Action::GetDisp
            | Action::GetVel
            | Action::GetAccel
            | Action::GetForce
            | Action::GetTime => {
                let kind = action.requested_kind().ok_or_else(|| {
                    self.protocol("serve", format!("{action} names no kind"))
                })?;
                let values = self.site.get_daq_kind(kind)?;
                self.channel.send_vector(values.as_slice())?;
            }
            Action::Die => {
                let tag = self.wire_tag;
                self.channel.send_header(&Header::ack(Reply::Completed, tag))?;
                self.session.complete(action);
                return Ok(false);
            }
            Action::Execute => {
                return Err(self.protocol("serve", "execute is reserved".to_string()));
            }
        }
        self.session.complete(action);
        Ok(true)
    }

    fn sizes(&self, action: Action) -> SiteResult<(SizeSpec, SizeSpec)> {
        match (self.site.size_trial(), self.site.size_daq()) {
            (Some(t), Some(d)) => Ok((*t, *d)),
            _ => Err(self.protocol(
                "serve",
                format!("{action} before the site was configured"),
            )),
        }
    }

    fn on_open(&mut self, header: &Header) -> SiteResult<()> {
        let (client, version) = (header.words[1], header.words[2]);
        if version != PROTOCOL_VERSION {
            self.refuse()?;
            return Err(self.protocol(
                "open",
                format!("remote speaks protocol {version}, expected {PROTOCOL_VERSION}"),
            ));
        }
        self.peer_tag = Some(client);
        let tag = self.wire_tag;
        self.channel.send_header(&Header::ack(Reply::Completed, tag))?;
        tracing::info!(site = %self.label(), remote = client, "connected to remote site");
        Ok(())
    }

    fn on_setup(&mut self, header: &Header) -> SiteResult<()> {
        let size = match SizeSpec::from_wire(&header.size_words()) {
            Ok(size) => size,
            Err(e) => {
                self.refuse()?;
                return Err(e.into());
            }
        };
        let Some(size_trial) = self.pending_trial else {
            self.pending_trial = Some(size);
            let tag = self.wire_tag;
            return self.channel.send_header(&Header::ack(Reply::Completed, tag));
        };
        if let Err(e) = self.site.configure(&size_trial, &size) {
            tracing::warn!(site = %self.label(), error = %e, "sizes refused");
            self.refuse()?;
            return Err(e);
        }
        let tag = self.wire_tag;
        self.channel.send_header(&Header::ack(Reply::Completed, tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::HEADER_BYTES;
    use hs_controls::{ExperimentalControl, Loopback};
    use hs_core::Tag;
    use std::io::Cursor;

    /// Reads scripted input; replies go to a separate buffer.
    struct Duplex {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn loopback(tag: u32) -> LocalSite {
        let control = ExperimentalControl::new(Tag::new(1), Box::new(Loopback::new()));
        LocalSite::with_control(Tag::new(tag), control)
    }

    #[test]
    fn tag_must_fit_a_header_word() {
        let channel = Channel::new(Cursor::new(Vec::new()), "buffer");
        let err = ActorSite::new(loopback(u32::MAX), channel).unwrap_err();
        assert!(matches!(err, SiteError::Protocol { op: "new", .. }));

        let channel = Channel::new(Cursor::new(Vec::new()), "buffer");
        let actor = ActorSite::new(loopback(9), channel).unwrap();
        assert_eq!(actor.session_state(), SessionState::Open);
    }

    #[test]
    fn oversized_setup_is_refused_with_a_header() {
        let mut input = Header::open(1).to_bytes().to_vec();
        input.extend_from_slice(
            &Header::with_args(Action::Setup, [i32::MAX, 0, 0, 0, 0]).to_bytes(),
        );
        let stream = Duplex {
            input: Cursor::new(input),
            output: Vec::new(),
        };
        let mut actor = ActorSite::new(loopback(3), Channel::new(stream, "script")).unwrap();

        assert!(matches!(actor.serve(), Err(SiteError::Core(_))));
        assert_eq!(actor.session_state(), SessionState::Failed);
        assert!(actor.site().size_trial().is_none());

        let replies = actor.channel.into_inner().output;
        let mut first = [0u8; HEADER_BYTES];
        let mut second = [0u8; HEADER_BYTES];
        first.copy_from_slice(&replies[..HEADER_BYTES]);
        second.copy_from_slice(&replies[HEADER_BYTES..]);
        assert_eq!(Header::from_bytes(&first).reply(), Some(Reply::Completed));
        assert_eq!(Header::from_bytes(&second).reply(), Some(Reply::Failed));
    }
}
