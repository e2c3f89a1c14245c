//! Experimental sites: the unit a simulation talks to at every step.
//!
//! A site owns the trial and daq buffers of one session and delegates to a
//! setup or a control, either in-process ([`LocalSite`]) or across a
//! channel ([`RemoteSite`] on the simulation side, [`ActorSite`] next to
//! the test equipment).
//!
//! # Protocol
//!
//! Every message starts with a fixed six-word header; vector payloads
//! follow without a length prefix, their size being implied by the sizes
//! negotiated during the handshake. See [`codec`] for the layout and
//! [`session`] for the states both peers walk through.

pub mod actor;
pub mod channel;
pub mod codec;
pub mod error;
pub mod local;
pub mod remote;
pub mod session;
pub mod site;
pub mod udp;

pub use actor::ActorSite;
pub use channel::{Channel, ChannelOptions, TcpChannel};
pub use codec::{Action, Header, PROTOCOL_VERSION, Reply};
pub use error::{SiteError, SiteResult};
pub use local::{Delegate, LocalSite};
pub use remote::RemoteSite;
pub use session::{Session, SessionState};
pub use site::Site;
pub use udp::UdpSignalChannel;
