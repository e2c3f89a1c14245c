//! Framed, exclusively owned byte channel between two sites.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::codec::{HEADER_BYTES, Header, decode_payload, encode_payload};
use crate::error::{SiteError, SiteResult};

/// Socket options applied to TCP channels.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelOptions {
    /// `None` blocks forever, like the base protocol.
    pub read_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub nodelay: bool,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            read_timeout: None,
            connect_timeout: None,
            nodelay: true,
        }
    }
}

/// Headers and vectors over any byte stream.
///
/// A write and the read of its reply are never interleaved with other
/// traffic because the channel is owned by exactly one site.
#[derive(Debug)]
pub struct Channel<S> {
    stream: S,
    peer: String,
}

pub type TcpChannel = Channel<TcpStream>;

impl<S: Read + Write> Channel<S> {
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        Self {
            stream,
            peer: peer.into(),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    pub fn send_header(&mut self, header: &Header) -> SiteResult<()> {
        self.stream.write_all(&header.to_bytes())?;
        self.stream.flush()?;
        Ok(())
    }

    pub fn recv_header(&mut self) -> SiteResult<Header> {
        let mut bytes = [0u8; HEADER_BYTES];
        self.stream.read_exact(&mut bytes)?;
        Ok(Header::from_bytes(&bytes))
    }

    /// Like [`recv_header`](Self::recv_header), but a clean close before
    /// the first byte yields `None`.
    pub fn try_recv_header(&mut self) -> SiteResult<Option<Header>> {
        let mut bytes = [0u8; HEADER_BYTES];
        let mut filled = 0;
        while filled < HEADER_BYTES {
            match self.stream.read(&mut bytes[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => {
                    return Err(SiteError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("{} closed mid-header", self.peer),
                    )));
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(Some(Header::from_bytes(&bytes)))
    }

    pub fn send_vector(&mut self, values: &[f64]) -> SiteResult<()> {
        self.stream.write_all(&encode_payload(values))?;
        self.stream.flush()?;
        Ok(())
    }

    /// Reads exactly `len` doubles.
    pub fn recv_vector(&mut self, len: usize) -> SiteResult<Vec<f64>> {
        let mut bytes = vec![0u8; len * 8];
        self.stream.read_exact(&mut bytes)?;
        Ok(decode_payload(&bytes))
    }
}

impl Channel<TcpStream> {
    /// Connects to an actor site.
    pub fn connect(addr: impl ToSocketAddrs, options: &ChannelOptions) -> SiteResult<Self> {
        let addrs: Vec<_> = addr.to_socket_addrs()?.collect();
        let mut last_err = None;
        for addr in addrs {
            let attempt = match options.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => return Self::from_stream(stream, options),
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "connect attempt failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "address resolved to nothing")
            })
            .into())
    }

    /// Waits for one simulation to connect.
    pub fn accept(listener: &TcpListener, options: &ChannelOptions) -> SiteResult<Self> {
        let (stream, addr) = listener.accept()?;
        tracing::info!(peer = %addr, "site connection accepted");
        Self::from_stream(stream, options)
    }

    pub fn from_stream(stream: TcpStream, options: &ChannelOptions) -> SiteResult<Self> {
        stream.set_nodelay(options.nodelay)?;
        stream.set_read_timeout(options.read_timeout)?;
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown peer".to_string());
        Ok(Self::new(stream, peer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Action;
    use std::io::Cursor;

    #[test]
    fn header_and_vector_share_one_stream() {
        let mut out = Channel::new(Cursor::new(Vec::new()), "buffer");
        out.send_header(&Header::action(Action::SetTrialResponse))
            .unwrap();
        out.send_vector(&[1.0, 2.0, 3.0]).unwrap();
        let bytes = out.into_inner().into_inner();
        assert_eq!(bytes.len(), HEADER_BYTES + 24);

        let mut inp = Channel::new(Cursor::new(bytes), "buffer");
        let h = inp.recv_header().unwrap();
        assert_eq!(h.action_code(), Some(Action::SetTrialResponse));
        assert_eq!(inp.recv_vector(3).unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(inp.try_recv_header().unwrap(), None);
    }

    #[test]
    fn truncated_vector_is_an_error() {
        let mut inp = Channel::new(Cursor::new(encode_payload(&[1.0])), "buffer");
        assert!(matches!(inp.recv_vector(2), Err(SiteError::Io(_))));
    }

    #[test]
    fn partial_header_is_an_error() {
        let mut inp = Channel::new(Cursor::new(vec![1u8, 0, 0]), "buffer");
        assert!(inp.try_recv_header().is_err());
    }
}
