//! Best-effort datagram feed for raw high-rate signals.
//!
//! Never carries protocol actions. Each datagram is
//!
//! ```text
//! [seq: u32 LE][len: u32 LE][f64 LE; len]
//! ```
//!
//! Datagrams that arrive with a sequence number not newer than the last one
//! seen are dropped.

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use crate::codec::{decode_payload, encode_payload};
use crate::error::{SiteError, SiteResult};

const DATAGRAM_HEADER: usize = 8;

/// Largest signal vector that fits one datagram.
pub const MAX_SIGNALS: usize = (65_507 - DATAGRAM_HEADER) / 8;

#[derive(Debug)]
pub struct UdpSignalChannel {
    socket: UdpSocket,
    next_seq: u32,
    last_seen: Option<u32>,
    dropped: u64,
}

impl UdpSignalChannel {
    pub fn bind(addr: impl ToSocketAddrs) -> SiteResult<Self> {
        Ok(Self {
            socket: UdpSocket::bind(addr)?,
            next_seq: 0,
            last_seen: None,
            dropped: 0,
        })
    }

    /// Fixes the peer for [`send`](Self::send) and filters incoming traffic.
    pub fn connect(&self, peer: impl ToSocketAddrs) -> SiteResult<()> {
        self.socket.connect(peer)?;
        Ok(())
    }

    pub fn local_addr(&self) -> SiteResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> SiteResult<()> {
        self.socket.set_read_timeout(timeout)?;
        Ok(())
    }

    /// Datagrams discarded as stale so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn send(&mut self, values: &[f64]) -> SiteResult<()> {
        if values.len() > MAX_SIGNALS {
            return Err(self.malformed(format!(
                "{} signals exceed one datagram ({MAX_SIGNALS})",
                values.len()
            )));
        }
        let mut datagram = Vec::with_capacity(DATAGRAM_HEADER + values.len() * 8);
        datagram.extend_from_slice(&self.next_seq.to_le_bytes());
        datagram.extend_from_slice(&(values.len() as u32).to_le_bytes());
        datagram.extend_from_slice(&encode_payload(values));
        self.socket.send(&datagram)?;
        self.next_seq = self.next_seq.wrapping_add(1);
        Ok(())
    }

    /// Next datagram's values, or `None` if it was stale.
    pub fn recv(&mut self) -> SiteResult<Option<Vec<f64>>> {
        let mut buf = vec![0u8; DATAGRAM_HEADER + MAX_SIGNALS * 8];
        let n = self.socket.recv(&mut buf)?;
        if n < DATAGRAM_HEADER {
            return Err(self.malformed(format!("datagram of {n} bytes has no header")));
        }
        let seq = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let len = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
        if n != DATAGRAM_HEADER + len * 8 {
            return Err(self.malformed(format!(
                "datagram announces {len} signals but carries {} bytes",
                n - DATAGRAM_HEADER
            )));
        }
        if let Some(last) = self.last_seen {
            // newer means ahead by less than half the sequence space
            if seq.wrapping_sub(last) == 0 || seq.wrapping_sub(last) > u32::MAX / 2 {
                self.dropped += 1;
                tracing::debug!(seq, last, "stale datagram dropped");
                return Ok(None);
            }
        }
        self.last_seen = Some(seq);
        Ok(Some(decode_payload(&buf[DATAGRAM_HEADER..n])))
    }

    fn malformed(&self, what: String) -> SiteError {
        SiteError::Protocol {
            site: "udp".to_string(),
            op: "signal",
            what,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (UdpSignalChannel, UdpSignalChannel) {
        let a = UdpSignalChannel::bind("127.0.0.1:0").unwrap();
        let b = UdpSignalChannel::bind("127.0.0.1:0").unwrap();
        a.connect(b.local_addr().unwrap()).unwrap();
        b.connect(a.local_addr().unwrap()).unwrap();
        b.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        (a, b)
    }

    #[test]
    fn signals_arrive_in_order() {
        let (mut a, mut b) = pair();
        a.send(&[1.0, 2.0]).unwrap();
        a.send(&[3.0]).unwrap();
        assert_eq!(b.recv().unwrap(), Some(vec![1.0, 2.0]));
        assert_eq!(b.recv().unwrap(), Some(vec![3.0]));
        assert_eq!(b.dropped(), 0);
    }

    #[test]
    fn stale_sequence_is_dropped() {
        let (mut a, mut b) = pair();
        a.send(&[1.0]).unwrap();
        a.send(&[2.0]).unwrap();
        assert_eq!(b.recv().unwrap(), Some(vec![1.0]));
        assert_eq!(b.recv().unwrap(), Some(vec![2.0]));
        // replay sequence 0
        a.next_seq = 0;
        a.send(&[9.0]).unwrap();
        assert_eq!(b.recv().unwrap(), None);
        assert_eq!(b.dropped(), 1);
    }

    #[test]
    fn short_datagram_is_malformed() {
        let (a, mut b) = pair();
        a.socket.send(&[1, 2, 3]).unwrap();
        assert!(matches!(b.recv(), Err(SiteError::Protocol { .. })));
    }
}
