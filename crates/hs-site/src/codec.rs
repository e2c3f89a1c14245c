//! Wire layout of the site protocol.
//!
//! ```text
//! header:  [action: i32][a1: i32][a2: i32][a3: i32][a4: i32][a5: i32]   (little endian)
//! payload: [f64; n]                                                     (little endian)
//! ```
//!
//! | message            | header                                  | payload          | reply            |
//! |--------------------|-----------------------------------------|------------------|------------------|
//! | open               | `[1, client_tag, version, 0, 0, 0]`     | -                | ack header       |
//! | setup (twice)      | `[2, n_disp, n_vel, n_accel, n_force, n_time]` | -         | ack header       |
//! | set_trial_response | `[3, 0, ..]`                            | trial total      | -                |
//! | commit_state       | `[5, 0, ..]`                            | -                | -                |
//! | get_daq_response   | `[6, 0, ..]`                            | -                | daq total        |
//! | get_disp .. time   | `[7..=11, 0, ..]`                       | -                | one kind         |
//! | die                | `[98, 0, ..]`                           | -                | ack header       |
//!
//! An ack header is `[reply, tag, version, 0, 0, 0]` with reply 0 for
//! completed and -1 for failed.

use std::fmt;

use hs_core::{ResponseKind, SizeSpec};

pub const HEADER_WORDS: usize = 6;
pub const HEADER_BYTES: usize = HEADER_WORDS * 4;

/// Bumped whenever the layout above changes.
pub const PROTOCOL_VERSION: i32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Open,
    Setup,
    SetTrialResponse,
    /// Reserved; never sent by this implementation.
    Execute,
    CommitState,
    GetDaqResponse,
    GetDisp,
    GetVel,
    GetAccel,
    GetForce,
    GetTime,
    Die,
}

impl Action {
    pub fn code(self) -> i32 {
        match self {
            Action::Open => 1,
            Action::Setup => 2,
            Action::SetTrialResponse => 3,
            Action::Execute => 4,
            Action::CommitState => 5,
            Action::GetDaqResponse => 6,
            Action::GetDisp => 7,
            Action::GetVel => 8,
            Action::GetAccel => 9,
            Action::GetForce => 10,
            Action::GetTime => 11,
            Action::Die => 98,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            1 => Action::Open,
            2 => Action::Setup,
            3 => Action::SetTrialResponse,
            4 => Action::Execute,
            5 => Action::CommitState,
            6 => Action::GetDaqResponse,
            7 => Action::GetDisp,
            8 => Action::GetVel,
            9 => Action::GetAccel,
            10 => Action::GetForce,
            11 => Action::GetTime,
            98 => Action::Die,
            _ => return None,
        })
    }

    /// The single-kind request for `kind`.
    pub fn get_kind(kind: ResponseKind) -> Self {
        match kind {
            ResponseKind::Disp => Action::GetDisp,
            ResponseKind::Vel => Action::GetVel,
            ResponseKind::Accel => Action::GetAccel,
            ResponseKind::Force => Action::GetForce,
            ResponseKind::Time => Action::GetTime,
        }
    }

    /// The kind requested by a single-kind request.
    pub fn requested_kind(self) -> Option<ResponseKind> {
        match self {
            Action::GetDisp => Some(ResponseKind::Disp),
            Action::GetVel => Some(ResponseKind::Vel),
            Action::GetAccel => Some(ResponseKind::Accel),
            Action::GetForce => Some(ResponseKind::Force),
            Action::GetTime => Some(ResponseKind::Time),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::Open => "open",
            Action::Setup => "setup",
            Action::SetTrialResponse => "set_trial_response",
            Action::Execute => "execute",
            Action::CommitState => "commit_state",
            Action::GetDaqResponse => "get_daq_response",
            Action::GetDisp => "get_disp",
            Action::GetVel => "get_vel",
            Action::GetAccel => "get_accel",
            Action::GetForce => "get_force",
            Action::GetTime => "get_time",
            Action::Die => "die",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reply {
    Completed,
    Failed,
}

impl Reply {
    pub fn code(self) -> i32 {
        match self {
            Reply::Completed => 0,
            Reply::Failed => -1,
        }
    }
}

/// One fixed-size message header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub words: [i32; HEADER_WORDS],
}

impl Header {
    pub fn action(action: Action) -> Self {
        Self::with_args(action, [0; HEADER_WORDS - 1])
    }

    pub fn with_args(action: Action, args: [i32; HEADER_WORDS - 1]) -> Self {
        let mut words = [0; HEADER_WORDS];
        words[0] = action.code();
        words[1..].copy_from_slice(&args);
        Self { words }
    }

    pub fn open(client_tag: i32) -> Self {
        Self::with_args(Action::Open, [client_tag, PROTOCOL_VERSION, 0, 0, 0])
    }

    pub fn setup(size: &SizeSpec) -> hs_core::CoreResult<Self> {
        Ok(Self::with_args(Action::Setup, size.to_wire()?))
    }

    pub fn ack(reply: Reply, tag: i32) -> Self {
        Self {
            words: [reply.code(), tag, PROTOCOL_VERSION, 0, 0, 0],
        }
    }

    /// Decoded action word, if it names one.
    pub fn action_code(&self) -> Option<Action> {
        Action::from_code(self.words[0])
    }

    pub fn reply(&self) -> Option<Reply> {
        match self.words[0] {
            0 => Some(Reply::Completed),
            -1 => Some(Reply::Failed),
            _ => None,
        }
    }

    pub fn args(&self) -> &[i32] {
        &self.words[1..]
    }

    /// The five size words of a setup header.
    pub fn size_words(&self) -> [i32; ResponseKind::COUNT] {
        let mut out = [0; ResponseKind::COUNT];
        out.copy_from_slice(&self.words[1..]);
        out
    }

    pub fn to_bytes(&self) -> [u8; HEADER_BYTES] {
        let mut bytes = [0u8; HEADER_BYTES];
        for (chunk, word) in bytes.chunks_exact_mut(4).zip(self.words.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8; HEADER_BYTES]) -> Self {
        let mut words = [0; HEADER_WORDS];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self { words }
    }
}

pub fn encode_payload(values: &[f64]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 8);
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decodes whole little-endian doubles; a trailing partial value is ignored.
pub fn decode_payload(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_codes_are_stable() {
        let codes: Vec<i32> = [
            Action::Open,
            Action::Setup,
            Action::SetTrialResponse,
            Action::Execute,
            Action::CommitState,
            Action::GetDaqResponse,
            Action::GetDisp,
            Action::GetVel,
            Action::GetAccel,
            Action::GetForce,
            Action::GetTime,
            Action::Die,
        ]
        .into_iter()
        .map(Action::code)
        .collect();
        assert_eq!(codes, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 98]);
        assert_eq!(Action::from_code(0), None);
        assert_eq!(Action::from_code(98), Some(Action::Die));
    }

    #[test]
    fn header_is_little_endian() {
        let h = Header::with_args(Action::Setup, [2, 1, 0, 0, -1]);
        let bytes = h.to_bytes();
        assert_eq!(&bytes[0..4], &[2, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &[2, 0, 0, 0]);
        assert_eq!(&bytes[20..24], &[0xff, 0xff, 0xff, 0xff]);
        assert_eq!(Header::from_bytes(&bytes), h);
    }

    #[test]
    fn setup_header_carries_sizes_in_kind_order() {
        let size = SizeSpec::new([2, 1, 0, 2, 1]);
        let h = Header::setup(&size).unwrap();
        assert_eq!(h.words, [2, 2, 1, 0, 2, 1]);
        assert_eq!(SizeSpec::from_wire(&h.size_words()).unwrap(), size);
    }

    #[test]
    fn ack_headers_decode() {
        assert_eq!(Header::ack(Reply::Completed, 7).reply(), Some(Reply::Completed));
        assert_eq!(Header::ack(Reply::Failed, 7).reply(), Some(Reply::Failed));
        assert_eq!(Header::action(Action::GetDisp).reply(), None);
    }

    #[test]
    fn payload_layout() {
        let bytes = encode_payload(&[1.0, -2.5]);
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[0..8], &1.0f64.to_le_bytes());
        assert_eq!(decode_payload(&bytes), vec![1.0, -2.5]);
    }

    #[test]
    fn kind_requests_round_trip() {
        for kind in ResponseKind::ALL {
            assert_eq!(Action::get_kind(kind).requested_kind(), Some(kind));
        }
        assert_eq!(Action::CommitState.requested_kind(), None);
    }
}
