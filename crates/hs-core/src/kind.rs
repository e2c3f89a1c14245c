use core::fmt;

use crate::{CoreError, CoreResult};

/// The five response kinds exchanged between a simulation and a test site.
///
/// Ascending discriminant order is the canonical order used for every flat
/// buffer and every size header on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ResponseKind {
    Disp = 0,
    Vel = 1,
    Accel = 2,
    Force = 3,
    Time = 4,
}

impl ResponseKind {
    /// Protocol constant: number of response kinds.
    pub const COUNT: usize = 5;

    /// All kinds in canonical order.
    pub const ALL: [ResponseKind; Self::COUNT] = [
        ResponseKind::Disp,
        ResponseKind::Vel,
        ResponseKind::Accel,
        ResponseKind::Force,
        ResponseKind::Time,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> CoreResult<Self> {
        Self::ALL.get(index).copied().ok_or(CoreError::IndexOob {
            what: "response kind",
            index,
            len: Self::COUNT,
        })
    }

    /// Numeric code used by control points and configuration files.
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> CoreResult<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(CoreError::UnknownKind { code })
    }

    pub fn name(self) -> &'static str {
        match self {
            ResponseKind::Disp => "disp",
            ResponseKind::Vel => "vel",
            ResponseKind::Accel => "accel",
            ResponseKind::Force => "force",
            ResponseKind::Time => "time",
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order_is_ascending() {
        for (i, kind) in ResponseKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
            assert_eq!(ResponseKind::from_index(i).unwrap(), *kind);
        }
        assert!(ResponseKind::Disp < ResponseKind::Time);
    }

    #[test]
    fn unknown_codes_are_rejected() {
        assert_eq!(ResponseKind::from_code(3).unwrap(), ResponseKind::Force);
        assert_eq!(
            ResponseKind::from_code(5),
            Err(CoreError::UnknownKind { code: 5 })
        );
        assert!(ResponseKind::from_code(-1).is_err());
    }
}
