use core::fmt;

/// Externally assigned integer tag used to look an object up again.
///
/// Tags travel on the wire as `i32` (the `Open` handshake carries the
/// client and server tags), so the inner value is kept in that range.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Tag(u32);

impl Tag {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Wire representation; tags above `i32::MAX` are rejected.
    pub fn to_wire(self) -> Option<i32> {
        i32::try_from(self.0).ok()
    }

    pub fn from_wire(value: i32) -> Option<Self> {
        u32::try_from(value).ok().map(Self)
    }
}

impl From<u32> for Tag {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.0)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Domain-specific tag aliases for clarity (no runtime cost).
pub type SiteTag = Tag;
pub type SetupTag = Tag;
pub type ControlTag = Tag;
pub type ControlPointTag = Tag;
