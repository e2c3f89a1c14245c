use core::fmt;
use core::ops::Range;

use crate::{CoreError, CoreResult, ResponseKind};

/// Per-kind element counts for one direction of exchange (trial or daq).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SizeSpec {
    counts: [usize; ResponseKind::COUNT],
}

impl SizeSpec {
    /// Largest per-kind count one session may negotiate.
    pub const MAX_WIRE_COUNT: usize = 1 << 16;

    pub const fn new(counts: [usize; ResponseKind::COUNT]) -> Self {
        Self { counts }
    }

    /// Builder-style setter.
    pub fn with(mut self, kind: ResponseKind, count: usize) -> Self {
        self.counts[kind.index()] = count;
        self
    }

    pub fn set(&mut self, kind: ResponseKind, count: usize) {
        self.counts[kind.index()] = count;
    }

    pub fn get(&self, kind: ResponseKind) -> usize {
        self.counts[kind.index()]
    }

    pub fn counts(&self) -> &[usize; ResponseKind::COUNT] {
        &self.counts
    }

    pub fn has(&self, kind: ResponseKind) -> bool {
        self.get(kind) > 0
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Kinds with a non-zero count, in canonical order.
    pub fn used_kinds(&self) -> impl Iterator<Item = ResponseKind> + '_ {
        ResponseKind::ALL.into_iter().filter(|k| self.has(*k))
    }

    /// Slice range of `kind` inside a flat buffer laid out in canonical order.
    pub fn range(&self, kind: ResponseKind) -> Range<usize> {
        let start: usize = self.counts[..kind.index()].iter().sum();
        start..start + self.get(kind)
    }

    /// Element-wise sum, used when several controls share one setup.
    pub fn add(&self, other: &SizeSpec) -> SizeSpec {
        let mut counts = self.counts;
        for (c, o) in counts.iter_mut().zip(other.counts.iter()) {
            *c += o;
        }
        SizeSpec { counts }
    }

    /// Header words for the `Setup` handshake, in canonical order.
    pub fn to_wire(&self) -> CoreResult<[i32; ResponseKind::COUNT]> {
        let mut words = [0_i32; ResponseKind::COUNT];
        for (w, &c) in words.iter_mut().zip(self.counts.iter()) {
            if c > Self::MAX_WIRE_COUNT {
                return Err(CoreError::InvalidArg {
                    what: "size count exceeds wire limit",
                });
            }
            *w = i32::try_from(c).map_err(|_| CoreError::InvalidArg {
                what: "size count exceeds wire range",
            })?;
        }
        Ok(words)
    }

    /// Counts above [`MAX_WIRE_COUNT`](Self::MAX_WIRE_COUNT) are refused
    /// before anything is allocated for them.
    pub fn from_wire(words: &[i32; ResponseKind::COUNT]) -> CoreResult<Self> {
        let mut counts = [0_usize; ResponseKind::COUNT];
        for (c, &w) in counts.iter_mut().zip(words.iter()) {
            *c = usize::try_from(w).map_err(|_| CoreError::InvalidArg {
                what: "negative size count",
            })?;
            if *c > Self::MAX_WIRE_COUNT {
                return Err(CoreError::InvalidArg {
                    what: "size count exceeds wire limit",
                });
            }
        }
        Ok(Self { counts })
    }
}

impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.counts;
        write!(
            f,
            "[disp={}, vel={}, accel={}, force={}, time={}]",
            c[0], c[1], c[2], c[3], c[4]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_follow_canonical_order() {
        let size = SizeSpec::new([2, 1, 0, 3, 1]);
        assert_eq!(size.range(ResponseKind::Disp), 0..2);
        assert_eq!(size.range(ResponseKind::Vel), 2..3);
        assert_eq!(size.range(ResponseKind::Accel), 3..3);
        assert_eq!(size.range(ResponseKind::Force), 3..6);
        assert_eq!(size.range(ResponseKind::Time), 6..7);
        assert_eq!(size.total(), 7);
    }

    #[test]
    fn used_kinds_skip_zero_counts() {
        let size = SizeSpec::default()
            .with(ResponseKind::Disp, 2)
            .with(ResponseKind::Force, 2);
        let used: Vec<_> = size.used_kinds().collect();
        assert_eq!(used, vec![ResponseKind::Disp, ResponseKind::Force]);
    }

    #[test]
    fn wire_words_reject_negative_counts() {
        let size = SizeSpec::new([1, 0, 0, 1, 1]);
        let words = size.to_wire().unwrap();
        assert_eq!(words, [1, 0, 0, 1, 1]);
        assert_eq!(SizeSpec::from_wire(&words).unwrap(), size);
        assert!(SizeSpec::from_wire(&[1, -1, 0, 0, 0]).is_err());
    }

    #[test]
    fn wire_counts_are_capped() {
        let limit = SizeSpec::MAX_WIRE_COUNT as i32;
        assert!(SizeSpec::from_wire(&[limit, 0, 0, 0, 0]).is_ok());
        assert!(SizeSpec::from_wire(&[limit + 1, 0, 0, 0, 0]).is_err());
        assert!(SizeSpec::from_wire(&[0, 0, 0, i32::MAX, 0]).is_err());
        let big = SizeSpec::default().with(ResponseKind::Disp, SizeSpec::MAX_WIRE_COUNT + 1);
        assert!(big.to_wire().is_err());
    }

    #[test]
    fn add_sums_per_kind() {
        let a = SizeSpec::new([1, 1, 0, 1, 0]);
        let b = SizeSpec::new([2, 0, 0, 2, 1]);
        assert_eq!(a.add(&b), SizeSpec::new([3, 1, 0, 3, 1]));
    }
}
