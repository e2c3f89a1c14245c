//! Per-kind response vectors and their flat-buffer layout.
//!
//! A [`Response`] holds at most one sub-vector per [`ResponseKind`]. An absent
//! slot means "no value supplied", which is distinct from a zero vector.
//! Packing into a flat buffer follows the canonical kind order and the counts
//! of a [`SizeSpec`]; a flat buffer cannot express absence, so absent slots
//! with a non-zero count are written as zeros.

use nalgebra::DVector;

use crate::{CoreError, CoreResult, ResponseKind, SizeSpec};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Response {
    slots: [Option<DVector<f64>>; ResponseKind::COUNT],
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a response from optional sub-vectors in canonical order.
    pub fn from_parts(
        disp: Option<DVector<f64>>,
        vel: Option<DVector<f64>>,
        accel: Option<DVector<f64>>,
        force: Option<DVector<f64>>,
        time: Option<DVector<f64>>,
    ) -> Self {
        Self {
            slots: [disp, vel, accel, force, time],
        }
    }

    /// Zero vectors for every kind with a non-zero count; other slots absent.
    pub fn zeros(size: &SizeSpec) -> Self {
        let mut out = Self::default();
        for kind in size.used_kinds() {
            out.slots[kind.index()] = Some(DVector::zeros(size.get(kind)));
        }
        out
    }

    pub fn with(mut self, kind: ResponseKind, values: DVector<f64>) -> Self {
        self.slots[kind.index()] = Some(values);
        self
    }

    pub fn get(&self, kind: ResponseKind) -> Option<&DVector<f64>> {
        self.slots[kind.index()].as_ref()
    }

    pub fn get_mut(&mut self, kind: ResponseKind) -> Option<&mut DVector<f64>> {
        self.slots[kind.index()].as_mut()
    }

    pub fn set(&mut self, kind: ResponseKind, values: Option<DVector<f64>>) {
        self.slots[kind.index()] = values;
    }

    pub fn take(&mut self, kind: ResponseKind) -> Option<DVector<f64>> {
        self.slots[kind.index()].take()
    }

    pub fn has(&self, kind: ResponseKind) -> bool {
        self.slots[kind.index()].is_some()
    }

    /// Present slots in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (ResponseKind, &DVector<f64>)> + '_ {
        ResponseKind::ALL
            .into_iter()
            .zip(self.slots.iter())
            .filter_map(|(k, s)| s.as_ref().map(|v| (k, v)))
    }

    /// Verifies that every present slot matches the count in `size`.
    pub fn check(&self, size: &SizeSpec) -> CoreResult<()> {
        for (kind, values) in self.iter() {
            let expected = size.get(kind);
            if values.len() != expected {
                return Err(CoreError::SizeMismatch {
                    kind,
                    expected,
                    found: values.len(),
                });
            }
        }
        Ok(())
    }

    /// Reports the first NaN or infinite entry of any present slot.
    pub fn ensure_finite(&self, what: &'static str) -> CoreResult<()> {
        match self.iter().flat_map(|(_, v)| v.iter()).find(|x| !x.is_finite()) {
            Some(&value) => Err(CoreError::NonFinite { what, value }),
            None => Ok(()),
        }
    }

    /// Packs the response into one flat buffer of `size.total()` values.
    pub fn flatten(&self, size: &SizeSpec) -> CoreResult<Vec<f64>> {
        self.check(size)?;
        let mut flat = vec![0.0; size.total()];
        for (kind, values) in self.iter() {
            flat[size.range(kind)].copy_from_slice(values.as_slice());
        }
        Ok(flat)
    }

    /// Unpacks a flat buffer; kinds with a zero count stay absent.
    pub fn assemble(flat: &[f64], size: &SizeSpec) -> CoreResult<Self> {
        if flat.len() != size.total() {
            return Err(CoreError::BufferLength {
                expected: size.total(),
                found: flat.len(),
            });
        }
        let mut out = Self::default();
        for kind in size.used_kinds() {
            out.slots[kind.index()] = Some(DVector::from_column_slice(&flat[size.range(kind)]));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_entries_are_reported() {
        let ok = Response::new().with(ResponseKind::Disp, DVector::from_vec(vec![0.0, -1.5]));
        assert!(ok.ensure_finite("trial").is_ok());

        let bad = ok.with(ResponseKind::Force, DVector::from_vec(vec![1.0, f64::INFINITY, f64::NAN]));
        match bad.ensure_finite("trial").unwrap_err() {
            CoreError::NonFinite { what, value } => {
                assert_eq!(what, "trial");
                assert!(value.is_infinite());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn flatten_follows_canonical_order() {
        let size = SizeSpec::new([2, 1, 0, 0, 0]);
        let trial = Response::new()
            .with(ResponseKind::Disp, DVector::from_vec(vec![1.0, 2.0]))
            .with(ResponseKind::Vel, DVector::from_vec(vec![3.0]))
            .with(ResponseKind::Force, DVector::zeros(0));

        let flat = trial.flatten(&size).unwrap();
        assert_eq!(flat, vec![1.0, 2.0, 3.0]);

        let back = Response::assemble(&flat, &size).unwrap();
        assert_eq!(back.get(ResponseKind::Disp).unwrap().as_slice(), &[1.0, 2.0]);
        assert_eq!(back.get(ResponseKind::Vel).unwrap().as_slice(), &[3.0]);
        assert!(!back.has(ResponseKind::Force));
    }

    #[test]
    fn absent_slots_are_zero_padded() {
        let size = SizeSpec::new([1, 0, 0, 2, 0]);
        let trial = Response::new().with(ResponseKind::Force, DVector::from_vec(vec![4.0, 5.0]));
        assert_eq!(trial.flatten(&size).unwrap(), vec![0.0, 4.0, 5.0]);
    }

    #[test]
    fn wrong_sub_vector_length_is_rejected() {
        let size = SizeSpec::new([2, 0, 0, 0, 0]);
        let trial = Response::new().with(ResponseKind::Disp, DVector::from_vec(vec![1.0]));
        assert_eq!(
            trial.flatten(&size),
            Err(CoreError::SizeMismatch {
                kind: ResponseKind::Disp,
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn assemble_rejects_wrong_buffer_length() {
        let size = SizeSpec::new([2, 0, 0, 0, 1]);
        let err = Response::assemble(&[1.0, 2.0], &size).unwrap_err();
        assert_eq!(
            err,
            CoreError::BufferLength {
                expected: 3,
                found: 2
            }
        );
    }
}
