//! ## Sparse representation
//! Estimates small cardinalities with higher accuracy and lower memory footprint than
//! `M = 2^P` registers, by storing only observed registers at sparse precision `PP`.
//!
//! Every inserted hash is encoded into a 32-bit sparse code (see `encoding` module):
//! - data          - stores sorted codes as delta varints, one code per sparse index;
//! - buffer        - stores codes inserted since the last flush.
//!
//! Buffer is flushed into data once it holds `M / 4` codes. Representation must be
//! converted to dense once data exceeds `3 * M / 4` bytes.

use std::iter::Peekable;
use std::mem::size_of;

use hashbrown::HashSet;
use log::trace;

use crate::dense::DenseRepresentation;
use crate::encoding::SparseEncoding;
use crate::error::{Result, SketchError};
use crate::representation::RepresentationTrait;
use crate::varint::{DeltaVarints, VarintPool};

#[derive(Clone)]
pub(crate) struct SparseRepresentation {
    encoding: SparseEncoding,
    /// Sorted codes, unique per sparse index
    data: DeltaVarints,
    /// Codes inserted since the last flush
    buffer: HashSet<u32>,
    /// Sequences reused by flushes
    pool: VarintPool,
    /// Maximum number of data bytes before conversion to dense
    max_data_len: usize,
    /// Number of buffered codes triggering a flush
    max_buffer_len: usize,
}

impl SparseRepresentation {
    /// Create new empty instance of `SparseRepresentation`
    pub(crate) fn new(precision: u8, sparse_precision: u8) -> Self {
        let m = 1usize << precision;
        let max_data_len = m * 3 / 4;
        let max_buffer_len = m / 4;
        Self {
            encoding: SparseEncoding::new(precision, sparse_precision),
            data: DeltaVarints::with_capacity(max_data_len),
            buffer: HashSet::with_capacity(max_buffer_len),
            pool: VarintPool::default(),
            max_data_len,
            max_buffer_len,
        }
    }

    /// Create new instance of `SparseRepresentation` from serialized sparse data
    /// holding `size` codes.
    pub(crate) fn from_bytes(
        precision: u8,
        sparse_precision: u8,
        bytes: &[u8],
        size: Option<usize>,
    ) -> Result<Self> {
        let mut sparse = Self::new(precision, sparse_precision);
        let stored = DeltaVarints::from_bytes(bytes)?;

        if let Some(size) = size {
            if size != stored.count() {
                return Err(SketchError::CorruptedData(format!(
                    "sparse size {} does not match {} stored codes",
                    size,
                    stored.count()
                )));
            }
        }
        if let Some(code) = stored.iter().find(|&c| !sparse.encoding.is_valid(c)) {
            return Err(SketchError::CorruptedData(format!(
                "invalid sparse code {:#x} for precisions ({}, {})",
                code, precision, sparse_precision
            )));
        }

        // codes of the same sparse index are collapsed into the highest one
        let mut data = sparse.pool.acquire(stored.len_bytes());
        data.extend(MergedCodes::new(
            sparse.encoding,
            stored.iter(),
            std::iter::empty(),
        ));
        sparse.data = data;
        Ok(sparse)
    }

    #[inline]
    pub(crate) fn precision(&self) -> u8 {
        self.encoding.precision
    }

    #[inline]
    pub(crate) fn sparse_precision(&self) -> u8 {
        self.encoding.sparse_precision
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.data.is_empty() && self.buffer.is_empty()
    }

    /// Insert hash into `SparseRepresentation`
    #[inline]
    pub(crate) fn insert_hash(&mut self, hash: u64) {
        let code = self.encoding.encode(hash);
        self.buffer.insert(code);
        if self.buffer.len() >= self.max_buffer_len {
            self.flush();
        }
    }

    /// Merge buffered codes into sorted data
    pub(crate) fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let mut buffered: Vec<u32> = self.buffer.drain().collect();
        buffered.sort_unstable();

        let mut merged = self.pool.acquire(self.data.len_bytes() + buffered.len() * 2);
        merged.extend(MergedCodes::new(
            self.encoding,
            self.data.iter(),
            buffered.iter().copied(),
        ));

        trace!(
            "flushed {} buffered codes, sparse data grew from {} to {} bytes",
            buffered.len(),
            self.data.len_bytes(),
            merged.len_bytes()
        );

        let old = std::mem::replace(&mut self.data, merged);
        self.pool.release(old);
    }

    /// Return whether representation must be converted to dense
    #[inline]
    pub(crate) fn over_max(&self) -> bool {
        self.data.len_bytes() > self.max_data_len
    }

    /// Return sorted codes of data and buffer, one code per sparse index
    pub(crate) fn codes(&self) -> impl Iterator<Item = u32> + '_ {
        let mut buffered: Vec<u32> = self.buffer.iter().copied().collect();
        buffered.sort_unstable();
        MergedCodes::new(self.encoding, self.data.iter(), buffered.into_iter())
    }

    /// Return normal index and rank of every observed register, once per sparse index
    pub(crate) fn registers(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        self.codes().map(|c| self.encoding.decode(c))
    }

    /// Convert into `DenseRepresentation`
    pub(crate) fn to_dense(&self) -> DenseRepresentation {
        let mut dense = DenseRepresentation::new(self.precision());
        for (idx, rank) in self.registers() {
            dense.update_rank(idx, rank);
        }
        dense
    }

    /// Merge codes of `rhs`, which must have greater or equal precisions.
    pub(crate) fn merge(&mut self, rhs: &SparseRepresentation) {
        for code in rhs.codes() {
            self.buffer.insert(rhs.encoding.downgrade(code, &self.encoding));
        }
        self.flush();
    }

    /// Re-encode codes for lower or equal precisions.
    pub(crate) fn downgrade(&mut self, precision: u8, sparse_precision: u8) {
        let target = SparseEncoding::new(precision, sparse_precision);
        if target == self.encoding {
            return;
        }
        let mut downgraded = Self::new(precision, sparse_precision);
        for code in self.codes() {
            downgraded
                .buffer
                .insert(self.encoding.downgrade(code, &target));
        }
        downgraded.flush();
        *self = downgraded;
    }

    /// Return data bytes including buffered codes, and the number of stored codes
    pub(crate) fn to_bytes(&self) -> (Vec<u8>, usize) {
        if self.buffer.is_empty() {
            return (self.data.as_bytes().to_vec(), self.data.count());
        }
        let mut merged = DeltaVarints::with_capacity(self.data.len_bytes() + self.buffer.len() * 2);
        merged.extend(self.codes());
        (merged.as_bytes().to_vec(), merged.count())
    }
}

impl RepresentationTrait for SparseRepresentation {
    /// Return cardinality estimate of `SparseRepresentation`,
    /// linear counting over `2^PP` sparse buckets.
    fn estimate(&self) -> u64 {
        let count = if self.buffer.is_empty() {
            self.data.count()
        } else {
            self.codes().count()
        };
        let m = (1u64 << self.sparse_precision()) as f64;
        let zeros = m - count as f64;
        if zeros <= 0.0 {
            // every sparse bucket is occupied
            return self.to_dense().estimate();
        }
        (m * (m / zeros).ln() + 0.5) as u64
    }

    /// Return memory size of `SparseRepresentation`
    #[inline]
    fn size_of(&self) -> usize {
        self.data.len_bytes() + self.buffer.len() * size_of::<u32>()
    }
}

impl std::fmt::Debug for SparseRepresentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_string())
    }
}

/// Ascending merge of two sorted code sequences, yielding the highest code of every
/// sparse index once.
struct MergedCodes<A: Iterator<Item = u32>, B: Iterator<Item = u32>> {
    encoding: SparseEncoding,
    lhs: Peekable<A>,
    rhs: Peekable<B>,
}

impl<A: Iterator<Item = u32>, B: Iterator<Item = u32>> MergedCodes<A, B> {
    #[inline]
    fn new(encoding: SparseEncoding, lhs: A, rhs: B) -> Self {
        Self {
            encoding,
            lhs: lhs.peekable(),
            rhs: rhs.peekable(),
        }
    }

    #[inline]
    fn peek_sorted(&mut self) -> Option<u32> {
        match (self.lhs.peek(), self.rhs.peek()) {
            (Some(&l), Some(&r)) => Some(l.min(r)),
            (Some(&l), None) => Some(l),
            (None, Some(&r)) => Some(r),
            (None, None) => None,
        }
    }

    #[inline]
    fn next_sorted(&mut self) -> Option<u32> {
        match (self.lhs.peek(), self.rhs.peek()) {
            (Some(&l), Some(&r)) if l < r => self.lhs.next(),
            (Some(&l), Some(&r)) if r < l => self.rhs.next(),
            (Some(_), Some(_)) => {
                self.rhs.next();
                self.lhs.next()
            }
            (Some(_), None) => self.lhs.next(),
            (None, _) => self.rhs.next(),
        }
    }
}

impl<A: Iterator<Item = u32>, B: Iterator<Item = u32>> Iterator for MergedCodes<A, B> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let mut code = self.next_sorted()?;
        let sparse_index = self.encoding.sparse_index(code);
        while let Some(next) = self.peek_sorted() {
            if self.encoding.sparse_index(next) != sparse_index {
                break;
            }
            code = next;
            self.next_sorted();
        }
        Some(code)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::fingerprint::Fingerprint;
    use test_case::test_case;

    fn sparse_of(p: u8, pp: u8, values: impl Iterator<Item = u64>) -> SparseRepresentation {
        let mut sparse = SparseRepresentation::new(p, pp);
        for v in values {
            sparse.insert_hash(v.fingerprint().unwrap());
        }
        sparse
    }

    #[test]
    fn test_duplicates() {
        let mut sparse = SparseRepresentation::new(12, 17);
        sparse.insert_hash(1);
        sparse.flush();
        assert_eq!(sparse.data.count(), 1);

        sparse.insert_hash(1);
        sparse.flush();
        assert_eq!(sparse.data.count(), 1);

        // hashes 1 and 2 share sparse index 0, the highest rank is kept
        sparse.insert_hash(1);
        sparse.insert_hash(2);
        sparse.insert_hash(1);
        sparse.flush();
        assert_eq!(sparse.data.count(), 1);
        assert_eq!(sparse.codes().collect::<Vec<_>>(), vec![0x4002f]);
        assert_eq!(sparse.registers().collect::<Vec<_>>(), vec![(0, 52)]);
    }

    #[test]
    fn test_codes_include_buffer() {
        let mut sparse = SparseRepresentation::new(12, 17);
        sparse.insert_hash(2);
        sparse.flush();
        sparse.insert_hash(1);
        sparse.insert_hash(u64::MAX);
        assert_eq!(
            sparse.codes().collect::<Vec<_>>(),
            vec![(1 << 17) - 1, 0x4002f]
        );
        assert_eq!(sparse.estimate(), 2);
        assert_eq!(sparse.data.count(), 1);
    }

    #[test_case(1 => 1)]
    #[test_case(10 => 10)]
    #[test_case(100 => 100)]
    #[test_case(300 => 301)]
    #[test_case(700 => 702)]
    fn test_estimate_p10_pp15(n: u64) -> u64 {
        sparse_of(10, 15, 0..n).estimate()
    }

    #[test]
    fn test_estimate_with_duplicates() {
        let sparse = sparse_of(15, 20, (0..1_000).chain(500..1_000));
        assert_eq!(sparse.estimate(), 1_000);
        assert_eq!(sparse.codes().count(), 1_000);
        assert!(!sparse.over_max());
    }

    #[test]
    fn test_estimate_p12_pp17() {
        // regression value computed by this implementation
        let mut sparse = sparse_of(12, 17, 0..800);
        assert_eq!(sparse.estimate(), 802);
        sparse.flush();
        assert_eq!(sparse.data.count(), 800);
        assert_eq!(sparse.data.len_bytes(), 1180);
        assert!(!sparse.over_max());
    }

    #[test]
    fn test_over_max() {
        let mut sparse = sparse_of(10, 15, 0..768);
        assert!(!sparse.over_max());
        assert_eq!(sparse.estimate(), 771);
        sparse.insert_hash(768u64.fingerprint().unwrap());
        assert!(sparse.over_max());
    }

    #[test]
    fn test_to_dense() {
        let sparse = sparse_of(10, 15, 0..700);
        let mut dense = DenseRepresentation::new(10);
        for v in 0..700u64 {
            dense.insert_hash(v.fingerprint().unwrap());
        }
        assert_eq!(sparse.to_dense(), dense);
    }

    #[test]
    fn test_merge() {
        let mut lhs = sparse_of(15, 20, (0..1_000).chain(500..1_000));
        let rhs = sparse_of(15, 20, 800..1_200);
        lhs.merge(&rhs);
        assert_eq!(lhs.estimate(), 1_201);
        assert_eq!(rhs.estimate(), 400);
    }

    #[test_case(15, 20, 12, 17)]
    #[test_case(15, 20, 15, 18)]
    #[test_case(12, 25, 10, 10)]
    fn test_merge_finer_equals_direct(p: u8, pp: u8, q: u8, qq: u8) {
        let mut lhs = sparse_of(q, qq, 0..300);
        let rhs = sparse_of(p, pp, 200..500);
        lhs.merge(&rhs);
        assert_eq!(
            lhs.codes().collect::<Vec<_>>(),
            sparse_of(q, qq, 0..500).codes().collect::<Vec<_>>()
        );
    }

    #[test_case(15, 20, 12, 17)]
    #[test_case(15, 20, 15, 15)]
    #[test_case(12, 25, 10, 11)]
    fn test_downgrade_equals_direct(p: u8, pp: u8, q: u8, qq: u8) {
        let mut sparse = sparse_of(p, pp, 0..500);
        sparse.downgrade(q, qq);
        assert_eq!((sparse.precision(), sparse.sparse_precision()), (q, qq));
        assert_eq!(
            sparse.codes().collect::<Vec<_>>(),
            sparse_of(q, qq, 0..500).codes().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_bytes_round_trip() {
        let sparse = sparse_of(10, 15, 0..100);
        let (bytes, size) = sparse.to_bytes();
        assert_eq!(size, 100);
        let restored = SparseRepresentation::from_bytes(10, 15, &bytes, Some(size)).unwrap();
        assert_eq!(restored.estimate(), sparse.estimate());
        assert_eq!(
            restored.codes().collect::<Vec<_>>(),
            sparse.codes().collect::<Vec<_>>()
        );

        assert!(matches!(
            SparseRepresentation::from_bytes(10, 15, &bytes, Some(99)),
            Err(SketchError::CorruptedData(_))
        ));
    }

    #[test]
    fn test_from_bytes_collapses_sparse_index() {
        let encoding = SparseEncoding::new(12, 17);
        let mut data = DeltaVarints::default();
        data.push(encoding.encode(2));
        data.push(encoding.encode(1));
        let sparse = SparseRepresentation::from_bytes(12, 17, data.as_bytes(), Some(2)).unwrap();
        assert_eq!(sparse.codes().collect::<Vec<_>>(), vec![0x4002f]);
    }

    #[test]
    fn test_estimate_all_buckets_occupied() {
        // flagged codes of rank 1, one per bucket
        let mut data = DeltaVarints::default();
        data.extend((0..1024u32).map(|idx| (1 << 16) | (idx << 6) | 1));
        let sparse = SparseRepresentation::from_bytes(10, 10, data.as_bytes(), Some(1024)).unwrap();
        assert!(sparse.over_max());

        let mut dense = DenseRepresentation::new(10);
        (0..1024).for_each(|idx| dense.update_rank(idx, 1));
        assert_eq!(sparse.estimate(), dense.estimate());
        assert!(sparse.estimate() < 2_000);
    }

    #[test_case(&[0x00]; "unflagged code without low bits")]
    #[test_case(&[0x80, 0x80, 0x10]; "flagged code with zero rank")]
    #[test_case(&[0x80, 0x80, 0x20]; "code above flag")]
    fn test_from_invalid_codes(bytes: &[u8]) {
        assert!(matches!(
            SparseRepresentation::from_bytes(12, 17, bytes, None),
            Err(SketchError::CorruptedData(_))
        ));
    }
}
