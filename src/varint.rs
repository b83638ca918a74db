//! ## Delta varint sequence
//! Ascending sequence of `u32` values stored as differences between consecutive
//! values, each encoded as an unsigned LEB128 varint. The first value is stored as
//! its difference from zero.
//!
//! This byte layout is the `sparse_data` field of the serialized sketch, varints are
//! read and written with the protobuf coded streams.

use protobuf::{CodedInputStream, CodedOutputStream};

use crate::error::{Result, SketchError};

#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub(crate) struct DeltaVarints {
    /// Varint encoded deltas
    bytes: Vec<u8>,
    /// Last appended value
    last: u32,
    /// Number of stored values
    count: usize,
}

impl DeltaVarints {
    #[inline]
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            last: 0,
            count: 0,
        }
    }

    /// Decode sequence from bytes, rejecting malformed varints and unordered values.
    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut seq = Self::with_capacity(bytes.len());
        let mut is = CodedInputStream::from_bytes(bytes);
        while !is.eof()? {
            let delta = is.read_raw_varint32().map_err(|e| {
                SketchError::CorruptedData(format!("malformed varint in sparse data: {}", e))
            })?;
            if seq.count > 0 && delta == 0 {
                return Err(SketchError::CorruptedData(
                    "duplicate value in sparse data".to_string(),
                ));
            }
            let value = seq.last.checked_add(delta).ok_or_else(|| {
                SketchError::CorruptedData("sparse data value overflows 32 bits".to_string())
            })?;
            seq.push(value);
        }
        Ok(seq)
    }

    /// Number of stored values
    #[inline]
    pub(crate) fn count(&self) -> usize {
        self.count
    }

    /// Number of encoded bytes
    #[inline]
    pub(crate) fn len_bytes(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Append `value`, which must not be lower than the last appended value.
    /// Value equal to the last appended one is ignored.
    #[inline]
    pub(crate) fn push(&mut self, value: u32) {
        self.extend(std::iter::once(value));
    }

    /// Append ascending `values`, ignoring values equal to the last appended one.
    pub(crate) fn extend(&mut self, values: impl IntoIterator<Item = u32>) {
        let mut os = CodedOutputStream::vec(&mut self.bytes);
        let mut written = Ok(());
        for value in values {
            debug_assert!(self.count == 0 || value >= self.last);
            if self.count > 0 && value == self.last {
                continue;
            }
            written = written.and_then(|()| os.write_raw_varint32(value - self.last));
            self.last = value;
            self.count += 1;
        }
        written = written.and_then(|()| os.flush());
        // vector output only grows the vector and cannot fail
        debug_assert!(written.is_ok());
    }

    /// Reset to empty sequence keeping allocated capacity
    #[inline]
    pub(crate) fn clear(&mut self) {
        self.bytes.clear();
        self.last = 0;
        self.count = 0;
    }

    #[inline]
    pub(crate) fn iter(&self) -> DeltaVarintsIter<'_> {
        DeltaVarintsIter {
            is: CodedInputStream::from_bytes(&self.bytes),
            last: 0,
        }
    }
}

/// Iterator over values of a validated sequence
pub(crate) struct DeltaVarintsIter<'a> {
    is: CodedInputStream<'a>,
    last: u32,
}

impl Iterator for DeltaVarintsIter<'_> {
    type Item = u32;

    #[inline]
    fn next(&mut self) -> Option<u32> {
        if self.is.eof().ok()? {
            return None;
        }
        let delta = self.is.read_raw_varint32().ok()?;
        self.last = self.last.wrapping_add(delta);
        Some(self.last)
    }
}

/// Pool of reusable sequences, so that flushes do not allocate in steady state.
#[derive(Clone, Default)]
pub(crate) struct VarintPool {
    free: Vec<DeltaVarints>,
}

impl VarintPool {
    /// Maximum number of sequences kept for reuse
    const MAX_FREE: usize = 2;

    /// Return empty sequence, reusing a released one when available
    #[inline]
    pub(crate) fn acquire(&mut self, capacity: usize) -> DeltaVarints {
        match self.free.pop() {
            Some(mut seq) => {
                seq.clear();
                seq.bytes.reserve(capacity);
                seq
            }
            None => DeltaVarints::with_capacity(capacity),
        }
    }

    /// Return sequence to the pool
    #[inline]
    pub(crate) fn release(&mut self, mut seq: DeltaVarints) {
        if self.free.len() < Self::MAX_FREE {
            seq.clear();
            self.free.push(seq);
        }
    }
}
