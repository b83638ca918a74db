//! HyperLogLog++ sketch estimates number of distinct elements in the stream or dataset
//! and is defined with two precision parameters:
//! - `precision` in [10..24] range, which defines number of bits used for indices of
//!   `2^precision` dense registers;
//! - `sparse_precision`, either 0 or in [precision..25] range, which defines number of
//!   bits used for indices of sparse registers. 0 disables sparse representation.
//!
//! Relative error of the estimate is `1.04 / sqrt(2^precision)`.
//!
//! # Data storage format
//! Sketch stores data in one of the three representations:
//! - `Empty`   - no value was observed yet, no memory is used;
//! - `Sparse`  - sorted sparse codes, up to `3/4 * 2^precision` bytes;
//! - `Dense`   - `2^precision` one byte registers.
//!
//! Representation only moves forward: `Empty -> Sparse -> Dense`, or `Empty -> Dense`
//! when sparse precision is 0.
//!
//! Serialized sketches are binary compatible with zetasketch and BigQuery
//! `HLL_COUNT` functions.

use std::fmt::{Debug, Formatter};

use log::debug;

use crate::dense::DenseRepresentation;
use crate::error::{Result, SketchError};
use crate::fingerprint::Fingerprint;
use crate::proto::{
    AggregatorStateProto, AggregatorType, HyperLogLogPlusUniqueStateProto, ENCODING_VERSION,
};
use crate::representation::{EmptyRepresentation, Representation, RepresentationTrait};
use crate::sparse::SparseRepresentation;

/// Minimum supported precision
pub const MIN_PRECISION: u8 = 10;
/// Maximum supported precision
pub const MAX_PRECISION: u8 = 24;
/// Maximum supported sparse precision
pub const MAX_SPARSE_PRECISION: u8 = 25;

#[derive(Clone)]
pub struct HyperLogLogPlusPlus {
    precision: u8,
    sparse_precision: u8,
    /// Number of values added, including duplicates
    num_values: u64,
    representation: Representation,
}

/// Validate pair of precisions, never clamping them.
pub(crate) fn validate_precisions(precision: u8, sparse_precision: u8) -> Result<()> {
    if !(MIN_PRECISION..=MAX_PRECISION).contains(&precision) {
        return Err(SketchError::InvalidPrecision(precision));
    }
    if sparse_precision != 0
        && !(precision..=MAX_SPARSE_PRECISION).contains(&sparse_precision)
    {
        return Err(SketchError::InvalidSparsePrecision {
            precision,
            sparse_precision,
        });
    }
    Ok(())
}

impl HyperLogLogPlusPlus {
    /// Creates new empty instance of `HyperLogLogPlusPlus`
    pub fn new(precision: u8, sparse_precision: u8) -> Result<Self> {
        validate_precisions(precision, sparse_precision)?;
        Ok(Self {
            precision,
            sparse_precision,
            num_values: 0,
            representation: EmptyRepresentation.into(),
        })
    }

    #[inline]
    pub fn precision(&self) -> u8 {
        self.precision
    }

    #[inline]
    pub fn sparse_precision(&self) -> u8 {
        self.sparse_precision
    }

    /// Return number of added values, including duplicates
    #[inline]
    pub fn num_values(&self) -> u64 {
        self.num_values
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self.representation, Representation::Empty(_))
    }

    #[inline]
    pub fn is_sparse(&self) -> bool {
        matches!(self.representation, Representation::Sparse(_))
    }

    #[inline]
    pub fn is_dense(&self) -> bool {
        matches!(self.representation, Representation::Dense(_))
    }

    /// Insert a value into `HyperLogLogPlusPlus`
    #[inline]
    pub fn insert<T: Fingerprint + ?Sized>(&mut self, value: &T) -> Result<()> {
        let hash = value.fingerprint()?;
        self.insert_hash(hash);
        Ok(())
    }

    /// Insert fingerprint of a value into `HyperLogLogPlusPlus`
    pub fn insert_hash(&mut self, hash: u64) {
        self.num_values = self.num_values.saturating_add(1);
        if self.is_empty() {
            self.representation = self.initial_representation();
        }

        match &mut self.representation {
            Representation::Sparse(sparse) => {
                sparse.insert_hash(hash);
                if sparse.over_max() {
                    self.promote();
                }
            }
            Representation::Dense(dense) => dense.insert_hash(hash),
            Representation::Empty(_) => {}
        }
    }

    /// Insert fingerprints of many values into `HyperLogLogPlusPlus`
    #[inline]
    pub fn insert_hashes(&mut self, hashes: impl IntoIterator<Item = u64>) {
        hashes.into_iter().for_each(|h| self.insert_hash(h));
    }

    /// Return cardinality estimate
    #[inline]
    pub fn estimate(&self) -> u64 {
        self.representation.estimate()
    }

    /// Merge `rhs` into `self`, reducing precisions of `self` to the lower of both.
    ///
    /// `rhs` is never modified.
    pub fn merge(&mut self, rhs: &Self) {
        self.num_values = self.num_values.saturating_add(rhs.num_values);
        if rhs.is_empty() {
            return;
        }

        let precision = self.precision.min(rhs.precision);
        let sparse_precision = if self.sparse_precision == 0 || rhs.sparse_precision == 0 {
            0
        } else {
            self.sparse_precision.min(rhs.sparse_precision)
        };
        self.reduce(precision, sparse_precision);

        if self.is_empty() {
            self.representation = if rhs.is_dense() {
                DenseRepresentation::new(self.precision).into()
            } else {
                self.initial_representation()
            };
        }
        if self.is_sparse() && rhs.is_dense() {
            self.promote();
        }

        match (&mut self.representation, &rhs.representation) {
            (Representation::Sparse(lhs), Representation::Sparse(rhs)) => {
                lhs.merge(rhs);
                if lhs.over_max() {
                    self.promote();
                }
            }
            (Representation::Dense(lhs), Representation::Dense(rhs)) => lhs.merge(rhs),
            (Representation::Dense(lhs), Representation::Sparse(rhs)) => {
                lhs.fold(rhs.registers(), rhs.precision())
            }
            _ => {}
        }
    }

    /// Reduce precisions to `precision` and `sparse_precision`.
    ///
    /// Each precision is only ever lowered, requests to increase it are ignored.
    /// Sparse precision 0 disables sparse representation.
    pub fn downgrade(&mut self, precision: u8, sparse_precision: u8) -> Result<()> {
        validate_precisions(precision, sparse_precision)?;
        let precision = self.precision.min(precision);
        let sparse_precision = if self.sparse_precision == 0 || sparse_precision == 0 {
            0
        } else {
            self.sparse_precision.min(sparse_precision)
        };
        self.reduce(precision, sparse_precision);
        Ok(())
    }

    /// Reset to empty state keeping precisions
    #[inline]
    pub fn clear(&mut self) {
        self.num_values = 0;
        self.representation = EmptyRepresentation.into();
    }

    /// Return memory size of the active representation
    #[inline]
    pub fn size_of(&self) -> usize {
        self.representation.size_of()
    }

    /// Return serialized state of `HyperLogLogPlusPlus`
    pub fn to_proto(&self) -> AggregatorStateProto {
        let mut state = HyperLogLogPlusUniqueStateProto {
            precision_or_num_buckets: Some(i32::from(self.precision)),
            sparse_precision_or_num_buckets: (self.sparse_precision != 0)
                .then(|| i32::from(self.sparse_precision)),
            ..Default::default()
        };
        match &self.representation {
            Representation::Empty(_) => {}
            Representation::Sparse(sparse) => {
                let (bytes, size) = sparse.to_bytes();
                // at most 2^25 codes
                state.sparse_size = Some(size as i32);
                state.sparse_data = Some(bytes);
            }
            Representation::Dense(dense) => state.data = Some(dense.registers().to_vec()),
        }

        AggregatorStateProto {
            type_: Some(AggregatorType::HyperLogLogPlusUnique.value()),
            num_values: Some(i64::try_from(self.num_values).unwrap_or(i64::MAX)),
            encoding_version: Some(ENCODING_VERSION),
            value_type: None,
            hyperloglogplus_unique_state: Some(state),
        }
    }

    /// Serialize `HyperLogLogPlusPlus` into bytes
    #[inline]
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_proto().write_to_bytes()
    }

    /// Create new instance of `HyperLogLogPlusPlus` from serialized state
    pub fn from_proto(msg: &AggregatorStateProto) -> Result<Self> {
        let aggregator_type = msg.aggregator_type();
        if aggregator_type != AggregatorType::HyperLogLogPlusUnique.value() {
            return Err(SketchError::UnexpectedType(aggregator_type));
        }
        let encoding_version = msg.encoding_version();
        if encoding_version != ENCODING_VERSION {
            return Err(SketchError::UnsupportedEncodingVersion(encoding_version));
        }
        let num_values = msg
            .num_values
            .ok_or(SketchError::MissingField("num_values"))?;
        let num_values = u64::try_from(num_values).map_err(|_| {
            SketchError::CorruptedData(format!("negative number of values {}", num_values))
        })?;
        let state = msg
            .hyperloglogplus_unique_state
            .as_ref()
            .ok_or(SketchError::MissingField("hyperloglogplus_unique_state"))?;

        let precision = state
            .precision_or_num_buckets
            .ok_or(SketchError::MissingField("precision_or_num_buckets"))?;
        let precision = u8::try_from(precision)
            .map_err(|_| SketchError::CorruptedData(format!("precision {} out of range", precision)))?;
        let sparse_precision = state.sparse_precision_or_num_buckets.unwrap_or(0);
        let sparse_precision = u8::try_from(sparse_precision).map_err(|_| {
            SketchError::CorruptedData(format!("sparse precision {} out of range", sparse_precision))
        })?;
        validate_precisions(precision, sparse_precision)?;

        let data = state.data.as_ref().filter(|d| !d.is_empty());
        let representation: Representation = match (data, &state.sparse_data) {
            (Some(_), Some(_)) => {
                return Err(SketchError::CorruptedData(
                    "both dense and sparse data present".to_string(),
                ))
            }
            (Some(data), None) => {
                DenseRepresentation::from_registers(precision, data.clone())?.into()
            }
            (None, Some(_)) if sparse_precision == 0 => {
                return Err(SketchError::CorruptedData(
                    "sparse data present with sparse precision 0".to_string(),
                ))
            }
            (None, Some(sparse_data)) => {
                let size = match state.sparse_size {
                    Some(size) => Some(usize::try_from(size).map_err(|_| {
                        SketchError::CorruptedData(format!("negative sparse size {}", size))
                    })?),
                    None => None,
                };
                let sparse = SparseRepresentation::from_bytes(
                    precision,
                    sparse_precision,
                    sparse_data,
                    size,
                )?;
                if sparse.is_empty() {
                    EmptyRepresentation.into()
                } else {
                    sparse.into()
                }
            }
            (None, None) => EmptyRepresentation.into(),
        };

        let mut sketch = Self {
            precision,
            sparse_precision,
            num_values,
            representation,
        };
        // sparse data beyond the promotion threshold is only valid in dense form
        if matches!(&sketch.representation, Representation::Sparse(sparse) if sparse.over_max()) {
            sketch.promote();
        }
        debug!(
            "restored {} sketch with precisions ({}, {}) and {} values",
            sketch.representation.name(),
            precision,
            sparse_precision,
            num_values
        );
        Ok(sketch)
    }

    /// Create new instance of `HyperLogLogPlusPlus` from serialized bytes
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_proto(&AggregatorStateProto::parse_from_bytes(bytes)?)
    }

    #[inline]
    fn initial_representation(&self) -> Representation {
        if self.sparse_precision == 0 {
            DenseRepresentation::new(self.precision).into()
        } else {
            SparseRepresentation::new(self.precision, self.sparse_precision).into()
        }
    }

    /// Convert sparse representation into dense at current precision
    fn promote(&mut self) {
        if let Representation::Sparse(sparse) = &self.representation {
            let mut dense = sparse.to_dense();
            dense.downgrade(self.precision);
            debug!(
                "promoting sparse sketch with {} bytes of codes to {} dense registers",
                sparse.size_of(),
                dense.registers().len()
            );
            self.representation = dense.into();
        }
    }

    /// Lower precisions to already validated and reconciled values
    fn reduce(&mut self, precision: u8, sparse_precision: u8) {
        if precision == self.precision && sparse_precision == self.sparse_precision {
            return;
        }
        debug!(
            "downgrading {} sketch from precisions ({}, {}) to ({}, {})",
            self.representation.name(),
            self.precision,
            self.sparse_precision,
            precision,
            sparse_precision
        );
        self.precision = precision;
        self.sparse_precision = sparse_precision;

        if sparse_precision == 0 {
            self.promote();
        }
        match &mut self.representation {
            Representation::Sparse(sparse) => {
                sparse.downgrade(precision, sparse_precision);
                if sparse.over_max() {
                    self.promote();
                }
            }
            Representation::Dense(dense) => dense.downgrade(precision),
            Representation::Empty(_) => {}
        }
    }
}

impl Debug for HyperLogLogPlusPlus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ representation: {}, estimate: {}, size: {} }}",
            self.representation.name(),
            self.estimate(),
            self.size_of()
        )
    }
}
