//! Wire messages of serialized aggregators.
//!
//! Only the fields used by HyperLogLog++ sketches are modelled. Both messages are
//! encoded and decoded field by field with the `protobuf` coded streams:
//!
//! `AggregatorStateProto`:
//! - 1     - `type` (enum), defaults to `SUM` when absent
//! - 2     - `num_values` (int64)
//! - 3     - `encoding_version` (int32), defaults to 1 when absent
//! - 4     - `value_type` (int32)
//! - 112   - `HyperLogLogPlusUniqueStateProto` extension
//!
//! `HyperLogLogPlusUniqueStateProto`:
//! - 2     - `sparse_size` (int32)
//! - 3     - `precision_or_num_buckets` (int32)
//! - 4     - `sparse_precision_or_num_buckets` (int32)
//! - 5     - `data` (bytes), dense registers
//! - 6     - `sparse_data` (bytes), delta varint encoded sparse codes
//!
//! Unknown fields are skipped when decoding.

use std::fmt::{Display, Formatter};

use protobuf::rt::WireType;
use protobuf::{CodedInputStream, CodedOutputStream};

use crate::error::{Result, SketchError};

const TYPE_FIELD: u32 = 1;
const NUM_VALUES_FIELD: u32 = 2;
const ENCODING_VERSION_FIELD: u32 = 3;
const VALUE_TYPE_FIELD: u32 = 4;
const HYPERLOGLOGPLUS_UNIQUE_STATE_FIELD: u32 = 112;

const SPARSE_SIZE_FIELD: u32 = 2;
const PRECISION_FIELD: u32 = 3;
const SPARSE_PRECISION_FIELD: u32 = 4;
const DATA_FIELD: u32 = 5;
const SPARSE_DATA_FIELD: u32 = 6;

/// Encoding version written by and accepted from serialized sketches.
pub const ENCODING_VERSION: i32 = 2;
const DEFAULT_ENCODING_VERSION: i32 = 1;

/// Known aggregator types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AggregatorType {
    Sum,
    HyperLogLogPlusUnique,
}

impl AggregatorType {
    #[inline]
    pub fn value(self) -> i32 {
        match self {
            AggregatorType::Sum => 100,
            AggregatorType::HyperLogLogPlusUnique => 112,
        }
    }

    #[inline]
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            100 => Some(AggregatorType::Sum),
            112 => Some(AggregatorType::HyperLogLogPlusUnique),
            _ => None,
        }
    }

    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            AggregatorType::Sum => "SUM",
            AggregatorType::HyperLogLogPlusUnique => "HYPERLOGLOG_PLUS_UNIQUE",
        }
    }

    /// Return name of a raw enum value, including values unknown to this crate
    pub(crate) fn name_of(value: i32) -> String {
        match Self::from_i32(value) {
            Some(t) => t.name().to_string(),
            None => format!("UNKNOWN({})", value),
        }
    }
}

impl Display for AggregatorType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Serialized state of an aggregator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregatorStateProto {
    pub type_: Option<i32>,
    pub num_values: Option<i64>,
    pub encoding_version: Option<i32>,
    pub value_type: Option<i32>,
    pub hyperloglogplus_unique_state: Option<HyperLogLogPlusUniqueStateProto>,
}

/// Serialized state of a HyperLogLog++ sketch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HyperLogLogPlusUniqueStateProto {
    pub sparse_size: Option<i32>,
    pub precision_or_num_buckets: Option<i32>,
    pub sparse_precision_or_num_buckets: Option<i32>,
    pub data: Option<Vec<u8>>,
    pub sparse_data: Option<Vec<u8>>,
}

impl AggregatorStateProto {
    /// Return aggregator type, `SUM` when unset
    #[inline]
    pub fn aggregator_type(&self) -> i32 {
        self.type_.unwrap_or(AggregatorType::Sum.value())
    }

    /// Return encoding version, 1 when unset
    #[inline]
    pub fn encoding_version(&self) -> i32 {
        self.encoding_version.unwrap_or(DEFAULT_ENCODING_VERSION)
    }

    pub fn write_to_bytes(&self) -> Result<Vec<u8>> {
        let state = match &self.hyperloglogplus_unique_state {
            Some(state) => Some(state.write_to_bytes()?),
            None => None,
        };

        let mut bytes = Vec::new();
        let mut os = CodedOutputStream::vec(&mut bytes);
        if let Some(v) = self.type_ {
            os.write_enum(TYPE_FIELD, v)?;
        }
        if let Some(v) = self.num_values {
            os.write_int64(NUM_VALUES_FIELD, v)?;
        }
        if let Some(v) = self.encoding_version {
            os.write_int32(ENCODING_VERSION_FIELD, v)?;
        }
        if let Some(v) = self.value_type {
            os.write_int32(VALUE_TYPE_FIELD, v)?;
        }
        if let Some(state) = &state {
            os.write_bytes(HYPERLOGLOGPLUS_UNIQUE_STATE_FIELD, state)?;
        }
        os.flush()?;
        drop(os);
        Ok(bytes)
    }

    pub fn parse_from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut msg = Self::default();
        let mut is = CodedInputStream::from_bytes(bytes);
        while let Some(tag) = is.read_raw_tag_or_eof()? {
            let (field, wire_type) = unpack_tag(tag)?;
            match (field, wire_type) {
                (TYPE_FIELD, WireType::Varint) => msg.type_ = Some(is.read_int32()?),
                (NUM_VALUES_FIELD, WireType::Varint) => msg.num_values = Some(is.read_int64()?),
                (ENCODING_VERSION_FIELD, WireType::Varint) => {
                    msg.encoding_version = Some(is.read_int32()?)
                }
                (VALUE_TYPE_FIELD, WireType::Varint) => msg.value_type = Some(is.read_int32()?),
                (HYPERLOGLOGPLUS_UNIQUE_STATE_FIELD, WireType::LengthDelimited) => {
                    // repeated occurrences of a message field are merged
                    let bytes = is.read_bytes()?;
                    msg.hyperloglogplus_unique_state
                        .get_or_insert_with(Default::default)
                        .merge_from_bytes(&bytes)?;
                }
                (
                    TYPE_FIELD
                    | NUM_VALUES_FIELD
                    | ENCODING_VERSION_FIELD
                    | VALUE_TYPE_FIELD
                    | HYPERLOGLOGPLUS_UNIQUE_STATE_FIELD,
                    _,
                ) => return Err(unexpected_wire_type(field, wire_type)),
                _ => is.skip_field(wire_type)?,
            }
        }
        Ok(msg)
    }
}

impl HyperLogLogPlusUniqueStateProto {
    pub fn write_to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        let mut os = CodedOutputStream::vec(&mut bytes);
        if let Some(v) = self.sparse_size {
            os.write_int32(SPARSE_SIZE_FIELD, v)?;
        }
        if let Some(v) = self.precision_or_num_buckets {
            os.write_int32(PRECISION_FIELD, v)?;
        }
        if let Some(v) = self.sparse_precision_or_num_buckets {
            os.write_int32(SPARSE_PRECISION_FIELD, v)?;
        }
        if let Some(v) = &self.data {
            os.write_bytes(DATA_FIELD, v)?;
        }
        if let Some(v) = &self.sparse_data {
            os.write_bytes(SPARSE_DATA_FIELD, v)?;
        }
        os.flush()?;
        drop(os);
        Ok(bytes)
    }

    pub fn parse_from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut msg = Self::default();
        msg.merge_from_bytes(bytes)?;
        Ok(msg)
    }

    /// Merge fields encoded in `bytes` into `self`, later values win
    fn merge_from_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let mut is = CodedInputStream::from_bytes(bytes);
        while let Some(tag) = is.read_raw_tag_or_eof()? {
            let (field, wire_type) = unpack_tag(tag)?;
            match (field, wire_type) {
                (SPARSE_SIZE_FIELD, WireType::Varint) => self.sparse_size = Some(is.read_int32()?),
                (PRECISION_FIELD, WireType::Varint) => {
                    self.precision_or_num_buckets = Some(is.read_int32()?)
                }
                (SPARSE_PRECISION_FIELD, WireType::Varint) => {
                    self.sparse_precision_or_num_buckets = Some(is.read_int32()?)
                }
                (DATA_FIELD, WireType::LengthDelimited) => self.data = Some(is.read_bytes()?),
                (SPARSE_DATA_FIELD, WireType::LengthDelimited) => {
                    self.sparse_data = Some(is.read_bytes()?)
                }
                (
                    SPARSE_SIZE_FIELD | PRECISION_FIELD | SPARSE_PRECISION_FIELD | DATA_FIELD
                    | SPARSE_DATA_FIELD,
                    _,
                ) => return Err(unexpected_wire_type(field, wire_type)),
                _ => is.skip_field(wire_type)?,
            }
        }
        Ok(())
    }
}

#[inline]
fn unpack_tag(tag: u32) -> Result<(u32, WireType)> {
    let field = tag >> 3;
    let wire_type = WireType::new(tag & 7);
    match wire_type {
        Some(wire_type) if field > 0 => Ok((field, wire_type)),
        _ => Err(SketchError::CorruptedData(format!("invalid tag {}", tag))),
    }
}

#[inline]
fn unexpected_wire_type(field: u32, wire_type: WireType) -> SketchError {
    SketchError::CorruptedData(format!(
        "unexpected wire type {:?} for field {}",
        wire_type, field
    ))
}
