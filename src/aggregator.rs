//! Generic aggregator interface shared by serialized zetasketch aggregators.

use crate::error::{Result, SketchError};
use crate::fingerprint::Fingerprint;
use crate::proto::{AggregatorStateProto, AggregatorType};
use crate::sketch::HyperLogLogPlusPlus;

/// Aggregator of values which can be merged with aggregators of the same type,
/// including serialized ones.
pub trait Aggregator {
    /// Type of the aggregation result
    type Output;

    /// Return type of the aggregator written into serialized state
    fn aggregator_type(&self) -> AggregatorType;

    /// Add fingerprint of a value
    fn add_hash(&mut self, hash: u64);

    /// Add a value
    fn add<T: Fingerprint + ?Sized>(&mut self, value: &T) -> Result<()>
    where
        Self: Sized,
    {
        self.add_hash(value.fingerprint()?);
        Ok(())
    }

    /// Return number of added values, including duplicates
    fn num_values(&self) -> u64;

    /// Return aggregation result
    fn result(&self) -> Self::Output;

    /// Merge serialized state of another aggregator
    fn merge_proto(&mut self, msg: &AggregatorStateProto) -> Result<()>;

    /// Merge serialized bytes of another aggregator
    fn merge_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.merge_proto(&AggregatorStateProto::parse_from_bytes(bytes)?)
    }

    fn serialize_to_proto(&self) -> AggregatorStateProto;

    fn serialize_to_bytes(&self) -> Result<Vec<u8>> {
        self.serialize_to_proto().write_to_bytes()
    }
}

impl Aggregator for HyperLogLogPlusPlus {
    type Output = u64;

    #[inline]
    fn aggregator_type(&self) -> AggregatorType {
        AggregatorType::HyperLogLogPlusUnique
    }

    #[inline]
    fn add_hash(&mut self, hash: u64) {
        self.insert_hash(hash);
    }

    #[inline]
    fn num_values(&self) -> u64 {
        HyperLogLogPlusPlus::num_values(self)
    }

    #[inline]
    fn result(&self) -> u64 {
        self.estimate()
    }

    fn merge_proto(&mut self, msg: &AggregatorStateProto) -> Result<()> {
        let expected = self.aggregator_type();
        if msg.aggregator_type() != expected.value() {
            return Err(SketchError::IncompatibleAggregator {
                expected: expected.name().to_string(),
                found: AggregatorType::name_of(msg.aggregator_type()),
            });
        }
        let other = HyperLogLogPlusPlus::from_proto(msg)?;
        self.merge(&other);
        Ok(())
    }

    #[inline]
    fn serialize_to_proto(&self) -> AggregatorStateProto {
        self.to_proto()
    }
}
