//! # Serde module for HyperLogLogPlusPlus
//!
//! This module provides serde-based (serialization and deserialization) features for
//! `HyperLogLogPlusPlus`.
//!
//! A sketch is serialized as its wire bytes, the same bytes returned by
//! `HyperLogLogPlusPlus::to_bytes`, so that any serde format carries a sketch which can be
//! merged by other zetasketch compatible implementations.
//!
//! During deserialization the bytes are decoded with full validation, decoding errors
//! are reported as serde custom errors.
//!
//! Refer to the serde documentation for more details on custom serialization and deserialization:
//! - [Serialization](https://serde.rs/impl-serialize.html)
//! - [Deserialization](https://serde.rs/impl-deserialize.html)
use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Serialize};

use crate::sketch::HyperLogLogPlusPlus;

impl Serialize for HyperLogLogPlusPlus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let bytes = self.to_bytes().map_err(S::Error::custom)?;
        serializer.serialize_bytes(&bytes)
    }
}

impl<'de> Deserialize<'de> for HyperLogLogPlusPlus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes: Vec<u8> = Deserialize::deserialize(deserializer)?;
        HyperLogLogPlusPlus::from_bytes(&bytes).map_err(D::Error::custom)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0; "empty set")]
    #[test_case(1; "single element")]
    #[test_case(2; "two distinct elements")]
    #[test_case(100; "hundred distinct elements")]
    #[test_case(10000; "ten thousand distinct elements")]
    fn test_serde(n: usize) {
        let mut original_sketch = HyperLogLogPlusPlus::new(12, 17).unwrap();

        for i in 0..n {
            let item = &format!("item{}", i);
            original_sketch.insert(item).unwrap();
        }

        let serialized = serde_json::to_string(&original_sketch).expect("serialization failed");
        assert!(
            !serialized.is_empty(),
            "serialized string should not be empty"
        );

        let deserialized_sketch: HyperLogLogPlusPlus =
            serde_json::from_str(&serialized).expect("deserialization failed");

        assert_eq!(original_sketch.estimate(), deserialized_sketch.estimate());
        assert_eq!(
            original_sketch.num_values(),
            deserialized_sketch.num_values()
        );
        assert_eq!(
            original_sketch.to_bytes().unwrap(),
            deserialized_sketch.to_bytes().unwrap()
        );
    }

    #[test]
    fn test_serialize_as_wire_bytes() {
        let empty = HyperLogLogPlusPlus::new(10, 0).unwrap();
        assert_eq!(
            serde_json::to_string(&empty).unwrap(),
            "[8,112,16,0,24,2,130,7,2,24,10]"
        );
    }

    #[test]
    fn test_deserialize_invalid_json() {
        let invalid_json = "{ invalid_json_string }";
        let result: Result<HyperLogLogPlusPlus, _> = serde_json::from_str(invalid_json);

        assert!(
            result.is_err(),
            "Deserialization should fail for invalid JSON"
        );
    }

    #[test_case("[]"; "no bytes")]
    #[test_case("[8,100,16,0,24,2]"; "sum aggregator")]
    #[test_case("[8,112,16,0,24,1,130,7,2,24,10]"; "encoding version 1")]
    #[test_case("[8,112,24,2,130,7,2,24,10]"; "missing num values")]
    #[test_case("[8,112,16,0,24,2,130,7,2,24,9]"; "precision 9")]
    #[test_case("[8,112,16,0,24,2,130,7,5,24,10,42,1,0]"; "short registers")]
    #[test_case("[8,112,16,0,24,2,130]"; "truncated")]
    fn test_failed_deserialization(input: &str) {
        let result: Result<HyperLogLogPlusPlus, _> = serde_json::from_str(input);
        assert!(result.is_err());
    }
}
