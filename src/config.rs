//! Configuration of HyperLogLog++ sketches.
//!
//! Precision 15 is a common choice: it gives a relative error of about 0.6% while
//! requiring at most 32KiB of memory.

#[cfg(feature = "with_serde")]
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sketch::{HyperLogLogPlusPlus, MAX_SPARSE_PRECISION};

/// Default precision of new sketches
pub const DEFAULT_PRECISION: u8 = 15;
/// Number of bits sparse precision exceeds precision by default
const DEFAULT_SPARSE_PRECISION_DELTA: u8 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "with_serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "with_serde", serde(default))]
pub struct HllConfig {
    pub precision: u8,
    /// Derived from `precision` when unset, 0 disables sparse representation
    pub sparse_precision: Option<u8>,
}

impl Default for HllConfig {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            sparse_precision: None,
        }
    }
}

impl HllConfig {
    #[inline]
    pub fn new(precision: u8) -> Self {
        Self {
            precision,
            sparse_precision: None,
        }
    }

    #[inline]
    pub fn with_sparse_precision(mut self, sparse_precision: u8) -> Self {
        self.sparse_precision = Some(sparse_precision);
        self
    }

    #[inline]
    pub fn without_sparse(self) -> Self {
        self.with_sparse_precision(0)
    }

    /// Return configured sparse precision, or `precision + 5` capped at 25 when unset
    #[inline]
    pub fn resolved_sparse_precision(&self) -> u8 {
        self.sparse_precision.unwrap_or_else(|| {
            self.precision
                .saturating_add(DEFAULT_SPARSE_PRECISION_DELTA)
                .min(MAX_SPARSE_PRECISION)
        })
    }

    /// Create new empty sketch, failing on invalid precisions
    #[inline]
    pub fn build(&self) -> Result<HyperLogLogPlusPlus> {
        HyperLogLogPlusPlus::new(self.precision, self.resolved_sparse_precision())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::error::SketchError;
    use test_case::test_case;

    #[test_case(HllConfig::default() => (15, 20); "default")]
    #[test_case(HllConfig::new(10) => (10, 15); "derived sparse precision")]
    #[test_case(HllConfig::new(22) => (22, 25); "capped sparse precision")]
    #[test_case(HllConfig::new(12).with_sparse_precision(12) => (12, 12); "explicit sparse precision")]
    #[test_case(HllConfig::new(12).without_sparse() => (12, 0); "without sparse")]
    fn test_build(config: HllConfig) -> (u8, u8) {
        let sketch = config.build().unwrap();
        (sketch.precision(), sketch.sparse_precision())
    }

    #[test]
    fn test_build_never_clamps() {
        assert!(matches!(
            HllConfig::new(8).build(),
            Err(SketchError::InvalidPrecision(8))
        ));
        assert!(matches!(
            HllConfig::new(12).with_sparse_precision(11).build(),
            Err(SketchError::InvalidSparsePrecision {
                precision: 12,
                sparse_precision: 11
            })
        ));
    }

    #[cfg(feature = "with_serde")]
    #[test]
    fn test_from_json() {
        let config: HllConfig = serde_json::from_str(r#"{"precision": 12}"#).unwrap();
        assert_eq!(config, HllConfig::new(12));
        let config: HllConfig = serde_json::from_str(r#"{"sparse_precision": 0}"#).unwrap();
        assert_eq!(config, HllConfig::default().without_sparse());
    }
}
