//! `zetasketch-hll` is a Rust crate designed to estimate the number of distinct elements in a stream or dataset
//! with HyperLogLog++ sketches which are binary compatible with zetasketch and BigQuery `HLL_COUNT` functions.
//!
//! Sketches start with a sparse representation of high accuracy and low memory footprint, and are
//! converted to dense registers once they grow. Sketches built here can be merged with sketches
//! built elsewhere, in both directions, through their serialized form.
//!
//! ```
//! use zetasketch_hll::{Aggregator, HllConfig};
//!
//! let mut sketch = HllConfig::new(15).build().unwrap();
//! sketch.add("foo").unwrap();
//! sketch.add("bar").unwrap();
//! sketch.add("foo").unwrap();
//! assert_eq!(sketch.result(), 2);
//! assert_eq!(sketch.num_values(), 3);
//! ```
mod aggregator;
mod bias;
mod config;
mod dense;
mod encoding;
mod error;
mod fingerprint;
mod proto;
mod representation;
#[cfg(feature = "with_serde")]
mod serde;
mod sketch;
mod sparse;
mod varint;

pub use aggregator::Aggregator;
pub use config::{HllConfig, DEFAULT_PRECISION};
pub use error::{Result, SketchError};
pub use fingerprint::{fingerprint, Fingerprint, MAX_INPUT_LEN};
pub use proto::{
    AggregatorStateProto, AggregatorType, HyperLogLogPlusUniqueStateProto, ENCODING_VERSION,
};
pub use sketch::{HyperLogLogPlusPlus, MAX_PRECISION, MAX_SPARSE_PRECISION, MIN_PRECISION};
