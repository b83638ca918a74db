use thiserror::Error;

/// Errors returned by sketch construction, insertion, merging and decoding.
#[derive(Debug, Error)]
pub enum SketchError {
    #[error("invalid precision {0}, expected a value in [{min}..{max}]", min = crate::sketch::MIN_PRECISION, max = crate::sketch::MAX_PRECISION)]
    InvalidPrecision(u8),
    #[error("invalid sparse precision {sparse_precision} for precision {precision}, expected 0 or a value in [{precision}..{max}]", max = crate::sketch::MAX_SPARSE_PRECISION)]
    InvalidSparsePrecision { precision: u8, sparse_precision: u8 },
    #[error("fingerprint input of {0} bytes exceeds the supported maximum of {max} bytes", max = crate::fingerprint::MAX_INPUT_LEN)]
    UnsupportedInputSize(usize),
    #[error("cannot merge {found} into {expected}")]
    IncompatibleAggregator { expected: String, found: String },
    #[error("incompatible message: unexpected aggregator type {0}")]
    UnexpectedType(i32),
    #[error("incompatible message: unsupported encoding version {0}")]
    UnsupportedEncodingVersion(i32),
    #[error("incompatible message: missing field `{0}`")]
    MissingField(&'static str),
    #[error("corrupted sketch data: {0}")]
    CorruptedData(String),
    #[error("protobuf codec error: {0}")]
    Protobuf(#[from] protobuf::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SketchError>;
