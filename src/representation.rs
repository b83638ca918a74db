use std::fmt::{Debug, Formatter};

use enum_dispatch::enum_dispatch;

use crate::dense::DenseRepresentation;
use crate::sparse::SparseRepresentation;

/// Representation types supported by `HyperLogLogPlusPlus`.
///
/// Transitions are one-directional: `Empty -> Sparse -> Dense` or `Empty -> Dense`.
#[derive(Clone, Debug)]
#[enum_dispatch]
pub(crate) enum Representation {
    Empty(EmptyRepresentation),
    Sparse(SparseRepresentation),
    Dense(DenseRepresentation),
}

/// Representation trait which must be implemented by all representations.
#[enum_dispatch(Representation)]
pub(crate) trait RepresentationTrait {
    fn estimate(&self) -> u64;
    fn size_of(&self) -> usize;
    fn to_string(&self) -> String {
        format!("estimate: {}, size: {}", self.estimate(), self.size_of())
    }
}

impl Representation {
    /// Return name of the representation variant
    #[inline]
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Representation::Empty(_) => "Empty",
            Representation::Sparse(_) => "Sparse",
            Representation::Dense(_) => "Dense",
        }
    }
}

/// Representation of a sketch which has not observed any value yet.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct EmptyRepresentation;

impl RepresentationTrait for EmptyRepresentation {
    #[inline]
    fn estimate(&self) -> u64 {
        0
    }

    #[inline]
    fn size_of(&self) -> usize {
        0
    }
}

impl Debug for EmptyRepresentation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_string())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use test_case::test_case;

    fn representation_of(kind: &str) -> Representation {
        match kind {
            "sparse" => {
                let mut sparse = SparseRepresentation::new(10, 15);
                sparse.insert_hash(1 << 63);
                sparse.into()
            }
            "dense" => {
                let mut dense = DenseRepresentation::new(10);
                dense.insert_hash(1 << 63);
                dense.into()
            }
            _ => EmptyRepresentation.into(),
        }
    }

    #[test_case("empty" => "Empty: estimate: 0, size: 0")]
    #[test_case("sparse" => "Sparse: estimate: 1, size: 4")]
    #[test_case("dense" => "Dense: estimate: 1, size: 1024")]
    fn test_dispatch(kind: &str) -> String {
        let representation = representation_of(kind);
        format!("{}: {}", representation.name(), representation.to_string())
    }
}
