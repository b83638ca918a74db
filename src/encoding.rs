//! Bit-packing of hashes into register indices and ranks.
//!
//! A 64-bit hash is split at precision `p` into:
//! - index: the top `p` bits, selecting one of `2^p` registers;
//! - rank: number of leading zeros in the remaining `64 - p` bits plus one
//!   (`65 - p` when all remaining bits are zero).
//!
//! ## Sparse codes
//! Sparse representation stores every observed hash as a 32-bit code computed at
//! sparse precision `pp` and normal precision `p`:
//! - if the lowest `pp - p` bits of the sparse index are not all zero, the code is
//!   the sparse index itself, as the normal rank is recoverable from those bits;
//! - otherwise the code is `flag | (index << 6) | sparse_rank` where `index` is the
//!   normal index and `flag` is `1 << max(pp, p + 6)`.
//!
//! Codes order sparse indices ascending for unflagged codes, followed by flagged
//! codes ordered by normal index and then by rank. Codes of the same sparse index
//! are therefore always adjacent once sorted.

/// Number of bits used to store rank in flagged sparse codes.
pub(crate) const RANK_BITS: u8 = 6;
const RANK_MASK: u32 = (1 << RANK_BITS) - 1;

/// Return register index of `hash` at given `precision`.
#[inline]
pub(crate) fn index(hash: u64, precision: u8) -> u32 {
    (hash >> (64 - precision)) as u32
}

/// Return rank of `hash` after stripping `precision` index bits.
#[inline]
pub(crate) fn rank(hash: u64, precision: u8) -> u8 {
    rank_of(hash, 64 - precision)
}

/// Return one plus the number of leading zeros in the lowest `bits` bits of `value`.
#[inline]
pub(crate) fn rank_of(value: u64, bits: u8) -> u8 {
    let w = value.checked_shl(u32::from(64 - bits)).unwrap_or(0);
    if w == 0 {
        return bits + 1;
    }
    w.leading_zeros() as u8 + 1
}

/// Return rank of register `index` once precision is reduced from `source` to `target`.
///
/// Zero rank stays zero. Otherwise the index bits dropped by the downgrade become
/// the leading bits of the hash remainder: if any of them is set the rank is
/// determined by them alone, else the old rank grows by `source - target`.
#[inline]
pub(crate) fn downgrade_rank(index: u32, rank: u8, source: u8, target: u8) -> u8 {
    if rank == 0 {
        return 0;
    }
    let w = u64::from(index)
        .checked_shl(u32::from(64 - source + target))
        .unwrap_or(0);
    if w == 0 {
        return rank + source - target;
    }
    w.leading_zeros() as u8 + 1
}

/// Encoder and decoder of sparse codes for a fixed pair of precisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SparseEncoding {
    pub(crate) precision: u8,
    pub(crate) sparse_precision: u8,
    flag: u32,
}

impl SparseEncoding {
    #[inline]
    pub(crate) fn new(precision: u8, sparse_precision: u8) -> Self {
        let flag = 1 << sparse_precision.max(precision + RANK_BITS);
        Self {
            precision,
            sparse_precision,
            flag,
        }
    }

    /// Number of index bits gained by the sparse precision.
    #[inline]
    fn delta(&self) -> u8 {
        self.sparse_precision - self.precision
    }

    /// Encode `hash` into a sparse code.
    #[inline]
    pub(crate) fn encode(&self, hash: u64) -> u32 {
        self.encode_parts(
            index(hash, self.sparse_precision),
            rank(hash, self.precision),
        )
    }

    /// Encode sparse index and normal rank into a sparse code.
    #[inline]
    fn encode_parts(&self, sparse_index: u32, rank: u8) -> u32 {
        let delta = self.delta();
        if sparse_index & ((1 << delta) - 1) != 0 {
            return sparse_index;
        }
        self.flag | ((sparse_index >> delta) << RANK_BITS) | u32::from(rank - delta)
    }

    /// Decode sparse code into normal index and rank.
    #[inline]
    pub(crate) fn decode(&self, code: u32) -> (u32, u8) {
        let delta = self.delta();
        if code & self.flag == 0 {
            return (code >> delta, rank_of(u64::from(code), delta));
        }
        let idx = (code ^ self.flag) >> RANK_BITS;
        let rank = (code & RANK_MASK) as u8 + delta;
        (idx, rank)
    }

    /// Return sparse index of code, shared by all codes describing the same sparse bucket.
    #[inline]
    pub(crate) fn sparse_index(&self, code: u32) -> u32 {
        if code & self.flag == 0 {
            return code;
        }
        ((code ^ self.flag) >> RANK_BITS) << self.delta()
    }

    /// Re-encode code of this encoding as code of `target` encoding with lower or equal precisions.
    #[inline]
    pub(crate) fn downgrade(&self, code: u32, target: &SparseEncoding) -> u32 {
        if self == target {
            return code;
        }
        let (idx, rank) = self.decode(code);
        let sparse_index = self.sparse_index(code) >> (self.sparse_precision - target.sparse_precision);
        let rank = downgrade_rank(idx, rank, self.precision, target.precision);
        target.encode_parts(sparse_index, rank)
    }

    /// Return whether code is a valid code of this encoding.
    #[inline]
    pub(crate) fn is_valid(&self, code: u32) -> bool {
        if code & self.flag == 0 {
            return code < (1 << self.sparse_precision) && code & ((1 << self.delta()) - 1) != 0;
        }
        let rest = code ^ self.flag;
        let rank = rest & RANK_MASK;
        rest >> RANK_BITS < (1 << self.precision)
            && rank > 0
            && rank + u32::from(self.delta()) <= 65 - u32::from(self.precision)
    }
}
