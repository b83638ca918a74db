//! ## Dense representation
//! Estimates cardinality of any size using `M = 2^P` registers.
//!
//! [Original HyperLogLog++ paper](https://static.googleusercontent.com/media/research.google.com/en//pubs/archive/40671.pdf)
//!
//! Register encoding:
//! - registers[i]  - stores maximum rank observed for index `i` in one byte,
//!   0 when index `i` was never observed.
//!
//! The register array is exactly the `data` field of the serialized sketch.

use std::fmt::{Debug, Formatter};

use log::debug;

use crate::bias::{alpha, estimate_bias, linear_counting_threshold};
use crate::encoding::{downgrade_rank, index, rank};
use crate::error::{Result, SketchError};
use crate::representation::RepresentationTrait;

#[derive(Clone, PartialEq)]
pub(crate) struct DenseRepresentation {
    precision: u8,
    registers: Vec<u8>,
}

impl DenseRepresentation {
    /// Create new instance of `DenseRepresentation` with all registers unset
    #[inline]
    pub(crate) fn new(precision: u8) -> Self {
        Self {
            precision,
            registers: vec![0; 1 << precision],
        }
    }

    /// Create new instance of `DenseRepresentation` from serialized registers
    pub(crate) fn from_registers(precision: u8, registers: Vec<u8>) -> Result<Self> {
        if registers.len() != 1 << precision {
            return Err(SketchError::CorruptedData(format!(
                "expected {} registers for precision {}, got {}",
                1u64 << precision,
                precision,
                registers.len()
            )));
        }
        let max_rank = 65 - precision;
        if let Some(r) = registers.iter().find(|&&r| r > max_rank) {
            return Err(SketchError::CorruptedData(format!(
                "register value {} exceeds maximum rank {} for precision {}",
                r, max_rank, precision
            )));
        }
        Ok(Self {
            precision,
            registers,
        })
    }

    #[inline]
    pub(crate) fn precision(&self) -> u8 {
        self.precision
    }

    #[inline]
    pub(crate) fn registers(&self) -> &[u8] {
        &self.registers
    }

    #[inline]
    fn indexed_registers(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        self.registers.iter().enumerate().map(|(idx, &r)| (idx as u32, r))
    }

    /// Insert hash into `DenseRepresentation`
    #[inline]
    pub(crate) fn insert_hash(&mut self, hash: u64) {
        self.update_rank(index(hash, self.precision), rank(hash, self.precision));
    }

    /// Raise register `idx` to `new_rank` unless it already holds a higher rank
    #[inline]
    pub(crate) fn update_rank(&mut self, idx: u32, new_rank: u8) {
        let register = &mut self.registers[idx as usize];
        if new_rank > *register {
            *register = new_rank;
        }
    }

    /// Merge two `DenseRepresentation`s of possibly different precisions.
    ///
    /// Registers of finer `rhs` are folded into this precision on the fly,
    /// coarser `rhs` first downgrades `self` to its precision.
    pub(crate) fn merge(&mut self, rhs: &DenseRepresentation) {
        if rhs.precision < self.precision {
            self.downgrade(rhs.precision);
        }

        if rhs.precision == self.precision {
            for (lhs, &rhs) in self.registers.iter_mut().zip(rhs.registers.iter()) {
                if rhs > *lhs {
                    *lhs = rhs;
                }
            }
            return;
        }

        self.fold(rhs.indexed_registers(), rhs.precision);
    }

    /// Fold `(index, rank)` registers observed at finer or equal `precision` into `self`.
    pub(crate) fn fold(&mut self, registers: impl Iterator<Item = (u32, u8)>, precision: u8) {
        debug_assert!(precision >= self.precision);
        let shift = precision - self.precision;
        for (idx, r) in registers {
            if r == 0 {
                continue;
            }
            let new_rank = downgrade_rank(idx, r, precision, self.precision);
            self.update_rank(idx >> shift, new_rank);
        }
    }

    /// Reduce precision to `precision`; finer precision requests are ignored.
    pub(crate) fn downgrade(&mut self, precision: u8) {
        if precision >= self.precision {
            return;
        }
        debug!(
            "downgrading dense registers from precision {} to {}",
            self.precision, precision
        );

        let mut downgraded = Self::new(precision);
        downgraded.fold(self.indexed_registers(), self.precision);
        *self = downgraded;
    }
}

impl RepresentationTrait for DenseRepresentation {
    /// Return cardinality estimate of `DenseRepresentation`
    fn estimate(&self) -> u64 {
        let mut zeros = 0usize;
        let mut sum = 0.0;
        for &r in self.registers.iter() {
            zeros += usize::from(r == 0);
            sum += 1.0 / ((1u64 << r) as f64);
        }

        let m = self.registers.len() as f64;
        if zeros > 0 {
            // linear counting is more accurate for small cardinalities
            let h = m * (m / zeros as f64).ln();
            if (h as i64) <= linear_counting_threshold(self.precision) {
                return h.round() as u64;
            }
        }

        let raw = alpha(self.precision) * m * m / sum;
        (raw - estimate_bias(raw, self.precision)).round() as u64
    }

    /// Return memory size of `DenseRepresentation` registers
    #[inline]
    fn size_of(&self) -> usize {
        self.registers.len()
    }
}

impl Debug for DenseRepresentation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_string())
    }
}
