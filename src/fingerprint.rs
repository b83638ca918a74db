//! 64-bit fingerprint of short byte sequences.
//!
//! Hashes are bit-for-bit identical to the fingerprints used by zetasketch
//! (and therefore BigQuery `HLL_COUNT` functions), so sketches built here can be
//! merged with sketches produced elsewhere.
//!
//! Inputs of up to 32 bytes are mixed with a seeded 64-bit murmur hash, inputs
//! of 33 to 64 bytes with a dedicated four-lane mixer. The first and the last
//! 8 bytes of the input are folded into the result by a final 128-to-64 bit mix.
//! Longer inputs are rejected.

use crate::error::{Result, SketchError};

/// Maximum supported input length in bytes.
pub const MAX_INPUT_LEN: usize = 64;

const K0: u64 = 0xa5b8_5c5e_198e_d849;
const K1: u64 = 0x8d58_ac26_afe1_2e47;
const K2: u64 = 0xc47b_6e9e_3a97_0ed3;
const K3: u64 = 0xc6a4_a793_5bd1_e995;

/// Compute the fingerprint of `data`.
///
/// Fails with [`SketchError::UnsupportedInputSize`] for inputs longer than
/// [`MAX_INPUT_LEN`] bytes.
pub fn fingerprint(data: &[u8]) -> Result<u64> {
    let len = data.len();
    let h = if len <= 32 {
        murmur64(data, K0 ^ K1 ^ K2)
    } else if len <= MAX_INPUT_LEN {
        hash_33_to_64(data)
    } else {
        return Err(SketchError::UnsupportedInputSize(len));
    };

    let u = if len >= 8 { load64(data, 0) } else { K0 };
    let v = if len >= 9 { load64(data, len - 8) } else { K0 };

    let h = hash_128_to_64(h.wrapping_add(v), u);
    // 0 and 1 are reserved values
    if h <= 1 {
        return Ok(h.wrapping_sub(2));
    }
    Ok(h)
}

/// Values that can be added to a sketch.
///
/// Integers are hashed through their little-endian byte representation. 32-bit
/// integers are padded with one trailing zero byte, matching the encoding used by
/// existing zetasketch sketches.
pub trait Fingerprint {
    fn fingerprint(&self) -> Result<u64>;
}

impl Fingerprint for [u8] {
    #[inline]
    fn fingerprint(&self) -> Result<u64> {
        fingerprint(self)
    }
}

impl Fingerprint for Vec<u8> {
    #[inline]
    fn fingerprint(&self) -> Result<u64> {
        fingerprint(self)
    }
}

impl Fingerprint for str {
    #[inline]
    fn fingerprint(&self) -> Result<u64> {
        fingerprint(self.as_bytes())
    }
}

impl Fingerprint for String {
    #[inline]
    fn fingerprint(&self) -> Result<u64> {
        fingerprint(self.as_bytes())
    }
}

impl Fingerprint for u64 {
    #[inline]
    fn fingerprint(&self) -> Result<u64> {
        fingerprint(&self.to_le_bytes())
    }
}

impl Fingerprint for i64 {
    #[inline]
    fn fingerprint(&self) -> Result<u64> {
        fingerprint(&self.to_le_bytes())
    }
}

impl Fingerprint for u32 {
    #[inline]
    fn fingerprint(&self) -> Result<u64> {
        let mut buf = [0u8; 5];
        buf[..4].copy_from_slice(&self.to_le_bytes());
        fingerprint(&buf)
    }
}

impl Fingerprint for i32 {
    #[inline]
    fn fingerprint(&self) -> Result<u64> {
        let mut buf = [0u8; 5];
        buf[..4].copy_from_slice(&self.to_le_bytes());
        fingerprint(&buf)
    }
}

#[inline]
fn shift_mix(v: u64) -> u64 {
    v ^ (v >> 47)
}

#[inline]
fn load64(data: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

#[inline]
fn hash_128_to_64(hi: u64, lo: u64) -> u64 {
    let h = (lo ^ hi).wrapping_mul(K3);
    let h = (hi ^ shift_mix(h)).wrapping_mul(K3);
    shift_mix(h).wrapping_mul(K3)
}

/// Seeded 64-bit murmur hash.
fn murmur64(data: &[u8], seed: u64) -> u64 {
    let mut h = seed ^ (data.len() as u64).wrapping_mul(K3);

    let mut blocks = data.chunks_exact(8);
    for block in &mut blocks {
        let k = load64(block, 0).wrapping_mul(K3);
        let k = shift_mix(k).wrapping_mul(K3);
        h ^= k;
        h = h.wrapping_mul(K3);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        for (i, &b) in tail.iter().enumerate() {
            h ^= u64::from(b) << (8 * i);
        }
        h = h.wrapping_mul(K3);
    }

    let h = shift_mix(h).wrapping_mul(K3);
    shift_mix(h)
}

fn hash_33_to_64(data: &[u8]) -> u64 {
    let len = data.len();

    let mut z = load64(data, 24);
    let mut a = load64(data, 0).wrapping_add(
        (len as u64)
            .wrapping_add(load64(data, len - 16))
            .wrapping_mul(K0),
    );
    let mut b = a.wrapping_add(z).rotate_right(52);
    let mut c = a.rotate_right(37);
    a = a.wrapping_add(load64(data, 8));
    c = c.wrapping_add(a.rotate_right(7));
    a = a.wrapping_add(load64(data, 16));
    let vf = a.wrapping_add(z);
    let vs = b.wrapping_add(a.rotate_right(31)).wrapping_add(c);

    a = load64(data, 16).wrapping_add(load64(data, len - 32));
    z = load64(data, len - 8);
    b = a.wrapping_add(z).rotate_right(52);
    c = a.rotate_right(37);
    a = a.wrapping_add(load64(data, len - 24));
    c = c.wrapping_add(a.rotate_right(7));
    a = a.wrapping_add(load64(data, len - 16));
    let wf = a.wrapping_add(z);
    let ws = b.wrapping_add(a.rotate_right(31)).wrapping_add(c);

    let r = shift_mix(
        vf.wrapping_add(ws)
            .wrapping_mul(K2)
            .wrapping_add(wf.wrapping_add(vs).wrapping_mul(K0)),
    );
    shift_mix(r.wrapping_mul(K0).wrapping_add(vs)).wrapping_mul(K2)
}
