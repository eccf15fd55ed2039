//! Fixed-layout, little-endian wire types for the collectives.
//!
//! All multi-byte values are stored pre-LE with `.to_le()` and decoded with
//! `.from_le()`, so every record can be sent as raw bytes.

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::size_of;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

/// Decode a byte buffer into records, tolerating unaligned input.
/// Trailing bytes that do not form a whole record are ignored.
pub fn collect_records<T: Pod>(bytes: &[u8]) -> Vec<T> {
    let n = bytes.len() / size_of::<T>().max(1);
    let mut out = vec![T::zeroed(); n];
    bytemuck::cast_slice_mut::<T, u8>(&mut out).copy_from_slice(&bytes[..n * size_of::<T>()]);
    out
}

/// Largest vertex tuple carried by a [`WireKey`] (quadrilateral facets).
pub const MAX_KEY_LEN: usize = 4;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug)]
pub struct WireCount {
    pub n_le: u32, // count of following records
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

/// A signed global index on the wire.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug)]
pub struct WireI64 {
    pub v_le: i64,
}

impl WireI64 {
    pub fn of(v: i64) -> Self {
        Self { v_le: v.to_le() }
    }
    pub fn get(&self) -> i64 {
        i64::from_le(self.v_le)
    }
}

/// An unsigned count or offset on the wire.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug)]
pub struct WireU64 {
    pub v_le: u64,
}

impl WireU64 {
    pub fn of(v: u64) -> Self {
        Self { v_le: v.to_le() }
    }
    pub fn get(&self) -> u64 {
        u64::from_le(self.v_le)
    }
}

/// A floating-point value, carried as its LE bit pattern.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug)]
pub struct WireF64 {
    pub bits_le: u64,
}

impl WireF64 {
    pub fn of(v: f64) -> Self {
        Self {
            bits_le: v.to_bits().to_le(),
        }
    }
    pub fn get(&self) -> f64 {
        f64::from_bits(u64::from_le(self.bits_le))
    }
}

/// Canonical entity key: a sorted tuple of global vertex ids with an explicit
/// length (no sentinel padding).
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug)]
pub struct WireKey {
    pub vertices_le: [i64; MAX_KEY_LEN],
    pub len_le: u32,
    pub _pad: u32,
}

impl WireKey {
    /// Encode a key.
    ///
    /// # Panics
    /// Panics if the key has more than [`MAX_KEY_LEN`] entries.
    pub fn new(key: &[i64]) -> Self {
        assert!(key.len() <= MAX_KEY_LEN, "key longer than {MAX_KEY_LEN}");
        let mut vertices_le = [0i64; MAX_KEY_LEN];
        for (dst, &v) in vertices_le.iter_mut().zip(key) {
            *dst = v.to_le();
        }
        Self {
            vertices_le,
            len_le: (key.len() as u32).to_le(),
            _pad: 0,
        }
    }

    pub fn decode(&self) -> Vec<i64> {
        let n = (u32::from_le(self.len_le) as usize).min(MAX_KEY_LEN);
        self.vertices_le[..n]
            .iter()
            .map(|&v| i64::from_le(v))
            .collect()
    }
}

/// Postmaster reply for one key: owning rank and number of sharing ranks.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug)]
pub struct WireOwnership {
    pub owner_le: u32,
    pub num_sharers_le: u32,
}

impl WireOwnership {
    pub fn new(owner: usize, num_sharers: usize) -> Self {
        Self {
            owner_le: (owner as u32).to_le(),
            num_sharers_le: (num_sharers as u32).to_le(),
        }
    }
    pub fn owner(&self) -> usize {
        u32::from_le(self.owner_le) as usize
    }
    pub fn num_sharers(&self) -> usize {
        u32::from_le(self.num_sharers_le) as usize
    }
}

/// A rank number on the wire. NOTE: u32, never usize.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug)]
pub struct WireRank {
    pub rank_le: u32,
}

impl WireRank {
    pub fn of(rank: usize) -> Self {
        Self {
            rank_le: (rank as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.rank_le) as usize
    }
}

/// A canonical key paired with the global index its owner assigned.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug)]
pub struct WireKeyedId {
    pub key: WireKey,
    pub index_le: i64,
}

impl WireKeyedId {
    pub fn new(key: &[i64], index: i64) -> Self {
        Self {
            key: WireKey::new(key),
            index_le: index.to_le(),
        }
    }
    pub fn index(&self) -> i64 {
        i64::from_le(self.index_le)
    }
}

// ===== Compile-time sanity checks =========================================

const_assert_eq!(size_of::<WireCount>(), 4);
const_assert_eq!(size_of::<WireI64>(), 8);
const_assert_eq!(size_of::<WireU64>(), 8);
const_assert_eq!(size_of::<WireF64>(), 8);
const_assert_eq!(size_of::<WireKey>(), 8 * MAX_KEY_LEN + 8);
const_assert_eq!(size_of::<WireOwnership>(), 8);
const_assert_eq!(size_of::<WireRank>(), 4);
const_assert_eq!(size_of::<WireKeyedId>(), size_of::<WireKey>() + 8);
