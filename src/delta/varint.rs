//! Variable-length integers and fixed column-index widths
//!
//! Unsigned values are stored in groups of 7 bits, low-order group first, with
//! the continuation bit set on every group but the last. Signed values fold the
//! sign into the lowest bit of the magnitude (`|n| << 1 | sign`) and reuse the
//! same groups, so one group carries six magnitude bits.
//!
//! The `*_size` functions are the single source of truth for encoded lengths:
//! the writers below and the size model both go through them.

use crate::constants::{VARINT_CONTINUATION, VARINT_GROUP_BITS, VARINT_MAX_BYTES};
use crate::error::{DeltaError, Result};

const GROUP_MASK: u128 = (1 << VARINT_GROUP_BITS) - 1;

fn groups_for_bits(bits: u32) -> usize {
    (bits.div_ceil(VARINT_GROUP_BITS) as usize).max(1)
}

fn fold_signed(value: i64) -> u128 {
    let magnitude = value.unsigned_abs() as u128;
    (magnitude << 1) | u128::from(value < 0)
}

/// Number of bytes `put_ul` emits for `value`
pub fn ul_size(value: u64) -> usize {
    groups_for_bits(u64::BITS - value.leading_zeros())
}

/// Number of bytes `put_l` emits for `value`
pub fn l_size(value: i64) -> usize {
    let folded = fold_signed(value);
    groups_for_bits(u128::BITS - folded.leading_zeros())
}

fn put_groups(out: &mut Vec<u8>, mut value: u128) {
    loop {
        let group = (value & GROUP_MASK) as u8;
        value >>= VARINT_GROUP_BITS;
        if value == 0 {
            out.push(group);
            break;
        }
        out.push(group | VARINT_CONTINUATION);
    }
}

/// Appends `value` as an unsigned varint
pub fn put_ul(out: &mut Vec<u8>, value: u64) {
    put_groups(out, u128::from(value));
}

/// Appends `value` as a signed varint
pub fn put_l(out: &mut Vec<u8>, value: i64) {
    put_groups(out, fold_signed(value));
}

fn get_groups(input: &[u8], pos: &mut usize) -> Result<u128> {
    let mut value: u128 = 0;
    let mut shift = 0;

    for i in 0..VARINT_MAX_BYTES {
        let byte = *input
            .get(*pos + i)
            .ok_or_else(|| DeltaError::Corrupt("truncated varint".to_string()))?;
        value |= u128::from(byte & !VARINT_CONTINUATION) << shift;
        if byte & VARINT_CONTINUATION == 0 {
            *pos += i + 1;
            return Ok(value);
        }
        shift += VARINT_GROUP_BITS;
    }

    Err(DeltaError::Corrupt("varint too long".to_string()))
}

/// Reads an unsigned varint at `*pos`, advancing it past the value
pub fn get_ul(input: &[u8], pos: &mut usize) -> Result<u64> {
    let value = get_groups(input, pos)?;
    u64::try_from(value).map_err(|_| DeltaError::Corrupt("unsigned varint overflows u64".to_string()))
}

/// Reads a signed varint at `*pos`, advancing it past the value
pub fn get_l(input: &[u8], pos: &mut usize) -> Result<i64> {
    let folded = get_groups(input, pos)?;
    let magnitude = folded >> 1;
    let negative = folded & 1 == 1;

    if negative {
        if magnitude == 0 || magnitude > (i64::MAX as u128) + 1 {
            return Err(DeltaError::Corrupt("invalid negative varint".to_string()));
        }
        Ok((magnitude as i128).wrapping_neg() as i64)
    } else {
        i64::try_from(magnitude)
            .map_err(|_| DeltaError::Corrupt("signed varint overflows i64".to_string()))
    }
}

/// Fixed byte width of the column deltas of a sparse unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CiSize {
    /// 1 byte per delta
    U8 = 0,
    /// 2 bytes per delta
    U16 = 1,
    /// 4 bytes per delta
    U32 = 2,
    /// 8 bytes per delta
    U64 = 3,
}

impl CiSize {
    /// All widths, narrowest first
    pub const ALL: [CiSize; 4] = [CiSize::U8, CiSize::U16, CiSize::U32, CiSize::U64];

    /// Smallest width able to hold `delta_max`
    pub fn for_delta(delta_max: u64) -> Self {
        Self::ALL
            .into_iter()
            .find(|width| width.holds(delta_max))
            .unwrap_or(CiSize::U64)
    }

    /// Bytes per element
    pub fn bytes(self) -> usize {
        1 << (self as usize)
    }

    /// Whether `value` fits this width
    pub fn holds(self, value: u64) -> bool {
        match self {
            CiSize::U64 => true,
            _ => value < (1u64 << (8 * self.bytes())),
        }
    }

    /// The two flag bits describing this width
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Inverse of [`CiSize::bits`]; only the low two bits are inspected
    pub fn from_bits(bits: u8) -> Self {
        Self::ALL[(bits & 3) as usize]
    }

    /// Slot of this width in per-width tables
    pub fn index(self) -> usize {
        self as usize
    }

    /// Appends `value` little-endian in this width
    pub fn put(self, out: &mut Vec<u8>, value: u64) {
        debug_assert!(self.holds(value), "{value} overflows {self:?}");
        out.extend_from_slice(&value.to_le_bytes()[..self.bytes()]);
    }

    /// Reads one element at `*pos`, advancing it
    pub fn get(self, input: &[u8], pos: &mut usize) -> Result<u64> {
        let width = self.bytes();
        let bytes = input
            .get(*pos..*pos + width)
            .ok_or_else(|| DeltaError::Corrupt(format!("truncated {self:?} column delta")))?;
        let mut buf = [0u8; 8];
        buf[..width].copy_from_slice(bytes);
        *pos += width;
        Ok(u64::from_le_bytes(buf))
    }
}
