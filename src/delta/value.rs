//! Numeric element types the delta format can carry

use num_traits::Float;
use std::fmt::Debug;

/// A floating point matrix element with a fixed little-endian byte layout.
///
/// Value dictionaries compare elements by bit pattern, so `-0.0` and `0.0`
/// (or two NaNs with different payloads) stay distinct and decode exactly.
pub trait DeltaValue: Float + Debug + Send + Sync + 'static {
    /// Bytes per stored value
    const WIDTH: usize;

    /// Raw bit pattern, used as the value dictionary key
    fn bits(self) -> u64;

    /// Appends the little-endian bytes of `self`
    fn put_le(self, out: &mut Vec<u8>);

    /// Decodes a value from exactly `WIDTH` little-endian bytes
    fn from_le(bytes: &[u8]) -> Self;

    /// Parses the textual value field of a MatrixMarket entry
    fn parse_field(field: &str) -> Option<Self>;
}

impl DeltaValue for f64 {
    const WIDTH: usize = 8;

    fn bits(self) -> u64 {
        self.to_bits()
    }

    fn put_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn from_le(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[..8]);
        f64::from_le_bytes(buf)
    }

    fn parse_field(field: &str) -> Option<Self> {
        field.parse().ok()
    }
}

impl DeltaValue for f32 {
    const WIDTH: usize = 4;

    fn bits(self) -> u64 {
        u64::from(self.to_bits())
    }

    fn put_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn from_le(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&bytes[..4]);
        f32::from_le_bytes(buf)
    }

    fn parse_field(field: &str) -> Option<Self> {
        field.parse().ok()
    }
}
