//! The encoded artifact and its byte framing
//!
//! ## Unit records
//!
//! The control stream is a sequence of unit records:
//!
//! ```text
//! flags:u8  size:u8  [row_delta:varint]  payload  [value indices]
//! ```
//!
//! Flag bits:
//! - 7: new row
//! - 6: sparse
//! - 5: new row is the next row (row delta 1, not stored)
//! - 0-1: column delta width of a sparse unit
//!
//! The payload depends on the unit kind and the strategy; see
//! [`EncodingStrategy`].
//!
//! ## Serialized artifact
//!
//! ```text
//! "SPMD" version:u8 strategy:u8 value_width:u8
//! n_rows n_cols nnz row_start             (varints)
//! ctl_len ctl
//! 4 × (dict_len, dict elements in their width)
//! values_len values
//! ```

use crate::constants::{
    ARTIFACT_MAGIC, ARTIFACT_VERSION, FL_CISIZE_MASK, FL_NRSEQ_SHIFT, FL_NR_SHIFT, FL_SP_SHIFT,
};
use crate::delta::decoder::UnitReader;
use crate::delta::value::DeltaValue;
use crate::delta::varint::{self, CiSize};
use crate::error::{DeltaError, Result};
use crate::matrix::config::EncodingStrategy;

/// Decoded flags byte of a unit record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitFlags {
    pub new_row: bool,
    pub sparse: bool,
    pub next_row: bool,
    pub cisize: CiSize,
}

impl UnitFlags {
    fn row_flags(row_delta: usize, sparse: bool, cisize: CiSize) -> Self {
        Self {
            new_row: row_delta > 0,
            sparse,
            next_row: row_delta == 1,
            cisize,
        }
    }

    /// Flags of a sparse unit
    pub fn sparse(row_delta: usize, cisize: CiSize) -> Self {
        Self::row_flags(row_delta, true, cisize)
    }

    /// Flags of a dense unit
    pub fn dense(row_delta: usize) -> Self {
        Self::row_flags(row_delta, false, CiSize::U8)
    }

    pub fn to_byte(self) -> u8 {
        let mut byte = 0;
        if self.new_row {
            byte |= 1 << FL_NR_SHIFT;
            if self.next_row {
                byte |= 1 << FL_NRSEQ_SHIFT;
            }
        }
        if self.sparse {
            byte |= 1 << FL_SP_SHIFT;
            byte |= self.cisize.bits();
        }
        byte
    }

    pub fn from_byte(byte: u8) -> Result<Self> {
        let known = (1 << FL_NR_SHIFT) | (1 << FL_SP_SHIFT) | (1 << FL_NRSEQ_SHIFT) | FL_CISIZE_MASK;
        if byte & !known != 0 {
            return Err(DeltaError::Corrupt(format!("unknown unit flags {byte:#04x}")));
        }
        let new_row = byte & (1 << FL_NR_SHIFT) != 0;
        let next_row = byte & (1 << FL_NRSEQ_SHIFT) != 0;
        let sparse = byte & (1 << FL_SP_SHIFT) != 0;
        if next_row && !new_row {
            return Err(DeltaError::Corrupt("next-row flag without new-row flag".into()));
        }
        if !sparse && byte & FL_CISIZE_MASK != 0 {
            return Err(DeltaError::Corrupt("dense unit with a column width".into()));
        }
        Ok(Self {
            new_row,
            sparse,
            next_row,
            cisize: CiSize::from_bits(byte & FL_CISIZE_MASK),
        })
    }
}

/// A sparse matrix (or a row range of one) in delta format
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaMatrix<T> {
    /// Number of rows of the matrix
    pub n_rows: usize,
    /// Number of columns of the matrix
    pub n_cols: usize,
    /// Number of stored elements
    pub nnz: usize,
    /// Row the first unit is relative to
    pub row_start: usize,
    /// Layout of the unit records
    pub strategy: EncodingStrategy,
    pub(crate) ctl: Vec<u8>,
    pub(crate) col_dicts: [Vec<u64>; 4],
    pub(crate) values: Vec<T>,
}

impl<T: DeltaValue> DeltaMatrix<T> {
    /// Control stream
    pub fn ctl(&self) -> &[u8] {
        &self.ctl
    }

    /// Value section: every value in order, or the distinct values when the
    /// strategy uses a value dictionary
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Column dictionary of `width`
    pub fn col_dict(&self, width: CiSize) -> &[u64] {
        &self.col_dicts[width.index()]
    }

    /// Bytes of the column dictionaries
    pub fn dict_bytes(&self) -> usize {
        CiSize::ALL
            .iter()
            .map(|w| self.col_dict(*w).len() * w.bytes())
            .sum()
    }

    /// Bytes of the value section
    pub fn value_bytes(&self) -> usize {
        self.values.len() * T::WIDTH
    }

    /// Encoded size: control stream, dictionaries and values
    pub fn size_bytes(&self) -> usize {
        self.ctl.len() + self.dict_bytes() + self.value_bytes()
    }

    /// Iterator over the units in emission order
    pub fn units(&self) -> UnitReader<'_, T> {
        UnitReader::new(self)
    }

    /// Serializes the artifact
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size_bytes() + 64);
        out.extend_from_slice(ARTIFACT_MAGIC);
        out.push(ARTIFACT_VERSION);
        out.push(self.strategy.tag());
        out.push(T::WIDTH as u8);

        for dim in [self.n_rows, self.n_cols, self.nnz, self.row_start] {
            varint::put_ul(&mut out, dim as u64);
        }

        varint::put_ul(&mut out, self.ctl.len() as u64);
        out.extend_from_slice(&self.ctl);

        for width in CiSize::ALL {
            let dict = self.col_dict(width);
            varint::put_ul(&mut out, dict.len() as u64);
            for &d in dict {
                width.put(&mut out, d);
            }
        }

        varint::put_ul(&mut out, self.values.len() as u64);
        for &v in &self.values {
            v.put_le(&mut out);
        }
        out
    }

    /// Parses and validates a serialized artifact
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header_len = ARTIFACT_MAGIC.len() + 3;
        let header = bytes
            .get(..header_len)
            .ok_or_else(|| DeltaError::Corrupt("truncated header".into()))?;
        if &header[..4] != ARTIFACT_MAGIC {
            return Err(DeltaError::Corrupt("bad magic".into()));
        }
        if header[4] != ARTIFACT_VERSION {
            return Err(DeltaError::Corrupt(format!("unsupported version {}", header[4])));
        }
        let strategy = EncodingStrategy::from_tag(header[5])
            .ok_or_else(|| DeltaError::Corrupt(format!("unknown strategy tag {}", header[5])))?;
        if header[6] as usize != T::WIDTH {
            return Err(DeltaError::Corrupt(format!(
                "value width {} does not match the requested type ({})",
                header[6],
                T::WIDTH
            )));
        }

        let mut pos = header_len;
        let read_len = |pos: &mut usize| -> Result<usize> {
            let v = varint::get_ul(bytes, pos)?;
            usize::try_from(v).map_err(|_| DeltaError::Corrupt(format!("length {v} overflows")))
        };

        let n_rows = read_len(&mut pos)?;
        let n_cols = read_len(&mut pos)?;
        let nnz = read_len(&mut pos)?;
        let row_start = read_len(&mut pos)?;

        let ctl_len = read_len(&mut pos)?;
        let ctl = bytes
            .get(pos..pos.saturating_add(ctl_len))
            .ok_or_else(|| DeltaError::Corrupt("truncated control stream".into()))?
            .to_vec();
        pos += ctl_len;

        let mut col_dicts: [Vec<u64>; 4] = Default::default();
        for width in CiSize::ALL {
            let len = read_len(&mut pos)?;
            if len > bytes.len() {
                return Err(DeltaError::Corrupt("dictionary longer than input".into()));
            }
            let dict = &mut col_dicts[width.index()];
            dict.reserve(len);
            for _ in 0..len {
                dict.push(width.get(bytes, &mut pos)?);
            }
        }

        let values_len = read_len(&mut pos)?;
        let values_end = values_len
            .checked_mul(T::WIDTH)
            .and_then(|n| n.checked_add(pos))
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| DeltaError::Corrupt("truncated value section".into()))?;
        let values = bytes[pos..values_end]
            .chunks_exact(T::WIDTH)
            .map(T::from_le)
            .collect();
        pos = values_end;

        if pos != bytes.len() {
            return Err(DeltaError::Corrupt(format!(
                "{} trailing bytes",
                bytes.len() - pos
            )));
        }

        let matrix = Self {
            n_rows,
            n_cols,
            nnz,
            row_start,
            strategy,
            ctl,
            col_dicts,
            values,
        };
        matrix.validate()?;
        Ok(matrix)
    }

    /// Decodes every unit once, checking counts and bounds
    pub fn validate(&self) -> Result<()> {
        let mut seen = 0;
        for placed in self.units().placed() {
            let placed = placed?;
            if placed.row >= self.n_rows {
                return Err(DeltaError::Corrupt(format!(
                    "row {} outside {} rows",
                    placed.row, self.n_rows
                )));
            }
            if let Some(last) = placed.columns.last() {
                if last >= self.n_cols {
                    return Err(DeltaError::Corrupt(format!(
                        "column {} outside {} columns",
                        last, self.n_cols
                    )));
                }
            }
            seen += placed.values.len();
        }
        if seen != self.nnz {
            return Err(DeltaError::Corrupt(format!(
                "units hold {seen} elements, header says {}",
                self.nnz
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_bytes() {
        assert_eq!(UnitFlags::dense(0).to_byte(), 0);
        assert_eq!(UnitFlags::dense(1).to_byte(), 0b1010_0000);
        assert_eq!(UnitFlags::dense(5).to_byte(), 0b1000_0000);
        assert_eq!(UnitFlags::sparse(0, CiSize::U32).to_byte(), 0b0100_0010);
        assert_eq!(UnitFlags::sparse(2, CiSize::U64).to_byte(), 0b1100_0011);
    }

    #[test]
    fn test_flag_parse_inverts() {
        for flags in [
            UnitFlags::dense(0),
            UnitFlags::dense(1),
            UnitFlags::dense(7),
            UnitFlags::sparse(0, CiSize::U16),
            UnitFlags::sparse(1, CiSize::U64),
        ] {
            assert_eq!(UnitFlags::from_byte(flags.to_byte()).unwrap(), flags);
        }
    }

    #[test]
    fn test_flag_parse_rejects_garbage() {
        assert!(UnitFlags::from_byte(0b0001_0000).is_err());
        assert!(UnitFlags::from_byte(0b0010_0000).is_err());
        assert!(UnitFlags::from_byte(0b0000_0001).is_err());
    }
}
