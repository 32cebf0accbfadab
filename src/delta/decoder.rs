//! Decoding of delta artifacts
//!
//! [`UnitReader`] walks the control stream and rebuilds the units exactly as
//! the classifier produced them. [`PlacedUnits`] additionally tracks the row
//! and column cursors and yields every unit with absolute positions, which is
//! what a consumer such as a multiply kernel iterates over.

use crate::delta::dictionary::{resolve_refs, DictionaryRef};
use crate::delta::format::{DeltaMatrix, UnitFlags};
use crate::delta::unit::{DenseUnit, SparseUnit, Unit};
use crate::delta::value::DeltaValue;
use crate::delta::varint::{self, CiSize};
use crate::error::{DeltaError, Result};
use crate::matrix::config::EncodingStrategy;
use crate::matrix::{Entry, SparseMatrixCSR};

fn to_usize(value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| DeltaError::Corrupt(format!("{value} overflows usize")))
}

fn offset_by(base: usize, delta: i64) -> Result<usize> {
    let moved = base as i128 + i128::from(delta);
    usize::try_from(moved)
        .map_err(|_| DeltaError::Corrupt(format!("index {base}{delta:+} out of range")))
}

/// Iterator over the units of an artifact, in emission order
pub struct UnitReader<'a, T> {
    matrix: &'a DeltaMatrix<T>,
    pos: usize,
    value_pos: usize,
    value_idx: usize,
    cursors: [usize; 4],
    failed: bool,
}

impl<'a, T: DeltaValue> UnitReader<'a, T> {
    pub fn new(matrix: &'a DeltaMatrix<T>) -> Self {
        Self {
            matrix,
            pos: 0,
            value_pos: 0,
            value_idx: 0,
            cursors: [0; 4],
            failed: false,
        }
    }

    /// Attaches row and column positions to every unit
    pub fn placed(self) -> PlacedUnits<'a, T> {
        PlacedUnits {
            row: self.matrix.row_start,
            x_old: 0,
            units: self,
        }
    }

    fn byte(&mut self) -> Result<u8> {
        let byte = *self
            .matrix
            .ctl
            .get(self.pos)
            .ok_or_else(|| DeltaError::Corrupt("truncated unit header".into()))?;
        self.pos += 1;
        Ok(byte)
    }

    fn ul(&mut self) -> Result<usize> {
        to_usize(varint::get_ul(&self.matrix.ctl, &mut self.pos)?)
    }

    fn fixed(&mut self, width: CiSize) -> Result<usize> {
        to_usize(width.get(&self.matrix.ctl, &mut self.pos)?)
    }

    fn row_delta(&mut self, flags: UnitFlags) -> Result<usize> {
        if !flags.new_row {
            return Ok(0);
        }
        if flags.next_row {
            return Ok(1);
        }
        let delta = self.ul()?;
        if delta < 2 {
            return Err(DeltaError::Corrupt(format!(
                "stored row delta {delta} should have been implicit"
            )));
        }
        Ok(delta)
    }

    fn dictionary_deltas(&mut self, width: CiSize, count: usize) -> Result<Vec<usize>> {
        let mut refs = Vec::new();
        let mut covered = 0;
        while covered < count {
            let cursor = &mut self.cursors[width.index()];
            let offset = offset_by(*cursor, varint::get_l(&self.matrix.ctl, &mut self.pos)?)?;
            let length = to_usize(varint::get_ul(&self.matrix.ctl, &mut self.pos)?)?;
            if length == 0 || length > count - covered {
                return Err(DeltaError::Corrupt(format!(
                    "dictionary reference of {length} elements with {} left",
                    count - covered
                )));
            }
            let r = DictionaryRef { offset, length };
            *cursor = r.end();
            covered += length;
            refs.push(r);
        }
        resolve_refs(self.matrix.col_dict(width), &refs)?
            .into_iter()
            .map(to_usize)
            .collect()
    }

    fn values(&mut self, count: usize) -> Result<Vec<T>> {
        let table = &self.matrix.values;
        if !self.matrix.strategy.uses_value_dictionary() {
            let slice = table
                .get(self.value_pos..self.value_pos + count)
                .ok_or_else(|| DeltaError::Corrupt("value section exhausted".into()))?;
            self.value_pos += count;
            return Ok(slice.to_vec());
        }

        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            let delta = varint::get_l(&self.matrix.ctl, &mut self.pos)?;
            self.value_idx = offset_by(self.value_idx, delta)?;
            let v = *table.get(self.value_idx).ok_or_else(|| {
                DeltaError::Corrupt(format!(
                    "value index {} outside table of {}",
                    self.value_idx,
                    table.len()
                ))
            })?;
            values.push(v);
        }
        Ok(values)
    }

    fn read_unit(&mut self) -> Result<Unit<T>> {
        let flags = UnitFlags::from_byte(self.byte()?)?;
        let len = self.byte()? as usize;
        if len == 0 {
            return Err(DeltaError::Corrupt("empty unit".into()));
        }
        let row_delta = self.row_delta(flags)?;

        if !flags.sparse {
            let col_delta = self.ul()?;
            let values = self.values(len)?;
            return Ok(Unit::Dense(DenseUnit {
                row_delta,
                col_delta,
                values,
            }));
        }

        let width = flags.cisize;
        let (col_jump, col_deltas) = match self.matrix.strategy {
            EncodingStrategy::Raw => {
                let jump = self.fixed(width)?;
                let deltas = (1..len).map(|_| self.fixed(width)).collect::<Result<_>>()?;
                (jump, deltas)
            }
            strategy if strategy.uses_column_dictionary() => {
                let jump = self.ul()?;
                (jump, self.dictionary_deltas(width, len - 1)?)
            }
            _ => {
                let jump = self.ul()?;
                let deltas = (1..len).map(|_| self.fixed(width)).collect::<Result<_>>()?;
                (jump, deltas)
            }
        };
        let values = self.values(len)?;
        Ok(Unit::Sparse(SparseUnit {
            row_delta,
            col_jump,
            col_deltas,
            values,
        }))
    }
}

impl<T: DeltaValue> Iterator for UnitReader<'_, T> {
    type Item = Result<Unit<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.matrix.ctl.len() {
            return None;
        }
        let unit = self.read_unit();
        self.failed = unit.is_err();
        Some(unit)
    }
}

/// Columns covered by a placed unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSpan {
    /// `len` consecutive columns from `start`
    Dense { start: usize, len: usize },
    /// Explicit column list
    Sparse(Vec<usize>),
}

impl ColumnSpan {
    pub fn len(&self) -> usize {
        match self {
            ColumnSpan::Dense { len, .. } => *len,
            ColumnSpan::Sparse(cols) => cols.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Last covered column
    pub fn last(&self) -> Option<usize> {
        match self {
            ColumnSpan::Dense { start, len } => len.checked_sub(1).map(|l| start + l),
            ColumnSpan::Sparse(cols) => cols.last().copied(),
        }
    }

    /// Covered columns in order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        let (dense, sparse) = match self {
            ColumnSpan::Dense { start, len } => (Some(*start..*start + *len), None),
            ColumnSpan::Sparse(cols) => (None, Some(cols.iter().copied())),
        };
        dense.into_iter().flatten().chain(sparse.into_iter().flatten())
    }
}

/// A unit with absolute positions
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedUnit<T> {
    pub row: usize,
    pub columns: ColumnSpan,
    pub values: Vec<T>,
}

impl<T: Copy> PlacedUnit<T> {
    /// Elements of the unit as coordinate entries
    pub fn entries(&self) -> impl Iterator<Item = Entry<T>> + '_ {
        self.columns
            .iter()
            .zip(&self.values)
            .map(|(col, &value)| Entry::new(self.row, col, value))
    }
}

/// Iterator over units with absolute row and column positions
pub struct PlacedUnits<'a, T> {
    units: UnitReader<'a, T>,
    row: usize,
    x_old: usize,
}

impl<T: DeltaValue> PlacedUnits<'_, T> {
    fn place(&mut self, unit: Unit<T>) -> Result<PlacedUnit<T>> {
        let overflow = || DeltaError::Corrupt("position overflows usize".into());

        if unit.row_delta() > 0 {
            self.row = self.row.checked_add(unit.row_delta()).ok_or_else(overflow)?;
            self.x_old = 0;
        }

        let (columns, values) = match unit {
            Unit::Dense(u) => {
                let start = self.x_old.checked_add(u.col_delta).ok_or_else(overflow)?;
                self.x_old = start.checked_add(u.len()).ok_or_else(overflow)?;
                (ColumnSpan::Dense { start, len: u.len() }, u.values)
            }
            Unit::Sparse(u) => {
                let mut cols = Vec::with_capacity(u.len());
                let mut col = self.x_old.checked_add(u.col_jump).ok_or_else(overflow)?;
                cols.push(col);
                for &d in &u.col_deltas {
                    col = col.checked_add(d).ok_or_else(overflow)?;
                    cols.push(col);
                }
                self.x_old = col;
                (ColumnSpan::Sparse(cols), u.values)
            }
        };

        Ok(PlacedUnit {
            row: self.row,
            columns,
            values,
        })
    }
}

impl<T: DeltaValue> Iterator for PlacedUnits<'_, T> {
    type Item = Result<PlacedUnit<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        let unit = self.units.next()?;
        let placed = unit.and_then(|u| self.place(u));
        if placed.is_err() {
            self.units.failed = true;
        }
        Some(placed)
    }
}

impl<T: DeltaValue> DeltaMatrix<T> {
    /// Decodes every element in row-major order
    pub fn entries(&self) -> Result<Vec<Entry<T>>> {
        let mut out = Vec::with_capacity(self.nnz);
        for placed in self.units().placed() {
            out.extend(placed?.entries());
        }
        Ok(out)
    }

    /// Decodes into a CSR matrix of the artifact's dimensions
    pub fn to_csr(&self) -> Result<SparseMatrixCSR<T>> {
        SparseMatrixCSR::from_entries(self.n_rows, self.n_cols, &self.entries()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(strategy: EncodingStrategy, ctl: Vec<u8>, values: Vec<f64>) -> DeltaMatrix<f64> {
        DeltaMatrix {
            n_rows: 4,
            n_cols: 16,
            nnz: values.len(),
            row_start: 0,
            strategy,
            ctl,
            col_dicts: Default::default(),
            values,
        }
    }

    #[test]
    fn test_reads_hand_built_stream() {
        let mut ctl = vec![UnitFlags::dense(0).to_byte(), 3, 0];
        ctl.extend([UnitFlags::sparse(2, CiSize::U8).to_byte(), 2, 2, 5, 4]);
        let m = artifact(EncodingStrategy::Jump, ctl, vec![1.0, 2.0, 3.0, 4.0, 5.0]);

        let placed: Vec<_> = m.units().placed().collect::<Result<_>>().unwrap();
        assert_eq!(placed[0].row, 0);
        assert_eq!(placed[0].columns, ColumnSpan::Dense { start: 0, len: 3 });
        assert_eq!(placed[1].row, 2);
        assert_eq!(placed[1].columns, ColumnSpan::Sparse(vec![5, 9]));
        assert_eq!(placed[1].values, vec![4.0, 5.0]);
        m.validate().unwrap();
    }

    #[test]
    fn test_origin_continues_inside_row() {
        // dense 2..4 then sparse with jump 3 from column 4
        let ctl = vec![
            UnitFlags::dense(0).to_byte(),
            2,
            2,
            UnitFlags::sparse(0, CiSize::U8).to_byte(),
            1,
            3,
        ];
        let m = artifact(EncodingStrategy::Jump, ctl, vec![1.0, 2.0, 3.0]);
        let entries = m.entries().unwrap();
        let cols: Vec<usize> = entries.iter().map(|e| e.col).collect();
        assert_eq!(cols, vec![2, 3, 7]);
    }

    #[test]
    fn test_truncated_stream_is_corrupt() {
        let ctl = vec![UnitFlags::sparse(0, CiSize::U16).to_byte(), 2, 1, 0x01];
        let m = artifact(EncodingStrategy::Jump, ctl, vec![1.0, 2.0]);
        let mut units = m.units();
        assert!(matches!(units.next(), Some(Err(DeltaError::Corrupt(_)))));
        assert!(units.next().is_none());
    }

    #[test]
    fn test_value_index_out_of_table() {
        // one dense element whose value index delta points past the table
        let ctl = vec![UnitFlags::dense(0).to_byte(), 1, 0, 0x04];
        let m = artifact(EncodingStrategy::ValueDictionary, ctl, vec![1.0]);
        assert!(m.entries().is_err());
    }

    #[test]
    fn test_column_span_iter() {
        let dense = ColumnSpan::Dense { start: 4, len: 3 };
        assert_eq!(dense.iter().collect::<Vec<_>>(), vec![4, 5, 6]);
        assert_eq!(dense.last(), Some(6));
        let sparse = ColumnSpan::Sparse(vec![1, 8]);
        assert_eq!(sparse.iter().collect::<Vec<_>>(), vec![1, 8]);
        assert_eq!(sparse.len(), 2);
    }
}
