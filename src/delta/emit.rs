//! Unit layout shared by the byte encoder and the size model
//!
//! [`UnitEmitter`] lays a unit out for one strategy and pushes the pieces to a
//! [`UnitOutput`]. The encoder's output stores the bytes; the size model's
//! output only counts them with the varint size functions. Both walk the same
//! code, so a size estimate always equals the encoded length.

use ahash::AHashMap;

use crate::delta::dictionary::IndexDictionary;
use crate::delta::format::UnitFlags;
use crate::delta::unit::{DenseUnit, SparseUnit};
use crate::delta::value::DeltaValue;
use crate::delta::varint::{self, CiSize};
use crate::matrix::config::{DeltaConfig, EncodingStrategy};

/// Destination of an emitted unit
pub trait UnitOutput<T> {
    /// One control byte
    fn put_u8(&mut self, byte: u8);
    /// An unsigned varint
    fn put_ul(&mut self, value: u64);
    /// A signed varint
    fn put_l(&mut self, value: i64);
    /// A fixed-width column delta
    fn put_fixed(&mut self, width: CiSize, value: u64);
    /// A value for the value section
    fn push_value(&mut self, value: T);
}

/// Control stream and value section of an artifact under construction
#[derive(Debug, Clone)]
pub struct ArtifactBuffers<T> {
    pub ctl: Vec<u8>,
    pub values: Vec<T>,
}

impl<T> Default for ArtifactBuffers<T> {
    fn default() -> Self {
        Self {
            ctl: Vec::new(),
            values: Vec::new(),
        }
    }
}

impl<T> UnitOutput<T> for ArtifactBuffers<T> {
    fn put_u8(&mut self, byte: u8) {
        self.ctl.push(byte);
    }

    fn put_ul(&mut self, value: u64) {
        varint::put_ul(&mut self.ctl, value);
    }

    fn put_l(&mut self, value: i64) {
        varint::put_l(&mut self.ctl, value);
    }

    fn put_fixed(&mut self, width: CiSize, value: u64) {
        width.put(&mut self.ctl, value);
    }

    fn push_value(&mut self, value: T) {
        self.values.push(value);
    }
}

/// Byte totals of an artifact that is never materialized
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByteCount {
    pub ctl: usize,
    pub values: usize,
}

impl<T: DeltaValue> UnitOutput<T> for ByteCount {
    fn put_u8(&mut self, _byte: u8) {
        self.ctl += 1;
    }

    fn put_ul(&mut self, value: u64) {
        self.ctl += varint::ul_size(value);
    }

    fn put_l(&mut self, value: i64) {
        self.ctl += varint::l_size(value);
    }

    fn put_fixed(&mut self, width: CiSize, _value: u64) {
        self.ctl += width.bytes();
    }

    fn push_value(&mut self, _value: T) {
        self.values += T::WIDTH;
    }
}

/// Distinct values seen so far and the index cursor of the value stream
#[derive(Debug, Clone, Default)]
struct ValueTable {
    index: AHashMap<u64, usize>,
    prev: usize,
}

/// Lays out units for one strategy
#[derive(Debug, Clone)]
pub struct UnitEmitter<T, O> {
    strategy: EncodingStrategy,
    out: O,
    dictionary: Option<IndexDictionary>,
    cursors: [usize; 4],
    values: Option<ValueTable>,
    _marker: std::marker::PhantomData<T>,
}

impl<T, O> UnitEmitter<T, O>
where
    T: DeltaValue,
    O: UnitOutput<T>,
{
    /// Creates an emitter for `strategy`, taking dictionary parameters from `config`
    pub fn new(strategy: EncodingStrategy, config: &DeltaConfig, out: O) -> Self {
        let dictionary = strategy
            .uses_column_dictionary()
            .then(|| IndexDictionary::new(config.kgram_len, config.match_limit));
        let values = strategy.uses_value_dictionary().then(ValueTable::default);
        Self {
            strategy,
            out,
            dictionary,
            cursors: [0; 4],
            values,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn strategy(&self) -> EncodingStrategy {
        self.strategy
    }

    fn header(&mut self, flags: UnitFlags, len: usize, row_delta: usize) {
        assert!(
            (1..=u8::MAX as usize).contains(&len),
            "unit of {len} elements does not fit the size byte"
        );
        self.out.put_u8(flags.to_byte());
        self.out.put_u8(len as u8);
        if row_delta > 1 {
            self.out.put_ul(row_delta as u64);
        }
    }

    fn emit_values(&mut self, values: &[T]) {
        match &mut self.values {
            None => {
                for &v in values {
                    self.out.push_value(v);
                }
            }
            Some(table) => {
                for &v in values {
                    let next = table.index.len();
                    let idx = *table.index.entry(v.bits()).or_insert(next);
                    if idx == next {
                        self.out.push_value(v);
                    }
                    self.out.put_l(idx as i64 - table.prev as i64);
                    table.prev = idx;
                }
            }
        }
    }

    /// Lays out a sparse unit
    pub fn emit_sparse(&mut self, unit: &SparseUnit<T>) {
        let width = match self.strategy {
            EncodingStrategy::Raw => unit.raw_cisize(),
            _ => unit.cisize(),
        };
        self.header(UnitFlags::sparse(unit.row_delta, width), unit.len(), unit.row_delta);

        if !self.strategy.stores_jump() {
            self.out.put_fixed(width, unit.col_jump as u64);
            for &d in &unit.col_deltas {
                self.out.put_fixed(width, d as u64);
            }
        } else {
            self.out.put_ul(unit.col_jump as u64);
            match &mut self.dictionary {
                None => {
                    for &d in &unit.col_deltas {
                        self.out.put_fixed(width, d as u64);
                    }
                }
                Some(dictionary) => {
                    let seq: Vec<u64> = unit.col_deltas.iter().map(|&d| d as u64).collect();
                    let cursor = &mut self.cursors[width.index()];
                    for r in dictionary.insert(width, &seq) {
                        self.out.put_l(r.offset as i64 - *cursor as i64);
                        self.out.put_ul(r.length as u64);
                        *cursor = r.end();
                    }
                }
            }
        }

        self.emit_values(&unit.values);
    }

    /// Lays out a dense unit
    pub fn emit_dense(&mut self, unit: &DenseUnit<T>) {
        self.header(UnitFlags::dense(unit.row_delta), unit.len(), unit.row_delta);
        self.out.put_ul(unit.col_delta as u64);
        self.emit_values(&unit.values);
    }

    /// Bytes the column dictionary holds so far
    pub fn dictionary_bytes(&self) -> usize {
        self.dictionary.as_ref().map_or(0, |d| d.stats().bytes())
    }

    /// Output so far
    pub fn output(&self) -> &O {
        &self.out
    }

    /// Ends emission, returning the output and the dictionary backing arrays
    pub fn finish(mut self) -> (O, [Vec<u64>; 4]) {
        let backings = self
            .dictionary
            .as_mut()
            .map(IndexDictionary::take_backings)
            .unwrap_or_default();
        (self.out, backings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sparse(row_delta: usize, col_jump: usize, col_deltas: Vec<usize>) -> SparseUnit<f64> {
        let values = (0..=col_deltas.len()).map(|i| i as f64).collect();
        SparseUnit {
            row_delta,
            col_jump,
            col_deltas,
            values,
        }
    }

    fn fresh_buffers<T: DeltaValue>() -> ArtifactBuffers<T> {
        ArtifactBuffers::default()
    }

    #[test]
    fn test_buffers_start_empty_for_any_value_type() {
        let buffers = fresh_buffers::<f32>();
        assert!(buffers.ctl.is_empty() && buffers.values.is_empty());
        assert!(fresh_buffers::<f64>().values.is_empty());
    }

    #[test]
    fn test_jump_layout_bytes() {
        let config = DeltaConfig::default();
        let mut e = UnitEmitter::new(EncodingStrategy::Jump, &config, ArtifactBuffers::default());
        e.emit_sparse(&sparse(3, 200, vec![1, 2]));
        let (out, _) = e.finish();

        let flags = UnitFlags::sparse(3, CiSize::U8).to_byte();
        // flags, size, row delta 3, jump 200 as two groups, two u8 deltas
        assert_eq!(out.ctl, vec![flags, 3, 3, 0xc8, 0x01, 1, 2]);
        assert_eq!(out.values, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_row_delta_one_is_implicit() {
        let config = DeltaConfig::default();
        let mut e = UnitEmitter::new(EncodingStrategy::Jump, &config, ArtifactBuffers::default());
        e.emit_dense(&DenseUnit {
            row_delta: 1,
            col_delta: 4,
            values: vec![1.0f64, 2.0],
        });
        let (out, _) = e.finish();
        assert_eq!(out.ctl, vec![UnitFlags::dense(1).to_byte(), 2, 4]);
    }

    #[test]
    fn test_raw_layout_folds_jump() {
        let config = DeltaConfig::default();
        let mut e = UnitEmitter::new(EncodingStrategy::Raw, &config, ArtifactBuffers::default());
        e.emit_sparse(&sparse(0, 300, vec![1]));
        let (out, _) = e.finish();
        let flags = UnitFlags::sparse(0, CiSize::U16).to_byte();
        assert_eq!(out.ctl, vec![flags, 2, 0x2c, 0x01, 0x01, 0x00]);
    }

    #[test]
    fn test_value_dictionary_stores_distinct_values_once() {
        let config = DeltaConfig::default();
        let mut e = UnitEmitter::new(
            EncodingStrategy::ValueDictionary,
            &config,
            ArtifactBuffers::default(),
        );
        e.emit_dense(&DenseUnit {
            row_delta: 0,
            col_delta: 0,
            values: vec![5.0f64, 7.0, 5.0, 5.0],
        });
        let (out, _) = e.finish();
        assert_eq!(out.values, vec![5.0, 7.0]);
        // header, col delta, then index deltas 0, +1, -1, 0
        assert_eq!(&out.ctl[3..], &[0x00, 0x02, 0x03, 0x00]);
    }

    #[test]
    fn test_column_dictionary_reuses_sequences() {
        let config = DeltaConfig::default();
        let mut e = UnitEmitter::new(
            EncodingStrategy::ColumnDictionary,
            &config,
            ArtifactBuffers::<f64>::default(),
        );
        e.emit_sparse(&sparse(0, 0, vec![1, 1, 1, 5]));
        e.emit_sparse(&sparse(1, 0, vec![1, 1, 1, 5]));
        assert_eq!(e.dictionary_bytes(), 4);

        let (_, backings) = e.finish();
        assert_eq!(backings[CiSize::U8.index()], vec![1, 1, 1, 5]);
    }

    #[test]
    fn test_counting_matches_writing() {
        let config = DeltaConfig::default();
        for strategy in EncodingStrategy::ALL {
            let mut writer = UnitEmitter::new(strategy, &config, ArtifactBuffers::default());
            let mut counter = UnitEmitter::new(strategy, &config, ByteCount::default());
            let units = [
                sparse(0, 70_000, vec![1, 300, 2]),
                sparse(9, 1, vec![1, 300, 2]),
                sparse(1, 0, vec![]),
            ];
            for u in &units {
                writer.emit_sparse(u);
                counter.emit_sparse(u);
            }
            let (written, _) = writer.finish();
            let count = *counter.output();
            assert_eq!(written.ctl.len(), count.ctl, "{strategy:?}");
            assert_eq!(written.values.len() * 8, count.values, "{strategy:?}");
        }
    }
}
