//! Delta encoding of row-major sparse matrices
//!
//! Entries flow through the [`RowClassifier`], which cuts every row into dense
//! and sparse units and hands them to a [`UnitSink`]. The [`DeltaEncoder`]
//! sink writes a [`DeltaMatrix`]; the [`SizeModel`] sink only predicts its size.

pub mod buffer;
pub mod classifier;
pub mod decoder;
pub mod dictionary;
pub mod emit;
pub mod encoder;
pub mod format;
pub mod sink;
pub mod size_model;
pub mod unit;
pub mod value;
pub mod varint;

pub use classifier::{classify, ClassifierState, Event, ParseState, PrimedEntries, RowClassifier};
pub use decoder::{ColumnSpan, PlacedUnit, PlacedUnits, UnitReader};
pub use dictionary::{DictionaryRef, DictionaryStats, IndexDictionary};
pub use encoder::{encode_csr, encode_entries, DeltaEncoder};
pub use format::{DeltaMatrix, UnitFlags};
pub use sink::{CollectUnits, PassInfo, UnitSink};
pub use size_model::{estimate_csr, estimate_entries, SizeModel, SizeReport, StrategySize};
pub use unit::{DenseUnit, SparseUnit, Unit};
pub use value::DeltaValue;
pub use varint::CiSize;
