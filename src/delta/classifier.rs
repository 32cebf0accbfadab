//! # Row Classification
//!
//! The classifier consumes entries one at a time and decides, for the run of
//! the current row that is still buffered, whether it should leave as a dense
//! unit (strictly consecutive columns) or as a sparse unit (explicit deltas).
//!
//! ## States
//!
//! - **Unknown**: a single element is buffered at the start of a row.
//! - **MaybeDense**: the tail of the buffer is consecutive but shorter than
//!   `seq_limit`; nothing is committed yet.
//! - **Dense**: the whole buffer is consecutive and will leave as one dense unit.
//! - **Sparse**: the buffer will leave as a sparse unit.
//!
//! ## Events
//!
//! Computed for every incoming entry against the buffered tail, first match wins:
//! `NewRow`, `MaxSize`, `Seq` (column = last + 1), `Sparse`.
//!
//! Committing to dense requires `seq_limit` consecutive steps because a dense
//! run cannot be split back into sparse units once earlier data was flushed.

use tracing::{debug, trace};

use crate::constants::PROGRESS_ROW_INTERVAL;
use crate::delta::buffer::RunBuffer;
use crate::delta::sink::{PassInfo, UnitSink};
use crate::error::{DeltaError, Result};
use crate::matrix::config::DeltaConfig;
use crate::matrix::Entry;

/// Classification of the buffered run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierState {
    Unknown,
    MaybeDense,
    Dense,
    Sparse,
}

/// Event raised by one incoming entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    NewRow,
    MaxSize,
    Seq,
    Sparse,
}

/// Cursor state of one parse pass
#[derive(Debug, Clone)]
pub struct ParseState<T> {
    pub(crate) buf: RunBuffer<T>,
    /// Column origin of the next delta
    pub(crate) x_old: usize,
    pub(crate) y_cur: usize,
    pub(crate) y_old: usize,
    pub(crate) state: ClassifierState,
    /// Consecutive +1 steps at the tail of the buffer
    pub(crate) seq_cnt: usize,
    pub(crate) seq_limit: usize,
    /// The next unit starts a new row and carries a row delta
    pub(crate) flag_nr: bool,
}

impl<T: Copy> ParseState<T> {
    /// Creates the state of a pass whose first entry is `first`.
    ///
    /// `origin_row` is the row decoding starts from; when the first entry lies
    /// below it, the first unit carries the row delta.
    pub fn primed(first: Entry<T>, origin_row: usize, seq_limit: usize, capacity: usize) -> Self {
        let mut buf = RunBuffer::with_capacity(capacity);
        buf.push(first.col, first.value);
        Self {
            buf,
            x_old: 0,
            y_cur: first.row,
            y_old: origin_row,
            state: ClassifierState::Unknown,
            seq_cnt: 0,
            seq_limit,
            flag_nr: first.row != origin_row,
        }
    }

    /// Current classification
    pub fn state(&self) -> ClassifierState {
        self.state
    }

    /// Row the buffered run belongs to
    pub fn current_row(&self) -> usize {
        self.y_cur
    }
}

/// An entry stream with its first entry already pulled.
///
/// The classifier needs one element to seed its state before the main loop;
/// priming makes that look-ahead explicit. An empty stream never produces a
/// `PrimedEntries`.
pub struct PrimedEntries<T, I> {
    first: Entry<T>,
    rest: I,
}

impl<T, I> PrimedEntries<T, I>
where
    I: Iterator<Item = Result<Entry<T>>>,
{
    /// Pulls the first entry; `Ok(None)` when the stream is empty
    pub fn new(mut entries: I) -> Result<Option<Self>> {
        match entries.next() {
            None => Ok(None),
            Some(first) => Ok(Some(Self {
                first: first?,
                rest: entries,
            })),
        }
    }
}

/// The streaming state machine driving a [`UnitSink`]
pub struct RowClassifier<T> {
    state: ParseState<T>,
    ctl_size_max: usize,
    rows: usize,
    nnz: usize,
}

impl<T: Copy> RowClassifier<T> {
    /// Seeds a classifier with the first entry of a pass
    pub fn new(first: Entry<T>, origin_row: usize, config: &DeltaConfig) -> Result<Self> {
        config.validate()?;
        if first.row < origin_row {
            return Err(DeltaError::UnsortedRows {
                previous: origin_row,
                row: first.row,
            });
        }
        Ok(Self {
            state: ParseState::primed(first, origin_row, config.seq_limit, config.ctl_size_max),
            ctl_size_max: config.ctl_size_max,
            rows: 1,
            nnz: 1,
        })
    }

    /// Parse state, for inspection
    pub fn parse_state(&self) -> &ParseState<T> {
        &self.state
    }

    /// Classifies `entry` against the buffered tail
    pub fn event(&self, entry: &Entry<T>) -> Event {
        let st = &self.state;
        if entry.row != st.y_cur {
            Event::NewRow
        } else if st.buf.len() >= self.ctl_size_max {
            Event::MaxSize
        } else if st.buf.last_col().map(|last| last + 1) == Some(entry.col) {
            Event::Seq
        } else {
            Event::Sparse
        }
    }

    fn finalize_sparse<S: UnitSink<T>>(&mut self, len: usize, sink: &mut S) -> Result<()> {
        if let Some(unit) = self.state.finalize_sparse_prefix(len)? {
            sink.finalize_sparse(unit)?;
        }
        Ok(())
    }

    fn finalize_dense<S: UnitSink<T>>(&mut self, sink: &mut S) -> Result<()> {
        let unit = self.state.finalize_dense_run()?;
        sink.finalize_dense(unit)
    }

    fn finalize_current<S: UnitSink<T>>(&mut self, sink: &mut S) -> Result<()> {
        if self.state.state == ClassifierState::Dense {
            self.finalize_dense(sink)
        } else {
            let len = self.state.buf.len();
            self.finalize_sparse(len, sink)
        }
    }

    fn handle_new_row<S: UnitSink<T>>(&mut self, entry: &Entry<T>, sink: &mut S) -> Result<()> {
        if entry.row < self.state.y_cur {
            return Err(DeltaError::UnsortedRows {
                previous: self.state.y_cur,
                row: entry.row,
            });
        }
        assert!(!self.state.buf.is_empty(), "new row with an empty run");
        self.finalize_current(sink)?;

        let st = &mut self.state;
        st.flag_nr = true;
        st.y_old = st.y_cur;
        st.y_cur = entry.row;
        st.x_old = 0;
        st.state = ClassifierState::Unknown;

        self.rows += 1;
        if self.rows % PROGRESS_ROW_INTERVAL == 0 {
            trace!(rows = self.rows, nnz = self.nnz, "classifier progress");
        }
        Ok(())
    }

    fn handle_seq<S: UnitSink<T>>(&mut self, sink: &mut S) -> Result<()> {
        match self.state.state {
            ClassifierState::Unknown | ClassifierState::Sparse => {
                self.state.state = ClassifierState::MaybeDense;
                self.state.seq_cnt = 1;
            }
            ClassifierState::MaybeDense => {
                self.state.seq_cnt += 1;
                if self.state.seq_cnt >= self.state.seq_limit {
                    // a flush forced by the size cap can leave fewer buffered
                    // elements than counted steps
                    let prefix = self.state.buf.len().saturating_sub(self.state.seq_cnt);
                    self.finalize_sparse(prefix, sink)?;
                    self.state.state = ClassifierState::Dense;
                }
            }
            ClassifierState::Dense => {}
        }
        Ok(())
    }

    fn handle_sparse<S: UnitSink<T>>(&mut self, sink: &mut S) -> Result<()> {
        match self.state.state {
            ClassifierState::Sparse => {}
            ClassifierState::Dense => {
                self.finalize_dense(sink)?;
                self.state.state = ClassifierState::Sparse;
            }
            _ => self.state.state = ClassifierState::Sparse,
        }
        Ok(())
    }

    fn handle_max_size<S: UnitSink<T>>(&mut self, sink: &mut S) -> Result<()> {
        if self.state.state == ClassifierState::Unknown {
            return Err(DeltaError::MaxSizeInUnknown);
        }
        self.finalize_current(sink)
    }

    /// Feeds one entry through the state machine
    pub fn push<S: UnitSink<T>>(&mut self, entry: Entry<T>, sink: &mut S) -> Result<()> {
        match self.event(&entry) {
            Event::NewRow => self.handle_new_row(&entry, sink)?,
            Event::Seq => self.handle_seq(sink)?,
            Event::Sparse => self.handle_sparse(sink)?,
            Event::MaxSize => self.handle_max_size(sink)?,
        }
        self.state.buf.push(entry.col, entry.value);
        self.nnz += 1;
        Ok(())
    }

    /// Flushes the remaining run; returns `(rows touched, entries consumed)`
    pub fn finish<S: UnitSink<T>>(mut self, sink: &mut S) -> Result<(usize, usize)> {
        self.finalize_current(sink)?;
        debug_assert!(self.state.buf.is_empty());
        Ok((self.rows, self.nnz))
    }
}

/// Runs a whole pass: classifies every entry and finalizes `sink`.
///
/// `info` carries the matrix dimensions; entries outside them are rejected
/// with [`DeltaError::InvalidEntry`]. Its `nnz` is replaced by the number of
/// entries actually consumed.
pub fn classify<T, I, S>(
    entries: I,
    mut info: PassInfo,
    config: &DeltaConfig,
    mut sink: S,
) -> Result<S::Output>
where
    T: Copy,
    I: Iterator<Item = Result<Entry<T>>>,
    S: UnitSink<T>,
{
    config.validate()?;
    let Some(primed) = PrimedEntries::new(entries)? else {
        info.nnz = 0;
        return sink.finalize_all(info);
    };

    let PrimedEntries { first, rest } = primed;
    info.check_bounds(&first, 1)?;
    let mut classifier = RowClassifier::new(first, info.row_start, config)?;
    for (i, entry) in rest.enumerate() {
        let entry = entry?;
        info.check_bounds(&entry, i + 2)?;
        classifier.push(entry, &mut sink)?;
    }
    let (rows, nnz) = classifier.finish(&mut sink)?;

    debug!(rows, nnz, seq_limit = config.seq_limit, "classification pass complete");
    info.nnz = nnz;
    sink.finalize_all(info)
}
