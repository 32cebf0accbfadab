//! MatrixMarket coordinate files
//!
//! The reader streams entries one line at a time and converts the 1-based
//! indices of the format to 0-based ones. Gzip compressed input is detected by
//! its magic bytes and decompressed on the fly. Symmetric files are returned
//! as stored (lower triangle only).

use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Read, Write};
use std::marker::PhantomData;
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::debug;

use crate::delta::value::DeltaValue;
use crate::error::{DeltaError, Result};
use crate::matrix::{Entry, SparseMatrixCSR};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

fn decompressing<R: Read + 'static>(reader: R) -> Result<Box<dyn BufRead>> {
    let mut reader = BufReader::new(reader);
    let gzip = reader.fill_buf()?.starts_with(&GZIP_MAGIC);
    if gzip {
        Ok(Box::new(BufReader::new(GzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

/// Streaming reader of a MatrixMarket coordinate file
pub struct MatrixMarketReader<T> {
    lines: Lines<Box<dyn BufRead>>,
    line_no: usize,
    n_rows: usize,
    n_cols: usize,
    nnz: usize,
    seen: usize,
    done: bool,
    _marker: PhantomData<T>,
}

impl<T: DeltaValue> MatrixMarketReader<T> {
    /// Opens `path`, plain or gzip compressed
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening matrix market file");
        Self::from_reader(File::open(path)?)
    }

    /// Reads from any byte source, plain or gzip compressed
    pub fn from_reader<R: Read + 'static>(reader: R) -> Result<Self> {
        let mut reader = Self {
            lines: decompressing(reader)?.lines(),
            line_no: 0,
            n_rows: 0,
            n_cols: 0,
            nnz: 0,
            seen: 0,
            done: false,
            _marker: PhantomData,
        };
        reader.read_header()?;
        Ok(reader)
    }

    /// Rows declared by the size line
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Columns declared by the size line
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Nonzeros declared by the size line
    pub fn nnz(&self) -> usize {
        self.nnz
    }

    /// Next line that is neither blank nor a comment
    fn next_content_line(&mut self) -> Result<Option<String>> {
        for line in self.lines.by_ref() {
            let line = line?;
            self.line_no += 1;
            if self.line_no == 1 && line.starts_with("%%MatrixMarket") {
                check_banner(&line)?;
                continue;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('%') {
                continue;
            }
            return Ok(Some(line));
        }
        Ok(None)
    }

    fn read_header(&mut self) -> Result<()> {
        let line = self
            .next_content_line()?
            .ok_or_else(|| DeltaError::InvalidHeader("missing size line".into()))?;

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(DeltaError::InvalidHeader(format!(
                "expected `rows cols nonzeros`, got {line:?}"
            )));
        }
        let mut dims = [0usize; 3];
        for (dim, part) in dims.iter_mut().zip(&parts) {
            *dim = part
                .parse()
                .map_err(|_| DeltaError::InvalidHeader(format!("{part:?} is not a count")))?;
        }
        [self.n_rows, self.n_cols, self.nnz] = dims;
        debug!(
            rows = self.n_rows,
            cols = self.n_cols,
            nnz = self.nnz,
            "matrix market header"
        );
        Ok(())
    }

    fn parse_entry(&self, line: &str) -> Result<Entry<T>> {
        let invalid = |reason: String| DeltaError::InvalidEntry {
            line: self.line_no,
            reason,
        };
        let mut fields = line.split_whitespace();

        let mut index = |name: &str, bound: usize| -> Result<usize> {
            let field = fields
                .next()
                .ok_or_else(|| invalid(format!("missing {name} index")))?;
            let one_based: usize = field
                .parse()
                .map_err(|_| invalid(format!("{name} index {field:?} is not an integer")))?;
            if one_based == 0 || one_based > bound {
                return Err(invalid(format!("{name} index {one_based} outside 1..={bound}")));
            }
            Ok(one_based - 1)
        };
        let row = index("row", self.n_rows)?;
        let col = index("column", self.n_cols)?;

        // Pattern matrices carry no value
        let value = match fields.next() {
            None => T::one(),
            Some(field) => T::parse_field(field)
                .ok_or_else(|| invalid(format!("value {field:?} is not a number")))?,
        };
        Ok(Entry::new(row, col, value))
    }

    fn next_entry(&mut self) -> Result<Option<Entry<T>>> {
        match self.next_content_line()? {
            Some(line) => {
                let entry = self.parse_entry(&line)?;
                self.seen += 1;
                Ok(Some(entry))
            }
            None if self.seen != self.nnz => Err(DeltaError::InvalidHeader(format!(
                "size line declares {} nonzeros, file holds {}",
                self.nnz, self.seen
            ))),
            None => Ok(None),
        }
    }

    /// Reads the remaining entries into a CSR matrix, sorting them row-major
    ///
    /// MatrixMarket files are frequently stored column by column, which the
    /// encoder cannot consume directly.
    pub fn into_csr(self) -> Result<SparseMatrixCSR<T>> {
        let (n_rows, n_cols) = (self.n_rows, self.n_cols);
        let mut entries = self.collect::<Result<Vec<_>>>()?;
        entries.sort_by_key(|e| (e.row, e.col));
        SparseMatrixCSR::from_entries(n_rows, n_cols, &entries)
    }
}

fn check_banner(banner: &str) -> Result<()> {
    let lower = banner.to_ascii_lowercase();
    if !lower.contains("coordinate") {
        return Err(DeltaError::InvalidHeader(format!(
            "only coordinate matrices are supported: {banner:?}"
        )));
    }
    if lower.contains("complex") {
        return Err(DeltaError::InvalidHeader(format!(
            "complex values are not supported: {banner:?}"
        )));
    }
    Ok(())
}

impl<T: DeltaValue> Iterator for MatrixMarketReader<T> {
    type Item = Result<Entry<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = self.next_entry().transpose();
        if !matches!(next, Some(Ok(_))) {
            self.done = true;
        }
        next
    }
}

/// Writes `matrix` as a general real coordinate file
pub fn write_matrix_market<T, W>(mut out: W, matrix: &SparseMatrixCSR<T>) -> Result<()>
where
    T: DeltaValue + Display,
    W: Write,
{
    writeln!(out, "%%MatrixMarket matrix coordinate real general")?;
    writeln!(out, "{} {} {}", matrix.n_rows, matrix.n_cols, matrix.nnz())?;
    for e in matrix.entries() {
        // Convert to 1-indexed
        writeln!(out, "{} {} {}", e.row + 1, e.col + 1, e.value)?;
    }
    out.flush()?;
    Ok(())
}

/// Writes `matrix` to the file at `path`
pub fn write_matrix_market_file<T, P>(path: P, matrix: &SparseMatrixCSR<T>) -> Result<()>
where
    T: DeltaValue + Display,
    P: AsRef<Path>,
{
    let file = File::create(path)?;
    write_matrix_market(std::io::BufWriter::new(file), matrix)
}
