//! Coordinate entries, the input unit of the encoder

/// One stored element at `(row, col)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entry<T> {
    pub row: usize,
    pub col: usize,
    pub value: T,
}

impl<T> Entry<T> {
    pub fn new(row: usize, col: usize, value: T) -> Self {
        Self { row, col, value }
    }
}

impl<T> From<(usize, usize, T)> for Entry<T> {
    fn from((row, col, value): (usize, usize, T)) -> Self {
        Self::new(row, col, value)
    }
}
