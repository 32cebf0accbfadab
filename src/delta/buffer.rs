//! Pending run of the current row
//!
//! Columns and values are kept in two parallel ring buffers. Units are cut
//! from the front with [`RunBuffer::drain`]; the classifier only ever pushes
//! to the back. Both buffers must have the same length after every operation.

use std::collections::VecDeque;

/// Columns and values buffered for the unit being built
#[derive(Debug, Clone)]
pub struct RunBuffer<T> {
    cols: VecDeque<usize>,
    vals: VecDeque<T>,
}

impl<T: Copy> RunBuffer<T> {
    /// Creates a buffer sized for runs of up to `capacity` elements
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cols: VecDeque::with_capacity(capacity),
            vals: VecDeque::with_capacity(capacity),
        }
    }

    fn check(&self) {
        assert_eq!(
            self.cols.len(),
            self.vals.len(),
            "column and value buffers out of step"
        );
    }

    /// Appends one element
    pub fn push(&mut self, col: usize, val: T) {
        self.check();
        self.cols.push_back(col);
        self.vals.push_back(val);
    }

    /// Number of buffered elements
    pub fn len(&self) -> usize {
        self.check();
        self.cols.len()
    }

    /// Whether nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First buffered column
    #[cfg(test)]
    pub fn first_col(&self) -> Option<usize> {
        self.cols.front().copied()
    }

    /// Last buffered column
    pub fn last_col(&self) -> Option<usize> {
        self.cols.back().copied()
    }

    /// Removes the first `count` elements and returns them
    ///
    /// # Panics
    ///
    /// Panics if fewer than `count` elements are buffered.
    pub fn drain(&mut self, count: usize) -> (Vec<usize>, Vec<T>) {
        self.check();
        assert!(
            count <= self.cols.len(),
            "cannot drain {} of {} buffered elements",
            count,
            self.cols.len()
        );
        let cols: Vec<usize> = self.cols.drain(..count).collect();
        let vals: Vec<T> = self.vals.drain(..count).collect();
        self.check();
        (cols, vals)
    }

    /// Removes everything
    pub fn drain_all(&mut self) -> (Vec<usize>, Vec<T>) {
        let len = self.len();
        self.drain(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_drain_prefix() {
        let mut buf = RunBuffer::with_capacity(4);
        buf.push(1, 10.0);
        buf.push(4, 40.0);
        buf.push(5, 50.0);

        assert_eq!(buf.len(), 3);
        assert_eq!(buf.first_col(), Some(1));
        assert_eq!(buf.last_col(), Some(5));

        let (cols, vals) = buf.drain(2);
        assert_eq!(cols, vec![1, 4]);
        assert_eq!(vals, vec![10.0, 40.0]);
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.first_col(), Some(5));
    }

    #[test]
    fn test_drain_all_empties() {
        let mut buf = RunBuffer::with_capacity(2);
        buf.push(0, 1.0f32);
        let (cols, _) = buf.drain_all();
        assert_eq!(cols, vec![0]);
        assert!(buf.is_empty());
        assert_eq!(buf.last_col(), None);
    }

    #[test]
    #[should_panic(expected = "cannot drain")]
    fn test_overdrain_panics() {
        let mut buf = RunBuffer::with_capacity(1);
        buf.push(0, 1.0f64);
        buf.drain(2);
    }
}
