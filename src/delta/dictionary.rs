//! # Column Index Dictionary
//!
//! Deduplicates column-delta sequences of sparse units. Every distinct
//! sequence is stored once in a backing array; units then refer to it with
//! `(offset, length)` pairs.
//!
//! Candidate matches are found through a reverse index keyed by the first
//! `k` elements (a k-gram) of the sequence being inserted. This finds *a*
//! sufficient match, not necessarily the longest one: `match_limit` only caps
//! how long a match has to be before it is accepted.
//!
//! Each column index width keeps its own backing array and index, because the
//! deltas of a unit are stored with one uniform width.

use ahash::AHashMap;

use crate::delta::varint::CiSize;
use crate::error::{DeltaError, Result};

/// A reference into a backing array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DictionaryRef {
    /// Start position in the backing array
    pub offset: usize,
    /// Number of elements referenced
    pub length: usize,
}

impl DictionaryRef {
    /// One past the last referenced position
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Backing array and reverse index of one width
#[derive(Debug, Clone, Default)]
struct DictionaryClass {
    backing: Vec<u64>,
    kgrams: AHashMap<Vec<u64>, Vec<usize>>,
    first_seen: AHashMap<u64, usize>,
}

impl DictionaryClass {
    fn match_len(&self, offset: usize, seq: &[u64]) -> usize {
        self.backing[offset..]
            .iter()
            .zip(seq)
            .take_while(|(a, b)| a == b)
            .count()
    }

    fn find(&self, seq: &[u64], kgram_len: usize, required: usize) -> Option<DictionaryRef> {
        let accept = |offset: usize| {
            let length = self.match_len(offset, seq);
            (length >= required).then_some(DictionaryRef { offset, length })
        };

        if seq.len() >= kgram_len {
            self.kgrams
                .get(&seq[..kgram_len])?
                .iter()
                .find_map(|&offset| accept(offset))
        } else {
            // Too short for the k-gram index: scan every position, starting at
            // the first one that can possibly match.
            let start = *self.first_seen.get(&seq[0])?;
            (start..self.backing.len()).find_map(accept)
        }
    }

    fn append(&mut self, seq: &[u64], kgram_len: usize) -> DictionaryRef {
        let offset = self.backing.len();
        for (i, &value) in seq.iter().enumerate() {
            self.first_seen.entry(value).or_insert(offset + i);
        }
        self.backing.extend_from_slice(seq);

        // every k-gram ending inside the new elements, including those that
        // straddle the previous tail
        if self.backing.len() >= kgram_len {
            let first_start = (offset + 1).saturating_sub(kgram_len);
            for start in first_start..=self.backing.len() - kgram_len {
                self.kgrams
                    .entry(self.backing[start..start + kgram_len].to_vec())
                    .or_default()
                    .push(start);
            }
        }

        DictionaryRef {
            offset,
            length: seq.len(),
        }
    }

    fn clear(&mut self) {
        self.backing.clear();
        self.kgrams.clear();
        self.first_seen.clear();
    }
}

/// Element counts stored per width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DictionaryStats {
    /// Stored elements, indexed by [`CiSize::index`]
    pub stored: [usize; 4],
}

impl DictionaryStats {
    /// Total bytes taken by the backing arrays
    pub fn bytes(&self) -> usize {
        CiSize::ALL
            .iter()
            .map(|w| self.stored[w.index()] * w.bytes())
            .sum()
    }
}

/// Back-reference compressor for column-delta sequences
///
/// One instance serves one encoding pass; call [`IndexDictionary::clear`] or
/// build a new one before encoding an unrelated matrix.
#[derive(Debug, Clone)]
pub struct IndexDictionary {
    kgram_len: usize,
    match_limit: Option<usize>,
    classes: [DictionaryClass; 4],
}

impl IndexDictionary {
    /// Creates an empty dictionary
    ///
    /// `match_limit` of `None` requires a candidate to cover the whole
    /// remaining sequence.
    ///
    /// # Panics
    ///
    /// Panics if `kgram_len` is zero or `match_limit` is `Some(0)`.
    pub fn new(kgram_len: usize, match_limit: Option<usize>) -> Self {
        assert!(kgram_len >= 1, "k-gram length must be at least 1");
        assert!(match_limit != Some(0), "match limit must be at least 1");
        Self {
            kgram_len,
            match_limit,
            classes: Default::default(),
        }
    }

    /// Inserts `seq` into the class of `width` and returns the references
    /// that reproduce it, in order
    pub fn insert(&mut self, width: CiSize, seq: &[u64]) -> Vec<DictionaryRef> {
        let kgram_len = self.kgram_len;
        let class = &mut self.classes[width.index()];
        let mut refs = Vec::new();
        let mut pos = 0;

        while pos < seq.len() {
            let rest = &seq[pos..];
            let required = self.match_limit.map_or(rest.len(), |l| l.min(rest.len()));
            let chunk = match class.find(rest, kgram_len, required) {
                Some(found) => found,
                None => class.append(rest, kgram_len),
            };
            debug_assert!(chunk.length > 0);
            pos += chunk.length;
            refs.push(chunk);
        }

        refs
    }

    /// Backing array of `width`
    pub fn backing(&self, width: CiSize) -> &[u64] {
        &self.classes[width.index()].backing
    }

    /// Replays `refs` against the backing array of `width`
    pub fn resolve(&self, width: CiSize, refs: &[DictionaryRef]) -> Result<Vec<u64>> {
        resolve_refs(self.backing(width), refs)
    }

    /// Forgets every stored sequence
    pub fn clear(&mut self) {
        for class in &mut self.classes {
            class.clear();
        }
    }

    /// Stored element counts
    pub fn stats(&self) -> DictionaryStats {
        let mut stats = DictionaryStats::default();
        for width in CiSize::ALL {
            stats.stored[width.index()] = self.backing(width).len();
        }
        stats
    }

    /// Hands out the backing arrays, leaving the dictionary empty
    pub fn take_backings(&mut self) -> [Vec<u64>; 4] {
        let backings = std::array::from_fn(|i| std::mem::take(&mut self.classes[i].backing));
        self.clear();
        backings
    }
}

/// Replays `refs` against `backing`
pub fn resolve_refs(backing: &[u64], refs: &[DictionaryRef]) -> Result<Vec<u64>> {
    let mut out = Vec::with_capacity(refs.iter().map(|r| r.length).sum());
    for r in refs {
        let slice = backing.get(r.offset..r.end()).ok_or_else(|| {
            DeltaError::Corrupt(format!(
                "reference {}+{} outside dictionary of {} elements",
                r.offset,
                r.length,
                backing.len()
            ))
        })?;
        out.extend_from_slice(slice);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_sequence_references_first_copy() {
        let mut dict = IndexDictionary::new(2, None);
        let first = dict.insert(CiSize::U8, &[1, 1, 1, 5]);
        let second = dict.insert(CiSize::U8, &[1, 1, 1, 5]);

        assert_eq!(first, vec![DictionaryRef { offset: 0, length: 4 }]);
        assert_eq!(second, first);
        assert_eq!(dict.backing(CiSize::U8).len(), 4);
    }

    #[test]
    fn test_unmatched_sequence_appends() {
        let mut dict = IndexDictionary::new(2, None);
        dict.insert(CiSize::U8, &[1, 2, 3]);
        let refs = dict.insert(CiSize::U8, &[2, 3, 4]);

        assert_eq!(refs, vec![DictionaryRef { offset: 3, length: 3 }]);
        assert_eq!(dict.backing(CiSize::U8), &[1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn test_substring_match() {
        let mut dict = IndexDictionary::new(2, None);
        dict.insert(CiSize::U8, &[7, 1, 2, 3, 9]);
        let refs = dict.insert(CiSize::U8, &[1, 2, 3]);
        assert_eq!(refs, vec![DictionaryRef { offset: 1, length: 3 }]);
    }

    #[test]
    fn test_straddling_kgram_is_indexed() {
        let mut dict = IndexDictionary::new(2, None);
        dict.insert(CiSize::U8, &[4, 5]);
        dict.insert(CiSize::U8, &[6, 7]);
        // [5, 6] spans both appends
        let refs = dict.insert(CiSize::U8, &[5, 6]);
        assert_eq!(refs, vec![DictionaryRef { offset: 1, length: 2 }]);
    }

    #[test]
    fn test_short_remainder_scans() {
        let mut dict = IndexDictionary::new(2, None);
        dict.insert(CiSize::U8, &[3, 9, 4]);
        assert_eq!(
            dict.insert(CiSize::U8, &[9]),
            vec![DictionaryRef { offset: 1, length: 1 }]
        );
        assert_eq!(
            dict.insert(CiSize::U8, &[8]),
            vec![DictionaryRef { offset: 3, length: 1 }]
        );
    }

    #[test]
    fn test_match_limit_splits_into_chunks() {
        let mut dict = IndexDictionary::new(2, Some(2));
        dict.insert(CiSize::U8, &[1, 2, 3]);
        let refs = dict.insert(CiSize::U8, &[1, 2, 8, 9]);

        // [1, 2] is long enough under the limit, the rest is new
        assert_eq!(
            refs,
            vec![
                DictionaryRef { offset: 0, length: 2 },
                DictionaryRef { offset: 3, length: 2 },
            ]
        );
        assert_eq!(dict.resolve(CiSize::U8, &refs).unwrap(), vec![1, 2, 8, 9]);
    }

    #[test]
    fn test_widths_do_not_mix() {
        let mut dict = IndexDictionary::new(2, None);
        dict.insert(CiSize::U8, &[1, 2]);
        let refs = dict.insert(CiSize::U16, &[1, 2]);
        assert_eq!(refs, vec![DictionaryRef { offset: 0, length: 2 }]);
        assert_eq!(dict.stats().stored, [2, 2, 0, 0]);
        assert_eq!(dict.stats().bytes(), 2 + 4);
    }

    #[test]
    fn test_clear() {
        let mut dict = IndexDictionary::new(2, None);
        dict.insert(CiSize::U32, &[1, 2, 3]);
        dict.clear();
        assert!(dict.backing(CiSize::U32).is_empty());
        let refs = dict.insert(CiSize::U32, &[2, 3]);
        assert_eq!(refs, vec![DictionaryRef { offset: 0, length: 2 }]);
    }

    #[test]
    fn test_resolve_out_of_range() {
        let dict = IndexDictionary::new(2, None);
        let bad = [DictionaryRef { offset: 0, length: 1 }];
        assert!(dict.resolve(CiSize::U8, &bad).is_err());
    }
}
