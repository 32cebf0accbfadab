//! Configuration for the delta encoder

use crate::constants::{CTL_SIZE_MAX, DEFAULT_KGRAM_LEN, DEFAULT_SEQ_LIMIT, SEQ_LIMIT_ENV};
use crate::error::{DeltaError, Result};

/// How units are laid out in the encoded artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodingStrategy {
    /// Sparse units store every column delta inline, the first one measured
    /// from the column origin
    Raw,
    /// Sparse units store the jump to their first column as a varint and the
    /// remaining deltas inline
    Jump,
    /// As `Jump`, with column deltas replaced by references into a per-width
    /// index dictionary
    ColumnDictionary,
    /// As `Jump`, with values replaced by indices into a table of distinct values
    ValueDictionary,
    /// Column dictionary and value dictionary together
    Combined,
}

impl EncodingStrategy {
    /// Every strategy, in tag order
    pub const ALL: [EncodingStrategy; 5] = [
        EncodingStrategy::Raw,
        EncodingStrategy::Jump,
        EncodingStrategy::ColumnDictionary,
        EncodingStrategy::ValueDictionary,
        EncodingStrategy::Combined,
    ];

    /// Check if sparse column deltas go through the index dictionary
    pub fn uses_column_dictionary(&self) -> bool {
        matches!(
            self,
            EncodingStrategy::ColumnDictionary | EncodingStrategy::Combined
        )
    }

    /// Check if values go through the value dictionary
    pub fn uses_value_dictionary(&self) -> bool {
        matches!(
            self,
            EncodingStrategy::ValueDictionary | EncodingStrategy::Combined
        )
    }

    /// Check if sparse units carry a separate jump varint
    pub fn stores_jump(&self) -> bool {
        !matches!(self, EncodingStrategy::Raw)
    }

    /// Byte tag used in the serialized artifact
    pub fn tag(&self) -> u8 {
        match self {
            EncodingStrategy::Raw => 0,
            EncodingStrategy::Jump => 1,
            EncodingStrategy::ColumnDictionary => 2,
            EncodingStrategy::ValueDictionary => 3,
            EncodingStrategy::Combined => 4,
        }
    }

    /// Inverse of [`EncodingStrategy::tag`]
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.tag() == tag)
    }

    /// Short name used in size reports
    pub fn name(&self) -> &'static str {
        match self {
            EncodingStrategy::Raw => "delta",
            EncodingStrategy::Jump => "delta_jmp",
            EncodingStrategy::ColumnDictionary => "delta_jmp_ci",
            EncodingStrategy::ValueDictionary => "delta_jmp_cv",
            EncodingStrategy::Combined => "delta_jmp_cvi",
        }
    }
}

/// Configuration for a delta encoding pass
#[derive(Debug, Clone)]
pub struct DeltaConfig {
    /// Consecutive +1 column steps needed before a run is committed as dense
    pub seq_limit: usize,

    /// Largest number of elements in one unit (at most 255, the size byte)
    pub ctl_size_max: usize,

    /// Unit layout
    pub strategy: EncodingStrategy,

    /// Length of the k-gram keying the index dictionary
    pub kgram_len: usize,

    /// Minimum match length accepted by the index dictionary.
    /// If None, a match must cover the whole remaining sequence
    pub match_limit: Option<usize>,

    /// Partitions used by parallel encoding
    pub n_threads: usize,
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self {
            seq_limit: DEFAULT_SEQ_LIMIT,
            ctl_size_max: CTL_SIZE_MAX,
            strategy: EncodingStrategy::Jump,
            kgram_len: DEFAULT_KGRAM_LEN,
            match_limit: None,
            n_threads: num_cpus::get(), // Use all available cores
        }
    }
}

impl DeltaConfig {
    /// Create a config using a specific strategy
    pub fn for_strategy(strategy: EncodingStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Default config with `seq_limit` taken from `SPM_DELTA_SEQ_LIMIT` when set
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(SEQ_LIMIT_ENV) {
            config.seq_limit = raw.trim().parse().map_err(|_| {
                DeltaError::InvalidConfig(format!("{SEQ_LIMIT_ENV}={raw:?} is not an integer"))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_seq_limit(mut self, seq_limit: usize) -> Self {
        self.seq_limit = seq_limit;
        self
    }

    pub fn with_ctl_size_max(mut self, ctl_size_max: usize) -> Self {
        self.ctl_size_max = ctl_size_max;
        self
    }

    pub fn with_strategy(mut self, strategy: EncodingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_kgram_len(mut self, kgram_len: usize) -> Self {
        self.kgram_len = kgram_len;
        self
    }

    pub fn with_match_limit(mut self, match_limit: Option<usize>) -> Self {
        self.match_limit = match_limit;
        self
    }

    pub fn with_threads(mut self, n_threads: usize) -> Self {
        self.n_threads = n_threads;
        self
    }

    /// Rejects configurations the classifier cannot honor
    ///
    /// A run cap of one element would let the cap fire before the classifier
    /// has left its unknown state, and a dense threshold at or above the cap
    /// could never be reached.
    pub fn validate(&self) -> Result<()> {
        if self.seq_limit < 1 {
            return Err(DeltaError::InvalidConfig("seq_limit must be at least 1".into()));
        }
        if !(2..=CTL_SIZE_MAX).contains(&self.ctl_size_max) {
            return Err(DeltaError::InvalidConfig(format!(
                "ctl_size_max must be in 2..={CTL_SIZE_MAX}, got {}",
                self.ctl_size_max
            )));
        }
        if self.seq_limit >= self.ctl_size_max {
            return Err(DeltaError::InvalidConfig(format!(
                "seq_limit ({}) must be below ctl_size_max ({})",
                self.seq_limit, self.ctl_size_max
            )));
        }
        if self.kgram_len < 1 {
            return Err(DeltaError::InvalidConfig("kgram_len must be at least 1".into()));
        }
        if self.match_limit == Some(0) {
            return Err(DeltaError::InvalidConfig("match_limit must be at least 1".into()));
        }
        if self.n_threads < 1 {
            return Err(DeltaError::InvalidConfig("n_threads must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        DeltaConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_degenerate_limits() {
        assert!(DeltaConfig::default().with_seq_limit(0).validate().is_err());
        assert!(DeltaConfig::default().with_ctl_size_max(1).validate().is_err());
        assert!(DeltaConfig::default().with_ctl_size_max(256).validate().is_err());
        assert!(DeltaConfig::default()
            .with_seq_limit(16)
            .with_ctl_size_max(16)
            .validate()
            .is_err());
        assert!(DeltaConfig::default().with_match_limit(Some(0)).validate().is_err());
        assert!(DeltaConfig::default().with_kgram_len(0).validate().is_err());
        assert!(DeltaConfig::default().with_threads(0).validate().is_err());
    }

    #[test]
    fn test_seq_limit_from_env() {
        std::env::set_var(SEQ_LIMIT_ENV, "5");
        let parsed = DeltaConfig::from_env().map(|c| c.seq_limit);
        std::env::set_var(SEQ_LIMIT_ENV, "many");
        let garbage = DeltaConfig::from_env();
        std::env::remove_var(SEQ_LIMIT_ENV);

        assert_eq!(parsed.unwrap(), 5);
        assert!(matches!(garbage, Err(DeltaError::InvalidConfig(_))));
    }

    #[test]
    fn test_strategy_tags_roundtrip() {
        for strategy in EncodingStrategy::ALL {
            assert_eq!(EncodingStrategy::from_tag(strategy.tag()), Some(strategy));
        }
        assert_eq!(EncodingStrategy::from_tag(9), None);
    }

    #[test]
    fn test_strategy_capabilities() {
        assert!(!EncodingStrategy::Raw.stores_jump());
        assert!(EncodingStrategy::Combined.uses_column_dictionary());
        assert!(EncodingStrategy::Combined.uses_value_dictionary());
        assert!(!EncodingStrategy::Jump.uses_value_dictionary());
    }
}
