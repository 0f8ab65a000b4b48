use crate::scorer::Scorer;
use serde::{Deserialize, Serialize};

/// Rule value meaning "any value" in a column.
pub const WILDCARD: i32 = -1;
/// Rule value marking a column that carries a set of values (compound rules only).
pub const SET_VALUE: i32 = -2;
/// Dictionary value treated as a null by the size based scorers.
pub const NULL_VALUE: &str = "NA";
/// Largest rule size the level-wise search will generate.
pub const MAX_RULE_SIZE: usize = 6;
/// Number of random rows probed when estimating how much of a sample survives a narrower filter.
pub const SELECTIVITY_PROBES: usize = 100;
pub const DEFAULT_SEED: u64 = 42;

/// How uncounted candidates of size three and more get their counts.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub enum CountingStrategy {
    /// Walk the super-rule adjacency from the single-column rules covering each tuple.
    #[default]
    LatticeWalk,
    /// Bucket every candidate under one of its own fixed columns and scan the buckets per tuple.
    SingleHash,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub max_rule_size: usize,
    pub counting: CountingStrategy,
    pub seed: u64,
    /// Keep every candidate discarded by bound pruning (see `SolveTrace`).
    pub record_trace: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_rule_size: MAX_RULE_SIZE,
            counting: CountingStrategy::default(),
            seed: DEFAULT_SEED,
            record_trace: false,
        }
    }
}

impl SolverConfig {
    pub fn effective_max_rule_size(&self) -> usize {
        self.max_rule_size.clamp(1, MAX_RULE_SIZE)
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Upper bound on the number of rows kept across all pooled samples.
    pub capacity: usize,
    /// Rows drawn for a fresh sample; populations at most this large are held exactly.
    pub sample_size: usize,
    /// Fewest rows a narrowed sample must be expected to keep to be reused.
    pub min_sample_size: usize,
    pub seed: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            capacity: 500_000,
            sample_size: 100_000,
            min_sample_size: 20_000,
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub solver: SolverConfig,
    pub sampling: SamplingConfig,
    pub scorer: Scorer,
    /// Rules returned per expansion.
    pub rule_nums: usize,
    /// Only rules scoring at most this much are considered.
    pub max_score: u32,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            solver: SolverConfig::default(),
            sampling: SamplingConfig::default(),
            scorer: Scorer::Size,
            rule_nums: 4,
            max_score: 3,
        }
    }
}
