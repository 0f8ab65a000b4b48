use crate::conf::WILDCARD;
use crate::error::{Result, SummaryError};
use crate::table::Table;
use core::fmt;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;

/// -------------------
/// Rule
/// -------------------
/// A pattern over the table columns: each position holds a dictionary code or
/// `WILDCARD`. Two rules are equal exactly when they fix the same columns to
/// the same codes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rule {
    values: Vec<i32>,
    size: usize,
}

impl Rule {
    /// Builds a rule from raw codes. Only `WILDCARD` and non-negative codes are accepted.
    pub fn new(values: Vec<i32>) -> Result<Self> {
        if let Some(bad) = values.iter().find(|v| **v < WILDCARD) {
            return Err(SummaryError::InvalidArgument(format!(
                "rule value {bad} is neither a code nor the wildcard"
            )));
        }
        Ok(Self::from_values_unchecked(values))
    }

    pub(crate) fn from_values_unchecked(values: Vec<i32>) -> Self {
        let size = values.iter().filter(|v| **v != WILDCARD).count();
        Self { values, size }
    }

    pub fn empty(width: usize) -> Self {
        Self {
            values: vec![WILDCARD; width],
            size: 0,
        }
    }

    /// The rule fixing every column to the tuple's codes.
    pub fn from_tuple(tuple: &[i32]) -> Self {
        Self::from_values_unchecked(tuple.to_vec())
    }

    pub fn from_pairs(width: usize, pairs: &[(usize, i32)]) -> Result<Self> {
        let mut values = vec![WILDCARD; width];
        for &(column, value) in pairs {
            if column >= width {
                return Err(SummaryError::InvalidArgument(format!(
                    "column {column} out of range for width {width}"
                )));
            }
            values[column] = value;
        }
        Self::new(values)
    }

    /// Length of the rule, i.e. the number of table columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of non-wildcard positions.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, column: usize) -> i32 {
        self.values[column]
    }

    pub fn is_fixed(&self, column: usize) -> bool {
        self.values[column] != WILDCARD
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }

    pub fn fixed_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != WILDCARD)
            .map(|(c, _)| c)
    }

    /// The sparse view: `(column, code)` for every fixed column.
    pub fn fixed_values(&self) -> impl Iterator<Item = (usize, i32)> + '_ {
        self.values
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, v)| *v != WILDCARD)
    }

    pub fn with_value(&self, column: usize, value: i32) -> Self {
        let mut values = self.values.clone();
        values[column] = value;
        Self::from_values_unchecked(values)
    }

    pub fn without(&self, column: usize) -> Self {
        self.with_value(column, WILDCARD)
    }

    /// True when every fixed column of the rule matches the tuple.
    pub fn covers(&self, tuple: &[i32]) -> bool {
        self.values
            .iter()
            .zip(tuple)
            .all(|(v, t)| *v == WILDCARD || v == t)
    }

    pub fn labels<'t>(&self, table: &'t Table) -> Vec<Cow<'t, str>> {
        self.values
            .iter()
            .enumerate()
            .map(|(c, v)| table.label(c, *v))
            .collect()
    }

    /// Every position rendered with labels, wildcards as `*`.
    pub fn rule_string(&self, table: &Table) -> String {
        self.labels(table).join(", ")
    }

    /// Only the fixed columns, as `column=label`.
    pub fn sparse_string(&self, table: &Table) -> String {
        if self.size == 0 {
            return "(all)".to_string();
        }
        self.fixed_values()
            .map(|(c, v)| format!("{}={}", table.column_label(c), table.label(c, v)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .values
            .iter()
            .map(|v| {
                if *v == WILDCARD {
                    "*".to_string()
                } else {
                    v.to_string()
                }
            })
            .collect();
        write!(f, "Rule({})", parts.join(", "))
    }
}

/// Search metadata attached to a rule while the solver works on it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleStats {
    /// Tuples covered (scaled back to the full population for sampled rules).
    pub count: u64,
    pub score: u32,
    pub counted: bool,
    pub latest_counted_marginal_value: i64,
    pub min_marginal_value: i64,
    pub max_marginal_value: i64,
}

impl RuleStats {
    pub fn uncounted(score: u32, upper_bound: i64) -> Self {
        Self {
            count: 0,
            score,
            counted: false,
            latest_counted_marginal_value: 0,
            min_marginal_value: 0,
            max_marginal_value: upper_bound,
        }
    }

    pub(crate) fn settle(&mut self, count: u64, marginal_value: i64) {
        self.count = count;
        self.counted = true;
        self.latest_counted_marginal_value = marginal_value;
        self.min_marginal_value = marginal_value;
        self.max_marginal_value = marginal_value;
    }
}

/// A rule together with its counts, as handed back by the solver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredRule {
    pub rule: Rule,
    pub stats: RuleStats,
}

impl ScoredRule {
    pub fn new(rule: Rule, stats: RuleStats) -> Self {
        Self { rule, stats }
    }

    pub fn count(&self) -> u64 {
        self.stats.count
    }

    pub fn score(&self) -> u32 {
        self.stats.score
    }

    pub fn marginal_value(&self) -> i64 {
        self.stats.max_marginal_value
    }

    /// Descending-priority order used for candidate lists: upper marginal bound,
    /// then lower bound, then count, then the codes.
    pub fn priority_cmp(&self, other: &Self) -> Ordering {
        priority(&self.rule, &self.stats, &other.rule, &other.stats)
    }
}

pub(crate) fn priority(a: &Rule, sa: &RuleStats, b: &Rule, sb: &RuleStats) -> Ordering {
    sb.max_marginal_value
        .cmp(&sa.max_marginal_value)
        .then(sb.min_marginal_value.cmp(&sa.min_marginal_value))
        .then(sb.count.cmp(&sa.count))
        .then(a.values.cmp(&b.values))
}

impl fmt::Display for ScoredRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} count={} score={} marginal={}",
            self.rule, self.stats.count, self.stats.score, self.stats.max_marginal_value
        )
    }
}
