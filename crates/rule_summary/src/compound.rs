use crate::conf::SET_VALUE;
use crate::error::{Result, SummaryError};
use crate::rules::Rule;
use crate::table::Table;
use core::fmt;
use std::collections::{BTreeMap, BTreeSet};

/// Display-only rule where some columns carry a set of codes ("a or b")
/// instead of a single one. Used for the "remaining values" rows of a
/// drill-down tree; never counted or searched.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompoundRule {
    base: Rule,
    value_sets: BTreeMap<usize, BTreeSet<i32>>,
    count: u64,
}

impl CompoundRule {
    pub fn new(base: Rule, value_sets: BTreeMap<usize, BTreeSet<i32>>, count: u64) -> Result<Self> {
        for (column, set) in &value_sets {
            if *column >= base.len() || base.is_fixed(*column) {
                return Err(SummaryError::InvalidArgument(format!(
                    "column {column} cannot carry a value set over {base}"
                )));
            }
            if set.is_empty() {
                return Err(SummaryError::InvalidArgument(format!(
                    "empty value set for column {column}"
                )));
            }
        }
        Ok(Self {
            base,
            value_sets,
            count,
        })
    }

    pub fn base(&self) -> &Rule {
        &self.base
    }

    pub fn value_sets(&self) -> &BTreeMap<usize, BTreeSet<i32>> {
        &self.value_sets
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn size(&self) -> usize {
        self.base.size() + self.value_sets.len()
    }

    /// Per-column values with `SET_VALUE` marking set columns.
    pub fn values(&self) -> Vec<i32> {
        let mut values = self.base.values().to_vec();
        for column in self.value_sets.keys() {
            values[*column] = SET_VALUE;
        }
        values
    }

    pub fn covers(&self, tuple: &[i32]) -> bool {
        self.base.covers(tuple)
            && self
                .value_sets
                .iter()
                .all(|(c, set)| set.contains(&tuple[*c]))
    }

    pub fn labels(&self, table: &Table) -> Vec<String> {
        (0..self.base.len())
            .map(|c| match self.value_sets.get(&c) {
                Some(set) => set
                    .iter()
                    .map(|v| table.label(c, *v))
                    .collect::<Vec<_>>()
                    .join(" or "),
                None => table.label(c, self.base.get(c)).into_owned(),
            })
            .collect()
    }

    pub fn rule_string(&self, table: &Table) -> String {
        self.labels(table).join(", ")
    }
}

impl fmt::Display for CompoundRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = (0..self.base.len())
            .map(|c| match self.value_sets.get(&c) {
                Some(set) => set
                    .iter()
                    .map(i32::to_string)
                    .collect::<Vec<_>>()
                    .join(" or "),
                None if self.base.is_fixed(c) => self.base.get(c).to_string(),
                None => "*".to_string(),
            })
            .collect();
        write!(f, "CompoundRule({}) count={}", parts.join(", "), self.count)
    }
}
