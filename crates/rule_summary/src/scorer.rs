use crate::rules::Rule;
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Weight of a rule. Every variant is monotone: fixing one more column never
/// lowers the score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Scorer {
    /// Scores every rule 0, leaving coverage as the only criterion.
    Zero,
    /// Number of fixed, non-null columns.
    #[default]
    Size,
    SizeSquared,
    /// `max(0, size - k)`.
    SizeMinus(u32),
    /// Sum of `ceil(log2(cardinality))` over fixed, non-null columns.
    Bits,
    /// Number of fixed columns drawn from the given set.
    Columns(BTreeSet<usize>),
}

impl Scorer {
    pub fn score(&self, table: &Table, rule: &Rule) -> u32 {
        self.score_fixed(table, rule.fixed_values())
    }

    /// Score of the rule fixing the given `(table column, code)` pairs.
    pub fn score_fixed<I>(&self, table: &Table, fixed: I) -> u32
    where
        I: IntoIterator<Item = (usize, i32)>,
    {
        let fixed = fixed.into_iter();
        let non_null = |it: I::IntoIter| it.filter(|(c, v)| !table.is_null(*c, *v)).count() as u32;
        match self {
            Scorer::Zero => 0,
            Scorer::Size => non_null(fixed),
            Scorer::SizeSquared => {
                let size = non_null(fixed);
                size * size
            }
            Scorer::SizeMinus(k) => non_null(fixed).saturating_sub(*k),
            Scorer::Bits => fixed
                .filter(|(c, v)| !table.is_null(*c, *v))
                .map(|(c, _)| bits(table.cardinality(c)))
                .sum(),
            Scorer::Columns(set) => fixed.filter(|(c, _)| set.contains(c)).count() as u32,
        }
    }
}

/// `ceil(log2(cardinality))`, 0 for one or no values.
fn bits(cardinality: usize) -> u32 {
    if cardinality <= 1 {
        0
    } else {
        usize::BITS - (cardinality - 1).leading_zeros()
    }
}
