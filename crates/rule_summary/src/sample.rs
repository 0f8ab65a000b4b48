use crate::conf::WILDCARD;
use crate::error::{Result, SummaryError};
use crate::lattice::is_sub_rule;
use crate::population::Population;
use crate::rules::{Rule, RuleStats, ScoredRule};
use crate::scorer::Scorer;
use crate::table::Table;
use log::debug;
use rand::Rng;

/// A uniform sample of the tuples covered by a filter rule, projected onto the
/// columns the filter leaves open. Rows are kept as a multiset.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSample {
    filter: Rule,
    total_count: u64,
    rows: Vec<i32>,
    len: usize,
    column_mapping: Vec<usize>,
    reverse_column_mapping: Vec<Option<usize>>,
}

impl TableSample {
    /// Reservoir sample of at most `size` tuples covered by `filter`. When at
    /// most `size` tuples qualify the sample is exact.
    pub fn create<R: Rng>(
        table: &Table,
        filter: &Rule,
        size: usize,
        rng: &mut R,
    ) -> Result<Self> {
        table.check_rule(filter)?;
        let (column_mapping, reverse_column_mapping) = mappings(filter);
        let width = column_mapping.len();
        let mut reservoir: Vec<i32> = Vec::new();
        let mut len = 0usize;
        let mut seen = 0u64;
        for tuple in table.rows().filter(|t| filter.covers(t)) {
            seen += 1;
            let slot = if len < size {
                len += 1;
                reservoir.resize(len * width, WILDCARD);
                Some(len - 1)
            } else {
                let j = rng.random_range(0..seen);
                (j < size as u64).then_some(j as usize)
            };
            if let Some(slot) = slot {
                let target = &mut reservoir[slot * width..(slot + 1) * width];
                for (dst, c) in target.iter_mut().zip(&column_mapping) {
                    *dst = tuple[*c];
                }
            }
        }
        debug!("sampled {len} of {seen} tuples for {filter}");
        Ok(Self {
            filter: filter.clone(),
            total_count: seen,
            rows: reservoir,
            len,
            column_mapping,
            reverse_column_mapping,
        })
    }

    /// Narrows this sample to `filter`, which must be a super-rule of the
    /// current filter. The estimated population is extrapolated from the
    /// surviving rows.
    pub fn create_filtered(&self, filter: &Rule) -> Result<Self> {
        if !is_sub_rule(&self.filter, filter) {
            return Err(SummaryError::InvalidArgument(format!(
                "{filter} does not narrow the sample filter {}",
                self.filter
            )));
        }
        let (column_mapping, reverse_column_mapping) = mappings(filter);
        let narrowed = self.truncate_rule(filter);
        let mut rows = Vec::new();
        let mut len = 0;
        for tuple in self.tuples().filter(|t| narrowed.covers(t)) {
            rows.extend(
                column_mapping
                    .iter()
                    .map(|c| self.get(tuple, *c)),
            );
            len += 1;
        }
        let total_count = (len as f64 / self.sample_fraction()).round() as u64;
        Ok(Self {
            filter: filter.clone(),
            total_count,
            rows,
            len,
            column_mapping,
            reverse_column_mapping,
        })
    }

    pub fn filter(&self) -> &Rule {
        &self.filter
    }

    /// Estimated number of tuples covered by the filter in the full table.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn width(&self) -> usize {
        self.column_mapping.len()
    }

    pub fn column_mapping(&self) -> &[usize] {
        &self.column_mapping
    }

    pub fn reverse_column_mapping(&self) -> &[Option<usize>] {
        &self.reverse_column_mapping
    }

    /// Sample column holding a table column, `None` when the filter fixes it.
    pub fn local_column(&self, table_column: usize) -> Option<usize> {
        self.reverse_column_mapping
            .get(table_column)
            .copied()
            .flatten()
    }

    pub fn sample_fraction(&self) -> f64 {
        if self.total_count == 0 {
            1.0
        } else {
            self.len as f64 / self.total_count as f64
        }
    }

    pub fn is_exact(&self) -> bool {
        self.len as u64 == self.total_count
    }

    pub fn tuples(&self) -> impl Iterator<Item = &[i32]> + '_ {
        let rows: &[i32] = if self.width() == 0 { &[] } else { &self.rows };
        rows.chunks_exact(self.width().max(1))
    }

    pub fn tuple(&self, index: usize) -> &[i32] {
        let width = self.width();
        &self.rows[index * width..(index + 1) * width]
    }

    /// Value of a table column for a sample tuple; fixed columns answer with the filter's code.
    pub fn get(&self, tuple: &[i32], table_column: usize) -> i32 {
        match self.local_column(table_column) {
            Some(local) => tuple[local],
            None => self.filter.get(table_column),
        }
    }

    /// Whether a table-space rule covers a sample tuple.
    pub fn covers(&self, rule: &Rule, tuple: &[i32]) -> bool {
        rule.fixed_values().all(|(c, v)| self.get(tuple, c) == v)
    }

    /// Projects a table-space rule onto the sample columns.
    pub fn truncate_rule(&self, rule: &Rule) -> Rule {
        let values = self.column_mapping.iter().map(|c| rule.get(*c)).collect();
        Rule::from_values_unchecked(values)
    }

    /// Table-space counterpart of a sample-space rule, with the filter's codes restored.
    pub fn expand_rule(&self, rule: &Rule) -> Rule {
        let values = self
            .reverse_column_mapping
            .iter()
            .enumerate()
            .map(|(c, local)| match local {
                Some(l) => rule.get(*l),
                None => self.filter.get(c),
            })
            .collect();
        Rule::from_values_unchecked(values)
    }

    /// Sample count of a table-space count.
    pub fn truncate_count(&self, count: u64) -> u64 {
        (count as f64 * self.sample_fraction()).round() as u64
    }

    /// Population estimate of a sample count.
    pub fn expand_count(&self, count: u64) -> u64 {
        (count as f64 / self.sample_fraction()).round() as u64
    }

    /// Expands a solver result from sample space: rule, score and scaled counts.
    pub fn expand_scored(
        &self,
        table: &Table,
        scorer: &Scorer,
        scored: &ScoredRule,
    ) -> ScoredRule {
        let rule = self.expand_rule(&scored.rule);
        let score = scorer.score(table, &rule);
        let count = self.expand_count(scored.stats.count);
        let scale = |v: i64| (v as f64 / self.sample_fraction()).round() as i64;
        let stats = RuleStats {
            count,
            score,
            counted: scored.stats.counted,
            latest_counted_marginal_value: scale(scored.stats.latest_counted_marginal_value),
            min_marginal_value: scale(scored.stats.min_marginal_value),
            max_marginal_value: scale(scored.stats.max_marginal_value),
        };
        ScoredRule::new(rule, stats)
    }

    pub fn population<'a>(&'a self, table: &'a Table) -> Population<'a> {
        Population::projected(table, &self.rows, self.len, &self.column_mapping, &self.filter)
    }
}

fn mappings(filter: &Rule) -> (Vec<usize>, Vec<Option<usize>>) {
    let column_mapping: Vec<usize> = (0..filter.len()).filter(|c| !filter.is_fixed(*c)).collect();
    let mut reverse = vec![None; filter.len()];
    for (local, c) in column_mapping.iter().enumerate() {
        reverse[*c] = Some(local);
    }
    (column_mapping, reverse)
}
