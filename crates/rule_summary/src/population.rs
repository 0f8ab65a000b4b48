use crate::rules::Rule;
use crate::scorer::Scorer;
use crate::table::Table;
use std::borrow::Cow;

/// The tuples a search runs over: either a whole table or a sample's rows in
/// the sample's reduced column space. Scores are always taken against the
/// original table, with the columns fixed by the sample filter included.
#[derive(Debug, Clone)]
pub struct Population<'a> {
    table: &'a Table,
    rows: &'a [i32],
    len: usize,
    columns: Cow<'a, [usize]>,
    fixed: Vec<(usize, i32)>,
}

impl<'a> Population<'a> {
    pub(crate) fn whole(table: &'a Table) -> Self {
        Self {
            table,
            rows: table.flat_rows(),
            len: table.len(),
            columns: Cow::Owned((0..table.num_columns()).collect()),
            fixed: Vec::new(),
        }
    }

    pub(crate) fn projected(
        table: &'a Table,
        rows: &'a [i32],
        len: usize,
        columns: &'a [usize],
        filter: &Rule,
    ) -> Self {
        let fixed = filter
            .fixed_values()
            .filter(|(c, _)| !columns.contains(c))
            .collect();
        Self {
            table,
            rows,
            len,
            columns: Cow::Borrowed(columns),
            fixed,
        }
    }

    pub fn table(&self) -> &'a Table {
        self.table
    }

    /// Number of columns in the population's own space.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn tuples(&self) -> impl Iterator<Item = &'a [i32]> + 'a {
        let rows: &'a [i32] = if self.columns.is_empty() { &[] } else { self.rows };
        rows.chunks_exact(self.columns.len().max(1))
    }

    /// Table column behind a population column.
    pub fn table_column(&self, column: usize) -> usize {
        self.columns[column]
    }

    pub fn cardinality(&self, column: usize) -> usize {
        self.table.cardinality(self.columns[column])
    }

    pub fn cardinalities(&self) -> Vec<usize> {
        self.columns
            .iter()
            .map(|c| self.table.cardinality(*c))
            .collect()
    }

    pub fn score(&self, scorer: &Scorer, rule: &Rule) -> u32 {
        let local = rule
            .fixed_values()
            .map(|(c, v)| (self.columns[c], v));
        scorer.score_fixed(self.table, local.chain(self.fixed.iter().copied()))
    }

    /// Score of the single-column rule `column = code`.
    pub fn single_score(&self, scorer: &Scorer, column: usize, code: i32) -> u32 {
        let own = std::iter::once((self.columns[column], code));
        scorer.score_fixed(self.table, own.chain(self.fixed.iter().copied()))
    }
}
