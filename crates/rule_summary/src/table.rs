use crate::conf::{NULL_VALUE, WILDCARD};
use crate::error::{Result, SummaryError};
use crate::population::Population;
use crate::rules::Rule;
use log::debug;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

/// Ordered raw values of a column; the code of a value is its position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    values: Vec<String>,
    index: HashMap<String, i32>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dictionary = Self::new();
        for v in values {
            dictionary.encode(v.as_ref());
        }
        dictionary
    }

    /// Code of `raw`, appending it when unseen. `None` once codes run out.
    pub fn encode(&mut self, raw: &str) -> Option<i32> {
        if let Some(code) = self.index.get(raw) {
            return Some(*code);
        }
        let code = i32::try_from(self.values.len()).ok()?;
        self.values.push(raw.to_string());
        self.index.insert(raw.to_string(), code);
        Some(code)
    }

    pub fn code(&self, raw: &str) -> Option<i32> {
        self.index.get(raw).copied()
    }

    pub fn value(&self, code: i32) -> Option<&str> {
        usize::try_from(code)
            .ok()
            .and_then(|c| self.values.get(c))
            .map(String::as_str)
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    dictionary: Arc<Dictionary>,
    display_name: Option<String>,
    labels: Option<Arc<HashMap<String, String>>>,
    bucket_edges: Option<Arc<Vec<f64>>>,
}

impl Column {
    fn new(name: String, dictionary: Dictionary) -> Self {
        Self {
            name,
            dictionary: Arc::new(dictionary),
            display_name: None,
            labels: None,
            bucket_edges: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketScheme {
    /// Equal-width ranges between the column minimum and maximum.
    EqualWidth,
    /// Boundaries at equally spaced ranks of the sorted values.
    EqualPopulation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSpec {
    pub column: usize,
    pub buckets: usize,
    pub scheme: BucketScheme,
}

/// Dictionary-encoded categorical table. Rows are stored row-major in one
/// buffer; every code is a valid index into its column dictionary.
#[derive(Debug, Clone)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<i32>,
    len: usize,
}

impl Table {
    pub fn from_rows<N, R, V>(names: &[N], rows: impl IntoIterator<Item = R>) -> Result<Self>
    where
        N: AsRef<str>,
        R: AsRef<[V]>,
        V: AsRef<str>,
    {
        if names.is_empty() {
            return Err(SummaryError::InvalidArgument(
                "a table needs at least one column".to_string(),
            ));
        }
        let width = names.len();
        let mut dictionaries = vec![Dictionary::new(); width];
        let mut flat = Vec::new();
        let mut len = 0;
        for row in rows {
            let row = row.as_ref();
            if row.len() != width {
                return Err(SummaryError::LengthMismatch {
                    expected: width,
                    found: row.len(),
                });
            }
            for (c, raw) in row.iter().enumerate() {
                let code = dictionaries[c].encode(raw.as_ref()).ok_or_else(|| {
                    SummaryError::DictionaryOverflow {
                        column: names[c].as_ref().to_string(),
                    }
                })?;
                flat.push(code);
            }
            len += 1;
        }
        let columns = names
            .iter()
            .zip(dictionaries)
            .map(|(n, d)| Column::new(n.as_ref().to_string(), d))
            .collect();
        Ok(Self {
            columns,
            rows: flat,
            len,
        })
    }

    /// Assembles a table from column-major codes.
    pub(crate) fn from_encoded_columns(
        names: Vec<String>,
        dictionaries: Vec<Dictionary>,
        codes: Vec<Vec<i32>>,
    ) -> Result<Self> {
        if names.is_empty() {
            return Err(SummaryError::InvalidArgument(
                "a table needs at least one column".to_string(),
            ));
        }
        let len = codes.first().map_or(0, Vec::len);
        if let Some(bad) = codes.iter().find(|c| c.len() != len) {
            return Err(SummaryError::LengthMismatch {
                expected: len,
                found: bad.len(),
            });
        }
        let width = names.len();
        let mut rows = Vec::with_capacity(len * width);
        for r in 0..len {
            rows.extend(codes.iter().map(|column| column[r]));
        }
        let columns = names
            .into_iter()
            .zip(dictionaries)
            .map(|(n, d)| Column::new(n, d))
            .collect();
        Ok(Self { columns, rows, len })
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Number of tuples.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn row(&self, index: usize) -> &[i32] {
        let width = self.num_columns();
        &self.rows[index * width..(index + 1) * width]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[i32]> + '_ {
        self.rows.chunks_exact(self.num_columns())
    }

    pub(crate) fn flat_rows(&self) -> &[i32] {
        &self.rows
    }

    pub fn column_name(&self, column: usize) -> &str {
        &self.columns[column].name
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn dictionary(&self, column: usize) -> &Dictionary {
        &self.columns[column].dictionary
    }

    pub fn cardinality(&self, column: usize) -> usize {
        self.columns[column].dictionary.len()
    }

    pub fn cardinalities(&self) -> Vec<usize> {
        self.columns.iter().map(|c| c.dictionary.len()).collect()
    }

    pub fn value(&self, column: usize, code: i32) -> Option<&str> {
        self.columns[column].dictionary.value(code)
    }

    pub fn code(&self, column: usize, raw: &str) -> Option<i32> {
        self.columns[column].dictionary.code(raw)
    }

    /// Whether `code` decodes to the null marker.
    pub fn is_null(&self, column: usize, code: i32) -> bool {
        self.value(column, code) == Some(NULL_VALUE)
    }

    /// Display label of a code; wildcards render as `*`.
    pub fn label(&self, column: usize, code: i32) -> Cow<'_, str> {
        if code == WILDCARD {
            return Cow::Borrowed("*");
        }
        let col = &self.columns[column];
        match col.dictionary.value(code) {
            Some(raw) => match col.labels.as_ref().and_then(|l| l.get(raw)) {
                Some(label) => Cow::Borrowed(label.as_str()),
                None => Cow::Borrowed(raw),
            },
            None => Cow::Owned(format!("#{code}")),
        }
    }

    pub fn column_label(&self, column: usize) -> &str {
        let col = &self.columns[column];
        col.display_name.as_deref().unwrap_or(&col.name)
    }

    /// Installs a display name and raw-value labels for a column.
    pub fn set_labels(
        &mut self,
        column: usize,
        display_name: Option<String>,
        labels: HashMap<String, String>,
    ) -> Result<()> {
        let col = self.columns.get_mut(column).ok_or_else(|| {
            SummaryError::InvalidArgument(format!("no column {column} to label"))
        })?;
        col.display_name = display_name;
        col.labels = Some(Arc::new(labels));
        Ok(())
    }

    pub fn bucket_edges(&self, column: usize) -> Option<&[f64]> {
        self.columns[column].bucket_edges.as_deref().map(Vec::as_slice)
    }

    /// Exact number of tuples covered by `rule`.
    pub fn count(&self, rule: &Rule) -> Result<u64> {
        self.check_rule(rule)?;
        Ok(self.rows().filter(|t| rule.covers(t)).count() as u64)
    }

    pub(crate) fn check_rule(&self, rule: &Rule) -> Result<()> {
        if rule.len() != self.num_columns() {
            return Err(SummaryError::LengthMismatch {
                expected: self.num_columns(),
                found: rule.len(),
            });
        }
        if let Some((c, v)) = rule
            .fixed_values()
            .find(|(c, v)| *v as usize >= self.cardinality(*c))
        {
            return Err(SummaryError::InvalidArgument(format!(
                "code {v} is not in the dictionary of column {}",
                self.column_name(c)
            )));
        }
        Ok(())
    }

    /// Projection onto `columns`, sharing the dictionaries.
    pub fn sub_table(&self, columns: &[usize]) -> Result<Table> {
        if columns.is_empty() {
            return Err(SummaryError::InvalidArgument(
                "a sub-table needs at least one column".to_string(),
            ));
        }
        if let Some(bad) = columns.iter().find(|c| **c >= self.num_columns()) {
            return Err(SummaryError::InvalidArgument(format!(
                "no column {bad} in a table of width {}",
                self.num_columns()
            )));
        }
        let mut rows = Vec::with_capacity(self.len * columns.len());
        for tuple in self.rows() {
            rows.extend(columns.iter().map(|c| tuple[*c]));
        }
        Ok(Table {
            columns: columns.iter().map(|c| self.columns[*c].clone()).collect(),
            rows,
            len: self.len,
        })
    }

    /// The tuples covered by `rule`, sharing the dictionaries.
    pub fn filter(&self, rule: &Rule) -> Result<Table> {
        self.check_rule(rule)?;
        let mut rows = Vec::new();
        let mut len = 0;
        for tuple in self.rows().filter(|t| rule.covers(t)) {
            rows.extend_from_slice(tuple);
            len += 1;
        }
        Ok(Table {
            columns: self.columns.clone(),
            rows,
            len,
        })
    }

    /// The whole table as a solver population.
    pub fn population(&self) -> Population<'_> {
        Population::whole(self)
    }

    /// Replaces the values of numeric columns with range buckets labelled `lo-hi`.
    pub fn bucketize(&mut self, specs: &[BucketSpec]) -> Result<()> {
        for spec in specs {
            self.bucketize_column(spec)?;
        }
        Ok(())
    }

    fn bucketize_column(&mut self, spec: &BucketSpec) -> Result<()> {
        let width = self.num_columns();
        if spec.column >= width || spec.buckets == 0 {
            return Err(SummaryError::InvalidArgument(format!(
                "bad bucket spec {spec:?} for width {width}"
            )));
        }
        let column = &self.columns[spec.column];
        let parsed = column
            .dictionary
            .values()
            .iter()
            .map(|raw| {
                if raw == NULL_VALUE {
                    Ok(None)
                } else {
                    raw.trim()
                        .parse::<f64>()
                        .map(Some)
                        .map_err(|_| SummaryError::NonNumeric {
                            column: column.name.clone(),
                            value: raw.clone(),
                        })
                }
            })
            .collect::<Result<Vec<Option<f64>>>>()?;

        let mut numbers: Vec<f64> = self
            .rows()
            .filter_map(|t| parsed[t[spec.column] as usize])
            .collect();
        if numbers.is_empty() {
            return Err(SummaryError::InvalidArgument(format!(
                "column {} has no numeric values to bucketize",
                column.name
            )));
        }
        let edges = bucket_edges(&mut numbers, spec.buckets, spec.scheme);

        let mut dictionary = Dictionary::new();
        let bucket_codes = edges
            .windows(2)
            .map(|w| dictionary.encode(&format!("{}-{}", w[0], w[1])))
            .collect::<Option<Vec<i32>>>();
        let overflow = || SummaryError::DictionaryOverflow {
            column: column.name.clone(),
        };
        let bucket_codes = bucket_codes.ok_or_else(overflow)?;
        let null_code = if parsed.iter().any(Option::is_none) {
            dictionary.encode(NULL_VALUE).ok_or_else(overflow)?
        } else {
            WILDCARD
        };
        let remap: Vec<i32> = parsed
            .iter()
            .map(|p| match p {
                Some(x) => bucket_codes[bucket_of(&edges, *x)],
                None => null_code,
            })
            .collect();

        debug!(
            "bucketized column {} into {} buckets ({:?})",
            column.name,
            dictionary.len(),
            spec.scheme
        );
        for chunk in self.rows.chunks_exact_mut(width) {
            chunk[spec.column] = remap[chunk[spec.column] as usize];
        }
        let column = &mut self.columns[spec.column];
        column.dictionary = Arc::new(dictionary);
        column.labels = None;
        column.bucket_edges = Some(Arc::new(edges));
        Ok(())
    }
}

fn bucket_edges(numbers: &mut [f64], buckets: usize, scheme: BucketScheme) -> Vec<f64> {
    match scheme {
        BucketScheme::EqualWidth => {
            let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
            let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let step = (max - min) / buckets as f64;
            (0..=buckets)
                .map(|i| if i == buckets { max } else { min + step * i as f64 })
                .collect()
        }
        BucketScheme::EqualPopulation => {
            numbers.sort_by(f64::total_cmp);
            let n = numbers.len();
            (0..=buckets)
                .map(|i| numbers[(i * n / buckets).min(n - 1)])
                .collect()
        }
    }
}

/// First bucket whose upper edge is at least `x`.
fn bucket_of(edges: &[f64], x: f64) -> usize {
    let last = edges.len() - 2;
    let mut b = 0;
    while b < last && x > edges[b + 1] {
        b += 1;
    }
    b
}
