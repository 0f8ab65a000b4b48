use crate::conf::NULL_VALUE;
use crate::error::{Result, SummaryError};
use crate::table::{Dictionary, Table};
use polars::prelude::*;

/// Encodes one column: every value is rendered as a string, nulls as `NA`,
/// and codes are handed out in first-seen order.
fn encode_series(series: &Series) -> Result<(Dictionary, Vec<i32>)> {
    let name = series.name().to_string();
    let as_str = series.cast(&DataType::String)?;
    let ca = as_str.str()?;
    let mut dictionary = Dictionary::new();
    let mut codes = Vec::with_capacity(ca.len());
    for value in ca.into_iter() {
        let raw = value.unwrap_or(NULL_VALUE);
        let code = dictionary
            .encode(raw)
            .ok_or_else(|| SummaryError::DictionaryOverflow {
                column: name.clone(),
            })?;
        codes.push(code);
    }
    Ok((dictionary, codes))
}

/// Extension methods for DataFrame
pub trait SummaryDataFrameExt {
    /// All column names as owned Strings
    fn column_names_vec(&self) -> Vec<String>;

    /// Dictionary-encodes every column into a `Table`.
    fn to_table(&self) -> Result<Table>;

    /// Same as `to_table` restricted to the named columns, in that order.
    fn to_table_with(&self, columns: &[&str]) -> Result<Table>;
}

impl SummaryDataFrameExt for DataFrame {
    fn column_names_vec(&self) -> Vec<String> {
        self.get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn to_table(&self) -> Result<Table> {
        let names = self.column_names_vec();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        self.to_table_with(&names)
    }

    fn to_table_with(&self, columns: &[&str]) -> Result<Table> {
        let mut names = Vec::with_capacity(columns.len());
        let mut dictionaries = Vec::with_capacity(columns.len());
        let mut codes = Vec::with_capacity(columns.len());
        for name in columns {
            let series = self.column(name)?.as_materialized_series();
            let (dictionary, column_codes) = encode_series(series)?;
            names.push(name.to_string());
            dictionaries.push(dictionary);
            codes.push(column_codes);
        }
        Table::from_encoded_columns(names, dictionaries, codes)
    }
}

impl Table {
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        df.to_table()
    }
}
