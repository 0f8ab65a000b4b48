use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("length mismatch: expected {expected} columns, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("arithmetic overflow: {0}")]
    Overflow(String),

    #[error("dictionary of column {column} exceeds the code range")]
    DictionaryOverflow { column: String },

    #[error("column {column} holds non-numeric value {value:?}")]
    NonNumeric { column: String, value: String },

    #[error("summarizer has no table; call fit first")]
    NotFitted,

    #[error("tree invariant violated: {0}")]
    Invariant(String),

    #[error("dataframe error: {0}")]
    Polars(#[from] PolarsError),
}

pub type Result<T> = std::result::Result<T, SummaryError>;

/// `count * weight + offset` in `i64`, failing instead of wrapping.
pub(crate) fn weighted(count: u64, weight: i64, offset: i64) -> Result<i64> {
    i64::try_from(count)
        .ok()
        .and_then(|c| c.checked_mul(weight))
        .and_then(|v| v.checked_add(offset))
        .ok_or_else(|| {
            SummaryError::Overflow(format!("{count} * {weight} + {offset} does not fit in i64"))
        })
}
