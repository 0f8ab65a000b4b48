//! # Rule Summary
//!
//! A Rust library for summarizing categorical tables with a handful of
//! high-coverage rules and drilling into them interactively.
//!
//! ## Key Features
//!
//! - **Dictionary-encoded tables**: built from rows or a polars `DataFrame`,
//!   with optional bucketization of numeric columns
//! - **Branch-and-bound search**: level-wise rule discovery with admissible
//!   marginal-value bounds, top-1 greedy and top-k variants
//! - **Sampling**: reservoir samples pooled and reused across narrower filters
//! - **Drill-down tree**: expand/contract rows, or build a static tree from
//!   precomputed rules
//!
//! ## Example
//!
//! ```rust,ignore
//! use rule_summary::{conf::SummarizerConfig, summarizer::TableSummarizer};
//!
//! let mut summarizer = TableSummarizer::new(SummarizerConfig::default());
//! summarizer.fit(&df)?;
//! for rule in summarizer.summarize()? {
//!     println!("{}", rule.rule.sparse_string(summarizer.table()?));
//! }
//! println!("{}", summarizer.tree_info());
//! ```

// Module declarations
pub mod compound;
pub mod conf;
pub mod dataframe;
pub mod drill_down;
pub mod error;
pub mod lattice;
pub mod node;
pub mod population;
pub mod rules;
pub mod sample;
pub mod sample_handler;
pub mod scorer;
pub mod solver;
pub mod summarizer;
pub mod table;
pub mod tree;

pub use error::{Result, SummaryError};
