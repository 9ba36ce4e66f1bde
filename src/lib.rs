//! `dataset-merge` loads a directory of heterogeneous tabular files (CSV, JSON, XML) into typed
//! in-memory [`dataset::DataSet`]s and combines them into one delimited table, either as a
//! sorted k-way merge or as a group-by aggregation.
//!
//! The primary entrypoint is [`pipeline::run`], which drives a whole job from a
//! [`pipeline::RunRequest`]. The building blocks are public too:
//!
//! - [`ingestion`]: format parsers, the [`ingestion::ParserRegistry`], and run observers
//! - [`dataset`]: the dataset core (row coercion, sorting, keyed re-emission, group-by)
//! - [`processing`]: schema merging, concatenation, k-way merge, reducers
//! - [`writer`]: delimited table output
//! - [`types`] / [`inference`]: the type system and type inference
//! - [`error`]: error types used across the crate
//!
//! ## What you can load
//!
//! **File formats (picked by extension):**
//!
//! - **CSV**: `.csv`, header line then data lines
//! - **JSON**: `.json`, `{"fields": [...]}`, an array of objects, or newline-delimited objects
//! - **XML**: `.xml`, `<objects>` records of named `<object><value>..</value></object>` cells
//!
//! **Schema + value types:**
//!
//! Every source gets a schema inferred from its first record. Supported logical types are:
//!
//! - [`types::DataType::Int64`]
//! - [`types::DataType::Float64`]
//! - [`types::DataType::Bool`]
//! - [`types::DataType::Utf8`]
//!
//! Rows that cannot be coerced into the schema are rejected one by one and reported; they never
//! abort a load.
//!
//! ## Quick example: run a job
//!
//! ```no_run
//! use dataset_merge::ingestion::ParserRegistry;
//! use dataset_merge::pipeline::{run, Operation, RunRequest};
//!
//! # fn main() -> Result<(), dataset_merge::DatasetError> {
//! let request = RunRequest::new(
//!     "data/",
//!     "merged.tsv",
//!     Operation::SortedMerge { keys: vec!["D1".to_string()] },
//! );
//! let report = run(&request, &ParserRegistry::with_default_parsers())?;
//! print!("{report}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Parse, ingest and group in memory
//!
//! ```rust
//! use std::io::Cursor;
//!
//! use dataset_merge::dataset::DataSet;
//! use dataset_merge::ingestion::ParserRegistry;
//! use dataset_merge::processing::ReduceOp;
//! use dataset_merge::types::Value;
//!
//! let registry = ParserRegistry::with_default_parsers();
//! let parsed = registry
//!     .parse("csv", Box::new(Cursor::new("D1,M1\nA,1\nB,2\nA,3\n")))
//!     .unwrap();
//!
//! let mut ds = DataSet::new("sales", parsed.schema);
//! let rejected = ds.from_fallible_iterable(parsed.rows);
//! assert!(rejected.is_empty());
//!
//! ds.group_by(&["D1"], |acc, v| ReduceOp::Sum.apply(acc, v)).unwrap();
//! assert_eq!(ds.rows()[0], vec![Value::from("A"), Value::Int64(4)]);
//! assert_eq!(ds.rows()[1], vec![Value::from("B"), Value::Int64(2)]);
//! ```

pub mod cli;
pub mod dataset;
pub mod error;
pub mod inference;
pub mod ingestion;
pub mod pipeline;
pub mod processing;
pub mod types;
pub mod writer;

pub use error::{DatasetError, DatasetResult, ErrorKind, RowError};
