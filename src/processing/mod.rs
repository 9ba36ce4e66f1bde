//! Cross-dataset processing.
//!
//! The processing layer combines [`crate::dataset::DataSet`] values produced by ingestion:
//!
//! - [`merge_schemas()`]: intersection or union of schemas, sorted by header
//! - [`concat()`]: keyed concatenation over a merged schema
//! - [`merge_sorted()`]: per-source sort followed by a streaming [`KWayMerge`]
//! - [`ReduceOp`]: built-in reducers for [`crate::dataset::DataSet::group_by`]
//!
//! ## Example: merge then group
//!
//! ```rust
//! use dataset_merge::processing::{concat, ReduceOp, SchemaMergeMode};
//! use dataset_merge::dataset::DataSet;
//! use dataset_merge::types::{DataType, Field, Schema, Value};
//!
//! let mut a = DataSet::new("a", Schema::try_new(vec![
//!     Field::new("D1", DataType::Utf8),
//!     Field::new("M1", DataType::Int64),
//! ]).unwrap());
//! a.from_iterable(vec![
//!     vec![Value::from("A"), Value::from("1")],
//!     vec![Value::from("B"), Value::from("2")],
//! ]);
//! let mut b = DataSet::new("b", Schema::try_new(vec![
//!     Field::new("M1", DataType::Int64),
//!     Field::new("D1", DataType::Utf8),
//! ]).unwrap());
//! b.from_iterable(vec![vec![Value::from("3"), Value::from("A")]]);
//!
//! let (mut merged, errors) = concat("merged", &[a, b], SchemaMergeMode::Intersection).unwrap();
//! assert!(errors.is_empty());
//! merged.group_by(&["D1"], |acc, v| ReduceOp::Sum.apply(acc, v)).unwrap();
//! assert_eq!(merged.rows()[0], vec![Value::from("A"), Value::Int64(4)]);
//! ```

pub mod merge;
pub mod reduce;

pub use merge::{concat, merge_schemas, merge_sorted, sorted_merge_name, KWayMerge, SchemaMergeMode};
pub use reduce::ReduceOp;
