//! Format parsers and the parser registry.
//!
//! A parser turns a byte stream into a [`ParsedSource`]: a [`Schema`] inferred from the first
//! record, plus a lazy sequence of raw rows in schema order. Raw rows still need coercion, which
//! happens when they are fed into a [`crate::dataset::DataSet`].
//!
//! Parsers are looked up by file extension in a [`ParserRegistry`]:
//!
//! - [`csv`]: `.csv`
//! - [`json`]: `.json` (`{"fields": [...]}`, array of objects, or NDJSON)
//! - [`xml`]: `.xml` (`<objects>` records of named `<object>` values)

pub mod csv;
pub mod json;
pub mod observability;
pub mod registry;
pub mod xml;

use std::fmt;
use std::io::Read;

use crate::error::{DatasetError, DatasetResult};
use crate::types::{DataType, Field, Schema, Value};

pub use observability::{
    CompositeObserver, FileObserver, IngestionContext, IngestionObserver, IngestionSeverity,
    IngestionStats, LogObserver,
};
pub use registry::ParserRegistry;

/// One raw record, positionally aligned with the parsed schema.
pub type RawRow = Vec<Value>;

/// Lazy sequence of raw records. A malformed record yields an error without ending the sequence.
pub type RawRows = Box<dyn Iterator<Item = DatasetResult<RawRow>>>;

/// Parser entry point: read a stream, infer its schema, hand back its rows.
pub type ParseFn = fn(Box<dyn Read>) -> DatasetResult<ParsedSource>;

/// Output of a parser.
pub struct ParsedSource {
    /// Schema inferred from the first record.
    pub schema: Schema,
    /// Raw records, including the one the schema was inferred from.
    pub rows: RawRows,
}

impl fmt::Debug for ParsedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedSource")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Build a schema from parsed headers, reporting duplicates as malformed content.
pub(crate) fn schema_from_headers<I, S>(headers: I, types: Vec<DataType>) -> DatasetResult<Schema>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let names: Vec<String> = headers.into_iter().map(Into::into).collect();
    if names.len() != types.len() {
        return Err(DatasetError::parse(format!(
            "{} header(s) but {} value(s) in the first record",
            names.len(),
            types.len()
        )));
    }
    let fields = names
        .into_iter()
        .zip(types)
        .map(|(name, data_type)| Field::new(name, data_type))
        .collect();
    Schema::try_new(fields).map_err(|err| DatasetError::parse(err.to_string()))
}
