//! CSV parser.
//!
//! The first line holds the headers and the second line is the type sample. Records are read
//! lazily from the underlying stream as text tokens.

use std::io::Read;

use crate::error::{DatasetError, DatasetResult};
use crate::inference::infer_types;
use crate::types::Value;

use super::{schema_from_headers, ParsedSource, RawRow};

/// Parse a CSV stream.
pub fn parse_csv(input: Box<dyn Read>) -> DatasetResult<ParsedSource> {
    let rdr = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);
    parse_csv_from_reader(rdr)
}

/// Parse CSV from an existing reader.
///
/// The reader must be configured with `has_headers(true)`. Use `flexible(true)` to let short
/// records through to ingestion, where they are reported as incomplete rows.
pub fn parse_csv_from_reader<R: Read + 'static>(
    mut rdr: ::csv::Reader<R>,
) -> DatasetResult<ParsedSource> {
    let headers = rdr.headers()?.clone();
    let mut records = rdr.into_records();
    let first = match records.next() {
        Some(record) => record?,
        None => {
            return Err(DatasetError::parse(
                "csv input has no data line to infer column types from",
            ));
        }
    };

    let schema = schema_from_headers(headers.iter(), infer_types(first.iter()))?;
    let rows = std::iter::once(Ok(first))
        .chain(records)
        .map(|record| record.map(|r| to_raw_row(&r)).map_err(DatasetError::from));

    Ok(ParsedSource {
        schema,
        rows: Box::new(rows),
    })
}

fn to_raw_row(record: &::csv::StringRecord) -> RawRow {
    record.iter().map(Value::from).collect()
}
