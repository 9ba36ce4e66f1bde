use std::fmt;

use thiserror::Error;

use crate::types::DataType;

/// Convenience result type for dataset operations.
pub type DatasetResult<T> = Result<T, DatasetError>;

/// Identifies the column a row-level error refers to.
///
/// Keyed ingestion reports header names, positional ingestion reports the 1-based position
/// together with the header it maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    /// Column addressed by header name.
    Name(String),
    /// Column addressed by 1-based position.
    Position { position: usize, header: String },
}

impl ColumnRef {
    pub(crate) fn position(position: usize, header: &str) -> Self {
        Self::Position {
            position,
            header: header.to_string(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "'{name}'"),
            Self::Position { position, header } => write!(f, "#{position} '{header}'"),
        }
    }
}

/// Error type shared by parsing, ingestion, merging and writing.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// CSV reader error.
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// Malformed JSON document.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Malformed XML document.
    #[error(transparent)]
    Xml(#[from] roxmltree::Error),

    /// The source content does not have the expected structure.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// No parser is registered for the format discriminator.
    #[error("unsupported format '{format}': no parser registered")]
    UnsupportedFormat { format: String },

    /// The same header has different types in two schemas being merged.
    #[error("schema conflict for header '{header}': {left} vs {right}")]
    SchemaConflict {
        header: String,
        left: DataType,
        right: DataType,
    },

    /// A row lacks one or more required values.
    #[error("incomplete row: missing required value(s) {}", join_columns(.missing))]
    Completeness { missing: Vec<ColumnRef> },

    /// A value could not be coerced into the column type.
    #[error("cannot convert value '{raw}' in column {column} to {data_type}")]
    Conversion {
        column: ColumnRef,
        raw: String,
        data_type: DataType,
    },

    /// The call was given nothing usable to work on.
    #[error("invalid argument: {message}")]
    Argument { message: String },

    /// A header named by the caller does not exist in the dataset.
    #[error("unknown column '{column}'")]
    UnknownColumn { column: String },
}

/// Coarse classification of [`DatasetError`] following the error-recovery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// I/O failure while reading a source or writing output.
    Io,
    /// Malformed source content.
    Parse,
    /// No parser for the format.
    UnsupportedFormat,
    /// Incompatible column types during a schema merge.
    SchemaConflict,
    /// Row missing required values.
    Completeness,
    /// Value not coercible to the column type.
    Conversion,
    /// Nothing to ingest, or an invalid header list.
    Argument,
}

impl DatasetError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::Csv(err) => match err.kind() {
                csv::ErrorKind::Io(_) => ErrorKind::Io,
                _ => ErrorKind::Parse,
            },
            Self::Json(err) if err.is_io() => ErrorKind::Io,
            Self::Json(_) | Self::Xml(_) | Self::Parse { .. } => ErrorKind::Parse,
            Self::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Self::SchemaConflict { .. } => ErrorKind::SchemaConflict,
            Self::Completeness { .. } => ErrorKind::Completeness,
            Self::Conversion { .. } => ErrorKind::Conversion,
            Self::Argument { .. } | Self::UnknownColumn { .. } => ErrorKind::Argument,
        }
    }

    /// Returns `true` for errors that only invalidate a single row.
    ///
    /// Bulk ingestion records these and moves on to the next row.
    pub fn is_row_level(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Completeness | ErrorKind::Conversion | ErrorKind::Argument
        )
    }

    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub(crate) fn argument(message: impl Into<String>) -> Self {
        Self::Argument {
            message: message.into(),
        }
    }
}

fn join_columns(columns: &[ColumnRef]) -> String {
    columns
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A row rejected during bulk ingestion.
#[derive(Debug, Error)]
#[error("dataset '{dataset}' row {row}: {error}")]
pub struct RowError {
    /// Name of the dataset the row was destined for.
    pub dataset: String,
    /// 1-based ordinal of the row within the ingested batch.
    pub row: usize,
    /// Why the row was rejected.
    #[source]
    pub error: DatasetError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completeness_lists_every_missing_column() {
        let err = DatasetError::Completeness {
            missing: vec![ColumnRef::Name("M1".to_string()), ColumnRef::position(3, "F")],
        };
        assert_eq!(
            err.to_string(),
            "incomplete row: missing required value(s) 'M1', #3 'F'"
        );
        assert_eq!(err.kind(), ErrorKind::Completeness);
        assert!(err.is_row_level());
    }

    #[test]
    fn wrapped_errors_render_their_message_once() {
        let err = DatasetError::from(std::io::Error::other("disk gone"));
        assert_eq!(err.to_string(), "disk gone");
        assert_eq!(err.kind(), ErrorKind::Io);

        let chain = format!("{:#}", anyhow::Error::from(err).context("reading data/a.csv"));
        assert_eq!(chain, "reading data/a.csv: disk gone");
    }

    #[test]
    fn conversion_names_column_and_value() {
        let err = DatasetError::Conversion {
            column: ColumnRef::Name("M1".to_string()),
            raw: "abc".to_string(),
            data_type: DataType::Int64,
        };
        assert_eq!(
            err.to_string(),
            "cannot convert value 'abc' in column 'M1' to Integer"
        );
    }

    #[test]
    fn structural_errors_are_not_row_level() {
        let conflict = DatasetError::SchemaConflict {
            header: "D1".to_string(),
            left: DataType::Utf8,
            right: DataType::Int64,
        };
        assert_eq!(conflict.kind(), ErrorKind::SchemaConflict);
        assert!(!conflict.is_row_level());

        let io = DatasetError::from(std::io::Error::other("boom"));
        assert_eq!(io.kind(), ErrorKind::Io);
        assert!(!DatasetError::parse("bad").is_row_level());
    }
}
