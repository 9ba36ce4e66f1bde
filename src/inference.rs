//! Column type inference from a single sample record.
//!
//! Each token is classified on its own with a fixed precedence: integer, then float, then
//! boolean spelling, then text. Integers are tried first because every integer literal is also a
//! valid float. The inferred type is never revisited: later tokens that do not fit are
//! conversion failures at ingestion time.

use crate::types::{parse_bool_token, DataType, Value};

/// Infer the type of one raw token.
///
/// ```rust
/// use dataset_merge::inference::infer_type;
/// use dataset_merge::types::DataType;
///
/// assert_eq!(infer_type("42"), DataType::Int64);
/// assert_eq!(infer_type("3.14"), DataType::Float64);
/// assert_eq!(infer_type("True"), DataType::Bool);
/// assert_eq!(infer_type("hello"), DataType::Utf8);
/// ```
pub fn infer_type(token: &str) -> DataType {
    let trimmed = token.trim();
    if trimmed.parse::<i64>().is_ok() {
        DataType::Int64
    } else if trimmed.parse::<f64>().is_ok() {
        DataType::Float64
    } else if parse_bool_token(token).is_some() {
        DataType::Bool
    } else {
        DataType::Utf8
    }
}

/// Infer one type per column from a sample record of text tokens.
pub fn infer_types<I, S>(tokens: I) -> Vec<DataType>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokens
        .into_iter()
        .map(|token| infer_type(token.as_ref()))
        .collect()
}

/// Infer the type of an already typed sample value (structured formats).
///
/// Text values keep the text type even when they look numeric, and an absent sample falls back
/// to text.
pub fn infer_value_type(sample: &Value) -> DataType {
    sample.data_type().unwrap_or(DataType::Utf8)
}
