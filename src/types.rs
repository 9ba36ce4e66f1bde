//! Core data model: primitive types, typed values and schemas.
//!
//! Every stored value is tagged with exactly one [`DataType`]. Moving a value between types only
//! happens through [`DataType::coerce`], which is the single coercion table of the crate.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{DatasetError, DatasetResult};

/// Boolean spellings recognized by type inference and text coercion.
pub(crate) const BOOL_SPELLINGS: [(&str, bool); 4] = [
    ("True", true),
    ("False", false),
    ("true", true),
    ("false", false),
];

pub(crate) fn parse_bool_token(token: &str) -> Option<bool> {
    BOOL_SPELLINGS
        .iter()
        .find(|(spelling, _)| *spelling == token)
        .map(|&(_, value)| value)
}

/// Primitive column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 text.
    Utf8,
}

/// Why a raw value could not become a typed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionError {
    /// The value is structurally absent ([`Value::Null`]).
    Absent,
    /// The value is present but has no representation in the target type.
    Invalid,
}

impl DataType {
    /// Human-readable type name used in messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Int64 => "Integer",
            Self::Float64 => "Float",
            Self::Bool => "Boolean",
            Self::Utf8 => "Text",
        }
    }

    /// The zero/identity value used when default-filling a missing column.
    pub fn default_value(self) -> Value {
        match self {
            Self::Int64 => Value::Int64(0),
            Self::Float64 => Value::Float64(0.0),
            Self::Bool => Value::Bool(false),
            Self::Utf8 => Value::Utf8(String::new()),
        }
    }

    /// Coerce a raw value into this type.
    ///
    /// | target \ source | Int64 | Float64 | Bool | Utf8 (trimmed) |
    /// |---|---|---|---|---|
    /// | Int64 | itself | integral and in range | 1 / 0 | parse |
    /// | Float64 | widened | itself | 1.0 / 0.0 | parse |
    /// | Bool | 1 / 0 only | never | itself | `True`/`False`/`true`/`false` |
    /// | Utf8 | text | text | text | verbatim |
    pub fn coerce(self, raw: &Value) -> Result<Value, CoercionError> {
        if raw.is_null() {
            return Err(CoercionError::Absent);
        }
        let coerced = match self {
            Self::Int64 => coerce_int(raw).map(Value::Int64),
            Self::Float64 => coerce_float(raw).map(Value::Float64),
            Self::Bool => coerce_bool(raw).map(Value::Bool),
            Self::Utf8 => Some(coerce_text(raw)),
        };
        coerced.ok_or(CoercionError::Invalid)
    }
}

// 2^63: exactly representable as f64, unlike i64::MAX.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

fn coerce_int(raw: &Value) -> Option<i64> {
    match raw {
        Value::Int64(v) => Some(*v),
        Value::Float64(v) if v.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(v) => {
            Some(*v as i64)
        }
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Utf8(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_float(raw: &Value) -> Option<f64> {
    match raw {
        Value::Int64(v) => Some(*v as f64),
        Value::Float64(v) => Some(*v),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Utf8(s) => s.trim().parse().ok(),
        Value::Null => None,
    }
}

fn coerce_bool(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::Int64(0) => Some(false),
        Value::Int64(1) => Some(true),
        Value::Utf8(s) => parse_bool_token(s.trim()),
        _ => None,
    }
}

fn coerce_text(raw: &Value) -> Value {
    match raw {
        Value::Utf8(s) => Value::Utf8(s.clone()),
        other => Value::Utf8(other.to_string()),
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Header name.
    pub name: String,
    /// Column type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered list of uniquely named fields. Field order is the positional layout of rows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Create a schema, rejecting duplicate header names.
    pub fn try_new(fields: Vec<Field>) -> DatasetResult<Self> {
        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(DatasetError::argument(format!(
                    "duplicate header '{}'",
                    field.name
                )));
            }
        }
        Ok(Self { fields })
    }

    /// Ordered fields.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Returns the type of a field by name, if present.
    pub fn data_type_of(&self, name: &str) -> Option<DataType> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.data_type)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A single value, either stored in a row or in flight as raw parser output.
///
/// `Null` never appears in stored rows. It marks a structurally absent raw value and is the
/// sentinel projected for headers a dataset does not have when building sort keys.
///
/// Values are totally ordered: `Null` first, then by type in the order `Int64`, `Float64`,
/// `Bool`, `Utf8`, then naturally within a type. Floats use IEEE total ordering, so equality
/// and hashing are consistent and values can be used as group keys.
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 text.
    Utf8(String),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The type tag of this value, `None` for `Null`.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Null => None,
            Self::Int64(_) => Some(DataType::Int64),
            Self::Float64(_) => Some(DataType::Float64),
            Self::Bool(_) => Some(DataType::Bool),
            Self::Utf8(_) => Some(DataType::Utf8),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Int64(_) => 1,
            Self::Float64(_) => 2,
            Self::Bool(_) => 3,
            Self::Utf8(_) => 4,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int64(a), Self::Int64(b)) => a.cmp(b),
            (Self::Float64(a), Self::Float64(b)) => unsigned_zero(*a).total_cmp(&unsigned_zero(*b)),
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Utf8(a), Self::Utf8(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// `-0.0` and `0.0` are the same key.
fn unsigned_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Null => {}
            Self::Int64(v) => v.hash(state),
            Self::Float64(v) => unsigned_zero(*v).to_bits().hash(state),
            Self::Bool(v) => v.hash(state),
            Self::Utf8(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Int64(v) => write!(f, "{v}"),
            // Debug keeps a fractional part or exponent: `0.0`, `3.14`, `1e20`.
            Self::Float64(v) => write!(f, "{v:?}"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Utf8(v) => f.write_str(v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Utf8(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Utf8(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_index_of_works() {
        let schema = Schema::try_new(vec![
            Field::new("D1", DataType::Utf8),
            Field::new("M1", DataType::Int64),
        ]).unwrap();
        assert_eq!(schema.index_of("D1"), Some(0));
        assert_eq!(schema.index_of("M1"), Some(1));
        assert_eq!(schema.index_of("missing"), None);
        assert_eq!(schema.data_type_of("M1"), Some(DataType::Int64));
    }

    #[test]
    fn schema_rejects_duplicate_headers() {
        let err = Schema::try_new(vec![
            Field::new("D1", DataType::Utf8),
            Field::new("D1", DataType::Int64),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate header 'D1'"));
    }

    #[test]
    fn coerce_text_tokens_into_each_type() {
        assert_eq!(DataType::Int64.coerce(&" 42 ".into()), Ok(Value::Int64(42)));
        assert_eq!(DataType::Float64.coerce(&"3.5".into()), Ok(Value::Float64(3.5)));
        assert_eq!(DataType::Bool.coerce(&"False".into()), Ok(Value::Bool(false)));
        assert_eq!(
            DataType::Utf8.coerce(&" keep ".into()),
            Ok(Value::Utf8(" keep ".to_string()))
        );
    }

    #[test]
    fn coerce_between_typed_values() {
        assert_eq!(DataType::Float64.coerce(&Value::Int64(2)), Ok(Value::Float64(2.0)));
        assert_eq!(DataType::Int64.coerce(&Value::Float64(2.0)), Ok(Value::Int64(2)));
        assert_eq!(
            DataType::Int64.coerce(&Value::Float64(2.5)),
            Err(CoercionError::Invalid)
        );
        assert_eq!(DataType::Bool.coerce(&Value::Int64(1)), Ok(Value::Bool(true)));
        assert_eq!(
            DataType::Bool.coerce(&Value::Int64(7)),
            Err(CoercionError::Invalid)
        );
        assert_eq!(
            DataType::Utf8.coerce(&Value::Bool(true)),
            Ok(Value::Utf8("True".to_string()))
        );
    }

    #[test]
    fn coerce_reports_absent_and_invalid_separately() {
        assert_eq!(DataType::Int64.coerce(&Value::Null), Err(CoercionError::Absent));
        assert_eq!(DataType::Int64.coerce(&"abc".into()), Err(CoercionError::Invalid));
        assert_eq!(DataType::Bool.coerce(&"yes".into()), Err(CoercionError::Invalid));
    }

    #[test]
    fn default_values_are_zero_like() {
        assert_eq!(DataType::Int64.default_value(), Value::Int64(0));
        assert_eq!(DataType::Float64.default_value(), Value::Float64(0.0));
        assert_eq!(DataType::Bool.default_value(), Value::Bool(false));
        assert_eq!(DataType::Utf8.default_value(), Value::Utf8(String::new()));
    }

    #[test]
    fn null_sorts_before_everything() {
        let mut values = vec![
            Value::from("a"),
            Value::Int64(3),
            Value::Null,
            Value::Float64(-1.0),
        ];
        values.sort();
        assert_eq!(values[0], Value::Null);
        assert_eq!(values[1], Value::Int64(3));
    }

    #[test]
    fn signed_zeros_are_one_key() {
        use std::hash::{BuildHasher, RandomState};

        let state = RandomState::new();
        let (pos, neg) = (Value::Float64(0.0), Value::Float64(-0.0));
        assert_eq!(pos, neg);
        assert_eq!(state.hash_one(&pos), state.hash_one(&neg));
        assert!(Value::Float64(-1.0) < neg);
        assert_ne!(Value::Float64(f64::NAN), Value::Float64(0.0));
    }

    #[test]
    fn display_uses_natural_text() {
        assert_eq!(Value::Int64(-7).to_string(), "-7");
        assert_eq!(Value::Float64(0.0).to_string(), "0.0");
        assert_eq!(Value::Float64(1.25).to_string(), "1.25");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::from("x y").to_string(), "x y");
    }
}
