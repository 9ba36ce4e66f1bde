//! Built-in binary reducers for [`crate::dataset::DataSet::group_by`].

use std::fmt;
use std::str::FromStr;

use crate::types::Value;

/// Built-in reduction operations applied as `acc = op(acc, next)` in row order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReduceOp {
    /// Numeric addition (saturating for integers), logical OR for booleans, concatenation for
    /// text.
    #[default]
    Sum,
    /// Smaller of the two values.
    Min,
    /// Larger of the two values.
    Max,
    /// Keep the first value seen.
    First,
    /// Keep the last value seen.
    Last,
}

impl ReduceOp {
    /// Fold `next` into `acc`.
    ///
    /// Both values normally share one column type. A `Null` on either side yields the other
    /// value; other type mismatches keep `acc`.
    pub fn apply(self, acc: &Value, next: &Value) -> Value {
        match self {
            Self::Sum => sum(acc, next),
            Self::Min => acc.min(next).clone(),
            Self::Max => acc.max(next).clone(),
            Self::First => acc.clone(),
            Self::Last => next.clone(),
        }
    }

    /// Lowercase name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::First => "first",
            Self::Last => "last",
        }
    }
}

fn sum(acc: &Value, next: &Value) -> Value {
    match (acc, next) {
        (Value::Int64(a), Value::Int64(b)) => Value::Int64(a.saturating_add(*b)),
        (Value::Float64(a), Value::Float64(b)) => Value::Float64(a + b),
        (Value::Bool(a), Value::Bool(b)) => Value::Bool(*a || *b),
        (Value::Utf8(a), Value::Utf8(b)) => Value::Utf8(format!("{a}{b}")),
        (Value::Null, other) => other.clone(),
        (other, _) => other.clone(),
    }
}

impl fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReduceOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sum" => Ok(Self::Sum),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            other => Err(format!(
                "unknown reducer '{other}' (expected sum, min, max, first or last)"
            )),
        }
    }
}
