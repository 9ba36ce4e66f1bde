//! The typed in-memory dataset.
//!
//! A [`DataSet`] owns its rows exclusively. Rows enter through [`DataSet::add_row`], which coerces
//! every raw value into the schema type of its column, and leave either positionally
//! ([`DataSet::rows`]) or keyed by header ([`DataSet::keyed_rows`]) with values copied.

use std::collections::HashMap;
use std::fmt;

use log::debug;

use crate::error::{ColumnRef, DatasetError, DatasetResult, RowError};
use crate::types::{CoercionError, DataType, Field, Schema, Value};
use crate::writer::{write_table, TableOptions};

/// A row addressed by header name.
pub type KeyedRow = HashMap<String, Value>;

/// Raw input for [`DataSet::add_row`].
///
/// The two variants are exclusive: a keyed row is matched purely by header name and a positional
/// row purely by schema order. Callers that hold both must pick [`RowInput::Keyed`].
#[derive(Debug, Clone, PartialEq)]
pub enum RowInput {
    /// Values in schema order. Surplus trailing values are ignored.
    Positional(Vec<Value>),
    /// Values keyed by header name. Keys outside the schema are ignored.
    Keyed(KeyedRow),
}

impl From<Vec<Value>> for RowInput {
    fn from(values: Vec<Value>) -> Self {
        Self::Positional(values)
    }
}

impl From<KeyedRow> for RowInput {
    fn from(values: KeyedRow) -> Self {
        Self::Keyed(values)
    }
}

/// In-memory tabular dataset bound to one [`Schema`].
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    name: String,
    schema: Schema,
    indices: HashMap<String, usize>,
    rows: Vec<Vec<Value>>,
    default_fill: bool,
}

impl DataSet {
    /// Create an empty dataset. Default-fill starts disabled.
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        let indices = index_map(&schema);
        Self {
            name: name.into(),
            schema,
            indices,
            rows: Vec::new(),
            default_fill: false,
        }
    }

    /// Enable or disable default-filling of headers missing from keyed rows.
    pub fn with_default_fill(mut self, enabled: bool) -> Self {
        self.default_fill = enabled;
        self
    }

    /// Dataset name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Whether keyed ingestion default-fills missing headers.
    pub fn default_fill(&self) -> bool {
        self.default_fill
    }

    /// Header names in schema order.
    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.schema.field_names()
    }

    /// Position of a header in row storage.
    pub fn index_of(&self, header: &str) -> Option<usize> {
        self.indices.get(header).copied()
    }

    /// Stored rows, each in schema order.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows in the dataset.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the dataset holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Coerce and append one row.
    ///
    /// On error the dataset is left unchanged.
    pub fn add_row(&mut self, input: RowInput) -> DatasetResult<()> {
        match &input {
            RowInput::Keyed(values) => self.add_row_keyed(values),
            RowInput::Positional(values) => self.add_row_positional(values),
        }
    }

    /// Coerce and append a row given in schema order.
    ///
    /// - fewer values than headers: [`DatasetError::Completeness`] naming the uncovered headers
    /// - a [`Value::Null`]: [`DatasetError::Completeness`] for that position
    /// - a value without a representation in the column type: [`DatasetError::Conversion`]
    /// - no values at all: [`DatasetError::Argument`]
    pub fn add_row_positional(&mut self, values: &[Value]) -> DatasetResult<()> {
        if values.is_empty() || self.schema.is_empty() {
            return Err(nothing_to_ingest());
        }
        if values.len() < self.schema.len() {
            return Err(DatasetError::Completeness {
                missing: self.schema.fields()[values.len()..]
                    .iter()
                    .enumerate()
                    .map(|(offset, field)| {
                        ColumnRef::position(values.len() + offset + 1, &field.name)
                    })
                    .collect(),
            });
        }

        let row = self
            .schema
            .fields()
            .iter()
            .zip(values)
            .enumerate()
            .map(|(idx, (field, raw))| {
                coerce_cell(field, raw, || ColumnRef::position(idx + 1, &field.name))
            })
            .collect::<DatasetResult<Vec<_>>>()?;
        self.rows.push(row);
        Ok(())
    }

    /// Coerce and append a row given by header name.
    ///
    /// Headers without a supplied value are default-filled with their type's zero value when
    /// default-fill is enabled; otherwise the row fails with [`DatasetError::Completeness`]
    /// naming every missing header. Conversion failures report the header name.
    pub fn add_row_keyed(&mut self, values: &KeyedRow) -> DatasetResult<()> {
        if values.is_empty() || self.schema.is_empty() {
            return Err(nothing_to_ingest());
        }
        if !self.default_fill {
            let missing: Vec<ColumnRef> = self
                .schema
                .field_names()
                .filter(|name| !values.contains_key(*name))
                .map(|name| ColumnRef::Name(name.to_string()))
                .collect();
            if !missing.is_empty() {
                return Err(DatasetError::Completeness { missing });
            }
        }

        let mut row = Vec::with_capacity(self.schema.len());
        for field in self.schema.fields() {
            let cell = match values.get(&field.name) {
                Some(raw) => coerce_cell(field, raw, || ColumnRef::Name(field.name.clone()))?,
                None => field.data_type.default_value(),
            };
            row.push(cell);
        }
        self.rows.push(row);
        Ok(())
    }

    /// Feed a batch of rows through [`DataSet::add_row`].
    ///
    /// The item type fixes the mode for the whole batch. Rejected rows are skipped and their
    /// errors returned; accepted rows stay in the dataset.
    pub fn from_iterable<I, R>(&mut self, rows: I) -> Vec<RowError>
    where
        I: IntoIterator<Item = R>,
        R: Into<RowInput>,
    {
        self.from_fallible_iterable(rows.into_iter().map(Ok))
    }

    /// Like [`DataSet::from_iterable`], for row sources that can fail per record (parsers).
    ///
    /// A failed record is recorded the same way as a rejected row.
    pub fn from_fallible_iterable<I, R>(&mut self, rows: I) -> Vec<RowError>
    where
        I: IntoIterator<Item = DatasetResult<R>>,
        R: Into<RowInput>,
    {
        let mut errors = Vec::new();
        for (idx0, item) in rows.into_iter().enumerate() {
            let result = item.and_then(|row| self.add_row(row.into()));
            if let Err(error) = result {
                errors.push(RowError {
                    dataset: self.name.clone(),
                    row: idx0 + 1,
                    error,
                });
            }
        }
        if !errors.is_empty() {
            debug!(
                "dataset '{}': {} row(s) rejected, {} stored",
                self.name,
                errors.len(),
                self.rows.len()
            );
        }
        errors
    }

    /// Stable sort by the given headers; with no headers, by all columns in schema order.
    ///
    /// Headers the dataset does not have project to [`Value::Null`], which sorts first.
    pub fn sort(&mut self, headers: &[&str]) {
        if headers.is_empty() {
            self.rows.sort();
            return;
        }
        let positions: Vec<Option<usize>> = headers.iter().map(|h| self.index_of(h)).collect();
        self.rows
            .sort_by_cached_key(|row| project_positions(row, &positions));
    }

    /// Project a stored row onto `headers`, using [`Value::Null`] for unknown headers.
    pub fn project(&self, row: &[Value], headers: &[&str]) -> Vec<Value> {
        let positions: Vec<Option<usize>> = headers.iter().map(|h| self.index_of(h)).collect();
        project_positions(row, &positions)
    }

    /// Re-emit every row keyed by header name. Values are copied.
    pub fn keyed_rows(&self) -> impl Iterator<Item = KeyedRow> + '_ {
        self.rows.iter().map(|row| {
            self.schema
                .field_names()
                .zip(row)
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect()
        })
    }

    /// Group rows by the values of `grouping` headers, folding every other column with `reducer`.
    ///
    /// The first row of a group is stored verbatim; each later member is folded in
    /// position-by-position as `reducer(accumulator, value)` in row order. Afterwards the schema
    /// is the grouping headers in the given order followed by the remaining headers sorted by
    /// name, and there is one row per group in first-seen order.
    ///
    /// Fails without touching the dataset if a grouping header is unknown or repeated.
    pub fn group_by<F>(&mut self, grouping: &[&str], mut reducer: F) -> DatasetResult<()>
    where
        F: FnMut(&Value, &Value) -> Value,
    {
        let mut grouping_idx = Vec::with_capacity(grouping.len());
        for header in grouping {
            let idx = self
                .index_of(header)
                .ok_or_else(|| DatasetError::UnknownColumn {
                    column: header.to_string(),
                })?;
            if grouping_idx.contains(&idx) {
                return Err(DatasetError::argument(format!(
                    "grouping header '{header}' given more than once"
                )));
            }
            grouping_idx.push(idx);
        }

        let mut other: Vec<&Field> = self
            .schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(idx, _)| !grouping_idx.contains(idx))
            .map(|(_, field)| field)
            .collect();
        other.sort_by(|a, b| a.name.cmp(&b.name));
        let other_idx: Vec<usize> = other
            .iter()
            .filter_map(|field| self.index_of(&field.name))
            .collect();

        let new_fields: Vec<Field> = grouping_idx
            .iter()
            .map(|&idx| self.schema.fields()[idx].clone())
            .chain(other.into_iter().cloned())
            .collect();
        let new_schema = Schema::try_new(new_fields)?;

        let mut slots: HashMap<Vec<Value>, usize> = HashMap::new();
        let mut groups: Vec<(Vec<Value>, Vec<Value>)> = Vec::new();
        for mut row in std::mem::take(&mut self.rows) {
            let key: Vec<Value> = grouping_idx
                .iter()
                .map(|&idx| std::mem::replace(&mut row[idx], Value::Null))
                .collect();
            let values = other_idx
                .iter()
                .map(|&idx| std::mem::replace(&mut row[idx], Value::Null));
            match slots.get(&key) {
                Some(&slot) => {
                    let acc = &mut groups[slot].1;
                    for (pos, value) in values.enumerate() {
                        acc[pos] = reducer(&acc[pos], &value);
                    }
                }
                None => {
                    slots.insert(key.clone(), groups.len());
                    groups.push((key, values.collect()));
                }
            }
        }

        debug!(
            "dataset '{}': grouped into {} group(s) by {:?}",
            self.name,
            groups.len(),
            grouping
        );
        self.rows = groups
            .into_iter()
            .map(|(mut key, acc)| {
                key.extend(acc);
                key
            })
            .collect();
        self.replace_schema(new_schema);
        Ok(())
    }

    /// Rename all headers at once, keeping types and row layout.
    pub fn set_headers<S: Into<String>>(&mut self, headers: Vec<S>) -> DatasetResult<()> {
        if headers.len() != self.schema.len() {
            return Err(DatasetError::argument(format!(
                "expected {} header(s), got {}",
                self.schema.len(),
                headers.len()
            )));
        }
        let fields = headers
            .into_iter()
            .zip(self.schema.fields())
            .map(|(name, field)| Field::new(name, field.data_type))
            .collect();
        let schema = Schema::try_new(fields)?;
        self.replace_schema(schema);
        Ok(())
    }

    fn replace_schema(&mut self, schema: Schema) {
        self.indices = index_map(&schema);
        self.schema = schema;
    }
}

impl fmt::Display for DataSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset '{}':", self.name)?;
        let mut buf = Vec::new();
        write_table(self, &mut buf, &TableOptions::default()).map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

fn index_map(schema: &Schema) -> HashMap<String, usize> {
    schema
        .field_names()
        .enumerate()
        .map(|(idx, name)| (name.to_string(), idx))
        .collect()
}

fn project_positions(row: &[Value], positions: &[Option<usize>]) -> Vec<Value> {
    positions
        .iter()
        .map(|pos| pos.and_then(|idx| row.get(idx)).cloned().unwrap_or(Value::Null))
        .collect()
}

fn coerce_cell(
    field: &Field,
    raw: &Value,
    column: impl FnOnce() -> ColumnRef,
) -> DatasetResult<Value> {
    field.data_type.coerce(raw).map_err(|err| match err {
        CoercionError::Absent => DatasetError::Completeness {
            missing: vec![column()],
        },
        CoercionError::Invalid => conversion_error(column(), raw, field.data_type),
    })
}

fn conversion_error(column: ColumnRef, raw: &Value, data_type: DataType) -> DatasetError {
    DatasetError::Conversion {
        column,
        raw: raw.to_string(),
        data_type,
    }
}

fn nothing_to_ingest() -> DatasetError {
    DatasetError::argument("positional or keyed values must be provided")
}
