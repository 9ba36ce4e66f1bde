//! Cross-dataset operations: schema merging, keyed concatenation and k-way sorted merge.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};
use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::dataset::{DataSet, KeyedRow};
use crate::error::{DatasetError, DatasetResult, RowError};
use crate::types::{DataType, Field, Schema, Value};

/// How [`merge_schemas`] combines headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaMergeMode {
    /// Keep only headers present in every schema.
    #[default]
    Intersection,
    /// Keep every header present in any schema.
    Union,
}

impl fmt::Display for SchemaMergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Intersection => "intersection",
            Self::Union => "union",
        })
    }
}

impl FromStr for SchemaMergeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "intersection" => Ok(Self::Intersection),
            "union" => Ok(Self::Union),
            other => Err(format!(
                "unknown schema mode '{other}' (expected intersection or union)"
            )),
        }
    }
}

/// Merge the schemas of `datasets`.
///
/// A header present in more than one schema must have the same type everywhere, otherwise the
/// merge fails with [`DatasetError::SchemaConflict`]. The result is sorted by header name, so
/// the input order of datasets never changes the output column order. Zero datasets merge into
/// an empty schema.
pub fn merge_schemas(datasets: &[DataSet], mode: SchemaMergeMode) -> DatasetResult<Schema> {
    let mut schemas = datasets.iter().map(DataSet::schema);
    let mut merged: BTreeMap<String, DataType> = match schemas.next() {
        Some(first) => first
            .fields()
            .iter()
            .map(|f| (f.name.clone(), f.data_type))
            .collect(),
        None => return Ok(Schema::default()),
    };

    for schema in schemas {
        match mode {
            SchemaMergeMode::Intersection => {
                let mut kept = BTreeMap::new();
                for (header, left) in merged {
                    match schema.data_type_of(&header) {
                        Some(right) if right != left => {
                            return Err(DatasetError::SchemaConflict {
                                header,
                                left,
                                right,
                            });
                        }
                        Some(_) => {
                            kept.insert(header, left);
                        }
                        None => {}
                    }
                }
                merged = kept;
            }
            SchemaMergeMode::Union => {
                for field in schema.fields() {
                    match merged.get(&field.name) {
                        Some(&left) if left != field.data_type => {
                            return Err(DatasetError::SchemaConflict {
                                header: field.name.clone(),
                                left,
                                right: field.data_type,
                            });
                        }
                        Some(_) => {}
                        None => {
                            merged.insert(field.name.clone(), field.data_type);
                        }
                    }
                }
            }
        }
    }

    Schema::try_new(
        merged
            .into_iter()
            .map(|(name, data_type)| Field::new(name, data_type))
            .collect(),
    )
}

/// Concatenate `datasets` in order into a new dataset over their merged schema.
///
/// Rows are re-emitted keyed by header, so differing column orders and subsets reconcile;
/// headers a source lacks are default-filled.
pub fn concat(
    name: impl Into<String>,
    datasets: &[DataSet],
    mode: SchemaMergeMode,
) -> DatasetResult<(DataSet, Vec<RowError>)> {
    let schema = merge_schemas(datasets, mode)?;
    let mut merged = DataSet::new(name, schema).with_default_fill(true);
    let errors = merged.from_iterable(datasets.iter().flat_map(|ds| ds.keyed_rows()));
    debug!(
        "concatenated {} dataset(s) into '{}' ({} rows)",
        datasets.len(),
        merged.name(),
        merged.row_count()
    );
    Ok((merged, errors))
}

/// Default name for the output of [`merge_sorted`].
pub fn sorted_merge_name(keys: &[&str]) -> String {
    format!("merged_sorted_by_{}", keys.join("_"))
}

/// Merge `datasets` into a new dataset sorted by `keys`.
///
/// Each source is first sorted in place, then the sources are merged as keyed row streams with
/// [`KWayMerge`]. Missing key headers project to [`Value::Null`], which sorts first both within a
/// source and across sources. Rows with equal keys keep source order.
pub fn merge_sorted(
    name: impl Into<String>,
    datasets: &mut [DataSet],
    keys: &[&str],
    mode: SchemaMergeMode,
) -> DatasetResult<(DataSet, Vec<RowError>)> {
    if keys.is_empty() {
        return Err(DatasetError::argument("at least one sort key is required"));
    }
    let schema = merge_schemas(datasets, mode)?;
    for dataset in datasets.iter_mut() {
        dataset.sort(keys);
    }

    let streams = datasets.iter().map(|ds| ds.keyed_rows());
    let rows = KWayMerge::new(streams, |row: &KeyedRow| keyed_sort_key(row, keys));
    let mut merged = DataSet::new(name, schema).with_default_fill(true);
    let errors = merged.from_iterable(rows);
    debug!(
        "merged {} sorted dataset(s) into '{}' ({} rows)",
        datasets.len(),
        merged.name(),
        merged.row_count()
    );
    Ok((merged, errors))
}

fn keyed_sort_key(row: &KeyedRow, keys: &[&str]) -> Vec<Value> {
    keys.iter()
        .map(|key| row.get(*key).cloned().unwrap_or(Value::Null))
        .collect()
}

struct HeapEntry<K, T> {
    key: K,
    source: usize,
    item: T,
}

impl<K: Ord, T> HeapEntry<K, T> {
    fn rank(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then(self.source.cmp(&other.source))
    }
}

impl<K: Ord, T> PartialEq for HeapEntry<K, T> {
    fn eq(&self, other: &Self) -> bool {
        self.rank(other) == Ordering::Equal
    }
}

impl<K: Ord, T> Eq for HeapEntry<K, T> {}

impl<K: Ord, T> PartialOrd for HeapEntry<K, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.rank(other))
    }
}

impl<K: Ord, T> Ord for HeapEntry<K, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank(other)
    }
}

/// Streaming merge of already sorted iterators.
///
/// Yields items in ascending `key_fn` order, taking ties from the earlier source first. Each
/// step costs `O(log k)` for `k` sources. Sources that are not sorted by the same key produce
/// an unspecified (but complete) interleaving.
pub struct KWayMerge<I, K, F>
where
    I: Iterator,
{
    sources: Vec<I>,
    heap: BinaryHeap<Reverse<HeapEntry<K, I::Item>>>,
    key_fn: F,
}

impl<I, K, F> KWayMerge<I, K, F>
where
    I: Iterator,
    K: Ord,
    F: FnMut(&I::Item) -> K,
{
    /// Start merging `sources`, ordered by `key_fn`.
    pub fn new(sources: impl IntoIterator<Item = I>, key_fn: F) -> Self {
        let sources: Vec<I> = sources.into_iter().collect();
        let mut merge = Self {
            heap: BinaryHeap::with_capacity(sources.len()),
            sources,
            key_fn,
        };
        for source in 0..merge.sources.len() {
            merge.pull(source);
        }
        merge
    }

    fn pull(&mut self, source: usize) {
        if let Some(item) = self.sources[source].next() {
            let key = (self.key_fn)(&item);
            self.heap.push(Reverse(HeapEntry { key, source, item }));
        }
    }
}

impl<I, K, F> Iterator for KWayMerge<I, K, F>
where
    I: Iterator,
    K: Ord,
    F: FnMut(&I::Item) -> K,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let Reverse(entry) = self.heap.pop()?;
        self.pull(entry.source);
        Some(entry.item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lower, upper) = self
            .sources
            .iter()
            .map(Iterator::size_hint)
            .fold((0usize, Some(0usize)), |(lo, hi), (l, h)| {
                (
                    lo.saturating_add(l),
                    hi.zip(h).and_then(|(a, b)| a.checked_add(b)),
                )
            });
        let queued = self.heap.len();
        (
            lower.saturating_add(queued),
            upper.and_then(|u| u.checked_add(queued)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(name: &str, fields: Vec<Field>, rows: Vec<Vec<Value>>) -> DataSet {
        let mut ds = DataSet::new(name, Schema::try_new(fields).unwrap());
        let errors = ds.from_iterable(rows);
        assert!(errors.is_empty(), "{errors:?}");
        ds
    }

    fn names(schema: &Schema) -> Vec<&str> {
        schema.field_names().collect()
    }

    #[test]
    fn intersection_keeps_shared_headers_sorted() {
        let a = dataset(
            "a",
            vec![
                Field::new("M1", DataType::Int64),
                Field::new("D1", DataType::Utf8),
                Field::new("X", DataType::Bool),
            ],
            vec![],
        );
        let b = dataset(
            "b",
            vec![Field::new("D1", DataType::Utf8), Field::new("M1", DataType::Int64)],
            vec![],
        );
        let merged = merge_schemas(&[a, b], SchemaMergeMode::Intersection).unwrap();
        assert_eq!(names(&merged), vec!["D1", "M1"]);
    }

    #[test]
    fn union_accumulates_all_headers() {
        let a = dataset(
            "a",
            vec![Field::new("D1", DataType::Utf8), Field::new("M1", DataType::Int64)],
            vec![],
        );
        let b = dataset(
            "b",
            vec![Field::new("M2", DataType::Float64), Field::new("D1", DataType::Utf8)],
            vec![],
        );
        let merged = merge_schemas(&[a, b], SchemaMergeMode::Union).unwrap();
        assert_eq!(names(&merged), vec!["D1", "M1", "M2"]);
        assert_eq!(merged.data_type_of("M2"), Some(DataType::Float64));
    }

    #[test]
    fn conflicting_types_fail_in_both_modes() {
        let a = dataset("a", vec![Field::new("D1", DataType::Utf8)], vec![]);
        let b = dataset("b", vec![Field::new("D1", DataType::Int64)], vec![]);
        let datasets = [a, b];
        for mode in [SchemaMergeMode::Intersection, SchemaMergeMode::Union] {
            let err = merge_schemas(&datasets, mode).unwrap_err();
            assert_eq!(
                err.to_string(),
                "schema conflict for header 'D1': Text vs Integer"
            );
        }
    }

    #[test]
    fn no_datasets_merge_to_empty_schema() {
        let merged = merge_schemas(&[], SchemaMergeMode::Union).unwrap();
        assert!(merged.is_empty());
    }

    #[test]
    fn concat_default_fills_missing_columns() {
        let a = dataset(
            "a",
            vec![Field::new("D1", DataType::Utf8), Field::new("M1", DataType::Int64)],
            vec![vec!["x".into(), Value::Int64(1)]],
        );
        let b = dataset(
            "b",
            vec![Field::new("D1", DataType::Utf8), Field::new("M2", DataType::Float64)],
            vec![vec!["y".into(), Value::Float64(2.5)]],
        );
        let (merged, errors) = concat("merged", &[a, b], SchemaMergeMode::Union).unwrap();
        assert!(errors.is_empty());
        assert_eq!(
            merged.rows(),
            &[
                vec![Value::from("x"), Value::Int64(1), Value::Float64(0.0)],
                vec![Value::from("y"), Value::Int64(0), Value::Float64(2.5)],
            ]
        );
    }

    #[test]
    fn merge_sorted_interleaves_sources_by_key() {
        let mut datasets = vec![
            dataset(
                "a",
                vec![Field::new("D1", DataType::Utf8), Field::new("M1", DataType::Int64)],
                vec![
                    vec!["c".into(), Value::Int64(1)],
                    vec!["a".into(), Value::Int64(2)],
                ],
            ),
            dataset(
                "b",
                vec![Field::new("M1", DataType::Int64), Field::new("D1", DataType::Utf8)],
                vec![
                    vec![Value::Int64(3), "b".into()],
                    vec![Value::Int64(4), "a".into()],
                ],
            ),
        ];
        let (merged, errors) = merge_sorted(
            sorted_merge_name(&["D1"]),
            &mut datasets,
            &["D1"],
            SchemaMergeMode::Intersection,
        )
        .unwrap();
        assert!(errors.is_empty());
        assert_eq!(merged.name(), "merged_sorted_by_D1");
        let m1: Vec<Value> = merged.rows().iter().map(|r| r[1].clone()).collect();
        // Equal key "a": source "a" first.
        assert_eq!(
            m1,
            vec![Value::Int64(2), Value::Int64(4), Value::Int64(3), Value::Int64(1)]
        );
        // Sources were sorted in place.
        assert_eq!(datasets[0].rows()[0][0], Value::from("a"));
    }

    #[test]
    fn merge_sorted_puts_missing_key_rows_first() {
        let mut datasets = vec![
            dataset(
                "a",
                vec![Field::new("D1", DataType::Utf8), Field::new("K", DataType::Int64)],
                vec![vec!["x".into(), Value::Int64(5)]],
            ),
            dataset(
                "b",
                vec![Field::new("D1", DataType::Utf8)],
                vec![vec!["y".into()]],
            ),
        ];
        let (merged, _) =
            merge_sorted("m", &mut datasets, &["K"], SchemaMergeMode::Union).unwrap();
        assert_eq!(merged.rows()[0], vec![Value::from("y"), Value::Int64(0)]);
        assert_eq!(merged.rows()[1], vec![Value::from("x"), Value::Int64(5)]);
    }

    #[test]
    fn merge_sorted_requires_keys() {
        let mut datasets: Vec<DataSet> = vec![];
        assert!(matches!(
            merge_sorted("m", &mut datasets, &[], SchemaMergeMode::Union),
            Err(DatasetError::Argument { .. })
        ));
    }

    #[test]
    fn kway_merge_is_stable_across_sources() {
        let sources = vec![
            vec![(1, 'a'), (3, 'a')],
            vec![(1, 'b'), (2, 'b')],
            vec![],
        ];
        let merged: Vec<(i32, char)> =
            KWayMerge::new(sources.into_iter().map(Vec::into_iter), |item: &(i32, char)| item.0)
                .collect();
        assert_eq!(merged, vec![(1, 'a'), (1, 'b'), (2, 'b'), (3, 'a')]);
    }

    #[test]
    fn kway_merge_size_hint_is_exact_for_vectors() {
        let merge = KWayMerge::new(vec![vec![1, 2].into_iter(), vec![3].into_iter()], |v: &i32| *v);
        assert_eq!(merge.size_hint(), (3, Some(3)));
    }
}
