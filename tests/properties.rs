use std::collections::BTreeMap;

use dataset_merge::dataset::DataSet;
use dataset_merge::processing::{merge_schemas, KWayMerge, ReduceOp, SchemaMergeMode};
use dataset_merge::types::{DataType, Field, Schema, Value};
use dataset_merge::ErrorKind;
use proptest::prelude::*;

fn data_type() -> impl Strategy<Value = DataType> {
    prop_oneof![
        Just(DataType::Int64),
        Just(DataType::Float64),
        Just(DataType::Bool),
        Just(DataType::Utf8),
    ]
}

fn empty_dataset(name: &str, fields: &BTreeMap<String, DataType>) -> DataSet {
    let fields = fields
        .iter()
        .map(|(name, data_type)| Field::new(name.clone(), *data_type))
        .collect();
    DataSet::new(name, Schema::try_new(fields).unwrap())
}

fn shared_conflict(a: &BTreeMap<String, DataType>, b: &BTreeMap<String, DataType>) -> bool {
    a.iter()
        .any(|(name, left)| b.get(name).is_some_and(|right| right != left))
}

proptest! {
    #[test]
    fn add_row_round_trips_typed_values(
        rows in proptest::collection::vec(
            (any::<i64>(), -1.0e12f64..1.0e12, any::<bool>(), "[ -~]{0,12}"),
            1..20,
        )
    ) {
        let mut ds = DataSet::new("t", Schema::try_new(vec![
            Field::new("I", DataType::Int64),
            Field::new("F", DataType::Float64),
            Field::new("B", DataType::Bool),
            Field::new("S", DataType::Utf8),
        ]).unwrap());
        let input: Vec<Vec<Value>> = rows
            .iter()
            .map(|(i, f, b, s)| {
                vec![Value::Int64(*i), Value::Float64(*f), Value::Bool(*b), Value::from(s.as_str())]
            })
            .collect();
        let errors = ds.from_iterable(input.clone());
        prop_assert!(errors.is_empty());
        prop_assert_eq!(ds.rows(), input.as_slice());
    }

    #[test]
    fn integer_text_round_trips(values in proptest::collection::vec(any::<i64>(), 1..20)) {
        let schema = Schema::try_new(vec![Field::new("I", DataType::Int64)]).unwrap();
        let mut ds = DataSet::new("t", schema);
        let errors = ds.from_iterable(values.iter().map(|v| vec![Value::from(v.to_string())]));
        prop_assert!(errors.is_empty());
        let stored: Vec<Value> = ds.rows().iter().map(|row| row[0].clone()).collect();
        let expected: Vec<Value> = values.into_iter().map(Value::Int64).collect();
        prop_assert_eq!(stored, expected);
    }

    #[test]
    fn intersection_is_commutative_and_conflicts_on_type_mismatch(
        a in proptest::collection::btree_map("[A-F]", data_type(), 0..6),
        b in proptest::collection::btree_map("[A-F]", data_type(), 0..6),
    ) {
        let left = empty_dataset("a", &a);
        let right = empty_dataset("b", &b);
        let ab = merge_schemas(&[left.clone(), right.clone()], SchemaMergeMode::Intersection);
        let ba = merge_schemas(&[right, left], SchemaMergeMode::Intersection);

        if shared_conflict(&a, &b) {
            prop_assert_eq!(ab.unwrap_err().kind(), ErrorKind::SchemaConflict);
            prop_assert_eq!(ba.unwrap_err().kind(), ErrorKind::SchemaConflict);
        } else {
            let ab = ab.unwrap();
            prop_assert_eq!(&ab, &ba.unwrap());
            let expected: Vec<&str> = a
                .keys()
                .filter(|k| b.contains_key(*k))
                .map(String::as_str)
                .collect();
            prop_assert_eq!(ab.field_names().collect::<Vec<_>>(), expected);
        }
    }

    #[test]
    fn k_way_merge_equals_stable_sort_of_concatenation(
        sources in proptest::collection::vec(
            proptest::collection::vec(-5i64..5, 0..12),
            0..6,
        )
    ) {
        let tagged: Vec<Vec<(i64, usize, usize)>> = sources
            .iter()
            .enumerate()
            .map(|(src, keys)| {
                let mut items: Vec<(i64, usize, usize)> = keys
                    .iter()
                    .enumerate()
                    .map(|(pos, key)| (*key, src, pos))
                    .collect();
                items.sort_by_key(|item| item.0);
                items
            })
            .collect();

        let mut expected: Vec<(i64, usize, usize)> = tagged.iter().flatten().copied().collect();
        expected.sort_by_key(|item| item.0);

        let merged: Vec<(i64, usize, usize)> = KWayMerge::new(
            tagged.into_iter().map(Vec::into_iter),
            |item: &(i64, usize, usize)| item.0,
        )
        .collect();
        prop_assert_eq!(merged, expected);
    }

    #[test]
    fn group_by_left_folds_in_row_order(
        rows in proptest::collection::vec((0i64..4, "[a-z]{0,3}", -100i64..100), 1..30)
    ) {
        let mut ds = DataSet::new("t", Schema::try_new(vec![
            Field::new("K", DataType::Int64),
            Field::new("T", DataType::Utf8),
            Field::new("N", DataType::Int64),
        ]).unwrap());
        let errors = ds.from_iterable(
            rows.iter()
                .map(|(k, t, n)| vec![Value::Int64(*k), Value::from(t.as_str()), Value::Int64(*n)]),
        );
        prop_assert!(errors.is_empty());
        ds.group_by(&["K"], |acc, v| ReduceOp::Sum.apply(acc, v)).unwrap();

        let mut order: Vec<i64> = Vec::new();
        let mut folded: BTreeMap<i64, (String, i64)> = BTreeMap::new();
        for (k, t, n) in &rows {
            match folded.get_mut(k) {
                Some((text, sum)) => {
                    text.push_str(t);
                    *sum += n;
                }
                None => {
                    order.push(*k);
                    folded.insert(*k, (t.clone(), *n));
                }
            }
        }
        let expected: Vec<Vec<Value>> = order
            .iter()
            .map(|k| {
                let (text, sum) = &folded[k];
                vec![Value::Int64(*k), Value::Int64(*sum), Value::from(text.as_str())]
            })
            .collect();
        prop_assert_eq!(ds.headers().collect::<Vec<_>>(), vec!["K", "N", "T"]);
        prop_assert_eq!(ds.rows(), expected.as_slice());
    }
}

#[test]
fn union_with_default_fill_scenario() {
    let mut a = DataSet::new("a", Schema::try_new(vec![
        Field::new("D1", DataType::Utf8),
        Field::new("M1", DataType::Int64),
    ]).unwrap());
    assert!(a.from_iterable(vec![vec![Value::from("x"), Value::from("1")]]).is_empty());
    let mut b = DataSet::new("b", Schema::try_new(vec![
        Field::new("D1", DataType::Utf8),
        Field::new("M2", DataType::Float64),
    ]).unwrap());
    assert!(b.from_iterable(vec![vec![Value::from("y"), Value::from("2.5")]]).is_empty());

    let (merged, errors) =
        dataset_merge::processing::concat("u", &[a, b], SchemaMergeMode::Union).unwrap();
    assert!(errors.is_empty());
    assert_eq!(merged.headers().collect::<Vec<_>>(), vec!["D1", "M1", "M2"]);
    assert_eq!(
        merged.rows(),
        &[
            vec![Value::from("x"), Value::Int64(1), Value::Float64(0.0)],
            vec![Value::from("y"), Value::Int64(0), Value::Float64(2.5)],
        ]
    );
}
