use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use dataset_merge::dataset::DataSet;
use dataset_merge::ingestion::csv::{parse_csv, parse_csv_from_reader};
use dataset_merge::pipeline::ingest_source;
use dataset_merge::ingestion::ParserRegistry;
use dataset_merge::types::{DataType, Value};
use dataset_merge::{DatasetError, ErrorKind};

fn ingest(input: &str) -> (DataSet, Vec<dataset_merge::RowError>) {
    let parsed = parse_csv(Box::new(Cursor::new(input.to_string()))).unwrap();
    let mut ds = DataSet::new("inline", parsed.schema);
    let errors = ds.from_fallible_iterable(parsed.rows);
    (ds, errors)
}

#[test]
fn ingest_csv_from_path_happy_path() {
    let file = File::open("tests/fixtures/sources/csv_data_1.csv").unwrap();
    let parsed = parse_csv(Box::new(file)).unwrap();
    let mut ds = DataSet::new("csv_data_1", parsed.schema);
    assert!(ds.from_fallible_iterable(parsed.rows).is_empty());

    assert_eq!(ds.row_count(), 3);
    assert_eq!(
        ds.rows()[0],
        vec![
            Value::from("a"),
            Value::from("b"),
            Value::from("c"),
            Value::Int64(1),
            Value::Int64(2),
            Value::Int64(3),
        ]
    );
}

#[test]
fn ingest_source_names_dataset_after_file_stem() {
    let (ds, errors) = ingest_source(
        Path::new("tests/fixtures/sources/csv_data_2.csv"),
        &ParserRegistry::with_default_parsers(),
    )
    .unwrap();
    assert!(errors.is_empty());
    assert_eq!(ds.name(), "csv_data_2");
    assert_eq!(ds.schema().len(), 7);
}

#[test]
fn ingest_csv_from_custom_reader() {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b';')
        .from_reader(Cursor::new("D1;M1\nx;1.5\n".to_string()));
    let parsed = parse_csv_from_reader(rdr).unwrap();
    assert_eq!(parsed.schema.data_type_of("M1"), Some(DataType::Float64));
}

#[test]
fn ingest_csv_reports_bad_rows_and_keeps_the_rest() {
    let (ds, errors) = ingest("D1,M1,F\na,1,True\nb,abc,False\nc\nd,4,maybe\ne,5,false\n");

    assert_eq!(ds.row_count(), 2);
    assert_eq!(ds.rows()[1], vec![Value::from("e"), Value::Int64(5), Value::Bool(false)]);

    let rows: Vec<usize> = errors.iter().map(|e| e.row).collect();
    assert_eq!(rows, vec![2, 3, 4]);
    assert_eq!(errors[0].error.kind(), ErrorKind::Conversion);
    assert!(errors[0]
        .to_string()
        .contains("cannot convert value 'abc' in column #2 'M1' to Integer"));
    assert_eq!(errors[1].error.kind(), ErrorKind::Completeness);
    assert!(errors[1].to_string().contains("#2 'M1', #3 'F'"));
    assert_eq!(errors[2].error.kind(), ErrorKind::Conversion);
}

#[test]
fn ingest_csv_integer_column_accepts_integral_text_only() {
    let (ds, errors) = ingest("M1\n7\n 8 \n9.5\n");
    assert_eq!(ds.rows(), &[vec![Value::Int64(7)], vec![Value::Int64(8)]]);
    assert_eq!(errors.len(), 1);
}

#[test]
fn ingest_csv_errors_on_header_only_file() {
    let err = parse_csv(Box::new(Cursor::new("D1,M1\n".to_string()))).unwrap_err();
    assert!(matches!(err, DatasetError::Parse { .. }));
}
