//! Maps format discriminators (file extensions) to parser functions.

use std::collections::HashMap;
use std::io::Read;

use crate::error::{DatasetError, DatasetResult};

use super::{csv, json, xml, ParseFn, ParsedSource};

/// Explicit parser lookup table, built once and passed to whoever needs to parse.
///
/// Discriminators are matched case-insensitively and a leading `.` is ignored, so `".CSV"`,
/// `"csv"` and `"Csv"` all find the same parser.
#[derive(Debug, Clone, Default)]
pub struct ParserRegistry {
    parsers: HashMap<String, ParseFn>,
}

impl ParserRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in CSV, JSON and XML parsers.
    pub fn with_default_parsers() -> Self {
        let mut registry = Self::new();
        registry.register("csv", csv::parse_csv);
        registry.register("json", json::parse_json);
        registry.register("xml", xml::parse_xml);
        registry
    }

    /// Register `parser` for `format`, returning the parser it replaces.
    pub fn register(&mut self, format: &str, parser: ParseFn) -> Option<ParseFn> {
        self.parsers.insert(normalize(format), parser)
    }

    /// Look up the parser for `format`.
    pub fn get(&self, format: &str) -> DatasetResult<ParseFn> {
        self.parsers
            .get(&normalize(format))
            .copied()
            .ok_or_else(|| DatasetError::UnsupportedFormat {
                format: format.to_string(),
            })
    }

    /// Look up the parser for `format` and run it on `input`.
    pub fn parse(&self, format: &str, input: Box<dyn Read>) -> DatasetResult<ParsedSource> {
        let parser = self.get(format)?;
        parser(input)
    }

    /// Registered discriminators, sorted.
    pub fn formats(&self) -> Vec<&str> {
        let mut formats: Vec<&str> = self.parsers.keys().map(String::as_str).collect();
        formats.sort_unstable();
        formats
    }
}

fn normalize(format: &str) -> String {
    format.trim_start_matches('.').to_ascii_lowercase()
}
