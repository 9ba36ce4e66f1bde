//! XML parser.
//!
//! Expected layout, one `<objects>` element per record:
//!
//! ```xml
//! <root>
//!   <objects>
//!     <object name="D1"><value>a</value></object>
//!     <object name="M1"><value>1</value></object>
//!   </objects>
//! </root>
//! ```
//!
//! Headers come from the `name` attributes of the first record and types are inferred from its
//! value texts. An `<object>` without a `<value>` text yields [`Value::Null`].

use std::collections::HashMap;
use std::io::Read;

use roxmltree::{Document, Node};

use crate::error::{DatasetError, DatasetResult};
use crate::inference::infer_type;
use crate::types::Value;

use super::{schema_from_headers, ParsedSource, RawRow};

/// Parse an XML stream.
pub fn parse_xml(mut input: Box<dyn Read>) -> DatasetResult<ParsedSource> {
    let mut text = String::new();
    input.read_to_string(&mut text)?;
    parse_xml_str(&text)
}

/// Parse XML from an in-memory string.
pub fn parse_xml_str(input: &str) -> DatasetResult<ParsedSource> {
    let doc = Document::parse(input)?;
    let records: Vec<Vec<(Option<String>, Option<String>)>> = doc
        .root_element()
        .children()
        .filter(|n| n.has_tag_name("objects"))
        .map(read_record)
        .collect();

    let first = records
        .first()
        .ok_or_else(|| DatasetError::parse("xml document has no <objects> element"))?;
    let mut headers = Vec::with_capacity(first.len());
    let mut types = Vec::with_capacity(first.len());
    for (name, text) in first {
        let name = name
            .clone()
            .ok_or_else(|| DatasetError::parse("<object> without a name attribute"))?;
        headers.push(name);
        types.push(infer_type(text.as_deref().unwrap_or("")));
    }
    let schema = schema_from_headers(headers.iter().cloned(), types)?;

    let rows = records
        .into_iter()
        .map(move |record| Ok(record_to_row(record, &headers)));

    Ok(ParsedSource {
        schema,
        rows: Box::new(rows),
    })
}

fn read_record(objects: Node<'_, '_>) -> Vec<(Option<String>, Option<String>)> {
    objects
        .children()
        .filter(|n| n.has_tag_name("object"))
        .map(|obj| {
            let name = obj.attribute("name").map(str::to_string);
            let text = obj
                .children()
                .find(|n| n.has_tag_name("value"))
                .and_then(|v| v.text())
                .map(str::to_string);
            (name, text)
        })
        .collect()
}

fn record_to_row(record: Vec<(Option<String>, Option<String>)>, headers: &[String]) -> RawRow {
    // Later duplicates of a name win.
    let mut by_name: HashMap<String, Option<String>> = record
        .into_iter()
        .filter_map(|(name, text)| name.map(|n| (n, text)))
        .collect();
    headers
        .iter()
        .map(|h| match by_name.remove(h) {
            Some(Some(text)) => Value::Utf8(text),
            _ => Value::Null,
        })
        .collect()
}
