//! Delimited text output for [`DataSet`].

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::dataset::DataSet;
use crate::error::DatasetResult;

/// Options controlling table output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOptions {
    /// Field separator. Defaults to a tab.
    pub separator: String,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            separator: "\t".to_string(),
        }
    }
}

/// Write the header line and one line per row, every line newline-terminated.
///
/// Values use their natural text form (see [`crate::types::Value`]'s `Display`). Separators
/// inside text values are written as-is.
pub fn write_table<W: Write>(
    dataset: &DataSet,
    out: &mut W,
    options: &TableOptions,
) -> std::io::Result<()> {
    let sep = options.separator.as_str();
    write_line(out, sep, dataset.headers())?;
    for row in dataset.rows() {
        write_line(out, sep, row.iter())?;
    }
    Ok(())
}

/// Create (or truncate) `path` and write the table into it.
pub fn write_table_to_path(
    dataset: &DataSet,
    path: impl AsRef<Path>,
    options: &TableOptions,
) -> DatasetResult<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_table(dataset, &mut out, options)?;
    out.flush()?;
    Ok(())
}

fn write_line<W, I, T>(out: &mut W, sep: &str, fields: I) -> std::io::Result<()>
where
    W: Write,
    I: Iterator<Item = T>,
    T: std::fmt::Display,
{
    for (idx, field) in fields.enumerate() {
        if idx > 0 {
            out.write_all(sep.as_bytes())?;
        }
        write!(out, "{field}")?;
    }
    out.write_all(b"\n")
}
