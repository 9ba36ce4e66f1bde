//! Directory-level orchestration.
//!
//! [`run`] drives one end-to-end job: every file in the input directory goes through the parser
//! registered for its extension into its own [`DataSet`], the datasets are combined by the
//! requested [`Operation`], and the result is written as a delimited table.
//!
//! Failures are split into two classes:
//!
//! - fatal: listing the input directory, a schema conflict while merging, an invalid grouping,
//!   writing the output. These are returned as `Err`.
//! - recorded: an unreadable or malformed source file, or a rejected row. The run carries on and
//!   every such error ends up in [`RunReport::errors`].
//!
//! If an [`IngestionObserver`] is configured in [`LoadOptions`], it sees each source as it loads:
//!
//! - `on_success` with row stats, after `on_rejected_row` for every rejected row
//! - `on_failure` with a computed severity when the source could not be loaded
//! - `on_alert` when that severity is >= [`LoadOptions::alert_at_or_above`]

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use glob::Pattern;
use log::{debug, info};
use serde::Serialize;
use thiserror::Error;
use walkdir::WalkDir;

use crate::dataset::DataSet;
use crate::error::{DatasetError, DatasetResult, RowError};
use crate::ingestion::{
    IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats, ParserRegistry,
};
use crate::processing::{concat, merge_sorted, sorted_merge_name, ReduceOp, SchemaMergeMode};
use crate::types::Schema;
use crate::writer::{write_table_to_path, TableOptions};

/// Name of the dataset produced by [`Operation::GroupBy`].
pub const GROUPED_DATASET_NAME: &str = "merged";

/// Options controlling how source files are discovered and reported.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct LoadOptions {
    /// Only load files whose name matches this pattern.
    pub include: Option<Pattern>,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn IngestionObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: IngestionSeverity,
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("include", &self.include.as_ref().map(Pattern::as_str))
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            include: None,
            observer: None,
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

/// A non-fatal error collected during a run.
#[derive(Debug, Error)]
pub enum RecordedError {
    /// A source file could not be loaded at all.
    #[error("{}: {error}", .path.display())]
    Source {
        /// The skipped file.
        path: PathBuf,
        /// Why it was skipped.
        #[source]
        error: DatasetError,
    },
    /// A row was rejected, either while loading a source or while merging.
    #[error(transparent)]
    Row(#[from] RowError),
}

impl RecordedError {
    /// The underlying dataset error.
    pub fn error(&self) -> &DatasetError {
        match self {
            Self::Source { error, .. } => error,
            Self::Row(row) => &row.error,
        }
    }
}

/// Everything [`load_sources`] produced.
#[derive(Debug, Default)]
pub struct LoadedSources {
    /// One dataset per successfully parsed file, in file-name order.
    pub datasets: Vec<DataSet>,
    /// Every file that was considered, including the ones that failed.
    pub files: Vec<PathBuf>,
    /// Skipped files and rejected rows.
    pub errors: Vec<RecordedError>,
}

/// List the regular files directly inside `dir`, sorted by file name.
///
/// With `include`, only files whose name matches the pattern are returned. A `dir` that is
/// missing or not a directory is an I/O error.
pub fn list_source_files(dir: &Path, include: Option<&Pattern>) -> DatasetResult<Vec<PathBuf>> {
    if !fs::metadata(dir)?.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotADirectory,
            format!("{} is not a directory", dir.display()),
        )
        .into());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let selected = include
            .map(|pattern| pattern.matches(&entry.file_name().to_string_lossy()))
            .unwrap_or(true);
        if selected {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Format discriminator of a source file: its extension, or `""` without one.
pub fn format_of(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Parse one file and ingest its rows into a dataset named after the file stem.
///
/// The file is closed before this returns. Rejected rows are returned next to the dataset.
pub fn ingest_source(
    path: &Path,
    registry: &ParserRegistry,
) -> DatasetResult<(DataSet, Vec<RowError>)> {
    let parser = registry.get(&format_of(path))?;
    let file = File::open(path)?;
    let parsed = parser(Box::new(BufReader::new(file)))?;

    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut dataset = DataSet::new(name, parsed.schema);
    let rejected = dataset.from_fallible_iterable(parsed.rows);
    Ok((dataset, rejected))
}

/// Load every source file in `dir`.
///
/// A file that cannot be read or parsed is recorded and skipped; only a failure to list `dir`
/// itself is returned as `Err`.
pub fn load_sources(
    dir: &Path,
    registry: &ParserRegistry,
    options: &LoadOptions,
) -> DatasetResult<LoadedSources> {
    let files = list_source_files(dir, options.include.as_ref())?;
    debug!("found {} source file(s) in {}", files.len(), dir.display());

    let mut loaded = LoadedSources::default();
    for path in &files {
        let ctx = IngestionContext {
            path: path.clone(),
            format: format_of(path),
        };
        match ingest_source(path, registry) {
            Ok((dataset, rejected)) => {
                if let Some(obs) = options.observer.as_ref() {
                    for row in &rejected {
                        obs.on_rejected_row(&ctx, row);
                    }
                    obs.on_success(
                        &ctx,
                        IngestionStats {
                            rows: dataset.row_count(),
                            rejected_rows: rejected.len(),
                        },
                    );
                }
                loaded.errors.extend(rejected.into_iter().map(RecordedError::Row));
                loaded.datasets.push(dataset);
            }
            Err(error) => {
                if let Some(obs) = options.observer.as_ref() {
                    let sev = IngestionSeverity::for_error(&error);
                    obs.on_failure(&ctx, sev, &error);
                    if sev >= options.alert_at_or_above {
                        obs.on_alert(&ctx, sev, &error);
                    }
                }
                debug!("skipping {}: {}", path.display(), error);
                loaded.errors.push(RecordedError::Source {
                    path: path.clone(),
                    error,
                });
            }
        }
    }
    loaded.files = files;
    Ok(loaded)
}

/// Which headers a group-by partitions on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupingSpec {
    /// These headers, in this order.
    Headers(Vec<String>),
    /// Every header starting with the prefix, in schema order.
    Prefix(String),
}

impl Default for GroupingSpec {
    fn default() -> Self {
        Self::Prefix("D".to_string())
    }
}

impl GroupingSpec {
    /// Resolve to concrete header names against `schema`.
    pub fn resolve(&self, schema: &Schema) -> Vec<String> {
        match self {
            Self::Headers(headers) => headers.clone(),
            Self::Prefix(prefix) => schema
                .field_names()
                .filter(|name| name.starts_with(prefix.as_str()))
                .map(str::to_string)
                .collect(),
        }
    }
}

/// The cross-dataset step of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Merge all datasets into one sorted by `keys`.
    SortedMerge {
        /// Sort-key headers, most significant first.
        keys: Vec<String>,
    },
    /// Concatenate all datasets, then group and fold.
    GroupBy {
        /// Grouping headers.
        grouping: GroupingSpec,
        /// Reducer for the non-grouping columns.
        reducer: ReduceOp,
    },
}

/// Substring replacement applied to every output header, e.g. `M` → `MS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRename {
    /// Substring to replace.
    pub from: String,
    /// Replacement.
    pub to: String,
}

impl HeaderRename {
    /// Rename the headers of `dataset`. Fails if two headers collide afterwards.
    pub fn apply(&self, dataset: &mut DataSet) -> DatasetResult<()> {
        let renamed: Vec<String> = dataset
            .headers()
            .map(|h| h.replace(&self.from, &self.to))
            .collect();
        dataset.set_headers(renamed)
    }
}

impl FromStr for HeaderRename {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((from, to)) if !from.is_empty() => Ok(Self {
                from: from.to_string(),
                to: to.to_string(),
            }),
            _ => Err(format!("expected FROM=TO with a non-empty FROM, got '{s}'")),
        }
    }
}

/// Combine `datasets` according to `operation`.
///
/// Returns the output dataset and the rows rejected while re-ingesting into it.
pub fn combine(
    mut datasets: Vec<DataSet>,
    operation: &Operation,
    mode: SchemaMergeMode,
) -> DatasetResult<(DataSet, Vec<RowError>)> {
    match operation {
        Operation::SortedMerge { keys } => {
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            merge_sorted(sorted_merge_name(&keys), &mut datasets, &keys, mode)
        }
        Operation::GroupBy { grouping, reducer } => {
            let (mut merged, errors) = concat(GROUPED_DATASET_NAME, &datasets, mode)?;
            let headers = grouping.resolve(merged.schema());
            if headers.is_empty() {
                if merged.schema().is_empty() {
                    return Ok((merged, errors));
                }
                return Err(DatasetError::argument(format!(
                    "no grouping headers resolved from {grouping:?}"
                )));
            }
            let headers: Vec<&str> = headers.iter().map(String::as_str).collect();
            let reducer = *reducer;
            merged.group_by(&headers, |acc, value| reducer.apply(acc, value))?;
            Ok((merged, errors))
        }
    }
}

/// Configuration of one [`run`].
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Directory holding the source files.
    pub input_dir: PathBuf,
    /// Output table path, created or truncated.
    pub output: PathBuf,
    /// Cross-dataset step.
    pub operation: Operation,
    /// How source schemas are merged.
    pub schema_mode: SchemaMergeMode,
    /// Optional header rename applied before writing.
    pub rename: Option<HeaderRename>,
    /// Source discovery and reporting.
    pub load: LoadOptions,
    /// Output formatting.
    pub table: TableOptions,
}

impl RunRequest {
    /// A request with default schema mode, no rename, and default load/table options.
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        operation: Operation,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            output: output.into(),
            operation,
            schema_mode: SchemaMergeMode::default(),
            rename: None,
            load: LoadOptions::default(),
            table: TableOptions::default(),
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug)]
pub struct RunReport {
    /// Every source file considered.
    pub files: Vec<PathBuf>,
    /// Number of sources that loaded into a dataset.
    pub datasets: usize,
    /// Name of the output dataset.
    pub dataset_name: String,
    /// Output table path.
    pub output: PathBuf,
    /// Data rows written (header excluded).
    pub rows_written: usize,
    /// Recorded non-fatal errors, in the order they occurred.
    pub errors: Vec<RecordedError>,
}

impl RunReport {
    /// Returns `true` if nothing was recorded.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Render the report as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> DatasetResult<String> {
        Ok(serde_json::to_string_pretty(&ReportJson::from(self))?)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Wrote {} row(s) of '{}' from {} of {} file(s) to {}",
            self.rows_written,
            self.dataset_name,
            self.datasets,
            self.files.len(),
            self.output.display()
        )?;
        if self.errors.is_empty() {
            return writeln!(f, "Done without errors.");
        }
        writeln!(f, "Some errors occurred during the run:")?;
        for error in &self.errors {
            writeln!(f, " - {error}")?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ReportJson {
    files: Vec<String>,
    datasets: usize,
    dataset_name: String,
    output: String,
    rows_written: usize,
    errors: Vec<ErrorJson>,
}

#[derive(Serialize)]
struct ErrorJson {
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dataset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    row: Option<usize>,
    message: String,
}

impl From<&RunReport> for ReportJson {
    fn from(report: &RunReport) -> Self {
        Self {
            files: report
                .files
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            datasets: report.datasets,
            dataset_name: report.dataset_name.clone(),
            output: report.output.display().to_string(),
            rows_written: report.rows_written,
            errors: report.errors.iter().map(ErrorJson::from).collect(),
        }
    }
}

impl From<&RecordedError> for ErrorJson {
    fn from(recorded: &RecordedError) -> Self {
        let kind = format!("{:?}", recorded.error().kind());
        match recorded {
            RecordedError::Source { path, error } => Self {
                kind,
                path: Some(path.display().to_string()),
                dataset: None,
                row: None,
                message: error.to_string(),
            },
            RecordedError::Row(row) => Self {
                kind,
                path: None,
                dataset: Some(row.dataset.clone()),
                row: Some(row.row),
                message: row.error.to_string(),
            },
        }
    }
}

/// Run one job: load, combine, optionally rename, write.
pub fn run(request: &RunRequest, registry: &ParserRegistry) -> DatasetResult<RunReport> {
    let LoadedSources {
        datasets,
        files,
        mut errors,
    } = load_sources(&request.input_dir, registry, &request.load)?;
    let loaded = datasets.len();
    info!(
        "loaded {} of {} source file(s) from {}",
        loaded,
        files.len(),
        request.input_dir.display()
    );

    let (mut output, rejected) = combine(datasets, &request.operation, request.schema_mode)?;
    errors.extend(rejected.into_iter().map(RecordedError::Row));

    if let Some(rename) = request.rename.as_ref() {
        rename.apply(&mut output)?;
    }
    write_table_to_path(&output, &request.output, &request.table)?;
    info!(
        "wrote {} row(s) of '{}' to {}",
        output.row_count(),
        output.name(),
        request.output.display()
    );

    Ok(RunReport {
        files,
        datasets: loaded,
        dataset_name: output.name().to_string(),
        output: request.output.clone(),
        rows_written: output.row_count(),
        errors,
    })
}
