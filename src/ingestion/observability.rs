use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{error, info, warn};

use crate::error::{DatasetError, ErrorKind, RowError};

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IngestionSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (a row was rejected, the source still loaded).
    Warning,
    /// Error-level event (the source was skipped).
    Error,
    /// Critical error (I/O failures).
    Critical,
}

impl IngestionSeverity {
    /// Severity of a failure that made a whole source unusable.
    pub fn for_error(error: &DatasetError) -> Self {
        match error.kind() {
            ErrorKind::Io => Self::Critical,
            ErrorKind::Completeness | ErrorKind::Conversion | ErrorKind::Argument => {
                Self::Warning
            }
            ErrorKind::Parse | ErrorKind::UnsupportedFormat | ErrorKind::SchemaConflict => {
                Self::Error
            }
        }
    }
}

/// Context about one source file.
#[derive(Debug, Clone)]
pub struct IngestionContext {
    /// The source path.
    pub path: PathBuf,
    /// Format discriminator used to pick the parser.
    pub format: String,
}

/// Stats reported when a source was loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionStats {
    /// Rows stored in the dataset.
    pub rows: usize,
    /// Rows rejected during ingestion.
    pub rejected_rows: usize,
}

/// Observer interface for ingestion outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait IngestionObserver: Send + Sync {
    /// Called when a source was parsed and ingested (possibly with rejected rows).
    fn on_success(&self, _ctx: &IngestionContext, _stats: IngestionStats) {}

    /// Called for every row rejected while ingesting a source.
    fn on_rejected_row(&self, _ctx: &IngestionContext, _error: &RowError) {}

    /// Called when a source could not be loaded at all.
    fn on_failure(
        &self,
        _ctx: &IngestionContext,
        _severity: IngestionSeverity,
        _error: &DatasetError,
    ) {
    }

    /// Called when a source failure meets an alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &DatasetError) {
        self.on_failure(ctx, severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn IngestionObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn IngestionObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl IngestionObserver for CompositeObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_rejected_row(&self, ctx: &IngestionContext, error: &RowError) {
        for o in &self.observers {
            o.on_rejected_row(ctx, error);
        }
    }

    fn on_failure(
        &self,
        ctx: &IngestionContext,
        severity: IngestionSeverity,
        error: &DatasetError,
    ) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &DatasetError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Forwards ingestion events to the `log` facade.
#[derive(Debug, Default)]
pub struct LogObserver;

impl IngestionObserver for LogObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        info!(
            "[ingest][ok] format={} path={} rows={} rejected={}",
            ctx.format,
            ctx.path.display(),
            stats.rows,
            stats.rejected_rows
        );
    }

    fn on_rejected_row(&self, ctx: &IngestionContext, error: &RowError) {
        warn!("[ingest][row] path={} err={}", ctx.path.display(), error);
    }

    fn on_failure(
        &self,
        ctx: &IngestionContext,
        severity: IngestionSeverity,
        error: &DatasetError,
    ) {
        warn!(
            "[ingest][{:?}] format={} path={} err={}",
            severity,
            ctx.format,
            ctx.path.display(),
            error
        );
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &DatasetError) {
        error!(
            "[ALERT][ingest][{:?}] format={} path={} err={}",
            severity,
            ctx.format,
            ctx.path.display(),
            error
        );
    }
}

/// Appends ingestion events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl IngestionObserver for FileObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        self.append_line(&format!(
            "{} ok format={} path={} rows={} rejected={}",
            unix_ts(),
            ctx.format,
            ctx.path.display(),
            stats.rows,
            stats.rejected_rows
        ));
    }

    fn on_rejected_row(&self, ctx: &IngestionContext, error: &RowError) {
        self.append_line(&format!(
            "{} row path={} err={}",
            unix_ts(),
            ctx.path.display(),
            error
        ));
    }

    fn on_failure(
        &self,
        ctx: &IngestionContext,
        severity: IngestionSeverity,
        error: &DatasetError,
    ) {
        self.append_line(&format!(
            "{} fail severity={:?} format={} path={} err={}",
            unix_ts(),
            severity,
            ctx.format,
            ctx.path.display(),
            error
        ));
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &DatasetError) {
        self.append_line(&format!(
            "{} ALERT severity={:?} format={} path={} err={}",
            unix_ts(),
            severity,
            ctx.format,
            ctx.path.display(),
            error
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
