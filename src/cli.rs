use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::{env, fs};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use glob::Pattern;
use log::{LevelFilter, debug};

use crate::ingestion::{
    CompositeObserver, FileObserver, IngestionObserver, LogObserver, ParserRegistry,
};
use crate::pipeline::{
    self, GroupingSpec, HeaderRename, LoadOptions, Operation, RunReport, RunRequest,
};
use crate::processing::{ReduceOp, SchemaMergeMode};
use crate::writer::TableOptions;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Merge a directory of CSV, JSON and XML files into one table",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Merge all sources into one table sorted by key headers
    Sort(SortArgs),
    /// Concatenate all sources, then group rows and fold the remaining columns
    Group(GroupArgs),
}

#[derive(Debug, Args)]
pub struct CommonArgs {
    /// Output table file (created or truncated)
    pub output: PathBuf,
    /// Directory holding the source files
    pub input_dir: PathBuf,
    /// Output field separator (supports 'tab', '\t', or any literal string)
    #[arg(long, default_value = "tab", value_parser = parse_separator)]
    pub separator: String,
    /// How source schemas are merged: intersection or union
    #[arg(long = "schema-mode", default_value = "intersection")]
    pub schema_mode: SchemaMergeMode,
    /// Only load source files whose name matches this glob, e.g. '*.csv'
    #[arg(long)]
    pub include: Option<Pattern>,
    /// Also write the run report as JSON to this path
    #[arg(long = "report-json")]
    pub report_json: Option<PathBuf>,
    /// Append per-source ingestion events to this log file
    #[arg(long = "event-log")]
    pub event_log: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct SortArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Sort-key header, most significant first (repeatable)
    #[arg(long = "key", default_value = "D1", action = clap::ArgAction::Append)]
    pub keys: Vec<String>,
}

#[derive(Debug, Args)]
pub struct GroupArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Grouping header (repeatable); overrides --prefix
    #[arg(long = "by", action = clap::ArgAction::Append)]
    pub by: Vec<String>,
    /// Group by every header starting with this prefix when --by is absent
    #[arg(long, default_value = "D")]
    pub prefix: String,
    /// Reducer for non-grouping columns: sum, min, max, first or last
    #[arg(long, default_value = "sum")]
    pub reducer: ReduceOp,
    /// Rename output headers by substring replacement, e.g. 'M=MS'
    #[arg(long = "rename-headers")]
    pub rename_headers: Option<HeaderRename>,
}

/// Accept `tab` and the two-character escape `\t` as a tab; anything else is used verbatim.
pub fn parse_separator(value: &str) -> Result<String, String> {
    match value {
        "" => Err("separator must not be empty".to_string()),
        "tab" | "\\t" => Ok("\t".to_string()),
        other => Ok(other.to_string()),
    }
}

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("dataset_merge", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let (common, operation, rename) = match cli.command {
        Commands::Sort(args) => (args.common, Operation::SortedMerge { keys: args.keys }, None),
        Commands::Group(args) => {
            let grouping = if args.by.is_empty() {
                GroupingSpec::Prefix(args.prefix)
            } else {
                GroupingSpec::Headers(args.by)
            };
            let operation = Operation::GroupBy {
                grouping,
                reducer: args.reducer,
            };
            (args.common, operation, args.rename_headers)
        }
    };
    execute(common, operation, rename)
}

fn execute(common: CommonArgs, operation: Operation, rename: Option<HeaderRename>) -> Result<()> {
    let request = build_request(&common, operation, rename);
    debug!("Run request: {request:?}");
    let registry = ParserRegistry::with_default_parsers();

    let report = pipeline::run(&request, &registry).with_context(|| {
        format!(
            "Merging sources from {:?} into {:?}",
            request.input_dir, request.output
        )
    })?;
    print_report(&request, &report);

    if let Some(path) = common.report_json.as_ref() {
        let json = report
            .to_json_pretty()
            .context("Serializing the run report")?;
        fs::write(path, json).with_context(|| format!("Writing run report to {path:?}"))?;
    }
    Ok(())
}

fn build_request(
    common: &CommonArgs,
    operation: Operation,
    rename: Option<HeaderRename>,
) -> RunRequest {
    let mut observers: Vec<Arc<dyn IngestionObserver>> = vec![Arc::new(LogObserver)];
    if let Some(path) = common.event_log.as_ref() {
        observers.push(Arc::new(FileObserver::new(path)));
    }
    RunRequest {
        input_dir: common.input_dir.clone(),
        output: common.output.clone(),
        operation,
        schema_mode: common.schema_mode,
        rename,
        load: LoadOptions {
            include: common.include.clone(),
            observer: Some(Arc::new(CompositeObserver::new(observers))),
            ..LoadOptions::default()
        },
        table: TableOptions {
            separator: common.separator.clone(),
        },
    }
}

fn print_report(request: &RunRequest, report: &RunReport) {
    println!("Sources in {}:", request.input_dir.display());
    for file in &report.files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());
        println!(" - {name}");
    }
    print!("{report}");
}
