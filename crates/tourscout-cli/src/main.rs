//! Tourscout CLI
//!
//! Command-line driver for the reconciliation pipeline:
//! - `build`: run one index build from a tour graph (plus optional feeds)
//!   and print the build report
//! - `search`: build, then run a query and print ranked results
//! - `dump`: build, then print the whole corpus in presentation order

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tourscout_feeds::FileSource;
use tourscout_index::{
    BuildOutcome, BuildReport, IndexService, SearchIndex, SimilarityEngine, StaticHost,
};
use tourscout_reconcile::{CorpusEntry, SearchConfig};

#[derive(Parser)]
#[command(name = "tourscout")]
#[command(author, version, about = "Tourscout: virtual-tour search index builder")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index once and print a build report.
    Build {
        #[command(flatten)]
        source: SourceArgs,

        /// Emit the report as JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Build the index, then run one query against it.
    Search {
        #[command(flatten)]
        source: SourceArgs,

        /// Search term; `*` lists everything.
        term: String,
    },

    /// Build the index and print every entry, grouped for display.
    Dump {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Tour scene graph file (JSON).
    #[arg(long)]
    graph: PathBuf,

    /// Pipeline configuration (JSON). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory feed file (JSON array). Enables the directory feed.
    #[arg(long)]
    directory: Option<PathBuf>,

    /// Sheet feed file (delimited text). Enables the sheet feed.
    #[arg(long)]
    sheet: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Build { source, json } => {
            let service = make_service(&source)?;
            let report = run_build(&service).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Commands::Search { source, term } => {
            let service = make_service(&source)?;
            run_build(&service).await?;
            let index = service.current().context("build produced no index")?;
            print_hits(&index, &term);
        }
        Commands::Dump { source } => {
            let service = make_service(&source)?;
            run_build(&service).await?;
            let index = service.current().context("build produced no index")?;
            print_corpus(index.entries());
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn make_service(source: &SourceArgs) -> Result<IndexService> {
    let raw = std::fs::read_to_string(&source.graph)
        .with_context(|| format!("reading graph {}", source.graph.display()))?;
    let graph = tourscout_scene::parse_scene_graph(&raw)
        .with_context(|| format!("parsing graph {}", source.graph.display()))?;

    let mut config = match &source.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str::<SearchConfig>(&raw).context("config is not valid JSON")?
        }
        None => SearchConfig::with_defaults(),
    };

    // A feed flag on the command line enables that feed outright.
    if source.directory.is_some() {
        config.directory.enabled = true;
    }
    if source.sheet.is_some() {
        config.sheet.enabled = true;
    }

    let mut service = IndexService::new(
        config,
        Arc::new(StaticHost::new(graph)),
        Arc::new(SimilarityEngine),
    );
    if let Some(path) = &source.directory {
        service = service.with_directory_source(Arc::new(FileSource::new(path)));
    }
    if let Some(path) = &source.sheet {
        service = service.with_sheet_source(Arc::new(FileSource::new(path)));
    }
    Ok(service)
}

async fn run_build(service: &IndexService) -> Result<BuildReport> {
    match service.rebuild().await {
        BuildOutcome::Built(report) => Ok(report),
        BuildOutcome::Deferred => anyhow::bail!("another build is already running"),
    }
}

fn print_report(report: &BuildReport) {
    println!("{} {}", "build".bold(), report.build_id);
    println!(
        "  {} entities, {} feed records, {} corpus entries",
        report.entities.to_string().green(),
        report.records.to_string().green(),
        report.entries.to_string().green(),
    );
    if report.diagnostics.is_empty() {
        println!("  {}", "no diagnostics".dimmed());
    } else {
        println!("  {}:", "diagnostics".yellow().bold());
        for diag in &report.diagnostics {
            println!("    {:?}: {}", diag.kind, diag.message.yellow());
        }
    }
}

fn print_hits(index: &SearchIndex, term: &str) {
    let hits = index.search(term);
    if hits.is_empty() {
        println!("{}", "no results".dimmed());
        return;
    }
    for entry in hits {
        print_entry(entry);
    }
}

fn print_corpus(entries: &[CorpusEntry]) {
    let mut current_kind = None;
    for entry in entries {
        if current_kind != Some(entry.kind) {
            current_kind = Some(entry.kind);
            println!("{}", entry.kind.display_name().bold().underline());
        }
        print_entry(entry);
    }
}

fn print_entry(entry: &CorpusEntry) {
    let mut line = format!(
        "  {} {}",
        format!("[{}]", entry.kind.display_name()).cyan(),
        entry.label.bold(),
    );
    if let Some(parent) = &entry.parent_label {
        line.push_str(&format!(" {} {}", "in".dimmed(), parent));
    }
    if !entry.subtitle.is_empty() {
        line.push_str(&format!(" {} {}", "-".dimmed(), entry.subtitle.dimmed()));
    }
    println!("{line}  {}", format!("({})", entry.origin).dimmed());
}
