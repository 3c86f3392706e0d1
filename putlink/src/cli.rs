///
/// This module implements the full CLI interface for putlink: command parsing,
/// argument validation, main entrypoints, and user-visible output.
///
/// All core business logic (bucket staging, analysis, dispatch, filters) lives in the [`putlink-core`] crate.
/// This module is strictly for CLI glue, ergonomic argument exposure, and orchestration.
///
/// ## Features
/// - Entry struct [`Cli`] defines all user-facing options and subcommands (see below).
/// - Async entrypoint (`run`) for programmatic invocation and integration testing.
/// - Logging, tracing, and structured error output at CLI level.
///
/// ## Extending
/// When adding subcommands, update [`Commands`] below
/// and keep all non-trivial business logic inside `putlink-core`.
///
/// [`putlink-core`]: ../../putlink-core/
/// [`Cli`]: struct.Cli.html
/// [`run`]: fn.run.html
/// [`Commands`]: enum.Commands.html
use crate::load_config::{load_config, CliConfig};
use crate::session::HttpSession;
use anyhow::Result;
use clap::{Parser, Subcommand};
use putlink_core::bucket::{Bucket, BucketReport};
use putlink_core::client::Putio;
use putlink_core::filter_list;
use putlink_core::job::{self, Job};
use putlink_core::locator::{format_bytes, Locator};
use std::path::PathBuf;
use std::sync::Arc;

/// CLI for putlink: stage links, analyze them against your quota, and dispatch downloads.
#[derive(Parser)]
#[clap(
    name = "putlink",
    version,
    about = "Stage, analyze and dispatch remote downloads on a file-hosting account"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze links and print the quota report without dispatching anything
    Analyze {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Text file to pull additional links out of
        #[clap(long)]
        from_text: Option<PathBuf>,
        /// Links to analyze
        links: Vec<String>,
    },
    /// Analyze links, then dispatch every analyzable one as a download job
    Fetch {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Text file to pull additional links out of
        #[clap(long)]
        from_text: Option<PathBuf>,
        /// Links to fetch
        links: Vec<String>,
    },
    /// List download jobs on the account
    Transfers {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Cancel download jobs by id
    Cancel {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Job ids to cancel
        #[clap(required = true)]
        ids: Vec<u64>,
    },
    /// Edit a comma-separated filter list locally
    Filters {
        #[clap(subcommand)]
        action: FilterAction,
    },
}

#[derive(Subcommand)]
pub enum FilterAction {
    /// Append keywords to a filter list
    Merge { existing: String, keywords: Vec<String> },
    /// Remove keywords from a filter list
    Remove { existing: String, keywords: Vec<String> },
}

fn connect(config: &CliConfig) -> Result<Putio<HttpSession>> {
    let session = HttpSession::from_config(config).map_err(|e| {
        tracing::error!(error = %e, "Failed to construct HTTP session");
        anyhow::Error::msg(format!("Failed to construct HTTP session: {e}"))
    })?;
    Ok(Putio::new(Arc::new(session)))
}

/// Stage configured links, text-extracted links and command-line links, then analyze.
async fn staged_and_analyzed(
    putio: &Putio<HttpSession>,
    config: &CliConfig,
    from_text: Option<PathBuf>,
    links: Vec<String>,
) -> Result<Bucket<HttpSession>> {
    let mut bucket = putio.bucket();
    bucket.add(config.bucket.links.clone());
    if let Some(path) = from_text {
        let text = std::fs::read_to_string(&path).map_err(|e| {
            tracing::error!(error = ?e, path = %path.display(), "Failed to read text file");
            anyhow::anyhow!("Failed to read text file {:?}: {}", path, e)
        })?;
        let added = bucket.extract(&text).await?;
        tracing::info!(added, path = %path.display(), "Staged links extracted from text");
    }
    bucket.analyze(Some(links)).await?;
    Ok(bucket)
}

fn bytes(value: Option<u64>) -> String {
    value.map(format_bytes).unwrap_or_else(|| "-".to_string())
}

fn print_locator(label: &str, locator: &Locator) {
    let size = locator.human_size().unwrap_or_else(|| "?".to_string());
    let name = locator.name().unwrap_or(locator.source_url());
    match locator.fault_detail() {
        Some(fault) => println!("  [{label}] {} ({fault})", locator.source_url()),
        None if locator.requires_password() => println!("  [{label}] {name} {size} (password)"),
        None => println!("  [{label}] {name} {size}"),
    }
}

fn print_report(report: &BucketReport) {
    println!("Analysis report:");
    println!("  required space:      {}", bytes(report.required_space_bytes));
    println!("  paid bandwidth:      {}", bytes(report.paid_bandwidth_bytes));
    println!("  disk available:      {}", bytes(report.disk_available_bytes));
    println!("  bandwidth available: {}", bytes(report.bandwidth_available_bytes));
    for locator in &report.partitions.single {
        print_locator("single", locator);
    }
    for locator in &report.partitions.torrent {
        print_locator("torrent", locator);
    }
    for locator in &report.partitions.multipart {
        print_locator("multipart", locator);
    }
    for locator in &report.partitions.error {
        print_locator("error", locator);
    }
}

fn print_jobs(jobs: &[Job]) {
    for job in jobs {
        let id = job
            .id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!(
            "  #{} {} [{}] {}%",
            id,
            job.display_name(),
            job.status(),
            job.percent_complete()
        );
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Analyze {
            config,
            from_text,
            links,
        } => {
            let config = load_config(config)?;
            tracing::info!(command = "analyze", links = links.len(), "Starting analysis");
            let putio = connect(&config)?;
            let bucket = staged_and_analyzed(&putio, &config, from_text, links).await?;
            print_report(&bucket.report());
            Ok(())
        }
        Commands::Fetch {
            config,
            from_text,
            links,
        } => {
            let config = load_config(config)?;
            tracing::info!(command = "fetch", links = links.len(), "Starting fetch");
            let putio = connect(&config)?;
            let bucket = staged_and_analyzed(&putio, &config, from_text, links).await?;
            print_report(&bucket.report());
            let jobs = bucket.fetch().await?;
            println!("Dispatched {} job(s):", jobs.len());
            print_jobs(&jobs);
            let failed = jobs.iter().filter(|j| j.status().is_failure()).count();
            if failed > 0 {
                tracing::warn!(command = "fetch", failed, "Some links could not be dispatched");
                eprintln!("[WARN] {failed} job(s) failed to dispatch");
            }
            Ok(())
        }
        Commands::Transfers { config } => {
            let config = load_config(config)?;
            let putio = connect(&config)?;
            let jobs = putio.jobs().await?;
            println!("{} job(s):", jobs.len());
            print_jobs(&jobs);
            Ok(())
        }
        Commands::Cancel { config, ids } => {
            let config = load_config(config)?;
            let putio = connect(&config)?;
            let mut jobs: Vec<Job> = putio
                .jobs()
                .await?
                .into_iter()
                .filter(|j| j.id().is_some_and(|id| ids.contains(&id)))
                .collect();
            let missing: Vec<u64> = ids
                .iter()
                .copied()
                .filter(|id| !jobs.iter().any(|j| j.id() == Some(*id)))
                .collect();
            if !missing.is_empty() {
                tracing::error!(command = "cancel", ?missing, "Unknown job ids");
                anyhow::bail!("Unknown job id(s): {:?}", missing);
            }
            job::destroy_all(&**putio.session(), &mut jobs).await?;
            println!("Cancelled {} job(s).", jobs.len());
            Ok(())
        }
        Commands::Filters { action } => {
            let result = match action {
                FilterAction::Merge { existing, keywords } => {
                    filter_list::merge(&existing, keywords.as_slice())
                }
                FilterAction::Remove { existing, keywords } => {
                    filter_list::remove(&existing, keywords.as_slice())
                }
            };
            println!("{result}");
            Ok(())
        }
    }
}
