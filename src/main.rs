use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use royalty_ledger::config::{AppConfig, CliConfig, FileConfig};
use royalty_ledger::ingestion::IngestionManager;
use royalty_ledger::notifications::{RollupNotifier, DEFAULT_EVENT_CHANNEL_CAPACITY};
use royalty_ledger::rollup::views::{
    artist_breakdown, period_series, platform_breakdown, territory_breakdown, top_artists,
    BreakdownEntry,
};
use royalty_ledger::rollup::{check_invariants, DEFAULT_TOP_ARTISTS};
use royalty_ledger::rollup_store::{RollupStore, SqliteRollupStore};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(version, about = "Royalty statement ingestion and rollups")]
struct CliArgs {
    /// Path to a TOML config file. Values in it override the flags below.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding the rollup database (royalties.db).
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Number of artists kept in the derived top-artists list.
    #[clap(long, default_value_t = DEFAULT_TOP_ARTISTS)]
    pub top_artists_count: usize,

    /// Log batches without their rollup. Saves space, but the accumulated
    /// rollup can no longer be rebuilt from the log.
    #[clap(long)]
    pub no_batch_history: bool,

    /// How many times an ingestion is re-merged after a concurrent writer
    /// moved the accumulated rollup.
    #[clap(long, default_value_t = 3)]
    pub max_conflict_retries: u32,

    /// Print results as JSON.
    #[clap(long)]
    pub json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingests one or more statement files, merging each into the accumulated rollup.
    Ingest {
        #[clap(required = true, value_parser = parse_path)]
        files: Vec<PathBuf>,

        /// Release date (YYYY-MM-DD) attached to every row of the ingested files.
        #[clap(long)]
        release_date: Option<String>,
    },

    /// Shows the artists with the highest revenue.
    TopArtists {
        #[clap(long)]
        limit: Option<usize>,
    },

    /// Shows revenue per platform with its share of the total.
    Platforms,

    /// Shows revenue per territory with its share of the total.
    Territories,

    /// Shows revenue per period, oldest first.
    Periods,

    /// Shows one artist's tracks, platforms, territories and periods.
    Artist { name: String },

    /// Lists ingested statements, newest first.
    Batches {
        #[clap(long, default_value_t = 20)]
        limit: usize,
    },

    /// Recomputes the accumulated rollup from the batch log.
    Rebuild,

    /// Checks that every stored sum agrees with its parts.
    Verify,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_dir: self.db_dir.clone(),
            top_artists_count: self.top_artists_count,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            keep_batch_history: !self.no_batch_history,
            max_conflict_retries: self.max_conflict_retries,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_breakdown(title: &str, entries: &[BreakdownEntry]) {
    println!("{}", title);
    for entry in entries {
        println!("  {:<32} {:>16} {:>8}%", entry.name, entry.revenue, entry.percent);
    }
}

async fn run_ingest(
    manager: &IngestionManager,
    files: &[PathBuf],
    release_date: Option<&str>,
    json: bool,
) -> Result<()> {
    let mut reports = Vec::new();
    let mut failures = 0;
    for path in files {
        match manager.ingest_file(path, release_date).await {
            Ok(report) => {
                if !json {
                    println!(
                        "{}: batch {} | {} rows, {} skipped, {} unparseable numbers | revenue {} | revision {}",
                        report.source_filename,
                        report.batch_id,
                        report.rows_ingested,
                        report.rows_skipped,
                        report.unparseable_numbers,
                        report.batch_revenue,
                        report.revision
                    );
                }
                reports.push(report);
            }
            Err(e) => {
                error!("Failed to ingest {:?}: {}", path, e);
                failures += 1;
            }
        }
    }
    if json {
        print_json(&reports)?;
    }
    if failures > 0 {
        bail!("{} of {} statements failed to ingest", failures, files.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Opening rollup database at {:?}...", config.rollup_db_path());
    let store: Arc<dyn RollupStore> = Arc::new(
        SqliteRollupStore::new(config.rollup_db_path())?
            .with_batch_history(config.keep_batch_history),
    );
    let manager = IngestionManager::new(
        store.clone(),
        RollupNotifier::new(config.event_channel_capacity),
        config.ingestion_config(),
    );
    let json = cli_args.json;

    match cli_args.command {
        Command::Ingest {
            files,
            release_date,
        } => run_ingest(&manager, &files, release_date.as_deref(), json).await?,
        Command::TopArtists { limit } => {
            let accumulated = manager.accumulated()?;
            let top = top_artists(&accumulated.rollup, limit.unwrap_or(config.top_artists_count));
            if json {
                print_json(&top)?;
            } else {
                for (rank, artist) in top.iter().enumerate() {
                    println!(
                        "{:>3}. {:<32} {:>16} {:>12} streams",
                        rank + 1,
                        artist.name,
                        artist.revenue,
                        artist.streams
                    );
                }
            }
        }
        Command::Platforms => {
            let entries = platform_breakdown(&manager.accumulated()?.rollup);
            if json {
                print_json(&entries)?;
            } else {
                print_breakdown("Platforms", &entries);
            }
        }
        Command::Territories => {
            let entries = territory_breakdown(&manager.accumulated()?.rollup);
            if json {
                print_json(&entries)?;
            } else {
                print_breakdown("Territories", &entries);
            }
        }
        Command::Periods => {
            let series = period_series(&manager.accumulated()?.rollup);
            if json {
                print_json(&series)?;
            } else {
                for point in series {
                    println!("  {:<16} {:>16}", point.period, point.revenue);
                }
            }
        }
        Command::Artist { name } => {
            let accumulated = manager.accumulated()?;
            let Some(breakdown) = artist_breakdown(&accumulated.rollup, &name) else {
                bail!("No artist named {:?} in the accumulated rollup", name);
            };
            if json {
                print_json(&breakdown)?;
            } else {
                println!(
                    "{}: revenue {} ({}% of total), {} streams",
                    breakdown.name, breakdown.revenue, breakdown.percent_of_total, breakdown.streams
                );
                println!("Tracks");
                for track in &breakdown.tracks {
                    println!(
                        "  {:<32} {:<16} {:>16} {:>8}%",
                        track.name,
                        track.isrc.as_deref().unwrap_or("-"),
                        track.revenue,
                        track.percent
                    );
                }
                print_breakdown("Platforms", &breakdown.platforms);
                print_breakdown("Territories", &breakdown.territories);
            }
        }
        Command::Batches { limit } => {
            let batches = store.list_batches(limit)?;
            if json {
                print_json(&batches)?;
            } else {
                for batch in &batches {
                    let ingested_at = chrono::DateTime::from_timestamp_millis(batch.ingested_at)
                        .map(|dt| dt.to_rfc3339())
                        .unwrap_or_else(|| batch.ingested_at.to_string());
                    println!(
                        "{} {} {:<32} {:>8} rows {:>16}{}",
                        batch.batch_id,
                        ingested_at,
                        batch.source_filename,
                        batch.row_count,
                        batch.total_revenue,
                        if batch.has_rollup { "" } else { " (summary only)" }
                    );
                }
            }
        }
        Command::Rebuild => {
            let report = manager.rebuild_from_log().await?;
            if json {
                print_json(&report)?;
            } else {
                println!(
                    "Rebuilt from {} batches: revenue {}, {} streams (revision {})",
                    report.batch_count, report.total_revenue, report.total_streams, report.revision
                );
            }
        }
        Command::Verify => {
            let accumulated = manager.accumulated()?;
            let violations = check_invariants(&accumulated.rollup);
            for violation in &violations {
                error!("{}", violation);
            }
            if !violations.is_empty() {
                bail!(
                    "Accumulated rollup at revision {} has {} inconsistencies",
                    accumulated.revision,
                    violations.len()
                );
            }
            println!(
                "Accumulated rollup at revision {} is consistent",
                accumulated.revision
            );
        }
    }

    Ok(())
}
