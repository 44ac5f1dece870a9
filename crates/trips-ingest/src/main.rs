//! Trips Ingest - clean and load taxi trip records

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use trips_common::logging::{init_logging, LogConfig, LogLevel};
use trips_ingest::config::IngestConfig;
use trips_ingest::db::{self, DbConfig};
use trips_ingest::loader::LoadOutcome;
use trips_ingest::pipeline;
use trips_ingest::query::{self, SortColumn, SortDirection, TripFilter, TripQuery};
use trips_ingest::validator::parse_timestamp;

#[derive(Parser, Debug)]
#[command(name = "trips-ingest")]
#[command(author, version, about = "Taxi trip ingestion tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    paths: PathArgs,
}

#[derive(Args, Debug)]
struct PathArgs {
    /// Raw trip feed
    #[arg(long, global = true, env = "TRIPS_RAW_PATH")]
    raw: Option<PathBuf>,

    /// Enriched output / load input
    #[arg(long, global = true, env = "TRIPS_CLEANED_PATH")]
    cleaned: Option<PathBuf>,

    /// Reject log
    #[arg(long, global = true, env = "TRIPS_REJECT_PATH")]
    rejects: Option<PathBuf>,

    /// Rows per insert batch
    #[arg(long, global = true)]
    batch_size: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate and enrich the raw feed
    Clean,

    /// Create the trips table and indexes if missing
    Provision,

    /// Provision, then load the enriched file
    Load,

    /// Clean, provision and load
    Run,

    /// Aggregate statistics over loaded trips
    Summary {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// List loaded trips
    Trips {
        #[command(flatten)]
        filter: FilterArgs,

        /// pickup_datetime, trip_duration, fare_amount or trip_speed_km_hr
        #[arg(long, default_value = "pickup_datetime")]
        sort_by: String,

        /// ASC or DESC
        #[arg(long, default_value = "ASC")]
        sort_dir: String,

        #[arg(long, default_value_t = query::DEFAULT_LIMIT)]
        limit: i64,

        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
}

#[derive(Args, Debug)]
struct FilterArgs {
    #[arg(long)]
    vendor_id: Option<i32>,

    #[arg(long)]
    passenger_count: Option<i32>,

    #[arg(long)]
    is_rush_hour: Option<bool>,

    #[arg(long)]
    min_fare: Option<f64>,

    /// Earliest pickup, "YYYY-MM-DD HH:MM:SS"
    #[arg(long, value_parser = parse_datetime_arg)]
    start: Option<NaiveDateTime>,

    /// Latest pickup, "YYYY-MM-DD HH:MM:SS"
    #[arg(long, value_parser = parse_datetime_arg)]
    end: Option<NaiveDateTime>,

    /// Substring of trip id or pickup time
    #[arg(long)]
    search: Option<String>,
}

impl From<FilterArgs> for TripFilter {
    fn from(args: FilterArgs) -> Self {
        TripFilter {
            vendor_id: args.vendor_id,
            passenger_count: args.passenger_count,
            is_rush_hour: args.is_rush_hour,
            min_fare: args.min_fare,
            start: args.start,
            end: args.end,
            search: args.search,
        }
    }
}

fn parse_datetime_arg(text: &str) -> std::result::Result<NaiveDateTime, String> {
    parse_timestamp(text).ok_or_else(|| format!("expected YYYY-MM-DD HH:MM:SS, got '{}'", text))
}

fn ingest_config(paths: PathArgs) -> Result<IngestConfig> {
    let mut config = IngestConfig::from_env()?;
    if let Some(raw) = paths.raw {
        config.raw_path = raw;
    }
    if let Some(cleaned) = paths.cleaned {
        config.cleaned_path = cleaned;
    }
    if let Some(rejects) = paths.rejects {
        config.reject_path = rejects;
    }
    if let Some(batch_size) = paths.batch_size {
        config.batch_size = batch_size;
    }
    config.validate()?;
    Ok(config)
}

async fn connect() -> Result<sqlx::PgPool> {
    let db_config = DbConfig::from_env()?;
    db::create_pool(&db_config)
        .await
        .context("Failed to connect to the trips database")
}

async fn load(config: &IngestConfig) -> Result<()> {
    let pool = connect().await?;
    let session = pipeline::load(&pool, config).await?;
    match session.outcome {
        LoadOutcome::Completed(stats) => info!(
            inserted = stats.rows_inserted,
            ignored = stats.rows_ignored,
            "Data loaded successfully"
        ),
        LoadOutcome::Skipped(warning) => warn!(%warning, "Nothing loaded"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("trips-ingest")
        .build()
        .with_env()?;
    let _log_guard = init_logging(&log_config)?;

    let config = ingest_config(cli.paths)?;

    match cli.command {
        Command::Clean => {
            pipeline::clean(&config)?;
        },
        Command::Provision => {
            let pool = connect().await?;
            pipeline::provision(&pool, &config).await?;
        },
        Command::Load => load(&config).await?,
        Command::Run => {
            pipeline::clean(&config)?;
            load(&config).await?;
        },
        Command::Summary { filter } => {
            let pool = connect().await?;
            let summary = query::fetch_summary(&pool, &filter.into()).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        },
        Command::Trips {
            filter,
            sort_by,
            sort_dir,
            limit,
            offset,
        } => {
            let pool = connect().await?;
            let trip_query = TripQuery {
                filter: filter.into(),
                sort_by: SortColumn::parse_lenient(&sort_by),
                sort_dir: SortDirection::parse_lenient(&sort_dir),
                limit,
                offset,
            };
            let trips = query::fetch_trips(&pool, &trip_query).await?;
            println!("{}", serde_json::to_string_pretty(&trips)?);
        },
    }

    Ok(())
}
