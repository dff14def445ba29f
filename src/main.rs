use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sla_analyzer::api::{build_router, state::AppState};
use sla_analyzer::calculate::{
    count_by_group, filter_vendors, overall_means, trend_over_period, Density, VendorSelection,
};
use sla_analyzer::config::AppConfig;
use sla_analyzer::duration::{
    format_clock, format_compact, format_duration, parse_duration_str, seconds_to_days,
};
use sla_analyzer::ingest::{load_table, PeriodRange};
use sla_analyzer::storage::{Dataset, StorageConfig, TableFormat};
use sla_analyzer::{CountTable, GroupKey};

#[derive(Parser)]
#[command(name = "sla-analyzer")]
#[command(about = "SLA payment analyzer for billing-document timing records")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Data directory path (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Bind address
        #[arg(long)]
        host: Option<String>,

        /// Port number
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print KPI, count and trend tables for a local file
    Summary {
        /// CSV, Parquet or JSON table
        #[arg(long)]
        file: PathBuf,

        /// First period to include
        #[arg(long)]
        from: Option<String>,

        /// Last period to include
        #[arg(long)]
        to: Option<String>,

        /// Comma-separated vendors to keep
        #[arg(long)]
        vendors: Option<String>,

        /// Include periods without records in the trend
        #[arg(long)]
        dense: bool,

        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Place a local file into the upload cache
    Import {
        #[arg(long)]
        file: PathBuf,
    },

    /// Show how raw duration strings are parsed and formatted
    ParseDuration {
        /// Raw cell values, e.g. "2 days 03:45:30"
        #[arg(required = true)]
        values: Vec<String>,
    },
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?
        .with_env_overrides();
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let (plain, json) = if json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .init();
}

/// Period count table; the synthetic TOTAL row sits below a rule.
fn count_lines(counts: &CountTable) -> Vec<String> {
    let mut lines = vec![format!("{:<28} {:>8}", "Period", "Rows")];
    for row in counts.rows() {
        if row.is_total {
            lines.push("-".repeat(37));
        }
        lines.push(format!("{:<28} {:>8}", row.key, row.count));
    }
    lines
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config.log_level, cli.json_logs);

    tracing::info!("Starting sla-analyzer v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if !config.auth.uploads_enabled() {
                tracing::warn!("No admin password configured; uploads are disabled");
            }

            let addr = format!("{}:{}", config.server.host, config.server.port);
            let state = AppState::from_cache(config)?;
            let app = build_router(state);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Dashboard API: http://{}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Summary {
            file,
            from,
            to,
            vendors,
            dense,
            json,
        } => {
            let dataset = Dataset::from_path(&file)?;
            let range = PeriodRange::new(from, to);
            let table = load_table(&dataset.table, &config.columns, &range)?;
            let selection = vendors
                .as_deref()
                .map(VendorSelection::parse)
                .unwrap_or_default();
            let table = filter_vendors(&table, &selection);
            let density = if dense { Density::Dense } else { Density::Sparse };

            let means = overall_means(&table, &table.stages);
            let counts = count_by_group(&table, GroupKey::Period);
            let trend = trend_over_period(&table, &table.periods, &table.stages, density);

            if json {
                let report = serde_json::json!({
                    "fingerprint": dataset.fingerprint,
                    "records": table.len(),
                    "periods": table.periods.periods(),
                    "means": means,
                    "counts": counts.rows(),
                    "trend": trend,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            println!("\n=== {} ({} records) ===", file.display(), table.len());
            println!(
                "Periods: {} .. {}",
                table.periods.first().unwrap_or("-"),
                table.periods.last().unwrap_or("-")
            );

            println!("\n{:<28} {:>10} {:>8}  Mean", "Stage", "Days", "Values");
            for m in &means {
                let days = seconds_to_days(m.mean_seconds)
                    .map(|d| format!("{:.2}", d))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<28} {:>10} {:>8}  {}",
                    m.stage,
                    days,
                    m.count,
                    format_duration(m.mean_seconds)
                );
            }

            println!();
            for line in count_lines(&counts) {
                println!("{}", line);
            }

            println!("\nTrend");
            for point in &trend {
                let cells: Vec<String> = point
                    .stages
                    .iter()
                    .map(|s| format!("{}={}", s.stage, format_compact(s.mean_seconds)))
                    .collect();
                println!("  {:<26} {}", point.key, cells.join("  "));
            }
        }
        Commands::Import { file } => {
            let format = TableFormat::from_path(&file)?;
            let bytes =
                std::fs::read(&file).with_context(|| format!("Failed to read {:?}", file))?;
            let dataset = Dataset::from_bytes(&bytes, format)?;
            let table = load_table(&dataset.table, &config.columns, &PeriodRange::all())?;

            let storage = StorageConfig::new(config.data_dir.clone());
            let path = storage.write_upload(&bytes, &dataset)?;

            println!("\n=== Import ===");
            println!("Fingerprint: {}", dataset.fingerprint);
            println!("Rows:        {}", dataset.table.len());
            println!("Stages:      {}", table.stages.join(", "));
            println!("Periods:     {}", table.periods.len());
            println!("Cached at:   {}", path.display());
        }
        Commands::ParseDuration { values } => {
            for value in &values {
                match parse_duration_str(value) {
                    Some(seconds) => println!(
                        "{:?} -> {} s | {} | {}",
                        value,
                        seconds,
                        format_clock(seconds),
                        format_duration(Some(seconds as f64))
                    ),
                    None => println!("{:?} -> unreadable", value),
                }
            }
        }
    }

    Ok(())
}
