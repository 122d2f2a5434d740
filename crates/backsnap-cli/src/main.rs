//! backsnap - scheduled backups to an S3-compatible bucket with retention cleanup.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use backsnap_core::app::{App, AppBuilder};
use backsnap_core::config::Settings;
use backsnap_core::observability::init_logging;
use backsnap_core::ports::SystemClock;
use backsnap_s3::{S3ObjectStore, S3Settings};

#[derive(Debug, Parser)]
#[command(name = "backsnap", version, about = "Scheduled backups with retention cleanup")]
struct Cli {
    /// Print the report as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run backup and cleanup every day at BACKSNAP_SCHEDULE_TIME (default)
    Run,
    /// Upload every configured source once
    Backup,
    /// Run one cleanup pass, even when cleanup is disabled
    Cleanup {
        /// Only log what would be deleted
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    let settings = Settings::from_env().context("failed to load BACKSNAP_* settings")?;
    init_logging(settings.log_format);

    if let Err(e) = dotenv {
        tracing::warn!(error = %e, "no .env file loaded, using process environment");
    }

    let store = S3ObjectStore::connect(&S3Settings::from(&settings)).await;
    let app = AppBuilder::new()
        .store(Arc::new(store))
        .clock(Arc::new(SystemClock))
        .target_dir(settings.target_dir.clone())
        .sources(settings.source_paths())
        .retention(settings.retention_config())
        .cleanup_enabled(settings.cleanup_enabled)
        .schedule(settings.trigger_time())
        .build()
        .context("failed to build app")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&app).await,
        Commands::Backup => {
            app.prepare().await.context("failed to prepare target directory")?;
            let report = app.run_backup().await;
            print_report(&report, cli.json)?;
            if report.failed > 0 {
                anyhow::bail!("{} of {} sources failed", report.failed, report.total);
            }
            Ok(())
        }
        Commands::Cleanup { dry_run } => {
            let report = app.run_cleanup(dry_run).await.context("cleanup failed")?;
            print_report(&report, cli.json)?;
            Ok(())
        }
    }
}

async fn run(app: &App) -> Result<()> {
    tracing::info!(
        sources = app.sources().len(),
        max_age_days = app.retention().max_age_days,
        "backsnap started"
    );
    app.prepare().await.context("failed to prepare target directory")?;

    app.run_scheduled(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    })
    .await;

    tracing::info!("backsnap stopped");
    Ok(())
}

fn print_report<T: Serialize + std::fmt::Debug>(report: &T, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report).context("failed to encode report")?);
    } else {
        println!("{report:#?}");
    }
    Ok(())
}
