use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cloud_migration_analytics::config::ConfigStore;
use cloud_migration_analytics::models::{AnalyticsResult, DeviceCounts, EstimatedSignals};
use cloud_migration_analytics::orchestrator::{
    AnalyticsOrchestrator, CancellationToken, RunOutcome, SignalSource,
};
use cloud_migration_analytics::providers::{
    CsvHistory, HistoryProvider, StaticInventory, SyntheticHistory,
};
use cloud_migration_analytics::report;
use cloud_migration_analytics::telemetry::TracingTelemetry;

#[derive(Parser)]
#[command(name = "migration-analytics")]
#[command(about = "Cloud migration velocity, confidence, and stall-risk analytics", long_about = None)]
struct Cli {
    /// Scoring configuration file (written with defaults if missing)
    #[arg(
        long,
        global = true,
        env = "MIGRATION_ANALYTICS_CONFIG",
        default_value = "scoring_config.json"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RunArgs {
    /// Devices managed on premises
    #[arg(long)]
    legacy: u64,
    /// Devices enrolled in cloud management
    #[arg(long)]
    cloud: u64,
    /// Stored enrollment history; a synthetic 90-day history is used if omitted
    #[arg(long)]
    history_csv: Option<PathBuf>,
    /// Measured readiness signals as JSON; placeholder estimates are used if omitted
    #[arg(long)]
    signals: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default scoring configuration
    InitConfig,
    /// Check that the category weights sum to 100
    ValidateConfig,
    /// Run the analytics and print a summary
    Analyze {
        #[command(flatten)]
        run: RunArgs,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the analytics and write a markdown report
    Report {
        #[command(flatten)]
        run: RunArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cloud_migration_analytics=info,migration_analytics=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let store = Arc::new(ConfigStore::new(&cli.config));

    match cli.command {
        Commands::InitConfig => {
            store
                .save(&Default::default(), None)
                .context("failed to write scoring config")?;
            println!("Default scoring config written to {}.", store.path().display());
        }
        Commands::ValidateConfig => {
            let config = store.current();
            match config.validate_weights() {
                Ok(()) => println!("Weights are valid."),
                Err(err) => anyhow::bail!("{err}"),
            }
        }
        Commands::Analyze { run, json } => {
            let Some(result) = run_analytics(&run, store).await? else {
                println!("Analytics run cancelled.");
                return Ok(());
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            println!(
                "{:.1}% enrolled, trend {}, confidence {} ({})",
                result.enrolled_pct,
                result.trend.trend_state,
                result.confidence.score,
                result.confidence.band
            );
            println!("{}", result.confidence.explanation);
            println!(
                "Stall risk {}: {}",
                result.stall_risk.risk_level, result.stall_risk.description
            );
            if let Some(next) = result.milestones.iter().find(|m| m.is_next) {
                println!("Next milestone: {}% {}", next.percentage, next.name);
            }
            match result.recommended_playbook() {
                Some(playbook) => println!("Recommended playbook: {}", playbook.name),
                None => println!("No playbook recommended."),
            }
        }
        Commands::Report { run, out } => {
            let Some(result) = run_analytics(&run, store).await? else {
                println!("Analytics run cancelled; no report written.");
                return Ok(());
            };
            std::fs::write(&out, report::build_report(&result))
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn run_analytics(
    run: &RunArgs,
    store: Arc<ConfigStore>,
) -> anyhow::Result<Option<AnalyticsResult>> {
    let counts = DeviceCounts {
        total_legacy_devices: run.legacy,
        total_cloud_devices: run.cloud,
    };
    let signals = match &run.signals {
        Some(path) => SignalSource::Supplied(load_signals(path)?),
        None => SignalSource::Placeholder,
    };

    match &run.history_csv {
        Some(path) => execute(counts, CsvHistory::new(path), signals, store).await,
        None => {
            let today = chrono::Utc::now().date_naive();
            execute(counts, SyntheticHistory::new(today), signals, store).await
        }
    }
}

async fn execute<H: HistoryProvider>(
    counts: DeviceCounts,
    history: H,
    signals: SignalSource,
    store: Arc<ConfigStore>,
) -> anyhow::Result<Option<AnalyticsResult>> {
    let orchestrator = AnalyticsOrchestrator::new(StaticInventory(counts), history, store)
        .with_signals(signals)
        .with_telemetry(Box::new(TracingTelemetry));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match orchestrator
        .compute(&cancel)
        .await
        .context("analytics run failed")?
    {
        RunOutcome::Completed(result) => Ok(Some(*result)),
        RunOutcome::Cancelled { stage } => {
            tracing::warn!("Cancelled before the {stage} stage");
            Ok(None)
        }
    }
}

fn load_signals(path: &Path) -> anyhow::Result<EstimatedSignals> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read signals from {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid signals in {}", path.display()))
}
