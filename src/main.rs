//! CLI entry point for the gate occupancy sync job.
//!
//! Each invocation performs at most one aggregation run; scheduling (one run
//! per interval) and mutual exclusion between runs are left to the caller.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use gate_occupancy::config::{Config, Settings};
use gate_occupancy::fetch::BasicClient;
use gate_occupancy::fetch::auth::ApiKey;
use gate_occupancy::infra::broker::BrokerClient;
use gate_occupancy::infra::ckan::CkanClient;
use gate_occupancy::model::TIMESTAMP_FORMAT;
use gate_occupancy::output::CsvStore;
use gate_occupancy::pipeline::{AggregationEngine, RunSummary, TIME_UNIT};
use gate_occupancy::services::{EventFetcher, RecordSink, WatermarkSource};
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gate_occupancy")]
#[command(about = "Aggregates parking gate vehicle detections into CKAN", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate new broker events and write the closed buckets to CKAN
    Sync,
    /// Aggregate new broker events into a local CSV file instead of CKAN
    Export {
        /// CSV file used as both watermark source and output
        #[arg(short, long, default_value = "gate_counts.csv")]
        output: String,
    },
    /// Print the watermark the next sync would start from
    LastUpdate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/gate_occupancy.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gate_occupancy.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let config = Config::from_settings(cli.settings).context("cannot read configuration")?;
    info!(?config, "loaded configuration");

    let result = match cli.command {
        Commands::Sync => sync(&config).await,
        Commands::Export { output } => export(&config, &output).await,
        Commands::LastUpdate => last_update(&config).await,
    };

    if let Err(e) = &result {
        error!("run failed: {e:#}");
    }
    result
}

fn broker_client(config: &Config) -> Result<BrokerClient<BasicClient>> {
    let http = BasicClient::with_timeout(config.request_timeout)
        .context("cannot build broker HTTP client")?;
    BrokerClient::new(http, config.broker_url()?)
        .context("cannot instantiate context broker client")
}

fn ckan_client(config: &Config) -> Result<CkanClient<ApiKey<BasicClient>>> {
    let ckan = config.ckan()?;
    let http = BasicClient::with_timeout(config.request_timeout)
        .context("cannot build CKAN HTTP client")?;
    let http = ApiKey::authorization(http, &ckan.api_key).context("invalid CKAN API key")?;

    CkanClient::new(
        http,
        &ckan.url,
        ckan.datastore_id.clone(),
        config.write_method,
        config.window,
    )
    .context("cannot create data persistor")
}

/// One pipeline run against CKAN.
#[tracing::instrument(skip_all)]
async fn sync(config: &Config) -> Result<()> {
    let persistor = ckan_client(config)?;
    let broker = broker_client(config)?;

    let engine = AggregationEngine::new(&persistor, broker, &persistor, config.window);
    let summary = run_bounded(&engine, config.run_timeout)
        .await
        .context("cannot sync vehicles on context broker")?;

    report(&summary);
    Ok(())
}

/// One pipeline run against a local CSV store.
#[tracing::instrument(skip(config))]
async fn export(config: &Config, output: &str) -> Result<()> {
    let store = CsvStore::new(output, config.window);
    let broker = broker_client(config)?;

    let engine = AggregationEngine::new(&store, broker, &store, config.window);
    let summary = run_bounded(&engine, config.run_timeout)
        .await
        .with_context(|| format!("cannot export vehicles to {output}"))?;

    report(&summary);
    Ok(())
}

#[tracing::instrument(skip_all)]
async fn last_update(config: &Config) -> Result<()> {
    let persistor = ckan_client(config)?;
    let last = persistor
        .last_update()
        .await
        .context("cannot read last update")?;

    info!(last_update = %last, next_begin = %(last + TIME_UNIT), "Last update");
    println!("{}", last.format(TIMESTAMP_FORMAT));
    Ok(())
}

/// Runs the engine once, giving up at `deadline` or on Ctrl+C. Dropping the
/// run future aborts whichever request is in flight; nothing is written
/// unless the run got as far as its final write.
async fn run_bounded<W, F, S>(
    engine: &AggregationEngine<W, F, S>,
    deadline: Duration,
) -> Result<RunSummary>
where
    W: WatermarkSource,
    F: EventFetcher,
    S: RecordSink,
{
    tokio::select! {
        result = tokio::time::timeout(deadline, engine.execute()) => {
            let summary = result
                .with_context(|| format!("run exceeded deadline of {}s", deadline.as_secs()))??;
            Ok(summary)
        }
        _ = tokio::signal::ctrl_c() => Err(anyhow!("run cancelled")),
    }
}

fn report(summary: &RunSummary) {
    info!(
        begin = %summary.begin,
        pages = summary.pages,
        fetched = summary.fetched,
        skipped = summary.skipped,
        written = summary.written,
        withheld = summary.withheld,
        "Run finished"
    );
}
