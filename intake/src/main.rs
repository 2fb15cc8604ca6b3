mod config;

use clap::{Parser, Subcommand};
use config::{Config, ConfigError, StoreBackend};
use metrics_exporter_statsd::StatsdBuilder;
use normalizer::{DeliveryQueue, Normalizer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use store::{
    FilesystemStore, LandingStore, MemoryStore, ObjectStore, ProcessedStore, Quarantine,
    TransportCodec,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "intake", about = "Document ingestion pipeline")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the ingress gateway and the normalization workers
    Serve {
        #[arg(long)]
        config: PathBuf,
    },
    /// Validate a configuration file and exit
    CheckConfig {
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(thiserror::Error, Debug)]
enum StartError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("metrics exporter error: {0}")]
    Metrics(String),
    #[error("gateway error: {0}")]
    Gateway(#[from] gateway::GatewayError),
    #[error("runtime error: {0}")]
    Io(#[from] std::io::Error),
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        CliCommand::Serve { config } => {
            if let Err(err) = serve(&config) {
                eprintln!("intake: {err}");
                std::process::exit(1);
            }
        }
        CliCommand::CheckConfig { config } => match Config::from_file(&config) {
            Ok(_) => println!("configuration OK"),
            Err(err) => {
                eprintln!("intake: {err}");
                std::process::exit(1);
            }
        },
    }
}

fn serve(config_path: &Path) -> Result<(), StartError> {
    let config = Config::from_file(config_path)?;

    // The guard flushes pending events on drop; keep it for the whole run.
    let _sentry_guard = init_logging(&config);
    init_metrics(&config)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(config))
}

fn init_logging(config: &Config) -> Option<sentry::ClientInitGuard> {
    let guard = config.common.logging.as_ref().map(|logging| {
        sentry::init((
            logging.sentry_dsn.clone(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry::integrations::tracing::layer())
        .init();

    guard
}

fn init_metrics(config: &Config) -> Result<(), StartError> {
    let Some(metrics_config) = &config.common.metrics else {
        return Ok(());
    };

    let recorder = StatsdBuilder::from(&metrics_config.statsd_host, metrics_config.statsd_port)
        .with_queue_size(5000)
        .with_buffer_size(1024)
        .build(Some("intake"))
        .map_err(|err| StartError::Metrics(err.to_string()))?;
    metrics::set_global_recorder(recorder)
        .map_err(|err| StartError::Metrics(err.to_string()))?;

    Ok(())
}

async fn run(config: Config) -> Result<(), StartError> {
    let (landing_backing, processed_backing, quarantine_backing) = build_backings(&config.store);

    let landing = LandingStore::new(
        landing_backing,
        TransportCodec::new(config.gateway.encoding),
    );
    let processed = ProcessedStore::new(processed_backing);
    let quarantine = Quarantine::new(quarantine_backing);

    let (handle, queue) = DeliveryQueue::bounded(config.normalizer.queue_capacity);
    let normalizer = Normalizer::new(
        config.normalizer.clone(),
        landing.clone(),
        processed,
        quarantine,
        queue,
        handle.clone(),
    );
    let workers = tokio::spawn(normalizer.run());

    tracing::info!("starting ingress gateway");
    let result = gateway::run(config.gateway, landing, Arc::new(handle)).await;

    workers.abort();
    Ok(result?)
}

fn build_backings(
    backend: &StoreBackend,
) -> (Arc<dyn ObjectStore>, Arc<dyn ObjectStore>, Arc<dyn ObjectStore>) {
    match backend {
        StoreBackend::Filesystem { root } => (
            Arc::new(FilesystemStore::new(root.join("landing"))),
            Arc::new(FilesystemStore::new(root.join("processed"))),
            Arc::new(FilesystemStore::new(root.join("quarantine"))),
        ),
        StoreBackend::Memory => (
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        ),
    }
}
