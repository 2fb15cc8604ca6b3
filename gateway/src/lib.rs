pub mod auth;
pub mod config;
pub mod errors;
pub mod metrics_defs;
pub mod response;
pub mod routes;
pub mod service;
pub mod tables;

pub use config::Config;
pub use errors::GatewayError;
pub use service::{GatewayService, IngestGateway};

use shared::http::run_http_service;
use std::sync::Arc;
use store::{LandingStore, NoticeSink};

/// Build the gateway from its validated configuration and serve it until
/// the listener fails.
pub async fn run(
    config: Config,
    landing: LandingStore,
    sink: Arc<dyn NoticeSink>,
) -> Result<(), GatewayError> {
    shared::metrics_defs::describe(metrics_defs::ALL_METRICS);

    let gateway = IngestGateway::from_config(&config, landing, sink);
    run_http_service(
        &config.listener.host,
        config.listener.port,
        GatewayService::new(gateway),
    )
    .await
}
