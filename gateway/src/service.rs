//! The ingress request handler.
//!
//! Accepts a payload addressed to a table, authorizes the caller, and
//! answers only once the landing write is confirmed durable. The payload
//! itself is never inspected here; structural validation belongs to the
//! normalization workers.

use crate::auth::{self, TokenValidator};
use crate::config::Config;
use crate::errors::GatewayError;
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_ACCEPTED, REQUESTS_REJECTED};
use crate::response::{self, GatewayBody, HealthStatus, IngestAccepted};
use crate::routes::{Route, match_route};
use crate::tables::TableRegistry;
use chrono::Utc;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::service::Service;
use hyper::{Request, Response};
use shared::{counter, histogram};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use store::{LandingNotice, LandingStore, NoticeSink, RecordId};
use tokio::time::{Duration, sleep, timeout};

pub struct IngestGateway {
    tables: TableRegistry,
    validator: Option<Arc<dyn TokenValidator>>,
    landing: LandingStore,
    sink: Arc<dyn NoticeSink>,
    max_body_bytes: usize,
    write: crate::config::WriteConfig,
}

impl IngestGateway {
    pub fn new(
        tables: TableRegistry,
        validator: Option<Arc<dyn TokenValidator>>,
        landing: LandingStore,
        sink: Arc<dyn NoticeSink>,
        max_body_bytes: usize,
        write: crate::config::WriteConfig,
    ) -> Self {
        IngestGateway {
            tables,
            validator,
            landing,
            sink,
            max_body_bytes,
            write,
        }
    }

    pub fn from_config(config: &Config, landing: LandingStore, sink: Arc<dyn NoticeSink>) -> Self {
        Self::new(
            TableRegistry::new(config.tables.clone()),
            auth::build_validator(&config.auth),
            landing,
            sink,
            config.limits.max_body_bytes,
            config.write.clone(),
        )
    }

    /// Dispatch one request and always produce an envelope response.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<GatewayBody>
    where
        B: hyper::body::Body + Send,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let started = Instant::now();

        let response = match match_route(req.method(), req.uri().path()) {
            Some(Route::Health) => response::success(HealthStatus { status: "ok" }),
            Some(Route::IngestObject { table }) => match self.ingest(req, &table).await {
                Ok(accepted) => {
                    counter!(REQUESTS_ACCEPTED).increment(1);
                    response::success(accepted)
                }
                Err(err) => {
                    counter!(REQUESTS_REJECTED).increment(1);
                    tracing::warn!(table = %table, error = %err, "rejected ingest request");
                    response::failure(&err)
                }
            },
            None => {
                tracing::warn!(
                    method = %req.method(),
                    path = %req.uri().path(),
                    "No route matched"
                );
                response::not_found()
            }
        };

        histogram!(REQUEST_DURATION).record(started.elapsed().as_secs_f64());
        response
    }

    async fn ingest<B>(&self, req: Request<B>, table: &str) -> Result<IngestAccepted, GatewayError>
    where
        B: hyper::body::Body + Send,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();

        // Content-Type is required before anything durable happens; the
        // declared type travels with the record for the workers.
        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .ok_or(GatewayError::MissingContentType)?
            .to_string();

        let table = self.tables.resolve(table)?.name.clone();

        if let Some(validator) = &self.validator {
            let identity = self.authenticate(&parts.headers, validator.as_ref()).await?;
            if !identity.may_write(&table) {
                return Err(GatewayError::TableForbidden(table));
            }
        }

        let bytes = Limited::new(body, self.max_body_bytes)
            .collect()
            .await
            .map_err(|err| GatewayError::RequestBodyError(err.to_string()))?
            .to_bytes();

        let id = RecordId::generate();
        let received_at = Utc::now();
        self.write_durable(&id, &table, &content_type, &received_at, &bytes)
            .await?;

        tracing::info!(id = %id, table = %table, bytes = bytes.len(), "accepted document");

        // The write above is the durability point. Losing the notice only
        // delays processing until the next sweep, so the request still
        // succeeds.
        let notice = LandingNotice {
            id: id.clone(),
            table: table.clone(),
        };
        if let Err(err) = self.sink.publish(notice).await {
            tracing::error!(
                id = %id,
                error = %err,
                "failed to enqueue landing notice; record awaits the startup sweep"
            );
        }

        Ok(IngestAccepted { id })
    }

    async fn authenticate(
        &self,
        headers: &http::HeaderMap,
        validator: &dyn TokenValidator,
    ) -> Result<auth::CallerIdentity, GatewayError> {
        let header = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(GatewayError::MissingAuthorization)?;
        let token = header.strip_prefix("Bearer ").unwrap_or(header);

        validator.validate(token).await.map_err(|err| match err {
            auth::AuthError::InvalidToken => GatewayError::InvalidToken,
            auth::AuthError::Upstream(detail) => GatewayError::AuthUpstream(detail),
        })
    }

    /// Write the landing record under a per-attempt timeout, retrying a
    /// bounded number of times before surfacing a 5xx.
    async fn write_durable(
        &self,
        id: &RecordId,
        table: &str,
        content_type: &str,
        received_at: &chrono::DateTime<Utc>,
        bytes: &[u8],
    ) -> Result<(), GatewayError> {
        let per_attempt = Duration::from_secs(self.write.timeout_secs);

        for attempt in 1..=self.write.retry_attempts {
            let write = self
                .landing
                .put(id, table, content_type, received_at, bytes);

            let failure = match timeout(per_attempt, write).await {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(err)) => err.to_string(),
                Err(_) => format!("landing write timed out after {per_attempt:?}"),
            };

            if attempt == self.write.retry_attempts {
                return Err(GatewayError::DurableWriteFailure(failure));
            }
            tracing::warn!(id = %id, attempt, error = %failure, "retrying landing write");
            sleep(Duration::from_millis(
                self.write.retry_backoff_ms * u64::from(attempt),
            ))
            .await;
        }

        // retry_attempts >= 1 is enforced by config validation
        Err(GatewayError::DurableWriteFailure(
            "no write attempts configured".to_string(),
        ))
    }
}

/// Hyper service wrapper around the gateway.
#[derive(Clone)]
pub struct GatewayService {
    gateway: Arc<IngestGateway>,
}

impl GatewayService {
    pub fn new(gateway: IngestGateway) -> Self {
        GatewayService {
            gateway: Arc::new(gateway),
        }
    }
}

impl Service<Request<Incoming>> for GatewayService {
    type Response = Response<GatewayBody>;
    type Error = GatewayError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let gateway = self.gateway.clone();
        Box::pin(async move { Ok(gateway.handle(req).await) })
    }
}
