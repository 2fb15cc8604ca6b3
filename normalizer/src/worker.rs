//! The normalization worker pool.
//!
//! Workers drain the delivery queue, rewrite landed documents into the
//! processed store, and park malformed records in quarantine. Delivery is
//! at-least-once, so every step tolerates repeats: the processed write is
//! write-once per (partition, source id) and repeats count as duplicates.

use crate::config::Config;
use crate::errors::WorkerError;
use crate::flatten::flatten;
use crate::metrics_defs::{
    RECORDS_DUPLICATE, RECORDS_NORMALIZED, RECORDS_QUARANTINED, RECORDS_REDELIVERED,
    RECORDS_SKIPPED, SWEEP_ENQUEUED,
};
use crate::queue::{Delivery, DeliveryQueue, QueueHandle};
use serde_json::Value;
use shared::counter;
use std::sync::Arc;
use store::types::parse_request_time;
use store::{
    LandingNotice, LandingStore, NormalizedDocument, NoticeSink, PartitionKey, ProcessedStore,
    Quarantine, StoreError, StoredObject,
};
use tokio::task::JoinSet;
use tokio::time::{Duration, sleep};

/// Table a record is filed under in quarantine when its own metadata does
/// not say.
const UNKNOWN_TABLE: &str = "unknown";

/// Terminal state of one delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// A new document was written to the processed store.
    Normalized,
    /// The document already existed; the redelivery was a no-op.
    Duplicate,
    /// The record was malformed and parked in quarantine.
    Quarantined,
    /// The landing object no longer exists; nothing to do.
    Skipped,
    /// Transient trouble; the delivery was re-queued.
    Redelivered,
    /// Both the normalize and the quarantine paths failed on the final
    /// delivery. The record stays in the landing store; logged at error.
    Abandoned,
}

pub struct Normalizer {
    config: Config,
    landing: LandingStore,
    processed: ProcessedStore,
    quarantine: Quarantine,
    queue: DeliveryQueue,
    handle: QueueHandle,
}

impl Normalizer {
    pub fn new(
        config: Config,
        landing: LandingStore,
        processed: ProcessedStore,
        quarantine: Quarantine,
        queue: DeliveryQueue,
        handle: QueueHandle,
    ) -> Self {
        Normalizer {
            config,
            landing,
            processed,
            quarantine,
            queue,
            handle,
        }
    }

    /// Sweep the landing store, then drain the queue with a pool of
    /// workers. Returns once every queue handle is dropped and the queue
    /// has drained.
    pub async fn run(self) {
        shared::metrics_defs::describe(crate::metrics_defs::ALL_METRICS);

        let this = Arc::new(self);
        if let Err(err) = this.sweep().await {
            tracing::error!(error = %err, "landing sweep failed; continuing with live deliveries");
        }

        let mut workers = JoinSet::new();
        for worker in 0..this.config.workers {
            let this = this.clone();
            workers.spawn(async move {
                while let Some(delivery) = this.queue.recv().await {
                    let outcome = this.process_delivery(&delivery).await;
                    tracing::debug!(
                        worker,
                        id = %delivery.notice.id,
                        attempt = delivery.attempt,
                        ?outcome,
                        "processed delivery"
                    );
                }
            });
        }

        while let Some(result) = workers.join_next().await {
            if let Err(err) = result {
                tracing::error!("Worker task panicked: {}", err);
            }
        }
    }

    /// Re-enqueue landing records that have neither a processed document
    /// nor a quarantine entry. Replaces the hosting platform's store
    /// notifications after a restart or a lost notice.
    pub async fn sweep(&self) -> Result<usize, StoreError> {
        let mut enqueued = 0;

        for id in self.landing.record_ids().await? {
            let object = match self.landing.fetch(&id).await {
                Ok(object) => object,
                Err(StoreError::NotFound(_)) => continue,
                Err(err) => return Err(err),
            };

            let table = match (object.meta.table(), object.meta.request_time()) {
                (Some(table), Some(arrived_at)) => {
                    let partition = PartitionKey::new(table, &arrived_at);
                    if self.processed.contains(&partition, &id).await? {
                        continue;
                    }
                    table.to_string()
                }
                // Malformed metadata: the worker will quarantine it, unless
                // an earlier delivery already did.
                _ => UNKNOWN_TABLE.to_string(),
            };
            if self.quarantine.contains(&table, &id).await? {
                continue;
            }

            let notice = LandingNotice {
                id: id.clone(),
                table,
            };
            if self.handle.publish(notice).await.is_err() {
                tracing::warn!("delivery queue closed during sweep");
                break;
            }
            counter!(SWEEP_ENQUEUED).increment(1);
            enqueued += 1;
        }

        tracing::info!(enqueued, "landing sweep complete");
        Ok(enqueued)
    }

    /// Handle one delivery end to end. Never panics and never loses a
    /// record silently: every path ends in a durable artifact, a
    /// redelivery, or an error-level log entry.
    pub async fn process_delivery(&self, delivery: &Delivery) -> Outcome {
        let id = &delivery.notice.id;

        let object = match self.retry("fetch landing record", || self.landing.fetch(id)).await {
            Ok(object) => object,
            Err(StoreError::NotFound(_)) => {
                tracing::warn!(id = %id, "landing object does not exist. Ignoring");
                counter!(RECORDS_SKIPPED).increment(1);
                return Outcome::Skipped;
            }
            Err(err) => return self.redeliver_or_abandon(delivery, None, &err.to_string()),
        };

        match self.normalize_object(id, &object).await {
            Ok(outcome) => outcome,
            Err(err) if err.is_malformed_record() => {
                self.park(delivery, &object, &err.to_string()).await
            }
            Err(err) => self.redeliver_or_abandon(delivery, Some(&object), &err.to_string()),
        }
    }

    async fn normalize_object(
        &self,
        id: &store::RecordId,
        object: &StoredObject,
    ) -> Result<Outcome, WorkerError> {
        let table = object
            .meta
            .table()
            .ok_or(WorkerError::MissingMetadata("table"))?
            .to_string();
        let raw_time = object
            .meta
            .get(store::types::META_REQUEST_TIME)
            .ok_or(WorkerError::MissingMetadata("request-time"))?;
        let arrived_at = parse_request_time(raw_time)
            .map_err(|err| WorkerError::Validation(format!("unparseable request-time: {err}")))?;

        let decoded = self.landing.codec().decode(&object.body)?;

        let value: Value = serde_json::from_slice(&decoded)
            .map_err(|err| WorkerError::Validation(format!("malformed JSON document: {err}")))?;
        let Value::Object(root) = value else {
            return Err(WorkerError::Validation(
                "document is not object-rooted".to_string(),
            ));
        };

        let document = NormalizedDocument {
            table,
            arrived_at,
            source: id.clone(),
            fields: flatten(&root, &self.config.column_separator),
        };

        let inserted = self
            .retry("processed write", || self.processed.put_if_absent(&document))
            .await?;
        if inserted {
            counter!(RECORDS_NORMALIZED).increment(1);
            tracing::info!(
                id = %id,
                table = %document.table,
                columns = document.fields.len(),
                "normalized document"
            );
            Ok(Outcome::Normalized)
        } else {
            counter!(RECORDS_DUPLICATE).increment(1);
            tracing::debug!(id = %id, "document already processed; redelivery ignored");
            Ok(Outcome::Duplicate)
        }
    }

    /// Park a malformed record, id preserved, payload exactly as landed.
    async fn park(&self, delivery: &Delivery, object: &StoredObject, reason: &str) -> Outcome {
        let id = &delivery.notice.id;
        let table = object.meta.table().unwrap_or(UNKNOWN_TABLE).to_string();

        let parked = self
            .retry("quarantine write", || {
                self.quarantine
                    .park(&table, id, reason, &object.meta, object.body.clone())
            })
            .await;

        match parked {
            Ok(()) => {
                counter!(RECORDS_QUARANTINED).increment(1);
                tracing::warn!(id = %id, table = %table, reason, "quarantined record");
                Outcome::Quarantined
            }
            Err(err) => self.redeliver_or_abandon(delivery, Some(object), &err.to_string()),
        }
    }

    /// Transient-failure exit: re-queue the delivery, or on the final
    /// delivery try to quarantine it so the pipeline cannot loop forever.
    fn redeliver_or_abandon(
        &self,
        delivery: &Delivery,
        object: Option<&StoredObject>,
        failure: &str,
    ) -> Outcome {
        let id = &delivery.notice.id;

        if delivery.attempt < self.config.max_deliveries {
            counter!(RECORDS_REDELIVERED).increment(1);
            tracing::warn!(
                id = %id,
                attempt = delivery.attempt,
                error = %failure,
                "re-queueing delivery"
            );
            self.handle.redeliver_later(
                delivery.clone(),
                Duration::from_millis(self.config.retry.redelivery_delay_ms),
            );
            return Outcome::Redelivered;
        }

        // Final delivery. One quarantine attempt without retries; if even
        // that fails the record stays in the landing store for the next
        // sweep or operator.
        if let Some(object) = object {
            let table = object.meta.table().unwrap_or(UNKNOWN_TABLE).to_string();
            let quarantine = self.quarantine.clone();
            let id = id.clone();
            let meta = object.meta.clone();
            let body = object.body.clone();
            tokio::spawn(async move {
                match quarantine
                    .park(&table, &id, "delivery attempts exhausted", &meta, body)
                    .await
                {
                    Ok(()) => {
                        counter!(RECORDS_QUARANTINED).increment(1);
                        tracing::warn!(id = %id, table = %table, "quarantined after final delivery");
                    }
                    Err(err) => tracing::error!(
                        id = %id,
                        error = %err,
                        "record abandoned in landing store: quarantine failed on final delivery"
                    ),
                }
            });
            return Outcome::Quarantined;
        }

        tracing::error!(
            id = %id,
            error = %failure,
            "record abandoned in landing store after final delivery"
        );
        Outcome::Abandoned
    }

    /// Retry a store operation with linear backoff. `NotFound` is a
    /// verdict, not a transient condition, and is returned immediately.
    async fn retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let max_attempts = self.config.retry.max_attempts;
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err @ StoreError::NotFound(_)) => return Err(err),
                Err(err) if attempt >= max_attempts => return Err(err),
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "{what} failed; retrying");
                }
            }
            sleep(Duration::from_millis(
                self.config.retry.backoff_ms * u64::from(attempt),
            ))
            .await;
            attempt += 1;
        }
    }
}
