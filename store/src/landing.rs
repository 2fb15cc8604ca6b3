//! Landing store: raw, as-received payloads keyed by request identifier.

use crate::encoding::TransportCodec;
use crate::object_store::{ObjectStore, StoreError, StoredObject};
use crate::types::{
    LandingNotice, META_CONTENT_TYPE, META_REQUEST_TIME, META_TABLE, ObjectMeta, RecordId,
    format_request_time,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum PublishError {
    #[error("delivery queue closed")]
    Closed,
}

/// Downstream notification seam.
///
/// The gateway publishes a [`LandingNotice`] through this after every
/// durable landing write; the normalizer's queue handle is the production
/// implementation.
#[async_trait]
pub trait NoticeSink: Send + Sync {
    async fn publish(&self, notice: LandingNotice) -> Result<(), PublishError>;
}

/// Write-once store of accepted payloads, keyed solely by [`RecordId`].
#[derive(Clone)]
pub struct LandingStore {
    store: Arc<dyn ObjectStore>,
    codec: TransportCodec,
}

impl LandingStore {
    pub fn new(store: Arc<dyn ObjectStore>, codec: TransportCodec) -> Self {
        LandingStore { store, codec }
    }

    pub fn codec(&self) -> &TransportCodec {
        &self.codec
    }

    /// Persist a newly accepted payload.
    ///
    /// The body is stored under the transport encoding, with routing
    /// metadata out of band. Returns only once the backing store has
    /// acknowledged the write.
    pub async fn put(
        &self,
        id: &RecordId,
        table: &str,
        content_type: &str,
        received_at: &DateTime<Utc>,
        raw_body: &[u8],
    ) -> Result<(), StoreError> {
        let meta = ObjectMeta::new()
            .with(META_TABLE, table)
            .with(META_REQUEST_TIME, format_request_time(received_at))
            .with(META_CONTENT_TYPE, content_type);

        let encoded = self.codec.encode(raw_body);
        self.store.put(&id.to_string(), encoded, &meta).await
    }

    /// Fetch the still-encoded payload and metadata for a record.
    pub async fn fetch(&self, id: &RecordId) -> Result<StoredObject, StoreError> {
        self.store.get(&id.to_string()).await
    }

    /// List every landing record identifier currently stored.
    pub async fn record_ids(&self) -> Result<Vec<RecordId>, StoreError> {
        let keys = self.store.list("").await?;
        Ok(keys
            .iter()
            .filter_map(|key| RecordId::parse(key).ok())
            .collect())
    }
}
