//! Quarantine: durable side-location for records that fail decoding or
//! validation, preserved for manual inspection.

use crate::object_store::{ObjectStore, StoreError, StoredObject};
use crate::types::{META_REASON, ObjectMeta, RecordId};
use bytes::Bytes;
use std::sync::Arc;

#[derive(Clone)]
pub struct Quarantine {
    store: Arc<dyn ObjectStore>,
}

impl Quarantine {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Quarantine { store }
    }

    fn key(table: &str, id: &RecordId) -> String {
        format!("table={table}/{id}")
    }

    /// Park a record, keeping the payload exactly as it was stored in the
    /// landing store and recording why it was rejected. The original
    /// identifier stays in the key for traceability.
    pub async fn park(
        &self,
        table: &str,
        id: &RecordId,
        reason: &str,
        landing_meta: &ObjectMeta,
        encoded_body: Bytes,
    ) -> Result<(), StoreError> {
        let meta = landing_meta.clone().with(META_REASON, reason);
        self.store.put(&Self::key(table, id), encoded_body, &meta).await
    }

    pub async fn contains(&self, table: &str, id: &RecordId) -> Result<bool, StoreError> {
        self.store.contains(&Self::key(table, id)).await
    }

    pub async fn fetch(&self, table: &str, id: &RecordId) -> Result<StoredObject, StoreError> {
        self.store.get(&Self::key(table, id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::MemoryStore;
    use crate::types::META_TABLE;

    #[tokio::test]
    async fn parked_record_keeps_payload_reason_and_id() {
        let quarantine = Quarantine::new(Arc::new(MemoryStore::new()));
        let id = RecordId::generate();
        let landing_meta = ObjectMeta::new().with(META_TABLE, "myTable");

        quarantine
            .park(
                "myTable",
                &id,
                "malformed JSON document",
                &landing_meta,
                Bytes::from_static(b"eyJicm9rZW4i"),
            )
            .await
            .unwrap();

        assert!(quarantine.contains("myTable", &id).await.unwrap());
        let object = quarantine.fetch("myTable", &id).await.unwrap();
        assert_eq!(object.body.as_ref(), b"eyJicm9rZW4i");
        assert_eq!(object.meta.get(META_REASON), Some("malformed JSON document"));
        assert_eq!(object.meta.table(), Some("myTable"));
    }

    #[tokio::test]
    async fn absent_record_is_not_contained() {
        let quarantine = Quarantine::new(Arc::new(MemoryStore::new()));
        assert!(
            !quarantine
                .contains("t", &RecordId::generate())
                .await
                .unwrap()
        );
    }
}
