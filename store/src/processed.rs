//! Processed store: normalized, query-ready documents in a partitioned
//! layout.

use crate::object_store::{ObjectStore, StoreError};
use crate::partition::PartitionKey;
use crate::types::{
    META_REQUEST_TIME, META_SOURCE_ID, META_TABLE, NormalizedDocument, ObjectMeta, RecordId,
    REQUEST_TIME_FORMAT,
};
use bytes::Bytes;
use std::sync::Arc;

/// Write-once-per-identifier store of [`NormalizedDocument`]s.
///
/// Documents land under
/// `table=<t>/year=…/second=…/<id>/<id>`, the layout the external SQL
/// engine's partition discovery walks.
#[derive(Clone)]
pub struct ProcessedStore {
    store: Arc<dyn ObjectStore>,
}

impl ProcessedStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        ProcessedStore { store }
    }

    pub fn document_key(partition: &PartitionKey, source: &RecordId) -> String {
        format!("{}/{source}/{source}", partition.path())
    }

    /// Persist a document if its key is vacant.
    ///
    /// Returns `false` when a document from the same landing record already
    /// exists in this partition; redelivered records are counted, not
    /// duplicated. The document body is the canonical JSON rendering of the
    /// flattened fields, so a concurrent double-write stores identical
    /// bytes either way.
    pub async fn put_if_absent(&self, doc: &NormalizedDocument) -> Result<bool, StoreError> {
        let partition = PartitionKey::new(&doc.table, &doc.arrived_at);
        let key = Self::document_key(&partition, &doc.source);

        let meta = ObjectMeta::new()
            .with(META_TABLE, doc.table.as_str())
            .with(
                META_REQUEST_TIME,
                doc.arrived_at.format(REQUEST_TIME_FORMAT).to_string(),
            )
            .with(META_SOURCE_ID, doc.source.to_string());

        let body = Bytes::from(serde_json::to_vec(&doc.fields)?);
        self.store.put_if_absent(&key, body, &meta).await
    }

    /// Whether a document for this (partition, source) pair already exists.
    pub async fn contains(
        &self,
        partition: &PartitionKey,
        source: &RecordId,
    ) -> Result<bool, StoreError> {
        self.store
            .contains(&Self::document_key(partition, source))
            .await
    }

    pub async fn fetch_raw(
        &self,
        partition: &PartitionKey,
        source: &RecordId,
    ) -> Result<Bytes, StoreError> {
        Ok(self
            .store
            .get(&Self::document_key(partition, source))
            .await?
            .body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::MemoryStore;
    use crate::types::parse_request_time;
    use std::collections::BTreeMap;

    fn doc(source: RecordId) -> NormalizedDocument {
        let mut fields = BTreeMap::new();
        fields.insert("key1".to_string(), serde_json::json!("value1"));
        fields.insert("nested__a".to_string(), serde_json::json!(7));
        NormalizedDocument {
            table: "myTable".to_string(),
            arrived_at: parse_request_time("02/Jan/2026:15:04:05 +0000").unwrap(),
            source,
            fields,
        }
    }

    #[tokio::test]
    async fn document_lands_in_its_partition() {
        let backing = Arc::new(MemoryStore::new());
        let store = ProcessedStore::new(backing.clone());
        let source = RecordId::generate();

        assert!(store.put_if_absent(&doc(source.clone())).await.unwrap());

        let keys = backing.list("table=myTable/").await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(
            keys[0],
            format!(
                "table=myTable/year=2026/month=01/day=02/hour=15/minute=04/second=05/{source}/{source}"
            )
        );
    }

    #[tokio::test]
    async fn provenance_is_preserved_in_metadata() {
        let backing = Arc::new(MemoryStore::new());
        let store = ProcessedStore::new(backing.clone());
        let source = RecordId::generate();

        store.put_if_absent(&doc(source.clone())).await.unwrap();

        let key = backing.list("").await.unwrap().remove(0);
        let object = backing.get(&key).await.unwrap();
        assert_eq!(object.meta.get(META_SOURCE_ID), Some(source.to_string().as_str()));
        assert_eq!(object.meta.table(), Some("myTable"));
    }

    #[tokio::test]
    async fn second_write_for_same_source_is_a_noop() {
        let store = ProcessedStore::new(Arc::new(MemoryStore::new()));
        let source = RecordId::generate();

        assert!(store.put_if_absent(&doc(source.clone())).await.unwrap());
        assert!(!store.put_if_absent(&doc(source)).await.unwrap());
    }

    #[tokio::test]
    async fn body_is_canonical_sorted_json() {
        let store = ProcessedStore::new(Arc::new(MemoryStore::new()));
        let source = RecordId::generate();
        let document = doc(source.clone());

        store.put_if_absent(&document).await.unwrap();

        let partition = PartitionKey::new(&document.table, &document.arrived_at);
        let body = store.fetch_raw(&partition, &source).await.unwrap();
        assert_eq!(body.as_ref(), br#"{"key1":"value1","nested__a":7}"#);
    }
}
