//! Durable object storage behind a provider seam.
//!
//! The pipeline only ever talks to [`ObjectStore`]; the filesystem backend
//! is the production default and the in-memory backend backs tests and
//! local development. Writes are atomic at object granularity: readers
//! observe either the whole object or nothing.

use crate::types::ObjectMeta;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use uuid::Uuid;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("metadata codec error: {0}")]
    MetaCodec(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An object plus its out-of-band metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredObject {
    pub body: Bytes,
    pub meta: ObjectMeta,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write an object, replacing any existing one under the same key.
    async fn put(&self, key: &str, body: Bytes, meta: &ObjectMeta) -> Result<(), StoreError>;

    /// Write an object only if the key is vacant. Returns `false` when the
    /// key already held an object (nothing is written in that case).
    async fn put_if_absent(
        &self,
        key: &str,
        body: Bytes,
        meta: &ObjectMeta,
    ) -> Result<bool, StoreError>;

    async fn get(&self, key: &str) -> Result<StoredObject, StoreError>;

    async fn contains(&self, key: &str) -> Result<bool, StoreError>;

    /// List keys under a prefix, in lexicographic order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Keys map to relative paths, so caller-derived segments must not be able
/// to escape the store root.
fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || key.starts_with('/') || key.ends_with('/') {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    if key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

const META_SUFFIX: &str = ".meta.json";

/// Filesystem-backed store.
///
/// Bodies live at `<root>/<key>` with a `<root>/<key>.meta.json` sidecar.
/// Both are written to a temporary name first and renamed into place, so a
/// concurrent reader never sees a partial object.
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FilesystemStore { root: root.into() }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<(), StoreError> {
        // Unique temp name: concurrent writers to the same key must not
        // clobber each other's partial file.
        let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4().as_simple()));
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn write_object(
        &self,
        key: &str,
        body: &[u8],
        meta: &ObjectMeta,
    ) -> Result<(), StoreError> {
        let path = self.object_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Sidecar first: once the body is visible the object is complete.
        let meta_bytes = serde_json::to_vec(meta)?;
        let meta_path = sidecar_path(&path);
        self.write_atomic(&meta_path, &meta_bytes).await?;
        self.write_atomic(&path, body).await?;
        tracing::debug!(key, bytes = body.len(), "stored object");
        Ok(())
    }
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(META_SUFFIX);
    PathBuf::from(name)
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    async fn put(&self, key: &str, body: Bytes, meta: &ObjectMeta) -> Result<(), StoreError> {
        validate_key(key)?;
        self.write_object(key, &body, meta).await
    }

    async fn put_if_absent(
        &self,
        key: &str,
        body: Bytes,
        meta: &ObjectMeta,
    ) -> Result<bool, StoreError> {
        validate_key(key)?;
        let path = self.object_path(key);
        if tokio::fs::try_exists(&path).await? {
            return Ok(false);
        }
        // Two writers can both observe a vacant key; the rename is
        // last-writer-wins and payloads under one key are identical by
        // construction, so the race is harmless.
        self.write_object(key, &body, meta).await?;
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<StoredObject, StoreError> {
        validate_key(key)?;
        let path = self.object_path(key);
        let body = match tokio::fs::read(&path).await {
            Ok(bytes) => Bytes::from(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(key.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        let meta_bytes = tokio::fs::read(sidecar_path(&path)).await?;
        let meta = serde_json::from_slice(&meta_bytes)?;
        Ok(StoredObject { body, meta })
    }

    async fn contains(&self, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        Ok(tokio::fs::try_exists(self.object_path(key)).await?)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(rel) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let key = rel.to_string_lossy().replace('\\', "/");
                if key.ends_with(META_SUFFIX) || key.contains(".tmp-") {
                    continue;
                }
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

/// In-memory store used by tests and the `memory` backend.
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, body: Bytes, meta: &ObjectMeta) -> Result<(), StoreError> {
        validate_key(key)?;
        let object = StoredObject {
            body,
            meta: meta.clone(),
        };
        self.objects
            .write()
            .expect("object map lock poisoned")
            .insert(key.to_string(), object);
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        body: Bytes,
        meta: &ObjectMeta,
    ) -> Result<bool, StoreError> {
        validate_key(key)?;
        let mut objects = self.objects.write().expect("object map lock poisoned");
        if objects.contains_key(key) {
            return Ok(false);
        }
        objects.insert(
            key.to_string(),
            StoredObject {
                body,
                meta: meta.clone(),
            },
        );
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<StoredObject, StoreError> {
        validate_key(key)?;
        self.objects
            .read()
            .expect("object map lock poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn contains(&self, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        Ok(self
            .objects
            .read()
            .expect("object map lock poisoned")
            .contains_key(key))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .objects
            .read()
            .expect("object map lock poisoned")
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::META_TABLE;

    fn meta(table: &str) -> ObjectMeta {
        ObjectMeta::new().with(META_TABLE, table)
    }

    #[tokio::test]
    async fn filesystem_put_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path());

        store
            .put("landing/abc", Bytes::from_static(b"payload"), &meta("events"))
            .await
            .unwrap();

        let object = store.get("landing/abc").await.unwrap();
        assert_eq!(object.body.as_ref(), b"payload");
        assert_eq!(object.meta.table(), Some("events"));
    }

    #[tokio::test]
    async fn filesystem_get_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path());

        let err = store.get("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn filesystem_put_if_absent_is_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path());

        let first = store
            .put_if_absent("k", Bytes::from_static(b"one"), &meta("t"))
            .await
            .unwrap();
        let second = store
            .put_if_absent("k", Bytes::from_static(b"two"), &meta("t"))
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        assert_eq!(store.get("k").await.unwrap().body.as_ref(), b"one");
    }

    #[tokio::test]
    async fn filesystem_list_filters_by_prefix_and_hides_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path());

        for key in ["a/1", "a/2", "b/1"] {
            store
                .put(key, Bytes::from_static(b"x"), &meta("t"))
                .await
                .unwrap();
        }

        assert_eq!(store.list("a/").await.unwrap(), vec!["a/1", "a/2"]);
        assert_eq!(store.list("").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn keys_cannot_escape_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path());

        for key in ["", "/abs", "a//b", "../escape", "a/../b", "trailing/"] {
            let err = store
                .put(key, Bytes::from_static(b"x"), &meta("t"))
                .await
                .unwrap_err();
            assert!(matches!(err, StoreError::InvalidKey(_)), "key: {key:?}");
        }
    }

    #[tokio::test]
    async fn memory_store_matches_filesystem_semantics() {
        let store = MemoryStore::new();

        assert!(
            store
                .put_if_absent("k", Bytes::from_static(b"one"), &meta("t"))
                .await
                .unwrap()
        );
        assert!(
            !store
                .put_if_absent("k", Bytes::from_static(b"two"), &meta("t"))
                .await
                .unwrap()
        );
        assert!(store.contains("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap().body.as_ref(), b"one");
        assert_eq!(store.list("k").await.unwrap(), vec!["k"]);
        assert!(matches!(
            store.get("missing").await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }
}
