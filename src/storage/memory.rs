//! In-memory object store.
//!
//! Objects are held in a `tokio::sync::RwLock<BTreeMap<...>>` so listings
//! come back in key order, exactly as S3 returns them.  A configurable
//! memory limit (`max_size_bytes`) caps total stored bytes.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::pin::Pin;

use super::backend::{ObjectStore, ObjectSummary, PrefixListing};

/// One stored object.
#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<String, StoredObject>,
    /// Current total bytes stored.
    current_size: u64,
}

/// In-memory object store.
pub struct MemoryStore {
    inner: tokio::sync::RwLock<Inner>,
    /// Maximum bytes allowed.  0 means unlimited.
    max_size_bytes: u64,
}

impl MemoryStore {
    /// Create an empty store.  `max_size_bytes == 0` disables the limit.
    pub fn new(max_size_bytes: u64) -> Self {
        Self {
            inner: tokio::sync::RwLock::new(Inner::default()),
            max_size_bytes,
        }
    }

    /// Fetch the bytes stored at `key`, if any.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        let inner = self.inner.read().await;
        inner.objects.get(key).map(|obj| obj.data.clone())
    }

    /// Content type recorded for `key`, if any.
    pub async fn content_type(&self, key: &str) -> Option<String> {
        let inner = self.inner.read().await;
        inner.objects.get(key).and_then(|obj| obj.content_type.clone())
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.inner.read().await.objects.len()
    }

    /// Whether the store holds no objects.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.objects.is_empty()
    }

    /// Insert `obj` at `key`, enforcing the memory limit.
    fn insert(&self, inner: &mut Inner, key: String, obj: StoredObject) -> anyhow::Result<()> {
        let new_len = obj.data.len() as u64;
        let old_len = inner
            .objects
            .get(&key)
            .map(|o| o.data.len() as u64)
            .unwrap_or(0);
        let projected = inner.current_size - old_len + new_len;
        if self.max_size_bytes != 0 && projected > self.max_size_bytes {
            anyhow::bail!(
                "Memory limit exceeded: current={}, additional={new_len}, max={}",
                inner.current_size,
                self.max_size_bytes
            );
        }
        inner.objects.insert(key, obj);
        inner.current_size = projected;
        Ok(())
    }

    fn remove(inner: &mut Inner, key: &str) {
        if let Some(obj) = inner.objects.remove(key) {
            inner.current_size = inner.current_size.saturating_sub(obj.data.len() as u64);
        }
    }
}

impl ObjectStore for MemoryStore {
    fn list_with_prefix(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<PrefixListing>> + Send + '_>> {
        let prefix = prefix.to_string();
        let delimiter = delimiter.filter(|d| !d.is_empty()).map(|d| d.to_string());
        Box::pin(async move {
            let inner = self.inner.read().await;
            let mut objects = Vec::new();
            let mut common_prefixes = BTreeSet::new();

            let matching = inner
                .objects
                .range(prefix.clone()..)
                .take_while(|(k, _)| k.starts_with(&prefix));

            for (key, obj) in matching {
                let after_prefix = &key[prefix.len()..];
                if let Some(pos) = delimiter.as_deref().and_then(|d| {
                    after_prefix.find(d).map(|pos| pos + d.len())
                }) {
                    common_prefixes.insert(format!("{prefix}{}", &after_prefix[..pos]));
                } else {
                    objects.push(ObjectSummary {
                        key: key.clone(),
                        size: obj.data.len() as u64,
                        last_modified: obj.last_modified,
                    });
                }
            }

            Ok(PrefixListing {
                objects,
                common_prefixes: common_prefixes.into_iter().collect(),
            })
        })
    }

    fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let key = key.to_string();
        let content_type = content_type.map(|s| s.to_string());
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            let obj = StoredObject {
                data,
                content_type,
                last_modified: Utc::now(),
            };
            self.insert(&mut inner, key, obj)
        })
    }

    fn copy(
        &self,
        src_key: &str,
        dst_key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let src_key = src_key.to_string();
        let dst_key = dst_key.to_string();
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            let Some(src) = inner.objects.get(&src_key).cloned() else {
                anyhow::bail!("Source object not found at key: {src_key}");
            };
            let obj = StoredObject {
                last_modified: Utc::now(),
                ..src
            };
            self.insert(&mut inner, dst_key, obj)
        })
    }

    fn delete(&self, key: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            Self::remove(&mut inner, &key);
            Ok(())
        })
    }

    fn delete_many(
        &self,
        keys: &[String],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + '_>> {
        let keys = keys.to_vec();
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            // S3 reports missing keys as deleted too.
            for key in &keys {
                Self::remove(&mut inner, key);
            }
            Ok(keys)
        })
    }
}

// -- Tests ------------------------------------------------------------------
