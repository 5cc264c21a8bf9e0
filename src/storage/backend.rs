//! Abstract object store trait.
//!
//! Every store must implement [`ObjectStore`].  The trait mirrors the
//! handful of S3 calls the browser needs: a prefix listing (optionally
//! delimited), put, server-side copy, single delete and batch delete.
//! Keys are opaque strings; `/` carries no meaning at this layer.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// Hierarchy delimiter used for single-level listings.
pub const DELIMITER: &str = "/";

/// Summary of one stored object as returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    /// Full object key.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
}

/// Raw result of a prefix listing.
///
/// With a delimiter, keys that contain the delimiter after the prefix are
/// rolled up into `common_prefixes` (each ending in the delimiter) and do
/// not appear in `objects`.  Without one, every key under the prefix is in
/// `objects` and `common_prefixes` is empty.
#[derive(Debug, Clone, Default)]
pub struct PrefixListing {
    /// Objects directly matched by the listing, in key order.
    pub objects: Vec<ObjectSummary>,
    /// Rolled-up common prefixes, in key order.
    pub common_prefixes: Vec<String>,
}

/// Async object store contract.
pub trait ObjectStore: Send + Sync + 'static {
    /// List every key starting with `prefix`, following all result pages.
    fn list_with_prefix(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<PrefixListing>> + Send + '_>>;

    /// Write `data` to `key`, replacing any existing object.
    fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// Copy the object at `src_key` to `dst_key` within the store.
    fn copy(
        &self,
        src_key: &str,
        dst_key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// Delete the object at `key`.  Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// Delete a batch of keys, returning the keys the store reports deleted.
    fn delete_many(
        &self,
        keys: &[String],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + '_>>;
}
