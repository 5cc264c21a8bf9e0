//! Virtual filesystem over a flat object store.
//!
//! Folders do not exist in the store.  A folder is either a zero-byte
//! *marker* object whose key ends in `/`, or simply the common prefix of
//! other keys.  [`VirtualFs`] turns single-level delimited listings into
//! [`Entry`] values and expresses create/rename/delete as filesystem verbs.
//!
//! Nothing here is atomic.  Rename is copy-then-delete and reports its
//! two phases separately through [`RenameOutcome`].

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::BrowseError;
use crate::storage::backend::{ObjectStore, DELIMITER};

/// One immediate child of a listed prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// A virtual folder.  `marker_key` is `prefix + name + "/"`, whether or
    /// not a marker object is actually stored there.
    Folder { name: String, marker_key: String },
    /// A stored object.
    File {
        name: String,
        key: String,
        size: u64,
        last_modified: DateTime<Utc>,
    },
}

impl Entry {
    /// Name relative to the listed prefix.
    pub fn name(&self) -> &str {
        match self {
            Entry::Folder { name, .. } | Entry::File { name, .. } => name,
        }
    }

    /// Store key backing this entry.
    pub fn key(&self) -> &str {
        match self {
            Entry::Folder { marker_key, .. } => marker_key,
            Entry::File { key, .. } => key,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Entry::Folder { .. })
    }
}

/// Single-level view of one prefix.  Folders come first, sorted by name;
/// files follow in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub prefix: String,
    pub entries: Vec<Entry>,
}

impl Listing {
    pub fn folders(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|e| e.is_folder())
    }

    pub fn files(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|e| !e.is_folder())
    }

    /// Folder names only.
    pub fn folder_names(&self) -> Vec<String> {
        self.folders().map(|e| e.name().to_string()).collect()
    }
}

/// Result of a copy-then-delete rename.
#[derive(Debug)]
pub enum RenameOutcome {
    /// Copy and delete both succeeded.
    Renamed,
    /// Copy succeeded, delete failed: both keys now exist.
    Duplicated { cause: anyhow::Error },
    /// Copy failed: nothing changed.
    NotRenamed { cause: anyhow::Error },
}

impl RenameOutcome {
    /// Collapse into the HTTP error taxonomy.
    pub fn into_result(self, old_key: &str, new_key: &str) -> Result<(), BrowseError> {
        match self {
            RenameOutcome::Renamed => Ok(()),
            RenameOutcome::Duplicated { cause } => Err(BrowseError::PartialRename {
                old_key: old_key.to_string(),
                new_key: new_key.to_string(),
                source: cause,
            }),
            RenameOutcome::NotRenamed { cause } => {
                Err(BrowseError::backend("Rename failed")(cause))
            }
        }
    }
}

/// Per-key report of a recursive rename.
#[derive(Debug, Default)]
pub struct TreeRenameReport {
    /// Keys fully moved (old key removed).
    pub renamed: Vec<String>,
    /// Keys copied whose original could not be removed.
    pub duplicated: Vec<String>,
    /// Key whose copy failed; processing stopped there.
    pub failed: Option<(String, anyhow::Error)>,
}

impl TreeRenameReport {
    pub fn is_complete(&self) -> bool {
        self.duplicated.is_empty() && self.failed.is_none()
    }

    /// Collapse into the HTTP error taxonomy.  Any change to the store
    /// followed by a failure is reported as a partial rename.
    pub fn into_result(self, old_prefix: &str, new_prefix: &str) -> Result<(), BrowseError> {
        if self.is_complete() {
            return Ok(());
        }
        let touched = !self.renamed.is_empty() || !self.duplicated.is_empty();
        let cause = match self.failed {
            Some((key, cause)) => cause.context(format!("copy of '{key}' failed")),
            None => anyhow::anyhow!(
                "{} key(s) could not be removed: {}",
                self.duplicated.len(),
                self.duplicated.join(", ")
            ),
        };
        if touched {
            Err(BrowseError::PartialRename {
                old_key: old_prefix.to_string(),
                new_key: new_prefix.to_string(),
                source: cause,
            })
        } else {
            Err(BrowseError::backend("Rename failed")(cause))
        }
    }
}

/// Check that `prefix` is `""` or ends in `/`.
pub fn validate_prefix(prefix: &str) -> Result<(), BrowseError> {
    if prefix.is_empty() || prefix.ends_with(DELIMITER) {
        Ok(())
    } else {
        Err(BrowseError::InvalidPrefix {
            prefix: prefix.to_string(),
        })
    }
}

/// Check that `name` is usable as a single path segment.
pub fn validate_segment(name: &str, what: &str) -> Result<(), BrowseError> {
    if name.is_empty() {
        return Err(BrowseError::validation(format!("Missing {what}")));
    }
    if name.contains(DELIMITER) {
        return Err(BrowseError::validation(format!(
            "Invalid {what}: must not contain '/'"
        )));
    }
    Ok(())
}

/// Filesystem verbs over an [`ObjectStore`].
#[derive(Clone)]
pub struct VirtualFs {
    store: Arc<dyn ObjectStore>,
}

impl VirtualFs {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// List the immediate children of `prefix`.
    ///
    /// The folder's own marker (a key equal to `prefix`) is never returned
    /// as a file.
    pub async fn list(&self, prefix: &str) -> Result<Listing, BrowseError> {
        validate_prefix(prefix)?;

        let raw = self
            .store
            .list_with_prefix(prefix, Some(DELIMITER))
            .await
            .map_err(BrowseError::backend("Failed to browse S3"))?;

        let mut folders: Vec<Entry> = raw
            .common_prefixes
            .into_iter()
            .filter_map(|marker_key| {
                let rest = marker_key.strip_prefix(prefix)?;
                let name = rest.strip_suffix(DELIMITER).unwrap_or(rest);
                if name.is_empty() || name.contains(DELIMITER) {
                    debug!("Skipping unnamed common prefix {marker_key}");
                    return None;
                }
                let name = name.to_string();
                Some(Entry::Folder { name, marker_key })
            })
            .collect();
        folders.sort_by(|a, b| a.name().cmp(b.name()));
        folders.dedup_by(|a, b| a.name() == b.name());

        let files = raw
            .objects
            .into_iter()
            .filter(|obj| obj.key != prefix)
            .filter_map(|obj| {
                let name = obj.key.strip_prefix(prefix)?.to_string();
                if name.contains(DELIMITER) {
                    // Only reachable when a store ignores the delimiter.
                    return None;
                }
                Some(Entry::File {
                    name,
                    size: obj.size,
                    last_modified: obj.last_modified,
                    key: obj.key,
                })
            });

        let mut entries = folders;
        entries.extend(files);

        Ok(Listing {
            prefix: prefix.to_string(),
            entries,
        })
    }

    /// Every key under `prefix`, at any depth, including its own marker.
    pub async fn descendants(&self, prefix: &str) -> Result<Vec<String>, BrowseError> {
        let raw = self
            .store
            .list_with_prefix(prefix, None)
            .await
            .map_err(BrowseError::backend("Failed to browse S3"))?;
        Ok(raw.objects.into_iter().map(|o| o.key).collect())
    }

    /// Write an empty marker at `prefix + name + "/"`.  Idempotent.
    pub async fn create_folder(&self, prefix: &str, name: &str) -> Result<String, BrowseError> {
        validate_prefix(prefix)?;
        validate_segment(name, "folder name")?;

        let marker_key = format!("{prefix}{name}{DELIMITER}");
        self.store
            .put(&marker_key, Bytes::new(), None)
            .await
            .map_err(BrowseError::backend("Failed to create folder"))?;
        debug!("Created folder marker {marker_key}");
        Ok(marker_key)
    }

    /// Write `data` to `key`, replacing any existing object.
    pub async fn write(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), BrowseError> {
        self.store
            .put(key, data, content_type)
            .await
            .map_err(BrowseError::backend("Upload failed"))
    }

    /// Copy `old_key` to `new_key`, then delete `old_key`.
    ///
    /// Shallow: renaming a folder marker leaves its descendants where they
    /// are.  Use [`VirtualFs::rename_tree`] to move a whole folder.
    pub async fn rename(&self, old_key: &str, new_key: &str) -> RenameOutcome {
        if let Err(cause) = self.store.copy(old_key, new_key).await {
            return RenameOutcome::NotRenamed { cause };
        }
        match self.store.delete(old_key).await {
            Ok(()) => {
                debug!("Renamed {old_key} -> {new_key}");
                RenameOutcome::Renamed
            }
            Err(cause) => {
                warn!("Rename copied {old_key} -> {new_key} but delete failed");
                RenameOutcome::Duplicated { cause }
            }
        }
    }

    /// Rename every key under `old_prefix` to the same relative key under
    /// `new_prefix`, one copy-then-delete at a time.
    ///
    /// Stops at the first failed copy.  Failed deletes are recorded and the
    /// walk continues.
    pub async fn rename_tree(
        &self,
        old_prefix: &str,
        new_prefix: &str,
    ) -> Result<TreeRenameReport, BrowseError> {
        if old_prefix.is_empty() || new_prefix.is_empty() {
            return Err(BrowseError::validation("Invalid keys"));
        }
        validate_prefix(old_prefix)?;
        validate_prefix(new_prefix)?;
        if new_prefix.starts_with(old_prefix) {
            return Err(BrowseError::validation(
                "Cannot move a folder into itself",
            ));
        }

        let keys = self.descendants(old_prefix).await?;
        if keys.is_empty() {
            return Err(BrowseError::backend("Rename failed")(anyhow::anyhow!(
                "no keys under '{old_prefix}'"
            )));
        }
        let mut report = TreeRenameReport::default();

        for old_key in keys {
            let new_key = format!("{new_prefix}{}", &old_key[old_prefix.len()..]);
            match self.rename(&old_key, &new_key).await {
                RenameOutcome::Renamed => report.renamed.push(old_key),
                RenameOutcome::Duplicated { cause } => {
                    warn!("Could not remove {old_key} after copy: {cause:#}");
                    report.duplicated.push(old_key);
                }
                RenameOutcome::NotRenamed { cause } => {
                    report.failed = Some((old_key, cause));
                    break;
                }
            }
        }

        Ok(report)
    }

    /// Batch-delete `keys`.  A folder marker key removes only the marker.
    pub async fn delete_many(&self, keys: &[String]) -> Result<Vec<String>, BrowseError> {
        self.store
            .delete_many(keys)
            .await
            .map_err(BrowseError::backend("Failed to delete objects"))
    }

    /// Delete every key under `prefix`, including its marker.
    pub async fn delete_tree(&self, prefix: &str) -> Result<Vec<String>, BrowseError> {
        if prefix.is_empty() {
            return Err(BrowseError::validation(
                "Refusing to delete the bucket root",
            ));
        }
        validate_prefix(prefix)?;

        let keys = self.descendants(prefix).await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        self.delete_many(&keys).await
    }
}

// -- Tests --------------------------------------------------------------------
