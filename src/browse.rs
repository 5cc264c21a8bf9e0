//! Browse service: the operations behind the HTTP API.
//!
//! Validates request fields, applies the portfolio/opportunity folder
//! conventions and delegates to [`VirtualFs`].  Every method performs its
//! store calls sequentially; there is no retry and no rollback.

use bytes::Bytes;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

use crate::errors::BrowseError;
use crate::storage::backend::{ObjectStore, DELIMITER};
use crate::vfs::{validate_prefix, validate_segment, Listing, VirtualFs};

/// File payload for [`BrowseService::upload`].
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub data: Bytes,
    pub content_type: Option<String>,
}

/// Portfolio/opportunity browser over one object store.
#[derive(Clone)]
pub struct BrowseService {
    fs: VirtualFs,
    /// Folder under each portfolio that holds its opportunities.
    opportunities_segment: String,
}

impl BrowseService {
    pub fn new(store: Arc<dyn ObjectStore>, opportunities_segment: impl Into<String>) -> Self {
        Self {
            fs: VirtualFs::new(store),
            opportunities_segment: opportunities_segment.into(),
        }
    }

    /// Single-level listing of `prefix`.
    pub async fn list(&self, prefix: &str) -> Result<Listing, BrowseError> {
        self.fs.list(prefix).await
    }

    /// Create folder `name` under `prefix`.
    pub async fn create_folder(&self, prefix: &str, name: &str) -> Result<(), BrowseError> {
        if prefix.is_empty() || name.is_empty() {
            return Err(BrowseError::validation("Missing prefix or name"));
        }
        let key = self.fs.create_folder(prefix, name).await?;
        info!("Folder created: {key}");
        Ok(())
    }

    /// Store `upload` at `prefix + file_name`, overwriting any existing object.
    pub async fn upload(&self, prefix: &str, upload: Upload) -> Result<String, BrowseError> {
        if prefix.is_empty() || upload.file_name.is_empty() {
            return Err(BrowseError::validation("Missing prefix or file"));
        }
        validate_prefix(prefix)?;
        validate_segment(&upload.file_name, "file name")?;

        let key = format!("{prefix}{}", upload.file_name);
        let size = upload.data.len();
        self.fs
            .write(&key, upload.data, upload.content_type.as_deref())
            .await?;
        info!("Uploaded {key} ({size} bytes)");
        Ok(key)
    }

    /// Rename `old_key` to `new_key`.
    ///
    /// With `recursive` and a folder key (trailing `/`), every descendant
    /// is moved too.  Otherwise only the single key is renamed.
    pub async fn rename(
        &self,
        old_key: &str,
        new_key: &str,
        recursive: bool,
    ) -> Result<(), BrowseError> {
        if old_key.is_empty() || new_key.is_empty() || old_key == new_key {
            return Err(BrowseError::validation("Invalid keys"));
        }

        if recursive && old_key.ends_with(DELIMITER) {
            if !new_key.ends_with(DELIMITER) {
                return Err(BrowseError::validation(
                    "Folder rename target must end with '/'",
                ));
            }
            let report = self.fs.rename_tree(old_key, new_key).await?;
            info!(
                "Folder renamed: {old_key} -> {new_key} ({} keys)",
                report.renamed.len()
            );
            return report.into_result(old_key, new_key);
        }

        self.fs
            .rename(old_key, new_key)
            .await
            .into_result(old_key, new_key)?;
        info!("Renamed: {old_key} -> {new_key}");
        Ok(())
    }

    /// Delete `keys` in one batch.
    ///
    /// With `recursive`, each folder key (trailing `/`) is expanded to
    /// every key beneath it first.
    pub async fn delete(
        &self,
        keys: &[String],
        recursive: bool,
    ) -> Result<Vec<String>, BrowseError> {
        if keys.is_empty() || keys.iter().any(|k| k.is_empty()) {
            return Err(BrowseError::validation("No keys provided"));
        }

        let folders: BTreeSet<&str> = keys
            .iter()
            .filter(|k| recursive && k.ends_with(DELIMITER))
            .map(String::as_str)
            .collect();

        let mut deleted = Vec::new();
        for folder in &folders {
            deleted.extend(self.fs.delete_tree(folder).await?);
        }

        let plain: Vec<String> = keys
            .iter()
            .filter(|k| !folders.iter().any(|f| k.starts_with(*f)))
            .cloned()
            .collect();
        if !plain.is_empty() {
            deleted.extend(self.fs.delete_many(&plain).await?);
        }

        // Nested folder keys expand to overlapping key sets.
        let mut seen = BTreeSet::new();
        deleted.retain(|k| seen.insert(k.clone()));

        info!("Deleted {} object(s)", deleted.len());
        Ok(deleted)
    }

    /// Top-level folder names (portfolios).
    pub async fn list_portfolios(&self) -> Result<Vec<String>, BrowseError> {
        let listing = self
            .fs
            .list("")
            .await
            .map_err(|e| relabel(e, "Failed to list portfolios"))?;
        Ok(listing.folder_names())
    }

    /// Prefix holding the opportunities of `portfolio`.
    pub fn opportunities_prefix(&self, portfolio: &str) -> Result<String, BrowseError> {
        validate_segment(portfolio, "portfolio")?;
        Ok(format!(
            "{portfolio}{DELIMITER}{}{DELIMITER}",
            self.opportunities_segment
        ))
    }

    /// Base prefix a client navigates within for one opportunity.
    pub fn opportunity_root(
        &self,
        portfolio: &str,
        opportunity: &str,
    ) -> Result<String, BrowseError> {
        validate_segment(opportunity, "opportunity")?;
        Ok(format!(
            "{}{opportunity}{DELIMITER}",
            self.opportunities_prefix(portfolio)?
        ))
    }

    /// Opportunity folder names of `portfolio`.
    pub async fn list_opportunities(&self, portfolio: &str) -> Result<Vec<String>, BrowseError> {
        let prefix = self.opportunities_prefix(portfolio)?;
        let listing = self
            .fs
            .list(&prefix)
            .await
            .map_err(|e| relabel(e, "Failed to list opportunities"))?;
        let folders = listing.folder_names();
        info!("Opportunities found under {prefix}: {}", folders.len());
        Ok(folders)
    }

    /// Create opportunity `name` under `portfolio`.
    pub async fn create_opportunity(&self, portfolio: &str, name: &str) -> Result<(), BrowseError> {
        if portfolio.is_empty() || name.is_empty() {
            return Err(BrowseError::validation("Missing name or portfolio"));
        }
        let prefix = self.opportunities_prefix(portfolio)?;
        let key = self
            .fs
            .create_folder(&prefix, name)
            .await
            .map_err(|e| relabel(e, "Failed to create opportunity"))?;
        info!("Opportunity created: {key}");
        Ok(())
    }
}

/// Replace the client-facing message of a backend error.
fn relabel(err: BrowseError, message: &'static str) -> BrowseError {
    match err {
        BrowseError::Backend { source, .. } => BrowseError::Backend { message, source },
        other => other,
    }
}
