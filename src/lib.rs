//! Portfolio browser: folder-style browsing of an S3 bucket.
//!
//! Presents a flat object store as a tree by splitting keys on `/`, with
//! a convention of portfolios at the bucket root and opportunities under
//! `<portfolio>/opportunities/`.  Exposed as an HTTP JSON API.

pub mod browse;
pub mod config;
pub mod errors;
pub mod explorer;
pub mod handlers;
pub mod metrics;
pub mod server;
pub mod storage;
pub mod vfs;

use crate::browse::BrowseService;
use crate::config::Config;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Browse operations over the configured object store.
    pub browse: BrowseService,
}
