//! `/browse` handlers: list, batch delete, create folder, rename, upload.

use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

use super::{RequestBody, SuccessResponse, ValidatedJson};
use crate::browse::Upload;
use crate::errors::{BrowseError, ErrorBody};
use crate::metrics::{record_operation, BYTES_UPLOADED_TOTAL, OBJECTS_DELETED_TOTAL};
use crate::vfs::{Entry, Listing};
use crate::AppState;

// -- Wire types ---------------------------------------------------------------

/// Query string of `GET /browse`.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Prefix to list; empty or ending in `/`.
    #[serde(default)]
    pub prefix: String,
}

/// One file in a listing.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileItem {
    pub name: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub key: String,
}

/// Response of `GET /browse`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ListingResponse {
    pub folders: Vec<String>,
    pub files: Vec<FileItem>,
}

impl From<Listing> for ListingResponse {
    fn from(listing: Listing) -> Self {
        let mut folders = Vec::new();
        let mut files = Vec::new();
        for entry in listing.entries {
            match entry {
                Entry::Folder { name, .. } => folders.push(name),
                Entry::File {
                    name,
                    key,
                    size,
                    last_modified,
                } => files.push(FileItem {
                    name,
                    size,
                    last_modified,
                    key,
                }),
            }
        }
        Self { folders, files }
    }
}

/// Body of `DELETE /browse`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DeleteRequest {
    #[garde(length(min = 1), inner(length(min = 1)))]
    pub keys: Vec<String>,
    /// Expand folder keys to everything beneath them.
    #[serde(default)]
    #[garde(skip)]
    pub recursive: bool,
}

impl RequestBody for DeleteRequest {
    const INVALID: &'static str = "No keys provided";
}

/// Response of `DELETE /browse`.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    pub deleted: Vec<String>,
}

/// Body of `POST /browse/folder`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateFolderRequest {
    #[garde(length(min = 1))]
    pub prefix: String,
    #[garde(length(min = 1))]
    pub name: String,
}

impl RequestBody for CreateFolderRequest {
    const INVALID: &'static str = "Missing prefix or name";
}

/// Body of `POST /browse/rename`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    #[garde(length(min = 1))]
    pub old_key: String,
    #[garde(length(min = 1))]
    pub new_key: String,
    /// Move every key under a folder key, not just the marker.
    #[serde(default)]
    #[garde(skip)]
    pub recursive: bool,
}

impl RequestBody for RenameRequest {
    const INVALID: &'static str = "Invalid keys";
}

/// Multipart form of `POST /browse/upload` (documentation only).
#[derive(Debug, ToSchema)]
pub struct UploadForm {
    pub prefix: String,
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

// -- Handlers -----------------------------------------------------------------

/// `GET /browse?prefix=P` -- List the immediate folders and files of a prefix.
#[utoipa::path(
    get,
    path = "/browse",
    tag = "Browse",
    operation_id = "ListPrefix",
    params(ListQuery),
    responses(
        (status = 200, description = "Folders and files", body = ListingResponse),
        (status = 400, description = "Invalid prefix", body = ErrorBody),
        (status = 500, description = "Backend failure", body = ErrorBody)
    )
)]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListingResponse>, BrowseError> {
    let result = state.browse.list(&query.prefix).await;
    record_operation("list", result.is_ok());
    let listing = result?;
    debug!(
        "Listed {}: {} entries",
        listing.prefix,
        listing.entries.len()
    );
    Ok(Json(listing.into()))
}

/// `DELETE /browse` -- Delete a batch of keys.
#[utoipa::path(
    delete,
    path = "/browse",
    tag = "Browse",
    operation_id = "DeleteKeys",
    request_body = DeleteRequest,
    responses(
        (status = 200, description = "Deleted keys", body = DeleteResponse),
        (status = 400, description = "No keys provided", body = ErrorBody),
        (status = 500, description = "Backend failure", body = ErrorBody)
    )
)]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<DeleteRequest>,
) -> Result<Json<DeleteResponse>, BrowseError> {
    let result = state.browse.delete(&req.keys, req.recursive).await;
    record_operation("delete", result.is_ok());
    let deleted = result?;
    metrics::counter!(OBJECTS_DELETED_TOTAL).increment(deleted.len() as u64);
    Ok(Json(DeleteResponse { deleted }))
}

/// `POST /browse/folder` -- Create an empty folder marker.
#[utoipa::path(
    post,
    path = "/browse/folder",
    tag = "Browse",
    operation_id = "CreateFolder",
    request_body = CreateFolderRequest,
    responses(
        (status = 200, description = "Folder created", body = SuccessResponse),
        (status = 400, description = "Missing prefix or name", body = ErrorBody),
        (status = 500, description = "Backend failure", body = ErrorBody)
    )
)]
pub async fn create_folder(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateFolderRequest>,
) -> Result<Json<SuccessResponse>, BrowseError> {
    let result = state.browse.create_folder(&req.prefix, &req.name).await;
    record_operation("create_folder", result.is_ok());
    result?;
    Ok(SuccessResponse::ok())
}

/// `POST /browse/rename` -- Rename a key (copy, then delete the original).
#[utoipa::path(
    post,
    path = "/browse/rename",
    tag = "Browse",
    operation_id = "RenameKey",
    request_body = RenameRequest,
    responses(
        (status = 200, description = "Renamed", body = SuccessResponse),
        (status = 400, description = "Invalid keys", body = ErrorBody),
        (status = 500, description = "Backend failure or incomplete rename", body = ErrorBody)
    )
)]
pub async fn rename(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RenameRequest>,
) -> Result<Json<SuccessResponse>, BrowseError> {
    let result = state
        .browse
        .rename(&req.old_key, &req.new_key, req.recursive)
        .await;
    record_operation("rename", result.is_ok());
    result?;
    Ok(SuccessResponse::ok())
}

/// `POST /browse/upload` -- Upload one file under a prefix (multipart form).
#[utoipa::path(
    post,
    path = "/browse/upload",
    tag = "Browse",
    operation_id = "UploadFile",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Uploaded", body = SuccessResponse),
        (status = 400, description = "Missing prefix or file", body = ErrorBody),
        (status = 413, description = "File too large", body = ErrorBody),
        (status = 500, description = "Backend failure", body = ErrorBody)
    )
)]
pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<SuccessResponse>, BrowseError> {
    let (prefix, upload) = read_upload_form(multipart).await?;
    let size = upload.data.len() as u64;
    let result = state.browse.upload(&prefix, upload).await;
    record_operation("upload", result.is_ok());
    result?;
    metrics::counter!(BYTES_UPLOADED_TOTAL).increment(size);
    Ok(SuccessResponse::ok())
}

/// Pull the `prefix` text field and the `file` part out of the form.
async fn read_upload_form(mut multipart: Multipart) -> Result<(String, Upload), BrowseError> {
    let mut prefix = None;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        match field.name() {
            Some("prefix") => {
                prefix = Some(field.text().await.map_err(form_error)?);
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(|s| s.to_string());
                let data = field.bytes().await.map_err(form_error)?;
                upload = Some(Upload {
                    file_name,
                    data,
                    content_type,
                });
            }
            _ => {}
        }
    }

    match (prefix, upload) {
        (Some(prefix), Some(upload)) => Ok((prefix, upload)),
        _ => Err(BrowseError::validation(MISSING_UPLOAD_FIELDS)),
    }
}

const MISSING_UPLOAD_FIELDS: &str = "Missing prefix or file";

/// Map a multipart read failure. Hitting the body limit is reported as
/// such; anything else is a malformed form.
fn form_error(err: MultipartError) -> BrowseError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return BrowseError::PayloadTooLarge;
    }
    debug!("Malformed multipart body: {err}");
    BrowseError::validation(MISSING_UPLOAD_FIELDS)
}
