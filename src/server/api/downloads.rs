use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use tokio_util::io::ReaderStream;

use crate::auth::RequireUser;
use crate::links;
use crate::server::AppState;
use crate::server::access::{require_capability, require_owner};
use crate::server::dto::{CreateDownloadLinkRequest, DownloadLinkResponse};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::{DEFAULT_LINK_TTL_HOURS, validate_link_ttl};
use crate::types::Capability;

/// Every redemption failure collapses to this one response so callers
/// cannot probe which tokens exist.
const REDEMPTION_FAILED: &str = "Invalid or expired download link";

pub async fn list_download_links(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let document = store
        .get_document(&id)
        .api_err("Failed to get document")?
        .or_not_found("Document not found")?;
    require_owner(&document, &auth.user.id)?;

    // Expired rows that have not been lazily purged yet still show up here;
    // the owner sees the ledger as stored.
    let links = store
        .list_download_links(&document.id)
        .api_err("Failed to list download links")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(links)))
}

pub async fn create_download_link(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreateDownloadLinkRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let document = store
        .get_document(&id)
        .api_err("Failed to get document")?
        .or_not_found("Document not found")?;
    require_capability(store, &document, &auth.user.id, Capability::Read)?;

    let ttl_hours = req.expires_in_hours.unwrap_or(DEFAULT_LINK_TTL_HOURS);
    validate_link_ttl(ttl_hours)?;

    let link = links::issue(store, &document.id, ttl_hours, Utc::now())
        .map_err(|_| ApiError::internal("Failed to create download link"))?;

    let url = format!("/api/v1/download/{}", link.token);

    Ok::<_, ApiError>((
        StatusCode::CREATED,
        Json(ApiResponse::success(DownloadLinkResponse { link, url })),
    ))
}

pub async fn delete_download_link(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, link_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let document = store
        .get_document(&id)
        .api_err("Failed to get document")?
        .or_not_found("Document not found")?;
    require_owner(&document, &auth.user.id)?;

    let links = store
        .list_download_links(&document.id)
        .api_err("Failed to list download links")?;
    if !links.iter().any(|l| l.id == link_id) {
        return Err(ApiError::not_found("Download link not found"));
    }

    let deleted = store
        .delete_download_link(&link_id)
        .api_err("Failed to delete download link")?;
    if !deleted {
        return Err(ApiError::not_found("Download link not found"));
    }

    Ok::<_, ApiError>(Json(ApiResponse::success(
        json!({ "message": "Download link deleted" }),
    )))
}

/// Public redemption endpoint; possession of the token is the entire
/// trust boundary.
pub async fn redeem_download_link(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> impl IntoResponse {
    let document = links::redeem(state.store.as_ref(), &token, Utc::now())
        .map_err(|_| ApiError::internal("Failed to redeem download link"))?
        .ok_or_else(|| ApiError::not_found(REDEMPTION_FAILED))?;

    // A missing blob must be indistinguishable from an unknown token.
    let file = state
        .files
        .open(&document.file_path)
        .await
        .map_err(|_| ApiError::not_found(REDEMPTION_FAILED))?;

    let headers = [
        (header::CONTENT_TYPE, document.mime_type.clone()),
        (header::CONTENT_LENGTH, document.file_size.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", document.file_name),
        ),
    ];

    Ok::<_, ApiError>((headers, Body::from_stream(ReaderStream::new(file))))
}
