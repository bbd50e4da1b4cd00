use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::auth::RequireUser;
use crate::error::Error;
use crate::server::AppState;
use crate::server::access::require_capability;
use crate::server::dto::{CreateMetadataRequest, UpdateMetadataRequest};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::validate_metadata_key;
use crate::store::Store;
use crate::types::{Capability, Document, MetadataEntry};

fn load_document(store: &dyn Store, id: &str) -> Result<Document, ApiError> {
    store
        .get_document(id)
        .api_err("Failed to get document")?
        .or_not_found("Document not found")
}

/// Resolves an entry id within the addressed document. An entry that exists
/// under a different document is reported as absent, not as forbidden.
fn load_entry(
    store: &dyn Store,
    document_id: &str,
    entry_id: &str,
) -> Result<MetadataEntry, ApiError> {
    let entry = store
        .get_metadata_by_id(entry_id)
        .api_err("Failed to get metadata")?
        .or_not_found("Metadata entry not found")?;
    if entry.document_id != document_id {
        return Err(ApiError::not_found("Metadata entry not found"));
    }
    Ok(entry)
}

pub async fn list_metadata(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let document = load_document(store, &id)?;
    require_capability(store, &document, &auth.user.id, Capability::Read)?;

    let entries = store
        .list_metadata(&document.id)
        .api_err("Failed to list metadata")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(entries)))
}

pub async fn get_metadata_by_key(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, key)): Path<(String, String)>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let document = load_document(store, &id)?;
    require_capability(store, &document, &auth.user.id, Capability::Read)?;

    let entry = store
        .get_metadata_by_key(&document.id, &key)
        .api_err("Failed to get metadata")?
        .or_not_found("Metadata entry not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(entry)))
}

pub async fn create_metadata(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreateMetadataRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let document = load_document(store, &id)?;
    require_capability(store, &document, &auth.user.id, Capability::Write)?;

    validate_metadata_key(&req.key)?;

    let now = Utc::now();
    let entry = MetadataEntry {
        id: Uuid::new_v4().to_string(),
        document_id: document.id.clone(),
        key: req.key,
        value: req.value,
        created_at: now,
        updated_at: now,
    };

    // UNIQUE(document_id, key) turns a concurrent duplicate into a conflict
    // instead of a second row.
    if let Err(e) = store.create_metadata(&entry) {
        return Err(match e {
            Error::AlreadyExists => {
                ApiError::conflict("A metadata entry with this key already exists")
            }
            _ => ApiError::internal("Failed to create metadata"),
        });
    }

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(entry))))
}

pub async fn update_metadata(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, entry_id)): Path<(String, String)>,
    Json(req): Json<UpdateMetadataRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let document = load_document(store, &id)?;
    require_capability(store, &document, &auth.user.id, Capability::Write)?;

    // Keys are immutable; updates replace the value only.
    let mut entry = load_entry(store, &document.id, &entry_id)?;
    entry.value = req.value;
    entry.updated_at = Utc::now();

    store.update_metadata(&entry).map_err(|e| match e {
        Error::NotFound => ApiError::not_found("Metadata entry not found"),
        _ => ApiError::internal("Failed to update metadata"),
    })?;

    Ok::<_, ApiError>(Json(ApiResponse::success(entry)))
}

pub async fn delete_metadata(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, entry_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let document = load_document(store, &id)?;
    require_capability(store, &document, &auth.user.id, Capability::Write)?;

    let entry = load_entry(store, &document.id, &entry_id)?;

    let deleted = store
        .delete_metadata(&entry.id)
        .api_err("Failed to delete metadata")?;
    if !deleted {
        return Err(ApiError::not_found("Metadata entry not found"));
    }

    Ok::<_, ApiError>(Json(ApiResponse::success(
        json!({ "message": "Metadata entry deleted" }),
    )))
}
