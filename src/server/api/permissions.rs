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
use crate::server::access::require_owner;
use crate::server::dto::{CreatePermissionRequest, UpdatePermissionRequest};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::store::Store;
use crate::types::{Document, Permission};

// Every operation here is owner-only: grantees hold capabilities on the
// document, never on its permission ledger.

fn load_owned_document(
    store: &dyn Store,
    id: &str,
    actor_id: &str,
) -> Result<Document, ApiError> {
    let document = store
        .get_document(id)
        .api_err("Failed to get document")?
        .or_not_found("Document not found")?;
    require_owner(&document, actor_id)?;
    Ok(document)
}

fn load_row(
    store: &dyn Store,
    document_id: &str,
    permission_id: &str,
) -> Result<Permission, ApiError> {
    let permission = store
        .get_permission_by_id(permission_id)
        .api_err("Failed to get permission")?
        .or_not_found("Permission not found")?;
    if permission.document_id != document_id {
        return Err(ApiError::not_found("Permission not found"));
    }
    Ok(permission)
}

pub async fn list_permissions(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let document = load_owned_document(store, &id, &auth.user.id)?;
    let permissions = store
        .list_permissions(&document.id)
        .api_err("Failed to list permissions")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(permissions)))
}

pub async fn create_permission(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreatePermissionRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let document = load_owned_document(store, &id, &auth.user.id)?;

    store
        .get_user(&req.user_id)
        .api_err("Failed to get user")?
        .or_not_found("User not found")?;

    if store
        .get_permission(&document.id, &req.user_id)
        .api_err("Failed to check permission")?
        .is_some()
    {
        return Err(ApiError::conflict(
            "A permission for this user already exists; update it instead",
        ));
    }

    let now = Utc::now();
    let permission = Permission {
        id: Uuid::new_v4().to_string(),
        document_id: document.id.clone(),
        user_id: req.user_id,
        can_read: req.can_read,
        can_write: req.can_write,
        can_delete: req.can_delete,
        created_at: now,
        updated_at: now,
    };

    // UNIQUE(document_id, user_id) backstops the pre-check under races.
    if let Err(e) = store.create_permission(&permission) {
        return Err(match e {
            Error::AlreadyExists => ApiError::conflict(
                "A permission for this user already exists; update it instead",
            ),
            _ => ApiError::internal("Failed to create permission"),
        });
    }

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(permission))))
}

pub async fn update_permission(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, permission_id)): Path<(String, String)>,
    Json(req): Json<UpdatePermissionRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let document = load_owned_document(store, &id, &auth.user.id)?;
    let mut permission = load_row(store, &document.id, &permission_id)?;

    if let Some(can_read) = req.can_read {
        permission.can_read = can_read;
    }
    if let Some(can_write) = req.can_write {
        permission.can_write = can_write;
    }
    if let Some(can_delete) = req.can_delete {
        permission.can_delete = can_delete;
    }
    permission.updated_at = Utc::now();

    store.update_permission(&permission).map_err(|e| match e {
        Error::NotFound => ApiError::not_found("Permission not found"),
        _ => ApiError::internal("Failed to update permission"),
    })?;

    Ok::<_, ApiError>(Json(ApiResponse::success(permission)))
}

pub async fn delete_permission(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, permission_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let document = load_owned_document(store, &id, &auth.user.id)?;
    let permission = load_row(store, &document.id, &permission_id)?;

    let deleted = store
        .delete_permission(&permission.id)
        .api_err("Failed to delete permission")?;
    if !deleted {
        return Err(ApiError::not_found("Permission not found"));
    }

    Ok::<_, ApiError>(Json(ApiResponse::success(
        json!({ "message": "Permission deleted" }),
    )))
}
