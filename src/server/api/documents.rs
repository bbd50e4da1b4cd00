use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
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
use crate::server::dto::{PageParams, SearchDocumentsParams, UpdateDocumentRequest};
use crate::server::response::{
    ApiError, ApiResponse, PagedResponse, StoreOptionExt, StoreResultExt, paginate_page,
};
use crate::server::validation::{
    validate_file_name, validate_metadata_key, validate_pagination, validate_tags,
};
use crate::store::DocumentFilters;
use crate::types::{Capability, Document, MetadataEntry, Permission};

const MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024;

struct Upload {
    content: Vec<u8>,
    file_name: String,
    mime_type: String,
    tags: Vec<String>,
    metadata: Vec<(String, serde_json::Value)>,
}

async fn parse_upload(multipart: &mut Multipart) -> Result<Upload, ApiError> {
    let mut content: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut mime_type: Option<String> = None;
    let mut tags: Vec<String> = Vec::new();
    let mut metadata: Vec<(String, serde_json::Value)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart: {e}")))?
    {
        match field.name() {
            Some("file") => {
                file_name = field.file_name().map(str::to_string);
                mime_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;
                if data.len() > MAX_UPLOAD_SIZE {
                    return Err(ApiError::bad_request(format!(
                        "File size ({} bytes) exceeds maximum allowed size ({MAX_UPLOAD_SIZE} bytes)",
                        data.len()
                    )));
                }
                content = Some(data.to_vec());
            }
            Some("tags") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read tags: {e}")))?;
                tags = serde_json::from_str(&text)
                    .map_err(|_| ApiError::bad_request("tags must be a JSON array of strings"))?;
            }
            Some("metadata") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read metadata: {e}")))?;
                let object: serde_json::Map<String, serde_json::Value> =
                    serde_json::from_str(&text)
                        .map_err(|_| ApiError::bad_request("metadata must be a JSON object"))?;
                metadata = object.into_iter().collect();
            }
            _ => {}
        }
    }

    let content = content.ok_or_else(|| ApiError::bad_request("File field is required"))?;
    let file_name =
        file_name.ok_or_else(|| ApiError::bad_request("File field must carry a filename"))?;
    let mime_type = mime_type.unwrap_or_else(|| "application/octet-stream".to_string());

    validate_file_name(&file_name)?;
    validate_tags(&tags)?;
    for (key, _) in &metadata {
        validate_metadata_key(key)?;
    }

    Ok(Upload {
        content,
        file_name,
        mime_type,
        tags,
        metadata,
    })
}

pub async fn upload_document(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let upload = parse_upload(&mut multipart).await?;

    let pointer = state
        .files
        .put(&upload.content, &auth.user.id, &upload.file_name)
        .await
        .map_err(|_| ApiError::internal("Failed to store file"))?;

    let now = Utc::now();
    let document = Document {
        id: Uuid::new_v4().to_string(),
        owner_id: auth.user.id.clone(),
        file_name: upload.file_name,
        file_path: pointer.clone(),
        mime_type: upload.mime_type,
        file_size: upload.content.len() as i64,
        tags: upload.tags,
        created_at: now,
        updated_at: now,
    };

    // The owner gets an explicit full-capability row; ownership itself is
    // still what authorization checks first.
    let owner_grant = Permission {
        id: Uuid::new_v4().to_string(),
        document_id: document.id.clone(),
        user_id: auth.user.id.clone(),
        can_read: true,
        can_write: true,
        can_delete: true,
        created_at: now,
        updated_at: now,
    };

    let entries: Vec<MetadataEntry> = upload
        .metadata
        .into_iter()
        .map(|(key, value)| MetadataEntry {
            id: Uuid::new_v4().to_string(),
            document_id: document.id.clone(),
            key,
            value,
            created_at: now,
            updated_at: now,
        })
        .collect();

    if let Err(e) = state.store.create_document(&document, &owner_grant, &entries) {
        // The registry is the source of truth; a blob without a document
        // row must not survive the failed transaction.
        let _ = state.files.delete(&pointer).await;
        return Err(match e {
            Error::AlreadyExists => ApiError::conflict("Duplicate metadata key"),
            _ => ApiError::internal("Failed to create document"),
        });
    }

    Ok::<_, ApiError>((
        StatusCode::CREATED,
        Json(ApiResponse::success(document)),
    ))
}

pub async fn list_documents(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    let (page, limit) = validate_pagination(params.page, params.limit)?;
    let store = state.store.as_ref();

    let total = store
        .count_documents_by_owner(&auth.user.id)
        .api_err("Failed to count documents")?;
    let documents = store
        .list_documents_by_owner(&auth.user.id, limit, (page - 1) * limit)
        .api_err("Failed to list documents")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(PagedResponse::new(
        documents, page, limit, total,
    ))))
}

pub async fn search_documents(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchDocumentsParams>,
) -> impl IntoResponse {
    let (page, limit) = validate_pagination(params.page, params.limit)?;

    let tags: Vec<String> = params
        .tags
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    let metadata: Vec<(String, serde_json::Value)> = match params.metadata.as_deref() {
        Some(raw) => {
            let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(raw)
                .map_err(|_| ApiError::bad_request("metadata must be a JSON object"))?;
            object.into_iter().collect()
        }
        None => Vec::new(),
    };

    let filters = DocumentFilters {
        owner_id: Some(auth.user.id.clone()),
        file_name: params.file_name,
        tags,
        metadata,
    };

    let matches = state
        .store
        .search_documents(&filters)
        .api_err("Failed to search documents")?;

    let (documents, total) = paginate_page(matches, page, limit);

    Ok::<_, ApiError>(Json(ApiResponse::success(PagedResponse::new(
        documents, page, limit, total,
    ))))
}

pub async fn get_document(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let document = store
        .get_document(&id)
        .api_err("Failed to get document")?
        .or_not_found("Document not found")?;

    require_capability(store, &document, &auth.user.id, Capability::Read)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(document)))
}

pub async fn update_document(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateDocumentRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let mut document = store
        .get_document(&id)
        .api_err("Failed to get document")?
        .or_not_found("Document not found")?;

    require_capability(store, &document, &auth.user.id, Capability::Write)?;

    if let Some(file_name) = req.file_name {
        validate_file_name(&file_name)?;
        document.file_name = file_name;
    }
    if let Some(tags) = req.tags {
        validate_tags(&tags)?;
        document.tags = tags;
    }
    document.updated_at = Utc::now();

    // A concurrent delete between the read and this write loses the row.
    store.update_document(&document).map_err(|e| match e {
        Error::NotFound => ApiError::not_found("Document not found"),
        _ => ApiError::internal("Failed to update document"),
    })?;

    Ok::<_, ApiError>(Json(ApiResponse::success(document)))
}

pub async fn delete_document(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let document = store
        .get_document(&id)
        .api_err("Failed to get document")?
        .or_not_found("Document not found")?;

    require_capability(store, &document, &auth.user.id, Capability::Delete)?;

    // A concurrent delete may win the race between the read above and this
    // cascade; the loser reports the document as already gone.
    let deleted = store
        .delete_document(&document.id)
        .api_err("Failed to delete document")?;
    if !deleted {
        return Err(ApiError::not_found("Document not found"));
    }

    if let Err(e) = state.files.delete(&document.file_path).await {
        tracing::error!("Failed to remove blob {}: {}", document.file_path, e);
    }

    Ok::<_, ApiError>(Json(ApiResponse::success(
        json!({ "message": "Document deleted" }),
    )))
}
