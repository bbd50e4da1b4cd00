mod auth;
mod documents;
mod downloads;
mod metadata;
mod permissions;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, patch, post},
};

use crate::server::AppState;

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Auth (public)
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        // Documents
        .route("/documents", post(documents::upload_document))
        .route("/documents", get(documents::list_documents))
        .route("/documents/search", get(documents::search_documents))
        .route("/documents/{id}", get(documents::get_document))
        .route("/documents/{id}", patch(documents::update_document))
        .route("/documents/{id}", delete(documents::delete_document))
        // Metadata (scoped to a document)
        .route("/documents/{id}/metadata", get(metadata::list_metadata))
        .route("/documents/{id}/metadata", post(metadata::create_metadata))
        .route(
            "/documents/{id}/metadata/key/{key}",
            get(metadata::get_metadata_by_key),
        )
        .route(
            "/documents/{id}/metadata/{entry_id}",
            patch(metadata::update_metadata),
        )
        .route(
            "/documents/{id}/metadata/{entry_id}",
            delete(metadata::delete_metadata),
        )
        // Permissions (owner-only)
        .route(
            "/documents/{id}/permissions",
            get(permissions::list_permissions),
        )
        .route(
            "/documents/{id}/permissions",
            post(permissions::create_permission),
        )
        .route(
            "/documents/{id}/permissions/{permission_id}",
            patch(permissions::update_permission),
        )
        .route(
            "/documents/{id}/permissions/{permission_id}",
            delete(permissions::delete_permission),
        )
        // Download links
        .route(
            "/documents/{id}/download-links",
            get(downloads::list_download_links),
        )
        .route(
            "/documents/{id}/download-links",
            post(downloads::create_download_link),
        )
        .route(
            "/documents/{id}/download-links/{link_id}",
            delete(downloads::delete_download_link),
        )
        // Redemption (public; token possession is the trust boundary)
        .route("/download/{token}", get(downloads::redeem_download_link))
}
