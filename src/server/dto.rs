use serde::{Deserialize, Serialize};

use crate::types::DownloadLink;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserSummary,
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocumentRequest {
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchDocumentsParams {
    #[serde(default)]
    pub file_name: Option<String>,
    /// Comma-separated list of tags that must all be present.
    #[serde(default)]
    pub tags: Option<String>,
    /// JSON object of metadata key/value pairs that must all match.
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMetadataRequest {
    pub key: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMetadataRequest {
    pub value: serde_json::Value,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CreatePermissionRequest {
    pub user_id: String,
    #[serde(default = "default_true")]
    pub can_read: bool,
    #[serde(default)]
    pub can_write: bool,
    #[serde(default)]
    pub can_delete: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePermissionRequest {
    #[serde(default)]
    pub can_read: Option<bool>,
    #[serde(default)]
    pub can_write: Option<bool>,
    #[serde(default)]
    pub can_delete: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateDownloadLinkRequest {
    #[serde(default)]
    pub expires_in_hours: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DownloadLinkResponse {
    pub link: DownloadLink,
    pub url: String,
}
