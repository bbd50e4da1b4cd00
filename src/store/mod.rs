mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Filters for document search. All present filters must match; a document
/// matching several metadata rows still appears once in the result set.
#[derive(Debug, Default, Clone)]
pub struct DocumentFilters {
    pub owner_id: Option<String>,
    /// Case-insensitive substring match on the file name.
    pub file_name: Option<String>,
    /// Every requested tag must be present on the document.
    pub tags: Vec<String>,
    /// Every (key, value) pair must have a matching metadata entry.
    pub metadata: Vec<(String, serde_json::Value)>,
}

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    // Document operations
    /// Creates a document together with the owner's explicit full-capability
    /// permission row and any inline metadata entries, atomically.
    fn create_document(
        &self,
        document: &Document,
        owner_grant: &Permission,
        metadata: &[MetadataEntry],
    ) -> Result<()>;
    fn get_document(&self, id: &str) -> Result<Option<Document>>;
    fn list_documents_by_owner(
        &self,
        owner_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Document>>;
    fn count_documents_by_owner(&self, owner_id: &str) -> Result<i64>;
    fn update_document(&self, document: &Document) -> Result<()>;
    /// Deletes a document and all of its metadata, permission, and download
    /// link records in one transaction. Returns false if it did not exist.
    fn delete_document(&self, id: &str) -> Result<bool>;
    fn search_documents(&self, filters: &DocumentFilters) -> Result<Vec<Document>>;

    // Metadata operations
    fn create_metadata(&self, entry: &MetadataEntry) -> Result<()>;
    fn get_metadata_by_id(&self, id: &str) -> Result<Option<MetadataEntry>>;
    fn get_metadata_by_key(&self, document_id: &str, key: &str) -> Result<Option<MetadataEntry>>;
    fn list_metadata(&self, document_id: &str) -> Result<Vec<MetadataEntry>>;
    fn update_metadata(&self, entry: &MetadataEntry) -> Result<()>;
    fn delete_metadata(&self, id: &str) -> Result<bool>;

    // Permission operations
    fn create_permission(&self, permission: &Permission) -> Result<()>;
    fn get_permission_by_id(&self, id: &str) -> Result<Option<Permission>>;
    fn get_permission(&self, document_id: &str, user_id: &str) -> Result<Option<Permission>>;
    fn list_permissions(&self, document_id: &str) -> Result<Vec<Permission>>;
    fn update_permission(&self, permission: &Permission) -> Result<()>;
    fn delete_permission(&self, id: &str) -> Result<bool>;

    // Download link operations
    fn create_download_link(&self, link: &DownloadLink) -> Result<()>;
    fn get_download_link_by_token(&self, token: &str) -> Result<Option<DownloadLink>>;
    fn list_download_links(&self, document_id: &str) -> Result<Vec<DownloadLink>>;
    fn delete_download_link(&self, id: &str) -> Result<bool>;
    /// Removes every link whose expiry is at or before `now`. Returns the
    /// number of rows purged.
    fn delete_expired_links(&self, now: DateTime<Utc>) -> Result<usize>;
}
