use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use super::schema::SCHEMA;
use super::{DocumentFilters, Store};
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory database, useful for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_tags(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_else(|e| {
        tracing::error!("Invalid tags JSON in database: '{}' - {}", s, e);
        Vec::new()
    })
}

fn parse_value(s: &str) -> serde_json::Value {
    serde_json::from_str(s).unwrap_or_else(|e| {
        tracing::error!("Invalid metadata JSON in database: '{}' - {}", s, e);
        serde_json::Value::Null
    })
}

/// Maps UNIQUE-constraint failures to the domain conflict error so that
/// concurrent conflicting inserts surface as `AlreadyExists`.
fn map_constraint(e: rusqlite::Error) -> Error {
    match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::AlreadyExists
        }
        e => Error::from(e),
    }
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        file_name: row.get(2)?,
        file_path: row.get(3)?,
        mime_type: row.get(4)?,
        file_size: row.get(5)?,
        tags: parse_tags(&row.get::<_, String>(6)?),
        created_at: parse_datetime(&row.get::<_, String>(7)?),
        updated_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

fn metadata_from_row(row: &Row<'_>) -> rusqlite::Result<MetadataEntry> {
    Ok(MetadataEntry {
        id: row.get(0)?,
        document_id: row.get(1)?,
        key: row.get(2)?,
        value: parse_value(&row.get::<_, String>(3)?),
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        updated_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

fn permission_from_row(row: &Row<'_>) -> rusqlite::Result<Permission> {
    Ok(Permission {
        id: row.get(0)?,
        document_id: row.get(1)?,
        user_id: row.get(2)?,
        can_read: row.get(3)?,
        can_write: row.get(4)?,
        can_delete: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn link_from_row(row: &Row<'_>) -> rusqlite::Result<DownloadLink> {
    Ok(DownloadLink {
        id: row.get(0)?,
        document_id: row.get(1)?,
        token: row.get(2)?,
        expires_at: parse_datetime(&row.get::<_, String>(3)?),
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

const DOCUMENT_COLUMNS: &str =
    "id, owner_id, file_name, file_path, mime_type, file_size, tags, created_at, updated_at";
const METADATA_COLUMNS: &str = "id, document_id, key, value, created_at, updated_at";
const PERMISSION_COLUMNS: &str =
    "id, document_id, user_id, can_read, can_write, can_delete, created_at, updated_at";
const LINK_COLUMNS: &str = "id, document_id, token, expires_at, created_at";

fn insert_permission(conn: &Connection, permission: &Permission) -> Result<()> {
    conn.execute(
        "INSERT INTO permissions (id, document_id, user_id, can_read, can_write, can_delete, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            permission.id,
            permission.document_id,
            permission.user_id,
            permission.can_read,
            permission.can_write,
            permission.can_delete,
            format_datetime(&permission.created_at),
            format_datetime(&permission.updated_at),
        ],
    )
    .map_err(map_constraint)?;
    Ok(())
}

fn insert_metadata(conn: &Connection, entry: &MetadataEntry) -> Result<()> {
    let value = serde_json::to_string(&entry.value).unwrap_or_else(|_| "null".to_string());
    conn.execute(
        "INSERT INTO document_metadata (id, document_id, key, value, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.id,
            entry.document_id,
            entry.key,
            value,
            format_datetime(&entry.created_at),
            format_datetime(&entry.updated_at),
        ],
    )
    .map_err(map_constraint)?;
    Ok(())
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO users (id, email, password_hash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.id,
                    user.email,
                    user.password_hash,
                    format_datetime(&user.created_at),
                    format_datetime(&user.updated_at),
                ],
            )
            .map_err(map_constraint)?;
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, email, password_hash, created_at, updated_at FROM users WHERE id = ?1",
            params![id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    password_hash: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                    updated_at: parse_datetime(&row.get::<_, String>(4)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, email, password_hash, created_at, updated_at FROM users WHERE email = ?1",
            params![email],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    password_hash: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                    updated_at: parse_datetime(&row.get::<_, String>(4)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    // Document operations

    fn create_document(
        &self,
        document: &Document,
        owner_grant: &Permission,
        metadata: &[MetadataEntry],
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let tags = serde_json::to_string(&document.tags).unwrap_or_else(|_| "[]".to_string());
        tx.execute(
            "INSERT INTO documents (id, owner_id, file_name, file_path, mime_type, file_size, tags, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                document.id,
                document.owner_id,
                document.file_name,
                document.file_path,
                document.mime_type,
                document.file_size,
                tags,
                format_datetime(&document.created_at),
                format_datetime(&document.updated_at),
            ],
        )
        .map_err(map_constraint)?;

        insert_permission(&tx, owner_grant)?;
        for entry in metadata {
            insert_metadata(&tx, entry)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
            params![id],
            document_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_documents_by_owner(
        &self,
        owner_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Document>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE owner_id = ?1
             ORDER BY created_at DESC, id LIMIT ?2 OFFSET ?3"
        ))?;

        let rows = stmt.query_map(params![owner_id, limit, offset], document_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_documents_by_owner(&self, owner_id: &str) -> Result<i64> {
        let conn = self.conn();
        conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE owner_id = ?1",
            params![owner_id],
            |row| row.get(0),
        )
        .map_err(Error::from)
    }

    fn update_document(&self, document: &Document) -> Result<()> {
        let tags = serde_json::to_string(&document.tags).unwrap_or_else(|_| "[]".to_string());
        let rows = self.conn().execute(
            "UPDATE documents SET file_name = ?1, tags = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                document.file_name,
                tags,
                format_datetime(&document.updated_at),
                document.id
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_document(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        // Referential cleanup is core-owned; FK cascades are only a backstop.
        tx.execute(
            "DELETE FROM document_metadata WHERE document_id = ?1",
            params![id],
        )?;
        tx.execute("DELETE FROM permissions WHERE document_id = ?1", params![id])?;
        tx.execute(
            "DELETE FROM download_links WHERE document_id = ?1",
            params![id],
        )?;
        let rows = tx.execute("DELETE FROM documents WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(rows > 0)
    }

    fn search_documents(&self, filters: &DocumentFilters) -> Result<Vec<Document>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<String> = Vec::new();

        if let Some(ref owner_id) = filters.owner_id {
            clauses.push("d.owner_id = ?".to_string());
            args.push(owner_id.clone());
        }
        if let Some(ref fragment) = filters.file_name {
            clauses.push("d.file_name LIKE ?".to_string());
            args.push(format!("%{fragment}%"));
        }
        // EXISTS per requested pair keeps each document to a single result
        // row regardless of how many metadata entries it matches.
        for (key, value) in &filters.metadata {
            clauses.push(
                "EXISTS (SELECT 1 FROM document_metadata m
                 WHERE m.document_id = d.id AND m.key = ? AND m.value = ?)"
                    .to_string(),
            );
            args.push(key.clone());
            args.push(serde_json::to_string(value).unwrap_or_else(|_| "null".to_string()));
        }

        let mut sql = format!(
            "SELECT {} FROM documents d",
            DOCUMENT_COLUMNS
                .split(", ")
                .map(|c| format!("d.{c}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY d.created_at DESC, d.id");

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), document_from_row)?;
        let documents = rows.collect::<std::result::Result<Vec<_>, _>>()?;

        // Tag containment is checked here; tags live in a JSON column.
        Ok(documents
            .into_iter()
            .filter(|d| filters.tags.iter().all(|t| d.tags.contains(t)))
            .collect())
    }

    // Metadata operations

    fn create_metadata(&self, entry: &MetadataEntry) -> Result<()> {
        insert_metadata(&self.conn(), entry)
    }

    fn get_metadata_by_id(&self, id: &str) -> Result<Option<MetadataEntry>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {METADATA_COLUMNS} FROM document_metadata WHERE id = ?1"),
            params![id],
            metadata_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_metadata_by_key(&self, document_id: &str, key: &str) -> Result<Option<MetadataEntry>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {METADATA_COLUMNS} FROM document_metadata
                 WHERE document_id = ?1 AND key = ?2"
            ),
            params![document_id, key],
            metadata_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_metadata(&self, document_id: &str) -> Result<Vec<MetadataEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {METADATA_COLUMNS} FROM document_metadata
             WHERE document_id = ?1 ORDER BY key"
        ))?;

        let rows = stmt.query_map(params![document_id], metadata_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_metadata(&self, entry: &MetadataEntry) -> Result<()> {
        let value = serde_json::to_string(&entry.value).unwrap_or_else(|_| "null".to_string());
        let rows = self.conn().execute(
            "UPDATE document_metadata SET value = ?1, updated_at = ?2 WHERE id = ?3",
            params![value, format_datetime(&entry.updated_at), entry.id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_metadata(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM document_metadata WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Permission operations

    fn create_permission(&self, permission: &Permission) -> Result<()> {
        insert_permission(&self.conn(), permission)
    }

    fn get_permission_by_id(&self, id: &str) -> Result<Option<Permission>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = ?1"),
            params![id],
            permission_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_permission(&self, document_id: &str, user_id: &str) -> Result<Option<Permission>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {PERMISSION_COLUMNS} FROM permissions
                 WHERE document_id = ?1 AND user_id = ?2"
            ),
            params![document_id, user_id],
            permission_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_permissions(&self, document_id: &str) -> Result<Vec<Permission>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions
             WHERE document_id = ?1 ORDER BY created_at, id"
        ))?;

        let rows = stmt.query_map(params![document_id], permission_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_permission(&self, permission: &Permission) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE permissions SET can_read = ?1, can_write = ?2, can_delete = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                permission.can_read,
                permission.can_write,
                permission.can_delete,
                format_datetime(&permission.updated_at),
                permission.id
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_permission(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM permissions WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Download link operations

    fn create_download_link(&self, link: &DownloadLink) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO download_links (id, document_id, token, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    link.id,
                    link.document_id,
                    link.token,
                    format_datetime(&link.expires_at),
                    format_datetime(&link.created_at),
                ],
            )
            .map_err(map_constraint)?;
        Ok(())
    }

    fn get_download_link_by_token(&self, token: &str) -> Result<Option<DownloadLink>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {LINK_COLUMNS} FROM download_links WHERE token = ?1"),
            params![token],
            link_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_download_links(&self, document_id: &str) -> Result<Vec<DownloadLink>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {LINK_COLUMNS} FROM download_links
             WHERE document_id = ?1 ORDER BY created_at, id"
        ))?;

        let rows = stmt.query_map(params![document_id], link_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_download_link(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM download_links WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn delete_expired_links(&self, now: DateTime<Utc>) -> Result<usize> {
        let rows = self.conn().execute(
            "DELETE FROM download_links WHERE expires_at <= ?1",
            params![format_datetime(&now)],
        )?;
        Ok(rows)
    }
}
