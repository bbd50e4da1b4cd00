//! Download link issuance and redemption.
//!
//! A link is an opaque bearer token bound to one document and an expiry
//! instant. Possession of the token is the entire trust boundary on the
//! redemption path, so tokens carry 256 bits of entropy and expiry is
//! enforced on every redemption. Redemption does not consume a live link;
//! an expired link is purged by the redemption attempt that discovers it.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use uuid::Uuid;

use crate::error::Result;
use crate::store::Store;
use crate::types::{Document, DownloadLink};

const TOKEN_BYTES: usize = 32;

/// Generates a fresh 32-byte random token, hex encoded.
#[must_use]
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Mints a new link for a document. Each issuance gets a fresh token;
/// earlier links for the same document stay live until they expire.
pub fn issue(
    store: &dyn Store,
    document_id: &str,
    ttl_hours: i64,
    now: DateTime<Utc>,
) -> Result<DownloadLink> {
    let link = DownloadLink {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        token: generate_token(),
        expires_at: now + Duration::hours(ttl_hours),
        created_at: now,
    };

    store.create_download_link(&link)?;
    Ok(link)
}

/// Resolves a token to its document, or `None` for anything that must not
/// be served: unknown tokens, expired links, and links whose document is
/// gone are deliberately indistinguishable to the caller.
pub fn redeem(store: &dyn Store, token: &str, now: DateTime<Utc>) -> Result<Option<Document>> {
    let Some(link) = store.get_download_link_by_token(token)? else {
        return Ok(None);
    };

    if link.is_expired(now) {
        // Lazy cleanup: the redemption attempt that finds the expiry purges
        // the stale row.
        store.delete_download_link(&link.id)?;
        return Ok(None);
    }

    store.get_document(&link.document_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::{Permission, User};

    fn seeded_store() -> (SqliteStore, Document) {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();

        let now = Utc::now();
        let user = User {
            id: "owner".to_string(),
            email: "owner@example.com".to_string(),
            password_hash: "$argon2id$test".to_string(),
            created_at: now,
            updated_at: now,
        };
        store.create_user(&user).unwrap();

        let document = Document {
            id: "doc".to_string(),
            owner_id: user.id.clone(),
            file_name: "report.pdf".to_string(),
            file_path: "owner/report.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            file_size: 4,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let grant = Permission {
            id: "perm".to_string(),
            document_id: document.id.clone(),
            user_id: user.id.clone(),
            can_read: true,
            can_write: true,
            can_delete: true,
            created_at: now,
            updated_at: now,
        };
        store.create_document(&document, &grant, &[]).unwrap();

        (store, document)
    }

    #[test]
    fn test_token_entropy_encoding() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_issue_and_redeem() {
        let (store, document) = seeded_store();
        let now = Utc::now();

        let link = issue(&store, &document.id, 1, now).unwrap();
        let resolved = redeem(&store, &link.token, now).unwrap().unwrap();
        assert_eq!(resolved.id, document.id);

        // Redemption does not consume a live link.
        assert!(redeem(&store, &link.token, now).unwrap().is_some());
    }

    #[test]
    fn test_concurrent_links_stay_independent() {
        let (store, document) = seeded_store();
        let now = Utc::now();

        let first = issue(&store, &document.id, 1, now).unwrap();
        let second = issue(&store, &document.id, 2, now).unwrap();
        assert_ne!(first.token, second.token);

        assert!(redeem(&store, &first.token, now).unwrap().is_some());
        assert!(redeem(&store, &second.token, now).unwrap().is_some());
    }

    #[test]
    fn test_expired_link_denied_and_purged() {
        let (store, document) = seeded_store();
        let now = Utc::now();

        let link = issue(&store, &document.id, 1, now - Duration::hours(2)).unwrap();
        assert!(redeem(&store, &link.token, now).unwrap().is_none());

        // First redemption after expiry removed the row.
        assert!(store.get_download_link_by_token(&link.token).unwrap().is_none());
    }

    #[test]
    fn test_unknown_and_expired_look_identical() {
        let (store, document) = seeded_store();
        let now = Utc::now();

        let expired = issue(&store, &document.id, 1, now - Duration::hours(2)).unwrap();
        let unknown = generate_token();

        let a = redeem(&store, &expired.token, now).unwrap();
        let b = redeem(&store, &unknown, now).unwrap();
        assert!(a.is_none() && b.is_none());
    }

    #[test]
    fn test_expiry_boundary() {
        let (store, document) = seeded_store();
        let now = Utc::now();

        let link = issue(&store, &document.id, 1, now - Duration::hours(1)).unwrap();
        // expires_at == now is already expired; validity is strict.
        assert!(redeem(&store, &link.token, now).unwrap().is_none());
    }
}
