//! Store-level invariant tests against an in-memory SQLite database.

use chrono::{Duration, Utc};
use uuid::Uuid;

use docvault::error::Error;
use docvault::store::{DocumentFilters, SqliteStore, Store};
use docvault::types::{Document, DownloadLink, MetadataEntry, Permission, User};

fn store() -> SqliteStore {
    let store = SqliteStore::open_in_memory().expect("open store");
    store.initialize().expect("initialize schema");
    store
}

fn user(id: &str) -> User {
    let now = Utc::now();
    User {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        password_hash: "$argon2id$test".to_string(),
        created_at: now,
        updated_at: now,
    }
}

fn document(id: &str, owner_id: &str, file_name: &str, tags: &[&str]) -> Document {
    let now = Utc::now();
    Document {
        id: id.to_string(),
        owner_id: owner_id.to_string(),
        file_name: file_name.to_string(),
        file_path: format!("{owner_id}/{id}.bin"),
        mime_type: "application/octet-stream".to_string(),
        file_size: 42,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        created_at: now,
        updated_at: now,
    }
}

fn owner_grant(document: &Document) -> Permission {
    permission(&Uuid::new_v4().to_string(), &document.id, &document.owner_id, true, true, true)
}

fn permission(
    id: &str,
    document_id: &str,
    user_id: &str,
    read: bool,
    write: bool,
    delete: bool,
) -> Permission {
    let now = Utc::now();
    Permission {
        id: id.to_string(),
        document_id: document_id.to_string(),
        user_id: user_id.to_string(),
        can_read: read,
        can_write: write,
        can_delete: delete,
        created_at: now,
        updated_at: now,
    }
}

fn entry(id: &str, document_id: &str, key: &str, value: serde_json::Value) -> MetadataEntry {
    let now = Utc::now();
    MetadataEntry {
        id: id.to_string(),
        document_id: document_id.to_string(),
        key: key.to_string(),
        value,
        created_at: now,
        updated_at: now,
    }
}

fn link(document_id: &str, ttl_hours: i64) -> DownloadLink {
    let now = Utc::now();
    DownloadLink {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        token: hex::encode(Uuid::new_v4().as_bytes()),
        expires_at: now + Duration::hours(ttl_hours),
        created_at: now,
    }
}

fn seed_document(store: &SqliteStore, id: &str, owner_id: &str) -> Document {
    let doc = document(id, owner_id, &format!("{id}.bin"), &[]);
    store
        .create_document(&doc, &owner_grant(&doc), &[])
        .expect("create document");
    doc
}

#[test]
fn test_duplicate_email_rejected() {
    let store = store();
    store.create_user(&user("alice")).unwrap();

    let mut dup = user("alice2");
    dup.email = "alice@example.com".to_string();
    assert!(matches!(store.create_user(&dup), Err(Error::AlreadyExists)));
}

#[test]
fn test_one_permission_row_per_document_user_pair() {
    let store = store();
    store.create_user(&user("alice")).unwrap();
    store.create_user(&user("bob")).unwrap();
    let doc = seed_document(&store, "doc", "alice");

    store
        .create_permission(&permission("p1", &doc.id, "bob", true, false, false))
        .unwrap();
    let second = store.create_permission(&permission("p2", &doc.id, "bob", true, true, false));
    assert!(matches!(second, Err(Error::AlreadyExists)));

    // The original row is untouched by the failed insert.
    let row = store.get_permission(&doc.id, "bob").unwrap().unwrap();
    assert_eq!(row.id, "p1");
    assert!(!row.can_write);
}

#[test]
fn test_metadata_key_unique_per_document() {
    let store = store();
    store.create_user(&user("alice")).unwrap();
    let doc = seed_document(&store, "doc", "alice");
    let other = seed_document(&store, "other", "alice");

    store
        .create_metadata(&entry("m1", &doc.id, "project", serde_json::json!("apollo")))
        .unwrap();
    let dup = store.create_metadata(&entry("m2", &doc.id, "project", serde_json::json!("x")));
    assert!(matches!(dup, Err(Error::AlreadyExists)));

    // The same key under a different document is fine.
    store
        .create_metadata(&entry("m3", &other.id, "project", serde_json::json!("gemini")))
        .unwrap();
}

#[test]
fn test_document_creation_is_atomic() {
    let store = store();
    store.create_user(&user("alice")).unwrap();

    let doc = document("doc", "alice", "doc.bin", &[]);
    let entries = vec![
        entry("m1", &doc.id, "project", serde_json::json!("apollo")),
        entry("m2", &doc.id, "project", serde_json::json!("dup-key")),
    ];
    let result = store.create_document(&doc, &owner_grant(&doc), &entries);
    assert!(matches!(result, Err(Error::AlreadyExists)));

    // Nothing from the failed transaction survives.
    assert!(store.get_document(&doc.id).unwrap().is_none());
    assert!(store.get_permission(&doc.id, "alice").unwrap().is_none());
}

#[test]
fn test_delete_document_cascades() {
    let store = store();
    store.create_user(&user("alice")).unwrap();
    store.create_user(&user("bob")).unwrap();

    let doc = document("doc", "alice", "doc.bin", &[]);
    let entries = vec![entry("m1", &doc.id, "project", serde_json::json!("apollo"))];
    store.create_document(&doc, &owner_grant(&doc), &entries).unwrap();
    store
        .create_permission(&permission("p-bob", &doc.id, "bob", true, false, false))
        .unwrap();
    let dl = link(&doc.id, 24);
    store.create_download_link(&dl).unwrap();

    assert!(store.delete_document(&doc.id).unwrap());

    assert!(store.get_document(&doc.id).unwrap().is_none());
    assert!(store.get_metadata_by_key(&doc.id, "project").unwrap().is_none());
    assert!(store.list_permissions(&doc.id).unwrap().is_empty());
    assert!(store.get_download_link_by_token(&dl.token).unwrap().is_none());

    // A second delete finds nothing.
    assert!(!store.delete_document(&doc.id).unwrap());
}

#[test]
fn test_owner_pagination_arithmetic() {
    let store = store();
    store.create_user(&user("alice")).unwrap();
    store.create_user(&user("bob")).unwrap();
    for i in 0..25 {
        seed_document(&store, &format!("doc-{i:02}"), "alice");
    }
    seed_document(&store, "intruder", "bob");

    assert_eq!(store.count_documents_by_owner("alice").unwrap(), 25);

    let page1 = store.list_documents_by_owner("alice", 10, 0).unwrap();
    let page2 = store.list_documents_by_owner("alice", 10, 10).unwrap();
    let page3 = store.list_documents_by_owner("alice", 10, 20).unwrap();
    assert_eq!(page1.len(), 10);
    assert_eq!(page2.len(), 10);
    assert_eq!(page3.len(), 5);

    // Pages never overlap and never leak another owner's documents.
    let mut seen: Vec<String> = page1
        .iter()
        .chain(&page2)
        .chain(&page3)
        .map(|d| d.id.clone())
        .collect();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 25);
    assert!(seen.iter().all(|id| id != "intruder"));
}

#[test]
fn test_search_filters_compose() {
    let store = store();
    store.create_user(&user("alice")).unwrap();

    let report = document("report", "alice", "Quarterly-Report.pdf", &["finance", "q3"]);
    store
        .create_document(
            &report,
            &owner_grant(&report),
            &[entry("m1", "report", "year", serde_json::json!(2024))],
        )
        .unwrap();

    let notes = document("notes", "alice", "notes.txt", &["finance"]);
    store.create_document(&notes, &owner_grant(&notes), &[]).unwrap();

    let base = DocumentFilters {
        owner_id: Some("alice".to_string()),
        ..Default::default()
    };

    // Case-insensitive substring on file name.
    let filters = DocumentFilters {
        file_name: Some("quarterly".to_string()),
        ..base.clone()
    };
    let found = store.search_documents(&filters).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "report");

    // All requested tags must be present.
    let filters = DocumentFilters {
        tags: vec!["finance".to_string(), "q3".to_string()],
        ..base.clone()
    };
    let found = store.search_documents(&filters).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "report");

    let filters = DocumentFilters {
        tags: vec!["finance".to_string()],
        ..base.clone()
    };
    assert_eq!(store.search_documents(&filters).unwrap().len(), 2);

    // Metadata pairs match on exact JSON value.
    let filters = DocumentFilters {
        metadata: vec![("year".to_string(), serde_json::json!(2024))],
        ..base.clone()
    };
    let found = store.search_documents(&filters).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "report");

    let filters = DocumentFilters {
        metadata: vec![("year".to_string(), serde_json::json!(1999))],
        ..base
    };
    assert!(store.search_documents(&filters).unwrap().is_empty());
}

#[test]
fn test_search_deduplicates_metadata_matches() {
    let store = store();
    store.create_user(&user("alice")).unwrap();

    let doc = document("doc", "alice", "doc.bin", &[]);
    let entries = vec![
        entry("m1", "doc", "status", serde_json::json!("active")),
        entry("m2", "doc", "stage", serde_json::json!("active")),
    ];
    store.create_document(&doc, &owner_grant(&doc), &entries).unwrap();

    // Two metadata rows carry the same value; the document must still
    // appear exactly once.
    let filters = DocumentFilters {
        owner_id: Some("alice".to_string()),
        metadata: vec![
            ("status".to_string(), serde_json::json!("active")),
            ("stage".to_string(), serde_json::json!("active")),
        ],
        ..Default::default()
    };
    let found = store.search_documents(&filters).unwrap();
    assert_eq!(found.len(), 1);
}

#[test]
fn test_delete_expired_links_purges_only_expired() {
    let store = store();
    store.create_user(&user("alice")).unwrap();
    let doc = seed_document(&store, "doc", "alice");

    let live = link(&doc.id, 24);
    let expired_a = link(&doc.id, -1);
    let expired_b = link(&doc.id, -48);
    store.create_download_link(&live).unwrap();
    store.create_download_link(&expired_a).unwrap();
    store.create_download_link(&expired_b).unwrap();

    let purged = store.delete_expired_links(Utc::now()).unwrap();
    assert_eq!(purged, 2);

    assert!(store.get_download_link_by_token(&live.token).unwrap().is_some());
    assert!(store.get_download_link_by_token(&expired_a.token).unwrap().is_none());

    let remaining = store.list_download_links(&doc.id).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, live.id);
}
