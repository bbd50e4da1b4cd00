//! # Docvault
//!
//! A document storage server with per-user sharing and expiring download
//! links, usable both as a standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::path::PathBuf;
//! use docvault::files::FileStorage;
//! use docvault::server::{AppState, create_router};
//! use docvault::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new(&PathBuf::from("./data/docvault.db")).unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState {
//!     store: Arc::new(store),
//!     files: FileStorage::new(&PathBuf::from("./data")),
//!     jwt_secret: "change-me".into(),
//!     jwt_ttl_hours: 24,
//! });
//! let router = create_router(state);
//! // Serve with axum...
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod files;
pub mod links;
pub mod server;
pub mod store;
pub mod types;
