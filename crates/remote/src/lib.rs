//! Shared per-user book records.
//!
//! This crate is the remote half of the split persistence model: structured
//! metadata and reading state live here, in a database shared by all of a
//! user's devices, while binary book content stays on-device in
//! `quire-storage`. The two sides meet on the content fingerprint.
//!
//! # Architecture
//! - [`Database`]: SQLite pool, embedded migrations, tuned PRAGMAs.
//! - [`RecordStore`]: the narrow owner-scoped interface the rest of the
//!   workspace programs against; [`SqliteStore`] is the real implementation
//!   and `MemoryStore` (behind the `mock` feature) the test double.
//! - [`Identity`]: the "current user or none" authentication boundary.
//!
//! Deduplication is a schema rule (`UNIQUE (owner_id, fingerprint)`), not
//! just an application pre-check, so racing imports cannot slip a duplicate
//! row past the store.

pub mod error;

mod db;
mod identity;
mod models;
mod store;

pub use crate::db::Database;
pub use crate::identity::{Identity, IdentityHandle, StaticIdentity};
pub use crate::models::{BookRecord, NewBook, UserId};
#[cfg(feature = "mock")]
pub use crate::store::MemoryStore;
pub use crate::store::{RecordStore, RecordStoreHandle, SqliteStore};
