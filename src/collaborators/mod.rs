//! Seams toward the hosted backend: identity, relational store, and
//! bucket storage. Each has a hosted REST client and an in-memory
//! stand-in selected by configuration.

pub mod auth;
pub mod datastore;
pub mod memory;
pub mod storage;

pub use auth::{AuthError, AuthGateway, AuthUser, Session, SignUpOutcome};
pub use datastore::{FeedQuery, StoreError, VaultStore};
pub use memory::{MemoryAuth, MemoryStorage, MemoryStore};
pub use storage::{ObjectStore, StorageError};

pub use auth::HostedAuth;
pub use datastore::HostedStore;
pub use storage::HostedStorage;
