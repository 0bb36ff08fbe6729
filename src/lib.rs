//! Shelf Store keeps a book catalog in a tree-structured node store.
//!
//! Books live at `/<catalog root>/<shard key>/<isbn>`, where the shard key is
//! the last three digits of the normalized ISBN. Shard folders are created on
//! the first insert that needs them and removed with their last entry.
//!
//! ## Core Components
//! - [`model`]: The [`Book`](model::Book) entity and ISBN rules.
//! - [`repository`]: The node store, with scoped sessions, optimistic saves and atomic persistence.
//! - [`catalog`]: Sharded CRUD and text search on top of the node store.
//! - [`sdk`]: Embedded and remote (TCP) catalog clients.
//! - [`server`]: TCP daemon implementation.

pub mod catalog;
pub mod config;
pub mod model;
pub mod repository;
pub mod sdk;
pub mod server;

use async_trait::async_trait;
use thiserror::Error;

use model::{Book, ValidationError};
use repository::StoreError;

/// Errors returned by Shelf Store.
#[derive(Error, Debug)]
pub enum Error {
    /// The book failed field validation; nothing was written.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    /// The node store failed. Never retried by this crate.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// An I/O error occurred during network communication.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Error during JSON serialization or deserialization.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A remote server rejected the request as invalid.
    #[error("rejected: {0}")]
    Rejected(String),
    /// A remote server failed to process the request.
    #[error("remote error: {0}")]
    Remote(String),
    /// A response could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for Shelf Store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Read access to the catalog.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Looks up a book by ISBN. Punctuation in `isbn` is ignored.
    async fn fetch_by_key(&self, isbn: &str) -> Result<Option<Book>>;
    /// Returns every stored book, in no particular order.
    async fn list_all(&self) -> Result<Vec<Book>>;
}

/// Write access to the catalog.
#[async_trait]
pub trait CatalogWriter: Send + Sync {
    /// Creates or updates a book, merging non-blank fields into any stored entry.
    async fn upsert(&self, book: Book) -> Result<()>;
    /// Stores several books as one unit. Either all are saved or none are.
    async fn upsert_all(&self, books: Vec<Book>) -> Result<usize>;
    /// Removes a book. Returns `false` if no such book existed.
    async fn remove_by_key(&self, isbn: &str) -> Result<bool>;
}

/// Free-text search over the catalog.
#[async_trait]
pub trait CatalogSearcher: Send + Sync {
    /// Returns books containing every word of `text` in any field.
    async fn search(&self, text: &str) -> Result<Vec<Book>>;
}

/// The primary interface for interacting with a catalog.
#[async_trait]
pub trait Catalog: CatalogReader + CatalogWriter + CatalogSearcher {
    /// Stores the demo books and returns how many were written.
    async fn seed(&self) -> Result<usize>;
}
