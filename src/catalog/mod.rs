//! The book catalog on top of the node store.
//!
//! [`store`] and [`search`] work against any [`NodeStore`](crate::repository::NodeStore)
//! and a catalog root node. [`EmbeddedCatalog`] wires them to a
//! [`Repository`](crate::repository::Repository) with one session per call.

pub mod embedded;
pub mod samples;
pub mod search;
pub mod shard;
pub mod store;

pub use embedded::EmbeddedCatalog;
pub use search::escape_markup;
pub use shard::shard_key;

/// Type tag of the catalog root node.
pub const CATALOG_TYPE: &str = "shelf:catalog";
/// Default name of the catalog root under the repository root.
pub const DEFAULT_ROOT: &str = "books";
