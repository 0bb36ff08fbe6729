//! Hierarchical node store backing the catalog.
//!
//! The store is a tree of named nodes. Each node carries a type tag and a set
//! of typed properties. Callers work through a [`Session`], which stages
//! mutations locally and commits them with [`Session::save`].

pub mod path;
pub mod persistence;
pub mod query;
pub mod session;
pub mod workspace;

pub use path::NodePath;
pub use persistence::Persistence;
pub use session::{Repository, Session};
pub use workspace::{NodeRecord, Workspace};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the node store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No node exists at the given path.
    #[error("node not found: {0}")]
    NodeNotFound(String),
    /// A node already exists at the given path.
    #[error("node already exists: {0}")]
    NodeExists(String),
    /// A child name is empty, contains a separator or is reserved.
    #[error("invalid node name")]
    InvalidName,
    /// A property holds a value of a different shape than requested.
    #[error("property {name} on {path} is not a {expected}")]
    PropertyType {
        path: String,
        name: String,
        expected: &'static str,
    },
    /// The contains-text expression could not be parsed.
    #[error("invalid query: {0}")]
    InvalidQuery(&'static str),
    /// Another session committed a change that overlaps with this one.
    #[error("conflicting concurrent change at {0}")]
    Conflict(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A typed property value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PropertyValue {
    String(String),
    /// Ordered multi-value string property.
    Strings(Vec<String>),
    Date(NaiveDate),
}

impl PropertyValue {
    /// Iterates the string content that full-text matching looks at.
    pub(crate) fn text_values(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match self {
            PropertyValue::String(s) => Box::new(std::iter::once(s.as_str())),
            PropertyValue::Strings(values) => Box::new(values.iter().map(String::as_str)),
            PropertyValue::Date(_) => Box::new(std::iter::empty()),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(values: Vec<String>) -> Self {
        PropertyValue::Strings(values)
    }
}

impl From<NaiveDate> for PropertyValue {
    fn from(date: NaiveDate) -> Self {
        PropertyValue::Date(date)
    }
}

/// Structural and property access to a tree of nodes.
///
/// Mutating methods take `&mut self`; implementations decide when staged
/// changes become visible to other users of the store.
pub trait NodeStore {
    /// Returns whether `parent` has a direct child called `name`.
    fn has_child(&self, parent: &NodePath, name: &str) -> StoreResult<bool>;

    /// Returns the path of an existing child, or [`StoreError::NodeNotFound`].
    fn get_child(&self, parent: &NodePath, name: &str) -> StoreResult<NodePath>;

    /// Creates a new child node tagged with `type_tag`.
    ///
    /// Fails with [`StoreError::NodeExists`] if the child is already there.
    fn add_child(&mut self, parent: &NodePath, name: &str, type_tag: &str) -> StoreResult<NodePath>;

    /// Returns the child called `name`, creating it in the same step when absent.
    fn get_or_add_child(&mut self, parent: &NodePath, name: &str, type_tag: &str) -> StoreResult<NodePath>;

    /// Removes a child and its whole subtree.
    fn remove_child(&mut self, parent: &NodePath, name: &str) -> StoreResult<()>;

    /// Lists the direct children of `node` in name order.
    fn children(&self, node: &NodePath) -> StoreResult<Vec<NodePath>>;

    fn has_children(&self, node: &NodePath) -> StoreResult<bool> {
        Ok(!self.children(node)?.is_empty())
    }

    fn get_property(&self, node: &NodePath, name: &str) -> StoreResult<Option<PropertyValue>>;

    fn set_property(&mut self, node: &NodePath, name: &str, value: PropertyValue) -> StoreResult<()>;

    fn remove_property(&mut self, node: &NodePath, name: &str) -> StoreResult<()>;

    fn has_property(&self, node: &NodePath, name: &str) -> StoreResult<bool> {
        Ok(self.get_property(node, name)?.is_some())
    }
}

/// Contains-text search over a subtree.
pub trait TextSearch {
    /// Returns every strict descendant of `scope` that carries
    /// `require_property` and matches `expression` (see [`query`]).
    fn search(&self, scope: &NodePath, expression: &str, require_property: &str) -> StoreResult<Vec<NodePath>>;
}
