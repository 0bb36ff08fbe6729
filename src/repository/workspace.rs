use std::collections::BTreeMap;
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use super::{NodePath, PropertyValue};

/// Type tag of the workspace root.
pub const ROOT_TYPE: &str = "rep:root";

/// A single stored node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub type_tag: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
    /// Revision of the save that last wrote this node.
    #[serde(default)]
    pub revision: u64,
}

impl NodeRecord {
    pub fn new(type_tag: &str) -> Self {
        Self {
            type_tag: type_tag.to_string(),
            properties: BTreeMap::new(),
            revision: 0,
        }
    }
}

/// Committed contents of a repository: a flat, path-ordered map of nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    revision: u64,
    nodes: BTreeMap<NodePath, NodeRecord>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    /// Creates a workspace holding only the root node.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(NodePath::root(), NodeRecord::new(ROOT_TYPE));
        Self { revision: 0, nodes }
    }

    /// Restores the root node if a loaded snapshot lacks it.
    pub(crate) fn ensure_root(&mut self) {
        self.nodes
            .entry(NodePath::root())
            .or_insert_with(|| NodeRecord::new(ROOT_TYPE));
    }

    /// Revision of the most recent save.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    pub(crate) fn rewind_revision(&mut self, revision: u64) {
        self.revision = revision;
    }

    pub fn get(&self, path: &NodePath) -> Option<&NodeRecord> {
        self.nodes.get(path)
    }

    pub fn contains(&self, path: &NodePath) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn insert(&mut self, path: NodePath, record: NodeRecord) -> Option<NodeRecord> {
        self.nodes.insert(path, record)
    }

    pub(crate) fn remove(&mut self, path: &NodePath) -> Option<NodeRecord> {
        self.nodes.remove(path)
    }

    /// Iterates every strict descendant of `path` in path order.
    pub fn descendants<'a>(&'a self, path: &'a NodePath) -> impl Iterator<Item = (&'a NodePath, &'a NodeRecord)> + 'a {
        self.nodes
            .range((Bound::Excluded(path), Bound::Unbounded))
            .take_while(move |(candidate, _)| candidate.is_descendant_of(path))
    }

    pub fn children<'a>(&'a self, path: &'a NodePath) -> impl Iterator<Item = (&'a NodePath, &'a NodeRecord)> + 'a {
        self.descendants(path)
            .filter(move |(candidate, _)| candidate.is_child_of(path))
    }
}
