//! Placement of entries under `root/<shard key>/<key>`.
//!
//! Read and write paths must derive folder names the same way, so every
//! lookup goes through [`shard_key`].

use crate::repository::{NodePath, NodeStore, StoreResult};

/// Type tag of a shard folder.
pub const FOLDER_TYPE: &str = "shelf:folder";
/// Type tag of a book entry.
pub const BOOK_TYPE: &str = "book:Book";

const SHARD_KEY_LEN: usize = 3;

/// Last three characters of a normalized key, or the whole key if shorter.
///
/// Most ISBN-13s share their leading digits, so the trailing ones are used.
/// They still distribute poorly across publishers with dense ranges.
pub fn shard_key(key: &str) -> &str {
    let count = key.chars().count();
    if count <= SHARD_KEY_LEN {
        return key;
    }
    let start = key
        .char_indices()
        .nth(count - SHARD_KEY_LEN)
        .map(|(index, _)| index)
        .unwrap_or(0);
    &key[start..]
}

/// Looks up the shard folder for `key` without creating it.
pub fn find_folder<S: NodeStore + ?Sized>(store: &S, root: &NodePath, key: &str) -> StoreResult<Option<NodePath>> {
    let folder_key = shard_key(key);
    if store.has_child(root, folder_key)? {
        Ok(Some(store.get_child(root, folder_key)?))
    } else {
        Ok(None)
    }
}

/// Returns the shard folder for `key`, creating it when absent.
pub fn get_or_create_folder<S: NodeStore + ?Sized>(store: &mut S, root: &NodePath, key: &str) -> StoreResult<NodePath> {
    store.get_or_add_child(root, shard_key(key), FOLDER_TYPE)
}

/// Returns the entry node for `key` inside `folder`, creating it when absent.
pub fn get_or_create_entry<S: NodeStore + ?Sized>(store: &mut S, folder: &NodePath, key: &str) -> StoreResult<NodePath> {
    store.get_or_add_child(folder, key, BOOK_TYPE)
}
