//! CRUD over the sharded layout.

use log::{debug, info};

use super::shard::{find_folder, get_or_create_entry, get_or_create_folder};
use crate::model::{normalize_key, Book};
use crate::repository::{NodePath, NodeStore};
use crate::Result;

/// Validates `book`, then creates or updates its entry.
///
/// Fields that are absent or blank on `book` keep their stored values.
pub fn upsert<S: NodeStore + ?Sized>(store: &mut S, root: &NodePath, book: &Book) -> Result<NodePath> {
    book.validate_for_save()?;

    let folder = get_or_create_folder(store, root, book.isbn())?;
    let entry = get_or_create_entry(store, &folder, book.isbn())?;
    book.write_to(store, &entry)?;

    debug!("Staged book {} at {}", book.isbn(), entry);
    Ok(entry)
}

/// Loads the book stored under `key`. Never creates nodes.
pub fn fetch_by_key<S: NodeStore + ?Sized>(store: &S, root: &NodePath, key: &str) -> Result<Option<Book>> {
    let key = normalize_key(key);
    if key.is_empty() {
        return Ok(None);
    }
    let Some(folder) = find_folder(store, root, &key)? else {
        return Ok(None);
    };
    if !store.has_child(&folder, &key)? {
        return Ok(None);
    }
    let entry = store.get_child(&folder, &key)?;
    Ok(Some(Book::load(store, &entry)?))
}

/// Removes the book stored under `key`, and its folder once empty.
///
/// Returns `false` when there was nothing to remove.
pub fn remove_by_key<S: NodeStore + ?Sized>(store: &mut S, root: &NodePath, key: &str) -> Result<bool> {
    let key = normalize_key(key);
    if key.is_empty() {
        return Ok(false);
    }
    let Some(folder) = find_folder(store, root, &key)? else {
        return Ok(false);
    };
    if !store.has_child(&folder, &key)? {
        return Ok(false);
    }

    store.remove_child(&folder, &key)?;
    if !store.has_children(&folder)? {
        if let Some(name) = folder.name() {
            store.remove_child(root, name)?;
            debug!("Removed empty shard folder {}", folder);
        }
    }

    info!("Removed book {}", key);
    Ok(true)
}

/// Removes `book` by its own key. See [`remove_by_key`].
pub fn remove<S: NodeStore + ?Sized>(store: &mut S, root: &NodePath, book: &Book) -> Result<bool> {
    remove_by_key(store, root, book.isbn())
}

/// Loads every stored book, in no particular order.
pub fn list_all<S: NodeStore + ?Sized>(store: &S, root: &NodePath) -> Result<Vec<Book>> {
    let mut books = Vec::new();
    for folder in store.children(root)? {
        for entry in store.children(&folder)? {
            books.push(Book::load(store, &entry)?);
        }
    }
    Ok(books)
}
