use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, error, info};

use super::query::Query;
use super::{
    NodePath, NodeRecord, NodeStore, Persistence, PropertyValue, StoreError, StoreResult, TextSearch, Workspace,
};

/// Shared, committed node tree with optional on-disk persistence.
///
/// All access goes through a [`Session`] obtained from [`Repository::login`].
pub struct Repository {
    workspace: RwLock<Workspace>,
    persistence: Option<Persistence>,
}

/// A change staged by a session for one path.
#[derive(Debug, Clone)]
struct Change {
    /// Revision of the committed node when the session first touched it.
    base: Option<u64>,
    /// New state of the node; `None` means removed.
    state: Option<NodeRecord>,
}

impl Change {
    fn is_noop(&self) -> bool {
        self.base.is_none() && self.state.is_none()
    }

    fn is_removal(&self) -> bool {
        self.state.is_none()
    }
}

impl Repository {
    pub fn new(workspace: Workspace, persistence: Option<Persistence>) -> Self {
        Self {
            workspace: RwLock::new(workspace),
            persistence,
        }
    }

    /// An unpersisted repository containing only the root node.
    pub fn in_memory() -> Self {
        Self::new(Workspace::new(), None)
    }

    /// Opens (or creates) a repository persisted in `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> StoreResult<Self> {
        let persistence = Persistence::new(dir)?;
        let workspace = persistence.load()?;
        info!(
            "Opened repository at {:?}: {} nodes, revision {}",
            persistence.snapshot_path(),
            workspace.len(),
            workspace.revision()
        );
        Ok(Self::new(workspace, Some(persistence)))
    }

    /// Starts a unit of work. Unsaved changes are discarded when the session
    /// is dropped.
    pub fn login(&self) -> Session<'_> {
        Session {
            repo: self,
            changes: BTreeMap::new(),
        }
    }

    pub fn revision(&self) -> u64 {
        self.read().revision()
    }

    /// A copy of the committed workspace.
    pub fn snapshot(&self) -> Workspace {
        self.read().clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, Workspace> {
        self.workspace.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Workspace> {
        self.workspace.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit(&self, changes: &BTreeMap<NodePath, Change>) -> StoreResult<u64> {
        let mut ws = self.write();
        check_conflicts(&ws, changes)?;

        let previous_revision = ws.revision();
        let revision = ws.next_revision();
        let mut undo = Vec::with_capacity(changes.len());

        for (path, change) in changes.iter().filter(|(_, c)| !c.is_noop()) {
            let prior = match &change.state {
                Some(record) => {
                    let mut record = record.clone();
                    record.revision = revision;
                    ws.insert(path.clone(), record)
                }
                None => ws.remove(path),
            };
            undo.push((path.clone(), prior));
        }

        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.save_workspace(&ws) {
                error!("Failed to persist revision {}: {}", revision, e);
                for (path, prior) in undo.into_iter().rev() {
                    match prior {
                        Some(record) => {
                            ws.insert(path, record);
                        }
                        None => {
                            ws.remove(&path);
                        }
                    }
                }
                ws.rewind_revision(previous_revision);
                return Err(e);
            }
        }

        Ok(revision)
    }
}

fn check_conflicts(ws: &Workspace, changes: &BTreeMap<NodePath, Change>) -> StoreResult<()> {
    for (path, change) in changes.iter().filter(|(_, c)| !c.is_noop()) {
        let current = ws.get(path).map(|record| record.revision);
        if current != change.base {
            return Err(StoreError::Conflict(path.to_string()));
        }

        match (&change.base, &change.state) {
            (None, Some(_)) => {
                if let Some(parent) = path.parent() {
                    let parent_present = match changes.get(&parent) {
                        Some(parent_change) => parent_change.state.is_some(),
                        None => ws.contains(&parent),
                    };
                    if !parent_present {
                        return Err(StoreError::Conflict(path.to_string()));
                    }
                }
            }
            (Some(_), None) => {
                let orphaned = ws
                    .descendants(path)
                    .any(|(below, _)| !changes.get(below).is_some_and(Change::is_removal));
                if orphaned {
                    return Err(StoreError::Conflict(path.to_string()));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// A scoped view of a [`Repository`] with local, uncommitted changes.
///
/// Reads see the committed tree overlaid with this session's changes.
/// [`Session::save`] publishes the changes in one step, or fails with
/// [`StoreError::Conflict`] without applying anything.
pub struct Session<'r> {
    repo: &'r Repository,
    changes: BTreeMap<NodePath, Change>,
}

impl Session<'_> {
    pub fn has_pending_changes(&self) -> bool {
        self.changes.values().any(|c| !c.is_noop())
    }

    /// Drops all staged changes.
    pub fn discard(&mut self) {
        self.changes.clear();
    }

    /// Commits staged changes to the repository.
    pub fn save(&mut self) -> StoreResult<()> {
        if !self.has_pending_changes() {
            self.changes.clear();
            return Ok(());
        }
        let revision = self.repo.commit(&self.changes)?;
        debug!("Saved {} node changes at revision {}", self.changes.len(), revision);
        self.changes.clear();
        Ok(())
    }

    fn with_record<R>(&self, path: &NodePath, f: impl FnOnce(Option<&NodeRecord>) -> R) -> R {
        if let Some(change) = self.changes.get(path) {
            return f(change.state.as_ref());
        }
        let ws = self.repo.read();
        f(ws.get(path))
    }

    fn exists(&self, path: &NodePath) -> bool {
        self.with_record(path, |record| record.is_some())
    }

    fn require(&self, path: &NodePath) -> StoreResult<()> {
        if self.exists(path) {
            Ok(())
        } else {
            Err(StoreError::NodeNotFound(path.to_string()))
        }
    }

    fn staged(&mut self, path: &NodePath) -> &mut Option<NodeRecord> {
        let repo = self.repo;
        &mut self
            .changes
            .entry(path.clone())
            .or_insert_with(|| {
                let current = repo.read().get(path).cloned();
                Change {
                    base: current.as_ref().map(|record| record.revision),
                    state: current,
                }
            })
            .state
    }

    fn staged_existing(&mut self, path: &NodePath) -> StoreResult<&mut NodeRecord> {
        self.require(path)?;
        self.staged(path)
            .as_mut()
            .ok_or_else(|| StoreError::NodeNotFound(path.to_string()))
    }

    /// True if some ancestor of `path` below `scope` was removed in this session.
    fn removed_above(&self, path: &NodePath, scope: &NodePath) -> bool {
        let mut current = path.parent();
        while let Some(ancestor) = current {
            if &ancestor == scope {
                return false;
            }
            if self.changes.get(&ancestor).is_some_and(Change::is_removal) {
                return true;
            }
            current = ancestor.parent();
        }
        false
    }

    fn descendants(&self, path: &NodePath) -> Vec<NodePath> {
        let mut found: BTreeSet<NodePath> = self
            .repo
            .read()
            .descendants(path)
            .map(|(below, _)| below.clone())
            .collect();

        let staged = self
            .changes
            .range::<NodePath, _>((Bound::Excluded(path), Bound::Unbounded))
            .take_while(|(below, _)| below.is_descendant_of(path));
        for (below, change) in staged {
            if change.state.is_some() {
                found.insert(below.clone());
            } else {
                found.remove(below);
            }
        }

        found
            .into_iter()
            .filter(|below| !self.removed_above(below, path))
            .collect()
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if self.has_pending_changes() {
            debug!("Discarding {} unsaved node changes", self.changes.len());
        }
    }
}

impl NodeStore for Session<'_> {
    fn has_child(&self, parent: &NodePath, name: &str) -> StoreResult<bool> {
        self.require(parent)?;
        Ok(self.exists(&parent.child(name)?))
    }

    fn get_child(&self, parent: &NodePath, name: &str) -> StoreResult<NodePath> {
        self.require(parent)?;
        let child = parent.child(name)?;
        self.require(&child)?;
        Ok(child)
    }

    fn add_child(&mut self, parent: &NodePath, name: &str, type_tag: &str) -> StoreResult<NodePath> {
        self.require(parent)?;
        let child = parent.child(name)?;
        if self.exists(&child) {
            return Err(StoreError::NodeExists(child.to_string()));
        }
        *self.staged(&child) = Some(NodeRecord::new(type_tag));
        debug!("Staged new {} node {}", type_tag, child);
        Ok(child)
    }

    fn get_or_add_child(&mut self, parent: &NodePath, name: &str, type_tag: &str) -> StoreResult<NodePath> {
        self.require(parent)?;
        let child = parent.child(name)?;
        if !self.exists(&child) {
            *self.staged(&child) = Some(NodeRecord::new(type_tag));
            debug!("Staged new {} node {}", type_tag, child);
        }
        Ok(child)
    }

    fn remove_child(&mut self, parent: &NodePath, name: &str) -> StoreResult<()> {
        let child = self.get_child(parent, name)?;
        for below in self.descendants(&child) {
            *self.staged(&below) = None;
        }
        *self.staged(&child) = None;
        debug!("Staged removal of {}", child);
        Ok(())
    }

    fn children(&self, node: &NodePath) -> StoreResult<Vec<NodePath>> {
        self.require(node)?;
        Ok(self
            .descendants(node)
            .into_iter()
            .filter(|below| below.is_child_of(node))
            .collect())
    }

    fn get_property(&self, node: &NodePath, name: &str) -> StoreResult<Option<PropertyValue>> {
        self.with_record(node, |record| match record {
            Some(record) => Ok(record.properties.get(name).cloned()),
            None => Err(StoreError::NodeNotFound(node.to_string())),
        })
    }

    fn set_property(&mut self, node: &NodePath, name: &str, value: PropertyValue) -> StoreResult<()> {
        self.staged_existing(node)?
            .properties
            .insert(name.to_string(), value);
        Ok(())
    }

    fn remove_property(&mut self, node: &NodePath, name: &str) -> StoreResult<()> {
        if self.has_property(node, name)? {
            self.staged_existing(node)?.properties.remove(name);
        }
        Ok(())
    }
}

impl TextSearch for Session<'_> {
    fn search(&self, scope: &NodePath, expression: &str, require_property: &str) -> StoreResult<Vec<NodePath>> {
        let query = Query::parse(expression)?;
        self.require(scope)?;

        let mut hits = Vec::new();
        for path in self.descendants(scope) {
            let matched = self.with_record(&path, |record| match record {
                Some(record) if record.properties.contains_key(require_property) => {
                    query.matches(record.properties.values().flat_map(PropertyValue::text_values))
                }
                _ => false,
            });
            if matched {
                hits.push(path);
            }
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn root() -> NodePath {
        NodePath::root()
    }

    #[test]
    fn test_changes_visible_after_save() {
        let repo = Repository::in_memory();
        let mut writer = repo.login();
        let books = writer.add_child(&root(), "books", "shelf:catalog").unwrap();
        writer.set_property(&books, "label", "Catalog".into()).unwrap();

        let reader = repo.login();
        assert!(!reader.has_child(&root(), "books").unwrap());
        assert!(writer.has_child(&root(), "books").unwrap());

        writer.save().unwrap();
        assert!(reader.has_child(&root(), "books").unwrap());
        assert_eq!(
            reader.get_property(&books, "label").unwrap(),
            Some(PropertyValue::from("Catalog"))
        );
        assert_eq!(repo.revision(), 1);
    }

    #[test]
    fn test_drop_discards_unsaved_changes() {
        let repo = Repository::in_memory();
        {
            let mut session = repo.login();
            session.add_child(&root(), "books", "shelf:catalog").unwrap();
            assert!(session.has_pending_changes());
        }
        let session = repo.login();
        assert!(!session.has_child(&root(), "books").unwrap());
        assert_eq!(repo.revision(), 0);
    }

    #[test]
    fn test_discard_drops_staged_changes() {
        let repo = Repository::in_memory();
        let mut session = repo.login();
        session.add_child(&root(), "books", "shelf:catalog").unwrap();
        session.discard();

        assert!(!session.has_pending_changes());
        assert!(!session.has_child(&root(), "books").unwrap());
        session.save().unwrap();
        assert_eq!(repo.revision(), 0);
    }

    #[test]
    fn test_add_child_twice_fails_but_get_or_add_is_idempotent() {
        let repo = Repository::in_memory();
        let mut session = repo.login();
        let first = session.get_or_add_child(&root(), "908", "shelf:folder").unwrap();
        let second = session.get_or_add_child(&root(), "908", "shelf:folder").unwrap();
        assert_eq!(first, second);
        assert_eq!(session.children(&root()).unwrap().len(), 1);

        assert!(matches!(
            session.add_child(&root(), "908", "shelf:folder"),
            Err(StoreError::NodeExists(_))
        ));
    }

    #[test]
    fn test_missing_nodes() {
        let repo = Repository::in_memory();
        let mut session = repo.login();
        let ghost = root().child("ghost").unwrap();

        assert!(matches!(session.get_child(&root(), "ghost"), Err(StoreError::NodeNotFound(_))));
        assert!(matches!(session.children(&ghost), Err(StoreError::NodeNotFound(_))));
        assert!(matches!(session.get_property(&ghost, "p"), Err(StoreError::NodeNotFound(_))));
        assert!(matches!(
            session.set_property(&ghost, "p", "v".into()),
            Err(StoreError::NodeNotFound(_))
        ));
        assert!(matches!(session.remove_child(&root(), "ghost"), Err(StoreError::NodeNotFound(_))));
        assert!(!session.has_pending_changes());
    }

    #[test]
    fn test_remove_child_removes_subtree() {
        let repo = Repository::in_memory();
        let mut session = repo.login();
        let folder = session.add_child(&root(), "908", "shelf:folder").unwrap();
        session.add_child(&folder, "9780399226908", "book:Book").unwrap();
        session.save().unwrap();

        let mut session = repo.login();
        session.remove_child(&root(), "908").unwrap();
        assert!(session.children(&root()).unwrap().is_empty());
        session.save().unwrap();

        assert_eq!(repo.snapshot().len(), 1);
    }

    #[test]
    fn test_remove_property() {
        let repo = Repository::in_memory();
        let mut session = repo.login();
        let node = session.add_child(&root(), "n", "t").unwrap();
        session.set_property(&node, "p", "v".into()).unwrap();
        assert!(session.has_property(&node, "p").unwrap());

        session.remove_property(&node, "p").unwrap();
        assert!(!session.has_property(&node, "p").unwrap());
        session.remove_property(&node, "never-set").unwrap();
    }

    #[test]
    fn test_concurrent_update_conflicts() {
        let repo = Repository::in_memory();
        let mut setup = repo.login();
        let node = setup.add_child(&root(), "n", "t").unwrap();
        setup.save().unwrap();

        let mut a = repo.login();
        let mut b = repo.login();
        a.set_property(&node, "title", "from a".into()).unwrap();
        b.set_property(&node, "title", "from b".into()).unwrap();

        a.save().unwrap();
        assert!(matches!(b.save(), Err(StoreError::Conflict(_))));

        let check = repo.login();
        assert_eq!(check.get_property(&node, "title").unwrap(), Some(PropertyValue::from("from a")));
    }

    #[test]
    fn test_concurrent_folder_creation_conflicts() {
        let repo = Repository::in_memory();
        let mut a = repo.login();
        let mut b = repo.login();
        a.get_or_add_child(&root(), "908", "shelf:folder").unwrap();
        b.get_or_add_child(&root(), "908", "shelf:folder").unwrap();

        a.save().unwrap();
        let revision = repo.revision();
        assert!(matches!(b.save(), Err(StoreError::Conflict(_))));
        assert_eq!(repo.revision(), revision);
    }

    #[test]
    fn test_folder_removal_conflicts_with_new_sibling() {
        let repo = Repository::in_memory();
        let mut setup = repo.login();
        let folder = setup.add_child(&root(), "908", "shelf:folder").unwrap();
        setup.add_child(&folder, "9780399226908", "book:Book").unwrap();
        setup.save().unwrap();

        let mut remover = repo.login();
        remover.remove_child(&folder, "9780399226908").unwrap();
        assert!(!remover.has_children(&folder).unwrap());
        remover.remove_child(&root(), "908").unwrap();

        let mut inserter = repo.login();
        inserter.add_child(&folder, "9781111111908", "book:Book").unwrap();
        inserter.save().unwrap();

        assert!(matches!(remover.save(), Err(StoreError::Conflict(_))));
        let check = repo.login();
        assert_eq!(check.children(&folder).unwrap().len(), 2);
    }

    #[test]
    fn test_add_under_removed_parent_conflicts() {
        let repo = Repository::in_memory();
        let mut setup = repo.login();
        let folder = setup.add_child(&root(), "908", "shelf:folder").unwrap();
        setup.save().unwrap();

        let mut inserter = repo.login();
        inserter.add_child(&folder, "9780399226908", "book:Book").unwrap();

        let mut remover = repo.login();
        remover.remove_child(&root(), "908").unwrap();
        remover.save().unwrap();

        assert!(matches!(inserter.save(), Err(StoreError::Conflict(_))));
        assert!(!repo.snapshot().contains(&folder));
    }

    #[test]
    fn test_add_then_remove_in_same_session_is_noop() {
        let repo = Repository::in_memory();
        let mut session = repo.login();
        session.add_child(&root(), "tmp", "t").unwrap();
        session.remove_child(&root(), "tmp").unwrap();
        assert!(!session.has_pending_changes());
        session.save().unwrap();
        assert_eq!(repo.revision(), 0);
    }

    #[test]
    fn test_persisted_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let repo = Repository::open(dir.path()).unwrap();
            let mut session = repo.login();
            let node = session.add_child(&root(), "books", "shelf:catalog").unwrap();
            session.set_property(&node, "authors", vec!["A".to_string(), "B".to_string()].into()).unwrap();
            session.save().unwrap();
        }

        let repo = Repository::open(dir.path()).unwrap();
        let session = repo.login();
        let node = session.get_child(&root(), "books").unwrap();
        assert_eq!(
            session.get_property(&node, "authors").unwrap(),
            Some(PropertyValue::Strings(vec!["A".to_string(), "B".to_string()]))
        );
        assert_eq!(repo.revision(), 1);
    }

    #[test]
    fn test_failed_persist_rolls_back() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let repo = Repository::open(&data_dir).unwrap();
        std::fs::remove_dir_all(&data_dir).unwrap();

        let mut session = repo.login();
        session.add_child(&root(), "books", "shelf:catalog").unwrap();
        assert!(matches!(session.save(), Err(StoreError::Io(_))));

        assert_eq!(repo.revision(), 0);
        assert!(!repo.snapshot().contains(&root().child("books").unwrap()));
    }

    #[test]
    fn test_search_scope_and_required_property() {
        let repo = Repository::in_memory();
        let mut session = repo.login();
        let books = session.add_child(&root(), "books", "shelf:catalog").unwrap();
        let folder = session.add_child(&books, "801", "shelf:folder").unwrap();
        session.set_property(&folder, "note", "tacos folder".into()).unwrap();
        let entry = session.add_child(&folder, "9780803736801", "book:Book").unwrap();
        session.set_property(&entry, "book:isbn", "9780803736801".into()).unwrap();
        session
            .set_property(&entry, "book:author", vec!["Adam Rubin".to_string()].into())
            .unwrap();
        session.set_property(&entry, "desc", "Dragons love tacos".into()).unwrap();

        let hits = session.search(&books, "tacos", "book:isbn").unwrap();
        assert_eq!(hits, vec![entry.clone()]);

        let hits = session.search(&books, "rubin", "book:isbn").unwrap();
        assert_eq!(hits, vec![entry.clone()]);

        assert!(session.search(&entry, "tacos", "book:isbn").unwrap().is_empty());
        assert!(session.search(&books, "nonexistentxyz", "book:isbn").unwrap().is_empty());
        assert!(matches!(
            session.search(&books, "", "book:isbn"),
            Err(StoreError::InvalidQuery(_))
        ));
    }
}
