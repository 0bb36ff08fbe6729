use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use log::info;

use super::{samples, search, store, CATALOG_TYPE, DEFAULT_ROOT};
use crate::model::Book;
use crate::repository::{NodePath, NodeStore, Repository, Session};
use crate::{Catalog, CatalogReader, CatalogSearcher, CatalogWriter, Error, Result};

/// A [`Catalog`] backed by an in-process [`Repository`].
///
/// Every call logs in, runs on the blocking pool, saves if anything changed
/// and drops its session before returning, on success and on error alike.
#[derive(Clone)]
pub struct EmbeddedCatalog {
    repo: Arc<Repository>,
    root_name: String,
}

impl EmbeddedCatalog {
    pub fn new(repo: Arc<Repository>, root_name: impl Into<String>) -> Self {
        Self {
            repo,
            root_name: root_name.into(),
        }
    }

    /// An unpersisted catalog under the default root.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(Repository::in_memory()), DEFAULT_ROOT)
    }

    /// Opens a catalog persisted in `data_dir`.
    pub fn open<P: AsRef<Path>>(data_dir: P, root_name: &str) -> Result<Self> {
        let repo = Repository::open(data_dir)?;
        Ok(Self::new(Arc::new(repo), root_name))
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repo
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session<'_>, &str) -> Result<T> + Send + 'static,
    {
        let repo = self.repo.clone();
        let root_name = self.root_name.clone();
        tokio::task::spawn_blocking(move || -> Result<T> {
            let mut session = repo.login();
            let out = op(&mut session, &root_name)?;
            session.save()?;
            Ok(out)
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
    }
}

/// The catalog root, if it has been created yet.
fn find_root(session: &Session<'_>, root_name: &str) -> Result<Option<NodePath>> {
    let top = NodePath::root();
    if session.has_child(&top, root_name)? {
        Ok(Some(session.get_child(&top, root_name)?))
    } else {
        Ok(None)
    }
}

fn ensure_root(session: &mut Session<'_>, root_name: &str) -> Result<NodePath> {
    Ok(session.get_or_add_child(&NodePath::root(), root_name, CATALOG_TYPE)?)
}

fn upsert_each(session: &mut Session<'_>, root_name: &str, books: &[Book]) -> Result<usize> {
    let root = ensure_root(session, root_name)?;
    for book in books {
        store::upsert(session, &root, book)?;
    }
    Ok(books.len())
}

#[async_trait]
impl CatalogReader for EmbeddedCatalog {
    async fn fetch_by_key(&self, isbn: &str) -> Result<Option<Book>> {
        let isbn = isbn.to_string();
        self.run(move |session, root_name| match find_root(session, root_name)? {
            Some(root) => store::fetch_by_key(&*session, &root, &isbn),
            None => Ok(None),
        })
        .await
    }

    async fn list_all(&self) -> Result<Vec<Book>> {
        self.run(|session, root_name| match find_root(session, root_name)? {
            Some(root) => store::list_all(&*session, &root),
            None => Ok(Vec::new()),
        })
        .await
    }
}

#[async_trait]
impl CatalogWriter for EmbeddedCatalog {
    async fn upsert(&self, book: Book) -> Result<()> {
        self.run(move |session, root_name| {
            upsert_each(session, root_name, std::slice::from_ref(&book))?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn upsert_all(&self, books: Vec<Book>) -> Result<usize> {
        let count = self
            .run(move |session, root_name| upsert_each(session, root_name, &books))
            .await?;
        info!("Stored {} books", count);
        Ok(count)
    }

    async fn remove_by_key(&self, isbn: &str) -> Result<bool> {
        let isbn = isbn.to_string();
        self.run(move |session, root_name| match find_root(session, root_name)? {
            Some(root) => store::remove_by_key(session, &root, &isbn),
            None => Ok(false),
        })
        .await
    }
}

#[async_trait]
impl CatalogSearcher for EmbeddedCatalog {
    async fn search(&self, text: &str) -> Result<Vec<Book>> {
        let text = text.to_string();
        self.run(move |session, root_name| match find_root(session, root_name)? {
            Some(root) => search::search(&*session, &root, &text),
            None => Ok(Vec::new()),
        })
        .await
    }
}

#[async_trait]
impl Catalog for EmbeddedCatalog {
    async fn seed(&self) -> Result<usize> {
        let count = self
            .run(|session, root_name| upsert_each(session, root_name, &samples::sample_books()))
            .await?;
        info!("{} sample books created", count);
        Ok(count)
    }
}
