use std::env;
use std::sync::Arc;

use crate::catalog::EmbeddedCatalog;
use crate::config::Config;
use crate::sdk::Client;
use crate::{Catalog, Result};

/// Initializes a [`Catalog`] based on the environment.
///
/// `new` automatically detects whether to connect to a remote server or
/// open a local embedded repository:
///
/// 1. If the `SHELF_STORE_ADDR` environment variable is set, it attempts to
///    connect to that address in **Remote Mode**.
/// 2. Otherwise, or if the server is unreachable, it opens an
///    [`EmbeddedCatalog`] persisted in `data_dir` in **Embedded Mode**.
///
/// # Examples
///
/// ```no_run
/// use shelf_store::{sdk, CatalogReader};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let catalog = sdk::new("./data").await?;
///     let books = catalog.list_all().await?;
///     println!("{} books", books.len());
///     Ok(())
/// }
/// ```
pub async fn new(data_dir: &str) -> Result<Arc<dyn Catalog>> {
    if let Ok(addr) = env::var("SHELF_STORE_ADDR") {
        if !addr.is_empty() {
            match Client::connect(&addr).await {
                Ok(client) => return Ok(Arc::new(client)),
                Err(e) => log::warn!("Could not reach {}: {}. Falling back to embedded mode.", addr, e),
            }
        }
    }

    let config = Config::from_env();
    let catalog = EmbeddedCatalog::open(data_dir, &config.catalog_root)?;
    Ok(Arc::new(catalog))
}
