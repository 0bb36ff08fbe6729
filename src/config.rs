use std::env;
use std::path::PathBuf;

use crate::catalog::DEFAULT_ROOT;

pub const DEFAULT_PORT: u16 = 7002;
pub const DEFAULT_MAX_CONNECTIONS: usize = 100;

/// Runtime settings for the daemon and for embedded mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub port: u16,
    pub max_connections: usize,
    /// Name of the catalog node under the repository root.
    pub catalog_root: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            port: DEFAULT_PORT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            catalog_root: DEFAULT_ROOT.to_string(),
        }
    }
}

impl Config {
    /// Reads `SHELF_DATA_DIR`, `SHELF_PORT`, `SHELF_MAX_CONNECTIONS` and
    /// `SHELF_CATALOG_ROOT`, keeping defaults for unset or unparsable values.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(dir) = lookup("SHELF_DATA_DIR").filter(|v| !v.is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(port) = lookup("SHELF_PORT") {
            match port.parse() {
                Ok(port) => config.port = port,
                Err(_) => log::warn!("Ignoring invalid SHELF_PORT {:?}", port),
            }
        }
        if let Some(max) = lookup("SHELF_MAX_CONNECTIONS") {
            match max.parse() {
                Ok(max) if max > 0 => config.max_connections = max,
                _ => log::warn!("Ignoring invalid SHELF_MAX_CONNECTIONS {:?}", max),
            }
        }
        if let Some(root) = lookup("SHELF_CATALOG_ROOT").filter(|v| !v.is_empty()) {
            config.catalog_root = root;
        }
        config
    }
}
