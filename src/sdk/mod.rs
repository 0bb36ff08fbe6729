/// Software Development Kit (SDK) for Shelf Store.
///
/// This module provides a high-level API for reaching a catalog, including
/// automatic mode discovery and a remote TCP client.
pub mod client;
/// Automatic mode discovery and catalog initialization.
pub mod discovery;

pub use client::Client;
pub use discovery::new;
