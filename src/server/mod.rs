/// TCP server implementation for the Shelf Store daemon.
///
/// This module provides the [`Router`] which handles incoming TCP connections
/// and dispatches catalog commands, one request per line.
pub mod router;

pub use router::Router;
