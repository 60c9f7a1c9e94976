//! Ledger of record for Recall
//!
//! SQLite-backed identity, lifecycle state, and audit history. The ledger is
//! the authority for what may be served, even when the vector backend
//! disagrees.

pub mod access_log;
mod connection;
pub mod identity;
pub mod ledger;
mod migrations;

pub use connection::Storage;
pub use migrations::SCHEMA_VERSION;
