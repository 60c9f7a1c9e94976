//! Recall - dual-store memory service
//!
//! A relational ledger of record (SQLite) paired with an external vector
//! backend, exposed to AI clients over MCP. The ledger owns lifecycle state
//! and audit history; the backend owns embeddings and similarity search.

pub mod acl;
pub mod backend;
pub mod error;
pub mod mcp;
pub mod service;
pub mod storage;
pub mod types;

pub use error::{RecallError, Result};
pub use service::{MemoryService, OperationContext};
pub use storage::Storage;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
