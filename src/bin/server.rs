//! Recall MCP Server
//!
//! Run with: recall-server

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recall::acl::OpenPolicy;
use recall::error::Result;
use recall::mcp::{McpServer, RecallHandler};
use recall::service::{MemoryService, OperationContext};
use recall::storage::Storage;
use recall::types::{ServiceConfig, StorageConfig};

#[cfg(feature = "remote")]
use recall::backend::{RemoteBackend, VectorBackend};

#[derive(Parser, Debug)]
#[command(name = "recall-server")]
#[command(about = "Recall MCP server for AI memory")]
struct Args {
    /// Database path
    #[arg(
        long,
        env = "RECALL_DB_PATH",
        default_value = "~/.local/share/recall/memories.db"
    )]
    db_path: String,

    /// Vector backend base URL (unset = ledger-only mode)
    #[arg(long, env = "RECALL_BACKEND_URL")]
    backend_url: Option<String>,

    /// Vector backend API key
    #[arg(long, env = "RECALL_BACKEND_API_KEY")]
    backend_api_key: Option<String>,

    /// User identity for this connection
    #[arg(long, env = "RECALL_USER_ID", default_value = "default_user")]
    user_id: String,

    /// Client name for this connection
    #[arg(long, env = "RECALL_CLIENT_NAME", default_value = "default_client")]
    client_name: String,

    /// Hard deadline for backend calls, in seconds
    #[arg(long, env = "RECALL_OPERATION_TIMEOUT", default_value = "120")]
    operation_timeout_secs: u64,

    /// Maximum input text length, in characters
    #[arg(long, env = "RECALL_MAX_INPUT_LENGTH", default_value = "8000")]
    max_input_len: usize,

    /// Truncate over-long input instead of rejecting it
    #[arg(long, env = "RECALL_TRUNCATE_LONG_INPUT", default_value = "true")]
    truncate_long_input: bool,

    /// Default result limit for search
    #[arg(long, env = "RECALL_SEARCH_LIMIT", default_value = "10")]
    search_limit: usize,
}

fn main() -> Result<()> {
    // Initialize logging to stderr (stdout is for MCP protocol)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    // Expand ~ in path
    let db_path = shellexpand::tilde(&args.db_path).to_string();
    let storage = Storage::open(StorageConfig { db_path })?;

    let config = ServiceConfig {
        operation_timeout_secs: args.operation_timeout_secs,
        max_input_len: args.max_input_len,
        truncate_long_input: args.truncate_long_input,
        search_limit: args.search_limit,
    };

    #[cfg(feature = "remote")]
    let backend: Option<Arc<dyn VectorBackend>> = args.backend_url.as_ref().map(|url| {
        Arc::new(RemoteBackend::new(url.clone(), args.backend_api_key.clone()))
            as Arc<dyn VectorBackend>
    });
    #[cfg(not(feature = "remote"))]
    let backend = None;

    if backend.is_none() {
        tracing::warn!("no vector backend configured; add/search/delete will report unavailable");
    }

    let service = Arc::new(MemoryService::new(
        storage,
        backend,
        Arc::new(OpenPolicy),
        config,
    ));

    // The stdio loop is synchronous; backend-bound operations run on this
    // runtime via the handle held by the handler.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let default_ctx = OperationContext::new(args.user_id, args.client_name);
    let handler = RecallHandler::new(service, default_ctx, runtime.handle().clone());

    tracing::info!(version = recall::VERSION, "recall MCP server starting");
    let server = McpServer::new(handler);
    server.run()
}
