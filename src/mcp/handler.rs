//! MCP request handler: dispatches tool calls into the memory service
//!
//! Identity context is established per session and resolved through the
//! session registry; a request naming an unknown or expired session gets a
//! distinct session-expired error, never a backend error. All operation
//! failures come back as structured tool results.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use uuid::Uuid;

use super::protocol::{
    methods, InitializeResult, McpHandler, McpRequest, McpResponse, ToolCallResult,
};
use super::tools::get_tool_definitions;
use crate::error::{RecallError, Result};
use crate::service::{MemoryService, OperationContext};
use crate::types::MemoryId;

/// Per-connection identity contexts
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, OperationContext>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Establish a session with its identity context
    pub fn open(&self, session_id: impl Into<String>, ctx: OperationContext) {
        self.sessions.lock().insert(session_id.into(), ctx);
    }

    /// Tear down a session (e.g. on connection loss)
    pub fn close(&self, session_id: &str) {
        self.sessions.lock().remove(session_id);
    }

    /// Resolve a session to its identity context
    pub fn resolve(&self, session_id: &str) -> Result<OperationContext> {
        self.sessions
            .lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| RecallError::SessionExpired {
                session: session_id.to_string(),
            })
    }
}

/// MCP request handler for the Recall memory service
pub struct RecallHandler {
    service: Arc<MemoryService>,
    sessions: SessionRegistry,
    default_ctx: OperationContext,
    runtime: tokio::runtime::Handle,
}

impl RecallHandler {
    pub fn new(
        service: Arc<MemoryService>,
        default_ctx: OperationContext,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        Self {
            service,
            sessions: SessionRegistry::new(),
            default_ctx,
            runtime,
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Identity context for one tool call: an explicit session wins, then
    /// inline identity arguments, then the process-level default.
    fn resolve_context(&self, args: &Value) -> Result<OperationContext> {
        if let Some(session_id) = args.get("session_id").and_then(|v| v.as_str()) {
            return self.sessions.resolve(session_id);
        }

        let user_id = args.get("user_id").and_then(|v| v.as_str());
        let client_name = args.get("client_name").and_then(|v| v.as_str());
        if let (Some(uid), Some(client)) = (user_id, client_name) {
            return Ok(OperationContext::new(uid, client));
        }

        Ok(self.default_ctx.clone())
    }

    fn dispatch_tool(&self, name: &str, args: &Value) -> Result<ToolCallResult> {
        let ctx = self.resolve_context(args)?;

        match name {
            "memory_add" => {
                let text = require_str(args, "text")?;
                let result = self.runtime.block_on(self.service.add(&ctx, text))?;
                Ok(ToolCallResult::json(&result))
            }
            "memory_search" => {
                let query = require_str(args, "query")?;
                let results = self.runtime.block_on(self.service.search(&ctx, query))?;
                Ok(ToolCallResult::json(&json!({ "results": results })))
            }
            "memory_list" => {
                let memories = self.runtime.block_on(self.service.list(&ctx))?;
                Ok(ToolCallResult::json(&memories))
            }
            "memory_delete" => {
                let ids = parse_memory_ids(args)?;
                let report = self.runtime.block_on(self.service.delete(&ctx, &ids))?;
                Ok(ToolCallResult::json(&report))
            }
            "memory_delete_all" => {
                let report = self.runtime.block_on(self.service.delete_all(&ctx))?;
                Ok(ToolCallResult::json(&report))
            }
            _ => Err(RecallError::InvalidInput(format!("unknown tool: {}", name))),
        }
    }
}

fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| RecallError::InvalidInput(format!("missing required argument '{}'", key)))
}

fn parse_memory_ids(args: &Value) -> Result<Vec<MemoryId>> {
    let raw = args
        .get("memory_ids")
        .and_then(|v| v.as_array())
        .ok_or_else(|| RecallError::InvalidInput("missing required argument 'memory_ids'".into()))?;

    raw.iter()
        .map(|v| {
            let s = v
                .as_str()
                .ok_or_else(|| RecallError::InvalidInput("memory_ids must be strings".into()))?;
            Uuid::parse_str(s)
                .map_err(|e| RecallError::InvalidInput(format!("invalid memory id '{}': {}", s, e)))
        })
        .collect()
}

impl McpHandler for RecallHandler {
    fn handle_request(&self, request: McpRequest) -> McpResponse {
        match request.method.as_str() {
            methods::INITIALIZE => {
                let result = InitializeResult::default();
                McpResponse::success(request.id, json!(result))
            }
            methods::INITIALIZED => McpResponse::success(request.id, json!({})),
            methods::LIST_TOOLS => {
                McpResponse::success(request.id, json!({ "tools": get_tool_definitions() }))
            }
            methods::CALL_TOOL => {
                let name = request
                    .params
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let args = request
                    .params
                    .get("arguments")
                    .cloned()
                    .unwrap_or(json!({}));

                match self.dispatch_tool(&name, &args) {
                    Ok(result) => McpResponse::success(request.id, json!(result)),
                    Err(err) => {
                        tracing::warn!(tool = %name, error = %err, "tool call failed");
                        // Failures are tool results, not protocol faults: the
                        // session stays alive and the client sees the message.
                        McpResponse::success(request.id, json!(ToolCallResult::error(err.to_string())))
                    }
                }
            }
            other => McpResponse::error(
                request.id,
                -32601,
                format!("Method not found: {}", other),
            ),
        }
    }
}
