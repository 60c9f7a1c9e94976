//! MCP (Model Context Protocol) server surface
//!
//! JSON-RPC over stdio for AI client integration.

pub mod handler;
pub mod protocol;
pub mod tools;

pub use handler::{RecallHandler, SessionRegistry};
pub use protocol::{
    methods, InitializeResult, McpHandler, McpRequest, McpResponse, McpServer, ToolCallResult,
};
pub use tools::{get_tool_definitions, TOOL_DEFINITIONS};
