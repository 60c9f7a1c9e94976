//! MCP tool definitions for Recall

use serde_json::json;

use super::protocol::ToolDefinition;

/// All tool definitions for Recall
pub const TOOL_DEFINITIONS: &[(&str, &str, &str)] = &[
    (
        "memory_add",
        "Add a new memory. Call this every time the user shares anything about themselves, their preferences, or anything worth keeping for future conversations, or asks you to remember something.",
        r#"{
            "type": "object",
            "properties": {
                "text": {"type": "string", "description": "The text to extract memories from"}
            },
            "required": ["text"]
        }"#,
    ),
    (
        "memory_search",
        "Search through stored memories. Call this whenever the user asks a question that stored context could help answer.",
        r#"{
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query"}
            },
            "required": ["query"]
        }"#,
    ),
    (
        "memory_list",
        "List all memories accessible to this client",
        r#"{"type": "object", "properties": {}}"#,
    ),
    (
        "memory_delete",
        "Delete specific memories by their IDs",
        r#"{
            "type": "object",
            "properties": {
                "memory_ids": {"type": "array", "items": {"type": "string"}, "description": "Memory IDs to delete"}
            },
            "required": ["memory_ids"]
        }"#,
    ),
    (
        "memory_delete_all",
        "Delete all memories accessible to this client",
        r#"{"type": "object", "properties": {}}"#,
    ),
];

/// Get all tool definitions as ToolDefinition structs
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    TOOL_DEFINITIONS
        .iter()
        .map(|(name, description, schema)| ToolDefinition {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: serde_json::from_str(schema).unwrap_or(json!({})),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_schemas_parse() {
        let defs = get_tool_definitions();
        assert_eq!(defs.len(), TOOL_DEFINITIONS.len());
        for def in defs {
            assert!(def.input_schema.is_object(), "schema for {} is not an object", def.name);
        }
    }
}
