use serde::Serialize;
use serde_json::{ Map, Value as JsonValue };

pub const ROOT_MESSAGE: &str = "Bedrock UI API is running";
pub const MCP_CONFIG_DESCRIPTION: &str = "MCP Server Configuration";

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub region: String,
    pub bedrock_client: &'static str,
}

impl RootResponse {
    pub fn new(region: &str, client_ready: bool) -> Self {
        Self {
            message: ROOT_MESSAGE,
            region: region.to_string(),
            bedrock_client: if client_ready { "initialized" } else { "not initialized" },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
    pub region: String,
}

impl HealthResponse {
    pub fn healthy(service: &str, region: &str) -> Self {
        Self {
            status: "healthy",
            service: service.to_string(),
            region: region.to_string(),
        }
    }
}

/// Static MCP server listing. Nothing is read from disk.
#[derive(Debug, Serialize)]
pub struct McpConfig {
    pub servers: Vec<JsonValue>,
    pub description: &'static str,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self { servers: Vec::new(), description: MCP_CONFIG_DESCRIPTION }
    }
}

/// Echo of a submitted MCP configuration. Nothing is persisted.
#[derive(Debug, Serialize)]
pub struct McpUpdateResponse {
    pub status: &'static str,
    pub config: Map<String, JsonValue>,
}

impl McpUpdateResponse {
    pub fn accepted(config: Map<String, JsonValue>) -> Self {
        Self { status: "success", config }
    }
}
