pub mod chat;
pub mod status;

pub use chat::{ ChatRequest, ChatResponse, ChatTurn, DiagramRequest, DiagramResponse, Role };
pub use status::{ HealthResponse, McpConfig, McpUpdateResponse, RootResponse };
