use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    extract::State,
    Json,
};
use serde_json::{ Map, Value as JsonValue };
use tower_http::cors::{ AllowHeaders, AllowMethods, AllowOrigin, CorsLayer };
use log::{ info, error, warn };

use crate::error::{ ApiError, ErrorResponse };
use crate::llm::InferenceClient;
use crate::llm::payload::{ build_chat_payload, build_diagram_payload };
use crate::llm::response::{ classify_error, extract_text };
use crate::models::{
    ChatRequest,
    ChatResponse,
    DiagramRequest,
    DiagramResponse,
    HealthResponse,
    McpConfig,
    McpUpdateResponse,
    RootResponse,
};

/// Shared, read-only state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    client: Option<Arc<dyn InferenceClient>>,
    region: String,
    service_name: String,
}

impl AppState {
    pub fn new(
        client: Option<Arc<dyn InferenceClient>>,
        region: impl Into<String>,
        service_name: impl Into<String>
    ) -> Self {
        Self { client, region: region.into(), service_name: service_name.into() }
    }

    pub fn client_ready(&self) -> bool {
        self.client.is_some()
    }

    fn client(&self) -> Result<&Arc<dyn InferenceClient>, ErrorResponse> {
        self.client.as_ref().ok_or_else(|| self.fail(ApiError::ClientNotInitialized))
    }

    fn fail(&self, err: ApiError) -> ErrorResponse {
        match &err {
            ApiError::Provider(provider) => {
                let classification = classify_error(provider);
                error!("Provider call failed [{}]: {}", classification.category, provider);
            }
            other => error!("Request failed [{}]: {}", other.error_type(), other),
        }
        ErrorResponse::new(err, self.region.clone())
    }
}

/// Allows every origin, method and header with credentials by mirroring the request.
/// Only suitable for local development.
pub fn permissive_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/diagram", post(diagram_handler))
        .route("/api/mcp/config", get(get_mcp_config_handler).post(update_mcp_config_handler))
        .layer(permissive_cors())
        .with_state(state)
}

async fn root_handler(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse::new(&state.region, state.client_ready()))
}

// Reports healthy even when the provider client failed to initialise; `/` carries that state.
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(&state.service_name, &state.region))
}

async fn chat_handler(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>
) -> Result<Json<ChatResponse>, ErrorResponse> {
    let client = state.client()?;
    info!("Chat request: {} history turns", req.conversation_history.len());

    let payload = build_chat_payload(&req.message, &req.conversation_history);
    let response = client.invoke(&payload).await.map_err(|e| state.fail(e))?;
    let reply = extract_text(&response).map_err(|e| state.fail(e))?;

    Ok(Json(ChatResponse::from_exchange(payload.messages, reply)))
}

async fn diagram_handler(
    State(state): State<AppState>,
    Json(req): Json<DiagramRequest>
) -> Result<Json<DiagramResponse>, ErrorResponse> {
    let client = state.client()?;
    info!("Diagram request: {} chars of description", req.description.chars().count());

    let payload = build_diagram_payload(&req.description);
    let response = client.invoke(&payload).await.map_err(|e| state.fail(e))?;
    let diagram = extract_text(&response).map_err(|e| state.fail(e))?;

    Ok(Json(DiagramResponse { diagram }))
}

async fn get_mcp_config_handler() -> Json<McpConfig> {
    Json(McpConfig::default())
}

async fn update_mcp_config_handler(Json(config): Json<Map<String, JsonValue>>) -> Json<McpUpdateResponse> {
    warn!("MCP config update received ({} keys); configuration is not persisted", config.len());
    Json(McpUpdateResponse::accepted(config))
}

/// Logged once at startup so the permissive CORS policy is never silent.
pub fn log_cors_policy() {
    warn!(
        "CORS allows any origin, method and header with credentials. Restrict this before exposing the API publicly."
    );
}
