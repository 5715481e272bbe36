use std::sync::Arc;
use std::sync::atomic::{ AtomicUsize, Ordering };

use async_trait::async_trait;
use axum::{
    body::{ to_bytes, Body },
    extract::Request,
    http::{ header::CONTENT_TYPE, StatusCode },
    Router,
};
use bedrock_ui_backend::error::{ ApiError, ProviderError };
use bedrock_ui_backend::llm::InferenceClient;
use bedrock_ui_backend::llm::payload::ProviderPayload;
use bedrock_ui_backend::server::{ router, AppState };
use serde_json::{ json, Value as JsonValue };
use tokio::sync::Mutex;
use tower::ServiceExt;

enum Reply {
    Text(&'static str),
    Raw(JsonValue),
    Fail(ProviderError),
}

struct FakeClient {
    reply: Reply,
    calls: AtomicUsize,
    last_payload: Mutex<Option<ProviderPayload>>,
}

impl FakeClient {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self { reply, calls: AtomicUsize::new(0), last_payload: Mutex::new(None) })
    }
}

#[async_trait]
impl InferenceClient for FakeClient {
    async fn invoke(&self, payload: &ProviderPayload) -> Result<JsonValue, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_payload.lock().await = Some(payload.clone());
        match &self.reply {
            Reply::Text(text) => Ok(json!({"content": [{"type": "text", "text": text}]})),
            Reply::Raw(value) => Ok(value.clone()),
            Reply::Fail(err) => Err(ApiError::Provider(err.clone())),
        }
    }

    fn model_id(&self) -> &str {
        "fake-model"
    }
}

fn app_with(client: Option<Arc<FakeClient>>) -> Router {
    let client = client.map(|c| c as Arc<dyn InferenceClient>);
    router(AppState::new(client, "ap-northeast-1", "bedrock-ui-backend"))
}

async fn send(app: Router, method: &str, uri: &str, body: Option<JsonValue>) -> (StatusCode, JsonValue) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) =>
            builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    // Extractor rejections come back as plain text.
    let json = serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null);
    (status, json)
}

#[cfg(test)]
mod status_tests {
    use super::*;

    #[tokio::test]
    async fn root_reports_client_state() {
        let (status, body) = send(app_with(Some(FakeClient::new(Reply::Text("x")))), "GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Bedrock UI API is running");
        assert_eq!(body["region"], "ap-northeast-1");
        assert_eq!(body["bedrock_client"], "initialized");

        let (_, body) = send(app_with(None), "GET", "/", None).await;
        assert_eq!(body["bedrock_client"], "not initialized");
    }

    #[tokio::test]
    async fn health_is_healthy_without_client() {
        let (status, body) = send(app_with(None), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"status": "healthy", "service": "bedrock-ui-backend", "region": "ap-northeast-1"})
        );
    }

    #[tokio::test]
    async fn cors_mirrors_origin_with_credentials() {
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/api/chat")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "content-type")
            .body(Body::empty())
            .unwrap();

        let resp = app_with(None).oneshot(req).await.unwrap();
        let headers = resp.headers();
        assert_eq!(headers["access-control-allow-origin"], "http://localhost:3000");
        assert_eq!(headers["access-control-allow-credentials"], "true");
        assert_eq!(headers["access-control-allow-methods"], "POST");
    }
}

#[cfg(test)]
mod chat_tests {
    use super::*;

    #[tokio::test]
    async fn chat_returns_reply_and_extended_history() {
        let client = FakeClient::new(Reply::Text("I am fine."));
        let history = json!([
            {"role": "user", "content": "Hello"},
            {"role": "assistant", "content": "Hi! How can I help?"}
        ]);

        let (status, body) = send(
            app_with(Some(client.clone())),
            "POST",
            "/api/chat",
            Some(json!({"message": "How are you?", "conversation_history": history}))
        ).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "I am fine.");
        let turns = body["conversation_history"].as_array().unwrap();
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0], history[0]);
        assert_eq!(turns[1], history[1]);
        assert_eq!(turns[2], json!({"role": "user", "content": "How are you?"}));
        assert_eq!(turns[3], json!({"role": "assistant", "content": "I am fine."}));

        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        let payload = client.last_payload.lock().await.clone().unwrap();
        assert_eq!(payload.messages.len(), 3);
        assert_eq!(payload.temperature, 0.7);
    }

    #[tokio::test]
    async fn chat_history_is_optional() {
        let (status, body) = send(
            app_with(Some(FakeClient::new(Reply::Text("pong")))),
            "POST",
            "/api/chat",
            Some(json!({"message": "ping"}))
        ).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["conversation_history"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_turns_are_kept() {
        let history = json!([
            {"role": "user", "content": "same"},
            {"role": "user", "content": "same"}
        ]);
        let (_, body) = send(
            app_with(Some(FakeClient::new(Reply::Text("ok")))),
            "POST",
            "/api/chat",
            Some(json!({"message": "same", "conversation_history": history}))
        ).await;

        let turns = body["conversation_history"].as_array().unwrap();
        assert_eq!(turns.len(), 4);
        assert!(turns[..3].iter().all(|t| t["content"] == "same"));
    }

    #[tokio::test]
    async fn chat_without_client_fails_fast() {
        let (status, body) = send(app_with(None), "POST", "/api/chat", Some(json!({"message": "hi"}))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"]["error_type"], "ClientNotInitialized");
        assert_eq!(body["detail"]["region"], "ap-northeast-1");
    }

    #[tokio::test]
    async fn throttled_chat_is_classified() {
        let client = FakeClient::new(
            Reply::Fail(ProviderError {
                status: Some(429),
                code: Some("ThrottlingException".into()),
                message: "Too many requests, please wait before trying again.".into(),
            })
        );

        let (status, body) = send(app_with(Some(client)), "POST", "/api/chat", Some(json!({"message": "hi"}))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let detail = &body["detail"];
        assert_eq!(detail["error_type"], "ProviderError");
        assert_eq!(detail["category"], "RateLimited");
        assert!(detail["error_message"].as_str().unwrap().contains("ThrottlingException"));
        assert!(detail["hint"].is_string());
    }

    #[tokio::test]
    async fn unknown_provider_error_has_no_hint() {
        let client = FakeClient::new(Reply::Fail(ProviderError::transport("connection reset by peer")));

        let (_, body) = send(app_with(Some(client)), "POST", "/api/chat", Some(json!({"message": "hi"}))).await;

        assert_eq!(body["detail"]["category"], "Unknown");
        assert_eq!(body["detail"]["error_message"], "connection reset by peer");
        assert!(body["detail"].get("hint").is_none());
    }

    #[tokio::test]
    async fn malformed_provider_response_is_reported() {
        let client = FakeClient::new(Reply::Raw(json!({"content": []})));

        let (status, body) = send(app_with(Some(client)), "POST", "/api/chat", Some(json!({"message": "hi"}))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"]["error_type"], "MalformedResponse");
    }

    #[tokio::test]
    async fn invalid_role_is_rejected_before_provider_call() {
        let client = FakeClient::new(Reply::Text("never"));
        let (status, _) = send(
            app_with(Some(client.clone())),
            "POST",
            "/api/chat",
            Some(json!({"message": "hi", "conversation_history": [{"role": "system", "content": "x"}]}))
        ).await;

        assert!(status.is_client_error());
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }
}

#[cfg(test)]
mod diagram_tests {
    use super::*;

    #[tokio::test]
    async fn diagram_returns_raw_markup() {
        let client = FakeClient::new(Reply::Text("graph TD\n  ALB --> EC2"));
        let (status, body) = send(
            app_with(Some(client.clone())),
            "POST",
            "/api/diagram",
            Some(json!({"description": "a web app behind a load balancer"}))
        ).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"diagram": "graph TD\n  ALB --> EC2"}));

        let payload = client.last_payload.lock().await.clone().unwrap();
        assert_eq!(payload.temperature, 0.5);
        assert_eq!(payload.messages.len(), 1);
        assert!(payload.messages[0].content.contains("a web app behind a load balancer"));
    }

    #[tokio::test]
    async fn diagram_without_client_fails_fast() {
        let (status, body) = send(
            app_with(None),
            "POST",
            "/api/diagram",
            Some(json!({"description": "three tier app"}))
        ).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"]["error_type"], "ClientNotInitialized");
    }

    #[tokio::test]
    async fn access_denied_diagram_is_classified() {
        let client = FakeClient::new(
            Reply::Fail(ProviderError {
                status: Some(403),
                code: Some("AccessDeniedException".into()),
                message: "You don't have access to the model with the specified model ID.".into(),
            })
        );
        let (_, body) = send(
            app_with(Some(client)),
            "POST",
            "/api/diagram",
            Some(json!({"description": "serverless api"}))
        ).await;

        assert_eq!(body["detail"]["category"], "Authorization");
    }
}

#[cfg(test)]
mod mcp_tests {
    use super::*;

    #[tokio::test]
    async fn mcp_config_is_a_static_stub() {
        let (status, body) = send(app_with(None), "GET", "/api/mcp/config", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"servers": [], "description": "MCP Server Configuration"}));
    }

    #[tokio::test]
    async fn mcp_config_update_echoes_without_persisting() {
        let config = json!({"servers": [{"name": "aws-docs", "command": "uvx"}]});
        let (status, body) = send(app_with(None), "POST", "/api/mcp/config", Some(config.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "success", "config": config}));

        let (_, body) = send(app_with(None), "GET", "/api/mcp/config", None).await;
        assert_eq!(body["servers"], json!([]));
    }

    #[tokio::test]
    async fn mcp_config_update_requires_an_object() {
        let (status, _) = send(app_with(None), "POST", "/api/mcp/config", Some(json!([1, 2, 3]))).await;
        assert!(status.is_client_error());
    }
}
