use async_trait::async_trait;
use chrono::Utc;
use log::{ error, info };
use reqwest::{ Client as HttpClient, StatusCode, header::{ ACCEPT, AUTHORIZATION, CONTENT_TYPE } };
use serde_json::Value as JsonValue;
use url::Url;
use uuid::Uuid;

use super::credentials::CredentialsProvider;
use super::payload::ProviderPayload;
use super::sigv4::{ Signer, SigningRequest, uri_encode };
use super::{ BedrockConfig, Credentials, InferenceClient };
use crate::error::{ ApiError, ClientInitError, ProviderError, error_chain };

const SIGNING_SERVICE: &str = "bedrock";
const ERROR_TYPE_HEADER: &str = "x-amzn-errortype";

enum Auth {
    SigV4 {
        signer: Signer,
        provider: CredentialsProvider,
    },
    ApiKey(String),
}

/// Client for the Bedrock runtime `InvokeModel` operation.
pub struct BedrockClient {
    http: HttpClient,
    url: Url,
    host: String,
    auth: Auth,
    model_id: String,
}

impl BedrockClient {
    pub async fn from_config(config: &BedrockConfig) -> Result<Self, ClientInitError> {
        if !is_valid_region(&config.region) {
            return Err(ClientInitError::InvalidRegion(config.region.clone()));
        }

        let endpoint = config.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-runtime.{}.amazonaws.com", config.region));
        let mut url = Url::parse(&endpoint).map_err(|e| ClientInitError::InvalidEndpoint {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;
        if url.query().is_some() || url.fragment().is_some() {
            return Err(ClientInitError::InvalidEndpoint {
                endpoint,
                reason: "query strings and fragments are not allowed".to_string(),
            });
        }
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(ClientInitError::InvalidEndpoint {
                    endpoint,
                    reason: "missing host".to_string(),
                });
            }
        };
        let path = format!(
            "{}/model/{}/invoke",
            url.path().trim_end_matches('/'),
            uri_encode(&config.model_id)
        );
        url.set_path(&path);

        let auth = match config.credentials.clone() {
            Some(Credentials::SigV4(chain)) =>
                Auth::SigV4 {
                    signer: Signer::new(config.region.clone(), SIGNING_SERVICE),
                    provider: CredentialsProvider::resolve(chain).await?,
                },
            Some(Credentials::ApiKey(key)) => Auth::ApiKey(key),
            None => {
                return Err(ClientInitError::MissingCredentials);
            }
        };

        let mut builder = HttpClient::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            url,
            host,
            auth,
            model_id: config.model_id.clone(),
        })
    }

    #[cfg(test)]
    pub fn endpoint(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl InferenceClient for BedrockClient {
    async fn invoke(&self, payload: &ProviderPayload) -> Result<JsonValue, ApiError> {
        let request_id = Uuid::new_v4();
        let body = serde_json::to_vec(payload)
            .map_err(|e| ProviderError::transport(format!("failed to encode request body: {}", e)))?;

        let mut req = self.http
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");

        match &self.auth {
            Auth::SigV4 { signer, provider } => {
                let credentials = provider.current().await?;
                let signed = signer.sign(
                    &credentials,
                    &(SigningRequest {
                        method: "POST",
                        path: self.url.path(),
                        host: &self.host,
                        headers: &[("content-type", "application/json")],
                        body: &body,
                    }),
                    Utc::now()
                );
                req = req.header(AUTHORIZATION, signed.authorization).header("x-amz-date", signed.amz_date);
                if let Some(token) = signed.security_token {
                    req = req.header("x-amz-security-token", token);
                }
            }
            Auth::ApiKey(key) => {
                req = req.bearer_auth(key);
            }
        }

        info!(
            "[{}] InvokeModel {} ({} messages, temperature {})",
            request_id,
            self.model_id,
            payload.messages.len(),
            payload.temperature
        );

        let resp = req
            .body(body)
            .send().await
            .map_err(|e| ProviderError::transport(error_chain(&e)))?;

        let status = resp.status();
        let error_type = resp.headers()
            .get(ERROR_TYPE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let text = resp.text().await.map_err(|e| ProviderError::transport(error_chain(&e)))?;

        if !status.is_success() {
            let err = provider_error(status, error_type.as_deref(), &text);
            error!("[{}] InvokeModel failed with status {}: {}", request_id, status, err);
            return Err(err.into());
        }

        info!("[{}] InvokeModel succeeded ({} bytes)", request_id, text.len());
        serde_json::from_str(&text).map_err(|e| ApiError::MalformedResponse(format!("provider returned invalid JSON: {}", e)))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Build a [`ProviderError`] from a non-success Bedrock response.
pub fn provider_error(status: StatusCode, error_type: Option<&str>, body: &str) -> ProviderError {
    // The header looks like `ValidationException:http://internal.amazon.com/coral/...`.
    let code = error_type
        .and_then(|t| t.split(':').next())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .or_else(|| code_for_status(status).map(str::to_owned));

    let message = serde_json
        ::from_str::<JsonValue>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("Message"))
                .and_then(|m| m.as_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.to_string()
            } else {
                body.trim().to_string()
            }
        });

    ProviderError { status: Some(status.as_u16()), code, message }
}

fn code_for_status(status: StatusCode) -> Option<&'static str> {
    match status {
        StatusCode::BAD_REQUEST => Some("ValidationException"),
        StatusCode::FORBIDDEN => Some("AccessDeniedException"),
        StatusCode::NOT_FOUND => Some("ResourceNotFoundException"),
        StatusCode::TOO_MANY_REQUESTS => Some("ThrottlingException"),
        _ => None,
    }
}

fn is_valid_region(region: &str) -> bool {
    region.starts_with(|c: char| c.is_ascii_lowercase()) &&
        region.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') &&
        !region.ends_with('-')
}
