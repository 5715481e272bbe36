use axum::{ http::StatusCode, response::{ IntoResponse, Response }, Json };
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::llm::response::classify_error;

/// Failure reported by the inference provider, or by the transport on the way to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub status: Option<u16>,
    /// Provider error identifier such as `ThrottlingException`, when one is known.
    pub code: Option<String>,
    pub message: String,
}

impl ProviderError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self { status: None, code: None, message: message.into() }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{}: {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Render an error with its whole `source()` chain, outermost first.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !text.ends_with(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bedrock client is not initialized")]
    ClientNotInitialized,

    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("Unexpected provider response: {0}")]
    MalformedResponse(String),
}

impl ApiError {
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::ClientNotInitialized => "ClientNotInitialized",
            ApiError::Provider(_) => "ProviderError",
            ApiError::MalformedResponse(_) => "MalformedResponse",
        }
    }

    pub fn detail(&self, region: &str) -> ErrorDetail {
        let (category, hint) = match self {
            ApiError::ClientNotInitialized => (
                None,
                Some("Check the AWS credentials and region configuration, then restart the service."),
            ),
            ApiError::Provider(err) => {
                let classification = classify_error(err);
                (Some(classification.category), classification.hint)
            }
            ApiError::MalformedResponse(_) => (None, None),
        };

        ErrorDetail {
            error_type: self.error_type(),
            error_message: self.to_string(),
            region: region.to_string(),
            category,
            hint,
        }
    }
}

/// Errors raised while building the provider client at startup.
#[derive(Debug, Error)]
pub enum ClientInitError {
    #[error("invalid AWS region '{0}'")]
    InvalidRegion(String),

    #[error("invalid Bedrock endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("no AWS credentials found (environment, shared profile, container or instance metadata)")]
    MissingCredentials,

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCategory {
    Authorization,
    NotFound,
    BadRequest,
    RateLimited,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Authorization => "Authorization",
            ErrorCategory::NotFound => "NotFound",
            ErrorCategory::BadRequest => "BadRequest",
            ErrorCategory::RateLimited => "RateLimited",
            ErrorCategory::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub error_type: &'static str,
    pub error_message: String,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ErrorCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

#[derive(Serialize)]
struct ErrorBody {
    detail: ErrorDetail,
}

/// An [`ApiError`] bound to the region it should be reported against.
#[derive(Debug)]
pub struct ErrorResponse {
    pub error: ApiError,
    pub region: String,
}

impl ErrorResponse {
    pub fn new(error: ApiError, region: impl Into<String>) -> Self {
        Self { error, region: region.into() }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let body = ErrorBody { detail: self.error.detail(&self.region) };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
