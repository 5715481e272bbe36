use serde_json::Value as JsonValue;
use std::fmt::Display;

use crate::error::{ ApiError, ErrorCategory };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorClassification {
    pub category: ErrorCategory,
    pub hint: Option<&'static str>,
}

// Checked in order; the first identifier found in the error text wins.
const CLASSIFICATIONS: &[(&str, ErrorCategory, &str)] = &[
    (
        "ThrottlingException",
        ErrorCategory::RateLimited,
        "The provider is throttling requests. Wait a moment and retry.",
    ),
    (
        "AccessDeniedException",
        ErrorCategory::Authorization,
        "The IAM identity lacks the bedrock:InvokeModel permission for this model.",
    ),
    (
        "ResourceNotFoundException",
        ErrorCategory::NotFound,
        "The model is not available in this region or model access has not been enabled.",
    ),
    (
        "ValidationException",
        ErrorCategory::BadRequest,
        "The provider rejected the request as malformed. Check the message format and size.",
    ),
];

/// Pull the first generated text block (`content[0].text`) out of a provider response.
pub fn extract_text(response: &JsonValue) -> Result<String, ApiError> {
    response
        .pointer("/content/0/text")
        .and_then(|text| text.as_str())
        .map(str::to_owned)
        .ok_or_else(|| ApiError::MalformedResponse("missing content[0].text in provider response".to_string()))
}

pub fn classify_error<E: Display + ?Sized>(err: &E) -> ErrorClassification {
    let text = err.to_string();
    CLASSIFICATIONS
        .iter()
        .find(|(needle, _, _)| text.contains(needle))
        .map(|(_, category, hint)| ErrorClassification { category: *category, hint: Some(*hint) })
        .unwrap_or(ErrorClassification { category: ErrorCategory::Unknown, hint: None })
}
