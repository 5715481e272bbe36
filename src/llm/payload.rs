use serde::Serialize;

use crate::models::ChatTurn;

pub const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
pub const MAX_TOKENS: u32 = 2000;
pub const CHAT_TEMPERATURE: f64 = 0.7;
pub const DIAGRAM_TEMPERATURE: f64 = 0.5;

/// Request body for an Anthropic model on Bedrock `InvokeModel`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderPayload {
    #[serde(rename = "anthropic_version")]
    pub protocol_version: &'static str,
    pub max_tokens: u32,
    pub messages: Vec<ChatTurn>,
    pub temperature: f64,
}

impl ProviderPayload {
    fn new(messages: Vec<ChatTurn>, temperature: f64) -> Self {
        Self {
            protocol_version: ANTHROPIC_VERSION,
            max_tokens: MAX_TOKENS,
            messages,
            temperature,
        }
    }
}

pub fn build_chat_payload(message: &str, history: &[ChatTurn]) -> ProviderPayload {
    let mut messages = history.to_vec();
    messages.push(ChatTurn::user(message));
    ProviderPayload::new(messages, CHAT_TEMPERATURE)
}

pub fn build_diagram_payload(description: &str) -> ProviderPayload {
    ProviderPayload::new(vec![ChatTurn::user(diagram_prompt(description))], DIAGRAM_TEMPERATURE)
}

/// Instruction asking for an AWS architecture diagram in bare Mermaid notation.
pub fn diagram_prompt(description: &str) -> String {
    format!(
        "\n以下の説明に基づいて、AWS構成図をMermaid記法で生成してください。\n\
         適切なAWSサービスを選択し、それらの関係を示してください。\n\
         \n\
         説明: {}\n\
         \n\
         Mermaid記法のみを返してください（コードブロックなし）。\n",
        description
    )
}
