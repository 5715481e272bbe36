use serde::{ Serialize, Deserialize };

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<ChatTurn>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_history: Vec<ChatTurn>,
}

impl ChatResponse {
    /// `sent` is the message list that went to the provider: caller history plus the new user turn.
    pub fn from_exchange(sent: Vec<ChatTurn>, reply: String) -> Self {
        let mut conversation_history = sent;
        conversation_history.push(ChatTurn::assistant(reply.clone()));
        Self { response: reply, conversation_history }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct DiagramRequest {
    pub description: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct DiagramResponse {
    pub diagram: String,
}
