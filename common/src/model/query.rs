use serde::{Deserialize, Serialize};

use super::repository::RepositoryDescriptor;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

/// A caller's query against one or more repositories (§3, §6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryRequest {
    pub repos: Vec<RepositoryDescriptor>,
    pub messages: Vec<ChatMessage>,
    pub pinned_file_path: Option<String>,
    pub language: Option<String>,
    pub provider_id: Option<String>,
    pub model_id: Option<String>,
    pub session_id: String,
}

impl QueryRequest {
    /// The text of the most recent user message, which the Query Pipeline
    /// treats as "the query" for this turn.
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
    }
}
