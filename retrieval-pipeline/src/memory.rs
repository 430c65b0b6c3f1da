//! C11 Conversation Memory wiring (SPEC_FULL.md §4.13): a process-scoped
//! map from session id to [`common::model::Conversation`], grounded on
//! the teacher's in-memory session-keyed stores in `api-router`, adapted
//! from an axum-session extractor to a plain `Mutex<HashMap>` since the
//! spec's session concept is "caller-supplied identity", not a cookie.

use std::collections::HashMap;
use std::sync::Arc;

use common::model::Conversation;
use tokio::sync::Mutex;

/// Conversation history is not size-unbounded by default — §4.13's
/// `max_turns` invariant needs a concrete cap when a session is first
/// seen; 50 turns is generous for a chat-style exchange without growing
/// unboundedly across a long-lived process.
const DEFAULT_MAX_TURNS: usize = 50;

/// Process-wide, session-keyed conversation store (§3 "Ownership":
/// "a process-scoped map keyed by caller identity").
#[derive(Clone)]
pub struct ConversationStore {
    sessions: Arc<Mutex<HashMap<String, Conversation>>>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns a snapshot of the session's turns (empty if the session
    /// doesn't exist yet).
    pub async fn snapshot(&self, session_id: &str) -> Vec<common::model::conversation::DialogTurn> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(session_id)
            .map(|c| c.snapshot().to_vec())
            .unwrap_or_default()
    }

    /// Appends a Dialog Turn to the session, creating the conversation on
    /// first use (invariant #3, §8: exactly one turn per successfully
    /// answered query; callers must not call this on cancellation).
    pub async fn append(&self, session_id: &str, user_text: impl Into<String>, assistant_text: impl Into<String>) {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Conversation::new(DEFAULT_MAX_TURNS, true))
            .append(user_text, assistant_text);
    }

    /// Counts assistant turns recorded so far for a session — the basis
    /// for the Deep Research Controller's iteration counter (§4.11).
    pub async fn assistant_turn_count(&self, session_id: &str) -> usize {
        let sessions = self.sessions.lock().await;
        sessions.get(session_id).map(Conversation::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_creates_session_on_first_use() {
        let store = ConversationStore::new();
        assert_eq!(store.assistant_turn_count("s1").await, 0);
        store.append("s1", "hello", "hi there").await;
        assert_eq!(store.assistant_turn_count("s1").await, 1);
        let snapshot = store.snapshot("s1").await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].user_text, "hello");
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = ConversationStore::new();
        store.append("a", "q", "a").await;
        assert_eq!(store.assistant_turn_count("b").await, 0);
    }
}
