use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One user/assistant exchange (C11), append-only except bounded cleanup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DialogTurn {
    pub turn_id: String,
    pub user_text: String,
    pub assistant_text: String,
    pub created_at: DateTime<Utc>,
}

/// Ordered, bounded history of dialog turns, scoped to a single session
/// (SPEC_FULL.md §4.13). Not persisted — lives for the lifetime of the
/// owning session map entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<DialogTurn>,
    max_turns: usize,
    auto_cleanup: bool,
}

impl Conversation {
    pub fn new(max_turns: usize, auto_cleanup: bool) -> Self {
        Self {
            turns: Vec::new(),
            max_turns,
            auto_cleanup,
        }
    }

    /// Appends a turn, then — if `auto_cleanup` is set and the cap is
    /// exceeded — drops the oldest turns until `len() <= max_turns`
    /// (invariant #2, §8).
    pub fn append(&mut self, user_text: impl Into<String>, assistant_text: impl Into<String>) {
        self.turns.push(DialogTurn {
            turn_id: Uuid::new_v4().to_string(),
            user_text: user_text.into(),
            assistant_text: assistant_text.into(),
            created_at: Utc::now(),
        });
        if self.auto_cleanup {
            while self.turns.len() > self.max_turns {
                self.turns.remove(0);
            }
        }
    }

    pub fn snapshot(&self) -> &[DialogTurn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&DialogTurn> {
        self.turns.last()
    }

    pub fn get(&self, turn_id: &str) -> Option<&DialogTurn> {
        self.turns.iter().find(|t| t.turn_id == turn_id)
    }

    pub fn remove(&mut self, turn_id: &str) -> bool {
        let before = self.turns.len();
        self.turns.retain(|t| t.turn_id != turn_id);
        self.turns.len() != before
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_respects_cap_with_auto_cleanup() {
        let mut conv = Conversation::new(2, true);
        conv.append("q1", "a1");
        conv.append("q2", "a2");
        conv.append("q3", "a3");
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.snapshot()[0].user_text, "q2");
        assert_eq!(conv.snapshot()[1].user_text, "q3");
    }

    #[test]
    fn append_without_auto_cleanup_grows_unbounded() {
        let mut conv = Conversation::new(1, false);
        conv.append("q1", "a1");
        conv.append("q2", "a2");
        assert_eq!(conv.len(), 2);
    }

    #[test]
    fn remove_and_clear() {
        let mut conv = Conversation::new(10, true);
        conv.append("q1", "a1");
        let id = conv.last().expect("turn").turn_id.clone();
        assert!(conv.remove(&id));
        assert!(conv.is_empty());
        conv.append("q2", "a2");
        conv.clear();
        assert!(conv.is_empty());
    }
}
