//! C12 Deep Research Controller (SPEC_FULL.md §4.11): detects the
//! `[DEEP RESEARCH]` marker and the "continue research" phrase family,
//! tracks the iteration counter `k`, and resolves the effective query
//! text a turn should actually be answered against. Grounded on the
//! teacher's `RetrievalStrategy` enum (a small closed set of modes
//! selected up front and threaded through the rest of the pipeline) —
//! generalized here to a research *phase* driven by turn count instead
//! of a caller-supplied strategy.

use common::model::conversation::DialogTurn;
use common::model::query::{ChatMessage, MessageRole};

const DEEP_RESEARCH_MARKER: &str = "[DEEP RESEARCH]";

/// First deep-research turn (§4.11).
const DEEP_RESEARCH_FIRST_ITERATION: usize = 1;

/// Iteration at which the controller must produce a conclusive answer
/// instead of requesting another round; kept as a named constant since
/// it is a policy knob, not an intrinsic property of the algorithm.
const DEEP_RESEARCH_FINAL_ITERATION: usize = 5;

/// Phrases that mean "keep going", matched case-insensitively after
/// trimming surrounding whitespace (§4.11).
const CONTINUE_PHRASES: &[&str] = &[
    "continue research",
    "continue the research",
    "please continue",
    "continue",
];

/// A query's research mode for this turn (§4.10's prompt-selection table).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResearchPhase {
    /// No `[DEEP RESEARCH]` marker found anywhere in this session: answer
    /// the turn directly with the standard chat system prompt.
    SimpleChat,
    /// `k == 1`: the first deep-research turn.
    First,
    /// `1 < k < 5`: an intermediate research turn.
    Intermediate,
    /// `k >= 5`: the final turn; the controller must produce a conclusive
    /// answer rather than requesting another round.
    Final,
}

/// The controller's resolution for one turn: which phase to prompt for,
/// the 1-based iteration counter, and the text to actually treat as the
/// research topic (the original topic, not a bare "continue").
#[derive(Debug, Clone)]
pub struct Resolution {
    pub phase: ResearchPhase,
    pub iteration: usize,
    pub topic: String,
}

fn contains_marker(text: &str) -> bool {
    text.contains(DEEP_RESEARCH_MARKER)
}

fn strip_marker(text: &str) -> String {
    text.replace(DEEP_RESEARCH_MARKER, "").trim().to_string()
}

/// True if `text`, trimmed and case-folded, is exactly one of the
/// "keep going" phrases — not merely containing one as a substring, so a
/// genuine question that happens to start with "continue" isn't mistaken
/// for a continuation request.
fn is_continue_phrase(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    CONTINUE_PHRASES.iter().any(|p| *p == normalized)
}

/// Resolves the research phase and effective topic for the current user
/// turn.
///
/// Per §4.11 the controller observes the ordered `messages` of the
/// *request itself* — `k = (#assistant messages in the request) + 1` —
/// since a deep-research request carries its own unfolding transcript
/// (the caller resends the "## Research Plan" turns it got back). `history`
/// is the session's prior turns as recorded server-side by conversation
/// memory; it only contributes when the request doesn't carry its own
/// transcript (a client that sends just the newest message and relies on
/// `session_id` continuity).
pub fn resolve(messages: &[ChatMessage], history: &[DialogTurn]) -> Resolution {
    let current_user_text = messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::User)
        .map(|m| m.content.as_str())
        .unwrap_or("");

    let marker_in_request = messages.iter().any(|m| contains_marker(&m.content));
    let marker_in_history = history.iter().any(|t| contains_marker(&t.user_text));
    let marker_now = contains_marker(current_user_text);

    if !marker_now && !marker_in_request && !marker_in_history {
        return Resolution {
            phase: ResearchPhase::SimpleChat,
            iteration: 0,
            topic: current_user_text.to_string(),
        };
    }

    let assistant_turns_in_request = messages.iter().filter(|m| m.role == MessageRole::Assistant).count();
    let iteration = if assistant_turns_in_request > 0 {
        assistant_turns_in_request + 1
    } else {
        history.len() + 1
    };

    let phase = if iteration == DEEP_RESEARCH_FIRST_ITERATION {
        ResearchPhase::First
    } else if iteration < DEEP_RESEARCH_FINAL_ITERATION {
        ResearchPhase::Intermediate
    } else {
        ResearchPhase::Final
    };

    let topic = if is_continue_phrase(current_user_text) {
        messages
            .iter()
            .rev()
            .skip(1)
            .filter(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .find(|t| !is_continue_phrase(t))
            .or_else(|| {
                history
                    .iter()
                    .map(|t| t.user_text.as_str())
                    .find(|t| !is_continue_phrase(t))
            })
            .map(strip_marker)
            .unwrap_or_else(|| strip_marker(current_user_text))
    } else {
        strip_marker(current_user_text)
    };

    Resolution {
        phase,
        iteration,
        topic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(user_text: &str) -> DialogTurn {
        DialogTurn {
            turn_id: uuid::Uuid::new_v4().to_string(),
            user_text: user_text.to_string(),
            assistant_text: "reply".to_string(),
            created_at: chrono::Utc::now(),
        }
    }

    fn user(text: &str) -> ChatMessage {
        ChatMessage {
            role: MessageRole::User,
            content: text.to_string(),
        }
    }

    fn assistant(text: &str) -> ChatMessage {
        ChatMessage {
            role: MessageRole::Assistant,
            content: text.to_string(),
        }
    }

    #[test]
    fn no_marker_and_no_history_is_simple_chat() {
        let resolution = resolve(&[user("how does auth work here?")], &[]);
        assert_eq!(resolution.phase, ResearchPhase::SimpleChat);
        assert_eq!(resolution.iteration, 0);
    }

    #[test]
    fn marker_on_first_turn_is_phase_first() {
        let resolution = resolve(&[user("[DEEP RESEARCH] map the auth flow")], &[]);
        assert_eq!(resolution.phase, ResearchPhase::First);
        assert_eq!(resolution.iteration, 1);
        assert_eq!(resolution.topic, "map the auth flow");
    }

    #[test]
    fn continuation_within_the_request_restores_original_topic_and_advances_phase() {
        // Mirrors a deep-research request that resends its own transcript:
        // [user "[DEEP RESEARCH] explain the cache", assistant "## Research
        // Plan...", user "continue research"] against a fresh session.
        let messages = vec![
            user("[DEEP RESEARCH] explain the cache"),
            assistant("## Research Plan\n..."),
            user("continue research"),
        ];
        let resolution = resolve(&messages, &[]);
        assert_eq!(resolution.phase, ResearchPhase::Intermediate);
        assert_eq!(resolution.iteration, 2);
        assert_eq!(resolution.topic, "explain the cache");
    }

    #[test]
    fn continuation_via_server_side_history_restores_original_topic() {
        let history = vec![turn("[DEEP RESEARCH] map the auth flow")];
        let resolution = resolve(&[user("continue research")], &history);
        assert_eq!(resolution.phase, ResearchPhase::Intermediate);
        assert_eq!(resolution.iteration, 2);
        assert_eq!(resolution.topic, "map the auth flow");
    }

    #[test]
    fn fifth_iteration_is_final() {
        let history = vec![
            turn("[DEEP RESEARCH] map the auth flow"),
            turn("continue"),
            turn("continue"),
            turn("please continue"),
        ];
        let resolution = resolve(&[user("continue")], &history);
        assert_eq!(resolution.phase, ResearchPhase::Final);
        assert_eq!(resolution.iteration, 5);
        assert_eq!(resolution.topic, "map the auth flow");
    }

    #[test]
    fn question_starting_with_continue_is_not_treated_as_continuation() {
        let history = vec![turn("[DEEP RESEARCH] map the auth flow")];
        let resolution = resolve(
            &[user("continue research implies what about sessions?")],
            &history,
        );
        assert_eq!(resolution.topic, "continue research implies what about sessions?");
    }
}
