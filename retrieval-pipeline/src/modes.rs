//! §4.10 system-prompt selection: one system prompt per [`ResearchPhase`],
//! parameterized by the repositories in scope and the requested response
//! language. Grounded on the teacher's `pipeline::strategies` module,
//! which maps a `RetrievalStrategy` to a fixed set of per-strategy
//! retrieval parameters — generalized here to map a research phase to a
//! fixed system-prompt template instead.

use common::model::repository::RepositoryDescriptor;

use crate::deep_research::ResearchPhase;

/// Labels the repositories a query is scoped to for inclusion in the
/// system prompt, so the model knows what it's actually looking at.
fn repo_labels(repos: &[RepositoryDescriptor]) -> String {
    if repos.is_empty() {
        return "(no repository specified)".to_string();
    }
    repos
        .iter()
        .map(|r| r.repo_id())
        .collect::<Vec<_>>()
        .join(", ")
}

fn language_clause(language: Option<&str>) -> String {
    match language {
        Some(lang) => format!("Respond in {lang}."),
        None => String::new(),
    }
}

/// Builds the system prompt for this turn's research phase (§4.10).
pub fn system_prompt(phase: ResearchPhase, repos: &[RepositoryDescriptor], language: Option<&str>) -> String {
    let repos_clause = repo_labels(repos);
    let language_clause = language_clause(language);

    let body = match phase {
        ResearchPhase::SimpleChat => format!(
            "You are a code assistant answering questions about the following \
             repositories: {repos_clause}. Answer directly and concisely, citing \
             file paths from the retrieved context when relevant. If the \
             retrieved context doesn't contain the answer, say so plainly \
             instead of guessing."
        ),
        ResearchPhase::First => format!(
            "You are conducting a deep research pass over the following \
             repositories: {repos_clause}. This is the first iteration: lay \
             out an initial investigation plan, pursue the most promising \
             leads in the retrieved context, and end with a short list of \
             open questions to continue digging into on the next turn."
        ),
        ResearchPhase::Intermediate => format!(
            "You are continuing a deep research pass over the following \
             repositories: {repos_clause}. Build on what was already found in \
             prior turns, pursue the open questions from the last iteration, \
             and end with an updated list of open questions or state that the \
             investigation is conclusive."
        ),
        ResearchPhase::Final => format!(
            "You are concluding a deep research pass over the following \
             repositories: {repos_clause}. This is the final iteration: \
             synthesize everything found across prior turns into one \
             conclusive answer. Do not propose another round of research."
        ),
    };

    if language_clause.is_empty() {
        body
    } else {
        format!("{body} {language_clause}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::model::repository::{FilterSet, HostKind};

    fn repo(locator: &str) -> RepositoryDescriptor {
        RepositoryDescriptor {
            host_kind: HostKind::Github,
            locator: locator.to_string(),
            credential: None,
            filters: FilterSet::default(),
        }
    }

    #[test]
    fn final_phase_instructs_against_another_round() {
        let prompt = system_prompt(ResearchPhase::Final, &[repo("https://github.com/acme/widgets")], None);
        assert!(prompt.contains("final iteration"));
        assert!(prompt.contains("acme_widgets"));
    }

    #[test]
    fn language_clause_is_appended_when_requested() {
        let prompt = system_prompt(ResearchPhase::SimpleChat, &[], Some("Japanese"));
        assert!(prompt.ends_with("Respond in Japanese."));
    }

    #[test]
    fn no_repos_uses_placeholder_label() {
        let prompt = system_prompt(ResearchPhase::SimpleChat, &[], None);
        assert!(prompt.contains("no repository specified"));
    }
}
