use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::chunk::Chunk;

/// The source-control host family a [`RepositoryDescriptor`] points at;
/// determines credentialed clone-URL formatting (SPEC_FULL.md §4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    Github,
    Gitlab,
    Bitbucket,
    Local,
}

/// A file-filter ruleset: inclusion mode iff either include list is
/// non-empty, exclusion mode otherwise (§4.2).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FilterSet {
    pub included_dirs: Vec<String>,
    pub included_files: Vec<String>,
    pub excluded_dirs: Vec<String>,
    pub excluded_files: Vec<String>,
}

impl FilterSet {
    pub fn is_inclusion_mode(&self) -> bool {
        !self.included_dirs.is_empty() || !self.included_files.is_empty()
    }
}

/// Identifies and locates one repository to ingest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    pub host_kind: HostKind,
    /// For remote hosts: the repo URL. For local: a filesystem path.
    pub locator: String,
    pub credential: Option<String>,
    pub filters: FilterSet,
}

impl RepositoryDescriptor {
    /// Derives the stable `repo_id` used as the persistence key:
    /// `{owner}_{repo}` for remote hosts, the canonicalized basename for
    /// local descriptors (§3.1).
    pub fn repo_id(&self) -> String {
        match self.host_kind {
            HostKind::Local => std::path::Path::new(&self.locator)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "local".to_string()),
            _ => derive_remote_repo_id(&self.locator),
        }
    }
}

/// Parses `https://{host}/{owner}/{repo}(.git)?` into `{owner}_{repo}`.
/// Falls back to a sanitized full locator when the shape doesn't match.
fn derive_remote_repo_id(locator: &str) -> String {
    let trimmed = locator.trim_end_matches('/').trim_end_matches(".git");
    let path_part = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed);
    let mut segments = path_part.splitn(2, '/');
    let _host = segments.next();
    if let Some(owner_repo) = segments.next() {
        owner_repo.replace('/', "_")
    } else {
        path_part.replace(['/', ':'], "_")
    }
}

/// The persisted, reconciled result of ingesting one repository (C6/C8).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepositoryIndex {
    pub repo_id: String,
    pub chunks: Vec<Chunk>,
    pub vector_dimension: usize,
    pub build_timestamp: DateTime<Utc>,
}

impl RepositoryIndex {
    pub fn is_usable(&self) -> bool {
        !self.chunks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_repo_id_from_github_url() {
        let d = RepositoryDescriptor {
            host_kind: HostKind::Github,
            locator: "https://github.com/rust-lang/rust.git".to_string(),
            credential: None,
            filters: FilterSet::default(),
        };
        assert_eq!(d.repo_id(), "rust-lang_rust");
    }

    #[test]
    fn derives_repo_id_from_local_path() {
        let d = RepositoryDescriptor {
            host_kind: HostKind::Local,
            locator: "/srv/checkouts/my-project".to_string(),
            credential: None,
            filters: FilterSet::default(),
        };
        assert_eq!(d.repo_id(), "my-project");
    }
}
