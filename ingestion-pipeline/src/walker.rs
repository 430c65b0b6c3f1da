//! C2 File Walker (SPEC_FULL.md §4.2), grounded on
//! `examples/homotopylabs-infiniloom/cli/src/scanner.rs`'s use of
//! `ignore::WalkBuilder` and its extension-based language/kind
//! classification, generalized to the spec's own inclusion/exclusion
//! [`FilterSet`] rules rather than `.gitignore` semantics.

use std::path::Path;

use common::error::EngineError;
use common::model::chunk::{FileKind, FileRecord};
use common::model::repository::FilterSet;
use ignore::WalkBuilder;
use tracing::warn;

use crate::token_counter::{self, TokenFamily};

/// Extensions recognized as source code (§3.1 "a 'code' set").
const CODE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "jsx", "ts", "tsx", "go", "java", "kt", "kts", "scala", "c", "h", "cc",
    "cpp", "hpp", "hxx", "cs", "rb", "php", "swift", "m", "mm", "sh", "bash", "zsh", "pl", "lua",
    "ex", "exs", "erl", "hrl", "clj", "cljs", "hs", "ml", "mli", "fs", "fsx", "sql", "proto",
    "graphql", "vue", "svelte", "dart", "r", "jl", "zig", "nim", "groovy", "gradle",
];

/// Extensions recognized as documentation (§3.1 "a narrower documentation set").
const DOC_EXTENSIONS: &[&str] = &["md", "txt", "rst", "json", "yaml", "yml"];

/// Directories skipped by default regardless of the configured filter set
/// (§4.2 "Defaults cover common lockfiles, caches, virtual environments,
/// build outputs, and hidden VCS dirs").
const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "target",
    "dist",
    "build",
    "out",
    ".venv",
    "venv",
    "__pycache__",
    ".mypy_cache",
    ".pytest_cache",
    ".cache",
    "vendor",
    ".idea",
    ".vscode",
    ".next",
    ".nuxt",
];

/// Basenames skipped by default (common lockfiles).
const DEFAULT_EXCLUDED_FILES: &[&str] = &[
    "Cargo.lock",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "poetry.lock",
    "Pipfile.lock",
    "composer.lock",
    "go.sum",
];

/// Path-component markers identifying test fixtures (§3.1 `is_implementation`).
const TEST_DIR_MARKERS: &[&str] = &["test", "tests", "__tests__", "spec", "specs", "fixtures"];
const TEST_STEM_SUFFIXES: &[&str] = &["_test", ".test", "_spec", ".spec"];

/// Classifies a file's extension into `(kind, language_hint)`, or `None`
/// when the extension is neither recognized code nor documentation.
fn classify_extension(path: &Path) -> Option<(FileKind, Option<String>)> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    if CODE_EXTENSIONS.contains(&ext.as_str()) {
        Some((FileKind::Code, Some(ext)))
    } else if DOC_EXTENSIONS.contains(&ext.as_str()) {
        Some((FileKind::Doc, Some(ext)))
    } else {
        None
    }
}

/// Refines §4.2's "indicates a test fixture" language into the concrete
/// rule from §3.1: any path component case-insensitively matches a test
/// directory marker, or the file stem ends in a recognized test suffix.
fn is_implementation(relative_path: &str) -> bool {
    let path = Path::new(relative_path);
    let in_test_dir = path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| TEST_DIR_MARKERS.iter().any(|m| s.eq_ignore_ascii_case(m)))
            .unwrap_or(false)
    });
    if in_test_dir {
        return false;
    }
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return true;
    };
    let lower = file_name.to_lowercase();
    let stem = lower.strip_suffix(&format!(".{}", path.extension().and_then(|e| e.to_str()).unwrap_or(""))).unwrap_or(&lower);
    !TEST_STEM_SUFFIXES.iter().any(|suffix| stem.ends_with(suffix))
}

/// True when any path component (case-insensitively) equals a default or
/// caller-excluded directory name.
fn has_excluded_dir_component(relative_path: &str, filters: &FilterSet) -> bool {
    Path::new(relative_path).components().any(|c| {
        let Some(s) = c.as_os_str().to_str() else {
            return false;
        };
        DEFAULT_EXCLUDED_DIRS.iter().any(|d| s.eq_ignore_ascii_case(d))
            || filters.excluded_dirs.iter().any(|d| s.eq_ignore_ascii_case(d))
    })
}

fn is_excluded_file(relative_path: &str, filters: &FilterSet) -> bool {
    let Some(basename) = Path::new(relative_path).file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    DEFAULT_EXCLUDED_FILES.iter().any(|f| *f == basename)
        || filters.excluded_files.iter().any(|f| f == basename)
}

fn is_included(relative_path: &str, filters: &FilterSet) -> bool {
    if filters.included_dirs.is_empty() && filters.included_files.is_empty() {
        return true;
    }
    let path = Path::new(relative_path);
    let under_included_dir = filters.included_dirs.iter().any(|d| {
        path.components()
            .any(|c| c.as_os_str().to_str().map(|s| s.eq_ignore_ascii_case(d)).unwrap_or(false))
    });
    if under_included_dir {
        return true;
    }
    filters
        .included_files
        .iter()
        .any(|suffix| relative_path.ends_with(suffix.as_str()))
}

/// Applies §4.2's filter-mode logic: inclusion iff either include list is
/// non-empty, exclusion otherwise.
fn passes_filter(relative_path: &str, filters: &FilterSet) -> bool {
    if filters.is_inclusion_mode() {
        is_included(relative_path, filters)
    } else {
        !has_excluded_dir_component(relative_path, filters) && !is_excluded_file(relative_path, filters)
    }
}

/// Walks `tree_path`, returning File Records ordered code-first then
/// docs, honoring `filters` and skipping any file whose token count
/// exceeds its kind's cap (logged at `warn`, not a failure).
pub fn walk(tree_path: &Path, filters: &FilterSet) -> Result<Vec<FileRecord>, EngineError> {
    let mut code_files = Vec::new();
    let mut doc_files = Vec::new();

    let walker = WalkBuilder::new(tree_path)
        .hidden(true)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .filter_entry(|entry| {
            entry
                .path()
                .file_name()
                .and_then(|n| n.to_str())
                .map(|name| !DEFAULT_EXCLUDED_DIRS.iter().any(|d| name.eq_ignore_ascii_case(d)))
                .unwrap_or(true)
        })
        .build();

    for entry in walker.flatten() {
        let path = entry.path();
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let Some((kind, language_hint)) = classify_extension(path) else {
            continue;
        };
        let Ok(relative) = path.strip_prefix(tree_path) else {
            continue;
        };
        let relative_path = relative.to_string_lossy().replace('\\', "/");

        if !passes_filter(&relative_path, filters) {
            continue;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %relative_path, error = %e, "skipping unreadable file");
                continue;
            }
        };

        let family = TokenFamily::Bpe;
        let token_count = token_counter::count(&content, family);
        if token_counter::is_too_large(token_count, kind.cap_multiplier()) {
            warn!(
                path = %relative_path,
                token_count,
                cap = kind.token_cap(),
                "skipping file exceeding per-kind token cap"
            );
            continue;
        }

        let record = FileRecord {
            is_implementation: is_implementation(&relative_path),
            relative_path,
            kind,
            language_hint,
            content,
            token_count,
        };

        match kind {
            FileKind::Code => code_files.push(record),
            FileKind::Doc => doc_files.push(record),
        }
    }

    code_files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    doc_files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    code_files.extend(doc_files);
    Ok(code_files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_file(root: &Path, relative: &str, content: &str) {
        let full = root.join(relative);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }

    #[test]
    fn classifies_code_and_doc_extensions() {
        assert_eq!(
            classify_extension(Path::new("src/main.rs")).map(|(k, _)| k),
            Some(FileKind::Code)
        );
        assert_eq!(
            classify_extension(Path::new("README.md")).map(|(k, _)| k),
            Some(FileKind::Doc)
        );
        assert_eq!(classify_extension(Path::new("image.png")), None);
    }

    #[test]
    fn is_implementation_excludes_test_dirs_and_suffixes() {
        assert!(!is_implementation("tests/foo.rs"));
        assert!(!is_implementation("src/foo_test.py"));
        assert!(!is_implementation("src/foo.spec.ts"));
        assert!(is_implementation("src/lib.rs"));
    }

    #[test]
    fn exclusion_mode_skips_default_and_custom_excludes() {
        let mut filters = FilterSet::default();
        filters.excluded_dirs.push("generated".to_string());
        assert!(!passes_filter("node_modules/foo/index.js", &filters));
        assert!(!passes_filter("generated/schema.rs", &filters));
        assert!(passes_filter("src/lib.rs", &filters));
    }

    #[test]
    fn inclusion_mode_only_accepts_listed_paths() {
        let mut filters = FilterSet::default();
        filters.included_dirs.push("src".to_string());
        assert!(passes_filter("src/lib.rs", &filters));
        assert!(!passes_filter("docs/guide.md", &filters));
    }

    #[test]
    fn walk_orders_code_before_docs_and_applies_excludes() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "src/lib.rs", "fn main() {}");
        write_file(dir.path(), "README.md", "# hello");
        write_file(dir.path(), "node_modules/pkg/index.js", "console.log(1)");

        let records = walk(dir.path(), &FilterSet::default()).unwrap();
        let paths: Vec<_> = records.iter().map(|r| r.relative_path.clone()).collect();
        assert!(paths.contains(&"src/lib.rs".to_string()));
        assert!(paths.contains(&"README.md".to_string()));
        assert!(!paths.iter().any(|p| p.contains("node_modules")));

        let lib_index = paths.iter().position(|p| p == "src/lib.rs").unwrap();
        let readme_index = paths.iter().position(|p| p == "README.md").unwrap();
        assert!(lib_index < readme_index);
    }
}
