//! Session file path derivation.
//!
//! Grounded on `original_source/src/vibecore/session/path_utils.py`:
//! canonicalize the project path into a flat directory name by swapping
//! path separators for hyphens, then lay out
//! `{base_dir}/projects/{canonicalized}/{session_id}.jsonl`.

use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathError {
    #[error("invalid session id: {0}")]
    InvalidSessionId(String),
}

/// Flatten an absolute path into a directory-safe name, mirroring the
/// Python prototype's `canonicalize_path` (including its Windows-path
/// normalization, kept even though this engine targets Unix, since the
/// on-disk layout should stay portable).
pub fn canonicalize_path(path: &Path) -> String {
    let absolute = path.to_string_lossy().replace('\\', "-").replace(':', "");
    let canonical = absolute.replace('/', "-");
    let trimmed = canonical.trim_matches('-');
    if trimmed.is_empty() {
        "root".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Build the on-disk path for a session file, rejecting session ids that
/// could escape `base_dir` via a path separator or `..`.
pub fn session_file_path(
    session_id: &str,
    project_path: &Path,
    base_dir: &Path,
) -> Result<PathBuf, PathError> {
    if session_id.contains('/') || session_id.contains('\\') || session_id.contains("..") {
        return Err(PathError::InvalidSessionId(session_id.to_string()));
    }

    let canonicalized_project = canonicalize_path(project_path);
    Ok(base_dir
        .join("projects")
        .join(canonicalized_project)
        .join(format!("{session_id}.jsonl")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_absolute_unix_path() {
        let canonical = canonicalize_path(Path::new("/Users/me/workspace/vibecore"));
        assert_eq!(canonical, "Users-me-workspace-vibecore");
    }

    #[test]
    fn rejects_session_id_with_path_separator() {
        let err = session_file_path("../evil", Path::new("/tmp/proj"), Path::new("/tmp/base"));
        assert!(err.is_err());
    }

    #[test]
    fn builds_expected_layout() {
        let path = session_file_path("chat-1", Path::new("/tmp/proj"), Path::new("/tmp/base")).unwrap();
        assert_eq!(path, Path::new("/tmp/base/projects/tmp-proj/chat-1.jsonl"));
    }
}
