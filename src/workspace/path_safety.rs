//! Path validation and symlink-escape detection.
//!
//! Keeps context-document reads inside their candidate root. Relative
//! paths are normalized, `..` traversal past the root and absolute paths
//! are rejected, and symlinks resolving outside the root are refused.

use std::path::{Component, Path, PathBuf};

use crate::{AppError, Result};

/// Resolve `relative` against `root`, refusing anything outside `root`.
///
/// # Errors
///
/// Returns `AppError::PathViolation` if:
/// - `root` cannot be canonicalized (for example it does not exist).
/// - `relative` is absolute or carries a drive prefix.
/// - `..` segments climb above `root`.
/// - The resolved path is a symlink whose target escapes `root`.
pub fn resolve_within(root: &Path, relative: impl AsRef<Path>) -> Result<PathBuf> {
    let root = root
        .canonicalize()
        .map_err(|err| AppError::PathViolation(format!("root invalid: {err}")))?;

    let mut normalized = PathBuf::new();
    for component in relative.as_ref().components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(AppError::PathViolation(
                        "path attempts to escape its root".into(),
                    ));
                }
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => {
                return Err(AppError::PathViolation(
                    "absolute paths are not accepted".into(),
                ));
            }
            Component::Normal(part) => normalized.push(part),
        }
    }

    let absolute = root.join(normalized);

    if absolute.exists() {
        let canonical = absolute
            .canonicalize()
            .map_err(|err| AppError::PathViolation(format!("cannot resolve path: {err}")))?;

        if !canonical.starts_with(&root) {
            return Err(AppError::PathViolation(
                "symlink target escapes its root".into(),
            ));
        }

        Ok(canonical)
    } else {
        Ok(absolute)
    }
}
