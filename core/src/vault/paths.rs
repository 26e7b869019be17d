use std::path::{Component, Path, PathBuf};

use crate::error::VaultError;

/// Reject anything that could make `base/<name>` resolve outside `base`.
pub(crate) fn validate_segment(kind: &'static str, name: &str) -> Result<(), VaultError> {
    let invalid = |reason: &'static str| VaultError::InvalidName {
        kind,
        name: name.to_string(),
        reason,
    };

    if name.trim().is_empty() {
        return Err(invalid("empty"));
    }
    if name == "." || name == ".." {
        return Err(invalid("relative path component"));
    }
    if name.contains('\0') {
        return Err(invalid("contains NUL byte"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(invalid("contains path separator"));
    }
    if Path::new(name).is_absolute() || has_drive_prefix(name) {
        return Err(invalid("absolute path"));
    }
    Ok(())
}

fn has_drive_prefix(name: &str) -> bool {
    let b = name.as_bytes();
    b.len() >= 2 && b[0].is_ascii_alphabetic() && b[1] == b':'
}

/// Absolute, lexically normalized form of `p` (no filesystem access besides cwd).
pub(crate) fn absolutize(p: &Path) -> Result<PathBuf, VaultError> {
    let joined = if p.is_absolute() {
        p.to_path_buf()
    } else {
        let cwd = std::env::current_dir().map_err(|e| VaultError::io(p, e))?;
        cwd.join(p)
    };

    let mut out = PathBuf::new();
    for comp in joined.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    Ok(out)
}

/// `candidate` must be `base` itself or strictly below it.
pub(crate) fn ensure_within(base: &Path, candidate: &Path) -> Result<PathBuf, VaultError> {
    let base = absolutize(base)?;
    let cand = absolutize(candidate)?;
    if cand == base || cand.starts_with(&base) {
        Ok(cand)
    } else {
        Err(VaultError::PathEscape {
            path: cand,
            base,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsafe_names() {
        for bad in ["", "  ", ".", "..", "a/b", "a\\b", "a\0b", "/abs", "C:evil"] {
            let err = validate_segment("profile", bad).unwrap_err();
            assert!(err.is_validation(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn accepts_ordinary_and_system_names() {
        for ok in ["work", "alice@example.com", "_original", "_backup_20251201_100000", "a..b"] {
            validate_segment("profile", ok).unwrap();
        }
    }

    #[test]
    fn ensure_within_catches_escape() {
        let base = Path::new("/tmp/vault");
        assert!(ensure_within(base, Path::new("/tmp/vault/claude/a")).is_ok());
        assert!(ensure_within(base, Path::new("/tmp/vault")).is_ok());
        assert!(ensure_within(base, Path::new("/tmp/vault/../etc")).is_err());
        assert!(ensure_within(base, Path::new("/tmp/vaultx/a")).is_err());
    }
}
