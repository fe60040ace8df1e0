use std::path::{Path, PathBuf};

/// Turns a path given by a user (environment variable, CLI flag) into an absolute path.
///
/// A leading `~` is expanded to the home directory; relative paths are resolved against
/// the current working directory.
pub fn normalized_path_from_user_string(path: impl AsRef<str>) -> PathBuf {
    let path = path.as_ref().trim();

    let expanded = match (path.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with(['/', '\\']) => {
            home.join(rest.trim_start_matches(['/', '\\']))
        },
        _ => PathBuf::from(path),
    };

    std::path::absolute(&expanded).unwrap_or(expanded)
}

/// Returns true if `path` names a directory, either because it exists as one or
/// because it was written with a trailing separator.
pub fn looks_like_directory(raw: &str, path: &Path) -> bool {
    raw.ends_with('/') || raw.ends_with('\\') || path.is_dir()
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_tilde_expansion() {
        let Some(home) = dirs::home_dir() else { return };
        assert_eq!(normalized_path_from_user_string("~/logs"), home.join("logs"));
        assert_eq!(normalized_path_from_user_string("~"), home);
    }

    #[test]
    fn test_tilde_user_is_not_expanded() {
        let p = normalized_path_from_user_string("~other/logs");
        assert!(p.ends_with("~other/logs"));
    }

    #[test]
    fn test_relative_becomes_absolute() {
        let p = normalized_path_from_user_string("some/relative/dir");
        assert!(p.is_absolute());
        assert!(p.ends_with("some/relative/dir"));
    }

    #[test]
    fn test_looks_like_directory() {
        let dir = tempdir().unwrap();
        assert!(looks_like_directory("logs/", Path::new("logs/")));
        assert!(looks_like_directory("x", dir.path()));
        assert!(!looks_like_directory("out.log", &dir.path().join("out.log")));
    }
}
