use std::path::Path;

/// The directory part of `path`, or an empty string when there is none.
pub fn dirname(path: &str) -> String {
    Path::new(path)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// The final component of `path`, or an empty string when there is none.
pub fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// The extension of `path` without the leading dot, or an empty string.
pub fn extname(path: &str) -> String {
    Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirname() {
        assert_eq!(dirname("/a/b/c.txt"), "/a/b");
        assert_eq!(dirname("c.txt"), "");
        assert_eq!(dirname("/"), "");
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("/a/b/c.txt"), "c.txt");
        assert_eq!(basename("/a/b/"), "b");
        assert_eq!(basename("/"), "");
    }

    #[test]
    fn test_extname() {
        assert_eq!(extname("/a/b/c.tar.gz"), "gz");
        assert_eq!(extname("/a/b/.hidden"), "");
        assert_eq!(extname("/a/b/noext"), "");
    }
}
