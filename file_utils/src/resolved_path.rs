use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use url::Url;

use crate::errors::{FsError, Result};
use crate::FileStat;

const CONTENT_SCHEME: &str = "content://";
const FILE_SCHEME: &str = "file://";

/// An opaque reference to content owned by a platform provider, such as a
/// `content://` URI handed out by a document picker. It has no filesystem path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContentReference(String);

impl ContentReference {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last non-empty segment of the reference, used when no provider can name it.
    pub fn last_segment(&self) -> &str {
        self.0.rsplit('/').find(|s| !s.is_empty()).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A path-like input, resolved once at the API boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedPath {
    /// A plain path or a `file://` URI.
    Local(PathBuf),
    /// A `content://` reference served by a [ContentResolver].
    Content(ContentReference),
}

impl ResolvedPath {
    pub fn parse(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Err(FsError::InvalidPath("empty path".to_owned()));
        }

        if input.starts_with(CONTENT_SCHEME) {
            return Ok(ResolvedPath::Content(ContentReference(input.to_owned())));
        }

        if input.starts_with(FILE_SCHEME) {
            let url = Url::parse(input).map_err(|e| FsError::InvalidPath(format!("{input}: {e}")))?;
            let path = url
                .to_file_path()
                .map_err(|_| FsError::InvalidPath(format!("{input} does not name a local file")))?;
            return Ok(ResolvedPath::Local(path));
        }

        Ok(ResolvedPath::Local(PathBuf::from(input)))
    }

    /// Returns the local path, or `Unavailable` naming the operation that a content
    /// reference cannot support.
    pub fn require_local(&self, operation: &str) -> Result<&Path> {
        match self {
            ResolvedPath::Local(p) => Ok(p),
            ResolvedPath::Content(r) => {
                Err(FsError::Unavailable(format!("{operation} is not supported for content reference {r}")))
            },
        }
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedPath::Local(p) => write!(f, "{}", p.display()),
            ResolvedPath::Content(r) => write!(f, "{r}"),
        }
    }
}

/// Access to content references, provided by the host platform.
pub trait ContentResolver: Send + Sync {
    fn exists(&self, reference: &ContentReference) -> bool;

    fn open_read(&self, reference: &ContentReference) -> std::io::Result<Box<dyn Read + Send>>;

    fn open_write(&self, reference: &ContentReference) -> std::io::Result<Box<dyn Write + Send>>;

    /// Returns false if there was nothing to delete.
    fn delete(&self, reference: &ContentReference) -> std::io::Result<bool>;

    fn stat(&self, reference: &ContentReference) -> std::io::Result<FileStat>;

    fn display_name(&self, reference: &ContentReference) -> Option<String>;

    fn mime_type(&self, reference: &ContentReference) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_paths_are_local() {
        assert_eq!(ResolvedPath::parse("/tmp/a.txt").unwrap(), ResolvedPath::Local(PathBuf::from("/tmp/a.txt")));
        assert_eq!(ResolvedPath::parse("relative/b").unwrap().require_local("read").unwrap(), Path::new("relative/b"));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_uri_is_local() {
        let p = ResolvedPath::parse("file:///tmp/some%20dir/a.txt").unwrap();
        assert_eq!(p, ResolvedPath::Local(PathBuf::from("/tmp/some dir/a.txt")));
    }

    #[test]
    fn test_content_reference() {
        let p = ResolvedPath::parse("content://media/external/images/42").unwrap();
        let ResolvedPath::Content(ref r) = p else {
            panic!("expected content reference");
        };
        assert_eq!(r.last_segment(), "42");

        let err = p.require_local("mkdir").unwrap_err();
        assert!(matches!(err, FsError::Unavailable(ref m) if m.contains("mkdir")));
    }

    #[test]
    fn test_empty_is_invalid() {
        assert!(matches!(ResolvedPath::parse("  "), Err(FsError::InvalidPath(_))));
    }
}
