use std::fmt::Display;
use std::io;

use thiserror::Error;
use utils::ByteSize;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum FsError {
    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("No such file or directory: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("File {path} is too large ({size} bytes); the read limit is {limit}")]
    TooLarge { path: String, size: u64, limit: ByteSize },

    #[error("Insufficient disk space writing {path}: {required} bytes required, {available} bytes available")]
    InsufficientSpace { path: String, required: u64, available: u64 },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, FsError>;

impl FsError {
    /// Attaches the path an I/O error happened on, mapping the common kinds to their
    /// own variants so callers never see a bare OS error.
    pub fn io(path: impl Display, source: io::Error) -> Self {
        let path = path.to_string();
        match source.kind() {
            io::ErrorKind::NotFound => FsError::NotFound(path),
            io::ErrorKind::PermissionDenied => FsError::PermissionDenied(path),
            io::ErrorKind::StorageFull => FsError::InsufficientSpace {
                path,
                required: 0,
                available: 0,
            },
            _ => FsError::Io { path, source },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound(_))
    }
}

impl PartialEq for FsError {
    fn eq(&self, other: &FsError) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Extension to attach a path to `io::Result` values.
pub(crate) trait IoResultExt<T> {
    fn at_path(self, path: impl Display) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at_path(self, path: impl Display) -> Result<T> {
        self.map_err(|e| FsError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_kinds_are_mapped() {
        let e = FsError::io("/a", io::Error::from(io::ErrorKind::NotFound));
        assert!(e.is_not_found());
        assert_eq!(e.to_string(), "No such file or directory: /a");

        let e = FsError::io("/b", io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(e, FsError::PermissionDenied(String::new()));

        let e = FsError::io("/c", io::Error::other("weird"));
        assert!(matches!(e, FsError::Io { ref path, .. } if path == "/c"));
    }

    #[test]
    fn test_messages_carry_limits() {
        let e = FsError::TooLarge {
            path: "/big".into(),
            size: 200 * 1024 * 1024,
            limit: ByteSize::new(100 * 1024 * 1024),
        };
        assert!(e.to_string().contains("100mb"));
    }
}
