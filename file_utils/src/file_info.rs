use std::fs::Metadata;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::mime_types::mime_type_for_path;

/// A file as seen by the host: its name, content type and location.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub mime_type: String,
    pub path: String,
}

impl FileEntry {
    /// Builds an entry for a local path, guessing the content type from the extension.
    pub fn for_path(path: &Path) -> Self {
        Self {
            name: path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
            mime_type: mime_type_for_path(path),
            path: path.to_string_lossy().into_owned(),
        }
    }
}

/// Result of `stat`. Times are milliseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStat {
    pub size: u64,
    pub ctime: u64,
    pub mtime: u64,
    pub is_file: bool,
    pub is_directory: bool,
}

impl From<&Metadata> for FileStat {
    fn from(metadata: &Metadata) -> Self {
        let mtime = metadata.modified().ok();
        // Creation time is not available on every filesystem.
        let ctime = metadata.created().ok().or(mtime);

        Self {
            size: metadata.len(),
            ctime: ctime.map(millis_since_epoch).unwrap_or_default(),
            mtime: mtime.map(millis_since_epoch).unwrap_or_default(),
            is_file: metadata.is_file(),
            is_directory: metadata.is_dir(),
        }
    }
}

fn millis_since_epoch(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or_default()
}
