use std::path::{Path, PathBuf};

use serde::Serialize;

/// Well-known directories of the current platform. A directory the platform does
/// not have is reported as an empty string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PlatformDirs {
    pub document: String,
    pub cache: String,
    pub download: String,
    pub bundle: String,
    pub pictures: String,
    pub movies: String,
    pub music: String,
    pub dcim: String,
}

fn path_string(p: Option<PathBuf>) -> String {
    p.map(|p| p.to_string_lossy().into_owned()).unwrap_or_default()
}

impl PlatformDirs {
    pub fn resolve() -> Self {
        let pictures = dirs::picture_dir();
        // Camera roll folders live under the pictures directory on desktop systems.
        let dcim = pictures.as_deref().map(|p| p.join("DCIM")).filter(|p| p.is_dir());
        let bundle = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));

        Self {
            document: path_string(dirs::document_dir()),
            cache: path_string(dirs::cache_dir()),
            download: path_string(dirs::download_dir()),
            bundle: path_string(bundle),
            pictures: path_string(pictures),
            movies: path_string(dirs::video_dir()),
            music: path_string(dirs::audio_dir()),
            dcim: path_string(dcim),
        }
    }
}
