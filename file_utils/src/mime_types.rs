use std::path::Path;

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Content type guessed from the extension of `path`, or `application/octet-stream`.
pub fn mime_type_for_path(path: impl AsRef<Path>) -> String {
    mime_guess::from_path(path.as_ref())
        .first_raw()
        .unwrap_or(DEFAULT_MIME_TYPE)
        .to_owned()
}

/// The usual extension (without a dot) for a content type, if one is known.
pub fn extension_for_mime_type(mime_type: &str) -> Option<&'static str> {
    let essence = mime_type.split(';').next().unwrap_or(mime_type).trim();
    mime_guess::get_mime_extensions_str(essence).and_then(|exts| exts.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_for_path() {
        assert_eq!(mime_type_for_path("photo.JPG"), "image/jpeg");
        assert_eq!(mime_type_for_path("/a/b/notes.txt"), "text/plain");
        assert_eq!(mime_type_for_path("no_extension"), DEFAULT_MIME_TYPE);
        assert_eq!(mime_type_for_path("archive.unknownext"), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn test_extension_for_mime_type() {
        assert!(extension_for_mime_type("image/png").is_some_and(|e| e == "png"));
        assert!(extension_for_mime_type("application/x-not-a-type").is_none());
    }
}
