use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::errors::{FsError, Result};

/// How string data handed to or returned from the file APIs maps to bytes on disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FileEncoding {
    #[default]
    Utf8,
    Ascii,
    /// The string is the base64 form of the raw file bytes.
    Base64,
}

impl FileEncoding {
    /// Converts file content into the string form for this encoding.
    pub fn bytes_to_string(&self, bytes: Vec<u8>) -> Result<String> {
        match self {
            FileEncoding::Utf8 => {
                String::from_utf8(bytes).map_err(|e| FsError::Encoding(format!("file content is not valid UTF-8: {e}")))
            },
            FileEncoding::Ascii => {
                if let Some(pos) = bytes.iter().position(|b| !b.is_ascii()) {
                    return Err(FsError::Encoding(format!("non-ASCII byte 0x{:02x} at offset {pos}", bytes[pos])));
                }
                // All bytes are ASCII, which is always valid UTF-8.
                String::from_utf8(bytes).map_err(|e| FsError::Encoding(e.to_string()))
            },
            FileEncoding::Base64 => Ok(STANDARD.encode(bytes)),
        }
    }

    /// Converts a string in this encoding into the bytes to store.
    pub fn string_to_bytes(&self, data: &str) -> Result<Vec<u8>> {
        match self {
            FileEncoding::Utf8 => Ok(data.as_bytes().to_vec()),
            FileEncoding::Ascii => {
                if let Some((pos, c)) = data.char_indices().find(|(_, c)| !c.is_ascii()) {
                    return Err(FsError::Encoding(format!("character {c:?} at offset {pos} is not ASCII")));
                }
                Ok(data.as_bytes().to_vec())
            },
            FileEncoding::Base64 => {
                // Line-wrapped base64 (as produced by many platform encoders) is accepted.
                let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
                STANDARD
                    .decode(compact.as_bytes())
                    .map_err(|e| FsError::Encoding(format!("invalid base64 data: {e}")))
            },
        }
    }
}

impl FromStr for FileEncoding {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(FileEncoding::Utf8),
            "ascii" | "us-ascii" => Ok(FileEncoding::Ascii),
            "base64" => Ok(FileEncoding::Base64),
            other => Err(FsError::Encoding(format!("unsupported encoding {other:?}"))),
        }
    }
}

impl fmt::Display for FileEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileEncoding::Utf8 => "utf8",
            FileEncoding::Ascii => "ascii",
            FileEncoding::Base64 => "base64",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("UTF-8".parse::<FileEncoding>().unwrap(), FileEncoding::Utf8);
        assert_eq!("ascii".parse::<FileEncoding>().unwrap(), FileEncoding::Ascii);
        assert_eq!(" base64 ".parse::<FileEncoding>().unwrap(), FileEncoding::Base64);
        assert!("latin1".parse::<FileEncoding>().is_err());
        assert_eq!(FileEncoding::Base64.to_string(), "base64");
    }

    #[test]
    fn test_utf8_rejects_invalid_bytes() {
        let err = FileEncoding::Utf8.bytes_to_string(vec![0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, FsError::Encoding(_)));
        assert_eq!(FileEncoding::Utf8.bytes_to_string("héllo".as_bytes().to_vec()).unwrap(), "héllo");
    }

    #[test]
    fn test_ascii_both_directions() {
        assert!(FileEncoding::Ascii.bytes_to_string("héllo".as_bytes().to_vec()).is_err());
        assert!(FileEncoding::Ascii.string_to_bytes("héllo").is_err());
        assert_eq!(FileEncoding::Ascii.string_to_bytes("hello").unwrap(), b"hello");
    }

    #[test]
    fn test_base64_handles_binary_and_line_wraps() {
        let bytes: Vec<u8> = (0..=255).collect();
        let encoded = FileEncoding::Base64.bytes_to_string(bytes.clone()).unwrap();
        assert!(!encoded.contains('\n'));

        let wrapped: String = encoded
            .as_bytes()
            .chunks(76)
            .map(|c| std::str::from_utf8(c).unwrap())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(FileEncoding::Base64.string_to_bytes(&wrapped).unwrap(), bytes);
    }

    #[test]
    fn test_base64_rejects_garbage() {
        let err = FileEncoding::Base64.string_to_bytes("not*base64!").unwrap_err();
        assert!(matches!(err, FsError::Encoding(_)));
    }
}
