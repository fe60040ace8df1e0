mod atomic_write;
mod disk_space;
mod encoding;
mod errors;
mod file_info;
mod file_system;
mod mime_types;
pub mod path_utils;
mod platform_dirs;
mod resolved_path;

pub use atomic_write::{ensure_space_for, persist_into_place, staging_file_in, write_atomically};
pub use disk_space::available_space;
pub use encoding::FileEncoding;
pub use errors::{FsError, Result};
pub use file_info::{FileEntry, FileStat};
pub use file_system::{FileSystem, MAX_READ_FILE_SIZE};
pub use mime_types::{extension_for_mime_type, mime_type_for_path, DEFAULT_MIME_TYPE};
pub use platform_dirs::PlatformDirs;
pub use resolved_path::{ContentReference, ContentResolver, ResolvedPath};
