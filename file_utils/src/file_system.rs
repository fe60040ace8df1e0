use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

use error_printer::OptionPrinter;
use tracing::{debug, info};
use utils::ByteSize;
use walkdir::WalkDir;

use crate::atomic_write::{ensure_space_for, write_atomically};
use crate::errors::{FsError, IoResultExt, Result};
use crate::mime_types::{extension_for_mime_type, DEFAULT_MIME_TYPE};
use crate::path_utils;
use crate::resolved_path::{ContentReference, ContentResolver, ResolvedPath};
use crate::{FileEncoding, FileEntry, FileStat};

utils::configurable_constants! {
    /// Largest file `read_file` will load into memory.
    ///
    /// Use the environment variable `FS_BRIDGE_MAX_READ_FILE_SIZE` to set this value, e.g. "250mb".
    ref MAX_READ_FILE_SIZE: ByteSize = ByteSize::new(100 * 1024 * 1024);
}

/// Filesystem operations over local paths and content references.
///
/// Every path argument is a host string resolved with [ResolvedPath::parse].
/// Content references need a [ContentResolver]; without one they are `Unavailable`.
#[derive(Clone)]
pub struct FileSystem {
    max_read_size: ByteSize,
    content_resolver: Option<Arc<dyn ContentResolver>>,
}

impl Default for FileSystem {
    fn default() -> Self {
        Self {
            max_read_size: *MAX_READ_FILE_SIZE,
            content_resolver: None,
        }
    }
}

impl FileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_read_size(mut self, max_read_size: ByteSize) -> Self {
        self.max_read_size = max_read_size;
        self
    }

    pub fn with_content_resolver(mut self, resolver: Arc<dyn ContentResolver>) -> Self {
        self.content_resolver = Some(resolver);
        self
    }

    fn resolver(&self, reference: &ContentReference) -> Result<&dyn ContentResolver> {
        self.content_resolver
            .as_deref()
            .debug_none("no content resolver installed")
            .ok_or_else(|| FsError::Unavailable(format!("no content resolver available for {reference}")))
    }

    pub fn exists(&self, path: &str) -> bool {
        match ResolvedPath::parse(path) {
            Ok(ResolvedPath::Local(p)) => p.exists(),
            Ok(ResolvedPath::Content(r)) => self.resolver(&r).map(|res| res.exists(&r)).unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Reads a whole file and returns it in the requested encoding.
    pub fn read_file(&self, path: &str, encoding: FileEncoding) -> Result<String> {
        let bytes = self.read_bytes(path)?;
        encoding.bytes_to_string(bytes)
    }

    /// Reads a whole file, refusing files larger than the configured limit.
    pub fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let limit = self.max_read_size;

        match ResolvedPath::parse(path)? {
            ResolvedPath::Local(p) => {
                let metadata = fs::metadata(&p).at_path(path)?;
                if !metadata.is_file() {
                    return Err(FsError::Io {
                        path: path.to_owned(),
                        source: io::Error::new(io::ErrorKind::InvalidInput, "path is not a file"),
                    });
                }
                if metadata.len() > limit.as_u64() {
                    return Err(FsError::TooLarge {
                        path: path.to_owned(),
                        size: metadata.len(),
                        limit,
                    });
                }
                fs::read(&p).at_path(path)
            },
            ResolvedPath::Content(r) => {
                let reader = self.resolver(&r)?.open_read(&r).at_path(&r)?;
                let mut bytes = Vec::new();
                reader.take(limit.as_u64() + 1).read_to_end(&mut bytes).at_path(&r)?;
                if bytes.len() as u64 > limit.as_u64() {
                    return Err(FsError::TooLarge {
                        path: path.to_owned(),
                        size: bytes.len() as u64,
                        limit,
                    });
                }
                Ok(bytes)
            },
        }
    }

    /// Writes `data`, given in `encoding`, replacing the file. Missing parent
    /// directories are created.
    pub fn write_file(&self, path: &str, data: &str, encoding: FileEncoding) -> Result<()> {
        let bytes = encoding.string_to_bytes(data)?;

        match ResolvedPath::parse(path)? {
            ResolvedPath::Local(p) => {
                write_atomically(&p, &bytes)?;
                debug!("wrote {} bytes to {p:?}", bytes.len());
                Ok(())
            },
            ResolvedPath::Content(r) => {
                let mut writer = self.resolver(&r)?.open_write(&r).at_path(&r)?;
                writer.write_all(&bytes).at_path(&r)?;
                writer.flush().at_path(&r)
            },
        }
    }

    /// Copies a file, or a whole directory tree, to `dest`.
    pub fn copy(&self, src: &str, dest: &str) -> Result<()> {
        let src_resolved = ResolvedPath::parse(src)?;
        let dest_resolved = ResolvedPath::parse(dest)?;

        if let (ResolvedPath::Local(s), ResolvedPath::Local(d)) = (&src_resolved, &dest_resolved) {
            if s.is_dir() {
                return copy_dir_recursive(s, d);
            }
        }
        self.copy_resolved(&src_resolved, &dest_resolved)
    }

    /// Copies a single file's content to `dest`.
    pub fn copy_file(&self, src: &str, dest: &str) -> Result<()> {
        self.copy_resolved(&ResolvedPath::parse(src)?, &ResolvedPath::parse(dest)?)
    }

    fn copy_resolved(&self, src: &ResolvedPath, dest: &ResolvedPath) -> Result<()> {
        match (src, dest) {
            (ResolvedPath::Local(s), ResolvedPath::Local(d)) => copy_local_file(s, d),
            _ => {
                let mut reader: Box<dyn Read + Send> = match src {
                    ResolvedPath::Local(s) => Box::new(fs::File::open(s).at_path(s.display())?),
                    ResolvedPath::Content(r) => self.resolver(r)?.open_read(r).at_path(r)?,
                };
                let mut writer: Box<dyn Write + Send> = match dest {
                    ResolvedPath::Local(d) => {
                        if let Some(parent) = d.parent().filter(|p| !p.as_os_str().is_empty()) {
                            fs::create_dir_all(parent).at_path(parent.display())?;
                        }
                        Box::new(fs::File::create(d).at_path(d.display())?)
                    },
                    ResolvedPath::Content(r) => self.resolver(r)?.open_write(r).at_path(r)?,
                };
                io::copy(&mut reader, &mut writer).at_path(dest)?;
                writer.flush().at_path(dest)
            },
        }
    }

    /// Deletes a file or a directory tree. Returns false if nothing was there.
    pub fn unlink(&self, path: &str) -> Result<bool> {
        match ResolvedPath::parse(path)? {
            ResolvedPath::Local(p) => {
                let metadata = match fs::symlink_metadata(&p) {
                    Ok(m) => m,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
                    Err(e) => return Err(FsError::io(path, e)),
                };
                if metadata.is_dir() {
                    fs::remove_dir_all(&p).at_path(path)?;
                } else {
                    fs::remove_file(&p).at_path(path)?;
                }
                info!("deleted {p:?}");
                Ok(true)
            },
            ResolvedPath::Content(r) => self.resolver(&r)?.delete(&r).at_path(&r),
        }
    }

    /// Creates a directory and all missing parents. Succeeds if it already exists.
    pub fn mkdir(&self, path: &str) -> Result<bool> {
        let resolved = ResolvedPath::parse(path)?;
        let p = resolved.require_local("mkdir")?;
        fs::create_dir_all(p).at_path(path)?;
        Ok(true)
    }

    pub fn rename(&self, old_path: &str, new_path: &str) -> Result<()> {
        let old_resolved = ResolvedPath::parse(old_path)?;
        let new_resolved = ResolvedPath::parse(new_path)?;
        let old = old_resolved.require_local("rename")?;
        let new = new_resolved.require_local("rename")?;

        if !old.exists() {
            return Err(FsError::NotFound(old_path.to_owned()));
        }
        fs::rename(old, new).at_path(format!("{old_path} -> {new_path}"))
    }

    pub fn stat(&self, path: &str) -> Result<FileStat> {
        match ResolvedPath::parse(path)? {
            ResolvedPath::Local(p) => {
                let metadata = fs::metadata(&p).at_path(path)?;
                Ok(FileStat::from(&metadata))
            },
            ResolvedPath::Content(r) => self.resolver(&r)?.stat(&r).at_path(&r),
        }
    }

    /// Lists a directory, sorted by name.
    pub fn readdir(&self, path: &str) -> Result<Vec<FileEntry>> {
        let resolved = ResolvedPath::parse(path)?;
        let dir = resolved.require_local("readdir")?;

        let metadata = fs::metadata(dir).at_path(path)?;
        if !metadata.is_dir() {
            return Err(FsError::Io {
                path: path.to_owned(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "path is not a directory"),
            });
        }

        let dir = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
        let mut entries = Vec::new();
        for entry in fs::read_dir(&dir).at_path(path)? {
            let entry = entry.at_path(path)?;
            entries.push(FileEntry::for_path(&entry.path()));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Describes the file at `path` the way the upload and download APIs expect.
    pub fn file_entry(&self, path: &str) -> Result<FileEntry> {
        match ResolvedPath::parse(path)? {
            ResolvedPath::Local(p) => Ok(FileEntry::for_path(&p)),
            ResolvedPath::Content(r) => {
                let resolver = self.resolver(&r)?;
                Ok(FileEntry {
                    name: resolver.display_name(&r).unwrap_or_else(|| r.last_segment().to_owned()),
                    mime_type: resolver.mime_type(&r).unwrap_or_else(|| DEFAULT_MIME_TYPE.to_owned()),
                    path: path.to_owned(),
                })
            },
        }
    }

    pub fn dirname(&self, path: &str) -> Result<String> {
        match ResolvedPath::parse(path)? {
            ResolvedPath::Local(_) => Ok(path_utils::dirname(path)),
            ResolvedPath::Content(r) => Err(FsError::Unavailable(format!("content reference {r} has no parent directory"))),
        }
    }

    pub fn basename(&self, path: &str) -> Result<String> {
        match ResolvedPath::parse(path)? {
            ResolvedPath::Local(p) => Ok(path_utils::basename(&p.to_string_lossy())),
            ResolvedPath::Content(r) => Ok(self
                .file_entry(path)
                .map(|entry| entry.name)
                .unwrap_or_else(|_| r.last_segment().to_owned())),
        }
    }

    pub fn extname(&self, path: &str) -> Result<String> {
        match ResolvedPath::parse(path)? {
            ResolvedPath::Local(p) => Ok(path_utils::extname(&p.to_string_lossy())),
            ResolvedPath::Content(r) => {
                let mime_type = self
                    .resolver(&r)?
                    .mime_type(&r)
                    .ok_or_else(|| FsError::Unavailable(format!("no content type known for {r}")))?;
                extension_for_mime_type(&mime_type)
                    .map(str::to_owned)
                    .ok_or_else(|| FsError::Unavailable(format!("no extension known for content type {mime_type}")))
            },
        }
    }
}

fn copy_local_file(src: &Path, dest: &Path) -> Result<()> {
    let len = fs::metadata(src).at_path(src.display())?.len();
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).at_path(parent.display())?;
    }
    ensure_space_for(dest, len)?;
    fs::copy(src, dest).at_path(format!("{} -> {}", src.display(), dest.display()))?;
    Ok(())
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
            match e.into_io_error() {
                Some(io_err) => FsError::io(path, io_err),
                None => FsError::InvalidPath(format!("filesystem loop at {path}")),
            }
        })?;

        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| FsError::InvalidPath(entry.path().display().to_string()))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).at_path(target.display())?;
        } else {
            copy_local_file(entry.path(), &target)?;
        }
    }
    Ok(())
}
