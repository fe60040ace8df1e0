use std::fs;
use std::io::{self, Write};
use std::path::Path;

use error_printer::ErrorPrinter;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::disk_space::available_space;
use crate::errors::{FsError, IoResultExt, Result};

const STAGING_PREFIX: &str = ".staging-";

/// Creates a staging file in `dir`, creating `dir` if needed. The file is removed
/// when dropped unless it is persisted.
pub fn staging_file_in(dir: &Path) -> Result<NamedTempFile> {
    fs::create_dir_all(dir).at_path(dir.display())?;
    tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempfile_in(dir)
        .at_path(dir.display())
}

/// Fails with `InsufficientSpace` if the filesystem that would hold `dest` cannot
/// take `required` more bytes.
pub fn ensure_space_for(dest: &Path, required: u64) -> Result<()> {
    if let Some(available) = available_space(dest) {
        if required > available {
            return Err(FsError::InsufficientSpace {
                path: dest.display().to_string(),
                required,
                available,
            });
        }
    }
    Ok(())
}

/// Gives a staging file the permissions `dest` should end up with: those of the file
/// it replaces, or the umask default for a new file. Staging files start owner-only.
fn match_destination_permissions(staged: &NamedTempFile, dest: &Path) -> Result<()> {
    let permissions = match fs::metadata(dest) {
        Ok(meta) => meta.permissions(),
        Err(_) => match default_file_permissions() {
            Some(p) => p,
            None => return Ok(()),
        },
    };
    staged.as_file().set_permissions(permissions).at_path(dest.display())
}

#[cfg(unix)]
fn default_file_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    use std::sync::OnceLock;

    // The umask can only be read by replacing it, so it is read once and put back
    // right away.
    static UMASK: OnceLock<u32> = OnceLock::new();
    let mask = *UMASK.get_or_init(|| {
        let mask = unsafe { libc::umask(0o022) };
        unsafe { libc::umask(mask) };
        #[allow(clippy::unnecessary_cast)]
        let mask = mask as u32;
        mask
    });
    Some(fs::Permissions::from_mode(0o666 & !mask))
}

#[cfg(not(unix))]
fn default_file_permissions() -> Option<fs::Permissions> {
    None
}

fn parent_dir(dest: &Path) -> &Path {
    match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Moves a finished staging file to `dest`, creating missing parent directories and
/// replacing any existing file. `dest` is never observed partially written.
///
/// If the staging file lives on another filesystem, it is first copied next to
/// `dest` and then renamed over it.
pub fn persist_into_place(staged: NamedTempFile, dest: &Path) -> Result<()> {
    let parent = parent_dir(dest);
    fs::create_dir_all(parent).at_path(parent.display())?;
    match_destination_permissions(&staged, dest)?;

    let staged = match staged.persist(dest) {
        Ok(_) => return Ok(()),
        Err(e) => {
            debug!("direct rename into {dest:?} failed ({}); copying next to the destination", e.error);
            e.file
        },
    };

    let mut source = staged.reopen().at_path(staged.path().display())?;
    let len = source.metadata().map(|m| m.len()).unwrap_or(0);
    ensure_space_for(dest, len)?;

    let mut sibling = staging_file_in(parent)?;
    io::copy(&mut source, sibling.as_file_mut()).at_path(dest.display())?;
    sibling.as_file().sync_all().at_path(dest.display())?;
    match_destination_permissions(&sibling, dest)?;

    sibling
        .persist(dest)
        .map_err(|e| FsError::io(dest.display(), e.error))
        .log_error("moving staged file into place")?;
    Ok(())
}

/// Writes `data` to `path` through a sibling staging file, creating parent
/// directories as needed.
pub fn write_atomically(path: &Path, data: &[u8]) -> Result<()> {
    ensure_space_for(path, data.len() as u64)?;

    let parent = parent_dir(path);
    let mut staged = staging_file_in(parent)?;
    staged.write_all(data).at_path(path.display())?;
    staged.as_file().sync_all().at_path(path.display())?;
    match_destination_permissions(&staged, path)?;

    staged.persist(path).map_err(|e| FsError::io(path.display(), e.error))?;
    Ok(())
}
