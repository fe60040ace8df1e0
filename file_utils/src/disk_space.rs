use std::path::Path;

/// Bytes available to unprivileged writers on the filesystem holding `path`.
///
/// `path` does not need to exist; its nearest existing ancestor is queried.
/// Returns None when the platform cannot tell.
pub fn available_space(path: &Path) -> Option<u64> {
    let existing = path.ancestors().find(|p| !p.as_os_str().is_empty() && p.exists())?;
    query_available_space(existing)
}

#[cfg(unix)]
fn query_available_space(path: &Path) -> Option<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };

    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return None;
    }

    #[allow(clippy::unnecessary_cast)]
    Some((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64))
}

#[cfg(not(unix))]
fn query_available_space(_path: &Path) -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_available_space_of_missing_child() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("a/b/c.bin");
        let space = available_space(&missing).unwrap();
        assert!(space > 0);
    }
}
