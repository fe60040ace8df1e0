use std::collections::HashMap;
use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::sync::{Arc, Mutex};

use file_utils::{
    ContentReference, ContentResolver, FileEncoding, FileStat, FileSystem, FsError, ResolvedPath,
};
use tempfile::tempdir;
use utils::ByteSize;

fn path_str(p: &std::path::Path) -> String {
    p.to_string_lossy().into_owned()
}

#[test]
fn test_utf8_round_trip() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let fs_ops = FileSystem::new();
    let p = path_str(&dir.path().join("notes.txt"));

    let text = "línea uno\nline two ✓\n";
    fs_ops.write_file(&p, text, FileEncoding::Utf8)?;
    assert_eq!(fs_ops.read_file(&p, FileEncoding::Utf8)?, text);
    Ok(())
}

#[test]
fn test_base64_round_trip_of_binary_data() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let fs_ops = FileSystem::new();
    let p = path_str(&dir.path().join("blob.bin"));

    let bytes: Vec<u8> = (0..4096u32).map(|i| (i * 31 % 251) as u8).collect();
    let encoded = FileEncoding::Base64.bytes_to_string(bytes.clone())?;

    fs_ops.write_file(&p, &encoded, FileEncoding::Base64)?;
    assert_eq!(fs::read(&p)?, bytes);

    let read_back = fs_ops.read_file(&p, FileEncoding::Base64)?;
    assert_eq!(FileEncoding::Base64.string_to_bytes(&read_back)?, bytes);
    Ok(())
}

#[test]
fn test_write_creates_parent_directories() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let fs_ops = FileSystem::new();
    let p = dir.path().join("a/b/c/file.txt");

    fs_ops.write_file(&path_str(&p), "x", FileEncoding::Ascii)?;
    assert!(p.is_file());
    Ok(())
}

#[test]
fn test_read_missing_file_is_file_error() {
    let dir = tempdir().unwrap();
    let fs_ops = FileSystem::new();
    let err = fs_ops
        .read_file(&path_str(&dir.path().join("missing.txt")), FileEncoding::Utf8)
        .unwrap_err();
    assert!(err.is_not_found(), "{err:?}");
    assert!(err.to_string().contains("missing.txt"));
}

#[test]
fn test_read_limit() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let fs_ops = FileSystem::new().with_max_read_size(ByteSize::new(8));
    let p = path_str(&dir.path().join("big.txt"));
    fs::write(&p, "0123456789")?;

    let err = fs_ops.read_file(&p, FileEncoding::Utf8).unwrap_err();
    assert!(matches!(err, FsError::TooLarge { size: 10, .. }), "{err:?}");
    Ok(())
}

#[test]
fn test_mkdir_is_recursive_and_idempotent() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let fs_ops = FileSystem::new();
    let p = dir.path().join("a/b/c");

    assert!(fs_ops.mkdir(&path_str(&p))?);
    assert!(p.is_dir());
    assert!(fs_ops.mkdir(&path_str(&p))?);
    Ok(())
}

#[test]
fn test_unlink() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let fs_ops = FileSystem::new();
    let tree = dir.path().join("tree");
    fs::create_dir_all(tree.join("sub"))?;
    fs::write(tree.join("sub/f.txt"), "x")?;

    assert!(fs_ops.unlink(&path_str(&tree))?);
    assert!(!tree.exists());
    assert!(!fs_ops.unlink(&path_str(&tree))?);
    Ok(())
}

#[test]
fn test_copy_file_and_directory() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let fs_ops = FileSystem::new();

    let src = dir.path().join("src");
    fs::create_dir_all(src.join("nested"))?;
    fs::write(src.join("a.txt"), "a")?;
    fs::write(src.join("nested/b.txt"), "b")?;

    let single = dir.path().join("out/copy_of_a.txt");
    fs_ops.copy_file(&path_str(&src.join("a.txt")), &path_str(&single))?;
    assert_eq!(fs::read_to_string(&single)?, "a");

    let dest = dir.path().join("dest");
    fs_ops.copy(&path_str(&src), &path_str(&dest))?;
    assert_eq!(fs::read_to_string(dest.join("a.txt"))?, "a");
    assert_eq!(fs::read_to_string(dest.join("nested/b.txt"))?, "b");
    Ok(())
}

#[test]
fn test_rename() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let fs_ops = FileSystem::new();
    let old = dir.path().join("old.txt");
    let new = dir.path().join("new.txt");
    fs::write(&old, "content")?;

    fs_ops.rename(&path_str(&old), &path_str(&new))?;
    assert!(!old.exists());
    assert_eq!(fs::read_to_string(&new)?, "content");

    let err = fs_ops.rename(&path_str(&old), &path_str(&new)).unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[test]
fn test_stat_and_readdir() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let fs_ops = FileSystem::new();
    fs::write(dir.path().join("b.png"), [0u8; 12])?;
    fs::write(dir.path().join("a.txt"), "hello")?;
    fs::create_dir(dir.path().join("c"))?;

    let st = fs_ops.stat(&path_str(&dir.path().join("a.txt")))?;
    assert_eq!(st.size, 5);
    assert!(st.is_file && !st.is_directory);
    assert!(st.mtime > 0);

    let st = fs_ops.stat(&path_str(dir.path()))?;
    assert!(st.is_directory);

    let entries = fs_ops.readdir(&path_str(dir.path()))?;
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["a.txt", "b.png", "c"]);
    assert_eq!(entries[0].mime_type, "text/plain");
    assert_eq!(entries[1].mime_type, "image/png");
    assert!(entries[1].path.ends_with("b.png"));

    assert!(fs_ops.readdir(&path_str(&dir.path().join("a.txt"))).is_err());
    Ok(())
}

#[test]
fn test_path_helpers() -> anyhow::Result<()> {
    let fs_ops = FileSystem::new();
    assert_eq!(fs_ops.dirname("/data/photos/cat.jpeg")?, "/data/photos");
    assert_eq!(fs_ops.basename("/data/photos/cat.jpeg")?, "cat.jpeg");
    assert_eq!(fs_ops.extname("/data/photos/cat.jpeg")?, "jpeg");
    Ok(())
}

#[test]
fn test_content_reference_without_resolver_is_unavailable() {
    let fs_ops = FileSystem::new();
    let reference = "content://media/external/file/7";

    assert!(!fs_ops.exists(reference));
    assert!(matches!(fs_ops.read_file(reference, FileEncoding::Utf8), Err(FsError::Unavailable(_))));
    assert!(matches!(fs_ops.mkdir(reference), Err(FsError::Unavailable(_))));
}

#[derive(Default)]
struct MemoryResolver {
    items: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

struct MemoryWriter {
    key: String,
    buf: Vec<u8>,
    items: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl Write for MemoryWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.items.lock().unwrap().insert(self.key.clone(), self.buf.clone());
        Ok(())
    }
}

impl ContentResolver for MemoryResolver {
    fn exists(&self, reference: &ContentReference) -> bool {
        self.items.lock().unwrap().contains_key(reference.as_str())
    }

    fn open_read(&self, reference: &ContentReference) -> io::Result<Box<dyn Read + Send>> {
        let data = self.items.lock().unwrap().get(reference.as_str()).cloned();
        data.map(|d| Box::new(Cursor::new(d)) as Box<dyn Read + Send>)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn open_write(&self, reference: &ContentReference) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(MemoryWriter {
            key: reference.as_str().to_owned(),
            buf: Vec::new(),
            items: self.items.clone(),
        }))
    }

    fn delete(&self, reference: &ContentReference) -> io::Result<bool> {
        Ok(self.items.lock().unwrap().remove(reference.as_str()).is_some())
    }

    fn stat(&self, reference: &ContentReference) -> io::Result<FileStat> {
        let size = self
            .items
            .lock()
            .unwrap()
            .get(reference.as_str())
            .map(|d| d.len() as u64)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        Ok(FileStat {
            size,
            is_file: true,
            ..Default::default()
        })
    }

    fn display_name(&self, _reference: &ContentReference) -> Option<String> {
        Some("picked.png".to_owned())
    }

    fn mime_type(&self, _reference: &ContentReference) -> Option<String> {
        Some("image/png".to_owned())
    }
}

#[test]
fn test_content_reference_with_resolver() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let fs_ops = FileSystem::new().with_content_resolver(Arc::new(MemoryResolver::default()));
    let reference = "content://docs/document/99";

    fs_ops.write_file(reference, "pixels", FileEncoding::Utf8)?;
    assert!(fs_ops.exists(reference));
    assert_eq!(fs_ops.read_file(reference, FileEncoding::Utf8)?, "pixels");
    assert_eq!(fs_ops.stat(reference)?.size, 6);
    assert_eq!(fs_ops.basename(reference)?, "picked.png");
    assert_eq!(fs_ops.extname(reference)?, "png");

    let local = dir.path().join("copied/picked.png");
    fs_ops.copy_file(reference, &path_str(&local))?;
    assert_eq!(fs::read_to_string(&local)?, "pixels");

    assert!(matches!(fs_ops.mkdir(reference), Err(FsError::Unavailable(_))));
    assert!(matches!(fs_ops.readdir(reference), Err(FsError::Unavailable(_))));

    assert!(fs_ops.unlink(reference)?);
    assert!(!fs_ops.unlink(reference)?);
    assert_eq!(ResolvedPath::parse(reference)?.to_string(), reference);
    Ok(())
}
