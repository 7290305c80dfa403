use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::UtilError;
use crate::Result;

/// The engine's only filesystem seam.
///
/// Every persistent read or write made by the storage and pack engine goes
/// through this trait instead of calling `std::fs` directly, so the engine
/// can run against a real filesystem, an in-memory store, or any other medium
/// that can satisfy these operations.
///
/// Paths are always relative to whatever root the implementation was
/// constructed with; callers never need to know whether that root is a
/// directory on disk or a key prefix in memory.
pub trait FilesApi: Send + Sync {
    /// Read an entire file's contents. Returns `NotFound`-flavored `UtilError::Io`
    /// when the path does not exist.
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Check whether a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Write `contents` to `path` atomically: the implementation must ensure
    /// that a reader never observes a partially-written file, typically via a
    /// temp-file-then-rename sequence. Creates parent directories as needed.
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// List the direct entries of a directory (file and directory names, not
    /// full paths). Returns an empty vec if the directory does not exist.
    fn list_dir(&self, path: &Path) -> Result<Vec<String>>;

    /// Remove a file. Not an error if the file is already absent.
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Remove a directory and everything under it. Not an error if absent.
    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// Create a directory and all missing parents.
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Rename/move a path. Both source and destination are relative to this
    /// root. Used for operations (like pack installation) that need a rename
    /// across two paths the caller already computed, as opposed to the
    /// implicit temp-file rename inside `write_atomic`.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
}

/// Filesystem-backed implementation, the default for a real repository.
pub struct StdFilesApi {
    root: PathBuf,
}

impl StdFilesApi {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl FilesApi for StdFilesApi {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let full = self.resolve(path);
        let mut file = File::open(&full)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_name = format!(
            "tmp_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        let tmp_path = full.parent().unwrap_or(Path::new(".")).join(tmp_name);
        {
            let mut f = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&tmp_path)?;
            f.write_all(contents)?;
            f.sync_all()?;
        }
        fs::rename(&tmp_path, &full)?;
        Ok(())
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let full = self.resolve(path);
        if !full.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in fs::read_dir(&full)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                out.push(name.to_string());
            }
        }
        Ok(out)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let full = self.resolve(path);
        match fs::remove_file(&full) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(UtilError::Io(e)),
        }
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let full = self.resolve(path);
        match fs::remove_dir_all(&full) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(UtilError::Io(e)),
        }
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(self.resolve(path))?;
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = self.resolve(from);
        let to = self.resolve(to);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(from, to)?;
        Ok(())
    }
}

/// In-memory implementation: a plain map from normalized path to bytes,
/// guarded by a mutex. Used by tests and by embedders who want the object
/// store's semantics with no filesystem underneath.
#[derive(Default)]
pub struct InMemoryFilesApi {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl InMemoryFilesApi {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FilesApi for InMemoryFilesApi {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let files = self.files.lock().unwrap();
        files
            .get(path)
            .cloned()
            .ok_or_else(|| UtilError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{}: not found", path.display()),
            )))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let files = self.files.lock().unwrap();
        let mut seen = std::collections::HashSet::new();
        for key in files.keys() {
            if let Ok(rest) = key.strip_prefix(path) {
                if let Some(first) = rest.components().next() {
                    if let Some(name) = first.as_os_str().to_str() {
                        seen.insert(name.to_string());
                    }
                }
            }
        }
        let mut out: Vec<String> = seen.into_iter().collect();
        out.sort();
        Ok(out)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.files.lock().unwrap().remove(path);
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let mut files = self.files.lock().unwrap();
        files.retain(|key, _| !key.starts_with(path));
        Ok(())
    }

    fn create_dir_all(&self, _path: &Path) -> Result<()> {
        // directories are implicit in a flat key-value map
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut files = self.files.lock().unwrap();
        if let Some(data) = files.remove(from) {
            files.insert(to.to_path_buf(), data);
        }
        Ok(())
    }
}
