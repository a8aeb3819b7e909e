//! Filesystem abstraction for the directory-walking rule loader.
//!
//! Production code uses [`RealFileSystem`], which delegates to `std::fs`
//! and `walkdir`. Tests use [`MockFileSystem`] to exercise the signing-mode
//! policy and idempotent-reload behavior without touching disk.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

pub trait FileSystem: Send + Sync {
    fn read_file(&self, path: &Path) -> io::Result<String>;

    /// All regular files under `root`, recursively, in a stable order.
    fn walk_files(&self, root: &Path) -> io::Result<Vec<PathBuf>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_file(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn walk_files(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_file() {
                paths.push(entry.path().to_path_buf());
            }
        }
        Ok(paths)
    }
}

#[derive(Debug, Default)]
pub struct MockFileSystem {
    files: BTreeMap<PathBuf, String>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        self.files.insert(path.as_ref().to_path_buf(), content.into());
    }
}

impl FileSystem for MockFileSystem {
    fn read_file(&self, path: &Path) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "file not found in mock"))
    }

    fn walk_files(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        Ok(self
            .files
            .keys()
            .filter(|p| p.starts_with(root))
            .cloned()
            .collect())
    }
}
