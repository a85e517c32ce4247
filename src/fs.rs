//! Filesystem abstraction (C1).
//!
//! A pluggable trait so the locator and scanner can run against the real
//! filesystem or against an in-memory overlay in tests, mirroring the way
//! the rest of this codebase keeps file I/O behind a narrow seam.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A directory entry as reported by [`FileSystem::read_dir`].
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Minimal filesystem surface the locator and scanner need.
pub trait FileSystem: Send + Sync {
    fn stat_is_dir(&self, path: &Path) -> io::Result<bool>;
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;
    fn read_file(&self, path: &Path) -> io::Result<String>;

    /// Walk a directory tree, invoking `visitor` for every regular file.
    /// `prune` is checked against each directory's file name before
    /// descending into it, so callers can skip `testdata`/vendor-style
    /// trees without paying to list them.
    fn walk_dir(
        &self,
        root: &Path,
        prune: &dyn Fn(&str) -> bool,
        visitor: &mut dyn FnMut(&Path),
    ) -> io::Result<()> {
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in self.read_dir(&dir)? {
                if entry.is_dir {
                    let name = entry
                        .path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or_default();
                    if !prune(name) {
                        stack.push(entry.path);
                    }
                } else {
                    visitor(&entry.path);
                }
            }
        }
        Ok(())
    }
}

/// Delegates straight to the host OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn stat_is_dir(&self, path: &Path) -> io::Result<bool> {
        Ok(fs::metadata(path)?.is_dir())
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            out.push(DirEntry {
                path: entry.path(),
                is_dir: meta.is_dir(),
            });
        }
        Ok(out)
    }

    fn read_file(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    /// Overrides the generic stack-walking default with `walkdir`, which
    /// prunes directories during iteration (via `filter_entry`) instead of
    /// listing a directory's contents before deciding to skip it.
    fn walk_dir(
        &self,
        root: &Path,
        prune: &dyn Fn(&str) -> bool,
        visitor: &mut dyn FnMut(&Path),
    ) -> io::Result<()> {
        let walker = walkdir::WalkDir::new(root).into_iter().filter_entry(|entry| {
            if entry.depth() == 0 || entry.file_type().is_file() {
                return true;
            }
            !entry.file_name().to_str().is_some_and(prune)
        });
        for entry in walker {
            let entry = entry.map_err(io::Error::other)?;
            if entry.file_type().is_file() {
                visitor(entry.path());
            }
        }
        Ok(())
    }
}

/// An in-memory filesystem overlay for hermetic tests: maps virtual paths
/// to file contents. Directories are derived from path prefixes.
#[derive(Debug, Default, Clone)]
pub struct OverlayFileSystem {
    files: HashMap<PathBuf, String>,
}

impl OverlayFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.files.insert(path.into(), contents.into());
        self
    }

    /// Materializes the overlay under a fresh temp directory and returns
    /// the root plus the files actually written, so callers can also drive
    /// the real [`OsFileSystem`] against it (used by scanner fixture tests).
    #[cfg(test)]
    pub fn write_files(&self) -> io::Result<(tempfile::TempDir, Vec<PathBuf>)> {
        let dir = tempfile::tempdir()?;
        let mut written = Vec::new();
        for (rel, contents) in &self.files {
            let abs = dir.path().join(rel);
            if let Some(parent) = abs.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&abs, contents)?;
            written.push(abs);
        }
        Ok((dir, written))
    }
}

impl FileSystem for OverlayFileSystem {
    fn stat_is_dir(&self, path: &Path) -> io::Result<bool> {
        if self.files.contains_key(path) {
            return Ok(false);
        }
        let is_dir = self
            .files
            .keys()
            .any(|p| p.starts_with(path) && p != path);
        if is_dir {
            Ok(true)
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "not found in overlay"))
        }
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for p in self.files.keys() {
            let Ok(rel) = p.strip_prefix(path) else {
                continue;
            };
            let Some(first) = rel.components().next() else {
                continue;
            };
            let child = path.join(first.as_os_str());
            if seen.insert(child.clone()) {
                let is_dir = child != *p;
                out.push(DirEntry { path: child, is_dir });
            }
        }
        Ok(out)
    }

    fn read_file(&self, path: &Path) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "not found in overlay"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_read_dir_lists_direct_children() {
        let fs = OverlayFileSystem::new()
            .with_file("/mod/a.go", "package a")
            .with_file("/mod/sub/b.go", "package sub");
        let entries = fs.read_dir(Path::new("/mod")).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.path == Path::new("/mod/a.go") && !e.is_dir));
        assert!(entries.iter().any(|e| e.path == Path::new("/mod/sub") && e.is_dir));
    }

    #[test]
    fn overlay_write_files_materializes_to_disk() {
        let fs = OverlayFileSystem::new().with_file("pkg/a.go", "package pkg");
        let (dir, written) = fs.write_files().unwrap();
        assert_eq!(written.len(), 1);
        let contents = std::fs::read_to_string(dir.path().join("pkg/a.go")).unwrap();
        assert_eq!(contents, "package pkg");
    }
}
