//! Identity/Symbol Cache (C12): a small JSON file persisting, per
//! project root, which source files were last seen with what fingerprint
//! and which symbol each declaration byte-offset corresponds to (spec
//! §6.3's identity-cache format).
//!
//! The cache is deliberately optimistic: `verify_and_get` trusts its
//! record only if the file's current size and content hash still match
//! what was recorded, and evicts (both the file entry and every symbol
//! pointing at it) the moment they don't. Paths are always stored
//! relative to the configured root with forward slashes, so the file is
//! portable across platforms and across clones at different absolute
//! locations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ScanError, ScanResult};
use crate::fs::FileSystem;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub size: u64,
    pub hash: String,
}

impl FileRecord {
    pub fn compute(contents: &str) -> Self {
        Self {
            size: contents.len() as u64,
            hash: fnv1a_hex(contents.as_bytes()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub file: String,
    pub byte_offset: usize,
    pub kind: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SymbolCache {
    files: HashMap<String, FileRecord>,
    symbols: HashMap<String, SymbolRecord>,
    #[serde(skip)]
    root: PathBuf,
}

impl SymbolCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            files: HashMap::new(),
            symbols: HashMap::new(),
            root: root.into(),
        }
    }

    /// Never fails: an unreadable or unparseable cache file is treated as
    /// empty, logging a warning rather than failing the caller's session.
    pub fn load(fs: &dyn FileSystem, root: impl Into<PathBuf>, cache_path: &Path) -> Self {
        let root = root.into();
        match fs.read_file(cache_path) {
            Ok(contents) => match serde_json::from_str::<SymbolCache>(&contents) {
                Ok(mut cache) => {
                    cache.root = root;
                    cache
                }
                Err(err) => {
                    tracing::warn!(path = %cache_path.display(), error = %err, "unparseable symbol cache, resetting to empty");
                    Self::new(root)
                }
            },
            Err(_) => Self::new(root),
        }
    }

    pub fn to_json(&self) -> ScanResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ScanError::CacheCorruption {
            path: PathBuf::new(),
            message: e.to_string(),
        })
    }

    /// Converts an absolute path into a root-relative, forward-slash key.
    /// Refuses paths outside `root` rather than silently truncating them.
    pub fn normalize_path(&self, abs: &Path) -> ScanResult<String> {
        let rel = abs.strip_prefix(&self.root).map_err(|_| ScanError::CacheCorruption {
            path: abs.to_path_buf(),
            message: format!("path is not under cache root {}", self.root.display()),
        })?;
        Ok(rel.to_string_lossy().replace('\\', "/"))
    }

    pub fn set_file(&mut self, key: String, record: FileRecord) {
        self.files.insert(key, record);
    }

    pub fn set_symbol(&mut self, qualified_name: String, record: SymbolRecord) {
        self.symbols.insert(qualified_name, record);
    }

    /// Returns the cached record for `qualified_name` only if the file it
    /// points at still matches `current`. A mismatch evicts the file entry
    /// and every symbol that referenced it before returning `None`.
    pub fn verify_and_get(&mut self, qualified_name: &str, current: &FileRecord) -> Option<SymbolRecord> {
        let symbol = self.symbols.get(qualified_name)?.clone();
        match self.files.get(&symbol.file) {
            Some(recorded) if recorded == current => Some(symbol),
            _ => {
                self.evict_file(&symbol.file);
                None
            }
        }
    }

    pub fn evict_file(&mut self, file_key: &str) {
        self.files.remove(file_key);
        self.symbols.retain(|_, record| record.file != file_key);
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// A small, dependency-free content hash. Identity caching only needs
/// collision resistance against accidental staleness, not cryptographic
/// guarantees, so FNV-1a is plenty and keeps the dependency list lean.
pub(crate) fn fnv1a_hex(bytes: &[u8]) -> String {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    format!("{hash:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::OverlayFileSystem;

    #[test]
    fn normalize_path_rejects_paths_outside_root() {
        let cache = SymbolCache::new("/ws");
        assert!(cache.normalize_path(Path::new("/other/file.go")).is_err());
        assert_eq!(
            cache.normalize_path(Path::new("/ws/util/a.go")).unwrap(),
            "util/a.go"
        );
    }

    #[test]
    fn verify_and_get_returns_the_record_when_file_is_unchanged() {
        let mut cache = SymbolCache::new("/ws");
        let record = FileRecord::compute("package util\n");
        cache.set_file("util/a.go".to_string(), record.clone());
        cache.set_symbol(
            "example.com/app/util.Thing".to_string(),
            SymbolRecord {
                file: "util/a.go".to_string(),
                byte_offset: 0,
                kind: "struct".to_string(),
            },
        );
        assert!(cache
            .verify_and_get("example.com/app/util.Thing", &record)
            .is_some());
    }

    #[test]
    fn verify_and_get_evicts_on_content_mismatch() {
        let mut cache = SymbolCache::new("/ws");
        let original = FileRecord::compute("package util\n");
        cache.set_file("util/a.go".to_string(), original);
        cache.set_symbol(
            "example.com/app/util.Thing".to_string(),
            SymbolRecord {
                file: "util/a.go".to_string(),
                byte_offset: 0,
                kind: "struct".to_string(),
            },
        );
        let changed = FileRecord::compute("package util\n\ntype Extra struct{}\n");
        assert!(cache
            .verify_and_get("example.com/app/util.Thing", &changed)
            .is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn load_resets_to_empty_on_unparseable_cache_instead_of_failing() {
        let fs = OverlayFileSystem::new().with_file("/ws/.goscope/symbols.json", "not valid json {{{");
        let cache = SymbolCache::load(&fs, "/ws", Path::new("/ws/.goscope/symbols.json"));
        assert!(cache.is_empty());
    }

    #[test]
    fn load_returns_empty_when_no_cache_file_exists() {
        let fs = OverlayFileSystem::new();
        let cache = SymbolCache::load(&fs, "/ws", Path::new("/ws/.goscope/symbols.json"));
        assert!(cache.is_empty());
    }

    #[test]
    fn round_trips_through_json() {
        let mut cache = SymbolCache::new("/ws");
        cache.set_file("a.go".to_string(), FileRecord::compute("package a\n"));
        cache.set_symbol(
            "a.X".to_string(),
            SymbolRecord {
                file: "a.go".to_string(),
                byte_offset: 5,
                kind: "func".to_string(),
            },
        );
        let json = cache.to_json().unwrap();
        let mut restored: SymbolCache = serde_json::from_str(&json).unwrap();
        restored.root = PathBuf::from("/ws");
        assert_eq!(restored.len(), 1);
    }
}
