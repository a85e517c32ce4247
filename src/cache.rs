//! Package Cache & Identity Store (C4): a scan-once, `Arc`-shared map from
//! import path to [`PackageInfo`], guarded by a single mutex (spec §5:
//! "Package cache access is a single mutex; no reader/writer split, since
//! scanning is infrequent and cheap relative to evaluation").
//!
//! Declaration identity (spec §3.5) falls out of this cache's one
//! scan-per-import-path guarantee rather than a separate node-pointer
//! table: a type or function descriptor is built exactly once per scan and
//! every place that references it (e.g. a `TypeInfo`'s method list and the
//! package's flat function list) holds a clone of the same `Arc`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::error::ScanResult;
use crate::fs::FileSystem;
use crate::locator::Locator;
use crate::scanner::{ScanOptions, Scanner};
use crate::types::PackageInfo;

pub struct PackageCache {
    fs: Arc<dyn FileSystem>,
    scanner: Scanner,
    packages: Mutex<HashMap<String, Arc<PackageInfo>>>,
    options: ScanOptions,
}

impl PackageCache {
    pub fn new(fs: Arc<dyn FileSystem>, options: ScanOptions) -> Self {
        Self {
            scanner: Scanner::new(fs.clone()),
            fs,
            packages: Mutex::new(HashMap::new()),
            options,
        }
    }

    /// Returns the cached package if already scanned, without touching the
    /// locator or filesystem.
    pub fn peek(&self, import_path: &str) -> Option<Arc<PackageInfo>> {
        self.packages.lock().unwrap().get(import_path).cloned()
    }

    /// Scans (once) and returns the package for `import_path`, resolving
    /// its directory through `locator`. Concurrent callers racing on the
    /// same import path converge on the same `Arc`: the second to arrive
    /// discards its own scan and adopts the first's, so `Arc::ptr_eq` holds
    /// even under contention.
    pub fn get_or_scan(
        &self,
        locator: &Locator,
        import_path: &str,
    ) -> ScanResult<Arc<PackageInfo>> {
        if let Some(pkg) = self.peek(import_path) {
            return Ok(pkg);
        }
        let dir = locator.find_package_dir(import_path)?;
        let pkg = self
            .scanner
            .scan_dir(&dir, import_path, import_path, &self.options)?;
        let pkg = Arc::new(pkg);

        let mut packages = self.packages.lock().unwrap();
        let pkg = packages.entry(import_path.to_string()).or_insert(pkg).clone();
        Ok(pkg)
    }

    /// Scans a directory directly, bypassing the locator (used for the
    /// entry-point / root package, and by tests).
    pub fn get_or_scan_dir(
        &self,
        dir: &PathBuf,
        import_path: &str,
        id: &str,
    ) -> ScanResult<Arc<PackageInfo>> {
        if let Some(pkg) = self.peek(import_path) {
            return Ok(pkg);
        }
        let pkg = self.scanner.scan_dir(dir, import_path, id, &self.options)?;
        let pkg = Arc::new(pkg);
        let mut packages = self.packages.lock().unwrap();
        let pkg = packages.entry(import_path.to_string()).or_insert(pkg).clone();
        Ok(pkg)
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    pub fn all(&self) -> Vec<Arc<PackageInfo>> {
        self.packages.lock().unwrap().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.packages.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::OverlayFileSystem;
    use crate::locator::LocatorOptions;
    use std::path::Path;

    #[test]
    fn scanning_the_same_import_path_twice_returns_the_same_arc() {
        let fs: Arc<dyn FileSystem> = Arc::new(
            OverlayFileSystem::new()
                .with_file("/ws/go.mod", "module example.com/app\n")
                .with_file("/ws/util/util.go", "package util\n\nfunc Helper() {}\n"),
        );
        let locator =
            Locator::discover(fs.clone(), Path::new("/ws"), LocatorOptions::default()).unwrap();
        let cache = PackageCache::new(fs, ScanOptions::default());

        let first = cache
            .get_or_scan(&locator, "example.com/app/util")
            .unwrap();
        let second = cache
            .get_or_scan(&locator, "example.com/app/util")
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn peek_misses_before_scan_and_hits_after() {
        let fs: Arc<dyn FileSystem> = Arc::new(
            OverlayFileSystem::new()
                .with_file("/ws/go.mod", "module example.com/app\n")
                .with_file("/ws/util/util.go", "package util\n"),
        );
        let locator =
            Locator::discover(fs.clone(), Path::new("/ws"), LocatorOptions::default()).unwrap();
        let cache = PackageCache::new(fs, ScanOptions::default());
        assert!(cache.peek("example.com/app/util").is_none());
        cache.get_or_scan(&locator, "example.com/app/util").unwrap();
        assert!(cache.peek("example.com/app/util").is_some());
    }
}
