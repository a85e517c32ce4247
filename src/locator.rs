//! Package Locator (C2): resolves import paths to directories, honoring
//! module descriptors, `replace`/`require` directives, and (optionally)
//! the standard library root and module cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ScanError, ScanResult};
use crate::fs::FileSystem;
use crate::module::{ModuleDescriptor, parse_module_descriptor};

const MODULE_DESCRIPTOR_FILENAME: &str = "go.mod";

/// Configuration consumed at construction time; write-once per spec §5
/// ("Locator state ... is write-once at construction; readers are
/// lock-free afterward").
#[derive(Debug, Clone, Default)]
pub struct LocatorOptions {
    /// Enables stdlib (`GOROOT/src`) and module-cache (`GOMODCACHE`)
    /// resolution. Off by default; without it, only in-module and
    /// `replace`-local paths resolve.
    pub module_resolver: bool,
    /// Overrides for `GOROOT`/`GOMODCACHE`; defaults read `$GOROOT` /
    /// `$GOMODCACHE` (falling back to `$GOPATH/pkg/mod`) from the
    /// environment when unset.
    pub goroot: Option<PathBuf>,
    pub gomodcache: Option<PathBuf>,
}

pub struct Locator {
    fs: Arc<dyn FileSystem>,
    root_dir: PathBuf,
    descriptor: ModuleDescriptor,
    options: LocatorOptions,
}

impl std::fmt::Debug for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Locator")
            .field("root_dir", &self.root_dir)
            .field("descriptor", &self.descriptor)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Locator {
    /// Ascends from `start_dir` looking for a module descriptor. Its
    /// absence is fatal unless `options.module_resolver` is set, in which
    /// case only stdlib resolution remains available and `root_dir`
    /// degenerates to `start_dir`.
    pub fn discover(
        fs: Arc<dyn FileSystem>,
        start_dir: &Path,
        options: LocatorOptions,
    ) -> ScanResult<Self> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(MODULE_DESCRIPTOR_FILENAME);
            if let Ok(contents) = fs.read_file(&candidate) {
                let descriptor = parse_module_descriptor(&contents).map_err(|e| ScanError::Parse {
                    path: candidate.clone(),
                    message: e.to_string(),
                })?;
                return Ok(Self {
                    fs,
                    root_dir: dir,
                    descriptor,
                    options,
                });
            }
            match dir.parent() {
                Some(parent) => dir = parent.to_path_buf(),
                None => break,
            }
        }

        if options.module_resolver {
            Ok(Self {
                fs,
                root_dir: start_dir.to_path_buf(),
                descriptor: ModuleDescriptor::default(),
                options,
            })
        } else {
            Err(ScanError::LocatorNotFound {
                import_path: String::new(),
                reason: format!(
                    "no {MODULE_DESCRIPTOR_FILENAME} found above {}",
                    start_dir.display()
                ),
            })
        }
    }

    pub fn module_path(&self) -> &str {
        &self.descriptor.module_path
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// `FindPackageDir`: tries replace directives (local, then module),
    /// then in-module resolution, then (if enabled) stdlib and module
    /// cache, in that order.
    pub fn find_package_dir(&self, import_path: &str) -> ScanResult<PathBuf> {
        if let Some(dir) = self.resolve_via_replace(import_path)? {
            return Ok(dir);
        }

        if let Some(remainder) = strip_module_prefix(&self.descriptor.module_path, import_path) {
            let dir = join_remainder(&self.root_dir, remainder);
            if self.fs.stat_is_dir(&dir).unwrap_or(false) {
                return Ok(dir);
            }
        }

        if self.options.module_resolver {
            if let Some(dir) = self.resolve_stdlib(import_path) {
                return Ok(dir);
            }
            if let Some(dir) = self.resolve_module_cache(import_path) {
                return Ok(dir);
            }
        }

        Err(ScanError::LocatorNotFound {
            import_path: import_path.to_string(),
            reason: "no replace, in-module, stdlib, or module-cache strategy resolved it"
                .to_string(),
        })
    }

    /// `PathToImport`: inverse of `find_package_dir` for paths under this
    /// module's root.
    pub fn path_to_import(&self, abs_dir: &Path) -> ScanResult<String> {
        let remainder = abs_dir.strip_prefix(&self.root_dir).map_err(|_| {
            ScanError::LocatorNotFound {
                import_path: abs_dir.display().to_string(),
                reason: format!("not under module root {}", self.root_dir.display()),
            }
        })?;
        let remainder = remainder.to_string_lossy().replace('\\', "/");
        if remainder.is_empty() {
            Ok(self.descriptor.module_path.clone())
        } else {
            Ok(format!("{}/{}", self.descriptor.module_path, remainder))
        }
    }

    fn resolve_via_replace(&self, import_path: &str) -> ScanResult<Option<PathBuf>> {
        for replace in &self.descriptor.replaces {
            let Some(remainder) = strip_module_prefix(&replace.old_path, import_path) else {
                continue;
            };
            if replace.is_local() {
                let dir = join_remainder(&self.root_dir.join(&replace.new_path), remainder);
                if self.fs.stat_is_dir(&dir).unwrap_or(false) {
                    return Ok(Some(dir));
                }
                continue;
            }
            // Module replacement: rewrite the import path to the new
            // module and retry the whole pipeline once.
            let rewritten = if remainder.is_empty() {
                replace.new_path.clone()
            } else {
                format!("{}/{}", replace.new_path, remainder)
            };
            if self.options.module_resolver {
                if let Some(dir) = self.resolve_module_cache(&rewritten) {
                    return Ok(Some(dir));
                }
            }
        }
        Ok(None)
    }

    fn resolve_stdlib(&self, import_path: &str) -> Option<PathBuf> {
        let goroot = self.goroot()?;
        let dir = goroot.join("src").join(import_path);
        self.fs.stat_is_dir(&dir).ok().filter(|b| *b).map(|_| dir)
    }

    fn resolve_module_cache(&self, import_path: &str) -> Option<PathBuf> {
        let gomodcache = self.gomodcache()?;
        for req in &self.descriptor.requires {
            let Some(remainder) = strip_module_prefix(&req.path, import_path) else {
                continue;
            };
            let escaped = escape_module_path(&req.path);
            let mut dir = gomodcache.join(format!("{escaped}@{}", req.version));
            if !remainder.is_empty() {
                dir = join_remainder(&dir, remainder);
            }
            if self.fs.stat_is_dir(&dir).unwrap_or(false) {
                return Some(dir);
            }
        }
        None
    }

    fn goroot(&self) -> Option<PathBuf> {
        self.options
            .goroot
            .clone()
            .or_else(|| std::env::var_os("GOROOT").map(PathBuf::from))
    }

    fn gomodcache(&self) -> Option<PathBuf> {
        self.options.gomodcache.clone().or_else(|| {
            std::env::var_os("GOMODCACHE")
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var_os("GOPATH").map(|p| PathBuf::from(p).join("pkg").join("mod"))
                })
        })
    }
}

/// If `prefix` is `import_path` or a `/`-bounded ancestor of it, returns
/// the remainder after the prefix (empty string for an exact match).
fn strip_module_prefix<'a>(prefix: &str, import_path: &'a str) -> Option<&'a str> {
    if import_path == prefix {
        return Some("");
    }
    import_path
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
}

fn join_remainder(base: &Path, remainder: &str) -> PathBuf {
    if remainder.is_empty() {
        base.to_path_buf()
    } else {
        base.join(remainder)
    }
}

/// Escapes uppercase letters per the module-cache rule: each uppercase
/// letter becomes `!` followed by its lowercase form (e.g. `BurntSushi`
/// -> `!burnt!sushi`).
pub fn escape_module_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for ch in path.chars() {
        if ch.is_ascii_uppercase() {
            out.push('!');
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::OverlayFileSystem;

    fn fs_with(files: &[(&str, &str)]) -> Arc<dyn FileSystem> {
        let mut overlay = OverlayFileSystem::new();
        for (path, contents) in files {
            overlay = overlay.with_file(*path, *contents);
        }
        Arc::new(overlay)
    }

    #[test]
    fn escapes_uppercase_for_module_cache() {
        assert_eq!(escape_module_path("BurntSushi/toml"), "!burnt!sushi/toml");
        assert_eq!(escape_module_path("lower/case"), "lower/case");
    }

    #[test]
    fn resolves_in_module_package() {
        let fs = fs_with(&[
            ("/ws/go.mod", "module example.com/app\n"),
            ("/ws/internal/util/util.go", "package util"),
        ]);
        let locator = Locator::discover(fs, Path::new("/ws"), LocatorOptions::default()).unwrap();
        let dir = locator
            .find_package_dir("example.com/app/internal/util")
            .unwrap();
        assert_eq!(dir, Path::new("/ws/internal/util"));
    }

    #[test]
    fn resolves_local_replace_directive() {
        let fs = fs_with(&[
            (
                "/ws/go.mod",
                "module example.com/app\n\nreplace example.com/lib => ../lib\n",
            ),
            ("/lib/thing.go", "package lib"),
        ]);
        let locator = Locator::discover(fs, Path::new("/ws"), LocatorOptions::default()).unwrap();
        let dir = locator.find_package_dir("example.com/lib").unwrap();
        assert_eq!(dir, Path::new("/ws/../lib"));
    }

    #[test]
    fn path_to_import_is_inverse_of_in_module_resolution() {
        let fs = fs_with(&[
            ("/ws/go.mod", "module example.com/app\n"),
            ("/ws/internal/util/util.go", "package util"),
        ]);
        let locator = Locator::discover(fs, Path::new("/ws"), LocatorOptions::default()).unwrap();
        let import_path = locator
            .path_to_import(Path::new("/ws/internal/util"))
            .unwrap();
        assert_eq!(import_path, "example.com/app/internal/util");
    }

    #[test]
    fn missing_descriptor_is_fatal_without_resolver_mode() {
        let fs = fs_with(&[("/ws/main.go", "package main")]);
        let err = Locator::discover(fs, Path::new("/ws"), LocatorOptions::default()).unwrap_err();
        assert!(matches!(err, ScanError::LocatorNotFound { .. }));
    }
}
