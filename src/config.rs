//! Ambient configuration (SPEC_FULL.md §3.4): `.goscope/config.toml` at
//! the project root, loaded the way the teacher's `LoctreeConfig::load`
//! does — tolerant of a missing or invalid file, logging a warning and
//! falling back to defaults rather than failing the whole run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::fs::FileSystem;

const CONFIG_DIR: &str = ".goscope";
const CONFIG_FILE: &str = "config.toml";
const DEFAULT_CACHE_FILE: &str = "symbols.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoScopeConfig {
    pub max_steps: u64,
    pub max_call_stack_depth: usize,
    pub module_resolver: bool,
    pub scan_allow_prefixes: Vec<String>,
    pub scan_deny_prefixes: Vec<String>,
    pub include_tests: bool,
    pub annotation_markers: Vec<String>,
    pub symbol_cache_path: PathBuf,
}

impl Default for GoScopeConfig {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            max_call_stack_depth: 256,
            module_resolver: false,
            scan_allow_prefixes: Vec::new(),
            scan_deny_prefixes: Vec::new(),
            include_tests: false,
            annotation_markers: Vec::new(),
            symbol_cache_path: PathBuf::from(CONFIG_DIR).join(DEFAULT_CACHE_FILE),
        }
    }
}

impl GoScopeConfig {
    /// Looks for `<project_root>/.goscope/config.toml`. Any failure to
    /// read or parse it is non-fatal: logs a `tracing::warn!` and returns
    /// `GoScopeConfig::default()`.
    pub fn load(fs: &dyn FileSystem, project_root: &Path) -> Self {
        let path = project_root.join(CONFIG_DIR).join(CONFIG_FILE);
        match fs.read_file(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "invalid goscope config, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn absolute_symbol_cache_path(&self, project_root: &Path) -> PathBuf {
        if self.symbol_cache_path.is_absolute() {
            self.symbol_cache_path.clone()
        } else {
            project_root.join(&self.symbol_cache_path)
        }
    }

    /// Where to keep the symbol cache when `project_root` isn't writable
    /// (a read-only checkout, CI workspace, etc): `$XDG_CACHE_HOME/goscope`
    /// or its platform equivalent, keyed by a hash of the project root so
    /// distinct projects don't collide.
    pub fn fallback_global_cache_path(&self, project_root: &Path) -> Option<PathBuf> {
        let base = dirs::cache_dir()?.join("goscope");
        let key = crate::symcache::fnv1a_hex(project_root.to_string_lossy().as_bytes());
        Some(base.join(key).join(DEFAULT_CACHE_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::OverlayFileSystem;

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let fs = OverlayFileSystem::new();
        let config = GoScopeConfig::load(&fs, Path::new("/ws"));
        assert_eq!(config.max_steps, 1_000_000);
        assert!(!config.module_resolver);
    }

    #[test]
    fn loads_overrides_from_toml() {
        let fs = OverlayFileSystem::new().with_file(
            "/ws/.goscope/config.toml",
            "max_steps = 5000\nmodule_resolver = true\ninclude_tests = true\n",
        );
        let config = GoScopeConfig::load(&fs, Path::new("/ws"));
        assert_eq!(config.max_steps, 5000);
        assert!(config.module_resolver);
        assert!(config.include_tests);
    }

    #[test]
    fn invalid_toml_falls_back_to_defaults_instead_of_panicking() {
        let fs = OverlayFileSystem::new().with_file("/ws/.goscope/config.toml", "not valid [[[");
        let config = GoScopeConfig::load(&fs, Path::new("/ws"));
        assert_eq!(config.max_steps, 1_000_000);
    }

    #[test]
    fn resolves_relative_symbol_cache_path_against_project_root() {
        let config = GoScopeConfig::default();
        let abs = config.absolute_symbol_cache_path(Path::new("/ws"));
        assert_eq!(abs, Path::new("/ws/.goscope/symbols.json"));
    }

    #[test]
    fn fallback_global_cache_path_is_keyed_by_project_root() {
        let config = GoScopeConfig::default();
        let a = config.fallback_global_cache_path(Path::new("/ws/one"));
        let b = config.fallback_global_cache_path(Path::new("/ws/two"));
        if let (Some(a), Some(b)) = (a, b) {
            assert_ne!(a, b);
            assert!(a.ends_with("symbols.json"));
        }
    }
}
