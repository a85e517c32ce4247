//! Scan Policy (C11): a predicate gating whether the evaluator descends
//! into a package's body or treats it as an opaque, call-observed-only
//! boundary (spec §4.9).

use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};

/// `(import_path) -> bool`. Defaults to "always scan."
#[derive(Clone)]
pub struct ScanPolicy(Arc<dyn Fn(&str) -> bool + Send + Sync>);

impl ScanPolicy {
    pub fn new(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn should_scan(&self, import_path: &str) -> bool {
        (self.0)(import_path)
    }

    /// Scans everything except the standard library's import paths, i.e.
    /// anything without a dot before the first `/` (or without a `/` at
    /// all): `fmt`, `os/exec` stay opaque, `example.com/app` does not.
    pub fn skip_stdlib() -> Self {
        Self::new(|import_path| {
            let first_segment = import_path.split('/').next().unwrap_or(import_path);
            first_segment.contains('.')
        })
    }

    /// Only packages under `prefix` (or exactly `prefix`) are scanned.
    pub fn only_under(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self::new(move |import_path| {
            import_path == prefix || import_path.starts_with(&format!("{prefix}/"))
        })
    }

    /// Builds a policy from `config.toml`'s `scan_allow_prefixes`/
    /// `scan_deny_prefixes` lists, matched as glob patterns (`example.com/
    /// app/...` or a plain prefix both work, since a pattern with no glob
    /// metacharacter matches only by exact literal unless `*` is added).
    /// `allow.is_empty()` means "allow everything except what `deny`
    /// excludes."
    pub fn from_globs(allow: &[String], deny: &[String]) -> Result<Self, globset::Error> {
        let allow_set = build_globset(allow)?;
        let deny_set = build_globset(deny)?;
        Ok(Self::new(move |import_path| {
            let allowed = allow_set.is_empty() || allow_set.is_match(import_path);
            allowed && !deny_set.is_match(import_path)
        }))
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            Glob::new(pattern)?
        } else {
            Glob::new(&format!("{pattern}{{,/**}}"))?
        };
        builder.add(glob);
    }
    builder.build()
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self::new(|_| true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scans_everything() {
        let policy = ScanPolicy::default();
        assert!(policy.should_scan("fmt"));
        assert!(policy.should_scan("example.com/app"));
    }

    #[test]
    fn skip_stdlib_treats_dotless_first_segment_as_stdlib() {
        let policy = ScanPolicy::skip_stdlib();
        assert!(!policy.should_scan("fmt"));
        assert!(!policy.should_scan("os/exec"));
        assert!(policy.should_scan("example.com/app/util"));
    }

    #[test]
    fn only_under_restricts_to_a_prefix() {
        let policy = ScanPolicy::only_under("example.com/app");
        assert!(policy.should_scan("example.com/app"));
        assert!(policy.should_scan("example.com/app/util"));
        assert!(!policy.should_scan("example.com/other"));
    }

    #[test]
    fn from_globs_combines_allow_and_deny_lists() {
        let policy = ScanPolicy::from_globs(
            &["example.com/app".to_string()],
            &["example.com/app/internal/*".to_string()],
        )
        .unwrap();
        assert!(policy.should_scan("example.com/app"));
        assert!(policy.should_scan("example.com/app/util"));
        assert!(!policy.should_scan("example.com/app/internal/secret"));
        assert!(!policy.should_scan("example.com/other"));
    }

    #[test]
    fn from_globs_with_no_allow_list_scans_everything_not_denied() {
        let policy = ScanPolicy::from_globs(&[], &["fmt".to_string()]).unwrap();
        assert!(policy.should_scan("example.com/app"));
        assert!(!policy.should_scan("fmt"));
    }
}
