//! Module descriptor parsing (spec §6.3): the per-module manifest
//! declaring module path, `require`, and `replace` directives.
//!
//! Parsed just enough for the locator: a single `module` line, `require`
//! entries (single-line or block), and `replace` entries (single-line or
//! block, local vs. versioned). Comments and blank lines are ignored.

/// A `require <path> <version>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Require {
    pub path: String,
    pub version: String,
}

/// A `replace <old>[ <old-version>] => <new>[ <new-version>]` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replace {
    pub old_path: String,
    pub old_version: Option<String>,
    pub new_path: String,
    pub new_version: Option<String>,
}

impl Replace {
    /// A local replacement points at a filesystem path: `./...`, `../...`,
    /// or an absolute root. Local replacements may not carry a version.
    pub fn is_local(&self) -> bool {
        self.new_path.starts_with("./")
            || self.new_path.starts_with("../")
            || self.new_path.starts_with('/')
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModuleDescriptor {
    pub module_path: String,
    pub requires: Vec<Require>,
    pub replaces: Vec<Replace>,
}

/// Parse error: a non-local replace directive is missing its version, or
/// the descriptor has no `module` line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleParseError {
    #[error("missing `module` directive")]
    MissingModulePath,
    #[error("replace directive for `{old_path}` targets a module path but has no version")]
    ReplaceMissingVersion { old_path: String },
}

pub fn parse_module_descriptor(content: &str) -> Result<ModuleDescriptor, ModuleParseError> {
    let mut module_path = None;
    let mut requires = Vec::new();
    let mut replaces = Vec::new();

    let mut lines = content.lines().peekable();
    while let Some(raw_line) = lines.next() {
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("module ") {
            module_path = Some(rest.trim().trim_matches('"').to_string());
            continue;
        }

        if line == "require (" || line == "require(" {
            while let Some(next_raw) = lines.peek() {
                let next = strip_comment(next_raw).trim();
                if next == ")" {
                    lines.next();
                    break;
                }
                if let Some(req) = parse_require_fields(next) {
                    requires.push(req);
                }
                lines.next();
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("require ") {
            if let Some(req) = parse_require_fields(rest.trim()) {
                requires.push(req);
            }
            continue;
        }

        if line == "replace (" || line == "replace(" {
            while let Some(next_raw) = lines.peek() {
                let next = strip_comment(next_raw).trim();
                if next == ")" {
                    lines.next();
                    break;
                }
                if !next.is_empty() {
                    replaces.push(parse_replace_fields(next)?);
                }
                lines.next();
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("replace ") {
            replaces.push(parse_replace_fields(rest.trim())?);
            continue;
        }
    }

    Ok(ModuleDescriptor {
        module_path: module_path.ok_or(ModuleParseError::MissingModulePath)?,
        requires,
        replaces,
    })
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn parse_require_fields(segment: &str) -> Option<Require> {
    let mut parts = segment.split_whitespace();
    let path = parts.next()?.to_string();
    let version = parts.next()?.to_string();
    Some(Require { path, version })
}

fn parse_replace_fields(segment: &str) -> Result<Replace, ModuleParseError> {
    let (lhs, rhs) = segment
        .split_once("=>")
        .map(|(a, b)| (a.trim(), b.trim()))
        .unwrap_or((segment.trim(), ""));

    let mut lhs_parts = lhs.split_whitespace();
    let old_path = lhs_parts.next().unwrap_or_default().to_string();
    let old_version = lhs_parts.next().map(str::to_string);

    let mut rhs_parts = rhs.split_whitespace();
    let new_path = rhs_parts.next().unwrap_or_default().to_string();
    let new_version = rhs_parts.next().map(str::to_string);

    let replace = Replace {
        old_path,
        old_version,
        new_path,
        new_version,
    };

    if !replace.is_local() && replace.new_version.is_none() {
        return Err(ModuleParseError::ReplaceMissingVersion {
            old_path: replace.old_path,
        });
    }

    Ok(replace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_module_path_and_single_line_require() {
        let src = "module example.com/app\n\nrequire example.com/lib v1.2.3\n";
        let descriptor = parse_module_descriptor(src).unwrap();
        assert_eq!(descriptor.module_path, "example.com/app");
        assert_eq!(descriptor.requires.len(), 1);
        assert_eq!(descriptor.requires[0].path, "example.com/lib");
        assert_eq!(descriptor.requires[0].version, "v1.2.3");
    }

    #[test]
    fn parses_require_block_and_comments() {
        let src = r#"
module example.com/app

require (
    example.com/lib v1.2.3 // indirect
    example.com/other v0.1.0
)
"#;
        let descriptor = parse_module_descriptor(src).unwrap();
        assert_eq!(descriptor.requires.len(), 2);
        assert_eq!(descriptor.requires[1].path, "example.com/other");
    }

    #[test]
    fn parses_local_and_versioned_replace() {
        let src = r#"
module example.com/app

replace example.com/lib => ../lib
replace example.com/other => example.com/fork v1.0.0
"#;
        let descriptor = parse_module_descriptor(src).unwrap();
        assert_eq!(descriptor.replaces.len(), 2);
        assert!(descriptor.replaces[0].is_local());
        assert!(!descriptor.replaces[1].is_local());
        assert_eq!(descriptor.replaces[1].new_version.as_deref(), Some("v1.0.0"));
    }

    #[test]
    fn rejects_non_local_replace_without_version() {
        let src = "module example.com/app\n\nreplace example.com/lib => example.com/fork\n";
        let err = parse_module_descriptor(src).unwrap_err();
        assert_eq!(
            err,
            ModuleParseError::ReplaceMissingVersion {
                old_path: "example.com/lib".to_string()
            }
        );
    }

    #[test]
    fn missing_module_directive_is_an_error() {
        let err = parse_module_descriptor("require example.com/lib v1.0.0\n").unwrap_err();
        assert_eq!(err, ModuleParseError::MissingModulePath);
    }
}
