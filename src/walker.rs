//! Module Walker (C6): discovers packages under a pattern and builds
//! lightweight [`PackageImports`] records — just enough to derive an
//! import graph without paying for a full [`crate::scanner::Scanner`]
//! pass over every declaration (spec §4.3, §6.2).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tree_sitter::Parser;

use crate::error::{ScanError, ScanResult};
use crate::fs::FileSystem;
use crate::locator::Locator;
use crate::types::PackageImports;

const SKIPPED_DIR_NAMES: &[&str] = &["testdata"];

fn should_skip_dir(name: &str) -> bool {
    SKIPPED_DIR_NAMES.contains(&name) || name.starts_with('.') || name.starts_with('_')
}

pub struct ModuleWalker {
    fs: Arc<dyn FileSystem>,
    locator: Arc<Locator>,
}

impl ModuleWalker {
    pub fn new(fs: Arc<dyn FileSystem>, locator: Arc<Locator>) -> Self {
        Self { fs, locator }
    }

    /// Resolves `pattern` to a set of package directories and scans each
    /// one's imports. Supported forms: `./...` (whole module, recursive),
    /// `<dir>/...` (recursive under a directory), a bare directory path,
    /// or an exact import path.
    pub fn walk(&self, pattern: &str) -> ScanResult<Vec<PackageImports>> {
        let dirs = self.resolve_pattern(pattern)?;
        let mut out = Vec::new();
        for dir in dirs {
            let import_path = self.locator.path_to_import(&dir)?;
            out.push(self.scan_imports(&dir, &import_path)?);
        }
        Ok(out)
    }

    fn resolve_pattern(&self, pattern: &str) -> ScanResult<Vec<PathBuf>> {
        if pattern == "./..." {
            return Ok(self.collect_package_dirs(self.locator.root_dir()));
        }
        if let Some(prefix) = pattern.strip_suffix("/...") {
            let dir = self.dir_for(prefix)?;
            return Ok(self.collect_package_dirs(&dir));
        }
        Ok(vec![self.dir_for(pattern)?])
    }

    fn dir_for(&self, spec: &str) -> ScanResult<PathBuf> {
        if let Some(rest) = spec.strip_prefix("./") {
            return Ok(self.locator.root_dir().join(rest));
        }
        if spec == "." {
            return Ok(self.locator.root_dir().to_path_buf());
        }
        self.locator.find_package_dir(spec)
    }

    /// Recursively finds every directory under `root` that contains at
    /// least one `.go` file, skipping `testdata` and dot-/underscore-
    /// prefixed directories.
    fn collect_package_dirs(&self, root: &Path) -> Vec<PathBuf> {
        let mut dirs: HashSet<PathBuf> = HashSet::new();
        let _ = self.fs.walk_dir(root, &should_skip_dir, &mut |file| {
            if file.extension().is_some_and(|ext| ext == "go") {
                if let Some(parent) = file.parent() {
                    dirs.insert(parent.to_path_buf());
                }
            }
        });
        let mut dirs: Vec<PathBuf> = dirs.into_iter().collect();
        dirs.sort();
        dirs
    }

    /// Parses only the import declarations of each `.go` file in `dir`.
    fn scan_imports(&self, dir: &Path, import_path: &str) -> ScanResult<PackageImports> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .expect("tree-sitter-go grammar is ABI-compatible with this tree-sitter version");

        let mut name = import_path.rsplit('/').next().unwrap_or(import_path).to_string();
        let mut imports = HashSet::new();

        let entries = self.fs.read_dir(dir).map_err(|source| ScanError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut files: Vec<PathBuf> = entries
            .into_iter()
            .filter(|e| !e.is_dir && e.path.extension().is_some_and(|ext| ext == "go"))
            .filter(|e| {
                !e.path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default()
                    .ends_with("_test.go")
            })
            .map(|e| e.path)
            .collect();
        files.sort();

        for file in files {
            let source = self.fs.read_file(&file).map_err(|source| ScanError::Io {
                path: file.clone(),
                source,
            })?;

            // Fast pre-filter: a file with no `import` token can't
            // contribute any edges, so skip the parse entirely. Cheap and
            // correct since Go's grammar always spells imports literally.
            if !source.contains("import") {
                continue;
            }

            let tree = parser.parse(&source, None).ok_or_else(|| ScanError::Parse {
                path: file.clone(),
                message: "tree-sitter returned no tree".to_string(),
            })?;
            let root = tree.root_node();

            let mut cursor = root.walk();
            for child in root.children(&mut cursor) {
                match child.kind() {
                    "package_clause" => {
                        let mut inner = child.walk();
                        if let Some(ident) = child
                            .children(&mut inner)
                            .find(|c| c.kind() == "package_identifier")
                        {
                            if let Ok(text) = ident.utf8_text(source.as_bytes()) {
                                name = text.to_string();
                            }
                        }
                    }
                    "import_declaration" => {
                        collect_import_paths(child, &source, &mut imports);
                    }
                    _ => {}
                }
            }
        }

        let mut imports: Vec<String> = imports.into_iter().collect();
        imports.sort();

        Ok(PackageImports {
            import_path: import_path.to_string(),
            name,
            dir: dir.to_path_buf(),
            imports,
        })
    }

    /// `import_path -> [import paths of packages that import it]`.
    pub fn build_reverse_dependency_map(
        packages: &[PackageImports],
    ) -> HashMap<String, Vec<String>> {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for pkg in packages {
            for dep in &pkg.imports {
                map.entry(dep.clone()).or_default().push(pkg.import_path.clone());
            }
        }
        for importers in map.values_mut() {
            importers.sort();
            importers.dedup();
        }
        map
    }

    pub fn find_importers(packages: &[PackageImports], target: &str) -> Vec<String> {
        Self::build_reverse_dependency_map(packages)
            .remove(target)
            .unwrap_or_default()
    }
}

fn collect_import_paths(node: tree_sitter::Node, source: &str, out: &mut HashSet<String>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import_spec" => {
                if let Some(path) = import_spec_path(child, source) {
                    out.insert(path);
                }
            }
            "import_spec_list" => {
                let mut inner = child.walk();
                for spec in child.children(&mut inner) {
                    if spec.kind() == "import_spec" {
                        if let Some(path) = import_spec_path(spec, source) {
                            out.insert(path);
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

fn import_spec_path(spec: tree_sitter::Node, source: &str) -> Option<String> {
    let mut cursor = spec.walk();
    for part in spec.children(&mut cursor) {
        if matches!(part.kind(), "interpreted_string_literal" | "raw_string_literal") {
            let raw = part.utf8_text(source.as_bytes()).ok()?;
            return Some(raw.trim_matches(|c| c == '"' || c == '`').to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::OverlayFileSystem;
    use crate::locator::LocatorOptions;

    fn walker(files: &[(&str, &str)]) -> ModuleWalker {
        let mut overlay = OverlayFileSystem::new();
        for (path, contents) in files {
            overlay = overlay.with_file(*path, *contents);
        }
        let fs: Arc<dyn FileSystem> = Arc::new(overlay);
        let locator = Arc::new(
            Locator::discover(fs.clone(), Path::new("/ws"), LocatorOptions::default()).unwrap(),
        );
        ModuleWalker::new(fs, locator)
    }

    #[test]
    fn walks_whole_module_recursively_skipping_testdata() {
        let walker = walker(&[
            ("/ws/go.mod", "module example.com/app\n"),
            ("/ws/main.go", "package main\n"),
            ("/ws/util/util.go", "package util\n"),
            ("/ws/util/testdata/fixture.go", "package testdata\n"),
        ]);
        let packages = walker.walk("./...").unwrap();
        let import_paths: HashSet<_> = packages.iter().map(|p| p.import_path.clone()).collect();
        assert!(import_paths.contains("example.com/app"));
        assert!(import_paths.contains("example.com/app/util"));
        assert!(!import_paths.iter().any(|p| p.contains("testdata")));
    }

    #[test]
    fn scans_import_edges_for_a_single_directory() {
        let walker = walker(&[
            ("/ws/go.mod", "module example.com/app\n"),
            (
                "/ws/main.go",
                "package main\n\nimport (\n    \"fmt\"\n    \"example.com/app/util\"\n)\n",
            ),
            ("/ws/util/util.go", "package util\n"),
        ]);
        let packages = walker.walk(".").unwrap();
        assert_eq!(packages.len(), 1);
        assert!(packages[0].imports.contains(&"fmt".to_string()));
        assert!(packages[0]
            .imports
            .contains(&"example.com/app/util".to_string()));
    }

    #[test]
    fn builds_reverse_dependency_map_and_finds_importers() {
        let packages = vec![
            PackageImports {
                import_path: "example.com/app".to_string(),
                name: "main".to_string(),
                dir: PathBuf::from("/ws"),
                imports: vec!["example.com/app/util".to_string()],
            },
            PackageImports {
                import_path: "example.com/app/cmd".to_string(),
                name: "cmd".to_string(),
                dir: PathBuf::from("/ws/cmd"),
                imports: vec!["example.com/app/util".to_string()],
            },
            PackageImports {
                import_path: "example.com/app/util".to_string(),
                name: "util".to_string(),
                dir: PathBuf::from("/ws/util"),
                imports: vec![],
            },
        ];
        let importers = ModuleWalker::find_importers(&packages, "example.com/app/util");
        assert_eq!(
            importers,
            vec!["example.com/app".to_string(), "example.com/app/cmd".to_string()]
        );
    }
}
