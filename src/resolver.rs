//! Type Resolver (C5): turns a [`FieldType`] reference into the
//! [`TypeInfo`] it names, scanning the defining package on demand and
//! caching the result on the `FieldType` itself (spec §4.4).
//!
//! Builtins and already-resolved references short-circuit immediately.
//! Config-driven overrides win over a scannable package with the same
//! qualified name (spec §9, open question 3: "external override wins").
//! An `in_progress` set breaks reentrant resolution; the one place this
//! codebase can actually recurse is alias-chain following (`type A = B;
//! type B = A`), since scanning itself never calls back into the resolver.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::cache::PackageCache;
use crate::error::{ScanError, ScanResult};
use crate::locator::Locator;
use crate::types::{FieldType, TypeInfo, TypeKind};

pub struct Resolver {
    cache: Arc<PackageCache>,
    locator: Arc<Locator>,
    overrides: HashMap<String, Arc<TypeInfo>>,
    in_progress: Mutex<HashSet<String>>,
    builtins: Mutex<HashMap<String, Arc<TypeInfo>>>,
}

impl Resolver {
    pub fn new(cache: Arc<PackageCache>, locator: Arc<Locator>) -> Self {
        Self {
            cache,
            locator,
            overrides: HashMap::new(),
            in_progress: Mutex::new(HashSet::new()),
            builtins: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a type that should resolve `qualified_name` references
    /// without ever consulting the locator or scanner (spec §6.4,
    /// `WithExtraPackages`-style escape hatch).
    pub fn register_override(&mut self, qualified_name: impl Into<String>, type_info: Arc<TypeInfo>) {
        self.overrides.insert(qualified_name.into(), type_info);
    }

    pub fn resolve(&self, field_type: &FieldType, from_pkg_path: &str) -> ScanResult<Arc<TypeInfo>> {
        if field_type.is_builtin {
            let resolved = self.builtin(&field_type.name);
            field_type.set_definition(resolved.clone());
            return Ok(resolved);
        }
        if let Some(def) = field_type.definition() {
            return Ok(def);
        }

        let qualified = field_type.qualified_name();
        if let Some(over) = self.overrides.get(&qualified) {
            field_type.set_definition(over.clone());
            return Ok(over.clone());
        }

        let target_pkg_path = field_type
            .full_import_path
            .clone()
            .unwrap_or_else(|| from_pkg_path.to_string());

        {
            let mut in_progress = self.in_progress.lock().unwrap();
            if !in_progress.insert(qualified.clone()) {
                // Reentrant resolution of the same qualified name: hand
                // back an unpublished placeholder rather than deadlocking
                // or recursing forever. The caller further up the stack
                // still owns the real scan and will publish it via
                // `set_definition` on its own `FieldType` instance.
                return Ok(TypeInfo::builtin(&field_type.name));
            }
        }
        let result = self.resolve_uncached(&field_type.name, &target_pkg_path);
        self.in_progress.lock().unwrap().remove(&qualified);

        if let Ok(type_info) = &result {
            field_type.set_definition(type_info.clone());
        }
        result
    }

    /// Resolves `field_type`, then follows `underlying` alias chains
    /// (`type A = B`) until hitting a non-alias kind or a cycle, in which
    /// case the chain stops on whatever member it last saw.
    pub fn resolve_concrete_kind(
        &self,
        field_type: &FieldType,
        from_pkg_path: &str,
    ) -> ScanResult<Arc<TypeInfo>> {
        let mut current = self.resolve(field_type, from_pkg_path)?;
        let mut seen = HashSet::new();
        while current.kind == TypeKind::Alias {
            if !seen.insert(current.full_name()) {
                break;
            }
            let Some(underlying) = &current.underlying else {
                break;
            };
            let next_pkg = current.pkg_path.clone();
            current = self.resolve(underlying, &next_pkg)?;
        }
        Ok(current)
    }

    fn resolve_uncached(&self, name: &str, target_pkg_path: &str) -> ScanResult<Arc<TypeInfo>> {
        let pkg = self.cache.get_or_scan(&self.locator, target_pkg_path)?;
        pkg.find_type(name).ok_or_else(|| ScanError::SymbolNotFound {
            pkg_path: target_pkg_path.to_string(),
            name: name.to_string(),
        })
    }

    fn builtin(&self, name: &str) -> Arc<TypeInfo> {
        let mut builtins = self.builtins.lock().unwrap();
        builtins
            .entry(name.to_string())
            .or_insert_with(|| TypeInfo::builtin(name))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{FileSystem, OverlayFileSystem};
    use crate::locator::LocatorOptions;
    use crate::scanner::ScanOptions;
    use std::path::Path;

    fn setup(files: &[(&str, &str)]) -> (Arc<PackageCache>, Arc<Locator>) {
        let mut overlay = OverlayFileSystem::new();
        for (path, contents) in files {
            overlay = overlay.with_file(*path, *contents);
        }
        let fs: Arc<dyn FileSystem> = Arc::new(overlay);
        let locator = Arc::new(
            Locator::discover(fs.clone(), Path::new("/ws"), LocatorOptions::default()).unwrap(),
        );
        let cache = Arc::new(PackageCache::new(fs, ScanOptions::default()));
        (cache, locator)
    }

    #[test]
    fn resolves_a_field_type_to_its_type_info_and_caches_identity() {
        let (cache, locator) = setup(&[
            ("/ws/go.mod", "module example.com/app\n"),
            (
                "/ws/util/util.go",
                "package util\n\ntype Thing struct {\n    N int\n}\n",
            ),
        ]);
        let resolver = Resolver::new(cache.clone(), locator.clone());
        let pkg = cache
            .get_or_scan(&locator, "example.com/app/util")
            .unwrap();
        let thing = pkg.find_type("Thing").unwrap();
        let field = &thing.struct_fields[0];
        let resolved = resolver.resolve(&field.field_type, "example.com/app/util");
        // `N int` is builtin; resolving it should not error and should be stable.
        let first = resolved.unwrap();
        let second = resolver
            .resolve(&field.field_type, "example.com/app/util")
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn resolves_a_cross_package_qualified_type() {
        let (cache, locator) = setup(&[
            ("/ws/go.mod", "module example.com/app\n"),
            (
                "/ws/a/a.go",
                "package a\n\ntype Foo struct{}\n",
            ),
            (
                "/ws/b/b.go",
                "package b\n\nimport \"example.com/app/a\"\n\ntype Bar struct {\n    F a.Foo\n}\n",
            ),
        ]);
        let resolver = Resolver::new(cache.clone(), locator.clone());
        let pkg_b = cache.get_or_scan(&locator, "example.com/app/b").unwrap();
        let bar = pkg_b.find_type("Bar").unwrap();
        let field = &bar.struct_fields[0];
        let foo = resolver
            .resolve(&field.field_type, "example.com/app/b")
            .unwrap();
        assert_eq!(foo.name, "Foo");
        assert_eq!(foo.pkg_path, "example.com/app/a");
    }

    #[test]
    fn resolves_a_pointer_to_a_cross_package_type() {
        let (cache, locator) = setup(&[
            ("/ws/go.mod", "module example.com/app\n"),
            ("/ws/a/a.go", "package a\n\nimport \"example.com/app/b\"\n\ntype A struct {\n    B *b.B\n}\n"),
            ("/ws/b/b.go", "package b\n\ntype B struct{}\n"),
        ]);
        let resolver = Resolver::new(cache.clone(), locator.clone());
        let pkg_a = cache.get_or_scan(&locator, "example.com/app/a").unwrap();
        let a = pkg_a.find_type("A").unwrap();
        let field = &a.struct_fields[0];
        assert!(field.field_type.is_pointer);
        let resolved = resolver
            .resolve(&field.field_type, "example.com/app/a")
            .unwrap();
        assert_eq!(resolved.name, "B");
        assert_eq!(resolved.pkg_path, "example.com/app/b");
    }

    #[test]
    fn follows_alias_chain_to_concrete_struct() {
        let (cache, locator) = setup(&[
            ("/ws/go.mod", "module example.com/app\n"),
            (
                "/ws/util/util.go",
                "package util\n\ntype Real struct{}\n\ntype Alias = Real\n",
            ),
        ]);
        let resolver = Resolver::new(cache.clone(), locator.clone());
        let pkg = cache
            .get_or_scan(&locator, "example.com/app/util")
            .unwrap();
        let alias = pkg.find_type("Alias").unwrap();
        let underlying_ref = alias.underlying.clone().unwrap();
        let concrete = resolver
            .resolve_concrete_kind(&underlying_ref, "example.com/app/util")
            .unwrap();
        assert_eq!(concrete.name, "Real");
        assert_eq!(concrete.kind, TypeKind::Struct);
    }
}
