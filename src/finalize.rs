//! Finalizer (C10): after evaluation, reconciles every interface method
//! call the evaluator observed against all concrete types that
//! structurally implement that interface, so methods reached only through
//! an interface value still count as "used" (spec §4.8).
//!
//! Matching is structural: a candidate type implements the interface's
//! method if it has a method of the same name whose parameter and result
//! field types agree in canonical form, regardless of whether the
//! candidate's method set comes from a pointer or value receiver, or is
//! promoted from an embedded field.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::intrinsics::{IntrinsicCall, IntrinsicFunc};
use crate::object::Object;
use crate::resolver::Resolver;
use crate::types::{FieldInfo, FunctionInfo, PackageInfo, TypeInfo, TypeKind};

/// One observed `x.Method(...)` call site where `x`'s static type was an
/// interface (or a value the evaluator could only describe as
/// implementing one), recorded during evaluation (spec §4.7.4).
#[derive(Clone)]
pub struct InterfaceCallObservation {
    pub interface: Arc<TypeInfo>,
    pub method_name: String,
}

/// A reconciled edge: `method_name` as declared on `interface`, matched
/// to a concrete implementation on `implementor`.
#[derive(Clone)]
pub struct MatchedCall {
    pub interface: Arc<TypeInfo>,
    pub method_name: String,
    pub implementor: Arc<TypeInfo>,
}

pub struct Finalizer {
    default_intrinsic: Option<IntrinsicFunc>,
    seen: Mutex<HashSet<(String, String, String)>>,
}

impl Finalizer {
    pub fn new(default_intrinsic: Option<IntrinsicFunc>) -> Self {
        Self {
            default_intrinsic,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Matches every observation against every struct type across
    /// `packages`, invoking the default intrinsic once per
    /// (interface, method, implementor) triple the first time it's seen.
    /// Safe to call repeatedly on a growing observation list: already
    /// reconciled triples are skipped.
    pub fn finalize(
        &self,
        observations: &[InterfaceCallObservation],
        packages: &[Arc<PackageInfo>],
        resolver: &Resolver,
    ) -> Vec<MatchedCall> {
        let mut matches = Vec::new();
        for pkg in packages {
            for candidate in &pkg.types {
                if candidate.kind != TypeKind::Struct {
                    continue;
                }
                let mut methods = Vec::new();
                collect_methods(candidate, resolver, 0, &mut methods);

                for observation in observations {
                    let Some(iface_method) = observation
                        .interface
                        .interface_methods
                        .iter()
                        .find(|m| m.name == observation.method_name)
                    else {
                        continue;
                    };
                    let implemented = methods
                        .iter()
                        .any(|m| m.name == observation.method_name && signatures_match(iface_method, m));
                    if !implemented {
                        continue;
                    }

                    let key = (
                        observation.interface.full_name(),
                        observation.method_name.clone(),
                        candidate.full_name(),
                    );
                    let first_time = self.seen.lock().unwrap().insert(key);
                    if first_time {
                        if let Some(intrinsic) = &self.default_intrinsic {
                            let call = IntrinsicCall {
                                pkg_path: &candidate.pkg_path,
                                func_name: &observation.method_name,
                                args: &[Object::Instance {
                                    type_info: candidate.clone(),
                                    fields: Default::default(),
                                }],
                            };
                            intrinsic(&call);
                        }
                    }
                    matches.push(MatchedCall {
                        interface: observation.interface.clone(),
                        method_name: observation.method_name.clone(),
                        implementor: candidate.clone(),
                    });
                }
            }
        }
        matches
    }
}

/// Gathers `type_info`'s own methods plus methods promoted from embedded
/// fields, bounded to a shallow depth since Go forbids embedding cycles
/// but a malformed or partially-resolved program could still loop.
fn collect_methods(
    type_info: &Arc<TypeInfo>,
    resolver: &Resolver,
    depth: usize,
    out: &mut Vec<Arc<FunctionInfo>>,
) {
    if depth > 8 {
        return;
    }
    out.extend(type_info.all_methods());
    for field in embedded_fields(type_info) {
        if let Ok(embedded) = resolver.resolve_concrete_kind(&field.field_type, &type_info.pkg_path) {
            collect_methods(&embedded, resolver, depth + 1, out);
        }
    }
}

fn embedded_fields(type_info: &Arc<TypeInfo>) -> Vec<&FieldInfo> {
    type_info.struct_fields.iter().filter(|f| f.embedded).collect()
}

fn signatures_match(iface_method: &FunctionInfo, candidate: &FunctionInfo) -> bool {
    canonical_fields(&iface_method.parameters) == canonical_fields(&candidate.parameters)
        && canonical_fields(&iface_method.results) == canonical_fields(&candidate.results)
}

fn canonical_fields(fields: &[FieldInfo]) -> Vec<String> {
    fields
        .iter()
        .map(|f| {
            let ft = &f.field_type;
            format!(
                "{}{}{}{}{}",
                if ft.is_variadic { "..." } else { "" },
                if ft.is_pointer { "*" } else { "" },
                if ft.is_slice { "[]" } else { "" },
                if ft.is_map { "map[]" } else { "" },
                ft.qualified_name()
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::PackageCache;
    use crate::fs::{FileSystem, OverlayFileSystem};
    use crate::locator::{Locator, LocatorOptions};
    use crate::scanner::ScanOptions;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scan(source: &str) -> (Arc<PackageCache>, Arc<Locator>, Arc<PackageInfo>) {
        let fs: Arc<dyn FileSystem> = Arc::new(
            OverlayFileSystem::new()
                .with_file("/ws/go.mod", "module example.com/app\n")
                .with_file("/ws/main.go", source),
        );
        let locator = Arc::new(
            Locator::discover(fs.clone(), Path::new("/ws"), LocatorOptions::default()).unwrap(),
        );
        let cache = Arc::new(PackageCache::new(fs, ScanOptions::default()));
        let pkg = cache.get_or_scan(&locator, "example.com/app").unwrap();
        (cache, locator, pkg)
    }

    #[test]
    fn matches_a_struct_implementing_an_interface_method() {
        let (cache, locator, pkg) = scan(
            r#"
package app

type Greeter interface {
    Greet() string
}

type Person struct{}

func (p *Person) Greet() string { return "hi" }
"#,
        );
        let resolver = Resolver::new(cache, locator);
        let greeter = pkg.find_type("Greeter").unwrap();
        let observations = vec![InterfaceCallObservation {
            interface: greeter.clone(),
            method_name: "Greet".to_string(),
        }];

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let finalizer = Finalizer::new(Some(Arc::new(move |_call: &IntrinsicCall| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
            Object::Nil
        })));

        let matches = finalizer.finalize(&observations, std::slice::from_ref(&pkg), &resolver);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].implementor.name, "Person");
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Idempotent: calling again with the same observations doesn't refire.
        finalizer.finalize(&observations, std::slice::from_ref(&pkg), &resolver);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn non_implementing_struct_is_not_matched() {
        let (cache, locator, pkg) = scan(
            r#"
package app

type Greeter interface {
    Greet() string
}

type Rock struct{}
"#,
        );
        let resolver = Resolver::new(cache, locator);
        let greeter = pkg.find_type("Greeter").unwrap();
        let observations = vec![InterfaceCallObservation {
            interface: greeter,
            method_name: "Greet".to_string(),
        }];
        let finalizer = Finalizer::new(None);
        let matches = finalizer.finalize(&observations, std::slice::from_ref(&pkg), &resolver);
        assert!(matches.is_empty());
    }
}
