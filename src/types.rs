//! Declaration-level data model (spec §3): `PackageInfo`, `TypeInfo`,
//! `FieldType`, `FunctionInfo`, `ConstantInfo`, `VariableInfo`.
//!
//! Identity stability (spec §3.5) is modeled with [`OnceLock`] for
//! write-once fields (`FieldType::definition`) and by having the
//! package cache (C4) be the single owner that hands out `Arc` clones of
//! each descriptor, so pointer-equality-by-`Arc::ptr_eq` holds across
//! repeated lookups.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

/// Stable identity for a declaration node: the file it came from plus its
/// byte offset in that file's source text. Tree-sitter node ids are only
/// stable for the lifetime of one parsed `Tree`; a `PackageInfo` keeps its
/// tree alive for its whole lifecycle (spec §3.6), so this doubles as a
/// pointer-identity surrogate for interning (C4).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub file: PathBuf,
    pub start_byte: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Struct,
    Interface,
    Alias,
    FuncType,
    Builtin,
}

/// A resolved, named type declaration.
#[derive(Debug)]
pub struct TypeInfo {
    pub name: String,
    pub pkg_path: String,
    pub kind: TypeKind,
    pub struct_fields: Vec<FieldInfo>,
    pub interface_methods: Vec<FunctionInfo>,
    /// For aliases and func-types: the underlying type reference.
    pub underlying: Option<FieldType>,
    pub type_params: Vec<String>,
    pub node: Option<NodeId>,
    pub doc: String,
    /// Methods declared with a receiver of this type, appended by the
    /// scanner as it walks the rest of the package (spec §4.2).
    pub methods: std::sync::Mutex<Vec<Arc<FunctionInfo>>>,
}

impl TypeInfo {
    pub fn builtin(name: &str) -> Arc<TypeInfo> {
        Arc::new(TypeInfo {
            name: name.to_string(),
            pkg_path: String::new(),
            kind: TypeKind::Builtin,
            struct_fields: Vec::new(),
            interface_methods: Vec::new(),
            underlying: None,
            type_params: Vec::new(),
            node: None,
            doc: String::new(),
            methods: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn full_name(&self) -> String {
        if self.pkg_path.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.pkg_path, self.name)
        }
    }

    pub fn add_method(&self, method: Arc<FunctionInfo>) {
        self.methods.lock().unwrap().push(method);
    }

    /// Looks up a method by name. For an interface, this searches
    /// `interface_methods` (the method set the interface declares) since
    /// `methods` only ever holds concrete receiver declarations.
    pub fn method(&self, name: &str) -> Option<Arc<FunctionInfo>> {
        if let Some(method) = self.methods.lock().unwrap().iter().find(|m| m.name == name).cloned() {
            return Some(method);
        }
        if self.kind == TypeKind::Interface {
            return self
                .interface_methods
                .iter()
                .find(|m| m.name == name)
                .cloned()
                .map(Arc::new);
        }
        None
    }

    pub fn all_methods(&self) -> Vec<Arc<FunctionInfo>> {
        let mut out: Vec<Arc<FunctionInfo>> = self.methods.lock().unwrap().clone();
        if self.kind == TypeKind::Interface {
            out.extend(self.interface_methods.iter().cloned().map(Arc::new));
        }
        out
    }
}

/// A syntactic reference to a type as it appears at a use site. `Resolve`
/// fills `definition` exactly once (spec §3.5, §4.4).
#[derive(Debug, Clone)]
pub struct FieldType {
    pub name: String,
    pub pkg_name: Option<String>,
    pub full_import_path: Option<String>,
    pub is_pointer: bool,
    pub is_slice: bool,
    pub is_array: bool,
    pub is_map: bool,
    pub is_builtin: bool,
    pub is_variadic: bool,
    pub is_resolved_by_config: bool,
    pub elem: Option<Box<FieldType>>,
    pub map_key: Option<Box<FieldType>>,
    definition: Arc<OnceLock<Arc<TypeInfo>>>,
}

impl FieldType {
    pub fn named(name: impl Into<String>, pkg_name: Option<String>) -> Self {
        Self {
            name: name.into(),
            pkg_name,
            full_import_path: None,
            is_pointer: false,
            is_slice: false,
            is_array: false,
            is_map: false,
            is_builtin: false,
            is_variadic: false,
            is_resolved_by_config: false,
            elem: None,
            map_key: None,
            definition: Arc::new(OnceLock::new()),
        }
    }

    pub fn builtin(name: impl Into<String>) -> Self {
        let mut ft = Self::named(name, None);
        ft.is_builtin = true;
        ft
    }

    /// Carries `elem`'s `pkg_name`/`full_import_path` onto the composed
    /// type so `resolve` targets the element's package, not the field's
    /// declaring package, when resolving `*pkg.T`.
    pub fn pointer_to(elem: FieldType) -> Self {
        let mut ft = FieldType::named(elem.name.clone(), elem.pkg_name.clone());
        ft.full_import_path = elem.full_import_path.clone();
        ft.is_pointer = true;
        ft.elem = Some(Box::new(elem));
        ft
    }

    pub fn slice_of(elem: FieldType) -> Self {
        let mut ft = FieldType::named(format!("[]{}", elem.name), elem.pkg_name.clone());
        ft.full_import_path = elem.full_import_path.clone();
        ft.is_slice = true;
        ft.elem = Some(Box::new(elem));
        ft
    }

    pub fn map_of(key: FieldType, value: FieldType) -> Self {
        let mut ft = FieldType::named(format!("map[{}]{}", key.name, value.name), value.pkg_name.clone());
        ft.full_import_path = value.full_import_path.clone();
        ft.is_map = true;
        ft.map_key = Some(Box::new(key));
        ft.elem = Some(Box::new(value));
        ft
    }

    pub fn definition(&self) -> Option<Arc<TypeInfo>> {
        self.definition.get().cloned()
    }

    /// Fills `definition` exactly once; subsequent calls are no-ops so
    /// pointer identity is preserved across repeated `Resolve` calls.
    pub fn set_definition(&self, type_info: Arc<TypeInfo>) {
        let _ = self.definition.set(type_info);
    }

    pub fn qualified_name(&self) -> String {
        match &self.full_import_path {
            Some(path) => format!("{path}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub field_type: FieldType,
    pub embedded: bool,
    pub tag: Option<String>,
}

/// A function or method declaration. `id` is stable across rescans of the
/// same package (`<PackageInfo.id>:<byte offset>`).
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub id: String,
    pub name: String,
    pub pkg_path: String,
    pub receiver: Option<FieldInfo>,
    pub parameters: Vec<FieldInfo>,
    pub results: Vec<FieldInfo>,
    pub type_params: Vec<String>,
    pub doc: String,
    pub node: Option<NodeId>,
    pub is_variadic: bool,
}

impl FunctionInfo {
    pub fn is_exported(&self) -> bool {
        self.name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
    }

    pub fn full_name(&self) -> String {
        match &self.receiver {
            Some(recv) => format!("{}.({}).{}", self.pkg_path, recv.field_type.name, self.name),
            None => format!("{}.{}", self.pkg_path, self.name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConstantInfo {
    pub name: String,
    pub pkg_path: String,
    pub type_hint: Option<FieldType>,
    pub value: String,
}

/// A package-level variable. `initializer` is kept live for lazy
/// evaluation (spec §3.2, §4.7.3); `evaluated`/`cached_value` record the
/// one-time transition described in spec §3.5.
#[derive(Debug)]
pub struct VariableInfo {
    pub name: String,
    pub pkg_path: String,
    pub type_hint: Option<FieldType>,
    pub initializer_source: Option<String>,
    pub initializer_node: Option<NodeId>,
    pub evaluated: std::sync::atomic::AtomicBool,
}

impl VariableInfo {
    pub fn mark_evaluated(&self) {
        self.evaluated
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_evaluated(&self) -> bool {
        self.evaluated.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// A raw doc-comment annotation, e.g. `@derivingconvert(Foo)`. Parsed only
/// enough to preserve the raw text and split arguments (spec §4.2); deeper
/// semantics are a collaborator's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub marker: String,
    pub raw: String,
    pub args: Vec<String>,
}

/// One parsed Go package (spec §3.1). `id` is the canonical import path
/// for ordinary packages, or `"<import-path>.main"` for entry points.
#[derive(Debug)]
pub struct PackageInfo {
    pub id: String,
    pub name: String,
    pub import_path: String,
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
    pub types: Vec<Arc<TypeInfo>>,
    pub functions: Vec<Arc<FunctionInfo>>,
    pub constants: Vec<Arc<ConstantInfo>>,
    pub variables: Vec<Arc<VariableInfo>>,
    pub annotations: Vec<Annotation>,
    /// Keeps every file's parsed tree alive for the package's lifetime, so
    /// `NodeId`s derived from it stay meaningful for re-walks by the
    /// evaluator (spec §3.6).
    pub(crate) trees: Vec<(PathBuf, String, tree_sitter::Tree)>,
}

impl PackageInfo {
    pub fn find_type(&self, name: &str) -> Option<Arc<TypeInfo>> {
        self.types.iter().find(|t| t.name == name).cloned()
    }

    pub fn find_function(&self, name: &str) -> Option<Arc<FunctionInfo>> {
        self.functions
            .iter()
            .find(|f| f.name == name && f.receiver.is_none())
            .cloned()
    }

    pub fn find_variable(&self, name: &str) -> Option<Arc<VariableInfo>> {
        self.variables.iter().find(|v| v.name == name).cloned()
    }

    pub fn find_constant(&self, name: &str) -> Option<Arc<ConstantInfo>> {
        self.constants.iter().find(|c| c.name == name).cloned()
    }

    pub fn source_for(&self, path: &PathBuf) -> Option<&str> {
        self.trees
            .iter()
            .find(|(p, _, _)| p == path)
            .map(|(_, src, _)| src.as_str())
    }
}

/// Lightweight shadow of [`PackageInfo`] used by the Module Walker (C6):
/// just enough to build an import graph without paying for full scans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageImports {
    pub import_path: String,
    pub name: String,
    pub dir: PathBuf,
    pub imports: Vec<String>,
}
