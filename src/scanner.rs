//! Low-level Scanner (C3): parses one package's source files into a
//! [`PackageInfo`] using a real Go grammar (`tree-sitter-go`) rather than
//! line-oriented heuristics.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tree_sitter::{Node, Parser, Tree};

use crate::error::{ScanError, ScanResult};
use crate::fs::FileSystem;
use crate::types::{
    Annotation, ConstantInfo, FieldInfo, FieldType, FunctionInfo, NodeId, PackageInfo, TypeInfo,
    TypeKind, VariableInfo,
};

const TEST_SUFFIX: &str = "_test.go";
const DEFAULT_ANNOTATION_MARKERS: &[&str] = &["@derivingconvert", "convert:rule"];

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub include_tests: bool,
    pub annotation_markers: Vec<String>,
}

impl ScanOptions {
    fn markers(&self) -> Vec<&str> {
        if self.annotation_markers.is_empty() {
            DEFAULT_ANNOTATION_MARKERS.to_vec()
        } else {
            self.annotation_markers.iter().map(String::as_str).collect()
        }
    }
}

pub struct Scanner {
    fs: Arc<dyn FileSystem>,
}

impl Scanner {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Parses every `.go` file directly in `dir` (no recursion) into one
    /// [`PackageInfo`]. Test files are excluded unless `options.include_tests`.
    /// A package whose files disagree on the `package` clause is rejected.
    pub fn scan_dir(
        &self,
        dir: &Path,
        import_path: &str,
        id: &str,
        options: &ScanOptions,
    ) -> ScanResult<PackageInfo> {
        let mut go_files: Vec<PathBuf> = Vec::new();
        for entry in self.fs.read_dir(dir).map_err(|source| ScanError::Io {
            path: dir.to_path_buf(),
            source,
        })? {
            if entry.is_dir {
                continue;
            }
            let Some(name) = entry.path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(".go") {
                continue;
            }
            if name.ends_with(TEST_SUFFIX) && !options.include_tests {
                continue;
            }
            go_files.push(entry.path);
        }
        go_files.sort();

        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .expect("tree-sitter-go grammar is ABI-compatible with this tree-sitter version");

        let mut pkg_name: Option<String> = None;
        let mut pkg_name_file: Option<PathBuf> = None;
        let mut types: Vec<Arc<TypeInfo>> = Vec::new();
        let mut functions: Vec<Arc<FunctionInfo>> = Vec::new();
        let mut constants: Vec<Arc<ConstantInfo>> = Vec::new();
        let mut variables: Vec<Arc<VariableInfo>> = Vec::new();
        let mut annotations: Vec<Annotation> = Vec::new();
        let mut trees: Vec<(PathBuf, String, Tree)> = Vec::new();

        for file in &go_files {
            let source = self.fs.read_file(file).map_err(|source| ScanError::Io {
                path: file.clone(),
                source,
            })?;
            let tree = parser.parse(&source, None).ok_or_else(|| ScanError::Parse {
                path: file.clone(),
                message: "tree-sitter returned no tree".to_string(),
            })?;

            let root = tree.root_node();
            let file_pkg_name = package_clause_name(root, source.as_bytes());
            if let Some(name) = file_pkg_name {
                match &pkg_name {
                    None => {
                        pkg_name = Some(name.clone());
                        pkg_name_file = Some(file.clone());
                    }
                    Some(existing) if existing != &name => {
                        return Err(ScanError::MixedPackage {
                            dir: dir.to_path_buf(),
                            first: existing.clone(),
                            second: name,
                        });
                    }
                    _ => {}
                }
            }

            let file_imports = collect_imports(root, source.as_bytes());
            {
            let mut cursor = root.walk();
            for child in root.children(&mut cursor) {
                match child.kind() {
                    "import_declaration" => {}
                    "type_declaration" => {
                        collect_type_decls(
                            child,
                            &source,
                            file,
                            import_path,
                            &file_imports,
                            options,
                            &mut types,
                            &mut annotations,
                        );
                    }
                    "function_declaration" => {
                        if let Some(func) = convert_function(
                            child,
                            &source,
                            file,
                            import_path,
                            &file_imports,
                            None,
                        ) {
                            functions.push(Arc::new(func));
                        }
                    }
                    "method_declaration" => {
                        if let Some((recv_type_name, func)) = convert_method(
                            child,
                            &source,
                            file,
                            import_path,
                            &file_imports,
                        ) {
                            let func = Arc::new(func);
                            functions.push(func.clone());
                            if let Some(owner) = types.iter().find(|t| t.name == recv_type_name) {
                                owner.add_method(func);
                            }
                        }
                    }
                    "const_declaration" => {
                        collect_const_decls(child, &source, import_path, &mut constants);
                    }
                    "var_declaration" => {
                        collect_var_decls(
                            child,
                            &source,
                            file,
                            import_path,
                            &file_imports,
                            &mut variables,
                        );
                    }
                    _ => {}
                }
            }
            }

            trees.push((file.clone(), source, tree));
        }

        let name = pkg_name.unwrap_or_else(|| {
            import_path
                .rsplit('/')
                .next()
                .unwrap_or(import_path)
                .to_string()
        });
        let _ = pkg_name_file;

        Ok(PackageInfo {
            id: id.to_string(),
            name,
            import_path: import_path.to_string(),
            dir: dir.to_path_buf(),
            files: go_files,
            types,
            functions,
            constants,
            variables,
            annotations,
            trees,
        })
    }
}

fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn node_id(file: &Path, node: Node) -> NodeId {
    NodeId {
        file: file.to_path_buf(),
        start_byte: node.start_byte(),
    }
}

fn package_clause_name(root: Node, source: &[u8]) -> Option<String> {
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.kind() == "package_clause" {
            let mut inner = child.walk();
            for sub in child.children(&mut inner) {
                if sub.kind() == "package_identifier" {
                    return sub.utf8_text(source).ok().map(str::to_string);
                }
            }
        }
    }
    None
}

/// Maps a file-local import alias (or the package's own declared name,
/// discovered lazily elsewhere) to its full import path, per spec §4.2's
/// "per-file import lookup."
fn collect_imports(root: Node, source: &[u8]) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.kind() != "import_declaration" {
            continue;
        }
        let mut specs = Vec::new();
        let mut inner = child.walk();
        for sub in child.children(&mut inner) {
            match sub.kind() {
                "import_spec" => specs.push(sub),
                "import_spec_list" => {
                    let mut list_cursor = sub.walk();
                    for spec in sub.children(&mut list_cursor) {
                        if spec.kind() == "import_spec" {
                            specs.push(spec);
                        }
                    }
                }
                _ => {}
            }
        }
        for spec in specs {
            let mut alias: Option<String> = None;
            let mut path: Option<String> = None;
            let mut spec_cursor = spec.walk();
            for part in spec.children(&mut spec_cursor) {
                match part.kind() {
                    "package_identifier" | "dot" | "blank_identifier" => {
                        alias = part.utf8_text(source).ok().map(str::to_string);
                    }
                    "interpreted_string_literal" | "raw_string_literal" => {
                        let raw = part.utf8_text(source).unwrap_or("");
                        path = Some(raw.trim_matches(|c| c == '"' || c == '`').to_string());
                    }
                    _ => {}
                }
            }
            if let Some(path) = path {
                let default_alias = path.rsplit('/').next().unwrap_or(&path).to_string();
                map.insert(alias.unwrap_or(default_alias), path);
            }
        }
    }
    map
}

/// Recursively converts a Go type expression node into a [`FieldType`]
/// (spec §4.2's field-type conversion algorithm).
fn convert_type_expr(node: Node, source: &str, imports: &HashMap<String, String>) -> FieldType {
    match node.kind() {
        "pointer_type" => {
            let elem = node
                .child_by_field_name("type")
                .or_else(|| named_child_skip_punct(node))
                .map(|n| convert_type_expr(n, source, imports))
                .unwrap_or_else(|| FieldType::named("unknown", None));
            FieldType::pointer_to(elem)
        }
        "slice_type" => {
            let elem = node
                .child_by_field_name("element")
                .map(|n| convert_type_expr(n, source, imports))
                .unwrap_or_else(|| FieldType::named("unknown", None));
            FieldType::slice_of(elem)
        }
        "array_type" => {
            let elem = node
                .child_by_field_name("element")
                .map(|n| convert_type_expr(n, source, imports))
                .unwrap_or_else(|| FieldType::named("unknown", None));
            let mut ft = FieldType::slice_of(elem);
            ft.is_slice = false;
            ft.is_array = true;
            ft
        }
        "map_type" => {
            let key = node
                .child_by_field_name("key")
                .map(|n| convert_type_expr(n, source, imports))
                .unwrap_or_else(|| FieldType::named("unknown", None));
            let value = node
                .child_by_field_name("value")
                .map(|n| convert_type_expr(n, source, imports))
                .unwrap_or_else(|| FieldType::named("unknown", None));
            FieldType::map_of(key, value)
        }
        "channel_type" => {
            let value = node
                .child_by_field_name("value")
                .map(|n| convert_type_expr(n, source, imports))
                .unwrap_or_else(|| FieldType::named("unknown", None));
            let mut ft = FieldType::named(format!("chan {}", value.name), None);
            ft.elem = Some(Box::new(value));
            ft
        }
        "qualified_type" => {
            let pkg = node
                .child_by_field_name("package")
                .map(|n| node_text(n, source).to_string());
            let name = node
                .child_by_field_name("name")
                .map(|n| node_text(n, source).to_string())
                .unwrap_or_default();
            let mut ft = FieldType::named(name, pkg.clone());
            if let Some(pkg) = &pkg {
                ft.full_import_path = imports.get(pkg).cloned();
            }
            ft
        }
        "type_identifier" => {
            let name = node_text(node, source).to_string();
            let is_builtin = is_predeclared_type(&name);
            let mut ft = FieldType::named(name, None);
            ft.is_builtin = is_builtin;
            ft
        }
        "function_type" | "struct_type" | "interface_type" => {
            FieldType::named(node_text(node, source).to_string(), None)
        }
        "variadic_parameter_declaration" => {
            let inner = node
                .child_by_field_name("type")
                .map(|n| convert_type_expr(n, source, imports))
                .unwrap_or_else(|| FieldType::named("unknown", None));
            let mut ft = FieldType::slice_of(inner);
            ft.is_variadic = true;
            ft
        }
        _ => FieldType::named(node_text(node, source).to_string(), None),
    }
}

fn named_child_skip_punct(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|c| c.is_named())
}

fn is_predeclared_type(name: &str) -> bool {
    matches!(
        name,
        "bool"
            | "string"
            | "int"
            | "int8"
            | "int16"
            | "int32"
            | "int64"
            | "uint"
            | "uint8"
            | "uint16"
            | "uint32"
            | "uint64"
            | "uintptr"
            | "byte"
            | "rune"
            | "float32"
            | "float64"
            | "complex64"
            | "complex128"
            | "error"
            | "any"
    )
}

/// A `type_spec`'s own leading comment when it's one of several specs in a
/// `type ( ... )` block, falling back to the comment above the whole
/// `type_declaration` for the common single-spec `type X struct{}` form
/// (whose `prev_sibling` is the `type` keyword token, not a comment).
fn doc_for_decl_or_spec(decl: Node, spec: Node, source: &str) -> String {
    let direct = doc_comment_for(spec, source);
    if !direct.is_empty() {
        direct
    } else {
        doc_comment_for(decl, source)
    }
}

fn doc_comment_for(node: Node, source: &str) -> String {
    let mut lines = Vec::new();
    let mut current = node.prev_sibling();
    while let Some(n) = current {
        if n.kind() != "comment" {
            break;
        }
        lines.push(node_text(n, source).trim_start_matches("//").trim().to_string());
        current = n.prev_sibling();
    }
    lines.reverse();
    lines.join("\n")
}

fn extract_annotations(doc: &str, markers: &[&str]) -> Vec<Annotation> {
    let mut out = Vec::new();
    for line in doc.lines() {
        let trimmed = line.trim();
        for marker in markers {
            if let Some(rest) = trimmed.strip_prefix(marker) {
                let args = rest
                    .trim()
                    .trim_start_matches('(')
                    .trim_end_matches(')')
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                out.push(Annotation {
                    marker: marker.to_string(),
                    raw: trimmed.to_string(),
                    args,
                });
            }
        }
    }
    out
}

fn convert_parameter_list(node: Node, source: &str, imports: &HashMap<String, String>) -> Vec<FieldInfo> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "parameter_declaration" && child.kind() != "variadic_parameter_declaration" {
            continue;
        }
        let is_variadic = child.kind() == "variadic_parameter_declaration";
        let field_type = child
            .child_by_field_name("type")
            .map(|n| convert_type_expr(n, source, imports))
            .unwrap_or_else(|| FieldType::named("unknown", None));
        let mut names: Vec<Node> = Vec::new();
        let mut inner = child.walk();
        for part in child.children(&mut inner) {
            if part.kind() == "identifier" {
                names.push(part);
            }
        }
        if names.is_empty() {
            let mut ft = field_type.clone();
            ft.is_variadic = is_variadic;
            out.push(FieldInfo {
                name: String::new(),
                field_type: ft,
                embedded: false,
                tag: None,
            });
        } else {
            for name_node in names {
                let mut ft = field_type.clone();
                ft.is_variadic = is_variadic;
                out.push(FieldInfo {
                    name: node_text(name_node, source).to_string(),
                    field_type: ft,
                    embedded: false,
                    tag: None,
                });
            }
        }
    }
    out
}

fn convert_result(node: Option<Node>, source: &str, imports: &HashMap<String, String>) -> Vec<FieldInfo> {
    match node {
        None => Vec::new(),
        Some(n) if n.kind() == "parameter_list" => convert_parameter_list(n, source, imports),
        Some(n) => vec![FieldInfo {
            name: String::new(),
            field_type: convert_type_expr(n, source, imports),
            embedded: false,
            tag: None,
        }],
    }
}

fn convert_function(
    node: Node,
    source: &str,
    file: &Path,
    pkg_path: &str,
    imports: &HashMap<String, String>,
    receiver: Option<FieldInfo>,
) -> Option<FunctionInfo> {
    let name_node = node.child_by_field_name("name")?;
    let name = node_text(name_node, source).to_string();
    let parameters = node
        .child_by_field_name("parameters")
        .map(|n| convert_parameter_list(n, source, imports))
        .unwrap_or_default();
    let results = convert_result(node.child_by_field_name("result"), source, imports);
    let is_variadic = parameters.last().is_some_and(|p| p.field_type.is_variadic);
    let id = format!("{pkg_path}:{}", node.start_byte());
    Some(FunctionInfo {
        id,
        name,
        pkg_path: pkg_path.to_string(),
        receiver,
        parameters,
        results,
        type_params: Vec::new(),
        doc: doc_comment_for(node, source),
        node: Some(node_id(file, node)),
        is_variadic,
    })
}

fn convert_method(
    node: Node,
    source: &str,
    file: &Path,
    pkg_path: &str,
    imports: &HashMap<String, String>,
) -> Option<(String, FunctionInfo)> {
    let receiver_list = node.child_by_field_name("receiver")?;
    let receiver_decl = receiver_list
        .children(&mut receiver_list.walk())
        .find(|c| c.kind() == "parameter_declaration")?;
    let receiver_type_node = receiver_decl.child_by_field_name("type")?;
    let receiver_field_type = convert_type_expr(receiver_type_node, source, imports);
    let receiver_type_name = receiver_field_type.name.clone();
    let receiver_name = receiver_decl
        .children(&mut receiver_decl.walk())
        .find(|c| c.kind() == "identifier")
        .map(|n| node_text(n, source).to_string())
        .unwrap_or_default();
    let receiver = FieldInfo {
        name: receiver_name,
        field_type: receiver_field_type,
        embedded: false,
        tag: None,
    };

    let func = convert_function(node, source, file, pkg_path, imports, Some(receiver))?;
    Some((receiver_type_name, func))
}

fn collect_type_decls(
    node: Node,
    source: &str,
    file: &Path,
    pkg_path: &str,
    imports: &HashMap<String, String>,
    options: &ScanOptions,
    types: &mut Vec<Arc<TypeInfo>>,
    annotations: &mut Vec<Annotation>,
) {
    let markers = options.markers();
    let mut cursor = node.walk();
    for spec in node.children(&mut cursor) {
        if spec.kind() != "type_spec" && spec.kind() != "type_alias" {
            continue;
        }
        let Some(name_node) = spec.child_by_field_name("name") else {
            continue;
        };
        let name = node_text(name_node, source).to_string();
        let Some(type_node) = spec.child_by_field_name("type") else {
            continue;
        };
        let doc = doc_for_decl_or_spec(node, spec, source);
        annotations.extend(extract_annotations(&doc, &markers));

        let (kind, struct_fields, interface_methods, underlying) = match type_node.kind() {
            "struct_type" => (
                TypeKind::Struct,
                convert_struct_fields(type_node, source, imports),
                Vec::new(),
                None,
            ),
            "interface_type" => (
                TypeKind::Interface,
                Vec::new(),
                convert_interface_methods(type_node, source, file, pkg_path, imports),
                None,
            ),
            _ if spec.kind() == "type_alias" => (
                TypeKind::Alias,
                Vec::new(),
                Vec::new(),
                Some(convert_type_expr(type_node, source, imports)),
            ),
            "function_type" => (
                TypeKind::FuncType,
                Vec::new(),
                Vec::new(),
                Some(convert_type_expr(type_node, source, imports)),
            ),
            _ => (
                TypeKind::Alias,
                Vec::new(),
                Vec::new(),
                Some(convert_type_expr(type_node, source, imports)),
            ),
        };

        types.push(Arc::new(TypeInfo {
            name,
            pkg_path: pkg_path.to_string(),
            kind,
            struct_fields,
            interface_methods,
            underlying,
            type_params: Vec::new(),
            node: Some(node_id(file, spec)),
            doc,
            methods: std::sync::Mutex::new(Vec::new()),
        }));
    }
}

fn convert_struct_fields(node: Node, source: &str, imports: &HashMap<String, String>) -> Vec<FieldInfo> {
    let mut out = Vec::new();
    let Some(list) = node.children(&mut node.walk()).find(|c| c.kind() == "field_declaration_list") else {
        return out;
    };
    let mut cursor = list.walk();
    for field in list.children(&mut cursor) {
        if field.kind() != "field_declaration" {
            continue;
        }
        let tag = field
            .children(&mut field.walk())
            .find(|c| c.kind() == "raw_string_literal")
            .map(|n| node_text(n, source).trim_matches('`').to_string());
        let names: Vec<Node> = field
            .children(&mut field.walk())
            .filter(|c| c.kind() == "field_identifier")
            .collect();
        let Some(type_node) = field.child_by_field_name("type") else {
            continue;
        };
        let field_type = convert_type_expr(type_node, source, imports);
        if names.is_empty() {
            out.push(FieldInfo {
                name: field_type.name.clone(),
                field_type,
                embedded: true,
                tag,
            });
        } else {
            for name_node in names {
                out.push(FieldInfo {
                    name: node_text(name_node, source).to_string(),
                    field_type: field_type.clone(),
                    embedded: false,
                    tag: tag.clone(),
                });
            }
        }
    }
    out
}

fn convert_interface_methods(
    node: Node,
    source: &str,
    file: &Path,
    pkg_path: &str,
    imports: &HashMap<String, String>,
) -> Vec<FunctionInfo> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for elem in node.children(&mut cursor) {
        if elem.kind() != "method_elem" {
            continue;
        }
        let Some(name_node) = elem.child_by_field_name("name") else {
            continue;
        };
        let name = node_text(name_node, source).to_string();
        let parameters = elem
            .child_by_field_name("parameters")
            .map(|n| convert_parameter_list(n, source, imports))
            .unwrap_or_default();
        let results = convert_result(elem.child_by_field_name("result"), source, imports);
        out.push(FunctionInfo {
            id: format!("{pkg_path}:{}", elem.start_byte()),
            name,
            pkg_path: pkg_path.to_string(),
            receiver: None,
            parameters,
            results,
            type_params: Vec::new(),
            doc: String::new(),
            node: Some(node_id(file, elem)),
            is_variadic: false,
        });
    }
    out
}

fn identifier_names(node: Node, source: &str) -> Vec<String> {
    node.children(&mut node.walk())
        .filter(|c| c.kind() == "identifier")
        .map(|n| node_text(n, source).to_string())
        .collect()
}

fn collect_const_decls(
    node: Node,
    source: &str,
    pkg_path: &str,
    constants: &mut Vec<Arc<ConstantInfo>>,
) {
    let mut cursor = node.walk();
    for spec in node.children(&mut cursor) {
        if spec.kind() != "const_spec" {
            continue;
        }
        let names = identifier_names(spec, source);
        let type_hint = spec
            .child_by_field_name("type")
            .map(|n| convert_type_expr(n, source, &HashMap::new()));
        let values: Vec<String> = spec
            .child_by_field_name("value")
            .map(|n| vec![node_text(n, source).to_string()])
            .unwrap_or_default();
        for (idx, name) in names.into_iter().enumerate() {
            constants.push(Arc::new(ConstantInfo {
                name,
                pkg_path: pkg_path.to_string(),
                type_hint: type_hint.clone(),
                value: values.get(idx).cloned().unwrap_or_default(),
            }));
        }
    }
}

fn collect_var_decls(
    node: Node,
    source: &str,
    file: &Path,
    pkg_path: &str,
    imports: &HashMap<String, String>,
    variables: &mut Vec<Arc<VariableInfo>>,
) {
    let mut cursor = node.walk();
    for spec in node.children(&mut cursor) {
        if spec.kind() != "var_spec" {
            continue;
        }
        let names = identifier_names(spec, source);
        let type_hint = spec
            .child_by_field_name("type")
            .map(|n| convert_type_expr(n, source, imports));
        let value_node = spec.child_by_field_name("value");
        for name in names {
            variables.push(Arc::new(VariableInfo {
                name,
                pkg_path: pkg_path.to_string(),
                type_hint: type_hint.clone(),
                initializer_source: value_node.map(|n| node_text(n, source).to_string()),
                initializer_node: value_node.map(|n| node_id(file, n)),
                evaluated: std::sync::atomic::AtomicBool::new(false),
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::OverlayFileSystem;
    use std::sync::Arc as StdArc;

    fn scan(source: &str) -> PackageInfo {
        let fs: StdArc<dyn FileSystem> =
            StdArc::new(OverlayFileSystem::new().with_file("/pkg/main.go", source));
        let scanner = Scanner::new(fs);
        scanner
            .scan_dir(Path::new("/pkg"), "example.com/app", "example.com/app", &ScanOptions::default())
            .unwrap()
    }

    #[test]
    fn extracts_struct_and_pointer_fields() {
        let pkg = scan(
            r#"
package app

type Node struct {
    Next *Node
    Prev *Node
}
"#,
        );
        let node_type = pkg.find_type("Node").expect("Node type");
        assert_eq!(node_type.struct_fields.len(), 2);
        assert!(node_type.struct_fields[0].field_type.is_pointer);
        assert_eq!(node_type.struct_fields[0].field_type.elem.as_ref().unwrap().name, "Node");
    }

    #[test]
    fn extracts_functions_and_methods() {
        let pkg = scan(
            r#"
package app

type Server struct{}

func (s *Server) Serve() int { return 0 }

func Public(x int, xs ...string) {}
"#,
        );
        assert!(pkg.find_function("Public").is_some());
        let server = pkg.find_type("Server").unwrap();
        assert!(server.method("Serve").is_some());
        let public = pkg.find_function("Public").unwrap();
        assert!(public.is_variadic);
    }

    #[test]
    fn rejects_mixed_package_names() {
        let fs: Arc<dyn FileSystem> = Arc::new(
            OverlayFileSystem::new()
                .with_file("/pkg/a.go", "package app\n")
                .with_file("/pkg/b.go", "package other\n"),
        );
        let scanner = Scanner::new(fs);
        let err = scanner
            .scan_dir(Path::new("/pkg"), "example.com/app", "example.com/app", &ScanOptions::default())
            .unwrap_err();
        assert!(matches!(err, ScanError::MixedPackage { .. }));
    }

    #[test]
    fn excludes_test_files_unless_requested() {
        let fs: Arc<dyn FileSystem> = Arc::new(
            OverlayFileSystem::new()
                .with_file("/pkg/a.go", "package app\nfunc A() {}\n")
                .with_file("/pkg/a_test.go", "package app\nfunc TestA() {}\n"),
        );
        let scanner = Scanner::new(fs);
        let pkg = scanner
            .scan_dir(Path::new("/pkg"), "example.com/app", "example.com/app", &ScanOptions::default())
            .unwrap();
        assert!(pkg.find_function("TestA").is_none());

        let pkg_with_tests = scanner
            .scan_dir(
                Path::new("/pkg"),
                "example.com/app",
                "example.com/app",
                &ScanOptions {
                    include_tests: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(pkg_with_tests.find_function("TestA").is_some());
    }

    #[test]
    fn captures_annotations_from_doc_comments() {
        let pkg = scan(
            r#"
package app

// @derivingconvert(Dst)
type Src struct{}
"#,
        );
        assert_eq!(pkg.annotations.len(), 1);
        assert_eq!(pkg.annotations[0].marker, "@derivingconvert");
        assert_eq!(pkg.annotations[0].args, vec!["Dst".to_string()]);
    }
}
