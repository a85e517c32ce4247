//! Symbolic Evaluator (C8): a tree-walking interpreter over parsed
//! function bodies (spec §4.7). Explores every reachable branch of
//! control flow rather than one concrete path, so that "is this function
//! reachable" stays sound even though no input values are ever known.
//!
//! An `Interpreter` is single-threaded by contract (spec §5): its
//! counters and caches use plain `Cell`/`RefCell`, not atomics or
//! mutexes. Multiple interpreters may run on distinct threads as long as
//! they share only the already-synchronized [`PackageCache`] and
//! [`Locator`].

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;

use tree_sitter::{Node, Parser};

use crate::cache::PackageCache;
use crate::finalize::{Finalizer, InterfaceCallObservation, MatchedCall};
use crate::intrinsics::{IntrinsicCall, IntrinsicRegistry};
use crate::locator::Locator;
use crate::object::{new_slot, Env, Object, Slot};
use crate::policy::ScanPolicy;
use crate::resolver::Resolver;
use crate::types::{ConstantInfo, FunctionInfo, PackageInfo, TypeInfo, TypeKind, VariableInfo};

const DEFAULT_MAX_STEPS: u64 = 1_000_000;
const DEFAULT_MAX_CALL_STACK_DEPTH: usize = 4096;

enum PackageEnvState {
    Loading,
    Ready(Arc<Env>),
}

pub struct Interpreter {
    cache: Arc<PackageCache>,
    locator: Arc<Locator>,
    resolver: Resolver,
    intrinsics: IntrinsicRegistry,
    scan_policy: ScanPolicy,
    max_steps: u64,
    max_call_stack_depth: usize,
    memoize: bool,

    universe: Arc<Env>,
    package_envs: RefCell<HashMap<String, PackageEnvState>>,
    package_variables: RefCell<HashMap<String, HashMap<String, Arc<VariableInfo>>>>,
    memo: RefCell<HashMap<String, Object>>,
    interface_calls: RefCell<Vec<InterfaceCallObservation>>,

    steps: Cell<u64>,
    depth: Cell<usize>,
}

impl Interpreter {
    pub fn new(cache: Arc<PackageCache>, locator: Arc<Locator>) -> Self {
        Self {
            resolver: Resolver::new(cache.clone(), locator.clone()),
            cache,
            locator,
            intrinsics: IntrinsicRegistry::new(),
            scan_policy: ScanPolicy::default(),
            max_steps: DEFAULT_MAX_STEPS,
            max_call_stack_depth: DEFAULT_MAX_CALL_STACK_DEPTH,
            memoize: false,
            universe: Env::universe(),
            package_envs: RefCell::new(HashMap::new()),
            package_variables: RefCell::new(HashMap::new()),
            memo: RefCell::new(HashMap::new()),
            interface_calls: RefCell::new(Vec::new()),
            steps: Cell::new(0),
            depth: Cell::new(0),
        }
    }

    pub fn with_scan_policy(mut self, policy: ScanPolicy) -> Self {
        self.scan_policy = policy;
        self
    }

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_max_call_stack_depth(mut self, max_depth: usize) -> Self {
        self.max_call_stack_depth = max_depth;
        self
    }

    pub fn with_memoization(mut self, enabled: bool) -> Self {
        self.memoize = enabled;
        self
    }

    pub fn register_intrinsic(&self, qualified_name: impl Into<String>, f: crate::intrinsics::IntrinsicFunc) {
        self.intrinsics.register(qualified_name, f);
    }

    pub fn register_default_intrinsic(&self, f: crate::intrinsics::IntrinsicFunc) {
        self.intrinsics.register_default(f);
    }

    pub fn push_intrinsics(&self) {
        self.intrinsics.push();
    }

    pub fn pop_intrinsics(&self) {
        self.intrinsics.pop();
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps.get()
    }

    /// Runs the Finalizer (C10) over every observed interface call and
    /// every package the cache has scanned so far.
    pub fn finalize(&self) -> Vec<MatchedCall> {
        let finalizer = Finalizer::new(self.intrinsics.default());
        let observations = self.interface_calls.borrow().clone();
        let packages = self.cache.all();
        finalizer.finalize(&observations, &packages, &self.resolver)
    }

    /// Applies a top-level function to already-evaluated arguments,
    /// returning its unwrapped result (or an `Error`/`PanicError` object).
    pub fn apply(&self, func: Arc<FunctionInfo>, args: Vec<Object>, pkg: &Arc<PackageInfo>) -> Object {
        if self.depth.get() >= self.max_call_stack_depth {
            return Object::Error(format!(
                "call stack depth exceeded (limit {})",
                self.max_call_stack_depth
            ));
        }
        if self.memoize {
            if let Some(cached) = self.memo.borrow().get(&func.id) {
                return cached.clone();
            }
        }

        let Some(node_id) = &func.node else {
            return Object::SymbolicPlaceholder {
                type_hint: None,
                description: format!("{} has no body", func.full_name()),
            };
        };
        let Some(source) = pkg.source_for(&node_id.file) else {
            return Object::SymbolicPlaceholder {
                type_hint: None,
                description: format!("{} source unavailable", func.full_name()),
            };
        };
        let Some(decl_node) = find_node_at(pkg, &node_id.file, node_id.start_byte) else {
            return Object::SymbolicPlaceholder {
                type_hint: None,
                description: format!("{} declaration node not found", func.full_name()),
            };
        };
        let Some(body) = decl_node.child_by_field_name("body") else {
            // No body: an external/forward declaration. Report the call
            // to the default intrinsic, but there's nothing to walk.
            self.notify_default(&func.pkg_path, &func.name, &args);
            return Object::SymbolicPlaceholder {
                type_hint: None,
                description: format!("{} has no body", func.full_name()),
            };
        };

        let env = Env::child(&self.universe);
        bind_parameters(&env, &func.parameters, &args);
        for result in &func.results {
            if !result.name.is_empty() {
                env.set_local(result.name.clone(), new_slot(zero_value(&result.field_type)));
            }
        }

        self.depth.set(self.depth.get() + 1);
        let mut outcome = self.eval_block(body, &env, pkg, source);
        self.depth.set(self.depth.get() - 1);

        // A bare `return` (or falling off the end of the function body)
        // with named results yields their current values, not Nil.
        let has_named_results = !func.results.is_empty() && func.results.iter().all(|r| !r.name.is_empty());
        if has_named_results {
            let bare_return = matches!(&outcome, Object::ReturnValue(values) if values.is_empty());
            let fell_through = matches!(outcome, Object::Nil);
            if bare_return || fell_through {
                let gathered: Vec<Object> = func
                    .results
                    .iter()
                    .map(|r| env.get(&r.name).map(|s| s.lock().unwrap().clone()).unwrap_or(Object::Nil))
                    .collect();
                outcome = Object::ReturnValue(gathered);
            }
        }

        match outcome {
            Object::ReturnValue(mut values) if values.len() == 1 => values.remove(0),
            Object::ReturnValue(values) if values.is_empty() => Object::Nil,
            Object::ReturnValue(values) => Object::ReturnValue(values),
            other => other,
        }
    }

    fn step(&self) -> Option<Object> {
        let n = self.steps.get() + 1;
        self.steps.set(n);
        if n > self.max_steps {
            Some(Object::Error(format!(
                "step budget exceeded (limit {})",
                self.max_steps
            )))
        } else {
            None
        }
    }

    fn notify_default(&self, pkg_path: &str, func_name: &str, args: &[Object]) {
        if let Some(intrinsic) = self.intrinsics.default() {
            let call = IntrinsicCall {
                pkg_path,
                func_name,
                args,
            };
            intrinsic(&call);
        }
    }

    /// Lazily builds and caches a package-level environment: functions
    /// and constants bound eagerly, variables bound as unevaluated
    /// placeholders (spec §4.7.3). A package currently `Loading` (a
    /// cross-package env cycle) gets a throwaway empty child scope so the
    /// caller can proceed without deadlocking.
    fn package_env(&self, pkg_path: &str) -> Arc<Env> {
        if let Some(state) = self.package_envs.borrow().get(pkg_path) {
            match state {
                PackageEnvState::Ready(env) => return env.clone(),
                PackageEnvState::Loading => return Env::child(&self.universe),
            }
        }
        self.package_envs
            .borrow_mut()
            .insert(pkg_path.to_string(), PackageEnvState::Loading);

        let Ok(pkg) = self.cache.get_or_scan(&self.locator, pkg_path) else {
            let env = Env::child(&self.universe);
            self.package_envs
                .borrow_mut()
                .insert(pkg_path.to_string(), PackageEnvState::Ready(env.clone()));
            return env;
        };

        let env = Env::child(&self.universe);
        for func in &pkg.functions {
            if func.receiver.is_none() {
                env.set_local(func.name.clone(), new_slot(Object::Function(func.clone())));
            }
        }
        for constant in &pkg.constants {
            env.set_local(constant.name.clone(), new_slot(constant_to_object(constant)));
        }
        let mut var_meta = HashMap::new();
        for variable in &pkg.variables {
            env.set_local(
                variable.name.clone(),
                new_slot(Object::Variable(new_slot(Object::placeholder(
                    "unevaluated package-level variable",
                )))),
            );
            var_meta.insert(variable.name.clone(), variable.clone());
        }
        self.package_variables
            .borrow_mut()
            .insert(pkg_path.to_string(), var_meta);
        self.package_envs
            .borrow_mut()
            .insert(pkg_path.to_string(), PackageEnvState::Ready(env.clone()));
        env
    }

    /// Resolves a package-level variable on first read, evaluating its
    /// initializer exactly once and caching the result in its slot (spec
    /// §3.5, §4.7.3).
    fn force_variable(&self, pkg_path: &str, name: &str, slot: &Slot) -> Object {
        {
            let current = slot.lock().unwrap().clone();
            if !is_unevaluated_placeholder(&current) {
                return current;
            }
        }
        let variable = self
            .package_variables
            .borrow()
            .get(pkg_path)
            .and_then(|m| m.get(name).cloned());
        let Some(variable) = variable else {
            return slot.lock().unwrap().clone();
        };
        let value = match &variable.initializer_source {
            Some(src) => self.eval_standalone_expr(src, pkg_path),
            None => Object::placeholder("no initializer"),
        };
        variable.mark_evaluated();
        *slot.lock().unwrap() = value.clone();
        value
    }

    /// Evaluates a free-standing expression snippet (used for lazy
    /// package variable initializers) by wrapping it in a synthetic
    /// variable declaration tree-sitter can parse on its own.
    fn eval_standalone_expr(&self, snippet: &str, pkg_path: &str) -> Object {
        let wrapped = format!("package p\nvar goscope_lazy_value__ = {snippet}\n");
        let mut parser = Parser::new();
        if parser.set_language(&tree_sitter_go::LANGUAGE.into()).is_err() {
            return Object::placeholder("parser unavailable");
        }
        let Some(tree) = parser.parse(&wrapped, None) else {
            return Object::placeholder("unparsable initializer");
        };
        let root = tree.root_node();
        let mut cursor = root.walk();
        let value_node = root.children(&mut cursor).find_map(|child| {
            if child.kind() != "var_declaration" {
                return None;
            }
            let mut inner = child.walk();
            child
                .children(&mut inner)
                .find(|c| c.kind() == "var_spec")
                .and_then(|spec| spec.child_by_field_name("value"))
        });
        let Some(value_node) = value_node else {
            return Object::placeholder("unparsable initializer");
        };
        let env = self.package_env(pkg_path);
        let synthetic_pkg = Arc::new(PackageInfo {
            id: format!("{pkg_path}.__lazy__"),
            name: "lazy".to_string(),
            import_path: pkg_path.to_string(),
            dir: Default::default(),
            files: Vec::new(),
            types: Vec::new(),
            functions: Vec::new(),
            constants: Vec::new(),
            variables: Vec::new(),
            annotations: Vec::new(),
            trees: Vec::new(),
        });
        self.eval(value_node, &env, &synthetic_pkg, &wrapped)
    }

    fn eval_block(&self, node: Node, env: &Arc<Env>, pkg: &Arc<PackageInfo>, source: &str) -> Object {
        let child_env = Env::child(env);
        let mut cursor = node.walk();
        for stmt in node.children(&mut cursor) {
            if !stmt.is_named() {
                continue;
            }
            let result = self.eval(stmt, &child_env, pkg, source);
            if matches!(result, Object::ReturnValue(_) | Object::Error(_) | Object::PanicError(_)) {
                return result;
            }
        }
        Object::Nil
    }

    /// The evaluator's main dispatch. Anything not explicitly handled
    /// becomes a `SymbolicPlaceholder` instead of a hard error, so unknown
    /// grammar corners degrade gracefully rather than aborting the walk.
    pub fn eval(&self, node: Node, env: &Arc<Env>, pkg: &Arc<PackageInfo>, source: &str) -> Object {
        if let Some(err) = self.step() {
            return err;
        }

        match node.kind() {
            "block" => self.eval_block(node, env, pkg, source),
            "int_literal" => text(node, source)
                .replace('_', "")
                .parse::<i64>()
                .map(Object::Integer)
                .unwrap_or(Object::Integer(0)),
            "interpreted_string_literal" | "raw_string_literal" => {
                Object::String(text(node, source).trim_matches(|c| c == '"' || c == '`').to_string())
            }
            "true" => Object::Boolean(true),
            "false" => Object::Boolean(false),
            "nil" => Object::Nil,
            "identifier" => self.eval_identifier(node, env, pkg, source),
            "parenthesized_expression" => node
                .named_child(0)
                .map(|inner| self.eval(inner, env, pkg, source))
                .unwrap_or(Object::Nil),
            "unary_expression" => self.eval_unary(node, env, pkg, source),
            "binary_expression" => self.eval_binary(node, env, pkg, source),
            "selector_expression" => self.eval_selector(node, env, pkg, source),
            "call_expression" => self.eval_call(node, env, pkg, source),
            "index_expression" => {
                let _ = node
                    .child_by_field_name("operand")
                    .map(|n| self.eval(n, env, pkg, source));
                let _ = node
                    .child_by_field_name("index")
                    .map(|n| self.eval(n, env, pkg, source));
                Object::placeholder("indexed value")
            }
            "slice_expression" => {
                let _ = node
                    .child_by_field_name("operand")
                    .map(|n| self.eval(n, env, pkg, source));
                Object::placeholder("slice expression")
            }
            "type_assertion_expression" => self.eval_type_assertion(node, env, pkg, source),
            "composite_literal" => self.eval_composite_literal(node, env, pkg, source),
            "short_var_declaration" => self.eval_short_var_decl(node, env, pkg, source),
            "assignment_statement" => self.eval_assignment(node, env, pkg, source),
            "expression_statement" => node
                .named_child(0)
                .map(|inner| self.eval(inner, env, pkg, source))
                .unwrap_or(Object::Nil),
            "return_statement" => self.eval_return(node, env, pkg, source),
            "if_statement" => self.eval_if(node, env, pkg, source),
            "for_statement" => self.eval_for(node, env, pkg, source),
            "expression_switch_statement" => self.eval_expr_switch(node, env, pkg, source),
            "type_switch_statement" => self.eval_type_switch(node, env, pkg, source),
            "go_statement" | "defer_statement" => {
                // Evaluated for call-observation effects only; no
                // sequencing against sibling statements (spec §9).
                node.child_by_field_name("call")
                    .or_else(|| node.named_child(0))
                    .map(|inner| self.eval(inner, env, pkg, source));
                Object::Nil
            }
            "panic_statement" | "panic_call" => {
                let value = node
                    .named_child(0)
                    .map(|n| self.eval(n, env, pkg, source))
                    .unwrap_or(Object::Nil);
                Object::PanicError(Box::new(value))
            }
            "var_declaration" => {
                let mut cursor = node.walk();
                for spec in node.children(&mut cursor) {
                    if spec.kind() == "var_spec" {
                        self.eval(spec, env, pkg, source);
                    }
                }
                Object::Nil
            }
            "var_spec" => {
                let value = node
                    .child_by_field_name("value")
                    .map(|n| self.eval(n, env, pkg, source));
                let mut cursor = node.walk();
                for name_node in node.children(&mut cursor) {
                    if name_node.kind() == "identifier" {
                        let name = text(name_node, source);
                        env.set_local(name, new_slot(value.clone().unwrap_or(Object::Nil)));
                    }
                }
                Object::Nil
            }
            "range_clause" | "for_clause" => Object::Nil,
            _ => {
                // Unhandled node kind: walk named children for side
                // effects (call observations nested inside), but never
                // recurse into anything resembling unbounded structure.
                let mut cursor = node.walk();
                let mut last = Object::Nil;
                for child in node.named_children(&mut cursor) {
                    last = self.eval(child, env, pkg, source);
                    if matches!(last, Object::ReturnValue(_) | Object::Error(_) | Object::PanicError(_)) {
                        return last;
                    }
                }
                if matches!(last, Object::Nil) {
                    Object::placeholder(format!("unhandled node kind `{}`", node.kind()))
                } else {
                    last
                }
            }
        }
    }

    fn eval_identifier(&self, node: Node, env: &Arc<Env>, pkg: &Arc<PackageInfo>, source: &str) -> Object {
        let name = text(node, source);
        let Some(slot) = env.get(name) else {
            return Object::placeholder(format!("undeclared identifier `{name}`"));
        };
        let current = slot.lock().unwrap().clone();
        if is_unevaluated_placeholder(&current) {
            return self.force_variable(&pkg.import_path, name, &slot);
        }
        current
    }

    fn eval_unary(&self, node: Node, env: &Arc<Env>, pkg: &Arc<PackageInfo>, source: &str) -> Object {
        let operator = node
            .child_by_field_name("operator")
            .map(|n| text(n, source))
            .unwrap_or("");
        let Some(operand) = node.child_by_field_name("operand") else {
            return Object::placeholder("unary expression");
        };
        if operator == "&" {
            if let Some(slot) = self.lvalue_slot(operand, env, pkg, source) {
                return Object::Pointer(slot);
            }
        }
        let value = self.eval(operand, env, pkg, source);
        match (operator, &value) {
            ("-", Object::Integer(n)) => Object::Integer(-n),
            ("!", Object::Boolean(b)) => Object::Boolean(!b),
            ("*", Object::Pointer(slot)) => slot.lock().unwrap().clone(),
            _ => Object::placeholder("unary expression"),
        }
    }

    fn eval_binary(&self, node: Node, env: &Arc<Env>, pkg: &Arc<PackageInfo>, source: &str) -> Object {
        let Some(left_node) = node.child_by_field_name("left") else {
            return Object::placeholder("binary expression");
        };
        let Some(right_node) = node.child_by_field_name("right") else {
            return Object::placeholder("binary expression");
        };
        let operator = node
            .child_by_field_name("operator")
            .map(|n| text(n, source))
            .unwrap_or("");
        let left = self.eval(left_node, env, pkg, source);
        let right = self.eval(right_node, env, pkg, source);
        if matches!(left, Object::Error(_)) {
            return left;
        }
        if matches!(right, Object::Error(_)) {
            return right;
        }
        match (&left, &right) {
            (Object::Integer(a), Object::Integer(b)) => match operator {
                "+" => Object::Integer(a + b),
                "-" => Object::Integer(a - b),
                "*" => Object::Integer(a * b),
                "/" if *b != 0 => Object::Integer(a / b),
                "==" => Object::Boolean(a == b),
                "!=" => Object::Boolean(a != b),
                "<" => Object::Boolean(a < b),
                "<=" => Object::Boolean(a <= b),
                ">" => Object::Boolean(a > b),
                ">=" => Object::Boolean(a >= b),
                _ => Object::placeholder("binary expression"),
            },
            (Object::String(a), Object::String(b)) => match operator {
                "+" => Object::String(format!("{a}{b}")),
                "==" => Object::Boolean(a == b),
                "!=" => Object::Boolean(a != b),
                _ => Object::placeholder("binary expression"),
            },
            (Object::Boolean(a), Object::Boolean(b)) => match operator {
                "&&" => Object::Boolean(*a && *b),
                "||" => Object::Boolean(*a || *b),
                "==" => Object::Boolean(a == b),
                "!=" => Object::Boolean(a != b),
                _ => Object::placeholder("binary expression"),
            },
            _ => Object::placeholder("binary expression"),
        }
    }

    fn eval_selector(&self, node: Node, env: &Arc<Env>, pkg: &Arc<PackageInfo>, source: &str) -> Object {
        let Some(operand_node) = node.child_by_field_name("operand") else {
            return Object::placeholder("selector expression");
        };
        let Some(field_node) = node.child_by_field_name("field") else {
            return Object::placeholder("selector expression");
        };
        let field_name = text(field_node, source);
        let operand = self.eval(operand_node, env, pkg, source);

        match operand {
            Object::Package(import_path) => {
                if !self.scan_policy.should_scan(&import_path) {
                    self.notify_default(&import_path, field_name, &[]);
                    return Object::placeholder(format!("opaque package member {import_path}.{field_name}"));
                }
                let pkg_env = self.package_env(&import_path);
                match pkg_env.get(field_name) {
                    Some(slot) => {
                        let value = slot.lock().unwrap().clone();
                        if is_unevaluated_placeholder(&value) {
                            self.force_variable(&import_path, field_name, &slot)
                        } else {
                            value
                        }
                    }
                    None => Object::placeholder(format!("unknown member {import_path}.{field_name}")),
                }
            }
            Object::Pointer(slot) => {
                let inner = slot.lock().unwrap().clone();
                self.select_on_value(inner, field_name, pkg)
            }
            Object::Variable(slot) => {
                let inner = slot.lock().unwrap().clone();
                self.select_on_value(inner, field_name, pkg)
            }
            other => self.select_on_value(other, field_name, pkg),
        }
    }

    fn select_on_value(&self, value: Object, field_name: &str, _pkg: &Arc<PackageInfo>) -> Object {
        match value {
            Object::Instance { type_info, fields } => {
                if let Some(slot) = fields.get(field_name) {
                    return slot.lock().unwrap().clone();
                }
                if let Some(method) = find_method(&type_info, field_name, &self.resolver) {
                    if type_info.kind == TypeKind::Interface {
                        self.interface_calls.borrow_mut().push(InterfaceCallObservation {
                            interface: type_info.clone(),
                            method_name: field_name.to_string(),
                        });
                        return Object::placeholder(format!("{}.{}()", type_info.name, field_name));
                    }
                    return Object::Function(method);
                }
                Object::placeholder(format!("{}.{}", type_info.name, field_name))
            }
            Object::SymbolicPlaceholder { type_hint: Some(type_info), .. } => {
                if let Some(method) = find_method(&type_info, field_name, &self.resolver) {
                    if type_info.kind == TypeKind::Interface {
                        self.interface_calls.borrow_mut().push(InterfaceCallObservation {
                            interface: type_info.clone(),
                            method_name: field_name.to_string(),
                        });
                    }
                    return Object::Function(method);
                }
                Object::placeholder(format!("{}.{}", type_info.name, field_name))
            }
            _ => Object::placeholder(format!("selector .{field_name}")),
        }
    }

    fn eval_call(&self, node: Node, env: &Arc<Env>, pkg: &Arc<PackageInfo>, source: &str) -> Object {
        let Some(func_node) = node.child_by_field_name("function") else {
            return Object::placeholder("call expression");
        };
        let mut args = Vec::new();
        if let Some(arg_list) = node.child_by_field_name("arguments") {
            let mut cursor = arg_list.walk();
            for arg in arg_list.named_children(&mut cursor) {
                let value = self.eval(arg, env, pkg, source);
                if matches!(value, Object::Error(_)) {
                    return value;
                }
                args.push(value);
            }
        }

        let (qualified_name, pkg_path_for_intrinsic, func_name_for_intrinsic) =
            call_identity(func_node, source, pkg);
        if let Some(intrinsic) = self.intrinsics.get(&qualified_name) {
            let call = IntrinsicCall {
                pkg_path: &pkg_path_for_intrinsic,
                func_name: &func_name_for_intrinsic,
                args: &args,
            };
            let result = intrinsic(&call);
            self.notify_default(&pkg_path_for_intrinsic, &func_name_for_intrinsic, &args);
            return result;
        }

        let callee = self.eval(func_node, env, pkg, source);
        match callee {
            Object::Function(func) => {
                if !self.scan_policy.should_scan(&func.pkg_path) {
                    self.notify_default(&func.pkg_path, &func.name, &args);
                    return Object::placeholder(format!("{} (out of scan policy)", func.full_name()));
                }
                self.notify_default(&func.pkg_path, &func.name, &args);
                let callee_pkg = match self.cache.peek(&func.pkg_path) {
                    Some(p) => p,
                    None => pkg.clone(),
                };
                self.apply(func, args, &callee_pkg)
            }
            Object::UnresolvedFunction { pkg_path, name } => {
                self.notify_default(&pkg_path, &name, &args);
                Object::placeholder(format!("{pkg_path}.{name} (unresolved)"))
            }
            Object::SymbolicPlaceholder { description, .. } => {
                self.notify_default(&pkg_path_for_intrinsic, &func_name_for_intrinsic, &args);
                Object::placeholder(format!("call result of {description}"))
            }
            _ => {
                self.notify_default(&pkg_path_for_intrinsic, &func_name_for_intrinsic, &args);
                Object::placeholder("call expression")
            }
        }
    }

    fn eval_type_assertion(&self, node: Node, env: &Arc<Env>, pkg: &Arc<PackageInfo>, source: &str) -> Object {
        let _ = node
            .child_by_field_name("operand")
            .map(|n| self.eval(n, env, pkg, source));
        Object::placeholder("type assertion result")
    }

    fn eval_composite_literal(&self, node: Node, env: &Arc<Env>, pkg: &Arc<PackageInfo>, source: &str) -> Object {
        let type_name = node
            .child_by_field_name("type")
            .map(|n| text(n, source).to_string())
            .unwrap_or_default();
        let type_info = pkg.find_type(&type_name);
        let mut fields = HashMap::new();
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for element in body.named_children(&mut cursor) {
                if element.kind() == "keyed_element" {
                    let key = element.child_by_field_name("key").map(|n| text(n, source).to_string());
                    if let Some(value_node) = element.child_by_field_name("value") {
                        let value = self.eval(value_node, env, pkg, source);
                        if let Some(key) = key {
                            fields.insert(key, new_slot(value));
                        }
                    }
                }
            }
        }
        match type_info {
            Some(type_info) => Object::Instance { type_info, fields },
            None => Object::placeholder(format!("composite literal {type_name}")),
        }
    }

    fn eval_short_var_decl(&self, node: Node, env: &Arc<Env>, pkg: &Arc<PackageInfo>, source: &str) -> Object {
        let Some(left) = node.child_by_field_name("left") else {
            return Object::Nil;
        };
        let Some(right) = node.child_by_field_name("right") else {
            return Object::Nil;
        };
        let values = self.eval_expression_list(right, env, pkg, source);
        let names = identifier_list(left, source);
        for (name, value) in names.into_iter().zip(values) {
            if name != "_" {
                env.set_local(name.to_string(), new_slot(value));
            }
        }
        Object::Nil
    }

    fn eval_assignment(&self, node: Node, env: &Arc<Env>, pkg: &Arc<PackageInfo>, source: &str) -> Object {
        let Some(left) = node.child_by_field_name("left") else {
            return Object::Nil;
        };
        let Some(right) = node.child_by_field_name("right") else {
            return Object::Nil;
        };
        let values = self.eval_expression_list(right, env, pkg, source);
        let names = identifier_list(left, source);
        for (name, value) in names.into_iter().zip(values) {
            if name != "_" {
                env.set(name, value);
            }
        }
        Object::Nil
    }

    fn eval_expression_list(&self, node: Node, env: &Arc<Env>, pkg: &Arc<PackageInfo>, source: &str) -> Vec<Object> {
        if node.kind() == "expression_list" {
            let mut cursor = node.walk();
            node.named_children(&mut cursor)
                .map(|child| self.eval(child, env, pkg, source))
                .collect()
        } else {
            vec![self.eval(node, env, pkg, source)]
        }
    }

    fn eval_return(&self, node: Node, env: &Arc<Env>, pkg: &Arc<PackageInfo>, source: &str) -> Object {
        let mut cursor = node.walk();
        let values: Vec<Object> = node
            .named_children(&mut cursor)
            .map(|child| self.eval(child, env, pkg, source))
            .collect();
        Object::ReturnValue(values)
    }

    fn eval_if(&self, node: Node, env: &Arc<Env>, pkg: &Arc<PackageInfo>, source: &str) -> Object {
        if let Some(cond) = node.child_by_field_name("condition") {
            self.eval(cond, env, pkg, source);
        }
        let consequence = node
            .child_by_field_name("consequence")
            .map(|n| self.eval(n, &Env::child(env), pkg, source));
        let alternative = node
            .child_by_field_name("alternative")
            .map(|n| self.eval(n, &Env::child(env), pkg, source));

        match (consequence, alternative) {
            (Some(c), _) if matches!(c, Object::ReturnValue(_) | Object::Error(_) | Object::PanicError(_)) => c,
            (_, Some(a)) if matches!(a, Object::ReturnValue(_) | Object::Error(_) | Object::PanicError(_)) => a,
            _ => Object::Nil,
        }
    }

    /// `for` loops execute their body once (control flow inside the body
    /// is still explored in full) unless the loop has no header clause
    /// and no `break` anywhere in its body — a bare `for { ... }` — in
    /// which case the body runs repeatedly until the step budget forces
    /// termination, which is what makes an unbounded loop observable as
    /// `StepBudgetExceeded` rather than silently evaluated once.
    fn eval_for(&self, node: Node, env: &Arc<Env>, pkg: &Arc<PackageInfo>, source: &str) -> Object {
        let Some(body) = node.child_by_field_name("body") else {
            return Object::Nil;
        };
        let has_header = node
            .named_child(0)
            .is_some_and(|c| c.kind() != "block");
        let has_break = contains_break(body);

        if !has_header && !has_break {
            loop {
                if let Some(err) = self.step() {
                    return err;
                }
                let loop_env = Env::child(env);
                let result = self.eval_block(body, &loop_env, pkg, source);
                if matches!(result, Object::ReturnValue(_) | Object::Error(_) | Object::PanicError(_)) {
                    return result;
                }
            }
        } else {
            let loop_env = Env::child(env);
            self.eval_block(body, &loop_env, pkg, source)
        }
    }

    fn eval_expr_switch(&self, node: Node, env: &Arc<Env>, pkg: &Arc<PackageInfo>, source: &str) -> Object {
        if let Some(value) = node.child_by_field_name("value") {
            self.eval(value, env, pkg, source);
        }
        let mut cursor = node.walk();
        for case in node.named_children(&mut cursor) {
            if case.kind() != "expression_case" && case.kind() != "default_case" {
                continue;
            }
            let case_env = Env::child(env);
            let mut inner = case.walk();
            for stmt in case.named_children(&mut inner) {
                if stmt.kind() == "int_literal"
                    || stmt.kind() == "identifier"
                    || stmt.kind() == "interpreted_string_literal"
                {
                    continue; // the matched value(s), not a body statement
                }
                let result = self.eval(stmt, &case_env, pkg, source);
                if matches!(result, Object::ReturnValue(_) | Object::Error(_) | Object::PanicError(_)) {
                    return result;
                }
            }
        }
        Object::Nil
    }

    /// Explores every `case` of a type switch with the switched variable
    /// re-bound, in its own scope, to a placeholder typed as that case's
    /// type (spec §4.7.2).
    fn eval_type_switch(&self, node: Node, env: &Arc<Env>, pkg: &Arc<PackageInfo>, source: &str) -> Object {
        let binding_name = find_type_switch_binding(node, source);
        let mut cursor = node.walk();
        for case in node.named_children(&mut cursor) {
            if case.kind() != "type_case" && case.kind() != "default_case" {
                continue;
            }
            let case_env = Env::child(env);
            if let (Some(name), Some(type_node)) = (&binding_name, case.child_by_field_name("type")) {
                let type_name = text(type_node, source).to_string();
                let type_info = pkg.find_type(&type_name).unwrap_or_else(|| TypeInfo::builtin(&type_name));
                case_env.set_local(
                    name.clone(),
                    new_slot(Object::placeholder_typed(type_info, format!("type-switch case {type_name}"))),
                );
            }
            let mut inner = case.walk();
            for stmt in case.named_children(&mut inner) {
                if stmt.kind() == "qualified_type" || stmt.kind() == "type_identifier" {
                    continue;
                }
                let result = self.eval(stmt, &case_env, pkg, source);
                if matches!(result, Object::ReturnValue(_) | Object::Error(_) | Object::PanicError(_)) {
                    return result;
                }
            }
        }
        Object::Nil
    }

    /// Returns the slot backing an addressable expression (`&x`,
    /// `&s.field`), or `None` if the operand isn't addressable in this
    /// model.
    fn lvalue_slot(&self, node: Node, env: &Arc<Env>, _pkg: &Arc<PackageInfo>, source: &str) -> Option<Slot> {
        if node.kind() == "identifier" {
            env.get(text(node, source))
        } else {
            None
        }
    }
}

fn bind_parameters(env: &Arc<Env>, parameters: &[crate::types::FieldInfo], args: &[Object]) {
    for (i, param) in parameters.iter().enumerate() {
        if param.name.is_empty() {
            continue;
        }
        let value = args.get(i).cloned().unwrap_or_else(|| zero_value(&param.field_type));
        env.set_local(param.name.clone(), new_slot(value));
    }
}

fn zero_value(field_type: &crate::types::FieldType) -> Object {
    if field_type.is_pointer || field_type.is_slice || field_type.is_map {
        return Object::Nil;
    }
    match field_type.name.as_str() {
        "int" | "int8" | "int16" | "int32" | "int64" | "uint" | "uint8" | "uint16" | "uint32"
        | "uint64" | "byte" | "rune" => Object::Integer(0),
        "string" => Object::String(String::new()),
        "bool" => Object::Boolean(false),
        _ => Object::placeholder(format!("zero value of {}", field_type.name)),
    }
}

fn constant_to_object(constant: &ConstantInfo) -> Object {
    if let Ok(n) = constant.value.parse::<i64>() {
        Object::Integer(n)
    } else {
        Object::String(constant.value.trim_matches('"').to_string())
    }
}

fn is_unevaluated_placeholder(value: &Object) -> bool {
    matches!(
        value,
        Object::Variable(slot)
            if matches!(
                &*slot.lock().unwrap(),
                Object::SymbolicPlaceholder { description, .. }
                    if description == "unevaluated package-level variable"
            )
    )
}

fn text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn identifier_list<'a>(node: Node, source: &'a str) -> Vec<&'a str> {
    if node.kind() == "expression_list" {
        let mut cursor = node.walk();
        node.named_children(&mut cursor).map(|n| text(n, source)).collect()
    } else {
        vec![text(node, source)]
    }
}

fn contains_break(node: Node) -> bool {
    if node.kind() == "break_statement" {
        return true;
    }
    let mut cursor = node.walk();
    node.named_children(&mut cursor).any(contains_break)
}

fn find_type_switch_binding(node: Node, source: &str) -> Option<String> {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "type_switch_guard" {
            if let Some(ident) = child.child_by_field_name("name") {
                return Some(text(ident, source).to_string());
            }
        }
    }
    None
}

/// Derives `(qualified_name, pkg_path, func_name)` for a call's callee
/// expression, used both for intrinsic lookup and default-intrinsic
/// notification even when the callee doesn't resolve to a `Function`.
fn call_identity(func_node: Node, source: &str, pkg: &Arc<PackageInfo>) -> (String, String, String) {
    if func_node.kind() == "selector_expression" {
        if let (Some(operand), Some(field)) = (
            func_node.child_by_field_name("operand"),
            func_node.child_by_field_name("field"),
        ) {
            let operand_text = text(operand, source);
            let field_text = text(field, source);
            return (
                format!("{operand_text}.{field_text}"),
                operand_text.to_string(),
                field_text.to_string(),
            );
        }
    }
    let name = text(func_node, source).to_string();
    (
        format!("{}.{}", pkg.import_path, name),
        pkg.import_path.clone(),
        name,
    )
}

/// Embedded-field method promotion is bounded the same way
/// `finalize::collect_methods` bounds its walk: Go structs can't actually
/// embed cyclically, but a misresolved type alias could otherwise recurse
/// forever through the resolver.
const MAX_EMBED_DEPTH: usize = 8;

fn find_method(type_info: &Arc<TypeInfo>, name: &str, resolver: &Resolver) -> Option<Arc<FunctionInfo>> {
    find_method_bounded(type_info, name, resolver, 0)
}

fn find_method_bounded(
    type_info: &Arc<TypeInfo>,
    name: &str,
    resolver: &Resolver,
    depth: usize,
) -> Option<Arc<FunctionInfo>> {
    if let Some(method) = type_info.method(name) {
        return Some(method);
    }
    if depth >= MAX_EMBED_DEPTH {
        return None;
    }
    for field in type_info.struct_fields.iter().filter(|f| f.embedded) {
        if let Ok(embedded) = resolver.resolve_concrete_kind(&field.field_type, &type_info.pkg_path) {
            if let Some(method) = find_method_bounded(&embedded, name, resolver, depth + 1) {
                return Some(method);
            }
        }
    }
    None
}

/// Finds the smallest named descendant of `pkg`'s trees starting exactly
/// at `start_byte` in `file` — the inverse of the `NodeId` captured by
/// the scanner.
fn find_node_at<'a>(pkg: &'a PackageInfo, file: &std::path::Path, start_byte: usize) -> Option<Node<'a>> {
    let (_, _, tree) = pkg.trees.iter().find(|(p, _, _)| p == file)?;
    let root = tree.root_node();
    find_node_at_rec(root, start_byte)
}

fn find_node_at_rec(node: Node<'_>, start_byte: usize) -> Option<Node<'_>> {
    if node.start_byte() == start_byte && node.is_named() {
        return Some(node);
    }
    if !(node.start_byte() <= start_byte && start_byte < node.end_byte()) {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = find_node_at_rec(child, start_byte) {
            return Some(found);
        }
    }
    if node.start_byte() == start_byte {
        Some(node)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{FileSystem, OverlayFileSystem};
    use crate::locator::LocatorOptions;
    use crate::scanner::ScanOptions;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    fn interpreter(files: &[(&str, &str)]) -> (Interpreter, Arc<PackageInfo>) {
        let mut overlay = OverlayFileSystem::new();
        for (path, contents) in files {
            overlay = overlay.with_file(*path, *contents);
        }
        let fs: Arc<dyn FileSystem> = Arc::new(overlay);
        let locator = Arc::new(
            Locator::discover(fs.clone(), Path::new("/ws"), LocatorOptions::default()).unwrap(),
        );
        let cache = Arc::new(PackageCache::new(fs, ScanOptions::default()));
        let pkg = cache.get_or_scan(&locator, "example.com/app").unwrap();
        (Interpreter::new(cache, locator), pkg)
    }

    #[test]
    fn evaluates_arithmetic_and_returns_concretely() {
        let (interp, pkg) = interpreter(&[
            ("/ws/go.mod", "module example.com/app\n"),
            ("/ws/main.go", "package app\n\nfunc Add(a int, b int) int {\n    return a + b\n}\n"),
        ]);
        let func = pkg.find_function("Add").unwrap();
        let result = interp.apply(func, vec![Object::Integer(2), Object::Integer(3)], &pkg);
        assert!(matches!(result, Object::Integer(5)));
    }

    #[test]
    fn named_return_value_is_pre_declared_and_observable() {
        let (interp, pkg) = interpreter(&[
            ("/ws/go.mod", "module example.com/app\n"),
            (
                "/ws/main.go",
                "package app\n\nfunc Count() (n int) {\n    n = n + 1\n    return\n}\n",
            ),
        ]);
        let func = pkg.find_function("Count").unwrap();
        let result = interp.apply(func, vec![], &pkg);
        assert!(matches!(result, Object::Integer(1)));
    }

    #[test]
    fn lazy_package_variable_is_evaluated_on_first_read_and_then_cached() {
        let (interp, pkg) = interpreter(&[
            ("/ws/go.mod", "module example.com/app\n"),
            (
                "/ws/main.go",
                "package app\n\nvar secret = \"hello\"\n\nfunc GetGreeting() string {\n    return secret\n}\n",
            ),
        ]);
        let variable = pkg.find_variable("secret").unwrap();
        assert!(!variable.is_evaluated());
        let func = pkg.find_function("GetGreeting").unwrap();
        let result = interp.apply(func, vec![], &pkg);
        assert!(matches!(result, Object::String(s) if s == "hello"));
        assert!(variable.is_evaluated());
    }

    #[test]
    fn interface_call_is_observed_and_finalized_against_implementation() {
        let (interp, pkg) = interpreter(&[
            ("/ws/go.mod", "module example.com/app\n"),
            (
                "/ws/main.go",
                r#"
package app

type Greeter interface {
    Greet() string
}

type Person struct{}

func (p *Person) Greet() string { return "hi" }

func UseGreeter(g Greeter) string {
    return g.Greet()
}
"#,
            ),
        ]);
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        interp.register_default_intrinsic(Arc::new(move |_call: &IntrinsicCall| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
            Object::Nil
        }));

        let func = pkg.find_function("UseGreeter").unwrap();
        let greeter_type = pkg.find_type("Greeter").unwrap();
        interp.apply(
            func,
            vec![Object::SymbolicPlaceholder {
                type_hint: Some(greeter_type),
                description: "g parameter".to_string(),
            }],
            &pkg,
        );

        let matches = interp.finalize();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].implementor.name, "Person");
    }

    #[test]
    fn step_budget_exhausts_on_an_unbounded_loop() {
        let (interp, pkg) = interpreter(&[
            ("/ws/go.mod", "module example.com/app\n"),
            (
                "/ws/main.go",
                "package app\n\nfunc step() {}\n\nfunc Run() {\n    for {\n        step()\n    }\n}\n",
            ),
        ]);
        let interp = interp.with_max_steps(50);
        let func = pkg.find_function("Run").unwrap();
        let result = interp.apply(func, vec![], &pkg);
        assert!(matches!(result, Object::Error(_)));
        assert!(interp.steps_taken() <= 51);
    }

    #[test]
    fn scan_policy_boundary_reports_opaque_call_without_reading_its_body() {
        let (interp, pkg) = interpreter(&[
            ("/ws/go.mod", "module example.com/app\n"),
            (
                "/ws/main.go",
                r#"
package app

import "example.com/app/inner"

func CallBoth() {
    Local()
    inner.Opaque()
}

func Local() {}
"#,
            ),
            ("/ws/inner/inner.go", "package inner\n\nfunc Opaque() {}\n"),
        ]);
        let interp = interp.with_scan_policy(ScanPolicy::new(|p: &str| p == "example.com/app"));
        let observed = Arc::new(StdMutex::new(Vec::new()));
        let observed_clone = observed.clone();
        interp.register_default_intrinsic(Arc::new(move |call: &IntrinsicCall| {
            observed_clone
                .lock()
                .unwrap()
                .push(format!("{}.{}", call.pkg_path, call.func_name));
            Object::Nil
        }));
        let func = pkg.find_function("CallBoth").unwrap();
        interp.apply(func, vec![], &pkg);

        let calls = observed.lock().unwrap().clone();
        assert!(calls.contains(&"example.com/app.Local".to_string()));
        assert!(calls.contains(&"example.com/app/inner.Opaque".to_string()));
    }
}
