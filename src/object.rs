//! Object Model & Environment (C7): the value lattice the evaluator
//! produces and the lexically scoped bindings it evaluates against
//! (spec §3.3, §4.6).

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::types::{FunctionInfo, TypeInfo};

/// A binding slot. Kept behind `Arc<Mutex<_>>` so `&x` can hand out a
/// `Pointer` that observes later writes through the same variable (spec
/// §4.7.6, pointer semantics), and so slots are safely shared across the
/// evaluator's threads per spec §5.
pub type Slot = Arc<Mutex<Object>>;

pub fn new_slot(value: Object) -> Slot {
    Arc::new(Mutex::new(value))
}

/// The evaluator's tagged-variant value. Every arm is something the
/// evaluator can soundly produce without fully executing a program: most
/// are concrete (`Integer`, `String`, `Boolean`), some are structural
/// (`Instance`, `Pointer`, `Function`), and `SymbolicPlaceholder` is the
/// escape hatch for "a value exists here, its shape does not matter to
/// the analysis."
#[derive(Clone)]
pub enum Object {
    Integer(i64),
    String(String),
    Boolean(bool),
    Nil,
    Function(Arc<FunctionInfo>),
    /// A generic function after type-argument substitution (spec §4.7.9).
    InstantiatedFunction {
        base: Arc<FunctionInfo>,
        type_args: Vec<Arc<TypeInfo>>,
    },
    /// A call-site reference to a name the evaluator never scanned into
    /// (opaque package, per C11's scan policy) but still wants to record
    /// as "used."
    UnresolvedFunction { pkg_path: String, name: String },
    Instance {
        type_info: Arc<TypeInfo>,
        fields: HashMap<String, Slot>,
    },
    Pointer(Slot),
    /// A reference to a binding, distinct from the value it holds — lets
    /// `&x` and assignment through a pointer share one slot.
    Variable(Slot),
    Package(String),
    /// Stands in for a value whose concrete shape isn't known or isn't
    /// worth modeling further (return value of an opaque call, a
    /// type-asserted interface, etc.), carrying a type hint when one is
    /// available.
    SymbolicPlaceholder {
        type_hint: Option<Arc<TypeInfo>>,
        description: String,
    },
    Type(Arc<TypeInfo>),
    /// Wraps a statement-level `return`'s operand(s) so `Eval` can
    /// propagate it up through enclosing blocks without unwinding via
    /// Rust's own control flow.
    ReturnValue(Vec<Object>),
    Error(String),
    PanicError(Box<Object>),
}

impl Object {
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Integer(_) => "integer",
            Object::String(_) => "string",
            Object::Boolean(_) => "boolean",
            Object::Nil => "nil",
            Object::Function(_) => "function",
            Object::InstantiatedFunction { .. } => "instantiated_function",
            Object::UnresolvedFunction { .. } => "unresolved_function",
            Object::Instance { .. } => "instance",
            Object::Pointer(_) => "pointer",
            Object::Variable(_) => "variable",
            Object::Package(_) => "package",
            Object::SymbolicPlaceholder { .. } => "symbolic_placeholder",
            Object::Type(_) => "type",
            Object::ReturnValue(_) => "return_value",
            Object::Error(_) => "error",
            Object::PanicError(_) => "panic",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Object::Boolean(b) => *b,
            Object::Nil => false,
            _ => true,
        }
    }

    /// Dereferences through `Variable`/`Pointer` wrappers to the value
    /// underneath, cloning out of the slot.
    pub fn deref(&self) -> Object {
        match self {
            Object::Variable(slot) | Object::Pointer(slot) => slot.lock().unwrap().clone(),
            other => other.clone(),
        }
    }

    pub fn placeholder(description: impl Into<String>) -> Object {
        Object::SymbolicPlaceholder {
            type_hint: None,
            description: description.into(),
        }
    }

    pub fn placeholder_typed(type_info: Arc<TypeInfo>, description: impl Into<String>) -> Object {
        Object::SymbolicPlaceholder {
            type_hint: Some(type_info),
            description: description.into(),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Integer(n) => write!(f, "Integer({n})"),
            Object::String(s) => write!(f, "String({s:?})"),
            Object::Boolean(b) => write!(f, "Boolean({b})"),
            Object::Nil => write!(f, "Nil"),
            Object::Function(fi) => write!(f, "Function({})", fi.full_name()),
            Object::InstantiatedFunction { base, .. } => {
                write!(f, "InstantiatedFunction({})", base.full_name())
            }
            Object::UnresolvedFunction { pkg_path, name } => {
                write!(f, "UnresolvedFunction({pkg_path}.{name})")
            }
            Object::Instance { type_info, .. } => write!(f, "Instance({})", type_info.full_name()),
            Object::Pointer(_) => write!(f, "Pointer(..)"),
            Object::Variable(_) => write!(f, "Variable(..)"),
            Object::Package(path) => write!(f, "Package({path})"),
            Object::SymbolicPlaceholder { description, .. } => {
                write!(f, "SymbolicPlaceholder({description})")
            }
            Object::Type(ti) => write!(f, "Type({})", ti.full_name()),
            Object::ReturnValue(values) => write!(f, "ReturnValue({})", values.len()),
            Object::Error(msg) => write!(f, "Error({msg})"),
            Object::PanicError(inner) => write!(f, "Panic({inner:?})"),
        }
    }
}

/// A lexical scope. `Env::child` mirrors a Go block's nesting; `get`
/// walks up the parent chain, `set_local` always writes the innermost
/// scope (for `:=` declarations), and `set` writes the nearest scope that
/// already declares the name (for plain `=` assignment).
pub struct Env {
    parent: Option<Arc<Env>>,
    bindings: Mutex<HashMap<String, Slot>>,
}

impl Env {
    pub fn universe() -> Arc<Env> {
        let env = Arc::new(Env {
            parent: None,
            bindings: Mutex::new(HashMap::new()),
        });
        env.set_local("true", new_slot(Object::Boolean(true)));
        env.set_local("false", new_slot(Object::Boolean(false)));
        env.set_local("nil", new_slot(Object::Nil));
        env.set_local("iota", new_slot(Object::Integer(0)));
        env
    }

    pub fn child(parent: &Arc<Env>) -> Arc<Env> {
        Arc::new(Env {
            parent: Some(parent.clone()),
            bindings: Mutex::new(HashMap::new()),
        })
    }

    pub fn get(&self, name: &str) -> Option<Slot> {
        if let Some(slot) = self.bindings.lock().unwrap().get(name) {
            return Some(slot.clone());
        }
        self.parent.as_ref().and_then(|p| p.get(name))
    }

    pub fn set_local(&self, name: impl Into<String>, slot: Slot) {
        self.bindings.lock().unwrap().insert(name.into(), slot);
    }

    /// Writes through to the scope that already owns `name`, or declares
    /// it locally if no enclosing scope does (Go would reject the latter
    /// at compile time; the evaluator tolerates it since it never rejects
    /// programs outright).
    pub fn set(&self, name: &str, value: Object) {
        if let Some(slot) = self.bindings.lock().unwrap().get(name) {
            *slot.lock().unwrap() = value;
            return;
        }
        if let Some(parent) = &self.parent {
            if parent.get(name).is_some() {
                parent.set(name, value);
                return;
            }
        }
        self.set_local(name, new_slot(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn universe_env_predeclares_true_false_nil() {
        let env = Env::universe();
        assert!(matches!(
            *env.get("true").unwrap().lock().unwrap(),
            Object::Boolean(true)
        ));
        assert!(matches!(*env.get("nil").unwrap().lock().unwrap(), Object::Nil));
    }

    #[test]
    fn child_env_sees_parent_bindings_and_shadows_locally() {
        let root = Env::universe();
        root.set_local("x", new_slot(Object::Integer(1)));
        let child = Env::child(&root);
        assert!(matches!(
            *child.get("x").unwrap().lock().unwrap(),
            Object::Integer(1)
        ));
        child.set_local("x", new_slot(Object::Integer(2)));
        assert!(matches!(
            *child.get("x").unwrap().lock().unwrap(),
            Object::Integer(2)
        ));
        assert!(matches!(
            *root.get("x").unwrap().lock().unwrap(),
            Object::Integer(1)
        ));
    }

    #[test]
    fn set_writes_through_to_the_declaring_scope() {
        let root = Env::universe();
        root.set_local("x", new_slot(Object::Integer(1)));
        let child = Env::child(&root);
        child.set("x", Object::Integer(99));
        assert!(matches!(
            *root.get("x").unwrap().lock().unwrap(),
            Object::Integer(99)
        ));
    }
}
