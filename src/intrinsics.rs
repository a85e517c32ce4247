//! Intrinsic Registry (C9): name-keyed overrides for built-in or
//! standard-library calls the evaluator should special-case, plus a
//! single default intrinsic invoked on every call regardless of whether a
//! named override matched (spec §4.8, used for call-graph / "used
//! function" tracking).
//!
//! Overrides are organized as a stack of scopes so a caller can
//! temporarily shadow `fmt.Sprintf` (say, for one sub-evaluation) and pop
//! back to the previous set afterward.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::object::Object;

/// What an intrinsic sees about the call it's intercepting.
pub struct IntrinsicCall<'a> {
    pub pkg_path: &'a str,
    pub func_name: &'a str,
    pub args: &'a [Object],
}

pub type IntrinsicFunc = Arc<dyn Fn(&IntrinsicCall) -> Object + Send + Sync>;

pub struct IntrinsicRegistry {
    scopes: Mutex<Vec<HashMap<String, IntrinsicFunc>>>,
    default: Mutex<Option<IntrinsicFunc>>,
}

impl IntrinsicRegistry {
    pub fn new() -> Self {
        Self {
            scopes: Mutex::new(vec![HashMap::new()]),
            default: Mutex::new(None),
        }
    }

    /// Registers `f` for `qualified_name` (e.g. `"fmt.Sprintf"`) in the
    /// current top scope.
    pub fn register(&self, qualified_name: impl Into<String>, f: IntrinsicFunc) {
        let mut scopes = self.scopes.lock().unwrap();
        let top = scopes.last_mut().expect("at least one scope always present");
        top.insert(qualified_name.into(), f);
    }

    pub fn register_default(&self, f: IntrinsicFunc) {
        *self.default.lock().unwrap() = Some(f);
    }

    /// Looks up `qualified_name`, searching from the innermost scope
    /// outward.
    pub fn get(&self, qualified_name: &str) -> Option<IntrinsicFunc> {
        let scopes = self.scopes.lock().unwrap();
        scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(qualified_name).cloned())
    }

    pub fn default(&self) -> Option<IntrinsicFunc> {
        self.default.lock().unwrap().clone()
    }

    pub fn push(&self) {
        self.scopes.lock().unwrap().push(HashMap::new());
    }

    /// Pops the innermost scope. The base scope (index 0) is never
    /// popped, so an unbalanced `pop` is a no-op rather than leaving the
    /// registry without any scope to register into.
    pub fn pop(&self) {
        let mut scopes = self.scopes.lock().unwrap();
        if scopes.len() > 1 {
            scopes.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.lock().unwrap().len()
    }
}

impl Default for IntrinsicRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_and_looks_up_a_named_override() {
        let registry = IntrinsicRegistry::new();
        registry.register(
            "fmt.Sprintf",
            Arc::new(|_call: &IntrinsicCall| Object::String("stub".to_string())),
        );
        let f = registry.get("fmt.Sprintf").expect("registered");
        let call = IntrinsicCall {
            pkg_path: "fmt",
            func_name: "Sprintf",
            args: &[],
        };
        assert!(matches!(f(&call), Object::String(s) if s == "stub"));
        assert!(registry.get("fmt.Println").is_none());
    }

    #[test]
    fn pushed_scope_shadows_and_pop_restores() {
        let registry = IntrinsicRegistry::new();
        registry.register("pkg.F", Arc::new(|_| Object::Integer(1)));
        registry.push();
        registry.register("pkg.F", Arc::new(|_| Object::Integer(2)));
        let call = IntrinsicCall {
            pkg_path: "pkg",
            func_name: "F",
            args: &[],
        };
        assert!(matches!(registry.get("pkg.F").unwrap()(&call), Object::Integer(2)));
        registry.pop();
        assert!(matches!(registry.get("pkg.F").unwrap()(&call), Object::Integer(1)));
    }

    #[test]
    fn unbalanced_pop_keeps_the_base_scope() {
        let registry = IntrinsicRegistry::new();
        registry.pop();
        registry.pop();
        assert_eq!(registry.depth(), 1);
    }

    #[test]
    fn default_intrinsic_fires_independently_of_named_overrides() {
        let registry = IntrinsicRegistry::new();
        registry.register_default(Arc::new(|call: &IntrinsicCall| {
            Object::String(format!("{}.{}", call.pkg_path, call.func_name))
        }));
        let call = IntrinsicCall {
            pkg_path: "example.com/app",
            func_name: "Do",
            args: &[],
        };
        let result = (registry.default().unwrap())(&call);
        assert!(matches!(result, Object::String(s) if s == "example.com/app.Do"));
    }
}
