// ABOUTME: Lexical scope chain used for variable bindings, closures, and instance fields

use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug)]
struct Entry {
    value: Value,
    #[allow(dead_code)]
    is_const: bool,
}

#[derive(Debug)]
pub struct Environment {
    bindings: RefCell<HashMap<String, Entry>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    /// Creates a new environment with no parent (the global scope, or a flat
    /// fields/exports/method table).
    pub fn new() -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    /// Creates a new child environment with a parent.
    pub fn with_parent(parent: Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent),
        })
    }

    /// Binds `name` in THIS scope (a declaration), shadowing any outer binding.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.bindings.borrow_mut().insert(
            name.into(),
            Entry {
                value,
                is_const: false,
            },
        );
    }

    /// Looks up a name in this scope, then recursively in parent scopes.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(entry) = self.bindings.borrow().get(name) {
            return Some(entry.value.clone());
        }
        self.parent.as_ref().and_then(|p| p.get(name))
    }

    /// Updates an existing binding wherever it lives in the scope chain.
    /// Returns `false` (and leaves everything untouched) if the name is
    /// undefined anywhere up the chain — callers report this as an error.
    pub fn update(&self, name: &str, value: Value) -> bool {
        if self.bindings.borrow().contains_key(name) {
            self.bindings.borrow_mut().insert(
                name.to_string(),
                Entry {
                    value,
                    is_const: false,
                },
            );
            return true;
        }
        match &self.parent {
            Some(parent) => parent.update(name, value),
            None => false,
        }
    }

    /// Snapshot of this scope's own bindings (not the parent chain). Used to
    /// copy exports into an importer's scope and to walk instance fields.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.bindings
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_get() {
        let env = Environment::new();
        env.define("x", Value::Number(42.0));
        assert_eq!(env.get("x"), Some(Value::Number(42.0)));
    }

    #[test]
    fn test_undefined_symbol() {
        let env = Environment::new();
        assert!(env.get("undefined").is_none());
    }

    #[test]
    fn test_shadowing() {
        let parent = Environment::new();
        parent.define("x", Value::Number(42.0));
        let child = Environment::with_parent(parent);
        child.define("x", Value::Number(100.0));
        assert_eq!(child.get("x"), Some(Value::Number(100.0)));
    }

    #[test]
    fn test_parent_lookup() {
        let parent = Environment::new();
        parent.define("x", Value::Number(42.0));
        let child = Environment::with_parent(parent);
        assert_eq!(child.get("x"), Some(Value::Number(42.0)));
    }

    #[test]
    fn test_update_walks_up_the_chain() {
        let parent = Environment::new();
        parent.define("x", Value::Number(1.0));
        let child = Environment::with_parent(parent.clone());
        assert!(child.update("x", Value::Number(2.0)));
        assert_eq!(parent.get("x"), Some(Value::Number(2.0)));
    }

    #[test]
    fn test_update_undefined_fails() {
        let env = Environment::new();
        assert!(!env.update("nope", Value::Null));
    }

    #[test]
    fn test_entries_is_flat() {
        let parent = Environment::new();
        parent.define("a", Value::Number(1.0));
        let child = Environment::with_parent(parent);
        child.define("b", Value::Number(2.0));
        let entries = child.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "b");
    }
}
