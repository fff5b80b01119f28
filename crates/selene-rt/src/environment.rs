use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::RuntimeError;
use crate::value::Value;

struct Scope {
    vars: FxHashMap<String, Value>,
    parent: Option<Environment>,
}

/// A lexically-nested binding scope. Cloning an `Environment` clones
/// the handle (it is reference-counted), so closures that capture
/// their defining environment keep it alive and share later mutations
/// made through any other handle to the same scope.
#[derive(Clone)]
pub struct Environment(Arc<Mutex<Scope>>);

impl Environment {
    pub fn root() -> Self {
        Environment(Arc::new(Mutex::new(Scope {
            vars: FxHashMap::default(),
            parent: None,
        })))
    }

    pub fn child(&self) -> Self {
        Environment(Arc::new(Mutex::new(Scope {
            vars: FxHashMap::default(),
            parent: Some(self.clone()),
        })))
    }

    /// Introduce or shadow a binding in the current scope only.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.lock().vars.insert(name.into(), value);
    }

    /// Walk outward through enclosing scopes looking for `name`.
    pub fn get(&self, name: &str) -> Option<Value> {
        let scope = self.0.lock();
        if let Some(v) = scope.vars.get(name) {
            return Some(v.clone());
        }
        let parent = scope.parent.clone();
        drop(scope);
        parent.and_then(|p| p.get(name))
    }

    /// Assign into whichever enclosing scope already defines `name`.
    /// Fails if no scope in the chain defines it -- assignment never
    /// implicitly creates a binding.
    pub fn assign(&self, name: &str, value: Value) -> Result<(), RuntimeError> {
        let mut scope = self.0.lock();
        if scope.vars.contains_key(name) {
            scope.vars.insert(name.to_string(), value);
            return Ok(());
        }
        let parent = scope.parent.clone();
        drop(scope);
        match parent {
            Some(p) => p.assign(name, value),
            None => Err(RuntimeError::new(format!("undefined variable '{name}'"))),
        }
    }

    /// Take a snapshot of the bindings defined directly in this scope,
    /// used to build a `Module` value's export table.
    pub fn snapshot(&self) -> FxHashMap<String, Value> {
        self.0.lock().vars.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_walks_outward_through_parents() {
        let root = Environment::root();
        root.define("x", Value::Number(1.0));
        let child = root.child();
        assert!(matches!(child.get("x"), Some(Value::Number(n)) if n == 1.0));
    }

    #[test]
    fn define_shadows_in_current_scope_only() {
        let root = Environment::root();
        root.define("x", Value::Number(1.0));
        let child = root.child();
        child.define("x", Value::Number(2.0));
        assert!(matches!(child.get("x"), Some(Value::Number(n)) if n == 2.0));
        assert!(matches!(root.get("x"), Some(Value::Number(n)) if n == 1.0));
    }

    #[test]
    fn assign_writes_through_to_defining_scope() {
        let root = Environment::root();
        root.define("x", Value::Number(1.0));
        let child = root.child();
        child.assign("x", Value::Number(5.0)).unwrap();
        assert!(matches!(root.get("x"), Some(Value::Number(n)) if n == 5.0));
    }

    #[test]
    fn assign_to_undefined_name_fails() {
        let root = Environment::root();
        assert!(root.assign("missing", Value::Null).is_err());
    }
}
