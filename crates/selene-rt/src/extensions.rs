use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::value::FunctionValue;

/// Process-wide table of extension methods, keyed by canonical type
/// name and then method name. `extend Number { ... }` blocks register
/// here, and member-call dispatch consults the table whenever a
/// receiver's own class (or builtin method set) has no match. Shared
/// process-wide rather than per-`Runtime` because extension methods
/// are meant to feel like they extend the type itself, not one
/// program's execution.
pub struct ExtensionRegistry {
    methods: RwLock<FxHashMap<String, FxHashMap<String, Arc<FunctionValue>>>>,
}

impl ExtensionRegistry {
    fn new() -> Self {
        Self {
            methods: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn global() -> &'static ExtensionRegistry {
        static REGISTRY: OnceLock<ExtensionRegistry> = OnceLock::new();
        REGISTRY.get_or_init(ExtensionRegistry::new)
    }

    pub fn register(&self, type_name: impl Into<String>, method_name: impl Into<String>, func: Arc<FunctionValue>) {
        self.methods
            .write()
            .entry(canonicalize_type_name(&type_name.into()))
            .or_default()
            .insert(method_name.into(), func);
    }

    pub fn lookup(&self, type_name: &str, method_name: &str) -> Option<Arc<FunctionValue>> {
        self.methods
            .read()
            .get(canonicalize_type_name(type_name).as_str())
            .and_then(|table| table.get(method_name))
            .cloned()
    }
}

/// Collapses numeric/boolean type-name synonyms so `ext Int { ... }`
/// and `x is Integer` agree with the canonical names `Value::type_name`
/// reports (`Number`, `Boolean`). Every other name passes through
/// unchanged.
pub fn canonicalize_type_name(name: &str) -> String {
    match name {
        "Int" | "Integer" | "Float" => "Number".to_string(),
        "Bool" => "Boolean".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn register_then_lookup_round_trips() {
        let registry = ExtensionRegistry::new();
        let func = Arc::new(FunctionValue::Native {
            name: "double",
            func: Box::new(|args: &[Value]| match args {
                [Value::Number(n)] => Ok(Value::Number(n * 2.0)),
                _ => Err(crate::error::RuntimeError::new("expected one number")),
            }),
        });
        registry.register("Number", "double", func);
        assert!(registry.lookup("Number", "double").is_some());
        assert!(registry.lookup("Number", "missing").is_none());
        assert!(registry.lookup("String", "double").is_none());
    }

    #[test]
    fn numeric_and_boolean_synonyms_canonicalize() {
        assert_eq!(canonicalize_type_name("Int"), "Number");
        assert_eq!(canonicalize_type_name("Integer"), "Number");
        assert_eq!(canonicalize_type_name("Float"), "Number");
        assert_eq!(canonicalize_type_name("Bool"), "Boolean");
        assert_eq!(canonicalize_type_name("String"), "String");
    }

    #[test]
    fn registering_under_a_synonym_is_visible_under_the_canonical_name() {
        let registry = ExtensionRegistry::new();
        let func = Arc::new(FunctionValue::Native {
            name: "isEven",
            func: Box::new(|args: &[Value]| match args {
                [Value::Number(n)] => Ok(Value::Boolean(*n as i64 % 2 == 0)),
                _ => Err(crate::error::RuntimeError::new("expected one number")),
            }),
        });
        registry.register("Int", "isEven", func);
        assert!(registry.lookup("Number", "isEven").is_some());
        assert!(registry.lookup("Integer", "isEven").is_some());
    }
}
