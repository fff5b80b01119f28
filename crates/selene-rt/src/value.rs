use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use selene_parser::ast::{FunctionBody, FunctionContract};

use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::task::{ChannelHandle, TaskHandle};

/// The full runtime value universe, shared unmodified across the
/// tree-walking interpreter, the chunk VM, and the eager-closure
/// engine. Array/Object/Function/Module/Contract/the type and instance
/// kinds/Task/Channel/Pointer/Error are reference types: cloning a
/// `Value` clones the handle, not the underlying data, so two bindings
/// to the same array observe each other's mutations. Number/String/
/// Boolean/Null are compared and copied by value.
#[derive(Clone)]
pub enum Value {
    Number(f64),
    String(Arc<str>),
    Boolean(bool),
    Null,
    Array(Arc<Mutex<Vec<Value>>>),
    Object(Arc<Mutex<IndexMap<String, Value>>>),
    Function(Arc<FunctionValue>),
    Module(Arc<ModuleValue>),
    StructType(Arc<StructTypeDef>),
    ClassType(Arc<ClassTypeDef>),
    EnumType(Arc<EnumTypeDef>),
    InterfaceType(Arc<InterfaceTypeDef>),
    Contract(Arc<ContractValue>),
    StructInstance(Arc<StructInstance>),
    ClassInstance(Arc<ClassInstance>),
    EnumInstance(Arc<EnumInstance>),
    Task(Arc<TaskHandle>),
    Channel(Arc<ChannelHandle>),
    Pointer(Arc<Mutex<Value>>),
    Error(Arc<ErrorValue>),
}

impl Value {
    pub fn string(s: impl Into<Arc<str>>) -> Value {
        Value::String(s.into())
    }

    /// The canonical type name used both for `is` tests and as the key
    /// into the process-wide extension-method registry. User-defined
    /// struct/class/enum instances report their own declared name
    /// rather than a generic tag.
    pub fn type_name(&self) -> String {
        match self {
            Value::Number(_) => "Number".to_string(),
            Value::String(_) => "String".to_string(),
            Value::Boolean(_) => "Boolean".to_string(),
            Value::Null => "Null".to_string(),
            Value::Array(_) => "Array".to_string(),
            Value::Object(_) => "Object".to_string(),
            Value::Function(_) => "Function".to_string(),
            Value::Module(_) => "Module".to_string(),
            Value::StructType(_) => "Struct".to_string(),
            Value::ClassType(_) => "Class".to_string(),
            Value::EnumType(_) => "Enum".to_string(),
            Value::InterfaceType(_) => "Interface".to_string(),
            Value::Contract(_) => "Contract".to_string(),
            Value::StructInstance(inst) => inst.def.name.clone(),
            Value::ClassInstance(inst) => inst.def.name.clone(),
            Value::EnumInstance(inst) => inst.def.name.clone(),
            Value::Task(_) => "Task".to_string(),
            Value::Channel(_) => "Channel".to_string(),
            Value::Pointer(_) => "Pointer".to_string(),
            Value::Error(_) => "Error".to_string(),
        }
    }

    /// Truthiness: Null, `false`, `0`, `""`, an empty Array, and an
    /// empty Object are falsy; every other value is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.lock().is_empty(),
            Value::Object(fields) => !fields.lock().is_empty(),
            _ => true,
        }
    }

    /// Structural equality for Null/Boolean/Number/String; reference
    /// identity for every other value kind.
    pub fn values_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Arc::ptr_eq(a, b),
            (Value::StructType(a), Value::StructType(b)) => Arc::ptr_eq(a, b),
            (Value::ClassType(a), Value::ClassType(b)) => Arc::ptr_eq(a, b),
            (Value::EnumType(a), Value::EnumType(b)) => Arc::ptr_eq(a, b),
            (Value::InterfaceType(a), Value::InterfaceType(b)) => Arc::ptr_eq(a, b),
            (Value::Contract(a), Value::Contract(b)) => Arc::ptr_eq(a, b),
            (Value::StructInstance(a), Value::StructInstance(b)) => Arc::ptr_eq(a, b),
            (Value::ClassInstance(a), Value::ClassInstance(b)) => Arc::ptr_eq(a, b),
            (Value::EnumInstance(a), Value::EnumInstance(b)) => Arc::ptr_eq(a, b),
            (Value::Task(a), Value::Task(b)) => Arc::ptr_eq(a, b),
            (Value::Channel(a), Value::Channel(b)) => Arc::ptr_eq(a, b),
            (Value::Pointer(a), Value::Pointer(b)) => Arc::ptr_eq(a, b),
            (Value::Error(a), Value::Error(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// A Value's canonical string form, used by `print` and by string
    /// concatenation when the other operand of `+` is a String.
    pub fn inspect(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Value::String(s) => write!(f, "{s}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Null => write!(f, "null"),
            Value::Array(items) => {
                let items = items.lock();
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Object(fields) => {
                let fields = fields.lock();
                write!(f, "{{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Function(func) => write!(f, "<fn {}>", func.name().unwrap_or("anonymous")),
            Value::Module(m) => write!(f, "<module {}>", m.name),
            Value::StructType(s) => write!(f, "<struct {}>", s.name),
            Value::ClassType(c) => write!(f, "<class {}>", c.name),
            Value::EnumType(e) => write!(f, "<enum {}>", e.name),
            Value::InterfaceType(i) => write!(f, "<interface {}>", i.name),
            Value::Contract(c) => write!(f, "<contract {}>", c.name),
            Value::StructInstance(inst) => write!(f, "<{} instance>", inst.def.name),
            Value::ClassInstance(inst) => write!(f, "<{} instance>", inst.def.name),
            Value::EnumInstance(inst) => {
                write!(f, "{}.{}", inst.def.name, inst.case)?;
                if !inst.field_order.is_empty() {
                    write!(f, "(")?;
                    let fields = inst.fields.lock();
                    for (i, name) in inst.field_order.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", fields.get(name).unwrap_or(&Value::Null))?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
            Value::Task(_) => write!(f, "<task>"),
            Value::Channel(_) => write!(f, "<channel>"),
            Value::Pointer(_) => write!(f, "<pointer>"),
            Value::Error(e) => write!(f, "error: {}", e.message),
        }
    }
}

/// A callable: either an AST body closed over its declaring
/// environment, or a native builtin. Bound methods are constructed by
/// wrapping a `UserDefined`'s closure with a child scope that defines
/// `self`, rather than mutating the method in place.
pub enum FunctionValue {
    UserDefined {
        name: Option<String>,
        params: Vec<String>,
        body: FunctionBody,
        closure: Environment,
        contract: Option<FunctionContract>,
    },
    Native {
        name: &'static str,
        func: Box<dyn Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync>,
    },
}

impl FunctionValue {
    pub fn name(&self) -> Option<&str> {
        match self {
            FunctionValue::UserDefined { name, .. } => name.as_deref(),
            FunctionValue::Native { name, .. } => Some(name),
        }
    }

    pub fn arity(&self) -> Option<usize> {
        match self {
            FunctionValue::UserDefined { params, .. } => Some(params.len()),
            FunctionValue::Native { .. } => None,
        }
    }

    /// Construct a bound method: a fresh callable sharing this one's
    /// body and contract but whose captured scope is a child of the
    /// original closure with `self` bound to `receiver`.
    pub fn bind(self: &Arc<Self>, receiver: Value) -> Arc<FunctionValue> {
        match self.as_ref() {
            FunctionValue::UserDefined {
                name,
                params,
                body,
                closure,
                contract,
            } => {
                let bound_scope = closure.child();
                bound_scope.define("self", receiver);
                Arc::new(FunctionValue::UserDefined {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                    closure: bound_scope,
                    contract: contract.clone(),
                })
            }
            FunctionValue::Native { .. } => Arc::clone(self),
        }
    }
}

/// A Module's exports are a shallow snapshot of its declaring scope at
/// the point the module body finishes executing; later mutations to
/// that scope never leak into the export table.
pub struct ModuleValue {
    pub name: String,
    pub exports: FxHashMap<String, Value>,
}

/// A top-level named `contract { ... }` block, snapshotted the same
/// way a Module is.
pub struct ContractValue {
    pub name: String,
    pub exports: FxHashMap<String, Value>,
}

pub struct StructTypeDef {
    pub name: String,
    pub fields: Vec<String>,
    pub methods: FxHashMap<String, Arc<FunctionValue>>,
    pub statics: FxHashMap<String, Value>,
}

pub struct ClassTypeDef {
    pub name: String,
    pub fields: Vec<String>,
    pub methods: FxHashMap<String, Arc<FunctionValue>>,
    pub statics: FxHashMap<String, Value>,
    pub superclass: Option<Arc<ClassTypeDef>>,
    pub interfaces: Vec<String>,
}

impl ClassTypeDef {
    /// Resolve a method, walking the single `super` pointer. Overrides
    /// are frozen at declaration time (the subclass's own table already
    /// contains inherited entries it didn't override), so this never
    /// needs to chase the chain more than one level in practice, but
    /// walks it fully in case a future declaration form skips copying.
    pub fn resolve_method(&self, name: &str) -> Option<Arc<FunctionValue>> {
        if let Some(m) = self.methods.get(name) {
            return Some(Arc::clone(m));
        }
        self.superclass.as_ref().and_then(|s| s.resolve_method(name))
    }

    pub fn resolve_static(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.statics.get(name) {
            return Some(v.clone());
        }
        self.superclass.as_ref().and_then(|s| s.resolve_static(name))
    }
}

pub struct EnumCaseDef {
    pub name: String,
    pub fields: Vec<String>,
}

pub struct EnumTypeDef {
    pub name: String,
    pub cases: Vec<EnumCaseDef>,
    pub methods: FxHashMap<String, Arc<FunctionValue>>,
}

impl EnumTypeDef {
    pub fn case(&self, name: &str) -> Option<&EnumCaseDef> {
        self.cases.iter().find(|c| c.name == name)
    }
}

pub struct InterfaceTypeDef {
    pub name: String,
    pub methods: FxHashMap<String, usize>,
}

pub struct StructInstance {
    pub def: Arc<StructTypeDef>,
    pub fields: Mutex<FxHashMap<String, Value>>,
}

pub struct ClassInstance {
    pub def: Arc<ClassTypeDef>,
    pub fields: Mutex<FxHashMap<String, Value>>,
}

pub struct EnumInstance {
    pub def: Arc<EnumTypeDef>,
    pub case: String,
    pub field_order: Vec<String>,
    pub fields: Mutex<FxHashMap<String, Value>>,
}

pub struct ErrorValue {
    pub message: String,
    pub cause: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_rules() {
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(Value::Boolean(true).is_truthy());
        assert!(Value::Number(1.0).is_truthy());
        assert!(Value::string("hi").is_truthy());
    }

    #[test]
    fn empty_array_and_object_are_falsy() {
        assert!(!Value::Array(Arc::new(Mutex::new(Vec::new()))).is_truthy());
        assert!(!Value::Object(Arc::new(Mutex::new(IndexMap::new()))).is_truthy());
        let arr = Value::Array(Arc::new(Mutex::new(vec![Value::Number(1.0)])));
        assert!(arr.is_truthy());
    }

    #[test]
    fn arrays_compare_by_identity_not_contents() {
        let a = Value::Array(Arc::new(Mutex::new(vec![Value::Number(1.0)])));
        let b = Value::Array(Arc::new(Mutex::new(vec![Value::Number(1.0)])));
        assert!(!a.values_equal(&b));
        let c = a.clone();
        assert!(a.values_equal(&c));
    }

    #[test]
    fn numbers_and_strings_compare_structurally() {
        assert!(Value::Number(1.0).values_equal(&Value::Number(1.0)));
        assert!(Value::string("hi").values_equal(&Value::string("hi")));
    }

    #[test]
    fn display_formats_integral_numbers_without_decimal() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(3.5).to_string(), "3.5");
    }
}
