use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use selene_common::Span;
use selene_parser::ast::{
    BinaryOp, CatchClause, Expr, FormatPart, FunctionBody, FunctionContract, LiteralPattern,
    Pattern, ProgramItem, Stmt, UnaryOp,
};

use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::extensions::ExtensionRegistry;
use crate::value::{
    ClassInstance, ClassTypeDef, ContractValue, EnumCaseDef, EnumInstance, EnumTypeDef,
    FunctionValue, InterfaceTypeDef, ModuleValue, StructInstance, StructTypeDef, Value,
};

/// The non-error outcomes a statement can produce, distinct from a
/// `RuntimeError`: a function return, a loop break, a loop continue.
/// Errors ride the same channel so `?` unwinds through both uniformly;
/// whichever construct owns the matching scope (a call for `Return`, a
/// loop for `Break`/`Continue`) catches its signal and everything else
/// passes through untouched.
#[derive(Debug, Clone)]
pub enum Signal {
    Error(RuntimeError),
    Return(Value),
    Break,
    Continue,
}

impl From<RuntimeError> for Signal {
    fn from(err: RuntimeError) -> Self {
        Signal::Error(err)
    }
}

pub(crate) type Signaled<T> = Result<T, Signal>;

/// Collapse a single item's outcome the same way `Interpreter::run`
/// does for a whole program: a signal that escapes every item is a
/// hard error, not a silent discard. Shared by the chunk VM and the
/// closure engine so both report escaped signals identically.
pub(crate) fn signal_to_result(result: Signaled<Value>) -> Result<Value, RuntimeError> {
    match result {
        Ok(v) => Ok(v),
        Err(Signal::Error(err)) => Err(err),
        Err(Signal::Return(_)) => Err(RuntimeError::new("return outside of function")),
        Err(Signal::Break) => Err(RuntimeError::new("break outside of loop")),
        Err(Signal::Continue) => Err(RuntimeError::new("continue outside of loop")),
    }
}

/// The tree-walking evaluator. Stateless: all mutable state lives in
/// the `Environment` threaded through every call, so the same
/// `Interpreter` can be shared (or freely re-constructed) across
/// threads, and the chunk VM and closure engine can each hold their own
/// handle to it without coordination.
#[derive(Default)]
pub struct Interpreter;

impl Interpreter {
    pub fn new() -> Self {
        Interpreter
    }

    /// Evaluate a whole program: run each item in order, returning the
    /// last produced value. A `return`/`break`/`continue` that escapes
    /// every enclosing function or loop is reported as a hard error
    /// rather than silently discarded.
    pub fn run(&self, items: &[ProgramItem], env: &Environment) -> Result<Value, RuntimeError> {
        let mut last = Value::Null;
        for item in items {
            last = signal_to_result(self.exec_item(item, env))?;
        }
        Ok(last)
    }

    pub(crate) fn exec_item(&self, item: &ProgramItem, env: &Environment) -> Signaled<Value> {
        match item {
            ProgramItem::Package(pkg) => {
                env.define("__package__", Value::string(pkg.name.clone()));
                Ok(Value::Null)
            }
            ProgramItem::Module(decl) => {
                let child = env.child();
                self.exec_stmts(&decl.body, &child)?;
                let module = Arc::new(ModuleValue {
                    name: decl.name.clone(),
                    exports: child.snapshot(),
                });
                env.define(decl.name.clone(), Value::Module(module));
                Ok(Value::Null)
            }
            ProgramItem::Statement(stmt) => self.exec_stmt(stmt, env),
        }
    }

    /// Execute a sequence of statements directly in `env` (the caller
    /// is responsible for opening whatever child scope the construct
    /// requires), returning the last statement's value.
    pub(crate) fn exec_stmts(&self, stmts: &[Stmt], env: &Environment) -> Signaled<Value> {
        let mut last = Value::Null;
        for stmt in stmts {
            last = self.exec_stmt(stmt, env)?;
        }
        Ok(last)
    }

    pub(crate) fn exec_stmt(&self, stmt: &Stmt, env: &Environment) -> Signaled<Value> {
        match stmt {
            Stmt::VariableDecl { name, value, .. } => {
                let v = self.eval_expr(value, env)?;
                env.define(name.clone(), v);
                Ok(Value::Null)
            }
            Stmt::FunctionDecl {
                name,
                receiver,
                params,
                contract,
                body,
                ..
            } => {
                let param_names = params.iter().map(|p| p.name.clone()).collect();
                let func = Arc::new(FunctionValue::UserDefined {
                    name: Some(name.clone()),
                    params: param_names,
                    body: body.clone(),
                    closure: env.clone(),
                    contract: contract.clone(),
                });
                env.define(name.clone(), Value::Function(Arc::clone(&func)));
                if let Some(receiver) = receiver {
                    ExtensionRegistry::global().register(receiver.name.clone(), name.clone(), func);
                }
                Ok(Value::Null)
            }
            Stmt::ClassDecl {
                name,
                superclass,
                fields,
                methods,
                interfaces,
                span,
            } => {
                let super_def = match superclass {
                    Some(super_name) => match env.get(super_name) {
                        Some(Value::ClassType(def)) => Some(def),
                        Some(_) => {
                            return Err(
                                RuntimeError::at(format!("{super_name} is not a class"), *span).into(),
                            )
                        }
                        None => {
                            return Err(RuntimeError::at(
                                format!("undefined type '{super_name}'"),
                                *span,
                            )
                            .into())
                        }
                    },
                    None => None,
                };
                let mut method_table = FxHashMap::default();
                let mut statics = FxHashMap::default();
                if let Some(sdef) = &super_def {
                    method_table.extend(sdef.methods.iter().map(|(k, v)| (k.clone(), Arc::clone(v))));
                    statics.extend(sdef.statics.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                self.collect_methods(methods, env, &mut method_table);
                let def = Arc::new(ClassTypeDef {
                    name: name.clone(),
                    fields: fields.clone(),
                    methods: method_table,
                    statics,
                    superclass: super_def,
                    interfaces: interfaces.clone(),
                });
                env.define(name.clone(), Value::ClassType(def));
                Ok(Value::Null)
            }
            Stmt::StructDecl {
                name,
                fields,
                methods,
                ..
            } => {
                let mut method_table = FxHashMap::default();
                self.collect_methods(methods, env, &mut method_table);
                let def = Arc::new(StructTypeDef {
                    name: name.clone(),
                    fields: fields.clone(),
                    methods: method_table,
                    statics: FxHashMap::default(),
                });
                env.define(name.clone(), Value::StructType(def));
                Ok(Value::Null)
            }
            Stmt::EnumDecl {
                name,
                cases,
                methods,
                ..
            } => {
                let case_defs = cases
                    .iter()
                    .map(|c| EnumCaseDef {
                        name: c.name.clone(),
                        fields: c.params.clone(),
                    })
                    .collect();
                let mut method_table = FxHashMap::default();
                self.collect_methods(methods, env, &mut method_table);
                let def = Arc::new(EnumTypeDef {
                    name: name.clone(),
                    cases: case_defs,
                    methods: method_table,
                });
                env.define(name.clone(), Value::EnumType(def));
                Ok(Value::Null)
            }
            Stmt::InterfaceDecl { name, methods, .. } => {
                let table = methods.iter().map(|m| (m.name.clone(), m.arity)).collect();
                let def = Arc::new(InterfaceTypeDef {
                    name: name.clone(),
                    methods: table,
                });
                env.define(name.clone(), Value::InterfaceType(def));
                Ok(Value::Null)
            }
            Stmt::ContractDecl { name, body, .. } => {
                let child = env.child();
                self.exec_stmts(body, &child)?;
                let contract = Arc::new(ContractValue {
                    name: name.clone(),
                    exports: child.snapshot(),
                });
                env.define(name.clone(), Value::Contract(contract));
                Ok(Value::Null)
            }
            Stmt::ImportDecl { .. } => Ok(Value::Null),
            Stmt::Match {
                discriminant,
                cases,
                ..
            } => {
                let scrutinee = self.eval_expr(discriminant, env)?;
                for case in cases {
                    let child = env.child();
                    if self.match_pattern(&case.pattern, &scrutinee, &child) {
                        return self.exec_stmts(&case.body, &child);
                    }
                }
                Ok(Value::Null)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                if self.eval_expr(condition, env)?.is_truthy() {
                    let child = env.child();
                    self.exec_stmts(then_branch, &child)
                } else if let Some(else_branch) = else_branch {
                    let child = env.child();
                    self.exec_stmts(else_branch, &child)
                } else {
                    Ok(Value::Null)
                }
            }
            Stmt::While { condition, body, .. } => {
                let mut last = Value::Null;
                loop {
                    if !self.eval_expr(condition, env)?.is_truthy() {
                        break;
                    }
                    let child = env.child();
                    match self.exec_stmts(body, &child) {
                        Ok(v) => last = v,
                        Err(Signal::Break) => break,
                        Err(Signal::Continue) => continue,
                        Err(other) => return Err(other),
                    }
                }
                Ok(last)
            }
            Stmt::For {
                init,
                condition,
                post,
                body,
                ..
            } => {
                let loop_env = env.child();
                if let Some(init) = init {
                    self.exec_stmt(init, &loop_env)?;
                }
                let mut last = Value::Null;
                loop {
                    if let Some(condition) = condition {
                        if !self.eval_expr(condition, &loop_env)?.is_truthy() {
                            break;
                        }
                    }
                    let body_scope = loop_env.child();
                    match self.exec_stmts(body, &body_scope) {
                        Ok(v) => last = v,
                        Err(Signal::Break) => break,
                        Err(Signal::Continue) => {}
                        Err(other) => return Err(other),
                    }
                    if let Some(post) = post {
                        self.exec_stmt(post, &loop_env)?;
                    }
                }
                Ok(last)
            }
            Stmt::Using {
                resource,
                binding,
                body,
                span,
            } => {
                let value = self.eval_expr(resource, env)?;
                let scope = env.child();
                scope.define(binding.clone(), value.clone());
                let result = self.exec_stmts(body, &scope);
                self.dispose(&value, *span);
                result
            }
            Stmt::Try {
                body,
                catch,
                finally,
                ..
            } => {
                let scope = env.child();
                let mut result = self.exec_stmts(body, &scope);
                if let Err(Signal::Error(err)) = &result {
                    if let Some(CatchClause { binding, body: catch_body }) = catch {
                        let catch_scope = env.child();
                        if let Some(binding) = binding {
                            catch_scope.define(binding.clone(), err.as_catch_value());
                        }
                        result = self.exec_stmts(catch_body, &catch_scope);
                    }
                }
                if let Some(finally) = finally {
                    let finally_scope = env.child();
                    self.exec_stmts(finally, &finally_scope)?;
                }
                result
            }
            Stmt::Throw { value, span } => {
                let v = self.eval_expr(value, env)?;
                Err(RuntimeError::thrown(v, *span).into())
            }
            Stmt::Condition {
                clauses,
                else_branch,
                ..
            } => {
                for clause in clauses {
                    if self.eval_expr(&clause.guard, env)?.is_truthy() {
                        let child = env.child();
                        return self.exec_stmts(&clause.body, &child);
                    }
                }
                if let Some(else_branch) = else_branch {
                    let child = env.child();
                    return self.exec_stmts(else_branch, &child);
                }
                Ok(Value::Null)
            }
            Stmt::Return { value, .. } => {
                let v = match value {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => Value::Null,
                };
                Err(Signal::Return(v))
            }
            Stmt::Break(_) => Err(Signal::Break),
            Stmt::Continue(_) => Err(Signal::Continue),
            Stmt::Block(body, _) => {
                let child = env.child();
                self.exec_stmts(body, &child)
            }
            Stmt::Expr(expr) => self.eval_expr(expr, env),
        }
    }

    /// Build a method table from a struct/class/enum body's nested
    /// `FunctionDecl` statements, closing each over the declaring
    /// scope so methods can see sibling top-level bindings.
    fn collect_methods(
        &self,
        methods: &[Stmt],
        env: &Environment,
        table: &mut FxHashMap<String, Arc<FunctionValue>>,
    ) {
        for method in methods {
            if let Stmt::FunctionDecl {
                name,
                params,
                body,
                contract,
                ..
            } = method
            {
                let param_names = params.iter().map(|p| p.name.clone()).collect();
                table.insert(
                    name.clone(),
                    Arc::new(FunctionValue::UserDefined {
                        name: Some(name.clone()),
                        params: param_names,
                        body: body.clone(),
                        closure: env.clone(),
                        contract: contract.clone(),
                    }),
                );
            }
        }
    }

    /// `using` guarantees its resource's closer runs on every exit
    /// path. Tries `close` first, then `dispose`, via whichever method
    /// resolution (instance table or extension registry) would answer
    /// a normal method call; silently does nothing if neither exists.
    fn dispose(&self, value: &Value, span: Span) {
        if let Some(result) = self.call_builtin_method(value, "close", &[], span) {
            let _ = result;
            return;
        }
        if let Some(method) = self
            .lookup_method(value, "close")
            .or_else(|| self.lookup_method(value, "dispose"))
        {
            let bound = method.bind(value.clone());
            let _ = self.invoke(&bound, Vec::new(), span);
        }
    }

    pub fn eval_expr(&self, expr: &Expr, env: &Environment) -> Signaled<Value> {
        match expr {
            Expr::Number(s, span) => s
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|_| RuntimeError::at("invalid number literal", *span).into()),
            Expr::Str(s, _) => Ok(Value::string(s.clone())),
            Expr::FormatStr(parts, _) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        FormatPart::Text(text) => out.push_str(text),
                        FormatPart::Expr(expr) => {
                            let v = self.eval_expr(expr, env)?;
                            out.push_str(&v.inspect());
                        }
                    }
                }
                Ok(Value::string(out))
            }
            Expr::RawStr(s, _) => Ok(Value::string(s.clone())),
            Expr::Bool(b, _) => Ok(Value::Boolean(*b)),
            Expr::Null(_) => Ok(Value::Null),
            Expr::Identifier(name, span) => env
                .get(name)
                .ok_or_else(|| RuntimeError::at(format!("undefined identifier {name}"), *span).into()),
            Expr::Array(items, _) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item, env)?);
                }
                Ok(Value::Array(Arc::new(Mutex::new(values))))
            }
            Expr::Object(fields, _) => {
                let mut map = indexmap::IndexMap::with_capacity(fields.len());
                for (key, value) in fields {
                    map.insert(key.clone(), self.eval_expr(value, env)?);
                }
                Ok(Value::Object(Arc::new(Mutex::new(map))))
            }
            Expr::Prefix { op, operand, span } => {
                let v = self.eval_expr(operand, env)?;
                match (op, &v) {
                    (UnaryOp::Negate, Value::Number(n)) => Ok(Value::Number(-n)),
                    (UnaryOp::Plus, Value::Number(n)) => Ok(Value::Number(*n)),
                    (UnaryOp::Not, _) => Ok(Value::Boolean(!v.is_truthy())),
                    (UnaryOp::Negate, other) | (UnaryOp::Plus, other) => Err(RuntimeError::at(
                        format!("cannot negate {}", other.type_name()),
                        *span,
                    )
                    .into()),
                }
            }
            Expr::Infix { op, lhs, rhs, span } => match op {
                BinaryOp::And => {
                    let l = self.eval_expr(lhs, env)?;
                    if !l.is_truthy() {
                        Ok(l)
                    } else {
                        self.eval_expr(rhs, env)
                    }
                }
                BinaryOp::Or => {
                    let l = self.eval_expr(lhs, env)?;
                    if l.is_truthy() {
                        Ok(l)
                    } else {
                        self.eval_expr(rhs, env)
                    }
                }
                _ => {
                    let l = self.eval_expr(lhs, env)?;
                    let r = self.eval_expr(rhs, env)?;
                    apply_binary(*op, l, r, *span)
                }
            },
            Expr::Is {
                operand,
                type_name,
                negated,
                ..
            } => {
                let v = self.eval_expr(operand, env)?;
                let matches = v.type_name() == *type_name
                    || matches!(&v, Value::ClassInstance(inst) if implements_interface(&inst.def, type_name));
                Ok(Value::Boolean(matches != *negated))
            }
            Expr::Elvis { lhs, rhs, .. } => {
                let l = self.eval_expr(lhs, env)?;
                if matches!(l, Value::Null) {
                    self.eval_expr(rhs, env)
                } else {
                    Ok(l)
                }
            }
            Expr::Assign { target, value, .. } => {
                let v = self.eval_expr(value, env)?;
                self.assign_to(target, v, env)
            }
            Expr::Call { callee, args, span } => {
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.eval_expr(arg, env)?);
                }
                if let Expr::Member {
                    object,
                    name,
                    optional,
                    ..
                } = callee.as_ref()
                {
                    let receiver = self.eval_expr(object, env)?;
                    if *optional && matches!(receiver, Value::Null) {
                        return Ok(Value::Null);
                    }
                    return self.call_method(&receiver, name, arg_values, *span);
                }
                let callee_val = self.eval_expr(callee, env)?;
                self.call_value(callee_val, arg_values, *span)
            }
            Expr::Index { object, index, span } => {
                let obj = self.eval_expr(object, env)?;
                let idx = self.eval_expr(index, env)?;
                self.index_get(&obj, &idx, *span)
            }
            Expr::Member {
                object,
                name,
                optional,
                span,
            } => {
                let obj = self.eval_expr(object, env)?;
                if *optional && matches!(obj, Value::Null) {
                    return Ok(Value::Null);
                }
                self.member_get(&obj, name, *span)
            }
            Expr::NonNullAssertion { operand, span } => {
                let v = self.eval_expr(operand, env)?;
                if matches!(v, Value::Null) {
                    Err(RuntimeError::at("encountered null in non-null assertion", *span).into())
                } else {
                    Ok(v)
                }
            }
            Expr::Await { operand, .. } => {
                let v = self.eval_expr(operand, env)?;
                match v {
                    Value::Task(task) => task.await_result().map_err(Signal::Error),
                    other => Ok(other),
                }
            }
        }
    }

    fn assign_to(&self, target: &Expr, value: Value, env: &Environment) -> Signaled<Value> {
        match target {
            Expr::Identifier(name, span) => {
                env.assign(name, value.clone())
                    .map_err(|e| Signal::Error(RuntimeError::at(e.message, *span)))?;
                Ok(value)
            }
            Expr::Member { object, name, span, .. } => {
                let obj = self.eval_expr(object, env)?;
                match &obj {
                    Value::Object(map) => {
                        map.lock().insert(name.clone(), value.clone());
                        Ok(value)
                    }
                    Value::StructInstance(inst) => {
                        inst.fields.lock().insert(name.clone(), value.clone());
                        Ok(value)
                    }
                    Value::ClassInstance(inst) => {
                        inst.fields.lock().insert(name.clone(), value.clone());
                        Ok(value)
                    }
                    Value::EnumInstance(inst) => {
                        inst.fields.lock().insert(name.clone(), value.clone());
                        Ok(value)
                    }
                    other => Err(RuntimeError::at(
                        format!("cannot assign a field on a value of type {}", other.type_name()),
                        *span,
                    )
                    .into()),
                }
            }
            Expr::Index { object, index, span } => {
                let obj = self.eval_expr(object, env)?;
                let idx = self.eval_expr(index, env)?;
                self.index_set(&obj, &idx, value.clone(), *span)?;
                Ok(value)
            }
            other => Err(RuntimeError::at("invalid assignment target", other.span()).into()),
        }
    }

    fn index_get(&self, obj: &Value, idx: &Value, span: Span) -> Signaled<Value> {
        match obj {
            Value::Array(items) => {
                let n = require_index_number(idx, span, "array")?;
                let items = items.lock();
                if n < 0 || n as usize >= items.len() {
                    return Err(RuntimeError::at(format!("array index {n} out of range"), span).into());
                }
                Ok(items[n as usize].clone())
            }
            Value::String(s) => {
                let n = require_index_number(idx, span, "string")?;
                let chars: Vec<char> = s.chars().collect();
                if n < 0 || n as usize >= chars.len() {
                    return Err(RuntimeError::at(format!("string index {n} out of range"), span).into());
                }
                Ok(Value::string(chars[n as usize].to_string()))
            }
            other => Err(RuntimeError::at(
                format!("cannot index into a value of type {}", other.type_name()),
                span,
            )
            .into()),
        }
    }

    fn index_set(&self, obj: &Value, idx: &Value, value: Value, span: Span) -> Signaled<()> {
        match obj {
            Value::Array(items) => {
                let n = require_index_number(idx, span, "array")?;
                let mut items = items.lock();
                if n < 0 {
                    return Err(RuntimeError::at(format!("array index {n} out of range"), span).into());
                }
                let n = n as usize;
                if n == items.len() {
                    items.push(value);
                } else if n < items.len() {
                    items[n] = value;
                } else {
                    return Err(RuntimeError::at(format!("array index {n} out of range"), span).into());
                }
                Ok(())
            }
            other => Err(RuntimeError::at(
                format!("cannot index into a value of type {}", other.type_name()),
                span,
            )
            .into()),
        }
    }

    fn member_get(&self, obj: &Value, name: &str, span: Span) -> Signaled<Value> {
        match obj {
            Value::Object(map) => map
                .lock()
                .get(name)
                .cloned()
                .ok_or_else(|| RuntimeError::at(format!("Object has no property {name}"), span).into()),
            Value::Module(module) => module
                .exports
                .get(name)
                .cloned()
                .ok_or_else(|| RuntimeError::at(format!("Module has no property {name}"), span).into()),
            Value::Contract(contract) => contract
                .exports
                .get(name)
                .cloned()
                .ok_or_else(|| RuntimeError::at(format!("Contract has no property {name}"), span).into()),
            Value::Array(items) if name == "length" => Ok(Value::Number(items.lock().len() as f64)),
            Value::String(s) if name == "length" => Ok(Value::Number(s.chars().count() as f64)),
            Value::StructInstance(inst) => {
                if let Some(v) = inst.fields.lock().get(name) {
                    return Ok(v.clone());
                }
                if let Some(method) = self.lookup_method(obj, name) {
                    return Ok(Value::Function(method.bind(obj.clone())));
                }
                Err(RuntimeError::at(format!("{} has no property {name}", inst.def.name), span).into())
            }
            Value::ClassInstance(inst) => {
                if let Some(v) = inst.fields.lock().get(name) {
                    return Ok(v.clone());
                }
                if let Some(method) = self.lookup_method(obj, name) {
                    return Ok(Value::Function(method.bind(obj.clone())));
                }
                Err(RuntimeError::at(format!("{} has no property {name}", inst.def.name), span).into())
            }
            Value::StructType(def) => {
                if let Some(v) = def.statics.get(name) {
                    return Ok(v.clone());
                }
                if let Some(method) = def.methods.get(name) {
                    return Ok(Value::Function(Arc::clone(method)));
                }
                Err(RuntimeError::at(format!("{} has no property {name}", def.name), span).into())
            }
            Value::ClassType(def) => {
                if let Some(v) = def.resolve_static(name) {
                    return Ok(v);
                }
                if let Some(method) = def.resolve_method(name) {
                    return Ok(Value::Function(method));
                }
                Err(RuntimeError::at(format!("{} has no property {name}", def.name), span).into())
            }
            Value::EnumType(def) => {
                if let Some(case) = def.case(name) {
                    return Ok(self.enum_case_value(def, case));
                }
                if let Some(method) = def.methods.get(name) {
                    return Ok(Value::Function(Arc::clone(method)));
                }
                Err(RuntimeError::at(format!("{} has no property {name}", def.name), span).into())
            }
            Value::EnumInstance(inst) => {
                if name == "case" {
                    return Ok(Value::string(inst.case.clone()));
                }
                if let Some(v) = inst.fields.lock().get(name) {
                    return Ok(v.clone());
                }
                if let Some(method) = self.lookup_method(obj, name) {
                    return Ok(Value::Function(method.bind(obj.clone())));
                }
                Err(RuntimeError::at(format!("{} has no property {name}", inst.def.name), span).into())
            }
            other => Err(RuntimeError::at(
                format!("{} has no property {name}", other.type_name()),
                span,
            )
            .into()),
        }
    }

    /// An enum case with no declared fields resolves directly to its
    /// (singleton-shaped, but freshly built) instance; a case with
    /// declared fields resolves to a native constructor that must be
    /// called to produce one.
    fn enum_case_value(&self, def: &Arc<EnumTypeDef>, case: &EnumCaseDef) -> Value {
        if case.fields.is_empty() {
            return Value::EnumInstance(Arc::new(EnumInstance {
                def: Arc::clone(def),
                case: case.name.clone(),
                field_order: Vec::new(),
                fields: Mutex::new(FxHashMap::default()),
            }));
        }
        let def = Arc::clone(def);
        let case_name = case.name.clone();
        let field_order = case.fields.clone();
        Value::Function(Arc::new(FunctionValue::Native {
            name: "<enum case>",
            func: Box::new(move |args: &[Value]| {
                if args.len() != field_order.len() {
                    return Err(RuntimeError::new(format!(
                        "expected {} arguments, got {}",
                        field_order.len(),
                        args.len()
                    )));
                }
                let mut fields = FxHashMap::default();
                for (name, value) in field_order.iter().zip(args.iter().cloned()) {
                    fields.insert(name.clone(), value);
                }
                Ok(Value::EnumInstance(Arc::new(EnumInstance {
                    def: Arc::clone(&def),
                    case: case_name.clone(),
                    field_order: field_order.clone(),
                    fields: Mutex::new(fields),
                })))
            }),
        }))
    }

    fn lookup_method(&self, receiver: &Value, name: &str) -> Option<Arc<FunctionValue>> {
        match receiver {
            Value::StructInstance(inst) => inst
                .def
                .methods
                .get(name)
                .cloned()
                .or_else(|| ExtensionRegistry::global().lookup(&inst.def.name, name)),
            Value::ClassInstance(inst) => inst
                .def
                .resolve_method(name)
                .or_else(|| ExtensionRegistry::global().lookup(&inst.def.name, name)),
            Value::EnumInstance(inst) => inst
                .def
                .methods
                .get(name)
                .cloned()
                .or_else(|| ExtensionRegistry::global().lookup(&inst.def.name, name)),
            other => ExtensionRegistry::global().lookup(&other.type_name(), name),
        }
    }

    fn call_method(&self, receiver: &Value, name: &str, args: Vec<Value>, span: Span) -> Signaled<Value> {
        if let Some(result) = self.call_builtin_method(receiver, name, &args, span) {
            return result;
        }
        match self.lookup_method(receiver, name) {
            Some(method) => {
                let bound = method.bind(receiver.clone());
                self.invoke(&bound, args, span)
            }
            None => Err(RuntimeError::at(
                format!("{} has no property {name}", receiver.type_name()),
                span,
            )
            .into()),
        }
    }

    /// Native methods on `Channel`/`Task` values -- these aren't
    /// user-definable types, so they're dispatched here rather than
    /// through `lookup_method`'s instance/extension-registry path.
    /// Returns `None` when `name` isn't one of these built-ins, so the
    /// caller falls back to ordinary method resolution (and, for any
    /// other receiver kind, to the extension registry).
    fn call_builtin_method(
        &self,
        receiver: &Value,
        name: &str,
        args: &[Value],
        span: Span,
    ) -> Option<Signaled<Value>> {
        match receiver {
            Value::Channel(channel) => match name {
                "send" => Some(match args {
                    [value] => channel
                        .send(value.clone())
                        .map(|_| Value::Null)
                        .map_err(|e| RuntimeError::at(e.message, span).into()),
                    _ => Err(RuntimeError::at(
                        format!("expected 1 arguments, got {}", args.len()),
                        span,
                    )
                    .into()),
                }),
                "recv" => Some(
                    channel
                        .recv()
                        .map_err(|e| RuntimeError::at(e.message, span).into()),
                ),
                "close" => Some({
                    channel.close();
                    Ok(Value::Null)
                }),
                "isClosed" => Some(Ok(Value::Boolean(channel.is_closed()))),
                _ => None,
            },
            Value::Task(task) => match name {
                "isDone" => Some(Ok(Value::Boolean(task.is_done()))),
                _ => None,
            },
            _ => None,
        }
    }

    fn call_value(&self, callee: Value, args: Vec<Value>, span: Span) -> Signaled<Value> {
        match callee {
            Value::Function(func) => self.invoke(&func, args, span),
            Value::StructType(def) => self.instantiate_struct(&def, args, span),
            Value::ClassType(def) => self.instantiate_class(&def, args, span),
            other => Err(RuntimeError::at(format!("{} is not callable", other.type_name()), span).into()),
        }
    }

    pub fn invoke(&self, func: &Arc<FunctionValue>, args: Vec<Value>, span: Span) -> Signaled<Value> {
        match func.as_ref() {
            FunctionValue::Native { func, .. } => func(&args).map_err(Signal::Error),
            FunctionValue::UserDefined {
                name,
                params,
                body,
                closure,
                contract,
            } => {
                if args.len() != params.len() {
                    return Err(RuntimeError::at(
                        format!("expected {} arguments, got {}", params.len(), args.len()),
                        span,
                    )
                    .into());
                }
                let call_scope = closure.child();
                for (param, arg) in params.iter().zip(args) {
                    call_scope.define(param.clone(), arg);
                }
                let result = match body {
                    FunctionBody::Block(stmts) => match self.exec_stmts(stmts, &call_scope) {
                        Ok(v) => v,
                        Err(Signal::Return(v)) => v,
                        Err(other) => return Err(other),
                    },
                    FunctionBody::Expr(expr) => self.eval_expr(expr, &call_scope)?,
                };
                if let Some(contract) = contract {
                    self.check_contract(contract, name.as_deref().unwrap_or("<anonymous>"), &result, &call_scope, span)?;
                }
                Ok(result)
            }
        }
    }

    fn check_contract(
        &self,
        contract: &FunctionContract,
        fn_name: &str,
        result: &Value,
        outer: &Environment,
        span: Span,
    ) -> Signaled<()> {
        for clause in &contract.clauses {
            let scope = outer.child();
            scope.define("result", result.clone());
            let guard_holds = match &clause.guard {
                Some(guard) => self.eval_expr(guard, &scope)?.is_truthy(),
                None => true,
            };
            if guard_holds && !self.eval_expr(&clause.postcondition, &scope)?.is_truthy() {
                return Err(RuntimeError::at(format!("contract violation in {fn_name}"), span).into());
            }
        }
        Ok(())
    }

    fn instantiate_struct(&self, def: &Arc<StructTypeDef>, args: Vec<Value>, span: Span) -> Signaled<Value> {
        if args.len() != def.fields.len() {
            return Err(RuntimeError::at(
                format!("expected {} arguments, got {}", def.fields.len(), args.len()),
                span,
            )
            .into());
        }
        let mut fields = FxHashMap::default();
        for (name, value) in def.fields.iter().zip(args) {
            fields.insert(name.clone(), value);
        }
        let instance = Value::StructInstance(Arc::new(StructInstance {
            def: Arc::clone(def),
            fields: Mutex::new(fields),
        }));
        if let Some(init) = def.methods.get("init") {
            let bound = init.bind(instance.clone());
            self.invoke(&bound, Vec::new(), span)?;
        }
        Ok(instance)
    }

    fn instantiate_class(&self, def: &Arc<ClassTypeDef>, args: Vec<Value>, span: Span) -> Signaled<Value> {
        if args.len() != def.fields.len() {
            return Err(RuntimeError::at(
                format!("expected {} arguments, got {}", def.fields.len(), args.len()),
                span,
            )
            .into());
        }
        let mut fields = FxHashMap::default();
        for (name, value) in def.fields.iter().zip(args) {
            fields.insert(name.clone(), value);
        }
        let instance = Value::ClassInstance(Arc::new(ClassInstance {
            def: Arc::clone(def),
            fields: Mutex::new(fields),
        }));
        if let Some(init) = def.resolve_method("init") {
            let bound = init.bind(instance.clone());
            self.invoke(&bound, Vec::new(), span)?;
        }
        Ok(instance)
    }

    fn match_pattern(&self, pattern: &Pattern, value: &Value, scope: &Environment) -> bool {
        match pattern {
            Pattern::Identifier(name, _) => {
                scope.define(name.clone(), value.clone());
                true
            }
            Pattern::Literal(lit, _) => literal_matches(lit, value),
            Pattern::Object(pairs, _) => {
                let Value::Object(map) = value else { return false };
                let map = map.lock();
                for (key, sub) in pairs {
                    let Some(field_value) = map.get(key) else { return false };
                    if !self.match_pattern(sub, field_value, scope) {
                        return false;
                    }
                }
                true
            }
            Pattern::Struct { name, subpatterns, .. } => match value {
                Value::StructInstance(inst) if inst.def.name == *name => {
                    let fields = inst.fields.lock();
                    self.bind_positional(&inst.def.fields, &fields, subpatterns, scope)
                }
                Value::ClassInstance(inst) if inst.def.name == *name => {
                    let fields = inst.fields.lock();
                    self.bind_positional(&inst.def.fields, &fields, subpatterns, scope)
                }
                Value::EnumInstance(inst) if inst.case == *name => {
                    let fields = inst.fields.lock();
                    self.bind_positional(&inst.field_order, &fields, subpatterns, scope)
                }
                _ => false,
            },
        }
    }

    fn bind_positional(
        &self,
        field_order: &[String],
        fields: &FxHashMap<String, Value>,
        subpatterns: &[Pattern],
        scope: &Environment,
    ) -> bool {
        if subpatterns.len() != field_order.len() {
            return false;
        }
        for (field_name, sub) in field_order.iter().zip(subpatterns) {
            let Some(v) = fields.get(field_name) else { return false };
            if !self.match_pattern(sub, v, scope) {
                return false;
            }
        }
        true
    }
}

fn literal_matches(lit: &LiteralPattern, value: &Value) -> bool {
    match (lit, value) {
        (LiteralPattern::Number(s), Value::Number(n)) => s.parse::<f64>().map(|p| p == *n).unwrap_or(false),
        (LiteralPattern::Str(s), Value::String(v)) => s.as_str() == v.as_ref(),
        (LiteralPattern::Bool(b), Value::Boolean(v)) => b == v,
        (LiteralPattern::Null, Value::Null) => true,
        _ => false,
    }
}

fn implements_interface(def: &ClassTypeDef, name: &str) -> bool {
    def.interfaces.iter().any(|i| i == name)
        || def.superclass.as_ref().is_some_and(|s| implements_interface(s, name))
}

fn require_index_number(idx: &Value, span: Span, kind: &str) -> Signaled<i64> {
    match idx {
        Value::Number(n) => Ok(*n as i64),
        _ => Err(RuntimeError::at(format!("{kind} index must be Number"), span).into()),
    }
}

/// `+` overloads onto string concatenation when either side is a
/// String, otherwise both operands must be Numbers; the rest of the
/// arithmetic and comparison operators require two Numbers outright.
fn apply_binary(op: BinaryOp, l: Value, r: Value, span: Span) -> Signaled<Value> {
    match op {
        BinaryOp::Add => match (&l, &r) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(_), _) | (_, Value::String(_)) => {
                Ok(Value::string(format!("{}{}", l.inspect(), r.inspect())))
            }
            _ => Err(RuntimeError::at(format!("cannot add {} to Number", r.type_name()), span).into()),
        },
        BinaryOp::Sub => {
            let (a, b) = require_numbers(op, &l, &r, span)?;
            Ok(Value::Number(a - b))
        }
        BinaryOp::Mul => {
            let (a, b) = require_numbers(op, &l, &r, span)?;
            Ok(Value::Number(a * b))
        }
        BinaryOp::Div => {
            let (a, b) = require_numbers(op, &l, &r, span)?;
            if b == 0.0 {
                return Err(RuntimeError::at("division by zero", span).into());
            }
            Ok(Value::Number(a / b))
        }
        BinaryOp::Rem => {
            let (a, b) = require_numbers(op, &l, &r, span)?;
            if b == 0.0 {
                return Err(RuntimeError::at("modulo by zero", span).into());
            }
            Ok(Value::Number(a % b))
        }
        BinaryOp::Eq => Ok(Value::Boolean(l.values_equal(&r))),
        BinaryOp::NotEq => Ok(Value::Boolean(!l.values_equal(&r))),
        BinaryOp::Lt => {
            let (a, b) = require_numbers(op, &l, &r, span)?;
            Ok(Value::Boolean(a < b))
        }
        BinaryOp::LtEq => {
            let (a, b) = require_numbers(op, &l, &r, span)?;
            Ok(Value::Boolean(a <= b))
        }
        BinaryOp::Gt => {
            let (a, b) = require_numbers(op, &l, &r, span)?;
            Ok(Value::Boolean(a > b))
        }
        BinaryOp::GtEq => {
            let (a, b) = require_numbers(op, &l, &r, span)?;
            Ok(Value::Boolean(a >= b))
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("short-circuited before reaching apply_binary"),
    }
}

fn binary_op_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
        BinaryOp::Eq => "==",
        BinaryOp::NotEq => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::LtEq => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::GtEq => ">=",
        BinaryOp::And => "&&",
        BinaryOp::Or => "||",
    }
}

fn require_numbers(op: BinaryOp, l: &Value, r: &Value, span: Span) -> Signaled<(f64, f64)> {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        (Value::Number(_), other) => Err(RuntimeError::at(
            format!("operator {} not supported for {}", binary_op_symbol(op), other.type_name()),
            span,
        )
        .into()),
        (other, _) => Err(RuntimeError::at(
            format!("operator {} not supported for {}", binary_op_symbol(op), other.type_name()),
            span,
        )
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use selene_parser::parse;

    fn run_source(src: &str) -> Value {
        let (program, errors) = parse(src);
        assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
        let interpreter = Interpreter::new();
        let env = Environment::root();
        interpreter.run(&program.items, &env).expect("program should run")
    }

    #[test]
    fn arithmetic_and_let_bindings() {
        let result = run_source("let x = 1; let y = 2; x + y;");
        assert!(matches!(result, Value::Number(n) if n == 3.0));
    }

    #[test]
    fn recursive_factorial() {
        let result = run_source(
            "fn fact(n) { if n <= 1 { return 1; } return n * fact(n - 1); } fact(5);",
        );
        assert!(matches!(result, Value::Number(n) if n == 120.0));
    }

    #[test]
    fn elvis_and_safe_dot() {
        let present = run_source("let a = { k: 1 }; a?.k ?: 99;");
        assert!(matches!(present, Value::Number(n) if n == 1.0));
        let missing = run_source("null?.k ?: 99;");
        assert!(matches!(missing, Value::Number(n) if n == 99.0));
    }

    #[test]
    fn enum_case_and_match() {
        let result = run_source(
            "enum Opt { Some(v); None; } let x = Opt.Some(7); match x { Some(v) => v + 1; None => 0; }",
        );
        assert!(matches!(result, Value::Number(n) if n == 8.0));
    }

    #[test]
    fn contract_enforcement_clamps() {
        let src = "fn clamp(v, lo, hi) contract { returns(result) => result >= lo; returns(result) => result <= hi; } { if v < lo { return lo; } if v > hi { return hi; } return v; } clamp(5, 0, 10);";
        let result = run_source(src);
        assert!(matches!(result, Value::Number(n) if n == 5.0));
        let clamped_low = run_source(&src.replace("clamp(5, 0, 10);", "clamp(-3, 0, 10);"));
        assert!(matches!(clamped_low, Value::Number(n) if n == 0.0));
    }

    #[test]
    fn while_break_returns_last_body_value() {
        let result = run_source(
            "var i = 0; var last = 0; while i < 5 { last = i; i = i + 1; if i == 3 { break; } } last;",
        );
        assert!(matches!(result, Value::Number(n) if n == 2.0));
    }

    #[test]
    fn for_loop_runs_post_after_continue() {
        let result = run_source(
            "var sum = 0; for (var i = 0; i < 5; i = i + 1) { if i == 2 { continue; } sum = sum + i; } sum;",
        );
        assert!(matches!(result, Value::Number(n) if n == 8.0));
    }

    #[test]
    fn closure_observes_later_mutation() {
        let result = run_source(
            "var counter = 0; fn bump() { return counter + 1; } counter = 10; bump();",
        );
        assert!(matches!(result, Value::Number(n) if n == 11.0));
    }

    #[test]
    fn return_outside_function_is_an_error() {
        let (program, errors) = parse("return 1;");
        assert!(errors.is_empty());
        let interpreter = Interpreter::new();
        let env = Environment::root();
        let err = interpreter.run(&program.items, &env).unwrap_err();
        assert_eq!(err.message, "return outside of function");
    }

    #[test]
    fn throw_is_caught_with_original_value() {
        let result = run_source(
            "try { throw \"boom\"; } catch (e) { e; } finally {}",
        );
        assert!(matches!(result, Value::String(s) if &*s == "boom"));
    }
}
