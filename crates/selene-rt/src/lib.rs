pub mod builtins;
pub mod closure_engine;
pub mod environment;
pub mod error;
pub mod extensions;
pub mod interpreter;
pub mod main_invoke;
pub mod task;
pub mod value;
pub mod vm;

use selene_parser::ast::ProgramItem;
use selene_parser::Program;

pub use builtins::OutputSink;
pub use environment::Environment;
pub use error::RuntimeError;
pub use interpreter::Interpreter;
pub use value::Value;
pub use vm::{disassemble, Chunk};

/// In-process runtime tunables. Deliberately small: the project
/// manifest / package-config surface is an out-of-scope collaborator,
/// so this only configures knobs the core itself acts on.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Reserved for a future bounded worker pool behind `spawn`; `None`
    /// means every `spawn` call gets its own ad hoc OS thread, which is
    /// the only pooling strategy currently implemented.
    pub worker_threads: Option<usize>,
    /// Gate for a per-invoke tracing span. Currently only read by
    /// `Runtime::invoke_main`, which logs a single `[selene-rt]` line
    /// around the auto-invoked `main` call when set.
    pub trace_calls: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            trace_calls: false,
        }
    }
}

/// Owns one `Environment` and can drive a `Program` through any of the
/// three execution engines. Two `Runtime`s in the same process still share
/// the process-wide extension registry (`extensions::ExtensionRegistry`
/// is a `OnceLock`, not owned by `Runtime`).
pub struct Runtime {
    config: RuntimeConfig,
    environment: Environment,
    interpreter: Interpreter,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let environment = Environment::root();
        builtins::install(&environment, builtins::stdout_sink());
        Self {
            config,
            environment,
            interpreter: Interpreter::new(),
        }
    }

    /// Build a `Runtime` whose `print` writes to a caller-supplied sink
    /// instead of stdout -- the hook tests use to assert on output.
    pub fn with_output(output: OutputSink) -> Self {
        let environment = Environment::root();
        builtins::install(&environment, output);
        Self {
            config: RuntimeConfig::default(),
            environment,
            interpreter: Interpreter::new(),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Run a program through the tree-walking interpreter, item by
    /// item, returning the last item's value.
    pub fn run(&self, program: &Program) -> Result<Value, RuntimeError> {
        self.interpreter.run(&program.items, &self.environment)
    }

    /// Compile a program into a bytecode chunk. Consumes the program's
    /// items (the chunk owns its own item table).
    pub fn compile(&self, program: Program) -> Chunk {
        vm::compile(program.items)
    }

    pub fn run_chunk(&self, chunk: &Chunk) -> Result<Value, RuntimeError> {
        vm::run(chunk, &self.environment)
    }

    /// Build and run the eager-closure engine's program in one call;
    /// there is no separate "compiled form" worth exposing beyond the
    /// closures themselves, since `ClosureProgram` is single-use by
    /// construction (it binds over this `Runtime`'s own interpreter).
    pub fn run_closures(&self, items: Vec<ProgramItem>) -> Result<Value, RuntimeError> {
        let compiled = closure_engine::compile(items);
        closure_engine::run(&compiled, &self.environment)
    }

    /// Run `program` through `engine`, then apply the auto-invoke pass:
    /// if the program declares `main` and never calls it at the top
    /// level, invoke it now and return its value instead.
    pub fn run_with_auto_main(
        &self,
        program: &Program,
        engine: ExecutionEngine,
    ) -> Result<Value, RuntimeError> {
        let analysis = main_invoke::analyze(program);
        let result = match engine {
            ExecutionEngine::TreeWalking => self.run(program)?,
            ExecutionEngine::BytecodeVm => {
                let chunk = vm::compile(program.items.clone());
                self.run_chunk(&chunk)?
            }
            ExecutionEngine::EagerClosures => self.run_closures(program.items.clone())?,
        };
        if analysis.should_auto_invoke() {
            self.invoke_main()
        } else {
            Ok(result)
        }
    }

    fn invoke_main(&self) -> Result<Value, RuntimeError> {
        if self.config.trace_calls {
            eprintln!("[selene-rt] auto-invoking main");
        }
        let main = self
            .environment
            .get("main")
            .and_then(|v| match v {
                Value::Function(f) => Some(f),
                _ => None,
            })
            .ok_or_else(|| RuntimeError::new("undefined identifier main"))?;
        let call_span = selene_common::Span::point(selene_common::Position::start());
        self.interpreter
            .invoke(&main, Vec::new(), call_span)
            .map_err(|signal| match signal {
                interpreter::Signal::Error(err) => err,
                _ => RuntimeError::new("main exited via a control signal instead of returning"),
            })
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Which front-end `Runtime::run_with_auto_main` should drive the
/// program through. All three are required to agree on the final
/// value for any given program -- see `tests/engine_parity.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionEngine {
    TreeWalking,
    BytecodeVm,
    EagerClosures,
}

#[cfg(test)]
mod tests {
    use super::*;
    use selene_parser::parse;

    fn parse_ok(src: &str) -> Program {
        let (program, errors) = parse(src);
        assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
        program
    }

    #[test]
    fn run_evaluates_top_level_items_in_order() {
        let runtime = Runtime::new();
        let program = parse_ok("let x = 1; let y = 2; x + y;");
        let result = runtime.run(&program).unwrap();
        assert!(matches!(result, Value::Number(n) if n == 3.0));
    }

    #[test]
    fn compile_and_run_chunk_agrees_with_the_interpreter() {
        let runtime = Runtime::new();
        let program = parse_ok(
            "fn fact(n) { if n <= 1 { return 1; } return n * fact(n - 1); } fact(5);",
        );
        let chunk = runtime.compile(program);
        let result = runtime.run_chunk(&chunk).unwrap();
        assert!(matches!(result, Value::Number(n) if n == 120.0));
    }

    #[test]
    fn auto_main_invokes_a_declared_but_uncalled_main_exactly_once() {
        let buffer = std::sync::Arc::new(std::sync::Mutex::new(Vec::<u8>::new()));
        struct SharedBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);
        impl std::io::Write for SharedBuffer {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let boxed: Box<dyn std::io::Write + Send> =
            Box::new(SharedBuffer(std::sync::Arc::clone(&buffer)));
        let sink: OutputSink = std::sync::Arc::new(std::sync::Mutex::new(boxed));
        let runtime = Runtime::with_output(sink);
        let program = parse_ok(r#"fn main() { print("hi"); }"#);
        runtime
            .run_with_auto_main(&program, ExecutionEngine::TreeWalking)
            .unwrap();
        let out = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert_eq!(out, "hi\n");
    }

    #[test]
    fn explicit_main_call_is_not_invoked_a_second_time() {
        let runtime = Runtime::new();
        let program = parse_ok("let calls = 0; fn main() { calls = calls + 1; calls; } main();");
        let result = runtime
            .run_with_auto_main(&program, ExecutionEngine::TreeWalking)
            .unwrap();
        assert!(matches!(result, Value::Number(n) if n == 1.0));
    }
}
