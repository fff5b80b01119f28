use std::io::Write;
use std::sync::{Arc, Mutex as StdMutex};
use std::thread;

use selene_common::{Position, Span};

use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::interpreter::{Interpreter, Signal};
use crate::task::{ChannelHandle, TaskHandle};
use crate::value::{FunctionValue, Value};

/// Where `print` writes. A `Runtime` defaults this to stdout; tests
/// swap in a sink backed by a shared `Vec<u8>` to assert on emitted
/// output without touching the process's real stdout.
pub type OutputSink = Arc<StdMutex<Box<dyn Write + Send>>>;

pub fn stdout_sink() -> OutputSink {
    let boxed: Box<dyn Write + Send> = Box::new(std::io::stdout());
    Arc::new(StdMutex::new(boxed))
}

/// Install `print`, `format`, `spawn`, and `channel` into the root
/// scope of a fresh `Environment`.
pub fn install(env: &Environment, output: OutputSink) {
    env.define("print", Value::Function(Arc::new(print_builtin(output))));
    env.define("format", Value::Function(Arc::new(format_builtin())));
    env.define("spawn", Value::Function(Arc::new(spawn_builtin())));
    env.define("channel", Value::Function(Arc::new(channel_builtin())));
}

/// Writes each argument's `inspect()` form separated by a single
/// space, followed by one newline.
fn print_builtin(output: OutputSink) -> FunctionValue {
    FunctionValue::Native {
        name: "print",
        func: Box::new(move |args: &[Value]| {
            let line = args.iter().map(Value::inspect).collect::<Vec<_>>().join(" ");
            let mut out = output.lock().unwrap_or_else(|poison| poison.into_inner());
            writeln!(out, "{line}").map_err(|e| RuntimeError::new(format!("print failed: {e}")))?;
            Ok(Value::Null)
        }),
    }
}

/// `format(template, args...)`: replaces `{}` placeholders left to
/// right with each argument's `inspect()` form. Extra trailing
/// arguments are ignored; a `{}` with no corresponding argument is
/// left in the output verbatim.
fn format_builtin() -> FunctionValue {
    FunctionValue::Native {
        name: "format",
        func: Box::new(|args: &[Value]| {
            let (template, rest) = match args.split_first() {
                Some((Value::String(template), rest)) => (template, rest),
                Some(_) => return Err(RuntimeError::new("format's first argument must be a String")),
                None => return Err(RuntimeError::new("format expects at least a template argument")),
            };
            let mut out = String::with_capacity(template.len());
            let mut rest = rest.iter();
            let mut chars = template.chars().peekable();
            while let Some(c) = chars.next() {
                if c == '{' && chars.peek() == Some(&'}') {
                    chars.next();
                    match rest.next() {
                        Some(v) => out.push_str(&v.inspect()),
                        None => out.push_str("{}"),
                    }
                } else {
                    out.push(c);
                }
            }
            Ok(Value::string(out))
        }),
    }
}

/// `spawn(fn)`: runs the zero-argument `fn` on a fresh OS thread and
/// hands back a `Task` whose result slot it fills exactly once.
fn spawn_builtin() -> FunctionValue {
    FunctionValue::Native {
        name: "spawn",
        func: Box::new(|args: &[Value]| {
            let func = match args {
                [Value::Function(func)] => Arc::clone(func),
                [_] => return Err(RuntimeError::new("spawn's argument must be a Function")),
                _ => return Err(RuntimeError::new(format!("expected 1 arguments, got {}", args.len()))),
            };
            let task = Arc::new(TaskHandle::new());
            let task_for_thread = Arc::clone(&task);
            thread::spawn(move || {
                let interpreter = Interpreter::new();
                let call_span = Span::point(Position::start());
                let result = interpreter.invoke(&func, Vec::new(), call_span).map_err(|signal| match signal {
                    Signal::Error(err) => err,
                    _ => RuntimeError::new("spawned function exited via a control signal instead of returning"),
                });
                if result.is_err() {
                    eprintln!("[selene-rt] spawned task failed");
                }
                task_for_thread.complete(result);
            });
            Ok(Value::Task(task))
        }),
    }
}

/// `channel(capacity?)`: `None`/omitted is unbounded; a Number
/// argument bounds the channel's in-flight message count.
fn channel_builtin() -> FunctionValue {
    FunctionValue::Native {
        name: "channel",
        func: Box::new(|args: &[Value]| {
            let capacity = match args {
                [] => None,
                [Value::Null] => None,
                [Value::Number(n)] if *n >= 0.0 => Some(*n as usize),
                [Value::Number(_)] => return Err(RuntimeError::new("channel capacity must not be negative")),
                [_] => return Err(RuntimeError::new("channel's capacity argument must be a Number")),
                _ => return Err(RuntimeError::new(format!("expected at most 1 arguments, got {}", args.len()))),
            };
            Ok(Value::Channel(Arc::new(ChannelHandle::new(capacity))))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use selene_parser::parse;

    /// Forwards writes into a shared buffer a test can still read back
    /// through its own `Arc` clone after the `OutputSink` has been
    /// boxed away into a trait object.
    struct SharedBuffer(Arc<StdMutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0
                .lock()
                .unwrap_or_else(|poison| poison.into_inner())
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn run_with_output(src: &str) -> String {
        let (program, errors) = parse(src);
        assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
        let env = Environment::root();
        let buffer = Arc::new(StdMutex::new(Vec::<u8>::new()));
        let boxed: Box<dyn Write + Send> = Box::new(SharedBuffer(Arc::clone(&buffer)));
        let sink: OutputSink = Arc::new(StdMutex::new(boxed));
        install(&env, sink);
        let interpreter = Interpreter::new();
        interpreter.run(&program.items, &env).expect("program should run");
        let bytes = buffer.lock().unwrap_or_else(|poison| poison.into_inner());
        String::from_utf8(bytes.clone()).unwrap()
    }

    #[test]
    fn print_joins_with_space_and_trailing_newline() {
        let out = run_with_output(r#"print("hi", 1, true);"#);
        assert_eq!(out, "hi 1 true\n");
    }

    #[test]
    fn print_matches_example_scenario() {
        let out = run_with_output(r#"fn main() { print("hi"); } main();"#);
        assert_eq!(out, "hi\n");
    }

    #[test]
    fn format_substitutes_positional_placeholders() {
        let env = Environment::root();
        install(&env, stdout_sink());
        let interpreter = Interpreter::new();
        let (program, errors) = parse(r#"format("{} plus {} is {}", 1, 2, 3);"#);
        assert!(errors.is_empty());
        let result = interpreter.run(&program.items, &env).unwrap();
        assert!(matches!(result, Value::String(s) if &*s == "1 plus 2 is 3"));
    }

    #[test]
    fn format_leaves_unmatched_placeholder_and_ignores_extra_args() {
        let env = Environment::root();
        install(&env, stdout_sink());
        let interpreter = Interpreter::new();
        let (program, errors) = parse(r#"format("{} and {}", 1, 2, 3);"#);
        assert!(errors.is_empty());
        let result = interpreter.run(&program.items, &env).unwrap();
        assert!(matches!(result, Value::String(s) if &*s == "1 and 2"));
    }

    #[test]
    fn spawn_and_await_round_trip() {
        let env = Environment::root();
        install(&env, stdout_sink());
        let interpreter = Interpreter::new();
        let (program, errors) = parse("fn work() { return 21 * 2; } await spawn(work);");
        assert!(errors.is_empty());
        let result = interpreter.run(&program.items, &env).unwrap();
        assert!(matches!(result, Value::Number(n) if n == 42.0));
    }

    #[test]
    fn channel_send_and_recv_through_language_methods() {
        let env = Environment::root();
        install(&env, stdout_sink());
        let interpreter = Interpreter::new();
        let (program, errors) = parse("let ch = channel(); ch.send(7); ch.recv();");
        assert!(errors.is_empty());
        let result = interpreter.run(&program.items, &env).unwrap();
        assert!(matches!(result, Value::Number(n) if n == 7.0));
    }
}
