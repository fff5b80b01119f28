//! Crate-level black-box suite: the tree-walking interpreter, the
//! bytecode VM, and the eager-closure engine must agree on the final
//! value for the same program. Runs the concrete scenarios each source
//! touches through all three front-ends.

use selene_parser::parse;
use selene_rt::value::Value;
use selene_rt::Runtime;

fn parse_ok(src: &str) -> selene_parser::Program {
    let (program, errors) = parse(src);
    assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
    program
}

/// Runs `src` through all three engines, each against its own fresh
/// `Runtime`, and asserts the final values agree before handing back
/// the interpreter's result for the caller's own assertions.
fn run_all_engines(src: &str) -> Value {
    let tree = Runtime::new();
    let tree_result = tree.run(&parse_ok(src)).expect("interpreter run should succeed");

    let vm_runtime = Runtime::new();
    let chunk = vm_runtime.compile(parse_ok(src));
    let vm_result = vm_runtime.run_chunk(&chunk).expect("vm run should succeed");

    let closures_runtime = Runtime::new();
    let closures_result = closures_runtime
        .run_closures(parse_ok(src).items)
        .expect("closure engine run should succeed");

    assert_eq!(
        format!("{tree_result}"),
        format!("{vm_result}"),
        "vm diverged from interpreter for: {src}"
    );
    assert_eq!(
        format!("{tree_result}"),
        format!("{closures_result}"),
        "closure engine diverged from interpreter for: {src}"
    );

    tree_result
}

#[test]
fn scenario_arithmetic() {
    let result = run_all_engines("let x = 1; let y = 2; x + y;");
    assert!(matches!(result, Value::Number(n) if n == 3.0));
}

#[test]
fn scenario_recursive_factorial() {
    let result = run_all_engines(
        "fn fact(n) { if n <= 1 { return 1; } return n * fact(n - 1); } fact(5);",
    );
    assert!(matches!(result, Value::Number(n) if n == 120.0));
}

#[test]
fn scenario_optional_chaining_and_elvis() {
    let present = run_all_engines("let a = { k: 1 }; a?.k ?: 99;");
    assert!(matches!(present, Value::Number(n) if n == 1.0));

    let absent = run_all_engines("null?.k ?: 99;");
    assert!(matches!(absent, Value::Number(n) if n == 99.0));
}

#[test]
fn scenario_enum_match() {
    let result = run_all_engines(
        "enum Opt { Some(v); None; } let x = Opt.Some(7); match x { Some(v) => v + 1; None => 0; }",
    );
    assert!(matches!(result, Value::Number(n) if n == 8.0));
}

#[test]
fn scenario_contract_clamps_into_range() {
    let low = run_all_engines(
        "fn clamp(v, lo, hi) contract { returns(result) => result >= lo; returns(result) => result <= hi; } { if v < lo { return lo; } if v > hi { return hi; } return v; } clamp(5, 0, 10);",
    );
    assert!(matches!(low, Value::Number(n) if n == 5.0));

    let clamped = run_all_engines(
        "fn clamp(v, lo, hi) contract { returns(result) => result >= lo; returns(result) => result <= hi; } { if v < lo { return lo; } if v > hi { return hi; } return v; } clamp(-3, 0, 10);",
    );
    assert!(matches!(clamped, Value::Number(n) if n == 0.0));
}

#[test]
fn scenario_auto_main_prints_once_across_all_engines() {
    use selene_rt::{builtins::OutputSink, ExecutionEngine};
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);
    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    for engine in [
        ExecutionEngine::TreeWalking,
        ExecutionEngine::BytecodeVm,
        ExecutionEngine::EagerClosures,
    ] {
        let buffer = Arc::new(Mutex::new(Vec::<u8>::new()));
        let boxed: Box<dyn Write + Send> = Box::new(SharedBuffer(Arc::clone(&buffer)));
        let sink: OutputSink = Arc::new(Mutex::new(boxed));
        let runtime = Runtime::with_output(sink);
        let program = parse_ok(r#"fn main() { print("hi"); }"#);
        runtime.run_with_auto_main(&program, engine).unwrap();
        let out = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert_eq!(out, "hi\n", "engine {engine:?} produced unexpected output");
    }
}
