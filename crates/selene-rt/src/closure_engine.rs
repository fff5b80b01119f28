use std::sync::Arc;

use selene_parser::ast::ProgramItem;

use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::interpreter::{signal_to_result, Interpreter};
use crate::value::Value;

type BoundItem = Arc<dyn Fn(&Environment) -> Result<Value, RuntimeError> + Send + Sync>;

/// A program "compiled" to one closure per top-level item, built once
/// up front so running it no longer dispatches on the item's kind at
/// every step -- the dispatch happened once, at `compile` time, instead
/// of once per run. Semantics are identical to the tree-walking
/// interpreter; this only changes where the `match` on `ProgramItem`
/// happens.
pub struct ClosureProgram {
    items: Vec<BoundItem>,
}

/// Bind each item to a closure over a fresh `Interpreter` handle. The
/// interpreter is stateless, so sharing one `Arc<Interpreter>` across
/// every closure avoids rebuilding it per item without needing any
/// synchronization of its own.
pub fn compile(items: Vec<ProgramItem>) -> ClosureProgram {
    let interpreter = Arc::new(Interpreter::new());
    let bound = items
        .into_iter()
        .map(|item| -> BoundItem {
            let interpreter = Arc::clone(&interpreter);
            Arc::new(move |env: &Environment| {
                signal_to_result(interpreter.exec_item(&item, env))
            })
        })
        .collect();
    ClosureProgram { items: bound }
}

/// Run every closure in order against `env`, returning the last one's
/// value (or `Value::Null` for an empty program).
pub fn run(program: &ClosureProgram, env: &Environment) -> Result<Value, RuntimeError> {
    let mut last = Value::Null;
    for closure in &program.items {
        last = closure(env)?;
    }
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use selene_parser::parse;

    fn compile_src(src: &str) -> ClosureProgram {
        let (program, errors) = parse(src);
        assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
        compile(program.items)
    }

    #[test]
    fn runs_items_in_order_and_returns_the_last_value() {
        let program = compile_src("let x = 1; let y = 2; x + y;");
        let env = Environment::root();
        let result = run(&program, &env).unwrap();
        assert!(matches!(result, Value::Number(n) if n == 3.0));
    }

    #[test]
    fn empty_program_returns_null() {
        let program = compile_src("");
        let env = Environment::root();
        assert!(matches!(run(&program, &env).unwrap(), Value::Null));
    }

    #[test]
    fn recursive_function_call_matches_the_interpreter() {
        let program = compile_src(
            "fn fact(n) { if n <= 1 { return 1; } return n * fact(n - 1); } fact(5);",
        );
        let env = Environment::root();
        let result = run(&program, &env).unwrap();
        assert!(matches!(result, Value::Number(n) if n == 120.0));
    }
}
