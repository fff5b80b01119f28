//! Single-name re-export of Selene's core: lexer, parser, and runtime,
//! for consumers that want one crate dependency instead of pulling in
//! each library member individually. Stays a library -- the CLI,
//! package manager, and language server are separate collaborators
//! that would otherwise make this a binary.

pub use selene_common::{keyword_from_str, Position, Span, Token, TokenKind};
pub use selene_lexer::Lexer;
pub use selene_parser::ast;
pub use selene_parser::{parse, ParseError, Program, Stmt};
pub use selene_rt::{
    builtins, closure_engine, disassemble, environment, error, extensions, interpreter,
    main_invoke, task, value, vm, Chunk, Environment, ExecutionEngine, Interpreter, Runtime,
    RuntimeConfig, RuntimeError, Value,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexing_parsing_and_running_compose_end_to_end() {
        let tokens = Lexer::tokenize("let x = 1; let y = 2; x + y;");
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Let));

        let (program, errors) = parse("let x = 1; let y = 2; x + y;");
        assert!(errors.is_empty());

        let runtime = Runtime::new();
        let result = runtime.run(&program).unwrap();
        assert!(matches!(result, Value::Number(n) if n == 3.0));
    }
}
