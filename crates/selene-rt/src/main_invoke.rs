use selene_parser::ast::{Expr, ProgramItem, Stmt};
use selene_parser::Program;

/// Whether a `Program` declares a top-level `main` function and whether
/// any top-level statement already calls it. A post-pass, not a parser
/// transformation -- all three execution front-ends share one analysis
/// rather than each re-deriving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MainAnalysis {
    pub declares_main: bool,
    pub calls_main: bool,
}

impl MainAnalysis {
    /// `main` should run automatically once execution finishes when it
    /// is declared but never explicitly invoked at the top level.
    pub fn should_auto_invoke(&self) -> bool {
        self.declares_main && !self.calls_main
    }
}

pub fn analyze(program: &Program) -> MainAnalysis {
    let mut analysis = MainAnalysis::default();
    for item in &program.items {
        if let ProgramItem::Statement(stmt) = item {
            if is_main_decl(stmt) {
                analysis.declares_main = true;
            }
            if is_main_call(stmt) {
                analysis.calls_main = true;
            }
        }
    }
    analysis
}

fn is_main_decl(stmt: &Stmt) -> bool {
    matches!(stmt, Stmt::FunctionDecl { name, receiver: None, .. } if name == "main")
}

/// A top-level expression statement whose expression is a direct call
/// to the bare identifier `main` -- `main();`, not `obj.main()` or
/// `main;` with no call.
fn is_main_call(stmt: &Stmt) -> bool {
    let Stmt::Expr(expr) = stmt else {
        return false;
    };
    matches!(
        expr,
        Expr::Call { callee, .. } if matches!(callee.as_ref(), Expr::Identifier(name, _) if name == "main")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use selene_parser::parse;

    fn analyze_src(src: &str) -> MainAnalysis {
        let (program, errors) = parse(src);
        assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
        analyze(&program)
    }

    #[test]
    fn declares_without_calling_should_auto_invoke() {
        let analysis = analyze_src("fn main() { print(\"hi\"); }");
        assert!(analysis.declares_main);
        assert!(!analysis.calls_main);
        assert!(analysis.should_auto_invoke());
    }

    #[test]
    fn declares_and_explicitly_calls_does_not_auto_invoke_again() {
        let analysis = analyze_src("fn main() { print(\"hi\"); } main();");
        assert!(analysis.declares_main);
        assert!(analysis.calls_main);
        assert!(!analysis.should_auto_invoke());
    }

    #[test]
    fn no_main_at_all_never_auto_invokes() {
        let analysis = analyze_src("let x = 1;");
        assert!(!analysis.declares_main);
        assert!(!analysis.should_auto_invoke());
    }

    #[test]
    fn a_method_named_main_on_some_receiver_does_not_count_as_a_call() {
        let analysis = analyze_src("fn main() { print(\"hi\"); } obj.main();");
        assert!(analysis.declares_main);
        assert!(!analysis.calls_main);
        assert!(analysis.should_auto_invoke());
    }
}
