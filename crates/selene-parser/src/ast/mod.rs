pub mod expr;
pub mod pattern;
pub mod stmt;
pub mod types;

pub use expr::{BinaryOp, Expr, FormatPart, UnaryOp};
pub use pattern::{ConditionClause, LiteralPattern, Pattern};
pub use stmt::{
    CatchClause, EnumCase, FunctionBody, FunctionContract, InterfaceMethod, MatchCase,
    ModuleDecl, PackageDecl, Param, ContractClause, Program, ProgramItem, Stmt,
};
pub use types::TypeAnnotation;
