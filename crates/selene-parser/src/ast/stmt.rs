use selene_common::Span;

use super::expr::Expr;
use super::pattern::{ConditionClause, Pattern};
use super::types::TypeAnnotation;

/// A whole parsed source file: an ordered sequence of top-level items.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub items: Vec<ProgramItem>,
}

/// A top-level item is either a package/module declaration or a plain
/// statement; declarations may only appear at the top level while a
/// `Statement` may recurse into nested blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgramItem {
    Package(PackageDecl),
    Module(ModuleDecl),
    Statement(Stmt),
}

impl ProgramItem {
    pub fn span(&self) -> Span {
        match self {
            ProgramItem::Package(p) => p.span,
            ProgramItem::Module(m) => m.span,
            ProgramItem::Statement(s) => s.span(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackageDecl {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDecl {
    pub name: String,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub type_annotation: Option<TypeAnnotation>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Block(Vec<Stmt>),
    Expr(Box<Expr>),
}

/// A `returns(<guard?>) => <postcondition>;` clause inside a function's
/// trailing `contract { ... }` block. The guard defaults to `true` when
/// omitted; the postcondition is checked only when the guard holds,
/// with `result` bound to the function's return value.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractClause {
    pub guard: Option<Expr>,
    pub postcondition: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FunctionContract {
    pub clauses: Vec<ContractClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumCase {
    pub name: String,
    pub params: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceMethod {
    pub name: String,
    pub arity: usize,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    VariableDecl {
        mutable: bool,
        name: String,
        type_annotation: Option<TypeAnnotation>,
        value: Expr,
        span: Span,
    },
    FunctionDecl {
        name: String,
        receiver: Option<TypeAnnotation>,
        type_params: Vec<String>,
        params: Vec<Param>,
        return_type: Option<TypeAnnotation>,
        is_async: bool,
        contract: Option<FunctionContract>,
        body: FunctionBody,
        span: Span,
    },
    ClassDecl {
        name: String,
        superclass: Option<String>,
        fields: Vec<String>,
        methods: Vec<Stmt>,
        interfaces: Vec<String>,
        span: Span,
    },
    StructDecl {
        name: String,
        fields: Vec<String>,
        methods: Vec<Stmt>,
        span: Span,
    },
    EnumDecl {
        name: String,
        cases: Vec<EnumCase>,
        methods: Vec<Stmt>,
        span: Span,
    },
    InterfaceDecl {
        name: String,
        methods: Vec<InterfaceMethod>,
        span: Span,
    },
    /// A top-level named `contract Name { ... }` block: its body runs
    /// in a child scope at declaration time and the resulting bindings
    /// become the Contract value's exports -- the same shape as a
    /// module, but bound under the `Contract` value kind.
    ContractDecl {
        name: String,
        body: Vec<Stmt>,
        span: Span,
    },
    ImportDecl {
        path: Vec<String>,
        alias: Option<String>,
        span: Span,
    },
    Match {
        discriminant: Expr,
        cases: Vec<MatchCase>,
        span: Span,
    },
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
        span: Span,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
        span: Span,
    },
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Vec<Stmt>,
        span: Span,
    },
    Using {
        resource: Expr,
        binding: String,
        body: Vec<Stmt>,
        span: Span,
    },
    Try {
        body: Vec<Stmt>,
        catch: Option<CatchClause>,
        finally: Option<Vec<Stmt>>,
        span: Span,
    },
    Throw {
        value: Expr,
        span: Span,
    },
    Condition {
        clauses: Vec<ConditionClause>,
        else_branch: Option<Vec<Stmt>>,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Break(Span),
    Continue(Span),
    Block(Vec<Stmt>, Span),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub binding: Option<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchCase {
    pub pattern: Pattern,
    pub body: Vec<Stmt>,
    pub span: Span,
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::VariableDecl { span, .. }
            | Stmt::FunctionDecl { span, .. }
            | Stmt::ClassDecl { span, .. }
            | Stmt::StructDecl { span, .. }
            | Stmt::EnumDecl { span, .. }
            | Stmt::InterfaceDecl { span, .. }
            | Stmt::ContractDecl { span, .. }
            | Stmt::ImportDecl { span, .. }
            | Stmt::Match { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Using { span, .. }
            | Stmt::Try { span, .. }
            | Stmt::Throw { span, .. }
            | Stmt::Condition { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Block(_, span) => *span,
            Stmt::Break(s) | Stmt::Continue(s) => *s,
            Stmt::Expr(e) => e.span(),
        }
    }
}
