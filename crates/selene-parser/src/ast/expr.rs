use selene_common::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(String, Span),
    Str(String, Span),
    /// `f"…"`, pre-split at parse time into literal runs and the
    /// embedded `{expr}` expressions they interleave with.
    FormatStr(Vec<FormatPart>, Span),
    /// `r"…"` / `` `…` ``: verbatim text, no escape processing.
    RawStr(String, Span),
    Bool(bool, Span),
    Null(Span),
    Identifier(String, Span),
    Array(Vec<Expr>, Span),
    Object(Vec<(String, Expr)>, Span),
    Prefix {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    Infix {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    Is {
        operand: Box<Expr>,
        type_name: String,
        negated: bool,
        span: Span,
    },
    Elvis {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    Member {
        object: Box<Expr>,
        name: String,
        optional: bool,
        span: Span,
    },
    NonNullAssertion {
        operand: Box<Expr>,
        span: Span,
    },
    Await {
        operand: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Number(_, s)
            | Expr::Str(_, s)
            | Expr::FormatStr(_, s)
            | Expr::RawStr(_, s)
            | Expr::Bool(_, s)
            | Expr::Null(s)
            | Expr::Identifier(_, s)
            | Expr::Array(_, s)
            | Expr::Object(_, s)
            | Expr::Prefix { span: s, .. }
            | Expr::Infix { span: s, .. }
            | Expr::Is { span: s, .. }
            | Expr::Elvis { span: s, .. }
            | Expr::Assign { span: s, .. }
            | Expr::Call { span: s, .. }
            | Expr::Index { span: s, .. }
            | Expr::Member { span: s, .. }
            | Expr::NonNullAssertion { span: s, .. }
            | Expr::Await { span: s, .. } => *s,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormatPart {
    Text(String),
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}
