use selene_common::{Span, TokenKind};

use crate::ast::expr::{BinaryOp, Expr, FormatPart, UnaryOp};
use crate::ast::stmt::Stmt;
use crate::error::ParseError;

use super::Parser;

/// Expression parsing follows the precedence ladder from the language
/// grammar, each level implemented as its own function calling down
/// into the next: assignment < elvis < or < and < equality <
/// comparison < sum < product < prefix < call/postfix < primary.
impl Parser {
    pub(super) fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let lhs = self.parse_elvis()?;

        let compound = match self.current().kind {
            TokenKind::PlusEq => Some(BinaryOp::Add),
            TokenKind::MinusEq => Some(BinaryOp::Sub),
            TokenKind::StarEq => Some(BinaryOp::Mul),
            TokenKind::SlashEq => Some(BinaryOp::Div),
            TokenKind::PercentEq => Some(BinaryOp::Rem),
            _ => None,
        };
        if let Some(op) = compound {
            self.advance();
            let value = self.parse_assignment()?;
            let span = self.span_from(start);
            return Ok(Expr::Assign {
                target: Box::new(lhs.clone()),
                value: Box::new(Expr::Infix {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(value),
                    span,
                }),
                span,
            });
        }

        if self.eat(&TokenKind::Assign) {
            let value = self.parse_assignment()?;
            let span = self.span_from(start);
            return Ok(Expr::Assign {
                target: Box::new(lhs),
                value: Box::new(value),
                span,
            });
        }
        Ok(lhs)
    }

    /// Right-associative: recurses back into `parse_elvis` rather than
    /// `parse_or`, so `a ?: b ?: c` parses as `a ?: (b ?: c)`.
    fn parse_elvis(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let lhs = self.parse_or()?;
        if self.eat(&TokenKind::QuestionColon) {
            let rhs = self.parse_elvis()?;
            let span = self.span_from(start);
            return Ok(Expr::Elvis {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            });
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let mut lhs = self.parse_and()?;
        while self.eat(&TokenKind::OrOr) {
            let rhs = self.parse_and()?;
            let span = self.span_from(start);
            lhs = Expr::Infix {
                op: BinaryOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let mut lhs = self.parse_equality()?;
        while self.eat(&TokenKind::AndAnd) {
            let rhs = self.parse_equality()?;
            let span = self.span_from(start);
            lhs = Expr::Infix {
                op: BinaryOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.current().kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::BangEq => BinaryOp::NotEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_comparison()?;
            let span = self.span_from(start);
            lhs = Expr::Infix {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    /// Comparison operators and `is`/`!is` type tests share a
    /// precedence level and chain left-to-right against each other.
    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let mut lhs = self.parse_sum()?;
        loop {
            if self.at(&TokenKind::Is) || self.at(&TokenKind::BangIs) {
                let negated = self.at(&TokenKind::BangIs);
                self.advance();
                let type_name = self.expect_identifier()?;
                let span = self.span_from(start);
                lhs = Expr::Is {
                    operand: Box::new(lhs),
                    type_name,
                    negated,
                    span,
                };
                continue;
            }
            let op = match self.current().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::LtEq => BinaryOp::LtEq,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::GtEq => BinaryOp::GtEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_sum()?;
            let span = self.span_from(start);
            lhs = Expr::Infix {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_sum(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let mut lhs = self.parse_product()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_product()?;
            let span = self.span_from(start);
            lhs = Expr::Infix {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_product(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let mut lhs = self.parse_prefix()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_prefix()?;
            let span = self.span_from(start);
            lhs = Expr::Infix {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    /// `!`, unary `-`, unary `+`, and `await` all bind at prefix
    /// precedence, tighter than the binary operator ladder but looser
    /// than the postfix call/index/member chain.
    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let op = match self.current().kind {
            TokenKind::Minus => Some(UnaryOp::Negate),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Bang => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_prefix()?;
            let span = self.span_from(start);
            return Ok(Expr::Prefix {
                op,
                operand: Box::new(operand),
                span,
            });
        }
        if self.eat(&TokenKind::Await) {
            let operand = self.parse_prefix()?;
            let span = self.span_from(start);
            return Ok(Expr::Await {
                operand: Box::new(operand),
                span,
            });
        }
        self.parse_call()
    }

    fn parse_call(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let mut expr = self.parse_primary()?;
        loop {
            match self.current().kind {
                TokenKind::LParen => {
                    self.advance();
                    let args = self.parse_arg_list()?;
                    let span = self.span_from(start);
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        span,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(&TokenKind::RBracket, "']'")?;
                    let span = self.span_from(start);
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        span,
                    };
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_identifier()?;
                    let span = self.span_from(start);
                    expr = Expr::Member {
                        object: Box::new(expr),
                        name,
                        optional: false,
                        span,
                    };
                }
                TokenKind::QuestionDot => {
                    self.advance();
                    let name = self.expect_identifier()?;
                    let span = self.span_from(start);
                    expr = Expr::Member {
                        object: Box::new(expr),
                        name,
                        optional: true,
                        span,
                    };
                }
                TokenKind::BangBang => {
                    self.advance();
                    let span = self.span_from(start);
                    expr = Expr::NonNullAssertion {
                        operand: Box::new(expr),
                        span,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_arg_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.current().clone();
        match tok.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Number(n, tok.span))
            }
            TokenKind::String(ref s) => {
                let s = s.clone();
                self.advance();
                Ok(Expr::Str(s, tok.span))
            }
            TokenKind::RawString(ref s) => {
                let s = s.clone();
                self.advance();
                Ok(Expr::RawStr(s, tok.span))
            }
            TokenKind::FormatString(ref content) => {
                let content = content.clone();
                self.advance();
                let parts = parse_format_parts(&content, tok.span)?;
                Ok(Expr::FormatStr(parts, tok.span))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Bool(true, tok.span))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Bool(false, tok.span))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Null(tok.span))
            }
            TokenKind::Identifier => {
                self.advance();
                Ok(Expr::Identifier(tok.text, tok.span))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => self.parse_array_literal(tok.span),
            TokenKind::LBrace => self.parse_object_literal(tok.span),
            other => Err(self.error(format!("unexpected token in expression: {}", other.describe()))),
        }
    }

    pub(super) fn parse_block_statements(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        while !self.at(&TokenKind::RBrace) && !self.at_eof() {
            stmts.push(self.parse_statement()?);
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        Ok(stmts)
    }

    fn parse_array_literal(&mut self, start: Span) -> Result<Expr, ParseError> {
        self.advance(); // '['
        let mut items = Vec::new();
        if !self.at(&TokenKind::RBracket) {
            loop {
                items.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBracket, "']'")?;
        let span = self.span_from(start);
        Ok(Expr::Array(items, span))
    }

    fn parse_object_literal(&mut self, start: Span) -> Result<Expr, ParseError> {
        self.advance(); // '{'
        let mut fields = Vec::new();
        if !self.at(&TokenKind::RBrace) {
            loop {
                let key = match &self.current().kind {
                    TokenKind::String(s) => {
                        let s = s.clone();
                        self.advance();
                        s
                    }
                    _ => self.expect_identifier()?,
                };
                self.expect(&TokenKind::Colon, "':'")?;
                let value = self.parse_expr()?;
                fields.push((key, value));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        let span = self.span_from(start);
        Ok(Expr::Object(fields, span))
    }
}

/// Splits an already-lexed format string's content into literal text
/// runs and `{expr}` placeholders, parsing each placeholder's contents
/// as a fresh expression (brace-depth tracked so a placeholder may
/// itself contain an object literal).
fn parse_format_parts(content: &str, span: Span) -> Result<Vec<FormatPart>, ParseError> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let chars: Vec<char> = content.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '{' {
            if !text.is_empty() {
                parts.push(FormatPart::Text(std::mem::take(&mut text)));
            }
            let mut depth = 1;
            let inner_start = i + 1;
            i += 1;
            while i < chars.len() && depth > 0 {
                match chars[i] {
                    '{' => depth += 1,
                    '}' => depth -= 1,
                    _ => {}
                }
                if depth > 0 {
                    i += 1;
                }
            }
            let inner: String = chars[inner_start..i].iter().collect();
            i += 1; // consume closing '}'
            let expr = parse_embedded_expr(&inner, span)?;
            parts.push(FormatPart::Expr(Box::new(expr)));
        } else {
            text.push(chars[i]);
            i += 1;
        }
    }
    if !text.is_empty() || parts.is_empty() {
        parts.push(FormatPart::Text(text));
    }
    Ok(parts)
}

fn parse_embedded_expr(source: &str, span: Span) -> Result<Expr, ParseError> {
    let tokens = selene_lexer::Lexer::tokenize(source);
    let mut parser = Parser::new(tokens);
    let expr = parser
        .parse_expr()
        .map_err(|_| ParseError::new(format!("invalid format placeholder: {{{source}}}"), span))?;
    Ok(expr)
}
