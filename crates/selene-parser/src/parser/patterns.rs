use selene_common::TokenKind;

use crate::ast::{LiteralPattern, Pattern};
use crate::error::ParseError;

use super::Parser;

impl Parser {
    /// A `match` case pattern: a literal, an identifier binding, an
    /// object destructure, or a `Name(sub, ...)` struct/enum-case
    /// constructor pattern.
    pub(super) fn parse_pattern(&mut self) -> Result<Pattern, ParseError> {
        let start = self.current().span;
        match &self.current().kind {
            TokenKind::Number(n) => {
                let n = n.clone();
                self.advance();
                Ok(Pattern::Literal(LiteralPattern::Number(n), self.span_from(start)))
            }
            TokenKind::String(s) | TokenKind::RawString(s) => {
                let s = s.clone();
                self.advance();
                Ok(Pattern::Literal(LiteralPattern::Str(s), self.span_from(start)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Pattern::Literal(LiteralPattern::Bool(true), self.span_from(start)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Pattern::Literal(LiteralPattern::Bool(false), self.span_from(start)))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Pattern::Literal(LiteralPattern::Null, self.span_from(start)))
            }
            TokenKind::LBrace => self.parse_object_pattern(),
            TokenKind::Identifier => {
                let name = self.advance().text;
                if self.at(&TokenKind::LParen) {
                    self.advance();
                    let mut subpatterns = Vec::new();
                    if !self.at(&TokenKind::RParen) {
                        loop {
                            subpatterns.push(self.parse_pattern()?);
                            if !self.eat(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(&TokenKind::RParen, "')'")?;
                    Ok(Pattern::Struct {
                        name,
                        subpatterns,
                        span: self.span_from(start),
                    })
                } else {
                    Ok(Pattern::Identifier(name, self.span_from(start)))
                }
            }
            other => Err(self.error(format!("no pattern starts with {}", other.describe()))),
        }
    }

    fn parse_object_pattern(&mut self) -> Result<Pattern, ParseError> {
        let start = self.current().span;
        self.advance(); // '{'
        let mut pairs = Vec::new();
        if !self.at(&TokenKind::RBrace) {
            loop {
                let key = match &self.current().kind {
                    TokenKind::Identifier => self.advance().text,
                    TokenKind::String(s) => {
                        let s = s.clone();
                        self.advance();
                        s
                    }
                    other => return Err(self.error(format!("expected pattern key, got {}", other.describe()))),
                };
                self.expect(&TokenKind::Colon, "':'")?;
                let sub = self.parse_pattern()?;
                pairs.push((key, sub));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        Ok(Pattern::Object(pairs, self.span_from(start)))
    }
}
