use selene_common::TokenKind;

use crate::ast::TypeAnnotation;
use crate::error::ParseError;

use super::Parser;

impl Parser {
    /// `Name`, `Name<Arg, Arg>` or either followed by a trailing `?`
    /// marking nullability. Parsed for every annotation site (variable
    /// types, parameter types, return types) but never checked.
    pub(super) fn parse_type_annotation(&mut self) -> Result<TypeAnnotation, ParseError> {
        let start = self.current().span;
        let name = self.expect_identifier()?;
        let mut generics = Vec::new();
        if self.eat(&TokenKind::Lt) {
            loop {
                generics.push(self.parse_type_annotation()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::Gt, "'>'")?;
        }
        let nullable = self.eat(&TokenKind::Question);
        Ok(TypeAnnotation {
            name,
            generics,
            nullable,
            span: self.span_from(start),
        })
    }
}
