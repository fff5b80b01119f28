use selene_common::TokenKind;

use crate::ast::stmt::{
    CatchClause, EnumCase, FunctionBody, FunctionContract, InterfaceMethod, MatchCase, ModuleDecl,
    Param, ContractClause,
};
use crate::ast::{ConditionClause, Stmt};
use crate::error::ParseError;

use super::Parser;

impl Parser {
    pub(super) fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        match self.current().kind {
            TokenKind::Let => self.parse_variable_decl(false),
            TokenKind::Var => self.parse_variable_decl(true),
            TokenKind::Async | TokenKind::Fn => self.parse_function_decl(None),
            TokenKind::Return => self.parse_return(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Break => {
                let span = self.current().span;
                self.advance();
                self.eat(&TokenKind::Semicolon);
                Ok(Stmt::Break(span))
            }
            TokenKind::Continue => {
                let span = self.current().span;
                self.advance();
                self.eat(&TokenKind::Semicolon);
                Ok(Stmt::Continue(span))
            }
            TokenKind::LBrace => {
                let start = self.current().span;
                self.advance();
                let body = self.parse_block_statements()?;
                let span = self.span_from(start);
                Ok(Stmt::Block(body, span))
            }
            TokenKind::Class => self.parse_class_decl(),
            TokenKind::Struct => self.parse_struct_decl(),
            TokenKind::Enum => self.parse_enum_decl(),
            TokenKind::Interface => self.parse_interface_decl(),
            TokenKind::Contract => self.parse_contract_decl(),
            TokenKind::Import => self.parse_import(),
            TokenKind::Match => self.parse_match(),
            TokenKind::Using => self.parse_using(),
            TokenKind::Try => self.parse_try(),
            TokenKind::Throw => self.parse_throw(),
            TokenKind::Condition => self.parse_condition(),
            _ => self.parse_expr_statement(),
        }
    }

    /// `module Name { statement* }`. Only valid as a top-level item;
    /// its body evaluates in a child scope whose final bindings become
    /// the resulting Module's exports.
    pub(super) fn parse_module_decl(&mut self) -> Result<ModuleDecl, ParseError> {
        let start = self.current().span;
        self.advance(); // `module`
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LBrace, "'{'")?;
        let body = self.parse_block_statements()?;
        let span = self.span_from(start);
        Ok(ModuleDecl { name, body, span })
    }

    /// `ext TypeName { fn method(...) { ... } ... }`. Each contained
    /// function declaration becomes a top-level `FunctionDecl` tagged
    /// with the extended type as its receiver, so the interpreter
    /// registers it into the extension registry instead of binding it
    /// as a plain name.
    pub(super) fn parse_ext_decl(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.advance(); // `ext`
        let receiver = self.parse_type_annotation()?;
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut methods = Vec::new();
        while !self.at(&TokenKind::RBrace) && !self.at_eof() {
            methods.push(self.parse_function_decl(Some(receiver.clone()))?);
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        Ok(methods)
    }

    fn parse_variable_decl(&mut self, mutable: bool) -> Result<Stmt, ParseError> {
        let start = self.current().span;
        self.advance(); // `let`/`var`
        let name = self.expect_identifier()?;
        let type_annotation = if self.eat(&TokenKind::Colon) {
            Some(self.parse_type_annotation()?)
        } else {
            None
        };
        self.expect(&TokenKind::Assign, "'='")?;
        let value = self.parse_expr()?;
        self.eat(&TokenKind::Semicolon);
        let span = self.span_from(start);
        Ok(Stmt::VariableDecl {
            mutable,
            name,
            type_annotation,
            value,
            span,
        })
    }

    fn parse_return(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current().span;
        self.advance();
        let value = if self.at(&TokenKind::Semicolon) || self.at(&TokenKind::RBrace) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.eat(&TokenKind::Semicolon);
        let span = self.span_from(start);
        Ok(Stmt::Return { value, span })
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current().span;
        self.advance();
        self.expect(&TokenKind::LParen, "'('")?;
        let condition = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "')'")?;
        self.expect(&TokenKind::LBrace, "'{'")?;
        let then_branch = self.parse_block_statements()?;
        let else_branch = if self.eat(&TokenKind::Else) {
            if self.at(&TokenKind::If) {
                Some(vec![self.parse_if()?])
            } else {
                self.expect(&TokenKind::LBrace, "'{'")?;
                Some(self.parse_block_statements()?)
            }
        } else {
            None
        };
        let span = self.span_from(start);
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            span,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current().span;
        self.advance();
        self.expect(&TokenKind::LParen, "'('")?;
        let condition = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "')'")?;
        self.expect(&TokenKind::LBrace, "'{'")?;
        let body = self.parse_block_statements()?;
        let span = self.span_from(start);
        Ok(Stmt::While {
            condition,
            body,
            span,
        })
    }

    /// C-style `for (init; condition; post) { body }`; each clause is
    /// optional (`for (;;) { ... }` loops forever until `break`).
    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current().span;
        self.advance();
        self.expect(&TokenKind::LParen, "'('")?;
        let init = if self.at(&TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_for_clause_stmt()?))
        };
        self.expect(&TokenKind::Semicolon, "';'")?;
        let condition = if self.at(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&TokenKind::Semicolon, "';'")?;
        let post = if self.at(&TokenKind::RParen) {
            None
        } else {
            Some(Box::new(self.parse_for_clause_stmt()?))
        };
        self.expect(&TokenKind::RParen, "')'")?;
        self.expect(&TokenKind::LBrace, "'{'")?;
        let body = self.parse_block_statements()?;
        let span = self.span_from(start);
        Ok(Stmt::For {
            init,
            condition,
            post,
            body,
            span,
        })
    }

    /// A `for` clause position holds either a variable declaration or
    /// a bare expression, with no trailing `;` of its own (the caller
    /// consumes the separator).
    fn parse_for_clause_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.current().kind {
            TokenKind::Let => self.parse_for_clause_let(false),
            TokenKind::Var => self.parse_for_clause_let(true),
            _ => {
                let expr = self.parse_expr()?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_for_clause_let(&mut self, mutable: bool) -> Result<Stmt, ParseError> {
        let start = self.current().span;
        self.advance();
        let name = self.expect_identifier()?;
        let type_annotation = if self.eat(&TokenKind::Colon) {
            Some(self.parse_type_annotation()?)
        } else {
            None
        };
        self.expect(&TokenKind::Assign, "'='")?;
        let value = self.parse_expr()?;
        let span = self.span_from(start);
        Ok(Stmt::VariableDecl {
            mutable,
            name,
            type_annotation,
            value,
            span,
        })
    }

    fn parse_expr_statement(&mut self) -> Result<Stmt, ParseError> {
        let expr = self.parse_expr()?;
        self.eat(&TokenKind::Semicolon);
        Ok(Stmt::Expr(expr))
    }

    /// `[async] fn name[<T, U>](params) [-> RetType] [contract { ... }] (block | '=>' expr ';')`
    fn parse_function_decl(
        &mut self,
        receiver: Option<crate::ast::TypeAnnotation>,
    ) -> Result<Stmt, ParseError> {
        let start = self.current().span;
        let is_async = self.eat(&TokenKind::Async);
        self.expect(&TokenKind::Fn, "'fn'")?;
        let name = self.expect_identifier()?;
        let type_params = if self.eat(&TokenKind::Lt) {
            let mut params = Vec::new();
            loop {
                params.push(self.expect_identifier()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::Gt, "'>'")?;
            params
        } else {
            Vec::new()
        };
        self.expect(&TokenKind::LParen, "'('")?;
        let params = self.parse_param_list()?;
        let return_type = if self.eat(&TokenKind::Colon) {
            Some(self.parse_type_annotation()?)
        } else {
            None
        };
        let contract = self.parse_optional_function_contract()?;
        let body = if self.eat(&TokenKind::FatArrow) {
            let expr = self.parse_expr()?;
            self.eat(&TokenKind::Semicolon);
            FunctionBody::Expr(Box::new(expr))
        } else {
            self.expect(&TokenKind::LBrace, "'{'")?;
            FunctionBody::Block(self.parse_block_statements()?)
        };
        let span = self.span_from(start);
        Ok(Stmt::FunctionDecl {
            name,
            receiver,
            type_params,
            params,
            return_type,
            is_async,
            contract,
            body,
            span,
        })
    }

    fn parse_param_list(&mut self) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                let name = self.expect_identifier()?;
                let type_annotation = if self.eat(&TokenKind::Colon) {
                    Some(self.parse_type_annotation()?)
                } else {
                    None
                };
                params.push(Param { name, type_annotation });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(params)
    }

    /// `contract { returns(<guard?>) => <postcondition>; ... }`,
    /// evaluated after the function body returns, once per clause,
    /// with `result` bound to the return value.
    fn parse_optional_function_contract(&mut self) -> Result<Option<FunctionContract>, ParseError> {
        if !self.at(&TokenKind::Contract) {
            return Ok(None);
        }
        self.advance(); // `contract`
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut clauses = Vec::new();
        while !self.at(&TokenKind::RBrace) && !self.at_eof() {
            let start = self.current().span;
            self.expect(&TokenKind::Returns, "'returns'")?;
            self.expect(&TokenKind::LParen, "'('")?;
            let guard = if self.at(&TokenKind::RParen) {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.expect(&TokenKind::RParen, "')'")?;
            self.expect(&TokenKind::FatArrow, "'=>'")?;
            let postcondition = self.parse_expr()?;
            self.eat(&TokenKind::Semicolon);
            clauses.push(ContractClause {
                guard,
                postcondition,
                span: self.span_from(start),
            });
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        Ok(Some(FunctionContract { clauses }))
    }

    fn parse_class_decl(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current().span;
        self.advance(); // `class`
        let name = self.expect_identifier()?;
        let superclass = if self.eat(&TokenKind::Colon) {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        let mut interfaces = Vec::new();
        if self.eat(&TokenKind::Is) {
            loop {
                interfaces.push(self.expect_identifier()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::LBrace, "'{'")?;
        let (fields, methods) = self.parse_member_body()?;
        let span = self.span_from(start);
        Ok(Stmt::ClassDecl {
            name,
            superclass,
            fields,
            methods,
            interfaces,
            span,
        })
    }

    fn parse_struct_decl(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current().span;
        self.advance();
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LBrace, "'{'")?;
        let (fields, methods) = self.parse_member_body()?;
        let span = self.span_from(start);
        Ok(Stmt::StructDecl {
            name,
            fields,
            methods,
            span,
        })
    }

    /// Shared body grammar for `struct`/`class`: a mix of bare field
    /// names (optionally typed) and `fn` method declarations.
    fn parse_member_body(&mut self) -> Result<(Vec<String>, Vec<Stmt>), ParseError> {
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while !self.at(&TokenKind::RBrace) && !self.at_eof() {
            if self.at(&TokenKind::Fn) || self.at(&TokenKind::Async) {
                methods.push(self.parse_function_decl(None)?);
            } else {
                fields.push(self.expect_identifier()?);
                if self.eat(&TokenKind::Colon) {
                    self.parse_type_annotation()?;
                }
                self.eat(&TokenKind::Semicolon);
                self.eat(&TokenKind::Comma);
            }
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        Ok((fields, methods))
    }

    /// `enum Name { Case(param, ...); Case; ... }`, plus any `fn`
    /// methods shared by all cases of the enum.
    fn parse_enum_decl(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current().span;
        self.advance();
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut cases = Vec::new();
        let mut methods = Vec::new();
        while !self.at(&TokenKind::RBrace) && !self.at_eof() {
            if self.at(&TokenKind::Fn) || self.at(&TokenKind::Async) {
                methods.push(self.parse_function_decl(None)?);
                continue;
            }
            let case_start = self.current().span;
            let case_name = self.expect_identifier()?;
            let mut params = Vec::new();
            if self.eat(&TokenKind::LParen) {
                if !self.at(&TokenKind::RParen) {
                    loop {
                        params.push(self.expect_identifier()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RParen, "')'")?;
            }
            self.eat(&TokenKind::Semicolon);
            self.eat(&TokenKind::Comma);
            cases.push(EnumCase {
                name: case_name,
                params,
                span: self.span_from(case_start),
            });
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        let span = self.span_from(start);
        Ok(Stmt::EnumDecl {
            name,
            cases,
            methods,
            span,
        })
    }

    fn parse_interface_decl(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current().span;
        self.advance();
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut methods = Vec::new();
        while !self.at(&TokenKind::RBrace) && !self.at_eof() {
            let method_start = self.current().span;
            self.expect(&TokenKind::Fn, "'fn'")?;
            let name = self.expect_identifier()?;
            self.expect(&TokenKind::LParen, "'('")?;
            let arity = self.parse_param_list()?.len();
            if self.eat(&TokenKind::Colon) {
                self.parse_type_annotation()?;
            }
            self.eat(&TokenKind::Semicolon);
            methods.push(InterfaceMethod {
                name,
                arity,
                span: self.span_from(method_start),
            });
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        let span = self.span_from(start);
        Ok(Stmt::InterfaceDecl { name, methods, span })
    }

    /// `contract Name { statement* }`: a named, standalone contract
    /// value whose exports are a snapshot of its body's final scope,
    /// mirroring how a `module` is evaluated.
    fn parse_contract_decl(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current().span;
        self.advance(); // `contract`
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LBrace, "'{'")?;
        let body = self.parse_block_statements()?;
        let span = self.span_from(start);
        Ok(Stmt::ContractDecl { name, body, span })
    }

    /// `import a.b.c [as alias];`
    fn parse_import(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current().span;
        self.advance();
        let mut path = vec![self.expect_identifier()?];
        while self.eat(&TokenKind::Dot) {
            path.push(self.expect_identifier()?);
        }
        let alias = if self.eat(&TokenKind::As) {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        self.eat(&TokenKind::Semicolon);
        let span = self.span_from(start);
        Ok(Stmt::ImportDecl { path, alias, span })
    }

    /// `match <expr> { Pattern => { body } Pattern => { body } ... }`
    fn parse_match(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current().span;
        self.advance();
        let discriminant = self.parse_expr()?;
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut cases = Vec::new();
        while !self.at(&TokenKind::RBrace) && !self.at_eof() {
            let case_start = self.current().span;
            let pattern = self.parse_pattern()?;
            self.expect(&TokenKind::FatArrow, "'=>'")?;
            let body = if self.at(&TokenKind::LBrace) {
                self.advance();
                self.parse_block_statements()?
            } else {
                let expr = self.parse_expr()?;
                self.eat(&TokenKind::Semicolon);
                vec![Stmt::Expr(expr)]
            };
            cases.push(MatchCase {
                pattern,
                body,
                span: self.span_from(case_start),
            });
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        let span = self.span_from(start);
        Ok(Stmt::Match {
            discriminant,
            cases,
            span,
        })
    }

    /// `using (binding = resource) { body }`
    fn parse_using(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current().span;
        self.advance();
        self.expect(&TokenKind::LParen, "'('")?;
        let binding = self.expect_identifier()?;
        self.expect(&TokenKind::Assign, "'='")?;
        let resource = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "')'")?;
        self.expect(&TokenKind::LBrace, "'{'")?;
        let body = self.parse_block_statements()?;
        let span = self.span_from(start);
        Ok(Stmt::Using {
            resource,
            binding,
            body,
            span,
        })
    }

    /// `try { body } [catch (binding?) { body }] [finally { body }]`
    fn parse_try(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current().span;
        self.advance();
        self.expect(&TokenKind::LBrace, "'{'")?;
        let body = self.parse_block_statements()?;
        let catch = if self.eat(&TokenKind::Catch) {
            let binding = if self.eat(&TokenKind::LParen) {
                let name = self.expect_identifier()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Some(name)
            } else {
                None
            };
            self.expect(&TokenKind::LBrace, "'{'")?;
            Some(CatchClause {
                binding,
                body: self.parse_block_statements()?,
            })
        } else {
            None
        };
        let finally = if self.eat(&TokenKind::Finally) {
            self.expect(&TokenKind::LBrace, "'{'")?;
            Some(self.parse_block_statements()?)
        } else {
            None
        };
        let span = self.span_from(start);
        Ok(Stmt::Try {
            body,
            catch,
            finally,
            span,
        })
    }

    fn parse_throw(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current().span;
        self.advance();
        let value = self.parse_expr()?;
        self.eat(&TokenKind::Semicolon);
        let span = self.span_from(start);
        Ok(Stmt::Throw { value, span })
    }

    /// `condition { when <guard> => { body } ... [else { body }] }`
    fn parse_condition(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current().span;
        self.advance();
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut clauses = Vec::new();
        let mut else_branch = None;
        while !self.at(&TokenKind::RBrace) && !self.at_eof() {
            if self.eat(&TokenKind::Else) {
                self.expect(&TokenKind::LBrace, "'{'")?;
                else_branch = Some(self.parse_block_statements()?);
                continue;
            }
            let clause_start = self.current().span;
            self.expect(&TokenKind::When, "'when'")?;
            let guard = self.parse_expr()?;
            self.expect(&TokenKind::FatArrow, "'=>'")?;
            let body = if self.at(&TokenKind::LBrace) {
                self.advance();
                self.parse_block_statements()?
            } else {
                let expr = self.parse_expr()?;
                self.eat(&TokenKind::Semicolon);
                vec![Stmt::Expr(expr)]
            };
            clauses.push(ConditionClause {
                guard,
                body,
                span: self.span_from(clause_start),
            });
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        let span = self.span_from(start);
        Ok(Stmt::Condition {
            clauses,
            else_branch,
            span,
        })
    }
}
