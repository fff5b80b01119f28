mod cursor;

use cursor::Cursor;
use selene_common::{keyword_from_str, Position, Span, Token, TokenKind};

/// Converts Selene source text into a flat stream of tokens.
///
/// The lexer never aborts on bad input: unrecognized characters become
/// `TokenKind::Illegal` and lexing continues, leaving error reporting to
/// whatever consumes the stream. Exactly one `TokenKind::Eof` is emitted
/// at the end, after which the iterator yields `None`.
pub struct Lexer<'src> {
    cursor: Cursor<'src>,
    emitted_eof: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            cursor: Cursor::new(source),
            emitted_eof: false,
        }
    }

    /// Lex the entire source into a `Vec<Token>`, including the
    /// trailing `Eof` token.
    pub fn tokenize(source: &'src str) -> Vec<Token> {
        Lexer::new(source).collect()
    }

    fn produce_token(&mut self) -> Option<Token> {
        self.skip_trivia();

        let start = self.cursor.position();
        let Some(c) = self.cursor.peek() else {
            if self.emitted_eof {
                return None;
            }
            self.emitted_eof = true;
            return Some(Token::new(TokenKind::Eof, "", Span::point(start)));
        };

        if c.is_ascii_digit() {
            return Some(self.lex_number(start));
        }
        if c == '"' {
            return Some(self.lex_plain_string(start));
        }
        if c == '`' {
            return Some(self.lex_backtick_raw_string(start));
        }
        if is_ident_start(c) {
            return Some(self.lex_ident_or_prefixed_string(start));
        }

        self.cursor.advance();
        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            ':' => TokenKind::Colon,
            '+' => self.lex_compound('=', TokenKind::PlusEq, TokenKind::Plus),
            '-' => self.lex_compound('=', TokenKind::MinusEq, TokenKind::Minus),
            '*' => self.lex_compound('=', TokenKind::StarEq, TokenKind::Star),
            '/' => self.lex_compound('=', TokenKind::SlashEq, TokenKind::Slash),
            '%' => self.lex_compound('=', TokenKind::PercentEq, TokenKind::Percent),
            '=' => self.lex_eq(),
            '!' => self.lex_bang(),
            '<' => self.lex_compound('=', TokenKind::LtEq, TokenKind::Lt),
            '>' => self.lex_compound('=', TokenKind::GtEq, TokenKind::Gt),
            '&' => self.lex_amp(),
            '|' => self.lex_pipe(),
            '?' => self.lex_question(),
            other => TokenKind::Illegal(other),
        };

        let end = self.cursor.position();
        let text = self.cursor.slice(start.offset, end.offset).to_string();
        Some(Token::new(kind, text, Span::new(start, end)))
    }

    fn skip_trivia(&mut self) {
        loop {
            self.cursor.eat_while(|c| c.is_whitespace());
            match (self.cursor.peek(), self.cursor.peek_next()) {
                (Some('/'), Some('/')) => {
                    self.cursor.eat_while(|c| c != '\n');
                }
                (Some('/'), Some('*')) => {
                    self.lex_block_comment();
                }
                _ => break,
            }
        }
    }

    /// Block comments do not nest: the first `*/` closes them, no
    /// matter how many `/*` appear in between.
    fn lex_block_comment(&mut self) {
        self.cursor.advance(); // '/'
        self.cursor.advance(); // '*'
        loop {
            match (self.cursor.peek(), self.cursor.peek_next()) {
                (Some('*'), Some('/')) => {
                    self.cursor.advance();
                    self.cursor.advance();
                    break;
                }
                (Some(_), _) => {
                    self.cursor.advance();
                }
                (None, _) => break,
            }
        }
    }

    fn lex_compound(&mut self, next: char, if_match: TokenKind, otherwise: TokenKind) -> TokenKind {
        if self.cursor.peek() == Some(next) {
            self.cursor.advance();
            if_match
        } else {
            otherwise
        }
    }

    fn lex_eq(&mut self) -> TokenKind {
        match self.cursor.peek() {
            Some('=') => {
                self.cursor.advance();
                TokenKind::EqEq
            }
            Some('>') => {
                self.cursor.advance();
                TokenKind::FatArrow
            }
            _ => TokenKind::Assign,
        }
    }

    /// Matches the longest of `!is`, `!!`, `!=`, `!`. `!is` only counts
    /// when `is` is not itself the prefix of a longer identifier (so
    /// `!isReady` lexes as `!` followed by the identifier `isReady`).
    fn lex_bang(&mut self) -> TokenKind {
        if self.cursor.peek() == Some('i') && self.cursor.peek_next() == Some('s') {
            let after = self.cursor.peek_at(2);
            if !after.is_some_and(is_ident_continue) {
                self.cursor.advance();
                self.cursor.advance();
                return TokenKind::BangIs;
            }
        }
        match self.cursor.peek() {
            Some('=') => {
                self.cursor.advance();
                TokenKind::BangEq
            }
            Some('!') => {
                self.cursor.advance();
                TokenKind::BangBang
            }
            _ => TokenKind::Bang,
        }
    }

    fn lex_amp(&mut self) -> TokenKind {
        if self.cursor.peek() == Some('&') {
            self.cursor.advance();
            TokenKind::AndAnd
        } else {
            TokenKind::Illegal('&')
        }
    }

    fn lex_pipe(&mut self) -> TokenKind {
        if self.cursor.peek() == Some('|') {
            self.cursor.advance();
            TokenKind::OrOr
        } else {
            TokenKind::Illegal('|')
        }
    }

    fn lex_question(&mut self) -> TokenKind {
        match self.cursor.peek() {
            Some(':') => {
                self.cursor.advance();
                TokenKind::QuestionColon
            }
            Some('.') => {
                self.cursor.advance();
                TokenKind::QuestionDot
            }
            _ => TokenKind::Question,
        }
    }

    /// A run of ASCII decimal digits. The core keeps numeric literals
    /// integer-only; the text is recorded verbatim and conversion to a
    /// runtime `Number` is deferred to the interpreter.
    fn lex_number(&mut self, start: Position) -> Token {
        self.cursor.eat_while(|c| c.is_ascii_digit());
        let end = self.cursor.position();
        let text = self.cursor.slice(start.offset, end.offset).to_string();
        Token::new(TokenKind::Number(text.clone()), text, Span::new(start, end))
    }

    fn lex_ident_or_prefixed_string(&mut self, start: Position) -> Token {
        // `f"..."` and `r"..."` are prefixed string forms, not regular
        // identifiers, but only when the quote immediately follows the
        // single letter (otherwise `format` and `result` lex normally).
        if self.cursor.peek() == Some('f') && self.cursor.peek_next() == Some('"') {
            self.cursor.advance();
            return self.lex_format_string(start);
        }
        if self.cursor.peek() == Some('r') && self.cursor.peek_next() == Some('"') {
            self.cursor.advance();
            return self.lex_raw_string(start);
        }
        self.lex_ident(start)
    }

    fn lex_ident(&mut self, start: Position) -> Token {
        self.cursor.eat_while(is_ident_continue);
        let end = self.cursor.position();
        let text = self.cursor.slice(start.offset, end.offset);
        let kind = keyword_from_str(text).unwrap_or(TokenKind::Identifier);
        Token::new(kind, text, Span::new(start, end))
    }

    /// Plain `"…"` string with backslash escapes: the escape character
    /// and the rune following it are always consumed as a pair, even
    /// for an unrecognized escape (so `\"` never ends the literal
    /// early and an unknown escape degrades to the literal rune).
    fn lex_plain_string(&mut self, start: Position) -> Token {
        self.cursor.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.cursor.peek() {
                None => break,
                Some('"') => {
                    self.cursor.advance();
                    break;
                }
                Some('\\') => {
                    self.cursor.advance();
                    let escaped = self.cursor.advance();
                    value.push(match escaped {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some('0') => '\0',
                        Some(other) => other,
                        None => break,
                    });
                }
                Some(c) => {
                    self.cursor.advance();
                    value.push(c);
                }
            }
        }
        let end = self.cursor.position();
        let raw = self.cursor.slice(start.offset, end.offset).to_string();
        Token::new(TokenKind::String(value), raw, Span::new(start, end))
    }

    /// `f"…"` format string: escapes process the same way as a plain
    /// string; `{expr}` placeholders are left untouched for the
    /// interpreter to expand at evaluation time.
    fn lex_format_string(&mut self, start: Position) -> Token {
        self.cursor.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.cursor.peek() {
                None => break,
                Some('"') => {
                    self.cursor.advance();
                    break;
                }
                Some('\\') => {
                    self.cursor.advance();
                    let escaped = self.cursor.advance();
                    value.push(match escaped {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some(other) => other,
                        None => break,
                    });
                }
                Some(c) => {
                    self.cursor.advance();
                    value.push(c);
                }
            }
        }
        let end = self.cursor.position();
        let raw = self.cursor.slice(start.offset, end.offset).to_string();
        Token::new(TokenKind::FormatString(value), raw, Span::new(start, end))
    }

    /// `r"…"`: no escape processing at all, content taken verbatim.
    fn lex_raw_string(&mut self, start: Position) -> Token {
        self.cursor.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.cursor.peek() {
                None => break,
                Some('"') => {
                    self.cursor.advance();
                    break;
                }
                Some(c) => {
                    self.cursor.advance();
                    value.push(c);
                }
            }
        }
        let end = self.cursor.position();
        let raw = self.cursor.slice(start.offset, end.offset).to_string();
        Token::new(TokenKind::RawString(value), raw, Span::new(start, end))
    }

    /// `` `…` ``: the backtick-delimited twin of `r"…"`, also raw.
    fn lex_backtick_raw_string(&mut self, start: Position) -> Token {
        self.cursor.advance(); // opening backtick
        let mut value = String::new();
        loop {
            match self.cursor.peek() {
                None => break,
                Some('`') => {
                    self.cursor.advance();
                    break;
                }
                Some(c) => {
                    self.cursor.advance();
                    value.push(c);
                }
            }
        }
        let end = self.cursor.position();
        let raw = self.cursor.slice(start.offset, end.offset).to_string();
        Token::new(TokenKind::RawString(value), raw, Span::new(start, end))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.produce_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lex_simple_expression() {
        let got = kinds("let x = 1 + 2;");
        assert_eq!(
            got,
            vec![
                TokenKind::Let,
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::Number("1".into()),
                TokenKind::Plus,
                TokenKind::Number("2".into()),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_spans_are_accurate() {
        let tokens = Lexer::tokenize("foo bar");
        assert_eq!(tokens[0].span.start.offset, 0);
        assert_eq!(tokens[0].span.end.offset, 3);
        assert_eq!(tokens[1].span.start.offset, 4);
        assert_eq!(tokens[1].span.end.offset, 7);
    }

    #[test]
    fn lex_keywords_vs_identifiers() {
        assert_eq!(kinds("fn"), vec![TokenKind::Fn, TokenKind::Eof]);
        assert_eq!(kinds("fnord"), vec![TokenKind::Identifier, TokenKind::Eof]);
    }

    #[test]
    fn lex_plain_string_with_escapes() {
        let tokens = Lexer::tokenize(r#""hi\n\"there\"""#);
        match &tokens[0].kind {
            TokenKind::String(s) => assert_eq!(s, "hi\n\"there\""),
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn lex_format_string() {
        let tokens = Lexer::tokenize(r#"f"hello {name}""#);
        match &tokens[0].kind {
            TokenKind::FormatString(s) => assert_eq!(s, "hello {name}"),
            other => panic!("expected format string, got {other:?}"),
        }
    }

    #[test]
    fn lex_raw_string_ignores_escapes() {
        let tokens = Lexer::tokenize(r#"r"a\nb""#);
        match &tokens[0].kind {
            TokenKind::RawString(s) => assert_eq!(s, r"a\nb"),
            other => panic!("expected raw string, got {other:?}"),
        }
    }

    #[test]
    fn lex_backtick_raw_string() {
        let tokens = Lexer::tokenize("`a\\nb`");
        match &tokens[0].kind {
            TokenKind::RawString(s) => assert_eq!(s, "a\\nb"),
            other => panic!("expected raw string, got {other:?}"),
        }
    }

    #[test]
    fn prefix_letters_without_quote_are_plain_identifiers() {
        assert_eq!(kinds("format"), vec![TokenKind::Identifier, TokenKind::Eof]);
        assert_eq!(kinds("result"), vec![TokenKind::Identifier, TokenKind::Eof]);
    }

    #[test]
    fn lex_nonnesting_block_comment() {
        // the first `*/` closes the comment; "2" is the next real token.
        let got = kinds("1 /* outer /* inner */ 2");
        assert_eq!(got, vec![TokenKind::Number("1".into()), TokenKind::Number("2".into()), TokenKind::Eof]);
    }

    #[test]
    fn lex_line_comment_stops_at_newline() {
        let got = kinds("1 // comment\n2");
        assert_eq!(got, vec![TokenKind::Number("1".into()), TokenKind::Number("2".into()), TokenKind::Eof]);
    }

    #[test]
    fn lex_compound_operators() {
        let got = kinds("== != <= >= => ?: ?. !! && || += -= *= /= %=");
        assert_eq!(
            got,
            vec![
                TokenKind::EqEq,
                TokenKind::BangEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::FatArrow,
                TokenKind::QuestionColon,
                TokenKind::QuestionDot,
                TokenKind::BangBang,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::PlusEq,
                TokenKind::MinusEq,
                TokenKind::StarEq,
                TokenKind::SlashEq,
                TokenKind::PercentEq,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn bang_is_recognized_as_single_operator() {
        assert_eq!(
            kinds("x !is Number"),
            vec![TokenKind::Identifier, TokenKind::BangIs, TokenKind::Identifier, TokenKind::Eof]
        );
    }

    #[test]
    fn bang_is_word_boundary_respected() {
        // `!isReady` must NOT lex as `!is` + `Ready`.
        assert_eq!(
            kinds("!isReady"),
            vec![TokenKind::Bang, TokenKind::Identifier, TokenKind::Eof]
        );
    }

    #[test]
    fn integer_only_number_literals() {
        let tokens = Lexer::tokenize("123");
        match &tokens[0].kind {
            TokenKind::Number(s) => assert_eq!(s, "123"),
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn illegal_character_does_not_abort_lexing() {
        let got = kinds("1 @ 2");
        assert_eq!(
            got,
            vec![
                TokenKind::Number("1".into()),
                TokenKind::Illegal('@'),
                TokenKind::Number("2".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn emits_exactly_one_eof() {
        let mut lexer = Lexer::new("");
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Eof);
        assert!(lexer.next().is_none());
    }

    #[test]
    fn positions_are_monotonically_nondecreasing() {
        let tokens = Lexer::tokenize("let x = f\"a {b}\" + r\"raw\\n\" - `tick`;");
        let mut last_offset = 0u32;
        for t in &tokens {
            assert!(t.span.start.offset <= t.span.end.offset);
            assert!(t.span.start.offset >= last_offset);
            last_offset = t.span.end.offset;
        }
    }
}
