pub mod position;
pub mod token;

pub use position::{Position, Span};
pub use token::{keyword_from_str, Token, TokenKind};
