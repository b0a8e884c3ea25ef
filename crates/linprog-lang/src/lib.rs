pub mod ast;
pub mod lexer;
pub mod loader;
pub mod parser;

pub use ast::*;
pub use lexer::{Lexer, Span, Token, TokenKind};
pub use loader::{LoadError, Loader};
pub use parser::{ParseError, Parser};
