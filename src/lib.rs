// Declare modules publicly so they are part of the library interface
pub mod ast;
pub mod builtins;
pub mod config;
pub mod environment;
pub mod evaluator;
pub mod lexer;
pub mod logging;
pub mod object;
pub mod parser;
pub mod pretty_print;
pub mod source;

pub use ast::Program;
pub use environment::Environment;
pub use evaluator::evaluate;
pub use lexer::{LexerError, Token, TokenKind, tokenize};
pub use object::{Object, ObjectType};
pub use parser::{ParseError, Parser, parse, parse_str};
pub use source::Span;
