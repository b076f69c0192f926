use logos::Logos;
use std::fmt;
use thiserror::Error;

use crate::Span;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")] // Skip whitespace
#[logos(skip r"//[^\n\r]*")] // Skip line comments
#[logos(error = LexerErrorKind)]
pub enum TokenKind {
    // Keywords
    #[token("func")]
    Func,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("return")]
    Return,
    #[token("while")]
    While,
    #[token("true", |_| true)]
    #[token("false", |_| false)]
    Boolean(bool),

    // Operators
    #[token("=")]
    Assign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("!")]
    Bang,
    #[token("*")]
    Asterisk,
    #[token("/")]
    Slash,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,
    #[token("==")]
    Eq,
    #[token("!=")]
    NotEq,

    // Delimiters
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    // Identifiers and literals
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
    #[regex(r"[0-9]+", |lex| {
        let slice = lex.slice();
        slice
            .parse::<i64>()
            .map_err(|_| LexerErrorKind::InvalidNumberFormat(slice.to_string()))
    })]
    Int(i64),
    #[regex(r"[0-9]+\.[0-9]+", |lex| {
        let slice = lex.slice();
        slice
            .parse::<f64>()
            .map_err(|_| LexerErrorKind::InvalidNumberFormat(slice.to_string()))
    })]
    Float(f64),
    #[regex(r#""([^"\\]|\\.)*.?"#, |lex| {
        let slice = lex.slice();
        let len = slice.len();
        // make sure string was terminated
        if len == 1 || &slice[len-1..] != "\"" {
            return Err(LexerErrorKind::UnterminatedString);
        }
        unescape::unescape(&slice[1..len-1])
    })]
    String(String),

    /// Synthetic end-of-input marker appended by [`tokenize`].
    Eof,
}

impl TokenKind {
    /// Short name used in parser diagnostics.
    pub fn name(&self) -> String {
        match self {
            TokenKind::Ident(_) => "IDENT".to_string(),
            TokenKind::Int(_) => "INT".to_string(),
            TokenKind::Float(_) => "FLOAT".to_string(),
            TokenKind::String(_) => "STRING".to_string(),
            TokenKind::Boolean(_) => "BOOLEAN".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Token { kind, span }
    }
}

mod unescape {
    use super::{LexerErrorKind, LexerResult};

    pub fn unescape(s: &str) -> LexerResult<String> {
        // un-escaping should only ever reduce the length of the string.
        let mut result = String::with_capacity(s.len());
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some('n') => result.push('\n'),
                    Some('r') => result.push('\r'),
                    Some('t') => result.push('\t'),
                    Some('\\') => result.push('\\'),
                    Some('"') => result.push('"'),
                    Some(c) => return Err(LexerErrorKind::UnknownEscapeSequence(c)),
                    None => return Err(LexerErrorKind::UnterminatedString),
                }
            } else {
                result.push(c);
            }
        }
        Ok(result)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Func => write!(f, "func"),
            TokenKind::If => write!(f, "if"),
            TokenKind::Else => write!(f, "else"),
            TokenKind::Return => write!(f, "return"),
            TokenKind::While => write!(f, "while"),
            TokenKind::Boolean(b) => write!(f, "{}", b),
            TokenKind::Assign => write!(f, "="),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Bang => write!(f, "!"),
            TokenKind::Asterisk => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::LtEq => write!(f, "<="),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::GtEq => write!(f, ">="),
            TokenKind::Eq => write!(f, "=="),
            TokenKind::NotEq => write!(f, "!="),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Semicolon => write!(f, ";"),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::LBrace => write!(f, "{{"),
            TokenKind::RBrace => write!(f, "}}"),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::Ident(s) => write!(f, "{}", s),
            TokenKind::Int(n) => write!(f, "{}", n),
            TokenKind::Float(n) => write!(f, "{}", n),
            TokenKind::String(s) => write!(f, "\"{}\"", s), // Display with quotes for clarity
            TokenKind::Eof => write!(f, "EOF"),
        }
    }
}

#[derive(Error, Default, Debug, Clone, PartialEq)]
pub enum LexerErrorKind {
    #[error("Unterminated string literal")]
    UnterminatedString,
    #[error("Invalid number format: '{0}'")]
    InvalidNumberFormat(String),
    #[error("Unknown escape sequence: '\\{0}'")]
    UnknownEscapeSequence(char),
    #[default]
    #[error("Invalid token")]
    InvalidToken,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{error}")]
pub struct LexerError {
    pub error: LexerErrorKind,
    pub span: Span,
}

type LexerResult<T> = Result<T, LexerErrorKind>;

/// Tokenizes the whole input. The returned stream always ends with one
/// [`TokenKind::Eof`] token spanning the empty range at the end of input.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexerError> {
    let mut tokens: Vec<Token> = TokenKind::lexer(input)
        .spanned()
        .map(|(result, range)| match result {
            Ok(kind) => Ok(Token::new(kind, range.into())),
            Err(error) => Err(LexerError {
                error,
                span: range.into(),
            }),
        })
        .collect::<Result<_, _>>()?;
    tokens.push(Token::new(
        TokenKind::Eof,
        Span::new(input.len(), input.len()),
    ));
    Ok(tokens)
}
