use crate::Span;
use crate::ast::{
    BlockStatement, Expression, FunctionLiteral, Identifier, InfixOperator, PrefixOperator,
    Program, Statement,
};
use crate::lexer::{LexerError, Token, TokenKind};
use std::mem;
use std::rc::Rc;
use std::vec::IntoIter;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("expected next token to be {expected}, got {} instead", .found.kind.name())]
    UnexpectedToken { expected: String, found: Token },
    #[error("unexpected token: '{}'", .found.kind.name())]
    NoPrefixRule { found: Token },
    #[error("Lexer Error during parse: {0}")]
    Lexer(#[from] LexerError),
}

impl ParseError {
    /// Source span the diagnostic points at.
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedToken { found, .. } | ParseError::NoPrefixRule { found } => {
                found.span
            }
            ParseError::Lexer(lex_err) => lex_err.span,
        }
    }
}

/// Binding strength of an infix position, lowest first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Lowest,
    Equality,   // == !=
    Relational, // < <= > >=
    Sum,        // + -
    Product,    // * /
    Prefix,     // -x !x
    Call,       // f(x)
    Index,      // a[i]
}

type PrefixRule = fn(&mut Parser) -> Option<Expression>;
type InfixRule = fn(&mut Parser, Expression) -> Option<Expression>;

/// How to start an expression when `kind` is the current token.
fn prefix_rule(kind: &TokenKind) -> Option<PrefixRule> {
    let rule: PrefixRule = match kind {
        TokenKind::Ident(_) => Parser::parse_identifier,
        TokenKind::Int(_)
        | TokenKind::Float(_)
        | TokenKind::String(_)
        | TokenKind::Boolean(_) => Parser::parse_literal,
        TokenKind::Bang | TokenKind::Minus => Parser::parse_prefix_expression,
        TokenKind::LParen => Parser::parse_grouped_expression,
        TokenKind::If => Parser::parse_if_expression,
        TokenKind::Func => Parser::parse_function_literal,
        TokenKind::LBracket => Parser::parse_array_literal,
        TokenKind::LBrace => Parser::parse_hash_map_literal,
        _ => return None,
    };
    Some(rule)
}

/// How to extend an already parsed left expression when `kind` is the
/// lookahead, together with the precedence of that position.
fn infix_rule(kind: &TokenKind) -> Option<(Precedence, InfixRule)> {
    let entry: (Precedence, InfixRule) = match kind {
        TokenKind::Eq | TokenKind::NotEq => (Precedence::Equality, Parser::parse_infix_expression),
        TokenKind::Lt | TokenKind::LtEq | TokenKind::Gt | TokenKind::GtEq => {
            (Precedence::Relational, Parser::parse_infix_expression)
        }
        TokenKind::Plus | TokenKind::Minus => (Precedence::Sum, Parser::parse_infix_expression),
        TokenKind::Asterisk | TokenKind::Slash => {
            (Precedence::Product, Parser::parse_infix_expression)
        }
        TokenKind::LParen => (Precedence::Call, Parser::parse_call_expression),
        TokenKind::LBracket => (Precedence::Index, Parser::parse_index_expression),
        _ => return None,
    };
    Some(entry)
}

fn precedence_of(kind: &TokenKind) -> Precedence {
    infix_rule(kind).map_or(Precedence::Lowest, |(precedence, _)| precedence)
}

fn infix_operator(kind: &TokenKind) -> Option<InfixOperator> {
    Some(match kind {
        TokenKind::Plus => InfixOperator::Plus,
        TokenKind::Minus => InfixOperator::Minus,
        TokenKind::Asterisk => InfixOperator::Multiply,
        TokenKind::Slash => InfixOperator::Divide,
        TokenKind::Lt => InfixOperator::Lt,
        TokenKind::LtEq => InfixOperator::LtEq,
        TokenKind::Gt => InfixOperator::Gt,
        TokenKind::GtEq => InfixOperator::GtEq,
        TokenKind::Eq => InfixOperator::Eq,
        TokenKind::NotEq => InfixOperator::NotEq,
        _ => return None,
    })
}

fn same_kind(a: &TokenKind, b: &TokenKind) -> bool {
    mem::discriminant(a) == mem::discriminant(b)
}

/// Pratt parser over a token stream with one token of lookahead.
///
/// Parsing never aborts: every grammar mismatch is recorded as a
/// [`ParseError`] and the parser resumes at the next top-level statement.
pub struct Parser {
    tokens: IntoIter<Token>,
    current: Token,
    peek: Token,
    eof_span: Span,
    errors: Vec<ParseError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let eof_span = tokens
            .last()
            .map(|token| Span::new(token.span.end, token.span.end))
            .unwrap_or_default();
        let eof = Token::new(TokenKind::Eof, eof_span);
        let mut parser = Parser {
            tokens: tokens.into_iter(),
            current: eof.clone(),
            peek: eof,
            eof_span,
            errors: Vec::new(),
        };
        parser.next_token();
        parser.next_token();
        parser
    }

    // Shifts the lookahead into `current`. An exhausted stream keeps yielding Eof.
    fn next_token(&mut self) {
        let next = self
            .tokens
            .next()
            .unwrap_or_else(|| Token::new(TokenKind::Eof, self.eof_span));
        self.current = mem::replace(&mut self.peek, next);
    }

    fn current_is(&self, kind: &TokenKind) -> bool {
        same_kind(&self.current.kind, kind)
    }

    fn peek_is(&self, kind: &TokenKind) -> bool {
        same_kind(&self.peek.kind, kind)
    }

    fn record(&mut self, error: ParseError) {
        tracing::debug!(%error, span = %error.span(), "parse diagnostic");
        self.errors.push(error);
    }

    /// Advances if the lookahead is `expected`, otherwise records a diagnostic.
    fn expect_peek(&mut self, expected: TokenKind) -> Option<()> {
        if self.peek_is(&expected) {
            self.next_token();
            Some(())
        } else {
            self.record(ParseError::UnexpectedToken {
                expected: expected.name(),
                found: self.peek.clone(),
            });
            None
        }
    }

    /// Consumes the `;` ending an assignment or expression statement. The
    /// delimiter may be left out right before a closing `}` or end of input.
    fn expect_terminator(&mut self) -> Option<()> {
        if self.peek_is(&TokenKind::RBrace) || self.peek_is(&TokenKind::Eof) {
            return Some(());
        }
        self.expect_peek(TokenKind::Semicolon)
    }

    fn skip_optional_semicolon(&mut self) {
        if self.peek_is(&TokenKind::Semicolon) {
            self.next_token();
        }
    }

    // Skips the rest of a failed statement.
    fn synchronize(&mut self) {
        while !self.current_is(&TokenKind::Semicolon) && !self.current_is(&TokenKind::Eof) {
            self.next_token();
        }
    }

    /// Parses the whole stream, returning the (possibly partial) program and
    /// every diagnostic recorded along the way.
    pub fn parse(mut self) -> (Program, Vec<ParseError>) {
        let mut program = Program::default();
        while !self.current_is(&TokenKind::Eof) {
            match self.parse_statement() {
                Some(statement) => program.statements.push(statement),
                None => self.synchronize(),
            }
            self.next_token();
        }
        (program, self.errors)
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        match &self.current.kind {
            TokenKind::Ident(_) if self.peek_is(&TokenKind::Assign) => {
                self.parse_assign_statement()
            }
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::If => {
                let expression = self.parse_if_expression()?;
                self.skip_optional_semicolon();
                Some(Statement::Expression(expression))
            }
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Func if self.peek_is(&TokenKind::Ident(String::new())) => {
                self.parse_named_function()
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_identifier_token(&mut self) -> Option<Identifier> {
        match &self.current.kind {
            TokenKind::Ident(name) => Some(Identifier::new(name.clone())),
            _ => {
                self.record(ParseError::UnexpectedToken {
                    expected: TokenKind::Ident(String::new()).name(),
                    found: self.current.clone(),
                });
                None
            }
        }
    }

    fn parse_assign_statement(&mut self) -> Option<Statement> {
        let name = self.parse_identifier_token()?;
        self.next_token(); // '='
        self.next_token();
        let value = self.parse_expression(Precedence::Lowest)?;
        self.expect_terminator()?;
        Some(Statement::Assign { name, value })
    }

    fn parse_return_statement(&mut self) -> Option<Statement> {
        self.next_token();
        let value = self.parse_expression(Precedence::Lowest)?;
        self.expect_terminator()?;
        Some(Statement::Return(value))
    }

    fn parse_expression_statement(&mut self) -> Option<Statement> {
        let expression = self.parse_expression(Precedence::Lowest)?;
        self.expect_terminator()?;
        Some(Statement::Expression(expression))
    }

    fn parse_while_statement(&mut self) -> Option<Statement> {
        let condition = self.parse_condition()?;
        self.expect_peek(TokenKind::LBrace)?;
        let body = self.parse_block_statement()?;
        let alternative = self.parse_else_block()?;
        self.skip_optional_semicolon();
        Some(Statement::While {
            condition,
            body,
            alternative,
        })
    }

    fn parse_named_function(&mut self) -> Option<Statement> {
        self.next_token();
        let name = self.parse_identifier_token()?;
        let function = self.parse_function_tail()?;
        self.skip_optional_semicolon();
        Some(Statement::NamedFunction { name, function })
    }

    /// Parses `{ statement* }` with `{` as the current token.
    fn parse_block_statement(&mut self) -> Option<BlockStatement> {
        let mut block = BlockStatement::default();
        self.next_token();
        while !self.current_is(&TokenKind::RBrace) {
            if self.current_is(&TokenKind::Eof) {
                self.record(ParseError::UnexpectedToken {
                    expected: TokenKind::RBrace.name(),
                    found: self.current.clone(),
                });
                return None;
            }
            match self.parse_statement() {
                Some(statement) => {
                    block.statements.push(statement);
                    self.next_token();
                }
                None => self.synchronize_block(),
            }
        }
        Some(block)
    }

    // Skips the rest of a failed statement inside a block without consuming
    // the block's closing `}`.
    fn synchronize_block(&mut self) {
        while !self.current_is(&TokenKind::Semicolon)
            && !self.current_is(&TokenKind::RBrace)
            && !self.current_is(&TokenKind::Eof)
        {
            self.next_token();
        }
        if self.current_is(&TokenKind::Semicolon) {
            self.next_token();
        }
    }

    // `(condition)` following `if` or `while`.
    fn parse_condition(&mut self) -> Option<Expression> {
        self.expect_peek(TokenKind::LParen)?;
        self.next_token();
        let condition = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::RParen)?;
        Some(condition)
    }

    // Outer None is a failed parse; inner None means there was no `else`.
    fn parse_else_block(&mut self) -> Option<Option<BlockStatement>> {
        if !self.peek_is(&TokenKind::Else) {
            return Some(None);
        }
        self.next_token();
        self.expect_peek(TokenKind::LBrace)?;
        Some(Some(self.parse_block_statement()?))
    }

    /// Precedence climbing: starts with the prefix rule of the current token
    /// and keeps folding infix rules while the lookahead binds tighter than
    /// `precedence`.
    pub fn parse_expression(&mut self, precedence: Precedence) -> Option<Expression> {
        let Some(prefix) = prefix_rule(&self.current.kind) else {
            self.record(ParseError::NoPrefixRule {
                found: self.current.clone(),
            });
            return None;
        };
        let mut left = prefix(self)?;

        while !self.peek_is(&TokenKind::Semicolon) && precedence < precedence_of(&self.peek.kind)
        {
            let Some((_, infix)) = infix_rule(&self.peek.kind) else {
                return Some(left);
            };
            self.next_token();
            left = infix(self, left)?;
        }
        Some(left)
    }

    fn parse_identifier(&mut self) -> Option<Expression> {
        self.parse_identifier_token().map(Expression::Identifier)
    }

    fn parse_literal(&mut self) -> Option<Expression> {
        Some(match &self.current.kind {
            TokenKind::Int(value) => Expression::Integer(*value),
            TokenKind::Float(value) => Expression::Float(*value),
            TokenKind::String(value) => Expression::String(value.clone()),
            TokenKind::Boolean(value) => Expression::Boolean(*value),
            _ => {
                self.record(ParseError::NoPrefixRule {
                    found: self.current.clone(),
                });
                return None;
            }
        })
    }

    fn parse_prefix_expression(&mut self) -> Option<Expression> {
        let operator = match self.current.kind {
            TokenKind::Bang => PrefixOperator::Bang,
            _ => PrefixOperator::Minus,
        };
        self.next_token();
        let right = self.parse_expression(Precedence::Prefix)?;
        Some(Expression::Prefix {
            operator,
            right: Box::new(right),
        })
    }

    fn parse_grouped_expression(&mut self) -> Option<Expression> {
        self.next_token();
        let expression = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::RParen)?;
        Some(expression)
    }

    fn parse_if_expression(&mut self) -> Option<Expression> {
        let condition = self.parse_condition()?;
        self.expect_peek(TokenKind::LBrace)?;
        let consequence = self.parse_block_statement()?;
        let alternative = self.parse_else_block()?;
        Some(Expression::If {
            condition: Box::new(condition),
            consequence,
            alternative,
        })
    }

    fn parse_function_literal(&mut self) -> Option<Expression> {
        self.parse_function_tail().map(Expression::Function)
    }

    // `(params) { body }` following `func` or `func name`.
    fn parse_function_tail(&mut self) -> Option<FunctionLiteral> {
        self.expect_peek(TokenKind::LParen)?;
        let parameters = self.parse_list(TokenKind::RParen, Parser::parse_identifier_token)?;
        self.expect_peek(TokenKind::LBrace)?;
        let body = self.parse_block_statement()?;
        Some(FunctionLiteral {
            parameters,
            body: Rc::new(body),
        })
    }

    fn parse_array_literal(&mut self) -> Option<Expression> {
        self.parse_list(TokenKind::RBracket, |parser| {
            parser.parse_expression(Precedence::Lowest)
        })
        .map(Expression::Array)
    }

    fn parse_hash_map_literal(&mut self) -> Option<Expression> {
        self.parse_list(TokenKind::RBrace, |parser| {
            let key = parser.parse_expression(Precedence::Lowest)?;
            parser.expect_peek(TokenKind::Colon)?;
            parser.next_token();
            let value = parser.parse_expression(Precedence::Lowest)?;
            Some((key, value))
        })
        .map(Expression::HashMap)
    }

    /// Shared shape of every delimited list: the opening delimiter is the
    /// current token, elements are separated by `,` and the list ends at
    /// `end`. Each element is parsed with its first token as current.
    fn parse_list<T>(
        &mut self,
        end: TokenKind,
        mut parse_element: impl FnMut(&mut Parser) -> Option<T>,
    ) -> Option<Vec<T>> {
        let mut elements = Vec::new();
        if self.peek_is(&end) {
            self.next_token();
            return Some(elements);
        }

        self.next_token();
        elements.push(parse_element(self)?);
        while self.peek_is(&TokenKind::Comma) {
            self.next_token();
            self.next_token();
            elements.push(parse_element(self)?);
        }
        self.expect_peek(end)?;
        Some(elements)
    }

    fn parse_infix_expression(&mut self, left: Expression) -> Option<Expression> {
        let Some(operator) = infix_operator(&self.current.kind) else {
            self.record(ParseError::NoPrefixRule {
                found: self.current.clone(),
            });
            return None;
        };
        let precedence = precedence_of(&self.current.kind);
        self.next_token();
        let right = self.parse_expression(precedence)?;
        Some(Expression::Infix {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_call_expression(&mut self, function: Expression) -> Option<Expression> {
        let arguments = self.parse_list(TokenKind::RParen, |parser| {
            parser.parse_expression(Precedence::Lowest)
        })?;
        Some(Expression::Call {
            function: Box::new(function),
            arguments,
        })
    }

    fn parse_index_expression(&mut self, left: Expression) -> Option<Expression> {
        self.next_token();
        let index = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::RBracket)?;
        Some(Expression::Index {
            left: Box::new(left),
            index: Box::new(index),
        })
    }
}

/// Parses an already tokenized stream.
pub fn parse(tokens: Vec<Token>) -> (Program, Vec<ParseError>) {
    Parser::new(tokens).parse()
}

// Helper function to lex and parse a string directly (useful for tests and REPL)
pub fn parse_str(input: &str) -> (Program, Vec<ParseError>) {
    match crate::lexer::tokenize(input) {
        Ok(tokens) => parse(tokens),
        Err(lex_err) => (Program::default(), vec![ParseError::from(lex_err)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // Parses `input`, failing the test on any diagnostic.
    fn parse_ok(input: &str) -> Program {
        let (program, errors) = parse_str(input);
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            panic!("Parsing failed for input '{}': {:?}", input, messages);
        }
        program
    }

    fn assert_rendered(input: &str, expected: &str) {
        assert_eq!(parse_ok(input).to_string(), expected, "Input: '{}'", input);
    }

    fn single_expression(input: &str) -> Expression {
        let mut program = parse_ok(input);
        assert_eq!(program.statements.len(), 1, "Input: '{}'", input);
        match program.statements.remove(0) {
            Statement::Expression(expression) => expression,
            other => panic!("Expected expression statement, got {:?}", other),
        }
    }

    fn error_messages(input: &str) -> Vec<String> {
        let (_, errors) = parse_str(input);
        errors.iter().map(|e| e.to_string()).collect()
    }

    fn ident(name: &str) -> Expression {
        Expression::Identifier(Identifier::new(name))
    }

    #[test]
    fn test_operator_precedence() {
        let cases = [
            ("-a * b", "((-a) * b)"),
            ("!-a", "(!(-a))"),
            ("a + b + c", "((a + b) + c)"),
            ("a + b - c", "((a + b) - c)"),
            ("a * b * c", "((a * b) * c)"),
            ("a * b / c", "((a * b) / c)"),
            ("a + b / c", "(a + (b / c))"),
            ("a + b * c", "(a + (b * c))"),
            ("a + b * c + d / e - f", "(((a + (b * c)) + (d / e)) - f)"),
            ("3 + 4; -5 * 5", "(3 + 4)((-5) * 5)"),
            ("5 > 4 == 3 < 4", "((5 > 4) == (3 < 4))"),
            ("5 <= 4 != 3 >= 4", "((5 <= 4) != (3 >= 4))"),
            (
                "3 + 4 * 5 == 3 * 1 + 4 * 5",
                "((3 + (4 * 5)) == ((3 * 1) + (4 * 5)))",
            ),
            ("true", "true"),
            ("3 > 5 == false", "((3 > 5) == false)"),
            ("1 + (2 + 3) + 4", "((1 + (2 + 3)) + 4)"),
            ("(5 + 5) * 2", "((5 + 5) * 2)"),
            ("2 / (5 + 5)", "(2 / (5 + 5))"),
            ("-(5 + 5)", "(-(5 + 5))"),
            ("!(true == true)", "(!(true == true))"),
            ("a + add(b * c) + d", "((a + add((b * c))) + d)"),
            (
                "add(a, b, 1, 2 * 3, 4 + 5, add(6, 7 * 8))",
                "add(a, b, 1, (2 * 3), (4 + 5), add(6, (7 * 8)))",
            ),
            (
                "add(a + b + c * d / f + g)",
                "add((((a + b) + ((c * d) / f)) + g))",
            ),
            (
                "a * [1, 2, 3, 4][b * c] * d",
                "((a * ([1, 2, 3, 4][(b * c)])) * d)",
            ),
            (
                "add(a * b[2], b[1], 2 * [1, 2][1])",
                "add((a * (b[2])), (b[1]), (2 * ([1, 2][1])))",
            ),
            ("1.5 * 2.0 - -0.5", "((1.5 * 2.0) - (-0.5))"),
        ];
        for (input, expected) in cases {
            assert_rendered(input, expected);
        }
    }

    #[test]
    fn test_assign_statements() {
        let program = parse_ok("x = 5; y = true; foobar = y;");
        assert_eq!(
            program.statements,
            vec![
                Statement::Assign {
                    name: Identifier::new("x"),
                    value: Expression::Integer(5),
                },
                Statement::Assign {
                    name: Identifier::new("y"),
                    value: Expression::Boolean(true),
                },
                Statement::Assign {
                    name: Identifier::new("foobar"),
                    value: ident("y"),
                },
            ]
        );
        assert_rendered("x = 5 * 2;", "x = (5 * 2);");
    }

    #[test]
    fn test_return_statements() {
        assert_rendered("return 5;", "return 5;");
        assert_rendered("return foobar;", "return foobar;");
        assert_rendered("return 10 + 10;", "return (10 + 10);");
    }

    #[test]
    fn test_literals() {
        assert_eq!(single_expression("5;"), Expression::Integer(5));
        assert_eq!(single_expression("2.25;"), Expression::Float(2.25));
        assert_eq!(single_expression("false;"), Expression::Boolean(false));
        assert_eq!(
            single_expression(r#""hello world";"#),
            Expression::String("hello world".to_string())
        );
        assert_rendered(r#""say \"hi\"";"#, r#""say \"hi\"""#);
    }

    #[test]
    fn test_if_expression() {
        let expression = single_expression("if (x < y) { x }");
        match expression {
            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                assert_eq!(condition.to_string(), "(x < y)");
                assert_eq!(
                    consequence.statements,
                    vec![Statement::Expression(ident("x"))]
                );
                assert!(alternative.is_none());
            }
            other => panic!("Expected if expression, got {:?}", other),
        }
        assert_rendered(
            "if (x < y) { x } else { y }",
            "if (x < y) { x } else { y }",
        );
    }

    #[test]
    fn test_if_as_value() {
        assert_rendered(
            "max = if (a > b) { a } else { b }; max;",
            "max = if (a > b) { a } else { b };max",
        );
    }

    #[test]
    fn test_while_statement() {
        let program = parse_ok("while (x > 0) { x = x - 1; } x;");
        assert_eq!(program.statements.len(), 2);
        assert_eq!(
            program.to_string(),
            "while (x > 0) { x = (x - 1); }x"
        );
        assert_rendered(
            "while (false) { 1; } else { 2; }",
            "while (false) { 1 } else { 2 }",
        );
    }

    #[test]
    fn test_function_literal() {
        let expression = single_expression("func(x, y) { x + y; }");
        match expression {
            Expression::Function(FunctionLiteral { parameters, body }) => {
                assert_eq!(parameters, vec![Identifier::new("x"), Identifier::new("y")]);
                assert_eq!(body.to_string(), "(x + y)");
            }
            other => panic!("Expected function literal, got {:?}", other),
        }
    }

    #[test]
    fn test_function_parameters() {
        let cases = [
            ("func() {};", vec![]),
            ("func(x) {};", vec!["x"]),
            ("func(x, y, z) {};", vec!["x", "y", "z"]),
        ];
        for (input, expected) in cases {
            match single_expression(input) {
                Expression::Function(function) => {
                    let names: Vec<&str> = function
                        .parameters
                        .iter()
                        .map(|p| p.name.as_str())
                        .collect();
                    assert_eq!(names, expected, "Input: '{}'", input);
                }
                other => panic!("Expected function literal, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_named_function() {
        let program = parse_ok("func add(a, b) { return a + b; } add(1, 2);");
        assert_eq!(program.statements.len(), 2);
        match &program.statements[0] {
            Statement::NamedFunction { name, function } => {
                assert_eq!(name.name, "add");
                assert_eq!(function.parameters.len(), 2);
            }
            other => panic!("Expected named function, got {:?}", other),
        }
        assert_eq!(
            program.to_string(),
            "func add(a, b) { return (a + b); }add(1, 2)"
        );
    }

    #[test]
    fn test_call_expression() {
        match single_expression("add(1, 2 * 3, 4 + 5);") {
            Expression::Call {
                function,
                arguments,
            } => {
                assert_eq!(*function, ident("add"));
                let rendered: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
                assert_eq!(rendered, vec!["1", "(2 * 3)", "(4 + 5)"]);
            }
            other => panic!("Expected call expression, got {:?}", other),
        }
        assert_rendered("func(x) { x; }(5)", "func(x) { x }(5)");
    }

    #[test]
    fn test_array_and_index() {
        assert_rendered("[1, 2 * 2, 3 + 3]", "[1, (2 * 2), (3 + 3)]");
        assert_rendered("[]", "[]");
        assert_rendered("myArray[1 + 1]", "(myArray[(1 + 1)])");
    }

    #[test]
    fn test_hash_map_literal() {
        match single_expression(r#"{"one": 1, "two": 2, 3: 10 - 7}"#) {
            Expression::HashMap(pairs) => {
                let rendered: Vec<String> = pairs
                    .iter()
                    .map(|(k, v)| format!("{} => {}", k, v))
                    .collect();
                assert_eq!(
                    rendered,
                    vec![r#""one" => 1"#, r#""two" => 2"#, "3 => (10 - 7)"]
                );
            }
            other => panic!("Expected hash map literal, got {:?}", other),
        }
        assert_eq!(single_expression("{}"), Expression::HashMap(vec![]));
    }

    #[test]
    fn test_missing_left_hand_side() {
        let (program, errors) = parse_str(" = 5;");
        assert!(!errors.is_empty());
        assert_eq!(errors[0].to_string(), "unexpected token: '='");
        assert!(program.statements.is_empty());
    }

    #[test]
    fn test_expect_peek_messages() {
        assert_eq!(
            error_messages("x = 1 2;"),
            vec!["expected next token to be ;, got INT instead"]
        );
        assert_eq!(
            error_messages("if (x { 1 }"),
            vec!["expected next token to be ), got { instead"]
        );
        assert_eq!(
            error_messages("func(1) {}"),
            vec!["expected next token to be IDENT, got INT instead"]
        );
        assert_eq!(
            error_messages("[1, 2"),
            vec!["expected next token to be ], got EOF instead"]
        );
        assert_eq!(
            error_messages("{1 2}"),
            vec!["expected next token to be :, got INT instead"]
        );
    }

    #[test]
    fn test_recovers_at_next_statement() {
        let (program, errors) = parse_str("x = ; y = 2; z = 3 4; w = 5;");
        assert_eq!(errors.len(), 2);
        assert_eq!(program.to_string(), "y = 2;w = 5;");
    }

    #[test]
    fn test_recovers_after_broken_function_body() {
        let (program, errors) = parse_str("f = func() { 1 + }; y = 2; z = 3;");
        assert_eq!(
            errors.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
            vec!["unexpected token: '}'"]
        );
        assert_eq!(program.statements.len(), 3);
        assert_eq!(program.statements[1].to_string(), "y = 2;");
        assert_eq!(program.statements[2].to_string(), "z = 3;");
    }

    #[test]
    fn test_recovers_inside_block() {
        let (program, errors) = parse_str("while (x) { y = ; z = 1; } w = 2;");
        assert_eq!(errors.len(), 1);
        assert_eq!(program.to_string(), "while (x) { z = 1; }w = 2;");
    }

    #[test]
    fn test_rendering_parses_back_to_same_tree() {
        let inputs = [
            "x = 2.0; x + 1.5;",
            "y = [1.0, -2.5, 3];",
            "while (false) { 1; } else { 2; }",
            "while (x) { x = x - 1; }",
            "r = if (flag) { 10.0 } else { 0 };",
            "if (!ok) { return 1; }",
            "if (a[0]) { a }",
            "func scale(a) { return a * 2.0; }",
            r#"m = {"a": 1.0, 2: "tab\t"};"#,
        ];
        for input in inputs {
            let program = parse_ok(input);
            let rendered = program.to_string();
            let (reparsed, errors) = parse_str(&rendered);
            assert!(
                errors.is_empty(),
                "Rendered '{}' from '{}' failed to parse: {:?}",
                rendered,
                input,
                errors
            );
            assert_eq!(reparsed, program, "Rendered: '{}'", rendered);
        }
    }

    #[test]
    fn test_unclosed_block() {
        let (_, errors) = parse_str("func(x) { x + 1;");
        assert_eq!(
            errors.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
            vec!["expected next token to be }, got EOF instead"]
        );
    }

    #[test]
    fn test_lexer_error_becomes_diagnostic() {
        let (program, errors) = parse_str("x = \"abc");
        assert!(program.statements.is_empty());
        assert!(matches!(errors.as_slice(), [ParseError::Lexer(_)]));
        assert_eq!(errors[0].span(), Span::new(4, 8));
    }

    #[test]
    fn test_diagnostic_span_points_at_token() {
        let (_, errors) = parse_str("x = 1 2;");
        assert_eq!(errors[0].span(), Span::new(6, 7));
    }

    #[test]
    fn test_parse_without_eof_token() {
        let tokens = vec![
            Token::new(TokenKind::Int(1), Span::new(0, 1)),
            Token::new(TokenKind::Plus, Span::new(2, 3)),
            Token::new(TokenKind::Int(2), Span::new(4, 5)),
        ];
        let (program, errors) = parse(tokens);
        assert!(errors.is_empty());
        assert_eq!(program.to_string(), "(1 + 2)");
    }
}
