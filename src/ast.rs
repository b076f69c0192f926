//! Abstract syntax tree produced by the [`Parser`](crate::parser::Parser).
//!
//! Every node implements `Display`, rendering a canonical, fully
//! parenthesized form of the source (`a + b * c` renders as `(a + (b * c))`).

use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
}

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        Identifier { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockStatement {
    pub statements: Vec<Statement>,
}

/// A function literal. The body is reference counted so that function
/// objects created at runtime can share it with the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionLiteral {
    pub parameters: Vec<Identifier>,
    pub body: Rc<BlockStatement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `name = value;`, always binds in the innermost frame.
    Assign { name: Identifier, value: Expression },
    Return(Expression),
    Expression(Expression),
    While {
        condition: Expression,
        body: BlockStatement,
        alternative: Option<BlockStatement>,
    },
    /// `func name(params) { ... }`
    NamedFunction {
        name: Identifier,
        function: FunctionLiteral,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PrefixOperator {
    Bang,
    Minus,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InfixOperator {
    Plus,
    Minus,
    Multiply,
    Divide,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    NotEq,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Identifier(Identifier),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Array(Vec<Expression>),
    /// Key/value pairs in source order.
    HashMap(Vec<(Expression, Expression)>),
    Prefix {
        operator: PrefixOperator,
        right: Box<Expression>,
    },
    Infix {
        operator: InfixOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    If {
        condition: Box<Expression>,
        consequence: BlockStatement,
        alternative: Option<BlockStatement>,
    },
    Function(FunctionLiteral),
    Call {
        function: Box<Expression>,
        arguments: Vec<Expression>,
    },
    Index {
        left: Box<Expression>,
        index: Box<Expression>,
    },
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

// Conditions must come out parenthesized; prefix, infix and index forms already are.
fn write_condition(f: &mut fmt::Formatter<'_>, condition: &Expression) -> fmt::Result {
    match condition {
        Expression::Prefix { .. } | Expression::Infix { .. } | Expression::Index { .. } => {
            write!(f, "{}", condition)
        }
        _ => write!(f, "({})", condition),
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(
        f,
        "\"{}\"",
        s.chars().fold(String::new(), |mut acc, char| {
            match char {
                '"' => acc.push_str("\\\""),
                '\\' => acc.push_str("\\\\"),
                '\n' => acc.push_str("\\n"),
                '\r' => acc.push_str("\\r"),
                '\t' => acc.push_str("\\t"),
                c => acc.push(c),
            }
            acc
        })
    )
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            write!(f, "{}", statement)?;
        }
        Ok(())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl fmt::Display for BlockStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            write!(f, "{}", statement)?;
        }
        Ok(())
    }
}

impl fmt::Display for FunctionLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "func(")?;
        write_joined(f, &self.parameters)?;
        write!(f, ") {{ {} }}", self.body)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Assign { name, value } => write!(f, "{} = {};", name, value),
            Statement::Return(value) => write!(f, "return {};", value),
            Statement::Expression(expression) => write!(f, "{}", expression),
            Statement::While {
                condition,
                body,
                alternative,
            } => {
                write!(f, "while ")?;
                write_condition(f, condition)?;
                write!(f, " {{ {} }}", body)?;
                if let Some(alternative) = alternative {
                    write!(f, " else {{ {} }}", alternative)?;
                }
                Ok(())
            }
            Statement::NamedFunction { name, function } => {
                write!(f, "func {}(", name)?;
                write_joined(f, &function.parameters)?;
                write!(f, ") {{ {} }}", function.body)
            }
        }
    }
}

impl fmt::Display for PrefixOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefixOperator::Bang => write!(f, "!"),
            PrefixOperator::Minus => write!(f, "-"),
        }
    }
}

impl fmt::Display for InfixOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            InfixOperator::Plus => "+",
            InfixOperator::Minus => "-",
            InfixOperator::Multiply => "*",
            InfixOperator::Divide => "/",
            InfixOperator::Lt => "<",
            InfixOperator::LtEq => "<=",
            InfixOperator::Gt => ">",
            InfixOperator::GtEq => ">=",
            InfixOperator::Eq => "==",
            InfixOperator::NotEq => "!=",
        };
        write!(f, "{}", symbol)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier(identifier) => write!(f, "{}", identifier),
            Expression::Integer(value) => write!(f, "{}", value),
            Expression::Float(value) => write!(f, "{:?}", value),
            Expression::Boolean(value) => write!(f, "{}", value),
            Expression::String(value) => write_escaped(f, value),
            Expression::Array(elements) => {
                write!(f, "[")?;
                write_joined(f, elements)?;
                write!(f, "]")
            }
            Expression::HashMap(pairs) => {
                write!(f, "{{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Expression::Prefix { operator, right } => write!(f, "({}{})", operator, right),
            Expression::Infix {
                operator,
                left,
                right,
            } => write!(f, "({} {} {})", left, operator, right),
            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                write!(f, "if ")?;
                write_condition(f, condition)?;
                write!(f, " {{ {} }}", consequence)?;
                if let Some(alternative) = alternative {
                    write!(f, " else {{ {} }}", alternative)?;
                }
                Ok(())
            }
            Expression::Function(function) => write!(f, "{}", function),
            Expression::Call {
                function,
                arguments,
            } => {
                write!(f, "{}(", function)?;
                write_joined(f, arguments)?;
                write!(f, ")")
            }
            Expression::Index { left, index } => write!(f, "({}[{}])", left, index),
        }
    }
}
