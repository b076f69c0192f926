use crate::ast::{
    BlockStatement, Expression, FunctionLiteral, Identifier, InfixOperator, PrefixOperator,
    Program, Statement,
};
use crate::builtins;
use crate::environment::Environment;
use crate::object::{Function, HashMapObject, Object};
use std::cell::RefCell;
use std::rc::Rc;

// Unwraps an ordinary value, or returns a signal (Error / ReturnValue) from
// the enclosing function so it is never stored or operated on.
macro_rules! try_value {
    ($object:expr) => {
        match $object {
            signal @ (Object::Error(_) | Object::ReturnValue(_)) => return signal,
            value => value,
        }
    };
}

fn eval_error(message: String) -> Object {
    tracing::debug!(%message, "evaluation error");
    Object::Error(message)
}

// --- Evaluate Function ---

/// Evaluates a whole program against `env`.
///
/// Evaluation stops at the first `Error`, which becomes the result. A
/// top-level `return` stops the program and yields its unwrapped value.
/// An empty program evaluates to `null`.
pub fn evaluate(program: &Program, env: &Rc<RefCell<Environment>>) -> Object {
    let mut result = Object::Null;
    for statement in &program.statements {
        result = eval_statement(statement, env);
        match result {
            Object::ReturnValue(value) => return *value,
            Object::Error(_) => return result,
            _ => {}
        }
    }
    result
}

/// Evaluates a nested statement sequence. Signals are handed back still
/// wrapped so that the enclosing call or loop can react to them.
fn eval_block(block: &BlockStatement, env: &Rc<RefCell<Environment>>) -> Object {
    let mut result = Object::Null;
    for statement in &block.statements {
        result = eval_statement(statement, env);
        if matches!(result, Object::ReturnValue(_) | Object::Error(_)) {
            return result;
        }
    }
    result
}

pub fn eval_statement(statement: &Statement, env: &Rc<RefCell<Environment>>) -> Object {
    match statement {
        Statement::Assign { name, value } => {
            let value = try_value!(eval_expression(value, env));
            env.borrow_mut().set(name.name.clone(), value.clone());
            value
        }
        Statement::Return(value) => {
            let value = try_value!(eval_expression(value, env));
            Object::ReturnValue(Box::new(value))
        }
        Statement::Expression(expression) => eval_expression(expression, env),
        Statement::While {
            condition,
            body,
            alternative,
        } => eval_while(condition, body, alternative.as_ref(), env),
        Statement::NamedFunction { name, function } => {
            let function = new_function(function, env);
            env.borrow_mut().set(name.name.clone(), function.clone());
            function
        }
    }
}

pub fn eval_expression(expression: &Expression, env: &Rc<RefCell<Environment>>) -> Object {
    match expression {
        Expression::Identifier(identifier) => eval_identifier(identifier, env),
        Expression::Integer(value) => Object::Integer(*value),
        Expression::Float(value) => Object::Float(*value),
        Expression::Boolean(value) => Object::Boolean(*value),
        Expression::String(value) => Object::String(value.clone()),
        Expression::Array(elements) => {
            let mut values = Vec::with_capacity(elements.len());
            for element in elements {
                values.push(try_value!(eval_expression(element, env)));
            }
            Object::array(values)
        }
        Expression::HashMap(pairs) => eval_hash_map_literal(pairs, env),
        Expression::Prefix { operator, right } => {
            let right = try_value!(eval_expression(right, env));
            eval_prefix_expression(*operator, right)
        }
        Expression::Infix {
            operator,
            left,
            right,
        } => {
            let left = try_value!(eval_expression(left, env));
            let right = try_value!(eval_expression(right, env));
            eval_infix_expression(*operator, left, right)
        }
        Expression::If {
            condition,
            consequence,
            alternative,
        } => {
            let condition = try_value!(eval_expression(condition, env));
            if condition.is_truthy() {
                eval_block(consequence, env)
            } else if let Some(alternative) = alternative {
                eval_block(alternative, env)
            } else {
                Object::Null
            }
        }
        Expression::Function(function) => new_function(function, env),
        Expression::Call {
            function,
            arguments,
        } => {
            let function = try_value!(eval_expression(function, env));
            let mut args = Vec::with_capacity(arguments.len());
            for argument in arguments {
                args.push(try_value!(eval_expression(argument, env)));
            }
            apply_function(function, args)
        }
        Expression::Index { left, index } => {
            let left = try_value!(eval_expression(left, env));
            let index = try_value!(eval_expression(index, env));
            eval_index_expression(left, index)
        }
    }
}

// Environment chain first, then the builtin registry.
fn eval_identifier(identifier: &Identifier, env: &Rc<RefCell<Environment>>) -> Object {
    if let Some(value) = env.borrow().get(&identifier.name) {
        return value;
    }
    match builtins::lookup(&identifier.name) {
        Some(builtin) => Object::Builtin(builtin),
        None => eval_error(format!("identifier not found: {}", identifier.name)),
    }
}

fn new_function(function: &FunctionLiteral, env: &Rc<RefCell<Environment>>) -> Object {
    Object::Function(Rc::new(Function {
        parameters: function.parameters.clone(),
        body: Rc::clone(&function.body),
        env: Rc::clone(env),
    }))
}

fn eval_while(
    condition: &Expression,
    body: &BlockStatement,
    alternative: Option<&BlockStatement>,
    env: &Rc<RefCell<Environment>>,
) -> Object {
    let mut result = None;
    loop {
        let condition = try_value!(eval_expression(condition, env));
        if !condition.is_truthy() {
            break;
        }
        let value = eval_block(body, env);
        if matches!(value, Object::ReturnValue(_) | Object::Error(_)) {
            return value;
        }
        result = Some(value);
    }
    match (result, alternative) {
        (Some(value), _) => value,
        (None, Some(alternative)) => eval_block(alternative, env),
        (None, None) => Object::Null,
    }
}

// Pairs are inserted in source order, so a repeated key keeps the last value.
fn eval_hash_map_literal(
    pairs: &[(Expression, Expression)],
    env: &Rc<RefCell<Environment>>,
) -> Object {
    let mut map = HashMapObject::new();
    for (key_expression, value_expression) in pairs {
        let key = try_value!(eval_expression(key_expression, env));
        let Some(hash) = key.hash_key() else {
            return eval_error(format!("unusable as hash key: {}", key.object_type()));
        };
        let value = try_value!(eval_expression(value_expression, env));
        map.insert(hash, key, value);
    }
    Object::hash_map(map)
}

fn eval_prefix_expression(operator: PrefixOperator, right: Object) -> Object {
    match (operator, right) {
        (PrefixOperator::Bang, right) => Object::Boolean(!right.is_truthy()),
        (PrefixOperator::Minus, Object::Integer(value)) => Object::Integer(value.wrapping_neg()),
        (PrefixOperator::Minus, Object::Float(value)) => Object::Float(-value),
        (PrefixOperator::Minus, right) => {
            eval_error(format!("unknown operator: -{}", right.object_type()))
        }
    }
}

fn eval_infix_expression(operator: InfixOperator, left: Object, right: Object) -> Object {
    match (&left, &right) {
        (Object::Integer(l), Object::Integer(r)) => eval_integer_infix(operator, *l, *r),
        (Object::Float(l), Object::Float(r)) => eval_float_infix(operator, *l, *r),
        (Object::String(l), Object::String(r)) if operator == InfixOperator::Plus => {
            Object::String(format!("{}{}", l, r))
        }
        _ if left.object_type() != right.object_type() => eval_error(format!(
            "type mismatch: {} {} {}",
            left.object_type(),
            operator,
            right.object_type()
        )),
        _ => match operator {
            InfixOperator::Eq => Object::Boolean(left.value_eq(&right)),
            InfixOperator::NotEq => Object::Boolean(!left.value_eq(&right)),
            _ => eval_error(format!(
                "unknown operator: {} {} {}",
                left.object_type(),
                operator,
                right.object_type()
            )),
        },
    }
}

// Arithmetic wraps on overflow; division truncates toward zero.
fn eval_integer_infix(operator: InfixOperator, left: i64, right: i64) -> Object {
    match operator {
        InfixOperator::Plus => Object::Integer(left.wrapping_add(right)),
        InfixOperator::Minus => Object::Integer(left.wrapping_sub(right)),
        InfixOperator::Multiply => Object::Integer(left.wrapping_mul(right)),
        InfixOperator::Divide => {
            if right == 0 {
                eval_error("division by zero".to_string())
            } else {
                Object::Integer(left.wrapping_div(right))
            }
        }
        InfixOperator::Lt => Object::Boolean(left < right),
        InfixOperator::LtEq => Object::Boolean(left <= right),
        InfixOperator::Gt => Object::Boolean(left > right),
        InfixOperator::GtEq => Object::Boolean(left >= right),
        InfixOperator::Eq => Object::Boolean(left == right),
        InfixOperator::NotEq => Object::Boolean(left != right),
    }
}

fn eval_float_infix(operator: InfixOperator, left: f64, right: f64) -> Object {
    match operator {
        InfixOperator::Plus => Object::Float(left + right),
        InfixOperator::Minus => Object::Float(left - right),
        InfixOperator::Multiply => Object::Float(left * right),
        InfixOperator::Divide => Object::Float(left / right),
        InfixOperator::Lt => Object::Boolean(left < right),
        InfixOperator::LtEq => Object::Boolean(left <= right),
        InfixOperator::Gt => Object::Boolean(left > right),
        InfixOperator::GtEq => Object::Boolean(left >= right),
        InfixOperator::Eq => Object::Boolean(left == right),
        InfixOperator::NotEq => Object::Boolean(left != right),
    }
}

fn eval_index_expression(left: Object, index: Object) -> Object {
    match (&left, &index) {
        (Object::Array(elements), Object::Integer(i)) => {
            let elements = elements.borrow();
            usize::try_from(*i)
                .ok()
                .and_then(|i| elements.get(i).cloned())
                .unwrap_or(Object::Null)
        }
        (Object::HashMap(map), _) => match index.hash_key() {
            Some(hash) => map
                .borrow()
                .get(&hash)
                .map_or(Object::Null, |pair| pair.value.clone()),
            None => eval_error(format!("unusable as hash key: {}", index.object_type())),
        },
        (Object::Array(_), _) => eval_error(format!(
            "index operator not supported: ARRAY[{}]",
            index.object_type()
        )),
        _ => eval_error(format!(
            "index operator not supported: {}",
            left.object_type()
        )),
    }
}

/// Applies a callable to already evaluated arguments.
///
/// Arity is checked exactly. The call frame encloses the function's captured
/// environment, and a `ReturnValue` from the body is unwrapped here so return
/// never leaks past the call.
pub fn apply_function(function: Object, args: Vec<Object>) -> Object {
    tracing::trace!(callee = %function.object_type(), arity = args.len(), "apply function");
    match function {
        Object::Function(function) => {
            if args.len() > function.parameters.len() {
                return eval_error("too many arguments".to_string());
            }
            if args.len() < function.parameters.len() {
                return eval_error("not enough arguments".to_string());
            }

            let call_env = Environment::new_enclosed(Rc::clone(&function.env));
            {
                let mut frame = call_env.borrow_mut();
                for (parameter, arg) in function.parameters.iter().zip(args) {
                    frame.set(parameter.name.clone(), arg);
                }
            }

            match eval_block(&function.body, &call_env) {
                Object::ReturnValue(value) => *value,
                result => result,
            }
        }
        Object::Builtin(builtin) => (builtin.func)(args),
        other => eval_error(format!("not a function: {}", other.object_type())),
    }
}
