//! The fixed registry of native functions. The evaluator consults it only
//! after an identifier is missing from the whole environment chain.

use crate::object::{Builtin, Object, ObjectType};
use std::io::{self, Write};

// Returns an arity error object from the enclosing builtin
macro_rules! check_arity {
    ($args:expr, $expected:expr) => {
        if $args.len() != $expected {
            return Object::error(format!(
                "wrong number of arguments. got={}, want={}",
                $args.len(),
                $expected
            ));
        }
    };
}

pub const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "len",
        func: builtin_len,
    },
    Builtin {
        name: "push",
        func: builtin_push,
    },
    Builtin {
        name: "pop",
        func: builtin_pop,
    },
    Builtin {
        name: "keys",
        func: builtin_keys,
    },
    Builtin {
        name: "delete",
        func: builtin_delete,
    },
    Builtin {
        name: "print",
        func: builtin_print,
    },
];

pub fn lookup(name: &str) -> Option<Builtin> {
    BUILTINS.iter().find(|builtin| builtin.name == name).copied()
}

pub fn names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|builtin| builtin.name)
}

fn wrong_type(name: &str, expected: ObjectType, found: &Object) -> Object {
    Object::error(format!(
        "argument to `{}` must be {}, got {}",
        name,
        expected,
        found.object_type()
    ))
}

fn builtin_len(args: Vec<Object>) -> Object {
    check_arity!(args, 1);
    match &args[0] {
        Object::String(value) => Object::Integer(value.len() as i64),
        Object::Array(elements) => Object::Integer(elements.borrow().len() as i64),
        other => Object::error(format!(
            "argument to `len` not supported, got {}",
            other.object_type()
        )),
    }
}

// Returns a new array; the argument is left untouched.
fn builtin_push(args: Vec<Object>) -> Object {
    check_arity!(args, 2);
    match &args[0] {
        Object::Array(elements) => {
            let mut new_elements = elements.borrow().clone();
            new_elements.push(args[1].clone());
            Object::array(new_elements)
        }
        other => wrong_type("push", ObjectType::Array, other),
    }
}

// Removes the last element in place.
fn builtin_pop(args: Vec<Object>) -> Object {
    check_arity!(args, 1);
    match &args[0] {
        Object::Array(elements) => elements.borrow_mut().pop().unwrap_or(Object::Null),
        other => wrong_type("pop", ObjectType::Array, other),
    }
}

fn builtin_keys(args: Vec<Object>) -> Object {
    check_arity!(args, 1);
    match &args[0] {
        Object::HashMap(map) => {
            Object::array(map.borrow().pairs().map(|pair| pair.key.clone()).collect())
        }
        other => wrong_type("keys", ObjectType::HashMap, other),
    }
}

fn builtin_delete(args: Vec<Object>) -> Object {
    check_arity!(args, 2);
    let Object::HashMap(map) = &args[0] else {
        return wrong_type("delete", ObjectType::HashMap, &args[0]);
    };
    match args[1].hash_key() {
        Some(hash) => {
            map.borrow_mut().remove(&hash);
            Object::Null
        }
        None => Object::error(format!(
            "unusable as hash key: {}",
            args[1].object_type()
        )),
    }
}

fn builtin_print(args: Vec<Object>) -> Object {
    let mut out = io::stdout().lock();
    for arg in &args {
        if let Err(err) = writeln!(out, "{}", arg) {
            return Object::error(format!("print failed: {}", err));
        }
    }
    Object::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::HashMapObject;

    fn call(name: &str, args: Vec<Object>) -> Object {
        let builtin = lookup(name).unwrap_or_else(|| panic!("no builtin named {}", name));
        (builtin.func)(args)
    }

    fn assert_error(result: Object, expected: &str) {
        match result {
            Object::Error(message) => assert_eq!(message, expected),
            other => panic!("Expected error '{}', got {:?}", expected, other),
        }
    }

    fn ints(values: &[i64]) -> Object {
        Object::array(values.iter().copied().map(Object::Integer).collect())
    }

    fn string(s: &str) -> Object {
        Object::String(s.to_string())
    }

    #[test]
    fn test_registry() {
        let names: Vec<&str> = names().collect();
        assert_eq!(names, vec!["len", "push", "pop", "keys", "delete", "print"]);
        assert!(lookup("nope").is_none());
    }

    #[test]
    fn test_len() {
        assert!(matches!(call("len", vec![string("")]), Object::Integer(0)));
        assert!(matches!(call("len", vec![string("four")]), Object::Integer(4)));
        assert!(matches!(call("len", vec![string("né")]), Object::Integer(3)));
        assert!(matches!(call("len", vec![ints(&[1, 2, 3])]), Object::Integer(3)));
        assert_error(
            call("len", vec![Object::Integer(1)]),
            "argument to `len` not supported, got INTEGER",
        );
        assert_error(
            call("len", vec![string("one"), string("two")]),
            "wrong number of arguments. got=2, want=1",
        );
    }

    #[test]
    fn test_push_returns_new_array() {
        let original = ints(&[1, 2]);
        let pushed = call("push", vec![original.clone(), Object::Integer(3)]);
        assert_eq!(pushed.to_string(), "[1, 2, 3]");
        assert_eq!(original.to_string(), "[1, 2]");
        assert_error(
            call("push", vec![string("s"), Object::Integer(1)]),
            "argument to `push` must be ARRAY, got STRING",
        );
    }

    #[test]
    fn test_pop_mutates_in_place() {
        let array = ints(&[1, 2]);
        assert!(matches!(call("pop", vec![array.clone()]), Object::Integer(2)));
        assert_eq!(array.to_string(), "[1]");
        assert!(matches!(call("pop", vec![array.clone()]), Object::Integer(1)));
        assert!(matches!(call("pop", vec![array]), Object::Null));
        assert_error(
            call("pop", vec![Object::Null]),
            "argument to `pop` must be ARRAY, got NULL",
        );
    }

    #[test]
    fn test_keys_and_delete() {
        let mut map = HashMapObject::new();
        for (key, value) in [(string("a"), 1), (Object::Integer(2), 2)] {
            map.insert(key.hash_key().unwrap(), key, Object::Integer(value));
        }
        let map = Object::hash_map(map);

        assert_eq!(call("keys", vec![map.clone()]).to_string(), "[a, 2]");
        assert!(matches!(
            call("delete", vec![map.clone(), string("a")]),
            Object::Null
        ));
        assert_eq!(call("keys", vec![map.clone()]).to_string(), "[2]");
        // Deleting a missing key is not an error
        assert!(matches!(
            call("delete", vec![map.clone(), string("zzz")]),
            Object::Null
        ));
        assert_error(
            call("delete", vec![map, ints(&[])]),
            "unusable as hash key: ARRAY",
        );
        assert_error(
            call("keys", vec![ints(&[])]),
            "argument to `keys` must be HASHMAP, got ARRAY",
        );
    }

    #[test]
    fn test_print_returns_null() {
        assert!(matches!(
            call("print", vec![string("hello"), Object::Integer(1)]),
            Object::Null
        ));
        assert!(matches!(call("print", vec![]), Object::Null));
    }
}
