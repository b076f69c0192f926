use crate::ast::{BlockStatement, Identifier};
use crate::environment::Environment;
use rustc_hash::{FxHashMap, FxHasher};
use std::cell::RefCell;
use std::fmt;
use std::hash::Hasher;
use std::rc::Rc;

/// Type tag of a runtime value, rendered in error messages.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Integer,
    Float,
    String,
    Boolean,
    Null,
    Array,
    HashMap,
    Function,
    Builtin,
    ReturnValue,
    Error,
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectType::Integer => "INTEGER",
            ObjectType::Float => "FLOAT",
            ObjectType::String => "STRING",
            ObjectType::Boolean => "BOOLEAN",
            ObjectType::Null => "NULL",
            ObjectType::Array => "ARRAY",
            ObjectType::HashMap => "HASHMAP",
            ObjectType::Function => "FUNCTION",
            ObjectType::Builtin => "BUILTIN",
            ObjectType::ReturnValue => "RETURN_VALUE",
            ObjectType::Error => "ERROR",
        };
        write!(f, "{}", name)
    }
}

pub type BuiltinFunc = fn(Vec<Object>) -> Object;

/// A native function from the builtin registry.
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFunc,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

/// A closure: parameters and body plus the frame active where it was defined.
pub struct Function {
    pub parameters: Vec<Identifier>,
    pub body: Rc<BlockStatement>,
    pub env: Rc<RefCell<Environment>>,
}

impl fmt::Debug for Function {
    // The captured frame may contain this very function, so it is not printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("parameters", &self.parameters)
            .field("body", &self.body.to_string())
            .finish_non_exhaustive()
    }
}

/// Hash code of a hashable value. The type is part of the key so that values
/// of different types never share an entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct HashKey {
    pub kind: ObjectType,
    pub code: u64,
}

#[derive(Debug, Clone)]
pub struct HashPair {
    pub key: Object,
    pub value: Object,
}

/// Hashmap value. Entries keep first-insertion order.
#[derive(Debug, Clone, Default)]
pub struct HashMapObject {
    entries: FxHashMap<HashKey, HashPair>,
    order: Vec<HashKey>,
}

impl HashMapObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites. An overwritten key keeps its position.
    pub fn insert(&mut self, hash: HashKey, key: Object, value: Object) {
        if self
            .entries
            .insert(hash, HashPair { key, value })
            .is_none()
        {
            self.order.push(hash);
        }
    }

    pub fn get(&self, hash: &HashKey) -> Option<&HashPair> {
        self.entries.get(hash)
    }

    pub fn remove(&mut self, hash: &HashKey) -> Option<HashPair> {
        let removed = self.entries.remove(hash)?;
        self.order.retain(|k| k != hash);
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entries in insertion order.
    pub fn pairs(&self) -> impl Iterator<Item = &HashPair> {
        self.order.iter().filter_map(|hash| self.entries.get(hash))
    }
}

/// A runtime value.
///
/// `ReturnValue` and `Error` are control-flow signals: they short-circuit
/// statement sequences and are never stored inside arrays, maps or frames.
/// Arrays and hashmaps are shared references, so `pop` and `delete` are seen
/// through every binding.
#[derive(Debug, Clone)]
pub enum Object {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
    Array(Rc<RefCell<Vec<Object>>>),
    HashMap(Rc<RefCell<HashMapObject>>),
    Function(Rc<Function>),
    Builtin(Builtin),
    ReturnValue(Box<Object>),
    Error(String),
}

impl Object {
    pub fn array(elements: Vec<Object>) -> Object {
        Object::Array(Rc::new(RefCell::new(elements)))
    }

    pub fn hash_map(map: HashMapObject) -> Object {
        Object::HashMap(Rc::new(RefCell::new(map)))
    }

    pub fn error(message: impl Into<String>) -> Object {
        Object::Error(message.into())
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            Object::Integer(_) => ObjectType::Integer,
            Object::Float(_) => ObjectType::Float,
            Object::String(_) => ObjectType::String,
            Object::Boolean(_) => ObjectType::Boolean,
            Object::Null => ObjectType::Null,
            Object::Array(_) => ObjectType::Array,
            Object::HashMap(_) => ObjectType::HashMap,
            Object::Function(_) => ObjectType::Function,
            Object::Builtin(_) => ObjectType::Builtin,
            Object::ReturnValue(_) => ObjectType::ReturnValue,
            Object::Error(_) => ObjectType::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Object::Error(_))
    }

    /// `false` and `null` are falsy; everything else, `0` included, is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Object::Boolean(false) | Object::Null)
    }

    /// Hash code for values usable as map keys; `None` for every other type.
    /// Values equal under `value_eq` always produce the same key.
    pub fn hash_key(&self) -> Option<HashKey> {
        let code = match self {
            Object::Integer(value) => *value as u64,
            Object::Boolean(value) => u64::from(*value),
            Object::String(value) => {
                let mut hasher = FxHasher::default();
                hasher.write(value.as_bytes());
                hasher.finish()
            }
            _ => return None,
        };
        Some(HashKey {
            kind: self.object_type(),
            code,
        })
    }

    /// Structural equality used by `==` and `!=`. Functions compare by
    /// identity, builtins by name.
    pub fn value_eq(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Integer(a), Object::Integer(b)) => a == b,
            (Object::Float(a), Object::Float(b)) => a == b,
            (Object::String(a), Object::String(b)) => a == b,
            (Object::Boolean(a), Object::Boolean(b)) => a == b,
            (Object::Null, Object::Null) => true,
            (Object::Array(a), Object::Array(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.value_eq(y))
            }
            (Object::HashMap(a), Object::HashMap(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.entries.iter().all(|(hash, pair)| {
                        b.get(hash)
                            .is_some_and(|other| pair.value.value_eq(&other.value))
                    })
            }
            (Object::Function(a), Object::Function(b)) => Rc::ptr_eq(a, b),
            (Object::Builtin(a), Object::Builtin(b)) => a.name == b.name,
            (Object::ReturnValue(a), Object::ReturnValue(b)) => a.value_eq(b),
            (Object::Error(a), Object::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Integer(value) => write!(f, "{}", value),
            Object::Float(value) => write!(f, "{:?}", value),
            Object::String(value) => write!(f, "{}", value),
            Object::Boolean(value) => write!(f, "{}", value),
            Object::Null => write!(f, "null"),
            Object::Array(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            Object::HashMap(map) => {
                write!(f, "{{")?;
                for (i, pair) in map.borrow().pairs().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", pair.key, pair.value)?;
                }
                write!(f, "}}")
            }
            Object::Function(function) => {
                write!(f, "func(")?;
                for (i, parameter) in function.parameters.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", parameter)?;
                }
                write!(f, ") {{ {} }}", function.body)
            }
            Object::Builtin(_) => write!(f, "builtin function"),
            Object::ReturnValue(value) => write!(f, "{}", value),
            Object::Error(message) => write!(f, "ERROR: {}", message),
        }
    }
}
