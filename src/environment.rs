use crate::object::Object;
use std::cell::RefCell;
use rustc_hash::FxHashMap;
use std::collections::HashSet;
use std::rc::Rc;

/// One frame of the lexical scope chain.
///
/// Frames are shared (`Rc<RefCell<...>>`) because every closure created in a
/// frame keeps it alive after the call that created it has returned. Frames
/// are not synchronized; an evaluation owns its environment tree.
#[derive(Debug, Default)]
pub struct Environment {
    outer: Option<Rc<RefCell<Environment>>>,
    bindings: FxHashMap<String, Object>,
}

impl Environment {
    /// Creates a new, top-level (global) environment.
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// Creates a new environment enclosed within an outer one.
    pub fn new_enclosed(outer_env: Rc<RefCell<Environment>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment {
            outer: Some(outer_env),
            bindings: FxHashMap::default(),
        }))
    }

    /// Binds `name` in *this* frame, replacing any existing binding here.
    /// Outer frames are never written.
    pub fn set(&mut self, name: impl Into<String>, value: Object) {
        self.bindings.insert(name.into(), value);
    }

    /// Looks up a variable's value.
    /// Checks the current environment first, then walks up the outer environment chain.
    pub fn get(&self, name: &str) -> Option<Object> {
        match self.bindings.get(name) {
            Some(value) => Some(value.clone()),
            None => self
                .outer
                .as_ref()
                .and_then(|outer_env| outer_env.borrow().get(name)),
        }
    }

    /// Gets all identifiers visible from this frame
    pub fn get_identifiers(&self) -> HashSet<String> {
        let mut identifiers: HashSet<String> = self.bindings.keys().cloned().collect();
        if let Some(ref outer_env) = self.outer {
            identifiers.extend(outer_env.borrow().get_identifiers());
        }
        identifiers
    }
}
