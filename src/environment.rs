use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

/// A single scope frame: named bindings plus an optional link to the
/// enclosing frame.  Frames are shared (`Rc<RefCell<_>>`) because closures
/// keep their defining frame alive past block exit.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Unconditionally binds `name` in this frame, overwriting any previous
    /// binding.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Walks the chain outward and returns the first binding found.
    pub fn get(&self, name: &str) -> Result<Value, String> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(format!("Undefined variable '{}'.", name))
        }
    }

    /// Walks the chain outward and assigns to the first binding found.  Never
    /// auto-defines.
    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), String> {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(format!("Undefined variable '{}'.", name))
        }
    }

    /// Hops exactly `depth` enclosing links, then reads `name` in that frame
    /// without any further search.  A miss at that exact frame means the
    /// resolver recorded a bad depth.
    pub fn get_at(
        env: &Rc<RefCell<Environment>>,
        depth: usize,
        name: &str,
    ) -> Result<Value, String> {
        let frame = Environment::ancestor(env, depth)?;
        let value = frame.borrow().values.get(name).cloned();

        value.ok_or_else(|| format!("Undefined variable '{}'.", name))
    }

    /// Hops exactly `depth` enclosing links, then assigns `name` in that
    /// frame.
    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        depth: usize,
        name: &str,
        value: Value,
    ) -> Result<(), String> {
        let frame = Environment::ancestor(env, depth)?;

        if !frame.borrow().values.contains_key(name) {
            return Err(format!("Undefined variable '{}'.", name));
        }

        frame.borrow_mut().values.insert(name.to_string(), value);
        Ok(())
    }

    fn ancestor(
        env: &Rc<RefCell<Environment>>,
        depth: usize,
    ) -> Result<Rc<RefCell<Environment>>, String> {
        let mut frame = Rc::clone(env);

        for _ in 0..depth {
            let enclosing = frame.borrow().enclosing.clone();

            match enclosing {
                Some(parent) => frame = parent,
                None => return Err("Scope chain shorter than resolved depth.".to_string()),
            }
        }

        Ok(frame)
    }
}
