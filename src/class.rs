use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::function::LoxFunction;
use crate::value::Value;

/// A user-defined class: its method table plus an optional superclass link.
/// Method lookup walks the superclass chain, so a subclass method shadows the
/// superclass method of the same name.
#[derive(Debug)]
pub struct LoxClass {
    pub name: String,
    pub superclass: Option<Rc<LoxClass>>,
    pub methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    pub fn new(
        name: String,
        superclass: Option<Rc<LoxClass>>,
        methods: HashMap<String, Rc<LoxFunction>>,
    ) -> Self {
        LoxClass {
            name,
            superclass,
            methods,
        }
    }

    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }

        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }

    /// Calling a class runs its `init` method, so the class arity is the
    /// initializer's arity (0 when there is none).
    pub fn arity(&self) -> usize {
        self.find_method("init")
            .map_or(0, |initializer| initializer.arity())
    }
}

/// An instance: a reference to its class and a mutable field map.
#[derive(Debug)]
pub struct LoxInstance {
    pub class: Rc<LoxClass>,
    fields: HashMap<String, Value>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        LoxInstance {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class.name
    }

    /// Fields shadow methods.  A method hit is bound to `instance` before it
    /// is returned, so `this` works however the result is used.
    pub fn get(instance: &Rc<RefCell<LoxInstance>>, name: &str) -> Option<Value> {
        if let Some(field) = instance.borrow().fields.get(name) {
            return Some(field.clone());
        }

        let class = Rc::clone(&instance.borrow().class);

        class.find_method(name).map(|method| {
            Value::Function(Rc::new(
                method.bind(Value::Instance(Rc::clone(instance))),
            ))
        })
    }

    /// Unconditionally writes the field, creating it if absent.
    pub fn set(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }
}
