use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::Error;
use crate::function::Function;
use crate::token::Token;
use crate::value::Value;

// The instance stores the state, the class stores the behaviour
#[derive(Debug)]
pub struct LoxClass {
    pub name: String,
    pub superclass: Option<Rc<RefCell<LoxClass>>>,
    pub methods: HashMap<String, Rc<Function>>,
}

impl LoxClass {
    pub fn new(
        name: String,
        superclass: Option<Rc<RefCell<LoxClass>>>,
        methods: HashMap<String, Rc<Function>>,
    ) -> Self {
        Self { name, superclass, methods }
    }

    /// Walks the inheritance chain, own methods shadowing the superclass's.
    pub fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        if let Some(method) = self.methods.get(name) {
            Some(Rc::clone(method))
        } else {
            self.superclass
                .as_ref()
                .and_then(|superclass| superclass.borrow().find_method(name))
        }
    }
}

#[derive(Debug)]
pub struct LoxInstance {
    pub class: Rc<RefCell<LoxClass>>,
    fields: HashMap<String, Value>,
}

impl LoxInstance {
    pub fn new(class: &Rc<RefCell<LoxClass>>) -> Value {
        let instance = LoxInstance {
            class: Rc::clone(class),
            fields: HashMap::new(),
        };

        Value::Instance(Rc::new(RefCell::new(instance)))
    }

    /// Returns a member field of this instance.
    /// `instance` - a reference to this instance as a value, needed to bind
    /// methods to the instance they were looked up on.
    pub fn get(&self, name: &Token, instance: &Value) -> Result<Value, Error> {
        if let Some(field) = self.fields.get(&name.lexeme) {
            Ok(field.clone())
        } else if let Some(method) = self.class.borrow().find_method(&name.lexeme) {
            Ok(Value::Function(Rc::new(method.bind(instance.clone()))))
        } else {
            Err(Error::Runtime {
                token: name.clone(),
                message: format!("Undefined property '{}'.", name.lexeme),
            })
        }
    }

    // Since Lox allows freely creating new fields on instances, there's no need
    // to see if the key is already present.
    pub fn set(&mut self, name: &Token, value: Value) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_method_walks_the_superclass_chain() {
        let mut base_methods = HashMap::new();
        base_methods.insert(
            "greet".to_string(),
            Rc::new(Function::Native { arity: 0, body: Rc::new(|_: &[Value]| Value::Nil) }),
        );
        let base = Rc::new(RefCell::new(LoxClass::new("Base".into(), None, base_methods)));
        let derived = LoxClass::new("Derived".into(), Some(Rc::clone(&base)), HashMap::new());

        assert!(derived.find_method("greet").is_some());
        assert!(derived.find_method("missing").is_none());
    }
}
