use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::Error;
use crate::token::Token;
use crate::value::Value;

pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>, // Parent-pointer
}

impl Environment {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn from(enclosing: &Rc<RefCell<Environment>>) -> Self {
        Self {
            values: HashMap::new(),
            enclosing: Some(Rc::clone(enclosing)),
        }
    }

    pub fn define(&mut self, name: String, value: Value) {
        self.values.insert(name, value);
    }

    pub fn get(&self, name: &Token) -> Result<Value, Error> {
        let key = &*name.lexeme;
        if let Some(value) = self.values.get(key) {
            Ok(value.clone())
        } else if let Some(ref enclosing) = self.enclosing {
            // it is probably faster to iteratively walk the chain but recursion here is prettier
            enclosing.borrow().get(name)
        } else {
            Err(Error::Runtime {
                token: name.clone(),
                message: format!("Undefined variable '{}'.", key),
            })
        }
    }

    pub fn assign(&mut self, name: &Token, value: Value) -> Result<(), Error> {
        let key = &*name.lexeme;
        if self.values.contains_key(key) {
            self.values.insert(name.lexeme.clone(), value);
            Ok(())
        } else if let Some(ref enclosing) = self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(Error::Runtime {
                token: name.clone(),
                message: format!("Undefined variable '{}'.", key),
            })
        }
    }

    /// Walks `depth` parent links up the chain. Panics if the resolver's
    /// binding map and the live environment chain disagree — that would be a
    /// bug in the resolver, not a user-facing runtime error.
    pub fn ancestor(env: &Rc<RefCell<Environment>>, depth: usize) -> Rc<RefCell<Environment>> {
        let mut current = Rc::clone(env);
        for _ in 0..depth {
            let next = current
                .borrow()
                .enclosing
                .as_ref()
                .expect("resolver-computed depth exceeds environment chain length")
                .clone();
            current = next;
        }
        current
    }

    pub fn get_at(env: &Rc<RefCell<Environment>>, depth: usize, name: &Token) -> Result<Value, Error> {
        let target = Self::ancestor(env, depth);
        let value = target
            .borrow()
            .values
            .get(&name.lexeme)
            .cloned()
            .expect("resolver-computed binding missing from its resolved scope");
        Ok(value)
    }

    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        depth: usize,
        name: &Token,
        value: Value,
    ) -> Result<(), Error> {
        let target = Self::ancestor(env, depth);
        target.borrow_mut().values.insert(name.lexeme.clone(), value);
        Ok(())
    }
}
