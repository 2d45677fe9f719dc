use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::Stmt;
use crate::environment::Environment;
use crate::error::Error;
use crate::interpreter::Interpreter;
use crate::token::Token;
use crate::value::Value;

#[derive(Clone)]
pub enum Function {
    // These are functions that the interpreter exposes to user code but that
    // are implemented in the host language. Sometimes these are called
    // primitives, external functions, or foreign functions. Many languages
    // also allow users to provide their own native functions; the mechanism
    // for doing so is called a foreign function interface (FFI). To add a
    // native function, the book uses anonymous class instances that
    // implement the LoxCallable interface — here a boxed closure plays that
    // role, which lets e.g. `clock()` capture the interpreter's start time.
    Native {
        arity: usize,
        body: Rc<dyn Fn(&[Value]) -> Value>,
    },

    // LoxFunction in the book. `name` is absent for lambdas, which are never
    // declared in the enclosing scope.
    User {
        name: Option<Token>,
        params: Vec<Token>,
        body: Rc<Vec<Stmt>>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    },
}

impl Function {
    pub fn new_user(
        name: Option<Token>,
        params: Vec<Token>,
        body: Vec<Stmt>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
        Function::User {
            name,
            params,
            body: Rc::new(body),
            closure,
            is_initializer,
        }
    }

    // We pass in the interpreter in case the callee needs it, plus the list of
    // evaluated argument values; we return the value the call expression
    // produces.
    pub fn call(&self, interpreter: &mut Interpreter, arguments: &[Value]) -> Result<Value, Error> {
        match self {
            Function::Native { body, .. } => Ok((body)(arguments)),
            Function::User { params, body, closure, is_initializer, .. } => {
                // Each call gets its own environment, nested in the closure.
                // Otherwise recursion, and concurrent in-flight calls to the
                // same function, would stomp on each other's locals.
                let environment = Rc::new(RefCell::new(Environment::from(closure)));
                for (param, argument) in params.iter().zip(arguments.iter()) {
                    environment.borrow_mut().define(param.lexeme.clone(), argument.clone());
                }

                let result = interpreter.execute_block(body, environment.clone());

                // An initializer always yields the instance it just set up,
                // even if the body contains a bare `return;`.
                if *is_initializer {
                    return match result {
                        Err(Error::Return { .. }) | Ok(()) => {
                            Ok(environment.borrow().get(&this_token()).unwrap_or(Value::Nil))
                        }
                        Err(other) => Err(other),
                    };
                }

                match result {
                    Err(Error::Return { value }) => Ok(value),
                    Err(other) => Err(other),
                    Ok(()) => Ok(Value::Nil), // no return statement was hit
                }
            }
        }
    }

    // We create a new environment nestled inside the method's original closure
    // - a closure-within-a-closure. When the method is called, that becomes
    // the parent of the method body's environment. We declare "this" there and
    // bind it to the instance the method was accessed from.
    pub fn bind(&self, instance: Value) -> Self {
        match self {
            Function::Native { .. } => unreachable!("native functions are never bound"),
            Function::User { name, params, body, closure, is_initializer } => {
                let environment = Rc::new(RefCell::new(Environment::from(closure)));
                environment.borrow_mut().define("this".to_string(), instance);
                Function::User {
                    name: name.clone(),
                    params: params.clone(),
                    body: Rc::clone(body),
                    closure: environment,
                    is_initializer: *is_initializer,
                }
            }
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Function::Native { arity, .. } => *arity,
            Function::User { params, .. } => params.len(),
        }
    }
}

fn this_token() -> Token {
    Token::new(crate::token::TokenType::This, "this", 0, 0)
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Native { .. } => write!(f, "<native fn>"),
            Function::User { name: Some(name), .. } => write!(f, "<fn {}>", name.lexeme),
            Function::User { name: None, .. } => write!(f, "<fn>"),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}
