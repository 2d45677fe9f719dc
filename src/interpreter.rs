//! The tree-walking evaluator (spec §4.4): executes the statements the
//! parser produced, using the binding map the resolver computed to decide
//! whether a variable reference is a local (depth-resolved) or global
//! lookup.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::Instant;

use crate::ast::{expr, stmt, Expr, LiteralValue, Stmt};
use crate::class::{LoxClass, LoxInstance};
use crate::environment::Environment;
use crate::error::{runtime_error, Error};
use crate::function::Function;
use crate::token::{Token, TokenType};
use crate::value::Value;

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    // Binding map from the resolver: token source position -> scope depth
    // (spec §3, §9 DESIGN NOTES). Absence means "look in globals".
    locals: HashMap<(u32, u32), usize>,
    stdout: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_stdout(Box::new(io::stdout()))
    }

    /// Lets tests (and embedders) capture `print` output instead of writing
    /// to the process's real stdout.
    pub fn with_stdout(stdout: Box<dyn Write>) -> Self {
        let start = Instant::now();
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define(
            "clock".to_string(),
            Value::Function(Rc::new(Function::Native {
                arity: 0,
                body: Rc::new(move |_: &[Value]| Value::Number(start.elapsed().as_secs_f64())),
            })),
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            stdout,
        }
    }

    /// Records that `token`, as seen by the resolver, resolves `depth` scopes
    /// up from wherever it is evaluated.
    pub fn resolve(&mut self, token: &Token, depth: usize) {
        self.locals.insert(token.site(), depth);
    }

    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), Error> {
        for statement in statements {
            self.execute(statement)?;
        }
        Ok(())
    }

    fn execute(&mut self, statement: &Stmt) -> Result<(), Error> {
        statement.accept(self)
    }

    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<(), Error> {
        let previous = std::mem::replace(&mut self.environment, environment);

        // Restore the caller's environment even if a statement errors or
        // unwinds via `Error::Return` — otherwise one throwing block would
        // leave the interpreter pointed at a dead scope.
        let result = (|| {
            for statement in statements {
                self.execute(statement)?;
            }
            Ok(())
        })();

        self.environment = previous;
        result
    }

    fn evaluate(&mut self, expression: &Expr) -> Result<Value, Error> {
        expression.accept(self)
    }

    fn look_up_variable(&self, name: &Token) -> Result<Value, Error> {
        if let Some(&depth) = self.locals.get(&name.site()) {
            Environment::get_at(&self.environment, depth, name)
        } else {
            self.globals.borrow().get(name)
        }
    }

    fn number_operand_error<R>(&self, operator: &Token) -> Result<R, Error> {
        Err(runtime_error(operator, "Operand must be a number."))
    }

    fn number_operands_error<R>(&self, operator: &Token) -> Result<R, Error> {
        Err(runtime_error(operator, "Operands must be numbers."))
    }
}

impl expr::Visitor<Value> for Interpreter {
    fn visit_literal_expr(&mut self, value: &LiteralValue) -> Result<Value, Error> {
        Ok(match value {
            LiteralValue::Nil => Value::Nil,
            LiteralValue::Bool(b) => Value::Bool(*b),
            LiteralValue::Number(n) => Value::Number(*n),
            LiteralValue::String(s) => Value::String(s.clone()),
        })
    }

    fn visit_grouping_expr(&mut self, expression: &Expr) -> Result<Value, Error> {
        self.evaluate(expression)
    }

    fn visit_unary_expr(&mut self, operator: &Token, right: &Expr) -> Result<Value, Error> {
        let right = self.evaluate(right)?;

        match operator.kind {
            TokenType::Minus => match right {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => self.number_operand_error(operator),
            },
            TokenType::Bang => Ok(Value::Bool(!right.is_truthy())),
            _ => unreachable!("unary operator other than '-'/'!'"),
        }
    }

    fn visit_binary_expr(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value, Error> {
        let l = self.evaluate(left)?;
        let r = self.evaluate(right)?;

        match operator.kind {
            TokenType::Minus => match (l, r) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
                _ => self.number_operands_error(operator),
            },
            TokenType::Slash => match (l, r) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),
                _ => self.number_operands_error(operator),
            },
            TokenType::Star => match (l, r) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
                _ => self.number_operands_error(operator),
            },
            TokenType::Plus => match (l, r) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                _ => Err(runtime_error(operator, "Operands must be two numbers or two strings.")),
            },
            TokenType::GreaterEqual => match (l, r) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a >= b)),
                _ => self.number_operands_error(operator),
            },
            TokenType::Greater => match (l, r) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a > b)),
                _ => self.number_operands_error(operator),
            },
            TokenType::LessEqual => match (l, r) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a <= b)),
                _ => self.number_operands_error(operator),
            },
            TokenType::Less => match (l, r) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a < b)),
                _ => self.number_operands_error(operator),
            },
            TokenType::BangEqual => Ok(Value::Bool(!l.equals(&r))),
            TokenType::EqualEqual => Ok(Value::Bool(l.equals(&r))),
            _ => unreachable!("non-binary operator reached visit_binary_expr"),
        }
    }

    fn visit_logical_expr(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value, Error> {
        let left = self.evaluate(left)?;

        // short-circuit: `or` returns as soon as it finds a truthy operand,
        // `and` as soon as it finds a falsy one.
        if operator.kind == TokenType::Or {
            if left.is_truthy() {
                return Ok(left);
            }
        } else if !left.is_truthy() {
            return Ok(left);
        }

        self.evaluate(right)
    }

    fn visit_variable_expr(&mut self, name: &Token) -> Result<Value, Error> {
        self.look_up_variable(name)
    }

    fn visit_assign_expr(&mut self, name: &Token, value: &Expr) -> Result<Value, Error> {
        let value = self.evaluate(value)?;

        if let Some(&depth) = self.locals.get(&name.site()) {
            Environment::assign_at(&self.environment, depth, name, value.clone())?;
        } else {
            self.globals.borrow_mut().assign(name, value.clone())?;
        }

        Ok(value)
    }

    fn visit_call_expr(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> Result<Value, Error> {
        let callee = self.evaluate(callee)?;

        let mut argument_values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            argument_values.push(self.evaluate(argument)?);
        }

        match callee {
            Value::Function(function) => {
                if argument_values.len() != function.arity() {
                    return Err(runtime_error(
                        paren,
                        format!(
                            "Expected {} arguments but got {}.",
                            function.arity(),
                            argument_values.len()
                        ),
                    ));
                }
                function.call(self, &argument_values)
            }
            Value::Class(class) => {
                let instance = LoxInstance::new(&class);
                let initializer = class.borrow().find_method("init");
                let expected_arity = initializer.as_ref().map(|f| f.arity()).unwrap_or(0);
                if argument_values.len() != expected_arity {
                    return Err(runtime_error(
                        paren,
                        format!("Expected {} arguments but got {}.", expected_arity, argument_values.len()),
                    ));
                }
                if let Some(initializer) = initializer {
                    initializer.bind(instance.clone()).call(self, &argument_values)?;
                }
                Ok(instance)
            }
            _ => Err(runtime_error(paren, "Can only call functions and classes.")),
        }
    }

    fn visit_lambda_expr(&mut self, _keyword: &Token, params: &[Token], body: &[Stmt]) -> Result<Value, Error> {
        let function = Function::new_user(None, params.to_vec(), body.to_vec(), Rc::clone(&self.environment), false);
        Ok(Value::Function(Rc::new(function)))
    }

    fn visit_get_expr(&mut self, object: &Expr, name: &Token) -> Result<Value, Error> {
        let object = self.evaluate(object)?;
        match object {
            Value::Instance(ref instance) => instance.borrow().get(name, &object),
            _ => Err(runtime_error(name, "Only instances have properties.")),
        }
    }

    fn visit_set_expr(&mut self, object: &Expr, name: &Token, value: &Expr) -> Result<Value, Error> {
        let object = self.evaluate(object)?;
        match object {
            Value::Instance(instance) => {
                let value = self.evaluate(value)?;
                instance.borrow_mut().set(name, value.clone());
                Ok(value)
            }
            _ => Err(runtime_error(name, "Only instances have fields.")),
        }
    }

    fn visit_this_expr(&mut self, keyword: &Token) -> Result<Value, Error> {
        self.look_up_variable(keyword)
    }

    fn visit_super_expr(&mut self, keyword: &Token, method: &Token) -> Result<Value, Error> {
        let depth = *self
            .locals
            .get(&keyword.site())
            .expect("resolver always resolves 'super' to a depth");
        let superclass = Environment::get_at(&self.environment, depth, keyword)?;
        // `this` is always bound exactly one scope closer than `super`
        // (spec §4.3's class-scope layout).
        let this_token = Token::new(TokenType::This, "this", keyword.line, keyword.index);
        let instance = Environment::get_at(&self.environment, depth - 1, &this_token)?;

        let Value::Class(superclass) = superclass else {
            unreachable!("resolver guarantees 'super' binds to a class value");
        };

        match superclass.borrow().find_method(&method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(instance)))),
            None => Err(runtime_error(method, format!("Undefined property '{}'.", method.lexeme))),
        }
    }
}

impl stmt::Visitor<()> for Interpreter {
    fn visit_expression_stmt(&mut self, expression: &Expr) -> Result<(), Error> {
        self.evaluate(expression)?;
        Ok(())
    }

    fn visit_print_stmt(&mut self, expression: &Expr) -> Result<(), Error> {
        let value = self.evaluate(expression)?;
        writeln!(self.stdout, "{}", value.stringify()).map_err(Error::Io)?;
        Ok(())
    }

    fn visit_var_stmt(&mut self, name: &Token, initializer: &Option<Expr>) -> Result<(), Error> {
        let value = match initializer {
            Some(expr) => self.evaluate(expr)?,
            None => Value::Nil,
        };
        self.environment.borrow_mut().define(name.lexeme.clone(), value);
        Ok(())
    }

    fn visit_block_stmt(&mut self, statements: &[Stmt]) -> Result<(), Error> {
        let scope = Rc::new(RefCell::new(Environment::from(&self.environment)));
        self.execute_block(statements, scope)
    }

    fn visit_if_stmt(
        &mut self,
        condition: &Expr,
        then_branch: &Stmt,
        else_branch: &Option<Box<Stmt>>,
    ) -> Result<(), Error> {
        if self.evaluate(condition)?.is_truthy() {
            self.execute(then_branch)
        } else if let Some(else_branch) = else_branch {
            self.execute(else_branch)
        } else {
            Ok(())
        }
    }

    fn visit_while_stmt(&mut self, condition: &Expr, body: &Stmt) -> Result<(), Error> {
        while self.evaluate(condition)?.is_truthy() {
            self.execute(body)?;
        }
        Ok(())
    }

    fn visit_function_stmt(&mut self, name: &Token, params: &[Token], body: &[Stmt]) -> Result<(), Error> {
        let function = Function::new_user(
            Some(name.clone()),
            params.to_vec(),
            body.to_vec(),
            Rc::clone(&self.environment),
            false,
        );
        self.environment
            .borrow_mut()
            .define(name.lexeme.clone(), Value::Function(Rc::new(function)));
        Ok(())
    }

    fn visit_return_stmt(&mut self, _keyword: &Token, value: &Option<Expr>) -> Result<(), Error> {
        let value = match value {
            Some(expr) => self.evaluate(expr)?,
            None => Value::Nil,
        };
        Err(Error::Return { value })
    }

    fn visit_class_stmt(&mut self, name: &Token, superclass: &Option<Expr>, methods: &[Stmt]) -> Result<(), Error> {
        let superclass_value = match superclass {
            Some(expr) => {
                let value = self.evaluate(expr)?;
                match value {
                    Value::Class(class) => Some(class),
                    _ => {
                        let Expr::Variable { name } = expr else {
                            unreachable!("superclass expression is always Expr::Variable");
                        };
                        return Err(runtime_error(name, "Superclass must be a class."));
                    }
                }
            }
            None => None,
        };

        self.environment.borrow_mut().define(name.lexeme.clone(), Value::Nil);

        // When there is a superclass, methods close over a scope that binds
        // `super` to it — one scope further out than the method's own `this`
        // (spec §4.3/§4.4 inheritance).
        let methods_env = if let Some(ref superclass) = superclass_value {
            let scope = Rc::new(RefCell::new(Environment::from(&self.environment)));
            scope.borrow_mut().define("super".to_string(), Value::Class(Rc::clone(superclass)));
            scope
        } else {
            Rc::clone(&self.environment)
        };

        let mut method_map = HashMap::new();
        for method in methods {
            let Stmt::Function { name: method_name, params, body } = method else {
                unreachable!("class body only ever contains Stmt::Function");
            };
            let is_initializer = method_name.lexeme == "init";
            let function = Function::new_user(
                Some(method_name.clone()),
                params.clone(),
                body.clone(),
                Rc::clone(&methods_env),
                is_initializer,
            );
            method_map.insert(method_name.lexeme.clone(), Rc::new(function));
        }

        let class = LoxClass::new(name.lexeme.clone(), superclass_value, method_map);
        self.environment
            .borrow_mut()
            .assign(name, Value::Class(Rc::new(RefCell::new(class))))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Resolver;
    use crate::scanner::Scanner;
    use crate::parser::Parser;

    fn run_captured(source: &str) -> String {
        let buf: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));

        struct SharedWriter(Rc<RefCell<Vec<u8>>>);
        impl Write for SharedWriter {
            fn write(&mut self, data: &[u8]) -> io::Result<usize> {
                self.0.borrow_mut().write(data)
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let tokens = Scanner::new(source).scan_tokens();
        let mut parser = Parser::new(&tokens);
        let statements = parser.parse().expect("parse should succeed");

        let mut interpreter = Interpreter::with_stdout(Box::new(SharedWriter(Rc::clone(&buf))));
        let mut resolver = Resolver::new(&mut interpreter);
        resolver.resolve_stmts(&statements);
        assert!(!resolver.had_error, "resolver should not report errors");

        interpreter.interpret(&statements).expect("interpret should succeed");

        String::from_utf8(buf.borrow().clone()).unwrap()
    }

    #[test]
    fn arithmetic_and_print() {
        assert_eq!(run_captured("print 1 + 2 * 3;"), "7\n");
    }

    #[test]
    fn string_concatenation_with_plus() {
        assert_eq!(run_captured(r#"print "a" + "b";"#), "ab\n");
    }

    #[test]
    fn closures_capture_their_defining_environment() {
        let source = r#"
            fun makeCounter() {
                var i = 0;
                fun count() {
                    i = i + 1;
                    print i;
                }
                return count;
            }
            var counter = makeCounter();
            counter();
            counter();
        "#;
        assert_eq!(run_captured(source), "1\n2\n");
    }

    #[test]
    fn class_instance_fields_and_methods() {
        let source = r#"
            class Greeter {
                init(name) {
                    this.name = name;
                }
                greet() {
                    print "hi " + this.name;
                }
            }
            var g = Greeter("Ada");
            g.greet();
        "#;
        assert_eq!(run_captured(source), "hi Ada\n");
    }

    #[test]
    fn inheritance_dispatches_through_super() {
        let source = r#"
            class A {
                speak() { print "a"; }
            }
            class B < A {
                speak() {
                    super.speak();
                    print "b";
                }
            }
            B().speak();
        "#;
        assert_eq!(run_captured(source), "a\nb\n");
    }
}
