//! Static resolver (spec §4.3): walks the AST once before evaluation to
//! compute, for every variable reference, how many enclosing scopes separate
//! it from its declaration. The result is poked directly into the
//! interpreter's binding map as we go, exactly like the book's resolver does
//! for its `Interpreter.resolve`.

use std::collections::HashMap;
use std::mem;

use crate::ast::{expr, stmt, Expr, LiteralValue, Stmt};
use crate::error::{parser_error, Error};
use crate::interpreter::Interpreter;
use crate::token::Token;

// Much like we track scopes as we walk the tree, we track whether the code
// currently being visited is inside a function declaration, and which kind.
#[derive(Debug, Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
    Lambda,
    Method,
    Initializer,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

pub struct Resolver<'i> {
    interpreter: &'i mut Interpreter,
    // The scope stack is only used for local block scopes. Variables
    // declared at the top level in the global scope are not tracked here
    // since they are more dynamic in Lox — when a name can't be found on
    // this stack, we assume it must be global.
    scopes: Vec<HashMap<String, bool>>,

    current_function: FunctionType,
    current_class: ClassType,

    /// Set when any declaration reports an error, so the caller (the
    /// session driver) knows to abandon evaluation for this run.
    pub had_error: bool,
}

impl<'i> Resolver<'i> {
    pub fn new(interpreter: &'i mut Interpreter) -> Self {
        Resolver {
            interpreter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            had_error: false,
        }
    }

    fn resolve_stmt(&mut self, statement: &Stmt) {
        let _ = statement.accept(self);
    }

    pub fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.resolve_stmt(statement)
        }
    }

    fn resolve_expr(&mut self, expression: &Expr) {
        let _ = expression.accept(self);
    }

    fn report(&mut self, token: &Token, message: &str) {
        self.had_error = true;
        parser_error(token, message);
    }

    // A new lexical scope is created. Lexical scopes nest in both the
    // interpreter and the resolver — the interpreter implements that stack
    // as a linked list of Environments, the resolver as a Vec.
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    // Declaration adds the variable to the innermost scope, marking it "not
    // ready yet" (false) until its initializer has been resolved. This is
    // what lets us catch `var a = a;` inside a block.
    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                self.report(name, &format!("Redefinition of {}.", name.lexeme));
            }
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    // We start at the innermost scope and work outward, looking in each map
    // for a matching name; the depth we hand to the interpreter is the
    // number of scopes between the current one and where the name lives. If
    // we walk through every scope without finding it, we leave it unresolved
    // and let it fall through to globals at runtime.
    fn resolve_local(&mut self, name: &Token) {
        for (i, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                self.interpreter.resolve(name, i);
                return;
            }
        }
    }

    // Opens a scope for the body, binds each parameter into it, then
    // resolves the body right there — unlike the interpreter, which defers
    // touching a function's body until it's actually called, static
    // analysis immediately descends into it.
    fn resolve_function(&mut self, params: &[Token], body: &[Stmt], kind: FunctionType) {
        let enclosing_function = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(body);
        self.end_scope();

        self.current_function = enclosing_function;
    }
}

// Only a few kinds of nodes matter for resolving variables: blocks introduce
// a scope, function declarations introduce a scope and bind their
// parameters, variable declarations add a name to the current scope, and
// variable/assignment expressions need their variables resolved. Everything
// else just recurses into its subtrees.

impl<'i> expr::Visitor<()> for Resolver<'i> {
    fn visit_variable_expr(&mut self, name: &Token) -> Result<(), Error> {
        // If the variable exists in the current scope but is bound to
        // `false`, it has been declared but not yet defined — reading it
        // now would read back into its own initializer.
        if let Some(scope) = self.scopes.last() {
            if scope.get(&name.lexeme).copied() == Some(false) {
                self.report(name, &format!("Cannot bind reference to {} during definition.", name.lexeme));
            }
        }
        self.resolve_local(name);
        Ok(())
    }

    fn visit_assign_expr(&mut self, name: &Token, value: &Expr) -> Result<(), Error> {
        self.resolve_expr(value);
        self.resolve_local(name);
        Ok(())
    }

    fn visit_binary_expr(&mut self, left: &Expr, _operator: &Token, right: &Expr) -> Result<(), Error> {
        self.resolve_expr(left);
        self.resolve_expr(right);
        Ok(())
    }

    // During resolution we only recurse into the expression left of the
    // dot — the property access itself happens dynamically, in the
    // interpreter.
    fn visit_get_expr(&mut self, object: &Expr, _name: &Token) -> Result<(), Error> {
        self.resolve_expr(object);
        Ok(())
    }

    fn visit_set_expr(&mut self, object: &Expr, _name: &Token, value: &Expr) -> Result<(), Error> {
        self.resolve_expr(value);
        self.resolve_expr(object);
        Ok(())
    }

    fn visit_this_expr(&mut self, keyword: &Token) -> Result<(), Error> {
        if self.current_class == ClassType::None {
            self.report(keyword, "Can't use 'this' outside of a class.");
        } else {
            self.resolve_local(keyword);
        }
        Ok(())
    }

    fn visit_super_expr(&mut self, keyword: &Token, _method: &Token) -> Result<(), Error> {
        match self.current_class {
            ClassType::None => self.report(keyword, "Can't use 'super' outside of a class."),
            ClassType::Class => self.report(keyword, "Can't use 'super' in a class with no superclass."),
            ClassType::Subclass => self.resolve_local(keyword),
        }
        Ok(())
    }

    // We walk the argument list and resolve each one; the callee (usually a
    // variable expression) is an expression too, so it gets resolved as
    // well. Lox dispatches properties dynamically, so no work happens here
    // for the callee's shape.
    fn visit_call_expr(&mut self, callee: &Expr, _paren: &Token, arguments: &[Expr]) -> Result<(), Error> {
        self.resolve_expr(callee);
        for argument in arguments {
            self.resolve_expr(argument);
        }
        Ok(())
    }

    fn visit_grouping_expr(&mut self, expression: &Expr) -> Result<(), Error> {
        self.resolve_expr(expression);
        Ok(())
    }

    fn visit_literal_expr(&mut self, _value: &LiteralValue) -> Result<(), Error> {
        Ok(())
    }

    // A static analysis does no control flow or short-circuiting, so
    // logical expressions resolve exactly like any other binary operator.
    fn visit_logical_expr(&mut self, left: &Expr, _operator: &Token, right: &Expr) -> Result<(), Error> {
        self.resolve_expr(left);
        self.resolve_expr(right);
        Ok(())
    }

    fn visit_unary_expr(&mut self, _operator: &Token, right: &Expr) -> Result<(), Error> {
        self.resolve_expr(right);
        Ok(())
    }

    // A lambda opens its own parameter scope exactly like a named function,
    // but — since it has no name — nothing is declared in the enclosing
    // scope for it (pylox's resolver.py, case Lambda).
    fn visit_lambda_expr(&mut self, _keyword: &Token, params: &[Token], body: &[Stmt]) -> Result<(), Error> {
        self.resolve_function(params, body, FunctionType::Lambda);
        Ok(())
    }
}

impl<'i> stmt::Visitor<()> for Resolver<'i> {
    fn visit_block_stmt(&mut self, statements: &[Stmt]) -> Result<(), Error> {
        self.begin_scope();
        self.resolve_stmts(statements);
        self.end_scope();
        Ok(())
    }

    // Whenever a `this` expression is encountered inside a method, it
    // resolves to a "local variable" defined in an implicit scope just
    // outside the method body's own block. A superclass gets its own
    // implicit scope one level further out, binding `super`.
    fn visit_class_stmt(&mut self, name: &Token, superclass: &Option<Expr>, methods: &[Stmt]) -> Result<(), Error> {
        let enclosing_class = mem::replace(
            &mut self.current_class,
            if superclass.is_some() { ClassType::Subclass } else { ClassType::Class },
        );

        self.declare(name);
        self.define(name);

        if let Some(Expr::Variable { name: superclass_name }) = superclass {
            if superclass_name.lexeme == name.lexeme {
                self.report(superclass_name, "A class can't inherit from itself.");
            }
            self.resolve_local(superclass_name);
        }

        if superclass.is_some() {
            self.begin_scope();
            self.scopes.last_mut().expect("scope was just pushed").insert("super".to_owned(), true);
        }

        self.begin_scope();
        self.scopes.last_mut().expect("scope was just pushed").insert("this".to_owned(), true);

        for method in methods {
            if let Stmt::Function { name: method_name, params, body } = method {
                let kind = if method_name.lexeme == "init" { FunctionType::Initializer } else { FunctionType::Method };
                self.resolve_function(params, body, kind);
            } else {
                unreachable!("class body only ever contains Stmt::Function");
            }
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
        Ok(())
    }

    fn visit_expression_stmt(&mut self, expression: &Expr) -> Result<(), Error> {
        self.resolve_expr(expression);
        Ok(())
    }

    fn visit_if_stmt(
        &mut self,
        condition: &Expr,
        then_branch: &Stmt,
        else_branch: &Option<Box<Stmt>>,
    ) -> Result<(), Error> {
        self.resolve_expr(condition);
        self.resolve_stmt(then_branch);
        if let Some(else_stmt) = else_branch {
            self.resolve_stmt(else_stmt);
        }
        Ok(())
    }

    fn visit_print_stmt(&mut self, expression: &Expr) -> Result<(), Error> {
        self.resolve_expr(expression);
        Ok(())
    }

    fn visit_return_stmt(&mut self, keyword: &Token, value: &Option<Expr>) -> Result<(), Error> {
        if self.current_function == FunctionType::None {
            self.report(keyword, "Can't return from top-level code.");
        }

        if let Some(return_value) = value {
            if self.current_function == FunctionType::Initializer {
                self.report(keyword, "Can't return a value from an initializer.");
            }
            self.resolve_expr(return_value);
        }
        Ok(())
    }

    fn visit_while_stmt(&mut self, condition: &Expr, body: &Stmt) -> Result<(), Error> {
        self.resolve_expr(condition);
        self.resolve_stmt(body);
        Ok(())
    }

    // We split binding into two steps — declare then define — to handle
    // cases like:
    //   var a = "outer";
    //   { var a = a; }
    fn visit_var_stmt(&mut self, name: &Token, initializer: &Option<Expr>) -> Result<(), Error> {
        self.declare(name);
        if let Some(init) = initializer {
            self.resolve_expr(init);
        }
        self.define(name);
        Ok(())
    }

    // Unlike variables, a function's name is declared and defined eagerly,
    // before its body is resolved, so it can recursively refer to itself.
    fn visit_function_stmt(&mut self, name: &Token, params: &[Token], body: &[Stmt]) -> Result<(), Error> {
        self.declare(name);
        self.define(name);
        self.resolve_function(params, body, FunctionType::Function);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn resolve(source: &str) -> bool {
        let tokens = Scanner::new(source).scan_tokens();
        let statements = Parser::new(&tokens).parse().expect("parse should succeed");
        let mut interpreter = Interpreter::new();
        let mut resolver = Resolver::new(&mut interpreter);
        resolver.resolve_stmts(&statements);
        resolver.had_error
    }

    #[test]
    fn reading_a_local_in_its_own_initializer_is_an_error() {
        assert!(resolve("{ var a = a; }"));
    }

    #[test]
    fn redeclaring_a_name_in_the_same_scope_is_an_error() {
        assert!(resolve("{ var a = 1; var a = 2; }"));
    }

    #[test]
    fn shadowing_in_a_nested_scope_is_fine() {
        assert!(!resolve("var a = 1; { var a = 2; }"));
    }

    #[test]
    fn this_outside_a_class_is_an_error() {
        assert!(resolve("print this;"));
    }

    #[test]
    fn returning_a_value_from_an_initializer_is_an_error() {
        assert!(resolve("class C { init() { return 1; } }"));
    }

    #[test]
    fn super_without_a_superclass_is_an_error() {
        assert!(resolve("class C { m() { super.m(); } }"));
    }

    #[test]
    fn lambda_parameters_do_not_leak_into_the_enclosing_scope() {
        assert!(resolve("var f = fun (x) { return x; }; print x;"));
    }
}
