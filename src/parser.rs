use crate::ast::{Expr, LiteralValue, Stmt};
use crate::error::{parser_error, Error};
use crate::token::{Literal, Token, TokenType};

pub struct Parser<'t> {
    tokens: &'t [Token],
    current: usize,
}

macro_rules! matches {
    ( $sel:ident, $( $x:expr ),* ) => {
        {
            if $( $sel.check($x) )||* {
                $sel.advance();
                true
            } else {
                false
            }
        }
    };
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, current: 0 }
    }

    // program        → declaration* EOF ;
    //
    // A parse error abandons the whole parse rather than attempting
    // statement-level recovery (spec §4.2: "report and abandon" is
    // sufficient; no synchronization is required for correctness).
    pub fn parse(&mut self) -> Result<Vec<Stmt>, Error> {
        let mut statements: Vec<Stmt> = Vec::new();
        while !self.is_at_end() {
            statements.push(self.declaration()?);
        }
        Ok(statements)
    }

    // declaration    → classDecl | funDecl | varDecl | statement ;
    fn declaration(&mut self) -> Result<Stmt, Error> {
        if matches!(self, TokenType::Var) {
            self.var_declaration()
        } else if matches!(self, TokenType::Class) {
            self.class_declaration()
        } else if self.check(TokenType::Fun) && self.check_next(TokenType::Identifier) {
            self.advance();
            self.function("function")
        } else {
            self.statement()
        }
    }

    // classDecl      → "class" IDENTIFIER ( "<" IDENTIFIER )? "{" function* "}" ;
    fn class_declaration(&mut self) -> Result<Stmt, Error> {
        let name = self.consume(TokenType::Identifier, "Expect class name.")?;
        let superclass = if matches!(self, TokenType::Less) {
            self.consume(TokenType::Identifier, "Expect superclass name.")?;
            Some(self.previous().clone())
        } else {
            None
        };
        self.consume(TokenType::LeftBrace, "Expect '{' before class body.")?;

        let mut methods: Vec<Stmt> = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenType::RightBrace, "Expect '}' after class body.")?;

        Ok(Stmt::Class {
            name,
            superclass: superclass.map(|name| Expr::Variable { name }),
            methods,
        })
    }

    // Like most dynamically typed languages, fields are not explicitly listed
    // in the class declaration. Instances are loose bags of data and you can
    // freely add fields to them as you see fit using normal imperative code.

    // funDecl        → "fun" function ;
    // function       → IDENTIFIER "(" parameters? ")" block ;
    // parameters     → IDENTIFIER ( "," IDENTIFIER )* ;
    //
    // Reused for methods inside classes (the kind string only feeds error
    // messages).
    fn function(&mut self, kind: &str) -> Result<Stmt, Error> {
        let name = self.consume(TokenType::Identifier, &format!("Expect {kind} name."))?;
        let (params, body) = self.function_tail(kind)?;
        Ok(Stmt::Function { name, params, body })
    }

    // Parameter list + body, shared between named functions and lambdas.
    fn function_tail(&mut self, kind: &str) -> Result<(Vec<Token>, Vec<Stmt>), Error> {
        self.consume(TokenType::LeftParen, &format!("Expect '(' after {kind} name."))?;
        let mut params: Vec<Token> = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if params.len() >= 255 {
                    self.error(self.peek(), "Can't have more than 255 parameters.");
                }
                params.push(self.consume(TokenType::Identifier, "Expect parameter name.")?);
                if !matches!(self, TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;
        self.consume(TokenType::LeftBrace, &format!("Expect '{{' before {kind} body."))?;
        let body = self.block()?;
        Ok((params, body))
    }

    // statement      → exprStmt | printStmt | ifStmt | block | returnStmt | whileStmt | forStmt ;
    fn statement(&mut self) -> Result<Stmt, Error> {
        if matches!(self, TokenType::For) {
            self.for_statement()
        } else if matches!(self, TokenType::If) {
            self.if_statement()
        } else if matches!(self, TokenType::Print) {
            self.print_statement()
        } else if matches!(self, TokenType::Return) {
            self.return_statement()
        } else if matches!(self, TokenType::While) {
            self.while_statement()
        } else if matches!(self, TokenType::LeftBrace) {
            Ok(Stmt::Block { statements: self.block()? })
        } else {
            self.expression_statement()
        }
    }

    // In Lox, the body of a function is a list of statements which don't
    // produce values, so we need dedicated syntax for emitting a result.
    // returnStmt     → "return" expression? ";" ;
    fn return_statement(&mut self) -> Result<Stmt, Error> {
        let keyword = self.previous().clone();
        let value = if !self.check(TokenType::Semicolon) { Some(self.expression()?) } else { None };
        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    // the else is bound to the nearest if that precedes it
    // ifStmt         → "if" "(" expression ")" statement ( "else" statement )? ;
    fn if_statement(&mut self) -> Result<Stmt, Error> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if matches!(self, TokenType::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If { condition, then_branch, else_branch })
    }

    // block          → "{" declaration* "}" ;
    fn block(&mut self) -> Result<Vec<Stmt>, Error> {
        let mut statements: Vec<Stmt> = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }
        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    // whileStmt      → "while" "(" expression ")" statement ;
    fn while_statement(&mut self) -> Result<Stmt, Error> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after condition.")?;
        let body = self.statement()?;
        Ok(Stmt::While { condition, body: Box::new(body) })
    }

    // forStmt        → "for" "(" ( varDecl | exprStmt | ";" ) expression? ";" expression? ")" statement ;
    // Desugared into a while loop; there is no Stmt::For node.
    fn for_statement(&mut self) -> Result<Stmt, Error> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if matches!(self, TokenType::Semicolon) {
            None
        } else if matches!(self, TokenType::Var) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(TokenType::Semicolon) { Some(self.expression()?) } else { None };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if !self.check(TokenType::RightParen) { Some(self.expression()?) } else { None };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(incr) = increment {
            body = Stmt::Block { statements: vec![body, Stmt::Expression { expression: incr }] };
        }

        body = Stmt::While {
            condition: condition.unwrap_or(Expr::Literal { value: LiteralValue::Bool(true) }),
            body: Box::new(body),
        };

        if let Some(init) = initializer {
            body = Stmt::Block { statements: vec![init, body] };
        }

        Ok(body)
    }

    // varDecl        → "var" IDENTIFIER ( "=" expression )? ";" ;
    fn var_declaration(&mut self) -> Result<Stmt, Error> {
        let name = self.consume(TokenType::Identifier, "Expect variable name.")?;
        let initializer = if matches!(self, TokenType::Equal) { Some(self.expression()?) } else { None };
        self.consume(TokenType::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::Var { name, initializer })
    }

    // expression     → assignment ;
    fn expression(&mut self) -> Result<Expr, Error> {
        self.assignment()
    }

    // The trick is that the parser first processes the left side as if it
    // were an expression (r-value), then converts it to an assignment target
    // (l-value) if an `=` sign follows. This works because every valid
    // assignment target also happens to be valid syntax as a normal
    // expression.
    // assignment     → ( call "." )? IDENTIFIER "=" assignment | logic_or ;
    fn assignment(&mut self) -> Result<Expr, Error> {
        let expr = self.logic_or()?;

        if matches!(self, TokenType::Equal) {
            // assignment is right-associative: recurse rather than loop
            let value = Box::new(self.assignment()?);

            if let Expr::Variable { name } = expr {
                return Ok(Expr::Assign { name, value });
            } else if let Expr::Get { object, name } = expr {
                return Ok(Expr::Set { object, name, value });
            }

            let equals = self.previous().clone();
            // Reported, not thrown: the parser isn't in a confused state, it
            // just found an invalid target, so there's nothing to
            // synchronize past.
            self.error(&equals, "Invalid assignment target.");
        }

        Ok(expr)
    }

    // logic_or       → logic_and ( "or" logic_and )* ;
    fn logic_or(&mut self) -> Result<Expr, Error> {
        let mut expr = self.logic_and()?;
        while matches!(self, TokenType::Or) {
            let operator = self.previous().clone();
            let right = self.logic_and()?;
            expr = Expr::Logical { left: Box::new(expr), operator, right: Box::new(right) };
        }
        Ok(expr)
    }

    // logic_and      → equality ( "and" equality )* ;
    fn logic_and(&mut self) -> Result<Expr, Error> {
        let mut expr = self.equality()?;
        while matches!(self, TokenType::And) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical { left: Box::new(expr), operator, right: Box::new(right) };
        }
        Ok(expr)
    }

    // equality       → comparison ( ( "!=" | "==" ) comparison )* ;
    fn equality(&mut self) -> Result<Expr, Error> {
        let mut expr = self.comparison()?;
        while matches!(self, TokenType::BangEqual, TokenType::EqualEqual) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::Binary { left: Box::new(expr), operator, right: Box::new(right) };
        }
        Ok(expr)
    }

    // comparison     → term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
    fn comparison(&mut self) -> Result<Expr, Error> {
        let mut expr = self.term()?;
        while matches!(self, TokenType::GreaterEqual, TokenType::Greater, TokenType::LessEqual, TokenType::Less) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = Expr::Binary { left: Box::new(expr), operator, right: Box::new(right) };
        }
        Ok(expr)
    }

    // term           → factor ( ( "-" | "+" ) factor )* ;
    fn term(&mut self) -> Result<Expr, Error> {
        let mut expr = self.factor()?;
        while matches!(self, TokenType::Minus, TokenType::Plus) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::Binary { left: Box::new(expr), operator, right: Box::new(right) };
        }
        Ok(expr)
    }

    // factor         → unary ( ( "/" | "*" ) unary )* ;
    fn factor(&mut self) -> Result<Expr, Error> {
        let mut expr = self.unary()?;
        while matches!(self, TokenType::Slash, TokenType::Star) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::Binary { left: Box::new(expr), operator, right: Box::new(right) };
        }
        Ok(expr)
    }

    // unary          → ( "!" | "-" ) unary | call ;
    fn unary(&mut self) -> Result<Expr, Error> {
        if matches!(self, TokenType::Bang, TokenType::Minus) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary { operator, right: Box::new(right) });
        }
        self.call()
    }

    // call           → primary ( "(" arguments? ")" | "." IDENTIFIER )* ;
    // Matches a primary expression followed by zero or more calls/gets. With
    // no trailing parens/dots, this is just a bare primary expression.
    fn call(&mut self) -> Result<Expr, Error> {
        let mut expr = self.primary()?;

        loop {
            if matches!(self, TokenType::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if matches!(self, TokenType::Dot) {
                let name = self.consume(TokenType::Identifier, "Expect property name after '.'.")?;
                expr = Expr::Get { object: Box::new(expr), name };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, Error> {
        let mut arguments: Vec<Expr> = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if arguments.len() >= 255 {
                    // Only reported, not thrown: the parser is still in a
                    // perfectly valid state, it just found too many
                    // arguments.
                    self.error(self.peek(), "Can't have more than 255 arguments.");
                }
                arguments.push(self.expression()?);
                if !matches!(self, TokenType::Comma) {
                    break;
                }
            }
        }

        let paren = self.consume(TokenType::RightParen, "Expect ')' after arguments.")?;
        Ok(Expr::Call { callee: Box::new(callee), paren, arguments })
    }

    // primary        → NUMBER | STRING | "true" | "false" | "nil" | "this"
    //                | "(" expression ")" | IDENTIFIER | "super" "." IDENTIFIER
    //                | "fun" function ;
    fn primary(&mut self) -> Result<Expr, Error> {
        if matches!(self, TokenType::False) {
            return Ok(Expr::Literal { value: LiteralValue::Bool(false) });
        }
        if matches!(self, TokenType::True) {
            return Ok(Expr::Literal { value: LiteralValue::Bool(true) });
        }
        if matches!(self, TokenType::Nil) {
            return Ok(Expr::Literal { value: LiteralValue::Nil });
        }
        if self.check(TokenType::Number) {
            let token = self.advance().clone();
            let n = match token.literal {
                Some(Literal::Number(n)) => n,
                _ => unreachable!("scanner always attaches a Literal::Number to Number tokens"),
            };
            return Ok(Expr::Literal { value: LiteralValue::Number(n) });
        }
        if self.check(TokenType::String) {
            let token = self.advance().clone();
            let s = match token.literal {
                Some(Literal::Str(s)) => s,
                _ => unreachable!("scanner always attaches a Literal::Str to String tokens"),
            };
            return Ok(Expr::Literal { value: LiteralValue::String(s) });
        }
        if matches!(self, TokenType::Super) {
            let keyword = self.previous().clone();
            self.consume(TokenType::Dot, "Expect '.' after 'super'.")?;
            let method = self.consume(TokenType::Identifier, "Expect superclass method name.")?;
            return Ok(Expr::Super { keyword, method });
        }
        if matches!(self, TokenType::This) {
            return Ok(Expr::This { keyword: self.previous().clone() });
        }
        if matches!(self, TokenType::Identifier) {
            return Ok(Expr::Variable { name: self.previous().clone() });
        }
        if matches!(self, TokenType::LeftParen) {
            let expr = self.expression()?;
            self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
            return Ok(Expr::Grouping { expression: Box::new(expr) });
        }
        if matches!(self, TokenType::Fun) {
            let keyword = self.previous().clone();
            let (params, body) = self.function_tail("lambda")?;
            return Ok(Expr::Lambda { keyword, params, body });
        }

        Err(self.error(self.peek(), "Expect expression."))
    }

    // printStmt      → "print" expression ";" ;
    fn print_statement(&mut self) -> Result<Stmt, Error> {
        let value = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print { expression: value })
    }

    // exprStmt       → expression ";" ;
    fn expression_statement(&mut self) -> Result<Stmt, Error> {
        let value = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression { expression: value })
    }

    // returns true if the current token is of the given type. Unlike
    // advance(), it never consumes the token, it only looks at it.
    fn check(&self, kind: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }
        self.peek().kind == kind
    }

    // looks one token past the current one without consuming anything;
    // used to disambiguate `fun name(...)` (a declaration) from a bare
    // `fun (...)` lambda expression.
    fn check_next(&self, kind: TokenType) -> bool {
        self.tokens.get(self.current + 1).is_some_and(|t| t.kind == kind)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.current).expect("peek into end of token stream")
    }

    fn previous(&self) -> &Token {
        self.tokens.get(self.current - 1).expect("previous was empty")
    }

    fn consume(&mut self, kind: TokenType, msg: &str) -> Result<Token, Error> {
        if self.check(kind) {
            Ok(self.advance().clone())
        } else {
            Err(self.error(self.peek(), msg))
        }
    }

    fn error(&self, token: &Token, msg: &str) -> Error {
        parser_error(token, msg);
        Error::Parse
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> Result<Vec<Stmt>, Error> {
        let tokens = Scanner::new(source).scan_tokens();
        Parser::new(&tokens).parse()
    }

    #[test]
    fn binary_operators_respect_precedence() {
        let statements = parse("1 + 2 * 3;").unwrap();
        match &statements[0] {
            Stmt::Expression { expression: Expr::Binary { operator, .. } } => {
                assert_eq!(operator.kind, TokenType::Plus);
            }
            other => panic!("unexpected statement: {other:?}"),
        }
    }

    #[test]
    fn lambda_is_parsed_as_a_primary_expression() {
        let statements = parse("var f = fun (a) { return a; };").unwrap();
        match &statements[0] {
            Stmt::Var { initializer: Some(Expr::Lambda { params, .. }), .. } => {
                assert_eq!(params.len(), 1);
            }
            other => panic!("unexpected statement: {other:?}"),
        }
    }

    #[test]
    fn named_function_is_not_mistaken_for_a_lambda() {
        let statements = parse("fun add(a, b) { return a + b; }").unwrap();
        assert!(matches!(statements[0], Stmt::Function { .. }));
    }

    #[test]
    fn class_with_superclass_parses_inheritance_clause() {
        let statements = parse("class B < A {}").unwrap();
        match &statements[0] {
            Stmt::Class { superclass: Some(Expr::Variable { name }), .. } => {
                assert_eq!(name.lexeme, "A");
            }
            other => panic!("unexpected statement: {other:?}"),
        }
    }

    #[test]
    fn invalid_assignment_target_is_reported_not_thrown() {
        // "Invalid assignment target." is reported but parsing continues
        // and still yields a statement rather than aborting the parse.
        assert!(parse("1 = 2;").is_ok());
    }
}
