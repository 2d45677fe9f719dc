//! A tree-walking interpreter for Lox: source text goes in through
//! [`Session::run`], through the scanner, parser, resolver and interpreter
//! in turn, and out the other side as whatever `print` statements wrote
//! plus an optional [`Error`].

mod ast;
mod class;
mod environment;
mod error;
mod function;
mod interpreter;
mod parser;
mod resolver;
mod scanner;
mod token;
mod value;

use std::io::{self, Write};

pub use error::Error;
use interpreter::Interpreter;
use parser::Parser;
use resolver::Resolver;
use scanner::Scanner;

/// One REPL-or-script run of the language. Holds the interpreter's global
/// environment and resolver binding map across calls to [`run`](Session::run)
/// so that a sequence of REPL inputs behaves like one continuously growing
/// program rather than independent scripts (spec §5).
pub struct Session {
    interpreter: Interpreter,
}

impl Session {
    pub fn new() -> Self {
        Self { interpreter: Interpreter::new() }
    }

    /// Builds a session whose `print` output is captured into `stdout`
    /// instead of the process's real standard output — used by embedders
    /// and by this crate's own integration tests.
    pub fn with_stdout(stdout: Box<dyn Write>) -> Self {
        Self { interpreter: Interpreter::with_stdout(stdout) }
    }

    /// Scans, parses, resolves and evaluates `source` against this
    /// session's persistent global state.
    pub fn run(&mut self, source: &str) -> Result<(), Error> {
        log::trace!("scanning {} bytes of source", source.len());
        let tokens = Scanner::new(source).scan_tokens();

        log::trace!("parsing {} tokens", tokens.len());
        let mut parser = Parser::new(&tokens);
        let statements = parser.parse()?;

        // We don't run the resolver if there were parse errors: code with a
        // syntax error is never going to run, so there's no value in
        // resolving it. The resolver pokes its resolution data directly
        // into the interpreter as it walks, so the interpreter has
        // everything it needs by the time it runs next.
        log::debug!("resolving {} top-level statements", statements.len());
        let mut resolver = Resolver::new(&mut self.interpreter);
        resolver.resolve_stmts(&statements);

        if resolver.had_error {
            return Err(Error::Parse);
        }

        self.interpreter.interpret(&statements)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

pub fn run_file(path: &str) -> Result<(), Error> {
    let source = std::fs::read_to_string(path)?;
    Session::new().run(&source)
}

pub fn run_prompt() -> Result<(), Error> {
    let mut session = Session::new();
    let stdin = io::stdin();

    print!("> ");
    io::stdout().flush()?;
    for line in stdin.lines() {
        if let Err(e) = session.run(&line?) {
            match e {
                Error::Return { .. } => unreachable!("a top-level return never escapes the interpreter"),
                // Errors are already reported to stderr by the pipeline;
                // the REPL just keeps going.
                _ => {}
            }
        }
        print!("> ");
        io::stdout().flush()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct SharedWriter(Rc<RefCell<Vec<u8>>>);
    impl Write for SharedWriter {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().write(data)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn captured_session() -> (Session, Rc<RefCell<Vec<u8>>>) {
        let buf = Rc::new(RefCell::new(Vec::new()));
        (Session::with_stdout(Box::new(SharedWriter(Rc::clone(&buf)))), buf)
    }

    #[test]
    fn repl_session_persists_globals_across_run_calls() {
        let (mut session, buf) = captured_session();
        session.run("var x = 1;").unwrap();
        session.run("x = x + 1;").unwrap();
        session.run("print x;").unwrap();
        assert_eq!(String::from_utf8(buf.borrow().clone()).unwrap(), "2\n");
    }

    #[test]
    fn repl_session_persists_function_definitions_across_run_calls() {
        let (mut session, buf) = captured_session();
        session.run("fun greet() { print \"hi\"; }").unwrap();
        session.run("greet();").unwrap();
        assert_eq!(String::from_utf8(buf.borrow().clone()).unwrap(), "hi\n");
    }

    #[test]
    fn a_parse_error_is_reported_and_does_not_run_the_program() {
        let (mut session, buf) = captured_session();
        let result = session.run("print ;");
        assert!(matches!(result, Err(Error::Parse)));
        assert!(buf.borrow().is_empty());
    }

    #[test]
    fn a_runtime_error_surfaces_as_error_runtime() {
        let (mut session, _buf) = captured_session();
        let result = session.run("print 1 + \"a\";");
        assert!(matches!(result, Err(Error::Runtime { .. })));
    }
}
