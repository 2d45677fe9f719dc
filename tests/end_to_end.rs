//! End-to-end scenarios straight out of the language spec's testable
//! properties: whole programs run through [`lox::Session`] with `print`
//! output captured, rather than unit-testing any one pipeline stage.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use lox::{Error, Session};

struct SharedWriter(Rc<RefCell<Vec<u8>>>);

impl Write for SharedWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(data)
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn run(source: &str) -> (Result<(), Error>, String) {
    let buf = Rc::new(RefCell::new(Vec::new()));
    let mut session = Session::with_stdout(Box::new(SharedWriter(Rc::clone(&buf))));
    let result = session.run(source);
    let output = String::from_utf8(buf.borrow().clone()).unwrap();
    (result, output)
}

fn lines(source: &str) -> Vec<String> {
    let (result, output) = run(source);
    result.expect("program should run without error");
    output.lines().map(str::to_string).collect()
}

#[test]
fn nested_blocks_shadow_and_restore_outer_bindings() {
    let source = r#"
        var x = 1;
        {
            var x = 5;
            print x;
            {
                var x = x + 10;
                print x;
            }
            print x;
        }
        print x;
    "#;
    assert_eq!(lines(source), vec!["5", "15", "5", "1"]);
}

#[test]
fn while_loop_counts_up_to_ten() {
    let source = "var x = 0; while (x < 10) { print x = x + 1; }";
    let expected: Vec<String> = (1..=10).map(|n| n.to_string()).collect();
    assert_eq!(lines(source), expected);
}

#[test]
fn recursive_function_sums_to_n() {
    let source = r#"
        fun sum_to(i) {
            if (i == 0) return 0;
            return i + sum_to(i - 1);
        }
        print sum_to(5);
    "#;
    assert_eq!(lines(source), vec!["15"]);
}

#[test]
fn each_closure_captures_its_own_counter_instance() {
    let source = r#"
        fun get_counter() {
            var c = 0;
            fun k() {
                c = c + 1;
                print c;
            }
            return k;
        }
        var a = get_counter();
        a();
        a();
        get_counter()();
    "#;
    assert_eq!(lines(source), vec!["1", "2", "1"]);
}

#[test]
fn reading_a_shadowed_local_in_its_own_initializer_is_a_resolve_error() {
    let (result, output) = run("var y = 10; { var y = y + 1; }");
    assert!(matches!(result, Err(Error::Parse)));
    assert!(output.is_empty());
}

#[test]
fn subclass_inherits_a_method_it_does_not_override() {
    let source = r#"
        class A { greet() { print "hi"; } }
        class B < A {}
        B().greet();
    "#;
    assert_eq!(lines(source), vec!["hi"]);
}

#[test]
fn logical_or_short_circuits_and_returns_the_deciding_operand() {
    // `or` never evaluates its right operand once the left is truthy; if it
    // did, assigning into `x` would change the would-be output.
    assert_eq!(lines(r#"var x; print "Hello" or (x = 2);"#), vec!["Hello"]);
}

#[test]
fn logical_and_short_circuits_on_a_falsy_left_operand_without_evaluating_the_right() {
    // The right-hand operand reads an undefined variable; if `and` ever
    // evaluated it despite the falsy left side, this would be a runtime
    // error instead of printing `nil`.
    assert_eq!(lines("print nil and undefined_name;"), vec!["nil"]);
}

#[test]
fn print_parenthesized_and_bare_expressions_produce_identical_output() {
    let (_, a) = run("print (1 + 2);");
    let (_, b) = run("print 1 + 2;");
    assert_eq!(a, b);
}

#[test]
fn an_undefined_global_reference_aborts_the_run_with_a_runtime_error() {
    let (result, output) = run("for (;;) { print 0; print y; }");
    assert!(matches!(result, Err(Error::Runtime { .. })));
    assert_eq!(output, "0\n");
}

#[test]
fn a_runtime_error_does_not_poison_the_global_environment_for_later_runs() {
    let buf = Rc::new(RefCell::new(Vec::new()));
    let mut session = Session::with_stdout(Box::new(SharedWriter(Rc::clone(&buf))));

    session.run("var x = 1;").unwrap();
    let err = session.run("print x + nil_ref;");
    assert!(matches!(err, Err(Error::Runtime { .. })));

    session.run("print x;").unwrap();
    assert_eq!(String::from_utf8(buf.borrow().clone()).unwrap(), "1\n");
}

#[test]
fn closures_share_a_captured_variable_across_two_distinct_closures() {
    let source = r#"
        var setter;
        var getter;
        {
            var shared = 0;
            fun set(v) { shared = v; }
            fun get() { print shared; }
            setter = set;
            getter = get;
        }
        setter(42);
        getter();
    "#;
    assert_eq!(lines(source), vec!["42"]);
}

#[test]
fn mutual_method_dispatch_binds_this_and_super_through_one_inheritance_level() {
    let source = r#"
        class Greeter {
            init(name) { this.name = name; }
            greet() { print "hello, " + this.name; }
        }
        class LoudGreeter < Greeter {
            greet() {
                super.greet();
                print "HELLO, " + this.name;
            }
        }
        LoudGreeter("Ada").greet();
    "#;
    assert_eq!(lines(source), vec!["hello, Ada", "HELLO, Ada"]);
}

#[test]
fn calling_a_class_with_the_wrong_initializer_arity_is_a_runtime_error() {
    let (result, _) = run("class C { init(a, b) {} } C(1);");
    assert!(matches!(result, Err(Error::Runtime { .. })));
}

#[test]
fn lambda_expressions_are_callable_without_a_name() {
    assert_eq!(lines("print (fun (a, b) { return a + b; })(3, 4);"), vec!["7"]);
}
