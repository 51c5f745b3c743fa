use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use rox::{RunStatus, Session};

/// `print` sink the test can read back after the run.
#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.borrow())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

struct Outcome {
    status: RunStatus,
    output: Vec<String>,
    errors: Vec<String>,
}

fn run(source: &str) -> Outcome {
    let buffer = SharedBuffer::default();
    let mut session = Session::with_output(buffer.clone());

    let status = session.run(source);
    let errors = session
        .take_errors()
        .iter()
        .map(|e| e.to_string())
        .collect();

    Outcome {
        status,
        output: buffer.lines(),
        errors,
    }
}

fn output_of(source: &str) -> Vec<String> {
    let outcome = run(source);
    assert_eq!(outcome.status, RunStatus::Ok, "errors: {:?}", outcome.errors);

    outcome.output
}

// ─────────────────────────────── expressions ──────────────────────────────

#[test]
fn arithmetic_precedence() {
    assert_eq!(output_of("print 1 + 2 * 3; print (1 + 2) * 3;"), vec!["7", "9"]);
}

#[test]
fn value_display_forms() {
    assert_eq!(
        output_of(
            "print nil; print true; print 2.5; print 10 / 4; print \"hi\"; \
             fun f() {} print f; class K {} print K; print K(); print clock;"
        ),
        vec!["nil", "true", "2.5", "2.5", "hi", "<fn f>", "K", "K instance", "<native fn>"]
    );
}

#[test]
fn negative_zero_and_large_numbers_display() {
    assert_eq!(
        output_of("print -0; print 0 * -1; print 1000000 * 1000000 * 1000000 * 1000;"),
        vec!["0", "0", "1e+21"]
    );
}

#[test]
fn truthiness_and_equality() {
    assert_eq!(
        output_of(
            "print !nil; print !0; print !\"\"; print nil == nil; print nil == false; \
             print 1 == 1; print \"a\" == \"a\"; print 1 != \"1\";"
        ),
        vec!["true", "false", "false", "true", "false", "true", "true", "true"]
    );
}

#[test]
fn logical_operators_return_operands() {
    assert_eq!(
        output_of("print nil or \"yes\"; print 0 and \"second\"; print false and undefined;"),
        vec!["yes", "second", "false"]
    );
}

#[test]
fn string_concatenation() {
    assert_eq!(output_of("var a = \"foo\"; print a + \"bar\";"), vec!["foobar"]);
}

// ─────────────────────────────── scoping ──────────────────────────────────

#[test]
fn block_scoping_and_shadowing() {
    assert_eq!(
        output_of("var a = \"outer\"; { var a = \"inner\"; print a; } print a;"),
        vec!["inner", "outer"]
    );
}

#[test]
fn globals_may_be_redeclared() {
    assert_eq!(output_of("var a = 1; var a = a + 1; print a;"), vec!["2"]);
}

#[test]
fn closures_capture_live_state() {
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

    assert_eq!(output_of(source), vec!["1", "2"]);
}

#[test]
fn closures_bind_the_declaration_scope() {
    let source = r#"
        var a = "global";
        {
            fun showA() { print a; }
            showA();
            var a = "block";
            showA();
        }
    "#;

    assert_eq!(output_of(source), vec!["global", "global"]);
}

#[test]
fn self_reference_fails_before_execution() {
    let outcome = run("print \"before\"; { var a = a; }");

    assert_eq!(outcome.status, RunStatus::StaticError);
    assert!(outcome.output.is_empty());
    assert_eq!(
        outcome.errors,
        vec!["[line 1] Error at 'a': Can't read local variable in its own initializer."]
    );
}

// ─────────────────────────────── control flow ─────────────────────────────

#[test]
fn while_and_for_loops() {
    assert_eq!(
        output_of("var i = 0; while (i < 3) { print i; i = i + 1; } for (var j = 0; j < 2; j = j + 1) print j;"),
        vec!["0", "1", "2", "0", "1"]
    );
}

#[test]
fn if_else() {
    assert_eq!(
        output_of("if (1 > 2) print \"no\"; else print \"yes\"; if (nil) print \"skip\";"),
        vec!["yes"]
    );
}

#[test]
fn return_unwinds_loops_and_only_one_frame() {
    let source = r#"
        fun find() {
            for (var i = 0; ; i = i + 1) {
                if (i == 3) return i;
            }
        }
        fun outer() {
            var got = find();
            print "after";
            return got * 2;
        }
        print outer();
    "#;

    assert_eq!(output_of(source), vec!["after", "6"]);
}

#[test]
fn function_without_return_yields_nil() {
    assert_eq!(output_of("fun f() { 1; } print f();"), vec!["nil"]);
}

#[test]
fn recursion() {
    let source = "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(10);";

    assert_eq!(output_of(source), vec!["55"]);
}

// ─────────────────────────────── classes ──────────────────────────────────

#[test]
fn inheritance_and_super_dispatch() {
    let source = r#"
        class A { speak() { print "A"; } }
        class B < A { speak() { super.speak(); print "B"; } }
        class C < A {}
        B().speak();
        C().speak();
    "#;

    assert_eq!(output_of(source), vec!["A", "B", "A"]);
}

#[test]
fn initializer_always_returns_instance() {
    let source = r#"
        class Foo {
            init(x) {
                this.x = x;
                return;
            }
        }
        var foo = Foo(5);
        print foo.x;
        print foo.init(7) == foo;
        print foo.x;
    "#;

    assert_eq!(output_of(source), vec!["5", "true", "7"]);
}

#[test]
fn class_arity_follows_initializer() {
    assert_eq!(
        run("class Foo { init(x) {} } Foo();").errors,
        vec!["Expected 1 arguments but got 0.\n[line 1]"]
    );
    assert_eq!(
        run("class Plain {} Plain(1);").errors,
        vec!["Expected 0 arguments but got 1.\n[line 1]"]
    );

    let source = r#"
        class Base { init(a, b) { this.sum = a + b; } }
        class Derived < Base {}
        print Derived(1, 2).sum;
    "#;

    assert_eq!(output_of(source), vec!["3"]);
    assert_eq!(
        run("class Base { init(a, b) {} } class Derived < Base {} Derived(1);").errors,
        vec!["Expected 2 arguments but got 1.\n[line 1]"]
    );
}

#[test]
fn bound_methods_remember_their_instance() {
    let source = r#"
        class Person {
            init(name) { this.name = name; }
            greet() { print "hi " + this.name; }
        }
        var greet = Person("ada").greet;
        greet();
    "#;

    assert_eq!(output_of(source), vec!["hi ada"]);
}

#[test]
fn fields_shadow_methods() {
    let source = r#"
        class Box { value() { return "method"; } }
        var b = Box();
        print b.value();
        b.value = "field";
        print b.value;
    "#;

    assert_eq!(output_of(source), vec!["method", "field"]);
}

#[test]
fn each_property_access_binds_afresh() {
    let source = "class K { m() {} } var k = K(); print k.m == k.m; print k == k;";

    assert_eq!(output_of(source), vec!["false", "true"]);
}

#[test]
fn superclass_must_be_a_class() {
    let outcome = run("var NotAClass = 1; class Sub < NotAClass {}");

    assert_eq!(outcome.status, RunStatus::RuntimeError);
    assert_eq!(outcome.errors, vec!["Superclass must be a class.\n[line 1]"]);
}

// ─────────────────────────────── runtime errors ───────────────────────────

#[test]
fn type_error_halts_the_run() {
    let outcome = run("print \"start\";\n\"a\" + 1;\nprint \"unreachable\";");

    assert_eq!(outcome.status, RunStatus::RuntimeError);
    assert_eq!(outcome.output, vec!["start"]);
    assert_eq!(
        outcome.errors,
        vec!["Operands must be two numbers or two strings.\n[line 2]"]
    );
}

#[test]
fn arity_is_checked_before_the_body_runs() {
    let outcome = run("fun add(a, b) { print \"body\"; return a + b; } add(1);");

    assert_eq!(outcome.status, RunStatus::RuntimeError);
    assert!(outcome.output.is_empty());
    assert_eq!(outcome.errors, vec!["Expected 2 arguments but got 1.\n[line 1]"]);
}

#[test]
fn undefined_variable_and_property() {
    assert_eq!(run("print missing;").errors, vec!["Undefined variable 'missing'.\n[line 1]"]);
    assert_eq!(
        run("class K {} K().nope;").errors,
        vec!["Undefined property 'nope'.\n[line 1]"]
    );
    assert_eq!(
        run("var x = 1; x.y = 2;").errors,
        vec!["Only instances have fields.\n[line 1]"]
    );
    assert_eq!(
        run("\"str\".len;").errors,
        vec!["Only instances have properties.\n[line 1]"]
    );
    assert_eq!(
        run("\"not callable\"();").errors,
        vec!["Can only call functions and classes.\n[line 1]"]
    );
    assert_eq!(run("-\"x\";").errors, vec!["Operand must be a number.\n[line 1]"]);
}

#[test]
fn runaway_recursion_is_a_runtime_error() {
    let buffer = SharedBuffer::default();
    let mut session = Session::with_output(buffer.clone());

    assert_eq!(session.run("fun f() { f(); } f();"), RunStatus::RuntimeError);
    assert_eq!(
        session.take_errors().iter().map(|e| e.to_string()).collect::<Vec<_>>(),
        vec!["Stack overflow.\n[line 1]"]
    );

    let deep = "fun depth(n) { if (n == 0) return 0; return depth(n - 1) + 1; } print depth(500);";

    assert_eq!(session.run(deep), RunStatus::Ok);
    assert_eq!(buffer.lines(), vec!["500"]);
}

#[test]
fn output_before_a_runtime_error_is_flushed() {
    let buffer = SharedBuffer::default();
    let mut session = Session::with_output(io::BufWriter::new(buffer.clone()));

    assert_eq!(session.run("print \"kept\"; nil();"), RunStatus::RuntimeError);
    assert_eq!(buffer.lines(), vec!["kept"]);
}

#[test]
fn resolve_errors_accumulate_and_block_execution() {
    let outcome = run("print 1;\nreturn 2;\nprint this;");

    assert_eq!(outcome.status, RunStatus::StaticError);
    assert!(outcome.output.is_empty());
    assert_eq!(
        outcome.errors,
        vec![
            "[line 2] Error at 'return': Can't return from top-level code.",
            "[line 3] Error at 'this': Can't use 'this' outside of a class.",
        ]
    );
}

// ─────────────────────────────── sessions ─────────────────────────────────

#[test]
fn session_keeps_globals_between_runs() {
    let buffer = SharedBuffer::default();
    let mut session = Session::with_output(buffer.clone());

    assert_eq!(session.run("var count = 1; fun bump() { count = count + 1; }"), RunStatus::Ok);
    assert_eq!(session.run("print nope;"), RunStatus::RuntimeError);
    assert_eq!(session.run("bump(); print count;"), RunStatus::Ok);
    assert!(session.diagnostics().errors().is_empty());

    assert_eq!(buffer.lines(), vec!["2"]);
}

#[test]
fn failure_inside_nested_call_restores_scope() {
    let buffer = SharedBuffer::default();
    let mut session = Session::with_output(buffer.clone());

    let setup = r#"
        var g = "global";
        fun fail() {
            var g = "local";
            { var inner = 1; nil(); }
        }
    "#;

    assert_eq!(session.run(setup), RunStatus::Ok);
    assert_eq!(session.run("fail();"), RunStatus::RuntimeError);
    assert_eq!(session.run("print g; var h = 2; print h;"), RunStatus::Ok);

    assert_eq!(buffer.lines(), vec!["global", "2"]);
}

#[test]
fn resolved_and_dynamic_lookup_agree() {
    let source = r#"
        var x = "global";
        fun outer() {
            var x = "outer";
            fun middle() {
                fun inner() { print x; }
                inner();
            }
            middle();
        }
        outer();
        { var y = x; print y; }
    "#;

    assert_eq!(output_of(source), vec!["outer", "global"]);
}
