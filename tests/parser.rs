use rox::ast_printer::AstPrinter;
use rox::error::Diagnostics;
use rox::parser::Parser;
use rox::scanner::scan;
use rox::stmt::Stmt;
use rox::token::Token;

fn parse(source: &str) -> (Vec<Stmt>, Vec<String>) {
    let mut diagnostics = Diagnostics::new();
    let tokens = scan(source, &mut diagnostics);
    let statements = Parser::new(tokens).parse(&mut diagnostics);
    let errors = diagnostics.errors().iter().map(|e| e.to_string()).collect();

    (statements, errors)
}

fn printed(source: &str) -> Vec<String> {
    let (statements, errors) = parse(source);
    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);

    statements.iter().map(|s| AstPrinter.print_stmt(s)).collect()
}

#[test]
fn two_missing_semicolons_give_two_errors() {
    let (statements, errors) = parse("print 1\nvar x = 2;\nprint 3\nvar y = 4;\nprint 5;");

    assert_eq!(
        errors,
        vec![
            "[line 2] Error at 'var': Expect ';' after value.",
            "[line 4] Error at 'var': Expect ';' after value.",
        ]
    );
    // Recovery skips the rest of each broken statement, so only the last survives.
    assert_eq!(statements.len(), 1);
}

#[test]
fn error_inside_expression_only_drops_that_statement() {
    let (statements, errors) = parse("print (1 + ;\nprint 2;");

    assert_eq!(errors, vec!["[line 1] Error at ';': Expect expression."]);
    assert_eq!(printed("print 2;"), vec!["(print 2.0)"]);
    assert_eq!(statements.len(), 1);
}

#[test]
fn error_at_end_of_input() {
    let (_, errors) = parse("print 1");

    assert_eq!(errors, vec!["[line 1] Error at end: Expect ';' after value."]);
}

#[test]
fn operator_precedence_and_associativity() {
    assert_eq!(
        printed("1 - 2 - 3; !a == b < c; x = y = z;"),
        vec![
            "(; (- (- 1.0 2.0) 3.0))",
            "(; (== (! a) (< b c)))",
            "(; (= x (= y z)))",
        ]
    );
}

#[test]
fn logical_binds_looser_than_equality() {
    assert_eq!(
        printed("print a or b and c == d;"),
        vec!["(print (or a (and b (== c d))))"]
    );
}

#[test]
fn classes_with_superclass_and_methods() {
    assert_eq!(
        printed("class B < A { init(x) { this.x = x; } speak() { super.speak(); } }"),
        vec!["(class B < A (fun init(x) (; (= (. this x) x))) (fun speak() (; (call (super speak)))))"]
    );
}

#[test]
fn for_loop_is_desugared() {
    assert_eq!(
        printed("for (var i = 0; i < 2; i = i + 1) print i;"),
        vec!["(block (var i = 0.0) (while (< i 2.0) (block (print i) (; (= i (+ i 1.0))))))"]
    );
}

#[test]
fn too_many_parameters_is_reported_once() {
    let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
    let source = format!("fun f({}) {{}}", params.join(", "));
    let (statements, errors) = parse(&source);

    assert_eq!(errors.len(), 1);
    assert!(errors[0].ends_with("Can't have more than 255 parameters."));
    assert_eq!(statements.len(), 1);
}

#[test]
fn missing_class_body_recovers_at_next_declaration() {
    let (statements, errors) = parse("class A print 1; var b = 2;");

    assert_eq!(errors, vec!["[line 1] Error at 'print': Expect '{' before class body."]);
    assert_eq!(printed("var b = 2;").len(), statements.len());
}

#[test]
fn bare_expression_parses_without_semicolon() {
    let mut diagnostics = Diagnostics::new();
    let tokens: Vec<Token> = scan("1 + 2 * 3", &mut diagnostics);

    Parser::new(tokens.clone()).parse(&mut diagnostics);
    assert!(diagnostics.had_error());

    let mut expression_diagnostics = Diagnostics::new();
    let expr = Parser::new(tokens)
        .parse_expression(&mut expression_diagnostics)
        .expect("bare expression should parse");

    assert!(!expression_diagnostics.had_error());
    assert_eq!(AstPrinter.print(&expr), "(+ 1.0 (* 2.0 3.0))");
}

#[test]
fn trailing_tokens_after_expression_are_an_error() {
    let mut diagnostics = Diagnostics::new();
    let tokens: Vec<Token> = scan("1 2", &mut diagnostics);

    assert!(Parser::new(tokens).parse_expression(&mut diagnostics).is_none());
    assert_eq!(
        diagnostics.errors().iter().map(|e| e.to_string()).collect::<Vec<_>>(),
        vec!["[line 1] Error at '2': Expect end of expression."]
    );
}
