//! End-to-end tests driving full source strings through the whole pipeline:
//! tokenizer, parser, resolver, control-flow check, evaluator.

use std::cell::RefCell;

use jiaobenscript::{Arena, CompileError, ControlFlowChecker, Evaluator, Interner, Lexer, ParseResult, Parser, Resolver};

enum Stage {
    Token(String),
    Parse(String),
    Compile(CompileError),
    Run(Result<String, String>),
}

/// Runs `src` as a whole program (no trailing bare expression) and returns
/// which stage it reached.
fn pipeline(src: &str) -> Stage {
    let mut interner = Interner::new();
    let builtin_scope = Evaluator::builtin_scope(&mut interner);

    let mut lexer = Lexer::new();
    let mut tokens = Vec::new();
    for ch in src.chars().chain(std::iter::once('\n')) {
        if let Err(e) = lexer.feed(&mut interner, ch) {
            return Stage::Token(e.display_with_source(src));
        }
        while let Some(tok) = lexer.pop() {
            tokens.push(tok);
        }
    }

    let stmt_arena = Arena::new();
    let expr_arena = Arena::new();
    let mut parser = Parser::new(&stmt_arena, &expr_arena, &mut interner);
    parser.start_program();
    for tok in tokens {
        if let Err(e) = parser.feed(tok) {
            return Stage::Parse(e.display_with_source(src));
        }
    }
    let program = match parser.pop_result() {
        Ok(ParseResult::Program(stmt)) => stmt,
        Ok(ParseResult::Expr(_)) => unreachable!("program mode never yields a bare expression"),
        Err(e) => return Stage::Parse(e.display_with_source(src)),
    };
    let block = program.as_block();

    let mut resolver = Resolver::new_with_parent(&interner, Some(&builtin_scope));
    if let Err(e) = resolver.resolve_program(block) {
        return Stage::Compile(e);
    }
    if let Err(e) = ControlFlowChecker::check_program(block) {
        return Stage::Compile(e);
    }

    let interner = RefCell::new(interner);
    let evaluator = Evaluator::new(&interner);
    let globals = evaluator.builtin_frame(&builtin_scope);
    match evaluator.run(block, Some(globals)) {
        Ok(()) => Stage::Run(Ok(evaluator.take_output())),
        Err(e) => Stage::Run(Err(e.display_with_source(src))),
    }
}

fn printed(src: &str) -> String {
    match pipeline(src) {
        Stage::Run(Ok(out)) => out,
        Stage::Run(Err(e)) => panic!("expected success, got a runtime error:\n{}", e),
        Stage::Compile(e) => panic!("expected success, got a compile error: {:?}", e.kind),
        Stage::Parse(e) => panic!("expected success, got a parse error:\n{}", e),
        Stage::Token(e) => panic!("expected success, got a tokenizer error:\n{}", e),
    }
}

fn compile_error(src: &str) -> jiaobenscript::error::CompileErrorKind {
    match pipeline(src) {
        Stage::Compile(e) => e.kind,
        Stage::Run(Ok(out)) => panic!("expected a compile error, ran to completion with output:\n{}", out),
        Stage::Run(Err(e)) => panic!("expected a compile error, got a runtime error:\n{}", e),
        Stage::Parse(e) => panic!("expected a compile error, got a parse error:\n{}", e),
        Stage::Token(e) => panic!("expected a compile error, got a tokenizer error:\n{}", e),
    }
}

fn runtime_error(src: &str) -> String {
    match pipeline(src) {
        Stage::Run(Err(e)) => e,
        Stage::Run(Ok(out)) => panic!("expected a runtime error, ran to completion with output:\n{}", out),
        Stage::Compile(e) => panic!("expected a runtime error, got a compile error: {:?}", e.kind),
        Stage::Parse(e) => panic!("expected a runtime error, got a parse error:\n{}", e),
        Stage::Token(e) => panic!("expected a runtime error, got a tokenizer error:\n{}", e),
    }
}

#[test]
fn arithmetic_precedence_by_print() {
    assert_eq!(printed("print(1 + 2 * 3);"), "7\n");
}

#[test]
fn compound_assignment_by_print() {
    assert_eq!(printed("let a = 1; a += 2; print(a);"), "3\n");
}

#[test]
fn recursive_factorial() {
    let src = "let f = function(n){ if (n==0){return 1;} return n*f(n-1); }; print(f(5));";
    assert_eq!(printed(src), "120\n");
}

#[test]
fn closure_over_mutable_state() {
    let src = "let make = function(){ let x = 0; return function(){ x += 1; return x; }; }; \
               let c = make(); c(); c(); print(c());";
    assert_eq!(printed(src), "3\n");
}

#[test]
fn list_index_assignment() {
    assert_eq!(printed("let L = [1,2,3]; L[1] = 9; print(L);"), "[1, 9, 3]\n");
}

#[test]
fn string_and_list_concatenation_and_repetition() {
    let src = r#"print("ab" + "cd"); print([1]+[2,3]); print([0]*3);"#;
    assert_eq!(printed(src), "abcd\n[1, 2, 3]\n[0, 0, 0]\n");
}

#[test]
fn list_mutation_is_visible_through_aliases() {
    assert_eq!(printed("let a = [1, 2]; let b = a; b[0] = 9; print(a[0]);"), "9\n");
}

#[test]
fn short_circuit_and_does_not_evaluate_rhs() {
    let src = "let calls = [0]; let side = function(){ calls[0] = calls[0] + 1; return true; }; \
               let r = false && side(); print(calls[0]);";
    assert_eq!(printed(src), "0\n");
}

#[test]
fn short_circuit_or_does_not_evaluate_rhs() {
    let src = "let calls = [0]; let side = function(){ calls[0] = calls[0] + 1; return true; }; \
               let r = true || side(); print(calls[0]);";
    assert_eq!(printed(src), "0\n");
}

#[test]
fn numeric_promotion_to_float() {
    assert_eq!(printed("print(1 + 2.0);"), "3\n");
}

#[test]
fn integer_division_truncates_toward_zero() {
    assert_eq!(printed("print(-7 / 2); print(-7 % 2);"), "-3\n-1\n");
}

#[test]
fn default_argument_sees_earlier_parameter() {
    let src = "let f = function(a, b = a + 1){ return b; }; print(f(5));";
    assert_eq!(printed(src), "6\n");
}

#[test]
fn top_level_break_is_bad_break() {
    assert!(matches!(
        compile_error("break;"),
        jiaobenscript::error::CompileErrorKind::BadBreak
    ));
}

#[test]
fn forward_reference_is_no_such_name() {
    match compile_error("let a = b; let b = 1;") {
        jiaobenscript::error::CompileErrorKind::NoSuchName { name } => assert_eq!(name, "b"),
        other => panic!("expected NoSuchName, got {:?}", other),
    }
}

#[test]
fn duplicate_local_declaration_is_rejected() {
    assert!(matches!(
        compile_error("let a = 1; let a = 2;"),
        jiaobenscript::error::CompileErrorKind::DuplicatedLocalName { .. }
    ));
}

#[test]
fn division_by_zero_is_a_runtime_error() {
    let err = runtime_error("print(1 / 0);");
    assert!(err.contains("zero") || err.contains("division"), "unexpected message: {}", err);
}

#[test]
fn out_of_range_index_is_a_runtime_error() {
    let err = runtime_error("print([1,2][5]);");
    assert!(err.contains("index") || err.contains("range"), "unexpected message: {}", err);
}

#[test]
fn too_many_arguments_is_a_runtime_error() {
    let err = runtime_error("let f = function(){}; f(1);");
    assert!(err.contains("args") || err.contains("argument"), "unexpected message: {}", err);
}
