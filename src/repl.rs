//! Interactive read-eval-print loop.
//!
//! Feeds each input line to the tokenizer one character at a time and
//! forwards ready tokens to the parser. Once `tokenizer.is_ready() &&
//! parser.can_end()`, the buffered result is popped: a `Program`'s
//! statements run one at a time against the persistent root frame so a
//! later line can still see names an earlier one declared; a bare trailing
//! expression is evaluated and its `repr` printed. An error resets the
//! tokenizer and parser but keeps the evaluator, so previously bound
//! top-level names survive it.

use std::cell::RefCell;
use std::io::{self, Write};

use crate::arena::Arena;
use crate::ast::{Expr, Stmt};
use crate::control_flow::ControlFlowChecker;
use crate::eval::{Evaluator, Frame};
use crate::intern::Interner;
use crate::lexer::Lexer;
use crate::parser::{ParseResult, Parser};
use crate::resolve::Resolver;

/// Runs the loop against stdin/stdout until EOF. `interner`, `evaluator` and
/// the arenas backing it are expected to live for the whole process: a REPL
/// never reclaims anything it has bound, by design (see `Evaluator::take_output`
/// and the arena module for why that's an acceptable floor here).
pub fn run<'a>(
    stmts: &'a Arena<Stmt<'a>>,
    exprs: &'a Arena<Expr<'a>>,
    evaluator: &'a Evaluator<'a>,
    interner: &'a RefCell<Interner>,
) {
    println!("JiaoBenScript");

    let builtin_scope: &'a _ = leak(Evaluator::builtin_scope(&mut *interner.borrow_mut()));
    let root_block: &'a _ = leak(crate::ast::Block::new(Vec::new(), crate::span::Span::default()));
    root_block.attr.borrow_mut().parent = Some(builtin_scope);
    let root_frame = evaluator.builtin_frame(builtin_scope);
    let root_frame = evaluator.create_frame(Some(root_frame), root_block);

    let mut lexer = Lexer::new();
    let mut parser = Parser::new(stmts, exprs, &mut *interner.borrow_mut());
    let mut source = String::new();
    let mut count: u32 = 1;

    loop {
        let ready = lexer.is_ready() && parser.is_empty();
        let prompt = if ready { format!("In [{}]: ", count) } else { String::new() };
        let line = match read_line(&prompt) {
            Some(l) => l,
            None => break,
        };

        if ready && line.is_empty() {
            count -= 1;
            continue;
        }

        if parser.is_empty() {
            parser.start_repl();
            source.clear();
        }
        source.push_str(&line);
        source.push('\n');

        if let Err(message) = feed_and_run(
            &mut lexer,
            &mut parser,
            interner,
            evaluator,
            root_block,
            builtin_scope,
            root_frame,
            &line,
            &source,
            &mut count,
        ) {
            eprintln!("{}", message);
            lexer = Lexer::new();
            parser.start_repl();
            source.clear();
        }
    }

    println!();
}

#[allow(clippy::too_many_arguments)]
fn feed_and_run<'a>(
    lexer: &mut Lexer,
    parser: &mut Parser<'a>,
    interner: &'a RefCell<Interner>,
    evaluator: &'a Evaluator<'a>,
    root_block: &'a crate::ast::Block<'a>,
    builtin_scope: &'a crate::ast::Block<'a>,
    root_frame: &'a Frame<'a>,
    line: &str,
    source: &str,
    count: &mut u32,
) -> Result<(), String> {
    for ch in line.chars().chain(std::iter::once('\n')) {
        lexer.feed(&mut interner.borrow_mut(), ch).map_err(|e| e.display_with_source(source))?;
        while let Some(tok) = lexer.pop() {
            parser.feed(tok).map_err(|e| e.display_with_source(source))?;
        }
    }

    if !lexer.is_ready() || !parser.can_end() {
        return Ok(());
    }

    match parser.pop_result().map_err(|e| e.display_with_source(source))? {
        ParseResult::Program(stmt) => {
            let block = stmt.as_block();
            ControlFlowChecker::check_program(block).map_err(|e| e.display_with_source(source))?;

            let interner_ref = interner.borrow();
            let mut resolver = Resolver::new_with_parent(&interner_ref, Some(builtin_scope));
            for &top_stmt in &block.stmts {
                resolver.resolve_into(root_block, top_stmt).map_err(|e| e.display_with_source(source))?;
            }

            for &top_stmt in &block.stmts {
                match top_stmt {
                    Stmt::DeclareList(decls) => {
                        evaluator
                            .eval_raw_decl_list(root_frame, decls)
                            .map_err(|e| e.display_with_source(source))?;
                    }
                    _ => {
                        evaluator
                            .eval_raw_stmt(root_frame, top_stmt)
                            .map_err(|e| e.display_with_source(source))?;
                    }
                }
            }
        }
        ParseResult::Expr(expr) => {
            ControlFlowChecker::check_top_expr(expr).map_err(|e| e.display_with_source(source))?;

            let interner_ref = interner.borrow();
            let mut resolver = Resolver::new_with_parent(&interner_ref, Some(builtin_scope));
            resolver.resolve_expr_into(root_block, expr).map_err(|e| e.display_with_source(source))?;

            let value = evaluator.eval_raw_exp(root_frame, expr).map_err(|e| e.display_with_source(source))?;
            println!("Out[{}]: {}", *count, value.repr());
        }
    }

    *count += 1;
    Ok(())
}

fn read_line(prompt: &str) -> Option<String> {
    print!("{}", prompt);
    io::stdout().flush().ok()?;
    let mut line = String::new();
    let read = io::stdin().read_line(&mut line).ok()?;
    if read == 0 {
        return None;
    }
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Some(line)
}

/// The builtin scope and the persistent root block both need to live as
/// long as the evaluator's arenas do, but neither one is itself arena data
/// (`Evaluator::builtin_scope` returns a bare value): leaking a `Box` is the
/// same "keep it for the process's lifetime" floor the evaluator's own
/// arenas already rely on.
fn leak<'a, T>(value: T) -> &'a T {
    Box::leak(Box::new(value))
}
