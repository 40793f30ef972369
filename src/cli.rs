//! Command-line entry point: run a source file, evaluate a `-e` snippet, or
//! launch the interactive REPL.
//!
//! Exit codes follow the pipeline stage that failed: 0 success, 1 decode
//! error, 2 tokenizer error, 3 parser error, 4 compile error (name
//! resolution or the control-flow check), 5 runtime error, 6 other (file
//! I/O, a missing `main`).

use std::cell::RefCell;
use std::fs;
use std::io::{self, IsTerminal, Read};

use clap::Parser as ClapParser;

use crate::arena::Arena;
use crate::ast::{Block, Expr, Stmt};
use crate::control_flow::ControlFlowChecker;
use crate::eval::Evaluator;
use crate::intern::Interner;
use crate::lexer::Lexer;
use crate::parser::{ParseResult, Parser};
use crate::repl;
use crate::resolve::Resolver;
use crate::span::Span;
use crate::style::Style;

#[derive(ClapParser)]
#[command(name = "jbs")]
#[command(about = "A tree-walking interpreter for JiaoBenScript", long_about = None)]
#[command(version)]
struct Cli {
    /// Source file to run, or `-` for stdin. `-` with a TTY stdin starts the
    /// REPL instead of reading a program.
    path: String,

    /// Evaluate a snippet of source directly instead of reading a file.
    #[arg(short = 'e', long = "eval")]
    eval: Option<String>,

    /// Disable ANSI colors in diagnostics.
    #[arg(long)]
    no_color: bool,
}

pub fn run_cli() -> i32 {
    let cli = Cli::parse();
    if cli.no_color {
        Style::set_enabled(false);
    }

    if let Some(src) = cli.eval {
        return run_program(&src);
    }

    match cli.path.as_str() {
        "-" if io::stdin().is_terminal() => {
            run_repl();
            0
        }
        "-" => match read_stdin() {
            Ok(src) => run_program(&src),
            Err(e) => {
                eprintln!("error: {}", e);
                1
            }
        },
        path => match fs::read(path) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(src) => run_program(&src),
                Err(e) => {
                    eprintln!("error: malformed UTF-8: {}", e);
                    1
                }
            },
            Err(e) => {
                eprintln!("error: {}: {}", path, e);
                6
            }
        },
    }
}

fn read_stdin() -> io::Result<String> {
    let mut buf = Vec::new();
    io::stdin().read_to_end(&mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn run_repl() {
    let stmts: &'static Arena<Stmt> = Box::leak(Box::new(Arena::new()));
    let exprs: &'static Arena<Expr> = Box::leak(Box::new(Arena::new()));
    let interner: &'static RefCell<Interner> = Box::leak(Box::new(RefCell::new(Interner::new())));
    let evaluator: &'static Evaluator = Box::leak(Box::new(Evaluator::new(interner)));
    repl::run(stmts, exprs, evaluator, interner);
}

/// Runs a whole program: all top-level statements execute in one root
/// frame, then a zero-argument `main()` call is synthesized and evaluated.
/// `main` must resolve to a user-defined function bound in that frame.
fn run_program(src: &str) -> i32 {
    let mut interner = Interner::new();
    let builtin_scope = Evaluator::builtin_scope(&mut interner);

    let mut lexer = Lexer::new();
    let mut tokens = Vec::new();
    for ch in src.chars().chain(std::iter::once('\n')) {
        if let Err(e) = lexer.feed(&mut interner, ch) {
            eprintln!("{}", e.display_with_source(src));
            return 2;
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
            eprintln!("{}", e.display_with_source(src));
            return 3;
        }
    }
    let program = match parser.pop_result() {
        Ok(ParseResult::Program(stmt)) => stmt,
        Ok(ParseResult::Expr(_)) => unreachable!("program mode never yields a bare expression"),
        Err(e) => {
            eprintln!("{}", e.display_with_source(src));
            return 3;
        }
    };
    let block: &Block = program.as_block();

    let mut resolver = Resolver::new_with_parent(&interner, Some(&builtin_scope));
    if let Err(e) = resolver.resolve_program(block) {
        eprintln!("{}", e.display_with_source(src));
        return 4;
    }
    if let Err(e) = ControlFlowChecker::check_program(block) {
        eprintln!("{}", e.display_with_source(src));
        return 4;
    }

    let interner = RefCell::new(interner);
    let evaluator = Evaluator::new(&interner);
    let globals = evaluator.builtin_frame(&builtin_scope);
    let frame = match evaluator.run_with_frame(block, Some(globals)) {
        Ok(frame) => frame,
        Err(e) => {
            print!("{}", evaluator.take_output());
            eprintln!("{}", e.display_with_source(src));
            return 5;
        }
    };

    let main_sym = interner.borrow().lookup("main");
    let main_value = main_sym
        .and_then(|sym| block.attr.borrow().name_to_local_index.get(&sym).copied())
        .and_then(|slot| frame.vars.borrow()[slot as usize]);
    let main_value = match main_value {
        Some(v) => v,
        None => {
            print!("{}", evaluator.take_output());
            eprintln!("error: no 'main' function defined");
            return 6;
        }
    };

    let result = evaluator.call_zero_arg(main_value, Span::default());
    print!("{}", evaluator.take_output());
    match result {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("{}", e.display_with_source(src));
            5
        }
    }
}
