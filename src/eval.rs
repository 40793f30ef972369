//! The tree-walking evaluator.
//!
//! Every `{ ... }` block gets its own [`Frame`] with one slot per local the
//! resolver assigned it; `break`/`continue`/`return` are modeled as
//! [`Signal`] values threaded back up through `Result`, not exceptions, so a
//! loop or function body can intercept exactly the signal it owns and let
//! the rest propagate.

use std::cell::RefCell;

use crate::arena::Arena;
use crate::ast::{Block, Expr, OpCode, Stmt, VarAttr};
use crate::builtins;
use crate::error::JBError;
use crate::intern::Interner;
use crate::span::Span;
use crate::value::{BuiltinId, Value};

pub struct Frame<'a> {
    pub parent: Option<&'a Frame<'a>>,
    pub block: &'a Block<'a>,
    pub vars: RefCell<Vec<Option<&'a Value<'a>>>>,
}

pub enum Signal<'a> {
    Break,
    Continue,
    Return(&'a Value<'a>),
}

pub struct Evaluator<'a> {
    pub values: Arena<Value<'a>>,
    pub frames: Arena<Frame<'a>>,
    /// Behind a `RefCell` rather than a plain `&'a Interner`: a REPL keeps an
    /// evaluator alive across many inputs but still needs to intern a new
    /// name on every one of them, so a borrow held for the evaluator's whole
    /// lifetime would permanently block that.
    interner: &'a RefCell<Interner>,
    output: RefCell<String>,
}

impl<'a> Evaluator<'a> {
    pub fn new(interner: &'a RefCell<Interner>) -> Self {
        Evaluator { values: Arena::new(), frames: Arena::new(), interner, output: RefCell::new(String::new()) }
    }

    /// Drains everything written by `print` since the last call.
    pub fn take_output(&self) -> String {
        self.output.replace(String::new())
    }

    pub fn create_frame(&'a self, parent: Option<&'a Frame<'a>>, block: &'a Block<'a>) -> &'a Frame<'a> {
        let size = block.attr.borrow().local_info.len();
        self.frames.alloc(Frame { parent, block, vars: RefCell::new(vec![None; size]) })
    }

    /// Builds the scope holding `print`/`list_size`/`list_append`, interning
    /// their names so a program resolves them as non-local variables the way
    /// any other enclosing-scope name would be, rather than wiring them into
    /// the evaluator as a special case.
    pub fn builtin_scope(interner: &mut Interner) -> Block<'a> {
        let block = Block::new(Vec::new(), Span::default());
        {
            let mut attr = block.attr.borrow_mut();
            for id in BuiltinId::ALL {
                let sym = interner.intern(id.name());
                let index = attr.local_info.len() as i32;
                attr.name_to_local_index.insert(sym, index);
                attr.local_info.push(sym);
            }
        }
        block
    }

    /// Seeds a frame over `scope` (see [`Evaluator::builtin_scope`]) with the
    /// actual builtin values, in the same order they were registered.
    pub fn builtin_frame(&'a self, scope: &'a Block<'a>) -> &'a Frame<'a> {
        let frame = self.create_frame(None, scope);
        {
            let mut vars = frame.vars.borrow_mut();
            for (i, id) in BuiltinId::ALL.iter().enumerate() {
                vars[i] = Some(self.values.alloc(Value::Builtin(*id)));
            }
        }
        frame
    }

    /// Evaluates a whole program's top-level block against a fresh frame.
    /// `globals` is the builtin frame from [`Evaluator::builtin_frame`], or
    /// `None` for a block resolved with no outer scope at all (only used by
    /// tests that don't call any builtin).
    pub fn run(&'a self, program: &'a Block<'a>, globals: Option<&'a Frame<'a>>) -> Result<(), JBError> {
        self.run_with_frame(program, globals).map(|_| ())
    }

    /// Same as [`Evaluator::run`] but hands back the top-level frame, so a
    /// file driver can look up `main` in it afterwards to synthesize the
    /// trailing zero-argument call.
    pub fn run_with_frame(&'a self, program: &'a Block<'a>, globals: Option<&'a Frame<'a>>) -> Result<&'a Frame<'a>, JBError> {
        let frame = self.create_frame(globals, program);
        match self.eval_block(frame, program)? {
            None | Some(Signal::Return(_)) => Ok(frame),
            Some(Signal::Break) | Some(Signal::Continue) => {
                unreachable!("control_flow pass rejects break/continue outside a loop")
            }
        }
    }

    /// Evaluates one statement against an existing frame, for REPL use:
    /// the frame/program block outlive a single input line.
    pub fn eval_raw_stmt(&'a self, frame: &'a Frame<'a>, stmt: &'a Stmt<'a>) -> Result<Option<Signal<'a>>, JBError> {
        self.eval_stmt(frame, stmt)
    }

    pub fn eval_raw_exp(&'a self, frame: &'a Frame<'a>, expr: &'a Expr<'a>) -> Result<&'a Value<'a>, JBError> {
        self.eval_expr(frame, expr)
    }

    /// Extends `frame`'s local slots for a decl list resolved after the frame
    /// already exists (the REPL feeds one top-level statement at a time).
    pub fn eval_raw_decl_list(&'a self, frame: &'a Frame<'a>, decls: &crate::ast::DeclareList<'a>) -> Result<(), JBError> {
        {
            let mut vars = frame.vars.borrow_mut();
            for _ in 0..decls.decls.len() {
                vars.push(None);
            }
        }
        self.eval_decl_list(frame, decls)
    }

    fn eval_block(&'a self, frame: &'a Frame<'a>, block: &'a Block<'a>) -> Result<Option<Signal<'a>>, JBError> {
        for stmt in &block.stmts {
            if let Some(signal) = self.eval_stmt(frame, stmt)? {
                return Ok(Some(signal));
            }
        }
        Ok(None)
    }

    fn eval_stmt(&'a self, frame: &'a Frame<'a>, stmt: &'a Stmt<'a>) -> Result<Option<Signal<'a>>, JBError> {
        match stmt {
            Stmt::Expr { value, .. } => {
                self.eval_expr(frame, value)?;
                Ok(None)
            }
            Stmt::Block(block) => {
                let child = self.create_frame(Some(frame), block);
                self.eval_block(child, block)
            }
            Stmt::Condition { condition, then_block, else_block, .. } => {
                let test = self.eval_expr(frame, condition)?;
                if test.is_truthy() {
                    let then = then_block.as_block();
                    let child = self.create_frame(Some(frame), then);
                    self.eval_block(child, then)
                } else if let Some(eb) = else_block {
                    self.eval_stmt(frame, eb)
                } else {
                    Ok(None)
                }
            }
            Stmt::While { condition, block, .. } => {
                let body = block.as_block();
                loop {
                    let test = self.eval_expr(frame, condition)?;
                    if !test.is_truthy() {
                        break;
                    }
                    let child = self.create_frame(Some(frame), body);
                    match self.eval_block(child, body)? {
                        Some(Signal::Break) => break,
                        Some(Signal::Continue) | None => continue,
                        Some(ret @ Signal::Return(_)) => return Ok(Some(ret)),
                    }
                }
                Ok(None)
            }
            Stmt::DeclareList(decls) => {
                self.eval_decl_list(frame, decls)?;
                Ok(None)
            }
            Stmt::Empty { .. } => Ok(None),
            Stmt::Return { value, .. } => {
                let result = match value {
                    Some(v) => self.eval_expr(frame, v)?,
                    None => self.values.alloc(Value::Null),
                };
                Ok(Some(Signal::Return(result)))
            }
            Stmt::Break { .. } => Ok(Some(Signal::Break)),
            Stmt::Continue { .. } => Ok(Some(Signal::Continue)),
        }
    }

    fn eval_decl_list(&'a self, frame: &'a Frame<'a>, decls: &crate::ast::DeclareList<'a>) -> Result<(), JBError> {
        let start = decls.start_index.get();
        for (i, item) in decls.decls.iter().enumerate() {
            if let Some(init) = item.initial {
                let value = self.eval_expr(frame, init)?;
                frame.vars.borrow_mut()[start as usize + i] = Some(value);
            }
        }
        Ok(())
    }

    fn resolve_var(&self, frame: &'a Frame<'a>, attr: VarAttr) -> &'a RefCell<Vec<Option<&'a Value<'a>>>> {
        if attr.is_local {
            &frame.vars
        } else {
            let nli = frame.block.attr.borrow().nonlocal_indexes[attr.index as usize];
            let mut parent = frame.parent.expect("non-local var requires a parent frame");
            while !std::ptr::eq(parent.block, nli.owner_block) {
                parent = parent.parent.expect("resolver guarantees the owner block is an ancestor");
            }
            &parent.vars
        }
    }

    fn resolve_var_slot(&self, frame: &'a Frame<'a>, attr: VarAttr) -> usize {
        if attr.is_local {
            attr.index as usize
        } else {
            let nli = frame.block.attr.borrow().nonlocal_indexes[attr.index as usize];
            nli.slot as usize
        }
    }

    fn eval_expr(&'a self, frame: &'a Frame<'a>, expr: &'a Expr<'a>) -> Result<&'a Value<'a>, JBError> {
        match expr {
            Expr::Bool { value, .. } => Ok(self.values.alloc(Value::Bool(*value))),
            Expr::Int { value, .. } => Ok(self.values.alloc(Value::Int(*value))),
            Expr::Float { value, .. } => Ok(self.values.alloc(Value::Float(*value))),
            Expr::Str { value, .. } => Ok(self.values.alloc(Value::Str(value.clone()))),
            Expr::Null { .. } => Ok(self.values.alloc(Value::Null)),
            Expr::List { items, .. } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(frame, item)?);
                }
                Ok(self.values.alloc(Value::List(RefCell::new(values))))
            }
            Expr::Func(func) => Ok(self.values.alloc(Value::Func { parent_frame: Some(frame), code: func })),
            Expr::Var { attr, name, span } => {
                let cell = self.resolve_var(frame, attr.get());
                let slot = self.resolve_var_slot(frame, attr.get());
                cell.borrow()[slot].ok_or_else(|| {
                    JBError::at(format!("unbound variable: '{}'", self.interner.borrow().resolve(*name)), *span)
                })
            }
            Expr::Op(op) => self.eval_op(frame, op),
        }
    }

    fn eval_op(&'a self, frame: &'a Frame<'a>, op: &'a crate::ast::Op<'a>) -> Result<&'a Value<'a>, JBError> {
        match op.code {
            OpCode::Pos => {
                let v = self.eval_expr(frame, op.args[0])?;
                builtins::pos(v, op.span)
            }
            OpCode::Neg => {
                let v = self.eval_expr(frame, op.args[0])?;
                builtins::neg(&self.values, v, op.span)
            }
            OpCode::Not => {
                let v = self.eval_expr(frame, op.args[0])?;
                Ok(self.values.alloc(Value::Bool(!v.is_truthy())))
            }
            OpCode::Add => self.binop(frame, op, builtins::add),
            OpCode::Sub => self.binop(frame, op, builtins::sub),
            OpCode::Mul => self.binop(frame, op, builtins::mul),
            OpCode::Div => self.binop(frame, op, builtins::div),
            OpCode::Mod => self.binop(frame, op, builtins::rem),
            OpCode::Less => self.binop(frame, op, builtins::lt),
            OpCode::LessEq => self.binop(frame, op, builtins::le),
            OpCode::Great => self.binop(frame, op, builtins::gt),
            OpCode::GreatEq => self.binop(frame, op, builtins::ge),
            OpCode::Eq => {
                let lhs = self.eval_expr(frame, op.args[0])?;
                let rhs = self.eval_expr(frame, op.args[1])?;
                Ok(builtins::eq(&self.values, lhs, rhs))
            }
            OpCode::NotEq => {
                let lhs = self.eval_expr(frame, op.args[0])?;
                let rhs = self.eval_expr(frame, op.args[1])?;
                Ok(builtins::ne(&self.values, lhs, rhs))
            }
            OpCode::And => {
                let lhs = self.eval_expr(frame, op.args[0])?;
                if !lhs.is_truthy() {
                    Ok(lhs)
                } else {
                    self.eval_expr(frame, op.args[1])
                }
            }
            OpCode::Or => {
                let lhs = self.eval_expr(frame, op.args[0])?;
                if lhs.is_truthy() {
                    Ok(lhs)
                } else {
                    self.eval_expr(frame, op.args[1])
                }
            }
            OpCode::Assign => {
                let value = self.eval_expr(frame, op.args[1])?;
                self.do_assign(frame, op.args[0], value)
            }
            OpCode::AddAssign => self.binop_assign(frame, op, builtins::add),
            OpCode::SubAssign => self.binop_assign(frame, op, builtins::sub),
            OpCode::MulAssign => self.binop_assign(frame, op, builtins::mul),
            OpCode::DivAssign => self.binop_assign(frame, op, builtins::div),
            OpCode::ModAssign => self.binop_assign(frame, op, builtins::rem),
            OpCode::Subscript => {
                let base = self.eval_expr(frame, op.args[0])?;
                let offset = self.eval_expr(frame, op.args[1])?;
                builtins::getitem(base, offset, op.span)
            }
            OpCode::ExprList => {
                let mut last = None;
                for arg in &op.args {
                    last = Some(self.eval_expr(frame, arg)?);
                }
                Ok(last.expect("explist always has at least one argument"))
            }
            OpCode::Call => self.eval_call(frame, op),
        }
    }

    fn binop<F>(&'a self, frame: &'a Frame<'a>, op: &'a crate::ast::Op<'a>, f: F) -> Result<&'a Value<'a>, JBError>
    where
        F: Fn(&'a Arena<Value<'a>>, &'a Value<'a>, &'a Value<'a>, crate::span::Span) -> Result<&'a Value<'a>, JBError>,
    {
        let lhs = self.eval_expr(frame, op.args[0])?;
        let rhs = self.eval_expr(frame, op.args[1])?;
        f(&self.values, lhs, rhs, op.span)
    }

    fn binop_assign<F>(&'a self, frame: &'a Frame<'a>, op: &'a crate::ast::Op<'a>, f: F) -> Result<&'a Value<'a>, JBError>
    where
        F: Fn(&'a Arena<Value<'a>>, &'a Value<'a>, &'a Value<'a>, crate::span::Span) -> Result<&'a Value<'a>, JBError>,
    {
        let lhs = self.eval_expr(frame, op.args[0])?;
        let rhs = self.eval_expr(frame, op.args[1])?;
        let result = f(&self.values, lhs, rhs, op.span)?;
        self.do_assign(frame, op.args[0], result)
    }

    fn do_assign(&'a self, frame: &'a Frame<'a>, lhs: &'a Expr<'a>, value: &'a Value<'a>) -> Result<&'a Value<'a>, JBError> {
        match lhs {
            Expr::Var { attr, .. } => {
                let cell = self.resolve_var(frame, attr.get());
                let slot = self.resolve_var_slot(frame, attr.get());
                cell.borrow_mut()[slot] = Some(value);
                Ok(value)
            }
            Expr::Op(op) if op.code == OpCode::Subscript => {
                let base = self.eval_expr(frame, op.args[0])?;
                let offset = self.eval_expr(frame, op.args[1])?;
                builtins::setitem(base, offset, value, op.span)
            }
            _ => unreachable!("parser only produces Var or Subscript as assignment targets"),
        }
    }

    /// Invokes an already-evaluated callee with no arguments: what a file
    /// driver needs to synthesize the trailing `main()` call, since there's
    /// no call-expression AST node backing that invocation. `main` is
    /// required to resolve to a user-defined function, not a builtin.
    pub fn call_zero_arg(&'a self, callee: &'a Value<'a>, span: Span) -> Result<&'a Value<'a>, JBError> {
        match callee {
            Value::Func { parent_frame, code } => {
                let params = match code.params {
                    Some(Stmt::DeclareList(d)) => Some(d),
                    _ => None,
                };
                let max_args = params.map(|d| d.decls.len()).unwrap_or(0);
                if max_args > 0 && params.unwrap().decls[0].initial.is_none() {
                    return Err(JBError::at("bad call: missing args", span));
                }

                let func_block = code.body.as_block();
                let func_frame = self.create_frame(*parent_frame, func_block);
                for i in 0..max_args {
                    let value = self.eval_expr(func_frame, params.unwrap().decls[i].initial.unwrap())?;
                    func_frame.vars.borrow_mut()[i] = Some(value);
                }

                match self.eval_block(func_frame, func_block)? {
                    Some(Signal::Return(v)) => Ok(v),
                    _ => Ok(self.values.alloc(Value::Null)),
                }
            }
            other => Err(JBError::at(format!("bad call: {} is not callable", other.type_name()), span)),
        }
    }

    fn eval_call(&'a self, frame: &'a Frame<'a>, call: &'a crate::ast::Op<'a>) -> Result<&'a Value<'a>, JBError> {
        let callee = self.eval_expr(frame, call.args[0])?;
        let arg_exprs: &[&Expr] = match call.args.get(1) {
            None => &[],
            Some(Expr::Op(op)) if op.code == OpCode::ExprList => &op.args,
            Some(_) => &call.args[1..2],
        };

        match callee {
            Value::Builtin(id) => self.eval_builtin_call(frame, *id, arg_exprs, call.span),
            Value::Func { parent_frame, code } => {
                let params = match code.params {
                    Some(Stmt::DeclareList(d)) => Some(d),
                    _ => None,
                };
                let max_args = params.map(|d| d.decls.len()).unwrap_or(0);
                if arg_exprs.len() > max_args {
                    return Err(JBError::at(
                        format!("bad call: too many args, expected {}, got {}", max_args, arg_exprs.len()),
                        call.span,
                    ));
                }
                if arg_exprs.len() < max_args {
                    let missing = &params.unwrap().decls[arg_exprs.len()];
                    if missing.initial.is_none() {
                        return Err(JBError::at("bad call: missing args", call.span));
                    }
                }

                let func_block = code.body.as_block();
                let func_frame = self.create_frame(*parent_frame, func_block);
                for i in 0..max_args {
                    let value = if i < arg_exprs.len() {
                        self.eval_expr(frame, arg_exprs[i])?
                    } else {
                        self.eval_expr(func_frame, params.unwrap().decls[i].initial.unwrap())?
                    };
                    func_frame.vars.borrow_mut()[i] = Some(value);
                }

                match self.eval_block(func_frame, func_block)? {
                    Some(Signal::Return(v)) => Ok(v),
                    _ => Ok(self.values.alloc(Value::Null)),
                }
            }
            other => Err(JBError::at(format!("bad call: {} is not callable", other.type_name()), call.span)),
        }
    }

    fn eval_builtin_call(&'a self, frame: &'a Frame<'a>, id: BuiltinId, arg_exprs: &[&'a Expr<'a>], span: crate::span::Span) -> Result<&'a Value<'a>, JBError> {
        let mut args = Vec::with_capacity(arg_exprs.len());
        for expr in arg_exprs {
            args.push(self.eval_expr(frame, expr)?);
        }
        match id {
            BuiltinId::Print => {
                let mut out = self.output.borrow_mut();
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    out.push_str(&print_display(arg));
                }
                out.push('\n');
                Ok(self.values.alloc(Value::Null))
            }
            BuiltinId::ListSize => match args.first() {
                Some(Value::List(items)) => Ok(self.values.alloc(Value::Int(items.borrow().len() as i64))),
                _ => Err(JBError::at("type error: list_size expects a list", span)),
            },
            BuiltinId::ListAppend => match args.as_slice() {
                [Value::List(items), value] => {
                    items.borrow_mut().push(value);
                    Ok(self.values.alloc(Value::Null))
                }
                _ => Err(JBError::at("type error: list_append expects (list, value)", span)),
            },
        }
    }
}

fn print_display(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        other => other.repr(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interner;
    use crate::lexer::Lexer;
    use crate::parser::{ParseResult, Parser};

    fn run_source(src: &str) -> Result<String, String> {
        let mut interner = Interner::new();
        let builtin_scope = Evaluator::builtin_scope(&mut interner);
        let mut lexer = Lexer::new();
        let mut tokens = Vec::new();
        for ch in src.chars().chain(std::iter::once('\n')) {
            lexer.feed(&mut interner, ch).map_err(|e| e.to_string())?;
            while let Some(t) = lexer.pop() {
                tokens.push(t);
            }
        }
        let stmt_arena = Arena::new();
        let expr_arena = Arena::new();
        let mut parser = Parser::new(&stmt_arena, &expr_arena, &mut interner);
        parser.start_program();
        for tok in tokens {
            if !matches!(tok.kind, crate::token::TokenKind::Comment) {
                parser.feed(tok).map_err(|e| e.to_string())?;
            }
        }
        parser.feed(crate::token::Token::new(crate::token::TokenKind::End, Default::default())).map_err(|e| e.to_string())?;
        let program = match parser.pop_result().expect("parses") {
            ParseResult::Program(stmt) => stmt,
            ParseResult::Expr(_) => unreachable!("program mode never yields a bare expression"),
        };
        let block = program.as_block();

        let mut resolver = crate::resolve::Resolver::new_with_parent(&interner, Some(&builtin_scope));
        resolver.resolve_program(block).map_err(|e| e.to_string())?;
        crate::control_flow::ControlFlowChecker::check_program(block).map_err(|e| e.to_string())?;

        let interner = RefCell::new(interner);
        let evaluator = Evaluator::new(&interner);
        let globals = evaluator.builtin_frame(&builtin_scope);
        evaluator.run(block, Some(globals)).map_err(|e| e.to_string())?;
        Ok(evaluator.take_output())
    }

    #[test]
    fn arithmetic_precedence() {
        let out = run_source("print(1 + 2 * 3);").unwrap();
        assert_eq!(out, "7\n");
    }

    #[test]
    fn compound_assignment() {
        let out = run_source("let a = 1; a += 2; print(a);").unwrap();
        assert_eq!(out, "3\n");
    }

    #[test]
    fn closures_capture_mutable_state() {
        let out = run_source(
            "let make_counter = function() { let n = 0; return function() { n += 1; return n; }; }; \
             let counter = make_counter(); print(counter()); print(counter());",
        )
        .unwrap();
        assert_eq!(out, "1\n2\n");
    }

    #[test]
    fn list_mutation_is_visible_through_aliases() {
        let out = run_source("let a = [1, 2]; let b = a; b[0] = 9; print(a[0]);").unwrap();
        assert_eq!(out, "9\n");
    }
}
