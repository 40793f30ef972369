//! Name resolution: assigns every [`crate::ast::Expr::Var`] a local slot
//! index or a non-local `(owner_block, slot)` pair.
//!
//! Each block is visited exactly once, in source order, interleaving
//! declaration and use: a `DeclareList` item's name is added to the current
//! block's local table *before* its own initializer is resolved. This is
//! what makes `let a = b; let b = 1;` a `NoSuchName` on `b` (not yet
//! declared) while `let f = function() { f(); };` succeeds (`f` is declared
//! before the closure body that refers to it is resolved).
//!
//! A `DeclareList` (or a function's parameter list) commits to its block
//! atomically: if any item past the first fails, the names already added by
//! that same call are rolled back before the error returns. The REPL keeps
//! one root block/frame alive across lines, so a half-committed local table
//! left behind by a failed `let` would desync the block's slot count from
//! the frame's variable vector on the very next successful line.

use crate::ast::{Block, DeclareItem, Expr, NonlocalRef, OpCode, Stmt, VarAttr};
use crate::error::{CompileError, CompileErrorKind};
use crate::intern::{Interner, Symbol};

pub struct Resolver<'a, 'i> {
    interner: &'i Interner,
    cur_block: Option<&'a Block<'a>>,
}

impl<'a, 'i> Resolver<'a, 'i> {
    pub fn new(interner: &'i Interner) -> Self {
        Resolver { interner, cur_block: None }
    }

    /// Resolves a program against an outer scope (the builtin bindings),
    /// rather than the top level having no ancestors at all.
    pub fn new_with_parent(interner: &'i Interner, parent: Option<&'a Block<'a>>) -> Self {
        Resolver { interner, cur_block: parent }
    }

    pub fn resolve_program(&mut self, block: &'a Block<'a>) -> Result<(), CompileError> {
        self.visit_block(block)
    }

    /// Resolves one more top-level statement against a scope that already
    /// has names in it, growing its local table instead of starting fresh:
    /// what a REPL needs since each input line is parsed as its own tree but
    /// they all share one running top-level scope.
    pub fn resolve_into(&mut self, block: &'a Block<'a>, stmt: &'a Stmt<'a>) -> Result<(), CompileError> {
        let saved = self.enter(block);
        let result = self.visit_stmt(stmt);
        self.leave(saved);
        result
    }

    /// Same as [`Resolver::resolve_into`] but for a bare expression (a REPL
    /// input with no trailing `;`).
    pub fn resolve_expr_into(&mut self, block: &'a Block<'a>, expr: &'a Expr<'a>) -> Result<(), CompileError> {
        let saved = self.enter(block);
        let result = self.visit_expr(expr);
        self.leave(saved);
        result
    }

    fn name_of(&self, sym: Symbol) -> String {
        self.interner.resolve(sym).to_string()
    }

    fn add_name_to_block(&self, block: &'a Block<'a>, name: Symbol, span: crate::span::Span) -> Result<(), CompileError> {
        let mut attr = block.attr.borrow_mut();
        if attr.name_to_local_index.contains_key(&name) {
            return Err(CompileError {
                kind: CompileErrorKind::DuplicatedLocalName { name: self.name_of(name) },
                span,
            });
        }
        let index = attr.local_info.len() as i32;
        attr.name_to_local_index.insert(name, index);
        attr.local_info.push(name);
        Ok(())
    }

    fn add_declarations_to_block(&self, block: &'a Block<'a>, decls: &crate::ast::DeclareList<'a>) -> Result<(), CompileError> {
        let start = block.attr.borrow().local_info.len() as i32;
        decls.start_index.set(start);
        for item in &decls.decls {
            if let Err(e) = self.add_name_to_block(block, item.name, decls.span) {
                self.rollback_locals_to(block, start);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Undoes every `add_name_to_block` call made since `start` on this
    /// block, restoring `local_info`/`name_to_local_index` to exactly the
    /// state they were in before the failed declare list started. A single
    /// call to [`Resolver::visit_declare_list`] or
    /// [`Resolver::add_declarations_to_block`] must commit all of its names
    /// or none of them — a caller that sees `Err` should be able to retry
    /// the same block without the rejected names lingering as phantom slots.
    fn rollback_locals_to(&self, block: &'a Block<'a>, start: i32) {
        let mut attr = block.attr.borrow_mut();
        let start = start as usize;
        let names: Vec<Symbol> = attr.local_info[start..].to_vec();
        for name in names {
            attr.name_to_local_index.remove(&name);
        }
        attr.local_info.truncate(start);
    }

    fn resolve_from_block(&self, start: Option<&'a Block<'a>>, name: Symbol, span: crate::span::Span) -> Result<NonlocalRef<'a>, CompileError> {
        let mut block = start;
        while let Some(b) = block {
            let attr = b.attr.borrow();
            if let Some(&slot) = attr.name_to_local_index.get(&name) {
                return Ok(NonlocalRef { owner_block: b, slot });
            }
            block = attr.parent;
        }
        Err(CompileError {
            kind: CompileErrorKind::NoSuchName { name: self.name_of(name) },
            span,
        })
    }

    fn add_nonlocal_to_block(&self, block: &'a Block<'a>, name: Symbol, span: crate::span::Span) -> Result<i32, CompileError> {
        if let Some(&index) = block.attr.borrow().name_to_nonlocal_index.get(&name) {
            return Ok(index);
        }
        let start = block.attr.borrow().parent;
        let resolved = self.resolve_from_block(start, name, span)?;
        let mut attr = block.attr.borrow_mut();
        let index = attr.nonlocal_indexes.len() as i32;
        attr.name_to_nonlocal_index.insert(name, index);
        attr.nonlocal_indexes.push(resolved);
        Ok(index)
    }

    fn enter(&mut self, block: &'a Block<'a>) -> Option<&'a Block<'a>> {
        block.attr.borrow_mut().parent = self.cur_block;
        std::mem::replace(&mut self.cur_block, Some(block))
    }

    fn leave(&mut self, saved: Option<&'a Block<'a>>) {
        self.cur_block = saved;
    }

    fn visit_block(&mut self, block: &'a Block<'a>) -> Result<(), CompileError> {
        let saved = self.enter(block);
        for stmt in &block.stmts {
            self.visit_stmt(stmt)?;
        }
        self.leave(saved);
        Ok(())
    }

    fn visit_stmt(&mut self, stmt: &'a Stmt<'a>) -> Result<(), CompileError> {
        match stmt {
            Stmt::Block(b) => self.visit_block(b),
            Stmt::DeclareList(decls) => self.visit_declare_list(decls),
            Stmt::Condition { condition, then_block, else_block, .. } => {
                self.visit_expr(condition)?;
                self.visit_stmt(then_block)?;
                if let Some(eb) = else_block {
                    self.visit_stmt(eb)?;
                }
                Ok(())
            }
            Stmt::While { condition, block, .. } => {
                self.visit_expr(condition)?;
                self.visit_stmt(block)
            }
            Stmt::Return { value, .. } => {
                if let Some(v) = value {
                    self.visit_expr(v)?;
                }
                Ok(())
            }
            Stmt::Break { .. } | Stmt::Continue { .. } | Stmt::Empty { .. } => Ok(()),
            Stmt::Expr { value, .. } => self.visit_expr(value),
        }
    }

    /// Each item's name is declared before its own initializer is visited
    /// (`let f = function() { f(); };` needs `f` visible to its own body),
    /// but the whole list commits atomically: if any item's name or
    /// initializer fails to resolve, every name added by earlier items in
    /// *this* list is rolled back before the error propagates, so a block
    /// that a caller keeps reusing after the error (the REPL's persistent
    /// root scope) never ends up with local slots the evaluator's frame
    /// doesn't have room for.
    fn visit_declare_list(&mut self, decls: &crate::ast::DeclareList<'a>) -> Result<(), CompileError> {
        let block = self.cur_block.expect("declare list outside a block");
        let start = block.attr.borrow().local_info.len() as i32;
        decls.start_index.set(start);
        for DeclareItem { name, initial } in &decls.decls {
            if let Err(e) = self.add_name_to_block(block, *name, decls.span) {
                self.rollback_locals_to(block, start);
                return Err(e);
            }
            if let Some(init) = initial {
                if let Err(e) = self.visit_expr(init) {
                    self.rollback_locals_to(block, start);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn visit_expr(&mut self, expr: &'a Expr<'a>) -> Result<(), CompileError> {
        match expr {
            Expr::Op(op) => {
                for arg in &op.args {
                    self.visit_expr(arg)?;
                }
                Ok(())
            }
            Expr::Var { name, attr, span } => {
                let block = self.cur_block.expect("var outside a block");
                let local = block.attr.borrow().name_to_local_index.get(name).copied();
                if let Some(index) = local {
                    attr.set(VarAttr { is_local: true, index });
                } else {
                    let index = self.add_nonlocal_to_block(block, *name, *span)?;
                    attr.set(VarAttr { is_local: false, index });
                }
                Ok(())
            }
            Expr::Func(func) => self.visit_func(func),
            Expr::List { items, .. } => {
                for item in items {
                    self.visit_expr(item)?;
                }
                Ok(())
            }
            Expr::Bool { .. } | Expr::Int { .. } | Expr::Float { .. } | Expr::Str { .. } | Expr::Null { .. } => Ok(()),
        }
    }

    fn visit_func(&mut self, func: &crate::ast::Func<'a>) -> Result<(), CompileError> {
        let func_block = func.body.as_block();

        if let Some(params) = func.params {
            let decls = match params {
                Stmt::DeclareList(d) => d,
                _ => unreachable!("function parameters are always a declare list"),
            };
            // Default argument expressions resolve in the *outer* scope.
            for item in &decls.decls {
                if let Some(init) = item.initial {
                    self.visit_expr(init)?;
                }
            }
            // Then the parameter names become locals of the function block.
            let saved = self.enter(func_block);
            self.add_declarations_to_block(func_block, decls)?;
            self.leave(saved);
        }

        self.visit_block(func_block)
    }
}

/// Desugars a chain of `Op(ExprList, ...)` style lowering isn't needed here;
/// this helper exists purely so callers can assert an op code without
/// matching on the enum directly in tests.
pub fn is_assignment(code: OpCode) -> bool {
    matches!(
        code,
        OpCode::Assign
            | OpCode::AddAssign
            | OpCode::SubAssign
            | OpCode::MulAssign
            | OpCode::DivAssign
            | OpCode::ModAssign
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::span::Span;

    fn span() -> Span {
        Span::default()
    }

    #[test]
    fn resolves_a_local_variable() {
        let arena_stmt: Arena<Stmt> = Arena::new();
        let arena_expr: Arena<Expr> = Arena::new();
        let mut interner = Interner::new();
        let a = interner.intern("a");

        let one = arena_expr.alloc(Expr::Int { value: 1, span: span() });
        let decl = arena_stmt.alloc(Stmt::DeclareList(crate::ast::DeclareList {
            decls: vec![DeclareItem { name: a, initial: Some(one) }],
            span: span(),
            start_index: std::cell::Cell::new(0),
        }));
        let var = arena_expr.alloc(Expr::Var { name: a, attr: std::cell::Cell::new(VarAttr::default()), span: span() });
        let use_stmt = arena_stmt.alloc(Stmt::Expr { value: var, span: span() });
        let block = Block::new(vec![decl, use_stmt], span());

        let mut resolver = Resolver::new(&interner);
        resolver.resolve_program(&block).expect("resolves");

        match var {
            Expr::Var { attr, .. } => {
                let v = attr.get();
                assert!(v.is_local);
                assert_eq!(v.index, 0);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn forward_reference_is_no_such_name() {
        let arena_stmt: Arena<Stmt> = Arena::new();
        let arena_expr: Arena<Expr> = Arena::new();
        let mut interner = Interner::new();
        let a = interner.intern("a");
        let b = interner.intern("b");

        let var_b = arena_expr.alloc(Expr::Var { name: b, attr: std::cell::Cell::new(VarAttr::default()), span: span() });
        let one = arena_expr.alloc(Expr::Int { value: 1, span: span() });
        let decl = arena_stmt.alloc(Stmt::DeclareList(crate::ast::DeclareList {
            decls: vec![
                DeclareItem { name: a, initial: Some(var_b) },
                DeclareItem { name: b, initial: Some(one) },
            ],
            span: span(),
            start_index: std::cell::Cell::new(0),
        }));
        let block = Block::new(vec![decl], span());

        let mut resolver = Resolver::new(&interner);
        let err = resolver.resolve_program(&block).unwrap_err();
        match err.kind {
            CompileErrorKind::NoSuchName { name } => assert_eq!(name, "b"),
            other => panic!("expected NoSuchName, got {:?}", other),
        }
    }

    /// A later item's failure must not leave an earlier item's name
    /// committed to the block's local table.
    #[test]
    fn failed_declare_list_leaves_block_attr_unchanged() {
        let arena_stmt: Arena<Stmt> = Arena::new();
        let arena_expr: Arena<Expr> = Arena::new();
        let mut interner = Interner::new();
        let a = interner.intern("a");
        let b = interner.intern("b");
        let undefined = interner.intern("undefined_name");

        let one = arena_expr.alloc(Expr::Int { value: 1, span: span() });
        let bad_ref = arena_expr.alloc(Expr::Var { name: undefined, attr: std::cell::Cell::new(VarAttr::default()), span: span() });
        let decl = arena_stmt.alloc(Stmt::DeclareList(crate::ast::DeclareList {
            decls: vec![
                DeclareItem { name: a, initial: Some(one) },
                DeclareItem { name: b, initial: Some(bad_ref) },
            ],
            span: span(),
            start_index: std::cell::Cell::new(0),
        }));
        let block = Block::new(vec![decl], span());

        let mut resolver = Resolver::new(&interner);
        let err = resolver.resolve_program(&block).unwrap_err();
        assert!(matches!(err.kind, CompileErrorKind::NoSuchName { .. }));

        let attr = block.attr.borrow();
        assert!(attr.local_info.is_empty(), "rolled-back declare list left a phantom local");
        assert!(attr.name_to_local_index.is_empty());
    }

    /// The REPL resolves each input line against one persistent root scope.
    /// A failing multi-item `let` on one line must roll back cleanly so a
    /// later, successful line still lines up with the evaluator's frame.
    #[test]
    fn resolve_into_rolls_back_a_failed_declare_list_across_repl_lines() {
        let arena_stmt: Arena<Stmt> = Arena::new();
        let arena_expr: Arena<Expr> = Arena::new();
        let mut interner = Interner::new();
        let a = interner.intern("a");
        let c = interner.intern("c");
        let undefined = interner.intern("undefined_name");

        let bad_ref = arena_expr.alloc(Expr::Var { name: undefined, attr: std::cell::Cell::new(VarAttr::default()), span: span() });
        let failing_decl = arena_stmt.alloc(Stmt::DeclareList(crate::ast::DeclareList {
            decls: vec![DeclareItem { name: a, initial: Some(bad_ref) }],
            span: span(),
            start_index: std::cell::Cell::new(0),
        }));
        let one = arena_expr.alloc(Expr::Int { value: 1, span: span() });
        let ok_decl = arena_stmt.alloc(Stmt::DeclareList(crate::ast::DeclareList {
            decls: vec![DeclareItem { name: c, initial: Some(one) }],
            span: span(),
            start_index: std::cell::Cell::new(0),
        }));

        let block = Block::new(Vec::new(), span());
        let mut resolver = Resolver::new(&interner);

        resolver.resolve_into(&block, failing_decl).unwrap_err();
        assert!(block.attr.borrow().local_info.is_empty());

        resolver.resolve_into(&block, ok_decl).expect("earlier failure must not corrupt the block's local table");
        assert_eq!(block.attr.borrow().local_info, vec![c]);
    }

    #[test]
    fn duplicate_local_name_is_rejected() {
        let arena_stmt: Arena<Stmt> = Arena::new();
        let arena_expr: Arena<Expr> = Arena::new();
        let mut interner = Interner::new();
        let a = interner.intern("a");

        let one = arena_expr.alloc(Expr::Int { value: 1, span: span() });
        let two = arena_expr.alloc(Expr::Int { value: 2, span: span() });
        let decl = arena_stmt.alloc(Stmt::DeclareList(crate::ast::DeclareList {
            decls: vec![
                DeclareItem { name: a, initial: Some(one) },
                DeclareItem { name: a, initial: Some(two) },
            ],
            span: span(),
            start_index: std::cell::Cell::new(0),
        }));
        let block = Block::new(vec![decl], span());

        let mut resolver = Resolver::new(&interner);
        let err = resolver.resolve_program(&block).unwrap_err();
        assert!(matches!(err.kind, CompileErrorKind::DuplicatedLocalName { .. }));
    }
}
