//! Validates that `break`/`continue` only appear inside a loop and `return`
//! only inside a function body, mirroring the reference `CFChecker`'s
//! save/restore of two flags as it walks the tree.

use crate::ast::{Block, Stmt};
use crate::error::{CompileError, CompileErrorKind};

pub struct ControlFlowChecker {
    inside_loop: bool,
    inside_func: bool,
}

impl ControlFlowChecker {
    pub fn new() -> Self {
        ControlFlowChecker { inside_loop: false, inside_func: false }
    }

    pub fn check_program(block: &Block) -> Result<(), CompileError> {
        let mut checker = ControlFlowChecker::new();
        checker.check_block(block)
    }

    /// Checks a single bare expression, for a REPL input with no trailing
    /// `;` (otherwise it's just one more statement of a `Program`).
    pub fn check_top_expr(expr: &crate::ast::Expr) -> Result<(), CompileError> {
        let mut checker = ControlFlowChecker::new();
        checker.check_expr(expr)
    }

    fn check_block(&mut self, block: &Block) -> Result<(), CompileError> {
        for stmt in &block.stmts {
            self.check_stmt(stmt)?;
        }
        Ok(())
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Block(b) => self.check_block(b),
            Stmt::DeclareList(decls) => {
                for item in &decls.decls {
                    if let Some(init) = item.initial {
                        self.check_expr(init)?;
                    }
                }
                Ok(())
            }
            Stmt::Condition { condition, then_block, else_block, .. } => {
                self.check_expr(condition)?;
                self.check_stmt(then_block)?;
                if let Some(eb) = else_block {
                    self.check_stmt(eb)?;
                }
                Ok(())
            }
            Stmt::While { condition, block, .. } => {
                self.check_expr(condition)?;
                let saved = self.inside_loop;
                self.inside_loop = true;
                let result = self.check_stmt(block);
                self.inside_loop = saved;
                result
            }
            Stmt::Return { value, span } => {
                if !self.inside_func {
                    return Err(CompileError { kind: CompileErrorKind::BadReturn, span: *span });
                }
                if let Some(v) = value {
                    self.check_expr(v)?;
                }
                Ok(())
            }
            Stmt::Break { span } => {
                if !self.inside_loop {
                    return Err(CompileError { kind: CompileErrorKind::BadBreak, span: *span });
                }
                Ok(())
            }
            Stmt::Continue { span } => {
                if !self.inside_loop {
                    return Err(CompileError { kind: CompileErrorKind::BadContinue, span: *span });
                }
                Ok(())
            }
            Stmt::Expr { value, .. } => self.check_expr(value),
            Stmt::Empty { .. } => Ok(()),
        }
    }

    fn check_expr(&mut self, expr: &crate::ast::Expr) -> Result<(), CompileError> {
        use crate::ast::Expr;
        match expr {
            Expr::Op(op) => {
                for arg in &op.args {
                    self.check_expr(arg)?;
                }
                Ok(())
            }
            Expr::Func(func) => {
                let saved_loop = self.inside_loop;
                let saved_func = self.inside_func;
                self.inside_loop = false;
                self.inside_func = true;
                let result = self.check_stmt(func.body);
                self.inside_loop = saved_loop;
                self.inside_func = saved_func;
                result
            }
            Expr::List { items, .. } => {
                for item in items {
                    self.check_expr(item)?;
                }
                Ok(())
            }
            Expr::Var { .. } | Expr::Bool { .. } | Expr::Int { .. } | Expr::Float { .. } | Expr::Str { .. } | Expr::Null { .. } => {
                Ok(())
            }
        }
    }
}

impl Default for ControlFlowChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::ast::Stmt;
    use crate::span::Span;

    #[test]
    fn rejects_top_level_break() {
        let arena: Arena<Stmt> = Arena::new();
        let brk = arena.alloc(Stmt::Break { span: Span::default() });
        let block = Block::new(vec![brk], Span::default());
        let err = ControlFlowChecker::check_program(&block).unwrap_err();
        assert!(matches!(err.kind, CompileErrorKind::BadBreak));
    }

    #[test]
    fn allows_break_inside_while() {
        let arena: Arena<Stmt> = Arena::new();
        let arena_expr: Arena<crate::ast::Expr> = Arena::new();
        let brk = arena.alloc(Stmt::Break { span: Span::default() });
        let body = arena.alloc(Stmt::Block(Block::new(vec![brk], Span::default())));
        let cond = arena_expr.alloc(crate::ast::Expr::Bool { value: true, span: Span::default() });
        let while_stmt = arena.alloc(Stmt::While { condition: cond, block: body, span: Span::default() });
        let block = Block::new(vec![while_stmt], Span::default());
        ControlFlowChecker::check_program(&block).expect("break inside while is fine");
    }

    #[test]
    fn rejects_return_outside_function() {
        let arena: Arena<Stmt> = Arena::new();
        let ret = arena.alloc(Stmt::Return { value: None, span: Span::default() });
        let block = Block::new(vec![ret], Span::default());
        let err = ControlFlowChecker::check_program(&block).unwrap_err();
        assert!(matches!(err.kind, CompileErrorKind::BadReturn));
    }
}
