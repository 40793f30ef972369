//! Bump allocator for AST nodes and runtime values.
//!
//! Closures can capture a frame that transitively holds the closure itself,
//! so these values are never reference-counted; everything lives for the
//! arena's lifetime and is freed in one shot when the arena is dropped.

use bumpalo::Bump;

pub struct Arena<T> {
    bump: Bump,
    _marker: std::marker::PhantomData<T>,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Arena {
            bump: Bump::new(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn alloc(&self, value: T) -> &T {
        self.bump.alloc(value)
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Block, Expr, Stmt};
    use crate::intern::Interner;
    use crate::span::Span;
    use crate::value::Value;

    #[test]
    fn alloc_returns_stable_references_across_many_expr_nodes() {
        let arena: Arena<Expr> = Arena::new();
        let refs: Vec<&Expr> = (0..10_000).map(|i| arena.alloc(Expr::Int { value: i, span: Span::default() })).collect();
        for (i, r) in refs.iter().enumerate() {
            match r {
                Expr::Int { value, .. } => assert_eq!(*value, i as i64),
                _ => unreachable!(),
            }
        }
    }

    #[test]
    fn stmt_and_expr_arenas_are_independent() {
        let stmts: Arena<Stmt> = Arena::new();
        let exprs: Arena<Expr> = Arena::new();
        let one = exprs.alloc(Expr::Int { value: 1, span: Span::default() });
        let expr_stmt = stmts.alloc(Stmt::Expr { value: one, span: Span::default() });
        match expr_stmt {
            Stmt::Expr { value, .. } => assert!(std::ptr::eq(*value, one)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn interned_symbols_survive_in_an_allocated_block() {
        let mut interner = Interner::new();
        let name = interner.intern("x");
        let arena: Arena<Block> = Arena::new();
        let block = arena.alloc(Block::new(Vec::new(), Span::default()));
        block.attr.borrow_mut().local_info.push(name);
        assert_eq!(interner.resolve(name), "x");
        assert_eq!(block.attr.borrow().local_info[0], name);
    }

    #[test]
    fn list_value_holds_references_into_its_own_arena() {
        let arena: Arena<Value> = Arena::new();
        let one = arena.alloc(Value::Int(1));
        let two = arena.alloc(Value::Int(2));
        let list = arena.alloc(Value::List(std::cell::RefCell::new(vec![one, two])));
        match list {
            Value::List(items) => assert_eq!(items.borrow().len(), 2),
            _ => unreachable!(),
        }
    }
}
