//! Recursive-descent parser turning a token stream into AST nodes.
//!
//! The precedence cascade (assignment, `||`, `&&`, `==`/`!=`, comparisons,
//! `+`/`-`, `*`/`/`/`%`, unary sign, `!`, postfix call/subscript, terminals)
//! mirrors the reference parser's state-machine grammar one level at a time;
//! each `parse_exp_*` here corresponds to one of its `enter_exp_*` states.
//! Keywords (`let`, `if`, `while`, `return`, `break`, `continue`, `function`,
//! `null`, `true`, `false`, `else`) are not their own token kind: the lexer
//! hands back a plain `Id`, and the parser recognizes them by comparing its
//! interned `Symbol` against a pre-interned keyword table, the same role the
//! reference parser's `match_id` plays against plain keyword strings.
//!
//! `feed` only buffers tokens; the actual grammar runs once, in `pop_result`,
//! over the whole buffered slice. `can_end` runs that same grammar on a trial
//! copy and asks whether the only thing standing between it and a result was
//! running out of tokens (`UnexpectedEnd`) rather than a real syntax error.
//!
//! Keyword symbols are interned once, at construction, rather than resolved
//! back to text on every comparison: a REPL feeds the lexer and the parser in
//! the same loop, one character of a new line at a time, so holding a live
//! borrow of the interner across that whole loop (to re-resolve symbols on
//! demand) would fight the lexer's own need for a mutable one.

use crate::arena::Arena;
use crate::ast::{Block, DeclareItem, DeclareList, Expr, Func, Op, OpCode, Stmt, VarAttr};
use crate::error::{ParserError, ParserErrorKind};
use crate::intern::{Interner, Symbol};
use crate::span::Span;
use crate::token::{Literal, Token, TokenKind};

#[derive(Clone, Copy)]
struct Keywords {
    return_: Symbol,
    continue_: Symbol,
    break_: Symbol,
    let_: Symbol,
    if_: Symbol,
    else_: Symbol,
    while_: Symbol,
    function: Symbol,
    null: Symbol,
    true_: Symbol,
    false_: Symbol,
}

impl Keywords {
    fn new(interner: &mut Interner) -> Self {
        Keywords {
            return_: interner.intern("return"),
            continue_: interner.intern("continue"),
            break_: interner.intern("break"),
            let_: interner.intern("let"),
            if_: interner.intern("if"),
            else_: interner.intern("else"),
            while_: interner.intern("while"),
            function: interner.intern("function"),
            null: interner.intern("null"),
            true_: interner.intern("true"),
            false_: interner.intern("false"),
        }
    }
}

pub enum ParseResult<'a> {
    Program(&'a Stmt<'a>),
    /// A bare expression with no trailing `;`, produced only in REPL mode.
    Expr(&'a Expr<'a>),
}

struct Cursor<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Cursor<'t> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> Result<Token, ParserError> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(unexpected(self.peek(), expected))
        }
    }
}

fn unexpected(tok: &Token, expected: &'static str) -> ParserError {
    let kind = if tok.kind == TokenKind::End {
        ParserErrorKind::UnexpectedEnd { expected }
    } else {
        ParserErrorKind::UnexpectedToken { expected, found: tok.kind }
    };
    ParserError { kind, span: tok.span }
}

fn is_assignable(expr: &Expr) -> bool {
    matches!(expr, Expr::Var { .. }) || matches!(expr, Expr::Op(op) if op.code == OpCode::Subscript)
}

pub struct Parser<'a> {
    stmts: &'a Arena<Stmt<'a>>,
    exprs: &'a Arena<Expr<'a>>,
    keywords: Keywords,
    tokens: Vec<Token>,
    repl: bool,
}

impl<'a> Parser<'a> {
    pub fn new(stmts: &'a Arena<Stmt<'a>>, exprs: &'a Arena<Expr<'a>>, interner: &mut Interner) -> Self {
        Parser { stmts, exprs, keywords: Keywords::new(interner), tokens: Vec::new(), repl: false }
    }

    pub fn start_program(&mut self) {
        self.tokens.clear();
        self.repl = false;
    }

    pub fn start_repl(&mut self) {
        self.tokens.clear();
        self.repl = true;
    }

    pub fn feed(&mut self, tok: Token) -> Result<(), ParserError> {
        if tok.kind != TokenKind::Comment {
            self.tokens.push(tok);
        }
        Ok(())
    }

    /// True once a result has been popped and no new tokens have arrived yet.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn can_end(&self) -> bool {
        let trial = self.terminated_tokens();
        let mut cursor = Cursor { tokens: &trial, pos: 0 };
        let result = if self.repl {
            self.parse_program_or_exp(&mut cursor).map(|_| ())
        } else {
            self.parse_program(&mut cursor).map(|_| ())
        };
        match result {
            Ok(()) => true,
            Err(ParserError { kind: ParserErrorKind::UnexpectedEnd { .. }, .. }) => false,
            Err(_) => true,
        }
    }

    pub fn pop_result(&mut self) -> Result<ParseResult<'a>, ParserError> {
        self.tokens = self.terminated_tokens();
        let mut cursor = Cursor { tokens: &self.tokens, pos: 0 };
        if self.repl {
            self.parse_program_or_exp(&mut cursor)
        } else {
            Ok(ParseResult::Program(self.parse_program(&mut cursor)?))
        }
    }

    fn terminated_tokens(&self) -> Vec<Token> {
        if self.tokens.last().map(|t| t.kind) == Some(TokenKind::End) {
            self.tokens.clone()
        } else {
            let mut tokens = self.tokens.clone();
            tokens.push(Token::new(TokenKind::End, Span::default()));
            tokens
        }
    }

    fn match_id(&self, tok: &Token, word: Symbol) -> bool {
        tok.kind == TokenKind::Id && matches!(&tok.literal, Some(Literal::Id(sym)) if *sym == word)
    }

    fn id_symbol(&self, tok: &Token) -> Symbol {
        match &tok.literal {
            Some(Literal::Id(sym)) => *sym,
            _ => unreachable!("caller already checked tok.kind == Id"),
        }
    }

    fn is_stmt_keyword(&self, tok: &Token) -> bool {
        let kw = &self.keywords;
        [kw.return_, kw.continue_, kw.break_, kw.let_, kw.if_, kw.while_].iter().any(|&w| self.match_id(tok, w))
    }

    // ---- statements ----

    fn parse_program(&self, c: &mut Cursor) -> Result<&'a Stmt<'a>, ParserError> {
        let start = c.peek().span;
        let mut stmts = Vec::new();
        while c.peek().kind != TokenKind::End {
            stmts.push(self.parse_stmt(c)?);
        }
        let end = c.peek().span;
        let span = stmts.last().map(|s: &&Stmt| start.to(s.span())).unwrap_or(start.to(end));
        Ok(self.stmts.alloc(Stmt::Block(Block::new(stmts, span))))
    }

    fn parse_program_or_exp(&self, c: &mut Cursor) -> Result<ParseResult<'a>, ParserError> {
        let start = c.peek().span;
        let mut stmts = Vec::new();
        loop {
            if c.peek().kind == TokenKind::End {
                let end = c.peek().span;
                let span = stmts.last().map(|s: &&Stmt| start.to(s.span())).unwrap_or(start.to(end));
                return Ok(ParseResult::Program(self.stmts.alloc(Stmt::Block(Block::new(stmts, span)))));
            }
            let tok = c.peek().clone();
            if self.is_stmt_keyword(&tok) || matches!(tok.kind, TokenKind::Semicolon | TokenKind::LBrace) {
                stmts.push(self.parse_stmt(c)?);
                continue;
            }
            let expr = self.parse_exp(c)?;
            match c.peek().kind {
                TokenKind::Semicolon => {
                    let semi = c.advance();
                    let span = expr.span().to(semi.span);
                    stmts.push(self.stmts.alloc(Stmt::Expr { value: expr, span }));
                }
                TokenKind::End => return Ok(ParseResult::Expr(expr)),
                _ => return Err(unexpected(c.peek(), "';' or end of input")),
            }
        }
    }

    fn parse_stmt(&self, c: &mut Cursor) -> Result<&'a Stmt<'a>, ParserError> {
        let tok = c.peek().clone();
        match tok.kind {
            TokenKind::Semicolon => {
                c.advance();
                Ok(self.stmts.alloc(Stmt::Empty { span: tok.span }))
            }
            TokenKind::LBrace => {
                let block = self.parse_block(c)?;
                Ok(self.stmts.alloc(Stmt::Block(block)))
            }
            TokenKind::Id if self.match_id(&tok, self.keywords.return_) => self.parse_return(c, tok.span),
            TokenKind::Id if self.match_id(&tok, self.keywords.continue_) => {
                c.advance();
                let semi = c.expect(TokenKind::Semicolon, "';'")?;
                Ok(self.stmts.alloc(Stmt::Continue { span: tok.span.to(semi.span) }))
            }
            TokenKind::Id if self.match_id(&tok, self.keywords.break_) => {
                c.advance();
                let semi = c.expect(TokenKind::Semicolon, "';'")?;
                Ok(self.stmts.alloc(Stmt::Break { span: tok.span.to(semi.span) }))
            }
            TokenKind::Id if self.match_id(&tok, self.keywords.let_) => self.parse_var_decl(c, tok.span),
            TokenKind::Id if self.match_id(&tok, self.keywords.if_) => self.parse_condition(c, tok.span),
            TokenKind::Id if self.match_id(&tok, self.keywords.while_) => self.parse_while(c, tok.span),
            _ => {
                let expr = self.parse_exp(c)?;
                let semi = c.expect(TokenKind::Semicolon, "';'")?;
                let span = expr.span().to(semi.span);
                Ok(self.stmts.alloc(Stmt::Expr { value: expr, span }))
            }
        }
    }

    fn parse_block(&self, c: &mut Cursor) -> Result<Block<'a>, ParserError> {
        let open = c.expect(TokenKind::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while c.peek().kind != TokenKind::RBrace {
            stmts.push(self.parse_stmt(c)?);
        }
        let close = c.advance();
        let span = open.span.to(close.span);
        Ok(Block::new(stmts, span))
    }

    fn parse_required_block(&self, c: &mut Cursor) -> Result<&'a Stmt<'a>, ParserError> {
        if c.peek().kind != TokenKind::LBrace {
            return Err(unexpected(c.peek(), "'{'"));
        }
        let block = self.parse_block(c)?;
        Ok(self.stmts.alloc(Stmt::Block(block)))
    }

    fn parse_return(&self, c: &mut Cursor, start: Span) -> Result<&'a Stmt<'a>, ParserError> {
        c.advance();
        if c.peek().kind == TokenKind::Semicolon {
            let semi = c.advance();
            return Ok(self.stmts.alloc(Stmt::Return { value: None, span: start.to(semi.span) }));
        }
        let value = self.parse_exp(c)?;
        let semi = c.expect(TokenKind::Semicolon, "';'")?;
        Ok(self.stmts.alloc(Stmt::Return { value: Some(value), span: start.to(semi.span) }))
    }

    fn parse_condition(&self, c: &mut Cursor, start: Span) -> Result<&'a Stmt<'a>, ParserError> {
        c.advance();
        c.expect(TokenKind::LPar, "'('")?;
        let condition = self.parse_exp(c)?;
        c.expect(TokenKind::RPar, "')'")?;
        let then_block = self.parse_required_block(c)?;
        let mut span = start.to(then_block.span());

        let else_block = if self.match_id(c.peek(), self.keywords.else_) {
            c.advance();
            if self.match_id(c.peek(), self.keywords.if_) {
                let if_span = c.peek().span;
                let elif = self.parse_condition(c, if_span)?;
                span = start.to(elif.span());
                Some(elif)
            } else if c.peek().kind == TokenKind::LBrace {
                let b = self.parse_required_block(c)?;
                span = start.to(b.span());
                Some(b)
            } else {
                return Err(unexpected(c.peek(), "'if' or '{'"));
            }
        } else {
            None
        };

        Ok(self.stmts.alloc(Stmt::Condition { condition, then_block, else_block, span }))
    }

    fn parse_while(&self, c: &mut Cursor, start: Span) -> Result<&'a Stmt<'a>, ParserError> {
        c.advance();
        c.expect(TokenKind::LPar, "'('")?;
        let condition = self.parse_exp(c)?;
        c.expect(TokenKind::RPar, "')'")?;
        let block = self.parse_required_block(c)?;
        let span = start.to(block.span());
        Ok(self.stmts.alloc(Stmt::While { condition, block, span }))
    }

    fn parse_var_decl(&self, c: &mut Cursor, start: Span) -> Result<&'a Stmt<'a>, ParserError> {
        c.advance();
        let decls = self.parse_decl_list(c)?;
        let semi = c.expect(TokenKind::Semicolon, "';'")?;
        let span = start.to(semi.span);
        Ok(self.stmts.alloc(Stmt::DeclareList(DeclareList { span, ..decls })))
    }

    /// Shared by `let` statements and function parameter lists: one or more
    /// comma-separated `name` or `name = default` items. Each default binds
    /// at assignment precedence, never pulling in the list's own commas.
    fn parse_decl_list(&self, c: &mut Cursor) -> Result<DeclareList<'a>, ParserError> {
        let mut decls = Vec::new();
        let start = c.peek().span;
        let mut end = start;
        loop {
            let id_tok = c.expect(TokenKind::Id, "identifier")?;
            let name = self.id_symbol(&id_tok);
            end = id_tok.span;
            let initial = if c.peek().kind == TokenKind::Assign {
                c.advance();
                let init = self.parse_exp_assign(c)?;
                end = init.span();
                Some(init)
            } else {
                None
            };
            decls.push(DeclareItem { name, initial });
            if c.peek().kind == TokenKind::Comma {
                c.advance();
                continue;
            }
            break;
        }
        Ok(DeclareList { decls, span: start.to(end), start_index: std::cell::Cell::new(0) })
    }

    // ---- expressions ----

    /// The comma operator: `a, b` evaluates to `b`, but a lone expression is
    /// never wrapped in a one-element list (unlike `parse_exp_list_abs`).
    fn parse_exp(&self, c: &mut Cursor) -> Result<&'a Expr<'a>, ParserError> {
        let first = self.parse_exp_assign(c)?;
        if c.peek().kind != TokenKind::Comma {
            return Ok(first);
        }
        let mut span = first.span();
        let mut args = vec![first];
        while c.peek().kind == TokenKind::Comma {
            c.advance();
            let next = self.parse_exp_assign(c)?;
            span = span.to(next.span());
            args.push(next);
        }
        Ok(self.exprs.alloc(Expr::Op(Op { code: OpCode::ExprList, args, span })))
    }

    /// Call arguments and list elements: always an `ExprList`, even with one
    /// element, so a zero/one/many-argument call is told apart by arg count
    /// alone rather than by unwrapping.
    fn parse_exp_list_abs(&self, c: &mut Cursor) -> Result<&'a Expr<'a>, ParserError> {
        let first = self.parse_exp_assign(c)?;
        let mut span = first.span();
        let mut args = vec![first];
        while c.peek().kind == TokenKind::Comma {
            c.advance();
            let next = self.parse_exp_assign(c)?;
            span = span.to(next.span());
            args.push(next);
        }
        Ok(self.exprs.alloc(Expr::Op(Op { code: OpCode::ExprList, args, span })))
    }

    fn parse_exp_assign(&self, c: &mut Cursor) -> Result<&'a Expr<'a>, ParserError> {
        let lhs = self.parse_exp_or(c)?;
        let code = match c.peek().kind {
            TokenKind::Assign => OpCode::Assign,
            TokenKind::PlusAssign => OpCode::AddAssign,
            TokenKind::MinusAssign => OpCode::SubAssign,
            TokenKind::StarAssign => OpCode::MulAssign,
            TokenKind::SlashAssign => OpCode::DivAssign,
            TokenKind::PercentAssign => OpCode::ModAssign,
            _ => return Ok(lhs),
        };
        if !is_assignable(lhs) {
            return Err(unexpected(c.peek(), "a variable or subscript expression"));
        }
        c.advance();
        let rhs = self.parse_exp_assign(c)?;
        let span = lhs.span().to(rhs.span());
        Ok(self.exprs.alloc(Expr::Op(Op { code, args: vec![lhs, rhs], span })))
    }

    fn parse_exp_or(&self, c: &mut Cursor) -> Result<&'a Expr<'a>, ParserError> {
        let mut lhs = self.parse_exp_and(c)?;
        while c.peek().kind == TokenKind::Or {
            c.advance();
            let rhs = self.parse_exp_and(c)?;
            let span = lhs.span().to(rhs.span());
            lhs = self.exprs.alloc(Expr::Op(Op { code: OpCode::Or, args: vec![lhs, rhs], span }));
        }
        Ok(lhs)
    }

    fn parse_exp_and(&self, c: &mut Cursor) -> Result<&'a Expr<'a>, ParserError> {
        let mut lhs = self.parse_exp_eq(c)?;
        while c.peek().kind == TokenKind::And {
            c.advance();
            let rhs = self.parse_exp_eq(c)?;
            let span = lhs.span().to(rhs.span());
            lhs = self.exprs.alloc(Expr::Op(Op { code: OpCode::And, args: vec![lhs, rhs], span }));
        }
        Ok(lhs)
    }

    fn parse_exp_eq(&self, c: &mut Cursor) -> Result<&'a Expr<'a>, ParserError> {
        let mut lhs = self.parse_exp_cmp(c)?;
        loop {
            let code = match c.peek().kind {
                TokenKind::Eq => OpCode::Eq,
                TokenKind::NotEq => OpCode::NotEq,
                _ => return Ok(lhs),
            };
            c.advance();
            let rhs = self.parse_exp_cmp(c)?;
            let span = lhs.span().to(rhs.span());
            lhs = self.exprs.alloc(Expr::Op(Op { code, args: vec![lhs, rhs], span }));
        }
    }

    fn parse_exp_cmp(&self, c: &mut Cursor) -> Result<&'a Expr<'a>, ParserError> {
        let mut lhs = self.parse_exp_a(c)?;
        loop {
            let code = match c.peek().kind {
                TokenKind::Less => OpCode::Less,
                TokenKind::LessEq => OpCode::LessEq,
                TokenKind::Great => OpCode::Great,
                TokenKind::GreatEq => OpCode::GreatEq,
                _ => return Ok(lhs),
            };
            c.advance();
            let rhs = self.parse_exp_a(c)?;
            let span = lhs.span().to(rhs.span());
            lhs = self.exprs.alloc(Expr::Op(Op { code, args: vec![lhs, rhs], span }));
        }
    }

    fn parse_exp_a(&self, c: &mut Cursor) -> Result<&'a Expr<'a>, ParserError> {
        let mut lhs = self.parse_exp_x(c)?;
        loop {
            let code = match c.peek().kind {
                TokenKind::Plus => OpCode::Add,
                TokenKind::Minus => OpCode::Sub,
                _ => return Ok(lhs),
            };
            c.advance();
            let rhs = self.parse_exp_x(c)?;
            let span = lhs.span().to(rhs.span());
            lhs = self.exprs.alloc(Expr::Op(Op { code, args: vec![lhs, rhs], span }));
        }
    }

    fn parse_exp_x(&self, c: &mut Cursor) -> Result<&'a Expr<'a>, ParserError> {
        let mut lhs = self.parse_exp_x_head(c)?;
        loop {
            let code = match c.peek().kind {
                TokenKind::Star => OpCode::Mul,
                TokenKind::Slash => OpCode::Div,
                TokenKind::Percent => OpCode::Mod,
                _ => return Ok(lhs),
            };
            c.advance();
            let rhs = self.parse_exp_x_head(c)?;
            let span = lhs.span().to(rhs.span());
            lhs = self.exprs.alloc(Expr::Op(Op { code, args: vec![lhs, rhs], span }));
        }
    }

    fn parse_exp_x_head(&self, c: &mut Cursor) -> Result<&'a Expr<'a>, ParserError> {
        let code = match c.peek().kind {
            TokenKind::Plus => OpCode::Pos,
            TokenKind::Minus => OpCode::Neg,
            _ => return self.parse_exp_not(c),
        };
        let tok = c.advance();
        let operand = self.parse_exp_not(c)?;
        let span = tok.span.to(operand.span());
        Ok(self.exprs.alloc(Expr::Op(Op { code, args: vec![operand], span })))
    }

    fn parse_exp_not(&self, c: &mut Cursor) -> Result<&'a Expr<'a>, ParserError> {
        if c.peek().kind == TokenKind::Not {
            let tok = c.advance();
            let operand = self.parse_exp_call_or_subs(c)?;
            let span = tok.span.to(operand.span());
            Ok(self.exprs.alloc(Expr::Op(Op { code: OpCode::Not, args: vec![operand], span })))
        } else {
            self.parse_exp_call_or_subs(c)
        }
    }

    fn parse_exp_call_or_subs(&self, c: &mut Cursor) -> Result<&'a Expr<'a>, ParserError> {
        let mut expr = self.parse_exp_t(c)?;
        loop {
            match c.peek().kind {
                TokenKind::LSquare => {
                    c.advance();
                    let index = self.parse_exp(c)?;
                    let close = c.expect(TokenKind::RSquare, "']'")?;
                    let span = expr.span().to(close.span);
                    expr = self.exprs.alloc(Expr::Op(Op { code: OpCode::Subscript, args: vec![expr, index], span }));
                }
                TokenKind::LPar => {
                    c.advance();
                    if c.peek().kind == TokenKind::RPar {
                        let close = c.advance();
                        let span = expr.span().to(close.span);
                        expr = self.exprs.alloc(Expr::Op(Op { code: OpCode::Call, args: vec![expr], span }));
                    } else {
                        let arglist = self.parse_exp_list_abs(c)?;
                        let close = c.expect(TokenKind::RPar, "')'")?;
                        let span = expr.span().to(close.span);
                        expr = self.exprs.alloc(Expr::Op(Op { code: OpCode::Call, args: vec![expr, arglist], span }));
                    }
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_exp_t(&self, c: &mut Cursor) -> Result<&'a Expr<'a>, ParserError> {
        let tok = c.peek().clone();
        match tok.kind {
            TokenKind::LPar => {
                c.advance();
                let inner = self.parse_exp(c)?;
                c.expect(TokenKind::RPar, "')'")?;
                Ok(inner)
            }
            TokenKind::Int => {
                c.advance();
                let value = match tok.literal {
                    Some(Literal::Int(n)) => n,
                    _ => unreachable!("Int token always carries an Int literal"),
                };
                Ok(self.exprs.alloc(Expr::Int { value, span: tok.span }))
            }
            TokenKind::Float => {
                c.advance();
                let value = match tok.literal {
                    Some(Literal::Float(f)) => f,
                    _ => unreachable!("Float token always carries a Float literal"),
                };
                Ok(self.exprs.alloc(Expr::Float { value, span: tok.span }))
            }
            TokenKind::String => {
                c.advance();
                let value = match tok.literal {
                    Some(Literal::Str(s)) => s,
                    _ => unreachable!("String token always carries a Str literal"),
                };
                Ok(self.exprs.alloc(Expr::Str { value, span: tok.span }))
            }
            TokenKind::LSquare => self.parse_list(c),
            TokenKind::Id if self.match_id(&tok, self.keywords.function) => self.parse_function(c, tok.span),
            TokenKind::Id if self.match_id(&tok, self.keywords.null) => {
                c.advance();
                Ok(self.exprs.alloc(Expr::Null { span: tok.span }))
            }
            TokenKind::Id if self.match_id(&tok, self.keywords.true_) => {
                c.advance();
                Ok(self.exprs.alloc(Expr::Bool { value: true, span: tok.span }))
            }
            TokenKind::Id if self.match_id(&tok, self.keywords.false_) => {
                c.advance();
                Ok(self.exprs.alloc(Expr::Bool { value: false, span: tok.span }))
            }
            TokenKind::Id => {
                c.advance();
                let name = self.id_symbol(&tok);
                Ok(self.exprs.alloc(Expr::Var { name, attr: std::cell::Cell::new(VarAttr::default()), span: tok.span }))
            }
            _ => Err(unexpected(&tok, "an expression")),
        }
    }

    fn parse_list(&self, c: &mut Cursor) -> Result<&'a Expr<'a>, ParserError> {
        let open = c.expect(TokenKind::LSquare, "'['")?;
        if c.peek().kind == TokenKind::RSquare {
            let close = c.advance();
            return Ok(self.exprs.alloc(Expr::List { items: Vec::new(), span: open.span.to(close.span) }));
        }
        let list_exp = self.parse_exp_list_abs(c)?;
        let close = c.expect(TokenKind::RSquare, "']'")?;
        let items = match list_exp {
            Expr::Op(op) if op.code == OpCode::ExprList => op.args.clone(),
            _ => unreachable!("parse_exp_list_abs always yields an ExprList op"),
        };
        Ok(self.exprs.alloc(Expr::List { items, span: open.span.to(close.span) }))
    }

    fn parse_function(&self, c: &mut Cursor, start: Span) -> Result<&'a Expr<'a>, ParserError> {
        c.advance();
        c.expect(TokenKind::LPar, "'('")?;
        let params = if c.peek().kind == TokenKind::RPar {
            c.advance();
            None
        } else {
            let decls = self.parse_decl_list(c)?;
            c.expect(TokenKind::RPar, "')'")?;
            Some(self.stmts.alloc(Stmt::DeclareList(decls)))
        };
        let body = self.parse_required_block(c)?;
        let span = start.to(body.span());
        Ok(self.exprs.alloc(Expr::Func(Func { params, body, span })))
    }
}
