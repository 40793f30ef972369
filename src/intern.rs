//! String interning for identifiers seen by the lexer.
//!
//! Every `Id` token and every name the resolver binds goes through the
//! interner, so block attribute tables and frames can compare names by a
//! cheap `Symbol` equality instead of a string compare. The parser's
//! `Keywords` table leans on this: `let`/`if`/`while`/... are plain `Id`
//! tokens recognized by comparing their interned `Symbol` against one
//! interned once at construction, not by string matching on every token.

use std::collections::HashMap;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Symbol(u32);

impl Symbol {
    pub const EMPTY: Symbol = Symbol(0);
}

impl Default for Symbol {
    fn default() -> Self {
        Self::EMPTY
    }
}

pub struct Interner {
    map: HashMap<String, Symbol>,
    vec: Vec<String>,
}

impl Interner {
    pub fn new() -> Self {
        let mut interner = Interner {
            map: HashMap::new(),
            vec: Vec::new(),
        };
        interner.vec.push(String::new());
        interner
    }

    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(&sym) = self.map.get(s) {
            return sym;
        }
        let sym = Symbol(self.vec.len() as u32);
        self.vec.push(s.to_string());
        self.map.insert(s.to_string(), sym);
        sym
    }

    pub fn resolve(&self, sym: Symbol) -> &str {
        &self.vec[sym.0 as usize]
    }

    /// Looks up an identifier the lexer or CLI driver needs to find without
    /// interning it (`main` at program end, an already-bound REPL name) —
    /// returns `None` rather than creating a new, necessarily-unbound entry.
    pub fn lookup(&self, s: &str) -> Option<Symbol> {
        self.map.get(s).copied()
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYWORDS: [&str; 11] =
        ["return", "continue", "break", "let", "if", "else", "while", "function", "null", "true", "false"];

    #[test]
    fn each_keyword_interns_to_a_distinct_symbol() {
        let mut interner = Interner::new();
        let symbols: Vec<Symbol> = KEYWORDS.iter().map(|k| interner.intern(k)).collect();
        for (i, a) in symbols.iter().enumerate() {
            for (j, b) in symbols.iter().enumerate() {
                assert_eq!(i == j, a == b, "{} vs {}", KEYWORDS[i], KEYWORDS[j]);
            }
        }
    }

    /// A fresh `Keywords` table built per `Parser::new` call must agree with
    /// one built earlier against the same interner: re-interning `function`
    /// for a second parser in the same REPL session must not mint a new slot.
    #[test]
    fn rebuilding_a_keyword_table_against_the_same_interner_is_idempotent() {
        let mut interner = Interner::new();
        let first_pass: Vec<Symbol> = KEYWORDS.iter().map(|k| interner.intern(k)).collect();
        let second_pass: Vec<Symbol> = KEYWORDS.iter().map(|k| interner.intern(k)).collect();
        assert_eq!(first_pass, second_pass);
    }

    /// Mirrors `cli.rs`'s synthesized `main()` lookup: finding a name a
    /// program already declared must not intern a fresh, unbound symbol for
    /// a typo'd name that was never actually declared.
    #[test]
    fn lookup_distinguishes_a_declared_name_from_an_undeclared_one() {
        let mut interner = Interner::new();
        interner.intern("main");
        assert!(interner.lookup("main").is_some());
        assert!(interner.lookup("mian").is_none());
    }

    /// The resolver's block attribute tables key on `Symbol` in a `HashMap`;
    /// two occurrences of the same identifier in different statements must
    /// hash/compare equal so `let x = 1;` followed by a later `x` resolves
    /// to the same local slot.
    #[test]
    fn symbol_is_usable_as_a_hash_map_key_across_occurrences() {
        let mut interner = Interner::new();
        let mut locals: HashMap<Symbol, i32> = HashMap::new();
        let decl = interner.intern("x");
        locals.insert(decl, 0);
        let reference = interner.intern("x");
        assert_eq!(locals.get(&reference), Some(&0));
    }

    /// `resolve.rs::name_of` resolves a `Symbol` back to its source text
    /// purely to build a `NoSuchName`/`DuplicatedLocalName` message.
    #[test]
    fn resolve_recovers_the_identifier_text_for_error_messages() {
        let mut interner = Interner::new();
        let sym = interner.intern("counter");
        assert_eq!(interner.resolve(sym), "counter");
    }

    #[test]
    fn empty_symbol_resolves_to_empty_string() {
        let interner = Interner::new();
        assert_eq!(interner.resolve(Symbol::EMPTY), "");
    }
}
