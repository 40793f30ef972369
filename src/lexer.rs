//! Character-driven tokenizer state machine.
//!
//! Feed one code point at a time with [`Lexer::feed`]; completed tokens queue
//! up and are drained with [`Lexer::pop`]. [`Lexer::is_ready`] reports whether
//! the lexer is between tokens, which the REPL uses to decide when a line of
//! input might be a complete statement.

use std::collections::VecDeque;

use crate::error::TokenizerError;
use crate::intern::Interner;
use crate::span::{Pos, Span};
use crate::token::{Literal, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    Op,
    Str,
    Number,
    Id,
    LineComment,
    BlockComment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StrSub {
    Normal,
    Escape,
    Hex,
    Surrogated,
    SurrogatedEscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumSub {
    Init,
    IntDigit,
    LeadingDot,
    Dotted,
    Exp,
    ExpSigned,
    ExpDigit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockCommentSub {
    Normal,
    Stared,
}

fn escape_for(ch: char) -> Option<char> {
    match ch {
        'b' => Some('\u{8}'),
        'f' => Some('\u{c}'),
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        '"' => Some('"'),
        '\\' => Some('\\'),
        '/' => Some('/'),
        _ => None,
    }
}

fn single_char_op(ch: char) -> Option<TokenKind> {
    match ch {
        '+' => Some(TokenKind::Plus),
        '-' => Some(TokenKind::Minus),
        '*' => Some(TokenKind::Star),
        '/' => Some(TokenKind::Slash),
        '%' => Some(TokenKind::Percent),
        '<' => Some(TokenKind::Less),
        '>' => Some(TokenKind::Great),
        '!' => Some(TokenKind::Not),
        '=' => Some(TokenKind::Assign),
        _ => None,
    }
}

fn double_char_op(combined: &str) -> Option<TokenKind> {
    match combined {
        "<=" => Some(TokenKind::LessEq),
        ">=" => Some(TokenKind::GreatEq),
        "==" => Some(TokenKind::Eq),
        "!=" => Some(TokenKind::NotEq),
        "&&" => Some(TokenKind::And),
        "||" => Some(TokenKind::Or),
        "+=" => Some(TokenKind::PlusAssign),
        "-=" => Some(TokenKind::MinusAssign),
        "*=" => Some(TokenKind::StarAssign),
        "/=" => Some(TokenKind::SlashAssign),
        "%=" => Some(TokenKind::PercentAssign),
        _ => None,
    }
}

fn single_char_token(ch: char) -> Option<TokenKind> {
    match ch {
        '[' => Some(TokenKind::LSquare),
        ']' => Some(TokenKind::RSquare),
        '{' => Some(TokenKind::LBrace),
        '}' => Some(TokenKind::RBrace),
        '(' => Some(TokenKind::LPar),
        ')' => Some(TokenKind::RPar),
        ',' => Some(TokenKind::Comma),
        ';' => Some(TokenKind::Semicolon),
        _ => None,
    }
}

#[derive(Default)]
struct NumberBuf {
    int_digits: String,
    dot_digits: String,
    exp_digits: String,
    has_dot: bool,
    exp_sign: i64,
}

impl NumberBuf {
    fn new() -> Self {
        NumberBuf { exp_sign: 1, ..Default::default() }
    }

    fn to_literal(&self) -> Literal {
        let iv: i64 = self.int_digits.parse().unwrap_or(0);
        let mut fv: f64 = self.int_digits.parse().unwrap_or(0.0);
        if !self.dot_digits.is_empty() {
            let frac: f64 = self.dot_digits.parse().unwrap_or(0.0);
            fv += frac * 10f64.powi(-(self.dot_digits.len() as i32));
        }
        let mut iv = iv;
        if !self.exp_digits.is_empty() {
            let exp: f64 = self.exp_digits.parse::<f64>().unwrap_or(0.0) * self.exp_sign as f64;
            fv *= 10f64.powf(exp);
            iv = ((iv as f64) * 10f64.powf(exp)) as i64;
        }
        if !self.has_dot
            && self.exp_sign > 0
            && fv > i64::MIN as f64
            && fv < i64::MAX as f64
        {
            Literal::Int(iv)
        } else {
            Literal::Float(fv)
        }
    }
}

pub struct Lexer {
    state: State,
    str_sub: StrSub,
    num_sub: NumSub,
    block_sub: BlockCommentSub,

    op1: char,
    str_value: String,
    hex_buf: String,
    last_surrogate: bool,
    num: NumberBuf,
    id_value: String,
    line_cmt_value: String,
    block_cmt_value: String,
    block_cmt_terminate_pos: Pos,

    start_pos: Pos,
    prev_pos: Pos,
    cur_pos: Pos,

    buffer: VecDeque<Token>,
}

impl Lexer {
    pub fn new() -> Self {
        Lexer {
            state: State::Init,
            str_sub: StrSub::Normal,
            num_sub: NumSub::Init,
            block_sub: BlockCommentSub::Normal,
            op1: '\0',
            str_value: String::new(),
            hex_buf: String::new(),
            last_surrogate: false,
            num: NumberBuf::new(),
            id_value: String::new(),
            line_cmt_value: String::new(),
            block_cmt_value: String::new(),
            block_cmt_terminate_pos: Pos::new(),
            start_pos: Pos::new(),
            prev_pos: Pos::new(),
            cur_pos: Pos::new(),
            buffer: VecDeque::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == State::Init
    }

    pub fn pop(&mut self) -> Option<Token> {
        self.buffer.pop_front()
    }

    pub fn feed(&mut self, interner: &mut Interner, ch: char) -> Result<(), TokenizerError> {
        self.prev_pos = self.cur_pos;
        self.cur_pos.advance(ch);
        self.refeed(interner, ch)
    }

    fn refeed(&mut self, interner: &mut Interner, ch: char) -> Result<(), TokenizerError> {
        match self.state {
            State::Init => self.st_init(interner, ch),
            State::Op => self.st_op(interner, ch),
            State::Str => self.st_string(ch),
            State::Number => self.st_number(ch),
            State::Id => self.st_id(interner, ch),
            State::LineComment => self.st_line_comment(ch),
            State::BlockComment => self.st_block_comment(ch),
        }
    }

    fn emit(&mut self, kind: TokenKind, literal: Option<Literal>, span: Span) {
        self.buffer.push_back(Token { kind, literal, span });
    }

    fn unknown_char(&self, ch: char, why: &str) -> TokenizerError {
        TokenizerError::unknown_char(ch, why, Span::new(self.start_pos, self.cur_pos))
    }

    fn st_init(&mut self, interner: &mut Interner, ch: char) -> Result<(), TokenizerError> {
        self.start_pos = self.cur_pos;
        if ch.is_whitespace() {
            Ok(())
        } else if let Some(kind) = single_char_token(ch) {
            self.emit(kind, None, Span::new(self.cur_pos, self.cur_pos));
            Ok(())
        } else if "+-*/%<>=!&|".contains(ch) {
            self.op1 = ch;
            self.state = State::Op;
            Ok(())
        } else if ch == '"' {
            self.state = State::Str;
            self.str_sub = StrSub::Normal;
            Ok(())
        } else if ch == '.' || ch.is_ascii_digit() {
            self.state = State::Number;
            self.num = NumberBuf::new();
            self.num_sub = if ch == '.' { NumSub::LeadingDot } else { NumSub::IntDigit };
            if ch == '.' {
                self.num.has_dot = true;
            } else {
                self.num.int_digits.push(ch);
            }
            Ok(())
        } else if ch == '_' || ch.is_alphabetic() {
            self.state = State::Id;
            self.id_value.clear();
            self.id_value.push(ch);
            let _ = interner;
            Ok(())
        } else {
            Err(self.unknown_char(ch, "unexpected character"))
        }
    }

    fn st_op(&mut self, _interner: &mut Interner, ch: char) -> Result<(), TokenizerError> {
        let mut combined = String::new();
        combined.push(self.op1);
        combined.push(ch);
        if combined == "//" {
            self.state = State::LineComment;
            self.line_cmt_value.clear();
            Ok(())
        } else if combined == "/*" {
            self.state = State::BlockComment;
            self.block_sub = BlockCommentSub::Normal;
            self.block_cmt_value.clear();
            Ok(())
        } else if let Some(kind) = double_char_op(&combined) {
            self.emit(kind, None, Span::new(self.start_pos, self.cur_pos));
            self.state = State::Init;
            Ok(())
        } else if let Some(kind) = single_char_op(self.op1) {
            self.emit(kind, None, Span::new(self.start_pos, self.prev_pos));
            self.state = State::Init;
            self.refeed(_interner, ch)
        } else {
            Err(self.unknown_char(ch, "expected && or ||"))
        }
    }

    fn st_string(&mut self, ch: char) -> Result<(), TokenizerError> {
        match self.str_sub {
            StrSub::Normal => {
                if ch == '"' {
                    let value = std::mem::take(&mut self.str_value);
                    self.emit(
                        TokenKind::String,
                        Some(Literal::Str(value)),
                        Span::new(self.start_pos, self.cur_pos),
                    );
                    self.state = State::Init;
                    Ok(())
                } else if ch == '\\' {
                    self.str_sub = StrSub::Escape;
                    Ok(())
                } else if (ch as u32) < 0x20 {
                    Err(self.unknown_char(ch, "unescaped control character"))
                } else {
                    self.str_value.push(ch);
                    Ok(())
                }
            }
            StrSub::Escape => {
                if let Some(mapped) = escape_for(ch) {
                    self.str_value.push(mapped);
                    self.str_sub = StrSub::Normal;
                    Ok(())
                } else if ch == 'u' {
                    self.hex_buf.clear();
                    self.str_sub = StrSub::Hex;
                    Ok(())
                } else {
                    Err(self.unknown_char(ch, "unknown escape sequence"))
                }
            }
            StrSub::Hex => {
                if self.hex_buf.len() == 4 {
                    let code = u32::from_str_radix(&self.hex_buf, 16).unwrap_or(0);
                    self.hex_buf.clear();
                    let is_high = (0xD800..=0xDBFF).contains(&code);
                    let is_low = (0xDC00..=0xDFFF).contains(&code);
                    let mut next = StrSub::Normal;
                    if self.last_surrogate {
                        if is_low {
                            let hi = self.str_value.pop().map(|c| c as u32).unwrap_or(0);
                            let combined = 0x10000
                                + ((hi - 0xD800) << 10)
                                + (code - 0xDC00);
                            if let Some(c) = char::from_u32(combined) {
                                self.str_value.push(c);
                            }
                        } else {
                            return Err(self.unknown_char(ch, "expected low surrogate"));
                        }
                        self.last_surrogate = false;
                    } else if is_high {
                        self.last_surrogate = true;
                        next = StrSub::Surrogated;
                        // stash the high surrogate unit as a placeholder char via its code point is invalid on its own;
                        // hold it in str_value only once paired, so push a sentinel using the raw u16 value instead.
                        if let Some(c) = char::from_u32(code) {
                            self.str_value.push(c);
                        } else {
                            self.str_value.push('\u{FFFD}');
                        }
                    } else if is_low {
                        return Err(self.unknown_char(ch, "unexpected low surrogate"));
                    } else if let Some(c) = char::from_u32(code) {
                        self.str_value.push(c);
                    }
                    self.str_sub = next;
                    self.refeed_str(ch)
                } else if ch.is_ascii_hexdigit() {
                    self.hex_buf.push(ch.to_ascii_lowercase());
                    Ok(())
                } else {
                    Err(self.unknown_char(ch, "expected hex digit"))
                }
            }
            StrSub::Surrogated => {
                if ch == '\\' {
                    self.str_sub = StrSub::SurrogatedEscape;
                    Ok(())
                } else {
                    Err(self.unknown_char(ch, "expected low surrogate escape"))
                }
            }
            StrSub::SurrogatedEscape => {
                if ch == 'u' {
                    self.hex_buf.clear();
                    self.str_sub = StrSub::Hex;
                    Ok(())
                } else {
                    Err(self.unknown_char(ch, "expected low surrogate escape"))
                }
            }
        }
    }

    fn refeed_str(&mut self, ch: char) -> Result<(), TokenizerError> {
        if self.str_sub == StrSub::Normal || self.str_sub == StrSub::Surrogated {
            let _ = ch;
        }
        Ok(())
    }

    fn st_number(&mut self, ch: char) -> Result<(), TokenizerError> {
        match self.num_sub {
            NumSub::Init => unreachable!("number state entered only via digit or dot"),
            NumSub::IntDigit => {
                if ch.is_ascii_digit() {
                    self.num.int_digits.push(ch);
                    Ok(())
                } else if ch == '.' {
                    self.num.has_dot = true;
                    self.num_sub = NumSub::Dotted;
                    Ok(())
                } else if ch == 'e' || ch == 'E' {
                    self.num_sub = NumSub::Exp;
                    Ok(())
                } else {
                    self.finish_num(ch)
                }
            }
            NumSub::LeadingDot => {
                if ch.is_ascii_digit() {
                    self.num.dot_digits.push(ch);
                    self.num_sub = NumSub::Dotted;
                    Ok(())
                } else {
                    Err(self.unknown_char(ch, "expected digit after decimal point"))
                }
            }
            NumSub::Dotted => {
                if ch.is_ascii_digit() {
                    self.num.dot_digits.push(ch);
                    Ok(())
                } else if ch == 'e' || ch == 'E' {
                    self.num_sub = NumSub::Exp;
                    Ok(())
                } else {
                    self.finish_num(ch)
                }
            }
            NumSub::Exp => {
                if ch == '+' || ch == '-' {
                    self.num.exp_sign = if ch == '-' { -1 } else { 1 };
                    self.num_sub = NumSub::ExpSigned;
                    Ok(())
                } else if ch.is_ascii_digit() {
                    self.num.exp_digits.push(ch);
                    self.num_sub = NumSub::ExpDigit;
                    Ok(())
                } else {
                    Err(self.unknown_char(ch, "expected digit or sign in exponent"))
                }
            }
            NumSub::ExpSigned => {
                if ch.is_ascii_digit() {
                    self.num.exp_digits.push(ch);
                    self.num_sub = NumSub::ExpDigit;
                    Ok(())
                } else {
                    Err(self.unknown_char(ch, "expected digit in exponent"))
                }
            }
            NumSub::ExpDigit => {
                if ch.is_ascii_digit() {
                    self.num.exp_digits.push(ch);
                    Ok(())
                } else {
                    self.finish_num(ch)
                }
            }
        }
    }

    fn finish_num(&mut self, ch: char) -> Result<(), TokenizerError> {
        let literal = self.num.to_literal();
        let kind = match literal {
            Literal::Int(_) => TokenKind::Int,
            _ => TokenKind::Float,
        };
        self.emit(kind, Some(literal), Span::new(self.start_pos, self.prev_pos));
        self.num = NumberBuf::new();
        self.state = State::Init;
        self.refeed_pending_digit_or_dot(ch)
    }

    fn refeed_pending_digit_or_dot(&mut self, ch: char) -> Result<(), TokenizerError> {
        // finish_num is always called from a context with an Interner in scope via feed();
        // re-dispatch through st_init-equivalent handling without needing the interner since
        // the only characters that can follow a number are punctuation, operators, or id starts.
        self.start_pos = self.cur_pos;
        if ch.is_whitespace() {
            self.state = State::Init;
            Ok(())
        } else if let Some(kind) = single_char_token(ch) {
            self.emit(kind, None, Span::new(self.cur_pos, self.cur_pos));
            self.state = State::Init;
            Ok(())
        } else if "+-*/%<>=!&|".contains(ch) {
            self.op1 = ch;
            self.state = State::Op;
            Ok(())
        } else if ch == '.' || ch.is_ascii_digit() {
            self.state = State::Number;
            self.num_sub = if ch == '.' { NumSub::LeadingDot } else { NumSub::IntDigit };
            if ch == '.' {
                self.num.has_dot = true;
            } else {
                self.num.int_digits.push(ch);
            }
            Ok(())
        } else if ch == '_' || ch.is_alphabetic() {
            self.state = State::Id;
            self.id_value.clear();
            self.id_value.push(ch);
            Ok(())
        } else if ch == '"' {
            self.state = State::Str;
            self.str_sub = StrSub::Normal;
            Ok(())
        } else {
            Err(self.unknown_char(ch, "unexpected character"))
        }
    }

    fn st_id(&mut self, interner: &mut Interner, ch: char) -> Result<(), TokenizerError> {
        if ch == '_' || ch.is_alphanumeric() {
            self.id_value.push(ch);
            Ok(())
        } else {
            let sym = interner.intern(&self.id_value);
            self.emit(
                TokenKind::Id,
                Some(Literal::Id(sym)),
                Span::new(self.start_pos, self.prev_pos),
            );
            self.id_value.clear();
            self.state = State::Init;
            self.refeed(interner, ch)
        }
    }

    fn st_line_comment(&mut self, ch: char) -> Result<(), TokenizerError> {
        if ch == '\n' {
            let value = std::mem::take(&mut self.line_cmt_value);
            self.emit(
                TokenKind::Comment,
                Some(Literal::Comment(value)),
                Span::new(self.start_pos, self.prev_pos),
            );
            self.state = State::Init;
            Ok(())
        } else {
            self.line_cmt_value.push(ch);
            Ok(())
        }
    }

    fn st_block_comment(&mut self, ch: char) -> Result<(), TokenizerError> {
        match self.block_sub {
            BlockCommentSub::Normal => {
                if ch == '*' {
                    self.block_sub = BlockCommentSub::Stared;
                    self.block_cmt_terminate_pos = self.prev_pos;
                    Ok(())
                } else {
                    self.block_cmt_value.push(ch);
                    Ok(())
                }
            }
            BlockCommentSub::Stared => {
                if ch == '/' {
                    let value = std::mem::take(&mut self.block_cmt_value);
                    self.emit(
                        TokenKind::Comment,
                        Some(Literal::Comment(value)),
                        Span::new(self.start_pos, self.block_cmt_terminate_pos),
                    );
                    self.state = State::Init;
                    Ok(())
                } else {
                    self.block_sub = BlockCommentSub::Normal;
                    self.block_cmt_value.push('*');
                    self.block_cmt_value.push(ch);
                    Ok(())
                }
            }
        }
    }
}

impl Default for Lexer {
    fn default() -> Self {
        Self::new()
    }
}
