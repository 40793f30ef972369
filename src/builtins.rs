//! Arithmetic, comparison and subscript operations over [`Value`].
//!
//! These are plain functions rather than methods on `Evaluator` because they
//! only need an arena to allocate their result in, not the rest of the
//! evaluator's state.

use crate::arena::Arena;
use crate::error::JBError;
use crate::span::Span;
use crate::value::Value;

fn as_f64(v: &Value) -> Result<f64, JBError> {
    match v {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(f) => Ok(*f),
        other => Err(JBError::new(format!("type error: expected number, found {}", other.type_name()))),
    }
}

/// IEEE remainder: the reference interpreter's float `%` is `std::remainder`,
/// which rounds the quotient to the nearest integer rather than truncating
/// (that distinguishes it from Rust's `%` and from `f64::rem_euclid`).
fn ieee_remainder(x: f64, y: f64) -> f64 {
    let quotient = (x / y).round();
    x - quotient * y
}

pub fn add<'a>(arena: &'a Arena<Value<'a>>, lhs: &'a Value<'a>, rhs: &'a Value<'a>, span: Span) -> Result<&'a Value<'a>, JBError> {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Ok(arena.alloc(Value::Str(format!("{}{}", a, b)))),
        (Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().copied());
            Ok(arena.alloc(Value::List(std::cell::RefCell::new(items))))
        }
        (Value::Int(a), Value::Int(b)) => Ok(arena.alloc(Value::Int(a + b))),
        _ => {
            let a = as_f64(lhs).map_err(|e| span_err(e, span))?;
            let b = as_f64(rhs).map_err(|e| span_err(e, span))?;
            Ok(arena.alloc(Value::Float(a + b)))
        }
    }
}

pub fn sub<'a>(arena: &'a Arena<Value<'a>>, lhs: &'a Value<'a>, rhs: &'a Value<'a>, span: Span) -> Result<&'a Value<'a>, JBError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(arena.alloc(Value::Int(a - b))),
        _ => {
            let a = as_f64(lhs).map_err(|e| span_err(e, span))?;
            let b = as_f64(rhs).map_err(|e| span_err(e, span))?;
            Ok(arena.alloc(Value::Float(a - b)))
        }
    }
}

pub fn mul<'a>(arena: &'a Arena<Value<'a>>, lhs: &'a Value<'a>, rhs: &'a Value<'a>, span: Span) -> Result<&'a Value<'a>, JBError> {
    match (lhs, rhs) {
        (Value::List(items), Value::Int(n)) | (Value::Int(n), Value::List(items)) => {
            let src = items.borrow();
            let mut out = Vec::new();
            if *n > 0 {
                for _ in 0..*n {
                    out.extend(src.iter().copied());
                }
            }
            Ok(arena.alloc(Value::List(std::cell::RefCell::new(out))))
        }
        (Value::Int(a), Value::Int(b)) => Ok(arena.alloc(Value::Int(a * b))),
        _ => {
            let a = as_f64(lhs).map_err(|e| span_err(e, span))?;
            let b = as_f64(rhs).map_err(|e| span_err(e, span))?;
            Ok(arena.alloc(Value::Float(a * b)))
        }
    }
}

pub fn div<'a>(arena: &'a Arena<Value<'a>>, lhs: &'a Value<'a>, rhs: &'a Value<'a>, span: Span) -> Result<&'a Value<'a>, JBError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => {
            if *b == 0 {
                Err(JBError::at("arithmetic error: zero division", span))
            } else {
                Ok(arena.alloc(Value::Int(a / b)))
            }
        }
        _ => {
            let a = as_f64(lhs).map_err(|e| span_err(e, span))?;
            let b = as_f64(rhs).map_err(|e| span_err(e, span))?;
            Ok(arena.alloc(Value::Float(a / b)))
        }
    }
}

pub fn rem<'a>(arena: &'a Arena<Value<'a>>, lhs: &'a Value<'a>, rhs: &'a Value<'a>, span: Span) -> Result<&'a Value<'a>, JBError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => {
            if *b == 0 {
                Err(JBError::at("arithmetic error: zero remainder", span))
            } else {
                Ok(arena.alloc(Value::Int(a % b)))
            }
        }
        _ => {
            let a = as_f64(lhs).map_err(|e| span_err(e, span))?;
            let b = as_f64(rhs).map_err(|e| span_err(e, span))?;
            Ok(arena.alloc(Value::Float(ieee_remainder(a, b))))
        }
    }
}

pub fn neg<'a>(arena: &'a Arena<Value<'a>>, v: &'a Value<'a>, span: Span) -> Result<&'a Value<'a>, JBError> {
    match v {
        Value::Int(n) => Ok(arena.alloc(Value::Int(-n))),
        Value::Float(f) => Ok(arena.alloc(Value::Float(-f))),
        other => Err(JBError::at(format!("type error: expected number, found {}", other.type_name()), span)),
    }
}

pub fn pos<'a>(v: &'a Value<'a>, span: Span) -> Result<&'a Value<'a>, JBError> {
    match v {
        Value::Int(_) | Value::Float(_) => Ok(v),
        other => Err(JBError::at(format!("type error: expected number, found {}", other.type_name()), span)),
    }
}

macro_rules! cmp_op {
    ($name:ident, $op:tt) => {
        pub fn $name<'a>(arena: &'a Arena<Value<'a>>, lhs: &'a Value<'a>, rhs: &'a Value<'a>, span: Span) -> Result<&'a Value<'a>, JBError> {
            let a = as_f64(lhs).map_err(|e| span_err(e, span))?;
            let b = as_f64(rhs).map_err(|e| span_err(e, span))?;
            Ok(arena.alloc(Value::Bool(a $op b)))
        }
    };
}

cmp_op!(lt, <);
cmp_op!(le, <=);
cmp_op!(gt, >);
cmp_op!(ge, >=);

pub fn eq<'a>(arena: &'a Arena<Value<'a>>, lhs: &'a Value<'a>, rhs: &'a Value<'a>) -> &'a Value<'a> {
    arena.alloc(Value::Bool(lhs.eq(rhs)))
}

pub fn ne<'a>(arena: &'a Arena<Value<'a>>, lhs: &'a Value<'a>, rhs: &'a Value<'a>) -> &'a Value<'a> {
    arena.alloc(Value::Bool(!lhs.eq(rhs)))
}

pub fn getitem<'a>(base: &'a Value<'a>, offset: &'a Value<'a>, span: Span) -> Result<&'a Value<'a>, JBError> {
    let list = match base {
        Value::List(items) => items,
        other => return Err(JBError::at(format!("type error: expected list, found {}", other.type_name()), span)),
    };
    let index = match offset {
        Value::Int(n) => *n,
        other => return Err(JBError::at(format!("type error: indices must be int, found {}", other.type_name()), span)),
    };
    let items = list.borrow();
    if index < 0 || index as usize >= items.len() {
        return Err(JBError::at(format!("index error: length={}, index={}", items.len(), index), span));
    }
    Ok(items[index as usize])
}

pub fn setitem<'a>(base: &'a Value<'a>, offset: &'a Value<'a>, value: &'a Value<'a>, span: Span) -> Result<&'a Value<'a>, JBError> {
    let list = match base {
        Value::List(items) => items,
        other => return Err(JBError::at(format!("type error: expected list, found {}", other.type_name()), span)),
    };
    let index = match offset {
        Value::Int(n) => *n,
        other => return Err(JBError::at(format!("type error: indices must be int, found {}", other.type_name()), span)),
    };
    let mut items = list.borrow_mut();
    if index < 0 || index as usize >= items.len() {
        return Err(JBError::at(format!("index error: length={}, index={}", items.len(), index), span));
    }
    items[index as usize] = value;
    Ok(value)
}

fn span_err(err: JBError, span: Span) -> JBError {
    JBError::at(err.message, span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;

    #[test]
    fn add_concatenates_strings() {
        let arena = Arena::new();
        let a = arena.alloc(Value::Str("foo".into()));
        let b = arena.alloc(Value::Str("bar".into()));
        let result = add(&arena, a, b, Span::default()).unwrap();
        assert_eq!(result.repr(), "\"foobar\"");
    }

    #[test]
    fn div_by_zero_int_is_an_error() {
        let arena = Arena::new();
        let a = arena.alloc(Value::Int(1));
        let b = arena.alloc(Value::Int(0));
        assert!(div(&arena, a, b, Span::default()).is_err());
    }

    #[test]
    fn float_mod_uses_ieee_remainder_not_truncation() {
        assert!((ieee_remainder(5.0, 3.0) - (-1.0)).abs() < 1e-9);
    }

    #[test]
    fn list_mul_repeats_elements() {
        let arena = Arena::new();
        let one = arena.alloc(Value::Int(1));
        let list = arena.alloc(Value::List(std::cell::RefCell::new(vec![one])));
        let n = arena.alloc(Value::Int(3));
        let result = mul(&arena, list, n, Span::default()).unwrap();
        assert_eq!(result.repr(), "[1, 1, 1]");
    }

    #[test]
    fn getitem_out_of_range_is_an_index_error() {
        let arena = Arena::new();
        let list = arena.alloc(Value::List(std::cell::RefCell::new(vec![])));
        let idx = arena.alloc(Value::Int(0));
        assert!(getitem(list, idx, Span::default()).is_err());
    }
}
