//! Argument validation and extraction for extension bodies.
//!
//! Every helper returns `Err(Sentinel)` on a mismatch so that extension code
//! can validate with `?` before issuing any side effect.  Nothing here keeps
//! a borrow into a script value past the call that produced it.

use std::borrow::Cow;
use std::ops::RangeInclusive;

use crate::symbol::SymbolId;
use crate::value::{ElementKind, Sentinel, Value};

/// What an extension body returns; the registry flattens the error side into
/// a sentinel value.
pub type ExtResult = Result<Value, Sentinel>;

/// Most bytes `send-data` takes from a list.
pub const SEND_DATA_CAP: usize = 20;
/// Most bytes `uart-write` takes from a list.
pub const UART_WRITE_CAP: usize = 20;
/// Payload size of a classic CAN frame.
pub const CAN_FRAME_CAP: usize = 8;

// ── Arity and type checks ─────────────────────────────────────────────────────

/// Exactly `n` arguments.
pub fn argc(args: &[Value], n: usize) -> Result<(), Sentinel> {
    if args.len() == n {
        Ok(())
    } else {
        Err(Sentinel::Eval)
    }
}

pub fn argc_in(args: &[Value], range: RangeInclusive<usize>) -> Result<(), Sentinel> {
    if range.contains(&args.len()) {
        Ok(())
    } else {
        Err(Sentinel::Eval)
    }
}

/// Every argument is a number.
pub fn all_numbers(args: &[Value]) -> Result<(), Sentinel> {
    if args.iter().all(Value::is_number) {
        Ok(())
    } else {
        Err(Sentinel::Eval)
    }
}

/// Exactly `n` arguments, all numbers.
pub fn argc_numbers(args: &[Value], n: usize) -> Result<(), Sentinel> {
    argc(args, n)?;
    all_numbers(args)
}

// ── Scalars ───────────────────────────────────────────────────────────────────

fn number(args: &[Value], idx: usize) -> Result<&Value, Sentinel> {
    args.get(idx).filter(|v| v.is_number()).ok_or(Sentinel::Eval)
}

/// Integer argument; floats truncate toward zero.
pub fn get_int(args: &[Value], idx: usize) -> Result<i32, Sentinel> {
    number(args, idx)?.as_i32().ok_or(Sentinel::Eval)
}

/// Unsigned argument; negative integers keep their bit pattern.
pub fn get_uint(args: &[Value], idx: usize) -> Result<u32, Sentinel> {
    number(args, idx)?.as_u32().ok_or(Sentinel::Eval)
}

pub fn get_float(args: &[Value], idx: usize) -> Result<f32, Sentinel> {
    number(args, idx)?.as_f32().ok_or(Sentinel::Eval)
}

/// Number read as a boolean: zero is false.
pub fn get_flag(args: &[Value], idx: usize) -> Result<bool, Sentinel> {
    number(args, idx)?.as_bool().ok_or(Sentinel::Eval)
}

pub fn get_symbol(args: &[Value], idx: usize) -> Result<SymbolId, Sentinel> {
    args.get(idx).and_then(Value::symbol).ok_or(Sentinel::Eval)
}

/// Zero-based index checked against a runtime bound: `0..bound`.
pub fn get_index(args: &[Value], idx: usize, bound: usize) -> Result<usize, Sentinel> {
    let n = get_int(args, idx)?;
    usize::try_from(n)
        .ok()
        .filter(|&i| i < bound)
        .ok_or(Sentinel::Eval)
}

// ── Strings and buffers ───────────────────────────────────────────────────────

/// The bytes of a NUL-terminated char array, up to the terminator.
///
/// `err` is the sentinel reported when the argument is missing or not a
/// string; call sites differ.
pub fn get_str(args: &[Value], idx: usize, err: Sentinel) -> Result<&[u8], Sentinel> {
    args.get(idx)
        .and_then(Value::array)
        .and_then(|a| a.c_str())
        .ok_or(err)
}

/// A byte buffer from a byte array or a list of numbers.
///
/// Byte arrays are borrowed whole.  Lists are copied element by element and
/// stop silently after `cap` bytes; each element keeps its low eight bits.
/// `nil` is the empty list.
pub fn get_bytes(v: &Value, cap: usize) -> Result<Cow<'_, [u8]>, Sentinel> {
    match v {
        Value::Array(a) if a.kind() == ElementKind::Byte => Ok(Cow::Borrowed(a.bytes())),
        Value::Nil | Value::Cons(_) => {
            let mut out = Vec::with_capacity(cap);
            for elem in v.iter_list() {
                if out.len() == cap {
                    break;
                }
                let n = elem.as_u32().ok_or(Sentinel::Eval)?;
                out.push(n as u8);
            }
            Ok(Cow::Owned(out))
        }
        _ => Err(Sentinel::Eval),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(ns: &[i32]) -> Value {
        Value::list(ns.iter().map(|&n| Value::Int(n)).collect::<Vec<_>>())
    }

    #[test]
    fn arity_checks() {
        let args = [Value::Int(1), Value::Float(2.0)];
        assert!(argc(&args, 2).is_ok());
        assert_eq!(argc(&args, 1), Err(Sentinel::Eval));
        assert!(argc_in(&args, 1..=3).is_ok());
        assert_eq!(argc_in(&args, 3..=4), Err(Sentinel::Eval));
        assert!(argc_numbers(&args, 2).is_ok());
        assert_eq!(argc_numbers(&[Value::Nil], 1), Err(Sentinel::Eval));
    }

    #[test]
    fn char_counts_as_number() {
        assert!(all_numbers(&[Value::Char(b'a'), Value::I32(7)]).is_ok());
        assert_eq!(get_int(&[Value::Char(b'a')], 0), Ok(97));
    }

    #[test]
    fn scalar_extraction() {
        let args = [Value::Float(-3.7), Value::Int(-1), Value::Int(0)];
        assert_eq!(get_int(&args, 0), Ok(-3));
        assert_eq!(get_uint(&args, 1), Ok(u32::MAX));
        assert_eq!(get_float(&args, 1), Ok(-1.0));
        assert_eq!(get_flag(&args, 2), Ok(false));
        assert_eq!(get_flag(&args, 1), Ok(true));
        assert_eq!(get_int(&args, 3), Err(Sentinel::Eval));
        assert_eq!(get_int(&[Value::str("1")], 0), Err(Sentinel::Eval));
    }

    #[test]
    fn index_bounds() {
        let bound = 3;
        assert_eq!(get_index(&[Value::Int(2)], 0, bound), Ok(2));
        assert_eq!(get_index(&[Value::Float(2.0)], 0, bound), Ok(2));
        assert_eq!(get_index(&[Value::Int(3)], 0, bound), Err(Sentinel::Eval));
        assert_eq!(get_index(&[Value::Int(-1)], 0, bound), Err(Sentinel::Eval));
        assert_eq!(get_index(&[Value::Int(0)], 0, 0), Err(Sentinel::Eval));
    }

    #[test]
    fn string_extraction() {
        let args = [Value::str("hello"), Value::bytes(b"hi\0"), Value::Int(1)];
        assert_eq!(get_str(&args, 0, Sentinel::Eval), Ok(&b"hello"[..]));
        assert_eq!(get_str(&args, 1, Sentinel::Type), Err(Sentinel::Type));
        assert_eq!(get_str(&args, 2, Sentinel::Eval), Err(Sentinel::Eval));
        assert_eq!(get_str(&args, 3, Sentinel::Type), Err(Sentinel::Type));
    }

    #[test]
    fn byte_array_is_borrowed_whole() {
        let v = Value::bytes(&[1; 30]);
        let b = get_bytes(&v, 8).unwrap();
        assert!(matches!(b, Cow::Borrowed(_)));
        assert_eq!(b.len(), 30);
    }

    #[test]
    fn list_is_truncated_at_cap() {
        let v = ints(&(0..30).collect::<Vec<_>>());
        let b = get_bytes(&v, SEND_DATA_CAP).unwrap();
        assert_eq!(&*b, &(0..20).map(|n| n as u8).collect::<Vec<_>>()[..]);
    }

    #[test]
    fn list_elements_keep_low_byte() {
        let v = Value::list([Value::Int(0x1ff), Value::Float(2.5), Value::Char(b'A')]);
        assert_eq!(&*get_bytes(&v, 8).unwrap(), &[0xff, 2, b'A']);
    }

    #[test]
    fn non_number_element_is_error() {
        let v = Value::list([Value::Int(1), Value::Nil]);
        assert_eq!(get_bytes(&v, 8), Err(Sentinel::Eval));
    }

    #[test]
    fn nil_is_empty_and_others_rejected() {
        assert!(get_bytes(&Value::Nil, 8).unwrap().is_empty());
        assert_eq!(get_bytes(&Value::str("abc"), 8), Err(Sentinel::Eval));
        assert_eq!(get_bytes(&Value::Int(3), 8), Err(Sentinel::Eval));
    }
}
