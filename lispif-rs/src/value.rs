//! Script values as seen from the native side of the bridge.
//!
//! The evaluator hands extensions a slice of tagged values and expects exactly
//! one tagged value back.  Cons cells and arrays are shared and immutable once
//! built; extensions only borrow into them for the duration of a call.

use std::fmt;
use std::sync::Arc;

use crate::symbol::SymbolId;

/// Largest integer that fits the compact (28-bit) integer encoding.
pub const SMALL_INT_MAX: i64 = (1 << 27) - 1;
/// Smallest integer that fits the compact (28-bit) integer encoding.
pub const SMALL_INT_MIN: i64 = -(1 << 27);

// ── Error sentinels ───────────────────────────────────────────────────────────

/// The three script-visible error values.
///
/// Extensions return these as ordinary values; they end the current call and
/// affect nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentinel {
    /// Argument count or usage violation.
    Eval,
    /// Wrong runtime type.
    Type,
    /// Managed-heap allocation failed.
    Memory,
}

impl Sentinel {
    pub fn name(self) -> &'static str {
        match self {
            Sentinel::Eval => "eval_error",
            Sentinel::Type => "type_error",
            Sentinel::Memory => "out_of_memory",
        }
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::error::Error for Sentinel {}

// ── Arrays ────────────────────────────────────────────────────────────────────

/// Element type of a script array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Byte,
    /// Character array; strings are char arrays carrying a NUL terminator.
    Char,
    I32,
    U32,
    Float,
}

impl ElementKind {
    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            ElementKind::Byte | ElementKind::Char => 1,
            ElementKind::I32 | ElementKind::U32 | ElementKind::Float => 4,
        }
    }
}

/// A script array: element kind plus its raw storage.
#[derive(Debug, PartialEq)]
pub struct Array {
    pub(crate) kind: ElementKind,
    pub(crate) data: Box<[u8]>,
}

impl Array {
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Raw storage.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len() / self.kind.size()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The bytes of a char array up to its first NUL, or all of them when no
    /// terminator is present.  `None` for any other element kind.
    pub fn text(&self) -> Option<&[u8]> {
        if self.kind != ElementKind::Char {
            return None;
        }
        let end = self.data.iter().position(|&b| b == 0).unwrap_or(self.data.len());
        Some(&self.data[..end])
    }

    /// Like [`text`](Self::text) but requires the NUL terminator.
    pub fn c_str(&self) -> Option<&[u8]> {
        if self.kind != ElementKind::Char {
            return None;
        }
        let end = self.data.iter().position(|&b| b == 0)?;
        Some(&self.data[..end])
    }
}

// ── Value ─────────────────────────────────────────────────────────────────────

/// A dynamically tagged script value.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    True,
    /// Compact integer; always within [`SMALL_INT_MIN`]..=[`SMALL_INT_MAX`]
    /// when built through [`Value::int`].
    Int(i32),
    /// Extended 32-bit integer.
    I32(i32),
    Float(f32),
    Char(u8),
    Symbol(SymbolId),
    Cons(Arc<(Value, Value)>),
    Array(Arc<Array>),
    Error(Sentinel),
}

pub const EVAL_ERROR: Value = Value::Error(Sentinel::Eval);
pub const TYPE_ERROR: Value = Value::Error(Sentinel::Type);
pub const MEMORY_ERROR: Value = Value::Error(Sentinel::Memory);

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // integer width is an encoding detail
            (Value::Int(a) | Value::I32(a), Value::Int(b) | Value::I32(b)) => a == b,
            (Value::Nil, Value::Nil) | (Value::True, Value::True) => true,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Cons(a), Value::Cons(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Sentinel> for Value {
    fn from(s: Sentinel) -> Self {
        Value::Error(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        if b { Value::True } else { Value::Nil }
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(x)
    }
}

impl Value {
    /// Box a signed integer, choosing the compact encoding when it fits.
    /// Values outside the `i32` range wrap.
    pub fn int(n: i64) -> Value {
        if (SMALL_INT_MIN..=SMALL_INT_MAX).contains(&n) {
            Value::Int(n as i32)
        } else {
            Value::I32(n as i32)
        }
    }

    /// Box an unsigned 32-bit result; anything above `2^27 - 1` is stored as
    /// an extended integer carrying the same bit pattern.
    pub fn from_u32(n: u32) -> Value {
        if i64::from(n) > SMALL_INT_MAX {
            Value::I32(n as i32)
        } else {
            Value::Int(n as i32)
        }
    }

    pub fn cons(car: Value, cdr: Value) -> Value {
        Value::Cons(Arc::new((car, cdr)))
    }

    /// Build a proper list.
    pub fn list<I>(items: I) -> Value
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(Value::Nil, |tail, head| Value::cons(head, tail))
    }

    /// A NUL-terminated char array outside any managed heap (literals, tests).
    pub fn str(s: &str) -> Value {
        let mut data = Vec::with_capacity(s.len() + 1);
        data.extend_from_slice(s.as_bytes());
        data.push(0);
        Value::Array(Arc::new(Array {
            kind: ElementKind::Char,
            data: data.into_boxed_slice(),
        }))
    }

    /// A byte array outside any managed heap.
    pub fn bytes(b: &[u8]) -> Value {
        Value::Array(Arc::new(Array {
            kind: ElementKind::Byte,
            data: b.into(),
        }))
    }

    // ── Inspection ────────────────────────────────────────────────────────────

    /// Numbers in the marshaling sense: any integer width, float or char.
    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Value::Int(_) | Value::I32(_) | Value::Float(_) | Value::Char(_)
        )
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::Nil | Value::Cons(_))
    }

    /// Signed integer view; floats truncate toward zero.
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Value::Int(n) | Value::I32(n) => Some(n),
            Value::Float(x) => Some(x as i32),
            Value::Char(c) => Some(i32::from(c)),
            _ => None,
        }
    }

    /// Unsigned view; negative integers are reinterpreted bit for bit.
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Value::Int(n) | Value::I32(n) => Some(n as u32),
            Value::Float(x) => Some(x as u32),
            Value::Char(c) => Some(u32::from(c)),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            Value::Int(n) | Value::I32(n) => Some(n as f32),
            Value::Float(x) => Some(x),
            Value::Char(c) => Some(f32::from(c)),
            _ => None,
        }
    }

    /// Boolean-as-number: zero is false.
    pub fn as_bool(&self) -> Option<bool> {
        self.as_f32().map(|x| x != 0.0)
    }

    pub fn symbol(&self) -> Option<SymbolId> {
        match *self {
            Value::Symbol(id) => Some(id),
            _ => None,
        }
    }

    pub fn array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn sentinel(&self) -> Option<Sentinel> {
        match *self {
            Value::Error(s) => Some(s),
            _ => None,
        }
    }

    pub fn car(&self) -> Option<&Value> {
        match self {
            Value::Cons(cell) => Some(&cell.0),
            _ => None,
        }
    }

    pub fn cdr(&self) -> Option<&Value> {
        match self {
            Value::Cons(cell) => Some(&cell.1),
            _ => None,
        }
    }

    /// Walk the cars of a list.  Stops at the first non-cons tail.
    pub fn iter_list(&self) -> ListIter<'_> {
        ListIter { cur: self }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::True => "t",
            Value::Int(_) => "i",
            Value::I32(_) => "i32",
            Value::Float(_) => "float",
            Value::Char(_) => "char",
            Value::Symbol(_) => "symbol",
            Value::Cons(_) => "cons",
            Value::Array(_) => "array",
            Value::Error(_) => "error",
        }
    }

    // ── Printing ──────────────────────────────────────────────────────────────

    /// Printed representation, resolving symbol ids through `name_of`.
    pub fn render<F>(&self, name_of: &F) -> String
    where
        F: Fn(SymbolId) -> Option<String>,
    {
        let mut out = String::new();
        self.render_into(&mut out, name_of);
        out
    }

    fn render_into<F>(&self, out: &mut String, name_of: &F)
    where
        F: Fn(SymbolId) -> Option<String>,
    {
        use std::fmt::Write;
        match self {
            Value::Nil => out.push_str("nil"),
            Value::True => out.push('t'),
            Value::Int(n) => {
                let _ = write!(out, "{n}");
            }
            Value::I32(n) => {
                let _ = write!(out, "{n}i32");
            }
            Value::Float(x) => {
                let _ = write!(out, "{x:?}f32");
            }
            Value::Char(c) => {
                let _ = write!(out, "\\#{}", char::from(*c));
            }
            Value::Symbol(id) => match name_of(*id) {
                Some(name) => out.push_str(&name),
                None => {
                    let _ = write!(out, "sym#{}", id.raw());
                }
            },
            Value::Cons(_) => {
                out.push('(');
                let mut cur = self;
                let mut first = true;
                while let Value::Cons(cell) = cur {
                    if !first {
                        out.push(' ');
                    }
                    first = false;
                    cell.0.render_into(out, name_of);
                    cur = &cell.1;
                }
                if !matches!(cur, Value::Nil) {
                    out.push_str(" . ");
                    cur.render_into(out, name_of);
                }
                out.push(')');
            }
            Value::Array(a) => match a.kind {
                ElementKind::Char => {
                    let text = a.text().unwrap_or_default();
                    let _ = write!(out, "\"{}\"", String::from_utf8_lossy(text));
                }
                _ => {
                    out.push('[');
                    let parts: Vec<String> = a
                        .bytes()
                        .chunks(a.kind.size())
                        .map(|c| element_string(a.kind, c))
                        .collect();
                    out.push_str(&parts.join(" "));
                    out.push(']');
                }
            },
            Value::Error(s) => out.push_str(s.name()),
        }
    }
}

fn element_string(kind: ElementKind, raw: &[u8]) -> String {
    let word = |r: &[u8]| [r[0], r[1], r[2], r[3]];
    match kind {
        ElementKind::Byte | ElementKind::Char => raw[0].to_string(),
        ElementKind::I32 => i32::from_le_bytes(word(raw)).to_string(),
        ElementKind::U32 => u32::from_le_bytes(word(raw)).to_string(),
        ElementKind::Float => format!("{:?}", f32::from_le_bytes(word(raw))),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&|_| None))
    }
}

/// Iterator returned by [`Value::iter_list`].
pub struct ListIter<'a> {
    cur: &'a Value,
}

impl<'a> Iterator for ListIter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<&'a Value> {
        match self.cur {
            Value::Cons(cell) => {
                self.cur = &cell.1;
                Some(&cell.0)
            }
            _ => None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_picks_compact_encoding_when_it_fits() {
        assert!(matches!(Value::int(SMALL_INT_MAX), Value::Int(_)));
        assert!(matches!(Value::int(SMALL_INT_MIN), Value::Int(_)));
        assert!(matches!(Value::int(SMALL_INT_MAX + 1), Value::I32(_)));
        assert!(matches!(Value::int(SMALL_INT_MIN - 1), Value::I32(_)));
    }

    #[test]
    fn from_u32_boxes_large_values_as_i32() {
        assert!(matches!(Value::from_u32(134_217_727), Value::Int(134_217_727)));
        assert!(matches!(Value::from_u32(134_217_728), Value::I32(134_217_728)));
        assert_eq!(Value::from_u32(u32::MAX).as_u32(), Some(u32::MAX));
    }

    #[test]
    fn integer_equality_ignores_width() {
        assert_eq!(Value::Int(5), Value::I32(5));
        assert_ne!(Value::Int(5), Value::Float(5.0));
    }

    #[test]
    fn float_truncates_toward_zero() {
        assert_eq!(Value::Float(2.9).as_i32(), Some(2));
        assert_eq!(Value::Float(-2.9).as_i32(), Some(-2));
    }

    #[test]
    fn list_builds_proper_list() {
        let l = Value::list([Value::Int(1), Value::Int(2), Value::Int(3)]);
        let items: Vec<_> = l.iter_list().cloned().collect();
        assert_eq!(items, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(Value::list(Vec::new()), Value::Nil);
    }

    #[test]
    fn str_is_nul_terminated_char_array() {
        let v = Value::str("abc");
        let a = v.array().unwrap();
        assert_eq!(a.kind(), ElementKind::Char);
        assert_eq!(a.bytes(), b"abc\0");
        assert_eq!(a.c_str(), Some(&b"abc"[..]));
    }

    #[test]
    fn c_str_requires_terminator() {
        let v = Value::Array(Arc::new(Array {
            kind: ElementKind::Char,
            data: Box::from(&b"abc"[..]),
        }));
        let a = v.array().unwrap();
        assert_eq!(a.c_str(), None);
        assert_eq!(a.text(), Some(&b"abc"[..]));
        assert_eq!(Value::bytes(b"abc").array().unwrap().c_str(), None);
    }

    #[test]
    fn array_len_counts_elements() {
        let v = Value::Array(Arc::new(Array {
            kind: ElementKind::Float,
            data: vec![0u8; 12].into_boxed_slice(),
        }));
        assert_eq!(v.array().unwrap().len(), 3);
    }

    #[test]
    fn render_lists_and_pairs() {
        let l = Value::list([Value::Int(1), Value::str("x")]);
        assert_eq!(l.to_string(), "(1 \"x\")");
        let p = Value::cons(Value::Int(42), Value::bytes(&[1, 2, 3]));
        assert_eq!(p.to_string(), "(42 . [1 2 3])");
        assert_eq!(EVAL_ERROR.to_string(), "eval_error");
    }

    #[test]
    fn render_resolves_symbol_names() {
        let v = Value::Symbol(SymbolId::new(7));
        let named = v.render(&|id: SymbolId| (id.raw() == 7).then(|| "foo".to_string()));
        assert_eq!(named, "foo");
        assert_eq!(v.to_string(), "sym#7");
    }
}
