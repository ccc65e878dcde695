//! String construction, parsing and comparison on NUL-terminated char arrays.
//!
//! Every string a script receives is freshly allocated on the evaluator heap;
//! inputs are only borrowed for the duration of the call.

use aho_corasick::{AhoCorasickBuilder, MatchKind};

use crate::format::{default_format, format_number, Number};
use crate::host::Host;
use crate::marshal::{argc, argc_in, get_int, get_str, get_uint, ExtResult};
use crate::registry::NativeFn;
use crate::value::{Sentinel, Value};

pub const EXTENSIONS: &[(&str, NativeFn)] = &[
    ("str-from-n", str_from_n),
    ("str-merge", str_merge),
    ("str-to-i", str_to_i),
    ("str-to-f", str_to_f),
    ("str-part", str_part),
    ("str-split", str_split),
    ("str-replace", str_replace),
    ("str-to-lower", str_to_lower),
    ("str-to-upper", str_to_upper),
    ("str-cmp", str_cmp),
];

/// Longest string `str-from-n` produces.
pub const NUMBER_TEXT_CAP: usize = 99;

// ── Construction ──────────────────────────────────────────────────────────────

/// `(str-from-n n [format])`, formatting with `%d` or `%f` by default.
fn str_from_n(host: &Host, args: &[Value]) -> ExtResult {
    argc_in(args, 1..=2)?;
    let n = match &args[0] {
        Value::Float(x) => Number::Float(*x),
        v if v.is_number() => Number::Int(v.as_i32().ok_or(Sentinel::Eval)?),
        _ => return Err(Sentinel::Eval),
    };
    let fmt = if args.len() == 2 {
        std::str::from_utf8(get_str(args, 1, Sentinel::Eval)?).map_err(|_| Sentinel::Eval)?
    } else {
        default_format(n)
    };
    let text = format_number(fmt, n).map_err(|_| Sentinel::Eval)?;
    let bytes = text.as_bytes();
    host.alloc_str(&bytes[..bytes.len().min(NUMBER_TEXT_CAP)])
}

/// Concatenate any number of strings.
fn str_merge(host: &Host, args: &[Value]) -> ExtResult {
    let mut out = Vec::new();
    for i in 0..args.len() {
        out.extend_from_slice(get_str(args, i, Sentinel::Eval)?);
    }
    host.alloc_str(&out)
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// C `isspace`.
fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t'..=b'\r')
}

fn digit_value(b: u8) -> Option<u32> {
    char::from(b).to_digit(36)
}

/// `strtol`: leading space, optional sign, then digits in `base`.  Base 0
/// picks 16 for a `0x` prefix, 8 for a leading zero and 10 otherwise.
/// Out-of-range results clamp; an unsupported base gives 0.
fn parse_long(s: &[u8], base: u32) -> i32 {
    let mut s = &s[s.iter().take_while(|&&b| is_space(b)).count()..];
    let negative = match s.first() {
        Some(b'-') => {
            s = &s[1..];
            true
        }
        Some(b'+') => {
            s = &s[1..];
            false
        }
        _ => false,
    };
    let hex_prefix = matches!(s, [b'0', b'x' | b'X', d, ..] if char::from(*d).is_ascii_hexdigit());
    let base = match base {
        0 if hex_prefix => 16,
        0 if s.first() == Some(&b'0') => 8,
        0 => 10,
        2..=36 => base,
        _ => return 0,
    };
    if base == 16 && hex_prefix {
        s = &s[2..];
    }

    let limit = i64::from(i32::MAX) + 1;
    let mut acc: i64 = 0;
    for d in s.iter().map_while(|&b| digit_value(b).filter(|&d| d < base)) {
        acc = (acc * i64::from(base) + i64::from(d)).min(limit);
    }
    if negative {
        (-acc).max(i64::from(i32::MIN)) as i32
    } else {
        acc.min(i64::from(i32::MAX)) as i32
    }
}

/// Length of the longest prefix of `s` that is a decimal float.
fn float_prefix_len(s: &[u8]) -> usize {
    let digits = |from: usize| s[from..].iter().take_while(|b| b.is_ascii_digit()).count();
    let mut i = 0;
    if matches!(s.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    let int_digits = digits(i);
    i += int_digits;
    let mut frac_digits = 0;
    if s.get(i) == Some(&b'.') {
        frac_digits = digits(i + 1);
        if int_digits + frac_digits > 0 {
            i += 1 + frac_digits;
        }
    }
    if int_digits + frac_digits == 0 {
        return 0;
    }
    if matches!(s.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(s.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_digits = digits(j);
        if exp_digits > 0 {
            i = j + exp_digits;
        }
    }
    i
}

/// `strtof`: the longest leading float, `0.0` when there is none.
fn parse_float(s: &[u8]) -> f32 {
    let s = &s[s.iter().take_while(|&&b| is_space(b)).count()..];
    let (sign, body) = match s.first() {
        Some(b'-') => (-1.0, &s[1..]),
        Some(b'+') => (1.0, &s[1..]),
        _ => (1.0, s),
    };
    let lower: Vec<u8> = body.iter().take(3).map(u8::to_ascii_lowercase).collect();
    match lower.as_slice() {
        b"inf" => return sign * f32::INFINITY,
        b"nan" => return f32::NAN,
        _ => {}
    }
    let len = float_prefix_len(s);
    std::str::from_utf8(&s[..len])
        .ok()
        .and_then(|t| t.parse::<f32>().ok())
        .unwrap_or(0.0)
}

/// `(str-to-i s [base])`
fn str_to_i(_host: &Host, args: &[Value]) -> ExtResult {
    argc_in(args, 1..=2)?;
    let s = get_str(args, 0, Sentinel::Eval)?;
    let base = if args.len() == 2 { get_uint(args, 1)? } else { 0 };
    Ok(Value::int(i64::from(parse_long(s, base))))
}

fn str_to_f(_host: &Host, args: &[Value]) -> ExtResult {
    argc(args, 1)?;
    let s = get_str(args, 0, Sentinel::Eval)?;
    Ok(Value::Float(parse_float(s)))
}

// ── Slicing ───────────────────────────────────────────────────────────────────

/// `(str-part s start [n])`: up to `n` characters from `start`, which must
/// lie inside the string.
fn str_part(host: &Host, args: &[Value]) -> ExtResult {
    argc_in(args, 2..=3)?;
    let s = get_str(args, 0, Sentinel::Eval)?;
    let start = get_uint(args, 1)? as usize;
    if start >= s.len() {
        return Err(Sentinel::Eval);
    }
    let mut n = s.len() - start;
    if args.len() == 3 {
        n = n.min(get_uint(args, 2)? as usize);
    }
    host.alloc_str(&s[start..start + n])
}

/// `(str-split s delimiters)` splits at any of the delimiter characters and
/// drops empty pieces; `(str-split s n)` cuts `s` into pieces of `n`
/// characters, the last one possibly shorter.
fn str_split(host: &Host, args: &[Value]) -> ExtResult {
    argc(args, 2)?;
    let s = get_str(args, 0, Sentinel::Eval)?;
    let pieces: Vec<&[u8]> = match get_str(args, 1, Sentinel::Eval) {
        Ok(delims) => s
            .split(|b| delims.contains(b))
            .filter(|piece| !piece.is_empty())
            .collect(),
        Err(_) => {
            let step = get_int(args, 1)?.max(1) as usize;
            s.chunks(step).collect()
        }
    };
    let items = pieces
        .into_iter()
        .map(|piece| host.alloc_str(piece))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::list(items))
}

// ── Transformation ────────────────────────────────────────────────────────────

/// `(str-replace s pattern [replacement])`, replacing every occurrence; the
/// replacement defaults to the empty string.  An empty pattern returns `s`
/// itself.
fn str_replace(host: &Host, args: &[Value]) -> ExtResult {
    argc_in(args, 2..=3)?;
    let orig = get_str(args, 0, Sentinel::Type)?;
    let pattern = get_str(args, 1, Sentinel::Type)?;
    let with: &[u8] = if args.len() == 3 { get_str(args, 2, Sentinel::Type)? } else { b"" };
    if pattern.is_empty() {
        return Ok(args[0].clone());
    }
    let ac = AhoCorasickBuilder::new()
        .match_kind(MatchKind::LeftmostFirst)
        .build([pattern]);
    host.alloc_str(&ac.replace_all_bytes(orig, &[with]))
}

fn map_ascii(host: &Host, args: &[Value], f: fn(&u8) -> u8) -> ExtResult {
    argc(args, 1)?;
    let s = get_str(args, 0, Sentinel::Type)?;
    let out: Vec<u8> = s.iter().map(f).collect();
    host.alloc_str(&out)
}

fn str_to_lower(host: &Host, args: &[Value]) -> ExtResult {
    map_ascii(host, args, u8::to_ascii_lowercase)
}

fn str_to_upper(host: &Host, args: &[Value]) -> ExtResult {
    map_ascii(host, args, u8::to_ascii_uppercase)
}

/// Byte-wise comparison: -1, 0 or 1.
fn str_cmp(_host: &Host, args: &[Value]) -> ExtResult {
    argc(args, 2)?;
    let a = get_str(args, 0, Sentinel::Eval)?;
    let b = get_str(args, 1, Sentinel::Eval)?;
    Ok(Value::Int(a.cmp(b) as i32))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
