//! Floating-point math and bit-field packing.

use crate::host::Host;
use crate::marshal::{all_numbers, argc_numbers, get_float, get_uint, ExtResult};
use crate::registry::NativeFn;
use crate::value::{Sentinel, Value};

pub const EXTENSIONS: &[(&str, NativeFn)] = &[
    ("sin", sin),
    ("cos", cos),
    ("tan", tan),
    ("asin", asin),
    ("acos", acos),
    ("atan", atan),
    ("atan2", atan2),
    ("pow", pow),
    ("sqrt", sqrt),
    ("log", log),
    ("log10", log10),
    ("deg2rad", deg2rad),
    ("rad2deg", rad2deg),
    ("bits-enc-int", bits_enc_int),
    ("bits-dec-int", bits_dec_int),
];

// ── Float functions ───────────────────────────────────────────────────────────

fn unary(args: &[Value], f: fn(f32) -> f32) -> ExtResult {
    argc_numbers(args, 1)?;
    Ok(Value::Float(f(get_float(args, 0)?)))
}

fn binary(args: &[Value], f: fn(f32, f32) -> f32) -> ExtResult {
    argc_numbers(args, 2)?;
    Ok(Value::Float(f(get_float(args, 0)?, get_float(args, 1)?)))
}

fn sin(_host: &Host, args: &[Value]) -> ExtResult {
    unary(args, f32::sin)
}

fn cos(_host: &Host, args: &[Value]) -> ExtResult {
    unary(args, f32::cos)
}

fn tan(_host: &Host, args: &[Value]) -> ExtResult {
    unary(args, f32::tan)
}

fn asin(_host: &Host, args: &[Value]) -> ExtResult {
    unary(args, f32::asin)
}

fn acos(_host: &Host, args: &[Value]) -> ExtResult {
    unary(args, f32::acos)
}

fn atan(_host: &Host, args: &[Value]) -> ExtResult {
    unary(args, f32::atan)
}

/// `(atan2 y x)`
fn atan2(_host: &Host, args: &[Value]) -> ExtResult {
    binary(args, f32::atan2)
}

fn pow(_host: &Host, args: &[Value]) -> ExtResult {
    binary(args, f32::powf)
}

fn sqrt(_host: &Host, args: &[Value]) -> ExtResult {
    unary(args, f32::sqrt)
}

/// Natural logarithm.
fn log(_host: &Host, args: &[Value]) -> ExtResult {
    unary(args, f32::ln)
}

fn log10(_host: &Host, args: &[Value]) -> ExtResult {
    unary(args, f32::log10)
}

/// One argument converts to a float; several convert to a list.
fn convert_each(args: &[Value], f: fn(f32) -> f32) -> ExtResult {
    all_numbers(args)?;
    let out = args
        .iter()
        .map(|a| a.as_f32().map(|x| Value::Float(f(x))).ok_or(Sentinel::Eval))
        .collect::<Result<Vec<_>, _>>()?;
    match <[Value; 1]>::try_from(out) {
        Ok([one]) => Ok(one),
        Err(many) => Ok(Value::list(many)),
    }
}

fn deg2rad(_host: &Host, args: &[Value]) -> ExtResult {
    convert_each(args, f32::to_radians)
}

fn rad2deg(_host: &Host, args: &[Value]) -> ExtResult {
    convert_each(args, f32::to_degrees)
}

// ── Bit fields ────────────────────────────────────────────────────────────────

/// The mask covering `bits` bits starting at `offset`.
fn field_mask(args: &[Value], offset: usize, bits: usize) -> Result<(u32, u32), Sentinel> {
    let offset = get_uint(args, offset)?;
    let bits = get_uint(args, bits)?;
    if !(1..=32).contains(&bits) || offset.checked_add(bits).map_or(true, |end| end > 32) {
        return Err(Sentinel::Eval);
    }
    Ok(((u32::MAX >> (32 - bits)) << offset, offset))
}

/// `(bits-enc-int initial offset number bits)`: `initial` with the field
/// replaced by the low `bits` bits of `number`.
fn bits_enc_int(_host: &Host, args: &[Value]) -> ExtResult {
    argc_numbers(args, 4)?;
    let initial = get_uint(args, 0)?;
    let number = get_uint(args, 2)?;
    let (mask, offset) = field_mask(args, 1, 3)?;
    let out = (initial & !mask) | ((number << offset) & mask);
    Ok(Value::from_u32(out))
}

/// `(bits-dec-int value offset bits)`
fn bits_dec_int(_host: &Host, args: &[Value]) -> ExtResult {
    argc_numbers(args, 3)?;
    let value = get_uint(args, 0)?;
    let (mask, offset) = field_mask(args, 1, 2)?;
    Ok(Value::from_u32((value & mask) >> offset))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
