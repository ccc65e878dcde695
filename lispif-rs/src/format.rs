//! printf-style rendering of a single number.
//!
//! A format string is literal text, `%%` escapes and at most one conversion
//! of the form `%[flags][width][.precision]conv` with flags from `-+ #0` and
//! `conv` one of `d i o u x X f F e E g G c`.  The conversion decides how the
//! number is read: integer conversions truncate floats toward zero and float
//! conversions widen integers.  Output follows C conventions, so exponents
//! always carry a sign and at least two digits.

use std::fmt;
use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Width and precision are clamped to this many characters.
pub const MAX_FIELD: usize = 256;

/// The number being formatted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i32),
    Float(f32),
}

impl Number {
    fn to_i64(self) -> i64 {
        match self {
            Number::Int(n) => i64::from(n),
            Number::Float(x) => x as i64,
        }
    }

    fn to_f64(self) -> f64 {
        match self {
            Number::Int(n) => f64::from(n),
            Number::Float(x) => f64::from(x),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FormatError {
    /// A `%` that does not start a recognised conversion.
    BadConversion,
    /// More than one conversion consuming the number.
    ExtraConversion,
    Pattern(regex::Error),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::BadConversion => write!(f, "invalid conversion"),
            FormatError::ExtraConversion => write!(f, "more than one conversion"),
            FormatError::Pattern(e) => write!(f, "conversion pattern: {e}"),
        }
    }
}

impl std::error::Error for FormatError {}

// ── Directives ────────────────────────────────────────────────────────────────

fn conversion_re() -> Result<&'static Regex, FormatError> {
    static RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"%([-+ #0]*)(\d*)(?:\.(\d*))?([diouxXfFeEgGc%])"))
        .as_ref()
        .map_err(|e| FormatError::Pattern(e.clone()))
}

#[derive(Debug, Default)]
struct Directive {
    left: bool,
    plus: bool,
    space: bool,
    alt: bool,
    zero: bool,
    width: usize,
    precision: Option<usize>,
    conv: char,
}

/// Empty digits read as zero; anything too large for `usize` clamps.
fn field(s: &str) -> usize {
    if s.is_empty() {
        return 0;
    }
    s.parse::<usize>().map_or(MAX_FIELD, |n| n.min(MAX_FIELD))
}

impl Directive {
    fn from_captures(caps: &Captures<'_>) -> Self {
        let mut dir = Directive::default();
        for c in caps.get(1).map_or("", |m| m.as_str()).chars() {
            match c {
                '-' => dir.left = true,
                '+' => dir.plus = true,
                ' ' => dir.space = true,
                '#' => dir.alt = true,
                _ => dir.zero = true,
            }
        }
        dir.width = caps.get(2).map_or(0, |m| field(m.as_str()));
        // A bare "." means precision zero.
        dir.precision = caps.get(3).map(|m| field(m.as_str()));
        dir.conv = caps.get(4).and_then(|m| m.as_str().chars().next()).unwrap_or('%');
        dir
    }

    fn sign(&self, negative: bool) -> &'static str {
        if negative {
            "-"
        } else if self.plus {
            "+"
        } else if self.space {
            " "
        } else {
            ""
        }
    }

    fn render(&self, n: Number) -> String {
        match self.conv {
            'd' | 'i' => {
                let v = n.to_i64();
                let digits = self.int_digits(v.unsigned_abs().to_string());
                self.pad(self.sign(v < 0), "", &digits, self.precision.is_none())
            }
            'u' | 'o' | 'x' | 'X' => {
                let v = n.to_i64() as u32;
                let raw = match self.conv {
                    'u' => v.to_string(),
                    'o' => format!("{v:o}"),
                    'x' => format!("{v:x}"),
                    _ => format!("{v:X}"),
                };
                let mut digits = self.int_digits(raw);
                let prefix = match self.conv {
                    'x' if self.alt && v != 0 => "0x",
                    'X' if self.alt && v != 0 => "0X",
                    _ => "",
                };
                if self.conv == 'o' && self.alt && !digits.starts_with('0') {
                    digits.insert(0, '0');
                }
                self.pad("", prefix, &digits, self.precision.is_none())
            }
            'c' => {
                let c = char::from(n.to_i64() as u8);
                self.pad("", "", &c.to_string(), false)
            }
            _ => self.render_float(n.to_f64()),
        }
    }

    /// Apply an integer precision: minimum digit count, and nothing at all
    /// for zero with precision zero.
    fn int_digits(&self, digits: String) -> String {
        match self.precision {
            Some(0) if digits == "0" => String::new(),
            Some(p) if digits.len() < p => format!("{}{digits}", "0".repeat(p - digits.len())),
            _ => digits,
        }
    }

    fn render_float(&self, x: f64) -> String {
        let upper = self.conv.is_ascii_uppercase();
        if !x.is_finite() {
            let word = match (x.is_nan(), upper) {
                (true, false) => "nan",
                (true, true) => "NAN",
                (false, false) => "inf",
                (false, true) => "INF",
            };
            let negative = !x.is_nan() && x < 0.0;
            return self.pad(self.sign(negative), "", word, false);
        }
        let a = x.abs();
        let prec = self.precision.unwrap_or(6);
        let body = match self.conv {
            'f' | 'F' => {
                let mut s = format!("{a:.prec$}");
                if self.alt && prec == 0 {
                    s.push('.');
                }
                s
            }
            'e' | 'E' => exp_form(a, prec, self.alt, upper),
            _ => self.general_form(a, upper),
        };
        self.pad(self.sign(x.is_sign_negative()), "", &body, true)
    }

    /// `%g`: fixed or exponent form, whichever C would pick, with trailing
    /// zeros removed unless `#` is given.
    fn general_form(&self, a: f64, upper: bool) -> String {
        let p = match self.precision {
            None => 6,
            Some(0) => 1,
            Some(p) => p,
        };
        let exp = if a == 0.0 { 0 } else { decimal_exponent(a, p - 1) };
        let s = if exp < -4 || exp >= p as i32 {
            exp_form(a, p - 1, self.alt, upper)
        } else {
            let frac = (p as i32 - 1 - exp).max(0) as usize;
            let mut s = format!("{a:.frac$}");
            if self.alt && frac == 0 {
                s.push('.');
            }
            s
        };
        if self.alt {
            s
        } else {
            strip_fraction_zeros(&s)
        }
    }

    fn pad(&self, sign: &str, prefix: &str, body: &str, zero_ok: bool) -> String {
        let len = sign.len() + prefix.len() + body.len();
        let fill = self.width.saturating_sub(len);
        if fill == 0 {
            format!("{sign}{prefix}{body}")
        } else if self.left {
            format!("{sign}{prefix}{body}{}", " ".repeat(fill))
        } else if self.zero && zero_ok {
            format!("{sign}{prefix}{}{body}", "0".repeat(fill))
        } else {
            format!("{}{sign}{prefix}{body}", " ".repeat(fill))
        }
    }
}

/// The power of ten `a` shows after rounding to `prec` fraction digits in
/// exponent form.
fn decimal_exponent(a: f64, prec: usize) -> i32 {
    let s = format!("{a:.prec$e}");
    s.split_once('e')
        .and_then(|(_, e)| e.parse::<i32>().ok())
        .unwrap_or(0)
}

/// `d.ddde±XX`
fn exp_form(a: f64, prec: usize, alt: bool, upper: bool) -> String {
    let s = format!("{a:.prec$e}");
    let (mantissa, exp) = s.split_once('e').unwrap_or((s.as_str(), "0"));
    let exp = exp.parse::<i32>().unwrap_or(0);
    let mut out = String::from(mantissa);
    if alt && prec == 0 {
        out.push('.');
    }
    out.push(if upper { 'E' } else { 'e' });
    out.push(if exp < 0 { '-' } else { '+' });
    out.push_str(&format!("{:02}", exp.unsigned_abs()));
    out
}

/// Drop trailing zeros after a decimal point, and the point itself if
/// nothing follows it, leaving any exponent in place.
fn strip_fraction_zeros(s: &str) -> String {
    let (num, exp) = match s.find(|c| c == 'e' || c == 'E') {
        Some(i) => s.split_at(i),
        None => (s, ""),
    };
    if !num.contains('.') {
        return s.to_string();
    }
    let num = num.trim_end_matches('0').trim_end_matches('.');
    format!("{num}{exp}")
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn literal(text: &str, out: &mut String) -> Result<(), FormatError> {
    if text.contains('%') {
        return Err(FormatError::BadConversion);
    }
    out.push_str(text);
    Ok(())
}

/// Render `n` through the printf-style format `fmt`.
pub fn format_number(fmt: &str, n: Number) -> Result<String, FormatError> {
    let re = conversion_re()?;
    let mut out = String::new();
    let mut consumed = false;
    let mut last = 0;
    for caps in re.captures_iter(fmt) {
        let Some(whole) = caps.get(0) else { continue };
        literal(&fmt[last..whole.start()], &mut out)?;
        last = whole.end();
        let dir = Directive::from_captures(&caps);
        if dir.conv == '%' {
            out.push('%');
            continue;
        }
        if consumed {
            return Err(FormatError::ExtraConversion);
        }
        consumed = true;
        out.push_str(&dir.render(n));
    }
    literal(&fmt[last..], &mut out)?;
    Ok(out)
}

/// The conversion used when no format string is given.
pub fn default_format(n: Number) -> &'static str {
    match n {
        Number::Int(_) => "%d",
        Number::Float(_) => "%f",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
