//! String-to-number coercion rules.
//!
//! Two rules live here and both are part of the HTTP contract:
//!
//! - [`coerce_number`] decides whether a search term is numeric. It accepts the
//!   whole string or nothing: surrounding whitespace is ignored, decimal literals
//!   may carry a sign, a fraction and an exponent, `Infinity` may carry a sign,
//!   and unsigned `0x`/`0o`/`0b` integer literals are accepted. A blank string
//!   coerces to `0`. Anything with trailing junk (`"12abc"`) is not a number, nor
//!   are spellings such as `"inf"` or `"NaN"`.
//! - [`parse_int_prefix`] reads a natural key from a path segment the way
//!   JavaScript's `parseInt` does without a radix. It takes the leading decimal
//!   integer and ignores the rest (`"12abc"` is 12). A `0x`/`0X` prefix switches
//!   to hexadecimal (`"0x1F"` is 31). A segment without leading digits has no
//!   key.

fn is_js_space(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}

/// Coerce a whole string to a number, or `None` if it is not numeric.
#[must_use]
pub fn coerce_number(s: &str) -> Option<f64> {
    let t = s.trim_matches(is_js_space);
    if t.is_empty() {
        return Some(0.0);
    }
    match t {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }
    if let Some(v) = radix_literal(t) {
        return Some(v);
    }
    if is_decimal_literal(t) { t.parse::<f64>().ok() } else { None }
}

/// True when `s` classifies as a number under [`coerce_number`].
#[must_use]
pub fn is_numeric(s: &str) -> bool {
    coerce_number(s).is_some()
}

fn radix_literal(t: &str) -> Option<f64> {
    let bytes = t.as_bytes();
    if bytes.len() < 3 || bytes[0] != b'0' {
        return None;
    }
    let radix = match bytes[1] {
        b'x' | b'X' => 16,
        b'o' | b'O' => 8,
        b'b' | b'B' => 2,
        _ => return None,
    };
    let digits = &t[2..];
    let mut acc = 0f64;
    for c in digits.chars() {
        let d = c.to_digit(radix)?;
        acc = acc * f64::from(radix) + f64::from(d);
    }
    Some(acc)
}

/// `[+-]? (digits [. digits?] | . digits) ([eE] [+-]? digits)?`
fn is_decimal_literal(t: &str) -> bool {
    let b = t.as_bytes();
    let mut i = 0usize;
    if matches!(b.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    let int_start = i;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    let int_digits = i - int_start;
    let mut frac_digits = 0usize;
    if i < b.len() && b[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        frac_digits = i - frac_start;
    }
    if int_digits == 0 && frac_digits == 0 {
        return false;
    }
    if i < b.len() && matches!(b[i], b'e' | b'E') {
        i += 1;
        if i < b.len() && matches!(b[i], b'+' | b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }
    i == b.len()
}

/// Leading integer of `s`, after optional whitespace and sign. Decimal unless
/// prefixed with `0x`/`0X`.
#[must_use]
pub fn parse_int_prefix(s: &str) -> Option<i64> {
    let t = s.trim_start_matches(is_js_space);
    let (neg, rest) = match t.as_bytes().first() {
        Some(b'-') => (true, &t[1..]),
        Some(b'+') => (false, &t[1..]),
        _ => (false, t),
    };
    let (radix, digits) = match rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        Some(hex) => (16, hex),
        None => (10, rest),
    };
    let end = digits.chars().take_while(|c| c.is_digit(radix)).count();
    if end == 0 {
        return None;
    }
    let magnitude = i64::from_str_radix(&digits[..end], radix).ok()?;
    Some(if neg { -magnitude } else { magnitude })
}
