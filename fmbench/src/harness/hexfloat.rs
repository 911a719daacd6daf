// Copyright 2025 ToonDB Authors
//
// Licensed under the Apache License, Version 2.0

//! Hexadecimal floating-point literals (`printf("%a")` style).
//!
//! The CPU benchmark prints its timings as `0x1.8p+1`. Both the `0x`
//! prefix and the binary exponent are optional on input, matching what the
//! reporting scripts historically accepted; `inf`/`nan` spellings are
//! accepted as well.

const MANTISSA_BITS: u32 = 52;
const EXPONENT_BIAS: i64 = 1023;

/// Parse a hexadecimal float. Returns `None` on any malformed input.
pub fn parse_hex_f64(input: &str) -> Option<f64> {
    let s = input.trim();
    let (negative, s) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    let lower = s.to_ascii_lowercase();
    let special = match lower.as_str() {
        "inf" | "infinity" => Some(f64::INFINITY),
        "nan" => Some(f64::NAN),
        _ => None,
    };
    if let Some(v) = special {
        return Some(if negative { -v } else { v });
    }

    let body = lower.strip_prefix("0x").unwrap_or(lower.as_str());

    let (digits, exponent) = match body.split_once('p') {
        Some((d, e)) => (d, parse_exponent(e)?),
        None => (body, 0),
    };

    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    // Accumulate up to 60 significant bits; further digits only shift.
    let mut mantissa: u64 = 0;
    let mut shift: i64 = 0;
    let mut sticky = false;
    for c in int_part.chars() {
        let d = c.to_digit(16)? as u64;
        if mantissa >> 56 == 0 {
            mantissa = (mantissa << 4) | d;
        } else {
            shift += 4;
            sticky |= d != 0;
        }
    }
    for c in frac_part.chars() {
        let d = c.to_digit(16)? as u64;
        if mantissa >> 56 == 0 {
            mantissa = (mantissa << 4) | d;
            shift -= 4;
        } else {
            sticky |= d != 0;
        }
    }
    if sticky {
        mantissa |= 1;
    }

    let value = scale_by_pow2(mantissa as f64, exponent.saturating_add(shift));
    Some(if negative { -value } else { value })
}

fn parse_exponent(e: &str) -> Option<i64> {
    let (negative, digits) = match e.as_bytes().first()? {
        b'-' => (true, &e[1..]),
        b'+' => (false, &e[1..]),
        _ => (false, e),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Anything beyond this already over/underflows every f64.
    let magnitude = digits.parse::<i64>().unwrap_or(i64::MAX).min(100_000);
    Some(if negative { -magnitude } else { magnitude })
}

/// `x * 2^exp` without intermediate overflow of the power itself.
fn scale_by_pow2(mut x: f64, mut exp: i64) -> f64 {
    while exp > 1023 {
        x *= pow2(1023);
        exp -= 1023;
        if x.is_infinite() {
            return x;
        }
    }
    while exp < -1022 {
        x *= pow2(-1022);
        exp += 1022;
        if x == 0.0 {
            return x;
        }
    }
    x * pow2(exp as i32)
}

fn pow2(exp: i32) -> f64 {
    f64::from_bits(((exp as i64 + EXPONENT_BIAS) as u64) << MANTISSA_BITS)
}

/// Format a float the way C's `%a` does: `0x1.8p+1`, `-0x1p-3`, `0x0p+0`.
pub fn format_hex_f64(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    let sign = if value.is_sign_negative() { "-" } else { "" };
    if value.is_infinite() {
        return format!("{}inf", sign);
    }

    let bits = value.to_bits();
    let biased = ((bits >> MANTISSA_BITS) & 0x7ff) as i64;
    let fraction = bits & ((1u64 << MANTISSA_BITS) - 1);

    if biased == 0 && fraction == 0 {
        return format!("{}0x0p+0", sign);
    }

    let (lead, exponent) = if biased == 0 {
        (0, 1 - EXPONENT_BIAS)
    } else {
        (1, biased - EXPONENT_BIAS)
    };

    let hex = format!("{:013x}", fraction);
    let hex = hex.trim_end_matches('0');
    if hex.is_empty() {
        format!("{}0x{}p{:+}", sign, lead, exponent)
    } else {
        format!("{}0x{}.{}p{:+}", sign, lead, hex, exponent)
    }
}
