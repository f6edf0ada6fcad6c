//! Numeric encoding helpers for wire payloads.
//!
//! Every quantity sent to the peer is a `0x`-prefixed, even-length,
//! lower-case hexadecimal string.

use crate::{Error, Result};

/// Strips any `0x` prefix, lower-cases, left-pads to an even number of
/// digits and re-prefixes.
pub fn sanitize_hex(hex: &str) -> String {
    let hex = hex.strip_prefix("0x").or_else(|| hex.strip_prefix("0X")).unwrap_or(hex);
    let hex = hex.to_ascii_lowercase();
    if hex.is_empty() {
        return String::from("0x");
    }
    if hex.len() % 2 == 0 {
        format!("0x{hex}")
    } else {
        format!("0x0{hex}")
    }
}

pub fn to_sanitized_hex(n: u128) -> String {
    sanitize_hex(&format!("{n:x}"))
}

/// Scales a non-negative decimal string by `10^decimals` without going
/// through floats, e.g. `("20", 9)` -> `20_000_000_000` and
/// `("1.5", 9)` -> `1_500_000_000`.
///
/// Fractional digits beyond the scale would truncate and are rejected.
pub fn shift_decimal(value: &str, decimals: u32) -> Result<u128> {
    let trimmed = value.trim();
    let (int_part, frac_part) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(Error::InvalidDecimal(value.to_owned()));
    }
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return Err(Error::InvalidDecimal(value.to_owned()));
    }
    if frac_part.len() > decimals as usize {
        return Err(Error::InvalidDecimal(value.to_owned()));
    }
    let invalid = || Error::InvalidDecimal(value.to_owned());
    let scale = 10u128.checked_pow(decimals).ok_or_else(invalid)?;
    let int: u128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| invalid())?
    };
    let frac: u128 = if frac_part.is_empty() {
        0
    } else {
        frac_part.parse().map_err(|_| invalid())?
    };
    let frac_scale = 10u128.pow(decimals - frac_part.len() as u32);
    int.checked_mul(scale)
        .and_then(|n| n.checked_add(frac.checked_mul(frac_scale)?))
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn sanitize_pads_to_even_length() {
        assert_eq!(sanitize_hex("4a817c800"), "0x04a817c800");
        assert_eq!(sanitize_hex("0x5208"), "0x5208");
        assert_eq!(sanitize_hex("0xAbC"), "0x0abc");
        assert_eq!(sanitize_hex("5"), "0x05");
        assert_eq!(sanitize_hex(""), "0x");
    }

    #[test]
    fn encode_round_trip() {
        let samples: [u128; 10] = [
            0,
            1,
            5,
            15,
            16,
            255,
            256,
            21_000,
            20_000_000_000,
            u128::MAX,
        ];
        for n in samples {
            let hex = to_sanitized_hex(n);
            assert!(hex.starts_with("0x"), "{hex}");
            let digits = &hex[2..];
            assert_eq!(digits.len() % 2, 0, "{hex} has odd digit count");
            assert_eq!(digits.to_ascii_lowercase(), digits);
            assert_eq!(u128::from_str_radix(digits, 16).unwrap(), n);
        }
    }

    #[test]
    fn shift_whole_numbers() {
        assert_eq!(shift_decimal("20", 9).unwrap(), 20_000_000_000);
        assert_eq!(shift_decimal("0", 9).unwrap(), 0);
        assert_eq!(shift_decimal("21000", 0).unwrap(), 21_000);
    }

    #[test]
    fn shift_fractions() {
        assert_eq!(shift_decimal("1.5", 9).unwrap(), 1_500_000_000);
        assert_eq!(shift_decimal("0.000000001", 9).unwrap(), 1);
        assert_eq!(shift_decimal(".5", 9).unwrap(), 500_000_000);
        assert_eq!(shift_decimal("2.", 9).unwrap(), 2_000_000_000);
    }

    #[test]
    fn shift_rejects_garbage() {
        assert_matches!(shift_decimal("abc", 9), Err(Error::InvalidDecimal(_)));
        assert_matches!(shift_decimal("", 9), Err(Error::InvalidDecimal(_)));
        assert_matches!(shift_decimal(".", 9), Err(Error::InvalidDecimal(_)));
        assert_matches!(shift_decimal("-1", 9), Err(Error::InvalidDecimal(_)));
        // would truncate
        assert_matches!(shift_decimal("1.0000000001", 9), Err(Error::InvalidDecimal(_)));
    }
}
