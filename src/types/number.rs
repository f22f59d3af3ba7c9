//! Oracle NUMBER encoding and decoding
//!
//! Oracle NUMBER is stored in a variable-length format:
//! - First byte: base-100 exponent, offset by 193, with the sign in the high bit
//! - Subsequent bytes: mantissa digits in base-100
//!
//! For positive numbers mantissa bytes are `value + 1`. For negative numbers
//! the exponent byte is inverted, mantissa bytes are `101 - value` and a
//! trailing 102 byte is appended unless all 20 mantissa positions are used.
//!
//! Values are exchanged with the rest of the crate as decimal text, which is
//! what a NUMBER fetched through the text path looks like.

use crate::error::{Error, Result};

/// Maximum number of decimal digits in an Oracle NUMBER
const MAX_DIGITS: usize = 40;

/// Maximum characters in a number string representation
const MAX_STRING_CHARS: usize = crate::constants::NUMBER_AS_TEXT_CHARS;

/// Exponent byte of a positive number with a base-100 exponent of zero
const EXPONENT_OFFSET: i32 = 193;

/// Negative number terminator
const NEGATIVE_TERMINATOR: u8 = 102;

/// Decoded Oracle NUMBER as a string representation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleNumber {
    /// String representation of the number
    pub value: String,
    /// Whether the number is an integer (no decimal point)
    pub is_integer: bool,
    /// Whether this is the maximum negative value (-1e126)
    pub is_max_negative: bool,
}

impl OracleNumber {
    /// Create a new Oracle number from string representation
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let is_integer = !value.contains(['.', 'e', 'E']);
        Self {
            value,
            is_integer,
            is_max_negative: false,
        }
    }

    /// Get the string value
    pub fn as_str(&self) -> &str {
        if self.is_max_negative {
            "-1e126"
        } else {
            &self.value
        }
    }

    /// Convert to i64, truncating any fractional part
    pub fn to_i64(&self) -> Result<i64> {
        if self.is_max_negative {
            return Err(Error::InvalidNumber(
                "maximum negative Oracle number cannot be represented as i64".to_string(),
            ));
        }
        if self.is_integer {
            return self
                .value
                .parse()
                .map_err(|e| Error::InvalidNumber(format!("{} as i64: {}", self.value, e)));
        }
        let f = self.to_f64()?.trunc();
        if f < i64::MIN as f64 || f >= i64::MAX as f64 {
            return Err(Error::InvalidNumber(format!("{} overflows i64", self.value)));
        }
        Ok(f as i64)
    }

    /// Convert to u64, truncating any fractional part
    pub fn to_u64(&self) -> Result<u64> {
        if self.is_max_negative || self.value.starts_with('-') {
            return Err(Error::InvalidNumber(format!(
                "{} cannot be represented as u64",
                self.as_str()
            )));
        }
        if self.is_integer {
            return self
                .value
                .parse()
                .map_err(|e| Error::InvalidNumber(format!("{} as u64: {}", self.value, e)));
        }
        let f = self.to_f64()?.trunc();
        if f >= u64::MAX as f64 {
            return Err(Error::InvalidNumber(format!("{} overflows u64", self.value)));
        }
        Ok(f as u64)
    }

    /// Convert to f64
    pub fn to_f64(&self) -> Result<f64> {
        if self.is_max_negative {
            return Ok(-1e126);
        }
        self.value
            .parse()
            .map_err(|e| Error::InvalidNumber(format!("{} as f64: {}", self.value, e)))
    }
}

impl std::fmt::Display for OracleNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decode an Oracle NUMBER image into its decimal text form
pub fn decode_oracle_number(data: &[u8]) -> Result<OracleNumber> {
    let (&exponent_byte, rest) = data
        .split_first()
        .ok_or_else(|| Error::InvalidNumber("empty NUMBER image".to_string()))?;
    let is_positive = (exponent_byte & 0x80) != 0;

    // Single byte means zero (positive) or -1e126 (negative)
    if rest.is_empty() {
        if is_positive {
            return Ok(OracleNumber::new("0"));
        }
        return Ok(OracleNumber {
            value: String::new(),
            is_integer: false,
            is_max_negative: true,
        });
    }

    let exponent = if is_positive {
        exponent_byte as i32 - EXPONENT_OFFSET
    } else {
        (!exponent_byte) as i32 - EXPONENT_OFFSET
    };

    let mantissa = match rest.split_last() {
        Some((&NEGATIVE_TERMINATOR, head)) if !is_positive => head,
        _ => rest,
    };

    let mut digits = Vec::with_capacity(MAX_DIGITS);
    for &byte in mantissa {
        let pair = if is_positive {
            byte.checked_sub(1)
        } else {
            101u8.checked_sub(byte)
        };
        let pair = match pair {
            Some(p) if p < 100 => p,
            _ => {
                return Err(Error::InvalidNumber(format!(
                    "mantissa byte {} out of range",
                    byte
                )))
            }
        };
        digits.push(pair / 10);
        digits.push(pair % 10);
    }

    // Position of the decimal point, counted in digits from the start
    let mut decimal_point = (exponent + 1) * 2;
    while digits.first() == Some(&0) {
        digits.remove(0);
        decimal_point -= 1;
    }
    while digits.last() == Some(&0) {
        digits.pop();
    }
    if digits.is_empty() {
        return Ok(OracleNumber::new("0"));
    }

    let mut value = String::with_capacity(MAX_STRING_CHARS);
    if !is_positive {
        value.push('-');
    }

    let is_integer = decimal_point >= digits.len() as i32;
    if decimal_point <= 0 {
        value.push_str("0.");
        for _ in decimal_point..0 {
            value.push('0');
        }
        value.extend(digits.iter().map(|d| char::from(b'0' + d)));
    } else {
        for (i, d) in digits.iter().enumerate() {
            if i as i32 == decimal_point {
                value.push('.');
            }
            value.push(char::from(b'0' + d));
        }
        for _ in digits.len() as i32..decimal_point {
            value.push('0');
        }
    }

    Ok(OracleNumber {
        value,
        is_integer,
        is_max_negative: false,
    })
}

/// Encode a number string to an Oracle NUMBER image
///
/// Accepts an optional sign, integer and fractional digits and an optional
/// decimal exponent (`1.5e10`).
pub fn encode_oracle_number(value: &str) -> Result<Vec<u8>> {
    let value = value.trim();

    if value.is_empty() {
        return Err(Error::InvalidNumber(
            "empty string cannot be encoded as Oracle NUMBER".to_string(),
        ));
    }
    if value.len() > MAX_STRING_CHARS {
        return Err(Error::InvalidNumber(format!(
            "number text longer than {} characters",
            MAX_STRING_CHARS
        )));
    }

    let (is_negative, unsigned) = match value.as_bytes()[0] {
        b'-' => (true, &value[1..]),
        b'+' => (false, &value[1..]),
        _ => (false, value),
    };

    let (mantissa_text, exponent) = match unsigned.find(['e', 'E']) {
        Some(pos) => {
            let exp: i32 = unsigned[pos + 1..]
                .parse()
                .map_err(|_| Error::InvalidNumber(format!("invalid exponent in {}", value)))?;
            (&unsigned[..pos], exp)
        }
        None => (unsigned, 0),
    };

    let (int_part, frac_part) = match mantissa_text.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa_text, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(Error::InvalidNumber(format!("no digits in {}", value)));
    }

    let mut digits = Vec::with_capacity(int_part.len() + frac_part.len());
    for b in int_part.bytes().chain(frac_part.bytes()) {
        if !b.is_ascii_digit() {
            return Err(Error::InvalidNumber(format!(
                "invalid character '{}' in {}",
                char::from(b),
                value
            )));
        }
        digits.push(b - b'0');
    }

    let mut decimal_point = int_part.len() as i32 + exponent;
    while digits.first() == Some(&0) {
        digits.remove(0);
        decimal_point -= 1;
    }
    while digits.last() == Some(&0) {
        digits.pop();
    }

    if digits.is_empty() {
        return Ok(vec![0x80]);
    }
    if digits.len() > MAX_DIGITS {
        return Err(Error::InvalidNumber(format!(
            "{} has more than {} significant digits",
            value, MAX_DIGITS
        )));
    }

    // Align to base-100 pairs
    if decimal_point.rem_euclid(2) == 1 {
        digits.insert(0, 0);
        decimal_point += 1;
    }
    if digits.len() % 2 == 1 {
        digits.push(0);
    }

    let exponent = decimal_point / 2 - 1;
    if !(-65..=62).contains(&exponent) {
        return Err(Error::InvalidNumber(format!(
            "{} out of range for Oracle NUMBER",
            value
        )));
    }

    let exponent_byte = (exponent + EXPONENT_OFFSET) as u8;
    let mut result = Vec::with_capacity(digits.len() / 2 + 2);
    result.push(if is_negative {
        !exponent_byte
    } else {
        exponent_byte
    });

    for pair in digits.chunks(2) {
        let pair_value = pair[0] * 10 + pair[1];
        result.push(if is_negative {
            101 - pair_value
        } else {
            pair_value + 1
        });
    }

    if is_negative && result.len() - 1 < 20 {
        result.push(NEGATIVE_TERMINATOR);
    }

    Ok(result)
}

/// Encode an i64 as an Oracle NUMBER image
pub fn encode_i64(value: i64) -> Result<Vec<u8>> {
    encode_oracle_number(&value.to_string())
}

/// Encode a u64 as an Oracle NUMBER image
pub fn encode_u64(value: u64) -> Result<Vec<u8>> {
    encode_oracle_number(&value.to_string())
}

/// Encode an f64 as an Oracle NUMBER image
pub fn encode_f64(value: f64) -> Result<Vec<u8>> {
    if !value.is_finite() {
        return Err(Error::InvalidNumber(format!(
            "{} cannot be stored in Oracle NUMBER",
            value
        )));
    }
    encode_oracle_number(&value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_zero() {
        let num = decode_oracle_number(&[128]).unwrap();
        assert_eq!(num.value, "0");
        assert!(num.is_integer);
    }

    #[test]
    fn test_decode_positive_integer() {
        // 123: exponent=1, digits=[1,23]
        let num = decode_oracle_number(&[0xc2, 0x02, 0x18]).unwrap();
        assert_eq!(num.value, "123");
        assert!(num.is_integer);
    }

    #[test]
    fn test_decode_negative_integer() {
        // -123: inverted exponent, 101-digits, terminator
        let num = decode_oracle_number(&[0x3d, 0x64, 0x4e, 0x66]).unwrap();
        assert_eq!(num.value, "-123");
    }

    #[test]
    fn test_decode_decimal() {
        // 1.5: exponent=0, digits=[1,50]
        let num = decode_oracle_number(&[0xc1, 0x02, 0x33]).unwrap();
        assert_eq!(num.value, "1.5");
        assert!(!num.is_integer);
    }

    #[test]
    fn test_decode_max_negative() {
        let num = decode_oracle_number(&[0x00]).unwrap();
        assert!(num.is_max_negative);
        assert_eq!(num.to_f64().unwrap(), -1e126);
        assert!(num.to_i64().is_err());
    }

    #[test]
    fn test_decode_rejects_bad_mantissa() {
        assert!(decode_oracle_number(&[]).is_err());
        assert!(decode_oracle_number(&[0xc1, 0x00]).is_err());
    }

    #[test]
    fn test_encode_zero() {
        assert_eq!(encode_oracle_number("0").unwrap(), vec![128]);
        assert_eq!(encode_oracle_number("-0.000").unwrap(), vec![128]);
    }

    #[test]
    fn test_encode_exponent_bytes() {
        assert_eq!(encode_oracle_number("5").unwrap(), vec![0xc1, 0x06]);
        assert_eq!(encode_oracle_number("123").unwrap(), vec![0xc2, 0x02, 0x18]);
        assert_eq!(encode_oracle_number("-5").unwrap(), vec![0x3e, 0x60, 0x66]);
        assert_eq!(encode_oracle_number("100").unwrap(), vec![0xc2, 0x02]);
    }

    #[test]
    fn test_small_fractions_keep_their_scale() {
        for text in ["0.05", "0.5", "0.005", "-0.05", "0.0000123"] {
            let encoded = encode_oracle_number(text).unwrap();
            assert_eq!(decode_oracle_number(&encoded).unwrap().value, text);
        }
    }

    #[test]
    fn test_encode_scientific() {
        let encoded = encode_oracle_number("1.5e10").unwrap();
        assert_eq!(decode_oracle_number(&encoded).unwrap().value, "15000000000");
    }

    #[test]
    fn test_integer_limits() {
        let encoded = encode_i64(i64::MAX).unwrap();
        let num = decode_oracle_number(&encoded).unwrap();
        assert_eq!(num.to_i64().unwrap(), i64::MAX);

        let encoded = encode_u64(u64::MAX).unwrap();
        let num = decode_oracle_number(&encoded).unwrap();
        assert_eq!(num.to_u64().unwrap(), u64::MAX);
    }

    #[test]
    fn test_encode_rejects_garbage() {
        assert!(encode_oracle_number("").is_err());
        assert!(encode_oracle_number("12a").is_err());
        assert!(encode_oracle_number("1e").is_err());
        assert!(encode_oracle_number("1e200").is_err());
        assert!(encode_f64(f64::NAN).is_err());
    }

    #[test]
    fn test_fraction_truncates_to_integer() {
        assert_eq!(OracleNumber::new("12.9").to_i64().unwrap(), 12);
        assert_eq!(OracleNumber::new("-12.9").to_i64().unwrap(), -12);
        assert!(OracleNumber::new("-1").to_u64().is_err());
    }
}
