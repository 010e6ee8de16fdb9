//! Base62 codec mapping storage ids to short codes and back.
//!
//! The alphabet order (`0-9`, `a-z`, `A-Z`) is part of the public contract:
//! it fixes the short code produced for every id, so changing it would
//! re-address every existing auto-generated link.

use thiserror::Error;

/// Symbols in digit-value order.
pub const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

const BASE: i64 = ALPHABET.len() as i64;

/// Errors raised by [`encode`] and [`decode`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("invalid codec input: {0}")]
    InvalidInput(String),
}

/// Encodes a non-negative integer as a base62 string.
///
/// `0` encodes to `"0"`; any other value never starts with the zero digit.
///
/// # Errors
///
/// Returns [`CodecError::InvalidInput`] for negative numbers.
///
/// # Examples
///
/// ```
/// use linkrelay::domain::codec::encode;
///
/// assert_eq!(encode(0).unwrap(), "0");
/// assert_eq!(encode(10).unwrap(), "a");
/// assert_eq!(encode(62).unwrap(), "10");
/// ```
pub fn encode(number: i64) -> Result<String, CodecError> {
    if number < 0 {
        return Err(CodecError::InvalidInput(format!(
            "cannot encode negative number {number}"
        )));
    }

    if number == 0 {
        return Ok((ALPHABET[0] as char).to_string());
    }

    let mut n = number;
    let mut digits = Vec::with_capacity(11);
    while n > 0 {
        digits.push(ALPHABET[(n % BASE) as usize]);
        n /= BASE;
    }
    digits.reverse();

    Ok(digits.into_iter().map(char::from).collect())
}

/// Decodes a base62 string produced by [`encode`].
///
/// # Errors
///
/// Returns [`CodecError::InvalidInput`] if the input is empty, contains a
/// character outside [`ALPHABET`], or does not fit in an `i64`.
pub fn decode(encoded: &str) -> Result<i64, CodecError> {
    if encoded.is_empty() {
        return Err(CodecError::InvalidInput(
            "encoded string cannot be empty".to_string(),
        ));
    }

    encoded.chars().try_fold(0i64, |acc, c| {
        let digit = digit_value(c).ok_or_else(|| {
            CodecError::InvalidInput(format!("invalid character in encoded string: {c:?}"))
        })?;

        acc.checked_mul(BASE)
            .and_then(|v| v.checked_add(digit))
            .ok_or_else(|| CodecError::InvalidInput(format!("{encoded:?} overflows i64")))
    })
}

fn digit_value(c: char) -> Option<i64> {
    match c {
        '0'..='9' => Some(c as i64 - '0' as i64),
        'a'..='z' => Some(c as i64 - 'a' as i64 + 10),
        'A'..='Z' => Some(c as i64 - 'A' as i64 + 36),
        _ => None,
    }
}
