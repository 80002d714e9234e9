//! Stack utilities for script numbers and booleans.
//!
//! Script numbers are sign-magnitude little-endian byte strings, minimally
//! encoded, at most 4 bytes for arithmetic opcodes and 5 bytes inside
//! CHECKLOCKTIMEVERIFY/CHECKSEQUENCEVERIFY.
use crate::script::ScriptError;
use crate::util::{Error, Result};

/// Byte budget for arithmetic script numbers.
pub const NUM_MAX_LEN: usize = 4;
/// Byte budget for locktime/sequence script numbers.
pub const NUM_MAX_LEN_EXTENDED: usize = 5;

/// Pops the top stack item.
///
/// # Errors
/// `ScriptError::InvalidStackOperation` if the stack is empty.
#[inline]
pub fn pop_item(stack: &mut Vec<Vec<u8>>) -> Result<Vec<u8>> {
    stack
        .pop()
        .ok_or(Error::Script(ScriptError::InvalidStackOperation))
}

/// Pops a bool from the stack, decoding the top item.
#[inline]
pub fn pop_bool(stack: &mut Vec<Vec<u8>>) -> Result<bool> {
    let top = pop_item(stack)?;
    Ok(decode_bool(&top))
}

/// Pops an arithmetic number from the stack.
///
/// # Errors
/// - Empty stack.
/// - Item over 4 bytes (`InvalidNumberRange`).
/// - Non-minimal encoding when `require_minimal` (`MinimalData`).
#[inline]
pub fn pop_num(stack: &mut Vec<Vec<u8>>, require_minimal: bool) -> Result<i64> {
    let top = pop_item(stack)?;
    decode_num(&top, require_minimal, NUM_MAX_LEN)
}

/// Decodes a stack item to bool.
///
/// False iff the item is empty or all zero bytes, allowing a 0x80 sign bit
/// on the last byte ("negative zero").
///
/// # Examples
/// ```
/// use veriscript::script::stack::decode_bool;
/// assert_eq!(decode_bool(&[1]), true);
/// assert_eq!(decode_bool(&[0, 0, 128]), false);
/// ```
#[must_use]
#[inline]
pub fn decode_bool(s: &[u8]) -> bool {
    if s.is_empty() {
        return false;
    }
    for &byte in &s[..s.len() - 1] {
        if byte != 0 {
            return true;
        }
    }
    (s[s.len() - 1] & 127) != 0
}

/// Decodes a stack item to a number.
///
/// # Errors
/// - `InvalidNumberRange` if the item exceeds `max_len` bytes.
/// - `MinimalData` if `require_minimal` and the encoding is not canonical.
///
/// # Examples
/// ```
/// use veriscript::script::stack::decode_num;
/// assert_eq!(decode_num(&[1], true, 4).unwrap(), 1);
/// assert_eq!(decode_num(&[129], true, 4).unwrap(), -1);
/// ```
#[inline]
pub fn decode_num(s: &[u8], require_minimal: bool, max_len: usize) -> Result<i64> {
    if s.len() > max_len {
        return Err(Error::Script(ScriptError::InvalidNumberRange));
    }
    if require_minimal && !is_minimally_encoded(s) {
        return Err(Error::Script(ScriptError::MinimalData));
    }
    if s.is_empty() {
        return Ok(0);
    }
    let mut result: i64 = 0;
    for (i, &byte) in s.iter().enumerate() {
        result |= (byte as i64) << (8 * i);
    }
    let last = s[s.len() - 1];
    if last & 0x80 != 0 {
        let mask = !(0x80i64 << (8 * (s.len() - 1)));
        Ok(-(result & mask))
    } else {
        Ok(result)
    }
}

/// Encodes a number to its minimal stack item form.
///
/// # Examples
/// ```
/// use veriscript::script::stack::encode_num;
/// assert_eq!(encode_num(0), Vec::<u8>::new());
/// assert_eq!(encode_num(1), vec![1]);
/// assert_eq!(encode_num(-1), vec![129]);
/// ```
#[must_use]
#[inline]
pub fn encode_num(val: i64) -> Vec<u8> {
    if val == 0 {
        return Vec::new();
    }
    let mut result = Vec::new();
    let mut abs_value = val.unsigned_abs();
    while abs_value > 0 {
        result.push((abs_value & 0xff) as u8);
        abs_value >>= 8;
    }
    // The high bit carries the sign, so magnitudes with it set need a pad byte.
    let last = result.last_mut().unwrap();
    if *last & 0x80 != 0 {
        result.push(if val < 0 { 0x80 } else { 0x00 });
    } else if val < 0 {
        *last |= 0x80;
    }
    result
}

/// True when the byte string is a canonical minimal number encoding.
#[must_use]
#[inline]
pub fn is_minimally_encoded(s: &[u8]) -> bool {
    if s.is_empty() {
        return true;
    }
    let last = s[s.len() - 1];
    if (last & 0x7f) == 0 {
        // A trailing sign-only byte is allowed only when the preceding byte
        // would otherwise absorb the sign bit.
        if s.len() == 1 {
            return false;
        }
        if s[s.len() - 2] & 0x80 == 0 {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decode_bool_tests() {
        assert_eq!(decode_bool(&[1]), true);
        assert_eq!(decode_bool(&[255, 0, 0, 0]), true);
        assert_eq!(decode_bool(&[0, 0, 0, 129]), true);
        assert_eq!(decode_bool(&[0]), false);
        assert_eq!(decode_bool(&[0, 0, 0, 0]), false);
        assert_eq!(decode_bool(&[0, 0, 0, 128]), false);
        assert_eq!(decode_bool(&[]), false);
    }

    #[test]
    fn encode_decode_roundtrip() {
        for n in [
            0i64,
            1,
            -1,
            127,
            -127,
            128,
            -128,
            255,
            256,
            1_111,
            -1_111,
            111_111,
            -111_111,
            8_388_607,
            8_388_608,
            2_147_483_647,
            -2_147_483_647,
        ] {
            let bytes = encode_num(n);
            assert!(is_minimally_encoded(&bytes), "{} not minimal", n);
            assert_eq!(decode_num(&bytes, true, 5).unwrap(), n, "roundtrip {}", n);
        }
    }

    #[test]
    fn encoding_shapes() {
        assert_eq!(encode_num(0), Vec::<u8>::new());
        assert_eq!(encode_num(1), vec![1]);
        assert_eq!(encode_num(-1), vec![0x81]);
        assert_eq!(encode_num(127), vec![0x7f]);
        assert_eq!(encode_num(128), vec![0x80, 0x00]);
        assert_eq!(encode_num(-128), vec![0x80, 0x80]);
        assert_eq!(encode_num(255), vec![0xff, 0x00]);
        assert_eq!(encode_num(256), vec![0x00, 0x01]);
    }

    #[test]
    fn rejects_oversize() {
        let five = [1, 2, 3, 4, 5];
        assert!(matches!(
            decode_num(&five, false, 4),
            Err(Error::Script(ScriptError::InvalidNumberRange))
        ));
        assert_eq!(decode_num(&five, false, 5).unwrap(), 0x0504030201);
    }

    #[test]
    fn rejects_non_minimal() {
        // 1 encoded with a redundant zero byte.
        assert!(matches!(
            decode_num(&[1, 0], true, 4),
            Err(Error::Script(ScriptError::MinimalData))
        ));
        // Lone sign byte.
        assert!(matches!(
            decode_num(&[0x80], true, 4),
            Err(Error::Script(ScriptError::MinimalData))
        ));
        // Same bytes decode fine without the policy.
        assert_eq!(decode_num(&[1, 0], false, 4).unwrap(), 1);
        assert_eq!(decode_num(&[0x80], false, 4).unwrap(), 0);
        // Sign padding after a high-bit magnitude byte is canonical.
        assert_eq!(decode_num(&[0x80, 0x00], true, 4).unwrap(), 128);
    }

    #[test]
    fn pop_helpers() {
        let mut stack = vec![vec![1]];
        assert_eq!(pop_bool(&mut stack).unwrap(), true);
        assert!(pop_bool(&mut stack).is_err());

        let mut stack = vec![vec![], vec![129]];
        assert_eq!(pop_num(&mut stack, true).unwrap(), -1);
        assert_eq!(pop_num(&mut stack, true).unwrap(), 0);
        assert!(pop_num(&mut stack, true).is_err());
    }
}
