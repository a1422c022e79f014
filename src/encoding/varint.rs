//! # 7-Bit Variable-Length Integer Encoding
//!
//! Base-128 little-endian var-ints used throughout the binary row format:
//! version numbers, field counts, flag bitsets, row lengths, and (from
//! format version 2) numeric field payloads.
//!
//! ## Encoding Format
//!
//! Each byte carries 7 value bits; the high bit is a continuation marker.
//! Groups are emitted least-significant first:
//!
//! | Value Range | Bytes |
//! |-------------|-------|
//! | 0 - 127 | 1 |
//! | 128 - 16383 | 2 |
//! | ... | ... |
//! | up to `u64::MAX` | 10 |
//! | up to `u128::MAX` | 19 |
//!
//! Signed values are zigzag-mapped first (`0, -1, 1, -2, ...` →
//! `0, 1, 2, 3, ...`) so small magnitudes of either sign stay short.
//!
//! ## Error Handling
//!
//! Decoding fails with a `DataCorruption` kind on a truncated buffer or an
//! over-long encoding. `read_7bit_u64_opt` distinguishes clean end-of-stream
//! (no bytes at all) from truncation mid-value.

use std::io::{Read, Write};

use eyre::Result;

use crate::error;

/// Returns the encoded length of `value` in bytes.
pub fn varint_len(value: u64) -> usize {
    (((64 - (value | 1).leading_zeros()) as usize) + 6) / 7
}

/// Writes an unsigned 7-bit var-int.
pub fn write_7bit_u64<W: Write>(out: &mut W, mut value: u64) -> Result<()> {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.write_all(&[byte])?;
            return Ok(());
        }
        out.write_all(&[byte | 0x80])?;
    }
}

/// Reads an unsigned 7-bit var-int, failing on truncation or an encoding
/// longer than 10 bytes.
pub fn read_7bit_u64<R: Read>(input: &mut R) -> Result<u64> {
    match read_7bit_u64_opt(input)? {
        Some(value) => Ok(value),
        None => Err(error::corruption("truncated 7-bit value: empty input")),
    }
}

/// Reads an unsigned 7-bit var-int, returning None when the stream ends
/// cleanly before the first byte.
pub fn read_7bit_u64_opt<R: Read>(input: &mut R) -> Result<Option<u64>> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    for i in 0..10 {
        let mut byte = [0u8; 1];
        let n = input.read(&mut byte)?;
        if n == 0 {
            if i == 0 {
                return Ok(None);
            }
            return Err(error::corruption("truncated 7-bit value"));
        }
        let payload = (byte[0] & 0x7F) as u64;
        // The final byte may only carry bits that still fit in the width.
        let shifted = payload
            .checked_shl(shift)
            .filter(|shifted| shifted >> shift == payload)
            .ok_or_else(|| error::corruption("7-bit value overflows u64"))?;
        value |= shifted;
        if byte[0] & 0x80 == 0 {
            return Ok(Some(value));
        }
        shift += 7;
    }
    Err(error::corruption("7-bit value exceeds 10 bytes"))
}

/// Writes an unsigned 128-bit 7-bit var-int (used for decimal digits).
pub fn write_7bit_u128<W: Write>(out: &mut W, mut value: u128) -> Result<()> {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.write_all(&[byte])?;
            return Ok(());
        }
        out.write_all(&[byte | 0x80])?;
    }
}

/// Reads an unsigned 128-bit 7-bit var-int.
pub fn read_7bit_u128<R: Read>(input: &mut R) -> Result<u128> {
    let mut value: u128 = 0;
    let mut shift = 0u32;
    for _ in 0..19 {
        let mut byte = [0u8; 1];
        let n = input.read(&mut byte)?;
        if n == 0 {
            return Err(error::corruption("truncated 7-bit value"));
        }
        let payload = (byte[0] & 0x7F) as u128;
        let shifted = payload
            .checked_shl(shift)
            .filter(|shifted| shifted >> shift == payload)
            .ok_or_else(|| error::corruption("7-bit value overflows u128"))?;
        value |= shifted;
        if byte[0] & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
    Err(error::corruption("7-bit value exceeds 19 bytes"))
}

/// Zigzag-maps a signed value to unsigned.
pub fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Reverses [`zigzag`].
pub fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Zigzag-maps a signed 128-bit value to unsigned.
pub fn zigzag128(value: i128) -> u128 {
    ((value << 1) ^ (value >> 127)) as u128
}

/// Reverses [`zigzag128`].
pub fn unzigzag128(value: u128) -> i128 {
    ((value >> 1) as i128) ^ -((value & 1) as i128)
}

/// Writes a signed value as a zigzag 7-bit var-int.
pub fn write_7bit_i64<W: Write>(out: &mut W, value: i64) -> Result<()> {
    write_7bit_u64(out, zigzag(value))
}

/// Reads a signed zigzag 7-bit var-int.
pub fn read_7bit_i64<R: Read>(input: &mut R) -> Result<i64> {
    Ok(unzigzag(read_7bit_u64(input)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: u64) -> usize {
        let mut buf = Vec::new();
        write_7bit_u64(&mut buf, value).unwrap();
        let decoded = read_7bit_u64(&mut buf.as_slice()).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(buf.len(), varint_len(value));
        buf.len()
    }

    #[test]
    fn boundary_values() {
        assert_eq!(roundtrip(0), 1);
        assert_eq!(roundtrip(127), 1);
        assert_eq!(roundtrip(128), 2);
        assert_eq!(roundtrip(16383), 2);
        assert_eq!(roundtrip(16384), 3);
        assert_eq!(roundtrip(u32::MAX as u64), 5);
        assert_eq!(roundtrip(u64::MAX), 10);
    }

    #[test]
    fn signed_roundtrip() {
        for value in [0i64, 1, -1, 63, -64, 64, -65, i64::MAX, i64::MIN] {
            let mut buf = Vec::new();
            write_7bit_i64(&mut buf, value).unwrap();
            assert_eq!(read_7bit_i64(&mut buf.as_slice()).unwrap(), value);
        }
    }

    #[test]
    fn zigzag_ordering() {
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
        assert_eq!(zigzag(-2), 3);
        assert_eq!(unzigzag(zigzag(i64::MIN)), i64::MIN);
    }

    #[test]
    fn u128_roundtrip() {
        for value in [0u128, 1, u64::MAX as u128, u128::MAX] {
            let mut buf = Vec::new();
            write_7bit_u128(&mut buf, value).unwrap();
            assert_eq!(read_7bit_u128(&mut buf.as_slice()).unwrap(), value);
        }
        assert_eq!(unzigzag128(zigzag128(i128::MIN)), i128::MIN);
    }

    #[test]
    fn truncated_input_fails() {
        let mut buf = Vec::new();
        write_7bit_u64(&mut buf, 1_000_000).unwrap();
        buf.pop();
        assert!(read_7bit_u64(&mut buf.as_slice()).is_err());
    }

    #[test]
    fn clean_eof_is_none() {
        let empty: &[u8] = &[];
        assert!(read_7bit_u64_opt(&mut &*empty).unwrap().is_none());
        assert!(read_7bit_u64(&mut &*empty).is_err());
    }

    #[test]
    fn overlong_encoding_fails() {
        let buf = [0x80u8; 11];
        assert!(read_7bit_u64(&mut buf.as_slice()).is_err());
    }

    #[test]
    fn final_byte_past_the_width_fails() {
        // Tenth byte may only carry bit 63; anything above must not be
        // silently dropped.
        let mut buf = vec![0x80u8; 9];
        buf.push(0x02);
        assert!(read_7bit_u64(&mut buf.as_slice()).is_err());

        // u64::MAX itself still decodes: its tenth byte is 0x01.
        let mut max = Vec::new();
        write_7bit_u64(&mut max, u64::MAX).unwrap();
        assert_eq!(max[9], 0x01);
        assert_eq!(read_7bit_u64(&mut max.as_slice()).unwrap(), u64::MAX);

        // Same rule for the 19-byte 128-bit decoder.
        let mut wide = vec![0x80u8; 18];
        wide.push(0x08);
        assert!(read_7bit_u128(&mut wide.as_slice()).is_err());
    }
}
