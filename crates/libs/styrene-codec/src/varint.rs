//! Zigzag base-128 varints.
//!
//! Signed values are zigzag-mapped (`-1 → 1`, `1 → 2`, `-2 → 3`, ...) and then
//! written as little-endian groups of seven bits, with the high bit set on
//! every byte except the last. Lengths and element counts skip the zigzag step
//! and use the unsigned form directly.

use crate::error::DecodeError;

/// Longest encoding of a 64-bit value.
pub const MAX_VARINT_LEN: usize = 10;

const CONTINUATION: u8 = 0x80;
const PAYLOAD_MASK: u8 = 0x7f;

/// Maps a signed value onto the unsigned range so small magnitudes stay short.
#[inline]
pub fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag`].
#[inline]
pub fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Number of bytes `value` occupies as an unsigned varint.
pub fn unsigned_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}

/// Appends `value` as an unsigned varint.
pub fn write_unsigned(mut value: u64, out: &mut Vec<u8>) {
    while value >= u64::from(CONTINUATION) {
        out.push((value as u8 & PAYLOAD_MASK) | CONTINUATION);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Appends `value` as a zigzag varint.
pub fn write_varint(value: i64, out: &mut Vec<u8>) {
    write_unsigned(zigzag(value), out);
}

/// Encodes `value` as a zigzag varint.
pub fn encode_varint(value: i64) -> Vec<u8> {
    let mut out = Vec::with_capacity(unsigned_len(zigzag(value)));
    write_varint(value, &mut out);
    out
}

/// Reads an unsigned varint starting at `offset`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_unsigned(buf: &[u8], offset: usize) -> Result<(u64, usize), DecodeError> {
    let mut value = 0u64;
    let mut shift = 0u32;
    for (index, &byte) in buf.iter().skip(offset).enumerate() {
        let payload = u64::from(byte & PAYLOAD_MASK);
        // The tenth byte has room for the single remaining bit.
        if shift > 63 || (shift == 63 && payload > 1) {
            return Err(DecodeError::VarintOverflow { offset });
        }
        value |= payload << shift;
        if byte & CONTINUATION == 0 {
            return Ok((value, index + 1));
        }
        shift += 7;
    }
    Err(DecodeError::TruncatedVarint { offset })
}

/// Reads a zigzag varint starting at `offset`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_varint(buf: &[u8], offset: usize) -> Result<(i64, usize), DecodeError> {
    let (raw, consumed) = decode_unsigned(buf, offset)?;
    Ok((unzigzag(raw), consumed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zigzag_maps_small_magnitudes_first() {
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
        assert_eq!(zigzag(-2), 3);
        assert_eq!(zigzag(2), 4);
        assert_eq!(zigzag(i64::MAX), u64::MAX - 1);
        assert_eq!(zigzag(i64::MIN), u64::MAX);
    }

    #[test]
    fn concrete_encodings() {
        assert_eq!(encode_varint(-1), vec![0x01]);
        assert_eq!(encode_varint(1), vec![0x02]);
        assert_eq!(encode_varint(64), vec![0x80, 0x01]);
        assert_eq!(encode_varint(0), vec![0x00]);
        assert_eq!(encode_varint(-64), vec![0x7f]);
    }

    #[test]
    fn extremes_roundtrip() {
        for value in [i64::MIN, i64::MIN + 1, -1, 0, 1, i64::MAX - 1, i64::MAX] {
            let encoded = encode_varint(value);
            assert!(encoded.len() <= MAX_VARINT_LEN);
            assert_eq!(decode_varint(&encoded, 0), Ok((value, encoded.len())));
        }
    }

    #[test]
    fn length_grows_in_seven_bit_buckets() {
        let mut previous = 0;
        for shift in 0..63 {
            let magnitude = 1i64 << shift;
            let len = encode_varint(magnitude).len();
            assert!(len >= previous, "length shrank at 2^{shift}");
            assert_eq!(len, unsigned_len(zigzag(magnitude)));
            previous = len;
        }
    }

    #[test]
    fn decode_at_offset_reports_consumed() {
        let mut buf = vec![0xaa, 0xbb];
        write_varint(300, &mut buf);
        buf.push(0xcc);
        assert_eq!(decode_varint(&buf, 2), Ok((300, 2)));
    }

    #[test]
    fn rejects_truncated() {
        let truncated = |offset| Err(DecodeError::TruncatedVarint { offset });
        assert_eq!(decode_unsigned(&[0x80, 0x80], 0), truncated(0));
        assert_eq!(decode_unsigned(&[], 0), truncated(0));
        assert_eq!(decode_unsigned(&[0x01], 1), truncated(1));
    }

    #[test]
    fn rejects_overflow() {
        let mut too_wide = vec![0xff; 9];
        too_wide.push(0x02);
        let overflow = Err(DecodeError::VarintOverflow { offset: 0 });
        assert_eq!(decode_unsigned(&too_wide, 0), overflow);

        let eleven = vec![0x80; 11];
        assert_eq!(decode_unsigned(&eleven, 0), overflow);

        let mut max = vec![0xff; 9];
        max.push(0x01);
        assert_eq!(decode_unsigned(&max, 0), Ok((u64::MAX, 10)));
    }
}
