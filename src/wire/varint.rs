//! LEB128 variable-length integers and zigzag signed mapping.
//!
//! Unsigned values are emitted low 7 bits first with the high bit marking
//! continuation, at most 10 bytes for a `u64`. Reads are bounds-checked and
//! never panic on truncated input.

use bytes::{Buf, BufMut};

use super::CodecError;

/// Maximum encoded length of a `u64` varint.
pub const MAX_VARINT_LEN: usize = 10;

/// Write an unsigned varint.
pub fn write_uvarint(out: &mut impl BufMut, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.put_u8(byte);
            return;
        }
        out.put_u8(byte | 0x80);
    }
}

/// Read an unsigned varint.
///
/// Fails on truncated input and on encodings longer than
/// [`MAX_VARINT_LEN`] bytes.
pub fn read_uvarint(buf: &mut impl Buf) -> Result<u64, CodecError> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;
    for _ in 0..MAX_VARINT_LEN {
        if !buf.has_remaining() {
            return Err(CodecError::UnexpectedEof {
                needed: 1,
                remaining: 0,
            });
        }
        let byte = buf.get_u8();
        let bits = u64::from(byte & 0x7f);
        // The tenth byte only has room for the top bit of a u64; anything
        // more would be shifted out silently.
        if shift == 63 && bits > 1 {
            return Err(CodecError::VarintOverflow);
        }
        value |= bits << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
    Err(CodecError::VarintOverflow)
}

/// Read an unsigned varint that must fit in 32 bits.
pub fn read_uvarint32(buf: &mut impl Buf) -> Result<u32, CodecError> {
    let value = read_uvarint(buf)?;
    u32::try_from(value).map_err(|_| CodecError::VarintOverflow)
}

/// Map a signed integer onto the unsigned varint space.
#[inline]
#[must_use]
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
#[inline]
#[must_use]
pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn uvarint_round_trip() {
        for value in [0u64, 1, 127, 128, 300, 16_383, 16_384, u64::MAX] {
            let mut out = BytesMut::new();
            write_uvarint(&mut out, value);
            let mut buf = out.freeze();
            assert_eq!(read_uvarint(&mut buf).unwrap(), value);
            assert_eq!(buf.remaining(), 0);
        }
    }

    #[test]
    fn truncated_uvarint_is_an_error() {
        let mut buf = bytes::Bytes::from_static(&[0x80]);
        assert!(matches!(
            read_uvarint(&mut buf),
            Err(CodecError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn tenth_byte_overflow_bits_are_rejected() {
        // Continuation bytes all the way, then a final byte whose payload
        // cannot fit in the one remaining u64 bit.
        let mut raw = vec![0xffu8; 9];
        raw.push(0x7e);
        let mut buf = bytes::Bytes::from(raw);
        assert!(matches!(
            read_uvarint(&mut buf),
            Err(CodecError::VarintOverflow)
        ));
    }

    #[test]
    fn ten_byte_u64_max_still_decodes() {
        let mut raw = vec![0xffu8; 9];
        raw.push(0x01);
        let mut buf = bytes::Bytes::from(raw);
        assert_eq!(read_uvarint(&mut buf).unwrap(), u64::MAX);
    }

    #[test]
    fn zigzag_round_trip() {
        for value in [0i64, -1, 1, -2, i64::MIN, i64::MAX] {
            assert_eq!(zigzag_decode(zigzag_encode(value)), value);
        }
    }
}
