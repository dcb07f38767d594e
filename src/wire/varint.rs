//! LEB128 varint helpers for the wire codec.
//!
//! Small values use fewer bytes: 0-127 take one byte, 128-16383 two, and
//! so on. Decoding works over a slice with an explicit cursor so envelope
//! fields can be read back to back.

use super::DecodeError;

/// Append a varint-encoded value to `buf`.
pub fn put_uvarint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Read a varint from `data` starting at `*pos`, advancing the cursor.
pub fn get_uvarint(data: &[u8], pos: &mut usize) -> Result<u64, DecodeError> {
    let mut result: u64 = 0;
    let mut shift = 0;

    loop {
        let byte = *data.get(*pos).ok_or(DecodeError::UnexpectedEof)?;
        *pos += 1;

        result |= u64::from(byte & 0x7F) << shift;

        if byte & 0x80 == 0 {
            return Ok(result);
        }

        shift += 7;
        if shift >= 64 {
            return Err(DecodeError::VarintOverflow);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uvarint_single_byte() {
        for value in [0u64, 1, 127] {
            let mut buf = Vec::new();
            put_uvarint(&mut buf, value);
            assert_eq!(buf.len(), 1, "value {value}");
        }
    }

    #[test]
    fn test_uvarint_known_encodings() {
        let mut buf = Vec::new();
        put_uvarint(&mut buf, 128);
        assert_eq!(buf, vec![0x80, 0x01]);

        buf.clear();
        put_uvarint(&mut buf, 300);
        assert_eq!(buf, vec![0xAC, 0x02]);
    }

    #[test]
    fn test_uvarint_roundtrip() {
        let values = [0, 1, 127, 128, 255, 256, 16383, 16384, 2097151, u64::MAX];
        for &value in &values {
            let mut buf = Vec::new();
            put_uvarint(&mut buf, value);

            let mut pos = 0;
            let decoded = get_uvarint(&buf, &mut pos).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(pos, buf.len());
        }
    }

    #[test]
    fn test_uvarint_truncated() {
        // Continuation bit set but nothing follows.
        let mut pos = 0;
        assert_eq!(
            get_uvarint(&[0x80], &mut pos),
            Err(DecodeError::UnexpectedEof)
        );
    }

    #[test]
    fn test_uvarint_overflow() {
        let mut pos = 0;
        let data = [0xFF; 11];
        assert_eq!(
            get_uvarint(&data, &mut pos),
            Err(DecodeError::VarintOverflow)
        );
    }
}
