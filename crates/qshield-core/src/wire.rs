//! Length-prefixed wire-format helpers.
//!
//! Every multi-part object in this crate (KEM keys and ciphertexts,
//! signing keys, signatures) serializes as a sequence of fields, each
//! prefixed with a `u32` little-endian length. These helpers implement
//! the cursor-based reading side with full bounds checking: truncated
//! input, a length field that extends past the buffer, or cursor
//! overflow all yield [`QShieldError::Parse`].

use crate::error::QShieldError;

/// Append a `u32`-LE length prefix followed by the field bytes.
///
/// # Errors
///
/// Returns `QShieldError::Parse` if the field is longer than `u32::MAX`.
pub(crate) fn put_prefixed(out: &mut Vec<u8>, field: &[u8]) -> Result<(), QShieldError> {
    let len = u32::try_from(field.len())
        .map_err(|_| QShieldError::Parse("field too large for u32 length prefix".into()))?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(field);
    Ok(())
}

/// Read a `u16` (little-endian) at `*cursor`, advancing the cursor.
pub(crate) fn read_u16_le(data: &[u8], cursor: &mut usize) -> Result<u16, QShieldError> {
    let bytes = take(data, cursor, 2)?;
    let mut buf = [0u8; 2];
    buf.copy_from_slice(bytes);
    Ok(u16::from_le_bytes(buf))
}

/// Read a `u32` (little-endian) at `*cursor`, advancing the cursor.
pub(crate) fn read_u32_le(data: &[u8], cursor: &mut usize) -> Result<u32, QShieldError> {
    let bytes = take(data, cursor, 4)?;
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    Ok(u32::from_le_bytes(buf))
}

/// Read a `u64` (little-endian) at `*cursor`, advancing the cursor.
pub(crate) fn read_u64_le(data: &[u8], cursor: &mut usize) -> Result<u64, QShieldError> {
    let bytes = take(data, cursor, 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Ok(u64::from_le_bytes(buf))
}

/// Read a `u32`-LE length prefix followed by that many bytes.
pub(crate) fn read_prefixed<'a>(
    data: &'a [u8],
    cursor: &mut usize,
) -> Result<&'a [u8], QShieldError> {
    let len = read_u32_le(data, cursor)?;
    take(data, cursor, len as usize)
}

/// Take `len` bytes at `*cursor`, advancing the cursor.
fn take<'a>(data: &'a [u8], cursor: &mut usize, len: usize) -> Result<&'a [u8], QShieldError> {
    let start = *cursor;
    let end = start
        .checked_add(len)
        .ok_or_else(|| QShieldError::Parse("length overflow".into()))?;
    if end > data.len() {
        return Err(QShieldError::Parse(format!(
            "field extends beyond buffer: need {end} bytes, have {}",
            data.len()
        )));
    }
    *cursor = end;
    Ok(&data[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_read_prefixed_roundtrip() {
        let mut buf = Vec::new();
        put_prefixed(&mut buf, b"hello").expect("put should succeed");
        put_prefixed(&mut buf, b"").expect("put should succeed");
        put_prefixed(&mut buf, &[0xAA; 300]).expect("put should succeed");

        let mut cursor = 0usize;
        assert_eq!(read_prefixed(&buf, &mut cursor).expect("read"), b"hello");
        assert_eq!(read_prefixed(&buf, &mut cursor).expect("read"), b"");
        assert_eq!(read_prefixed(&buf, &mut cursor).expect("read"), &[0xAA; 300]);
        assert_eq!(cursor, buf.len());
    }

    #[test]
    fn empty_field_encodes_as_zero_prefix_only() {
        let mut buf = Vec::new();
        put_prefixed(&mut buf, b"").expect("put should succeed");
        assert_eq!(buf, vec![0, 0, 0, 0]);
    }

    #[test]
    fn truncated_prefix_is_rejected() {
        let mut cursor = 0usize;
        let err = read_prefixed(&[0x05, 0x00], &mut cursor).expect_err("should fail");
        assert!(matches!(err, QShieldError::Parse(_)));
    }

    #[test]
    fn length_beyond_buffer_is_rejected() {
        // Prefix claims 100 bytes; only 3 follow.
        let mut data = 100u32.to_le_bytes().to_vec();
        data.extend_from_slice(&[1, 2, 3]);
        let mut cursor = 0usize;
        let err = read_prefixed(&data, &mut cursor).expect_err("should fail");
        assert!(matches!(err, QShieldError::Parse(_)));
    }

    #[test]
    fn huge_length_does_not_overflow_cursor() {
        let mut data = u32::MAX.to_le_bytes().to_vec();
        data.extend_from_slice(&[0u8; 16]);
        let mut cursor = 0usize;
        let err = read_prefixed(&data, &mut cursor).expect_err("should fail");
        assert!(matches!(err, QShieldError::Parse(_)));
    }

    #[test]
    fn scalar_reads_advance_cursor() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0x0102u16.to_le_bytes());
        buf.extend_from_slice(&0x0304_0506u32.to_le_bytes());
        buf.extend_from_slice(&0x0708_090A_0B0C_0D0Eu64.to_le_bytes());

        let mut cursor = 0usize;
        assert_eq!(read_u16_le(&buf, &mut cursor).expect("u16"), 0x0102);
        assert_eq!(read_u32_le(&buf, &mut cursor).expect("u32"), 0x0304_0506);
        assert_eq!(
            read_u64_le(&buf, &mut cursor).expect("u64"),
            0x0708_090A_0B0C_0D0E
        );
        assert_eq!(cursor, buf.len());
    }
}
