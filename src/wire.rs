//! Wire primitives for the .ct layout: little-endian integers come from
//! `byteorder`; this module adds the two UTF-16LE string shapes and the
//! header padding rule.
//!
//! *Body strings* (row data, column names) are a u32 LE code-unit count
//! followed by the raw UTF-16LE payload, no terminator.  *Header strings*
//! (magic, timestamp) are NUL-terminated with no length prefix and appear
//! only inside the 64-byte header.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

/// Fixed header size; the schema section starts exactly here.
pub const HEADER_SIZE: u64 = 0x40;

#[derive(Error, Debug)]
pub enum WireError {
    #[error("invalid UTF-16 payload")]
    InvalidUtf16,
    #[error("string contains an embedded NUL code unit")]
    EmbeddedNul,
    #[error("string length {0} exceeds the u32 length prefix")]
    StringTooLong(usize),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Read a length-prefixed body string.  A zero length is the empty string.
pub fn read_body_string<R: Read>(reader: &mut R) -> Result<String, WireError> {
    let units = reader.read_u32::<LittleEndian>()? as u64;
    let byte_len = units * 2;

    // Bounded by what the stream actually holds, so a corrupt length prefix
    // fails with EOF instead of a giant allocation.
    let mut payload = Vec::new();
    reader.take(byte_len).read_to_end(&mut payload)?;
    if payload.len() as u64 != byte_len {
        return Err(WireError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "string payload truncated",
        )));
    }

    decode_utf16le(&payload)
}

/// Write a body string: u32 LE count of UTF-16 code units, then the payload.
pub fn write_body_string<W: Write>(writer: &mut W, text: &str) -> Result<(), WireError> {
    let units = text.encode_utf16().count();
    if units > u32::MAX as usize {
        return Err(WireError::StringTooLong(units));
    }
    writer.write_u32::<LittleEndian>(units as u32)?;
    for unit in text.encode_utf16() {
        writer.write_u16::<LittleEndian>(unit)?;
    }
    Ok(())
}

/// Read a NUL-terminated header string, consuming the terminator.
pub fn read_header_string<R: Read>(reader: &mut R) -> Result<String, WireError> {
    let mut units = Vec::new();
    loop {
        let unit = reader.read_u16::<LittleEndian>()?;
        if unit == 0 {
            break;
        }
        units.push(unit);
    }
    String::from_utf16(&units).map_err(|_| WireError::InvalidUtf16)
}

/// Write a header string plus its 0x0000 terminator.  The payload must not
/// contain NUL code units or the terminator becomes ambiguous.
pub fn write_header_string<W: Write>(writer: &mut W, text: &str) -> Result<(), WireError> {
    for unit in text.encode_utf16() {
        if unit == 0 {
            return Err(WireError::EmbeddedNul);
        }
        writer.write_u16::<LittleEndian>(unit)?;
    }
    writer.write_u16::<LittleEndian>(0)?;
    Ok(())
}

/// Zero-fill from `position` up to `target`.  The caller has already checked
/// that `position <= target`.
pub fn pad_to<W: Write>(writer: &mut W, position: u64, target: u64) -> io::Result<()> {
    for _ in position..target {
        writer.write_u8(0)?;
    }
    Ok(())
}

fn decode_utf16le(payload: &[u8]) -> Result<String, WireError> {
    let units: Vec<u16> = payload
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| WireError::InvalidUtf16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn body_round_trip(text: &str) -> String {
        let mut buf = Vec::new();
        write_body_string(&mut buf, text).unwrap();
        read_body_string(&mut Cursor::new(buf)).unwrap()
    }

    #[test]
    fn body_strings() {
        assert_eq!(body_round_trip(""), "");
        assert_eq!(body_round_trip("CardInfo"), "CardInfo");
        assert_eq!(body_round_trip("라그나로크"), "라그나로크");
        // Surrogate pair: two code units, four payload bytes.
        let mut buf = Vec::new();
        write_body_string(&mut buf, "𝄞").unwrap();
        assert_eq!(buf.len(), 4 + 4);
        assert_eq!(&buf[..4], &2u32.to_le_bytes());
        assert_eq!(read_body_string(&mut Cursor::new(buf)).unwrap(), "𝄞");
    }

    #[test]
    fn empty_body_string_is_four_bytes() {
        let mut buf = Vec::new();
        write_body_string(&mut buf, "").unwrap();
        assert_eq!(buf, vec![0, 0, 0, 0]);
    }

    #[test]
    fn truncated_body_string_fails() {
        let mut buf = Vec::new();
        write_body_string(&mut buf, "abc").unwrap();
        buf.truncate(buf.len() - 1);
        assert!(read_body_string(&mut Cursor::new(buf)).is_err());
    }

    #[test]
    fn header_strings() {
        let mut buf = Vec::new();
        write_header_string(&mut buf, "RO2SEC!").unwrap();
        assert_eq!(buf.len(), 16);
        let mut cur = Cursor::new(buf);
        assert_eq!(read_header_string(&mut cur).unwrap(), "RO2SEC!");
        assert_eq!(cur.position(), 16);
    }

    #[test]
    fn header_string_rejects_embedded_nul() {
        let mut buf = Vec::new();
        assert!(matches!(
            write_header_string(&mut buf, "a\0b"),
            Err(WireError::EmbeddedNul)
        ));
    }

    #[test]
    fn padding() {
        let mut buf = Vec::new();
        pad_to(&mut buf, 58, HEADER_SIZE).unwrap();
        assert_eq!(buf, vec![0u8; 6]);
    }
}
