//! The .ct binary codec — reader and writer for one compiled table.
//!
//! # Layout
//!
//! ```text
//! offset  length      content
//! 0x00    16          "RO2SEC!" UTF-16LE + 0x0000 terminator
//! 0x10    variable    timestamp UTF-16LE + 0x0000 terminator
//! ---     variable    zero padding to exactly 0x40
//! 0x40    4           column count C        (u32 LE)
//! ---     variable    C × body string       (column names)
//! ---     4           type count T == C     (u32 LE)
//! ---     4·T         T × type code         (u32 LE)
//! ---     4           row count R           (u32 LE)
//! ---     variable    R × row, one cell per column
//! ---     2           CRC-16/XMODEM         (u16 LE, row region only)
//! ```
//!
//! The checksum covers the row region alone: it starts after the row count
//! and ends before the two CRC bytes.  The game client rejects files whose
//! stored and recomputed sums disagree, so the reader does too.
//!
//! # Endianness
//! All binary I/O is strictly little-endian.  No runtime negotiation is
//! ever performed.

use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::crc;
use crate::table::{Cell, Column, Table, TypeCode};
use crate::wire::{self, WireError, HEADER_SIZE};

/// Magic text at offset 0.  With its terminator it fills 16 bytes exactly;
/// changing it requires re-checking that the timestamp still fits the
/// 64-byte header.
pub const MAGIC: &str = "RO2SEC!";
const MAGIC_AREA: u64 = 16;

#[derive(Error, Debug)]
pub enum CtError {
    #[error("bad magic, not a .ct table")]
    BadMagic,
    #[error("header overflow: timestamp runs past offset 0x40")]
    HeaderOverflow,
    #[error("timestamp too long for the 64-byte header")]
    TimestampTooLong,
    #[error("schema mismatch: {columns} columns but {types} type codes")]
    SchemaMismatch { columns: u32, types: u32 },
    #[error("unknown type code {0}")]
    UnknownType(u32),
    #[error("checksum mismatch: stored 0x{stored:04X}, computed 0x{computed:04X}")]
    BadChecksum { stored: u16, computed: u16 },
    #[error("{0} trailing byte(s) after the checksum")]
    TrailingBytes(u64),
    #[error("column {0} has an empty name")]
    EmptyColumnName(usize),
    #[error("row {row} has {got} cells, schema has {expected} columns")]
    RowWidth { row: usize, expected: usize, got: usize },
    #[error("row {row} column {col}: cell is {found}, column declares {expected}")]
    CellTypeMismatch {
        row:      usize,
        col:      usize,
        expected: TypeCode,
        found:    TypeCode,
    },
    #[error("{0} count exceeds the u32 range")]
    CountOverflow(&'static str),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

// ── Read path ────────────────────────────────────────────────────────────────

/// Decode a complete .ct image.  Fails on the first malformed field and on
/// any bytes left over after the checksum.
pub fn from_bytes(bytes: &[u8]) -> Result<Table, CtError> {
    let mut cur = Cursor::new(bytes);

    let mut magic = [0u8; MAGIC_AREA as usize];
    cur.read_exact(&mut magic).map_err(|_| CtError::BadMagic)?;
    if magic != magic_bytes() {
        return Err(CtError::BadMagic);
    }

    let timestamp = wire::read_header_string(&mut cur)?;
    if cur.position() > HEADER_SIZE {
        return Err(CtError::HeaderOverflow);
    }
    cur.set_position(HEADER_SIZE);

    let column_count = cur.read_u32::<LittleEndian>()?;
    let mut names = Vec::new();
    for i in 0..column_count {
        let name = wire::read_body_string(&mut cur)?;
        if name.is_empty() {
            return Err(CtError::EmptyColumnName(i as usize));
        }
        names.push(name);
    }

    // The count mismatch is diagnosed before any type code is consumed.
    let type_count = cur.read_u32::<LittleEndian>()?;
    if type_count != column_count {
        return Err(CtError::SchemaMismatch { columns: column_count, types: type_count });
    }
    let mut types = Vec::new();
    for _ in 0..type_count {
        let code = cur.read_u32::<LittleEndian>()?;
        types.push(TypeCode::from_code(code).ok_or(CtError::UnknownType(code))?);
    }
    let columns: Vec<Column> = names
        .into_iter()
        .zip(types)
        .map(|(name, ty)| Column { name, ty })
        .collect();

    let row_count = cur.read_u32::<LittleEndian>()?;
    let row_start = cur.position();
    let mut rows = Vec::new();
    for _ in 0..row_count {
        let mut row = Vec::with_capacity(columns.len());
        for column in &columns {
            row.push(read_cell(&mut cur, column.ty)?);
        }
        rows.push(row);
    }
    let row_end = cur.position();

    let stored = cur.read_u16::<LittleEndian>()?;
    let computed = crc::checksum(&bytes[row_start as usize..row_end as usize]);
    if stored != computed {
        return Err(CtError::BadChecksum { stored, computed });
    }

    let trailing = bytes.len() as u64 - cur.position();
    if trailing != 0 {
        return Err(CtError::TrailingBytes(trailing));
    }

    Ok(Table { timestamp, columns, rows })
}

/// Read and decode a .ct file.  The handle is scoped to this one read.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Table, CtError> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    from_bytes(&bytes)
}

fn read_cell<R: Read>(reader: &mut R, ty: TypeCode) -> Result<Cell, CtError> {
    Ok(match ty {
        TypeCode::Byte => Cell::Byte(reader.read_u8()?),
        TypeCode::Short => Cell::Short(reader.read_i16::<LittleEndian>()?),
        TypeCode::Word => Cell::Word(reader.read_u16::<LittleEndian>()?),
        TypeCode::Int => Cell::Int(reader.read_i32::<LittleEndian>()?),
        TypeCode::Dword => Cell::Dword(reader.read_u32::<LittleEndian>()?),
        TypeCode::DwordHex => Cell::DwordHex(reader.read_u32::<LittleEndian>()?),
        TypeCode::String => Cell::String(wire::read_body_string(reader)?),
        TypeCode::Float => Cell::Float(reader.read_f32::<LittleEndian>()?),
        // Unsigned on the wire; observed client files never carry a sign.
        TypeCode::Int64 => Cell::Int64(reader.read_u64::<LittleEndian>()?),
        // Any nonzero byte reads as true.
        TypeCode::Bool => Cell::Bool(reader.read_u8()? != 0),
    })
}

// ── Write path ───────────────────────────────────────────────────────────────

/// Encode a table into a complete .ct image.
///
/// The shape invariants are re-checked up front so a malformed `Table`
/// never produces half an output.
pub fn to_bytes(table: &Table) -> Result<Vec<u8>, CtError> {
    check_shape(table)?;

    let columns = u32::try_from(table.columns.len())
        .map_err(|_| CtError::CountOverflow("column"))?;
    let row_count = u32::try_from(table.rows.len())
        .map_err(|_| CtError::CountOverflow("row"))?;

    let mut out = Cursor::new(Vec::new());
    wire::write_header_string(&mut out, MAGIC)?;
    debug_assert_eq!(out.position(), MAGIC_AREA);

    wire::write_header_string(&mut out, &table.timestamp)?;
    let pos = out.position();
    if pos >= HEADER_SIZE {
        return Err(CtError::TimestampTooLong);
    }
    wire::pad_to(&mut out, pos, HEADER_SIZE)?;

    out.write_u32::<LittleEndian>(columns)?;
    for column in &table.columns {
        wire::write_body_string(&mut out, &column.name)?;
    }
    out.write_u32::<LittleEndian>(columns)?;
    for column in &table.columns {
        out.write_u32::<LittleEndian>(column.ty.code())?;
    }
    out.write_u32::<LittleEndian>(row_count)?;

    // Rows go through a side buffer so the checksum covers exactly the row
    // region and nothing else.
    let mut row_region = Vec::new();
    for row in &table.rows {
        for cell in row {
            write_cell(&mut row_region, cell)?;
        }
    }
    let sum = crc::checksum(&row_region);

    let mut bytes = out.into_inner();
    bytes.extend_from_slice(&row_region);
    bytes.write_u16::<LittleEndian>(sum)?;
    Ok(bytes)
}

fn check_shape(table: &Table) -> Result<(), CtError> {
    for (i, column) in table.columns.iter().enumerate() {
        if column.name.is_empty() {
            return Err(CtError::EmptyColumnName(i));
        }
    }
    for (r, row) in table.rows.iter().enumerate() {
        if row.len() != table.columns.len() {
            return Err(CtError::RowWidth {
                row:      r,
                expected: table.columns.len(),
                got:      row.len(),
            });
        }
        for (c, (cell, column)) in row.iter().zip(&table.columns).enumerate() {
            if cell.type_code() != column.ty {
                return Err(CtError::CellTypeMismatch {
                    row:      r,
                    col:      c,
                    expected: column.ty,
                    found:    cell.type_code(),
                });
            }
        }
    }
    Ok(())
}

fn write_cell<W: Write>(writer: &mut W, cell: &Cell) -> Result<(), CtError> {
    match cell {
        Cell::Byte(v) => writer.write_u8(*v)?,
        Cell::Short(v) => writer.write_i16::<LittleEndian>(*v)?,
        Cell::Word(v) => writer.write_u16::<LittleEndian>(*v)?,
        Cell::Int(v) => writer.write_i32::<LittleEndian>(*v)?,
        // DWORD_HEX shares DWORD's binary form; hex is display-only.
        Cell::Dword(v) | Cell::DwordHex(v) => writer.write_u32::<LittleEndian>(*v)?,
        Cell::String(s) => wire::write_body_string(writer, s)?,
        Cell::Float(v) => writer.write_f32::<LittleEndian>(*v)?,
        Cell::Int64(v) => writer.write_u64::<LittleEndian>(*v)?,
        Cell::Bool(v) => writer.write_u8(u8::from(*v))?,
    }
    Ok(())
}

fn magic_bytes() -> [u8; MAGIC_AREA as usize] {
    let mut bytes = [0u8; MAGIC_AREA as usize];
    for (i, unit) in MAGIC.encode_utf16().enumerate() {
        bytes[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_area_is_sixteen_bytes() {
        let bytes = magic_bytes();
        assert_eq!(&bytes[..2], &[b'R', 0]);
        assert_eq!(&bytes[14..], &[0, 0]);
    }

    #[test]
    fn empty_table_round_trips_with_zero_crc() {
        let table = Table {
            timestamp: "2024-01-01 00:00:00".to_string(),
            columns:   Vec::new(),
            rows:      Vec::new(),
        };
        let bytes = to_bytes(&table).unwrap();
        // Header, three zero counts, CRC over zero bytes.
        assert_eq!(bytes.len(), 0x40 + 4 + 4 + 4 + 2);
        assert_eq!(&bytes[bytes.len() - 2..], &[0x00, 0x00]);
        assert_eq!(from_bytes(&bytes).unwrap(), table);
    }

    #[test]
    fn timestamp_too_long_is_rejected_on_write() {
        let table = Table {
            timestamp: "x".repeat(24),
            columns:   Vec::new(),
            rows:      Vec::new(),
        };
        // 16 + 24·2 + 2 = 66 > 64.
        assert!(matches!(to_bytes(&table), Err(CtError::TimestampTooLong)));
    }

    #[test]
    fn shape_violations_are_rejected_before_writing() {
        let mut table = Table {
            timestamp: "2024-01-01 00:00:00".to_string(),
            columns:   vec![Column { name: "Id".to_string(), ty: TypeCode::Dword }],
            rows:      vec![vec![Cell::Int(1)]],
        };
        assert!(matches!(to_bytes(&table), Err(CtError::CellTypeMismatch { .. })));
        table.rows = vec![vec![]];
        assert!(matches!(to_bytes(&table), Err(CtError::RowWidth { .. })));
        table.rows.clear();
        table.columns[0].name.clear();
        assert!(matches!(to_bytes(&table), Err(CtError::EmptyColumnName(0))));
    }
}
