//! In-memory table model shared by every codec.
//!
//! A [`Table`] is produced by one reader, handed to one writer, and then
//! dropped.  Cells are tagged variants over the ten wire types; a cell's
//! tag must always equal its column's [`TypeCode`].

use std::fmt;

use chrono::Local;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValueError {
    #[error("value {value} does not fit {ty}")]
    OutOfRange { ty: TypeCode, value: i128 },
    #[error("cannot interpret {text:?} as {ty}")]
    Parse { ty: TypeCode, text: String },
}

// ── TypeCode ─────────────────────────────────────────────────────────────────

/// Column type tag as it appears in the schema section of a .ct file.
///
/// Code 10 is absent from the client's table and is rejected on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCode {
    Byte,
    Short,
    Word,
    Int,
    Dword,
    DwordHex,
    String,
    Float,
    Int64,
    Bool,
}

impl TypeCode {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            2 => Some(TypeCode::Byte),
            3 => Some(TypeCode::Short),
            4 => Some(TypeCode::Word),
            5 => Some(TypeCode::Int),
            6 => Some(TypeCode::Dword),
            7 => Some(TypeCode::DwordHex),
            8 => Some(TypeCode::String),
            9 => Some(TypeCode::Float),
            11 => Some(TypeCode::Int64),
            12 => Some(TypeCode::Bool),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            TypeCode::Byte => 2,
            TypeCode::Short => 3,
            TypeCode::Word => 4,
            TypeCode::Int => 5,
            TypeCode::Dword => 6,
            TypeCode::DwordHex => 7,
            TypeCode::String => 8,
            TypeCode::Float => 9,
            TypeCode::Int64 => 11,
            TypeCode::Bool => 12,
        }
    }

    /// Uppercase name used in the spreadsheet type row.
    pub fn name(self) -> &'static str {
        match self {
            TypeCode::Byte => "BYTE",
            TypeCode::Short => "SHORT",
            TypeCode::Word => "WORD",
            TypeCode::Int => "INT",
            TypeCode::Dword => "DWORD",
            TypeCode::DwordHex => "DWORD_HEX",
            TypeCode::String => "STRING",
            TypeCode::Float => "FLOAT",
            TypeCode::Int64 => "INT64",
            TypeCode::Bool => "BOOL",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        [
            TypeCode::Byte,
            TypeCode::Short,
            TypeCode::Word,
            TypeCode::Int,
            TypeCode::Dword,
            TypeCode::DwordHex,
            TypeCode::String,
            TypeCode::Float,
            TypeCode::Int64,
            TypeCode::Bool,
        ]
        .into_iter()
        .find(|ty| ty.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Cell ─────────────────────────────────────────────────────────────────────

/// One typed value.  The variant is the authoritative type tag; integer
/// variants cannot hold out-of-range values by construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Byte(u8),
    Short(i16),
    Word(u16),
    Int(i32),
    Dword(u32),
    DwordHex(u32),
    String(String),
    Float(f32),
    Int64(u64),
    Bool(bool),
}

impl Cell {
    pub fn type_code(&self) -> TypeCode {
        match self {
            Cell::Byte(_) => TypeCode::Byte,
            Cell::Short(_) => TypeCode::Short,
            Cell::Word(_) => TypeCode::Word,
            Cell::Int(_) => TypeCode::Int,
            Cell::Dword(_) => TypeCode::Dword,
            Cell::DwordHex(_) => TypeCode::DwordHex,
            Cell::String(_) => TypeCode::String,
            Cell::Float(_) => TypeCode::Float,
            Cell::Int64(_) => TypeCode::Int64,
            Cell::Bool(_) => TypeCode::Bool,
        }
    }

    /// The value an empty spreadsheet cell stands for.
    pub fn null(ty: TypeCode) -> Cell {
        match ty {
            TypeCode::Byte => Cell::Byte(0),
            TypeCode::Short => Cell::Short(0),
            TypeCode::Word => Cell::Word(0),
            TypeCode::Int => Cell::Int(0),
            TypeCode::Dword => Cell::Dword(0),
            TypeCode::DwordHex => Cell::DwordHex(0),
            TypeCode::String => Cell::String(String::new()),
            TypeCode::Float => Cell::Float(0.0),
            TypeCode::Int64 => Cell::Int64(0),
            TypeCode::Bool => Cell::Bool(false),
        }
    }

    /// Build an integer cell, checking the declared type's domain.
    pub fn from_int(ty: TypeCode, value: i128) -> Result<Cell, ValueError> {
        let out_of_range = || ValueError::OutOfRange { ty, value };
        Ok(match ty {
            TypeCode::Byte => Cell::Byte(u8::try_from(value).map_err(|_| out_of_range())?),
            TypeCode::Short => Cell::Short(i16::try_from(value).map_err(|_| out_of_range())?),
            TypeCode::Word => Cell::Word(u16::try_from(value).map_err(|_| out_of_range())?),
            TypeCode::Int => Cell::Int(i32::try_from(value).map_err(|_| out_of_range())?),
            TypeCode::Dword => Cell::Dword(u32::try_from(value).map_err(|_| out_of_range())?),
            TypeCode::DwordHex => Cell::DwordHex(u32::try_from(value).map_err(|_| out_of_range())?),
            TypeCode::Int64 => Cell::Int64(u64::try_from(value).map_err(|_| out_of_range())?),
            TypeCode::Float => Cell::Float(value as f32),
            TypeCode::Bool => match value {
                0 => Cell::Bool(false),
                1 => Cell::Bool(true),
                _ => return Err(out_of_range()),
            },
            TypeCode::String => Cell::String(value.to_string()),
        })
    }

    /// Build a cell from a spreadsheet number.  Integer targets truncate the
    /// fractional part toward zero, matching how the reference tool coerces
    /// values like `1.0`.
    pub fn from_float(ty: TypeCode, value: f64) -> Result<Cell, ValueError> {
        match ty {
            TypeCode::Float => Ok(Cell::Float(value as f32)),
            TypeCode::String => Ok(Cell::String(value.to_string())),
            _ => {
                if !value.is_finite() {
                    return Err(ValueError::Parse { ty, text: value.to_string() });
                }
                Cell::from_int(ty, value.trunc() as i128)
            }
        }
    }

    /// Parse the text form of a cell for the declared type.
    ///
    /// DWORD_HEX accepts `0x`-prefixed hex (any case) with a decimal
    /// fallback; BOOL accepts TRUE/FALSE (any case) and 1/0; the other
    /// integer types accept decimal with a float fallback for spreadsheet
    /// spellings like `"1.0"`.
    pub fn parse(ty: TypeCode, text: &str) -> Result<Cell, ValueError> {
        let parse_err = || ValueError::Parse { ty, text: text.to_string() };
        match ty {
            TypeCode::String => Ok(Cell::String(text.to_string())),
            TypeCode::Float => text
                .trim()
                .parse::<f32>()
                .map(Cell::Float)
                .map_err(|_| parse_err()),
            TypeCode::Bool => {
                let t = text.trim();
                if t.eq_ignore_ascii_case("true") || t == "1" {
                    Ok(Cell::Bool(true))
                } else if t.eq_ignore_ascii_case("false") || t == "0" {
                    Ok(Cell::Bool(false))
                } else {
                    Err(parse_err())
                }
            }
            TypeCode::DwordHex => {
                let t = text.trim();
                let value = if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
                    i128::from_str_radix(hex, 16).map_err(|_| parse_err())?
                } else {
                    t.parse::<i128>().map_err(|_| parse_err())?
                };
                Cell::from_int(ty, value)
            }
            _ => {
                let t = text.trim();
                let value = match t.parse::<i128>() {
                    Ok(v) => v,
                    Err(_) => {
                        let f = t.parse::<f64>().map_err(|_| parse_err())?;
                        if !f.is_finite() {
                            return Err(parse_err());
                        }
                        f.trunc() as i128
                    }
                };
                Cell::from_int(ty, value)
            }
        }
    }

    /// Text rendering used by the CSV surface and for DWORD_HEX display.
    pub fn to_display(&self) -> String {
        match self {
            Cell::Byte(v) => v.to_string(),
            Cell::Short(v) => v.to_string(),
            Cell::Word(v) => v.to_string(),
            Cell::Int(v) => v.to_string(),
            Cell::Dword(v) => v.to_string(),
            Cell::DwordHex(v) => format!("0x{v:08X}"),
            Cell::String(s) => s.clone(),
            Cell::Float(v) => v.to_string(),
            Cell::Int64(v) => v.to_string(),
            Cell::Bool(v) => if *v { "TRUE" } else { "FALSE" }.to_string(),
        }
    }
}

// ── Table ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub ty:   TypeCode,
}

/// One decoded table: header timestamp, schema, and row-major cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    /// Opaque "YYYY-MM-DD HH:MM:SS" tag from the .ct header.  Informational;
    /// carried verbatim, never normalized.
    pub timestamp: String,
    pub columns:   Vec<Column>,
    pub rows:      Vec<Vec<Cell>>,
}

impl Table {
    /// Timestamp for tables coming from formats with no timestamp channel.
    pub fn now_timestamp() -> String {
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }
}
