//! XLSX surface — the human-editable sibling of a .ct table.
//!
//! Sheet 1 carries the whole table under a fixed convention: row 1 holds the
//! uppercase type names, row 2 the column names, rows 3+ the data.  Types
//! ride in row 1 rather than in cell formatting so a round trip preserves
//! declared widths, not just printable values.
//!
//! The header timestamp travels in the custom document property
//! `CT_Timestamp`.  `calamine` reads cells but not custom properties, so
//! the reader re-opens the workbook container and pulls the property out of
//! `docProps/custom.xml` directly.

use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::Path;

use calamine::{Data, Reader, Xlsx};
use quick_xml::events::Event;
use rust_xlsxwriter::{DocProperties, Workbook};
use thiserror::Error;

use crate::table::{Cell, Column, Table, TypeCode, ValueError};

/// Custom document property carrying the .ct header timestamp verbatim.
pub const TIMESTAMP_PROPERTY: &str = "CT_Timestamp";

/// Hard sheet limit; a wider table cannot be represented.
const MAX_COLUMNS: usize = 16_384;

#[derive(Error, Debug)]
pub enum XlsxError {
    #[error("workbook has no sheets")]
    NoSheet,
    #[error("sheet is missing the type and name rows")]
    MissingSchemaRows,
    #[error("unknown type name {0:?}")]
    UnknownType(String),
    #[error("column {0} has an empty name")]
    EmptyColumnName(usize),
    #[error("table has {0} columns, sheets allow {MAX_COLUMNS}")]
    TooManyColumns(usize),
    #[error("cell {row}:{col}: {source}")]
    BadCell { row: u32, col: u32, source: ValueError },
    #[error("failed to read workbook: {0}")]
    Read(#[from] calamine::XlsxError),
    #[error("failed to write workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),
    #[error("workbook container error: {0}")]
    Container(#[from] zip::result::ZipError),
    #[error("malformed document properties: {0}")]
    Properties(#[from] quick_xml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

// ── Read path ────────────────────────────────────────────────────────────────

/// Decode a workbook image into a [`Table`].
///
/// A workbook with no `CT_Timestamp` property gets a fresh timestamp, the
/// same fallback the reference tool applies.
pub fn from_bytes(bytes: &[u8]) -> Result<Table, XlsxError> {
    let timestamp = read_timestamp_property(bytes)?.unwrap_or_else(Table::now_timestamp);

    let mut workbook = Xlsx::new(Cursor::new(bytes))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Err(XlsxError::NoSheet),
    };
    if range.is_empty() {
        return Ok(Table { timestamp, columns: Vec::new(), rows: Vec::new() });
    }

    let mut sheet_rows = range.rows();
    let type_row = sheet_rows.next().ok_or(XlsxError::MissingSchemaRows)?;
    let name_row = sheet_rows.next().ok_or(XlsxError::MissingSchemaRows)?;

    let mut columns = Vec::new();
    for (c, data) in type_row.iter().enumerate() {
        if matches!(data, Data::Empty) {
            break;
        }
        let type_name = data.to_string();
        let ty = TypeCode::from_name(&type_name).ok_or(XlsxError::UnknownType(type_name))?;
        let name = match name_row.get(c) {
            Some(Data::Empty) | None => return Err(XlsxError::EmptyColumnName(c)),
            Some(data) => data.to_string(),
        };
        if name.is_empty() {
            return Err(XlsxError::EmptyColumnName(c));
        }
        columns.push(Column { name, ty });
    }

    let mut rows = Vec::new();
    for (r, sheet_row) in sheet_rows.enumerate() {
        if sheet_row.iter().all(|data| matches!(data, Data::Empty)) {
            continue;
        }
        let mut row = Vec::with_capacity(columns.len());
        for (c, column) in columns.iter().enumerate() {
            let data = sheet_row.get(c).unwrap_or(&Data::Empty);
            let cell = convert_cell(data, column.ty).map_err(|source| XlsxError::BadCell {
                row: r as u32 + 3,
                col: c as u32 + 1,
                source,
            })?;
            row.push(cell);
        }
        rows.push(row);
    }

    Ok(Table { timestamp, columns, rows })
}

/// Read and decode a workbook file.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Table, XlsxError> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    from_bytes(&bytes)
}

fn convert_cell(data: &Data, ty: TypeCode) -> Result<Cell, ValueError> {
    match data {
        Data::Empty => Ok(Cell::null(ty)),
        Data::String(text) => Cell::parse(ty, text),
        Data::Float(value) => Cell::from_float(ty, *value),
        Data::Int(value) => match ty {
            TypeCode::Float => Ok(Cell::Float(*value as f32)),
            _ => Cell::from_int(ty, *value as i128),
        },
        Data::Bool(value) => match ty {
            TypeCode::Bool => Ok(Cell::Bool(*value)),
            _ => Cell::parse(ty, &data.to_string()),
        },
        other => Err(ValueError::Parse { ty, text: other.to_string() }),
    }
}

/// Extract the `CT_Timestamp` custom property from `docProps/custom.xml`.
fn read_timestamp_property(bytes: &[u8]) -> Result<Option<String>, XlsxError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    match archive.by_name("docProps/custom.xml") {
        Ok(mut entry) => {
            entry.read_to_string(&mut xml)?;
        }
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let mut reader = quick_xml::Reader::from_str(&xml);
    let mut in_target = false;
    let mut in_value = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"property" => {
                let name = e
                    .try_get_attribute("name")
                    .map_err(quick_xml::Error::from)?
                    .map(|attr| attr.decode_and_unescape_value(&reader).map(|v| v.into_owned()))
                    .transpose()?;
                in_target = name.as_deref() == Some(TIMESTAMP_PROPERTY);
            }
            Event::Start(e) if in_target && e.local_name().as_ref() == b"lpwstr" => {
                in_value = true;
            }
            Event::Text(text) if in_value => {
                return Ok(Some(text.unescape()?.into_owned()));
            }
            Event::End(e) if e.local_name().as_ref() == b"property" => {
                in_target = false;
                in_value = false;
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

// ── Write path ───────────────────────────────────────────────────────────────

/// Encode a table as a workbook image.
///
/// Integers and floats become sheet numbers; DWORD_HEX becomes
/// `0x`-prefixed text so the width survives editing; BOOL becomes the
/// literal TRUE/FALSE.
pub fn to_bytes(table: &Table) -> Result<Vec<u8>, XlsxError> {
    if table.columns.len() > MAX_COLUMNS {
        return Err(XlsxError::TooManyColumns(table.columns.len()));
    }

    let mut workbook = Workbook::new();
    let properties =
        DocProperties::new().set_custom_property(TIMESTAMP_PROPERTY, table.timestamp.as_str());
    workbook.set_properties(&properties);

    let worksheet = workbook.add_worksheet();
    for (c, column) in table.columns.iter().enumerate() {
        worksheet.write_string(0, c as u16, column.ty.name())?;
        worksheet.write_string(1, c as u16, column.name.as_str())?;
    }
    for (r, row) in table.rows.iter().enumerate() {
        let sheet_row = r as u32 + 2;
        for (c, cell) in row.iter().enumerate() {
            let sheet_col = c as u16;
            match cell {
                Cell::Byte(v) => worksheet.write_number(sheet_row, sheet_col, *v as f64)?,
                Cell::Short(v) => worksheet.write_number(sheet_row, sheet_col, *v as f64)?,
                Cell::Word(v) => worksheet.write_number(sheet_row, sheet_col, *v as f64)?,
                Cell::Int(v) => worksheet.write_number(sheet_row, sheet_col, *v as f64)?,
                Cell::Dword(v) => worksheet.write_number(sheet_row, sheet_col, *v as f64)?,
                Cell::DwordHex(_) => {
                    worksheet.write_string(sheet_row, sheet_col, cell.to_display())?
                }
                Cell::String(s) => worksheet.write_string(sheet_row, sheet_col, s.as_str())?,
                Cell::Float(v) => worksheet.write_number(sheet_row, sheet_col, *v as f64)?,
                // Above 2^53 a sheet number loses bits; the reader accepts
                // text in integer columns for exactly this case.
                Cell::Int64(v) => worksheet.write_number(sheet_row, sheet_col, *v as f64)?,
                Cell::Bool(v) => worksheet.write_string(
                    sheet_row,
                    sheet_col,
                    if *v { "TRUE" } else { "FALSE" },
                )?,
            };
        }
    }
    worksheet.autofit();

    Ok(workbook.save_to_buffer()?)
}
