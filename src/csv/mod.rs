//! CSV surface with a configurable delimiter.
//!
//! Row 1 holds the column names, row 2 the type names, rows 3+ the data.
//! The name/type order is swapped relative to the XLSX sheet; both orders
//! are historical and kept as-is.  Every cell renders as text, so
//! INT64 survives without the sheet-number precision loss.  CSV has no
//! timestamp channel; reading stamps the table with the current time.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use ::csv::{ReaderBuilder, StringRecord, WriterBuilder};
use thiserror::Error;

use crate::table::{Cell, Column, Table, TypeCode, ValueError};

pub const DEFAULT_DELIMITER: u8 = b',';

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("file is missing the name and type rows")]
    MissingSchemaRows,
    #[error("unknown type name {0:?}")]
    UnknownType(String),
    #[error("column {0} has an empty name")]
    EmptyColumnName(usize),
    #[error("name row has {names} fields, type row has {types}")]
    SchemaMismatch { names: usize, types: usize },
    #[error("row {row} has {got} fields, schema has {expected}")]
    RowWidth { row: usize, expected: usize, got: usize },
    #[error("row {row} column {col}: {source}")]
    BadCell { row: usize, col: usize, source: ValueError },
    #[error("malformed CSV: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Decode CSV text into a [`Table`].
pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Table, CsvError> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(reader);

    let mut records = csv_reader.records();
    let name_row: StringRecord = records.next().ok_or(CsvError::MissingSchemaRows)??;
    let type_row: StringRecord = records.next().ok_or(CsvError::MissingSchemaRows)??;
    if name_row.len() != type_row.len() {
        return Err(CsvError::SchemaMismatch { names: name_row.len(), types: type_row.len() });
    }

    let mut columns = Vec::with_capacity(name_row.len());
    for (c, (name, type_name)) in name_row.iter().zip(type_row.iter()).enumerate() {
        if name.is_empty() {
            return Err(CsvError::EmptyColumnName(c));
        }
        let ty = TypeCode::from_name(type_name)
            .ok_or_else(|| CsvError::UnknownType(type_name.to_string()))?;
        columns.push(Column { name: name.to_string(), ty });
    }

    let mut rows = Vec::new();
    for (r, record) in records.enumerate() {
        let record = record?;
        if record.len() != columns.len() {
            return Err(CsvError::RowWidth {
                row:      r + 3,
                expected: columns.len(),
                got:      record.len(),
            });
        }
        let mut row = Vec::with_capacity(columns.len());
        for (c, (field, column)) in record.iter().zip(&columns).enumerate() {
            let cell = if field.is_empty() && column.ty != TypeCode::String {
                Cell::null(column.ty)
            } else {
                Cell::parse(column.ty, field).map_err(|source| CsvError::BadCell {
                    row: r + 3,
                    col: c + 1,
                    source,
                })?
            };
            row.push(cell);
        }
        rows.push(row);
    }

    Ok(Table { timestamp: Table::now_timestamp(), columns, rows })
}

pub fn from_bytes(bytes: &[u8]) -> Result<Table, CsvError> {
    from_reader(bytes, DEFAULT_DELIMITER)
}

pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Table, CsvError> {
    from_reader(File::open(path)?, DEFAULT_DELIMITER)
}

/// Encode a table as CSV text.
pub fn to_bytes(table: &Table, delimiter: u8) -> Result<Vec<u8>, CsvError> {
    let mut writer = WriterBuilder::new().delimiter(delimiter).from_writer(Vec::new());

    writer.write_record(table.columns.iter().map(|column| column.name.as_str()))?;
    writer.write_record(table.columns.iter().map(|column| column.ty.name()))?;
    for row in &table.rows {
        writer.write_record(row.iter().map(Cell::to_display))?;
    }

    writer
        .into_inner()
        .map_err(|e| CsvError::Io(io::Error::new(io::ErrorKind::Other, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let table = Table {
            timestamp: Table::now_timestamp(),
            columns:   vec![
                Column { name: "Id".to_string(), ty: TypeCode::Dword },
                Column { name: "Mask".to_string(), ty: TypeCode::DwordHex },
                Column { name: "Big".to_string(), ty: TypeCode::Int64 },
                Column { name: "On".to_string(), ty: TypeCode::Bool },
            ],
            rows:      vec![vec![
                Cell::Dword(7),
                Cell::DwordHex(0xCAFE_F00D),
                // Would not survive a sheet number; text keeps every bit.
                Cell::Int64(u64::MAX),
                Cell::Bool(true),
            ]],
        };
        let bytes = to_bytes(&table, DEFAULT_DELIMITER).unwrap();
        let back = from_bytes(&bytes).unwrap();
        assert_eq!(back.columns, table.columns);
        assert_eq!(back.rows, table.rows);
    }

    #[test]
    fn tab_delimiter() {
        let text = "Id\tName\nDWORD\tSTRING\n1\tPoring\n";
        let table = from_reader(text.as_bytes(), b'\t').unwrap();
        assert_eq!(table.rows, vec![vec![Cell::Dword(1), Cell::String("Poring".to_string())]]);
    }

    #[test]
    fn ragged_row_is_rejected() {
        let text = "Id,Name\nDWORD,STRING\n1\n";
        assert!(matches!(from_bytes(text.as_bytes()), Err(CsvError::RowWidth { row: 3, .. })));
    }
}
