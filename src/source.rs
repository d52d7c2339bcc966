//! Row sources consumed by the mapper.
//!
//! [`RowSource`] is the forward-only cursor contract the compiled routines
//! read from: cell access by column name, ordinal lookup, a null test by
//! ordinal, and `advance`. Two implementations are provided:
//!
//! - [`Table`] / [`TableReader`]: rows held in memory, read through a cursor
//!   borrowed from the table.
//! - [`CsvSource`]: a streaming CSV reader with a header row. Every
//!   non-empty field is handed out as [`Value::String`]; empty fields are null.

use std::{collections::HashMap, io::Read, path::Path};

use anyhow::{Context, Result};

use crate::{error::MapError, io_utils, value::Value};

pub trait RowSource {
    /// Cell of the current row, `None` when the cell is null or the column
    /// is unknown.
    fn get(&self, column: &str) -> Option<&Value>;

    fn ordinal(&self, column: &str) -> Option<usize>;

    /// Whether the current row holds no value at `ordinal`.
    fn is_null(&self, ordinal: usize) -> bool;

    /// Moves to the next row, returning `false` once the source is exhausted.
    fn advance(&mut self) -> Result<bool, MapError>;
}

#[derive(Debug, Clone, Default)]
struct ColumnIndex {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    fn new(names: Vec<String>) -> Self {
        let mut positions = HashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            positions.entry(name.clone()).or_insert(idx);
        }
        Self { names, positions }
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    fn len(&self) -> usize {
        self.names.len()
    }
}

/// In-memory rows with named columns.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: ColumnIndex,
    rows: Vec<Vec<Option<Value>>>,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: ColumnIndex::new(columns.into_iter().map(Into::into).collect()),
            rows: Vec::new(),
        }
    }

    pub fn push_row<I>(&mut self, cells: I) -> Result<(), MapError>
    where
        I: IntoIterator<Item = Option<Value>>,
    {
        let row: Vec<Option<Value>> = cells.into_iter().collect();
        if row.len() != self.columns.len() {
            return Err(MapError::Source(format!(
                "Row has {} cell(s) but the table defines {} column(s)",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns.names
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cursor positioned before the first row.
    pub fn reader(&self) -> TableReader<'_> {
        TableReader {
            table: self,
            position: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableReader<'a> {
    table: &'a Table,
    position: Option<usize>,
}

impl TableReader<'_> {
    fn current(&self) -> Option<&[Option<Value>]> {
        self.position
            .and_then(|idx| self.table.rows.get(idx))
            .map(Vec::as_slice)
    }
}

impl RowSource for TableReader<'_> {
    fn get(&self, column: &str) -> Option<&Value> {
        let ordinal = self.table.columns.position(column)?;
        self.current()?.get(ordinal)?.as_ref()
    }

    fn ordinal(&self, column: &str) -> Option<usize> {
        self.table.columns.position(column)
    }

    fn is_null(&self, ordinal: usize) -> bool {
        self.current()
            .and_then(|row| row.get(ordinal))
            .is_none_or(Option::is_none)
    }

    fn advance(&mut self) -> Result<bool, MapError> {
        let next = self.position.map_or(0, |idx| idx + 1);
        if next < self.table.rows.len() {
            self.position = Some(next);
            Ok(true)
        } else {
            self.position = Some(self.table.rows.len());
            Ok(false)
        }
    }
}

/// Streaming CSV rows keyed by the header record.
pub struct CsvSource<R: Read> {
    reader: csv::Reader<R>,
    columns: ColumnIndex,
    record: csv::StringRecord,
    cells: Vec<Option<Value>>,
    rows_read: usize,
}

impl<R: Read> CsvSource<R> {
    pub fn new(mut reader: csv::Reader<R>) -> Result<Self, MapError> {
        let headers = reader
            .headers()?
            .iter()
            .map(|name| name.trim().to_string())
            .collect::<Vec<_>>();
        Ok(Self {
            reader,
            columns: ColumnIndex::new(headers),
            record: csv::StringRecord::new(),
            cells: Vec::new(),
            rows_read: 0,
        })
    }

    pub fn from_reader(reader: R, delimiter: u8) -> Result<Self, MapError> {
        Self::new(io_utils::open_csv_reader(reader, delimiter))
    }

    pub fn headers(&self) -> &[String] {
        &self.columns.names
    }

    pub fn rows_read(&self) -> usize {
        self.rows_read
    }
}

impl CsvSource<Box<dyn Read>> {
    /// Opens `path` (or stdin for `-`), deriving the delimiter from the
    /// extension unless one is provided.
    pub fn from_path(path: &Path, delimiter: Option<u8>) -> Result<Self> {
        let delimiter = io_utils::resolve_input_delimiter(path, delimiter);
        let reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
        Self::new(reader).with_context(|| format!("Reading CSV headers from {path:?}"))
    }
}

impl<R: Read> RowSource for CsvSource<R> {
    fn get(&self, column: &str) -> Option<&Value> {
        let ordinal = self.columns.position(column)?;
        self.cells.get(ordinal)?.as_ref()
    }

    fn ordinal(&self, column: &str) -> Option<usize> {
        self.columns.position(column)
    }

    fn is_null(&self, ordinal: usize) -> bool {
        self.cells.get(ordinal).is_none_or(Option::is_none)
    }

    fn advance(&mut self) -> Result<bool, MapError> {
        if !self.reader.read_record(&mut self.record)? {
            self.cells.clear();
            return Ok(false);
        }
        self.cells.clear();
        self.cells.extend(self.record.iter().map(|field| {
            if field.is_empty() {
                None
            } else {
                Some(Value::String(field.to_string()))
            }
        }));
        self.rows_read += 1;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Table {
        let mut table = Table::new(["name", "age"]);
        table
            .push_row([Some(Value::from("Ann")), Some(Value::from(30))])
            .unwrap();
        table.push_row([Some(Value::from("Bob")), None]).unwrap();
        table
    }

    #[test]
    fn table_reader_walks_rows_in_order() {
        let table = sample_table();
        let mut reader = table.reader();
        assert!(reader.get("name").is_none());

        assert!(reader.advance().unwrap());
        assert_eq!(reader.get("name"), Some(&Value::from("Ann")));
        assert_eq!(reader.get("age"), Some(&Value::Integer(30)));

        assert!(reader.advance().unwrap());
        let age = reader.ordinal("age").unwrap();
        assert!(reader.is_null(age));
        assert!(reader.get("age").is_none());

        assert!(!reader.advance().unwrap());
        assert!(!reader.advance().unwrap());
    }

    #[test]
    fn table_rejects_rows_with_wrong_width() {
        let mut table = Table::new(["a", "b"]);
        let err = table.push_row([Some(Value::from(1))]).unwrap_err();
        assert!(matches!(err, MapError::Source(_)));
        assert!(table.is_empty());
    }

    #[test]
    fn unknown_columns_have_no_ordinal() {
        let table = sample_table();
        let reader = table.reader();
        assert_eq!(reader.ordinal("missing"), None);
        assert_eq!(reader.ordinal("age"), Some(1));
    }

    #[test]
    fn csv_source_treats_empty_fields_as_null() {
        let data = "name, age\nAnn,30\n,41\n";
        let mut source = CsvSource::from_reader(data.as_bytes(), b',').unwrap();
        assert_eq!(source.headers(), ["name", "age"]);

        assert!(source.advance().unwrap());
        assert_eq!(source.get("age"), Some(&Value::from("30")));

        assert!(source.advance().unwrap());
        assert!(source.is_null(0));
        assert_eq!(source.get("age"), Some(&Value::from("41")));

        assert!(!source.advance().unwrap());
        assert_eq!(source.rows_read(), 2);
    }
}
