#![allow(dead_code)]

use std::cell::Cell;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use rowmap::{
    MapError, RowSource, Value,
    source::{Table, TableReader},
};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Builds a table with one column and `rows` copies of `value`.
pub fn single_column_table(column: &str, value: Option<Value>, rows: usize) -> Table {
    let mut table = Table::new([column]);
    for _ in 0..rows {
        table.push_row([value.clone()]).expect("row width");
    }
    table
}

/// Reader already positioned on the first row.
pub fn first_row(table: &Table) -> TableReader<'_> {
    let mut reader = table.reader();
    assert!(reader.advance().expect("advance"), "table has no rows");
    reader
}

/// Wraps a source and counts how often it is advanced.
pub struct CountingSource<R> {
    inner: R,
    advances: Cell<usize>,
}

impl<R> CountingSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            advances: Cell::new(0),
        }
    }

    pub fn advances(&self) -> usize {
        self.advances.get()
    }
}

impl<R: RowSource> RowSource for CountingSource<R> {
    fn get(&self, column: &str) -> Option<&Value> {
        self.inner.get(column)
    }

    fn ordinal(&self, column: &str) -> Option<usize> {
        self.inner.ordinal(column)
    }

    fn is_null(&self, ordinal: usize) -> bool {
        self.inner.is_null(ordinal)
    }

    fn advance(&mut self) -> Result<bool, MapError> {
        self.advances.set(self.advances.get() + 1);
        self.inner.advance()
    }
}
