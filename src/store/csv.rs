//! A CSV sink for decoded records.

use std::io;

use crate::codec::Kind;
use crate::error::{Error, Result};
use crate::store::{Record, Writer};

/// A named, kinded column of a [`CsvWriter`].
#[derive(Clone, Debug)]
pub struct Column {
    name: String,
    kind: Kind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: Kind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Writes records as CSV rows: a header of key column names followed by
/// value column names, then one row per record with the key decoded
/// against the key columns and the value against the value columns.
///
/// The header is written by `begin_writing`, so a session that emits no
/// records still produces a header-only file.
pub struct CsvWriter<W: io::Write> {
    dest: Option<W>,
    out: Option<csv::Writer<W>>,
    key_columns: Vec<Column>,
    value_columns: Vec<Column>,
}

impl<W: io::Write> CsvWriter<W> {
    pub fn new(dest: W, key_columns: Vec<Column>, value_columns: Vec<Column>) -> Self {
        Self {
            dest: Some(dest),
            out: None,
            key_columns,
            value_columns,
        }
    }

    /// Recovers the destination, e.g. to inspect an in-memory buffer.
    /// Only available between sessions.
    pub fn into_inner(self) -> Option<W> {
        self.dest
    }

    fn decode_row(&self, record: &Record) -> Result<Vec<String>> {
        let mut row = Vec::with_capacity(self.key_columns.len() + self.value_columns.len());
        let mut rest = record.key.as_slice();
        for column in &self.key_columns {
            let (value, tail) = column.kind.read_value(rest)?;
            row.push(value.to_string());
            rest = tail;
        }
        let mut rest = record.value.as_slice();
        for column in &self.value_columns {
            let (value, tail) = column.kind.read_value(rest)?;
            row.push(value.to_string());
            rest = tail;
        }
        Ok(row)
    }
}

impl<W: io::Write> Writer for CsvWriter<W> {
    fn begin_writing(&mut self) -> Result<()> {
        let dest = self
            .dest
            .take()
            .expect("begin_writing called while a session is active");
        let mut out = csv::Writer::from_writer(dest);
        let header = self
            .key_columns
            .iter()
            .chain(&self.value_columns)
            .map(|c| c.name.as_str());
        out.write_record(header)?;
        self.out = Some(out);
        Ok(())
    }

    fn write_record(&mut self, record: Record) -> Result<()> {
        let row = self.decode_row(&record)?;
        let out = self
            .out
            .as_mut()
            .expect("write_record called outside a writing session");
        out.write_record(&row)?;
        Ok(())
    }

    fn end_writing(&mut self) -> Result<()> {
        let out = self
            .out
            .take()
            .expect("end_writing called outside a writing session");
        self.dest = Some(
            out.into_inner()
                .map_err(|e| Error::IO(e.to_string()))?,
        );
        Ok(())
    }
}
