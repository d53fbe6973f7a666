//! The delete-before-write session wrapper.

use super::{Deleter, Record, Writer};
use crate::error::Result;

/// Erases the wrapped store's contents at the start of every write
/// session, so each session replaces the store rather than merging into
/// it. Writes and session end pass straight through.
pub struct TruncatingWriter<D> {
    writer: D,
}

impl<D: Deleter> TruncatingWriter<D> {
    pub fn new(writer: D) -> Self {
        Self { writer }
    }
}

impl<D: Deleter> Writer for TruncatingWriter<D> {
    fn begin_writing(&mut self) -> Result<()> {
        self.writer.begin_writing()?;
        self.writer.delete_all()
    }

    fn write_record(&mut self, record: Record) -> Result<()> {
        self.writer.write_record(record)
    }

    fn end_writing(&mut self) -> Result<()> {
        self.writer.end_writing()
    }
}
