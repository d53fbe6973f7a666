//! The source-tag-routed fan-out writer.

use super::{merge::MAX_SOURCES, Record, Writer};
use crate::error::Result;

/// Writes each record to one of the given sub-writers according to its
/// source tag: a record with source tag i goes to writer i. Combined
/// with [`super::MergeReader`], which stamps the tag, this reproduces
/// per-source streams on the output side.
pub struct MuxWriter<W> {
    writers: Vec<W>,
}

impl<W: Writer> MuxWriter<W> {
    /// Panics if given more than 255 sub-writers.
    pub fn new(writers: Vec<W>) -> Self {
        assert!(
            writers.len() <= MAX_SOURCES,
            "cannot mux more than {MAX_SOURCES} sub-writers"
        );
        Self { writers }
    }
}

impl<W: Writer> Writer for MuxWriter<W> {
    fn begin_writing(&mut self) -> Result<()> {
        for writer in &mut self.writers {
            writer.begin_writing()?;
        }
        Ok(())
    }

    fn write_record(&mut self, record: Record) -> Result<()> {
        let index = record.source_tag as usize;
        assert!(
            index < self.writers.len(),
            "record source tag {index} has no sub-writer (have {})",
            self.writers.len()
        );
        self.writers[index].write_record(record)
    }

    fn end_writing(&mut self) -> Result<()> {
        for writer in &mut self.writers {
            writer.end_writing()?;
        }
        Ok(())
    }
}
