//! Sorted record stores and the composable readers and writers built
//! over them.
//!
//! Stores are described by capability traits rather than a concrete
//! type: [`Reader`], [`Writer`], [`Seeker`] and [`Deleter`], with named
//! combinations for stores offering several capabilities at once.
//! Composite readers and writers (merge, mux, filters, truncation) are
//! polymorphic over the minimum capability they need.

pub mod csv;
pub mod db;
pub mod filter;
pub mod memory;
pub mod merge;
pub mod mux;
pub mod truncate;

pub use csv::{Column, CsvWriter};
pub use db::{Backend, BackendIter, DbStore, OpenOptions};
pub use filter::{PrefixIncludingReader, RangeExcludingReader, RangeIncludingReader};
pub use memory::MemStore;
pub use merge::MergeReader;
pub use mux::MuxWriter;
pub use truncate::TruncatingWriter;

use crate::error::Result;

/// A single sorted-store entry and the unit of record processing.
///
/// Keys are opaque bytes ordered by unsigned bytewise comparison; the
/// [`crate::codec`] module is the recommended way to build them. The
/// source tag identifies the originating sub-reader after a merge and
/// selects the sub-writer in a mux.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub source_tag: u8,
}

impl Record {
    /// Convenience constructor, mostly useful in tests.
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>, source_tag: u8) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            source_tag,
        }
    }
}

/// A store from which records can be read in ascending key order. Call
/// begin_reading, then read_record until it returns None, then
/// end_reading. Records handed out are owned by the caller.
pub trait Reader {
    fn begin_reading(&mut self) -> Result<()>;
    fn read_record(&mut self) -> Result<Option<Record>>;
    fn end_reading(&mut self) -> Result<()>;
}

/// A store to which records can be written. Call begin_writing, then
/// write_record, then end_writing. Writing an existing key upserts.
pub trait Writer {
    fn begin_writing(&mut self) -> Result<()>;
    fn write_record(&mut self, record: Record) -> Result<()>;
    fn end_writing(&mut self) -> Result<()>;
}

/// A reader that can reposition its cursor at the smallest key greater
/// than or equal to the given key. Like read_record, seek may only be
/// used between begin_reading and end_reading.
pub trait Seeker: Reader {
    fn seek(&mut self, key: &[u8]) -> Result<()>;
}

/// A writer that can erase every key from the store. Like write_record,
/// delete_all may only be used between begin_writing and end_writing.
pub trait Deleter: Writer {
    fn delete_all(&mut self) -> Result<()>;
}

/// A store that is both a Reader and a Writer.
pub trait ReadingWriter: Reader + Writer {}
impl<T: Reader + Writer> ReadingWriter for T {}

/// A store that is both a Seeker and a Writer.
pub trait SeekingWriter: Seeker + Writer {}
impl<T: Seeker + Writer> SeekingWriter for T {}

/// A store that is both a Reader and a Deleter.
pub trait ReadingDeleter: Reader + Deleter {}
impl<T: Reader + Deleter> ReadingDeleter for T {}

/// A store that is both a Seeker and a Deleter.
pub trait SeekingDeleter: Seeker + Deleter {}
impl<T: Seeker + Deleter> SeekingDeleter for T {}

impl Reader for Box<dyn Reader + Send> {
    fn begin_reading(&mut self) -> Result<()> {
        (**self).begin_reading()
    }
    fn read_record(&mut self) -> Result<Option<Record>> {
        (**self).read_record()
    }
    fn end_reading(&mut self) -> Result<()> {
        (**self).end_reading()
    }
}

impl Reader for Box<dyn Seeker + Send> {
    fn begin_reading(&mut self) -> Result<()> {
        (**self).begin_reading()
    }
    fn read_record(&mut self) -> Result<Option<Record>> {
        (**self).read_record()
    }
    fn end_reading(&mut self) -> Result<()> {
        (**self).end_reading()
    }
}

impl Seeker for Box<dyn Seeker + Send> {
    fn seek(&mut self, key: &[u8]) -> Result<()> {
        (**self).seek(key)
    }
}

impl Writer for Box<dyn Writer + Send> {
    fn begin_writing(&mut self) -> Result<()> {
        (**self).begin_writing()
    }
    fn write_record(&mut self, record: Record) -> Result<()> {
        (**self).write_record(record)
    }
    fn end_writing(&mut self) -> Result<()> {
        (**self).end_writing()
    }
}

impl Writer for Box<dyn Deleter + Send> {
    fn begin_writing(&mut self) -> Result<()> {
        (**self).begin_writing()
    }
    fn write_record(&mut self, record: Record) -> Result<()> {
        (**self).write_record(record)
    }
    fn end_writing(&mut self) -> Result<()> {
        (**self).end_writing()
    }
}

impl Deleter for Box<dyn Deleter + Send> {
    fn delete_all(&mut self) -> Result<()> {
        (**self).delete_all()
    }
}

/// Runs a full read session against the store and collects every
/// record. Useful for draining small stores and in tests.
pub fn read_all<R: Reader + ?Sized>(reader: &mut R) -> Result<Vec<Record>> {
    reader.begin_reading()?;
    let mut records = Vec::new();
    while let Some(record) = reader.read_record()? {
        records.push(record);
    }
    reader.end_reading()?;
    Ok(records)
}

/// Runs a full write session putting every record into the store.
pub fn write_all<W: Writer + ?Sized>(writer: &mut W, records: Vec<Record>) -> Result<()> {
    writer.begin_writing()?;
    for record in records {
        writer.write_record(record)?;
    }
    writer.end_writing()
}
