//! The store adapter over an embedded sorted key/value backend.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{Deleter, Reader, Record, Seeker, Writer};
use crate::error::Result;
use crate::metrics;

/// Options for opening a backend database.
#[derive(Clone, Debug)]
pub struct OpenOptions {
    /// Maximum number of open files the backend may hold. Accepted for
    /// contract parity; file-per-level backends use it, the embedded
    /// [`crate::kv::Db`] does not.
    pub max_open_files: u32,
    /// Create the database if it does not already exist.
    pub create_if_missing: bool,
    /// Backend block or write-buffer size in bytes.
    pub block_size: usize,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            max_open_files: 128,
            create_if_missing: true,
            block_size: 4 << 20,
        }
    }
}

impl OpenOptions {
    pub fn max_open_files(mut self, n: u32) -> Self {
        self.max_open_files = n;
        self
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn block_size(mut self, bytes: usize) -> Self {
        self.block_size = bytes;
        self
    }
}

/// The contract a sorted key/value backend must honour to be wrapped by
/// [`DbStore`]: open with options, forward iteration with seek, point
/// puts, and point deletes. Implementations are cheap-to-clone handles;
/// iterators hold their own handle and stay valid for the session.
pub trait Backend: Clone + Send + 'static {
    type Iter: BackendIter + Send;

    fn open(path: &Path, opts: &OpenOptions) -> Result<Self>;
    fn iter(&self) -> Self::Iter;
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;
    fn delete(&self, key: &[u8]) -> Result<()>;
    /// Flush buffered writes. Called when a write session ends.
    fn sync(&self) -> Result<()>;
}

/// A forward cursor over a backend's sorted contents. `key` and `value`
/// may only be called while `valid` returns true; `error` reports any
/// failure that terminated iteration early.
pub trait BackendIter {
    fn seek_first(&mut self);
    fn seek(&mut self, key: &[u8]);
    fn valid(&self) -> bool;
    fn next(&mut self);
    fn key(&self) -> &[u8];
    fn value(&self) -> &[u8];
    fn error(&self) -> Result<()>;
}

struct Shared<B> {
    path: PathBuf,
    opts: OpenOptions,
    db: Option<B>,
    reading: bool,
    writing: bool,
}

/// A store over a backend database. The database is opened lazily on
/// the first `begin_*` and closed when the last session ends, so a
/// store constructed for a pipeline costs nothing until its stage runs.
///
/// Handles are cheap clones sharing one underlying database, which lets
/// a stage read and write the same store from different worker threads.
/// At most one read session and one write session may be active at a
/// time; a second concurrent `begin_reading` or `begin_writing` is a
/// programmer error and panics.
pub struct DbStore<B: Backend> {
    shared: Arc<Mutex<Shared<B>>>,
    iter: Option<B::Iter>,
    write_db: Option<B>,
}

impl<B: Backend> Clone for DbStore<B> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            iter: None,
            write_db: None,
        }
    }
}

impl<B: Backend> DbStore<B> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_options(path, OpenOptions::default())
    }

    pub fn with_options(path: impl Into<PathBuf>, opts: OpenOptions) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                path: path.into(),
                opts,
                db: None,
                reading: false,
                writing: false,
            })),
            iter: None,
            write_db: None,
        }
    }

    fn acquire(&self, writing: bool) -> Result<B> {
        let mut shared = self.shared.lock()?;
        if writing && shared.writing {
            panic!("only one session may write to a store at a time");
        }
        if !writing && shared.reading {
            panic!("only one session may read from a store at a time");
        }
        if shared.db.is_none() {
            shared.db = Some(B::open(&shared.path, &shared.opts)?);
        }
        if writing {
            shared.writing = true;
        } else {
            shared.reading = true;
        }
        Ok(shared.db.clone().expect("database was just opened"))
    }

    fn release(&self, writing: bool) -> Result<()> {
        let mut shared = self.shared.lock()?;
        if writing {
            shared.writing = false;
        } else {
            shared.reading = false;
        }
        if !shared.reading && !shared.writing {
            shared.db = None;
        }
        Ok(())
    }
}

impl<B: Backend> Reader for DbStore<B> {
    fn begin_reading(&mut self) -> Result<()> {
        let db = self.acquire(false)?;
        let mut iter = db.iter();
        iter.seek_first();
        self.iter = Some(iter);
        Ok(())
    }

    fn read_record(&mut self) -> Result<Option<Record>> {
        let iter = self
            .iter
            .as_mut()
            .expect("read_record called outside a reading session");
        if !iter.valid() {
            iter.error()?;
            return Ok(None);
        }
        let record = Record {
            key: iter.key().to_vec(),
            value: iter.value().to_vec(),
            source_tag: 0,
        };
        metrics::RECORDS_READ.add(1);
        metrics::BYTES_READ.add((record.key.len() + record.value.len()) as i64);
        iter.next();
        Ok(Some(record))
    }

    fn end_reading(&mut self) -> Result<()> {
        assert!(
            self.iter.take().is_some(),
            "end_reading called outside a reading session"
        );
        self.release(false)
    }
}

impl<B: Backend> Seeker for DbStore<B> {
    fn seek(&mut self, key: &[u8]) -> Result<()> {
        let iter = self
            .iter
            .as_mut()
            .expect("seek called outside a reading session");
        iter.seek(key);
        metrics::SEEKS.add(1);
        Ok(())
    }
}

impl<B: Backend> Writer for DbStore<B> {
    fn begin_writing(&mut self) -> Result<()> {
        self.write_db = Some(self.acquire(true)?);
        Ok(())
    }

    fn write_record(&mut self, record: Record) -> Result<()> {
        let db = self
            .write_db
            .as_ref()
            .expect("write_record called outside a writing session");
        db.put(&record.key, &record.value)?;
        metrics::RECORDS_WRITTEN.add(1);
        metrics::BYTES_WRITTEN.add((record.key.len() + record.value.len()) as i64);
        Ok(())
    }

    fn end_writing(&mut self) -> Result<()> {
        let db = self
            .write_db
            .take()
            .expect("end_writing called outside a writing session");
        db.sync()?;
        self.release(true)
    }
}

impl<B: Backend> Deleter for DbStore<B> {
    fn delete_all(&mut self) -> Result<()> {
        let db = self
            .write_db
            .as_ref()
            .expect("delete_all called outside a writing session");
        let mut iter = db.iter();
        iter.seek_first();
        while iter.valid() {
            db.delete(iter.key())?;
            iter.next();
        }
        iter.error()
    }
}
