//! An embedded sorted key/value backend: a concurrent skiplist for the
//! live data paired with an append-only operation log for durability.
//! Implements the [`Backend`] contract consumed by
//! [`crate::store::DbStore`].

pub mod log;

use std::ops::Bound;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crossbeam_skiplist::SkipMap;

use self::log::Log;
use crate::error::Result;
use crate::errinput;
use crate::store::{Backend, BackendIter, OpenOptions};

const LOG_FILE: &str = "keymill.log";

struct Inner {
    map: SkipMap<Vec<u8>, Vec<u8>>,
    log: Mutex<Log>,
}

/// A database handle. Clones share the same underlying database;
/// iterators hold a clone and remain valid while the iteration runs.
#[derive(Clone)]
pub struct Db {
    inner: Arc<Inner>,
}

impl Db {
    /// Point lookup, mostly useful in tests.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner.map.get(key).map(|entry| entry.value().clone())
    }

    /// The number of live keys.
    pub fn len(&self) -> usize {
        self.inner.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.map.is_empty()
    }
}

impl Backend for Db {
    type Iter = Iter;

    fn open(path: &Path, opts: &OpenOptions) -> Result<Self> {
        if !path.exists() {
            if !opts.create_if_missing {
                return Err(errinput!("database {} does not exist", path.display()));
            }
            std::fs::create_dir_all(path)?;
        }

        let log = Log::open(&path.join(LOG_FILE), opts.block_size)?;
        let map = SkipMap::new();
        for entry in log.replay()? {
            let entry = entry?;
            match entry.value {
                Some(value) => {
                    map.insert(entry.key, value);
                }
                None => {
                    map.remove(&entry.key);
                }
            }
        }

        Ok(Self {
            inner: Arc::new(Inner {
                map,
                log: Mutex::new(log),
            }),
        })
    }

    fn iter(&self) -> Iter {
        Iter {
            db: self.clone(),
            current: None,
        }
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.inner.log.lock()?.append(key, Some(value))?;
        self.inner.map.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.inner.log.lock()?.append(key, None)?;
        self.inner.map.remove(key);
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.inner.log.lock()?.sync()
    }
}

/// A cursor over the skiplist. Holds owned copies of the current entry,
/// so records handed out never alias backend memory. Advancing walks to
/// the smallest key strictly greater than the current one, which keeps
/// the cursor well defined even when keys are inserted or deleted
/// mid-iteration.
pub struct Iter {
    db: Db,
    current: Option<(Vec<u8>, Vec<u8>)>,
}

impl Iter {
    fn copy(entry: crossbeam_skiplist::map::Entry<'_, Vec<u8>, Vec<u8>>) -> (Vec<u8>, Vec<u8>) {
        (entry.key().clone(), entry.value().clone())
    }
}

impl BackendIter for Iter {
    fn seek_first(&mut self) {
        self.current = self.db.inner.map.front().map(Self::copy);
    }

    fn seek(&mut self, key: &[u8]) {
        self.current = self
            .db
            .inner
            .map
            .lower_bound(Bound::Included(key))
            .map(Self::copy);
    }

    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn next(&mut self) {
        if let Some((key, _)) = &self.current {
            self.current = self
                .db
                .inner
                .map
                .lower_bound(Bound::Excluded(key.as_slice()))
                .map(Self::copy);
        }
    }

    fn key(&self) -> &[u8] {
        &self.current.as_ref().expect("iterator is not valid").0
    }

    fn value(&self) -> &[u8] {
        &self.current.as_ref().expect("iterator is not valid").1
    }

    fn error(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(dir: &tempfile::TempDir) -> Db {
        Db::open(&dir.path().join("db"), &OpenOptions::default()).unwrap()
    }

    #[test]
    fn put_get_delete() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = open(&dir);

        db.put(b"a", b"1").unwrap();
        db.put(b"a", b"2").unwrap();
        db.put(b"b", b"3").unwrap();
        assert_eq!(db.get(b"a"), Some(b"2".to_vec()));

        db.delete(b"a").unwrap();
        assert_eq!(db.get(b"a"), None);
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn iterates_in_key_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = open(&dir);

        for key in ["c", "a", "d", "b"] {
            db.put(key.as_bytes(), b"v").unwrap();
        }

        let mut iter = db.iter();
        iter.seek_first();
        let mut keys = Vec::new();
        while iter.valid() {
            keys.push(iter.key().to_vec());
            iter.next();
        }
        assert_eq!(
            keys,
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]
        );
    }

    #[test]
    fn seek_finds_smallest_key_not_below() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = open(&dir);

        for key in ["a", "c", "e"] {
            db.put(key.as_bytes(), b"v").unwrap();
        }

        let mut iter = db.iter();
        iter.seek(b"b");
        assert!(iter.valid());
        assert_eq!(iter.key(), b"c");
        iter.seek(b"e");
        assert_eq!(iter.key(), b"e");
        iter.seek(b"f");
        assert!(!iter.valid());
        iter.error().unwrap();
    }

    #[test]
    fn reopen_replays_the_log() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("db");

        {
            let db = Db::open(&path, &OpenOptions::default()).unwrap();
            db.put(b"kept", b"yes").unwrap();
            db.put(b"gone", b"no").unwrap();
            db.delete(b"gone").unwrap();
            db.sync().unwrap();
        }

        let db = Db::open(&path, &OpenOptions::default()).unwrap();
        assert_eq!(db.get(b"kept"), Some(b"yes".to_vec()));
        assert_eq!(db.get(b"gone"), None);
    }

    #[test]
    fn missing_database_without_create_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let opts = OpenOptions::default().create_if_missing(false);
        assert!(Db::open(&dir.path().join("nope"), &opts).is_err());
    }
}
