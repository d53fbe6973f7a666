//! An in-memory store backed by a sorted vector.

use std::sync::{Arc, Mutex};

use super::{Deleter, Reader, Record, Seeker, Writer};
use crate::error::Result;

/// A simple store that keeps its records in memory, offering the full
/// capability set. Suitable for tests and small data sets; use
/// [`super::DbStore`] for anything larger. Upserts are linear scans and
/// begin_reading re-sorts, so costs are intentionally quadratic.
///
/// Handles are cheap clones sharing the same records, so one stage can
/// write a store and a later stage can read it. The read cursor is per
/// handle.
#[derive(Clone, Debug, Default)]
pub struct MemStore {
    records: Arc<Mutex<Vec<Record>>>,
    cursor: usize,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of records currently stored.
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Reader for MemStore {
    fn begin_reading(&mut self) -> Result<()> {
        self.records.lock()?.sort_by(|a, b| a.key.cmp(&b.key));
        self.cursor = 0;
        Ok(())
    }

    fn read_record(&mut self) -> Result<Option<Record>> {
        let records = self.records.lock()?;
        let record = records.get(self.cursor).cloned();
        if record.is_some() {
            self.cursor += 1;
        }
        Ok(record)
    }

    fn end_reading(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Seeker for MemStore {
    fn seek(&mut self, key: &[u8]) -> Result<()> {
        let records = self.records.lock()?;
        self.cursor = 0;
        while self.cursor < records.len() && records[self.cursor].key.as_slice() < key {
            self.cursor += 1;
        }
        Ok(())
    }
}

impl Writer for MemStore {
    fn begin_writing(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_record(&mut self, record: Record) -> Result<()> {
        let mut records = self.records.lock()?;
        for existing in records.iter_mut() {
            if existing.key == record.key {
                *existing = record;
                return Ok(());
            }
        }
        records.push(record);
        Ok(())
    }

    fn end_writing(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Deleter for MemStore {
    fn delete_all(&mut self) -> Result<()> {
        self.records.lock()?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{read_all, write_all};

    #[test]
    fn reads_are_sorted() {
        let mut store = MemStore::new();
        write_all(
            &mut store,
            vec![
                Record::new("c", "3", 0),
                Record::new("a", "1", 0),
                Record::new("b", "2", 0),
            ],
        )
        .unwrap();

        let keys: Vec<_> = read_all(&mut store)
            .unwrap()
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn write_upserts_by_key() {
        let mut store = MemStore::new();
        write_all(
            &mut store,
            vec![Record::new("a", "old", 0), Record::new("a", "new", 0)],
        )
        .unwrap();

        let records = read_all(&mut store).unwrap();
        assert_eq!(records, vec![Record::new("a", "new", 0)]);
    }

    #[test]
    fn seek_positions_at_smallest_key_not_below() {
        let mut store = MemStore::new();
        write_all(
            &mut store,
            vec![
                Record::new("a", "1", 0),
                Record::new("c", "2", 0),
                Record::new("e", "3", 0),
            ],
        )
        .unwrap();

        store.begin_reading().unwrap();
        store.seek(b"b").unwrap();
        assert_eq!(store.read_record().unwrap().unwrap().key, b"c");
        store.seek(b"e").unwrap();
        assert_eq!(store.read_record().unwrap().unwrap().key, b"e");
        store.seek(b"f").unwrap();
        assert_eq!(store.read_record().unwrap(), None);
        store.end_reading().unwrap();
    }

    #[test]
    fn delete_all_empties_the_store() {
        let mut store = MemStore::new();
        write_all(&mut store, vec![Record::new("a", "1", 0)]).unwrap();

        store.begin_writing().unwrap();
        store.delete_all().unwrap();
        store.end_writing().unwrap();

        assert!(read_all(&mut store).unwrap().is_empty());
    }

    #[test]
    fn clones_share_records() {
        let mut writer = MemStore::new();
        let mut reader = writer.clone();
        write_all(&mut writer, vec![Record::new("k", "v", 0)]).unwrap();

        let records = read_all(&mut reader).unwrap();
        assert_eq!(records, vec![Record::new("k", "v", 0)]);
    }
}
