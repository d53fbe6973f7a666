//! Deterministic k-way merge of sorted sub-readers.
//!
//! A min-heap keyed by `(key, source tag)` yields the union of all
//! sub-readers in ascending key order; ties across sub-readers are
//! broken by the smaller source tag, so the merge is stable. The heap
//! holds at most one record per sub-reader: each pop pulls the next
//! record from the popped record's source.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::{Reader, Record, Seeker};
use crate::error::Result;

/// The maximum number of sub-readers (and mux sub-writers): the source
/// tag must fit a u8.
pub const MAX_SOURCES: usize = u8::MAX as usize;

struct HeapEntry {
    record: Record,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the std max-heap pops the smallest (key, tag).
        match self.record.key.cmp(&other.record.key) {
            Ordering::Equal => self
                .record
                .source_tag
                .cmp(&other.record.source_tag)
                .reverse(),
            ord => ord.reverse(),
        }
    }
}

/// Reads the union of the given sub-readers in ascending key order.
/// Each emitted record's source tag is the index of the sub-reader it
/// came from, which lets a downstream [`super::MuxWriter`] route it
/// back. When every sub-reader is seekable the merge is too.
pub struct MergeReader<R> {
    readers: Vec<R>,
    heap: BinaryHeap<HeapEntry>,
    primed: bool,
}

impl<R: Reader> MergeReader<R> {
    /// Panics if given more than 255 sub-readers.
    pub fn new(readers: Vec<R>) -> Self {
        assert!(
            readers.len() <= MAX_SOURCES,
            "cannot merge more than {MAX_SOURCES} sub-readers"
        );
        Self {
            readers,
            heap: BinaryHeap::new(),
            primed: false,
        }
    }

    fn pull(&mut self, source: u8) -> Result<()> {
        if let Some(mut record) = self.readers[source as usize].read_record()? {
            record.source_tag = source;
            self.heap.push(HeapEntry { record });
        }
        Ok(())
    }
}

impl<R: Reader> Reader for MergeReader<R> {
    fn begin_reading(&mut self) -> Result<()> {
        for reader in &mut self.readers {
            reader.begin_reading()?;
        }
        self.heap.clear();
        self.primed = false;
        Ok(())
    }

    fn read_record(&mut self) -> Result<Option<Record>> {
        if !self.primed {
            for source in 0..self.readers.len() {
                self.pull(source as u8)?;
            }
            self.primed = true;
        }

        let Some(entry) = self.heap.pop() else {
            return Ok(None);
        };
        self.pull(entry.record.source_tag)?;
        Ok(Some(entry.record))
    }

    fn end_reading(&mut self) -> Result<()> {
        for reader in &mut self.readers {
            reader.end_reading()?;
        }
        Ok(())
    }
}

impl<R: Seeker> Seeker for MergeReader<R> {
    fn seek(&mut self, key: &[u8]) -> Result<()> {
        for reader in &mut self.readers {
            reader.seek(key)?;
        }
        // Discard buffered records; the next read re-primes from the
        // sub-readers' new positions.
        self.heap.clear();
        self.primed = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{read_all, write_all, MemStore};

    fn filled(records: Vec<Record>) -> MemStore {
        let mut store = MemStore::new();
        write_all(&mut store, records).unwrap();
        store
    }

    #[test]
    fn merges_three_sorted_readers() {
        let first = filled(vec![
            Record::new("d", "foo0", 0),
            Record::new("f", "bar0", 0),
            Record::new("h", "baz0", 0),
        ]);
        let second = filled(vec![
            Record::new("e", "foo1", 0),
            Record::new("g", "bar1", 0),
            Record::new("i", "baz1", 0),
        ]);
        let third = filled(vec![
            Record::new("a", "foo2", 0),
            Record::new("b", "bar2", 0),
            Record::new("c", "baz2", 0),
        ]);

        let mut merge = MergeReader::new(vec![first, second, third]);
        let merged: Vec<_> = read_all(&mut merge)
            .unwrap()
            .into_iter()
            .map(|r| {
                format!(
                    "{}:{}",
                    String::from_utf8_lossy(&r.key),
                    String::from_utf8_lossy(&r.value)
                )
            })
            .collect();

        assert_eq!(
            merged,
            vec![
                "a:foo2", "b:bar2", "c:baz2", "d:foo0", "e:foo1", "f:bar0", "g:bar1", "h:baz0",
                "i:baz1",
            ]
        );
    }

    #[test]
    fn duplicate_keys_are_stable_on_source_tag() {
        let first = filled(vec![
            Record::new("a", "foo0", 0),
            Record::new("b", "bar0", 0),
            Record::new("c", "baz0", 0),
        ]);
        let second = filled(vec![
            Record::new("b", "foo1", 0),
            Record::new("c", "bar1", 0),
        ]);

        let mut merge = MergeReader::new(vec![first, second]);
        let merged: Vec<_> = read_all(&mut merge)
            .unwrap()
            .into_iter()
            .map(|r| {
                format!(
                    "{}:{}:{}",
                    String::from_utf8_lossy(&r.key),
                    String::from_utf8_lossy(&r.value),
                    r.source_tag
                )
            })
            .collect();

        assert_eq!(
            merged,
            vec!["a:foo0:0", "b:bar0:0", "b:foo1:1", "c:baz0:0", "c:bar1:1"]
        );
    }

    #[test]
    fn seek_discards_buffered_records() {
        let first = filled(vec![Record::new("a", "1", 0), Record::new("e", "2", 0)]);
        let second = filled(vec![Record::new("b", "3", 0), Record::new("f", "4", 0)]);

        let mut merge = MergeReader::new(vec![first, second]);
        merge.begin_reading().unwrap();
        assert_eq!(merge.read_record().unwrap().unwrap().key, b"a");

        merge.seek(b"e").unwrap();
        assert_eq!(merge.read_record().unwrap().unwrap().key, b"e");
        assert_eq!(merge.read_record().unwrap().unwrap().key, b"f");
        assert_eq!(merge.read_record().unwrap(), None);
        merge.end_reading().unwrap();
    }

    #[test]
    fn empty_sub_readers_are_fine() {
        let mut merge = MergeReader::new(vec![MemStore::new(), filled(vec![Record::new("a", "1", 0)])]);
        let records = read_all(&mut merge).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source_tag, 1);
    }

    #[test]
    #[should_panic(expected = "cannot merge")]
    fn too_many_sub_readers_panics() {
        let readers: Vec<MemStore> = (0..256).map(|_| MemStore::new()).collect();
        let _ = MergeReader::new(readers);
    }
}
