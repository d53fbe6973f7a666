//! Range and prefix filter readers.
//!
//! Each wraps a seekable base reader plus a second, sorted "predicate"
//! stream whose records describe what to include or exclude, and skips
//! forward over the base with seeks instead of scanning record by
//! record. Every filter-initiated seek bumps the `Seeks` counter.

use super::{Reader, Record, Seeker};
use crate::error::Result;
use crate::metrics;

/// Reads every record from the base except those whose keys fall within
/// the ranges of the predicate stream. Predicate records encode closed
/// intervals: the key is the start and the value is the end, so both
/// endpoints are excluded.
///
/// Intervals must not overlap: the predicate advances once per skipped
/// interval, and a base record landing inside a subsequent overlapping
/// interval would pass through unfiltered.
pub struct RangeExcludingReader<R, P> {
    base: R,
    excluded: P,
    current: Option<Record>,
}

impl<R: Seeker, P: Reader> RangeExcludingReader<R, P> {
    pub fn new(base: R, excluded: P) -> Self {
        Self {
            base,
            excluded,
            current: None,
        }
    }
}

impl<R: Seeker, P: Reader> Reader for RangeExcludingReader<R, P> {
    fn begin_reading(&mut self) -> Result<()> {
        self.base.begin_reading()?;
        self.excluded.begin_reading()?;
        self.current = self.excluded.read_record()?;
        Ok(())
    }

    fn read_record(&mut self) -> Result<Option<Record>> {
        if self.current.is_none() {
            return self.base.read_record();
        }

        let Some(mut record) = self.base.read_record()? else {
            return Ok(None);
        };
        loop {
            let (start, end) = match &self.current {
                Some(exclude) => (exclude.key.clone(), exclude.value.clone()),
                None => break,
            };
            if record.key < start || record.key > end {
                break;
            }
            // Inside the excluded interval: jump to its end, step past
            // the endpoint if present, then move to the next interval.
            metrics::SEEKS.add(1);
            self.base.seek(&end)?;
            let Some(next) = self.base.read_record()? else {
                return Ok(None);
            };
            record = next;
            if record.key == end {
                let Some(next) = self.base.read_record()? else {
                    return Ok(None);
                };
                record = next;
            }
            self.current = self.excluded.read_record()?;
        }
        Ok(Some(record))
    }

    fn end_reading(&mut self) -> Result<()> {
        self.base.end_reading()?;
        self.excluded.end_reading()
    }
}

impl<R: Seeker, P: Reader> Seeker for RangeExcludingReader<R, P> {
    fn seek(&mut self, key: &[u8]) -> Result<()> {
        self.base.seek(key)
    }
}

/// Reads only the base records whose keys fall within the ranges of the
/// predicate stream. Predicate records encode closed intervals as for
/// [`RangeExcludingReader`]; here both endpoints are included. Output
/// ends when the predicate stream ends.
pub struct RangeIncludingReader<R, P> {
    base: R,
    included: P,
    current: Option<Record>,
}

impl<R: Seeker, P: Reader> RangeIncludingReader<R, P> {
    pub fn new(base: R, included: P) -> Self {
        Self {
            base,
            included,
            current: None,
        }
    }
}

impl<R: Seeker, P: Reader> Reader for RangeIncludingReader<R, P> {
    fn begin_reading(&mut self) -> Result<()> {
        self.base.begin_reading()?;
        self.included.begin_reading()?;
        self.current = self.included.read_record()?;
        Ok(())
    }

    fn read_record(&mut self) -> Result<Option<Record>> {
        let Some(mut record) = self.base.read_record()? else {
            return Ok(None);
        };
        loop {
            let (start, end) = match &self.current {
                Some(include) => (include.key.clone(), include.value.clone()),
                None => return Ok(None),
            };
            if record.key >= start && record.key <= end {
                return Ok(Some(record));
            }
            if record.key < start {
                metrics::SEEKS.add(1);
                self.base.seek(&start)?;
                let Some(next) = self.base.read_record()? else {
                    return Ok(None);
                };
                record = next;
            }
            if record.key > end {
                self.current = self.included.read_record()?;
            }
        }
    }

    fn end_reading(&mut self) -> Result<()> {
        self.base.end_reading()?;
        self.included.end_reading()
    }
}

impl<R: Seeker, P: Reader> Seeker for RangeIncludingReader<R, P> {
    fn seek(&mut self, key: &[u8]) -> Result<()> {
        self.base.seek(key)
    }
}

/// Reads only the base records whose keys start with one of the
/// predicate stream's keys (values are ignored). A base key exactly
/// equal to a prefix counts as a match. Output ends when the predicate
/// stream ends.
pub struct PrefixIncludingReader<R, P> {
    base: R,
    included: P,
    current: Option<Record>,
}

impl<R: Seeker, P: Reader> PrefixIncludingReader<R, P> {
    pub fn new(base: R, included: P) -> Self {
        Self {
            base,
            included,
            current: None,
        }
    }
}

impl<R: Seeker, P: Reader> Reader for PrefixIncludingReader<R, P> {
    fn begin_reading(&mut self) -> Result<()> {
        self.base.begin_reading()?;
        self.included.begin_reading()?;
        self.current = self.included.read_record()?;
        Ok(())
    }

    fn read_record(&mut self) -> Result<Option<Record>> {
        let Some(mut record) = self.base.read_record()? else {
            return Ok(None);
        };
        loop {
            let prefix = match &self.current {
                Some(include) => include.key.clone(),
                None => return Ok(None),
            };
            if record.key.starts_with(&prefix) {
                return Ok(Some(record));
            }
            if record.key < prefix {
                metrics::SEEKS.add(1);
                self.base.seek(&prefix)?;
                let Some(next) = self.base.read_record()? else {
                    return Ok(None);
                };
                record = next;
            } else {
                self.current = self.included.read_record()?;
            }
        }
    }

    fn end_reading(&mut self) -> Result<()> {
        self.base.end_reading()?;
        self.included.end_reading()
    }
}

impl<R: Seeker, P: Reader> Seeker for PrefixIncludingReader<R, P> {
    fn seek(&mut self, key: &[u8]) -> Result<()> {
        self.base.seek(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{read_all, write_all, MemStore};

    fn keyed(keys: &[&str]) -> MemStore {
        let mut store = MemStore::new();
        write_all(
            &mut store,
            keys.iter().map(|k| Record::new(*k, "v", 0)).collect(),
        )
        .unwrap();
        store
    }

    fn ranges(pairs: &[(&str, &str)]) -> MemStore {
        let mut store = MemStore::new();
        write_all(
            &mut store,
            pairs.iter().map(|(a, b)| Record::new(*a, *b, 0)).collect(),
        )
        .unwrap();
        store
    }

    fn emitted_keys<R: Reader>(reader: &mut R) -> Vec<String> {
        read_all(reader)
            .unwrap()
            .into_iter()
            .map(|r| String::from_utf8_lossy(&r.key).into_owned())
            .collect()
    }

    #[test]
    fn range_excluding_skips_intervals() {
        let base = keyed(&["a", "b", "c", "d", "e", "f", "g", "h", "j", "k"]);
        let excluded = ranges(&[("c", "e"), ("h", "i")]);

        let mut reader = RangeExcludingReader::new(base, excluded);
        assert_eq!(emitted_keys(&mut reader), vec!["a", "b", "f", "g", "j", "k"]);
    }

    #[test]
    fn range_excluding_without_predicates_is_identity() {
        let base = keyed(&["a", "b", "c"]);
        let mut reader = RangeExcludingReader::new(base, MemStore::new());
        assert_eq!(emitted_keys(&mut reader), vec!["a", "b", "c"]);
    }

    #[test]
    fn range_excluding_bumps_seek_counter() {
        let before = metrics::SEEKS.get();
        let base = keyed(&["a", "b", "c", "d", "e", "f"]);
        let excluded = ranges(&[("b", "d")]);
        let mut reader = RangeExcludingReader::new(base, excluded);
        assert_eq!(emitted_keys(&mut reader), vec!["a", "e", "f"]);
        assert!(metrics::SEEKS.get() >= before + 1);
    }

    #[test]
    fn range_including_keeps_intervals() {
        let base = keyed(&["a", "b", "c", "d", "e", "f", "g", "i", "k"]);
        let included = ranges(&[("c", "e"), ("h", "j")]);

        let mut reader = RangeIncludingReader::new(base, included);
        assert_eq!(emitted_keys(&mut reader), vec!["c", "d", "e", "i"]);
    }

    #[test]
    fn range_including_without_predicates_is_empty() {
        let base = keyed(&["a", "b", "c"]);
        let mut reader = RangeIncludingReader::new(base, MemStore::new());
        assert!(emitted_keys(&mut reader).is_empty());
    }

    #[test]
    fn prefix_including_keeps_matching_prefixes() {
        let base = keyed(&[
            "aaa", "aab", "abc", "acc", "baa", "bac", "bbb", "dab", "eaa", "eab", "eba", "ebb",
            "ebc",
        ]);
        let included = keyed(&["aa", "b", "c", "ea", "eb"]);

        let mut reader = PrefixIncludingReader::new(base, included);
        assert_eq!(
            emitted_keys(&mut reader),
            vec!["aaa", "aab", "baa", "bac", "bbb", "eaa", "eab", "eba", "ebb", "ebc"]
        );
    }

    #[test]
    fn prefix_equal_to_key_matches() {
        let base = keyed(&["ab", "abc", "b"]);
        let included = keyed(&["ab"]);

        let mut reader = PrefixIncludingReader::new(base, included);
        assert_eq!(emitted_keys(&mut reader), vec!["ab", "abc"]);
    }

    #[test]
    fn prefix_including_without_predicates_is_empty() {
        let base = keyed(&["a"]);
        let mut reader = PrefixIncludingReader::new(base, MemStore::new());
        assert!(emitted_keys(&mut reader).is_empty());
    }

    #[test]
    fn filters_compose_over_boxed_seekers() {
        let base: Box<dyn Seeker + Send> = Box::new(keyed(&["a", "b", "c", "d"]));
        let excluded = ranges(&[("b", "c")]);
        let mut reader = RangeExcludingReader::new(base, excluded);
        assert_eq!(emitted_keys(&mut reader), vec!["a", "d"]);
    }
}
