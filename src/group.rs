//! Successive-prefix grouping of a sorted record stream.

use flume::Receiver;

use crate::codec::{Kind, Value};
use crate::store::Record;

/// Iterates a sorted input channel as groups of consecutive records
/// whose keys share the same decoded prefix.
///
/// Given records keyed by (name, year, month, spending), grouping by
/// the first three fields visits each (name, year, month) run in turn:
///
/// ```ignore
/// let mut grouper = Grouper::new(records, vec![Kind::Text, Kind::I32, Kind::I32]);
/// while grouper.next_group() {
///     let mut monthly = 0i32;
///     while grouper.next_record() {
///         let record = grouper.read().unwrap();
///         if let (Value::I32(spending), _) = Kind::I32.read_value(&record.key)? {
///             monthly += spending;
///         }
///     }
///     println!("{:?} spent {monthly}", grouper.values());
/// }
/// ```
///
/// Records read within a group have their keys trimmed to the tail
/// after the group prefix; the decoded prefix fields are available from
/// [`Grouper::values`]. Keys that fail to decode against the declared
/// kinds are a programmer error and panic.
pub struct Grouper {
    input: Receiver<Record>,
    kinds: Vec<Kind>,
    values: Vec<Value>,
    prefix: Vec<u8>,
    current: Option<Record>,
    peeked: Option<Record>,
    started: bool,
}

impl Grouper {
    pub fn new(input: Receiver<Record>, kinds: Vec<Kind>) -> Self {
        Self {
            input,
            kinds,
            values: Vec::new(),
            prefix: Vec::new(),
            current: None,
            peeked: None,
            started: false,
        }
    }

    /// Advances to the next group of records with a shared prefix. Only
    /// call this once [`Grouper::next_record`] has returned false (a
    /// group cannot be abandoned part way). Returns true while a group
    /// is available.
    pub fn next_group(&mut self) -> bool {
        if !self.started {
            self.peeked = self.input.recv().ok();
            self.started = true;
        }
        let Some(record) = &self.peeked else {
            return false;
        };

        let mut values = Vec::with_capacity(self.kinds.len());
        let mut rest = record.key.as_slice();
        for kind in &self.kinds {
            let (value, tail) = kind
                .read_value(rest)
                .expect("record key does not decode against the group prefix kinds");
            values.push(value);
            rest = tail;
        }
        self.prefix = record.key[..record.key.len() - rest.len()].to_vec();
        self.values = values;
        true
    }

    /// Advances to the next record within the current group, or returns
    /// false when the group is exhausted (the first record of the next
    /// group, if any, is held back for the following
    /// [`Grouper::next_group`]).
    pub fn next_record(&mut self) -> bool {
        self.current = None;
        if let Some(mut record) = self.peeked.take() {
            record.key = record.key[self.prefix.len()..].to_vec();
            self.current = Some(record);
            return true;
        }
        let Ok(record) = self.input.recv() else {
            return false;
        };
        if !record.key.starts_with(&self.prefix) {
            self.peeked = Some(record);
            return false;
        }
        let mut record = record;
        record.key = record.key[self.prefix.len()..].to_vec();
        self.current = Some(record);
        true
    }

    /// Takes the current record. Its key is the tail after the group
    /// prefix; callers typically decode that tail themselves.
    pub fn read(&mut self) -> Option<Record> {
        self.current.take()
    }

    /// The decoded prefix fields of the current group.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// The raw encoded prefix of the current group.
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }
}
