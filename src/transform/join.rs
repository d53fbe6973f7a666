//! Joining merged stores on identical keys.

use super::{group_map, Emit, Transform};
use crate::store::Record;

/// Joins records from several stores sharing a key by concatenating
/// their values in source-tag order. Feed it a merge over the stores so
/// each batch holds one record per source for the key.
///
/// `defaults` supplies one entry per joined store: when a store has no
/// record for a key, its default stands in, and if that default is
/// `None` the key is omitted entirely. Choosing which stores get
/// defaults yields left, right, inner, and outer joins.
pub fn join(defaults: Vec<Option<Vec<u8>>>) -> impl Transform {
    group_map(move |group: Vec<Record>, emit: &Emit| {
        let mut values: Vec<Option<Vec<u8>>> = vec![None; defaults.len()];
        for record in &group {
            let index = record.source_tag as usize;
            assert!(
                index < values.len(),
                "record source tag {index} exceeds the {} joined stores",
                values.len()
            );
            values[index] = Some(record.value.clone());
        }

        let mut joined = Vec::new();
        for (value, default) in values.into_iter().zip(&defaults) {
            match (value, default) {
                (Some(value), _) => joined.extend_from_slice(&value),
                (None, Some(default)) => joined.extend_from_slice(default),
                (None, None) => return,
            }
        }
        emit.emit(Record {
            key: group[0].key.clone(),
            value: joined,
            source_tag: 0,
        });
    })
}
