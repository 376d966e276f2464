//! Delete records
//!
//! Deletes are keyed by primary key and carry the timestamp they were
//! issued at. A row written at `w` is deleted for a query at `t` iff its
//! key has a delete timestamp `d` with `w < d <= t`. Later deletes never
//! hide rows from earlier snapshots, and a delete never hides a row
//! re-inserted after it.

use std::collections::HashMap;

use crate::storage::ValueRef;

use super::{Bitset, Timestamp};

/// Primary key -> ascending distinct delete timestamps
#[derive(Debug, Clone, Default)]
pub struct DeletedRecord {
    int_keys: HashMap<i64, Vec<Timestamp>>,
    str_keys: HashMap<String, Vec<Timestamp>>,
    entries: usize,
}

impl DeletedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an INT64 key. Returns false if a delete at `ts` is already
    /// recorded for it.
    pub fn push_int(&mut self, pk: i64, ts: Timestamp) -> bool {
        let applied = Self::insert_ts(self.int_keys.entry(pk).or_default(), ts);
        self.entries += applied as usize;
        applied
    }

    /// Records a VARCHAR key. Returns false if a delete at `ts` is already
    /// recorded for it.
    pub fn push_str(&mut self, pk: &str, ts: Timestamp) -> bool {
        if !self.str_keys.contains_key(pk) {
            self.str_keys.insert(pk.to_string(), Vec::new());
        }
        let applied = self
            .str_keys
            .get_mut(pk)
            .map_or(false, |slots| Self::insert_ts(slots, ts));
        self.entries += applied as usize;
        applied
    }

    fn insert_ts(slots: &mut Vec<Timestamp>, ts: Timestamp) -> bool {
        match slots.binary_search(&ts) {
            Ok(_) => false,
            Err(pos) => {
                slots.insert(pos, ts);
                true
            }
        }
    }

    fn delete_times(&self, pk: ValueRef<'_>) -> &[Timestamp] {
        let slots = match pk {
            ValueRef::Int(v) => self.int_keys.get(&v),
            ValueRef::Str(v) => self.str_keys.get(v),
            _ => None,
        };
        slots.map(Vec::as_slice).unwrap_or_default()
    }

    /// Earliest delete recorded for `pk`
    pub fn deleted_at(&self, pk: ValueRef<'_>) -> Option<Timestamp> {
        self.delete_times(pk).first().copied()
    }

    /// Whether the row keyed by `pk` and written at `row_ts` is deleted in
    /// the snapshot at `ts`
    pub fn is_deleted(&self, pk: ValueRef<'_>, row_ts: Timestamp, ts: Timestamp) -> bool {
        let times = self.delete_times(pk);
        let first_after_write = times.partition_point(|&d| d <= row_ts);
        times
            .get(first_after_write)
            .map_or(false, |&deleted| deleted <= ts)
    }

    /// Number of distinct keys with at least one delete
    pub fn len(&self) -> usize {
        self.int_keys.len() + self.str_keys.len()
    }

    /// Number of (key, timestamp) delete entries
    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hides every still-visible row of `bitset` deleted as of `ts`.
    /// `row_at` resolves a row offset to its primary key and write
    /// timestamp. Returns the number of rows newly hidden.
    pub fn mask_with_delete<'a, F>(&self, bitset: &mut Bitset, ts: Timestamp, row_at: F) -> usize
    where
        F: Fn(usize) -> Option<(ValueRef<'a>, Timestamp)>,
    {
        if self.is_empty() {
            return 0;
        }

        let hidden: Vec<usize> = bitset
            .iter_zeros()
            .filter(|&row| {
                row_at(row).map_or(false, |(pk, row_ts)| self.is_deleted(pk, row_ts, ts))
            })
            .collect();
        for &row in &hidden {
            bitset.set(row, true);
        }
        hidden.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mvcc::new_bitset;

    #[test]
    fn test_records_distinct_delete_times() {
        let mut record = DeletedRecord::new();
        assert!(record.push_int(7, 20));
        assert!(record.push_int(7, 10));
        assert!(record.push_int(7, 30));
        assert!(!record.push_int(7, 10));
        assert_eq!(record.deleted_at(ValueRef::Int(7)), Some(10));

        assert!(record.push_str("a", 5));
        assert!(!record.push_str("a", 5));
        assert_eq!(record.len(), 2);
        assert_eq!(record.entries(), 4);
    }

    #[test]
    fn test_delete_visible_only_after_its_timestamp() {
        let mut record = DeletedRecord::new();
        record.push_str("k", 100);
        assert!(!record.is_deleted(ValueRef::Str("k"), 0, 99));
        assert!(record.is_deleted(ValueRef::Str("k"), 0, 100));
        assert!(!record.is_deleted(ValueRef::Int(1), 0, 100));
    }

    #[test]
    fn test_delete_spares_rows_written_after_it() {
        let mut record = DeletedRecord::new();
        record.push_int(1, 5);
        record.push_int(1, 15);

        // written at 0: hidden from 5 on
        assert!(!record.is_deleted(ValueRef::Int(1), 0, 4));
        assert!(record.is_deleted(ValueRef::Int(1), 0, 5));
        // re-inserted at 10: only the delete at 15 applies
        assert!(!record.is_deleted(ValueRef::Int(1), 10, 12));
        assert!(record.is_deleted(ValueRef::Int(1), 10, 15));
        // written at 20: no later delete
        assert!(!record.is_deleted(ValueRef::Int(1), 20, u64::MAX));
        // same timestamp as the delete is not after the write
        assert!(!record.is_deleted(ValueRef::Int(1), 15, 30));
    }

    #[test]
    fn test_mask_skips_already_hidden_rows() {
        let pks = vec![10i64, 11, 12, 13];
        let mut record = DeletedRecord::new();
        record.push_int(11, 5);
        record.push_int(13, 5);
        record.push_int(12, 50);

        let mut bitset = new_bitset(4);
        bitset.set(3, true);
        let hidden = record.mask_with_delete(&mut bitset, 10, |row| {
            pks.get(row).map(|pk| (ValueRef::Int(*pk), 1))
        });
        assert_eq!(hidden, 1);
        assert_eq!(bitset.iter_ones().collect::<Vec<_>>(), vec![1, 3]);
    }
}
