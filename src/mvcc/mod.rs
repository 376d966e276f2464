//! Timestamp visibility
//!
//! Every row carries the logical timestamp it was written at. A query at
//! timestamp `t` sees exactly the rows written at or before `t` whose
//! primary key was not deleted after the write and at or before `t`.
//!
//! This module provides:
//! - `Timestamp` - Logical clock value
//! - `Bitset` - Per-query row mask, `true` = hidden
//! - `TimestampFilter` - Bulk and point-offset visibility filters
//! - `DeletedRecord` - Primary-key deletes with their timestamps

mod deletes;
mod visibility;

use bitvec::prelude::{BitVec, Lsb0};

pub use deletes::DeletedRecord;
pub use visibility::TimestampFilter;

/// Logical write/query timestamp
pub type Timestamp = u64;

/// Timestamp that sees every row
pub const MAX_TIMESTAMP: Timestamp = Timestamp::MAX;

/// Dense row mask indexed by offset within a scan window
pub type Bitset = BitVec<usize, Lsb0>;

/// All-visible bitset of `len` rows
pub fn new_bitset(len: usize) -> Bitset {
    BitVec::repeat(false, len)
}
