//! Timestamp visibility filtering
//!
//! ## Visibility Rule
//!
//! A row is visible to a query at timestamp `t` iff the row's write
//! timestamp is `<= t`.
//!
//! Row timestamps are non-decreasing by offset (the append-only write path
//! guarantees it), so the rows hidden from `t` always form a suffix of the
//! segment. The bulk form finds that suffix by binary search; the point
//! form compares individual offsets directly and is meant for small,
//! already-sparse candidate lists.
//!
//! Both forms only ever set bits (`true` = hidden). Bits hidden by earlier
//! filters stay hidden.

use super::{Bitset, Timestamp};

/// Stateless visibility filter over a segment's timestamp column
pub struct TimestampFilter;

impl TimestampFilter {
    /// Hides every row of the window `[0, bitset.len())` written after `ts`.
    ///
    /// Returns the number of rows this call newly hid. When the last row
    /// of the window is already visible nothing is scanned.
    pub fn apply(bitset: &mut Bitset, timestamps: &[Timestamp], ts: Timestamp) -> usize {
        let cnt = bitset.len().min(timestamps.len());
        if cnt == 0 || timestamps[cnt - 1] <= ts {
            return 0;
        }

        // first offset whose timestamp exceeds ts
        let pilot = timestamps[..cnt].partition_point(|&row_ts| row_ts <= ts);
        let tail = &mut bitset[pilot..cnt];
        let newly_hidden = tail.count_zeros();
        tail.fill(true);
        newly_hidden
    }

    /// Hides the listed offsets whose timestamp exceeds `ts`.
    ///
    /// Offsets outside the window are ignored. Returns the number of rows
    /// this call newly hid.
    pub fn apply_offsets(
        bitset: &mut Bitset,
        timestamps: &[Timestamp],
        offsets: &[i64],
        ts: Timestamp,
    ) -> usize {
        let cnt = bitset.len().min(timestamps.len());
        if cnt == 0 || timestamps[cnt - 1] <= ts {
            return 0;
        }

        let mut newly_hidden = 0;
        for &offset in offsets {
            let Ok(offset) = usize::try_from(offset) else {
                continue;
            };
            if offset < cnt && timestamps[offset] > ts && !bitset[offset] {
                bitset.set(offset, true);
                newly_hidden += 1;
            }
        }
        newly_hidden
    }

    /// Visibility of a single row under `ts`
    pub fn is_visible(row_ts: Timestamp, ts: Timestamp) -> bool {
        row_ts <= ts
    }
}
