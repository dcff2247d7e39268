//! # Table Schedule Rules
//!
//! Half-open time slots and the conflict rule used by the reservation
//! scheduler.
//!
//! ## Overlap Rule
//! ```text
//! [s1, e1) and [s2, e2) overlap  ⇔  s1 < e2  AND  s2 < e1
//!
//!   17:00        18:00        19:00        20:00
//!     ├────────────┤                               A [17:00, 18:00)
//!                  ├────────────┤                  B [18:00, 19:00)   A,B: no overlap
//!                         ├────────────┤           C [18:30, 19:30)   B,C: overlap
//! ```
//!
//! Times are wall-clock times local to the restaurant. A slot never spans
//! midnight: `start < end` on the same reservation date.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::types::Reservation;

/// A non-empty half-open interval `[start, end)` within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeSlot {
    /// Creates a slot, rejecting empty or inverted windows.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, ValidationError> {
        if start >= end {
            return Err(ValidationError::EmptyTimeSlot {
                start: start.format("%H:%M").to_string(),
                end: end.format("%H:%M").to_string(),
            });
        }
        Ok(TimeSlot { start, end })
    }

    /// Rebuilds a slot from stored columns already validated on insert.
    pub(crate) fn from_stored(start: NaiveTime, end: NaiveTime) -> Self {
        TimeSlot { start, end }
    }

    #[inline]
    pub fn start(&self) -> NaiveTime {
        self.start
    }

    #[inline]
    pub fn end(&self) -> NaiveTime {
        self.end
    }

    /// Half-open overlap test.
    #[inline]
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Length of the slot.
    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// Finds the first reservation that would collide with `requested`.
///
/// `existing` is expected to hold one table's reservations for one date.
/// Cancelled reservations are skipped, and so is `ignore_id` (the
/// reservation being moved, when rescheduling).
pub fn find_conflict<'a>(
    requested: &TimeSlot,
    existing: &'a [Reservation],
    ignore_id: Option<&str>,
) -> Option<&'a Reservation> {
    existing
        .iter()
        .filter(|r| r.status.blocks_slot())
        .filter(|r| ignore_id != Some(r.id.as_str()))
        .find(|r| requested.overlaps(&r.slot()))
}
