//! Fixed-table spaced repetition.
//!
//! Each completed review moves a note one step along an escalating table of
//! day intervals. Once the table is exhausted the schedule holds at its last
//! (longest) entry.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::fmt;
use std::sync::Arc;
use study_desk_schemas::{Note, ReviewState};
use tracing::debug;

use crate::clock::Clock;
use crate::error::ScheduleError;

/// Default review intervals in days.
pub const DEFAULT_INTERVALS: [u32; 6] = [1, 3, 7, 14, 30, 60];

/// A freshly created note becomes due one day later.
const INITIAL_REVIEW_DELAY_DAYS: i64 = 1;

pub struct ReviewScheduler {
    intervals: Vec<u32>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for ReviewScheduler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ReviewScheduler")
            .field("intervals", &self.intervals)
            .finish_non_exhaustive()
    }
}

impl ReviewScheduler {
    /// Build a scheduler over `intervals`.
    ///
    /// The table must be non-empty, strictly positive and non-decreasing so
    /// that later reviews never land earlier than previous ones.
    pub fn new(intervals: Vec<u32>, clock: Arc<dyn Clock>) -> Result<Self, ScheduleError> {
        if intervals.is_empty() {
            return Err(ScheduleError::InvalidSchedule(
                "interval table is empty".to_string(),
            ));
        }

        if let Some(position) = intervals.iter().position(|&days| days == 0) {
            return Err(ScheduleError::InvalidSchedule(format!(
                "interval at position {} is zero",
                position
            )));
        }

        if let Some(window) = intervals.windows(2).find(|pair| pair[1] < pair[0]) {
            return Err(ScheduleError::InvalidSchedule(format!(
                "intervals must not decrease ({} followed by {})",
                window[0], window[1]
            )));
        }

        Ok(Self { intervals, clock })
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            intervals: DEFAULT_INTERVALS.to_vec(),
            clock,
        }
    }

    pub fn intervals(&self) -> &[u32] {
        &self.intervals
    }

    /// Current time at millisecond precision, the resolution timestamps are
    /// stored with.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(3)
    }

    /// Review state for a note created at `created_at`.
    pub fn initial_state(&self, created_at: DateTime<Utc>) -> ReviewState {
        ReviewState {
            review_count: 0,
            next_review_at: created_at + Duration::days(INITIAL_REVIEW_DELAY_DAYS),
        }
    }

    /// Interval in days used after the `completed`-th review.
    pub fn interval_for(&self, completed: u64) -> u32 {
        let last = self.intervals.len() - 1;
        let index = usize::try_from(completed).map_or(last, |c| c.min(last));
        self.intervals[index]
    }

    /// Record one completed review.
    ///
    /// Returns the incremented count and the next due time measured from the
    /// scheduler's clock. Negative counts are rejected, never clamped.
    pub fn mark_reviewed(&self, review_count: i64) -> Result<ReviewState, ScheduleError> {
        if review_count < 0 {
            return Err(ScheduleError::PreconditionViolation(review_count));
        }

        let new_count = review_count
            .checked_add(1)
            .ok_or(ScheduleError::PreconditionViolation(review_count))?;
        let interval = self.interval_for(new_count as u64);
        let next_review_at = self
            .now()
            .checked_add_signed(Duration::days(i64::from(interval)))
            .ok_or_else(|| {
                ScheduleError::InvalidSchedule(format!(
                    "{} days from now is out of range",
                    interval
                ))
            })?;

        debug!(
            "Review {} complete, next review in {} days",
            new_count, interval
        );

        Ok(ReviewState {
            review_count: new_count,
            next_review_at,
        })
    }
}

/// Anything carrying a next-review timestamp.
pub trait Scheduled {
    fn next_review_at(&self) -> DateTime<Utc>;
}

impl Scheduled for ReviewState {
    fn next_review_at(&self) -> DateTime<Utc> {
        self.next_review_at
    }
}

impl Scheduled for Note {
    fn next_review_at(&self) -> DateTime<Utc> {
        self.next_review_at
    }
}

/// Items due at `as_of` (inclusive), most overdue first.
pub fn due_for_review<T: Scheduled>(items: &[T], as_of: DateTime<Utc>) -> Vec<&T> {
    let mut due: Vec<&T> = items
        .iter()
        .filter(|item| item.next_review_at() <= as_of)
        .collect();
    due.sort_by_key(|item| item.next_review_at());
    due
}
