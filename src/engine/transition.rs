//! Status-transition table.
//!
//! Converts a (previous, next) execution-status pair into a statistics
//! delta. This table is the only correct way to keep per-action counters
//! accurate when completions stream in concurrently and out of order: each
//! completed run reports where it came from and where it landed, and the
//! delta follows from the pair alone.
//!
//! `prev == None` means "first observed transition for this job" and
//! resolves by `next` alone. Any pair outside the mapped cases is reported
//! as [`StatsOp::Unmapped`] and must be logged and ignored by the caller;
//! counters are never mutated for an unmapped pair.

use crate::model::ExecutionStatus;

/// Statistics delta derived from one status transition.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StatsOp {
    /// No counter changes (`prev == next`).
    NoOp,
    /// First completion succeeded: +success.
    AddSuccess,
    /// First completion failed: +failure.
    AddFailure,
    /// A previously failed job succeeded: +success, -failure.
    SuccessFromFailure,
    /// A previously succeeded job failed: -success, +failure.
    FailureFromSuccess,
    /// A pending job succeeded: -pending, +success.
    SuccessFromPending,
    /// A pending job failed: -pending, +failure.
    FailureFromPending,
    /// Pair not covered by the table; log and leave counters untouched.
    Unmapped,
}

/// Looks up the statistics delta for a (previous, next) status pair.
pub fn transition_op(prev: Option<ExecutionStatus>, next: ExecutionStatus) -> StatsOp {
    use ExecutionStatus::{Failure, Pending, Success};

    match (prev, next) {
        (Some(p), n) if p == n => StatsOp::NoOp,
        (None, Success) => StatsOp::AddSuccess,
        (None, Failure) => StatsOp::AddFailure,
        (Some(Failure), Success) => StatsOp::SuccessFromFailure,
        (Some(Success), Failure) => StatsOp::FailureFromSuccess,
        (Some(Pending), Success) => StatsOp::SuccessFromPending,
        (Some(Pending), Failure) => StatsOp::FailureFromPending,
        _ => StatsOp::Unmapped,
    }
}
