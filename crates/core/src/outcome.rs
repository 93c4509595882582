use chrono::{DateTime, Duration, Local};

use crate::error::RunError;
use crate::unit::OperationOutput;

/// Wall-clock span of one run, from entry to after the session close
/// attempt.
#[derive(Debug, Copy, Clone)]
pub struct RunTiming {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

impl RunTiming {
    #[must_use]
    pub const fn new(started_at: DateTime<Local>, finished_at: DateTime<Local>) -> Self {
        Self {
            started_at,
            finished_at,
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.finished_at - self.started_at
    }
}

/// Every operation ran and a commit acknowledgement arrived.
#[derive(Debug)]
pub struct Committed {
    /// Per-operation outputs, in operation order.
    pub results: Vec<OperationOutput>,
    /// Commit calls issued, counting the successful one.
    pub commit_attempts: u32,
    pub timing: RunTiming,
}

/// The transaction was rolled back.
#[derive(Debug)]
pub struct Aborted<E> {
    /// What triggered the abort.
    pub cause: RunError<E>,
    /// Recorded when the abort call itself failed; never replaces `cause`.
    pub abort_error: Option<E>,
    /// Commit calls issued before the abort (zero for operation failures).
    pub commit_attempts: u32,
    pub timing: RunTiming,
}

/// Every commit attempt ended with the acknowledgement lost.
///
/// The commit may or may not have applied. This is deliberately neither
/// [`Committed`] nor [`Aborted`]: the caller must reconcile against the
/// store before trusting either reading.
#[derive(Debug)]
pub struct CommitUnknown<E> {
    /// The error from the final commit attempt.
    pub last_error: E,
    pub commit_attempts: u32,
    /// The best-effort abort's own failure, if it had one.
    pub abort_error: Option<E>,
    pub timing: RunTiming,
}

/// The run failed before a transaction was active; there was nothing to
/// abort.
#[derive(Debug)]
pub struct Failed<E> {
    pub error: RunError<E>,
    pub timing: RunTiming,
}

/// Terminal result of one run.
#[must_use]
#[derive(Debug)]
pub enum Outcome<E> {
    Committed(Committed),
    Aborted(Aborted<E>),
    CommitUnknown(CommitUnknown<E>),
    Failed(Failed<E>),
}

impl<E> Outcome<E> {
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }

    #[must_use]
    pub const fn timing(&self) -> RunTiming {
        match self {
            Self::Committed(outcome) => outcome.timing,
            Self::Aborted(outcome) => outcome.timing,
            Self::CommitUnknown(outcome) => outcome.timing,
            Self::Failed(outcome) => outcome.timing,
        }
    }
}
