use core::fmt::Debug;

use derive_more::From;

/// Coarse classification of a driver failure, deciding the retry/abort
/// policy.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FailureClass {
    /// The commit acknowledgement was lost and the commit's outcome is
    /// unknown. Safe to retry: commit is idempotent at the protocol level
    /// for a given transaction.
    RetryableCommit,
    /// The whole transaction should be rerun from the start. The runner
    /// surfaces this to the caller instead of re-executing operations.
    TransientTransaction,
    /// Definite failure (constraint violation, authorization, ...). Never
    /// retried.
    Fatal,
}

/// Implemented by driver error types so the runner can classify them.
pub trait Failure: Debug {
    fn classification(&self) -> FailureClass;
}

/// Which setup primitive failed before the transaction was active.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SetupStage {
    OpenSession,
    StartTransaction,
}

/// Where a cancellation signal was observed.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CancelPoint {
    /// Before the session was opened; nothing was acquired.
    BeforeSession,
    /// Before the operation at this index ran.
    BeforeOperation(usize),
    /// Before a commit attempt.
    BeforeCommit,
}

/// What ended a run short of a commit acknowledgement.
///
/// Generic over the driver's error type, which carries the actual
/// classification and detail.
#[derive(Debug, From)]
pub enum RunError<E> {
    /// The session or transaction could not be set up.
    Setup { stage: SetupStage, source: E },
    /// The operation at `index` failed inside the active transaction.
    Operation { index: usize, source: E },
    /// Commit failed for good after `attempts` attempts.
    Commit { attempts: u32, source: E },
    /// The caller's cancellation signal fired.
    Cancelled(CancelPoint),
}

impl<E: Failure> RunError<E> {
    /// Classification of the underlying driver failure, if one exists.
    /// Cancellations carry no driver error and report `None`.
    #[must_use]
    pub fn classification(&self) -> Option<FailureClass> {
        match self {
            Self::Setup { source, .. }
            | Self::Operation { source, .. }
            | Self::Commit { source, .. } => Some(source.classification()),
            Self::Cancelled(_) => None,
        }
    }
}
