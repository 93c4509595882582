use chrono::{DateTime, Local};

use crate::cancel::CancelToken;
use crate::config::RunConfig;
use crate::driver::SessionDriver;
use crate::error::{CancelPoint, Failure, FailureClass, RunError, SetupStage};
use crate::outcome::{Aborted, CommitUnknown, Committed, Failed, Outcome, RunTiming};
use crate::unit::{OperationOutput, UnitOfWork};

/// Lifecycle states of one run, in transition order.
///
/// `Committing` loops on itself while the retry budget absorbs lost commit
/// acknowledgements; every other transition happens at most once.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    SessionOpen,
    TxActive,
    Committing,
    Committed,
    Aborting,
    Aborted,
    Closed,
}

/// Run one unit of work to a terminal [`Outcome`].
///
/// The runner opens a session, starts a transaction with the configured
/// consistency options, executes the unit's operations in order, and
/// commits. On an operation failure it aborts once and surfaces that
/// failure; commit is never attempted. On a commit failure it retries only
/// lost acknowledgements, up to `config.commit_retry_limit` extra attempts,
/// then aborts once and surfaces the failure. The session is closed exactly
/// once, after the terminal commit/abort step, on every path; a close
/// failure is logged and never changes the outcome.
///
/// The unit of work is never rerun as a whole. A failure classified
/// [`TransientTransaction`](FailureClass::TransientTransaction) comes back
/// in the outcome for the caller to act on; a caller wanting full-restart
/// semantics wraps `run` itself.
pub fn run<D: SessionDriver>(
    driver: &D,
    unit: &UnitOfWork,
    config: &RunConfig,
) -> Outcome<D::Error> {
    let started_at = Local::now();
    tracing::debug!(
        collection = %unit.collection,
        operations = unit.operations.len(),
        phase = ?Phase::Idle,
        "run starting"
    );

    if is_cancelled(config.cancel.as_ref()) {
        tracing::debug!("cancelled before session open");
        return Outcome::Failed(Failed {
            error: RunError::Cancelled(CancelPoint::BeforeSession),
            timing: stamp(started_at),
        });
    }

    let mut session = match driver.open_session(config.causally_consistent) {
        Ok(session) => session,
        Err(source) => {
            tracing::warn!(error = ?source, "session open failed");
            return Outcome::Failed(Failed {
                error: RunError::Setup {
                    stage: SetupStage::OpenSession,
                    source,
                },
                timing: stamp(started_at),
            });
        }
    };
    tracing::debug!(
        phase = ?Phase::SessionOpen,
        causally_consistent = config.causally_consistent,
        "session open"
    );

    let verdict = drive(driver, &mut session, unit, config);

    // The single close point: every verdict path above only borrowed the
    // session, so the move here is the one release per run.
    if let Err(error) = driver.close_session(session) {
        tracing::warn!(?error, "session close failed");
    }
    tracing::debug!(phase = ?Phase::Closed, "session closed");

    verdict.seal(RunTiming::new(started_at, Local::now()))
}

/// Everything between session open and session close.
fn drive<D: SessionDriver>(
    driver: &D,
    session: &mut D::Session,
    unit: &UnitOfWork,
    config: &RunConfig,
) -> Verdict<D::Error> {
    if let Err(source) = driver.start_transaction(session, &config.transaction_options()) {
        tracing::warn!(error = ?source, "transaction start failed");
        return Verdict::Failed {
            error: RunError::Setup {
                stage: SetupStage::StartTransaction,
                source,
            },
        };
    }
    tracing::debug!(
        phase = ?Phase::TxActive,
        read_consistency = ?config.read_consistency,
        write_durability = ?config.write_durability,
        "transaction started"
    );

    let mut results = Vec::with_capacity(unit.operations.len());
    for (index, operation) in unit.operations.iter().enumerate() {
        if is_cancelled(config.cancel.as_ref()) {
            tracing::debug!(index, "cancelled before operation");
            return abort_with(
                driver,
                session,
                RunError::Cancelled(CancelPoint::BeforeOperation(index)),
                0,
            );
        }
        match driver.execute(session, &unit.collection, operation) {
            Ok(output) => results.push(output),
            Err(source) => {
                tracing::warn!(index, error = ?source, "operation failed");
                return abort_with(driver, session, RunError::Operation { index, source }, 0);
            }
        }
    }

    let mut attempts: u32 = 0;
    loop {
        if is_cancelled(config.cancel.as_ref()) {
            tracing::debug!("cancelled before commit");
            return abort_with(
                driver,
                session,
                RunError::Cancelled(CancelPoint::BeforeCommit),
                attempts,
            );
        }
        attempts += 1;
        tracing::debug!(phase = ?Phase::Committing, attempt = attempts, "committing");
        match driver.commit(session) {
            Ok(()) => {
                tracing::debug!(phase = ?Phase::Committed, attempts, "commit acknowledged");
                return Verdict::Committed {
                    results,
                    commit_attempts: attempts,
                };
            }
            Err(source) => match source.classification() {
                FailureClass::RetryableCommit if attempts <= config.commit_retry_limit => {
                    tracing::debug!(
                        attempt = attempts,
                        error = ?source,
                        "commit acknowledgement lost, retrying"
                    );
                }
                FailureClass::RetryableCommit => {
                    tracing::warn!(
                        attempts,
                        error = ?source,
                        "commit outcome unknown, retry budget exhausted"
                    );
                    let abort_error = abort_once(driver, session);
                    return Verdict::CommitUnknown {
                        last_error: source,
                        commit_attempts: attempts,
                        abort_error,
                    };
                }
                classification => {
                    tracing::warn!(attempts, ?classification, error = ?source, "commit failed");
                    return abort_with(
                        driver,
                        session,
                        RunError::Commit { attempts, source },
                        attempts,
                    );
                }
            },
        }
    }
}

/// Abort once and fold the cause into an aborted verdict.
fn abort_with<D: SessionDriver>(
    driver: &D,
    session: &mut D::Session,
    cause: RunError<D::Error>,
    commit_attempts: u32,
) -> Verdict<D::Error> {
    let abort_error = abort_once(driver, session);
    Verdict::Aborted {
        cause,
        abort_error,
        commit_attempts,
    }
}

/// The one abort call a failing run gets. Its own failure is reported back,
/// never escalated.
fn abort_once<D: SessionDriver>(driver: &D, session: &mut D::Session) -> Option<D::Error> {
    tracing::debug!(phase = ?Phase::Aborting, "aborting transaction");
    match driver.abort(session) {
        Ok(()) => {
            tracing::debug!(phase = ?Phase::Aborted, "transaction aborted");
            None
        }
        Err(error) => {
            tracing::warn!(?error, "abort failed");
            Some(error)
        }
    }
}

fn is_cancelled(cancel: Option<&CancelToken>) -> bool {
    cancel.is_some_and(CancelToken::is_cancelled)
}

fn stamp(started_at: DateTime<Local>) -> RunTiming {
    RunTiming::new(started_at, Local::now())
}

/// A run's terminal state before timing is attached.
enum Verdict<E> {
    Committed {
        results: Vec<OperationOutput>,
        commit_attempts: u32,
    },
    Aborted {
        cause: RunError<E>,
        abort_error: Option<E>,
        commit_attempts: u32,
    },
    CommitUnknown {
        last_error: E,
        commit_attempts: u32,
        abort_error: Option<E>,
    },
    Failed {
        error: RunError<E>,
    },
}

impl<E> Verdict<E> {
    fn seal(self, timing: RunTiming) -> Outcome<E> {
        match self {
            Self::Committed {
                results,
                commit_attempts,
            } => Outcome::Committed(Committed {
                results,
                commit_attempts,
                timing,
            }),
            Self::Aborted {
                cause,
                abort_error,
                commit_attempts,
            } => Outcome::Aborted(Aborted {
                cause,
                abort_error,
                commit_attempts,
                timing,
            }),
            Self::CommitUnknown {
                last_error,
                commit_attempts,
                abort_error,
            } => Outcome::CommitUnknown(CommitUnknown {
                last_error,
                commit_attempts,
                abort_error,
                timing,
            }),
            Self::Failed { error } => Outcome::Failed(Failed { error, timing }),
        }
    }
}
