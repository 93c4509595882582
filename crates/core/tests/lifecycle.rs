use doctx_core::config::{ReadConsistency, RunConfig, TransactionOptions, WriteDurability};
use doctx_core::error::{FailureClass, RunError, SetupStage};
use doctx_core::outcome::Outcome;
use doctx_core::unit::{OperationOutput, UnitOfWork};

mod common;

use common::{inserts, Call, ScriptDriver, ScriptError};

#[test]
fn committed_run_calls_primitives_in_order() {
    let driver = ScriptDriver::new();
    let outcome = doctx_core::run(&driver, &inserts(2), &RunConfig::default());

    let Outcome::Committed(committed) = outcome else {
        panic!("expected a committed outcome, got {outcome:?}");
    };
    assert_eq!(committed.commit_attempts, 1);
    assert_eq!(committed.results.len(), 2);
    assert!(matches!(
        &committed.results[0],
        OperationOutput::Inserted { key } if key == "key-0",
    ));

    assert_eq!(
        driver.calls(),
        vec![
            Call::OpenSession {
                causally_consistent: false
            },
            Call::StartTransaction {
                options: TransactionOptions::default()
            },
            Call::Execute {
                key: "key-0".to_string()
            },
            Call::Execute {
                key: "key-1".to_string()
            },
            Call::Commit,
            Call::CloseSession,
        ],
    );
}

#[test]
fn configured_consistency_reaches_the_driver() {
    let driver = ScriptDriver::new();
    let config = RunConfig::builder()
        .causally_consistent(true)
        .read_consistency(ReadConsistency::Snapshot)
        .write_durability(WriteDurability::Majority)
        .build();
    let outcome = doctx_core::run(&driver, &inserts(1), &config);
    assert!(outcome.is_committed(), "got {outcome:?}");

    let calls = driver.calls();
    assert_eq!(
        calls[0],
        Call::OpenSession {
            causally_consistent: true
        },
    );
    assert_eq!(
        calls[1],
        Call::StartTransaction {
            options: TransactionOptions::new(ReadConsistency::Snapshot, WriteDurability::Majority)
        },
    );
}

#[test]
fn empty_unit_of_work_commits() {
    let driver = ScriptDriver::new();
    let unit = UnitOfWork::new("records", Vec::new());
    let outcome = doctx_core::run(&driver, &unit, &RunConfig::default());

    let Outcome::Committed(committed) = outcome else {
        panic!("expected a committed outcome, got {outcome:?}");
    };
    assert!(committed.results.is_empty());
    assert_eq!(
        driver.calls(),
        vec![
            Call::OpenSession {
                causally_consistent: false
            },
            Call::StartTransaction {
                options: TransactionOptions::default()
            },
            Call::Commit,
            Call::CloseSession,
        ],
    );
}

#[test]
fn operation_failure_aborts_once_and_never_commits() {
    let driver = ScriptDriver::new().fail_execute(1, ScriptError::fatal("duplicate key"));
    let outcome = doctx_core::run(&driver, &inserts(3), &RunConfig::default());

    let Outcome::Aborted(aborted) = outcome else {
        panic!("expected an aborted outcome, got {outcome:?}");
    };
    assert!(matches!(
        &aborted.cause,
        RunError::Operation { index: 1, source } if source.label == "duplicate key",
    ));
    assert!(aborted.abort_error.is_none());
    assert_eq!(aborted.commit_attempts, 0);

    // The third operation never ran, commit was never attempted, and the
    // session closed exactly once, after the abort.
    assert_eq!(
        driver.calls(),
        vec![
            Call::OpenSession {
                causally_consistent: false
            },
            Call::StartTransaction {
                options: TransactionOptions::default()
            },
            Call::Execute {
                key: "key-0".to_string()
            },
            Call::Execute {
                key: "key-1".to_string()
            },
            Call::Abort,
            Call::CloseSession,
        ],
    );
}

#[test]
fn close_failure_does_not_change_the_outcome() {
    let driver = ScriptDriver::new().fail_close(ScriptError::fatal("socket reset"));
    let outcome = doctx_core::run(&driver, &inserts(1), &RunConfig::default());
    assert!(outcome.is_committed(), "got {outcome:?}");
    assert_eq!(driver.count(|call| matches!(call, Call::CloseSession)), 1);
}

#[test]
fn open_failure_acquires_nothing() {
    let driver = ScriptDriver::new().fail_open(ScriptError::fatal("no route to host"));
    let outcome = doctx_core::run(&driver, &inserts(1), &RunConfig::default());

    let Outcome::Failed(failed) = outcome else {
        panic!("expected a failed outcome, got {outcome:?}");
    };
    assert!(matches!(
        failed.error,
        RunError::Setup {
            stage: SetupStage::OpenSession,
            ..
        },
    ));
    // No session came into existence, so there is nothing to close.
    assert_eq!(
        driver.calls(),
        vec![Call::OpenSession {
            causally_consistent: false
        }],
    );
}

#[test]
fn start_failure_still_closes_the_session() {
    let driver = ScriptDriver::new().fail_start(ScriptError::fatal("options rejected"));
    let outcome = doctx_core::run(&driver, &inserts(1), &RunConfig::default());

    let Outcome::Failed(failed) = outcome else {
        panic!("expected a failed outcome, got {outcome:?}");
    };
    assert!(matches!(
        &failed.error,
        RunError::Setup {
            stage: SetupStage::StartTransaction,
            source,
        } if source.class == FailureClass::Fatal,
    ));
    // No transaction became active, so there is nothing to abort.
    assert_eq!(
        driver.calls(),
        vec![
            Call::OpenSession {
                causally_consistent: false
            },
            Call::StartTransaction {
                options: TransactionOptions::default()
            },
            Call::CloseSession,
        ],
    );
}

#[test]
fn repeated_runs_use_independent_sessions() {
    let driver = ScriptDriver::new();
    let unit = inserts(2);
    let config = RunConfig::default();

    let first = doctx_core::run(&driver, &unit, &config);
    let second = doctx_core::run(&driver, &unit, &config);
    assert!(first.is_committed(), "got {first:?}");
    assert!(second.is_committed(), "got {second:?}");

    // One session per run, each opened and closed exactly once.
    assert_eq!(driver.count(|call| matches!(call, Call::OpenSession { .. })), 2);
    assert_eq!(driver.count(|call| matches!(call, Call::CloseSession)), 2);
    assert_eq!(driver.count(|call| matches!(call, Call::Commit)), 2);
}
