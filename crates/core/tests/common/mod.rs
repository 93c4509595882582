// Shared across the integration test binaries; not every binary uses
// every helper.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use doctx_core::cancel::CancelToken;
use doctx_core::config::TransactionOptions;
use doctx_core::driver::SessionDriver;
use doctx_core::error::{Failure, FailureClass};
use doctx_core::unit::{Operation, OperationOutput};

/// One primitive call observed by [`ScriptDriver`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    OpenSession { causally_consistent: bool },
    StartTransaction { options: TransactionOptions },
    Execute { key: String },
    Commit,
    Abort,
    CloseSession,
}

/// Scripted failure with a fixed classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    pub label: &'static str,
    pub class: FailureClass,
}

impl ScriptError {
    pub const fn fatal(label: &'static str) -> Self {
        Self {
            label,
            class: FailureClass::Fatal,
        }
    }

    pub const fn retryable(label: &'static str) -> Self {
        Self {
            label,
            class: FailureClass::RetryableCommit,
        }
    }

    pub const fn transient(label: &'static str) -> Self {
        Self {
            label,
            class: FailureClass::TransientTransaction,
        }
    }
}

impl Failure for ScriptError {
    fn classification(&self) -> FailureClass {
        self.class
    }
}

/// A driver that records every primitive call and fails where the script
/// says so.
///
/// Failure points are set up front with the `fail_*` builders; the recorded
/// call sequence is read back with [`calls`](Self::calls).
#[derive(Debug, Default)]
pub struct ScriptDriver {
    calls: Mutex<Vec<Call>>,
    open_error: Option<ScriptError>,
    start_error: Option<ScriptError>,
    /// Keyed by zero-based operation index.
    execute_errors: HashMap<usize, ScriptError>,
    /// Keyed by one-based commit attempt.
    commit_errors: HashMap<u32, ScriptError>,
    abort_error: Option<ScriptError>,
    close_error: Option<ScriptError>,
    /// Cancel the held token once the execute at this zero-based index
    /// returns.
    cancel_after_execute: Option<(usize, CancelToken)>,
    /// Cancel the held token once this one-based commit attempt returns.
    cancel_after_commit: Option<(u32, CancelToken)>,
}

impl ScriptDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_open(mut self, error: ScriptError) -> Self {
        self.open_error = Some(error);
        self
    }

    pub fn fail_start(mut self, error: ScriptError) -> Self {
        self.start_error = Some(error);
        self
    }

    pub fn fail_execute(mut self, index: usize, error: ScriptError) -> Self {
        self.execute_errors.insert(index, error);
        self
    }

    pub fn fail_commit(mut self, attempt: u32, error: ScriptError) -> Self {
        self.commit_errors.insert(attempt, error);
        self
    }

    pub fn fail_abort(mut self, error: ScriptError) -> Self {
        self.abort_error = Some(error);
        self
    }

    pub fn fail_close(mut self, error: ScriptError) -> Self {
        self.close_error = Some(error);
        self
    }

    pub fn cancel_after_execute(mut self, index: usize, token: CancelToken) -> Self {
        self.cancel_after_execute = Some((index, token));
        self
    }

    pub fn cancel_after_commit(mut self, attempt: u32, token: CancelToken) -> Self {
        self.cancel_after_commit = Some((attempt, token));
        self
    }

    /// Snapshot of the calls recorded so far.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// How many recorded calls match `predicate`.
    pub fn count(&self, predicate: fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn output_for(operation: &Operation) -> OperationOutput {
    match operation {
        Operation::Insert { key, .. } => OperationOutput::Inserted { key: key.clone() },
        Operation::Upsert { key, .. } => OperationOutput::Upserted {
            key: key.clone(),
            created: true,
        },
        Operation::FindAndUpdate { key, update } => OperationOutput::Updated {
            key: key.clone(),
            document: Some(update.clone()),
        },
    }
}

impl SessionDriver for ScriptDriver {
    type Session = u64;
    type Error = ScriptError;

    fn open_session(&self, causally_consistent: bool) -> Result<u64, ScriptError> {
        self.record(Call::OpenSession {
            causally_consistent,
        });
        match &self.open_error {
            Some(error) => Err(error.clone()),
            None => {
                let id = self.count(|call| matches!(call, Call::OpenSession { .. }));
                Ok(id as u64)
            }
        }
    }

    fn start_transaction(
        &self,
        _session: &mut u64,
        options: &TransactionOptions,
    ) -> Result<(), ScriptError> {
        self.record(Call::StartTransaction { options: *options });
        match &self.start_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn execute(
        &self,
        _session: &mut u64,
        _collection: &str,
        operation: &Operation,
    ) -> Result<OperationOutput, ScriptError> {
        let index = self.count(|call| matches!(call, Call::Execute { .. }));
        self.record(Call::Execute {
            key: operation.key().to_string(),
        });
        if let Some((at, token)) = &self.cancel_after_execute {
            if *at == index {
                token.cancel();
            }
        }
        match self.execute_errors.get(&index) {
            Some(error) => Err(error.clone()),
            None => Ok(output_for(operation)),
        }
    }

    fn commit(&self, _session: &mut u64) -> Result<(), ScriptError> {
        self.record(Call::Commit);
        let attempt = self.count(|call| matches!(call, Call::Commit)) as u32;
        if let Some((at, token)) = &self.cancel_after_commit {
            if *at == attempt {
                token.cancel();
            }
        }
        match self.commit_errors.get(&attempt) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn abort(&self, _session: &mut u64) -> Result<(), ScriptError> {
        self.record(Call::Abort);
        match &self.abort_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn close_session(&self, _session: u64) -> Result<(), ScriptError> {
        self.record(Call::CloseSession);
        match &self.close_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// A unit of work with `n` insert operations on distinct keys.
pub fn inserts(n: usize) -> doctx_core::unit::UnitOfWork {
    let operations = (0..n)
        .map(|i| Operation::insert(format!("key-{i}"), doctx_core::doc! { "seq" => i as i64 }))
        .collect();
    doctx_core::unit::UnitOfWork::new("records", operations)
}
