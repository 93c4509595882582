//! Scripted and random fault injection around [`MemoryStore`].
//!
//! A [`FaultDriver`] counts every primitive call and consults a
//! [`FaultPlan`] before delegating to the store. Faults distinguish a
//! request lost on the way in (the store never saw it) from an
//! acknowledgement lost on the way back (the store applied it), which is
//! the difference that makes commit retries worth testing.

use doctx_core::config::TransactionOptions;
use doctx_core::driver::SessionDriver;
use doctx_core::error::{Failure, FailureClass};
use doctx_core::unit::{Operation, OperationOutput};
use hashbrown::HashMap;
use parking_lot::Mutex;
use rand::RngExt;

use crate::memory::{MemoryError, MemorySession, MemoryStore};

/// How a scripted commit call misbehaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitFault {
    /// The commit request never reaches the store.
    Lost,
    /// The store commits, but the acknowledgement is dropped on the way
    /// back.
    AckLost,
    /// The store definitively refuses the commit.
    Reject(String),
}

/// Which calls fail, keyed by one-based call number counted across the
/// driver's lifetime.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    pub commit: HashMap<u32, CommitFault>,
    /// Execute calls that fail as unavailable, with the message to attach.
    pub execute: HashMap<u32, String>,
    pub abort: HashMap<u32, String>,
    pub close: HashMap<u32, String>,
    /// Probability that an unscripted commit loses its acknowledgement
    /// after applying.
    pub ack_loss: Option<f64>,
}

/// What the fault layer surfaces to the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultError {
    /// The store itself refused, no fault involved.
    Store(MemoryError),
    /// No acknowledgement came back. The commit may or may not have
    /// applied.
    CommitAckLost,
    /// The node went away mid-call.
    Unavailable(String),
    /// The store refused the commit for good.
    Rejected(String),
}

impl Failure for FaultError {
    fn classification(&self) -> FailureClass {
        match self {
            Self::Store(error) => error.classification(),
            Self::CommitAckLost => FailureClass::RetryableCommit,
            Self::Unavailable(_) => FailureClass::TransientTransaction,
            Self::Rejected(_) => FailureClass::Fatal,
        }
    }
}

#[derive(Debug, Default)]
struct CallCounters {
    execute: u32,
    commit: u32,
    abort: u32,
    close: u32,
}

fn bump(counter: &mut u32) -> u32 {
    *counter += 1;
    *counter
}

/// A [`MemoryStore`] wrapped with fault injection.
#[derive(Debug)]
pub struct FaultDriver {
    store: MemoryStore,
    plan: FaultPlan,
    counters: Mutex<CallCounters>,
}

impl FaultDriver {
    #[must_use]
    pub fn new(plan: FaultPlan) -> Self {
        Self {
            store: MemoryStore::new(),
            plan,
            counters: Mutex::default(),
        }
    }

    /// The store underneath, for state assertions after a run.
    #[must_use]
    pub const fn store(&self) -> &MemoryStore {
        &self.store
    }
}

impl SessionDriver for FaultDriver {
    type Session = MemorySession;
    type Error = FaultError;

    fn open_session(&self, causally_consistent: bool) -> Result<MemorySession, FaultError> {
        self.store
            .open_session(causally_consistent)
            .map_err(FaultError::Store)
    }

    fn start_transaction(
        &self,
        session: &mut MemorySession,
        options: &TransactionOptions,
    ) -> Result<(), FaultError> {
        self.store
            .start_transaction(session, options)
            .map_err(FaultError::Store)
    }

    fn execute(
        &self,
        session: &mut MemorySession,
        collection: &str,
        operation: &Operation,
    ) -> Result<OperationOutput, FaultError> {
        let call = bump(&mut self.counters.lock().execute);
        if let Some(message) = self.plan.execute.get(&call) {
            tracing::debug!(call, "execute never reaches the store");
            return Err(FaultError::Unavailable(message.clone()));
        }
        self.store
            .execute(session, collection, operation)
            .map_err(FaultError::Store)
    }

    fn commit(&self, session: &mut MemorySession) -> Result<(), FaultError> {
        let call = bump(&mut self.counters.lock().commit);
        match self.plan.commit.get(&call) {
            Some(CommitFault::Lost) => {
                tracing::debug!(call, "commit request lost");
                return Err(FaultError::CommitAckLost);
            }
            Some(CommitFault::AckLost) => {
                self.store.commit(session).map_err(FaultError::Store)?;
                tracing::debug!(call, "commit applied, acknowledgement dropped");
                return Err(FaultError::CommitAckLost);
            }
            Some(CommitFault::Reject(message)) => {
                tracing::debug!(call, "commit rejected");
                return Err(FaultError::Rejected(message.clone()));
            }
            None => {}
        }
        if let Some(probability) = self.plan.ack_loss {
            if rand::rng().random::<f64>() < probability {
                self.store.commit(session).map_err(FaultError::Store)?;
                tracing::debug!(call, "commit acknowledgement lost at random");
                return Err(FaultError::CommitAckLost);
            }
        }
        self.store.commit(session).map_err(FaultError::Store)
    }

    fn abort(&self, session: &mut MemorySession) -> Result<(), FaultError> {
        let call = bump(&mut self.counters.lock().abort);
        if let Some(message) = self.plan.abort.get(&call) {
            tracing::debug!(call, "abort request lost");
            return Err(FaultError::Unavailable(message.clone()));
        }
        self.store.abort(session).map_err(FaultError::Store)
    }

    fn close_session(&self, session: MemorySession) -> Result<(), FaultError> {
        let call = bump(&mut self.counters.lock().close);
        if let Some(message) = self.plan.close.get(&call) {
            tracing::debug!(call, "close request lost");
            return Err(FaultError::Unavailable(message.clone()));
        }
        self.store.close_session(session).map_err(FaultError::Store)
    }
}
