//! A multi-version in-memory document store with session semantics.
//!
//! Committed documents are kept as append-only version chains stamped with a
//! global commit sequence number. A transaction stages its writes privately,
//! reads through that staging overlay, and publishes everything in one step
//! at commit. Conflicts are resolved first-committer-wins: a commit fails if
//! any staged key gained a committed version after the transaction's
//! snapshot point.
//!
//! The store is a single node, so `WriteDurability::Majority` degenerates to
//! an ordinary acknowledgement. The option is still accepted and recorded.

use doctx_core::config::{ReadConsistency, TransactionOptions};
use doctx_core::document::Document;
use doctx_core::driver::SessionDriver;
use doctx_core::error::{Failure, FailureClass};
use doctx_core::unit::{Operation, OperationOutput};
use hashbrown::HashMap;
use parking_lot::RwLock;

/// What the store can refuse to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// An insert targeted a key that is already visible to the transaction.
    DuplicateKey { collection: String, key: String },
    /// Another transaction committed this key after this transaction's
    /// snapshot point. The loser stays active so it can still be aborted.
    WriteConflict { collection: String, key: String },
    /// The session has no transaction to serve this call.
    NoActiveTransaction,
    /// The session already has an active transaction.
    TransactionAlreadyActive,
}

impl Failure for MemoryError {
    fn classification(&self) -> FailureClass {
        match self {
            Self::WriteConflict { .. } => FailureClass::TransientTransaction,
            Self::DuplicateKey { .. }
            | Self::NoActiveTransaction
            | Self::TransactionAlreadyActive => FailureClass::Fatal,
        }
    }
}

// -- Store state -------------------------------------------------------------

#[derive(Debug, Clone)]
struct DocumentVersion {
    committed_at: u64,
    document: Document,
}

#[derive(Debug, Default)]
struct StoreInner {
    /// Bumped once per committed transaction.
    commit_seq: u64,
    next_session_id: u64,
    /// Collection name to key to version chain, oldest first.
    collections: HashMap<String, HashMap<String, Vec<DocumentVersion>>>,
}

impl StoreInner {
    /// The committed document visible at `snapshot`, or the latest one when
    /// no snapshot is pinned.
    fn visible(&self, collection: &str, key: &str, snapshot: Option<u64>) -> Option<&Document> {
        let versions = self.collections.get(collection)?.get(key)?;
        let version = match snapshot {
            None => versions.last(),
            Some(seq) => versions.iter().rev().find(|v| v.committed_at <= seq),
        };
        version.map(|v| &v.document)
    }
}

// -- Sessions and transactions -----------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum TxStatus {
    Active,
    Committed,
}

#[derive(Debug)]
struct OpenTransaction {
    options: TransactionOptions,
    /// Commit sequence observed at transaction start.
    snapshot_seq: u64,
    /// Collection name to key to staged document, private until commit.
    staged: HashMap<String, HashMap<String, Document>>,
    status: TxStatus,
}

/// One client session against a [`MemoryStore`].
///
/// Causally consistent sessions remember the sequence number of their own
/// commits, so a later transaction on the same session never snapshots
/// before its predecessor's writes.
#[derive(Debug)]
pub struct MemorySession {
    id: u64,
    causally_consistent: bool,
    observed_seq: u64,
    transaction: Option<OpenTransaction>,
}

impl MemorySession {
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// The newest commit sequence this session is guaranteed to observe.
    #[must_use]
    pub const fn observed_seq(&self) -> u64 {
        self.observed_seq
    }
}

// -- The store ---------------------------------------------------------------

/// The shared store. One value serves any number of concurrent sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<StoreInner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest committed document under `key`, if any.
    #[must_use]
    pub fn committed(&self, collection: &str, key: &str) -> Option<Document> {
        self.inner.read().visible(collection, key, None).cloned()
    }

    /// How many committed versions `key` has accumulated.
    #[must_use]
    pub fn version_count(&self, collection: &str, key: &str) -> usize {
        self.inner
            .read()
            .collections
            .get(collection)
            .and_then(|keys| keys.get(key))
            .map_or(0, Vec::len)
    }

    /// The global commit sequence, equal to the number of committed
    /// transactions.
    #[must_use]
    pub fn commit_seq(&self) -> u64 {
        self.inner.read().commit_seq
    }
}

fn apply_operation(
    inner: &StoreInner,
    txn: &mut OpenTransaction,
    collection: &str,
    operation: &Operation,
) -> Result<OperationOutput, MemoryError> {
    let snapshot = match txn.options.read_consistency {
        ReadConsistency::Local => None,
        ReadConsistency::Snapshot => Some(txn.snapshot_seq),
    };
    let key = operation.key();
    // Staged writes shadow committed versions: a transaction reads its own
    // writes before anything else.
    let existing = txn
        .staged
        .get(collection)
        .and_then(|staged| staged.get(key))
        .cloned()
        .or_else(|| inner.visible(collection, key, snapshot).cloned());

    let stage = |txn: &mut OpenTransaction, document: Document| {
        txn.staged
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), document);
    };

    match operation {
        Operation::Insert { key, document } => {
            if existing.is_some() {
                return Err(MemoryError::DuplicateKey {
                    collection: collection.to_string(),
                    key: key.clone(),
                });
            }
            stage(txn, document.clone());
            Ok(OperationOutput::Inserted { key: key.clone() })
        }
        Operation::Upsert { key, document } => {
            let created = existing.is_none();
            stage(txn, document.clone());
            Ok(OperationOutput::Upserted {
                key: key.clone(),
                created,
            })
        }
        Operation::FindAndUpdate { key, update } => {
            let document = existing.map(|mut document| {
                document.merge(update);
                stage(txn, document.clone());
                document
            });
            Ok(OperationOutput::Updated {
                key: key.clone(),
                document,
            })
        }
    }
}

impl SessionDriver for MemoryStore {
    type Session = MemorySession;
    type Error = MemoryError;

    fn open_session(&self, causally_consistent: bool) -> Result<MemorySession, MemoryError> {
        let mut inner = self.inner.write();
        inner.next_session_id += 1;
        let id = inner.next_session_id;
        tracing::debug!(session = id, causally_consistent, "session opened");
        Ok(MemorySession {
            id,
            causally_consistent,
            observed_seq: 0,
            transaction: None,
        })
    }

    fn start_transaction(
        &self,
        session: &mut MemorySession,
        options: &TransactionOptions,
    ) -> Result<(), MemoryError> {
        if matches!(&session.transaction, Some(txn) if txn.status == TxStatus::Active) {
            return Err(MemoryError::TransactionAlreadyActive);
        }
        let snapshot_seq = self.inner.read().commit_seq.max(session.observed_seq);
        session.transaction = Some(OpenTransaction {
            options: *options,
            snapshot_seq,
            staged: HashMap::new(),
            status: TxStatus::Active,
        });
        tracing::debug!(session = session.id, snapshot_seq, "transaction started");
        Ok(())
    }

    fn execute(
        &self,
        session: &mut MemorySession,
        collection: &str,
        operation: &Operation,
    ) -> Result<OperationOutput, MemoryError> {
        let Some(txn) = session.transaction.as_mut() else {
            return Err(MemoryError::NoActiveTransaction);
        };
        if txn.status == TxStatus::Committed {
            return Err(MemoryError::NoActiveTransaction);
        }
        let inner = self.inner.read();
        apply_operation(&inner, txn, collection, operation)
    }

    fn commit(&self, session: &mut MemorySession) -> Result<(), MemoryError> {
        let Some(txn) = session.transaction.as_mut() else {
            return Err(MemoryError::NoActiveTransaction);
        };
        if txn.status == TxStatus::Committed {
            // A retried commit after a lost acknowledgement lands here.
            tracing::debug!(session = session.id, "commit re-acknowledged");
            return Ok(());
        }

        let mut inner = self.inner.write();
        for (collection, staged) in &txn.staged {
            for key in staged.keys() {
                let newer = inner
                    .collections
                    .get(collection)
                    .and_then(|keys| keys.get(key))
                    .is_some_and(|versions| {
                        versions.iter().any(|v| v.committed_at > txn.snapshot_seq)
                    });
                if newer {
                    // The transaction stays active: the caller still gets to
                    // abort it.
                    return Err(MemoryError::WriteConflict {
                        collection: collection.clone(),
                        key: key.clone(),
                    });
                }
            }
        }

        inner.commit_seq += 1;
        let seq = inner.commit_seq;
        for (collection, staged) in txn.staged.drain() {
            let keys = inner.collections.entry(collection).or_default();
            for (key, document) in staged {
                keys.entry(key).or_default().push(DocumentVersion {
                    committed_at: seq,
                    document,
                });
            }
        }
        txn.status = TxStatus::Committed;
        if session.causally_consistent {
            session.observed_seq = seq;
        }
        tracing::debug!(session = session.id, seq, "transaction committed");
        Ok(())
    }

    fn abort(&self, session: &mut MemorySession) -> Result<(), MemoryError> {
        match session.transaction.take() {
            Some(txn) if txn.status == TxStatus::Active => {
                tracing::debug!(session = session.id, "transaction aborted");
                Ok(())
            }
            // Either never started or already committed; nothing to roll
            // back.
            Some(_) | None => Err(MemoryError::NoActiveTransaction),
        }
    }

    fn close_session(&self, session: MemorySession) -> Result<(), MemoryError> {
        let discarded =
            matches!(&session.transaction, Some(txn) if txn.status == TxStatus::Active);
        tracing::debug!(
            session = session.id,
            discarded_active_transaction = discarded,
            "session closed"
        );
        Ok(())
    }
}
