use crate::config::TransactionOptions;
use crate::error::Failure;
use crate::unit::{Operation, OperationOutput};

/// The session and transaction primitives the runner drives.
///
/// A driver binds these six calls to a concrete database. Every call blocks
/// until it returns success or a classified error; the runner performs them
/// strictly sequentially for one session.
pub trait SessionDriver {
    /// Handle for one causally-ordered client context. Owned by the runner
    /// for the duration of a run.
    type Session;

    /// The driver's error type; its [`classification`](Failure::classification)
    /// selects the retry/abort policy.
    type Error: Failure;

    /// Open a fresh session.
    ///
    /// # Errors
    ///
    /// Returns an error if no session can be established.
    fn open_session(&self, causally_consistent: bool) -> Result<Self::Session, Self::Error>;

    /// Start a transaction on the session with the given options. At most one
    /// transaction is active per session at a time.
    ///
    /// # Errors
    ///
    /// Returns an error if a transaction is already active or the options are
    /// rejected.
    fn start_transaction(
        &self,
        session: &mut Self::Session,
        options: &TransactionOptions,
    ) -> Result<(), Self::Error>;

    /// Execute one operation under the session's active transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation is rejected; the transaction is left
    /// active so a subsequent [`abort`](Self::abort) lands.
    fn execute(
        &self,
        session: &mut Self::Session,
        collection: &str,
        operation: &Operation,
    ) -> Result<OperationOutput, Self::Error>;

    /// Commit the active transaction. Re-issuing commit after a lost
    /// acknowledgement must be idempotent: a transaction that already
    /// applied acknowledges again without applying twice.
    ///
    /// # Errors
    ///
    /// Returns an error carrying the commit failure's classification.
    fn commit(&self, session: &mut Self::Session) -> Result<(), Self::Error>;

    /// Roll back the active transaction. Called at most once per run.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback cannot be confirmed; the runner
    /// records it next to the failure that triggered the abort.
    fn abort(&self, session: &mut Self::Session) -> Result<(), Self::Error>;

    /// Release the session. A close failure never changes a run's outcome;
    /// the runner only logs it.
    ///
    /// # Errors
    ///
    /// Returns an error if the session could not be released cleanly.
    fn close_session(&self, session: Self::Session) -> Result<(), Self::Error>;
}
