use typed_builder::TypedBuilder;

use crate::cancel::CancelToken;

/// Extra commit attempts allowed after the first acknowledgement is lost.
pub const DEFAULT_COMMIT_RETRY_LIMIT: u32 = 1;

/// What a read inside the transaction is allowed to observe.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ReadConsistency {
    /// Reads observe the latest locally committed state at each operation.
    #[default]
    Local,
    /// All reads observe one point-in-time view established at transaction
    /// start.
    Snapshot,
}

/// When a write counts as acknowledged.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum WriteDurability {
    /// Acknowledged once accepted by the node serving the session.
    #[default]
    Acknowledged,
    /// Acknowledged only once replicated to a majority of nodes.
    Majority,
}

/// Consistency options one transaction is started with.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    pub read_consistency: ReadConsistency,
    pub write_durability: WriteDurability,
}

impl TransactionOptions {
    #[must_use]
    pub const fn new(read_consistency: ReadConsistency, write_durability: WriteDurability) -> Self {
        Self {
            read_consistency,
            write_durability,
        }
    }
}

/// Configuration for one run.
///
/// `RunConfig::default()` matches the builder's defaults: a non-causal
/// session, local reads, acknowledged writes, one commit retry, and no
/// cancellation signal.
#[derive(Debug, Clone, TypedBuilder)]
pub struct RunConfig {
    /// Open the session with causal ordering across its operations.
    #[builder(default = false)]
    pub causally_consistent: bool,
    #[builder(default)]
    pub read_consistency: ReadConsistency,
    #[builder(default)]
    pub write_durability: WriteDurability,
    /// Extra commit attempts allowed when the acknowledgement is lost.
    #[builder(default = DEFAULT_COMMIT_RETRY_LIMIT)]
    pub commit_retry_limit: u32,
    /// Checked between operations and before each commit attempt.
    #[builder(default, setter(strip_option))]
    pub cancel: Option<CancelToken>,
}

impl RunConfig {
    /// The options the transaction is started with.
    #[must_use]
    pub const fn transaction_options(&self) -> TransactionOptions {
        TransactionOptions {
            read_consistency: self.read_consistency,
            write_durability: self.write_durability,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
