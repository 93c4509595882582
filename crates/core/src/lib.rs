//! Client-side lifecycle control for multi-document transactions.
//!
//! `doctx_core` runs one unit of work -- an ordered list of document
//! operations against a single collection -- inside one transaction on one
//! session, with well-defined commit/abort/retry semantics and guaranteed
//! session release. All durability and isolation is delegated to a
//! [`SessionDriver`](driver::SessionDriver) binding; this crate owns only
//! the orchestration:
//!
//! 1. **Open** a session, causally consistent if configured.
//! 2. **Start** a transaction with the configured read consistency and
//!    write durability.
//! 3. **Execute** the operations in order; the first failure aborts.
//! 4. **Commit**, retrying only lost acknowledgements within the retry
//!    budget; any other failure aborts.
//! 5. **Close** the session exactly once, after the terminal commit/abort
//!    step.
//!
//! Failures carry a [`FailureClass`](error::FailureClass): lost commit
//! acknowledgements are retried because commit is idempotent per
//! transaction, transient-transaction failures are surfaced for the caller
//! to rerun, and everything else aborts immediately. A run whose every
//! commit attempt ended with a lost acknowledgement terminates in
//! [`Outcome::CommitUnknown`] -- deliberately distinct from both success
//! and failure.
//!
//! # Entry point
//!
//! The single entry point is [`run()`], which takes a driver, a
//! [`UnitOfWork`](unit::UnitOfWork), and a [`RunConfig`], and returns the
//! terminal [`Outcome`]:
//!
//! ```rust,ignore
//! use doctx_core::{doc, run, RunConfig};
//! use doctx_core::unit::{Operation, UnitOfWork};
//!
//! let unit = UnitOfWork::new(
//!     "people",
//!     vec![Operation::insert("satoshi", doc! { "name" => "satoshi" })],
//! );
//! let outcome = run(&driver, &unit, &RunConfig::default());
//! assert!(outcome.is_committed());
//! ```
//!
//! # Crate features
//!
//! - **`serde`** -- enables `Serialize`/`Deserialize` derives on the data
//!   model (`Document`, `Value`, `Operation`, `UnitOfWork`, the
//!   consistency enums).

pub mod cancel;
pub mod config;
pub mod document;
pub mod driver;
pub mod error;
pub mod outcome;
pub mod runner;
pub mod unit;

pub use config::RunConfig;
pub use outcome::Outcome;
pub use runner::run;
