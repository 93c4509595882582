//! Session drivers for doctx.
//!
//! [`memory::MemoryStore`] implements the whole session and transaction
//! surface against process-local state and is the reference for what each
//! primitive means. [`fault::FaultDriver`] wraps it with scripted and
//! random fault injection, which is how the retry, abort, and
//! commit-unknown paths get exercised without a real network.

pub mod fault;
pub mod memory;

pub use fault::{FaultDriver, FaultPlan};
pub use memory::MemoryStore;
