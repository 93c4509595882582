//! doctx CLI -- run document transactions against the in-memory store.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use doctx_core::cancel::CancelToken;
use doctx_core::config::{
    ReadConsistency, RunConfig, WriteDurability, DEFAULT_COMMIT_RETRY_LIMIT,
};

#[derive(Debug, Parser)]
#[command(
    name = "doctx",
    about = "Client-side lifecycle control for multi-document transactions"
)]
pub struct App {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a built-in demonstration workload
    Demo(DemoArgs),
    /// Run a unit of work read from a JSON file
    Run(RunArgs),
}

#[derive(Debug, Parser)]
pub struct DemoArgs {
    /// Which workload to run
    #[arg(long)]
    pub workload: DemoWorkload,
    /// Probability that a commit acknowledgement is lost
    #[arg(long)]
    pub ack_loss: Option<f64>,
    /// Output results as JSON (one object per run)
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum DemoWorkload {
    /// Insert two fresh documents in one transaction
    Inserts,
    /// Seed documents, then read and update on a causal session with
    /// snapshot reads
    ReadModify,
}

#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Path to a JSON unit-of-work file
    pub file: PathBuf,
    /// Open a causally consistent session
    #[arg(long)]
    pub causal: bool,
    /// Pin reads to a snapshot taken at transaction start
    #[arg(long)]
    pub snapshot: bool,
    /// Require majority durability for the commit
    #[arg(long)]
    pub majority: bool,
    /// Extra commit attempts after a lost acknowledgement
    #[arg(long, default_value_t = DEFAULT_COMMIT_RETRY_LIMIT)]
    pub commit_retry_limit: u32,
    /// Give up cooperatively after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// Output the result as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    /// The run configuration these flags describe.
    #[must_use]
    pub fn config(&self) -> RunConfig {
        let read_consistency = if self.snapshot {
            ReadConsistency::Snapshot
        } else {
            ReadConsistency::Local
        };
        let write_durability = if self.majority {
            WriteDurability::Majority
        } else {
            WriteDurability::Acknowledged
        };
        let mut config = RunConfig::builder()
            .causally_consistent(self.causal)
            .read_consistency(read_consistency)
            .write_durability(write_durability)
            .commit_retry_limit(self.commit_retry_limit)
            .build();
        config.cancel = self
            .timeout_ms
            .map(|ms| CancelToken::with_deadline(Duration::from_millis(ms)));
        config
    }
}
