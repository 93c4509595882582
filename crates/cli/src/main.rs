use std::{fs, process};

use chrono::Utc;
use clap::Parser;
use doctx_cli::{App, Command, DemoArgs, DemoWorkload, RunArgs};
use doctx_core::config::{ReadConsistency, RunConfig, WriteDurability};
use doctx_core::doc;
use doctx_core::document::Document;
use doctx_core::outcome::Outcome;
use doctx_core::unit::{Operation, UnitOfWork};
use doctx_drivers::{FaultDriver, FaultPlan, MemoryStore};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let app = App::parse();
    match &app.command {
        Command::Demo(args) => demo(args),
        Command::Run(args) => run_file(args),
    }
}

fn satoshi() -> Document {
    doc! {
        "name" => "satoshi",
        "address" => doc! {
            "country" => "Japan",
            "pref" => "Kanagawa",
            "city" => "Yokohama",
            "zipcode" => "220-0001",
        },
        "lastModified" => Utc::now(),
    }
}

fn vigyan() -> Document {
    doc! {
        "name" => "vigyan",
        "address" => doc! {
            "country" => "Australia",
            "state" => "VIC",
            "city" => "Melbourne",
            "street" => "120 Collins Street",
            "zipcode" => "3000",
        },
        "lastModified" => Utc::now(),
    }
}

/// The two variants of the original sample program, as data: the insert-only
/// unit under default options, and the upsert + read-modify unit on a causal
/// session with snapshot reads and majority writes.
fn demo(args: &DemoArgs) {
    let plan = FaultPlan {
        ack_loss: args.ack_loss,
        ..FaultPlan::default()
    };
    let driver = FaultDriver::new(plan);

    let (label, unit, config) = match args.workload {
        DemoWorkload::Inserts => (
            "inserts",
            UnitOfWork::new(
                "people",
                vec![
                    Operation::insert("satoshi", satoshi()),
                    Operation::insert("vigyan", vigyan()),
                ],
            ),
            RunConfig::default(),
        ),
        DemoWorkload::ReadModify => (
            "read-modify",
            UnitOfWork::new(
                "people",
                vec![
                    Operation::upsert("satoshi", satoshi()),
                    Operation::upsert("vigyan", vigyan()),
                    Operation::find_and_update(
                        "satoshi",
                        doc! { "verified" => true, "lastModified" => Utc::now() },
                    ),
                ],
            ),
            RunConfig::builder()
                .causally_consistent(true)
                .read_consistency(ReadConsistency::Snapshot)
                .write_durability(WriteDurability::Majority)
                .build(),
        ),
    };

    let outcome = doctx_core::run(&driver, &unit, &config);
    let committed = report(label, &unit, &outcome, args.json);

    if !args.json {
        for key in ["satoshi", "vigyan"] {
            if let Some(document) = driver.store().committed("people", key) {
                println!("people/{key}: {document:?}");
            }
        }
    }

    if !committed {
        process::exit(1);
    }
}

fn run_file(args: &RunArgs) {
    let file = fs::File::open(&args.file).unwrap_or_else(|e| {
        eprintln!("Failed to open {}: {e}", args.file.display());
        process::exit(1);
    });
    let unit: UnitOfWork = serde_json::from_reader(file).unwrap_or_else(|e| {
        eprintln!("Failed to parse {}: {e}", args.file.display());
        process::exit(1);
    });

    let filename = args.file.file_name().unwrap_or_default().to_string_lossy();
    let store = MemoryStore::new();
    let outcome = doctx_core::run(&store, &unit, &args.config());
    if !report(&filename, &unit, &outcome, args.json) {
        process::exit(1);
    }
}

/// Print one run's result; true means it committed.
fn report<E: std::fmt::Debug>(
    label: &str,
    unit: &UnitOfWork,
    outcome: &Outcome<E>,
    json: bool,
) -> bool {
    let elapsed_ms = outcome.timing().elapsed().num_milliseconds();
    match outcome {
        Outcome::Committed(committed) => {
            if json {
                let result = serde_json::json!({
                    "unit": label,
                    "collection": unit.collection,
                    "status": "committed",
                    "operations": committed.results.len(),
                    "commit_attempts": committed.commit_attempts,
                    "elapsed_ms": elapsed_ms,
                });
                println!("{}", serde_json::to_string(&result).unwrap());
            } else {
                println!(
                    "{label}: COMMITTED ({} operations, {} commit attempts, {elapsed_ms} ms)",
                    committed.results.len(),
                    committed.commit_attempts,
                );
            }
            true
        }
        Outcome::Aborted(aborted) => {
            if json {
                let result = serde_json::json!({
                    "unit": label,
                    "collection": unit.collection,
                    "status": "aborted",
                    "cause": format!("{:?}", aborted.cause),
                    "abort_error": aborted.abort_error.as_ref().map(|e| format!("{e:?}")),
                    "commit_attempts": aborted.commit_attempts,
                    "elapsed_ms": elapsed_ms,
                });
                println!("{}", serde_json::to_string(&result).unwrap());
            } else {
                println!("{label}: ABORTED ({:?})", aborted.cause);
                if let Some(error) = &aborted.abort_error {
                    println!("  abort error: {error:?}");
                }
            }
            false
        }
        Outcome::CommitUnknown(unknown) => {
            if json {
                let result = serde_json::json!({
                    "unit": label,
                    "collection": unit.collection,
                    "status": "commit_unknown",
                    "last_error": format!("{:?}", unknown.last_error),
                    "abort_error": unknown.abort_error.as_ref().map(|e| format!("{e:?}")),
                    "commit_attempts": unknown.commit_attempts,
                    "elapsed_ms": elapsed_ms,
                });
                println!("{}", serde_json::to_string(&result).unwrap());
            } else {
                println!(
                    "{label}: COMMIT UNKNOWN after {} attempts ({:?})",
                    unknown.commit_attempts, unknown.last_error,
                );
            }
            false
        }
        Outcome::Failed(failed) => {
            if json {
                let result = serde_json::json!({
                    "unit": label,
                    "collection": unit.collection,
                    "status": "failed",
                    "error": format!("{:?}", failed.error),
                    "elapsed_ms": elapsed_ms,
                });
                println!("{}", serde_json::to_string(&result).unwrap());
            } else {
                println!("{label}: FAILED ({:?})", failed.error);
            }
            false
        }
    }
}
