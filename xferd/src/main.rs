//! xfer Daemon
//!
//! Interactive balance transfers with bounded retry on concurrency conflicts.
//!
//! # Usage
//!
//! ```bash
//! # In-process store
//! cargo run -p xferd
//!
//! # PostgreSQL
//! XFER_STORE=postgres DATABASE_URL=postgres://localhost/xfer cargo run -p xferd --features postgres
//! ```
//!
//! # Environment Variables
//!
//! - `XFER_STORE`: Store backend (memory, postgres; default: memory)
//! - `DATABASE_URL`: Connection URL (required for postgres)
//! - `XFER_MAX_RETRIES`: Retries after the first attempt (default: 4)
//! - `XFER_RETRY_DELAY_MS`: Pause between attempts (default: 1000)
//! - `XFER_RETRYABLE_CODES`: Comma-separated retryable codes (default: 40P01,40001)
//! - `XFER_SEED_ACCOUNTS`: Accounts seeded at startup (default: 9)
//!
//! # Exit Codes
//!
//! - `0`: input finished
//! - `1`: store failure (fatal error or retries exhausted)
//! - `2`: user interrupt
//! - `3`: any other error

use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use xferd::{block_on_detached, Config, Daemon, DaemonError, EXIT_INTERRUPTED, EXIT_STORE_FAILURE};

fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr; stdout carries prompts and the balance table
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive("xferd=info".parse()?)
                .add_directive("xfer_exec=info".parse()?),
        )
        .init();

    // Not #[tokio::main]: its shutdown would wait for a pending stdin read
    let outcome = block_on_detached(async {
        match Config::from_env() {
            Ok(config) => Daemon::new(config).run().await,
            Err(e) => Err(e),
        }
    })?;

    match outcome {
        Ok(summary) => {
            info!(completed = summary.completed, rejected = summary.rejected, "xfer daemon finished");
            Ok(ExitCode::SUCCESS)
        },
        Err(e) => Ok(report_failure(&e)),
    }
}

fn report_failure(e: &DaemonError) -> ExitCode {
    let code = e.exit_code();
    error!(error = %e, exit_code = code, "xfer daemon stopped");

    match code {
        EXIT_STORE_FAILURE => println!("Failed because of database problem: {}", e),
        EXIT_INTERRUPTED => println!("Exiting because of user interrupt"),
        _ => println!("Failed because of error: {}", e),
    }

    ExitCode::from(code as u8)
}
