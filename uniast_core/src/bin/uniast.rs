//! `uniast` CLI entrypoint: parses arguments, installs logging, and
//! dispatches either the public `parse` command or the hidden
//! `--worker-fd` worker-mode entrypoint the work distributor re-invokes
//! this same binary under (§4.8, §6).

use std::io::Write;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use uniast_core::cli::args::{Cli, Command};
use uniast_core::cli::run::run_parse;
use uniast_core::pipeline;
use uniast_core::workdist::worker::{WorkerMessage, WorkerPayload, SerializableError};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    install_tracing(&cli.log_level);

    let exit_code = match &cli.command {
        Command::Parse(args) => {
            let outcome = run_parse(&cli, args).await;
            tracing::info!(outcome = %outcome, "run finished");
            outcome.exit_code()
        }
        Command::Worker { worker_fd: _ } => run_worker_mode(),
    };

    std::process::exit(exit_code);
}

fn install_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

/// Reads one `WorkerPayload` JSON document from stdin, lowers each
/// assigned package, and streams newline-delimited `WorkerMessage`s to
/// stdout, ending with `Done`. The primary reads this same protocol in
/// `workdist::worker::run_worker`.
fn run_worker_mode() -> i32 {
    let mut input = String::new();
    if std::io::Read::read_to_string(&mut std::io::stdin(), &mut input).is_err() {
        return 1;
    }

    let payload: WorkerPayload = match serde_json::from_str(&input) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "worker failed to parse its stdin payload");
            return 1;
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for (package, outcome) in pipeline::run_worker_batch(&payload.context, &payload.package_paths) {
        let message = match outcome {
            Ok(repository_fragment) => WorkerMessage::Result {
                package,
                repository_fragment: Some(repository_fragment),
                error: None,
            },
            Err(e) => WorkerMessage::Result {
                package,
                repository_fragment: None,
                error: Some(SerializableError { message: e.to_string(), name: error_name(&e), stack: None }),
            },
        };
        if write_message(&mut out, &message).is_err() {
            return 1;
        }
    }

    let _ = write_message(&mut out, &WorkerMessage::Done);
    0
}

fn write_message(out: &mut impl Write, message: &WorkerMessage) -> std::io::Result<()> {
    let line = serde_json::to_string(message).unwrap_or_default();
    writeln!(out, "{line}")
}

fn error_name(error: &uniast_core::errors::IndexError) -> String {
    format!("{error:?}").split_whitespace().next().unwrap_or("IndexError").to_string()
}
