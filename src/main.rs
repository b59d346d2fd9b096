//! cohortforge: cohort retention CLI
//!
//! Dispatches to the `retention` and `generate` subcommands and prints their
//! reports on stdout.

use anyhow::Result;
use clap::Parser;
use cohortforge::cli::{Command, GenerateArgs, RetentionArgs};
use cohortforge::telemetry::{init_tracing, LogFormat};
use cohortforge::{run_generate, run_retention, Cli};
use std::time::Instant;
use tracing::{debug, Level};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(LogFormat::from_json_flag(cli.json), level);

    match &cli.command {
        Command::Retention(args) => run_retention_command(args),
        Command::Generate(args) => run_generate_command(args),
    }
}

/// Build the retention table and print the key insights
fn run_retention_command(args: &RetentionArgs) -> Result<()> {
    let start_time = Instant::now();

    let summary = run_retention(&args.input, &args.output, args.insights)?;

    println!(
        "Wrote {} with shape {:?}",
        args.output.display(),
        summary.table.shape()
    );
    if !summary.insights.is_empty() {
        println!("Key insights:");
        for line in &summary.insights {
            println!("- {}", line);
        }
    }

    debug!(
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "retention command finished"
    );
    Ok(())
}

/// Generate synthetic users and orders
fn run_generate_command(args: &GenerateArgs) -> Result<()> {
    let config = args.generation_config()?;
    let summary = run_generate(&config, &args.users_output, &args.orders_output)?;

    println!(
        "Saved {} users to {}",
        summary.users,
        args.users_output.display()
    );
    println!(
        "Saved {} orders to {}",
        summary.orders,
        args.orders_output.display()
    );
    Ok(())
}
