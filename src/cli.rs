//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};

use crate::generate::GenerationConfig;

/// Monthly cohort retention tables from an orders CSV
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the cohort retention table and print key insights
    Retention(RetentionArgs),

    /// Generate synthetic users and orders CSV files
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
pub struct RetentionArgs {
    /// Path to the orders CSV
    #[arg(short, long, env = "COHORTFORGE_INPUT", default_value = "data/orders.csv")]
    pub input: PathBuf,

    /// Path for the retention CSV output
    #[arg(
        short,
        long,
        env = "COHORTFORGE_OUTPUT",
        default_value = "outputs/retention.csv"
    )]
    pub output: PathBuf,

    /// Number of insight sentences to print after writing the table
    #[arg(long, default_value = "3")]
    pub insights: usize,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Number of synthetic users to simulate
    #[arg(long, default_value = "600")]
    pub n_users: u32,

    /// Random seed for reproducibility
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// First possible signup, `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`
    #[arg(long, default_value = "2023-01-01")]
    pub start: String,

    /// End of the signup range (exclusive), same formats as --start
    #[arg(long, default_value = "2024-12-31")]
    pub end: String,

    /// Output path for the users CSV
    #[arg(long, default_value = "data/users.csv")]
    pub users_output: PathBuf,

    /// Output path for the orders CSV
    #[arg(long, default_value = "data/orders.csv")]
    pub orders_output: PathBuf,
}

impl GenerateArgs {
    /// Build a validated generation config from the arguments
    pub fn generation_config(&self) -> crate::Result<GenerationConfig> {
        let config = GenerationConfig {
            n_users: self.n_users,
            seed: self.seed,
            start: parse_bound(&self.start)?,
            end: parse_bound(&self.end)?,
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_bound(raw: &str) -> crate::Result<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(datetime);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| anyhow::anyhow!("Invalid date bound: {raw}"))
}
