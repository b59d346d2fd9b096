//! File-to-file runs of the retention and generation workflows

use std::path::Path;

use tracing::info;

use crate::data::{load_orders, write_orders, write_retention, write_users};
use crate::generate::{generate_dataset, GenerationConfig};
use crate::insights::build_insights;
use crate::retention::{build_retention, RetentionTable};

/// The written retention table and the insight sentences derived from it
#[derive(Debug, Clone)]
pub struct RetentionSummary {
    pub table: RetentionTable,
    pub insights: Vec<String>,
}

/// Row counts of a generation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationSummary {
    pub users: usize,
    pub orders: usize,
}

/// Read orders from `input`, write the retention table to `output` and
/// summarise it in at most `insight_count` sentences
///
/// Nothing is written when validation fails.
pub fn run_retention(
    input: &Path,
    output: &Path,
    insight_count: usize,
) -> crate::Result<RetentionSummary> {
    let orders = load_orders(input)?;
    let table = build_retention(&orders)?;
    write_retention(&table, output)?;
    info!(
        input = %input.display(),
        output = %output.display(),
        cohorts = table.rows.len(),
        "wrote retention table"
    );

    let insights = build_insights(&table, insight_count);
    Ok(RetentionSummary { table, insights })
}

/// Generate a synthetic dataset and write both CSV files
pub fn run_generate(
    config: &GenerationConfig,
    users_path: &Path,
    orders_path: &Path,
) -> crate::Result<GenerationSummary> {
    let (users, orders) = generate_dataset(config)?;
    write_users(&users, users_path)?;
    write_orders(&orders, orders_path)?;

    Ok(GenerationSummary {
        users: users.len(),
        orders: orders.len(),
    })
}
