//! CSV input and output using Polars

use std::fs::{self, File};
use std::path::Path;

use anyhow::Context;
use polars::prelude::*;
use tracing::debug;

use crate::generate::User;
use crate::retention::{Order, RetentionTable, ValidationError};

/// Load an orders CSV into a DataFrame
///
/// Every column is read as a string so that date and id validation happens
/// in one place, [`crate::retention::validate_orders`].
///
/// # Arguments
/// * `path` - Path to the orders CSV file
///
/// # Returns
/// * Raw orders frame; a zero-byte file is [`ValidationError::EmptyInput`]
pub fn load_orders(path: &Path) -> crate::Result<DataFrame> {
    // polars rejects a zero-byte file with a generic error, report it as empty input
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to open orders file {}", path.display()))?;
    if metadata.len() == 0 {
        return Err(ValidationError::EmptyInput.into());
    }

    let frame = read_csv(path)?;
    debug!(
        path = %path.display(),
        rows = frame.height(),
        columns = frame.width(),
        "loaded orders"
    );
    Ok(frame)
}

/// Convert a retention table into its tabular form
///
/// Columns: `cohort_month`, `cohort_size`, then one column per month offset
/// labelled by the offset. Missing values stay null.
pub fn retention_frame(table: &RetentionTable) -> crate::Result<DataFrame> {
    let mut columns = Vec::with_capacity(table.offsets.len() + 2);
    columns.push(Column::new(
        "cohort_month".into(),
        table
            .rows
            .iter()
            .map(|row| row.cohort.to_string())
            .collect::<Vec<_>>(),
    ));
    columns.push(Column::new(
        "cohort_size".into(),
        table
            .rows
            .iter()
            .map(|row| row.cohort_size)
            .collect::<Vec<Option<u32>>>(),
    ));
    for (position, offset) in table.offsets.iter().enumerate() {
        let values: Vec<Option<f64>> = table
            .rows
            .iter()
            .map(|row| row.retention.get(position).copied().flatten())
            .collect();
        columns.push(Column::new(offset.to_string().into(), values));
    }

    Ok(DataFrame::new(columns)?)
}

/// Write a retention table as CSV, creating parent directories
pub fn write_retention(table: &RetentionTable, path: &Path) -> crate::Result<()> {
    let mut frame = retention_frame(table)?;
    write_csv(&mut frame, path)
}

/// Write synthetic users as `user_id,signup_date`
pub fn write_users(users: &[User], path: &Path) -> crate::Result<()> {
    let mut frame = DataFrame::new(vec![
        Column::new(
            "user_id".into(),
            users.iter().map(|u| u.user_id).collect::<Vec<_>>(),
        ),
        Column::new(
            "signup_date".into(),
            users
                .iter()
                .map(|u| u.signup_date.format("%Y-%m-%d %H:%M:%S").to_string())
                .collect::<Vec<_>>(),
        ),
    ])?;
    write_csv(&mut frame, path)
}

/// Write orders as `order_id,user_id,order_date,amount`
pub fn write_orders(orders: &[Order], path: &Path) -> crate::Result<()> {
    let mut frame = DataFrame::new(vec![
        Column::new(
            "order_id".into(),
            orders
                .iter()
                .map(|o| o.order_id.clone())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "user_id".into(),
            orders.iter().map(|o| o.user_id.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "order_date".into(),
            orders
                .iter()
                .map(|o| o.order_date.format("%Y-%m-%d").to_string())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "amount".into(),
            orders.iter().map(|o| o.amount).collect::<Vec<_>>(),
        ),
    ])?;
    write_csv(&mut frame, path)
}

fn read_csv(path: &Path) -> crate::Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .with_context(|| format!("Failed to parse CSV file {}", path.display()))
}

fn write_csv(frame: &mut DataFrame, path: &Path) -> crate::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(frame)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    debug!(path = %path.display(), rows = frame.height(), "wrote csv");
    Ok(())
}
