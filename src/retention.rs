//! Cohort retention construction: order validation, month bucketing and the
//! percentage table keyed by (cohort month, month offset)

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

/// Columns every orders table must carry
pub const REQUIRED_COLUMNS: [&str; 3] = ["order_id", "user_id", "order_date"];

/// Reasons an orders table cannot be turned into a retention table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("cannot compute retention: the orders table is empty")]
    EmptyInput,

    #[error("missing columns for retention: {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error(
        "invalid order_date {value:?} at row {row}; expected YYYY-MM-DD, YYYY/MM/DD, \
         YYYY-MM-DD HH:MM:SS or an RFC 3339 timestamp"
    )]
    InvalidDate { row: usize, value: String },

    #[error("missing user_id at row {row}; the order cannot be assigned to a cohort")]
    MissingUserId { row: usize },

    #[error("column {column} could not be read: {reason}")]
    UnreadableColumn { column: String, reason: String },

    #[error("cannot compute cohort size for {cohort}: month offset 0 is missing")]
    MissingBaseline { cohort: CohortMonth },

    #[error("negative month offset {offset} for cohort {cohort}")]
    NegativeOffset { cohort: CohortMonth, offset: i64 },

    #[error("cohort aggregation failed: {reason}")]
    Aggregation { reason: String },
}

/// Calendar month a cohort is anchored on
///
/// Ordering is chronological (year first, then month).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CohortMonth {
    year: i32,
    month: u32,
}

impl CohortMonth {
    /// Build from a year and a 1-based month, `None` when the month is out of range
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Month containing `date`
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Absolute month number (`year * 12 + month`)
    pub fn index(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month)
    }

    /// Inverse of [`CohortMonth::index`]
    pub fn from_index(index: i64) -> Option<Self> {
        let zero_based = index - 1;
        let year = i32::try_from(zero_based.div_euclid(12)).ok()?;
        let month = u32::try_from(zero_based.rem_euclid(12) + 1).ok()?;
        Self::new(year, month)
    }

    /// Whole months from `self` to `later`, `None` if `later` comes first
    pub fn offset_to(&self, later: CohortMonth) -> Option<u32> {
        u32::try_from(later.index() - self.index()).ok()
    }
}

impl fmt::Display for CohortMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// A single validated order
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub order_id: String,
    pub user_id: String,
    /// Calendar date of the order, time of day dropped
    pub order_date: NaiveDate,
    /// Order value, not used by the retention computation
    pub amount: Option<f64>,
}

/// One cohort's line in the retention table
#[derive(Debug, Clone, PartialEq)]
pub struct RetentionRow {
    pub cohort: CohortMonth,
    /// Distinct users at offset 0, `None` when that count is zero
    pub cohort_size: Option<u32>,
    /// Percentages aligned with [`RetentionTable::offsets`]
    pub retention: Vec<Option<f64>>,
}

/// Cohort retention table
///
/// Rows are sorted by cohort month, `offsets` holds every month offset
/// observed across all cohorts in ascending order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetentionTable {
    pub offsets: Vec<u32>,
    pub rows: Vec<RetentionRow>,
}

/// Distinct users of one cohort active at one month offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CohortCount {
    pub cohort: CohortMonth,
    pub offset: u32,
    pub users: u32,
}

impl RetentionTable {
    /// Build the table from already validated orders
    ///
    /// # Arguments
    /// * `orders` - Validated orders, at least one
    ///
    /// # Returns
    /// * One row per cohort month, one percentage column per observed offset
    pub fn from_orders(orders: &[Order]) -> Result<Self, ValidationError> {
        if orders.is_empty() {
            return Err(ValidationError::EmptyInput);
        }

        let activity = activity_frame(orders)?;
        let counts = cohort_counts(activity)?;
        let table = Self::from_counts(&counts)?;

        debug!(
            orders = orders.len(),
            cohorts = table.rows.len(),
            offsets = table.offsets.len(),
            "built retention table"
        );
        Ok(table)
    }

    /// Pivot distinct-user counts into the percentage table
    ///
    /// Offsets missing for a cohort are zero-filled. Every cohort must carry
    /// an offset 0 count, which becomes its size.
    pub fn from_counts(counts: &[CohortCount]) -> Result<Self, ValidationError> {
        let mut by_cohort: BTreeMap<CohortMonth, BTreeMap<u32, u32>> = BTreeMap::new();
        for count in counts {
            by_cohort
                .entry(count.cohort)
                .or_default()
                .insert(count.offset, count.users);
        }
        let offsets: Vec<u32> = counts
            .iter()
            .map(|count| count.offset)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut rows = Vec::with_capacity(by_cohort.len());
        for (cohort, by_offset) in by_cohort {
            let baseline = by_offset
                .get(&0)
                .copied()
                .ok_or(ValidationError::MissingBaseline { cohort })?;
            let cohort_size = Some(baseline).filter(|&size| size > 0);

            let retention = offsets
                .iter()
                .map(|offset| {
                    let users = by_offset.get(offset).copied().unwrap_or(0);
                    cohort_size.map(|size| retention_pct(users, size))
                })
                .collect();

            rows.push(RetentionRow {
                cohort,
                cohort_size,
                retention,
            });
        }

        Ok(Self { offsets, rows })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// (rows, columns) counting `cohort_size` as a column
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.offsets.len() + 1)
    }

    /// Row for a `YYYY-MM` cohort label
    pub fn row(&self, cohort: &str) -> Option<&RetentionRow> {
        self.rows.iter().find(|row| row.cohort.to_string() == cohort)
    }

    pub fn cohort_size(&self, cohort: &str) -> Option<u32> {
        self.row(cohort)?.cohort_size
    }

    /// Retention percentage for a cohort label at a month offset
    pub fn get(&self, cohort: &str, offset: u32) -> Option<f64> {
        let position = self.offsets.iter().position(|&o| o == offset)?;
        self.row(cohort)?.retention.get(position).copied().flatten()
    }

    /// Present values of one offset column in cohort order, `None` if the
    /// offset was never observed
    pub fn column(&self, offset: u32) -> Option<Vec<(CohortMonth, f64)>> {
        let position = self.offsets.iter().position(|&o| o == offset)?;
        Some(
            self.rows
                .iter()
                .filter_map(|row| {
                    row.retention
                        .get(position)
                        .copied()
                        .flatten()
                        .map(|value| (row.cohort, value))
                })
                .collect(),
        )
    }
}

/// Validate an orders table and build its retention table
///
/// # Arguments
/// * `orders` - Orders frame with at least `order_id`, `user_id` and `order_date`
///
/// # Returns
/// * `RetentionTable` with cohort sizes and percentages, or the first
///   validation failure
pub fn build_retention(orders: &DataFrame) -> Result<RetentionTable, ValidationError> {
    let validated = validate_orders(orders)?;
    let table = RetentionTable::from_orders(&validated)?;
    info!(
        orders = validated.len(),
        cohorts = table.rows.len(),
        "computed cohort retention"
    );
    Ok(table)
}

/// Check the orders table shape and convert every row into an [`Order`]
///
/// Columns may have any dtype; values are read in their string form.
pub fn validate_orders(orders: &DataFrame) -> Result<Vec<Order>, ValidationError> {
    if orders.height() == 0 {
        return Err(ValidationError::EmptyInput);
    }

    let mut missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|name| orders.column(name).is_err())
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        missing.sort();
        return Err(ValidationError::MissingColumns { columns: missing });
    }

    let order_ids = string_column(orders, "order_id")?;
    let user_ids = string_column(orders, "user_id")?;
    let dates = string_column(orders, "order_date")?;
    let amounts = match orders.column("amount") {
        Ok(_) => Some(string_column(orders, "amount")?),
        Err(_) => None,
    };

    let mut validated = Vec::with_capacity(orders.height());
    for (row, ((order_id, user_id), date)) in order_ids
        .into_iter()
        .zip(user_ids)
        .zip(dates)
        .enumerate()
    {
        // ids are compared verbatim, " u1" and "u1" are different users
        let user_id = user_id.ok_or(ValidationError::MissingUserId { row })?;

        let raw_date = date.unwrap_or_default();
        let order_date =
            parse_order_date(&raw_date).ok_or_else(|| ValidationError::InvalidDate {
                row,
                value: raw_date.clone(),
            })?;

        let amount = amounts
            .as_ref()
            .and_then(|values| values.get(row).cloned().flatten())
            .and_then(|raw| raw.trim().parse::<f64>().ok());

        validated.push(Order {
            order_id: order_id.unwrap_or_default(),
            user_id,
            order_date,
            amount,
        });
    }

    Ok(validated)
}

/// Parse an order date, keeping only the calendar date
///
/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD`, `YYYY-MM-DD HH:MM:SS[.f]` (space,
/// `T` or slash-dated) and RFC 3339 timestamps.
pub fn parse_order_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }
    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y/%m/%d %H:%M:%S%.f",
    ] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(datetime.date());
        }
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|datetime| datetime.date_naive())
}

/// `count / size` as a percentage rounded to one decimal, ties to even
fn retention_pct(users: u32, size: u32) -> f64 {
    let pct = f64::from(users) / f64::from(size) * 100.0;
    (pct * 10.0).round_ties_even() / 10.0
}

/// One row per order: `user_id` and the absolute `order_month`
fn activity_frame(orders: &[Order]) -> Result<DataFrame, ValidationError> {
    DataFrame::new(vec![
        Column::new(
            "user_id".into(),
            orders
                .iter()
                .map(|order| order.user_id.as_str())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "order_month".into(),
            orders
                .iter()
                .map(|order| CohortMonth::of(order.order_date).index())
                .collect::<Vec<_>>(),
        ),
    ])
    .map_err(aggregation_failed)
}

/// Count distinct users per (cohort month, month offset)
///
/// # Arguments
/// * `activity` - Frame from [`activity_frame`]
///
/// # Returns
/// * Counts sorted by cohort, then offset
fn cohort_counts(activity: DataFrame) -> Result<Vec<CohortCount>, ValidationError> {
    let counts = activity
        .lazy()
        .with_columns([
            // Cohort: month of each user's earliest order
            col("order_month")
                .min()
                .over([col("user_id")])
                .alias("cohort_month"),
        ])
        .with_columns([(col("order_month") - col("cohort_month")).alias("month_offset")])
        // A user ordering several times in one month counts once
        .group_by([col("cohort_month"), col("month_offset")])
        .agg([col("user_id").n_unique().alias("active_users")])
        .sort_by_exprs(
            [col("cohort_month"), col("month_offset")],
            SortMultipleOptions::default(),
        )
        .collect()
        .map_err(aggregation_failed)?;

    counts_from_frame(&counts)
}

/// Read `cohort_month`, `month_offset` and `active_users` back into typed counts
fn counts_from_frame(counts: &DataFrame) -> Result<Vec<CohortCount>, ValidationError> {
    let cohorts = int_column(counts, "cohort_month")?;
    let offsets = int_column(counts, "month_offset")?;
    let users = int_column(counts, "active_users")?;

    cohorts
        .into_iter()
        .zip(offsets)
        .zip(users)
        .map(|((cohort_index, offset), users)| {
            let cohort = CohortMonth::from_index(cohort_index).ok_or_else(|| {
                ValidationError::Aggregation {
                    reason: format!("cohort month index {cohort_index} is out of range"),
                }
            })?;
            let offset = u32::try_from(offset)
                .map_err(|_| ValidationError::NegativeOffset { cohort, offset })?;
            let users = u32::try_from(users).map_err(|_| ValidationError::Aggregation {
                reason: format!("invalid distinct user count {users} for {cohort}"),
            })?;
            Ok(CohortCount {
                cohort,
                offset,
                users,
            })
        })
        .collect()
}

fn int_column(frame: &DataFrame, name: &str) -> Result<Vec<i64>, ValidationError> {
    let unreadable = |err: PolarsError| ValidationError::UnreadableColumn {
        column: name.to_string(),
        reason: err.to_string(),
    };

    let column = frame
        .column(name)
        .map_err(unreadable)?
        .cast(&DataType::Int64)
        .map_err(unreadable)?;
    let values = column.as_materialized_series().i64().map_err(unreadable)?;

    values
        .into_iter()
        .map(|value| {
            value.ok_or_else(|| ValidationError::UnreadableColumn {
                column: name.to_string(),
                reason: "unexpected null".to_string(),
            })
        })
        .collect()
}

fn aggregation_failed(err: PolarsError) -> ValidationError {
    ValidationError::Aggregation {
        reason: err.to_string(),
    }
}

fn string_column(frame: &DataFrame, name: &str) -> Result<Vec<Option<String>>, ValidationError> {
    let unreadable = |err: PolarsError| ValidationError::UnreadableColumn {
        column: name.to_string(),
        reason: err.to_string(),
    };

    let column = frame
        .column(name)
        .map_err(unreadable)?
        .cast(&DataType::String)
        .map_err(unreadable)?;
    let values = column.as_materialized_series().str().map_err(unreadable)?;

    Ok(values
        .into_iter()
        .map(|value| value.map(str::to_owned))
        .collect())
}
