//! Short descriptive sentences derived from a retention table

use crate::retention::{CohortMonth, RetentionTable};

const NO_DATA: &str = "Not enough data to compute cohort retention.";
const NO_FOLLOW_UP: &str = "Orders do not cover any follow-up months (M+1, M+3, etc.).";

/// Summarise a retention table in at most `limit` sentences
///
/// Missing cells are dropped before any statistic is computed. An empty
/// table, or one without any offset past M+0, yields a single fallback
/// sentence instead.
pub fn build_insights(table: &RetentionTable, limit: usize) -> Vec<String> {
    if table.is_empty() {
        return vec![NO_DATA.to_string()];
    }

    let follow_up: Vec<u32> = table.offsets.iter().copied().filter(|&o| o >= 1).collect();
    let (Some(&first), Some(&horizon)) = (follow_up.first(), follow_up.last()) else {
        return vec![NO_FOLLOW_UP.to_string()];
    };

    let mut messages = Vec::new();

    let sizes: Vec<f64> = table
        .rows
        .iter()
        .filter_map(|row| row.cohort_size)
        .map(f64::from)
        .collect();
    if let Some(median_size) = median(&sizes) {
        messages.push(format!(
            "Median cohort size: {} customers.",
            median_size.trunc() as u64
        ));
    }

    let month_one = table.column(1).unwrap_or_default();
    if let Some((best_cohort, best)) = best_cohort(&month_one) {
        let values = values_of(&month_one);
        if let Some(average) = mean(&values) {
            messages.push(format!(
                "Average M+1 retention: {} (best cohort {} at {}).",
                fmt_pct(average),
                best_cohort,
                fmt_pct(best)
            ));
        }
    }

    if horizon != 1 {
        let values = values_of(&table.column(horizon).unwrap_or_default());
        if let (Some(mid), Some(max), Some(min)) =
            (median(&values), extreme(&values, f64::max), extreme(&values, f64::min))
        {
            messages.push(format!(
                "Median retention at M+{}: {} (max/min {} / {}).",
                horizon,
                fmt_pct(mid),
                fmt_pct(max),
                fmt_pct(min)
            ));
        }
    }

    if follow_up.len() >= 2 {
        let first_mean = mean(&values_of(&table.column(first).unwrap_or_default()));
        let last_mean = mean(&values_of(&table.column(horizon).unwrap_or_default()));
        if let (Some(from), Some(to)) = (first_mean, last_mean) {
            messages.push(format!(
                "Retention decays from {} (M+{}) to {} (M+{}).",
                fmt_pct(from),
                first,
                fmt_pct(to),
                horizon
            ));
        }
    }

    messages.truncate(limit);
    messages
}

fn fmt_pct(value: f64) -> String {
    format!("{value:.1}%")
}

fn values_of(column: &[(CohortMonth, f64)]) -> Vec<f64> {
    column.iter().map(|&(_, value)| value).collect()
}

/// First cohort reaching the column maximum
fn best_cohort(column: &[(CohortMonth, f64)]) -> Option<(CohortMonth, f64)> {
    column.iter().fold(None, |best, &(cohort, value)| match best {
        Some((_, top)) if top >= value => best,
        _ => Some((cohort, value)),
    })
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn extreme(values: &[f64], pick: fn(f64, f64) -> f64) -> Option<f64> {
    values.iter().copied().reduce(pick)
}
