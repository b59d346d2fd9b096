//! cohortforge: monthly cohort retention tables from an orders log
//!
//! Orders are grouped into cohorts by each user's first purchase month; the
//! retention table reports, per cohort, the share of users still ordering at
//! every later month offset. The crate also generates synthetic order data and
//! summarises retention tables in a few sentences.

pub mod cli;
pub mod data;
pub mod generate;
pub mod insights;
pub mod pipeline;
pub mod retention;
pub mod telemetry;

// Re-export public items for easier access
pub use cli::Cli;
pub use data::{load_orders, write_orders, write_retention, write_users};
pub use generate::{generate_dataset, GenerationConfig, User};
pub use insights::build_insights;
pub use pipeline::{run_generate, run_retention, GenerationSummary, RetentionSummary};
pub use retention::{
    build_retention, validate_orders, CohortCount, CohortMonth, Order, RetentionRow,
    RetentionTable, ValidationError,
};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
