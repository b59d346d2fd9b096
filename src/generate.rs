//! Synthetic users and orders for exercising the retention pipeline
//!
//! Everything is driven by an explicit [`GenerationConfig`]; the same config
//! always yields the same dataset.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::info;

use crate::retention::Order;

/// Tunable knobs for dataset generation
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    /// Number of synthetic users
    pub n_users: u32,
    /// Seed for the users stream, orders use `seed + 1`
    pub seed: u64,
    /// Earliest possible signup (inclusive)
    pub start: NaiveDateTime,
    /// Latest possible signup (exclusive)
    pub end: NaiveDateTime,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            n_users: 600,
            seed: 42,
            start: midnight(2023, 1, 1),
            end: midnight(2024, 12, 31),
        }
    }
}

impl GenerationConfig {
    /// Check that the signup range spans at least one second
    pub fn validate(&self) -> crate::Result<()> {
        if (self.end - self.start).num_seconds() < 1 {
            anyhow::bail!(
                "Generation range start ({}) must be at least one second before end ({})",
                self.start,
                self.end
            );
        }
        Ok(())
    }
}

/// A synthetic user and their signup instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: u32,
    pub signup_date: NaiveDateTime,
}

/// Create users with signups spread uniformly over the configured range,
/// sorted by signup
pub fn generate_users(config: &GenerationConfig) -> crate::Result<Vec<User>> {
    config.validate()?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let span = (config.end - config.start).num_seconds();

    let mut users: Vec<User> = (1..=config.n_users)
        .map(|user_id| User {
            user_id,
            signup_date: config.start + Duration::seconds(rng.gen_range(0..span)),
        })
        .collect();
    users.sort_by_key(|user| user.signup_date);

    Ok(users)
}

/// Create between one and five orders per user
///
/// The first order lands 0-19 days after signup; after each order the user
/// churns with probability 1/2, otherwise the next order follows 15-59 days
/// later. Amounts follow N(50, 20) clamped to [5, 300].
pub fn generate_orders(users: &[User], seed: u64) -> crate::Result<Vec<Order>> {
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));
    let amounts: Normal<f64> = Normal::new(50.0, 20.0)
        .map_err(|e| anyhow::anyhow!("Invalid amount distribution: {e}"))?;

    let mut orders = Vec::new();
    let mut order_id: u64 = 1;
    for user in users {
        let mut current = user.signup_date + Duration::days(rng.gen_range(0..20));
        let max_orders = rng.gen_range(1..6);
        for _ in 0..max_orders {
            let amount = amounts.sample(&mut rng).clamp(5.0, 300.0);
            orders.push(Order {
                order_id: order_id.to_string(),
                user_id: user.user_id.to_string(),
                order_date: current.date(),
                amount: Some((amount * 100.0).round() / 100.0),
            });
            order_id += 1;

            if rng.gen_bool(0.5) {
                break;
            }
            current += Duration::days(rng.gen_range(15..60));
        }
    }
    orders.sort_by_key(|order| order.order_date);

    Ok(orders)
}

/// Generate users and their orders from one config
pub fn generate_dataset(config: &GenerationConfig) -> crate::Result<(Vec<User>, Vec<Order>)> {
    let users = generate_users(config)?;
    let orders = generate_orders(&users, config.seed)?;
    info!(
        users = users.len(),
        orders = orders.len(),
        seed = config.seed,
        "generated synthetic dataset"
    );
    Ok((users, orders))
}

fn midnight(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}
