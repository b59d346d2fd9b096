//! Property tests for the retention builder

use chrono::{Datelike, Duration, NaiveDate};
use cohortforge::{Order, RetentionTable};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};

fn build_orders(raw: &[(u8, i64)]) -> Vec<Order> {
    let base = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    raw.iter()
        .enumerate()
        .map(|(i, &(user, day))| Order {
            order_id: i.to_string(),
            user_id: format!("u{user}"),
            order_date: base + Duration::days(day),
            amount: None,
        })
        .collect()
}

fn orders_strategy() -> impl Strategy<Value = Vec<Order>> {
    prop::collection::vec((0u8..12, 0i64..730), 1..80).prop_map(|raw| build_orders(&raw))
}

proptest! {
    #[test]
    fn offset_zero_is_always_one_hundred(orders in orders_strategy()) {
        let table = RetentionTable::from_orders(&orders).unwrap();
        prop_assert_eq!(table.offsets.first(), Some(&0));
        for row in &table.rows {
            prop_assert_eq!(row.retention[0], Some(100.0));
        }
    }

    #[test]
    fn cohort_sizes_count_first_order_months(orders in orders_strategy()) {
        let mut first: HashMap<&str, NaiveDate> = HashMap::new();
        for order in &orders {
            let entry = first.entry(order.user_id.as_str()).or_insert(order.order_date);
            if order.order_date < *entry {
                *entry = order.order_date;
            }
        }
        let mut expected: BTreeMap<String, u32> = BTreeMap::new();
        for date in first.values() {
            *expected
                .entry(format!("{:04}-{:02}", date.year(), date.month()))
                .or_default() += 1;
        }

        let table = RetentionTable::from_orders(&orders).unwrap();
        let actual: BTreeMap<String, u32> = table
            .rows
            .iter()
            .map(|row| (row.cohort.to_string(), row.cohort_size.unwrap()))
            .collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn percentages_are_bounded_and_offsets_sorted(orders in orders_strategy()) {
        let table = RetentionTable::from_orders(&orders).unwrap();
        prop_assert!(table.offsets.windows(2).all(|w| w[0] < w[1]));
        for row in &table.rows {
            prop_assert_eq!(row.retention.len(), table.offsets.len());
            for value in row.retention.iter().flatten() {
                prop_assert!((0.0..=100.0).contains(value));
            }
        }
    }

    #[test]
    fn build_is_deterministic_and_order_independent(orders in orders_strategy()) {
        let first = RetentionTable::from_orders(&orders).unwrap();
        let second = RetentionTable::from_orders(&orders).unwrap();
        prop_assert_eq!(&first, &second);

        let mut reversed = orders.clone();
        reversed.reverse();
        prop_assert_eq!(&first, &RetentionTable::from_orders(&reversed).unwrap());
    }
}
