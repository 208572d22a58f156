//! Stock allocation tests
//!
//! Tests for FEFO planning and stock movements including:
//! - FEFO determinism and ordering
//! - Insufficient stock produces no steps
//! - Quantities never go negative

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::allocation::{
    fefo_cmp, next_quantity, plan_adjust, plan_consume, plan_receive, AllocationError,
};
use shared::{Batch, MovementType};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn batch(id: u128, qty: Decimal, expiry: Option<NaiveDate>, created_offset_min: i64) -> Batch {
    let created = base_time() + Duration::minutes(created_offset_min);
    Batch {
        id: Uuid::from_u128(id),
        item_id: Uuid::nil(),
        lot_no: None,
        expiry_date: expiry,
        qty,
        unit: "tablet".to_string(),
        created_at: created,
        updated_at: created,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Dated batch drained before the undated one
    #[test]
    fn test_use_out_spans_dated_then_undated() {
        let a = batch(1, dec("10"), NaiveDate::from_ymd_opt(2024, 1, 6), 0);
        let b = batch(2, dec("20"), None, 0);

        let plan = plan_consume(&[b.clone(), a.clone()], dec("15")).unwrap();
        assert_eq!(plan.movement_type, MovementType::Out);
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].batch_id, a.id);
        assert_eq!(plan.steps[0].delta, dec("-10"));
        assert_eq!(plan.steps[1].batch_id, b.id);
        assert_eq!(plan.steps[1].delta, dec("-5"));
    }

    /// Not enough stock overall
    #[test]
    fn test_use_out_insufficient() {
        let b = batch(2, dec("5"), None, 0);
        let err = plan_consume(&[b], dec("10")).unwrap_err();
        assert_eq!(
            err,
            AllocationError::InsufficientStock {
                requested: dec("10"),
                available: dec("5"),
            }
        );
    }

    /// Empty batches are skipped
    #[test]
    fn test_use_out_skips_empty_batches() {
        let empty = batch(1, Decimal::ZERO, NaiveDate::from_ymd_opt(2024, 1, 2), 0);
        let full = batch(2, dec("4"), NaiveDate::from_ymd_opt(2024, 3, 1), 0);
        let plan = plan_consume(&[empty, full.clone()], dec("3")).unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].batch_id, full.id);
    }

    /// Same expiry: oldest stock first
    #[test]
    fn test_same_expiry_uses_oldest_first() {
        let expiry = NaiveDate::from_ymd_opt(2024, 5, 1);
        let newer = batch(1, dec("5"), expiry, 60);
        let older = batch(2, dec("5"), expiry, 0);
        let plan = plan_consume(&[newer, older.clone()], dec("2")).unwrap();
        assert_eq!(plan.steps[0].batch_id, older.id);
    }

    /// Receive and adjust reject bad quantities
    #[test]
    fn test_single_batch_plans() {
        let id = Uuid::new_v4();
        assert!(plan_receive(id, Decimal::ZERO).is_err());
        assert!(plan_receive(id, dec("-1")).is_err());
        assert_eq!(plan_receive(id, dec("5")).unwrap().net_change(), dec("5"));

        assert!(plan_adjust(id, Decimal::ZERO).is_err());
        assert_eq!(plan_adjust(id, dec("-3")).unwrap().net_change(), dec("-3"));
    }

    /// Adjust of -3 on a batch holding 2 is rejected
    #[test]
    fn test_adjust_below_zero() {
        assert!(matches!(
            next_quantity(dec("2"), dec("-3")),
            Err(AllocationError::InsufficientStock { .. })
        ));
        assert_eq!(next_quantity(dec("20"), dec("5")).unwrap(), dec("25"));
    }
}

// ============================================================================
// Property Tests
// ============================================================================

mod property_tests {
    use super::*;

    /// Strategy for generating quantities (0.000 to 100.000)
    fn quantity_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=100_000i64).prop_map(|n| Decimal::new(n, 3))
    }

    /// Strategy for generating positive request amounts
    fn request_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=300_000i64).prop_map(|n| Decimal::new(n, 3))
    }

    /// Strategy for generating batch snapshots
    fn batches_strategy() -> impl Strategy<Value = Vec<Batch>> {
        prop::collection::vec(
            (
                quantity_strategy(),
                prop::option::of(0u64..400),
                0i64..1_000,
            ),
            0..8,
        )
        .prop_map(|specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(i, (qty, days, created))| {
                    let expiry = days.map(|d| {
                        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(d)
                    });
                    batch(i as u128 + 1, qty, expiry, created)
                })
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Same snapshot and demand, same plan, regardless of input order
        #[test]
        fn prop_fefo_is_deterministic(
            batches in batches_strategy(),
            qty in request_strategy()
        ) {
            let mut reversed = batches.clone();
            reversed.reverse();

            let first = plan_consume(&batches, qty);
            let second = plan_consume(&batches, qty);
            let shuffled = plan_consume(&reversed, qty);

            prop_assert_eq!(&first, &second);
            prop_assert_eq!(&first, &shuffled);
        }

        /// Undated batches are only touched after every dated one
        #[test]
        fn prop_undated_batches_consumed_last(
            batches in batches_strategy(),
            qty in request_strategy()
        ) {
            if let Ok(plan) = plan_consume(&batches, qty) {
                let dated: Vec<bool> = plan
                    .steps
                    .iter()
                    .map(|s| batches.iter().any(|b| b.id == s.batch_id && b.expiry_date.is_some()))
                    .collect();
                let first_undated = dated.iter().position(|d| !d).unwrap_or(dated.len());
                prop_assert!(dated[first_undated..].iter().all(|d| !d));
            }
        }

        /// A successful plan consumes exactly the request without overdrawing
        #[test]
        fn prop_plan_sums_to_request(
            batches in batches_strategy(),
            qty in request_strategy()
        ) {
            let available: Decimal = batches.iter().map(|b| b.qty).sum();
            match plan_consume(&batches, qty) {
                Ok(plan) => {
                    prop_assert!(available >= qty);
                    prop_assert_eq!(plan.net_change(), -qty);
                    for step in &plan.steps {
                        let held = batches.iter().find(|b| b.id == step.batch_id).unwrap().qty;
                        prop_assert!(step.delta < Decimal::ZERO);
                        prop_assert!(held + step.delta >= Decimal::ZERO);
                    }
                }
                Err(AllocationError::InsufficientStock { requested, available: reported }) => {
                    prop_assert!(available < qty);
                    prop_assert_eq!(requested, qty);
                    prop_assert_eq!(reported, available);
                }
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
        }

        /// Steps follow FEFO order
        #[test]
        fn prop_steps_follow_fefo_order(
            batches in batches_strategy(),
            qty in request_strategy()
        ) {
            if let Ok(plan) = plan_consume(&batches, qty) {
                let ordered: Vec<&Batch> = plan
                    .steps
                    .iter()
                    .filter_map(|s| batches.iter().find(|b| b.id == s.batch_id))
                    .collect();
                for pair in ordered.windows(2) {
                    prop_assert_ne!(fefo_cmp(pair[0], pair[1]), std::cmp::Ordering::Greater);
                }
            }
        }

        /// Applying any delta sequence with rejection keeps the quantity
        /// non-negative and equal to the sum of accepted deltas
        #[test]
        fn prop_rejected_steps_never_go_negative(
            deltas in prop::collection::vec(-50i64..50i64, 1..40)
        ) {
            let mut qty = Decimal::ZERO;
            let mut ledger_sum = Decimal::ZERO;
            for d in deltas {
                let delta = Decimal::from(d);
                if let Ok(next) = next_quantity(qty, delta) {
                    qty = next;
                    ledger_sum += delta;
                }
                prop_assert!(qty >= Decimal::ZERO);
                prop_assert_eq!(qty, ledger_sum);
            }
        }
    }
}
