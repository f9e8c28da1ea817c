//! Property-based tests for the stock and production arithmetic.
//!
//! These use proptest to check invariants over generated inputs instead of a
//! handful of hand-picked cases.

use proptest::prelude::*;
use rust_decimal::Decimal;
use shopfloor_api::{
    entities::manufacturing::stock_ledger_entry::MovementType,
    services::{
        billofmaterials::estimated_cost,
        manufacturing::{format_reference, progress_percent, required_quantity},
        stock_ledger::StockBalance,
        work_orders::tracked_minutes,
    },
};

fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    // two decimal places, up to 10k
    (1i64..1_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn movement_strategy() -> impl Strategy<Value = MovementType> {
    prop_oneof![
        Just(MovementType::In),
        Just(MovementType::Out),
        Just(MovementType::Reserve),
        Just(MovementType::Release),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn progress_stays_within_bounds(total in 0u64..500, completed in 0u64..600) {
        let progress = progress_percent(completed, total);
        prop_assert!((0..=100).contains(&progress));
        if total > 0 && completed >= total {
            prop_assert_eq!(progress, 100);
        }
        if completed == 0 {
            prop_assert_eq!(progress, 0);
        }
    }

    #[test]
    fn progress_never_decreases_as_work_completes(total in 1u64..200, completed in 0u64..200) {
        let completed = completed.min(total - 1);
        prop_assert!(progress_percent(completed, total) <= progress_percent(completed + 1, total));
    }

    #[test]
    fn requirements_scale_linearly(per_unit in quantity_strategy(), a in 1i64..1000, b in 1i64..1000) {
        let combined = required_quantity(per_unit, Decimal::from(a + b)).unwrap();
        let split = required_quantity(per_unit, Decimal::from(a)).unwrap()
            + required_quantity(per_unit, Decimal::from(b)).unwrap();
        prop_assert_eq!(combined, split);
    }

    #[test]
    fn estimated_cost_is_sum_of_lines(lines in prop::collection::vec((quantity_strategy(), quantity_strategy()), 0..12)) {
        let total = estimated_cost(lines.iter().map(|(q, c)| (q, c))).unwrap();
        let expected: Decimal = lines.iter().map(|(q, c)| *q * *c).sum();
        prop_assert_eq!(total, expected);
        prop_assert!(total >= Decimal::ZERO);
    }

    #[test]
    fn accepted_movements_preserve_stock_invariant(
        ops in prop::collection::vec((movement_strategy(), quantity_strategy()), 1..60)
    ) {
        let mut balance = StockBalance::default();
        let mut accepted = Vec::new();
        for (movement, quantity) in ops {
            match balance.apply(movement, quantity) {
                Ok(next) => {
                    prop_assert!(next.reserved >= Decimal::ZERO);
                    prop_assert!(next.on_hand >= next.reserved);
                    balance = next;
                    accepted.push((movement, quantity));
                }
                Err(_) => {
                    // a refused movement must be one that would break the invariant
                    let would_break = match movement {
                        MovementType::Out | MovementType::Reserve => quantity > balance.available(),
                        MovementType::Release => quantity > balance.reserved,
                        MovementType::In => false,
                    };
                    prop_assert!(would_break);
                }
            }
        }

        prop_assert_eq!(StockBalance::replay(accepted), balance);
    }

    #[test]
    fn reserve_then_release_is_identity(
        on_hand in quantity_strategy(),
        share in 1u32..=100,
    ) {
        let start = StockBalance::new(on_hand, Decimal::ZERO);
        let quantity = (on_hand * Decimal::from(share) / Decimal::ONE_HUNDRED).round_dp(2);
        prop_assume!(quantity > Decimal::ZERO);

        let reserved = start.apply(MovementType::Reserve, quantity).expect("fits");
        prop_assert_eq!(reserved.available(), on_hand - quantity);
        let released = reserved.apply(MovementType::Release, quantity).expect("was reserved");
        prop_assert_eq!(released, start);
    }

    #[test]
    fn huge_quantities_never_panic(per_unit in quantity_strategy(), mantissa in any::<i64>()) {
        let huge = Decimal::MAX - Decimal::from(mantissa.unsigned_abs() % 1_000);
        prop_assert!(required_quantity(per_unit.max(Decimal::from(2)), huge).is_err());
        prop_assert!(StockBalance::new(per_unit, Decimal::ZERO).apply(MovementType::In, huge).is_err());
    }

    #[test]
    fn references_sort_in_issue_order(year in 2000i32..2100, seq in 1u64..9_999) {
        let current = format_reference(year, seq);
        let next = format_reference(year, seq + 1);
        let prefix = format!("MO-{}-", year);
        prop_assert!(current.starts_with(&prefix));
        prop_assert!(current < next);
    }

    #[test]
    fn tracked_minutes_rounds_to_nearest(seconds in 0i64..1_000_000) {
        let minutes = i64::from(tracked_minutes(seconds));
        prop_assert!((minutes * 60 - seconds).abs() <= 30);
    }
}
