use editions_api::entities::order::OrderStatus;
use proptest::prelude::*;
use rust_decimal::Decimal;

fn any_status() -> impl Strategy<Value = OrderStatus> {
    prop_oneof![
        Just(OrderStatus::Pending),
        Just(OrderStatus::Validated),
        Just(OrderStatus::Processing),
        Just(OrderStatus::Shipped),
        Just(OrderStatus::Delivered),
        Just(OrderStatus::Cancelled),
    ]
}

/// The explicit transition table: the single forward path plus cancellation
/// from every non-terminal state.
fn in_table(from: OrderStatus, to: OrderStatus) -> bool {
    matches!(
        (from, to),
        (OrderStatus::Pending, OrderStatus::Validated)
            | (OrderStatus::Validated, OrderStatus::Processing)
            | (OrderStatus::Processing, OrderStatus::Shipped)
            | (OrderStatus::Shipped, OrderStatus::Delivered)
            | (OrderStatus::Pending, OrderStatus::Cancelled)
            | (OrderStatus::Validated, OrderStatus::Cancelled)
            | (OrderStatus::Processing, OrderStatus::Cancelled)
            | (OrderStatus::Shipped, OrderStatus::Cancelled)
    )
}

proptest! {
    #[test]
    fn transitions_match_the_table_exactly(from in any_status(), to in any_status()) {
        prop_assert_eq!(from.can_transition_to(to), in_table(from, to));
    }

    #[test]
    fn terminal_states_accept_nothing(to in any_status()) {
        prop_assert!(!OrderStatus::Delivered.can_transition_to(to));
        prop_assert!(!OrderStatus::Cancelled.can_transition_to(to));
    }

    /// Commission arithmetic: 10% of any realistic 2-dp order total, rounded
    /// to 2 dp, is never negative and never exceeds the total.
    #[test]
    fn commission_rounding_is_stable(cents in 0i64..10_000_000_000) {
        let total = Decimal::new(cents, 2);
        let rate = Decimal::new(10, 2);
        let commission = (total * rate).round_dp(2);

        prop_assert!(commission >= Decimal::ZERO);
        prop_assert!(commission <= total);
        // Multiplying a 2-dp total by 0.10 yields at most 3 decimals, so
        // rounding moves the value by less than half a cent
        let delta = (commission - total * rate).abs();
        prop_assert!(delta <= Decimal::new(5, 3));
    }

    /// Royalty arithmetic: 15% of a line total with whole-currency prices is
    /// exact to the cent.
    #[test]
    fn royalty_of_whole_prices_is_exact(price in 0i64..10_000_000, qty in 1i32..1000) {
        let line_total = Decimal::from(price) * Decimal::from(qty);
        let royalty = (line_total * Decimal::new(15, 2)).round_dp(2);
        // 15% of an integer has at most 2 decimals already
        prop_assert_eq!(royalty, line_total * Decimal::new(15, 2));
    }
}
