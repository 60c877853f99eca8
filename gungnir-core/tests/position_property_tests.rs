//! Property tests for the accounting invariants.

use gungnir_core::core::money::{self, PriceScale};
use gungnir_core::core::{OrderId, OrderType, Side, Symbol, TimeInForce};
use gungnir_core::data::Trade;
use gungnir_core::orders::OrderManager;
use gungnir_core::positions::position::Position;
use gungnir_core::time::ManualClock;
use proptest::prelude::*;
use std::sync::Arc;

fn symbol() -> Symbol {
    Symbol::new("AAPL", "NASDAQ").unwrap()
}

fn trade(id: u64, side: Side, price: i64, quantity: i64) -> Trade {
    Trade {
        trade_id: id,
        exchange_trade_id: id,
        client_order_id: OrderId::new(1),
        exchange_order_id: 1,
        symbol: symbol(),
        side,
        price,
        quantity,
        scale: PriceScale::CENTS,
        commission_cents: 0,
        executed_ts_ns: id,
        received_ts_ns: id,
        is_maker: false,
    }
}

fn arb_trades() -> impl Strategy<Value = Vec<(bool, i64, i64)>> {
    // (is_buy, price in cents, quantity)
    proptest::collection::vec(
        (any::<bool>(), 1_000i64..100_000, 1i64..500),
        1..40,
    )
}

proptest! {
    /// Flat implies zero entry and cost; total cost never negative.
    #[test]
    fn prop_flat_position_has_no_entry(trades in arb_trades()) {
        let mut position = Position::new(symbol(), PriceScale::CENTS);
        for (id, (is_buy, price, quantity)) in trades.iter().enumerate() {
            let side = if *is_buy { Side::Buy } else { Side::Sell };
            position.apply_trade(&trade(id as u64 + 1, side, *price, *quantity)).unwrap();

            if position.quantity == 0 {
                prop_assert_eq!(position.average_entry_price, 0);
                prop_assert_eq!(position.total_cost, 0);
            } else {
                prop_assert!(position.average_entry_price > 0);
            }
            prop_assert!(position.total_cost >= 0);
        }
    }

    /// Realized P&L of any sequence ending flat tracks the signed cash
    /// flow of the trades (sells minus buys). The weighted entry price is
    /// truncated to integer ticks, so the two may drift by at most one
    /// tick per closed unit.
    #[test]
    fn prop_flat_realized_matches_cash_flow(trades in arb_trades()) {
        let mut position = Position::new(symbol(), PriceScale::CENTS);
        let mut net: i64 = 0;
        let mut cash: i128 = 0;
        let mut closed_units: i64 = 0;
        let mut last_price = 0;

        for (id, (is_buy, price, quantity)) in trades.iter().enumerate() {
            let side = if *is_buy { Side::Buy } else { Side::Sell };
            position.apply_trade(&trade(id as u64 + 1, side, *price, *quantity)).unwrap();
            net += side.sign() * quantity;
            cash -= side.sign() as i128 * *price as i128 * *quantity as i128;
            closed_units += quantity;
            last_price = *price;
        }

        // Close whatever is left at the last price; afterwards realized
        // P&L must track the cash flow of the whole sequence.
        if net != 0 {
            let side = if net > 0 { Side::Sell } else { Side::Buy };
            position
                .apply_trade(&trade(1_000_000, side, last_price, net.abs()))
                .unwrap();
            cash -= side.sign() as i128 * last_price as i128 * net.abs() as i128;
            closed_units += net.abs();
        }

        prop_assert_eq!(position.quantity, 0);
        let drift = (position.realized_pnl as i128 - cash).abs();
        prop_assert!(drift <= closed_units as i128, "drift {drift} over {closed_units} units");
        position.mark_to_market(last_price);
        prop_assert_eq!(position.unrealized_pnl, 0);
    }

    /// Unrealized P&L after a mark always matches the closed-form formula.
    #[test]
    fn prop_mark_matches_formula(trades in arb_trades(), mark in 1_000i64..100_000) {
        let mut position = Position::new(symbol(), PriceScale::CENTS);
        for (id, (is_buy, price, quantity)) in trades.iter().enumerate() {
            let side = if *is_buy { Side::Buy } else { Side::Sell };
            position.apply_trade(&trade(id as u64 + 1, side, *price, *quantity)).unwrap();
        }
        position.mark_to_market(mark);

        let expected = (mark as i128 - position.average_entry_price as i128)
            * position.quantity as i128;
        prop_assert_eq!(position.unrealized_pnl as i128, expected);
        prop_assert_eq!(
            position.market_value,
            money::notional(mark, position.quantity.abs(), PriceScale::CENTS)
        );
    }
}

proptest! {
    /// Orders never violate filled + remaining == quantity, whatever the
    /// fill splits are.
    #[test]
    fn prop_order_fill_conservation(splits in proptest::collection::vec(1i64..50, 1..20)) {
        let clock = Arc::new(ManualClock::new(0));
        let manager = OrderManager::new(8, clock);
        let quantity: i64 = splits.iter().sum();
        let order = manager
            .create(
                symbol(),
                Side::Buy,
                OrderType::Limit,
                TimeInForce::Day,
                quantity,
                10_000,
                PriceScale::CENTS,
                None,
            )
            .unwrap();
        manager.mark_submitted(order.id).unwrap();
        manager.mark_accepted(order.id, 7).unwrap();

        for (index, split) in splits.iter().enumerate() {
            let fill = Trade {
                trade_id: index as u64 + 1,
                exchange_trade_id: index as u64 + 1,
                client_order_id: order.id,
                exchange_order_id: 7,
                symbol: symbol(),
                side: Side::Buy,
                price: 10_000,
                quantity: *split,
                scale: PriceScale::CENTS,
                commission_cents: 0,
                executed_ts_ns: index as u64,
                received_ts_ns: index as u64,
                is_maker: false,
            };
            manager.apply_fill(&fill).unwrap();
            let snap = manager.get(order.id).unwrap();
            prop_assert_eq!(snap.filled_quantity + snap.remaining_quantity, snap.quantity);
            prop_assert!(snap.filled_quantity >= 0 && snap.filled_quantity <= snap.quantity);
        }

        let snap = manager.get(order.id).unwrap();
        prop_assert_eq!(snap.filled_quantity, quantity);
        prop_assert_eq!(snap.status, gungnir_core::core::OrderStatus::Filled);
    }
}
