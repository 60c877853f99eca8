//! Pre-trade rule ordering and daily accounting.

use gungnir_core::core::money::PriceScale;
use gungnir_core::core::{OrderId, OrderType, Side, Symbol, TimeInForce};
use gungnir_core::event::OrderRequest;
use gungnir_core::positions::PositionManager;
use gungnir_core::risk::{BreakerState, CheckResult, CircuitBreaker, RiskEngine, RiskLimits, RiskRule};
use gungnir_core::time::ManualClock;
use std::sync::Arc;

fn request(quantity: i64, price: i64) -> OrderRequest {
    OrderRequest {
        order_id: OrderId::new(1),
        symbol: Symbol::new("AAPL", "NASDAQ").unwrap(),
        side: Side::Buy,
        order_type: OrderType::Limit,
        time_in_force: TimeInForce::Day,
        quantity,
        price,
        stop_price: 0,
        scale: PriceScale::CENTS,
        strategy_id: None,
    }
}

fn engine_with(limits: RiskLimits, breaker_threshold: u64) -> RiskEngine {
    let clock = Arc::new(ManualClock::new(0));
    let breaker = CircuitBreaker::new(breaker_threshold, 50_000_000, clock);
    RiskEngine::new(limits, breaker, Arc::new(PositionManager::new()))
}

fn rejected_rule(result: CheckResult) -> RiskRule {
    match result {
        CheckResult::Rejected { rule, .. } => rule,
        CheckResult::Approved => panic!("expected rejection"),
    }
}

#[test]
fn test_rejection_folds_into_error_taxonomy() {
    let limits = RiskLimits {
        max_order_size: 100,
        ..RiskLimits::default()
    };
    let engine = engine_with(limits, 1_000);

    assert!(engine.check_pre_trade(&request(10, 100)).into_result().is_ok());
    let err = engine
        .check_pre_trade(&request(200, 100))
        .into_result()
        .unwrap_err();
    assert_eq!(err.risk_rule(), Some("MaxOrderSize"));
    assert!(err.to_string().contains("MaxOrderSize"));
}

#[test]
fn test_size_before_notional_deterministically() {
    // qty=200 @ price=10 violates both max_order_size=100 and
    // max_order_notional=100_000; the size rule must fire.
    let limits = RiskLimits {
        max_order_size: 100,
        max_order_notional_cents: 100_000,
        ..RiskLimits::default()
    };
    let engine = engine_with(limits, 1_000);

    let rule = rejected_rule(engine.check_pre_trade(&request(200, 10)));
    assert_eq!(rule.name(), "MaxOrderSize");
}

#[test]
fn test_full_rule_order() {
    let limits = RiskLimits {
        max_order_size: 100,
        max_order_notional_cents: 50_000, // $500
        max_orders_per_day: 3,
        ..RiskLimits::default()
    };
    let engine = engine_with(limits, 1_000);

    // Within size but over notional: 50 shares at $200.00.
    assert_eq!(
        rejected_rule(engine.check_pre_trade(&request(50, 20_000))),
        RiskRule::MaxOrderNotional
    );

    // Engine disabled beats everything.
    engine.disable();
    assert_eq!(
        rejected_rule(engine.check_pre_trade(&request(200, 20_000))),
        RiskRule::EngineDisabled
    );
    engine.enable();
}

#[test]
fn test_approval_advances_daily_counter_until_limit() {
    let limits = RiskLimits {
        max_orders_per_day: 2,
        ..RiskLimits::default()
    };
    let engine = engine_with(limits, 1_000);

    assert!(engine.check_pre_trade(&request(10, 100)).is_approved());
    assert!(engine.check_pre_trade(&request(10, 100)).is_approved());
    assert_eq!(
        rejected_rule(engine.check_pre_trade(&request(10, 100))),
        RiskRule::MaxOrdersPerDay
    );

    // Market open resets the counters.
    engine.reset_daily_counters();
    assert!(engine.check_pre_trade(&request(10, 100)).is_approved());
}

#[test]
fn test_rejections_feed_the_breaker_and_block_trading() {
    let limits = RiskLimits {
        max_order_size: 10,
        ..RiskLimits::default()
    };
    let engine = engine_with(limits, 3);

    for _ in 0..3 {
        assert!(!engine.check_pre_trade(&request(100, 100)).is_approved());
    }
    assert_eq!(engine.breaker().state(), BreakerState::Open);

    // A perfectly valid order is now rejected by the breaker rule with a
    // stable name.
    assert_eq!(
        rejected_rule(engine.check_pre_trade(&request(1, 100))),
        RiskRule::CircuitBreaker
    );
}

#[test]
fn test_daily_notional_accumulates_across_fills() {
    let limits = RiskLimits {
        max_daily_notional_cents: 1_000_000, // $10k
        ..RiskLimits::default()
    };
    let engine = engine_with(limits, 1_000);

    engine.record_fill(950_000);
    // $600 more is fine.
    assert!(engine.check_pre_trade(&request(4, 15_000)).is_approved());
    // $1500 more is not.
    assert_eq!(
        rejected_rule(engine.check_pre_trade(&request(10, 15_000))),
        RiskRule::MaxDailyNotional
    );
}

#[test]
fn test_stats_track_approvals_and_rule_counts() {
    let limits = RiskLimits {
        max_order_size: 10,
        ..RiskLimits::default()
    };
    let engine = engine_with(limits, 1_000);

    engine.check_pre_trade(&request(1, 100));
    engine.check_pre_trade(&request(100, 100));
    engine.check_pre_trade(&request(100, 100));

    let stats = engine.stats();
    assert_eq!(stats.approved, 1);
    assert_eq!(stats.rejected, 2);
    assert_eq!(stats.rejections_by_rule[RiskRule::MaxOrderSize as usize], 2);
    assert_eq!(stats.orders_today, 1);
}
