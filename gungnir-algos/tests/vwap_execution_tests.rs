//! VWAP slicing behavior against a recorded context.

use gungnir_algos::algorithm::Algorithm;
use gungnir_algos::AlgoContext;
use gungnir_algos::execution::{ExecParams, Vwap};
use gungnir_algos::state::AlgoState;
use gungnir_algos::testkit::{quote, RecordingContext};
use gungnir_core::core::money::PriceScale;
use gungnir_core::core::{OrderId, Side, StrategyId, Symbol, TimeInForce};
use gungnir_core::data::Trade;

const SEC: u64 = 1_000_000_000;

fn symbol() -> Symbol {
    Symbol::new("AAPL", "NASDAQ").unwrap()
}

fn params(target: i64, side: Side, limit: i64, participation_bps: u32) -> ExecParams {
    ExecParams {
        symbol: symbol(),
        side,
        target_quantity: target,
        limit_price: limit,
        scale: PriceScale::CENTS,
        start_ns: 0,
        end_ns: 1_000 * SEC,
        max_participation_bps: participation_bps,
        time_in_force: TimeInForce::Day,
    }
}

fn fill(vwap: &mut Vwap, order_qty: i64, price: i64, ts_ns: u64, id: u64) {
    vwap.on_fill(&Trade {
        trade_id: id,
        exchange_trade_id: id,
        client_order_id: OrderId::new(id),
        exchange_order_id: id,
        symbol: symbol(),
        side: Side::Buy,
        price,
        quantity: order_qty,
        scale: PriceScale::CENTS,
        commission_cents: 0,
        executed_ts_ns: ts_ns,
        received_ts_ns: ts_ns,
        is_maker: false,
    });
}

fn book(ctx: &RecordingContext, sequence: u64, ask_size: i64) {
    ctx.set_quote(quote(
        symbol(),
        9_999,
        10_001,
        100_000,
        ask_size,
        sequence,
        ctx.now_ns(),
        PriceScale::CENTS,
    ));
}

/// Walk the full horizon, filling each child completely; the submitted
/// child sizes must reproduce the schedule and sum to the target.
fn run_to_completion(mut vwap: Vwap, ctx: &RecordingContext, target: i64) -> (Vec<i64>, Vwap) {
    vwap.start(0).unwrap();
    let mut submitted = Vec::new();
    for bucket in 0..10u64 {
        ctx.clock().set(bucket * 100 * SEC + SEC);
        book(ctx, bucket + 10, 1_000_000);
        let before = ctx.submission_count();
        vwap.on_quote(&ctx.quote(&symbol()).unwrap(), ctx);
        assert_eq!(ctx.submission_count(), before + 1, "bucket {bucket} submitted nothing");
        let child = ctx.last_submission().unwrap();
        submitted.push(child.quantity);
        fill(&mut vwap, child.quantity, child.price, ctx.now_ns(), bucket + 1);
    }
    assert_eq!(submitted.iter().sum::<i64>(), target);
    (submitted, vwap)
}

#[test]
fn test_uniform_schedule_sums_to_target() {
    // Target 1000 over 10 equal-volume buckets: 100 each.
    let ctx = RecordingContext::new(0);
    book(&ctx, 1, 1_000_000);
    ctx.set_volume_profile(vec![50; 10]);

    let mut vwap = Vwap::new(StrategyId::new(1), params(1_000, Side::Buy, 0, 10_000)).unwrap();
    vwap.initialize(&ctx).unwrap();

    let (submitted, vwap) = run_to_completion(vwap, &ctx, 1_000);
    assert_eq!(submitted, vec![100; 10]);
    assert_eq!(vwap.state(), AlgoState::Completed); // filled to target
}

#[test]
fn test_remainder_lands_in_last_bucket() {
    // Target 1003 over 10 equal buckets: nine of 100, last of 103.
    let ctx = RecordingContext::new(0);
    book(&ctx, 1, 1_000_000);
    ctx.set_volume_profile(vec![1; 10]);

    let mut vwap = Vwap::new(StrategyId::new(1), params(1_003, Side::Buy, 0, 10_000)).unwrap();
    vwap.initialize(&ctx).unwrap();

    let (submitted, _) = run_to_completion(vwap, &ctx, 1_003);
    assert_eq!(&submitted[..9], &[100; 9]);
    assert_eq!(submitted[9], 103);
}

#[test]
fn test_missing_profile_degrades_to_uniform() {
    let ctx = RecordingContext::new(0);
    book(&ctx, 1, 1_000_000);
    // No profile installed.

    let mut vwap = Vwap::new(StrategyId::new(1), params(1_000, Side::Buy, 0, 10_000)).unwrap();
    vwap.initialize(&ctx).unwrap();
    let (submitted, _) = run_to_completion(vwap, &ctx, 1_000);
    assert_eq!(submitted, vec![100; 10]);
}

#[test]
fn test_participation_cap_limits_child() {
    let ctx = RecordingContext::new(0);
    ctx.set_volume_profile(vec![1; 10]);
    book(&ctx, 1, 1_000_000);

    let mut vwap = Vwap::new(StrategyId::new(1), params(1_000, Side::Buy, 0, 1_000)).unwrap();
    vwap.initialize(&ctx).unwrap();
    vwap.start(0).unwrap();

    // Only 50 displayed on the ask at 10% participation: child is capped
    // at ceil(5) = 5 even though the bucket wants 100.
    ctx.clock().set(SEC);
    book(&ctx, 2, 50);
    vwap.on_quote(&ctx.quote(&symbol()).unwrap(), &ctx);
    assert_eq!(ctx.last_submission().unwrap().quantity, 5);

    // Thin books still allow a single unit.
    book(&ctx, 3, 1);
    vwap.on_quote(&ctx.quote(&symbol()).unwrap(), &ctx);
    assert_eq!(ctx.last_submission().unwrap().quantity, 1);
}

#[test]
fn test_child_priced_at_opposite_best_with_limit_clamp() {
    let ctx = RecordingContext::new(0);
    ctx.set_volume_profile(vec![1; 10]);
    book(&ctx, 1, 1_000_000);

    // Buy with a 10_000 limit while the ask sits at 10_001.
    let mut vwap = Vwap::new(StrategyId::new(1), params(100, Side::Buy, 10_000, 10_000)).unwrap();
    vwap.initialize(&ctx).unwrap();
    vwap.start(0).unwrap();

    ctx.clock().set(SEC);
    vwap.on_quote(&ctx.quote(&symbol()).unwrap(), &ctx);
    let child = ctx.last_submission().unwrap();
    assert_eq!(child.price, 10_000); // clamped to the limit
    assert_eq!(child.side, Side::Buy);
}

#[test]
fn test_sell_priced_at_bid() {
    let ctx = RecordingContext::new(0);
    ctx.set_volume_profile(vec![1; 10]);
    book(&ctx, 1, 1_000_000);

    let mut vwap = Vwap::new(StrategyId::new(1), params(100, Side::Sell, 0, 10_000)).unwrap();
    vwap.initialize(&ctx).unwrap();
    vwap.start(0).unwrap();

    ctx.clock().set(SEC);
    vwap.on_quote(&ctx.quote(&symbol()).unwrap(), &ctx);
    assert_eq!(ctx.last_submission().unwrap().price, 9_999);
}

#[test]
fn test_horizon_expiry_completes_regardless_of_fill() {
    let ctx = RecordingContext::new(0);
    ctx.set_volume_profile(vec![1; 10]);
    book(&ctx, 1, 1_000_000);

    let mut vwap = Vwap::new(StrategyId::new(1), params(1_000, Side::Buy, 0, 10_000)).unwrap();
    vwap.initialize(&ctx).unwrap();
    vwap.start(0).unwrap();

    vwap.on_timer(999 * SEC, &ctx);
    assert_eq!(vwap.state(), AlgoState::Running);

    vwap.on_timer(1_000 * SEC, &ctx);
    assert_eq!(vwap.state(), AlgoState::Completed);
    assert_eq!(vwap.snapshot().filled_quantity, 0);
}

#[test]
fn test_never_oversubmits_past_remaining() {
    // Deep behind schedule near the horizon: the child is still capped at
    // what is left of the parent.
    let ctx = RecordingContext::new(0);
    ctx.set_volume_profile(vec![1; 10]);
    book(&ctx, 1, 10_000_000);

    let mut vwap = Vwap::new(StrategyId::new(1), params(50, Side::Buy, 0, 10_000)).unwrap();
    vwap.initialize(&ctx).unwrap();
    vwap.start(0).unwrap();

    ctx.clock().set(950 * SEC);
    vwap.on_quote(&ctx.quote(&symbol()).unwrap(), &ctx);
    assert!(ctx.last_submission().unwrap().quantity <= 50);
}

#[test]
fn test_fills_after_cancel_update_stats_but_not_state() {
    let ctx = RecordingContext::new(0);
    ctx.set_volume_profile(vec![1; 10]);
    book(&ctx, 1, 1_000_000);

    let mut vwap = Vwap::new(StrategyId::new(1), params(100, Side::Buy, 0, 10_000)).unwrap();
    vwap.initialize(&ctx).unwrap();
    vwap.start(0).unwrap();
    vwap.cancel(5 * SEC).unwrap();
    assert_eq!(vwap.state(), AlgoState::Cancelled);

    // A straggler fill still lands in the books.
    fill(&mut vwap, 10, 10_001, 6 * SEC, 1);
    let snap = vwap.snapshot();
    assert_eq!(snap.filled_quantity, 10);
    assert_eq!(snap.state, AlgoState::Cancelled);

    // And no more children are produced.
    book(&ctx, 2, 1_000_000);
    vwap.on_quote(&ctx.quote(&symbol()).unwrap(), &ctx);
    assert_eq!(ctx.submission_count(), 0);
}

#[test]
fn test_buy_slippage_positive_when_filling_above_benchmark() {
    let ctx = RecordingContext::new(0);
    ctx.set_volume_profile(vec![1; 10]);
    book(&ctx, 1, 1_000_000); // mid 10_000 becomes the benchmark

    let mut vwap = Vwap::new(StrategyId::new(1), params(100, Side::Buy, 0, 10_000)).unwrap();
    vwap.initialize(&ctx).unwrap();
    vwap.start(0).unwrap();

    fill(&mut vwap, 100, 10_100, SEC, 1);
    let stats = vwap.snapshot().execution.unwrap();
    assert_eq!(stats.benchmark_price, 10_000);
    assert_eq!(stats.average_fill_price, 10_100);
    // (10_100 - 10_000) * 10_000 / 10_000 = 100 bps adverse.
    assert_eq!(stats.slippage_bps, 100);
}

#[test]
fn test_sell_slippage_sign_flipped() {
    let ctx = RecordingContext::new(0);
    ctx.set_volume_profile(vec![1; 10]);
    book(&ctx, 1, 1_000_000);

    let mut vwap = Vwap::new(StrategyId::new(1), params(100, Side::Sell, 0, 10_000)).unwrap();
    vwap.initialize(&ctx).unwrap();
    vwap.start(0).unwrap();

    // Selling below the benchmark is adverse: positive slippage.
    fill(&mut vwap, 100, 9_900, SEC, 1);
    assert_eq!(vwap.snapshot().execution.unwrap().slippage_bps, 100);
}
