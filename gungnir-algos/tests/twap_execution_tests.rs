//! TWAP pacing and catch-up against a recorded context.

use gungnir_algos::algorithm::Algorithm;
use gungnir_algos::AlgoContext;
use gungnir_algos::execution::{ExecParams, Twap};
use gungnir_algos::state::AlgoState;
use gungnir_algos::testkit::{quote, RecordingContext};
use gungnir_core::core::money::PriceScale;
use gungnir_core::core::{OrderId, Side, StrategyId, Symbol, TimeInForce};
use gungnir_core::data::Trade;

const SEC: u64 = 1_000_000_000;

fn symbol() -> Symbol {
    Symbol::new("MSFT", "NASDAQ").unwrap()
}

fn params(target: i64, duration_s: u64) -> ExecParams {
    ExecParams {
        symbol: symbol(),
        side: Side::Buy,
        target_quantity: target,
        limit_price: 0,
        scale: PriceScale::CENTS,
        start_ns: 0,
        end_ns: duration_s * SEC,
        max_participation_bps: 10_000,
        time_in_force: TimeInForce::Day,
    }
}

fn book(ctx: &RecordingContext, sequence: u64) {
    ctx.set_quote(quote(
        symbol(),
        19_998,
        20_002,
        1_000_000,
        1_000_000,
        sequence,
        ctx.now_ns(),
        PriceScale::CENTS,
    ));
}

fn fill(twap: &mut Twap, order_qty: i64, price: i64, ts_ns: u64, id: u64) {
    twap.on_fill(&Trade {
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

#[test]
fn test_catch_up_after_two_idle_buckets() {
    // 600 over 600s at 60s slices: 60 per bucket. Nothing filled through
    // buckets 0 and 1 leaves a 120 shortfall; spread over the 8 remaining
    // buckets the next child targets 60 + 15 = 75.
    let ctx = RecordingContext::new(0);
    book(&ctx, 1);
    let mut twap = Twap::new(StrategyId::new(1), params(600, 600), 60 * SEC).unwrap();
    twap.initialize(&ctx).unwrap();
    twap.start(0).unwrap();

    ctx.clock().set(2 * 60 * SEC);
    book(&ctx, 2);
    twap.on_quote(&ctx.quote(&symbol()).unwrap(), &ctx);
    assert_eq!(ctx.last_submission().unwrap().quantity, 75);
}

#[test]
fn test_on_schedule_children_match_slices() {
    let ctx = RecordingContext::new(0);
    book(&ctx, 1);
    let mut twap = Twap::new(StrategyId::new(1), params(600, 600), 60 * SEC).unwrap();
    twap.initialize(&ctx).unwrap();
    twap.start(0).unwrap();

    let mut submitted = Vec::new();
    for bucket in 0..10u64 {
        ctx.clock().set(bucket * 60 * SEC + SEC);
        book(&ctx, bucket + 2);
        twap.on_quote(&ctx.quote(&symbol()).unwrap(), &ctx);
        let child = ctx.last_submission().unwrap();
        submitted.push(child.quantity);
        fill(&mut twap, child.quantity, child.price, ctx.now_ns(), bucket + 1);
    }
    assert_eq!(submitted, vec![60; 10]);
    assert_eq!(twap.state(), AlgoState::Completed);
    assert_eq!(twap.snapshot().filled_quantity, 600);
}

#[test]
fn test_quote_past_horizon_completes_without_submitting() {
    let ctx = RecordingContext::new(0);
    book(&ctx, 1);
    let mut twap = Twap::new(StrategyId::new(1), params(600, 600), 60 * SEC).unwrap();
    twap.initialize(&ctx).unwrap();
    twap.start(0).unwrap();

    ctx.clock().set(600 * SEC);
    book(&ctx, 2);
    twap.on_quote(&ctx.quote(&symbol()).unwrap(), &ctx);
    assert_eq!(twap.state(), AlgoState::Completed);
    assert_eq!(ctx.submission_count(), 0);
}

#[test]
fn test_pause_suppresses_children_resume_restores() {
    let ctx = RecordingContext::new(0);
    book(&ctx, 1);
    let mut twap = Twap::new(StrategyId::new(1), params(600, 600), 60 * SEC).unwrap();
    twap.initialize(&ctx).unwrap();
    twap.start(0).unwrap();

    twap.pause(SEC).unwrap();
    ctx.clock().set(2 * SEC);
    book(&ctx, 2);
    twap.on_quote(&ctx.quote(&symbol()).unwrap(), &ctx);
    assert_eq!(ctx.submission_count(), 0);
    // Timer ticks are also inert while paused.
    twap.on_timer(700 * SEC, &ctx);
    assert_eq!(twap.state(), AlgoState::Paused);

    twap.resume(3 * SEC).unwrap();
    book(&ctx, 3);
    twap.on_quote(&ctx.quote(&symbol()).unwrap(), &ctx);
    assert_eq!(ctx.submission_count(), 1);
}

#[test]
fn test_partial_fills_shrink_later_children() {
    let ctx = RecordingContext::new(0);
    book(&ctx, 1);
    let mut twap = Twap::new(StrategyId::new(1), params(600, 600), 60 * SEC).unwrap();
    twap.initialize(&ctx).unwrap();
    twap.start(0).unwrap();

    // Bucket 0 child of 60 fills only 40.
    ctx.clock().set(SEC);
    twap.on_quote(&ctx.quote(&symbol()).unwrap(), &ctx);
    assert_eq!(ctx.last_submission().unwrap().quantity, 60);
    fill(&mut twap, 40, 20_002, SEC, 1);

    // Bucket 1: 60 scheduled plus the 20 shortfall spread over 9 buckets
    // (integer floor gives 2).
    ctx.clock().set(60 * SEC + SEC);
    book(&ctx, 2);
    twap.on_quote(&ctx.quote(&symbol()).unwrap(), &ctx);
    assert_eq!(ctx.last_submission().unwrap().quantity, 62);
}

#[test]
fn test_ignores_foreign_symbols() {
    let ctx = RecordingContext::new(0);
    book(&ctx, 1);
    let mut twap = Twap::new(StrategyId::new(1), params(600, 600), 60 * SEC).unwrap();
    twap.initialize(&ctx).unwrap();
    twap.start(0).unwrap();

    let other = Symbol::new("AAPL", "NASDAQ").unwrap();
    assert!(!twap.handles(&other));
    ctx.clock().set(SEC);
    let foreign = quote(other, 100, 102, 10, 10, 5, SEC, PriceScale::CENTS);
    twap.on_quote(&foreign, &ctx);
    assert_eq!(ctx.submission_count(), 0);
}
