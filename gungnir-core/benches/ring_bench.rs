//! Publish-path throughput of the event ring.

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use gungnir_core::core::money::PriceScale;
use gungnir_core::core::Symbol;
use gungnir_core::data::Quote;
use gungnir_core::event::{EventRing, TradingEvent};
use gungnir_core::time::ManualClock;
use std::sync::Arc;
use std::time::Duration;

fn quote(symbol: Symbol, sequence: u64) -> Quote {
    Quote {
        symbol,
        bid_price: 10_000,
        ask_price: 10_002,
        bid_size: 500,
        ask_size: 500,
        exchange_ts_ns: sequence,
        received_ts_ns: sequence,
        sequence,
        scale: PriceScale::CENTS,
    }
}

fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_publish");
    group.throughput(Throughput::Elements(1));

    // No consumers: measures the pure slot write + cursor advance.
    let ring = EventRing::new(8_192, Duration::from_millis(1), Arc::new(ManualClock::new(0)))
        .unwrap();
    let symbol = Symbol::new("AAPL", "NASDAQ").unwrap();
    let mut sequence = 0u64;

    group.bench_function("quote_update", |b| {
        b.iter(|| {
            sequence += 1;
            ring.publish(TradingEvent::QuoteUpdate(quote(symbol, sequence)))
                .unwrap()
        })
    });
    group.finish();
}

criterion_group!(benches, bench_publish);
criterion_main!(benches);
