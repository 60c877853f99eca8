//! Sequenced event ring
//!
//! A bounded, pre-allocated sequence of event slots behind a single
//! producer-side linearization point. Registered handlers consume on their
//! own threads in registration order: handler `k` never passes handler
//! `k - 1`, so for any event the handler chain observes it in dependency
//! order and every handler sees only fully published events.
//!
//! Slots are reused in place. Each slot carries the sequence number of the
//! event it currently holds; readers rely on that monotone number for
//! freshness. When a disposable publication (market data) laps the slowest
//! consumer, the consumer detects the overwritten slot by its sequence,
//! jumps to the oldest retained event and accounts the skipped span as
//! dropped. Order commands never lap: the producer waits a bounded interval
//! for the chain to advance and then fails with back-pressure.
//!
//! Handler panics are caught here, logged with the offending handler's
//! name, and never unwind through the chain.

use crate::core::errors::{CoreError, CoreResult};
use crate::event::types::{EventEnvelope, PublishPolicy, TradingEvent};
use crate::time::Clock;
use crossbeam_utils::CachePadded;
use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Consumer callback. One handler instance runs on one dedicated thread;
/// implementations must never block on I/O (dispatch network work to the
/// venue task pool and funnel the response back as a new event).
pub trait EventHandler: Send {
    fn name(&self) -> &'static str;

    fn on_event(&mut self, event: &EventEnvelope) -> anyhow::Result<()>;
}

struct Slot {
    /// Sequence of the event currently stored, `u64::MAX` when never written.
    seq: AtomicU64,
    cell: Mutex<Option<EventEnvelope>>,
}

struct Registered {
    name: &'static str,
    handler: Box<dyn EventHandler>,
}

/// Counters exposed by [`EventRing::stats`].
#[derive(Debug, Clone, Default)]
pub struct RingStats {
    pub published: u64,
    pub dropped_publish: u64,
    /// Events skipped by each consumer after being lapped, in handler order.
    pub dropped_per_handler: Vec<u64>,
    pub handler_errors: u64,
    pub handler_panics: u64,
}

pub struct EventRing {
    slots: Box<[Slot]>,
    capacity: u64,
    mask: u64,

    /// Producer claim cursor. The lock is the single linearization point
    /// for everything that enters the pipeline.
    producer: Mutex<u64>,
    /// Count of fully published events (next publishable sequence).
    published: CachePadded<AtomicU64>,

    /// Per-handler consume cursors, in registration (dependency) order.
    cursors: RwLock<Vec<Arc<CachePadded<AtomicU64>>>>,
    dropped_consume: RwLock<Vec<Arc<CachePadded<AtomicU64>>>>,
    handlers: Mutex<Vec<Registered>>,

    started: AtomicBool,
    running: Arc<AtomicBool>,
    threads: Mutex<Vec<thread::JoinHandle<()>>>,

    dropped_publish: CachePadded<AtomicU64>,
    handler_errors: Arc<CachePadded<AtomicU64>>,
    handler_panics: Arc<CachePadded<AtomicU64>>,

    publish_wait: Duration,
    clock: Arc<dyn Clock>,
    /// Back-reference handed to consumer threads at start.
    self_ref: Mutex<Weak<EventRing>>,
}

impl EventRing {
    /// `capacity` must be a power of two.
    pub fn new(capacity: usize, publish_wait: Duration, clock: Arc<dyn Clock>) -> CoreResult<Arc<Self>> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(CoreError::InvalidInput(format!(
                "ring capacity must be a power of two, got {capacity}"
            )));
        }
        let slots = (0..capacity)
            .map(|_| Slot {
                seq: AtomicU64::new(u64::MAX),
                cell: Mutex::new(None),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let ring = Arc::new(Self {
            slots,
            capacity: capacity as u64,
            mask: capacity as u64 - 1,
            producer: Mutex::new(0),
            published: CachePadded::new(AtomicU64::new(0)),
            cursors: RwLock::new(Vec::new()),
            dropped_consume: RwLock::new(Vec::new()),
            handlers: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            running: Arc::new(AtomicBool::new(false)),
            threads: Mutex::new(Vec::new()),
            dropped_publish: CachePadded::new(AtomicU64::new(0)),
            handler_errors: Arc::new(CachePadded::new(AtomicU64::new(0))),
            handler_panics: Arc::new(CachePadded::new(AtomicU64::new(0))),
            publish_wait,
            clock,
            self_ref: Mutex::new(Weak::new()),
        });
        *ring.self_ref.lock() = Arc::downgrade(&ring);
        Ok(ring)
    }

    /// Register a handler. Handlers consume in registration order; must be
    /// called before [`start`](Self::start).
    pub fn register_handler(&self, handler: Box<dyn EventHandler>) -> CoreResult<()> {
        if self.started.load(Ordering::Acquire) {
            return Err(CoreError::Internal(
                "handlers must be registered before the ring starts".to_string(),
            ));
        }
        let name = handler.name();
        self.cursors
            .write()
            .push(Arc::new(CachePadded::new(AtomicU64::new(0))));
        self.dropped_consume
            .write()
            .push(Arc::new(CachePadded::new(AtomicU64::new(0))));
        self.handlers.lock().push(Registered { name, handler });
        debug!(handler = name, "ring handler registered");
        Ok(())
    }

    /// Spawn one consumer thread per registered handler.
    pub fn start(&self) -> CoreResult<()> {
        let me = self
            .self_ref
            .lock()
            .upgrade()
            .ok_or_else(|| CoreError::Internal("ring self reference lost".to_string()))?;
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(CoreError::Internal("ring already started".to_string()));
        }
        self.running.store(true, Ordering::Release);

        let handlers = std::mem::take(&mut *self.handlers.lock());
        let mut threads = self.threads.lock();
        for (idx, registered) in handlers.into_iter().enumerate() {
            let ring = Arc::clone(&me);
            let handle = thread::Builder::new()
                .name(format!("ring-{}", registered.name))
                .spawn(move || ring.consume_loop(idx, registered))
                .map_err(|e| CoreError::Internal(format!("failed to spawn consumer: {e}")))?;
            threads.push(handle);
        }
        info!(consumers = threads.len(), capacity = self.capacity, "event ring started");
        Ok(())
    }

    /// Publish an event, returning its sequence.
    ///
    /// Blocking publications fail with [`CoreError::Backpressure`] when the
    /// handler chain cannot free a slot within the configured wait.
    pub fn publish(&self, event: TradingEvent) -> CoreResult<u64> {
        let policy = event.publish_policy();
        let kind = event.kind();
        let mut next = self.producer.lock();
        let seq = *next;

        if policy == PublishPolicy::Block && self.gated() {
            let deadline = Instant::now() + self.publish_wait;
            loop {
                let floor = self.slowest_cursor();
                if seq < floor + self.capacity {
                    break;
                }
                if Instant::now() >= deadline {
                    self.dropped_publish.fetch_add(1, Ordering::Relaxed);
                    warn!(kind, sequence = seq, "publication dropped under back-pressure");
                    return Err(CoreError::Backpressure { source_name: kind });
                }
                thread::yield_now();
            }
        }

        let slot = &self.slots[(seq & self.mask) as usize];
        {
            let mut cell = slot.cell.lock();
            *cell = Some(EventEnvelope {
                sequence: seq,
                ingest_ts_ns: self.clock.now_ns(),
                event,
            });
        }
        slot.seq.store(seq, Ordering::Release);
        *next = seq + 1;
        self.published.store(seq + 1, Ordering::Release);
        Ok(seq)
    }

    /// Back-pressure only applies once consumers are actually draining.
    fn gated(&self) -> bool {
        self.running.load(Ordering::Acquire) && !self.cursors.read().is_empty()
    }

    /// Cursor of the last handler in the chain. Gating guarantees
    /// `cursor[k] <= cursor[k - 1]`, so the tail handler is the slowest.
    fn slowest_cursor(&self) -> u64 {
        self.cursors
            .read()
            .last()
            .map(|c| c.load(Ordering::Acquire))
            .unwrap_or_else(|| self.published.load(Ordering::Acquire))
    }

    fn consume_loop(self: Arc<Self>, idx: usize, registered: Registered) {
        let Registered { name, mut handler } = registered;
        let cursor = self.cursors.read()[idx].clone();
        let dropped = self.dropped_consume.read()[idx].clone();
        let upstream = if idx == 0 {
            None
        } else {
            Some(self.cursors.read()[idx - 1].clone())
        };

        debug!(handler = name, "consumer thread running");
        loop {
            let next = cursor.load(Ordering::Acquire);
            let avail = match &upstream {
                None => self.published.load(Ordering::Acquire),
                Some(prev) => prev.load(Ordering::Acquire),
            };

            if next >= avail {
                if !self.running.load(Ordering::Acquire)
                    && next >= self.published.load(Ordering::Acquire)
                {
                    break;
                }
                std::hint::spin_loop();
                thread::yield_now();
                continue;
            }

            let slot = &self.slots[(next & self.mask) as usize];
            if slot.seq.load(Ordering::Acquire) != next {
                // Lapped by a disposable publication. Resume from the
                // oldest event still retained and account the gap.
                let oldest = self.published.load(Ordering::Acquire).saturating_sub(self.capacity);
                if oldest > next {
                    dropped.fetch_add(oldest - next, Ordering::Relaxed);
                    warn!(handler = name, skipped = oldest - next, "consumer lapped, skipping ahead");
                    cursor.store(oldest, Ordering::Release);
                }
                continue;
            }

            let envelope = { slot.cell.lock().clone() };
            let envelope = match envelope {
                Some(env) if env.sequence == next => env,
                // Overwritten between the sequence check and the read;
                // loop back into the lap path.
                _ => continue,
            };

            match catch_unwind(AssertUnwindSafe(|| handler.on_event(&envelope))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    self.handler_errors.fetch_add(1, Ordering::Relaxed);
                    error!(handler = name, sequence = next, error = %err, "handler failed");
                }
                Err(_) => {
                    self.handler_panics.fetch_add(1, Ordering::Relaxed);
                    error!(handler = name, sequence = next, "handler panicked");
                }
            }
            cursor.store(next + 1, Ordering::Release);
        }
        debug!(handler = name, "consumer thread stopped");
    }

    /// Wait for every consumer to reach the current publication frontier.
    pub fn drain(&self, timeout: Duration) -> CoreResult<()> {
        let target = self.published.load(Ordering::Acquire);
        let deadline = Instant::now() + timeout;
        for cursor in self.cursors.read().iter() {
            loop {
                // A lapped cursor may legitimately end up past `target`.
                if cursor.load(Ordering::Acquire) >= target {
                    break;
                }
                if Instant::now() >= deadline {
                    return Err(CoreError::Internal(
                        "ring drain timed out".to_string(),
                    ));
                }
                thread::yield_now();
            }
        }
        Ok(())
    }

    /// Drain, stop the consumer threads and join them.
    pub fn shutdown(&self, timeout: Duration) -> CoreResult<()> {
        let drained = self.drain(timeout);
        self.running.store(false, Ordering::Release);
        let threads = std::mem::take(&mut *self.threads.lock());
        for handle in threads {
            if handle.join().is_err() {
                error!("ring consumer thread terminated abnormally");
            }
        }
        info!("event ring stopped");
        drained
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> RingStats {
        RingStats {
            published: self.published.load(Ordering::Relaxed),
            dropped_publish: self.dropped_publish.load(Ordering::Relaxed),
            dropped_per_handler: self
                .dropped_consume
                .read()
                .iter()
                .map(|c| c.load(Ordering::Relaxed))
                .collect(),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;
    use std::sync::atomic::AtomicUsize;

    struct Recorder {
        name: &'static str,
        seen: Arc<Mutex<Vec<u64>>>,
        panic_on: Option<u64>,
        calls: Arc<AtomicUsize>,
    }

    impl EventHandler for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn on_event(&mut self, event: &EventEnvelope) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panic_on == Some(event.sequence) {
                panic!("boom");
            }
            self.seen.lock().push(event.sequence);
            Ok(())
        }
    }

    fn ring(capacity: usize) -> Arc<EventRing> {
        EventRing::new(
            capacity,
            Duration::from_millis(20),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap()
    }

    fn recorder(name: &'static str) -> (Recorder, Arc<Mutex<Vec<u64>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Recorder {
                name,
                seen: Arc::clone(&seen),
                panic_on: None,
                calls: Arc::new(AtomicUsize::new(0)),
            },
            seen,
        )
    }

    #[test]
    fn test_capacity_must_be_power_of_two() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        assert!(EventRing::new(100, Duration::from_millis(1), clock.clone()).is_err());
        assert!(EventRing::new(0, Duration::from_millis(1), clock.clone()).is_err());
        assert!(EventRing::new(128, Duration::from_millis(1), clock).is_ok());
    }

    #[test]
    fn test_sequences_are_monotonic() {
        let ring = ring(8);
        for expected in 0..5 {
            let seq = ring.publish(TradingEvent::Heartbeat { ts_ns: expected }).unwrap();
            assert_eq!(seq, expected);
        }
        assert_eq!(ring.published_count(), 5);
    }

    #[test]
    fn test_handlers_see_publish_order() {
        let ring = ring(64);
        let (first, first_seen) = recorder("first");
        let (second, second_seen) = recorder("second");
        ring.register_handler(Box::new(first)).unwrap();
        ring.register_handler(Box::new(second)).unwrap();
        ring.start().unwrap();

        for i in 0..50 {
            ring.publish(TradingEvent::Timer { now_ns: i }).unwrap();
        }
        ring.shutdown(Duration::from_secs(5)).unwrap();

        let expected: Vec<u64> = (0..50).collect();
        assert_eq!(*first_seen.lock(), expected);
        assert_eq!(*second_seen.lock(), expected);
    }

    #[test]
    fn test_register_after_start_fails() {
        let ring = ring(8);
        let (h, _) = recorder("late");
        ring.start().unwrap();
        assert!(ring.register_handler(Box::new(h)).is_err());
        ring.shutdown(Duration::from_secs(1)).unwrap();
    }

    #[test]
    fn test_handler_panic_is_contained() {
        let ring = ring(64);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler = Recorder {
            name: "flaky",
            seen: Arc::clone(&seen),
            panic_on: Some(2),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let (tail, tail_seen) = recorder("tail");
        ring.register_handler(Box::new(handler)).unwrap();
        ring.register_handler(Box::new(tail)).unwrap();
        ring.start().unwrap();

        for i in 0..5 {
            ring.publish(TradingEvent::Timer { now_ns: i }).unwrap();
        }
        ring.shutdown(Duration::from_secs(5)).unwrap();

        // Sequence 2 is missing from the flaky handler but the chain kept going.
        assert_eq!(*seen.lock(), vec![0, 1, 3, 4]);
        assert_eq!(*tail_seen.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(ring.stats().handler_panics, 1);
    }

    #[test]
    fn test_market_data_laps_slow_consumer() {
        // No consumers running: publications land in slots and overwrite.
        let ring = ring(8);
        for i in 0..20 {
            ring.publish(TradingEvent::Heartbeat { ts_ns: i }).unwrap();
        }
        // All 20 published, only the last 8 retained.
        assert_eq!(ring.published_count(), 20);
    }

    #[test]
    fn test_lapped_consumer_accounts_drops() {
        let ring = ring(8);
        let (slow, seen) = recorder("slow");
        ring.register_handler(Box::new(slow)).unwrap();

        // Fill well past capacity before the consumer starts.
        for i in 0..64 {
            ring.publish(TradingEvent::Heartbeat { ts_ns: i }).unwrap();
        }
        ring.start().unwrap();
        ring.shutdown(Duration::from_secs(5)).unwrap();

        let stats = ring.stats();
        let observed = seen.lock().len() as u64;
        assert_eq!(stats.dropped_per_handler[0] + observed, 64);
        assert!(stats.dropped_per_handler[0] >= 56);
        // Whatever was seen is a contiguous suffix in order.
        let seen = seen.lock();
        for pair in seen.windows(2) {
            assert_eq!(pair[1], pair[0] + 1);
        }
        assert_eq!(seen.last().copied(), Some(63));
    }

    #[test]
    fn test_block_policy_inactive_before_start() {
        let ring = ring(8);
        let (h, _) = recorder("sleepy");
        ring.register_handler(Box::new(h)).unwrap();
        // Back-pressure only engages once consumers run; before start the
        // producer must not wait on a chain that cannot advance.
        for _ in 0..20 {
            ring.publish(TradingEvent::CancelOrder {
                order_id: crate::core::OrderId::new(1),
            })
            .unwrap();
        }
        assert_eq!(ring.published_count(), 20);
    }
}
