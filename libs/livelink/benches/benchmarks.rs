//! Benchmarks for LiveLink library
//!
//! Run with: cargo bench -p livelink

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;

use livelink::core::connection_state::{AtomicConnectionState, ConnectionState};
use livelink::core::credential::Credential;
use livelink::core::lifecycle::{LifecycleBroadcaster, LifecycleSignal};
use livelink::net::LivenessTracker;
use livelink::traits::reconnect::{ExponentialBackoff, FixedDelay, ReconnectionStrategy};

const LOST_EXPIRED: ConnectionState = ConnectionState::ConnectionLost {
    needs_credential_refresh: true,
};

/// Benchmark the lock-free state mirror read by `is_connected()`
fn bench_atomic_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("atomic_state");

    group.bench_function("get", |b| {
        let state = AtomicConnectionState::new(ConnectionState::Connected);
        b.iter(|| black_box(state.get()))
    });

    group.bench_function("get_lost_with_flag", |b| {
        let state = AtomicConnectionState::new(LOST_EXPIRED);
        b.iter(|| black_box(state.get()))
    });

    group.bench_function("set", |b| {
        let state = AtomicConnectionState::new(ConnectionState::Disconnected);
        b.iter(|| {
            state.set(black_box(ConnectionState::Connected));
        })
    });

    group.bench_function("is_connected", |b| {
        let state = AtomicConnectionState::new(ConnectionState::Connected);
        b.iter(|| black_box(state.is_connected()))
    });

    group.bench_function("should_notify", |b| {
        let current = ConnectionState::ConnectionLost {
            needs_credential_refresh: false,
        };
        b.iter(|| black_box(current.should_notify(black_box(&LOST_EXPIRED))))
    });

    group.finish();
}

/// Benchmark credential expiry checks done on every drop
fn bench_credential(c: &mut Criterion) {
    let mut group = c.benchmark_group("credential");

    group.bench_function("is_expired", |b| {
        let credential = Credential::valid_for("token", Duration::from_secs(3600));
        b.iter(|| black_box(credential.is_expired()))
    });

    group.bench_function("is_expired_with_skew", |b| {
        let credential = Credential::valid_for("token", Duration::from_secs(3600));
        b.iter(|| black_box(credential.is_expired_with_skew(black_box(Duration::from_secs(30)))))
    });

    group.finish();
}

/// Benchmark liveness tracker operations
fn bench_liveness_tracker(c: &mut Criterion) {
    let mut group = c.benchmark_group("liveness_tracker");

    group.bench_function("record_ping_sent", |b| {
        let mut tracker = LivenessTracker::new(Duration::from_secs(15));
        b.iter(|| {
            tracker.record_ping_sent();
        })
    });

    group.bench_function("record_pong_received", |b| {
        let mut tracker = LivenessTracker::new(Duration::from_secs(15));
        b.iter(|| black_box(tracker.record_pong_received()))
    });

    group.bench_function("check_awaiting_pong", |b| {
        let mut tracker = LivenessTracker::new(Duration::from_secs(15));
        tracker.record_ping_sent();
        b.iter(|| black_box(tracker.check()))
    });

    group.finish();
}

/// Benchmark reconnection strategy calculations
fn bench_reconnection_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconnection_strategies");

    group.bench_function("exponential_backoff_next_delay", |b| {
        let strategy = ExponentialBackoff::new(
            Duration::from_millis(100),
            Duration::from_secs(30),
            None,
        );
        b.iter(|| black_box(strategy.next_delay(black_box(5))))
    });

    group.bench_function("fixed_delay_next_delay", |b| {
        let strategy = FixedDelay::default();
        b.iter(|| black_box(strategy.next_delay(black_box(5))))
    });

    group.finish();
}

/// Benchmark lifecycle signal fan-out
fn bench_lifecycle_broadcast(c: &mut Criterion) {
    let mut group = c.benchmark_group("lifecycle_broadcast");
    group.throughput(Throughput::Elements(1));

    for subscribers in [1usize, 8] {
        group.bench_function(format!("emit_{}_subscribers", subscribers), |b| {
            let broadcaster = LifecycleBroadcaster::new();
            let receivers: Vec<_> = (0..subscribers).map(|_| broadcaster.subscribe()).collect();
            b.iter(|| {
                broadcaster.emit(black_box(LifecycleSignal::StartReconnecting));
                for rx in &receivers {
                    let _ = rx.try_recv();
                }
            })
        });
    }

    group.bench_function("arc_state_get", |b| {
        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Connected));
        b.iter(|| black_box(state.get()))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_atomic_state,
    bench_credential,
    bench_liveness_tracker,
    bench_reconnection_strategies,
    bench_lifecycle_broadcast,
);

criterion_main!(benches);
