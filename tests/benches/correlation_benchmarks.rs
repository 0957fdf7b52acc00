//! # Correlation Benchmarks
//!
//! | Path | Target |
//! |------|--------|
//! | register + complete_and_remove | < 5µs |
//! | authorize round trip, in-memory bus, real worker | < 1ms |

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use csms_authentication::{AuthRequestHandler, AuthenticationService};
use csms_transactions::{
    AuthorizationRequest, BusRequestSender, CorrelationId, CorrelationTable, RequestDispatcher,
    ResponseHandler, ResponseListener, TableLimits,
};
use shared_bus::{ChannelFilter, InMemoryMessageBus};
use shared_types::AuthenticationStatus;

// ============================================================================
// Correlation table
// ============================================================================

fn bench_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlation-table");

    let table = CorrelationTable::default();
    group.bench_function("register_complete", |b| {
        b.iter(|| {
            let id = CorrelationId::new();
            let mut rx = table.register(id).unwrap();
            assert!(table.complete_and_remove(id, AuthenticationStatus::Accepted));
            black_box(rx.try_recv().unwrap())
        })
    });

    // Cost of completion with many other calls in flight
    for pending in [100usize, 1_000, 10_000] {
        let table = CorrelationTable::new(TableLimits {
            max_entries: pending + 1,
            ttl: Duration::from_secs(600),
        });
        let _background: Vec<_> = (0..pending)
            .map(|_| table.register(CorrelationId::new()).unwrap())
            .collect();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("register_complete_loaded", pending),
            &pending,
            |b, _| {
                b.iter(|| {
                    let id = CorrelationId::new();
                    let _rx = table.register(id).unwrap();
                    black_box(table.complete_and_remove(id, AuthenticationStatus::Rejected))
                })
            },
        );
    }

    group.bench_function("unmatched_response", |b| {
        b.iter(|| black_box(table.complete_and_remove(CorrelationId::new(), AuthenticationStatus::Accepted)))
    });

    group.finish();
}

// ============================================================================
// Full authorize round trip
// ============================================================================

fn bench_round_trip(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();

    let dispatcher = runtime.block_on(async {
        let bus = Arc::new(InMemoryMessageBus::new());
        let table = Arc::new(CorrelationTable::default());

        let worker = AuthRequestHandler::new(
            Arc::new(AuthenticationService::default()),
            Box::new(bus.subscribe_group(ChannelFilter::channel("auth-request"), "authentication-service")),
            bus.clone(),
            "auth-response",
        );
        tokio::spawn(worker.run());

        let listener = ResponseListener::new(
            ResponseHandler::new(Arc::clone(&table)),
            Box::new(bus.subscribe_group(ChannelFilter::channel("auth-response"), "transaction-service")),
        );
        tokio::spawn(listener.run());

        Arc::new(RequestDispatcher::new(
            table,
            Arc::new(BusRequestSender::new(bus, "auth-request")),
            Duration::from_secs(5),
        ))
    });

    let mut group = c.benchmark_group("authorize");
    let request = AuthorizationRequest::new("station-1", Some("driverABC-1234567890"));

    group.bench_function("round_trip_in_memory", |b| {
        b.to_async(&runtime)
            .iter(|| async { black_box(dispatcher.authorize(&request).await.unwrap()) })
    });

    let blank = AuthorizationRequest::new("station-1", None);
    group.bench_function("blank_token_short_circuit", |b| {
        b.to_async(&runtime)
            .iter(|| async { black_box(dispatcher.authorize(&blank).await.unwrap()) })
    });

    group.finish();
}

criterion_group!(benches, bench_table, bench_round_trip);
criterion_main!(benches);
