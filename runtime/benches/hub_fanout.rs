//! Fan-out cost of the event hub and end-to-end cost of a lifecycle command.
//!
//! Run with: `cargo bench --bench hub_fanout`

#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fleetops_core::broadcast::{BroadcastMessage, MessageKind};
use fleetops_core::store::FleetStore;
use fleetops_core::TenantId;
use fleetops_runtime::{CargoLifecycle, EventHub, HubConfig};
use fleetops_testing::{fixtures, test_clock, InMemoryFleetStore};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

const TENANT: TenantId = TenantId::new(1);

// ============================================================================
// Benchmarks
// ============================================================================

/// One broadcast to every observer of a tenant, queues drained between rounds
/// outside the measured time.
fn bench_tenant_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("hub_fanout");
    group.measurement_time(Duration::from_secs(5));

    for observers in [10usize, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(observers),
            &observers,
            |b, &observers| {
                let hub = EventHub::new(HubConfig::default());
                let mut inboxes: Vec<_> = (0..observers)
                    .map(|_| {
                        let (observer, inbox) = hub.observer(TENANT);
                        hub.register(observer);
                        inbox
                    })
                    .collect();

                b.iter_custom(|iters| {
                    let mut total = Duration::ZERO;
                    for n in 0..iters {
                        let message =
                            BroadcastMessage::new(MessageKind::CargoUpdated, json!({ "cargo_id": n }));
                        let started = Instant::now();
                        black_box(hub.broadcast_to_tenant(TENANT, message));
                        total += started.elapsed();
                        for inbox in &mut inboxes {
                            while inbox.try_recv().is_ok() {}
                        }
                    }
                    total
                });
            },
        );
    }

    group.finish();
}

/// Create + assign through the lifecycle service with one subscriber.
fn bench_lifecycle_assign(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    let store = InMemoryFleetStore::new();
    let hub = EventHub::default();
    let shared: Arc<dyn FleetStore> = Arc::new(store.clone());
    let lifecycle = CargoLifecycle::new(shared, hub.clone(), Arc::new(test_clock()));
    let actor = fixtures::admin(TENANT);
    let truck = runtime.block_on(store.add_truck(fixtures::truck(
        TENANT,
        "01A123BC",
        fleetops_core::truck::TruckStatus::Online,
    )));
    let mut subscription = hub.subscribe(TENANT);

    c.bench_function("lifecycle_create_and_assign", |b| {
        b.to_async(&runtime).iter(|| async {
            let cargo = lifecycle
                .create(&actor, fixtures::draft("Bench"))
                .await
                .unwrap();
            black_box(
                lifecycle
                    .assign_to_truck(&actor, cargo.id, truck.id)
                    .await
                    .unwrap(),
            );
        });
        while subscription.try_recv().is_some() {}
    });
}

criterion_group!(benches, bench_tenant_fanout, bench_lifecycle_assign);
criterion_main!(benches);
