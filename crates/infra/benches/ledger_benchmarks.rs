use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use stockforge_auth::Principal;
use stockforge_core::{ClientId, ConditionCode, LocationCode, Sku, UserId};
use stockforge_infra::ledger::{self, Receipt};
use stockforge_infra::{
    EngineConfig, InMemoryWarehouseStore, ManualReceipt, NewOrder, WarehouseEngine, WarehouseStore,
};
use stockforge_inventory::{MovementContext, ReceiptRef, StockKey, replay};
use stockforge_orders::{DeliveryDetails, OrderStatus};

fn sku() -> Sku {
    Sku::parse("BENCH-1").unwrap()
}

/// Store with `records` positions of the bench SKU, `on_hand` units each.
fn seeded_store(records: usize, on_hand: i64) -> InMemoryWarehouseStore {
    let store = InMemoryWarehouseStore::new();
    let ctx = MovementContext::new("SEED", UserId::new());
    for i in 0..records {
        let receipt = Receipt {
            key: StockKey {
                sku: sku(),
                batch: None,
                location: LocationCode::parse(&format!("A-{i:03}")).unwrap(),
                expiry: None,
            },
            condition: ConditionCode::good(),
            qty: on_hand,
            source: ReceiptRef::Manual("SEED".to_string()),
        };
        store
            .transaction(|tx| ledger::receive(tx, receipt, &ctx, Utc::now()))
            .unwrap();
    }
    store
}

fn bench_reservation_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("reservation_throughput");
    group.throughput(Throughput::Elements(1));

    for records in [1usize, 10, 100].iter() {
        group.bench_with_input(
            BenchmarkId::new("reserve_then_release", records),
            records,
            |b, &records| {
                let store = seeded_store(records, 1_000_000);
                let ctx = MovementContext::new("BENCH", UserId::new());

                b.iter(|| {
                    let reservation = store
                        .transaction(|tx| ledger::reserve(tx, &sku(), None, 5, &ctx, Utc::now()))
                        .unwrap()
                        .value
                        .reservation()
                        .unwrap();
                    store
                        .transaction(|tx| ledger::release(tx, &reservation, &ctx, Utc::now()))
                        .unwrap();
                    black_box(reservation);
                });
            },
        );
    }

    group.finish();
}

fn bench_order_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_lifecycle");
    group.sample_size(200);

    group.bench_function("create_allocate_pick_ship", |b| {
        let engine = WarehouseEngine::in_memory(EngineConfig::default());
        let admin = Principal::system();
        engine
            .receive_inventory(
                &admin,
                ManualReceipt {
                    sku: sku(),
                    location: LocationCode::parse("A-001").unwrap(),
                    batch: None,
                    condition: ConditionCode::good(),
                    expiry: None,
                    qty: i64::MAX / 4,
                    reference: "SEED".to_string(),
                },
            )
            .unwrap();
        let mut n = 0u64;

        b.iter(|| {
            n += 1;
            let placement = engine
                .create_order(
                    &admin,
                    NewOrder {
                        order_number: format!("SO-{n}"),
                        client_id: ClientId::from_uuid(uuid::Uuid::nil()),
                        sku: sku(),
                        qty_ordered: 1,
                        client_reference: None,
                        delivery: DeliveryDetails {
                            customer_name: "Bench Ltd".to_string(),
                            address_lines: vec!["1 Test Road".to_string()],
                            country: "GB".to_string(),
                            ..DeliveryDetails::default()
                        },
                        preferred_location: None,
                    },
                )
                .unwrap();
            for target in [OrderStatus::Allocated, OrderStatus::Picked, OrderStatus::Shipped] {
                engine
                    .transition_order(&admin, placement.order_id, target)
                    .unwrap();
            }
            black_box(placement);
        });
    });

    group.finish();
}

fn bench_journal_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("journal_replay");

    for cycles in [50usize, 500, 5000].iter() {
        let store = seeded_store(1, 1_000_000);
        let ctx = MovementContext::new("BENCH", UserId::new());
        for _ in 0..*cycles {
            let reservation = store
                .transaction(|tx| ledger::reserve(tx, &sku(), None, 3, &ctx, Utc::now()))
                .unwrap()
                .value
                .reservation()
                .unwrap();
            store
                .transaction(|tx| ledger::consume(tx, &reservation, &ctx, Utc::now()))
                .unwrap();
        }
        let entries = store.read(|v| v.movements_for_sku(&sku())).unwrap().unwrap();

        group.throughput(Throughput::Elements(entries.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("replay", entries.len()),
            &entries,
            |b, entries| b.iter(|| black_box(replay(entries.iter()))),
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_reservation_throughput,
    bench_order_lifecycle,
    bench_journal_replay
);
criterion_main!(benches);
