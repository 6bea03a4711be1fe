//! Performance benchmarks for pitstop-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pitstop_engine::{
    apply_optimistic_update, rollback_optimistic_update, HttpMethod, OptimisticList,
    OptimisticUpdate, QueueSnapshot, QueuedRequest,
};
use serde_json::{json, Value};

fn jobs(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            json!({
                "id": format!("job_{}", i),
                "status": "pending",
                "vehicle": {"make": "Toyota", "model": "Corolla"},
            })
        })
        .collect()
}

fn bench_primitives(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives");

    for size in [100, 1000, 10_000].iter() {
        let items = jobs(*size);
        let update = OptimisticUpdate::update(
            "op_1",
            json!({"id": format!("job_{}", size / 2), "status": "accepted"}),
            1000,
        );

        group.bench_with_input(BenchmarkId::new("apply_update", size), &items, |b, items| {
            b.iter(|| apply_optimistic_update(black_box(items), black_box(&update)))
        });

        let applied = apply_optimistic_update(&items, &update);
        let original = items[size / 2].clone();
        group.bench_with_input(
            BenchmarkId::new("rollback_update", size),
            &applied,
            |b, applied| {
                b.iter(|| {
                    rollback_optimistic_update(
                        black_box(applied),
                        black_box(&update),
                        Some(black_box(&original)),
                    )
                })
            },
        );
    }

    group.finish();
}

fn bench_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("list");

    for pending in [10, 100, 500].iter() {
        group.bench_with_input(
            BenchmarkId::new("add_then_rollback_first", pending),
            pending,
            |b, &pending| {
                b.iter(|| {
                    let mut list = OptimisticList::with_data(jobs(1000));
                    for i in 0..pending {
                        let op = OptimisticUpdate::update(
                            format!("op_{}", i),
                            json!({"id": format!("job_{}", i % 10), "status": "accepted"}),
                            1000 + i as u64,
                        );
                        let _ = list.add_optimistic_update(op);
                    }
                    list.rollback_update(black_box("op_0"))
                })
            },
        );

        group.bench_with_input(BenchmarkId::new("set_data", pending), pending, |b, &pending| {
            let mut list = OptimisticList::with_data(jobs(1000));
            for i in 0..pending {
                let op = OptimisticUpdate::update(
                    format!("op_{}", i),
                    json!({"id": format!("job_{}", i), "status": "accepted"}),
                    1000,
                );
                let _ = list.add_optimistic_update(op);
            }
            let fresh = jobs(1000);

            b.iter(|| list.set_data(black_box(fresh.clone())))
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_snapshot");

    for size in [10, 100, 1000].iter() {
        let requests: Vec<QueuedRequest> = (0..*size)
            .map(|i| {
                QueuedRequest::with_id(
                    format!("req_{}", i),
                    HttpMethod::Patch,
                    format!("/jobs/{}/status", i),
                    Some(json!({"status": "in_progress"})),
                    1000 + i as u64,
                )
            })
            .collect();
        let snapshot = QueueSnapshot::new(requests);
        let encoded = snapshot.to_json().unwrap();

        group.bench_with_input(BenchmarkId::new("to_json", size), &snapshot, |b, s| {
            b.iter(|| black_box(s).to_json())
        });

        group.bench_with_input(BenchmarkId::new("from_json", size), &encoded, |b, raw| {
            b.iter(|| QueueSnapshot::from_json(black_box(raw)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_primitives, bench_list, bench_snapshot);
criterion_main!(benches);
