use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use listrender_core::{aggregate, classify, ComputedContext, SlotContainer};
use listrender_testing::{EventLog, MemorySlotContainer};

const SIZES: &[usize] = &[16, 256, 4096];

#[derive(Debug, Clone, PartialEq)]
struct Item {
    id: u32,
    revision: u32,
}

fn snapshot(len: usize) -> Vec<Item> {
    (0..len as u32).map(|id| Item { id, revision: 0 }).collect()
}

/// Every third item updated, every seventh removed, the rest rotated by one
/// and a fresh item appended per removal.
fn churned(previous: &[Item]) -> Vec<Item> {
    let mut next: Vec<Item> = previous
        .iter()
        .enumerate()
        .filter(|(position, _)| position % 7 != 3)
        .map(|(position, item)| Item {
            id: item.id,
            revision: item.revision + u32::from(position % 3 == 0),
        })
        .collect();
    next.rotate_left(1);
    let removed = previous.len() - next.len();
    let base = previous.len() as u32;
    next.extend((0..removed as u32).map(|offset| Item {
        id: base + offset,
        revision: 0,
    }));
    next
}

fn reversed(previous: &[Item]) -> Vec<Item> {
    previous.iter().rev().cloned().collect()
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    for &size in SIZES {
        let previous = snapshot(size);
        let next = churned(&previous);
        group.bench_with_input(BenchmarkId::new("churn", size), &size, |b, _| {
            b.iter(|| {
                let set = classify(black_box(&previous), black_box(&next), |item| item.id)
                    .expect("unique ids");
                black_box(set.records.len())
            });
        });

        let next = reversed(&previous);
        group.bench_with_input(BenchmarkId::new("reverse", size), &size, |b, _| {
            b.iter(|| {
                let set = classify(black_box(&previous), black_box(&next), |item| item.id)
                    .expect("unique ids");
                black_box(set.records.len())
            });
        });
    }
    group.finish();
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");
    for &size in SIZES {
        let previous = snapshot(size);
        let next = churned(&previous);
        let set = classify(&previous, &next, |item| item.id).expect("unique ids");
        let mut container = MemorySlotContainer::new(EventLog::new());
        for (index, item) in previous.iter().enumerate() {
            container
                .create_at(&(), item.clone(), ComputedContext::new(index, size), index)
                .expect("append in bounds");
        }
        let template = Rc::new(());

        group.bench_with_input(BenchmarkId::new("churn", size), &size, |b, _| {
            b.iter(|| {
                let plan = aggregate(
                    black_box(&set),
                    &container,
                    &template,
                    |item| item.id,
                    None,
                );
                black_box(plan.len())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_classify, bench_aggregate);
criterion_main!(benches);
