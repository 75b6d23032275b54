//! Registry lookup benchmarks
//!
//! ```bash
//! cargo bench --bench registry_lookup
//! cargo bench --bench registry_lookup -- "registry/find_by_name"
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hearth_mission::{
    system_clock, ObjectHandle, ObjectType, ReferenceRegistry, Registration, RegistryConfig,
    WorldProvider,
};
use std::sync::Arc;

const POPULATIONS: &[usize] = &[100, 1_000, 10_000];

/// Every handle resolves, so lookups never demote
struct LiveWorld;

impl WorldProvider for LiveWorld {
    fn resolve(&self, _handle: ObjectHandle) -> bool {
        true
    }
}

fn populated(count: usize) -> ReferenceRegistry {
    let registry =
        ReferenceRegistry::new(RegistryConfig::default(), Arc::new(LiveWorld), system_clock());
    for i in 0..count {
        let object_type = if i % 2 == 0 { ObjectType::Entity } else { ObjectType::Waypoint };
        registry.register_with(
            Registration::new(format!("obj_{}", i), object_type, ObjectHandle(i as u64))
                .with_name(format!("Object {}", i))
                .with_group(format!("group_{}", i % 16)),
        );
    }
    registry
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry/get");
    for &count in POPULATIONS {
        let registry = populated(count);
        let id = format!("obj_{}", count / 2);
        group.bench_with_input(BenchmarkId::from_parameter(count), &id, |b, id| {
            b.iter(|| black_box(registry.get(black_box(id))))
        });
    }
    group.finish();
}

fn bench_find_by_name(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry/find_by_name");
    for &count in POPULATIONS {
        let registry = populated(count);
        let name = format!("OBJECT {}", count - 1);

        // Repeated lookups hit the name cache after the first scan
        group.bench_with_input(BenchmarkId::new("cached", count), &name, |b, name| {
            b.iter(|| black_box(registry.find_by_name(black_box(name), None)))
        });
        group.bench_with_input(BenchmarkId::new("typed", count), &name, |b, name| {
            b.iter(|| black_box(registry.find_by_name(black_box(name), Some(ObjectType::Waypoint))))
        });
    }
    group.finish();
}

fn bench_get_by_type(c: &mut Criterion) {
    let registry = populated(1_000);
    c.bench_function("registry/get_by_type", |b| {
        b.iter(|| black_box(registry.get_by_type(black_box(ObjectType::Entity))))
    });
}

criterion_group!(benches, bench_get, bench_find_by_name, bench_get_by_type);
criterion_main!(benches);
