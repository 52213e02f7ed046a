//! # Model-Mesh Control Plane Benchmarks
//!
//! | Path | Subsystem | What is measured |
//! |------|-----------|------------------|
//! | Block sealing | mm-06 Secure Transfer | AES-256-GCM seal and open per block size |
//! | Allocation pass | mm-03 Resource Allocation | one pass over N contending requests, per strategy |

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use mm_03_resource_allocation::{
    AllocatorConfig, ConflictStrategy, NetworkResourceProfile, RequestPriority, ResourceAllocator,
    ResourceQuota, ResourceRequest,
};
use mm_06_secure_transfer::{open_block, seal_block, ModelBlock};
use shared_crypto::SecretKey;
use shared_types::{LicenseTier, MockTimeSource};

// ============================================================================
// MM-06: Block sealing
// ============================================================================

fn bench_block_sealing(c: &mut Criterion) {
    let mut group = c.benchmark_group("mm-06-block-sealing");
    group.measurement_time(Duration::from_secs(5));

    let key = SecretKey::generate();
    for size in [4 * 1024, 64 * 1024, 1024 * 1024] {
        let block = ModelBlock::new("block-0", vec![0x5a; size]);
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("seal", size), &block, |b, block| {
            b.iter(|| black_box(seal_block(&key, "bench", 0, block).is_ok()))
        });

        let Ok(message) = seal_block(&key, "bench", 0, &block) else {
            continue;
        };
        group.bench_with_input(BenchmarkId::new("open", size), &message, |b, message| {
            b.iter(|| black_box(open_block(&key, message).is_ok()))
        });
    }

    group.finish();
}

// ============================================================================
// MM-03: Allocation pass
// ============================================================================

fn contended_allocator(strategy: ConflictStrategy, requests: usize) -> ResourceAllocator {
    let config = AllocatorConfig::for_testing().with_strategy(strategy);
    let total = config.total;
    let allocator = ResourceAllocator::new(config, Arc::new(MockTimeSource::new(0)));
    let _ = allocator.register_network(NetworkResourceProfile::new(
        "bench",
        total,
        total,
        RequestPriority::Normal,
    ));
    for i in 0..requests {
        let _ = allocator.request(ResourceRequest {
            network_id: "bench".into(),
            requester_id: format!("node-{i}"),
            tier: LicenseTier::Enterprise,
            priority: RequestPriority::Normal,
            quota: ResourceQuota {
                cpu_millis: 1_500,
                worker_slots: 3,
                ..ResourceQuota::ZERO
            },
            allow_partial: true,
        });
    }
    allocator
}

fn bench_allocation_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("mm-03-allocation-pass");

    for strategy in [ConflictStrategy::FairShare, ConflictStrategy::PriorityBased] {
        for requests in [10, 100, 500] {
            group.throughput(Throughput::Elements(requests as u64));
            group.bench_function(BenchmarkId::new(strategy.as_str(), requests), |b| {
                b.iter_batched(
                    || contended_allocator(strategy, requests),
                    |allocator| black_box(allocator.run_allocation_pass().granted.len()),
                    criterion::BatchSize::SmallInput,
                )
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_block_sealing, bench_allocation_pass);
criterion_main!(benches);
