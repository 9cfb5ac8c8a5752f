//! Stress Tests - randomized workloads under seeded RNGs.
//!
//! Every operation is followed by a structural audit, and coarse
//! observables are cross-checked against a naive mirror of the workload.
//! Seeds are fixed so failures reproduce.

use memsim::{
    Arena, CacheHierarchy, CacheParams, PlacementStrategy, ReplacementPolicy, HEADER_BYTES,
};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

// ============================================================================
// Allocator stress
// ============================================================================

fn churn(arena: &mut Arena, rng: &mut ChaCha8Rng, ops: usize) {
    let mut live: Vec<u64> = Vec::new();
    let mut granted: usize = 0;

    for op in 0..ops {
        if live.is_empty() || rng.gen_bool(0.6) {
            let size = rng.gen_range(1..=512);
            let largest = arena.largest_free_block();
            match arena.allocate(size) {
                Ok(alloc) => {
                    // A candidate must have existed
                    assert!(largest >= size + HEADER_BYTES, "op {op}: spurious success");
                    granted += alloc.payload + HEADER_BYTES;
                    live.push(alloc.id);
                }
                Err(_) => {
                    // Failure is only legal when no free block fits
                    assert!(largest < size + HEADER_BYTES, "op {op}: spurious failure");
                }
            }
        } else {
            let index = rng.gen_range(0..live.len());
            let id = live.swap_remove(index);
            let released = arena.release(id).expect("live id releases");
            granted -= released;
        }

        arena.audit().unwrap_or_else(|e| panic!("op {op}: {e}"));
        assert_eq!(arena.used_bytes(), granted, "op {op}: used bytes drifted");
        assert_eq!(arena.live_blocks(), live.len());
    }

    // Drain and verify the arena folds back into a single free block
    for id in live {
        arena.release(id).expect("live id releases");
    }
    arena.audit().unwrap();
    let blocks = arena.all_blocks();
    assert_eq!(blocks.len(), 1);
    assert!(blocks[0].is_free);
    assert_eq!(blocks[0].size, arena.total_bytes());
}

#[test]
fn test_allocator_churn_first_fit() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xFEEDFACE);
    let mut arena = Arena::new(64 * 1024, PlacementStrategy::FirstFit).unwrap();
    churn(&mut arena, &mut rng, 5_000);
}

#[test]
fn test_allocator_churn_best_fit() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xBADC0DE);
    let mut arena = Arena::new(64 * 1024, PlacementStrategy::BestFit).unwrap();
    churn(&mut arena, &mut rng, 5_000);
}

#[test]
fn test_allocator_churn_worst_fit() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x12345678);
    let mut arena = Arena::new(64 * 1024, PlacementStrategy::WorstFit).unwrap();
    churn(&mut arena, &mut rng, 5_000);
}

#[test]
fn test_allocator_churn_with_strategy_flips() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xCAFED00D);
    let mut arena = Arena::new(64 * 1024, PlacementStrategy::FirstFit).unwrap();
    for _ in 0..10 {
        let strategy = match rng.gen_range(0..3) {
            0 => PlacementStrategy::FirstFit,
            1 => PlacementStrategy::BestFit,
            _ => PlacementStrategy::WorstFit,
        };
        arena.set_strategy(strategy);
        churn(&mut arena, &mut rng, 300);
    }
}

#[test]
fn test_allocator_determinism() {
    let mut a1 = Arena::new(32 * 1024, PlacementStrategy::BestFit).unwrap();
    let mut a2 = Arena::new(32 * 1024, PlacementStrategy::BestFit).unwrap();

    let mut rng = ChaCha8Rng::seed_from_u64(0xD15EA5E);
    let mut live: Vec<u64> = Vec::new();

    for _ in 0..2_000 {
        if live.is_empty() || rng.gen_bool(0.65) {
            let size = rng.gen_range(1..=256);
            let r1 = a1.allocate(size);
            let r2 = a2.allocate(size);
            assert_eq!(r1, r2);
            if let Ok(alloc) = r1 {
                live.push(alloc.id);
            }
        } else {
            let index = rng.gen_range(0..live.len());
            let id = live.swap_remove(index);
            assert_eq!(a1.release(id), a2.release(id));
        }
    }

    assert_eq!(a1.all_blocks(), a2.all_blocks());
    assert_eq!(a1.used_bytes(), a2.used_bytes());
}

#[test]
fn test_ids_never_reuse_across_long_run() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xACCE55);
    let mut arena = Arena::new(8 * 1024, PlacementStrategy::FirstFit).unwrap();
    let mut seen = std::collections::HashSet::new();
    let mut live: Vec<u64> = Vec::new();

    for _ in 0..3_000 {
        if live.len() < 4 || rng.gen_bool(0.5) {
            if let Ok(alloc) = arena.allocate(rng.gen_range(1..=128)) {
                assert_ne!(alloc.id, 0);
                assert!(seen.insert(alloc.id), "id {} reused", alloc.id);
                live.push(alloc.id);
            }
        } else {
            let index = rng.gen_range(0..live.len());
            arena.release(live.swap_remove(index)).unwrap();
        }
    }
}

// ============================================================================
// Cache stress
// ============================================================================

fn stress_hierarchy(policy: ReplacementPolicy, seed: u64) {
    let l1 = CacheParams {
        size: 1024,
        block_size: 64,
        associativity: 2,
    };
    let l2 = CacheParams {
        size: 4096,
        block_size: 64,
        associativity: 4,
    };
    let mut cache = CacheHierarchy::new(l1, l2, policy).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut l1_probes = 0u64;
    let mut l2_probes = 0u64;

    for op in 0..10_000u64 {
        // A working set a few times the L2 capacity so evictions are common
        let addr = rng.gen_range(0..16 * 1024u64);
        let report = cache.access(addr);
        l1_probes += 1;
        if report.l2_accessed {
            l2_probes += 1;
        }
        assert_eq!(report.l2_accessed, !report.l1_hit);

        // Fill-then-hit, sampled
        if op % 97 == 0 {
            assert!(cache.access(addr).l1_hit, "op {op}: refetch of 0x{addr:x} missed");
            l1_probes += 1;
        }

        if op % 512 == 0 {
            cache.l1().audit().unwrap();
            cache.l2().audit().unwrap();
        }
    }

    assert_eq!(cache.hits(1) + cache.misses(1), l1_probes);
    assert_eq!(cache.hits(2) + cache.misses(2), l2_probes);
    assert!(cache.l1().evictions() <= cache.misses(1));
    assert!(cache.l2().evictions() <= cache.misses(2));
    cache.l1().audit().unwrap();
    cache.l2().audit().unwrap();
}

#[test]
fn test_cache_stress_fifo() {
    stress_hierarchy(ReplacementPolicy::Fifo, 0xF1F0);
}

#[test]
fn test_cache_stress_lru() {
    stress_hierarchy(ReplacementPolicy::Lru, 0x14B5);
}

#[test]
fn test_cache_stress_lfu() {
    stress_hierarchy(ReplacementPolicy::Lfu, 0x1F05);
}

#[test]
fn test_cache_stress_with_policy_flips() {
    let l1 = CacheParams {
        size: 512,
        block_size: 32,
        associativity: 4,
    };
    let l2 = CacheParams {
        size: 2048,
        block_size: 32,
        associativity: 8,
    };
    let mut cache = CacheHierarchy::new(l1, l2, ReplacementPolicy::Lru).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(0x5EED);

    let mut l1_probes = 0u64;
    for op in 0..5_000u64 {
        if op % 250 == 0 {
            let policy = match rng.gen_range(0..3) {
                0 => ReplacementPolicy::Fifo,
                1 => ReplacementPolicy::Lru,
                _ => ReplacementPolicy::Lfu,
            };
            cache.set_policy(policy);
            // Switching must not invalidate resident lines
            cache.l1().audit().unwrap();
            cache.l2().audit().unwrap();
        }
        let addr = rng.gen_range(0..8 * 1024u64);
        cache.access(addr);
        l1_probes += 1;
    }

    assert_eq!(cache.hits(1) + cache.misses(1), l1_probes);
    cache.l1().audit().unwrap();
    cache.l2().audit().unwrap();
}
