//! Simulator driver - owns the engines and executes parsed commands.
//!
//! The allocator and the cache are plain values owned here; `init` replaces
//! them wholesale. Every error is recovered at this boundary and surfaced as
//! console lines; nothing is fatal to the session.

use tracing::{debug, warn};

use crate::arena::{Arena, PlacementStrategy};
use crate::cache::{CacheHierarchy, CacheParams, ReplacementPolicy};
use crate::command::{help_text, Command};
use crate::stats::SessionStats;

/// Default L1 geometry built lazily by `init memory`: 16 KiB, 64 B, 4-way.
pub const DEFAULT_L1: CacheParams = CacheParams {
    size: 16 * 1024,
    block_size: 64,
    associativity: 4,
};

/// Default L2 geometry built lazily by `init memory`: 64 KiB, 64 B, 8-way.
pub const DEFAULT_L2: CacheParams = CacheParams {
    size: 64 * 1024,
    block_size: 64,
    associativity: 8,
};

/// The interactive simulator: an optional arena, an optional cache, and the
/// session statistics accumulator.
///
/// Fields are public so tests and front ends can inspect engine state
/// directly; all mutation goes through [`Simulator::execute`].
#[derive(Debug, Default)]
pub struct Simulator {
    pub arena: Option<Arena>,
    pub cache: Option<CacheHierarchy>,
    pub stats: SessionStats,
}

impl Simulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute one command and return the console lines it produced.
    pub fn execute(&mut self, cmd: Command) -> Vec<String> {
        match cmd {
            Command::InitMemory { size } => self.init_memory(size),
            Command::InitCache { l1, l2, policy } => self.init_cache(l1, l2, policy),
            Command::SetAllocator(strategy) => self.set_allocator(strategy),
            Command::SetCachePolicy(policy) => self.set_cache_policy(policy),
            Command::Malloc { size } => self.malloc(size),
            Command::FreeById(id) => self.free_by_id(id),
            Command::FreeByAddress(addr) => self.free_by_address(addr),
            Command::DumpMemory => self.dump_memory(),
            Command::Access { addr } => self.access(addr),
            Command::Stats => self.print_stats(),
            Command::Help => help_text().lines().map(str::to_string).collect(),
            // The shell breaks out of its loop before reaching this arm
            Command::Quit => Vec::new(),
        }
    }

    fn init_memory(&mut self, size: usize) -> Vec<String> {
        match Arena::new(size, PlacementStrategy::FirstFit) {
            Ok(arena) => {
                debug!(size, "arena replaced");
                self.arena = Some(arena);
            }
            Err(e) => return vec![format!("Error: {e}")],
        }

        let mut lines = Vec::new();
        if self.cache.is_none() {
            match CacheHierarchy::new(DEFAULT_L1, DEFAULT_L2, ReplacementPolicy::default()) {
                Ok(cache) => self.cache = Some(cache),
                Err(e) => lines.push(format!("Error: {e}")),
            }
        }
        lines.push(format!("Memory initialized with size: {size} bytes"));
        lines
    }

    fn init_cache(
        &mut self,
        l1: CacheParams,
        l2: CacheParams,
        policy: ReplacementPolicy,
    ) -> Vec<String> {
        match CacheHierarchy::new(l1, l2, policy) {
            Ok(cache) => {
                debug!(?l1, ?l2, %policy, "cache replaced");
                self.cache = Some(cache);
                vec![
                    "Cache initialized:".to_string(),
                    format!(
                        "L1: {}B, {}B blocks, {}-way",
                        l1.size, l1.block_size, l1.associativity
                    ),
                    format!(
                        "L2: {}B, {}B blocks, {}-way",
                        l2.size, l2.block_size, l2.associativity
                    ),
                ]
            }
            Err(e) => vec![format!("Error: {e}")],
        }
    }

    fn set_allocator(&mut self, strategy: PlacementStrategy) -> Vec<String> {
        let Some(arena) = self.arena.as_mut() else {
            return vec![Self::not_initialized()];
        };
        arena.set_strategy(strategy);
        vec![format!("Allocation strategy set to: {strategy}")]
    }

    fn set_cache_policy(&mut self, policy: ReplacementPolicy) -> Vec<String> {
        if self.arena.is_none() {
            return vec![Self::not_initialized()];
        }
        match self.cache.as_mut() {
            Some(cache) => {
                cache.set_policy(policy);
                vec![format!("Cache replacement policy set to: {policy}")]
            }
            None => {
                vec!["Cache not initialized. Use init memory or init cache first.".to_string()]
            }
        }
    }

    fn malloc(&mut self, size: usize) -> Vec<String> {
        let Some(arena) = self.arena.as_mut() else {
            return vec![Self::not_initialized()];
        };
        match arena.allocate(size) {
            Ok(alloc) => {
                self.stats.record_allocation(size, true);
                vec![format!(
                    "Allocated block id={} at address=0x{:x}",
                    alloc.id, alloc.address
                )]
            }
            Err(e) => {
                self.stats.record_allocation(size, false);
                warn!(size, %e, "allocation failed");
                vec![format!("Failed to allocate {size} bytes")]
            }
        }
    }

    fn free_by_id(&mut self, id: u64) -> Vec<String> {
        let Some(arena) = self.arena.as_mut() else {
            return vec![Self::not_initialized()];
        };
        match arena.release(id) {
            Ok(_) => vec![format!("Block {id} freed and merged")],
            Err(e) => {
                warn!(id, %e, "free failed");
                vec![
                    format!("Block ID {id} not found"),
                    format!("Failed to free block {id}"),
                ]
            }
        }
    }

    fn free_by_address(&mut self, addr: usize) -> Vec<String> {
        let Some(arena) = self.arena.as_mut() else {
            return vec![Self::not_initialized()];
        };
        match arena.release_by_address(addr) {
            Ok(id) => vec![format!("Block {id} freed and merged")],
            Err(e) => {
                warn!(addr, %e, "free by address failed");
                vec![format!("Failed to free address 0x{addr:x}")]
            }
        }
    }

    fn dump_memory(&mut self) -> Vec<String> {
        let Some(arena) = self.arena.as_ref() else {
            return vec![Self::not_initialized()];
        };
        let mut lines = vec!["=== Memory Dump ===".to_string()];
        lines.extend(arena.dump());
        lines.push("==================".to_string());
        lines
    }

    fn access(&mut self, addr: u64) -> Vec<String> {
        if self.arena.is_none() {
            return vec!["System not initialized. Use 'init memory <size>'".to_string()];
        }
        let Some(cache) = self.cache.as_mut() else {
            return vec!["Cache simulator not initialized.".to_string()];
        };

        let report = cache.access(addr);
        let mut lines = vec![format!("Physical address 0x{addr:x}")];
        lines.push(format!(
            "  L1: {}",
            if report.l1_hit { "HIT" } else { "MISS" }
        ));
        if !report.l1_hit {
            lines.push(format!(
                "  L2: {}",
                if report.l2_hit { "HIT" } else { "MISS" }
            ));
        }
        for event in &report.events {
            lines.push(format!("  [!] {event}"));
        }

        self.stats
            .sync_cache(cache.hits(1), cache.misses(1), cache.hits(2), cache.misses(2));
        lines
    }

    fn print_stats(&mut self) -> Vec<String> {
        let Some(arena) = self.arena.as_ref() else {
            return vec![Self::not_initialized()];
        };

        self.stats.set_fragmentation(
            arena.internal_fragmentation(),
            arena.external_fragmentation(),
            arena.utilization(),
        );
        self.stats
            .set_memory(arena.total_bytes(), arena.used_bytes(), arena.free_bytes());
        if let Some(cache) = self.cache.as_ref() {
            self.stats
                .sync_cache(cache.hits(1), cache.misses(1), cache.hits(2), cache.misses(2));
        }

        let mut lines = self.stats.report();
        if let Some(cache) = self.cache.as_ref() {
            lines.extend(cache.report());
        }
        lines
    }

    fn not_initialized() -> String {
        "Error: Memory not initialized. Use 'init memory <size>' first.".to_string()
    }
}
