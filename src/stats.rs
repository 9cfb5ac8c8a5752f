//! Session statistics - a pure accumulator fed by the driver.
//!
//! Holds allocation counters, the latest memory/fragmentation snapshot, and
//! cache counters synced from the simulator. The virtual-memory counters
//! exist for completeness; nothing in the simulator drives them.

/// Counters and snapshots for the `stats` command.
#[derive(Clone, Debug, Default)]
pub struct SessionStats {
    total_allocations: u64,
    successful_allocations: u64,
    failed_allocations: u64,
    requested_bytes: u64,

    internal_fragmentation: f64,
    external_fragmentation: f64,
    memory_utilization: f64,
    total_memory: usize,
    used_memory: usize,
    free_memory: usize,

    l1_hits: u64,
    l1_misses: u64,
    l2_hits: u64,
    l2_misses: u64,

    page_faults: u64,
    page_hits: u64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one allocation attempt.
    pub fn record_allocation(&mut self, size: usize, success: bool) {
        self.total_allocations += 1;
        if success {
            self.successful_allocations += 1;
            self.requested_bytes += size as u64;
        } else {
            self.failed_allocations += 1;
        }
    }

    /// Incremental cache counter hook. The driver normally uses
    /// [`SessionStats::sync_cache`] instead.
    pub fn record_cache_access(&mut self, level: u8, hit: bool) {
        match (level, hit) {
            (1, true) => self.l1_hits += 1,
            (1, false) => self.l1_misses += 1,
            (2, true) => self.l2_hits += 1,
            (2, false) => self.l2_misses += 1,
            _ => {}
        }
    }

    /// Overwrite cache counters with the simulator's absolute values.
    pub fn sync_cache(&mut self, l1_hits: u64, l1_misses: u64, l2_hits: u64, l2_misses: u64) {
        self.l1_hits = l1_hits;
        self.l1_misses = l1_misses;
        self.l2_hits = l2_hits;
        self.l2_misses = l2_misses;
    }

    pub fn record_page_fault(&mut self) {
        self.page_faults += 1;
    }

    pub fn record_page_hit(&mut self) {
        self.page_hits += 1;
    }

    /// Latest fragmentation/utilization percentages.
    pub fn set_fragmentation(&mut self, internal: f64, external: f64, utilization: f64) {
        self.internal_fragmentation = internal;
        self.external_fragmentation = external;
        self.memory_utilization = utilization;
    }

    /// Latest memory byte counts.
    pub fn set_memory(&mut self, total: usize, used: usize, free: usize) {
        self.total_memory = total;
        self.used_memory = used;
        self.free_memory = free;
    }

    #[inline]
    pub fn total_allocations(&self) -> u64 {
        self.total_allocations
    }

    #[inline]
    pub fn successful_allocations(&self) -> u64 {
        self.successful_allocations
    }

    #[inline]
    pub fn failed_allocations(&self) -> u64 {
        self.failed_allocations
    }

    /// Payload bytes granted across all successful allocations.
    #[inline]
    pub fn requested_bytes(&self) -> u64 {
        self.requested_bytes
    }

    /// The "Simulation Statistics" block shown by the `stats` command.
    pub fn report(&self) -> Vec<String> {
        let mut lines = vec!["=== Simulation Statistics ===".to_string()];

        lines.push("Memory Allocation:".to_string());
        lines.push(format!("  Total Allocations: {}", self.total_allocations));
        lines.push(format!("  Successful: {}", self.successful_allocations));
        lines.push(format!("  Failed: {}", self.failed_allocations));
        if self.total_allocations > 0 {
            let rate =
                (self.successful_allocations as f64 / self.total_allocations as f64) * 100.0;
            lines.push(format!("  Success Rate: {rate:.2}%"));
        }

        lines.push("Memory Usage:".to_string());
        lines.push(format!("  Total Memory: {} bytes", self.total_memory));
        lines.push(format!("  Used Memory: {} bytes", self.used_memory));
        lines.push(format!("  Free Memory: {} bytes", self.free_memory));
        lines.push(format!(
            "  Memory Utilization: {:.2}%",
            self.memory_utilization
        ));

        lines.push("Fragmentation:".to_string());
        lines.push(format!(
            "  Internal Fragmentation: {:.2}%",
            self.internal_fragmentation
        ));
        lines.push(format!(
            "  External Fragmentation: {:.2}%",
            self.external_fragmentation
        ));

        for (name, hits, misses) in [
            ("L1", self.l1_hits, self.l1_misses),
            ("L2", self.l2_hits, self.l2_misses),
        ] {
            lines.push(format!("Cache Statistics ({name}):"));
            lines.push(format!("  Hits: {hits}"));
            lines.push(format!("  Misses: {misses}"));
            let total = hits + misses;
            if total > 0 {
                let ratio = (hits as f64 / total as f64) * 100.0;
                lines.push(format!("  Hit Ratio: {ratio:.2}%"));
            }
        }

        lines.push("Virtual Memory:".to_string());
        lines.push(format!("  Page Faults: {}", self.page_faults));
        lines.push(format!("  Page Hits: {}", self.page_hits));
        let vm_total = self.page_faults + self.page_hits;
        if vm_total > 0 {
            let rate = (self.page_faults as f64 / vm_total as f64) * 100.0;
            lines.push(format!("  Page Fault Rate: {rate:.2}%"));
        }

        lines.push("============================".to_string());
        lines
    }
}
