//! Cache Hierarchy Simulator - a two-level set-associative model.
//!
//! Each level decodes a 64-bit physical address into (tag, set, offset),
//! probes its ways, and fills on miss under a replacement policy (FIFO,
//! LRU, LFU). L2 is probed only when L1 misses; fills propagate L2 then L1
//! and never update hit/miss statistics. The per-level clock ticks once per
//! counted probe, so a fill triggered by a miss reuses the probing tick.

use std::collections::VecDeque;
use std::fmt;

use crate::error::CacheError;

/// Width of a physical address in bits.
pub const ADDRESS_BITS: u32 = 64;

/// Assumed hit latencies for the AMAT estimate, in cycles.
const L1_LATENCY: f64 = 1.0;
const L2_LATENCY: f64 = 10.0;
const MEM_LATENCY: f64 = 100.0;

/// Replacement policy applied per set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ReplacementPolicy {
    /// Evict the way filled earliest (default)
    #[default]
    Fifo = 0,
    /// Evict the way touched least recently
    Lru = 1,
    /// Evict the way with the fewest accesses; ties go to the lowest way
    Lfu = 2,
}

impl ReplacementPolicy {
    /// Parse a policy name, case-insensitive.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "fifo" => Some(Self::Fifo),
            "lru" => Some(Self::Lru),
            "lfu" => Some(Self::Lfu),
            _ => None,
        }
    }
}

impl fmt::Display for ReplacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fifo => "fifo",
            Self::Lru => "lru",
            Self::Lfu => "lfu",
        };
        f.write_str(name)
    }
}

/// Geometry of one cache level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheParams {
    /// Total level size in bytes
    pub size: usize,
    /// Cache line size in bytes; must be a power of two
    pub block_size: usize,
    /// Ways per set
    pub associativity: usize,
}

impl CacheParams {
    /// Reject illegal geometry before any state is built.
    pub fn validate(&self) -> Result<(), CacheError> {
        let bad = |reason: &'static str| CacheError::BadGeometry {
            size: self.size,
            block_size: self.block_size,
            associativity: self.associativity,
            reason,
        };
        if self.block_size == 0 || !self.block_size.is_power_of_two() {
            return Err(bad("block size must be a nonzero power of two"));
        }
        if self.associativity == 0 {
            return Err(bad("associativity must be nonzero"));
        }
        let set_bytes = self.block_size * self.associativity;
        if self.size < set_bytes {
            return Err(bad("level smaller than block_size * associativity"));
        }
        if self.size % set_bytes != 0 {
            return Err(bad("size must be a multiple of block_size * associativity"));
        }
        if !(self.size / set_bytes).is_power_of_two() {
            return Err(bad("set count must be a power of two"));
        }
        Ok(())
    }

    #[inline]
    fn num_sets(&self) -> usize {
        self.size / (self.block_size * self.associativity)
    }
}

/// Result of one hierarchy access.
#[derive(Clone, Debug, Default)]
pub struct AccessReport {
    pub l1_hit: bool,
    /// True iff L1 missed (L2 is probed exactly then)
    pub l2_accessed: bool,
    pub l2_hit: bool,
    /// Human-readable eviction events, in the order they occurred
    pub events: Vec<String>,
}

/// One cache line. Metadata is meaningful only while `valid` is true.
#[derive(Clone, Copy, Debug, Default)]
struct Way {
    valid: bool,
    tag: u64,
    load_time: u64,
    last_access: u64,
    access_count: u64,
}

/// An associativity-wide group of ways plus replacement bookkeeping.
#[derive(Clone, Debug, Default)]
struct CacheSet {
    ways: Vec<Way>,
    /// Way indices in fill order, oldest at the front; each index at most once
    fifo: VecDeque<usize>,
    /// Way indices oldest to newest by touch; each index at most once
    lru: VecDeque<usize>,
}

/// A single set-associative cache level.
pub struct CacheLevel {
    level_num: u8,
    params: CacheParams,
    num_sets: usize,
    offset_bits: u32,
    index_bits: u32,
    tag_bits: u32,
    policy: ReplacementPolicy,
    sets: Vec<CacheSet>,

    hits: u64,
    misses: u64,
    evictions: u64,
    /// Ticks once per counted probe; fills reuse the probing tick
    clock: u64,
}

impl CacheLevel {
    /// Build a level; `level_num` is 1 or 2 and only labels reports.
    pub fn new(
        level_num: u8,
        params: CacheParams,
        policy: ReplacementPolicy,
    ) -> Result<Self, CacheError> {
        params.validate()?;
        let num_sets = params.num_sets();
        let offset_bits = params.block_size.trailing_zeros();
        let index_bits = num_sets.trailing_zeros();
        let tag_bits = ADDRESS_BITS.saturating_sub(offset_bits + index_bits);

        let sets = vec![
            CacheSet {
                ways: vec![Way::default(); params.associativity],
                fifo: VecDeque::new(),
                lru: VecDeque::new(),
            };
            num_sets
        ];

        Ok(Self {
            level_num,
            params,
            num_sets,
            offset_bits,
            index_bits,
            tag_bits,
            policy,
            sets,
            hits: 0,
            misses: 0,
            evictions: 0,
            clock: 0,
        })
    }

    // ========================================================================
    // Address decomposition
    // ========================================================================

    #[inline]
    fn low_mask(bits: u32) -> u64 {
        if bits >= 64 {
            u64::MAX
        } else {
            (1u64 << bits) - 1
        }
    }

    /// Tag field of `addr` for this level.
    #[inline]
    pub fn tag_of(&self, addr: u64) -> u64 {
        (addr >> (self.offset_bits + self.index_bits)) & Self::low_mask(self.tag_bits)
    }

    /// Set index of `addr` for this level.
    #[inline]
    pub fn set_index_of(&self, addr: u64) -> usize {
        ((addr >> self.offset_bits) & Self::low_mask(self.index_bits)) as usize
    }

    /// Byte offset within the cache line. Does not affect hit/miss.
    #[inline]
    pub fn block_offset_of(&self, addr: u64) -> u64 {
        addr & Self::low_mask(self.offset_bits)
    }

    // ========================================================================
    // Probe / fill
    // ========================================================================

    /// Probe for `addr`. With `count_stats`, ticks the clock, counts the
    /// outcome, and refreshes replacement metadata on a hit.
    pub fn probe(&mut self, addr: u64, count_stats: bool) -> bool {
        if count_stats {
            self.clock += 1;
        }
        let tag = self.tag_of(addr);
        let index = self.set_index_of(addr);

        let hit_way = self.sets[index]
            .ways
            .iter()
            .position(|w| w.valid && w.tag == tag);

        match hit_way {
            Some(way) => {
                if count_stats {
                    self.hits += 1;
                    self.note_touch(index, way);
                }
                true
            }
            None => {
                if count_stats {
                    self.misses += 1;
                }
                false
            }
        }
    }

    /// Install the line holding `addr`, evicting if the set is full.
    ///
    /// Never counts hit/miss and never ticks the clock: the installed way's
    /// `load_time` is the tick of the probe that caused this fill.
    pub fn fill(&mut self, addr: u64, events: &mut Vec<String>) {
        let tag = self.tag_of(addr);
        let index = self.set_index_of(addr);

        let target = match self.sets[index].ways.iter().position(|w| !w.valid) {
            Some(free_way) => free_way,
            None => {
                let victim = self.select_victim(index);
                self.evictions += 1;
                events.push(format!(
                    "L{} Eviction: Tag 0x{:x} (Set {})",
                    self.level_num, self.sets[index].ways[victim].tag, index
                ));
                victim
            }
        };

        let clock = self.clock;
        let way = &mut self.sets[index].ways[target];
        way.valid = true;
        way.tag = tag;
        way.load_time = clock;
        way.last_access = clock;
        way.access_count = 1;

        self.note_fill(index, target);
    }

    /// Refresh replacement metadata for a hit way.
    fn note_touch(&mut self, index: usize, way: usize) {
        match self.policy {
            ReplacementPolicy::Fifo => {}
            ReplacementPolicy::Lru => {
                let clock = self.clock;
                let set = &mut self.sets[index];
                set.lru.retain(|&w| w != way);
                set.lru.push_back(way);
                set.ways[way].last_access = clock;
            }
            ReplacementPolicy::Lfu => {
                self.sets[index].ways[way].access_count += 1;
            }
        }
    }

    /// Record a fill into `way`: the way becomes the newest in its order.
    fn note_fill(&mut self, index: usize, way: usize) {
        let set = &mut self.sets[index];
        match self.policy {
            ReplacementPolicy::Fifo => {
                set.fifo.retain(|&w| w != way);
                set.fifo.push_back(way);
            }
            ReplacementPolicy::Lru => {
                set.lru.retain(|&w| w != way);
                set.lru.push_back(way);
            }
            ReplacementPolicy::Lfu => {}
        }
    }

    /// Pick the way to evict from a full set under the current policy.
    fn select_victim(&mut self, index: usize) -> usize {
        let set = &mut self.sets[index];
        match self.policy {
            ReplacementPolicy::Fifo => {
                // Lazily (re)seed after a policy switch: oldest load first
                if set.fifo.len() != set.ways.len() {
                    let mut order: Vec<usize> = (0..set.ways.len()).collect();
                    order.sort_by_key(|&w| set.ways[w].load_time);
                    set.fifo = order.into();
                }
                *set.fifo.front().expect("fifo queue seeded above")
            }
            ReplacementPolicy::Lru => {
                let mut victim = 0;
                for w in 1..set.ways.len() {
                    if set.ways[w].last_access < set.ways[victim].last_access {
                        victim = w;
                    }
                }
                victim
            }
            ReplacementPolicy::Lfu => {
                let mut victim = 0;
                for w in 1..set.ways.len() {
                    if set.ways[w].access_count < set.ways[victim].access_count {
                        victim = w;
                    }
                }
                victim
            }
        }
    }

    // ========================================================================
    // Configuration / reporting
    // ========================================================================

    /// Switch the replacement policy. Contents survive; the FIFO/LRU
    /// auxiliary orders are discarded and rebuilt lazily from the per-way
    /// timestamps on the next victim selection.
    pub fn set_policy(&mut self, policy: ReplacementPolicy) {
        if policy == self.policy {
            return;
        }
        self.policy = policy;
        for set in &mut self.sets {
            set.fifo.clear();
            set.lru.clear();
        }
    }

    #[inline]
    pub fn policy(&self) -> ReplacementPolicy {
        self.policy
    }

    #[inline]
    pub fn params(&self) -> CacheParams {
        self.params
    }

    #[inline]
    pub fn num_sets(&self) -> usize {
        self.num_sets
    }

    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits
    }

    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses
    }

    #[inline]
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Hit percentage; 0 when the level has never been probed.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        (self.hits as f64 / total as f64) * 100.0
    }

    fn miss_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.misses as f64 / total as f64
    }

    /// Valid tags of a set, for inspection in tests.
    pub fn valid_tags(&self, index: usize) -> Vec<u64> {
        self.sets[index]
            .ways
            .iter()
            .filter(|w| w.valid)
            .map(|w| w.tag)
            .collect()
    }

    /// Structural check: per-set tag uniqueness and exactly-once auxiliary
    /// membership.
    pub fn audit(&self) -> Result<(), String> {
        for (index, set) in self.sets.iter().enumerate() {
            let mut tags = set
                .ways
                .iter()
                .filter(|w| w.valid)
                .map(|w| w.tag)
                .collect::<Vec<_>>();
            tags.sort_unstable();
            if tags.windows(2).any(|p| p[0] == p[1]) {
                return Err(format!("duplicate tag in L{} set {}", self.level_num, index));
            }
            for aux in [&set.fifo, &set.lru] {
                let mut seen = aux.iter().copied().collect::<Vec<_>>();
                seen.sort_unstable();
                if seen.windows(2).any(|p| p[0] == p[1]) {
                    return Err(format!(
                        "duplicate way in L{} set {} auxiliary order",
                        self.level_num, index
                    ));
                }
                if seen.iter().any(|&w| w >= set.ways.len()) {
                    return Err(format!(
                        "out-of-range way in L{} set {} auxiliary order",
                        self.level_num, index
                    ));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CacheLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheLevel")
            .field("level", &self.level_num)
            .field("sets", &self.num_sets)
            .field("associativity", &self.params.associativity)
            .field("policy", &self.policy)
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}

/// The two-level hierarchy with inclusive L2-to-L1 fill semantics.
#[derive(Debug)]
pub struct CacheHierarchy {
    l1: CacheLevel,
    l2: CacheLevel,
}

impl CacheHierarchy {
    /// Build both levels with the same initial policy.
    pub fn new(
        l1_params: CacheParams,
        l2_params: CacheParams,
        policy: ReplacementPolicy,
    ) -> Result<Self, CacheError> {
        Ok(Self {
            l1: CacheLevel::new(1, l1_params, policy)?,
            l2: CacheLevel::new(2, l2_params, policy)?,
        })
    }

    /// Run one access through the hierarchy.
    ///
    /// Exactly one counted L1 probe; a counted L2 probe iff L1 missed; then
    /// the fills implied by the outcome, which never touch the counters.
    pub fn access(&mut self, addr: u64) -> AccessReport {
        let mut report = AccessReport::default();

        report.l1_hit = self.l1.probe(addr, true);
        if report.l1_hit {
            return report;
        }

        report.l2_accessed = true;
        report.l2_hit = self.l2.probe(addr, true);
        if report.l2_hit {
            self.l1.fill(addr, &mut report.events);
            return report;
        }

        self.l2.fill(addr, &mut report.events);
        self.l1.fill(addr, &mut report.events);
        report
    }

    /// Apply a policy to both levels.
    pub fn set_policy(&mut self, policy: ReplacementPolicy) {
        self.l1.set_policy(policy);
        self.l2.set_policy(policy);
    }

    /// Apply a policy to one level (1 or 2). Returns false for any other
    /// level number.
    pub fn set_level_policy(&mut self, level: u8, policy: ReplacementPolicy) -> bool {
        match level {
            1 => self.l1.set_policy(policy),
            2 => self.l2.set_policy(policy),
            _ => return false,
        }
        true
    }

    #[inline]
    pub fn l1(&self) -> &CacheLevel {
        &self.l1
    }

    #[inline]
    pub fn l2(&self) -> &CacheLevel {
        &self.l2
    }

    /// Hits at level 1 or 2; 0 for any other level number.
    pub fn hits(&self, level: u8) -> u64 {
        match level {
            1 => self.l1.hits(),
            2 => self.l2.hits(),
            _ => 0,
        }
    }

    /// Misses at level 1 or 2; 0 for any other level number.
    pub fn misses(&self, level: u8) -> u64 {
        match level {
            1 => self.l1.misses(),
            2 => self.l2.misses(),
            _ => 0,
        }
    }

    /// Hit percentage at level 1 or 2; 0 for any other level number.
    pub fn hit_ratio(&self, level: u8) -> f64 {
        match level {
            1 => self.l1.hit_ratio(),
            2 => self.l2.hit_ratio(),
            _ => 0.0,
        }
    }

    /// Average memory access time estimate with latencies 1 / 10 / 100.
    pub fn amat(&self) -> f64 {
        L1_LATENCY + self.l1.miss_rate() * (L2_LATENCY + self.l2.miss_rate() * MEM_LATENCY)
    }

    /// The statistics block shown by the `stats` command.
    pub fn report(&self) -> Vec<String> {
        let mut lines = vec!["=== Cache Statistics ===".to_string()];
        for (name, level, traffic) in [
            ("L1", &self.l1, "Miss Traffic (to L2)"),
            ("L2", &self.l2, "Miss Traffic (to Memory)"),
        ] {
            lines.push(format!("{name} Cache:"));
            lines.push(format!("  Hits: {}", level.hits()));
            lines.push(format!("  Misses: {}", level.misses()));
            lines.push(format!("  Evictions: {}", level.evictions()));
            lines.push(format!("  Hit Ratio: {:.2}%", level.hit_ratio()));
            lines.push(format!("  {traffic}: {} requests", level.misses()));
        }
        lines.push("System Performance:".to_string());
        lines.push(format!("  Estimated AMAT: {:.2} cycles", self.amat()));
        lines.push(format!(
            "  (Assumptions: L1={}, L2={}, Mem={})",
            L1_LATENCY as u64, L2_LATENCY as u64, MEM_LATENCY as u64
        ));
        lines.push("======================".to_string());
        lines
    }
}
