//! Arena Allocator - placement policies, splitting, and boundary coalescing
//! over a fixed-size simulated byte region.
//!
//! Block metadata lives in an out-of-band slab rather than in-band headers;
//! the byte region itself is pure accounting. Two doubly-linked lists are
//! threaded through `u32` slab indices: the physical-order chain (every
//! block, by address) and the free list (free blocks only). Keeping the
//! physical chain linked makes release-time coalescing O(1).

use std::fmt;

use rustc_hash::FxHashMap;

use crate::error::AllocError;

/// Sentinel value representing a null/invalid index (like nullptr)
pub const NULL_INDEX: u32 = u32::MAX;

/// Type alias for slab indices - our "compressed pointers"
pub type BlockIndex = u32;

/// Simulated header footprint charged to every block, in bytes.
///
/// Every allocation consumes `requested + HEADER_BYTES` of the arena; the
/// payload address reported to callers is the block offset plus this value.
pub const HEADER_BYTES: usize = 32;

/// Smallest payload worth creating a block for when splitting.
pub const MIN_PAYLOAD: usize = 8;

/// Placement policy used to choose among candidate free blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PlacementStrategy {
    /// First candidate in free-list traversal order (default)
    #[default]
    FirstFit = 0,
    /// Smallest candidate; ties broken by first encountered
    BestFit = 1,
    /// Largest candidate; ties broken by first encountered
    WorstFit = 2,
}

impl PlacementStrategy {
    /// Parse a strategy name. Case-insensitive; the underscore is optional.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "first_fit" | "firstfit" => Some(Self::FirstFit),
            "best_fit" | "bestfit" => Some(Self::BestFit),
            "worst_fit" | "worstfit" => Some(Self::WorstFit),
            _ => None,
        }
    }
}

impl fmt::Display for PlacementStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FirstFit => "first_fit",
            Self::BestFit => "best_fit",
            Self::WorstFit => "worst_fit",
        };
        f.write_str(name)
    }
}

/// A successful allocation: the handle plus the reported payload address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Allocation {
    /// Fresh, never-reused block id (non-zero)
    pub id: u64,
    /// Payload address: block offset + [`HEADER_BYTES`]
    pub address: usize,
    /// Granted payload size (may exceed the request when the block did not split)
    pub payload: usize,
}

/// Reporting view of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    /// Block id; 0 for blocks that are free
    pub id: u64,
    /// Span start within the arena
    pub offset: usize,
    /// Span length including the header
    pub size: usize,
    /// Payload address
    pub address: usize,
    /// Payload size (span minus header)
    pub payload: usize,
    pub is_free: bool,
}

/// One block record in the out-of-band table.
///
/// `free_prev`/`free_next` are meaningful only while `free` is true.
#[derive(Clone, Copy, Debug)]
struct Block {
    offset: usize,
    size: usize,
    free: bool,
    /// Unique id assigned when the block becomes allocated; 0 = not allocated
    id: u64,
    phys_prev: BlockIndex,
    phys_next: BlockIndex,
    free_prev: BlockIndex,
    free_next: BlockIndex,
}

impl Block {
    const fn spanning(offset: usize, size: usize) -> Self {
        Self {
            offset,
            size,
            free: true,
            id: 0,
            phys_prev: NULL_INDEX,
            phys_next: NULL_INDEX,
            free_prev: NULL_INDEX,
            free_next: NULL_INDEX,
        }
    }
}

/// A fixed-size arena managed with placement policies, splitting and
/// boundary coalescing.
///
/// The arena begins as one free block spanning the whole region. Blocks tile
/// the region exactly at all times; no two adjacent blocks are ever both
/// free after a release completes.
pub struct Arena {
    total_size: usize,
    strategy: PlacementStrategy,

    /// Block slab; vacated slots are recycled through `recycled`
    blocks: Vec<Block>,
    recycled: Vec<BlockIndex>,

    /// Physical head (the block at offset 0)
    first: BlockIndex,
    /// Head of the free list; insertion is at the head
    free_head: BlockIndex,

    /// Next id to hand out; ids never reuse
    next_id: u64,

    id_to_block: FxHashMap<u64, BlockIndex>,
    addr_to_block: FxHashMap<usize, BlockIndex>,
    id_to_request: FxHashMap<u64, usize>,

    success_count: u64,
    failure_count: u64,
    requested_total: u64,
}

impl Arena {
    /// Create an arena of `total_size` bytes containing one free block.
    ///
    /// Fails with [`AllocError::ArenaTooSmall`] if the region cannot hold a
    /// single minimal block.
    pub fn new(total_size: usize, strategy: PlacementStrategy) -> Result<Self, AllocError> {
        let minimum = HEADER_BYTES + MIN_PAYLOAD;
        if total_size < minimum {
            return Err(AllocError::ArenaTooSmall {
                requested: total_size,
                minimum,
            });
        }

        let mut arena = Self {
            total_size,
            strategy,
            blocks: vec![Block::spanning(0, total_size)],
            recycled: Vec::new(),
            first: 0,
            free_head: NULL_INDEX,
            next_id: 1,
            id_to_block: FxHashMap::default(),
            addr_to_block: FxHashMap::default(),
            id_to_request: FxHashMap::default(),
            success_count: 0,
            failure_count: 0,
            requested_total: 0,
        };
        arena.push_free(0);
        Ok(arena)
    }

    /// Change the placement policy for subsequent allocations.
    ///
    /// No structural change to the arena; all strategies walk the same
    /// free list.
    #[inline]
    pub fn set_strategy(&mut self, strategy: PlacementStrategy) {
        self.strategy = strategy;
    }

    /// Current placement policy.
    #[inline]
    pub fn strategy(&self) -> PlacementStrategy {
        self.strategy
    }

    // ========================================================================
    // Allocation / release
    // ========================================================================

    /// Allocate a block with at least `size` payload bytes.
    ///
    /// The chosen free block is split when the remainder could hold another
    /// minimal block; otherwise the whole block is granted (internal
    /// fragmentation). The returned id is fresh and never reused.
    pub fn allocate(&mut self, size: usize) -> Result<Allocation, AllocError> {
        if size == 0 {
            self.failure_count += 1;
            return Err(AllocError::ZeroSize);
        }

        let need = size + HEADER_BYTES;
        self.requested_total += size as u64;

        let chosen = match self.strategy {
            PlacementStrategy::FirstFit => self.find_first_fit(need),
            PlacementStrategy::BestFit => self.find_best_fit(need),
            PlacementStrategy::WorstFit => self.find_worst_fit(need),
        };

        let Some(index) = chosen else {
            self.failure_count += 1;
            return Err(AllocError::OutOfSpace { requested: size });
        };

        if self.blocks[index as usize].size - need >= HEADER_BYTES + MIN_PAYLOAD {
            self.split(index, need);
        }

        self.unlink_free(index);

        let id = self.next_id;
        self.next_id += 1;

        let block = &mut self.blocks[index as usize];
        block.free = false;
        block.id = id;
        let address = block.offset + HEADER_BYTES;
        let payload = block.size - HEADER_BYTES;

        self.id_to_block.insert(id, index);
        self.addr_to_block.insert(address, index);
        self.id_to_request.insert(id, size);
        self.success_count += 1;

        Ok(Allocation {
            id,
            address,
            payload,
        })
    }

    /// Release an allocated block by id.
    ///
    /// On success the block is free, coalesced with any adjacent free
    /// neighbors, and the id is retired. Returns the size of the span that
    /// was handed back (before coalescing).
    pub fn release(&mut self, id: u64) -> Result<usize, AllocError> {
        match self.id_to_block.get(&id).copied() {
            Some(index) => Ok(self.release_block(index)),
            None if id != 0 && id < self.next_id => Err(AllocError::DoubleFree(id)),
            None => Err(AllocError::UnknownHandle(id)),
        }
    }

    /// Release an allocated block by the payload address reported at
    /// allocation time.
    ///
    /// Returns the id of the released block.
    pub fn release_by_address(&mut self, address: usize) -> Result<u64, AllocError> {
        let Some(&index) = self.addr_to_block.get(&address) else {
            return Err(AllocError::InvalidAddress(address));
        };
        let id = self.blocks[index as usize].id;
        self.release_block(index);
        Ok(id)
    }

    /// Flip the block to free, return it to the free list, and merge with
    /// free physical neighbors. Returns the pre-coalesce span size.
    fn release_block(&mut self, index: BlockIndex) -> usize {
        let block = &mut self.blocks[index as usize];
        let id = block.id;
        let address = block.offset + HEADER_BYTES;
        let released = block.size;

        block.free = true;
        block.id = 0;

        self.id_to_block.remove(&id);
        self.id_to_request.remove(&id);
        self.addr_to_block.remove(&address);

        self.push_free(index);
        self.coalesce(index);
        released
    }

    // ========================================================================
    // Placement
    // ========================================================================

    /// First Fit: the first candidate in free-list traversal order.
    fn find_first_fit(&self, need: usize) -> Option<BlockIndex> {
        let mut current = self.free_head;
        while current != NULL_INDEX {
            if self.blocks[current as usize].size >= need {
                return Some(current);
            }
            current = self.blocks[current as usize].free_next;
        }
        None
    }

    /// Best Fit: the smallest candidate; ties go to the first encountered.
    fn find_best_fit(&self, need: usize) -> Option<BlockIndex> {
        let mut best: Option<BlockIndex> = None;
        let mut current = self.free_head;
        while current != NULL_INDEX {
            let size = self.blocks[current as usize].size;
            if size >= need && best.map_or(true, |b| size < self.blocks[b as usize].size) {
                best = Some(current);
            }
            current = self.blocks[current as usize].free_next;
        }
        best
    }

    /// Worst Fit: the largest candidate; ties go to the first encountered.
    fn find_worst_fit(&self, need: usize) -> Option<BlockIndex> {
        let mut worst: Option<BlockIndex> = None;
        let mut current = self.free_head;
        while current != NULL_INDEX {
            let size = self.blocks[current as usize].size;
            if size >= need && worst.map_or(true, |w| size > self.blocks[w as usize].size) {
                worst = Some(current);
            }
            current = self.blocks[current as usize].free_next;
        }
        worst
    }

    // ========================================================================
    // Split / coalesce
    // ========================================================================

    /// Shrink `index` to `need` bytes and create a free remainder block
    /// immediately after it in physical order.
    fn split(&mut self, index: BlockIndex, need: usize) {
        let (offset, size, phys_next) = {
            let block = &self.blocks[index as usize];
            (block.offset, block.size, block.phys_next)
        };
        debug_assert!(size - need >= HEADER_BYTES + MIN_PAYLOAD);

        let mut remainder = Block::spanning(offset + need, size - need);
        remainder.phys_prev = index;
        remainder.phys_next = phys_next;
        let new_index = self.claim_slot(remainder);

        self.blocks[index as usize].size = need;
        self.blocks[index as usize].phys_next = new_index;
        if phys_next != NULL_INDEX {
            self.blocks[phys_next as usize].phys_prev = new_index;
        }

        self.push_free(new_index);
    }

    /// Merge a newly freed block with free physical neighbors.
    ///
    /// The successor is absorbed first, then the block itself is absorbed
    /// into a free predecessor. One pass suffices: a free neighbor can never
    /// itself border another free block.
    fn coalesce(&mut self, index: BlockIndex) {
        let next = self.blocks[index as usize].phys_next;
        if next != NULL_INDEX && self.blocks[next as usize].free {
            self.unlink_free(next);
            let next_size = self.blocks[next as usize].size;
            let next_next = self.blocks[next as usize].phys_next;
            self.blocks[index as usize].size += next_size;
            self.blocks[index as usize].phys_next = next_next;
            if next_next != NULL_INDEX {
                self.blocks[next_next as usize].phys_prev = index;
            }
            self.drop_slot(next);
        }

        let prev = self.blocks[index as usize].phys_prev;
        if prev != NULL_INDEX && self.blocks[prev as usize].free {
            self.unlink_free(index);
            let size = self.blocks[index as usize].size;
            let next = self.blocks[index as usize].phys_next;
            self.blocks[prev as usize].size += size;
            self.blocks[prev as usize].phys_next = next;
            if next != NULL_INDEX {
                self.blocks[next as usize].phys_prev = prev;
            }
            self.drop_slot(index);
        }
    }

    // ========================================================================
    // Free list
    // ========================================================================

    /// Insert at the head of the free list.
    fn push_free(&mut self, index: BlockIndex) {
        debug_assert!(self.blocks[index as usize].free);
        let head = self.free_head;
        let block = &mut self.blocks[index as usize];
        block.free_prev = NULL_INDEX;
        block.free_next = head;
        if head != NULL_INDEX {
            self.blocks[head as usize].free_prev = index;
        }
        self.free_head = index;
    }

    /// Unlink from the free list.
    fn unlink_free(&mut self, index: BlockIndex) {
        let (prev, next) = {
            let block = &self.blocks[index as usize];
            (block.free_prev, block.free_next)
        };
        if prev != NULL_INDEX {
            self.blocks[prev as usize].free_next = next;
        } else {
            self.free_head = next;
        }
        if next != NULL_INDEX {
            self.blocks[next as usize].free_prev = prev;
        }
        let block = &mut self.blocks[index as usize];
        block.free_prev = NULL_INDEX;
        block.free_next = NULL_INDEX;
    }

    // ========================================================================
    // Slab slots
    // ========================================================================

    fn claim_slot(&mut self, block: Block) -> BlockIndex {
        if let Some(index) = self.recycled.pop() {
            self.blocks[index as usize] = block;
            index
        } else {
            let index = self.blocks.len() as BlockIndex;
            debug_assert!(index < NULL_INDEX);
            self.blocks.push(block);
            index
        }
    }

    fn drop_slot(&mut self, index: BlockIndex) {
        // Unreachable once unlinked; size 0 marks the slot as vacated
        self.blocks[index as usize].size = 0;
        self.recycled.push(index);
    }

    // ========================================================================
    // Reporting
    // ========================================================================

    /// Look up a live block by id.
    pub fn block_info(&self, id: u64) -> Option<BlockInfo> {
        let &index = self.id_to_block.get(&id)?;
        Some(self.info_at(index))
    }

    /// All blocks in physical order, free and allocated alike.
    pub fn all_blocks(&self) -> Vec<BlockInfo> {
        let mut out = Vec::new();
        let mut current = self.first;
        while current != NULL_INDEX {
            out.push(self.info_at(current));
            current = self.blocks[current as usize].phys_next;
        }
        out
    }

    fn info_at(&self, index: BlockIndex) -> BlockInfo {
        let block = &self.blocks[index as usize];
        BlockInfo {
            id: block.id,
            offset: block.offset,
            size: block.size,
            address: block.offset + HEADER_BYTES,
            payload: block.size - HEADER_BYTES,
            is_free: block.free,
        }
    }

    /// Per-block layout lines in physical order.
    pub fn dump(&self) -> Vec<String> {
        self.all_blocks()
            .into_iter()
            .map(|b| {
                if b.is_free {
                    format!("[0x{:08x} - 0x{:08x}] FREE", b.offset, b.offset + b.size - 1)
                } else {
                    format!(
                        "[0x{:08x} - 0x{:08x}] USED (id={}, size={} bytes)",
                        b.offset,
                        b.offset + b.size - 1,
                        b.id,
                        b.payload
                    )
                }
            })
            .collect()
    }

    // ========================================================================
    // Metrics
    // ========================================================================

    /// Arena size in bytes.
    #[inline]
    pub fn total_bytes(&self) -> usize {
        self.total_size
    }

    /// Bytes held by allocated blocks, headers included.
    pub fn used_bytes(&self) -> usize {
        self.id_to_block
            .values()
            .map(|&i| self.blocks[i as usize].size)
            .sum()
    }

    /// Bytes not held by allocated blocks.
    #[inline]
    pub fn free_bytes(&self) -> usize {
        self.total_size - self.used_bytes()
    }

    /// Percentage of the arena held by allocated blocks.
    pub fn utilization(&self) -> f64 {
        (self.used_bytes() as f64 / self.total_size as f64) * 100.0
    }

    /// Payload bytes granted beyond what was requested, as a percentage of
    /// granted payload. 0 when nothing is allocated.
    pub fn internal_fragmentation(&self) -> f64 {
        let mut granted = 0usize;
        let mut requested = 0usize;
        for (&id, &index) in &self.id_to_block {
            granted += self.blocks[index as usize].size - HEADER_BYTES;
            requested += self.id_to_request.get(&id).copied().unwrap_or(0);
        }
        if granted == 0 {
            return 0.0;
        }
        ((granted - requested) as f64 / granted as f64) * 100.0
    }

    /// Free payload unusable by a single maximal request, as a percentage of
    /// the arena. 0 when nothing is free.
    pub fn external_fragmentation(&self) -> f64 {
        let mut free_usable = 0usize;
        let mut largest_usable = 0usize;
        let mut current = self.free_head;
        while current != NULL_INDEX {
            let usable = self.blocks[current as usize].size - HEADER_BYTES;
            free_usable += usable;
            largest_usable = largest_usable.max(usable);
            current = self.blocks[current as usize].free_next;
        }
        if free_usable == 0 {
            return 0.0;
        }
        ((free_usable - largest_usable) as f64 / self.total_size as f64) * 100.0
    }

    /// Span size of the largest free block, header included. 0 when full.
    pub fn largest_free_block(&self) -> usize {
        let mut largest = 0usize;
        let mut current = self.free_head;
        while current != NULL_INDEX {
            largest = largest.max(self.blocks[current as usize].size);
            current = self.blocks[current as usize].free_next;
        }
        largest
    }

    /// Number of live allocated blocks.
    #[inline]
    pub fn live_blocks(&self) -> usize {
        self.id_to_block.len()
    }

    /// Successful allocations since construction.
    #[inline]
    pub fn success_count(&self) -> u64 {
        self.success_count
    }

    /// Failed allocations since construction.
    #[inline]
    pub fn failure_count(&self) -> u64 {
        self.failure_count
    }

    /// Cumulative requested payload bytes across all allocation attempts.
    #[inline]
    pub fn requested_total(&self) -> u64 {
        self.requested_total
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Structural integrity check used by the stress tests.
    ///
    /// Verifies tiling, physical link symmetry, the coalescing invariant,
    /// minimum block size, exactly-once free-list membership, and map
    /// consistency.
    pub fn audit(&self) -> Result<(), String> {
        let mut covered = 0usize;
        let mut free_in_phys = 0usize;
        let mut prev: BlockIndex = NULL_INDEX;
        let mut prev_free = false;
        let mut current = self.first;
        let mut steps = 0usize;

        while current != NULL_INDEX {
            if steps > self.blocks.len() {
                return Err("physical chain cycle".into());
            }
            steps += 1;

            let block = &self.blocks[current as usize];
            if block.offset != covered {
                return Err(format!(
                    "block at offset {} expected at {}",
                    block.offset, covered
                ));
            }
            if block.size < HEADER_BYTES + MIN_PAYLOAD {
                return Err(format!("undersized block at offset {}", block.offset));
            }
            if block.phys_prev != prev {
                return Err(format!("phys_prev mismatch at offset {}", block.offset));
            }
            if block.free && prev_free {
                return Err(format!("adjacent free blocks at offset {}", block.offset));
            }
            if !block.free && (block.id == 0 || !self.id_to_block.contains_key(&block.id)) {
                return Err(format!("allocated block at offset {} unmapped", block.offset));
            }
            if block.free {
                free_in_phys += 1;
            }

            covered += block.size;
            prev_free = block.free;
            prev = current;
            current = block.phys_next;
        }

        if covered != self.total_size {
            return Err(format!(
                "tiling covers {covered} of {} bytes",
                self.total_size
            ));
        }

        let mut free_in_list = 0usize;
        let mut list_prev: BlockIndex = NULL_INDEX;
        let mut current = self.free_head;
        while current != NULL_INDEX {
            if free_in_list > self.blocks.len() {
                return Err("free list cycle".into());
            }
            let block = &self.blocks[current as usize];
            if !block.free {
                return Err(format!(
                    "allocated block at offset {} on free list",
                    block.offset
                ));
            }
            if block.free_prev != list_prev {
                return Err(format!("free_prev mismatch at offset {}", block.offset));
            }
            free_in_list += 1;
            list_prev = current;
            current = block.free_next;
        }

        if free_in_list != free_in_phys {
            return Err(format!(
                "free list holds {free_in_list} blocks, physical walk found {free_in_phys}"
            ));
        }
        if self.id_to_block.len() != self.id_to_request.len()
            || self.id_to_block.len() != self.addr_to_block.len()
        {
            return Err("index maps out of sync".into());
        }

        Ok(())
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("total_size", &self.total_size)
            .field("strategy", &self.strategy)
            .field("live_blocks", &self.id_to_block.len())
            .field("used_bytes", &self.used_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena(size: usize) -> Arena {
        Arena::new(size, PlacementStrategy::FirstFit).unwrap()
    }

    #[test]
    fn test_new_single_free_block() {
        let a = arena(1024);
        let blocks = a.all_blocks();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].is_free);
        assert_eq!(blocks[0].size, 1024);
        assert_eq!(a.free_bytes(), 1024);
        assert_eq!(a.used_bytes(), 0);
        a.audit().unwrap();
    }

    #[test]
    fn test_too_small_rejected() {
        let err =
            Arena::new(HEADER_BYTES + MIN_PAYLOAD - 1, PlacementStrategy::FirstFit).unwrap_err();
        assert!(matches!(err, AllocError::ArenaTooSmall { .. }));
    }

    #[test]
    fn test_zero_size_fails() {
        let mut a = arena(1024);
        assert_eq!(a.allocate(0), Err(AllocError::ZeroSize));
        assert_eq!(a.failure_count(), 1);
        assert_eq!(a.success_count(), 0);
    }

    #[test]
    fn test_allocate_reports_payload_address() {
        let mut a = arena(1024);
        let alloc = a.allocate(100).unwrap();
        assert_eq!(alloc.id, 1);
        assert_eq!(alloc.address, HEADER_BYTES);
        assert_eq!(alloc.payload, 100);
        assert_eq!(a.used_bytes(), 100 + HEADER_BYTES);
        a.audit().unwrap();
    }

    #[test]
    fn test_ids_are_fresh_and_nonzero() {
        let mut a = arena(1024);
        let first = a.allocate(100).unwrap();
        a.release(first.id).unwrap();
        let second = a.allocate(100).unwrap();
        assert_ne!(second.id, first.id);
        assert_ne!(second.id, 0);
    }

    #[test]
    fn test_split_leaves_free_remainder() {
        let mut a = arena(1024);
        a.allocate(100).unwrap();
        let blocks = a.all_blocks();
        assert_eq!(blocks.len(), 2);
        assert!(!blocks[0].is_free);
        assert_eq!(blocks[0].size, 100 + HEADER_BYTES);
        assert!(blocks[1].is_free);
        assert_eq!(blocks[1].size, 1024 - 100 - HEADER_BYTES);
        a.audit().unwrap();
    }

    #[test]
    fn test_no_split_below_threshold() {
        // Remainder would be 39 bytes, one short of HEADER_BYTES + MIN_PAYLOAD
        let mut a = arena(1024);
        let alloc = a.allocate(1024 - HEADER_BYTES - 39).unwrap();
        assert_eq!(a.all_blocks().len(), 1);
        assert_eq!(alloc.payload, 1024 - HEADER_BYTES);
        assert!(a.internal_fragmentation() > 0.0);
        a.audit().unwrap();
    }

    #[test]
    fn test_split_at_exact_threshold() {
        // Remainder of exactly HEADER_BYTES + MIN_PAYLOAD splits
        let mut a = arena(1024);
        a.allocate(1024 - 2 * HEADER_BYTES - MIN_PAYLOAD).unwrap();
        let blocks = a.all_blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].size, HEADER_BYTES + MIN_PAYLOAD);
        assert!(blocks[1].is_free);
        a.audit().unwrap();
    }

    #[test]
    fn test_exact_fit_succeeds() {
        let mut a = arena(1024);
        let alloc = a.allocate(1024 - HEADER_BYTES).unwrap();
        assert_eq!(alloc.payload, 1024 - HEADER_BYTES);
        assert_eq!(a.free_bytes(), 0);
        assert_eq!(a.largest_free_block(), 0);
        assert!(matches!(
            a.allocate(1),
            Err(AllocError::OutOfSpace { requested: 1 })
        ));
        a.audit().unwrap();
    }

    #[test]
    fn test_release_coalesces_both_sides() {
        let mut a = arena(1024);
        let b1 = a.allocate(100).unwrap();
        let b2 = a.allocate(100).unwrap();
        let b3 = a.allocate(100).unwrap();

        a.release(b1.id).unwrap();
        a.release(b3.id).unwrap();
        a.audit().unwrap();
        // b2 keeps the two free regions apart
        assert_eq!(a.all_blocks().len(), 3);

        a.release(b2.id).unwrap();
        let blocks = a.all_blocks();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].is_free);
        assert_eq!(blocks[0].size, 1024);
        a.audit().unwrap();
    }

    #[test]
    fn test_release_middle_then_neighbors() {
        let mut a = arena(1024);
        let b1 = a.allocate(100).unwrap();
        let b2 = a.allocate(100).unwrap();
        let b3 = a.allocate(100).unwrap();

        a.release(b2.id).unwrap();
        a.release(b1.id).unwrap();
        a.release(b3.id).unwrap();

        let blocks = a.all_blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].size, 1024);
        a.audit().unwrap();
    }

    #[test]
    fn test_unknown_and_double_free() {
        let mut a = arena(1024);
        let alloc = a.allocate(100).unwrap();
        assert_eq!(a.release(999), Err(AllocError::UnknownHandle(999)));
        assert!(a.release(alloc.id).is_ok());
        assert_eq!(a.release(alloc.id), Err(AllocError::DoubleFree(alloc.id)));
        assert_eq!(a.release(0), Err(AllocError::UnknownHandle(0)));
    }

    #[test]
    fn test_release_by_address() {
        let mut a = arena(1024);
        let alloc = a.allocate(100).unwrap();
        assert_eq!(
            a.release_by_address(alloc.address + 1),
            Err(AllocError::InvalidAddress(alloc.address + 1))
        );
        assert_eq!(a.release_by_address(alloc.address), Ok(alloc.id));
        assert_eq!(
            a.release_by_address(alloc.address),
            Err(AllocError::InvalidAddress(alloc.address))
        );
        a.audit().unwrap();
    }

    #[test]
    fn test_first_fit_takes_traversal_order() {
        let mut a = arena(1024);
        let b1 = a.allocate(100).unwrap();
        a.allocate(100).unwrap();
        let b3 = a.allocate(100).unwrap();
        a.allocate(100).unwrap();
        // Non-adjacent holes so nothing coalesces
        a.release(b1.id).unwrap();
        a.release(b3.id).unwrap();
        // Free list is LIFO: b3's hole is at the head
        let alloc = a.allocate(50).unwrap();
        assert_eq!(alloc.address, b3.address);
        a.audit().unwrap();
    }

    /// Two holes of different sizes and no free tail.
    fn two_hole_arena() -> (Arena, Allocation, Allocation) {
        let mut a = arena(2048);
        let small = a.allocate(100).unwrap();
        a.allocate(50).unwrap();
        let large = a.allocate(500).unwrap();
        a.allocate(50).unwrap();
        // Consume the tail exactly so only the two holes remain free
        let tail = a.largest_free_block();
        a.allocate(tail - HEADER_BYTES).unwrap();
        a.release(small.id).unwrap();
        a.release(large.id).unwrap();
        (a, small, large)
    }

    #[test]
    fn test_best_fit_picks_smallest_hole() {
        let (mut a, small, _large) = two_hole_arena();
        a.set_strategy(PlacementStrategy::BestFit);
        let alloc = a.allocate(50).unwrap();
        assert_eq!(alloc.address, small.address);
        a.audit().unwrap();
    }

    #[test]
    fn test_worst_fit_picks_largest_hole() {
        let (mut a, _small, large) = two_hole_arena();
        a.set_strategy(PlacementStrategy::WorstFit);
        let alloc = a.allocate(50).unwrap();
        assert_eq!(alloc.address, large.address);
        a.audit().unwrap();
    }

    #[test]
    fn test_internal_fragmentation_formula() {
        let mut a = arena(1024);
        // Forces a no-split grant: payload 992 for a 953-byte request
        a.allocate(1024 - HEADER_BYTES - 39).unwrap();
        let granted = (1024 - HEADER_BYTES) as f64;
        let requested = (1024 - HEADER_BYTES - 39) as f64;
        let expected = (granted - requested) / granted * 100.0;
        assert!((a.internal_fragmentation() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_external_fragmentation_two_holes() {
        let mut a = arena(1024);
        let b1 = a.allocate(100).unwrap();
        a.allocate(100).unwrap();
        let b3 = a.allocate(100).unwrap();
        a.release(b1.id).unwrap();
        a.release(b3.id).unwrap();

        // Hole payloads: 100 at offset 0, and the coalesced tail
        let tail = 1024 - 3 * (100 + HEADER_BYTES);
        let hole_a = 100usize;
        let hole_b = 100 + tail;
        let expected = ((hole_a + hole_b - hole_a.max(hole_b)) as f64 / 1024.0) * 100.0;
        assert!((a.external_fragmentation() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_empty_and_full() {
        let mut a = arena(1024);
        assert_eq!(a.internal_fragmentation(), 0.0);
        assert_eq!(a.utilization(), 0.0);
        a.allocate(1024 - HEADER_BYTES).unwrap();
        assert_eq!(a.external_fragmentation(), 0.0);
        assert_eq!(a.utilization(), 100.0);
    }

    #[test]
    fn test_block_info() {
        let mut a = arena(1024);
        let alloc = a.allocate(64).unwrap();
        let info = a.block_info(alloc.id).unwrap();
        assert!(!info.is_free);
        assert_eq!(info.address, alloc.address);
        assert_eq!(info.payload, 64);
        assert!(info.address < 1024);
        assert!(a.block_info(999).is_none());
    }

    #[test]
    fn test_dump_format() {
        let mut a = arena(1024);
        a.allocate(100).unwrap();
        let lines = a.dump();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "[0x00000000 - 0x00000083] USED (id=1, size=100 bytes)"
        );
        assert_eq!(lines[1], "[0x00000084 - 0x000003ff] FREE");
    }

    #[test]
    fn test_slab_slot_recycling() {
        let mut a = arena(4096);
        for _ in 0..8 {
            let ids: Vec<u64> = (0..10).map(|_| a.allocate(64).unwrap().id).collect();
            for id in ids {
                a.release(id).unwrap();
            }
            a.audit().unwrap();
        }
        assert_eq!(a.all_blocks().len(), 1);
    }
}
