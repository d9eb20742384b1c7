//! A set-associative instruction-cache timing model, driven off the
//! addresses the strand interpreter actually fetches from.
//!
//! Tag/index split is `addr >> lg_line`, then masked by `rows - 1`; the tag
//! is stored including its index bits, so a row only ever needs to compare
//! against tags that could plausibly hash there. Replacement is LRU, driven
//! by [`fsm::LruFsm`]'s generated transition table rather than a fixed
//! per-associativity one.

pub mod fsm;

use crate::config::CacheGeometry;
use crate::strand::BlockObserver;
use crate::tcache::Block;

use fsm::LruFsm;

struct Row {
    tags: Vec<Option<u64>>,
    state: u16,
}

/// A set-associative cache plus the running reference/miss counters the
/// `--show`-adjacent summary reports at exit.
#[derive(Debug)]
pub struct LruCache {
    fsm: LruFsm,
    rows: Vec<Row>,
    line_log2: u32,
    rows_log2: u32,
    penalty_cycles: u64,
    refs: u64,
    misses: u64,
}

impl std::fmt::Debug for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Row").field("state", &self.state).finish()
    }
}

impl LruCache {
    /// Builds a cache from CLI-configured geometry (`--iways`, `--iline`,
    /// `--irows`, `--dmiss`).
    #[must_use]
    pub fn new(geometry: &CacheGeometry) -> Self {
        let fsm = LruFsm::new(geometry.ways);
        let num_rows = 1usize << geometry.rows_log2;
        let rows = (0..num_rows)
            .map(|_| Row {
                tags: vec![None; geometry.ways],
                state: 0,
            })
            .collect();
        Self {
            fsm,
            rows,
            line_log2: geometry.line_log2,
            rows_log2: geometry.rows_log2,
            penalty_cycles: geometry.dmiss_latency,
            refs: 0,
            misses: 0,
        }
    }

    /// References one address, returning whether it hit.
    pub fn access(&mut self, addr: u64) -> bool {
        self.refs += 1;
        let tag = addr >> self.line_log2;
        let row_mask = (1u64 << self.rows_log2) - 1;
        let index = (tag & row_mask) as usize;
        let row = &mut self.rows[index];

        for &way in self.fsm.probe_order(row.state) {
            if row.tags[way as usize] == Some(tag) {
                row.state = self.fsm.touch(row.state, way as usize);
                return true;
            }
        }

        self.misses += 1;
        let lru_way = self.fsm.lru_way(row.state);
        row.tags[lru_way] = Some(tag);
        row.state = self.fsm.touch(row.state, lru_way as usize);
        false
    }

    /// Total references this cache has seen.
    #[must_use]
    pub fn refs(&self) -> u64 {
        self.refs
    }

    /// Total misses.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Configured miss refill penalty, in cycles.
    #[must_use]
    pub fn penalty_cycles(&self) -> u64 {
        self.penalty_cycles
    }
}

impl BlockObserver for LruCache {
    /// Treats every instruction in the block as one fetch reference, in
    /// program order; data addresses from loads/stores aren't modeled here
    /// (this is the instruction cache — see [`crate::sim::ooo`] for the
    /// memory-port side).
    fn on_block(&mut self, block: &Block<'_>, _addrs: &[u64]) {
        let mut pc = block.header.pc;
        for &len in block.lens.iter() {
            self.access(pc);
            pc += u64::from(len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(ways: usize) -> CacheGeometry {
        CacheGeometry {
            ways,
            line_log2: 6,
            rows_log2: 2,
            dmiss_latency: 30,
        }
    }

    #[test]
    fn first_access_to_any_line_misses() {
        let mut cache = LruCache::new(&geometry(2));
        assert!(!cache.access(0x1000));
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn repeated_access_to_the_same_line_hits() {
        let mut cache = LruCache::new(&geometry(2));
        cache.access(0x1000);
        assert!(cache.access(0x1000));
        assert_eq!(cache.refs(), 2);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn thrashing_a_one_way_set_always_misses() {
        let mut cache = LruCache::new(&geometry(1));
        // Two lines that hash to the same row (line_log2=6, rows_log2=2:
        // row = (addr >> 6) & 3), 4 rows apart so they collide.
        let a = 0x0000u64;
        let b = a + (4 << 6);
        cache.access(a);
        cache.access(b);
        assert!(!cache.access(a), "evicted by b's access");
    }

    #[test]
    fn two_way_set_holds_two_lines_without_thrashing() {
        let mut cache = LruCache::new(&geometry(2));
        let a = 0x0000u64;
        let b = a + (4 << 6);
        cache.access(a);
        cache.access(b);
        assert!(cache.access(a), "both lines fit in a 2-way set");
    }
}
