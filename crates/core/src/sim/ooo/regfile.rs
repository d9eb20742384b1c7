//! Unified renaming register file: 64 architectural slots (32 integer, then
//! 32 floating-point, the numbering [`super::unify`] maps a descriptor's raw
//! register fields into), a pool of rename registers drawn from an explicit
//! free-list stack, and a circular store buffer sharing the same busy/uses
//! bookkeeping.
//!
//! A physical register's use count is the number of things currently
//! depending on it: the map-table entry that names it, plus (while it is
//! the undispatched rename target of some in-flight instruction) one
//! pending write. A register is released back to the free list only once
//! its count reaches zero, which is also what
//! [`Self::uses_invariant_holds`] checks from scratch.

use crate::isa::abi::NOREG;

/// 32 integer + 32 floating-point architectural registers.
pub const ARCH_REGS: usize = 64;
/// Extra physical registers available for renaming beyond the 64
/// architectural ones: the issue queue's own depth, plus headroom.
const EXTRA_REGS: usize = 32;
/// Store buffer depth.
pub const STORE_BUFFER_LEN: usize = 8;
/// First physical register number used by the store buffer.
const STORE_BASE: usize = ARCH_REGS + EXTRA_REGS;
const PHYS_TOTAL: usize = STORE_BASE + STORE_BUFFER_LEN;

/// The renaming register file plus its store buffer.
#[derive(Debug)]
pub struct RenamingRegfile {
    map: [u8; ARCH_REGS],
    busy: [bool; PHYS_TOTAL],
    uses: [u32; PHYS_TOTAL],
    freelist: Vec<u8>,
    store_addr: [u64; STORE_BUFFER_LEN],
    store_tail: usize,
}

impl Default for RenamingRegfile {
    fn default() -> Self {
        Self::new()
    }
}

impl RenamingRegfile {
    /// Every architectural register identity-mapped to its own physical
    /// slot, the rename pool entirely free, the store buffer empty.
    #[must_use]
    pub fn new() -> Self {
        let mut map = [0u8; ARCH_REGS];
        let mut uses = [0u32; PHYS_TOTAL];
        for (r, slot) in map.iter_mut().enumerate() {
            *slot = r as u8;
            uses[r] = 1;
        }
        let freelist = (ARCH_REGS as u8..STORE_BASE as u8).rev().collect();
        Self {
            map,
            busy: [false; PHYS_TOTAL],
            uses,
            freelist,
            store_addr: [0; STORE_BUFFER_LEN],
            store_tail: 0,
        }
    }

    fn is_store_buffer(p: u8) -> bool {
        (p as usize) >= STORE_BASE
    }

    /// The physical register currently backing architectural register `r`.
    #[must_use]
    pub fn map(&self, r: u8) -> u8 {
        if r == NOREG {
            NOREG
        } else {
            self.map[r as usize]
        }
    }

    /// `true` if `p` is the undispatched destination of some in-flight
    /// instruction (a consumer naming it as a source must stall).
    #[must_use]
    pub fn busy(&self, p: u8) -> bool {
        p != NOREG && self.busy[p as usize]
    }

    /// Current reference count, used only by [`Self::uses_invariant_holds`].
    #[must_use]
    pub fn uses(&self, p: u8) -> u32 {
        if p == NOREG {
            0
        } else {
            self.uses[p as usize]
        }
    }

    /// `true` if the rename pool has no free physical register left.
    #[must_use]
    pub fn no_free_reg(&self) -> bool {
        self.freelist.is_empty()
    }

    /// Adds one dependent to `p`'s use count (a map entry, a queued source
    /// reference, or a store-buffer disambiguation dependency).
    pub fn acquire_reg(&mut self, p: u8) {
        if p != NOREG {
            self.uses[p as usize] += 1;
        }
    }

    /// Removes one dependent; once the count reaches zero the register is
    /// no longer busy and, if it isn't a store-buffer slot, rejoins the
    /// free list.
    pub fn release_reg(&mut self, p: u8) {
        if p == NOREG {
            return;
        }
        let idx = p as usize;
        debug_assert!(self.uses[idx] > 0, "release of physreg {p} with zero uses");
        self.uses[idx] -= 1;
        if self.uses[idx] == 0 {
            self.busy[idx] = false;
            if !Self::is_store_buffer(p) {
                self.freelist.push(p);
            }
        }
    }

    /// Marks `p`'s value as produced; a consumer stalled on its busy bit
    /// may now proceed (its use count is released separately once it
    /// actually reads the value).
    pub fn value_is_ready(&mut self, p: u8) {
        if p != NOREG {
            self.busy[p as usize] = false;
        }
    }

    /// Renames architectural register `arch` to a freshly popped physical
    /// register, releasing the old mapping's map-table reference and
    /// marking the new one busy until its producer retires.
    ///
    /// # Panics
    ///
    /// Panics if the free list is empty; callers must check
    /// [`Self::no_free_reg`] before attempting to dispatch.
    pub fn rename_reg(&mut self, arch: u8) -> u8 {
        if arch == NOREG {
            return NOREG;
        }
        self.release_reg(self.map[arch as usize]);
        let p = self.freelist.pop().expect("free list checked before rename");
        self.acquire_reg(p);
        self.map[arch as usize] = p;
        self.acquire_reg(p);
        self.busy[p as usize] = true;
        p
    }

    fn stbuf_at(&self, k: usize) -> u8 {
        (STORE_BASE + (self.store_tail + STORE_BUFFER_LEN - k) % STORE_BUFFER_LEN) as u8
    }

    /// The store buffer slot a new store would claim.
    #[must_use]
    pub fn store_buffer_full(&self) -> bool {
        self.uses[self.stbuf_at(0) as usize] > 0
    }

    /// Claims the next store buffer slot for a store to `addr`, marking it
    /// busy until the store's value is written to memory.
    ///
    /// # Panics
    ///
    /// Panics if the store buffer is full; callers must check
    /// [`Self::store_buffer_full`] first.
    pub fn allocate_store_buffer(&mut self, addr: u64) -> u8 {
        assert!(!self.store_buffer_full(), "store buffer full");
        let n = self.stbuf_at(0);
        self.store_tail = (self.store_tail + 1) % STORE_BUFFER_LEN;
        self.acquire_reg(n);
        self.busy[n as usize] = true;
        self.store_addr[n as usize - STORE_BASE] = addr;
        n
    }

    /// Searches the store buffer (skipping the entry being allocated this
    /// cycle) for an in-flight store to `addr`, returning its physical
    /// register as a dependency if found. Used both to order a new store
    /// behind an earlier one to the same address and to detect a load's
    /// read-after-write hazard against an unretired store.
    pub fn check_store_buffer(&mut self, addr: u64) -> u8 {
        for k in 1..STORE_BUFFER_LEN {
            let r = self.stbuf_at(k);
            if self.busy[r as usize] && self.store_addr[r as usize - STORE_BASE] == addr {
                self.acquire_reg(r);
                return r;
            }
        }
        NOREG
    }

    /// Recomputes every physical register's use count from first
    /// principles — the map table and the store buffer/rename busy bits,
    /// nothing else known to this type — and checks it against the
    /// incrementally maintained count. A violation means some
    /// acquire/release call site is unbalanced; this is the renaming
    /// invariant [`super::OooCore`]'s verify mode checks at retirement.
    #[must_use]
    pub fn uses_invariant_holds(&self) -> bool {
        let mut floor = [0u32; PHYS_TOTAL];
        for &p in &self.map {
            floor[p as usize] += 1;
        }
        for p in ARCH_REGS..PHYS_TOTAL {
            if self.busy[p] {
                floor[p] += 1;
            }
        }
        (0..PHYS_TOTAL).all(|p| floor[p] <= self.uses[p])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_mapped_at_reset() {
        let regs = RenamingRegfile::new();
        for r in 0..ARCH_REGS as u8 {
            assert_eq!(regs.map(r), r);
            assert!(!regs.busy(r));
        }
    }

    #[test]
    fn rename_reg_pops_a_free_physical_register_and_marks_it_busy() {
        let mut regs = RenamingRegfile::new();
        let p = regs.rename_reg(5);
        assert!(p >= ARCH_REGS as u8);
        assert!(regs.busy(p));
        assert_eq!(regs.map(5), p);
    }

    #[test]
    fn release_to_zero_frees_the_register_for_reuse() {
        let mut regs = RenamingRegfile::new();
        let p = regs.rename_reg(5);
        assert_eq!(regs.uses(p), 2, "one for the map entry, one for the pending write");
        regs.value_is_ready(p);
        regs.release_reg(p); // the instruction's own reference
        assert_eq!(regs.uses(p), 1, "the map-table reference survives retirement");
        assert!(!regs.busy(p));
        regs.rename_reg(5); // remaps register 5 away from p, dropping its last use
        assert_eq!(regs.uses(p), 0);
    }

    #[test]
    fn no_free_reg_reports_true_once_the_pool_is_exhausted() {
        let mut regs = RenamingRegfile::new();
        for r in 0..EXTRA_REGS as u8 {
            regs.rename_reg(r % 63);
        }
        assert!(regs.no_free_reg());
    }

    #[test]
    fn store_buffer_full_after_capacity_allocations() {
        let mut regs = RenamingRegfile::new();
        for addr in 0..STORE_BUFFER_LEN as u64 {
            assert!(!regs.store_buffer_full());
            regs.allocate_store_buffer(addr * 8);
        }
        assert!(regs.store_buffer_full());
    }

    #[test]
    fn check_store_buffer_finds_a_prior_store_to_the_same_address() {
        let mut regs = RenamingRegfile::new();
        let first = regs.allocate_store_buffer(0x1000);
        regs.allocate_store_buffer(0x2000);
        let dep = regs.check_store_buffer(0x1000);
        assert_eq!(dep, first);
    }

    #[test]
    fn uses_invariant_holds_after_a_clean_rename_and_release() {
        let mut regs = RenamingRegfile::new();
        let p = regs.rename_reg(5);
        assert!(regs.uses_invariant_holds());
        regs.value_is_ready(p);
        regs.release_reg(p);
        assert!(regs.uses_invariant_holds());
    }
}
