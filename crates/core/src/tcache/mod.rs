//! The translation cache: discovers basic blocks from guest memory, predecodes
//! them once into [`Descriptor`] runs, and indexes them by starting PC so
//! every strand sharing a hart's tcache can reuse the work.

pub mod block;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::common::error::GuestError;
use crate::common::memory::FlatMemory;
use crate::isa::abi::NOREG;
use crate::isa::attributes::{attributes, BlockEnd};
use crate::isa::opcodes::Op;
use crate::isa::{decode_one, Descriptor};

pub use block::{Block, BlockHeader, NO_LINK};

/// Identifies one block's header by its index into `headers`.
pub type BlockId = u32;

struct Index {
    headers: Vec<BlockHeader>,
    buckets: Vec<u32>,
}

impl Index {
    fn new(hash_buckets: usize) -> Self {
        Self {
            headers: Vec::new(),
            buckets: vec![NO_LINK; hash_buckets.max(1)],
        }
    }

    fn bucket_of(&self, pc: u64) -> usize {
        (pc as usize >> 1) % self.buckets.len()
    }

    fn find(&self, pc: u64) -> Option<BlockId> {
        let mut cur = self.buckets[self.bucket_of(pc)];
        while cur != NO_LINK {
            let header = &self.headers[cur as usize];
            if header.pc == pc {
                return Some(cur);
            }
            cur = header.link;
        }
        None
    }

    fn insert(&mut self, header: BlockHeader) -> BlockId {
        let bucket = self.bucket_of(header.pc);
        let id = self.headers.len() as u32;
        let mut header = header;
        header.link = self.buckets[bucket];
        self.headers.push(header);
        self.buckets[bucket] = id;
        id
    }

    fn clear(&mut self) {
        self.headers.clear();
        for b in &mut self.buckets {
            *b = NO_LINK;
        }
    }
}

/// A hash-chained, bump-allocated cache of predecoded basic blocks.
///
/// Multiple strands on the same hart (and, for now, across harts —
/// discovery is idempotent: redundantly decoding a block a second time is
/// wasted work, not a correctness problem) share one `TranslationCache`
/// through shared `&` access; the critical section inside `insert` is kept
/// short so contention stays low under concurrent discovery.
pub struct TranslationCache {
    descriptors: Box<[Descriptor]>,
    /// Guest byte length each `descriptors` slot consumed; kept as a
    /// parallel arena rather than folded into `Descriptor` so the latter
    /// stays at its fixed 8-byte width.
    lens: Box<[u8]>,
    tail: AtomicUsize,
    index: Mutex<Index>,
}

impl TranslationCache {
    /// Builds a tcache with `extent` descriptor slots and `hash_buckets`
    /// hash-table rows (both configurable via the CLI).
    #[must_use]
    pub fn new(extent: usize, hash_buckets: usize) -> Self {
        Self {
            descriptors: vec![Descriptor::default(); extent].into_boxed_slice(),
            lens: vec![0u8; extent].into_boxed_slice(),
            tail: AtomicUsize::new(0),
            index: Mutex::new(Index::new(hash_buckets)),
        }
    }

    /// Looks up an already-discovered block starting at `pc`.
    #[must_use]
    pub fn lookup(&self, pc: u64) -> Option<Block<'_>> {
        let header = {
            let index = self
                .index
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let id = index.find(pc)?;
            index.headers[id as usize]
        };
        Some(self.block_for(header))
    }

    /// Builds a [`Block`] view for an already-resolved header. Safe because
    /// the body slice borrows `self.descriptors` directly rather than data
    /// behind `self.index`'s lock: the descriptor arena is a fixed-size
    /// allocation that outlives every block handed out from it.
    fn block_for(&self, header: BlockHeader) -> Block<'_> {
        let start = header.slot_start as usize;
        let end = start + header.slot_len as usize;
        Block {
            header,
            body: &self.descriptors[start..end],
            lens: &self.lens[start..end],
        }
    }

    /// Finds the block starting at `pc`, discovering and predecoding it
    /// from `mem` first if the tcache has never seen it.
    ///
    /// # Errors
    ///
    /// Returns [`GuestError::BlockExceedsCache`] if the block's body alone
    /// would not fit in an entirely empty arena (flushing cannot help);
    /// returns `Ok(None)` if the arena is full but flushing would allow the
    /// block to fit — the caller should flush and retry.
    pub fn get_or_discover(
        &self,
        pc: u64,
        mem: &FlatMemory,
    ) -> Result<Option<Block<'_>>, GuestError> {
        if let Some(block) = self.lookup(pc) {
            return Ok(Some(block));
        }
        let mut draft = discover_block(pc, mem);
        substitute_cas(&mut draft);

        if draft.descriptors.len() > self.descriptors.len() {
            return Err(GuestError::BlockExceedsCache {
                pc,
                needed: draft.descriptors.len(),
                extent: self.descriptors.len(),
            });
        }

        let start = match self.bump(draft.descriptors.len()) {
            Some(start) => start,
            None => return Ok(None),
        };
        // SAFETY: `start..start+len` was just reserved exclusively by this
        // thread's `bump`, and no other thread writes into that range (the
        // arena only grows via `bump`, never shrinks except on `flush`,
        // which the caller serializes against other strands).
        let slots = unsafe {
            std::slice::from_raw_parts_mut(
                self.descriptors.as_ptr().add(start).cast_mut(),
                draft.descriptors.len(),
            )
        };
        slots.copy_from_slice(&draft.descriptors);
        // SAFETY: same reasoning as the `descriptors` copy above; `lens` is
        // the same fixed-size, `start`-exclusive arena shape.
        let len_slots = unsafe {
            std::slice::from_raw_parts_mut(self.lens.as_ptr().add(start).cast_mut(), draft.lens.len())
        };
        len_slots.copy_from_slice(&draft.lens);

        let header = BlockHeader {
            pc,
            link: NO_LINK,
            slot_start: start as u32,
            slot_len: draft.descriptors.len() as u32,
            is_conditional: draft.is_conditional,
        };
        let mut index = self
            .index
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        // Another strand may have discovered and inserted the same block
        // while this thread was decoding; the loser's slots are simply
        // abandoned (reclaimed on the next flush) rather than reused.
        let winning_header = match index.find(pc) {
            Some(existing) => index.headers[existing as usize],
            None => {
                index.insert(header);
                header
            }
        };
        drop(index);
        Ok(Some(self.block_for(winning_header)))
    }

    fn bump(&self, n: usize) -> Option<usize> {
        let mut cur = self.tail.load(Ordering::Relaxed);
        loop {
            let next = cur.checked_add(n)?;
            if next > self.descriptors.len() {
                return None;
            }
            match self
                .tail
                .compare_exchange_weak(cur, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return Some(cur),
                Err(observed) => cur = observed,
            }
        }
    }

    /// Discards every discovered block and resets the arena. Callers must
    /// ensure no other strand is concurrently discovering or executing out
    /// of this tcache while `flush` runs (the hart controller quiesces all
    /// strands sharing a tcache before calling this).
    pub fn flush(&self) {
        self.index
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
        self.tail.store(0, Ordering::SeqCst);
    }

    /// Total descriptor slots in the arena.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.descriptors.len()
    }

    /// Slots currently in use.
    #[must_use]
    pub fn used(&self) -> usize {
        self.tail.load(Ordering::Relaxed)
    }
}

struct Draft {
    descriptors: Vec<Descriptor>,
    /// Guest byte length of each entry in `descriptors`, kept in lockstep.
    lens: Vec<u8>,
    is_conditional: bool,
}

/// Walks guest memory from `pc`, decoding one instruction at a time, until
/// hitting a control-transfer instruction (the end of a basic block) or a
/// serializing one (`ecall`/`ebreak`/the `amo`/`lr`/`sc` family), which must
/// stand alone as a singleton block: encountered first, it ends its own
/// block; encountered after other instructions, it is left for the next
/// block's discovery instead of being folded into this one.
fn discover_block(pc: u64, mem: &FlatMemory) -> Draft {
    let mut descriptors = Vec::new();
    let mut lens = Vec::new();
    let mut addr = pc;
    loop {
        let parcel = mem.fetch_parcel(addr);
        let (desc, len) = decode_one(parcel, || mem.fetch_parcel(addr + 2));
        let attrs = attributes(desc.op);
        let serializes = attrs.is_system || attrs.is_atomic;

        if serializes && !descriptors.is_empty() {
            return Draft {
                descriptors,
                lens,
                is_conditional: false,
            };
        }

        descriptors.push(desc);
        lens.push(len);
        addr += u64::from(len);

        if serializes || desc.op.is_fatal_decode() {
            return Draft {
                descriptors,
                lens,
                is_conditional: false,
            };
        }
        match attrs.block_end {
            BlockEnd::None => {}
            BlockEnd::Conditional => {
                return Draft {
                    descriptors,
                    lens,
                    is_conditional: true,
                };
            }
            BlockEnd::Unconditional => {
                return Draft {
                    descriptors,
                    lens,
                    is_conditional: false,
                };
            }
        }
    }
}

/// Recognizes the `lr.w`/`bne`/`sc.w` (or `.d`) idiom this crate's
/// lock-free data structures compile down to and replaces it with a single
/// `cas.w`/`cas.d` pseudo-op, avoiding a branch mispredict and a redundant
/// reservation round-trip on every successful CAS. Only fires when the
/// `bne` target is exactly the instruction after the `sc` — any other
/// shape keeps the three instructions as written.
fn substitute_cas(draft: &mut Draft) {
    let n = draft.descriptors.len();
    if n < 3 {
        return;
    }
    for i in 0..n - 2 {
        let (lr, bne, sc) = (draft.descriptors[i], draft.descriptors[i + 1], draft.descriptors[i + 2]);
        let is64 = match lr.op {
            Op::LrW => false,
            Op::LrD => true,
            _ => continue,
        };
        if bne.op != Op::Bne {
            continue;
        }
        let sc_matches = match (is64, sc.op) {
            (false, Op::ScW) => true,
            (true, Op::ScD) => true,
            _ => false,
        };
        if !sc_matches {
            continue;
        }
        let (bne_rs2, _, bne_imm) = bne.reg_form();
        // bne's first operand must compare the value sc wrote its success
        // flag into, and its branch target must land just past the sc.
        if bne_rs2 != sc.rd || i64::from(bne_imm) != 4 {
            continue;
        }
        let (sc_rs2, _, _) = sc.reg_form();
        let cas_op = if is64 { Op::CasD } else { Op::CasW };
        let fused_len = draft.lens[i]
            .saturating_add(draft.lens[i + 1])
            .saturating_add(draft.lens[i + 2]);
        draft.descriptors[i] = Descriptor::with_reg_form(cas_op, sc.rd, lr.rs1, sc_rs2, NOREG, 0);
        draft.lens[i] = fused_len;
        draft.descriptors.remove(i + 2);
        draft.descriptors.remove(i + 1);
        draft.lens.remove(i + 2);
        draft.lens.remove(i + 1);
        break;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_addi(rd: u8, rs1: u8, imm: i32) -> u32 {
        ((imm as u32) << 20) | (u32::from(rs1) << 15) | (u32::from(rd) << 7) | 0x13
    }

    fn write_word(mem: &FlatMemory, addr: u64, word: u32) {
        mem.write_bytes(addr, &word.to_le_bytes()).unwrap();
    }

    #[test]
    fn discovers_straight_line_block_up_to_branch() {
        let mem = FlatMemory::new(4096).unwrap();
        write_word(&mem, 0, encode_addi(1, 0, 1));
        write_word(&mem, 4, encode_addi(2, 0, 2));
        // beq x0, x0, 0 terminates the block
        write_word(&mem, 8, 0x0000_0063);
        let tcache = TranslationCache::new(1024, 64);
        let block = tcache.get_or_discover(0, &mem).unwrap().unwrap();
        assert_eq!(block.body.len(), 3);
        assert!(block.header.is_conditional);
    }

    #[test]
    fn repeated_lookup_reuses_the_same_block() {
        let mem = FlatMemory::new(4096).unwrap();
        write_word(&mem, 0, 0x0000_0063); // beq x0, x0, 0
        let tcache = TranslationCache::new(1024, 64);
        let first = tcache.get_or_discover(0, &mem).unwrap().unwrap();
        let second = tcache.get_or_discover(0, &mem).unwrap().unwrap();
        assert_eq!(first.header.slot_start, second.header.slot_start);
        assert_eq!(tcache.used(), 1);
    }

    #[test]
    fn flush_resets_the_arena() {
        let mem = FlatMemory::new(4096).unwrap();
        write_word(&mem, 0, 0x0000_0063);
        let tcache = TranslationCache::new(1024, 64);
        tcache.get_or_discover(0, &mem).unwrap();
        assert_eq!(tcache.used(), 1);
        tcache.flush();
        assert_eq!(tcache.used(), 0);
        assert!(tcache.lookup(0).is_none());
    }

    #[test]
    fn oversized_block_reports_block_exceeds_cache() {
        let mem = FlatMemory::new(8192).unwrap();
        for i in 0..20u64 {
            write_word(&mem, i * 4, encode_addi(1, 0, 1));
        }
        write_word(&mem, 80, 0x0000_0063);
        let tcache = TranslationCache::new(4, 4);
        let err = tcache.get_or_discover(0, &mem).unwrap_err();
        assert!(matches!(err, GuestError::BlockExceedsCache { .. }));
    }
}
