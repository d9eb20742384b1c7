//! A single translation-cache entry: one decoded basic block.

use crate::isa::Descriptor;

/// Sentinel "no next block" value for [`BlockHeader::link`].
pub const NO_LINK: u32 = u32::MAX;

/// Metadata for one predecoded basic block. The block's instruction bodies
/// live in the descriptor arena at `[slot_start, slot_start + slot_len)`;
/// this header is everything the lookup path needs before touching them.
#[derive(Debug, Clone, Copy)]
pub struct BlockHeader {
    /// Guest PC of the block's first instruction.
    pub pc: u64,
    /// Index of the next header in this hash bucket's chain, or
    /// [`NO_LINK`] at the end of the chain.
    pub link: u32,
    /// Start offset into the descriptor arena.
    pub slot_start: u32,
    /// Number of descriptors (== instructions) in the block.
    pub slot_len: u32,
    /// `true` if the block ends in a conditional branch (two static
    /// successors) rather than a fallthrough/unconditional jump.
    pub is_conditional: bool,
}

impl BlockHeader {
    /// Guest PC one past the block's last instruction, assuming every
    /// descriptor here came from a 4-byte encoding. The tcache tracks the
    /// true per-instruction width separately; this is only used for quick
    /// "does this block already cover `pc`" checks during discovery.
    #[must_use]
    pub fn max_extent(&self, pc: u64) -> u64 {
        pc.max(self.pc + u64::from(self.slot_len) * 4)
    }
}

/// A fully decoded block: a (cheap to clone) copy of its header plus a
/// borrowed view of its body. The header is owned rather than borrowed so
/// callers never hold a reference into the hash index's lock-guarded
/// storage; the body slice borrows directly from the tcache's descriptor
/// arena, which is fixed-size and never reallocated, so that borrow is
/// sound for the tcache's own lifetime.
#[derive(Debug, Clone, Copy)]
pub struct Block<'a> {
    /// Block metadata.
    pub header: BlockHeader,
    /// Predecoded instruction bodies, in execution order.
    pub body: &'a [Descriptor],
    /// Guest byte length each `body` entry consumed, parallel to `body`.
    /// Usually 2 or 4 (RVC vs. a plain encoding); the CAS-substitution
    /// descriptor carries the combined length of the three instructions
    /// (`lr`/`bne`/`sc`) it replaced, so PC arithmetic stays correct across
    /// the fusion.
    pub lens: &'a [u8],
}
