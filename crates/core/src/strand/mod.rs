//! A strand: one guest thread's architectural state and its basic-block
//! dispatch loop.
//!
//! A strand is a single schedulable guest execution context — what Linux
//! calls a thread. Each strand owns a [`RegisterFile`], a program counter,
//! and the identity (host TID, guest `clone` TID) the syscall proxy and
//! hart controller use to address it; the actual instruction bodies it
//! executes live in the
//! [`crate::tcache::TranslationCache`] shared with every other strand on
//! its hart.

pub mod atomics;
pub mod fp;
pub mod interpreter;

pub use interpreter::{run_block, BlockObserver, BlockOutcome, NullObserver, MAX_BLOCK_ADDRS};

use crate::common::regfile::RegisterFile;

/// One guest thread's non-shared state.
#[derive(Debug)]
pub struct Strand {
    /// Architectural register file.
    pub regs: RegisterFile,
    /// Guest program counter.
    pub pc: u64,
    /// Guest-visible thread ID (the value `clone`/`gettid` report), assigned
    /// by the hart controller at spawn time.
    pub tid: i32,
    /// Addresses the most recently executed block touched, reused across
    /// calls to avoid a per-block allocation; bounded at
    /// [`MAX_BLOCK_ADDRS`].
    pub last_addrs: Vec<u64>,
}

impl Strand {
    /// Creates a strand starting execution at `entry` with a freshly zeroed
    /// register file (the caller fills in `sp`/`a0`.. per the ABI before
    /// first dispatch).
    #[must_use]
    pub fn new(entry: u64, tid: i32) -> Self {
        Self {
            regs: RegisterFile::new(),
            pc: entry,
            tid,
            last_addrs: Vec::with_capacity(MAX_BLOCK_ADDRS),
        }
    }

    /// Copies the parent's register file for a `clone`d child, per the
    /// standard Linux thread-creation ABI: the child gets a fresh stack
    /// pointer and TLS pointer, a zero return value in place of the TID
    /// `clone` reports to the parent, and resumes immediately after the
    /// `clone` syscall rather than re-executing it.
    #[must_use]
    pub fn clone_from(parent: &RegisterFile, resume_pc: u64, child_sp: u64, child_tp: u64, tid: i32) -> Self {
        let mut regs = parent.clone();
        regs.xrf[crate::isa::abi::REG_SP as usize] = child_sp;
        regs.xrf[crate::isa::abi::REG_TP as usize] = child_tp;
        regs.xrf[crate::isa::abi::REG_A0 as usize] = 0;
        Self {
            regs,
            pc: resume_pc,
            tid,
            last_addrs: Vec::with_capacity(MAX_BLOCK_ADDRS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_from_zeroes_child_return_value() {
        let mut parent = RegisterFile::new();
        parent.xrf[crate::isa::abi::REG_A0 as usize] = 99;
        let child = Strand::clone_from(&parent, 0x1000, 0x7fff_0000, 0x6000_0000, 42);
        assert_eq!(child.regs.read_int(crate::isa::abi::REG_A0), 0);
        assert_eq!(child.regs.read_int(crate::isa::abi::REG_SP), 0x7fff_0000);
        assert_eq!(child.regs.read_int(crate::isa::abi::REG_TP), 0x6000_0000);
        assert_eq!(child.pc, 0x1000);
        assert_eq!(child.tid, 42);
    }
}
