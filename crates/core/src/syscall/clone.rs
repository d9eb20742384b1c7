//! `clone` argument parsing and the child strand's initial register setup.
//!
//! Only the thread-creation shape glibc's `pthread_create` actually emits is
//! supported: a private child stack and TLS pointer, no `vfork`-style
//! address-space sharing tricks. The host thread itself is spawned by the
//! hart controller, which owns the parent/child handshake; this module only
//! knows how to read the syscall's arguments and build the child's register
//! file.

use crate::common::regfile::RegisterFile;
use crate::isa::abi::{REG_A0, REG_A1, REG_A2, REG_A3, REG_A4};
use crate::strand::Strand;

/// Stack reserved for every host thread a `clone` spawns, matching Linux's
/// own default pthread guard-adjacent stack size for lightweight workers.
pub const CHILD_STACK_BYTES: usize = 64 * 1024;

/// Decoded `clone(flags, stack, parent_tid, tls, child_tid)` arguments, read
/// off the parent's register file at the `ecall`.
#[derive(Debug, Clone, Copy)]
pub struct CloneArgs {
    /// `CLONE_*` flag bits from `a0`; unexamined, since every call this
    /// proxy accepts behaves like a full `pthread_create` thread.
    pub flags: u64,
    /// Child stack pointer (`a1`).
    pub child_sp: u64,
    /// Address the host writes the parent-visible child TID to (`a2`,
    /// `CLONE_PARENT_SETTID`); `0` if unused.
    pub parent_tid_addr: u64,
    /// Child thread-pointer / TLS base (`a3`).
    pub child_tp: u64,
    /// Address the child clears on exit for `futex`-based join
    /// (`a4`, `CLONE_CHILD_CLEARTID`); `0` if unused.
    pub child_tid_addr: u64,
}

impl CloneArgs {
    /// Reads the five `clone` arguments out of `regs`.
    #[must_use]
    pub fn from_regs(regs: &RegisterFile) -> Self {
        Self {
            flags: regs.read_int(REG_A0),
            child_sp: regs.read_int(REG_A1),
            parent_tid_addr: regs.read_int(REG_A2),
            child_tp: regs.read_int(REG_A3),
            child_tid_addr: regs.read_int(REG_A4),
        }
    }

    /// Builds the child [`Strand`], resuming at `resume_pc` (the instruction
    /// just past the parent's `ecall`) with `tid` as its guest-visible
    /// identity.
    #[must_use]
    pub fn spawn_strand(&self, parent: &RegisterFile, resume_pc: u64, tid: i32) -> Strand {
        Strand::clone_from(parent, resume_pc, self.child_sp, self.child_tp, tid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::abi::REG_A0;

    #[test]
    fn from_regs_reads_the_five_clone_arguments() {
        let mut regs = RegisterFile::new();
        regs.write_int(REG_A0, 0x0001_0f00);
        regs.write_int(REG_A1, 0x7f00_0000);
        regs.write_int(REG_A2, 0x7f00_1000);
        regs.write_int(REG_A3, 0x6000_0000);
        regs.write_int(REG_A4, 0x7f00_2000);
        let args = CloneArgs::from_regs(&regs);
        assert_eq!(args.child_sp, 0x7f00_0000);
        assert_eq!(args.parent_tid_addr, 0x7f00_1000);
        assert_eq!(args.child_tp, 0x6000_0000);
        assert_eq!(args.child_tid_addr, 0x7f00_2000);
    }

    #[test]
    fn spawn_strand_zeroes_child_a0_and_resumes_past_ecall() {
        let mut parent = RegisterFile::new();
        parent.write_int(REG_A0, 99);
        let args = CloneArgs {
            flags: 0,
            child_sp: 0x7f00_0000,
            parent_tid_addr: 0,
            child_tp: 0x6000_0000,
            child_tid_addr: 0,
        };
        let child = args.spawn_strand(&parent, 0x1000, 42);
        assert_eq!(child.regs.read_int(REG_A0), 0);
        assert_eq!(child.pc, 0x1000);
        assert_eq!(child.tid, 42);
    }
}
