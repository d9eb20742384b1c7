//! Error taxonomy for the interpreter.
//!
//! Two families are distinguished:
//! 1. [`GuestError`]: conditions that end the guest process (illegal
//!    instruction, unmapped syscall, a single basic block larger than the
//!    translation cache). These are fatal by construction — the caller
//!    reports them and terminates the offending strand.
//! 2. [`HostError`]: failures in host collaborators (ELF loading, `clone`
//!    resource exhaustion) that the guest can legitimately observe, e.g. as
//!    an errno returned from a syscall.
//!
//! Functional FP exceptions and unaligned loads are *not* represented here:
//! they are surfaced through `fcsr.fflags` and never abort the interpreter.

use std::fmt;

/// A condition that terminates the strand that raised it.
#[derive(Debug, thiserror::Error)]
pub enum GuestError {
    /// The decoder produced `ILLEGAL` or `UNKNOWN` for the instruction at `pc`.
    #[error("illegal instruction {raw:#010x} at pc {pc:#018x}")]
    IllegalInstruction {
        /// Guest program counter of the offending instruction.
        pc: u64,
        /// Raw instruction image (zero-extended if compressed).
        raw: u32,
    },

    /// `ecall` requested a RISC-V syscall number with no entry, or an entry
    /// mapped to a host syscall unsupported on this host.
    #[error("syscall {rvnum} ({name}) has no host mapping")]
    UnmappedSyscall {
        /// RISC-V syscall number from `a7`.
        rvnum: i64,
        /// Symbolic name, or `"?"` if the number itself is out of range.
        name: &'static str,
    },

    /// A single basic block requires more slots than the entire translation
    /// cache arena provides. Unlike ordinary overflow this cannot be cured
    /// by flushing.
    #[error("basic block at {pc:#018x} needs {needed} slots, cache extent is {extent}")]
    BlockExceedsCache {
        /// Starting guest PC of the oversized block.
        pc: u64,
        /// Slots the block draft requires.
        needed: usize,
        /// Total arena extent.
        extent: usize,
    },
}

/// A failure in a host collaborator, reported back to the guest as an
/// errno-shaped value rather than aborting the interpreter.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// `clone`'s underlying `pthread_create`/host `clone` failed.
    #[error("clone failed: {0}")]
    CloneFailed(#[source] std::io::Error),

    /// The ELF loader rejected the binary.
    #[error("elf load failed: {0}")]
    ElfLoad(String),
}

impl HostError {
    /// The negated errno this failure should appear as in `a0` after a
    /// syscall, per the usual Linux convention.
    #[must_use]
    pub fn errno(&self) -> i64 {
        match self {
            Self::CloneFailed(e) => -i64::from(e.raw_os_error().unwrap_or(libc::EAGAIN)),
            Self::ElfLoad(_) => -i64::from(libc::ENOEXEC),
        }
    }
}

/// Formats a guest PC the way diagnostics in this crate consistently do:
/// zero-padded 64-bit hex with a leading `0x`.
#[must_use]
pub fn fmt_pc(pc: u64) -> impl fmt::Display {
    format!("{pc:#018x}")
}
