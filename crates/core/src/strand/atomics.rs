//! Host-atomic emulation of the RISC-V A extension.
//!
//! `lr.{w,d}` reads straight through the host pointer with no reservation
//! taken — weaker than the ISA's strict reservation semantics, but the
//! guarantee glibc's lock-free primitives actually rely on. `sc.{w,d}` is
//! reached only when block discovery's CAS substitution did not fire (see
//! [`super::super::tcache::substitute_cas`]); the substituted `cas.{w,d}`
//! pseudo-op and the AMO family instead use a single host
//! compare-and-swap/read-modify-write, a load-modify-CAS loop built on
//! `AtomicU32`/`AtomicU64`.

use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};

use crate::common::FlatMemory;
use crate::isa::opcodes::Op;

fn ptr32(mem: &FlatMemory, addr: u64) -> *const AtomicI32 {
    mem.as_ptr(addr).cast::<AtomicI32>()
}

fn ptr64(mem: &FlatMemory, addr: u64) -> *const AtomicI64 {
    mem.as_ptr(addr).cast::<AtomicI64>()
}

/// Result of an AMO/LR/SC/CAS: the value written to `rd`, plus whether memory
/// was actually modified (used by the caller to decide whether to record a
/// write in the per-strand address list).
pub struct AtomicResult {
    pub rd_value: u64,
    pub wrote: bool,
}

/// Executes one atomic-family descriptor. `addr` is the already-computed
/// effective address (`rs1`'s value); `rs2_value` is the register operand
/// (ignored for `lr.*`); `compare` is only consulted for `cas.{w,d}` (the
/// expected value the substituted BNE compared against).
#[allow(clippy::too_many_lines)]
pub fn execute(mem: &FlatMemory, op: Op, addr: u64, rs2_value: u64, compare: u64) -> AtomicResult {
    // SAFETY: `addr` was produced by the guest from a register loaded via
    // `lr`/amo-family instructions against `mem`'s mapped region; out-of-range
    // accesses fault the same way a plain load/store would.
    match op {
        Op::LrW => {
            let v = unsafe { (*ptr32(mem, addr)).load(Ordering::SeqCst) };
            AtomicResult { rd_value: i64::from(v) as u64, wrote: false }
        }
        Op::LrD => {
            let v = unsafe { (*ptr64(mem, addr)).load(Ordering::SeqCst) };
            AtomicResult { rd_value: v as u64, wrote: false }
        }
        Op::ScW => {
            let expected = compare as i32;
            let new = rs2_value as i32;
            let ok = unsafe {
                (*ptr32(mem, addr))
                    .compare_exchange(expected, new, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
            };
            AtomicResult { rd_value: u64::from(!ok), wrote: ok }
        }
        Op::ScD => {
            let expected = compare as i64;
            let new = rs2_value as i64;
            let ok = unsafe {
                (*ptr64(mem, addr))
                    .compare_exchange(expected, new, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
            };
            AtomicResult { rd_value: u64::from(!ok), wrote: ok }
        }
        Op::CasW => {
            let expected = compare as i32;
            let new = rs2_value as i32;
            let old = unsafe {
                (*ptr32(mem, addr))
                    .compare_exchange(expected, new, Ordering::SeqCst, Ordering::SeqCst)
                    .unwrap_or_else(|actual| actual)
            };
            AtomicResult { rd_value: i64::from(old) as u64, wrote: old == expected }
        }
        Op::CasD => {
            let expected = compare as i64;
            let new = rs2_value as i64;
            let old = unsafe {
                (*ptr64(mem, addr))
                    .compare_exchange(expected, new, Ordering::SeqCst, Ordering::SeqCst)
                    .unwrap_or_else(|actual| actual)
            };
            AtomicResult { rd_value: old as u64, wrote: old == expected }
        }
        Op::AmoswapW => amo32(mem, addr, |_old| rs2_value as i32),
        Op::AmoaddW => amo32(mem, addr, |old| old.wrapping_add(rs2_value as i32)),
        Op::AmoxorW => amo32(mem, addr, |old| old ^ rs2_value as i32),
        Op::AmoandW => amo32(mem, addr, |old| old & rs2_value as i32),
        Op::AmoorW => amo32(mem, addr, |old| old | rs2_value as i32),
        Op::AmominW => amo32(mem, addr, |old| old.min(rs2_value as i32)),
        Op::AmomaxW => amo32(mem, addr, |old| old.max(rs2_value as i32)),
        Op::AmominuW => amo32(mem, addr, |old| {
            (old as u32).min(rs2_value as u32) as i32
        }),
        Op::AmomaxuW => amo32(mem, addr, |old| {
            (old as u32).max(rs2_value as u32) as i32
        }),
        Op::AmoswapD => amo64(mem, addr, |_old| rs2_value as i64),
        Op::AmoaddD => amo64(mem, addr, |old| old.wrapping_add(rs2_value as i64)),
        Op::AmoxorD => amo64(mem, addr, |old| old ^ rs2_value as i64),
        Op::AmoandD => amo64(mem, addr, |old| old & rs2_value as i64),
        Op::AmoorD => amo64(mem, addr, |old| old | rs2_value as i64),
        Op::AmominD => amo64(mem, addr, |old| old.min(rs2_value as i64)),
        Op::AmomaxD => amo64(mem, addr, |old| old.max(rs2_value as i64)),
        Op::AmominuD => amo64(mem, addr, |old| (old as u64).min(rs2_value) as i64),
        Op::AmomaxuD => amo64(mem, addr, |old| (old as u64).max(rs2_value) as i64),
        _ => unreachable!("execute called with non-atomic op {op:?}"),
    }
}

fn amo32(mem: &FlatMemory, addr: u64, f: impl Fn(i32) -> i32) -> AtomicResult {
    let cell = unsafe { &*ptr32(mem, addr) };
    let mut old = cell.load(Ordering::SeqCst);
    loop {
        let new = f(old);
        match cell.compare_exchange_weak(old, new, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => {
                return AtomicResult {
                    rd_value: i64::from(old) as u64,
                    wrote: true,
                };
            }
            Err(observed) => old = observed,
        }
    }
}

fn amo64(mem: &FlatMemory, addr: u64, f: impl Fn(i64) -> i64) -> AtomicResult {
    let cell = unsafe { &*ptr64(mem, addr) };
    let mut old = cell.load(Ordering::SeqCst);
    loop {
        let new = f(old);
        match cell.compare_exchange_weak(old, new, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => {
                return AtomicResult {
                    rd_value: old as u64,
                    wrote: true,
                };
            }
            Err(observed) => old = observed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amoadd_w_returns_old_value_and_updates_memory() {
        let mut mem = FlatMemory::new(4096).unwrap();
        mem.store::<4>(0, 10);
        let r = execute(&mem, Op::AmoaddW, 0, 5, 0);
        assert_eq!(r.rd_value, 10);
        assert!(r.wrote);
        assert_eq!(mem.load::<4>(0), 15);
    }

    #[test]
    fn cas_w_succeeds_when_expected_matches() {
        let mut mem = FlatMemory::new(4096).unwrap();
        mem.store::<4>(0, 7);
        let r = execute(&mem, Op::CasW, 0, 42, 7);
        assert_eq!(r.rd_value, 7, "cas reports the pre-swap value");
        assert!(r.wrote);
        assert_eq!(mem.load::<4>(0), 42);
    }

    #[test]
    fn cas_w_fails_when_expected_does_not_match() {
        let mut mem = FlatMemory::new(4096).unwrap();
        mem.store::<4>(0, 7);
        let r = execute(&mem, Op::CasW, 0, 42, 99);
        assert_eq!(r.rd_value, 7);
        assert!(!r.wrote);
        assert_eq!(mem.load::<4>(0), 7, "memory is unchanged on a failed cas");
    }

    #[test]
    fn sc_w_after_successful_lr_w_succeeds() {
        let mut mem = FlatMemory::new(4096).unwrap();
        mem.store::<4>(0, 1);
        let lr = execute(&mem, Op::LrW, 0, 0, 0);
        let sc = execute(&mem, Op::ScW, 0, 2, lr.rd_value);
        assert_eq!(sc.rd_value, 0, "sc reports success as 0");
        assert_eq!(mem.load::<4>(0), 2);
    }

    #[test]
    fn amomax_d_picks_the_larger_signed_value() {
        let mut mem = FlatMemory::new(4096).unwrap();
        mem.store::<8>(0, (-5i64) as u64);
        let r = execute(&mem, Op::AmomaxD, 0, 3, 0);
        assert_eq!(r.rd_value as i64, -5);
        assert_eq!(mem.load::<8>(0) as i64, 3);
    }
}
