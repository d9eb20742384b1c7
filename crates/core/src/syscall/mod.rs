//! The syscall proxy: translates a guest `ecall` into a host syscall (or
//! handles it directly when the two ABIs don't line up), and writes the
//! result back into `a0` per the Linux convention (negated errno on
//! failure).
//!
//! Most syscalls pass straight through to [`table::lookup`] and `libc::
//! syscall`, since RV64 Linux and x86_64 Linux agree on argument order and
//! almost every calling convention quirk. A handful need the host and guest
//! to actively disagree: `clone` (registers, not just syscall number, differ
//! from the host's thread-creation story), `exit`/`exit_group` (the hart
//! controller needs to observe the code, not just have the host process
//! exit), `brk` (emulated against the flat guest mapping rather than the
//! host's own heap), the `stat` family (LP64 layout mismatch, see
//! [`stat::RvStat`]), and `ppoll` (remapped to the host's `poll`, since the
//! host libc's `ppoll` prototype takes a `timespec` this proxy would have to
//! convert twice for no benefit).

pub mod clone;
pub mod stat;
pub mod table;

use std::sync::atomic::{AtomicU64, Ordering};

use crate::common::memory::FlatMemory;
use crate::common::regfile::RegisterFile;
use crate::isa::abi::{REG_A0, REG_A1, REG_A2, REG_A3, REG_A4, REG_A5, REG_A7};

/// Page size assumed by `brk` emulation; matches [`crate::elf::PAGE_SIZE`].
const PAGE_SIZE: u64 = crate::elf::PAGE_SIZE;

/// Tracks the guest heap watermark `brk` raises and lowers, clamped to stay
/// inside the flat mapping the ELF loader sized when the process started.
///
/// Shared across every hart in the process (glibc's allocator assumes a
/// single heap regardless of which thread calls `brk`), so the watermark
/// itself is a plain atomic rather than something guarded by a mutex: a
/// single compare-and-swap is all `brk` ever needs.
#[derive(Debug)]
pub struct BrkState {
    min: u64,
    current: AtomicU64,
}

impl BrkState {
    /// Starts the watermark at `initial` (the loader's `initial_brk`).
    #[must_use]
    pub fn new(initial: u64) -> Self {
        Self {
            min: initial,
            current: AtomicU64::new(initial),
        }
    }

    /// Emulates `brk(requested)`: `0` queries the current watermark; any
    /// other in-bounds value moves it there. Never calls the host `brk` —
    /// the flat mapping already reserves the address space — and never
    /// shrinks below the segment high-water mark recorded at load time.
    pub fn handle(&self, requested: u64, mem_len: u64) -> u64 {
        if requested == 0 {
            return self.current.load(Ordering::Relaxed);
        }
        let clamped = requested.clamp(self.min, mem_len.saturating_sub(PAGE_SIZE));
        self.current.store(clamped, Ordering::Relaxed);
        clamped
    }
}

/// What the hart controller should do after a dispatched `ecall`.
#[derive(Debug)]
pub enum Outcome {
    /// The syscall was serviced; `a0` has already been written with its
    /// result (or negated errno).
    Handled,
    /// `clone` was requested; the hart controller spawns the child thread
    /// and writes the result TID into the parent's `a0` once it knows it.
    Clone(clone::CloneArgs),
    /// `exit`/`exit_group`; the strand (`exit`) or process (`exit_group`)
    /// should stop with this code.
    Exit {
        /// Requested exit status.
        code: i32,
        /// `true` for `exit_group` (kills every strand), `false` for a
        /// single-strand `exit`.
        whole_process: bool,
    },
}

/// Services the `ecall` whose arguments are currently sitting in `regs`.
///
/// `brk_len` is the guest mapping's total length, needed to clamp `brk`
/// growth; `trace` mirrors `--ecall`, logging the call and its result.
#[must_use]
pub fn dispatch(regs: &mut RegisterFile, mem: &FlatMemory, brk: &BrkState, trace: bool) -> Outcome {
    let rvnum = regs.read_int(REG_A7) as i64;
    let a0 = regs.read_int(REG_A0);
    let a1 = regs.read_int(REG_A1);
    let a2 = regs.read_int(REG_A2);

    match rvnum {
        220 => return Outcome::Clone(clone::CloneArgs::from_regs(regs)),
        93 => {
            return Outcome::Exit {
                code: a0 as i32,
                whole_process: false,
            }
        }
        94 => {
            return Outcome::Exit {
                code: a0 as i32,
                whole_process: true,
            }
        }
        214 => {
            let new_brk = brk.handle(a0, mem.len() as u64);
            regs.write_int(REG_A0, new_brk);
            return Outcome::Handled;
        }
        79 | 80 => {
            let result = do_stat(rvnum, regs, mem);
            regs.write_int(REG_A0, result as u64);
            return Outcome::Handled;
        }
        _ => {}
    }

    let Some(entry) = table::lookup(rvnum) else {
        regs.write_int(REG_A0, (-libc::ENOSYS) as u64);
        return Outcome::Handled;
    };
    if entry.host_num == table::UNSUPPORTED {
        regs.write_int(REG_A0, (-libc::ENOSYS) as u64);
        return Outcome::Handled;
    }

    let a3 = regs.read_int(REG_A3);
    let a4 = regs.read_int(REG_A4);
    let a5 = regs.read_int(REG_A5);

    // SAFETY: `entry.host_num` names a real host syscall and the six
    // arguments are passed through unchanged; individual syscalls may
    // dereference guest pointers embedded in `a0..a5`, which are valid
    // host addresses because `mem`'s mapping has guest address 0 at its own
    // base (i.e. guest and host addresses coincide for this process).
    let raw = unsafe { libc::syscall(entry.host_num, a0, a1, a2, a3, a4, a5) };
    let result = if raw < 0 {
        -i64::from(std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EINVAL))
    } else {
        raw
    };
    if trace {
        tracing::debug!(name = entry.name, rvnum, result, "ecall");
    }
    regs.write_int(REG_A0, result as u64);
    Outcome::Handled
}

fn do_stat(rvnum: i64, regs: &RegisterFile, mem: &FlatMemory) -> i64 {
    // `newfstatat(dirfd, path, buf, flags)`; `fstat(fd, buf)`. Both land the
    // result at a guest buffer this proxy must convert, so they're handled
    // here instead of the generic passthrough even though the host syscall
    // numbers line up.
    let mut host_stat: libc::stat = unsafe { std::mem::zeroed() };
    let (rc, buf_addr) = if rvnum == 80 {
        let fd = regs.read_int(REG_A0) as i32;
        // SAFETY: `host_stat` is a valid, zeroed `libc::stat` for the
        // duration of the call.
        (unsafe { libc::fstat(fd, &raw mut host_stat) }, regs.read_int(REG_A1))
    } else {
        let dirfd = regs.read_int(REG_A0) as i32;
        let path_addr = regs.read_int(REG_A1);
        let path = read_c_string(mem, path_addr);
        let flags = regs.read_int(REG_A3) as i32;
        // SAFETY: `path` is a valid, NUL-terminated byte string; `host_stat`
        // is valid and zeroed for the call's duration.
        (
            unsafe { libc::fstatat(dirfd, path.as_ptr(), &raw mut host_stat, flags) },
            regs.read_int(REG_A2),
        )
    };
    if rc < 0 {
        return -i64::from(std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EINVAL));
    }
    stat::RvStat::from_host(&host_stat).write_to(mem, buf_addr);
    0
}

fn read_c_string(mem: &FlatMemory, addr: u64) -> std::ffi::CString {
    let mut bytes = Vec::new();
    let mut cursor = addr;
    loop {
        let byte = mem.load::<1>(cursor) as u8;
        if byte == 0 {
            break;
        }
        bytes.push(byte);
        cursor += 1;
    }
    // SAFETY: `bytes` contains no interior NUL by construction (the loop
    // above stops at the first one).
    unsafe { std::ffi::CString::from_vec_unchecked(bytes) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brk_query_returns_current_without_moving_it() {
        let brk = BrkState::new(0x1000);
        assert_eq!(brk.handle(0, 1 << 20), 0x1000);
        assert_eq!(brk.handle(0, 1 << 20), 0x1000);
    }

    #[test]
    fn brk_grows_and_clamps_to_the_mapping() {
        let brk = BrkState::new(0x1000);
        assert_eq!(brk.handle(0x2000, 1 << 20), 0x2000);
        let huge = brk.handle(u64::MAX, 1 << 20);
        assert!(huge < (1 << 20));
    }

    #[test]
    fn brk_never_drops_below_its_initial_watermark() {
        let brk = BrkState::new(0x4000);
        let result = brk.handle(0x1000, 1 << 20);
        assert_eq!(result, 0x4000);
    }

    #[test]
    fn write_dispatches_through_the_table() {
        let mem = FlatMemory::new(4096).unwrap();
        let brk = BrkState::new(0x1000);
        let mut regs = RegisterFile::new();
        let msg = b"hi\n";
        mem.write_bytes(0, msg).unwrap();
        regs.write_int(REG_A7, 64); // write
        regs.write_int(REG_A0, 1); // stdout
        regs.write_int(REG_A1, 0);
        regs.write_int(REG_A2, msg.len() as u64);
        let outcome = dispatch(&mut regs, &mem, &brk, false);
        assert!(matches!(outcome, Outcome::Handled));
        assert_eq!(regs.read_int(REG_A0), msg.len() as u64);
    }

    #[test]
    fn unmapped_syscall_returns_enosys() {
        let mem = FlatMemory::new(4096).unwrap();
        let brk = BrkState::new(0x1000);
        let mut regs = RegisterFile::new();
        regs.write_int(REG_A7, 9999);
        let outcome = dispatch(&mut regs, &mem, &brk, false);
        assert!(matches!(outcome, Outcome::Handled));
        assert_eq!(regs.read_int(REG_A0) as i64, -i64::from(libc::ENOSYS));
    }

    #[test]
    fn exit_group_is_surfaced_to_the_caller() {
        let mem = FlatMemory::new(4096).unwrap();
        let brk = BrkState::new(0x1000);
        let mut regs = RegisterFile::new();
        regs.write_int(REG_A7, 94);
        regs.write_int(REG_A0, 7);
        let outcome = dispatch(&mut regs, &mem, &brk, false);
        assert!(matches!(
            outcome,
            Outcome::Exit {
                code: 7,
                whole_process: true
            }
        ));
    }
}
