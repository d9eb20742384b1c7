//! RISC-V → host syscall number table.
//!
//! RV64 Linux reused the generic (`asm-generic/unistd.h`) syscall numbering,
//! which does not match the host's numbering once the host is x86_64. Every
//! entry below is a RISC-V syscall number mapped to the symbolic host
//! [`libc::SYS_*`] constant plus a name for diagnostics; the special cases
//! the hart controller handles itself (`clone`, `exit`/`exit_group`, `brk`,
//! the `stat` family, `ppoll`) are marked but still carry a host number so a
//! caller that skips the special-case dispatch gets a sane fallback.

/// One entry in the mapping table.
#[derive(Debug, Clone, Copy)]
pub struct SyscallEntry {
    /// Symbolic name, used for diagnostics and `--ecall` tracing.
    pub name: &'static str,
    /// Host syscall number, or a negative sentinel.
    pub host_num: i64,
}

/// No entry exists for this RISC-V syscall number.
pub const NO_MAPPING: i64 = -1;
/// An entry exists but the underlying syscall isn't supported on this host.
pub const UNSUPPORTED: i64 = -2;

macro_rules! entry {
    ($name:literal, $host:expr) => {
        SyscallEntry {
            name: $name,
            host_num: $host,
        }
    };
}

/// Looks up the host mapping for RISC-V syscall number `rvnum` (the value
/// in `a7` at an `ecall`).
///
/// Returns `None` if `rvnum` is out of the table's range entirely (distinct
/// from an in-range entry whose `host_num` is [`NO_MAPPING`]).
#[must_use]
pub fn lookup(rvnum: i64) -> Option<SyscallEntry> {
    let idx = usize::try_from(rvnum).ok()?;
    TABLE.get(idx).copied().flatten()
}

/// Entries are `Option` so within-range gaps (RISC-V syscall numbers this
/// table doesn't recognize at all) are distinguishable from deliberate
/// [`NO_MAPPING`]/[`UNSUPPORTED`] markers.
type Slot = Option<SyscallEntry>;

const fn some(e: SyscallEntry) -> Slot {
    Some(e)
}

/// Indexed directly by RISC-V syscall number; holes are `None`. Covers the
/// syscalls a glibc-linked static RV64GC binary needs to get through
/// process startup, basic I/O, threading, and a clean exit.
static TABLE: [Slot; 294] = {
    let mut t: [Slot; 294] = [None; 294];
    t[17] = some(entry!("getcwd", libc::SYS_getcwd));
    t[25] = some(entry!("fcntl", libc::SYS_fcntl));
    t[29] = some(entry!("ioctl", libc::SYS_ioctl));
    t[35] = some(entry!("unlinkat", libc::SYS_unlinkat));
    t[48] = some(entry!("faccessat", libc::SYS_faccessat));
    t[56] = some(entry!("openat", libc::SYS_openat));
    t[57] = some(entry!("close", libc::SYS_close));
    t[61] = some(entry!("getdents64", libc::SYS_getdents64));
    t[62] = some(entry!("lseek", libc::SYS_lseek));
    t[63] = some(entry!("read", libc::SYS_read));
    t[64] = some(entry!("write", libc::SYS_write));
    t[66] = some(entry!("writev", libc::SYS_writev));
    t[78] = some(entry!("readlinkat", libc::SYS_readlinkat));
    t[79] = some(entry!("newfstatat", libc::SYS_newfstatat));
    t[80] = some(entry!("fstat", libc::SYS_fstat));
    t[93] = some(entry!("exit", libc::SYS_exit));
    t[94] = some(entry!("exit_group", libc::SYS_exit_group));
    t[96] = some(entry!("set_tid_address", libc::SYS_set_tid_address));
    t[98] = some(entry!("futex", libc::SYS_futex));
    t[99] = some(entry!("set_robust_list", libc::SYS_set_robust_list));
    t[101] = some(entry!("nanosleep", libc::SYS_nanosleep));
    t[113] = some(entry!("clock_gettime", libc::SYS_clock_gettime));
    t[115] = some(entry!("clock_nanosleep", libc::SYS_clock_nanosleep));
    t[117] = some(entry!("ptrace", UNSUPPORTED));
    t[122] = some(entry!("sched_setaffinity", libc::SYS_sched_setaffinity));
    t[123] = some(entry!("sched_getaffinity", libc::SYS_sched_getaffinity));
    t[131] = some(entry!("tgkill", libc::SYS_tgkill));
    t[134] = some(entry!("rt_sigaction", libc::SYS_rt_sigaction));
    t[135] = some(entry!("rt_sigprocmask", libc::SYS_rt_sigprocmask));
    t[139] = some(entry!("rt_sigreturn", libc::SYS_rt_sigreturn));
    t[160] = some(entry!("uname", libc::SYS_uname));
    t[165] = some(entry!("getrusage", libc::SYS_getrusage));
    t[166] = some(entry!("umask", libc::SYS_umask));
    t[169] = some(entry!("gettimeofday", libc::SYS_gettimeofday));
    t[172] = some(entry!("getpid", libc::SYS_getpid));
    t[173] = some(entry!("getppid", libc::SYS_getppid));
    t[174] = some(entry!("getuid", libc::SYS_getuid));
    t[175] = some(entry!("geteuid", libc::SYS_geteuid));
    t[176] = some(entry!("getgid", libc::SYS_getgid));
    t[177] = some(entry!("getegid", libc::SYS_getegid));
    t[178] = some(entry!("gettid", libc::SYS_gettid));
    t[214] = some(entry!("brk", libc::SYS_brk));
    t[215] = some(entry!("munmap", libc::SYS_munmap));
    t[220] = some(entry!("clone", libc::SYS_clone));
    t[222] = some(entry!("mmap", libc::SYS_mmap));
    t[226] = some(entry!("mprotect", libc::SYS_mprotect));
    t[233] = some(entry!("madvise", libc::SYS_madvise));
    t[260] = some(entry!("wait4", libc::SYS_wait4));
    t[261] = some(entry!("prlimit64", libc::SYS_prlimit64));
    t[278] = some(entry!("getrandom", libc::SYS_getrandom));
    t[291] = some(entry!("statx", libc::SYS_statx));
    t[73] = some(entry!("ppoll", libc::SYS_poll));
    t
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_resolves_to_the_host_write_syscall() {
        let e = lookup(64).unwrap();
        assert_eq!(e.name, "write");
        assert_eq!(e.host_num, libc::SYS_write);
    }

    #[test]
    fn out_of_range_number_has_no_entry() {
        assert!(lookup(-1).is_none());
        assert!(lookup(10_000).is_none());
    }

    #[test]
    fn unfilled_in_range_slot_is_none() {
        assert!(lookup(1).is_none());
    }

    #[test]
    fn ptrace_is_marked_unsupported_rather_than_unmapped() {
        let e = lookup(117).unwrap();
        assert_eq!(e.host_num, UNSUPPORTED);
    }
}
