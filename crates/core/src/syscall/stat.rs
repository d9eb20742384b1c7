//! Converts a host `struct stat` into the fixed RISC-V LP64 layout glibc
//! expects from `stat`/`fstat`/`lstat`/`newfstatat`, and writes it into
//! guest memory.
//!
//! The host (x86_64) and guest (riscv64) `struct stat` layouts disagree on
//! field widths and padding even though both are nominally "64-bit Linux",
//! so the fields are copied one at a time rather than memcpy'd wholesale.

use crate::common::memory::FlatMemory;

/// `struct stat` as `asm-generic/stat.h` defines it for LP64 architectures
/// (riscv64, aarch64, ...), matching what a statically linked RV64 glibc
/// expects to find at the guest buffer address.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct RvStat {
    pub st_dev: u64,
    pub st_ino: u64,
    pub st_mode: u32,
    pub st_nlink: u32,
    pub st_uid: u32,
    pub st_gid: u32,
    pub st_rdev: u64,
    __pad1: u64,
    pub st_size: i64,
    pub st_blksize: i32,
    __pad2: i32,
    pub st_blocks: i64,
    pub st_atime: i64,
    pub st_atime_nsec: i64,
    pub st_mtime: i64,
    pub st_mtime_nsec: i64,
    pub st_ctime: i64,
    pub st_ctime_nsec: i64,
    __unused: [u32; 2],
}

impl RvStat {
    /// Builds the guest-layout struct from whatever the host's `stat`
    /// family returned.
    #[must_use]
    pub fn from_host(host: &libc::stat) -> Self {
        Self {
            st_dev: host.st_dev,
            st_ino: host.st_ino,
            st_mode: host.st_mode,
            st_nlink: u32::try_from(host.st_nlink).unwrap_or(u32::MAX),
            st_uid: host.st_uid,
            st_gid: host.st_gid,
            st_rdev: host.st_rdev,
            st_size: host.st_size,
            st_blksize: i32::try_from(host.st_blksize).unwrap_or(i32::MAX),
            st_blocks: host.st_blocks,
            st_atime: host.st_atime,
            st_atime_nsec: host.st_atime_nsec,
            st_mtime: host.st_mtime,
            st_mtime_nsec: host.st_mtime_nsec,
            st_ctime: host.st_ctime,
            st_ctime_nsec: host.st_ctime_nsec,
            ..Self::default()
        }
    }

    /// Writes the struct, little-endian field by field, starting at guest
    /// address `addr`.
    #[allow(clippy::cast_sign_loss)]
    pub fn write_to(&self, mem: &FlatMemory, addr: u64) {
        let mut cursor = addr;
        let mut put = |mem: &FlatMemory, width: u64, val: u64| {
            match width {
                8 => mem.store::<8>(cursor, val),
                4 => mem.store::<4>(cursor, val),
                _ => unreachable!("only 4 and 8 byte stat fields exist"),
            }
            cursor += width;
        };
        put(mem, 8, self.st_dev);
        put(mem, 8, self.st_ino);
        put(mem, 4, u64::from(self.st_mode));
        put(mem, 4, u64::from(self.st_nlink));
        put(mem, 4, self.st_uid.into());
        put(mem, 4, self.st_gid.into());
        put(mem, 8, self.st_rdev);
        put(mem, 8, 0); // __pad1
        put(mem, 8, self.st_size as u64);
        put(mem, 4, u64::from(self.st_blksize as u32));
        put(mem, 4, 0); // __pad2
        put(mem, 8, self.st_blocks as u64);
        put(mem, 8, self.st_atime as u64);
        put(mem, 8, self.st_atime_nsec as u64);
        put(mem, 8, self.st_mtime as u64);
        put(mem, 8, self.st_mtime_nsec as u64);
        put(mem, 8, self.st_ctime as u64);
        put(mem, 8, self.st_ctime_nsec as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_host_stat() -> libc::stat {
        // SAFETY: a zeroed `libc::stat` is a valid bit pattern for every
        // field (all integers).
        let mut s: libc::stat = unsafe { std::mem::zeroed() };
        s.st_size = 4096;
        s.st_mode = 0o100_644;
        s.st_nlink = 1;
        s
    }

    #[test]
    fn from_host_copies_size_and_mode() {
        let rv = RvStat::from_host(&sample_host_stat());
        assert_eq!(rv.st_size, 4096);
        assert_eq!(rv.st_mode, 0o100_644);
        assert_eq!(rv.st_nlink, 1);
    }

    #[test]
    fn write_to_round_trips_size_field() {
        let mem = FlatMemory::new(4096).unwrap();
        let rv = RvStat::from_host(&sample_host_stat());
        rv.write_to(&mem, 0);
        // st_size sits at offset 16 (dev, ino) + 16 (mode/nlink/uid/gid) + 8 (rdev) + 8 (pad) = 48.
        assert_eq!(mem.load::<8>(48), 4096);
    }
}
