//! Flat guest address space backed by an `mmap`ed host region.
//!
//! Guest addresses map directly onto host addresses with a fixed offset
//! (`base`): there is no MMU, no page tables, and no bounds checking on the
//! hot path. An out-of-range access is a real host `SIGSEGV`, exactly as it
//! would be on bare hardware; the hart controller installs a signal handler
//! that turns that fault into a diagnosable guest error instead of crashing
//! the whole process.

use std::ptr;

use crate::common::error::HostError;

/// One mapped guest memory region (there is exactly one per process: the
/// sparse `mmap(MAP_NORESERVE)` region spanning the ELF image, heap, and
/// stack, sized generously so `brk` growth never needs to move it).
pub struct FlatMemory {
    /// Host address backing guest address 0.
    ///
    /// # Safety invariants
    ///
    /// - `base` is the start of an `mmap`ed region of `len` bytes, alive for
    ///   as long as this `FlatMemory` exists.
    /// - Every guest address this type's callers dereference through
    ///   `base` must be distinct from zero-initialization assumptions: the
    ///   region is zero-filled by `mmap`, matching a fresh Linux process.
    /// - No other code unmaps or remaps this region while it is in use.
    base: *mut u8,
    /// Mapped length in bytes.
    len: usize,
}

// SAFETY: `FlatMemory` owns its mapping exclusively and exposes it only
// through `&self`/`&mut self` methods that perform their own bounds
// checks (or deliberately skip them, matching bare-metal semantics, only
// within `[0, len)`).
unsafe impl Send for FlatMemory {}
unsafe impl Sync for FlatMemory {}

impl FlatMemory {
    /// Maps a new, zero-filled guest address space of `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::ElfLoad`] if the host `mmap` call fails (e.g.
    /// `len` exceeds `RLIMIT_AS`).
    pub fn new(len: usize) -> Result<Self, HostError> {
        // SAFETY: fixed set of flags/prot requesting an anonymous,
        // zero-filled, readable+writable+executable mapping; the returned
        // pointer is checked against MAP_FAILED before use.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(HostError::ElfLoad(format!(
                "mmap({len} bytes) failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(Self {
            base: ptr.cast::<u8>(),
            len,
        })
    }

    /// Total mapped length in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// `true` if the mapping is empty (never constructed this way in
    /// practice; present for API symmetry).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn in_bounds(&self, addr: u64, width: usize) -> bool {
        let addr = addr as usize;
        addr.checked_add(width).is_some_and(|end| end <= self.len)
    }

    /// Copies `data` into the mapping starting at guest address `addr`,
    /// used only during ELF loading (not on the interpreter's hot path, so
    /// it bounds-checks instead of trusting the loader).
    ///
    /// Takes `&self`, not `&mut self`: every write here goes through the raw
    /// mapping with no host-side exclusivity, matching the guest's own
    /// memory model where multiple strands may legitimately race on the
    /// same address.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::ElfLoad`] if the write would fall outside the
    /// mapped region.
    pub fn write_bytes(&self, addr: u64, data: &[u8]) -> Result<(), HostError> {
        if !self.in_bounds(addr, data.len()) {
            return Err(HostError::ElfLoad(format!(
                "segment at {addr:#x} (+{} bytes) falls outside the {} byte guest mapping",
                data.len(),
                self.len
            )));
        }
        // SAFETY: bounds checked above; `base..base+len` is a single
        // mmap'd allocation per the type invariant, and `data` does not
        // overlap it (it is loader-owned host memory).
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), self.base.add(addr as usize), data.len());
        }
        Ok(())
    }

    /// Raw host pointer to guest address `addr`, for callers (the atomic-family
    /// emulation) that need to hand the host a pointer of their own choosing
    /// rather than go through [`Self::load`]/[`Self::store`].
    #[inline]
    #[must_use]
    pub fn as_ptr(&self, addr: u64) -> *mut u8 {
        // SAFETY: pointer arithmetic only; not dereferenced here.
        unsafe { self.base.add(addr as usize) }
    }

    /// Reads a little-endian `u16` parcel at `addr` with no bounds check:
    /// an out-of-range `addr` raises a real `SIGSEGV`, which the hart
    /// controller's signal handler turns into a guest fault report.
    #[inline]
    #[must_use]
    pub fn fetch_parcel(&self, addr: u64) -> u16 {
        // SAFETY: caller accepts bare-metal semantics; an invalid `addr`
        // faults via the host MMU rather than corrupting memory, and the
        // hart's signal handler is installed before any guest code runs.
        unsafe { ptr::read_unaligned(self.base.add(addr as usize).cast::<u16>()) }
    }

    /// Reads `N` little-endian bytes at `addr` as an unsigned integer.
    #[inline]
    #[must_use]
    pub fn load<const N: usize>(&self, addr: u64) -> u64 {
        let mut buf = [0u8; 8];
        // SAFETY: see `fetch_parcel`; `N <= 8` is enforced by every caller
        // in this crate, all of which pass a literal width.
        unsafe {
            ptr::copy_nonoverlapping(self.base.add(addr as usize), buf.as_mut_ptr(), N);
        }
        u64::from_le_bytes(buf)
    }

    /// Writes the low `N` bytes of `val`, little-endian, at `addr`.
    #[inline]
    pub fn store<const N: usize>(&self, addr: u64, val: u64) {
        let bytes = val.to_le_bytes();
        // SAFETY: see `load`.
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), self.base.add(addr as usize), N);
        }
    }
}

impl Drop for FlatMemory {
    fn drop(&mut self) {
        // SAFETY: `base`/`len` describe exactly the mapping created in
        // `new`, and no other handle to it survives past this point.
        unsafe {
            libc::munmap(self.base.cast(), self.len);
        }
    }
}

impl std::fmt::Debug for FlatMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatMemory").field("len", &self.len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_mapping_is_zeroed() {
        let mem = FlatMemory::new(4096).unwrap();
        assert_eq!(mem.load::<8>(0), 0);
    }

    #[test]
    fn store_then_load_round_trips() {
        let mem = FlatMemory::new(4096).unwrap();
        mem.store::<4>(100, 0xdead_beef);
        assert_eq!(mem.load::<4>(100), 0xdead_beef);
    }

    #[test]
    fn write_bytes_out_of_range_is_rejected() {
        let mem = FlatMemory::new(16).unwrap();
        assert!(mem.write_bytes(10, &[0u8; 32]).is_err());
    }

    #[test]
    fn fetch_parcel_reads_loaded_bytes() {
        let mem = FlatMemory::new(4096).unwrap();
        mem.write_bytes(0, &[0x13, 0x00]).unwrap();
        assert_eq!(mem.fetch_parcel(0), 0x0013);
    }
}
