//! Loads a static RV64 ELF executable into a strand's guest address space
//! and builds the Linux-style initial stack (`argc`/`argv`/`envp`/`auxv`)
//! the C runtime expects to find at the entry point.
//!
//! Parsing goes through the `object` crate's [`object::Object`]/
//! [`object::ObjectSegment`] traits rather than hand-rolled `Elf64_Phdr`
//! structs: only `PT_LOAD` segments are surfaced by those traits, which is
//! exactly the set this loader needs to copy into memory.

use object::read::elf::{ElfFile64, FileHeader};
use object::{Object, ObjectSegment};

use crate::common::error::HostError;
use crate::common::memory::FlatMemory;

/// Linux page size assumed throughout the loader and `brk` emulation.
pub const PAGE_SIZE: u64 = 4096;

const AT_NULL: u64 = 0;
const AT_PHDR: u64 = 3;
const AT_PHENT: u64 = 4;
const AT_PHNUM: u64 = 5;
const AT_PAGESZ: u64 = 6;
const AT_ENTRY: u64 = 9;
const AT_UID: u64 = 11;
const AT_EUID: u64 = 12;
const AT_GID: u64 = 13;
const AT_EGID: u64 = 14;
const AT_SECURE: u64 = 23;
const AT_RANDOM: u64 = 25;
const AT_HWCAP: u64 = 16;

/// Everything `build_stack` needs to fill in `AT_ENTRY`/`AT_PHDR`/`AT_PHENT`/
/// `AT_PHNUM`, plus the post-segments `brk` watermark, gathered by [`load`].
#[derive(Debug, Clone, Copy)]
pub struct ElfImage {
    /// ELF entry point.
    pub entry: u64,
    /// Guest address of the program header table.
    pub phdr_addr: u64,
    /// Number of program header entries.
    pub phnum: u16,
    /// Size in bytes of one program header entry.
    pub phentsize: u16,
    /// Highest address any `PT_LOAD` segment touched, rounded up to a page —
    /// the initial `brk` watermark.
    pub initial_brk: u64,
}

/// Everything the strand needs to start executing right after loading: the
/// entry PC and the stack pointer built by [`build_stack`].
#[derive(Debug, Clone, Copy)]
pub struct LoadedImage {
    /// ELF entry point.
    pub entry: u64,
    /// Initial guest stack pointer, pointing at `argc`.
    pub sp: u64,
    /// Highest address any `PT_LOAD` segment touched, rounded up to a page —
    /// the initial `brk` watermark.
    pub initial_brk: u64,
}

/// Parses `data` as a 64-bit little-endian RV64 ELF executable and copies
/// every `PT_LOAD` segment into `mem` at its `p_vaddr`.
///
/// # Errors
///
/// Returns [`HostError::ElfLoad`] if `data` isn't a parseable ELF64 file
/// for the expected machine, or if a segment falls outside `mem`.
pub fn load(data: &[u8], mem: &FlatMemory) -> Result<ElfImage, HostError> {
    let file = ElfFile64::<object::Endianness, _>::parse(data)
        .map_err(|e| HostError::ElfLoad(format!("not a valid ELF64 file: {e}")))?;

    let endian = file.endian();
    let header = file.elf_header();
    if header.e_machine(endian) != object::elf::EM_RISCV {
        return Err(HostError::ElfLoad(format!(
            "expected EM_RISCV, found machine {:#x}",
            header.e_machine(endian)
        )));
    }

    let mut high_watermark = 0u64;
    for segment in file.segments() {
        let vaddr = segment.address();
        let data = segment
            .data()
            .map_err(|e| HostError::ElfLoad(format!("segment at {vaddr:#x} unreadable: {e}")))?;
        mem.write_bytes(vaddr, data)?;
        high_watermark = high_watermark.max(vaddr + segment.size());
    }

    let phoff = header.e_phoff(endian);
    let phentsize = header.e_phentsize(endian);
    let phnum = header.e_phnum(endian);
    // Program headers live inside the first loaded segment for every
    // statically linked ELF this loader accepts (no PT_INTERP support —
    // dynamic linking is out of scope).
    let phdr_addr = file
        .segments()
        .next()
        .map_or(phoff, |first| first.address() + phoff);

    let initial_brk = high_watermark.next_multiple_of(PAGE_SIZE);
    Ok(ElfImage {
        entry: header.e_entry(endian),
        phdr_addr,
        phnum,
        phentsize,
        initial_brk,
    })
}

/// Builds the Linux process-startup stack at the top of `[stack_top -
/// stack_size, stack_top)`: argument and environment strings, then their
/// pointer arrays, then the auxiliary vector, then `argc`, all 16-byte
/// aligned per the RISC-V psABI's stack alignment requirement at process
/// entry. Returns the fully assembled [`LoadedImage`] the strand starts
/// from.
#[must_use]
pub fn build_stack(
    mem: &FlatMemory,
    stack_top: u64,
    argv: &[String],
    envp: &[String],
    image: &ElfImage,
    random: [u8; 16],
) -> LoadedImage {
    let ElfImage {
        entry,
        phdr_addr,
        phnum,
        phentsize,
        initial_brk,
    } = *image;
    let mut sp = stack_top;

    sp -= 16;
    let random_addr = sp;
    mem.write_bytes(random_addr, &random).expect("random bytes fit below stack_top");

    let mut env_ptrs = Vec::with_capacity(envp.len());
    for s in envp.iter().rev() {
        sp -= s.len() as u64 + 1;
        mem.write_bytes(sp, s.as_bytes()).expect("env string fits below stack_top");
        mem.write_bytes(sp + s.len() as u64, &[0]).expect("nul terminator fits");
        env_ptrs.push(sp);
    }
    env_ptrs.reverse();

    let mut arg_ptrs = Vec::with_capacity(argv.len());
    for s in argv.iter().rev() {
        sp -= s.len() as u64 + 1;
        mem.write_bytes(sp, s.as_bytes()).expect("arg string fits below stack_top");
        mem.write_bytes(sp + s.len() as u64, &[0]).expect("nul terminator fits");
        arg_ptrs.push(sp);
    }
    arg_ptrs.reverse();

    sp &= !0xf;

    let auxv: [(u64, u64); 10] = [
        (AT_PAGESZ, PAGE_SIZE),
        (AT_PHDR, phdr_addr),
        (AT_PHENT, u64::from(phentsize)),
        (AT_PHNUM, u64::from(phnum)),
        (AT_ENTRY, entry),
        (AT_UID, 0),
        (AT_EUID, 0),
        (AT_GID, 0),
        (AT_EGID, 0),
        (AT_RANDOM, random_addr),
    ];
    // `AT_HWCAP`/`AT_SECURE` follow the fixed entries, `AT_NULL` terminates.
    let extra: [(u64, u64); 2] = [(AT_HWCAP, 0), (AT_SECURE, 0)];

    let auxv_len = auxv.len() + extra.len() + 1;

    let total_words = 1 // argc
        + arg_ptrs.len() + 1 // argv[] + NULL
        + env_ptrs.len() + 1 // envp[] + NULL
        + auxv_len * 2; // (type, value) pairs incl. AT_NULL
    if (total_words % 2) == 1 {
        sp -= 8; // padding so argc ends up 16-byte aligned
    }

    sp -= auxv_len as u64 * 16;
    let mut cursor = sp;
    for &(ty, val) in auxv.iter().chain(extra.iter()) {
        mem.store::<8>(cursor, ty);
        mem.store::<8>(cursor + 8, val);
        cursor += 16;
    }
    mem.store::<8>(cursor, AT_NULL);
    mem.store::<8>(cursor + 8, 0);

    sp -= (env_ptrs.len() as u64 + 1) * 8;
    let mut cursor = sp;
    for ptr in &env_ptrs {
        mem.store::<8>(cursor, *ptr);
        cursor += 8;
    }
    mem.store::<8>(cursor, 0);

    sp -= (arg_ptrs.len() as u64 + 1) * 8;
    let mut cursor = sp;
    for ptr in &arg_ptrs {
        mem.store::<8>(cursor, *ptr);
        cursor += 8;
    }
    mem.store::<8>(cursor, 0);

    sp -= 8;
    mem.store::<8>(sp, argv.len() as u64);

    LoadedImage {
        entry,
        sp,
        initial_brk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_stack_leaves_argc_at_sp() {
        let mem = FlatMemory::new(1 << 20).unwrap();
        let stack_top = 1 << 19;
        let image = ElfImage {
            entry: 0x1000,
            phdr_addr: 0x40,
            phnum: 3,
            phentsize: 56,
            initial_brk: 0x2000,
        };
        let loaded = build_stack(
            &mem,
            stack_top,
            &["prog".to_string()],
            &["PATH=/bin".to_string()],
            &image,
            [0u8; 16],
        );
        assert_eq!(loaded.sp % 16, 0, "entry-point sp must be 16-byte aligned");
        assert_eq!(loaded.entry, 0x1000);
        assert_eq!(loaded.initial_brk, 0x2000);
        assert_eq!(mem.load::<8>(loaded.sp), 1, "argc == argv.len()");
    }
}
