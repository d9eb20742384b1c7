//! The per-strand dispatch loop: fetches a predecoded block, executes each
//! descriptor in order, and reports back to the caller when control leaves
//! the block (a branch taken or not, a jump, or a serializing `ecall`/
//! `ebreak`).
//!
//! Looks a block up (discovering it on first use), dispatches every
//! descriptor in its body, re-zeroes `x0` after each one, and hands the
//! block and the addresses it touched to the simulator callback once
//! execution falls off the end.

use crate::common::error::GuestError;
use crate::common::memory::FlatMemory;
use crate::common::regfile::RegisterFile;
use crate::isa::abi::NOREG;
use crate::isa::attributes::PayloadShape;
use crate::isa::opcodes::Op;
use crate::tcache::{Block, TranslationCache};

use super::{atomics, fp};

/// Maximum number of distinct guest addresses one block's execution can
/// hand to the simulator callback; matches the per-strand scratch space a
/// single basic block can plausibly touch (loads/stores/AMOs only — a
/// block with more than this many memory ops is vanishingly rare in
/// practice, and exceeding it just drops further addresses rather than
/// erroring).
pub const MAX_BLOCK_ADDRS: usize = 10;

/// Receives one decoded block and the addresses its memory operations
/// touched, once per basic block executed. The OoO and LRU timing models
/// implement this to drive their own clocks off real program behavior
/// without coupling the interpreter to either.
pub trait BlockObserver {
    /// Called after a block finishes executing, with the block that ran and
    /// the (possibly truncated) list of addresses it loaded, stored, or
    /// performed an atomic op against, in execution order.
    fn on_block(&mut self, block: &Block<'_>, addrs: &[u64]);
}

/// A [`BlockObserver`] that does nothing; used when no timing model is
/// attached and the strand should simply run at dispatch speed.
#[derive(Debug, Default)]
pub struct NullObserver;

impl BlockObserver for NullObserver {
    fn on_block(&mut self, _block: &Block<'_>, _addrs: &[u64]) {}
}

/// What happened at the end of one `run_block` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// The block fell through, branched, or jumped; `pc` already holds the
    /// next block's starting address.
    Advance,
    /// The block ended in `ecall`. The caller (the hart controller's
    /// syscall proxy) should service the call against `regs`/`mem`, then
    /// resume execution at `pc` (already advanced past the `ecall` itself).
    Ecall,
    /// The block ended in `ebreak`: a debugger trap, surfaced to the caller
    /// as-is.
    Ebreak,
}

/// Executes exactly one basic block starting at `pc`, updating `regs` and
/// `mem` in place and returning the reason execution stopped.
///
/// # Errors
///
/// Returns [`GuestError::BlockExceedsCache`] if the block is too large for
/// `tcache` to ever hold, or [`GuestError::IllegalInstruction`] if the
/// block's terminating instruction failed to decode.
pub fn run_block(
    regs: &mut RegisterFile,
    pc: &mut u64,
    mem: &FlatMemory,
    tcache: &TranslationCache,
    observer: &mut impl BlockObserver,
) -> Result<BlockOutcome, GuestError> {
    let block = loop {
        match tcache.get_or_discover(*pc, mem)? {
            Some(block) => break block,
            None => tcache.flush(),
        }
    };

    let mut addrs: Vec<u64> = Vec::with_capacity(MAX_BLOCK_ADDRS.min(block.body.len()));
    let mut cursor = block.header.pc;
    let mut outcome = BlockOutcome::Advance;

    for (desc, &len) in block.body.iter().zip(block.lens.iter()) {
        if desc.op.is_fatal_decode() {
            return Err(GuestError::IllegalInstruction {
                pc: cursor,
                raw: u32::try_from(mem.load::<4>(cursor)).unwrap_or(u32::MAX),
            });
        }

        let next_sequential = cursor + u64::from(len);
        let control = dispatch(
            regs,
            desc.op,
            desc.rd,
            desc.rs1,
            *desc,
            mem,
            cursor,
            next_sequential,
            &mut addrs,
        );

        match control {
            Control::Fallthrough => cursor = next_sequential,
            Control::Jump(target) => {
                cursor = target;
            }
            Control::Ecall => {
                cursor = next_sequential;
                outcome = BlockOutcome::Ecall;
            }
            Control::Ebreak => {
                cursor = next_sequential;
                outcome = BlockOutcome::Ebreak;
            }
        }
        regs.zero_x0();
    }

    observer.on_block(&block, &addrs);
    *pc = cursor;
    Ok(outcome)
}

/// What one descriptor did to control flow.
enum Control {
    Fallthrough,
    Jump(u64),
    Ecall,
    Ebreak,
}

#[allow(clippy::too_many_arguments, clippy::too_many_lines)]
fn dispatch(
    regs: &mut RegisterFile,
    op: Op,
    rd: u8,
    rs1: u8,
    desc: crate::isa::Descriptor,
    mem: &FlatMemory,
    pc: u64,
    next_pc: u64,
    addrs: &mut Vec<u64>,
) -> Control {
    use crate::isa::attributes::attributes;

    let attrs = attributes(op);
    let a = regs.read_int(rs1);

    // Register-register operand extraction, shared by ALU R-types, branches,
    // stores, and the atomic family.
    let (rs2, rs3, imm16) = if attrs.payload == PayloadShape::RegReg {
        desc.reg_form()
    } else {
        (NOREG, NOREG, 0)
    };
    let b = regs.read_int(rs2);
    let imm32 = desc.imm32();

    match op {
        Op::Zero => {}

        // Upper-immediate.
        Op::Lui => regs.write_int(rd, imm32 as i64 as u64),
        Op::Auipc => regs.write_int(rd, pc.wrapping_add(imm32 as i64 as u64)),

        // Unconditional jumps.
        Op::Jal => {
            regs.write_int(rd, next_pc);
            return Control::Jump(pc.wrapping_add(imm32 as i64 as u64));
        }
        Op::Jalr => {
            let target = a.wrapping_add(imm32 as i64 as u64) & !1u64;
            regs.write_int(rd, next_pc);
            return Control::Jump(target);
        }

        // Conditional branches: `imm16` is the branch offset from `pc`.
        Op::Beq | Op::Bne | Op::Blt | Op::Bge | Op::Bltu | Op::Bgeu => {
            let taken = match op {
                Op::Beq => a == b,
                Op::Bne => a != b,
                Op::Blt => (a as i64) < (b as i64),
                Op::Bge => (a as i64) >= (b as i64),
                Op::Bltu => a < b,
                Op::Bgeu => a >= b,
                _ => unreachable!(),
            };
            if taken {
                return Control::Jump(pc.wrapping_add(i64::from(imm16) as u64));
            }
        }

        // Loads: `imm32` is the byte offset from `rs1`.
        Op::Lb | Op::Lh | Op::Lw | Op::Lbu | Op::Lhu | Op::Lwu | Op::Ld | Op::Flw | Op::Fld => {
            let addr = a.wrapping_add(imm32 as i64 as u64);
            push_addr(addrs, addr);
            let value = match op {
                Op::Lb => mem.load::<1>(addr) as i8 as i64 as u64,
                Op::Lh => mem.load::<2>(addr) as i16 as i64 as u64,
                Op::Lw => mem.load::<4>(addr) as i32 as i64 as u64,
                Op::Lbu => mem.load::<1>(addr),
                Op::Lhu => mem.load::<2>(addr),
                Op::Lwu => mem.load::<4>(addr),
                Op::Ld => mem.load::<8>(addr),
                Op::Flw => {
                    regs.write_f32(rd, f32::from_bits(mem.load::<4>(addr) as u32));
                    return Control::Fallthrough;
                }
                Op::Fld => {
                    regs.write_f64(rd, f64::from_bits(mem.load::<8>(addr)));
                    return Control::Fallthrough;
                }
                _ => unreachable!(),
            };
            regs.write_int(rd, value);
        }

        // Stores: `rs1` is the base, `rs2`/`imm16` the value register and
        // byte offset.
        Op::Sb | Op::Sh | Op::Sw | Op::Sd | Op::Fsw | Op::Fsd => {
            let addr = a.wrapping_add(i64::from(imm16) as u64);
            push_addr(addrs, addr);
            store(mem, op, addr, regs, rs2);
        }

        // Integer-immediate ALU.
        Op::Addi => regs.write_int(rd, a.wrapping_add(imm32 as i64 as u64)),
        Op::Slti => regs.write_int(rd, u64::from((a as i64) < i64::from(imm32))),
        Op::Sltiu => regs.write_int(rd, u64::from(a < imm32 as i64 as u64)),
        Op::Xori => regs.write_int(rd, a ^ (imm32 as i64 as u64)),
        Op::Ori => regs.write_int(rd, a | (imm32 as i64 as u64)),
        Op::Andi => regs.write_int(rd, a & (imm32 as i64 as u64)),
        Op::Slli => regs.write_int(rd, a << (imm32 & 0x3f)),
        Op::Srli => regs.write_int(rd, a >> (imm32 & 0x3f)),
        Op::Srai => regs.write_int(rd, ((a as i64) >> (imm32 & 0x3f)) as u64),
        Op::Addiw => regs.write_int(rd, sext32((a as i32).wrapping_add(imm32))),
        Op::Slliw => regs.write_int(rd, sext32((a as i32) << (imm32 & 0x1f))),
        Op::Srliw => regs.write_int(rd, sext32(((a as u32) >> (imm32 & 0x1f)) as i32)),
        Op::Sraiw => regs.write_int(rd, sext32((a as i32) >> (imm32 & 0x1f))),

        // Register-register ALU.
        Op::Add => regs.write_int(rd, a.wrapping_add(b)),
        Op::Sub => regs.write_int(rd, a.wrapping_sub(b)),
        Op::Sll => regs.write_int(rd, a << (b & 0x3f)),
        Op::Slt => regs.write_int(rd, u64::from((a as i64) < (b as i64))),
        Op::Sltu => regs.write_int(rd, u64::from(a < b)),
        Op::Xor => regs.write_int(rd, a ^ b),
        Op::Srl => regs.write_int(rd, a >> (b & 0x3f)),
        Op::Sra => regs.write_int(rd, ((a as i64) >> (b & 0x3f)) as u64),
        Op::Or => regs.write_int(rd, a | b),
        Op::And => regs.write_int(rd, a & b),
        Op::Addw => regs.write_int(rd, sext32((a as i32).wrapping_add(b as i32))),
        Op::Subw => regs.write_int(rd, sext32((a as i32).wrapping_sub(b as i32))),
        Op::Sllw => regs.write_int(rd, sext32((a as i32) << (b & 0x1f))),
        Op::Srlw => regs.write_int(rd, sext32(((a as u32) >> (b & 0x1f)) as i32)),
        Op::Sraw => regs.write_int(rd, sext32((a as i32) >> (b & 0x1f))),

        // M extension.
        Op::Mul => regs.write_int(rd, a.wrapping_mul(b)),
        Op::Mulh => regs.write_int(rd, (((a as i64 as i128) * (b as i64 as i128)) >> 64) as u64),
        Op::Mulhsu => regs.write_int(rd, (((a as i64 as i128) * (b as u128 as i128)) >> 64) as u64),
        Op::Mulhu => regs.write_int(rd, ((u128::from(a) * u128::from(b)) >> 64) as u64),
        Op::Div => regs.write_int(rd, div_i64(a as i64, b as i64) as u64),
        Op::Divu => regs.write_int(rd, div_u64(a, b)),
        Op::Rem => regs.write_int(rd, rem_i64(a as i64, b as i64) as u64),
        Op::Remu => regs.write_int(rd, rem_u64(a, b)),
        Op::Mulw => regs.write_int(rd, sext32((a as i32).wrapping_mul(b as i32))),
        Op::Divw => regs.write_int(rd, sext32(div_i64(i64::from(a as i32), i64::from(b as i32)) as i32)),
        Op::Divuw => regs.write_int(rd, sext32(div_u64(u64::from(a as u32), u64::from(b as u32)) as i32)),
        Op::Remw => regs.write_int(rd, sext32(rem_i64(i64::from(a as i32), i64::from(b as i32)) as i32)),
        Op::Remuw => regs.write_int(rd, sext32(rem_u64(u64::from(a as u32), u64::from(b as u32)) as i32)),

        // Zicsr: only the floating-point control/status register is modeled
        // (the user-mode subset this interpreter exposes has no other CSRs
        // a guest can usefully read or write).
        Op::Csrrw | Op::Csrrs | Op::Csrrc | Op::Csrrwi | Op::Csrrsi | Op::Csrrci => {
            csr(regs, op, rd, rs1, imm32);
        }

        Op::Fence | Op::FenceI => {}

        Op::Ecall => return Control::Ecall,
        Op::Ebreak => return Control::Ebreak,

        // Atomic family: `a` is the already-computed effective address
        // (no immediate offset in the AMO/LR/SC encoding).
        Op::LrW | Op::LrD | Op::ScW | Op::ScD | Op::AmoswapW | Op::AmoaddW | Op::AmoxorW
        | Op::AmoandW | Op::AmoorW | Op::AmominW | Op::AmomaxW | Op::AmominuW | Op::AmomaxuW
        | Op::AmoswapD | Op::AmoaddD | Op::AmoxorD | Op::AmoandD | Op::AmoorD | Op::AmominD
        | Op::AmomaxD | Op::AmominuD | Op::AmomaxuD | Op::CasW | Op::CasD => {
            push_addr(addrs, a);
            // `cas.{w,d}` stashes the expected value where `sc` would have
            // compared it: `rs2` here is the substituted cas's compare
            // register (see `tcache::substitute_cas`), and the new value is
            // `rs3`.
            let (compare, new_value) = if matches!(op, Op::CasW | Op::CasD) {
                (b, regs.read_int(rs3))
            } else {
                (regs.xrf[0], b)
            };
            let result = atomics::execute(mem, op, a, new_value, compare);
            regs.write_int(rd, result.rd_value);
        }

        // Floating point: dispatch to the shared F/D execution helper,
        // writing the result to the correct register file.
        _ if attrs.is_memory || matches!(op, Op::FmaddS | Op::FmsubS | Op::FnmaddS | Op::FnmsubS)
            || is_fp_op(op) =>
        {
            let rd_is_int = fp_writes_int_rd(op);
            let bits = fp::execute(regs, op, rs1, rs2, rs3, rd_is_int);
            if rd_is_int {
                regs.write_int(rd, bits);
            } else if is_double(op) {
                regs.write_f64(rd, f64::from_bits(bits));
            } else {
                regs.write_f32(rd, f32::from_bits(bits as u32));
            }
        }

        Op::Illegal | Op::Unknown => unreachable!("fatal decodes are handled before dispatch"),
    }

    Control::Fallthrough
}

fn store(mem: &FlatMemory, op: Op, addr: u64, regs: &RegisterFile, rs2: u8) {
    match op {
        Op::Sb => mem.store::<1>(addr, regs.read_int(rs2)),
        Op::Sh => mem.store::<2>(addr, regs.read_int(rs2)),
        Op::Sw => mem.store::<4>(addr, regs.read_int(rs2)),
        Op::Sd => mem.store::<8>(addr, regs.read_int(rs2)),
        Op::Fsw => mem.store::<4>(addr, u64::from(regs.read_f32(rs2).to_bits())),
        Op::Fsd => mem.store::<8>(addr, regs.read_f64(rs2).to_bits()),
        _ => unreachable!(),
    }
}

fn csr(regs: &mut RegisterFile, op: Op, rd: u8, rs1: u8, imm32: i32) {
    const FFLAGS: i32 = 0x001;
    const FRM: i32 = 0x002;
    const FCSR: i32 = 0x003;

    let addr = imm32 & 0xfff;
    let old = match addr {
        FFLAGS => u64::from(regs.fflags),
        FRM => u64::from(regs.frm),
        FCSR => u64::from(regs.fcsr()),
        _ => 0,
    };
    regs.write_int(rd, old);

    let is_immediate = matches!(op, Op::Csrrwi | Op::Csrrsi | Op::Csrrci);
    let operand = if is_immediate {
        u64::from(rs1)
    } else {
        regs.read_int(rs1)
    };
    // `rs1 == x0` on the non-immediate forms means "read only, don't write".
    if !is_immediate && rs1 == 0 {
        return;
    }
    let new = match op {
        Op::Csrrw | Op::Csrrwi => operand,
        Op::Csrrs | Op::Csrrsi => old | operand,
        Op::Csrrc | Op::Csrrci => old & !operand,
        _ => unreachable!(),
    };
    match addr {
        FFLAGS => regs.fflags = new as u8 & 0x1f,
        FRM => regs.frm = new as u8 & 0x7,
        FCSR => regs.set_fcsr(new as u32),
        _ => {}
    }
}

fn push_addr(addrs: &mut Vec<u64>, addr: u64) {
    if addrs.len() < MAX_BLOCK_ADDRS {
        addrs.push(addr);
    }
}

const fn sext32(v: i32) -> u64 {
    v as i64 as u64
}

fn div_i64(a: i64, b: i64) -> i64 {
    if b == 0 {
        -1
    } else if a == i64::MIN && b == -1 {
        i64::MIN
    } else {
        a.wrapping_div(b)
    }
}

fn div_u64(a: u64, b: u64) -> u64 {
    if b == 0 { u64::MAX } else { a / b }
}

fn rem_i64(a: i64, b: i64) -> i64 {
    if b == 0 {
        a
    } else if a == i64::MIN && b == -1 {
        0
    } else {
        a.wrapping_rem(b)
    }
}

fn rem_u64(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { a % b }
}

pub(crate) const fn is_fp_op(op: Op) -> bool {
    matches!(
        op,
        Op::FaddS
            | Op::FsubS
            | Op::FmulS
            | Op::FdivS
            | Op::FsqrtS
            | Op::FsgnjS
            | Op::FsgnjnS
            | Op::FsgnjxS
            | Op::FminS
            | Op::FmaxS
            | Op::FcvtWS
            | Op::FcvtWuS
            | Op::FmvXW
            | Op::FeqS
            | Op::FltS
            | Op::FleS
            | Op::FclassS
            | Op::FcvtSW
            | Op::FcvtSWu
            | Op::FmvWX
            | Op::FcvtLS
            | Op::FcvtLuS
            | Op::FcvtSL
            | Op::FcvtSLu
            | Op::FmaddD
            | Op::FmsubD
            | Op::FnmaddD
            | Op::FnmsubD
            | Op::FaddD
            | Op::FsubD
            | Op::FmulD
            | Op::FdivD
            | Op::FsqrtD
            | Op::FsgnjD
            | Op::FsgnjnD
            | Op::FsgnjxD
            | Op::FminD
            | Op::FmaxD
            | Op::FcvtSD
            | Op::FcvtDS
            | Op::FeqD
            | Op::FltD
            | Op::FleD
            | Op::FclassD
            | Op::FcvtWD
            | Op::FcvtWuD
            | Op::FcvtDW
            | Op::FcvtDWu
            | Op::FcvtLD
            | Op::FcvtLuD
            | Op::FcvtDL
            | Op::FcvtDLu
            | Op::FmvXD
            | Op::FmvDX
    )
}

pub(crate) const fn fp_writes_int_rd(op: Op) -> bool {
    matches!(
        op,
        Op::FcvtWS
            | Op::FcvtWuS
            | Op::FcvtLS
            | Op::FcvtLuS
            | Op::FmvXW
            | Op::FeqS
            | Op::FltS
            | Op::FleS
            | Op::FclassS
            | Op::FcvtWD
            | Op::FcvtWuD
            | Op::FcvtLD
            | Op::FcvtLuD
            | Op::FmvXD
            | Op::FeqD
            | Op::FltD
            | Op::FleD
            | Op::FclassD
    )
}

const fn is_double(op: Op) -> bool {
    matches!(
        op,
        Op::FaddD
            | Op::FsubD
            | Op::FmulD
            | Op::FdivD
            | Op::FsqrtD
            | Op::FmaddD
            | Op::FmsubD
            | Op::FnmaddD
            | Op::FnmsubD
            | Op::FsgnjD
            | Op::FsgnjnD
            | Op::FsgnjxD
            | Op::FminD
            | Op::FmaxD
            | Op::FcvtDS
            | Op::FcvtDW
            | Op::FcvtDWu
            | Op::FcvtDL
            | Op::FcvtDLu
            | Op::FmvDX
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::abi::{REG_A0, REG_A1};

    fn write_word(mem: &FlatMemory, addr: u64, word: u32) {
        mem.write_bytes(addr, &word.to_le_bytes()).unwrap();
    }

    fn encode_r(funct7: u32, rs2: u8, rs1: u8, funct3: u32, rd: u8, opcode: u32) -> u32 {
        (funct7 << 25)
            | (u32::from(rs2) << 20)
            | (u32::from(rs1) << 15)
            | (funct3 << 12)
            | (u32::from(rd) << 7)
            | opcode
    }

    fn encode_i(imm: i32, rs1: u8, funct3: u32, rd: u8, opcode: u32) -> u32 {
        ((imm as u32) << 20)
            | (u32::from(rs1) << 15)
            | (funct3 << 12)
            | (u32::from(rd) << 7)
            | opcode
    }

    #[test]
    fn addi_advances_pc_and_writes_register() {
        let mem = FlatMemory::new(4096).unwrap();
        // addi a0, x0, 5; beq x0, x0, 0 (terminates the block)
        write_word(&mem, 0, encode_i(5, 0, 0b000, REG_A0, 0x13));
        write_word(&mem, 4, 0x0000_0063);
        let tcache = TranslationCache::new(1024, 64);
        let mut regs = RegisterFile::new();
        let mut pc = 0u64;
        let mut observer = NullObserver;
        let outcome = run_block(&mut regs, &mut pc, &mem, &tcache, &mut observer).unwrap();
        assert_eq!(outcome, BlockOutcome::Advance);
        assert_eq!(regs.read_int(REG_A0), 5);
        assert_eq!(pc, 4, "branch was not taken, block falls through to it");
    }

    fn encode_b(imm: i32, rs2: u8, rs1: u8, funct3: u32) -> u32 {
        let imm12 = ((imm >> 12) & 1) as u32;
        let imm10_5 = ((imm >> 5) & 0x3f) as u32;
        let imm4_1 = ((imm >> 1) & 0xf) as u32;
        let imm11 = ((imm >> 11) & 1) as u32;
        (imm12 << 31)
            | (imm10_5 << 25)
            | (u32::from(rs2) << 20)
            | (u32::from(rs1) << 15)
            | (funct3 << 12)
            | (imm4_1 << 8)
            | (imm11 << 7)
            | 0x63
    }

    #[test]
    fn taken_branch_jumps_to_target() {
        let mem = FlatMemory::new(4096).unwrap();
        // addi a0, x0, 1; addi a1, x0, 1; beq a0, a1, +8
        write_word(&mem, 0, encode_i(1, 0, 0b000, REG_A0, 0x13));
        write_word(&mem, 4, encode_i(1, 0, 0b000, REG_A1, 0x13));
        write_word(&mem, 8, encode_b(8, REG_A1, REG_A0, 0b000));
        let tcache = TranslationCache::new(1024, 64);
        let mut regs = RegisterFile::new();
        let mut pc = 0u64;
        let mut observer = NullObserver;
        run_block(&mut regs, &mut pc, &mem, &tcache, &mut observer).unwrap();
        assert_eq!(pc, 16, "branch at pc 8 with imm +8 lands at 16");
    }

    #[test]
    fn store_then_load_round_trips_through_dispatch() {
        let mem = FlatMemory::new(4096).unwrap();
        // addi a0, x0, 100; addi a1, x0, 7; sw a1, 0(a0); lw a1, 0(a0); ecall
        write_word(&mem, 0, encode_i(100, 0, 0b000, REG_A0, 0x13));
        write_word(&mem, 4, encode_i(7, 0, 0b000, REG_A1, 0x13));
        let sw = encode_r(0, REG_A1, REG_A0, 0b010, 0, 0x23);
        write_word(&mem, 8, sw);
        let lw = encode_i(0, REG_A0, 0b010, REG_A1, 0x03);
        write_word(&mem, 12, lw);
        write_word(&mem, 16, 0x0000_0073); // ecall
        let tcache = TranslationCache::new(1024, 64);
        let mut regs = RegisterFile::new();
        let mut pc = 0u64;
        let mut observer = NullObserver;
        let outcome = run_block(&mut regs, &mut pc, &mem, &tcache, &mut observer).unwrap();
        assert_eq!(outcome, BlockOutcome::Ecall);
        assert_eq!(regs.read_int(REG_A1), 7);
        assert_eq!(pc, 20);
    }

    #[test]
    fn illegal_instruction_is_reported() {
        let mem = FlatMemory::new(4096).unwrap();
        // opcode 0x00 is reserved in every major-opcode group this decoder
        // recognizes, so this word always decodes to `Illegal`.
        write_word(&mem, 0, 0x0000_0000);
        let tcache = TranslationCache::new(1024, 64);
        let mut regs = RegisterFile::new();
        let mut pc = 0u64;
        let mut observer = NullObserver;
        let err = run_block(&mut regs, &mut pc, &mem, &tcache, &mut observer).unwrap_err();
        assert!(matches!(err, GuestError::IllegalInstruction { pc: 0, .. }));
    }
}
