//! A renaming out-of-order core: a unified physical register file with an
//! explicit free list, a store buffer that disambiguates against in-flight
//! stores, a bounded issue queue, and a single-write-port result bus. One
//! instruction dispatches per cycle (stalling on a full issue queue, an
//! exhausted rename pool, or a full store buffer); the oldest ready entry in
//! the queue issues onto the write port or the memory port each cycle,
//! [`banks::MemoryBanks`] gates bank conflicts, and retirement drains
//! completions off the write port in the order they land, same as a real
//! single-retire pipeline.
//!
//! Branches, atomics, and `ecall`/`ebreak` jump the issue queue (inserted at
//! the front, ahead of whatever older instructions are still waiting on
//! operands) since nothing can safely reorder around them.

pub mod banks;
pub mod history;
pub mod issue_queue;
pub mod port;
pub mod regfile;
pub mod timing_wheel;

use crate::config::LatencyConfig;
use crate::isa::abi::NOREG;
use crate::isa::attributes::{attributes, BlockEnd, PayloadShape};
use crate::isa::opcodes::Op;
use crate::strand::interpreter::{fp_writes_int_rd, is_fp_op};
use crate::strand::BlockObserver;
use crate::tcache::Block;

use banks::MemoryBanks;
use history::{History, Retired};
use issue_queue::IssueQueue;
use port::MemoryPort;
use regfile::RenamingRegfile;
use timing_wheel::WritePort;

/// `true` for the opcodes whose architectural destination is a floating
/// point register (an arithmetic FP op unless it's one of the `fcvt`/`fmv`
/// forms that write an integer `rd`, or a floating-point load).
fn rd_is_fp(op: Op) -> bool {
    matches!(op, Op::Flw | Op::Fld) || (is_fp_op(op) && !fp_writes_int_rd(op))
}

/// `true` for the opcodes whose `rs1` names a floating-point register: FP
/// arithmetic and compares read their first operand from the FP file, except
/// the int-to-float conversions and `fmv.?.x`, which read `rs1` from the
/// integer file like any other producer of a float.
fn rs1_is_fp(op: Op) -> bool {
    is_fp_op(op)
        && !matches!(
            op,
            Op::FcvtSW
                | Op::FcvtSWu
                | Op::FcvtSL
                | Op::FcvtSLu
                | Op::FmvWX
                | Op::FcvtDW
                | Op::FcvtDWu
                | Op::FcvtDL
                | Op::FcvtDLu
                | Op::FmvDX
        )
}

/// `true` for the opcodes whose `rs2` (when their payload carries one) names
/// a floating-point register: FP arithmetic's second operand, and the value
/// register of an `fsw`/`fsd`.
fn rs2_is_fp(op: Op) -> bool {
    matches!(op, Op::Fsw | Op::Fsd) || is_fp_op(op)
}

/// Maps a raw 0-31 architectural register plus its file into the unified
/// 0-63 numbering [`regfile::RenamingRegfile`] renames: integer registers
/// keep their number, floating-point registers are offset by 32.
fn unify(raw: u8, fp: bool) -> u8 {
    if raw == NOREG {
        NOREG
    } else if fp {
        raw + 32
    } else {
        raw
    }
}

fn is_store_op(op: Op) -> bool {
    matches!(op, Op::Sb | Op::Sh | Op::Sw | Op::Sd | Op::Fsw | Op::Fsd)
}

/// One instruction's renamed, queued state between dispatch and retirement.
#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    pc: u64,
    rd: u8,
    src: [u8; 2],
    store_dep: u8,
    addr: Option<u64>,
    is_store: bool,
    latency: u64,
}

impl QueueEntry {
    fn ready(&self, regs: &RenamingRegfile) -> bool {
        !regs.busy(self.src[0]) && !regs.busy(self.src[1]) && !regs.busy(self.store_dep)
    }
}

/// A completion sitting on the write-port wheel, waiting for its cycle.
#[derive(Debug, Clone, Copy)]
struct Completion {
    pc: u64,
    rd: u8,
    issue_cycle: u64,
    is_store: bool,
}

/// Drives the renaming out-of-order model off one strand's block stream.
#[derive(Debug)]
pub struct OooCore {
    regs: RenamingRegfile,
    queue: IssueQueue<QueueEntry>,
    wheel: WritePort<Completion>,
    mem_port: MemoryPort,
    mem_port_history: Option<Completion>,
    banks: MemoryBanks,
    history: History,
    latency: LatencyConfig,
    dmiss_latency: u64,
    cycle: u64,
    instructions: u64,
    #[cfg(feature = "verify")]
    mismatches: u64,
}

impl OooCore {
    /// Builds a core with the configured per-class latencies and data-miss
    /// penalty (`--dmiss`); `queue_capacity` bounds the issue queue depth.
    #[must_use]
    pub fn new(latency: LatencyConfig, dmiss_latency: u64, queue_capacity: usize) -> Self {
        Self {
            regs: RenamingRegfile::new(),
            queue: IssueQueue::new(queue_capacity),
            wheel: WritePort::new(),
            mem_port: MemoryPort::new(),
            mem_port_history: None,
            banks: MemoryBanks::new(),
            history: History::new(),
            latency,
            dmiss_latency,
            cycle: 0,
            instructions: 0,
            #[cfg(feature = "verify")]
            mismatches: 0,
        }
    }

    /// Total instructions retired so far.
    #[must_use]
    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    /// The clock's current cycle.
    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Instructions retired per cycle so far; `0.0` before the first cycle.
    #[must_use]
    pub fn ipc(&self) -> f64 {
        if self.cycle == 0 {
            0.0
        } else {
            self.instructions as f64 / self.cycle as f64
        }
    }

    /// Renaming-invariant violations caught at retirement. Only meaningful
    /// when built with the `verify` feature; otherwise always `0`.
    #[must_use]
    pub fn mismatches(&self) -> u64 {
        #[cfg(feature = "verify")]
        {
            self.mismatches
        }
        #[cfg(not(feature = "verify"))]
        {
            0
        }
    }

    fn class_latency(&self, op: Op) -> u64 {
        let attrs = attributes(op);
        if is_fp_op(op) {
            self.latency.fp
        } else if attrs.is_memory && is_store_op(op) {
            self.latency.store
        } else if attrs.is_memory || attrs.is_atomic {
            self.latency.load
        } else if attrs.block_end != BlockEnd::None {
            self.latency.jump
        } else {
            self.latency.alu
        }
    }

    /// Launches the port's pending request into its bank once the bank is
    /// free, retiring a store immediately (nothing downstream waits on a
    /// store's value) or reserving a write-port slot for a load.
    fn clock_memory_port(&mut self) {
        let Some(request) = self.mem_port.peek() else {
            return;
        };
        if self.banks.is_busy(request.addr, self.cycle) {
            return;
        }
        self.banks.activate(request.addr, self.cycle + request.latency);
        let completion = self.mem_port_history.take().expect("active port always carries its history");
        if completion.is_store {
            // A store's value is already in its buffer slot; it needs no
            // write-port cycle, so it retires the moment its bank accepts it.
            self.retire(completion);
        } else {
            self.reserve_completion(request.latency, completion);
        }
        self.mem_port.deactivate();
    }

    fn retire(&mut self, completion: Completion) {
        self.regs.value_is_ready(completion.rd);
        self.regs.release_reg(completion.rd);
        self.instructions += 1;
        self.history.push(Retired {
            pc: completion.pc,
            issue_cycle: completion.issue_cycle,
            complete_cycle: self.cycle,
        });
        #[cfg(feature = "verify")]
        if !self.regs.uses_invariant_holds() {
            self.mismatches += 1;
            tracing::warn!(pc = completion.pc, cycle = self.cycle, "renaming invariant violated at retirement");
        }
    }

    /// Drains whatever landed on the write port this cycle, then tries to
    /// issue the oldest ready entry still waiting in the queue.
    fn retire_completed(&mut self) {
        if let Some(completion) = self.wheel.take_current() {
            self.retire(completion);
        }
        self.try_issue();
    }

    /// Finds the first free slot at or after `latency` cycles out, wrapping
    /// the search forward (never past the wheel's own reach) instead of
    /// insisting on the exact configured latency — the write port is a
    /// single shared bus, so a cycle already claimed by another completion
    /// just pushes this one out, the way `reserve_bus` retrying the next
    /// cycle does in the original pipeline clock.
    fn reserve_completion(&mut self, latency: u64, completion: Completion) {
        let mut delay = latency;
        while delay < timing_wheel::MAX_LATENCY && self.wheel.is_busy(delay) {
            delay += 1;
        }
        self.wheel.reserve(delay, completion);
    }

    /// Issues at most one ready entry per cycle: a memory op claims the
    /// port if it's idle, everything else claims the write port directly.
    /// An outstanding memory request only blocks *other* memory ops from
    /// issuing, not the whole queue.
    fn try_issue(&mut self) {
        let cycle = self.cycle;
        let mem_port_free = !self.mem_port.active();
        let regs = &self.regs;
        let Some(entry) = self
            .queue
            .take_first_ready(|e| e.ready(regs) && (e.addr.is_none() || mem_port_free))
        else {
            return;
        };
        let completion = Completion {
            pc: entry.pc,
            rd: entry.rd,
            issue_cycle: cycle,
            is_store: entry.is_store,
        };
        if let Some(addr) = entry.addr {
            self.mem_port.request(addr, entry.latency);
            self.mem_port_history = Some(completion);
        } else {
            self.reserve_completion(entry.latency, completion);
        }
    }

    fn advance_cycle(&mut self) {
        self.clock_memory_port();
        self.retire_completed();
        self.cycle += 1;
        self.wheel.advance();
    }

    /// Renames `desc`'s operands, classifying each into the unified 64-entry
    /// namespace and allocating a store-buffer slot instead of a rename
    /// register for stores.
    fn rename(&mut self, op: Op, desc: &crate::isa::instruction::Descriptor, addr: Option<u64>) -> QueueEntry {
        let attrs = attributes(op);
        let rd_arch = unify(desc.rd, rd_is_fp(op));
        let rs1_arch = unify(desc.rs1, rs1_is_fp(op));
        let rs2_arch = if attrs.payload == PayloadShape::RegReg {
            unify(desc.reg_form().0, rs2_is_fp(op))
        } else {
            NOREG
        };

        let rs1 = self.regs.map(rs1_arch);
        let rs2 = self.regs.map(rs2_arch);
        if rs1 != NOREG {
            self.regs.acquire_reg(rs1);
        }
        if rs2 != NOREG {
            self.regs.acquire_reg(rs2);
        }
        let store_dep = match addr {
            Some(a) => self.regs.check_store_buffer(a),
            None => NOREG,
        };

        let rd = if is_store_op(op) {
            self.regs.allocate_store_buffer(addr.expect("store dispatched without an address"))
        } else if rd_arch != NOREG {
            self.regs.rename_reg(rd_arch)
        } else {
            NOREG
        };

        QueueEntry {
            pc: 0,
            rd,
            src: [rs1, rs2],
            store_dep,
            addr,
            is_store: is_store_op(op),
            latency: self.class_latency(op),
        }
    }
}

impl BlockObserver for OooCore {
    /// Dispatches the block's descriptors in program order, one per cycle,
    /// stalling when the rename pool, issue queue, or store buffer can't
    /// accept the next instruction, and clocking the memory port / write
    /// port / retirement path every cycle along the way — the
    /// `clock_pipeline()` loop a real per-cycle core runs, minus its
    /// display-only bookkeeping.
    fn on_block(&mut self, block: &Block<'_>, addrs: &[u64]) {
        let mut addr_iter = addrs.iter().copied();
        let mut pc = block.header.pc;

        for (desc, &len) in block.body.iter().zip(block.lens.iter()) {
            let op = desc.op;
            let attrs = attributes(op);
            let needs_dest = unify(desc.rd, rd_is_fp(op)) != NOREG && !is_store_op(op);
            let addr = if attrs.is_memory { Some(addr_iter.next().unwrap_or(pc)) } else { None };
            let front = attrs.block_end != BlockEnd::None || attrs.is_atomic || attrs.is_system;

            loop {
                let store_ready = !is_store_op(op) || !self.regs.store_buffer_full();
                let dest_ready = !needs_dest || !self.regs.no_free_reg();
                let queue_ready = !self.queue.is_full();
                if store_ready && dest_ready && queue_ready {
                    break;
                }
                self.advance_cycle();
            }

            let mut entry = self.rename(op, desc, addr);
            entry.pc = pc;
            if addr.is_some() {
                entry.latency = entry.latency.max(self.dmiss_latency);
            }
            if front {
                self.queue.push_front(entry);
            } else {
                self.queue.push_back(entry);
            }

            self.advance_cycle();
            pc += u64::from(len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry_latency() -> LatencyConfig {
        LatencyConfig {
            fp: 3,
            load: 4,
            store: 10,
            alu: 1,
            jump: 1,
        }
    }

    #[test]
    fn fresh_core_has_no_cycles_or_instructions() {
        let core = OooCore::new(geometry_latency(), 30, 16);
        assert_eq!(core.cycle(), 0);
        assert_eq!(core.instructions(), 0);
        assert!(core.ipc().abs() < f64::EPSILON);
        assert_eq!(core.mismatches(), 0);
    }

    #[test]
    fn rd_is_fp_classifies_loads_and_arithmetic_but_not_int_converts() {
        assert!(rd_is_fp(Op::Flw));
        assert!(rd_is_fp(Op::FaddS));
        assert!(!rd_is_fp(Op::FcvtWS), "fcvt.w.s writes an integer rd");
        assert!(!rd_is_fp(Op::Add));
    }

    #[test]
    fn rs1_is_fp_excludes_int_to_float_conversions() {
        assert!(rs1_is_fp(Op::FaddS));
        assert!(!rs1_is_fp(Op::FcvtSW), "fcvt.s.w reads rs1 from the integer file");
        assert!(!rs1_is_fp(Op::FmvWX));
    }

    #[test]
    fn unify_offsets_floating_point_registers_by_32() {
        assert_eq!(unify(5, false), 5);
        assert_eq!(unify(5, true), 37);
        assert_eq!(unify(NOREG, true), NOREG);
    }

    #[test]
    fn queue_entry_is_not_ready_while_any_source_is_busy() {
        let mut regs = RenamingRegfile::new();
        let p = regs.rename_reg(5);
        let entry = QueueEntry {
            pc: 0,
            rd: NOREG,
            src: [p, NOREG],
            store_dep: NOREG,
            addr: None,
            is_store: false,
            latency: 1,
        };
        assert!(!entry.ready(&regs));
        regs.value_is_ready(p);
        assert!(entry.ready(&regs));
    }
}
