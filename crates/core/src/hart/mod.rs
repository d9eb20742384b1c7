//! The hart controller: owns the shared guest memory and translation cache,
//! runs each strand's dispatch loop on its own OS thread, and wires the
//! syscall proxy's `clone`/`exit` outcomes back into thread lifecycle.
//!
//! A "hart" here is a host thread running one strand to completion (or
//! until it `clone`s a sibling). The controller keeps a list of live harts
//! purely for bookkeeping — `--show`/diagnostics and an orderly
//! `exit_group` — not for scheduling; the OS scheduler does that.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use crate::common::error::GuestError;
use crate::common::memory::FlatMemory;
use crate::config::Config;
use crate::strand::{run_block, BlockOutcome, Strand};
use crate::syscall::{self, BrkState};
use crate::tcache::TranslationCache;

/// One live hart's bookkeeping entry.
#[derive(Debug)]
struct HartRecord {
    tid: i32,
}

/// Shared state every hart's dispatch loop reads from: the flat guest
/// mapping, the translation cache, and the `brk` watermark. `Arc`'d rather
/// than behind a single top-level lock because every one of `FlatMemory`,
/// `TranslationCache`, and `BrkState` already does its own fine-grained
/// synchronization (see their respective module docs) — a controller-wide
/// mutex would only add contention without adding correctness.
pub struct HartController {
    mem: Arc<FlatMemory>,
    tcache: Arc<TranslationCache>,
    brk: BrkState,
    config: Config,
    harts: Mutex<Vec<HartRecord>>,
    /// Set by the first strand to call `exit_group`; every other hart's
    /// dispatch loop checks this between blocks and unwinds promptly.
    shutting_down: AtomicBool,
    exit_code: AtomicI32,
}

/// Why a strand's dispatch loop stopped.
#[derive(Debug)]
enum StrandExit {
    Exited(i32),
    Faulted(GuestError),
}

impl HartController {
    /// Builds a controller over an already-loaded guest image.
    #[must_use]
    pub fn new(mem: FlatMemory, initial_brk: u64, config: Config) -> Arc<Self> {
        let tcache = TranslationCache::new(config.tcache.words, config.tcache.hash_buckets);
        Arc::new(Self {
            mem: Arc::new(mem),
            tcache: Arc::new(tcache),
            brk: BrkState::new(initial_brk),
            config,
            harts: Mutex::new(Vec::new()),
            shutting_down: AtomicBool::new(false),
            exit_code: AtomicI32::new(0),
        })
    }

    /// Runs the process's first strand on the calling thread until it exits
    /// or the whole process is torn down by an `exit_group` from any hart
    /// (its own or a `clone`d child's). Returns the guest's exit status.
    pub fn run_main(self: &Arc<Self>, entry: u64, sp: u64) -> i32 {
        let mut strand = Strand::new(entry, std::process::id() as i32);
        strand.regs.xrf[crate::isa::abi::REG_SP as usize] = sp;
        self.register(strand.tid);
        match self.run_strand(strand) {
            StrandExit::Exited(code) => code,
            StrandExit::Faulted(err) => {
                tracing::error!(%err, "strand faulted");
                1
            }
        }
    }

    fn register(&self, tid: i32) {
        self.harts.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(HartRecord { tid });
    }

    fn deregister(&self, tid: i32) {
        self.harts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .retain(|h| h.tid != tid);
    }

    /// Drives one strand's dispatch loop to completion, spawning a sibling
    /// host thread whenever it `clone`s and blocking this thread only long
    /// enough to learn the child's TID.
    fn run_strand(self: &Arc<Self>, mut strand: Strand) -> StrandExit {
        let mut observer = crate::sim::TimingModel::from_config(&self.config);
        loop {
            if self.shutting_down.load(Ordering::Acquire) {
                return StrandExit::Exited(self.exit_code.load(Ordering::Acquire));
            }

            let outcome = run_block(&mut strand.regs, &mut strand.pc, &self.mem, &self.tcache, &mut observer);
            let outcome = match outcome {
                Ok(o) => o,
                Err(err) => {
                    self.deregister(strand.tid);
                    return StrandExit::Faulted(err);
                }
            };

            match outcome {
                BlockOutcome::Advance | BlockOutcome::Ebreak => {}
                BlockOutcome::Ecall => match self.service_ecall(&mut strand) {
                    EcallResult::Continue => {}
                    EcallResult::Exit(code) => {
                        self.deregister(strand.tid);
                        return StrandExit::Exited(code);
                    }
                },
            }
        }
    }

    fn service_ecall(self: &Arc<Self>, strand: &mut Strand) -> EcallResult {
        let outcome = syscall::dispatch(&mut strand.regs, &self.mem, &self.brk, self.config.debug.trace_syscalls);
        match outcome {
            syscall::Outcome::Handled => EcallResult::Continue,
            syscall::Outcome::Exit { code, whole_process } => {
                if whole_process {
                    self.exit_code.store(code, Ordering::Release);
                    self.shutting_down.store(true, Ordering::Release);
                }
                EcallResult::Exit(code)
            }
            syscall::Outcome::Clone(args) => {
                self.spawn_child(strand, args);
                EcallResult::Continue
            }
        }
    }

    /// Spawns the `clone`d child on its own host thread with a private
    /// [`crate::syscall::clone::CHILD_STACK_BYTES`] stack, blocks the
    /// calling (parent) strand until the child has a TID, and writes that
    /// TID into the parent's `a0`.
    fn spawn_child(self: &Arc<Self>, parent: &mut Strand, args: crate::syscall::clone::CloneArgs) {
        let (tx, rx) = mpsc::channel();
        let controller = Arc::clone(self);
        let child_strand = args.spawn_strand(&parent.regs, parent.pc, 0);

        let build_result = std::thread::Builder::new()
            .stack_size(crate::syscall::clone::CHILD_STACK_BYTES)
            .spawn(move || {
                // SAFETY: `gettid` takes no arguments and cannot fail; it is
                // how the child learns the host-assigned TID Linux will
                // also report to `gettid()`/futex wakers on this thread.
                let tid = unsafe { libc::syscall(libc::SYS_gettid) } as i32;
                let mut child_strand = child_strand;
                child_strand.tid = tid;
                controller.register(tid);
                let _ = tx.send(tid);
                controller.run_strand(child_strand);
            });

        match build_result {
            Ok(_join_handle) => {
                let tid = rx.recv().unwrap_or(-1);
                parent.regs.write_int(crate::isa::abi::REG_A0, tid as u64);
            }
            Err(err) => {
                tracing::error!(%err, "clone: failed to spawn host thread");
                parent
                    .regs
                    .write_int(crate::isa::abi::REG_A0, (-i64::from(libc::EAGAIN)) as u64);
            }
        }
    }
}

enum EcallResult {
    Continue,
    Exit(i32),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_word(mem: &FlatMemory, addr: u64, word: u32) {
        mem.write_bytes(addr, &word.to_le_bytes()).unwrap();
    }

    fn encode_i(imm: i32, rs1: u8, funct3: u32, rd: u8, opcode: u32) -> u32 {
        ((imm as u32) << 20) | (u32::from(rs1) << 15) | (funct3 << 12) | (u32::from(rd) << 7) | opcode
    }

    #[test]
    fn run_main_executes_until_exit_group() {
        let mem = FlatMemory::new(1 << 16).unwrap();
        // addi a0, x0, 7; addi a7, x0, 94 (exit_group); ecall
        write_word(&mem, 0, encode_i(7, 0, 0b000, crate::isa::abi::REG_A0, 0x13));
        write_word(&mem, 4, encode_i(94, 0, 0b000, crate::isa::abi::REG_A7, 0x13));
        write_word(&mem, 8, 0x0000_0073);
        let controller = HartController::new(mem, 1 << 12, Config::default());
        let code = controller.run_main(0, 1 << 15);
        assert_eq!(code, 7);
    }
}
