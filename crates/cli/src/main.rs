//! Command-line entry point for the `rvjit` user-mode RISC-V interpreter.
//!
//! Parses CLI flags into a [`rvjit_core::Config`], loads the guest ELF,
//! builds its initial process image, and runs it to completion on the
//! [`rvjit_core::HartController`], exiting with the guest's own exit code.
//!
//! Signal handling (`SIGSEGV`/`SIGABRT`/`SIGINT`, debug-mode only) is not
//! yet wired up here; see `DESIGN.md`'s Open Items.

use std::fs;
use std::process::ExitCode;

use clap::Parser;

use rvjit_core::common::memory::FlatMemory;
use rvjit_core::config::{Config, SimulatorMode};
use rvjit_core::elf;
use rvjit_core::hart::HartController;

/// Guest stack size, reserved at the top of the mapping.
const STACK_SIZE: u64 = 8 * 1024 * 1024;

/// Guest address space reserved past the highest loaded segment, for the
/// heap (`brk`) and the stack.
const RESERVED_TAIL: u64 = 256 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(
    name = "rvjit",
    author,
    version,
    about = "User-mode RV64GC interpreter with a pluggable timing simulator",
    long_about = "Runs a statically linked RV64GC Linux ELF binary, interpreting it one \
basic block at a time and optionally driving a microarchitectural timing model off the \
same block stream."
)]
struct Cli {
    /// The guest ELF binary to run.
    binary: String,

    /// Arguments passed to the guest program (its own `argv[1..]`).
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    guest_args: Vec<String>,

    /// Optional JSON config file; CLI flags override its values.
    #[arg(long)]
    config: Option<String>,

    /// Translation cache size, in 64-bit words.
    #[arg(long)]
    tcache: Option<usize>,

    /// Translation cache hash table bucket count.
    #[arg(long)]
    hash: Option<usize>,

    /// Print a per-instruction trace.
    #[arg(long)]
    show: bool,

    /// Enable a remote debug listener at `host:port` (reserved, not yet implemented).
    #[arg(long)]
    gdb: Option<String>,

    /// Trace every syscall dispatched.
    #[arg(long)]
    ecall: bool,

    /// Timing simulator to drive off the block-execution stream (`null`, `lru`, or `ooo`).
    #[arg(long)]
    sim: Option<String>,

    /// Instruction cache associativity.
    #[arg(long)]
    iways: Option<usize>,

    /// log2 of the instruction cache line size.
    #[arg(long)]
    iline: Option<u32>,

    /// log2 of the instruction cache row (set) count.
    #[arg(long)]
    irows: Option<u32>,

    /// Data-miss penalty in cycles, for the out-of-order model's memory accesses.
    #[arg(long)]
    dmiss: Option<u64>,

    /// Floating-point operation latency in cycles.
    #[arg(long)]
    fp: Option<u64>,

    /// Load latency in cycles.
    #[arg(long)]
    ld: Option<u64>,

    /// Store latency in cycles.
    #[arg(long)]
    st: Option<u64>,

    /// ALU operation latency in cycles.
    #[arg(long)]
    alu: Option<u64>,

    /// Jump/branch latency in cycles.
    #[arg(long)]
    jump: Option<u64>,
}

impl Cli {
    /// Builds the effective `Config`: file (if given) under CLI flags.
    fn resolve_config(&self) -> Result<Config, String> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|e| format!("reading config {path}: {e}"))?;
                serde_json::from_str(&text).map_err(|e| format!("parsing config {path}: {e}"))?
            }
            None => Config::default(),
        };

        if let Some(words) = self.tcache {
            config.tcache.words = words;
        }
        if let Some(buckets) = self.hash {
            config.tcache.hash_buckets = buckets;
        }
        config.debug.show_trace |= self.show;
        config.debug.trace_syscalls |= self.ecall;
        if self.gdb.is_some() {
            config.debug.gdb = self.gdb.clone();
        }
        if let Some(mode) = &self.sim {
            config.simulator = match mode.as_str() {
                "null" => SimulatorMode::Null,
                "lru" => SimulatorMode::Lru,
                "ooo" => SimulatorMode::Ooo,
                other => return Err(format!("unknown --sim mode {other:?}, expected null|lru|ooo")),
            };
        }
        if let Some(ways) = self.iways {
            config.cache.ways = ways;
        }
        if let Some(line_log2) = self.iline {
            config.cache.line_log2 = line_log2;
        }
        if let Some(rows_log2) = self.irows {
            config.cache.rows_log2 = rows_log2;
        }
        if let Some(dmiss) = self.dmiss {
            config.cache.dmiss_latency = dmiss;
        }
        if let Some(fp) = self.fp {
            config.latency.fp = fp;
        }
        if let Some(load) = self.ld {
            config.latency.load = load;
        }
        if let Some(store) = self.st {
            config.latency.store = store;
        }
        if let Some(alu) = self.alu {
            config.latency.alu = alu;
        }
        if let Some(jump) = self.jump {
            config.latency.jump = jump;
        }

        Ok(config)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(message) => {
            tracing::error!(%message, "fatal error");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<i32, String> {
    let config = cli.resolve_config()?;

    tracing::info!(binary = %cli.binary, sim = ?config.simulator, "starting rvjit");

    let data = fs::read(&cli.binary).map_err(|e| format!("reading {}: {e}", cli.binary))?;

    // Size generously past the highest loaded segment: nothing else
    // reserves address space afterward, so brk and the stack share it.
    let probe_len = data.len() as u64 + RESERVED_TAIL + STACK_SIZE;
    let mem = FlatMemory::new(probe_len as usize).map_err(|e| format!("reserving guest memory: {e}"))?;

    let image = elf::load(&data, &mem).map_err(|e| format!("loading {}: {e}", cli.binary))?;

    let stack_top = mem.len() as u64;
    let mut argv = vec![cli.binary.clone()];
    argv.extend(cli.guest_args.iter().cloned());
    let envp: Vec<String> = std::env::vars().map(|(k, v)| format!("{k}={v}")).collect();
    let random = {
        let mut bytes = [0u8; 16];
        // SAFETY: getrandom with no flags blocks until the OS entropy pool
        // is initialized, same guarantee `/dev/urandom` gives after boot.
        let written = unsafe { libc::getrandom(bytes.as_mut_ptr().cast(), bytes.len(), 0) };
        if written != bytes.len() as isize {
            return Err("getrandom failed to fill AT_RANDOM bytes".to_owned());
        }
        bytes
    };

    let loaded = elf::build_stack(&mem, stack_top, &argv, &envp, &image, random);

    let controller = HartController::new(mem, loaded.initial_brk, config);
    let code = controller.run_main(loaded.entry, loaded.sp);
    Ok(code)
}
