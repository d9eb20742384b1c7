//! Configuration for the interpreter, translation cache, and timing
//! simulators.
//!
//! Mirrors the CLI's flag set one field at a time so `rvjit`'s `clap`
//! parser can build a [`Config`] directly; [`Config::default`] gives every
//! value the interpreter needs to run with no flags at all.

use serde::Deserialize;

mod defaults {
    pub const TCACHE_WORDS: usize = 1_000_000;
    pub const HASH_BUCKETS: usize = 997;
    pub const IWAYS: usize = 2;
    pub const ILINE_LOG2: u32 = 6; // 64-byte lines
    pub const IROWS_LOG2: u32 = 10; // 1024 rows
    pub const DMISS_LATENCY: u64 = 30;
    pub const FP_LATENCY: u64 = 3;
    pub const LD_LATENCY: u64 = 4;
    pub const ST_LATENCY: u64 = 10;
    pub const ALU_LATENCY: u64 = 1;
    pub const JUMP_LATENCY: u64 = 1;
}

/// Which simulator callback a hart drives its dispatched blocks through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulatorMode {
    /// No timing model; blocks execute at the functional interpreter's
    /// native speed.
    #[default]
    Null,
    /// The set-associative LRU cache model.
    Lru,
    /// The out-of-order core simulator.
    Ooo,
}

/// Translation cache sizing.
#[derive(Debug, Clone, Deserialize)]
pub struct TcacheConfig {
    /// Descriptor-arena extent, in words (`--tcache`).
    #[serde(default = "TcacheConfig::default_words")]
    pub words: usize,
    /// Hash table row count, best prime (`--hash`).
    #[serde(default = "TcacheConfig::default_hash")]
    pub hash_buckets: usize,
}

impl TcacheConfig {
    fn default_words() -> usize {
        defaults::TCACHE_WORDS
    }

    fn default_hash() -> usize {
        defaults::HASH_BUCKETS
    }
}

impl Default for TcacheConfig {
    fn default() -> Self {
        Self {
            words: defaults::TCACHE_WORDS,
            hash_buckets: defaults::HASH_BUCKETS,
        }
    }
}

/// Debug and tracing toggles (`--show`, `--gdb`, `--ecall`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DebugConfig {
    /// Print every dispatched instruction (`--show`).
    #[serde(default)]
    pub show_trace: bool,
    /// Print every syscall and its result (`--ecall`).
    #[serde(default)]
    pub trace_syscalls: bool,
    /// `host:port` to accept a remote GDB connection on (`--gdb`).
    #[serde(default)]
    pub gdb: Option<String>,
}

/// LRU instruction-cache model geometry (`--iways`, `--iline`, `--irows`,
/// `--dmiss`).
#[derive(Debug, Clone, Deserialize)]
pub struct CacheGeometry {
    /// Associativity, up to 6 (see [`crate::sim::lru::fsm`]).
    #[serde(default = "CacheGeometry::default_ways")]
    pub ways: usize,
    /// log2 of the line size in bytes.
    #[serde(default = "CacheGeometry::default_line_log2")]
    pub line_log2: u32,
    /// log2 of the number of rows (sets).
    #[serde(default = "CacheGeometry::default_rows_log2")]
    pub rows_log2: u32,
    /// Data-cache miss latency in cycles, for the OoO memory port
    /// (`--dmiss`).
    #[serde(default = "CacheGeometry::default_dmiss")]
    pub dmiss_latency: u64,
}

impl CacheGeometry {
    fn default_ways() -> usize {
        defaults::IWAYS
    }

    fn default_line_log2() -> u32 {
        defaults::ILINE_LOG2
    }

    fn default_rows_log2() -> u32 {
        defaults::IROWS_LOG2
    }

    fn default_dmiss() -> u64 {
        defaults::DMISS_LATENCY
    }
}

impl Default for CacheGeometry {
    fn default() -> Self {
        Self {
            ways: defaults::IWAYS,
            line_log2: defaults::ILINE_LOG2,
            rows_log2: defaults::IROWS_LOG2,
            dmiss_latency: defaults::DMISS_LATENCY,
        }
    }
}

/// Per-opcode-class latencies the OoO core schedules result-bus arrival
/// with (`--fp`, `--ld`, `--st`, `--alu`, `--jump`).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LatencyConfig {
    /// FP op latency in cycles.
    #[serde(default = "LatencyConfig::default_fp")]
    pub fp: u64,
    /// Load latency in cycles.
    #[serde(default = "LatencyConfig::default_ld")]
    pub load: u64,
    /// Store latency in cycles (the store buffer retires it at issue; this
    /// is only the memory-port occupancy).
    #[serde(default = "LatencyConfig::default_st")]
    pub store: u64,
    /// Integer ALU op latency in cycles.
    #[serde(default = "LatencyConfig::default_alu")]
    pub alu: u64,
    /// Branch/jump latency in cycles.
    #[serde(default = "LatencyConfig::default_jump")]
    pub jump: u64,
}

impl LatencyConfig {
    fn default_fp() -> u64 {
        defaults::FP_LATENCY
    }

    fn default_ld() -> u64 {
        defaults::LD_LATENCY
    }

    fn default_st() -> u64 {
        defaults::ST_LATENCY
    }

    fn default_alu() -> u64 {
        defaults::ALU_LATENCY
    }

    fn default_jump() -> u64 {
        defaults::JUMP_LATENCY
    }
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            fp: defaults::FP_LATENCY,
            load: defaults::LD_LATENCY,
            store: defaults::ST_LATENCY,
            alu: defaults::ALU_LATENCY,
            jump: defaults::JUMP_LATENCY,
        }
    }
}

/// Root configuration, built by the CLI from flags or, for embedding, from
/// JSON via [`serde_json`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Translation cache sizing.
    #[serde(default)]
    pub tcache: TcacheConfig,
    /// Debug/tracing toggles.
    #[serde(default)]
    pub debug: DebugConfig,
    /// Which simulator callback to drive.
    #[serde(default)]
    pub simulator: SimulatorMode,
    /// LRU cache model geometry.
    #[serde(default)]
    pub cache: CacheGeometry,
    /// OoO core per-opcode-class latencies.
    #[serde(default)]
    pub latency: LatencyConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_cli_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.tcache.words, 1_000_000);
        assert_eq!(cfg.tcache.hash_buckets, 997);
        assert_eq!(cfg.latency.fp, 3);
        assert_eq!(cfg.latency.load, 4);
        assert_eq!(cfg.latency.store, 10);
        assert_eq!(cfg.latency.alu, 1);
        assert_eq!(cfg.simulator, SimulatorMode::Null);
    }

    #[test]
    fn deserializes_partial_json_with_remaining_defaults() {
        let json = r#"{"debug": {"show_trace": true}}"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert!(cfg.debug.show_trace);
        assert_eq!(cfg.tcache.words, 1_000_000);
    }
}
