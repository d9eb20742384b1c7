//! Pluggable microarchitectural timing models.
//!
//! Every model here implements [`crate::strand::BlockObserver`] and is
//! driven by the interpreter after each block executes; attaching one is
//! the only thing that distinguishes a timed run from a plain functional
//! one, which is why neither model touches guest state directly.

pub mod lru;
pub mod ooo;

use crate::config::Config;
use crate::strand::{BlockObserver, NullObserver};
use crate::tcache::Block;

use lru::LruCache;
use ooo::OooCore;

/// The timing model a hart runs with, chosen once at startup from
/// [`crate::config::SimulatorMode`] and then driven uniformly through
/// [`BlockObserver`] regardless of which variant is active.
#[derive(Debug)]
pub enum TimingModel {
    /// No timing model: blocks execute at dispatch speed.
    Null(NullObserver),
    /// Set-associative instruction-cache occupancy model.
    Lru(LruCache),
    /// Renaming out-of-order cycle model.
    Ooo(OooCore),
}

impl TimingModel {
    /// Builds the model named by `config.simulator`, sized and latencied
    /// from the rest of `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        match config.simulator {
            crate::config::SimulatorMode::Null => Self::Null(NullObserver),
            crate::config::SimulatorMode::Lru => Self::Lru(LruCache::new(&config.cache)),
            crate::config::SimulatorMode::Ooo => Self::Ooo(OooCore::new(
                config.latency,
                config.cache.dmiss_latency,
                ooo::issue_queue::CAPACITY,
            )),
        }
    }
}

impl BlockObserver for TimingModel {
    fn on_block(&mut self, block: &Block<'_>, addrs: &[u64]) {
        match self {
            Self::Null(observer) => observer.on_block(block, addrs),
            Self::Lru(cache) => cache.on_block(block, addrs),
            Self::Ooo(core) => core.on_block(block, addrs),
        }
    }
}
