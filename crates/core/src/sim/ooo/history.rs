//! The phantom reorder buffer: a bounded ring of recently retired
//! instructions kept purely for inspection (the `--show`-style post-mortem
//! a crashed or finished run prints), not for any re-ordering function —
//! [`super::OooCore`] retires in the order the write-port wheel hands
//! completions back, and this just remembers the last few for display.

/// One retired instruction's timing summary.
#[derive(Debug, Clone, Copy)]
pub struct Retired {
    /// Guest PC.
    pub pc: u64,
    /// Cycle it issued.
    pub issue_cycle: u64,
    /// Cycle its result became available.
    pub complete_cycle: u64,
}

/// Ring buffer capacity; matches the sampling depth a terminal-sized trace
/// dump needs, not a hard architectural limit.
const CAPACITY: usize = 64;

/// Fixed-capacity history of the most recently retired instructions.
#[derive(Debug)]
pub struct History {
    entries: Vec<Retired>,
    next: usize,
    filled: bool,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    /// An empty history.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: vec![
                Retired {
                    pc: 0,
                    issue_cycle: 0,
                    complete_cycle: 0
                };
                CAPACITY
            ],
            next: 0,
            filled: false,
        }
    }

    /// Records one retired instruction, overwriting the oldest entry once
    /// the ring is full.
    pub fn push(&mut self, entry: Retired) {
        self.entries[self.next] = entry;
        self.next = (self.next + 1) % CAPACITY;
        if self.next == 0 {
            self.filled = true;
        }
    }

    /// The recorded entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<Retired> {
        if !self.filled {
            self.entries[..self.next].to_vec()
        } else {
            let mut ordered = self.entries[self.next..].to_vec();
            ordered.extend_from_slice(&self.entries[..self.next]);
            ordered
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pc: u64) -> Retired {
        Retired {
            pc,
            issue_cycle: pc,
            complete_cycle: pc + 1,
        }
    }

    #[test]
    fn entries_preserve_insertion_order_before_wraparound() {
        let mut h = History::new();
        h.push(entry(1));
        h.push(entry(2));
        let pcs: Vec<u64> = h.entries().iter().map(|e| e.pc).collect();
        assert_eq!(pcs, vec![1, 2]);
    }

    #[test]
    fn ring_wraps_and_drops_the_oldest() {
        let mut h = History::new();
        for pc in 0..(CAPACITY as u64 + 5) {
            h.push(entry(pc));
        }
        let pcs: Vec<u64> = h.entries().iter().map(|e| e.pc).collect();
        assert_eq!(pcs.len(), CAPACITY);
        assert_eq!(*pcs.first().unwrap(), 5);
        assert_eq!(*pcs.last().unwrap(), CAPACITY as u64 + 4);
    }
}
