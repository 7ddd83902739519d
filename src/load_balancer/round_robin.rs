//! Round-robin selection over available pool entries.

use crate::load_balancer::{pool::PoolEntry, Selector};

/// Round-robin selector.
/// Keeps a cursor into the entry list and skips entries that are checked out.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Selector for RoundRobin {
    fn select(&mut self, entries: &[PoolEntry]) -> Option<usize> {
        let len = entries.len();
        if len == 0 {
            return None;
        }

        let start = self.cursor % len;
        for i in 0..len {
            let index = (start + i) % len;
            if entries[index].is_available() {
                self.cursor = index + 1;
                return Some(index);
            }
        }
        None
    }

    fn removed(&mut self, index: usize) {
        // Keep pointing at the same successor after the list shifts left.
        if index < self.cursor {
            self.cursor -= 1;
        }
    }
}
