//! Join barrier over completion signals.

use std::collections::HashMap;

/// Counts outstanding completion signals for one batch.
///
/// A signal listed twice must fire twice. The batch is joined once every
/// expected signal has fired; signals that were never expected are ignored.
#[derive(Debug, Clone, Default)]
pub struct JoinBarrier {
    outstanding: HashMap<String, usize>,
    expected: usize,
    fired: usize,
}

impl JoinBarrier {
    pub fn new<I, S>(signals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut outstanding: HashMap<String, usize> = HashMap::new();
        let mut expected = 0;
        for signal in signals {
            *outstanding.entry(signal.into()).or_default() += 1;
            expected += 1;
        }
        Self {
            outstanding,
            expected,
            fired: 0,
        }
    }

    /// Record one completion. Returns false for unknown or already-drained signals.
    pub fn fire(&mut self, signal: &str) -> bool {
        match self.outstanding.get_mut(signal) {
            Some(remaining) => {
                *remaining -= 1;
                if *remaining == 0 {
                    self.outstanding.remove(signal);
                }
                self.fired += 1;
                true
            }
            None => false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.outstanding.is_empty()
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn fired(&self) -> usize {
        self.fired
    }

    /// Signals still outstanding, sorted.
    pub fn pending(&self) -> Vec<&str> {
        let mut pending: Vec<&str> = self.outstanding.keys().map(String::as_str).collect();
        pending.sort_unstable();
        pending
    }
}
