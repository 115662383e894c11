//! Take-latest trigger tracking.

use dashmap::DashMap;
use tally_core::{DispatchError, TallyResult};

/// Generation counter per trigger key.
///
/// Each new run under a key bumps its generation. A run holding an older
/// ticket is stale: it may finish, but its result must be discarded.
#[derive(Debug, Default)]
pub struct TriggerRegistry {
    generations: DashMap<String, u64>,
}

/// Proof of which generation a run started as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerTicket {
    pub key: String,
    pub generation: u64,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new run under `key`, superseding any in-flight one.
    pub fn begin(&self, key: &str) -> TriggerTicket {
        let mut slot = self.generations.entry(key.to_string()).or_insert(0);
        *slot += 1;
        let generation = *slot;
        drop(slot);
        tracing::trace!(trigger = key, generation, "Trigger started");
        TriggerTicket {
            key: key.to_string(),
            generation,
        }
    }

    /// Latest generation started under `key`, zero if none.
    pub fn current(&self, key: &str) -> u64 {
        self.generations.get(key).map(|g| *g).unwrap_or(0)
    }

    pub fn is_current(&self, ticket: &TriggerTicket) -> bool {
        self.current(&ticket.key) == ticket.generation
    }

    /// Fail with `Superseded` if a newer run started after `ticket`.
    pub fn ensure_current(&self, ticket: &TriggerTicket) -> TallyResult<()> {
        let latest = self.current(&ticket.key);
        if latest == ticket.generation {
            Ok(())
        } else {
            tracing::debug!(
                trigger = %ticket.key,
                stale = ticket.generation,
                latest,
                "Discarding superseded run"
            );
            Err(DispatchError::Superseded {
                trigger: ticket.key.clone(),
                generation: latest,
            }
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::TallyError;

    #[test]
    fn test_newer_ticket_supersedes() {
        let triggers = TriggerRegistry::new();
        let first = triggers.begin("form-1");
        let second = triggers.begin("form-1");

        assert!(!triggers.is_current(&first));
        assert!(triggers.is_current(&second));
        assert_eq!(
            triggers.ensure_current(&first),
            Err(TallyError::Dispatch(DispatchError::Superseded {
                trigger: "form-1".to_string(),
                generation: 2,
            }))
        );
        assert!(triggers.ensure_current(&second).is_ok());
    }

    #[test]
    fn test_keys_are_independent() {
        let triggers = TriggerRegistry::new();
        let a = triggers.begin("a");
        triggers.begin("b");
        assert!(triggers.is_current(&a));
        assert_eq!(triggers.current("missing"), 0);
    }
}
