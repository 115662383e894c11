//! Per-request outcomes of a joined batch.

use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tally_core::{ListResponse, RequestId, ResourceData, ResourceName, TallyError};

/// Result of one sub-request. Failures are values, never panics or early returns.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub request_id: RequestId,
    pub resource: ResourceName,
    pub result: Result<ResourceData, TallyError>,
    pub from_cache: bool,
    pub latency: Duration,
}

impl Outcome {
    pub fn data(&self) -> Option<&ResourceData> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&TallyError> {
        self.result.as_ref().err()
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// All outcomes of one batch, keyed by request id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcomes {
    inner: HashMap<RequestId, Outcome>,
}

impl Outcomes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, outcome: Outcome) {
        self.inner.insert(outcome.request_id.clone(), outcome);
    }

    pub fn get(&self, request_id: &str) -> Option<&Outcome> {
        self.inner.get(request_id)
    }

    /// List data for a request, if it succeeded with a list.
    pub fn list(&self, request_id: &str) -> Option<&ListResponse> {
        self.get(request_id)?.data()?.as_list()
    }

    /// Record data for a request, if it succeeded with a single record.
    pub fn record(&self, request_id: &str) -> Option<&Value> {
        self.get(request_id)?.data()?.as_record()
    }

    pub fn error(&self, request_id: &str) -> Option<&TallyError> {
        self.get(request_id)?.error()
    }

    /// Ids of failed requests, sorted.
    pub fn failed(&self) -> Vec<&RequestId> {
        let mut failed: Vec<_> = self
            .inner
            .values()
            .filter(|o| !o.is_ok())
            .map(|o| &o.request_id)
            .collect();
        failed.sort();
        failed
    }

    pub fn all_succeeded(&self) -> bool {
        self.inner.values().all(Outcome::is_ok)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RequestId, &Outcome)> {
        self.inner.iter()
    }
}

impl IntoIterator for Outcomes {
    type Item = (RequestId, Outcome);
    type IntoIter = std::collections::hash_map::IntoIter<RequestId, Outcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tally_core::ResourceError;

    fn ok(id: &str, data: ResourceData) -> Outcome {
        Outcome {
            request_id: RequestId::from(id),
            resource: ResourceName::from("tickets"),
            result: Ok(data),
            from_cache: false,
            latency: Duration::ZERO,
        }
    }

    #[test]
    fn test_accessors() {
        let mut outcomes = Outcomes::new();
        outcomes.insert(ok("a", ResourceData::List(ListResponse::new(vec![], 7))));
        outcomes.insert(ok("b", ResourceData::Record(json!({"id": "x"}))));
        outcomes.insert(Outcome {
            result: Err(ResourceError::NotFound {
                resource: "tickets".to_string(),
                id: "y".to_string(),
            }
            .into()),
            ..ok("c", ResourceData::Record(json!(null)))
        });

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes.list("a").unwrap().total_count, 7);
        assert!(outcomes.list("b").is_none());
        assert_eq!(outcomes.record("b").unwrap()["id"], "x");
        assert!(outcomes.error("c").is_some());
        assert_eq!(outcomes.failed(), vec![&RequestId::from("c")]);
        assert!(!outcomes.all_succeeded());
    }
}
