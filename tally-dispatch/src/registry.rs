//! Typed resource registry.

use crate::resource::Resource;
use std::collections::HashMap;
use std::sync::Arc;
use tally_core::{ResourceError, ResourceName, TallyResult};
use tokio::sync::RwLock as TokioRwLock;

/// Resources keyed by name, registered once at startup.
#[derive(Default)]
pub struct ResourceRegistry {
    resources: TokioRwLock<HashMap<ResourceName, Arc<dyn Resource>>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource, replacing any previous one with the same name.
    pub async fn register(&self, resource: Arc<dyn Resource>) {
        let name = ResourceName::from(resource.name());
        tracing::debug!(resource = %name, "Registered resource");
        self.resources.write().await.insert(name, resource);
    }

    pub async fn unregister(&self, name: &str) -> bool {
        self.resources.write().await.remove(name).is_some()
    }

    /// Look up a resource by name.
    pub async fn get(&self, name: &str) -> TallyResult<Arc<dyn Resource>> {
        self.resources
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| {
                ResourceError::NotRegistered {
                    resource: name.to_string(),
                }
                .into()
            })
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.resources.read().await.contains_key(name)
    }

    /// Registered names, sorted.
    pub async fn names(&self) -> Vec<ResourceName> {
        let mut names: Vec<_> = self.resources.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry").finish_non_exhaustive()
    }
}
