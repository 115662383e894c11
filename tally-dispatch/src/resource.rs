//! The remote resource seam.

use async_trait::async_trait;
use serde_json::Value;
use tally_core::{ListResponse, RequestPayload, ResourceData, ResourceError, TallyResult};

/// A named remote collection the coordinator can call.
///
/// Implementations wrap whatever transport the host application uses.
/// The coordinator never inspects record contents.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Name the resource is registered under.
    fn name(&self) -> &str;

    /// List records matching `filter`.
    async fn list(&self, filter: &Value) -> TallyResult<ListResponse>;

    /// Fetch one record by id.
    async fn get(&self, id: &str) -> TallyResult<Value> {
        Err(ResourceError::RequestFailed {
            resource: self.name().to_string(),
            status: 405,
            message: format!("get({}) is not supported", id),
        }
        .into())
    }
}

/// Route a payload to the matching resource method.
pub async fn call_resource(
    resource: &dyn Resource,
    payload: &RequestPayload,
) -> TallyResult<ResourceData> {
    match payload {
        RequestPayload::List { filter } => resource.list(filter).await.map(ResourceData::List),
        RequestPayload::Get { id } => resource.get(id).await.map(ResourceData::Record),
    }
}
