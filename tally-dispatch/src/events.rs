//! Dispatch observability hooks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tally_core::{Method, RequestId, ResourceName, TallyResult};
use uuid::Uuid;

// ============================================================================
// EVENTS
// ============================================================================

/// Emitted when a sub-request goes to the network.
#[derive(Debug, Clone)]
pub struct RequestEvent {
    pub batch_id: Uuid,
    pub request_id: RequestId,
    pub resource: ResourceName,
    pub method: Method,
    pub timestamp: DateTime<Utc>,
}

/// Emitted when a sub-request produced data, from the cache or the network.
#[derive(Debug, Clone)]
pub struct ResponseEvent {
    pub batch_id: Uuid,
    pub request_id: RequestId,
    pub resource: ResourceName,
    pub method: Method,
    pub latency_ms: u64,
    pub from_cache: bool,
    pub timestamp: DateTime<Utc>,
}

/// Emitted when a sub-request failed.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub batch_id: Uuid,
    pub request_id: RequestId,
    pub resource: ResourceName,
    pub method: Method,
    pub error_message: String,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// LISTENERS
// ============================================================================

/// Async trait for dispatch listeners.
#[async_trait]
pub trait DispatchListener: Send + Sync {
    async fn on_request(&self, event: RequestEvent) -> TallyResult<()>;
    async fn on_response(&self, event: ResponseEvent) -> TallyResult<()>;
    async fn on_error(&self, event: ErrorEvent) -> TallyResult<()>;
}

/// Chain of dispatch listeners. A failing listener is logged and skipped.
#[derive(Default, Clone)]
pub struct ListenerChain {
    listeners: Vec<Arc<dyn DispatchListener>>,
}

impl ListenerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: Arc<dyn DispatchListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub async fn emit_request(&self, event: RequestEvent) {
        for (idx, listener) in self.listeners.iter().enumerate() {
            if let Err(e) = listener.on_request(event.clone()).await {
                tracing::warn!(
                    listener_index = idx,
                    error = %e,
                    "Dispatch request listener failed"
                );
            }
        }
    }

    pub async fn emit_response(&self, event: ResponseEvent) {
        for (idx, listener) in self.listeners.iter().enumerate() {
            if let Err(e) = listener.on_response(event.clone()).await {
                tracing::warn!(
                    listener_index = idx,
                    error = %e,
                    "Dispatch response listener failed"
                );
            }
        }
    }

    pub async fn emit_error(&self, event: ErrorEvent) {
        for (idx, listener) in self.listeners.iter().enumerate() {
            if let Err(e) = listener.on_error(event.clone()).await {
                tracing::warn!(
                    listener_index = idx,
                    error = %e,
                    "Dispatch error listener failed"
                );
            }
        }
    }
}

impl std::fmt::Debug for ListenerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerChain")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
