//! Fan-out/join coordinator.
//!
//! A batch of [`RequestDescriptor`]s is validated, then every request runs
//! concurrently: cache probe first (unless `force_load`), remote call on a
//! miss, write-back on success. The caller resumes only after every
//! request's completion signal has fired on the [`JoinBarrier`]. Failures
//! never abort the batch; each one is reified into its own [`Outcome`].

use crate::barrier::JoinBarrier;
use crate::events::{DispatchListener, ErrorEvent, ListenerChain, RequestEvent, ResponseEvent};
use crate::latest::TriggerRegistry;
use crate::outcome::{Outcome, Outcomes};
use crate::registry::ResourceRegistry;
use crate::resource::call_resource;
use chrono::Utc;
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tally_cache::{CacheStore, MergeMode, WriteOptions};
use tally_core::{DispatchError, RequestDescriptor, ResourceData, TallyConfig, TallyResult};
use tokio::sync::{RwLock as TokioRwLock, Semaphore};
use uuid::Uuid;

// ============================================================================
// OPTIONS
// ============================================================================

/// Cache and reload behaviour for dispatched requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchOptions {
    /// Skip the cache probe and always hit the network.
    pub force_load: bool,
    pub merge_mode: MergeMode,
    /// `None` uses the cache's default TTL.
    pub ttl: Option<Duration>,
    pub unique_by: Option<String>,
}

impl DispatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn force_load(mut self, force_load: bool) -> Self {
        self.force_load = force_load;
        self
    }

    /// Append results onto existing entries, de-duplicating by `unique_by`.
    pub fn append(mut self, unique_by: Option<&str>) -> Self {
        self.merge_mode = MergeMode::Append;
        self.unique_by = unique_by.map(str::to_string);
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            merge_mode: self.merge_mode,
            ttl: self.ttl,
            unique_by: self.unique_by.clone(),
        }
    }
}

/// Coordinator tuning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinatorConfig {
    /// Bound on a single remote call. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// Cap on concurrent remote calls across all batches.
    pub max_in_flight: Option<usize>,
}

impl From<&TallyConfig> for CoordinatorConfig {
    fn from(config: &TallyConfig) -> Self {
        Self {
            request_timeout: config.request_timeout,
            max_in_flight: config.max_in_flight,
        }
    }
}

// ============================================================================
// COORDINATOR
// ============================================================================

pub struct Coordinator {
    registry: Arc<ResourceRegistry>,
    cache: Arc<CacheStore>,
    listeners: TokioRwLock<ListenerChain>,
    triggers: TriggerRegistry,
    config: CoordinatorConfig,
    limiter: Option<Semaphore>,
}

impl Coordinator {
    pub fn new(registry: Arc<ResourceRegistry>, cache: Arc<CacheStore>) -> Self {
        Self::with_config(registry, cache, CoordinatorConfig::default())
    }

    pub fn with_config(
        registry: Arc<ResourceRegistry>,
        cache: Arc<CacheStore>,
        config: CoordinatorConfig,
    ) -> Self {
        let limiter = config.max_in_flight.map(Semaphore::new);
        Self {
            registry,
            cache,
            listeners: TokioRwLock::new(ListenerChain::new()),
            triggers: TriggerRegistry::new(),
            config,
            limiter,
        }
    }

    /// Build a coordinator with its own cache sized from `config`.
    pub fn from_config(registry: Arc<ResourceRegistry>, config: &TallyConfig) -> Self {
        let cache = Arc::new(CacheStore::from_config(config));
        Self::with_config(registry, cache, CoordinatorConfig::from(config))
    }

    pub async fn add_listener(&self, listener: Arc<dyn DispatchListener>) {
        self.listeners.write().await.add(listener);
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    pub fn triggers(&self) -> &TriggerRegistry {
        &self.triggers
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Run every request concurrently and return once all have completed.
    ///
    /// Errors only for an invalid batch, before anything is dispatched.
    pub async fn dispatch(
        &self,
        requests: Vec<RequestDescriptor>,
        options: &DispatchOptions,
    ) -> TallyResult<Outcomes> {
        let requests = requests
            .into_iter()
            .map(|request| (request, options.clone()))
            .collect();
        self.dispatch_each(requests).await
    }

    /// Like [`dispatch`](Self::dispatch), with options chosen per request.
    pub async fn dispatch_each(
        &self,
        requests: Vec<(RequestDescriptor, DispatchOptions)>,
    ) -> TallyResult<Outcomes> {
        validate_batch(requests.iter().map(|(request, _)| request))?;

        let batch_id = Uuid::now_v7();
        let mut barrier = JoinBarrier::new(
            requests
                .iter()
                .map(|(request, _)| request.completion_signal.clone()),
        );
        tracing::info!(
            %batch_id,
            requests = requests.len(),
            forced = requests.iter().filter(|(_, o)| o.force_load).count(),
            "Dispatching batch"
        );

        let listeners = self.listeners.read().await.clone();
        let mut in_flight: FuturesUnordered<_> = requests
            .into_iter()
            .map(|(request, options)| self.run_one(batch_id, request, options, &listeners))
            .collect();

        let mut outcomes = Outcomes::new();
        while !barrier.is_complete() {
            let Some((signal, outcome)) = in_flight.next().await else {
                break;
            };
            barrier.fire(&signal);
            outcomes.insert(outcome);
        }

        if !barrier.is_complete() {
            tracing::error!(
                %batch_id,
                pending = ?barrier.pending(),
                "Join finished with unfired completion signals"
            );
        }

        let failed = outcomes.failed().len();
        tracing::info!(
            %batch_id,
            succeeded = outcomes.len() - failed,
            failed,
            "Batch joined"
        );
        Ok(outcomes)
    }

    /// [`dispatch`](Self::dispatch) under take-latest semantics.
    ///
    /// If another call under `trigger_key` starts before this one joins,
    /// this one returns `Superseded`. Its cache writes are kept.
    pub async fn dispatch_latest(
        &self,
        trigger_key: &str,
        requests: Vec<RequestDescriptor>,
        options: &DispatchOptions,
    ) -> TallyResult<Outcomes> {
        let ticket = self.triggers.begin(trigger_key);
        let outcomes = self.dispatch(requests, options).await?;
        self.triggers.ensure_current(&ticket)?;
        Ok(outcomes)
    }

    async fn run_one(
        &self,
        batch_id: Uuid,
        request: RequestDescriptor,
        options: DispatchOptions,
        listeners: &ListenerChain,
    ) -> (String, Outcome) {
        let started = Instant::now();
        let key = request.cache_key();
        let method = request.method();

        if !options.force_load {
            if let Some(entry) = self.cache.read(&key) {
                tracing::debug!(
                    %batch_id,
                    request_id = %request.request_id,
                    resource = %request.resource,
                    "Cache hit"
                );
                let latency = started.elapsed();
                listeners
                    .emit_response(ResponseEvent {
                        batch_id,
                        request_id: request.request_id.clone(),
                        resource: request.resource.clone(),
                        method,
                        latency_ms: latency.as_millis() as u64,
                        from_cache: true,
                        timestamp: Utc::now(),
                    })
                    .await;
                let outcome = Outcome {
                    request_id: request.request_id,
                    resource: request.resource,
                    result: Ok(ResourceData::from_cached(method, entry.value)),
                    from_cache: true,
                    latency,
                };
                return (request.completion_signal, outcome);
            }
            tracing::debug!(
                %batch_id,
                request_id = %request.request_id,
                resource = %request.resource,
                "Cache miss"
            );
        }

        listeners
            .emit_request(RequestEvent {
                batch_id,
                request_id: request.request_id.clone(),
                resource: request.resource.clone(),
                method,
                timestamp: Utc::now(),
            })
            .await;

        let result = self.fetch(&request).await;
        let latency = started.elapsed();

        match &result {
            Ok(data) => {
                self.cache
                    .write(key, data.to_value(), &options.write_options());
                listeners
                    .emit_response(ResponseEvent {
                        batch_id,
                        request_id: request.request_id.clone(),
                        resource: request.resource.clone(),
                        method,
                        latency_ms: latency.as_millis() as u64,
                        from_cache: false,
                        timestamp: Utc::now(),
                    })
                    .await;
            }
            Err(e) => {
                tracing::warn!(
                    %batch_id,
                    request_id = %request.request_id,
                    resource = %request.resource,
                    error = %e,
                    "Sub-request failed"
                );
                listeners
                    .emit_error(ErrorEvent {
                        batch_id,
                        request_id: request.request_id.clone(),
                        resource: request.resource.clone(),
                        method,
                        error_message: e.to_string(),
                        timestamp: Utc::now(),
                    })
                    .await;
            }
        }

        let outcome = Outcome {
            request_id: request.request_id,
            resource: request.resource,
            result,
            from_cache: false,
            latency,
        };
        (request.completion_signal, outcome)
    }

    async fn fetch(&self, request: &RequestDescriptor) -> TallyResult<ResourceData> {
        let resource = self.registry.get(request.resource.as_str()).await?;

        // Held until the call returns.
        let _permit = match &self.limiter {
            Some(limiter) => limiter.acquire().await.ok(),
            None => None,
        };

        let call = call_resource(resource.as_ref(), &request.payload);
        match self.config.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(DispatchError::TimedOut {
                    request_id: request.request_id.to_string(),
                    after_ms: limit.as_millis() as u64,
                }
                .into()),
            },
            None => call.await,
        }
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.config)
            .field("cache_entries", &self.cache.len())
            .finish()
    }
}

fn validate_batch<'a>(requests: impl Iterator<Item = &'a RequestDescriptor>) -> TallyResult<()> {
    let mut seen = HashSet::new();
    for request in requests {
        request.validate()?;
        if !seen.insert(request.request_id.as_str()) {
            return Err(DispatchError::DuplicateRequest {
                request_id: request.request_id.to_string(),
            }
            .into());
        }
    }
    Ok(())
}
