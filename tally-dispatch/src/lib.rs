//! Tally Dispatch - Fan-out/Join Coordinator
//!
//! Resources are registered once in a [`ResourceRegistry`]. The
//! [`Coordinator`] takes a batch of request descriptors, serves what it can
//! from the shared [`tally_cache::CacheStore`], calls the rest concurrently
//! and joins on every completion signal before returning [`Outcomes`].
//!
//! Entry points that a user can re-trigger go through
//! [`Coordinator::dispatch_latest`], which discards the result of a run
//! that a newer run under the same key has overtaken.

pub mod barrier;
pub mod coordinator;
pub mod events;
#[cfg(feature = "http")]
pub mod http;
pub mod latest;
pub mod outcome;
pub mod registry;
pub mod resource;

pub use barrier::JoinBarrier;
pub use coordinator::{Coordinator, CoordinatorConfig, DispatchOptions};
pub use events::{DispatchListener, ErrorEvent, ListenerChain, RequestEvent, ResponseEvent};
#[cfg(feature = "http")]
pub use http::RestResource;
pub use latest::{TriggerRegistry, TriggerTicket};
pub use outcome::{Outcome, Outcomes};
pub use registry::ResourceRegistry;
pub use resource::{call_resource, Resource};
