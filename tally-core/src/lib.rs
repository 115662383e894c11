//! Tally Core - Shared Types
//!
//! Request descriptors, response shapes, the error taxonomy and runtime
//! configuration used by every other tally crate. This crate performs no
//! I/O of its own.

pub mod config;
pub mod constants;
pub mod error;
pub mod response;
pub mod types;

pub use config::TallyConfig;
pub use constants::*;
pub use error::{
    ConfigError, DispatchError, ResourceError, TallyError, TallyResult, ValidationError,
};
pub use response::{ListResponse, ResourceData};
pub use types::{CacheKey, Method, RequestDescriptor, RequestId, RequestPayload, ResourceName};
