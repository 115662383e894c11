//! Request descriptors and cache keys

use crate::constants::COMPLETION_SIGNAL_PREFIX;
use crate::{TallyResult, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Borrow;
use std::fmt;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_newtype!(
    /// Name a remote resource is registered under.
    ResourceName
);

string_newtype!(
    /// Disambiguates concurrent invocations of the same resource and method.
    RequestId
);

/// Remote call method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    List,
    Get,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::List => "list",
            Method::Get => "get",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to send to the resource. The method follows from the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum RequestPayload {
    List { filter: Value },
    Get { id: String },
}

impl RequestPayload {
    pub fn method(&self) -> Method {
        match self {
            RequestPayload::List { .. } => Method::List,
            RequestPayload::Get { .. } => Method::Get,
        }
    }
}

/// One sub-request of a fan-out batch. Immutable once dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub resource: ResourceName,
    #[serde(flatten)]
    pub payload: RequestPayload,
    pub request_id: RequestId,
    pub completion_signal: String,
}

impl RequestDescriptor {
    /// Build a list request with the default completion signal.
    pub fn list(
        resource: impl Into<ResourceName>,
        request_id: impl Into<RequestId>,
        filter: Value,
    ) -> Self {
        Self::with_payload(resource.into(), request_id.into(), RequestPayload::List { filter })
    }

    /// Build a get request with the default completion signal.
    pub fn get(
        resource: impl Into<ResourceName>,
        request_id: impl Into<RequestId>,
        id: impl Into<String>,
    ) -> Self {
        Self::with_payload(
            resource.into(),
            request_id.into(),
            RequestPayload::Get { id: id.into() },
        )
    }

    fn with_payload(resource: ResourceName, request_id: RequestId, payload: RequestPayload) -> Self {
        let completion_signal = default_completion_signal(&resource, &request_id);
        Self {
            resource,
            payload,
            request_id,
            completion_signal,
        }
    }

    /// Override the join token name.
    pub fn with_completion_signal(mut self, signal: impl Into<String>) -> Self {
        self.completion_signal = signal.into();
        self
    }

    pub fn method(&self) -> Method {
        self.payload.method()
    }

    /// The list filter, if this is a list request.
    pub fn filter(&self) -> Option<&Value> {
        match &self.payload {
            RequestPayload::List { filter } => Some(filter),
            RequestPayload::Get { .. } => None,
        }
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey {
            resource: self.resource.clone(),
            method: self.method(),
            request_id: self.request_id.clone(),
        }
    }

    /// Reject descriptors that could never be dispatched meaningfully.
    pub fn validate(&self) -> TallyResult<()> {
        if self.resource.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "resource".to_string(),
            }
            .into());
        }
        if self.request_id.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "request_id".to_string(),
            }
            .into());
        }
        if self.completion_signal.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "completion_signal".to_string(),
            }
            .into());
        }
        match &self.payload {
            RequestPayload::List { filter } if !filter.is_object() => {
                Err(ValidationError::InvalidValue {
                    field: "filter".to_string(),
                    reason: format!("expected a JSON object for {}", self.request_id),
                }
                .into())
            }
            RequestPayload::Get { id } if id.is_empty() => {
                Err(ValidationError::RequiredFieldMissing {
                    field: "id".to_string(),
                }
                .into())
            }
            _ => Ok(()),
        }
    }
}

fn default_completion_signal(resource: &ResourceName, request_id: &RequestId) -> String {
    format!("{}_{}_{}", COMPLETION_SIGNAL_PREFIX, resource, request_id)
}

/// Key of one cache slot: `(resource, method, request_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub resource: ResourceName,
    pub method: Method,
    pub request_id: RequestId,
}

impl CacheKey {
    pub fn new(
        resource: impl Into<ResourceName>,
        method: Method,
        request_id: impl Into<RequestId>,
    ) -> Self {
        Self {
            resource: resource.into(),
            method,
            request_id: request_id.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.resource, self.method, self.request_id)
    }
}
