//! REST-backed resource.
//!
//! `list` is `POST {base}/{resource}/list` with the filter as the JSON body;
//! `get` is `GET {base}/{resource}/{id}`.

use crate::resource::Resource;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tally_core::{ListResponse, ResourceError, TallyResult};

#[derive(Debug, Clone)]
pub struct RestResource {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl RestResource {
    pub fn new(name: impl Into<String>, base_url: &str, timeout: Duration) -> TallyResult<Self> {
        let name = name.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResourceError::RequestFailed {
                resource: name.clone(),
                status: 0,
                message: e.to_string(),
            })?;
        Ok(Self::with_client(name, base_url, client))
    }

    pub fn with_client(name: impl Into<String>, base_url: &str, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.name, suffix)
    }

    fn transport_error(&self, e: reqwest::Error) -> ResourceError {
        ResourceError::RequestFailed {
            resource: self.name.clone(),
            status: e.status().map(|s| s.as_u16()).unwrap_or(0),
            message: e.to_string(),
        }
    }

    async fn read_json(&self, response: reqwest::Response) -> TallyResult<Value> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ResourceError::RequestFailed {
                resource: self.name.clone(),
                status: status.as_u16(),
                message,
            }
            .into());
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| {
                ResourceError::InvalidResponse {
                    resource: self.name.clone(),
                    reason: e.to_string(),
                }
                .into()
            })
    }
}

#[async_trait]
impl Resource for RestResource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list(&self, filter: &Value) -> TallyResult<ListResponse> {
        let response = self
            .client
            .post(self.url("list"))
            .json(filter)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let body = self.read_json(response).await?;
        ListResponse::from_value(&body).ok_or_else(|| {
            ResourceError::InvalidResponse {
                resource: self.name.clone(),
                reason: "missing records array".to_string(),
            }
            .into()
        })
    }

    async fn get(&self, id: &str) -> TallyResult<Value> {
        let response = self
            .client
            .get(self.url(id))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ResourceError::NotFound {
                resource: self.name.clone(),
                id: id.to_string(),
            }
            .into());
        }
        self.read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let resource = RestResource::with_client(
            "users",
            "https://api.example.test/v1/",
            reqwest::Client::new(),
        );
        assert_eq!(resource.url("list"), "https://api.example.test/v1/users/list");
        assert_eq!(resource.url("u-1"), "https://api.example.test/v1/users/u-1");
        assert_eq!(resource.name(), "users");
    }
}
