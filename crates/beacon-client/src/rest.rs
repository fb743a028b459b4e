//! Direct REST calls from the local network identity.

use async_trait::async_trait;
use beacon_core::RestRequest;
use std::time::Duration;

/// A REST response, decoded to JSON where possible.
#[derive(Debug, Clone, PartialEq)]
pub struct RestResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl RestResponse {
    /// Interpret a relay `REST_RESULT` body. The relay carries no status, so
    /// an API error object marks failure.
    pub fn from_relay(data: serde_json::Value) -> Self {
        let is_error = data.get("code").is_some() && data.get("message").is_some();
        Self {
            status: if is_error { 400 } else { 200 },
            body: data,
        }
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The API's error message, or a generic description.
    pub fn error_message(&self) -> String {
        self.body
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("request failed with status {}", self.status))
    }
}

#[async_trait]
pub trait DirectRest: Send + Sync + 'static {
    async fn execute(&self, request: &RestRequest) -> Result<RestResponse, RestError>;
}

/// reqwest-backed client.
#[derive(Debug, Clone)]
pub struct HttpRest {
    client: reqwest::Client,
}

impl HttpRest {
    /// Client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, RestError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DirectRest for HttpRest {
    async fn execute(&self, request: &RestRequest) -> Result<RestResponse, RestError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| RestError::InvalidMethod(request.method.clone()))?;

        let mut builder = self.client.request(method, &request.endpoint);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        tracing::debug!("{} {} -> {}", request.method, request.endpoint, status);
        Ok(RestResponse { status, body })
    }
}

/// Error issuing a direct request.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid http method: {0}")]
    InvalidMethod(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_error_objects_are_failures() {
        let ok = RestResponse::from_relay(serde_json::json!({ "id": "1" }));
        assert!(ok.is_success());

        let err = RestResponse::from_relay(serde_json::json!({
            "code": 50035,
            "message": "Invalid Form Body",
        }));
        assert!(!err.is_success());
        assert_eq!(err.error_message(), "Invalid Form Body");
    }

    #[test]
    fn generic_error_message() {
        let resp = RestResponse {
            status: 502,
            body: serde_json::Value::Null,
        };
        assert_eq!(resp.error_message(), "request failed with status 502");
    }
}
