//! Relay handoff frames.
//!
//! A relay tunnels traffic through an upstream proxy on the engine's behalf.
//! It speaks two request shapes: `INIT_PROXY` turns the socket into a
//! transparent tunnel to `target`, `REST_PROXY` executes one HTTP call and
//! answers with a single `REST_RESULT`.

use crate::proxy::ProxyKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Proxy parameters as the relay expects them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyParams {
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(rename = "type")]
    pub kind: ProxyKind,
}

/// Frames sent from the engine to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelayRequest {
    /// Open a tunnel to `target` through `proxy`.
    InitProxy { target: String, proxy: ProxyParams },
    /// Execute one HTTP request through `proxy`.
    RestProxy {
        method: String,
        endpoint: String,
        headers: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<serde_json::Value>,
        proxy: ProxyParams,
    },
}

/// Frames sent from the relay to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelayReply {
    /// Tunnel established; gateway traffic follows.
    RelayReady,
    /// The proxy could not be reached.
    RelayError {
        #[serde(default)]
        error: String,
    },
    /// Response body of a forwarded request.
    RestResult {
        #[serde(default)]
        data: serde_json::Value,
    },
}

impl RelayReply {
    /// Tag values that mark a frame as relay control rather than gateway traffic.
    pub(crate) const TAGS: [&'static str; 3] = ["RELAY_READY", "RELAY_ERROR", "REST_RESULT"];
}

/// A one-shot HTTP call, routed through the relay or sent directly.
#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
    pub method: String,
    pub endpoint: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<serde_json::Value>,
}

impl RestRequest {
    /// Request with no headers or body.
    pub fn new(method: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            endpoint: endpoint.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.headers
            .insert("Content-Type".into(), "application/json".into());
        self.body = Some(body);
        self
    }

    /// Wrap for forwarding through a relay.
    pub fn into_relay(self, proxy: ProxyParams) -> RelayRequest {
        RelayRequest::RestProxy {
            method: self.method,
            endpoint: self.endpoint,
            headers: self.headers,
            body: self.body,
            proxy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ProxyParams {
        ProxyParams {
            host: "10.0.0.2".into(),
            port: 3128,
            username: Some("u".into()),
            password: Some("p".into()),
            kind: ProxyKind::Http,
        }
    }

    #[test]
    fn init_proxy_wire_shape() {
        let frame = RelayRequest::InitProxy {
            target: "wss://gateway.example/".into(),
            proxy: params(),
        };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            serde_json::json!({
                "type": "INIT_PROXY",
                "target": "wss://gateway.example/",
                "proxy": {
                    "host": "10.0.0.2",
                    "port": 3128,
                    "username": "u",
                    "password": "p",
                    "type": "HTTP",
                },
            })
        );
    }

    #[test]
    fn rest_proxy_carries_request() {
        let frame = RestRequest::new("PATCH", "https://api.example/users/@me")
            .header("Authorization", "tok")
            .json(serde_json::json!({ "bio": "hi" }))
            .into_relay(params());
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "REST_PROXY");
        assert_eq!(json["method"], "PATCH");
        assert_eq!(json["headers"]["Authorization"], "tok");
        assert_eq!(json["headers"]["Content-Type"], "application/json");
        assert_eq!(json["body"]["bio"], "hi");
    }

    #[test]
    fn parse_replies() {
        let ready: RelayReply = serde_json::from_str(r#"{"type":"RELAY_READY"}"#).unwrap();
        assert_eq!(ready, RelayReply::RelayReady);

        let err: RelayReply =
            serde_json::from_str(r#"{"type":"RELAY_ERROR","error":"ECONNREFUSED"}"#).unwrap();
        assert_eq!(
            err,
            RelayReply::RelayError {
                error: "ECONNREFUSED".into()
            }
        );

        let result: RelayReply =
            serde_json::from_str(r#"{"type":"REST_RESULT","data":{"id":"1"}}"#).unwrap();
        assert_eq!(
            result,
            RelayReply::RestResult {
                data: serde_json::json!({ "id": "1" })
            }
        );
    }
}
