use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum MalformedRequest {
    #[error("request body is not a valid translation request: {0}")]
    InvalidBody(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// The REST call being translated, as described by the inbound JSON body.
///
/// `path` and `method` describe the simulated REST request and are unrelated
/// to the HTTP method and path used to reach the gateway itself.
#[derive(Clone, Debug, PartialEq)]
pub struct RawRequest {
    pub path: String,
    /// Kept verbatim: a method outside the endpoint table simply matches nothing.
    pub method: String,
    pub query: Option<String>,
    pub body: Option<Value>,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    body: Option<Value>,
}

impl RawRequest {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, MalformedRequest> {
        let envelope: Envelope = serde_json::from_slice(bytes)
            .map_err(|e| MalformedRequest::InvalidBody(e.to_string()))?;

        let path = envelope
            .path
            .filter(|p| !p.is_empty())
            .ok_or(MalformedRequest::MissingField("path"))?;
        let method = envelope
            .method
            .filter(|m| !m.is_empty())
            .ok_or(MalformedRequest::MissingField("method"))?;

        Ok(RawRequest {
            path,
            method,
            query: envelope.query,
            body: envelope.body,
        })
    }
}
