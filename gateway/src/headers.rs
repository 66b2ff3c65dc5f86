//! Inbound authentication and the headers sent with each upstream call.
//!
//! The upstream header set is built in three layers, later layers winning on
//! a name collision:
//!
//! 1. trace propagation headers
//! 2. inbound headers on the forward list
//! 3. fixed injected headers

use crate::config::{ValidationError, parse_header_name, parse_header_value};
use http::header::{AUTHORIZATION, COOKIE, HeaderMap, HeaderName};
use indexmap::IndexMap;

const REDACTED: &str = "[REDACTED]";

static TRACE_CONTEXT_HEADERS: &[&str] = &[
    "traceparent",
    "tracestate",
    "b3",
    "x-b3-traceid",
    "x-b3-spanid",
    "x-b3-parentspanid",
    "x-b3-sampled",
    "x-b3-flags",
];

/// Checks that a request carries `name` with exactly the `expected` value.
pub fn authenticate(headers: &HeaderMap, name: &HeaderName, expected: &str) -> bool {
    headers
        .get(name)
        .is_some_and(|value| value.as_bytes() == expected.as_bytes())
}

/// Shared-secret headers an inbound request must carry
#[derive(Clone, Debug)]
pub struct Authenticator {
    secrets: Vec<(HeaderName, String)>,
}

impl Authenticator {
    pub fn try_new(secrets: &IndexMap<String, String>) -> Result<Self, ValidationError> {
        if secrets.is_empty() {
            return Err(ValidationError::MissingSharedSecret);
        }

        let secrets = secrets
            .iter()
            .map(|(name, value)| -> Result<_, ValidationError> {
                Ok((parse_header_name(name)?, value.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { secrets })
    }

    pub fn authorize(&self, headers: &HeaderMap) -> bool {
        self.secrets
            .iter()
            .all(|(name, expected)| authenticate(headers, name, expected))
    }

    pub fn header_names(&self) -> impl Iterator<Item = &HeaderName> {
        self.secrets.iter().map(|(name, _)| name)
    }
}

/// Forwarded and injected headers for upstream calls
#[derive(Clone, Debug, Default)]
pub struct HeaderPolicy {
    forward: Vec<HeaderName>,
    additional: HeaderMap,
}

impl HeaderPolicy {
    pub fn try_new(
        forward: &[String],
        additional: &IndexMap<String, String>,
    ) -> Result<Self, ValidationError> {
        let forward = forward
            .iter()
            .map(|name| parse_header_name(name))
            .collect::<Result<Vec<_>, _>>()?;

        let mut injected = HeaderMap::new();
        for (name, value) in additional {
            injected.insert(parse_header_name(name)?, parse_header_value(name, value)?);
        }

        Ok(Self {
            forward,
            additional: injected,
        })
    }

    /// Copies every header on the forward list that the inbound request carries,
    /// keeping all values of repeated headers.
    pub fn forwarded_headers(&self, inbound: &HeaderMap) -> HeaderMap {
        let mut forwarded = HeaderMap::new();
        for name in &self.forward {
            for value in inbound.get_all(name) {
                forwarded.append(name.clone(), value.clone());
            }
        }
        forwarded
    }

    pub fn injected_headers(&self) -> &HeaderMap {
        &self.additional
    }

    /// Builds the upstream header set on top of the propagation headers.
    pub fn compose(&self, inbound: &HeaderMap, propagated: HeaderMap) -> HeaderMap {
        let mut headers = propagated;
        let forwarded = self.forwarded_headers(inbound);
        tracing::debug!(forwarded = forwarded.len(), "Forwarding headers");

        for name in forwarded.keys() {
            headers.remove(name);
        }
        for (name, value) in &forwarded {
            headers.append(name.clone(), value.clone());
        }
        for (name, value) in &self.additional {
            headers.insert(name.clone(), value.clone());
        }
        headers
    }
}

/// Adds distributed-tracing headers to an upstream call.
///
/// Propagation must not change the outcome of a request: implementations only
/// write into `outbound`, and `HeaderPolicy::compose` lets configured headers
/// win over anything written here.
pub trait TracePropagator: Send + Sync {
    fn inject(&self, inbound: &HeaderMap, outbound: &mut HeaderMap);
}

pub struct NoopPropagator;

impl TracePropagator for NoopPropagator {
    fn inject(&self, _inbound: &HeaderMap, _outbound: &mut HeaderMap) {}
}

/// Passes inbound W3C trace context and B3 headers through to the upstream.
pub struct TraceContextPropagator;

impl TracePropagator for TraceContextPropagator {
    fn inject(&self, inbound: &HeaderMap, outbound: &mut HeaderMap) {
        for &name in TRACE_CONTEXT_HEADERS {
            if let Some(value) = inbound.get(name) {
                outbound.insert(HeaderName::from_static(name), value.clone());
            }
        }
    }
}

/// Masks sensitive header values before requests are logged.
#[derive(Clone, Debug)]
pub struct Redactor {
    sensitive: Vec<HeaderName>,
}

impl Redactor {
    pub fn new<'a>(extra: impl IntoIterator<Item = &'a HeaderName>) -> Self {
        let mut sensitive = vec![AUTHORIZATION, COOKIE];
        for name in extra {
            if !sensitive.contains(name) {
                sensitive.push(name.clone());
            }
        }
        Self { sensitive }
    }

    pub fn redact(&self, headers: &HeaderMap) -> Vec<(String, String)> {
        headers
            .iter()
            .map(|(name, value)| {
                let shown = if self.sensitive.contains(name) {
                    REDACTED.to_string()
                } else {
                    String::from_utf8_lossy(value.as_bytes()).into_owned()
                };
                (name.as_str().to_string(), shown)
            })
            .collect()
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(std::iter::empty())
    }
}
