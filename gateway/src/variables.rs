//! Builds the GraphQL variables for a matched endpoint.
//!
//! Sources are applied in a fixed order and later ones win on key collision:
//! path captures, then query parameters, then top-level body fields.

use crate::config::EndpointTemplate;
use crate::path::{capture_name, segments};
use crate::request::RawRequest;
use serde_json::{Map, Value};

pub type VariableSet = Map<String, Value>;

/// Reads a path or query value as a JSON literal, falling back to the raw string.
///
/// `"5"` becomes the number 5 and `"true"` the boolean true, while `"abc"`
/// stays a string.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub fn extract(request: &RawRequest, endpoint: &EndpointTemplate) -> VariableSet {
    let mut variables = VariableSet::new();

    let mut request_segments = segments(&request.path);
    for template_segment in segments(&endpoint.path) {
        let value = request_segments.next();
        let Some(name) = capture_name(template_segment) else {
            continue;
        };
        match value {
            Some(value) if !value.is_empty() => {
                variables.insert(name.to_string(), parse_value(value));
            }
            _ => {}
        }
    }

    if let Some(query) = request.query.as_deref() {
        let query = query.strip_prefix('?').unwrap_or(query);
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            variables.insert(key.into_owned(), parse_value(&value));
        }
    }

    if let Some(Value::Object(body)) = &request.body {
        for (key, value) in body {
            variables.insert(key.clone(), value.clone());
        }
    }

    tracing::debug!(
        endpoint = %endpoint.path,
        count = variables.len(),
        keys = ?variables.keys().collect::<Vec<_>>(),
        "Extracted variables"
    );

    variables
}
