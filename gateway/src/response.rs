use crate::translator::Outcome;
use http::StatusCode;
use hyper::Response;
use hyper::body::Bytes;
use serde_json::{Value, json};
use shared::http::make_json_response;
use std::error::Error;

impl Outcome {
    pub fn status(&self) -> StatusCode {
        match self {
            Outcome::Success(_) => StatusCode::OK,
            Outcome::Unauthorized => StatusCode::UNAUTHORIZED,
            Outcome::Malformed(_) => StatusCode::BAD_REQUEST,
            Outcome::NotFound(_) => StatusCode::NOT_FOUND,
            Outcome::UpstreamFailure(_) | Outcome::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// JSON body returned to the caller.
    ///
    /// Error details are always included for 500s; the source chain under
    /// `stack` only in development mode.
    pub fn body(&self, development_mode: bool) -> Value {
        match self {
            Outcome::Success(value) => value.clone(),
            Outcome::Unauthorized => json!({"message": "unauthorized request"}),
            Outcome::Malformed(_) => json!({
                "message": "Invalid request body",
                "required": {
                    "path": "string",
                    "method": "string",
                    "query": "string (optional)",
                    "body": "object (optional)",
                },
            }),
            Outcome::NotFound(not_found) => json!({
                "message": "Endpoint not found",
                "requestedPath": not_found.path,
                "requestedMethod": not_found.method,
            }),
            Outcome::UpstreamFailure(e) => internal_error(e.to_string(), development_mode, || {
                source_chain(e)
            }),
            Outcome::Internal(message) => {
                internal_error(message.clone(), development_mode, || vec![message.clone()])
            }
        }
    }

    pub fn into_response(self, development_mode: bool) -> Response<Bytes> {
        let status = self.status();
        let body = match &self {
            // Encoding a `Value` cannot fail
            Outcome::Success(value) => serde_json::to_vec(value).unwrap_or_default(),
            other => other.body(development_mode).to_string().into_bytes(),
        };
        make_json_response(status, body)
    }
}

fn internal_error(
    error: String,
    development_mode: bool,
    stack: impl FnOnce() -> Vec<String>,
) -> Value {
    let mut body = json!({
        "message": "Internal server error",
        "error": error,
    });
    if development_mode {
        body["stack"] = json!(stack());
    }
    body
}

fn source_chain(error: &dyn Error) -> Vec<String> {
    let mut chain = vec![error.to_string()];
    let mut current = error.source();
    while let Some(source) = current {
        chain.push(source.to_string());
        current = source.source();
    }
    chain
}
