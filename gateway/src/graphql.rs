use crate::metrics_defs::UPSTREAM_DURATION;
use crate::variables::VariableSet;
use async_trait::async_trait;
use http::StatusCode;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum GraphqlError {
    #[error("GraphQL request to {url} failed: {status}")]
    UpstreamStatus {
        url: String,
        status: StatusCode,
        reason: String,
    },

    #[error("GraphQL request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("GraphQL response from {url} is not valid JSON: {source}")]
    InvalidResponse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode GraphQL request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Body of the upstream POST
#[derive(Serialize, Debug)]
pub struct GraphqlRequest<'a> {
    pub query: &'a str,
    pub variables: &'a VariableSet,
}

/// Runs one GraphQL operation against the upstream server.
///
/// Implementations make a single attempt: no retries and no timeout.
#[async_trait]
pub trait GraphqlExecutor: Send + Sync {
    async fn execute(
        &self,
        request: GraphqlRequest<'_>,
        headers: HeaderMap,
    ) -> Result<Value, GraphqlError>;
}

/// Executor backed by a shared reqwest client
#[derive(Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
    url: Url,
}

impl HttpExecutor {
    pub fn new(url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl GraphqlExecutor for HttpExecutor {
    async fn execute(
        &self,
        request: GraphqlRequest<'_>,
        headers: HeaderMap,
    ) -> Result<Value, GraphqlError> {
        execute(
            &self.client,
            request.query,
            request.variables,
            headers,
            &self.url,
        )
        .await
    }
}

/// POSTs `{query, variables}` to `url` and returns the JSON body untouched.
///
/// GraphQL errors embedded in a 2xx response are part of the returned value,
/// only a non-2xx status or a transport problem is an error here.
pub async fn execute(
    client: &reqwest::Client,
    query: &str,
    variables: &VariableSet,
    mut headers: HeaderMap,
    url: &Url,
) -> Result<Value, GraphqlError> {
    let body = serde_json::to_vec(&GraphqlRequest { query, variables })?;

    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    tracing::debug!(
        url = %url,
        query_length = query.len(),
        variables = variables.len(),
        "Sending GraphQL request"
    );

    let start = Instant::now();
    let result = client
        .post(url.clone())
        .headers(headers)
        .body(body)
        .send()
        .await;
    let response = result.map_err(|source| GraphqlError::Transport {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    shared::histogram!(UPSTREAM_DURATION, "status" => status.as_str().to_owned())
        .record(start.elapsed().as_secs_f64());

    if !status.is_success() {
        return Err(GraphqlError::UpstreamStatus {
            url: url.to_string(),
            status,
            reason: status.canonical_reason().unwrap_or_default().to_string(),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|source| GraphqlError::Transport {
            url: url.to_string(),
            source,
        })?;
    let value: Value =
        serde_json::from_slice(&bytes).map_err(|source| GraphqlError::InvalidResponse {
            url: url.to_string(),
            source,
        })?;

    tracing::debug!(
        status = %status,
        has_errors = value.get("errors").is_some(),
        "GraphQL response received"
    );

    Ok(value)
}
