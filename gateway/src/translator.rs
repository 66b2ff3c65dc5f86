use crate::config::{Config, ValidationError};
use crate::graphql::{GraphqlError, GraphqlExecutor, GraphqlRequest, HttpExecutor};
use crate::headers::{
    Authenticator, HeaderPolicy, NoopPropagator, TraceContextPropagator, TracePropagator,
};
use crate::request::{MalformedRequest, RawRequest};
use crate::resolver::{EndpointNotFound, EndpointTable};
use crate::variables::extract;
use http::HeaderMap;
use http_body_util::BodyExt;
use hyper::Request;
use hyper::body::Body;
use serde_json::Value;
use std::fmt::Display;
use std::sync::Arc;

/// Terminal state of one translation
#[derive(Debug)]
pub enum Outcome {
    /// Upstream answered 2xx; its JSON body is returned untouched
    Success(Value),
    /// Shared secret missing or wrong
    Unauthorized,
    /// Body does not describe a REST call
    Malformed(MalformedRequest),
    /// No endpoint accepts the path and method
    NotFound(EndpointNotFound),
    /// Upstream returned non-2xx or could not be reached
    UpstreamFailure(GraphqlError),
    /// Anything else that went wrong while translating
    Internal(String),
}

impl Outcome {
    /// Short label used in logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Unauthorized => "unauthorized",
            Outcome::Malformed(_) => "malformed",
            Outcome::NotFound(_) => "not_found",
            Outcome::UpstreamFailure(_) => "upstream_failure",
            Outcome::Internal(_) => "internal_error",
        }
    }
}

/// Translates REST-shaped requests into GraphQL calls.
///
/// Holds only read-only configuration, so one instance is shared by every
/// concurrent request.
#[derive(Clone)]
pub struct Translator {
    authenticator: Authenticator,
    endpoints: EndpointTable,
    policy: HeaderPolicy,
    propagator: Arc<dyn TracePropagator>,
    executor: Arc<dyn GraphqlExecutor>,
}

impl Translator {
    pub fn new(
        authenticator: Authenticator,
        endpoints: EndpointTable,
        policy: HeaderPolicy,
        executor: Arc<dyn GraphqlExecutor>,
    ) -> Self {
        Self {
            authenticator,
            endpoints,
            policy,
            propagator: Arc::new(NoopPropagator),
            executor,
        }
    }

    pub fn with_propagator(mut self, propagator: Arc<dyn TracePropagator>) -> Self {
        self.propagator = propagator;
        self
    }

    /// Builds a translator calling the configured GraphQL server over HTTP
    pub fn from_config(config: &Config) -> Result<Self, ValidationError> {
        config.validate()?;

        let upstream = &config.graphql_server;
        let translator = Translator::new(
            Authenticator::try_new(&config.headers)?,
            EndpointTable::new(config.restified_endpoints.clone()),
            HeaderPolicy::try_new(&upstream.headers.forward, &upstream.headers.additional)?,
            Arc::new(HttpExecutor::new(upstream.url.clone())),
        );

        Ok(match upstream.propagate_trace_context {
            true => translator.with_propagator(Arc::new(TraceContextPropagator)),
            false => translator,
        })
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn endpoints(&self) -> &EndpointTable {
        &self.endpoints
    }

    /// Runs one request through authentication, parsing, resolution,
    /// extraction and execution, stopping at the first failure.
    pub async fn translate<B>(&self, request: Request<B>) -> Outcome
    where
        B: Body,
        B::Error: Display,
    {
        let (parts, body) = request.into_parts();

        if !self.authenticator.authorize(&parts.headers) {
            tracing::warn!("Unauthorized request");
            return Outcome::Unauthorized;
        }

        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => return Outcome::Internal(format!("Failed to read request body: {e}")),
        };

        let raw = match RawRequest::from_slice(&bytes) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::info!(error = %e, "Malformed translation request");
                return Outcome::Malformed(e);
            }
        };

        let endpoint = match self.endpoints.resolve(&raw) {
            Ok(endpoint) => endpoint,
            Err(not_found) => {
                tracing::warn!(
                    path = %not_found.path,
                    method = %not_found.method,
                    "No endpoint matched"
                );
                return Outcome::NotFound(not_found);
            }
        };
        tracing::debug!(endpoint = %endpoint.path, method = %raw.method, "Matched endpoint");

        let variables = extract(&raw, endpoint);
        let headers = self.upstream_headers(&parts.headers);

        let request = GraphqlRequest {
            query: &endpoint.query,
            variables: &variables,
        };
        match self.executor.execute(request, headers).await {
            Ok(value) => Outcome::Success(value),
            Err(e) => {
                tracing::error!(error = %e, endpoint = %endpoint.path, "GraphQL request failed");
                Outcome::UpstreamFailure(e)
            }
        }
    }

    fn upstream_headers(&self, inbound: &HeaderMap) -> HeaderMap {
        let mut propagated = HeaderMap::new();
        self.propagator.inject(inbound, &mut propagated);
        self.policy.compose(inbound, propagated)
    }
}
