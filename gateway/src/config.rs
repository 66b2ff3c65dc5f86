use crate::path::{capture_name, segments};
use http::header::{HeaderName, HeaderValue};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

pub const DEFAULT_GRAPHQL_URL: &str = "http://localhost:3000/graphql";

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("At least one shared-secret header must be configured")]
    MissingSharedSecret,

    #[error("Invalid header name: {0}")]
    InvalidHeaderName(String),

    #[error("Invalid value for header {0}")]
    InvalidHeaderValue(String),

    #[error("Endpoint path cannot be empty")]
    EmptyEndpointPath,

    #[error("Endpoint path must start with '/': {0}")]
    RelativeEndpointPath(String),

    #[error("Endpoint {0} does not allow any method")]
    NoMethods(String),

    #[error("Endpoint {0} has an empty query")]
    EmptyQuery(String),

    #[error("Endpoint {0} has a capture without a name")]
    EmptyCaptureName(String),

    #[error("Endpoint {path} captures {name} more than once")]
    DuplicateCapture { path: String, name: String },
}

/// HTTP methods an endpoint can be declared for
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// A REST-shaped endpoint backed by one GraphQL operation
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct EndpointTemplate {
    /// Path template, e.g. `/v1/albums/:offset`
    pub path: String,
    /// Methods this endpoint answers to
    pub methods: Vec<HttpMethod>,
    /// GraphQL document sent upstream. Forwarded as-is.
    pub query: String,
}

impl EndpointTemplate {
    pub fn allows(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m.as_str() == method)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.path.is_empty() {
            return Err(ValidationError::EmptyEndpointPath);
        }
        if !self.path.starts_with('/') {
            return Err(ValidationError::RelativeEndpointPath(self.path.clone()));
        }
        if self.methods.is_empty() {
            return Err(ValidationError::NoMethods(self.path.clone()));
        }
        if self.query.trim().is_empty() {
            return Err(ValidationError::EmptyQuery(self.path.clone()));
        }

        let mut names = HashSet::new();
        for name in segments(&self.path).filter_map(capture_name) {
            if name.is_empty() {
                return Err(ValidationError::EmptyCaptureName(self.path.clone()));
            }
            if !names.insert(name) {
                return Err(ValidationError::DuplicateCapture {
                    path: self.path.clone(),
                    name: name.to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Gateway configuration
///
/// Keys are camelCase so that existing `configuration.json` files can be read
/// unchanged (YAML is a superset of JSON).
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Listener for translated requests
    #[serde(default = "Listener::gateway")]
    pub listener: Listener,
    /// Listener for `/health` and `/ready`
    #[serde(default = "Listener::admin")]
    pub admin_listener: Listener,
    /// Exposes error source chains in 500 responses
    #[serde(default)]
    pub development_mode: bool,
    /// Shared-secret headers every inbound request must carry
    pub headers: IndexMap<String, String>,
    /// Upstream GraphQL server
    #[serde(default)]
    pub graphql_server: GraphqlServer,
    /// Endpoint table, matched in declaration order
    pub restified_endpoints: Vec<EndpointTemplate>,
    /// Extra inbound headers masked in request logs
    #[serde(default)]
    pub redacted_headers: Vec<String>,
}

impl Config {
    /// Validates the gateway configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if self.headers.is_empty() {
            return Err(ValidationError::MissingSharedSecret);
        }
        for (name, value) in &self.headers {
            parse_header_name(name)?;
            parse_header_value(name, value)?;
        }

        self.graphql_server.headers.validate()?;

        for name in &self.redacted_headers {
            parse_header_name(name)?;
        }

        for endpoint in &self.restified_endpoints {
            endpoint.validate()?;
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    fn gateway() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 8787,
        }
    }

    fn admin() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 8788,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlServer {
    #[serde(default = "default_graphql_url")]
    pub url: Url,
    #[serde(default)]
    pub headers: UpstreamHeaders,
    /// Copy inbound W3C/B3 trace context headers onto the upstream call
    #[serde(default)]
    pub propagate_trace_context: bool,
}

impl Default for GraphqlServer {
    fn default() -> Self {
        Self {
            url: default_graphql_url(),
            headers: UpstreamHeaders::default(),
            propagate_trace_context: false,
        }
    }
}

fn default_graphql_url() -> Url {
    Url::parse(DEFAULT_GRAPHQL_URL).expect("default GraphQL URL is valid")
}

/// Headers sent with every upstream call
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct UpstreamHeaders {
    /// Inbound headers copied verbatim when present
    #[serde(default)]
    pub forward: Vec<String>,
    /// Headers always set, overriding forwarded ones
    #[serde(default)]
    pub additional: IndexMap<String, String>,
}

impl UpstreamHeaders {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for name in &self.forward {
            parse_header_name(name)?;
        }
        for (name, value) in &self.additional {
            parse_header_name(name)?;
            parse_header_value(name, value)?;
        }
        Ok(())
    }
}

pub(crate) fn parse_header_name(name: &str) -> Result<HeaderName, ValidationError> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ValidationError::InvalidHeaderName(name.to_string()))
}

pub(crate) fn parse_header_value(name: &str, value: &str) -> Result<HeaderValue, ValidationError> {
    HeaderValue::from_str(value).map_err(|_| ValidationError::InvalidHeaderValue(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(path: &str, methods: Vec<HttpMethod>) -> EndpointTemplate {
        EndpointTemplate {
            path: path.to_string(),
            methods,
            query: "query { ok }".to_string(),
        }
    }

    fn base_config() -> Config {
        Config {
            listener: Listener::gateway(),
            admin_listener: Listener::admin(),
            development_mode: false,
            headers: IndexMap::from([("hasura-m-auth".to_string(), "secret".to_string())]),
            graphql_server: GraphqlServer::default(),
            restified_endpoints: vec![endpoint("/v1/albums/:offset", vec![HttpMethod::Get])],
            redacted_headers: vec![],
        }
    }

    #[test]
    fn test_parse_valid_config() {
        let yaml = r#"
listener:
    host: "0.0.0.0"
    port: 3000
developmentMode: true
headers:
    hasura-m-auth: secret
graphqlServer:
    url: "http://graphql.internal:8080/graphql"
    headers:
        forward:
            - X-Hasura-Role
        additional:
            Content-Type: application/json
restifiedEndpoints:
    - path: /v1/api/rest/albums/:offset
      methods: [GET, POST]
      query: |
        query MyQuery($offset: Int = 10) {
          Album(offset: $offset) { Title }
        }
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.listener.port, 3000);
        assert_eq!(config.admin_listener, Listener::admin());
        assert!(config.development_mode);
        assert_eq!(config.headers["hasura-m-auth"], "secret");
        assert_eq!(
            config.graphql_server.url.as_str(),
            "http://graphql.internal:8080/graphql"
        );
        assert_eq!(config.graphql_server.headers.forward, vec!["X-Hasura-Role"]);
        assert_eq!(config.restified_endpoints.len(), 1);
        assert_eq!(
            config.restified_endpoints[0].methods,
            vec![HttpMethod::Get, HttpMethod::Post]
        );
        assert!(!config.graphql_server.propagate_trace_context);
    }

    #[test]
    fn test_parse_json_config() {
        let json = r#"{
            "headers": {"hasura-m-auth": "secret"},
            "graphqlServer": {"headers": {"forward": [], "additional": {}}},
            "restifiedEndpoints": [
                {"path": "/v1/albums/:offset", "methods": ["GET"], "query": "query { a }"}
            ]
        }"#;

        let config: Config = serde_yaml::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.listener, Listener::gateway());
        assert_eq!(config.graphql_server.url.as_str(), DEFAULT_GRAPHQL_URL);
        assert!(!config.development_mode);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = base_config();
        config.listener.port = 0;
        assert_eq!(config.validate(), Err(ValidationError::InvalidPort));

        let mut config = base_config();
        config.headers.clear();
        assert_eq!(config.validate(), Err(ValidationError::MissingSharedSecret));

        let mut config = base_config();
        config.graphql_server.headers.forward = vec!["bad header".to_string()];
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidHeaderName("bad header".to_string()))
        );

        let mut config = base_config();
        config
            .graphql_server
            .headers
            .additional
            .insert("x-role".to_string(), "line\nbreak".to_string());
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidHeaderValue("x-role".to_string()))
        );

        let mut config = base_config();
        config.restified_endpoints = vec![endpoint("v1/albums", vec![HttpMethod::Get])];
        assert_eq!(
            config.validate(),
            Err(ValidationError::RelativeEndpointPath("v1/albums".to_string()))
        );

        let mut config = base_config();
        config.restified_endpoints = vec![endpoint("/v1/albums", vec![])];
        assert_eq!(
            config.validate(),
            Err(ValidationError::NoMethods("/v1/albums".to_string()))
        );

        let mut config = base_config();
        config.restified_endpoints[0].query = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::EmptyQuery(_))
        ));

        let mut config = base_config();
        config.restified_endpoints = vec![endpoint("/v1/:/albums", vec![HttpMethod::Get])];
        assert!(matches!(
            config.validate(),
            Err(ValidationError::EmptyCaptureName(_))
        ));

        let mut config = base_config();
        config.restified_endpoints = vec![endpoint("/v1/:id/:id", vec![HttpMethod::Get])];
        assert_eq!(
            config.validate(),
            Err(ValidationError::DuplicateCapture {
                path: "/v1/:id/:id".to_string(),
                name: "id".to_string(),
            })
        );
    }

    #[test]
    fn test_deserialization_errors() {
        // Invalid URL
        assert!(
            serde_yaml::from_str::<Config>(
                r#"
headers: {hasura-m-auth: secret}
graphqlServer: {url: "not-a-url"}
restifiedEndpoints: []
"#
            )
            .is_err()
        );

        // Missing endpoint table
        assert!(serde_yaml::from_str::<Config>("headers: {a: b}").is_err());

        // Methods outside GET/POST/PUT/DELETE
        assert!(serde_yaml::from_str::<HttpMethod>("PATCH").is_err());
        assert!(serde_yaml::from_str::<HttpMethod>("get").is_err());
    }

    #[test]
    fn test_endpoint_allows() {
        let endpoint = endpoint("/v1/albums", vec![HttpMethod::Get, HttpMethod::Delete]);
        assert!(endpoint.allows("GET"));
        assert!(endpoint.allows("DELETE"));
        assert!(!endpoint.allows("POST"));
        assert!(!endpoint.allows("get"));
    }
}
