use crate::config::{EndpointTemplate, HttpMethod};
use crate::path::{capture_name, matches, segments};
use crate::request::RawRequest;
use std::sync::Arc;

/// No endpoint accepts the requested path and method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointNotFound {
    pub path: String,
    pub method: String,
}

/// Two templates that can both match some concrete request.
///
/// Resolution is first-match-wins, so `later` never sees the requests they share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlap {
    pub earlier: String,
    pub later: String,
    pub methods: Vec<HttpMethod>,
}

/// Endpoint table, immutable once built and shared across requests
#[derive(Clone, Debug)]
pub struct EndpointTable {
    endpoints: Arc<Vec<EndpointTemplate>>,
}

impl EndpointTable {
    pub fn new(endpoints: Vec<EndpointTemplate>) -> Self {
        Self {
            endpoints: Arc::new(endpoints),
        }
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Finds the first declared endpoint matching both path and method
    pub fn resolve(&self, request: &RawRequest) -> Result<&EndpointTemplate, EndpointNotFound> {
        self.endpoints
            .iter()
            .find(|endpoint| {
                matches(&endpoint.path, &request.path) && endpoint.allows(&request.method)
            })
            .ok_or_else(|| EndpointNotFound {
                path: request.path.clone(),
                method: request.method.clone(),
            })
    }

    /// Lists every pair of templates where the later one is shadowed for
    /// at least one concrete path and method.
    pub fn overlaps(&self) -> Vec<Overlap> {
        let mut overlaps = Vec::new();

        for (i, earlier) in self.endpoints.iter().enumerate() {
            for later in &self.endpoints[i + 1..] {
                let methods: Vec<HttpMethod> = later
                    .methods
                    .iter()
                    .copied()
                    .filter(|m| earlier.methods.contains(m))
                    .collect();

                if !methods.is_empty() && templates_intersect(&earlier.path, &later.path) {
                    overlaps.push(Overlap {
                        earlier: earlier.path.clone(),
                        later: later.path.clone(),
                        methods,
                    });
                }
            }
        }

        overlaps
    }
}

// Whether some concrete path satisfies both templates.
fn templates_intersect(a: &str, b: &str) -> bool {
    let a: Vec<&str> = segments(a).collect();
    let b: Vec<&str> = segments(b).collect();

    a.len() == b.len()
        && a.iter().zip(b.iter()).all(|(x, y)| {
            match (capture_name(x), capture_name(y)) {
                (Some(_), Some(_)) => true,
                (Some(_), None) => !y.is_empty(),
                (None, Some(_)) => !x.is_empty(),
                (None, None) => x == y,
            }
        })
}
