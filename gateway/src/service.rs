use crate::errors::GatewayError;
use crate::headers::Redactor;
use crate::metrics_defs::{OUTCOMES, REQUEST_DURATION, REQUESTS_INFLIGHT};
use crate::translator::{Outcome, Translator};
use http::{Method, StatusCode};
use http_body_util::combinators::BoxBody;
use hyper::body::{Body, Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response};
use shared::http::{full_body, make_json_response};
use std::fmt::Display;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Gateway front door: answers health checks and translates everything else.
#[derive(Clone)]
pub struct GatewayService {
    translator: Arc<Translator>,
    redactor: Redactor,
    development_mode: bool,
}

impl GatewayService {
    pub fn new(translator: Translator, redactor: Redactor, development_mode: bool) -> Self {
        Self {
            translator: Arc::new(translator),
            redactor,
            development_mode,
        }
    }

    /// Answers one request.
    ///
    /// Translation runs on its own task, so a caller that goes away does not
    /// cancel an upstream call already in flight; its result is discarded.
    pub async fn handle<B>(&self, request: Request<B>) -> Response<Bytes>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Display,
    {
        if request.method() == Method::GET && request.uri().path() == "/health" {
            return make_json_response(StatusCode::OK, r#"{"status":"healthy"}"#);
        }

        tracing::debug!(
            method = %request.method(),
            uri = %request.uri(),
            headers = ?self.redactor.redact(request.headers()),
            "Received request"
        );

        let translator = self.translator.clone();
        let task = tokio::spawn(async move { translate_and_record(&translator, request).await });

        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Translation task failed");
                Outcome::Internal(format!("Translation task failed: {e}"))
            }
        };
        outcome.into_response(self.development_mode)
    }
}

/// Keeps `requests.inflight` balanced however the translation ends.
struct InflightGuard;

impl InflightGuard {
    fn new() -> Self {
        shared::gauge!(REQUESTS_INFLIGHT).increment(1.0);
        InflightGuard
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        shared::gauge!(REQUESTS_INFLIGHT).decrement(1.0);
    }
}

async fn translate_and_record<B>(translator: &Translator, request: Request<B>) -> Outcome
where
    B: Body,
    B::Error: Display,
{
    let start = Instant::now();
    let outcome = {
        let _inflight = InflightGuard::new();
        translator.translate(request).await
    };

    let label = outcome.label();
    let status = outcome.status();
    let elapsed = start.elapsed().as_secs_f64();

    shared::counter!(OUTCOMES, "outcome" => label).increment(1);
    shared::histogram!(
        REQUEST_DURATION,
        "status" => status.as_str().to_owned(),
        "outcome" => label,
    )
    .record(elapsed);

    tracing::info!(
        status = status.as_u16(),
        outcome = label,
        elapsed_ms = elapsed * 1000.0,
        "Request completed"
    );

    outcome
}

impl Service<Request<Incoming>> for GatewayService {
    type Response = Response<BoxBody<Bytes, GatewayError>>;
    type Error = GatewayError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move {
            let response = service.handle(req).await;
            Ok(response.map(|body| full_body(body)))
        })
    }
}
