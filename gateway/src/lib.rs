pub mod config;
pub mod errors;
pub mod graphql;
pub mod headers;
pub mod metrics_defs;
pub mod path;
pub mod request;
pub mod resolver;
pub mod response;
pub mod service;
pub mod translator;
pub mod variables;

#[cfg(test)]
mod testutils;

use crate::config::{Config, parse_header_name};
use crate::errors::GatewayError;
use crate::headers::Redactor;
use crate::service::GatewayService;
use crate::translator::Translator;
use shared::admin_service::AdminService;
use shared::http::run_http_service;

/// Builds the request service described by `config`.
///
/// Overlapping endpoint templates are reported but not rejected: the first
/// declared template keeps winning.
pub fn build_service(config: &Config) -> Result<GatewayService, GatewayError> {
    let translator = Translator::from_config(config)?;

    for overlap in translator.endpoints().overlaps() {
        tracing::warn!(
            earlier = %overlap.earlier,
            later = %overlap.later,
            methods = ?overlap.methods,
            "Endpoint template is shadowed by an earlier one"
        );
    }

    let extra = config
        .redacted_headers
        .iter()
        .map(|name| parse_header_name(name))
        .collect::<Result<Vec<_>, _>>()?;
    let redactor = Redactor::new(translator.authenticator().header_names().chain(&extra));

    tracing::info!(
        endpoints = translator.endpoints().len(),
        upstream = %config.graphql_server.url,
        development_mode = config.development_mode,
        "Gateway configured"
    );

    Ok(GatewayService::new(
        translator,
        redactor,
        config.development_mode,
    ))
}

pub async fn run(config: Config) -> Result<(), GatewayError> {
    let gateway_service = build_service(&config)?;

    let gateway_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        gateway_service,
    );
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::<_, GatewayError>::new(|| true),
    );

    tokio::try_join!(gateway_task, admin_task)?;
    Ok(())
}
