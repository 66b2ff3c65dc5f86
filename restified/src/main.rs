mod config;

use crate::config::{Config, ConfigError, LoggingConfig, MetricsConfig};
use clap::{Args, Parser, Subcommand};
use gateway::config::{Config as GatewayConfig, ValidationError};
use gateway::errors::GatewayError;
use gateway::resolver::EndpointTable;
use metrics_exporter_statsd::{StatsdBuilder, StatsdError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use url::Url;

const METRICS_PREFIX: &str = "restified";

#[derive(Parser)]
#[command(name = "restified", version, about = "Serves REST endpoints backed by GraphQL queries")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Start the gateway
    Run(RunArgs),
    /// Check a configuration file without serving
    Validate(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    /// Path to the YAML (or JSON) configuration file
    #[arg(long, env = "RESTIFIED_CONFIG", default_value = "config.yaml")]
    config: PathBuf,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Overrides `graphqlServer.url`
    #[arg(long, env = "GRAPHQL_SERVER_URL")]
    graphql_url: Option<Url>,

    /// Overrides the gateway listener port
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Include error source chains in 500 responses
    #[arg(long, env = "DEVELOPMENT_MODE")]
    development: bool,

    /// Additional headers masked in request logs
    #[arg(long = "redact-header", env = "REDACTED_HEADERS", value_delimiter = ',')]
    redacted_headers: Vec<String>,

    /// Tracing filter directive, e.g. `info` or `gateway=debug`
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl RunArgs {
    fn apply(&self, config: &mut GatewayConfig) {
        if let Some(url) = &self.graphql_url {
            config.graphql_server.url = url.clone();
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if self.development {
            config.development_mode = true;
        }
        for name in &self.redacted_headers {
            let name = name.trim();
            if !name.is_empty() && !config.redacted_headers.iter().any(|h| h == name) {
                config.redacted_headers.push(name.to_string());
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ValidationError),
    #[error("gateway stopped: {0}")]
    Gateway(#[from] GatewayError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("invalid log level: {0}")]
    LogLevel(#[from] tracing_subscriber::filter::ParseError),
    #[error("invalid sentry dsn: {0}")]
    SentryDsn(#[from] sentry::types::ParseDsnError),
    #[error("could not create statsd recorder: {0}")]
    Statsd(#[from] StatsdError),
    #[error("a metrics recorder is already installed")]
    MetricsRecorder,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        CliCommand::Run(args) => run(args),
        CliCommand::Validate(args) => validate(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: RunArgs) -> Result<(), CliError> {
    let mut config = Config::from_file(&args.config.config)?;
    args.apply(&mut config.gateway);

    let _sentry = init_logging(&args.log_level, config.common.logging.as_ref())?;
    if let Some(metrics) = &config.common.metrics {
        init_metrics(metrics)?;
    }

    tracing::info!(config = %args.config.config.display(), "Starting restified");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(gateway::run(config.gateway))?;
    Ok(())
}

fn validate(args: ConfigArgs) -> Result<(), CliError> {
    let config = Config::from_file(&args.config)?;
    config.gateway.validate()?;

    let endpoints = EndpointTable::new(config.gateway.restified_endpoints);
    let overlaps = endpoints.overlaps();
    for overlap in &overlaps {
        let methods: Vec<&str> = overlap.methods.iter().map(|m| m.as_str()).collect();
        println!(
            "warning: {} [{}] is shadowed by {}",
            overlap.later,
            methods.join(", "),
            overlap.earlier
        );
    }

    println!(
        "{}: {} endpoints, {} overlapping",
        args.config.display(),
        endpoints.len(),
        overlaps.len()
    );
    Ok(())
}

fn init_logging(
    level: &str,
    logging: Option<&LoggingConfig>,
) -> Result<Option<sentry::ClientInitGuard>, CliError> {
    let filter = EnvFilter::try_new(level)?;

    let guard = match logging {
        Some(logging) => Some(sentry::init(sentry::ClientOptions {
            dsn: Some(logging.sentry_dsn.parse()?),
            release: sentry::release_name!(),
            ..Default::default()
        })),
        None => None,
    };
    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_layer)
        .init();

    Ok(guard)
}

fn init_metrics(config: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some(METRICS_PREFIX))?;
    metrics::set_global_recorder(recorder).map_err(|_| CliError::MetricsRecorder)
}
