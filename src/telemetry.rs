use crate::config::TelemetryConfig;
use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Crates whose events follow the configured level; everything else stays at `warn`.
const WORKSPACE_TARGETS: [&str; 2] = ["ticket_reflect", "ticket_reflect_api"];

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter '{directives}' built from level '{level}'")]
    InvalidFilter {
        level: String,
        directives: String,
        #[source]
        source: ParseError,
    },
    #[error("global subscriber already installed: {0}")]
    Subscriber(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Expands a bare level into workspace-scoped directives. Values that already carry
/// directives (`target=level` pairs or comma lists) are used as given.
pub fn default_directives(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }

    let mut directives = vec!["warn".to_string()];
    directives.extend(
        WORKSPACE_TARGETS
            .iter()
            .map(|target| format!("{target}={level}")),
    );
    directives.join(",")
}

/// `RUST_LOG` wins when it parses; otherwise the configured level is scoped to the workspace.
pub fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let directives = default_directives(&config.log_level);
    EnvFilter::try_new(&directives).map_err(|source| TelemetryError::InvalidFilter {
        level: config.log_level.clone(),
        directives,
        source,
    })
}

/// Installs the global subscriber. Span close events carry the refinement loop timings.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(config)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}
