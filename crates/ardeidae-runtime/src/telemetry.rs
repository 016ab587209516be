//! Process-wide `tracing` setup.
//!
//! [`init_tracing`] installs one subscriber made of up to three layers:
//!
//! | Layer | Enabled by |
//! |---|---|
//! | `EnvFilter` | always (`RUST_LOG`, default `info`) |
//! | compact or JSON formatter | `ARDEIDAE_LOG_FORMAT` (`compact` default, `json`) |
//! | OpenTelemetry span export over OTLP/HTTP | `OTEL_EXPORTER_OTLP_ENDPOINT` |
//!
//! ```rust,no_run
//! let _telemetry = ardeidae_runtime::telemetry::init_tracing("ardeidae");
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "ARDEIDAE_LOG_FORMAT";

const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
const DEFAULT_FILTER: &str = "info";
const TRACER_NAME: &str = "ardeidae";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    /// Newline-delimited JSON for log shippers.
    Json,
}

impl LogFormat {
    /// Anything other than `json` (case-insensitive) means compact.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "json" => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// Everything [`init_tracing`] reads from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub filter: String,
    pub format: LogFormat,
    pub otlp_endpoint: Option<String>,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            filter: lookup("RUST_LOG")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FILTER.to_string()),
            format: LogFormat::parse(lookup(LOG_FORMAT_ENV).as_deref()),
            otlp_endpoint: lookup(OTLP_ENDPOINT_ENV).filter(|v| !v.trim().is_empty()),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|e| {
            eprintln!("[ardeidae] invalid RUST_LOG '{}' ({e}); using '{DEFAULT_FILTER}'", self.filter);
            EnvFilter::new(DEFAULT_FILTER)
        })
    }
}

/// Install the global subscriber.
///
/// Hold the returned guard until exit; dropping it flushes exported spans.
/// A second call leaves the first subscriber in place.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    let settings = LogSettings::from_env();
    let provider = settings
        .otlp_endpoint
        .as_deref()
        .and_then(|endpoint| build_provider(service_name, endpoint));

    let otel = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer(TRACER_NAME)));
    let (json, compact) = match settings.format {
        LogFormat::Json => (Some(fmt::layer().json()), None),
        LogFormat::Compact => (None, Some(fmt::layer().compact())),
    };

    let installed = tracing_subscriber::registry()
        .with(settings.env_filter())
        .with(otel)
        .with(json)
        .with(compact)
        .try_init();
    if let Err(e) = installed {
        eprintln!("[ardeidae] tracing subscriber already installed: {e}");
    }

    TracerProviderGuard(provider)
}

/// Shuts the [`SdkTracerProvider`] down on drop.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl TracerProviderGuard {
    /// `true` when spans go to a collector.
    pub fn is_exporting(&self) -> bool {
        self.0.is_some()
    }
}

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("[ardeidae] span exporter shutdown failed: {e}");
        }
    }
}

/// OTLP/HTTP provider for `endpoint`; `None` when the exporter cannot be built.
fn build_provider(service_name: &str, endpoint: &str) -> Option<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[ardeidae] OTLP exporter for {endpoint} failed: {e}"))
        .ok()?;

    Some(
        SdkTracerProvider::builder()
            .with_resource(Resource::builder().with_service_name(service_name.to_string()).build())
            // Simple exporter: the Tokio runtime does not exist yet.
            .with_simple_exporter(exporter)
            .build(),
    )
}
