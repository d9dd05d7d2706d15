//! Log and trace pipeline for the `sweepnav` binary.
//!
//! [`init_tracing`] installs one subscriber made of three layers:
//!
//! - an [`EnvFilter`] built from `RUST_LOG` (default `info`),
//! - a console formatter, compact or JSON per [`LogFormat`],
//! - when `OTEL_EXPORTER_OTLP_ENDPOINT` is set, an OpenTelemetry layer that
//!   exports the per-cycle spans opened by the
//!   [`ControlLoop`][crate::control_loop::ControlLoop].
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | OTLP/HTTP collector base URL, e.g. `http://localhost:4318`. |
//! | `RUST_LOG` | Log filter. |
//! | `SWEEPNAV_LOG_FORMAT` | `json` for newline-delimited JSON, anything else for compact lines. |
//!
//! # Example
//!
//! ```rust,no_run
//! let _guard = sweepnav_runtime::telemetry::init_tracing("sweepnav");
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Selects the console log format.
pub const LOG_FORMAT_VAR: &str = "SWEEPNAV_LOG_FORMAT";

const OTLP_ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
const DEFAULT_FILTER: &str = "info";

// ─────────────────────────────────────────────────────────────────────────────
// LogFormat
// ─────────────────────────────────────────────────────────────────────────────

/// Console line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Single-line human-readable output.
    #[default]
    Compact,
    /// Newline-delimited JSON objects.
    Json,
}

impl LogFormat {
    /// Interpret a `SWEEPNAV_LOG_FORMAT` value.  Unknown or missing values
    /// fall back to [`LogFormat::Compact`].
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }

    pub fn from_env() -> Self {
        Self::parse(std::env::var(LOG_FORMAT_VAR).ok().as_deref())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Install the global `tracing` subscriber.
///
/// Hold the returned [`TracerProviderGuard`] until the process exits so that
/// buffered spans are flushed.  A second call leaves the first subscriber in
/// place and reports the conflict on stderr.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let provider = build_provider(service_name);
    let otel_layer = provider.as_ref().map(|p| {
        tracing_opentelemetry::layer().with_tracer(p.tracer(service_name.to_string()))
    });

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer(LogFormat::from_env()))
        .with(otel_layer)
        .try_init()
    {
        eprintln!("[sweepnav] tracing subscriber already installed: {e}");
    }

    TracerProviderGuard(provider)
}

/// The console formatter for `format`, boxed so both variants share a type.
pub fn console_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    match format {
        LogFormat::Compact => tracing_subscriber::fmt::layer().compact().boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RAII guard
// ─────────────────────────────────────────────────────────────────────────────

/// Shuts the OTel [`SdkTracerProvider`] down on drop, flushing pending spans.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl TracerProviderGuard {
    /// Whether spans are being exported.
    pub fn is_exporting(&self) -> bool {
        self.0.is_some()
    }
}

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("[sweepnav] OpenTelemetry provider shutdown error: {e}");
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Build a provider exporting to `OTEL_EXPORTER_OTLP_ENDPOINT`, if set.
///
/// An exporter that cannot be built is reported on stderr and tracing
/// continues console-only.
fn build_provider(service_name: &str) -> Option<SdkTracerProvider> {
    let endpoint = std::env::var(OTLP_ENDPOINT_VAR).ok()?;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[sweepnav] OTLP exporter init failed: {e}"))
        .ok()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            // The loop is blocking; export each span as it closes.
            .with_simple_exporter(exporter)
            .build(),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
