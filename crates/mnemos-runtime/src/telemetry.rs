//! Tracing pipeline initialisation for mnemos.
//!
//! Call [`init_tracing`] once at process startup to wire up the `tracing`
//! subscriber with an optional OTLP span exporter.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | OTLP collector base URL (e.g. `http://localhost:4318`). When set the OTLP HTTP exporter is activated. |
//! | `RUST_LOG` | Log filter; overrides the default derived from [`LogSettings`]. |
//! | `MNEMOS_LOG_FORMAT=json` | Emit newline-delimited JSON logs. |
//!
//! # Example
//!
//! ```rust,no_run
//! use mnemos_runtime::telemetry::{init_tracing, LogSettings};
//!
//! // Hold the guard for the entire lifetime of the process.
//! let _guard = init_tracing("mnemos", LogSettings::default());
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// The verbosity toggles of the configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogSettings {
    /// Default filter `debug` instead of `info`.
    pub verbose: bool,
    /// Suppress all logs, whatever `RUST_LOG` says.
    pub quiet: bool,
}

impl LogSettings {
    /// Filter directive used when `RUST_LOG` is unset.
    pub fn default_directive(&self) -> &'static str {
        if self.quiet {
            "off"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    fn filter(&self) -> EnvFilter {
        if self.quiet {
            return EnvFilter::new("off");
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.default_directive()))
    }
}

/// Initialise the global `tracing` subscriber with an optional OTLP exporter.
///
/// When `OTEL_EXPORTER_OTLP_ENDPOINT` is set an OTLP/HTTP span exporter is
/// configured and all spans (including the `infer` span) are forwarded to the
/// collector.  Otherwise only the console formatter is installed.
///
/// The returned [`TracerProviderGuard`] **must** be held for the lifetime of
/// the process; dropping it flushes all pending spans.
pub fn init_tracing(service_name: &str, settings: LogSettings) -> TracerProviderGuard {
    let env_filter = settings.filter();
    let use_json = std::env::var("MNEMOS_LOG_FORMAT").as_deref() == Ok("json");

    let provider = if settings.quiet {
        None
    } else {
        build_provider(service_name, std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok())
    };

    if let Some(ref p) = provider {
        let tracer = p.tracer("mnemos");
        let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
        if use_json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(otel_layer)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(otel_layer)
                .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    } else if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }

    TracerProviderGuard(provider)
}

// ─────────────────────────────────────────────────────────────────────────────
// RAII guard
// ─────────────────────────────────────────────────────────────────────────────

/// Shuts down the OTel [`SdkTracerProvider`] on drop, flushing pending spans.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("[mnemos] OpenTelemetry provider shutdown error: {e}");
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Build an [`SdkTracerProvider`] exporting to `endpoint`, if any.
fn build_provider(service_name: &str, endpoint: Option<String>) -> Option<SdkTracerProvider> {
    let endpoint = endpoint?;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[mnemos] OTLP exporter init failed: {e}"))
        .ok()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            // Exports run on the processor's own thread, never on a Tokio
            // worker where the blocking HTTP client would panic.
            .with_batch_exporter(exporter)
            .build(),
    )
}
