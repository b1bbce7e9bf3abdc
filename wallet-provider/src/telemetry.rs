//! Logging and `OpenTelemetry` tracing setup.
//!
//! [`Telemetry`] installs a `tracing-subscriber` registry writing to stderr,
//! so that command output on stdout stays machine readable. With the
//! `telemetry` feature, spans are also exported over OTLP when the
//! `OTEL_EXPORTER_OTLP_*` environment variables are present.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "telemetry")]
mod otlp {
    use std::env;

    use opentelemetry::{KeyValue, Value};
    use opentelemetry_sdk::{
        Resource,
        trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
    };
    use opentelemetry_semantic_conventions::{SCHEMA_URL, attribute::SERVICE_VERSION};

    /// Supported OTLP transport protocols.
    #[derive(Debug, Clone, Copy)]
    pub(super) enum OtlpProtocol {
        Http,
        Grpc,
    }

    /// Resolve an env var with a programmatic fallback.
    fn resolve_env(env_key: &str, fallback: Option<&str>) -> Option<Value> {
        env::var(env_key)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(Value::from)
            .or_else(|| fallback.map(|v| Value::from(v.to_owned())))
    }

    /// Detects OTLP protocol from environment. Returns `None` if OTEL is not configured.
    pub(super) fn detect_protocol() -> Option<OtlpProtocol> {
        let is_enabled = env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok()
            || env::var("OTEL_EXPORTER_OTLP_HEADERS").is_ok()
            || env::var("OTEL_EXPORTER_OTLP_PROTOCOL").is_ok();
        is_enabled.then(|| {
            env::var("OTEL_EXPORTER_OTLP_PROTOCOL")
                .ok()
                .map_or(OtlpProtocol::Http, |s| match s.as_str() {
                    "grpc" => OtlpProtocol::Grpc,
                    _ => OtlpProtocol::Http,
                })
        })
    }

    fn resource(name: Option<&str>, version: Option<&str>) -> Resource {
        let mut builder = Resource::builder();
        if let Some(name) = resolve_env("OTEL_SERVICE_NAME", name) {
            builder = builder.with_service_name(name);
        }
        if let Some(version) = resolve_env("OTEL_SERVICE_VERSION", version) {
            builder =
                builder.with_schema_url([KeyValue::new(SERVICE_VERSION, version)], SCHEMA_URL);
        }
        builder.build()
    }

    /// Initializes the tracer provider, or `None` if the exporter cannot be built.
    pub(super) fn init_tracer(
        protocol: OtlpProtocol,
        name: Option<&str>,
        version: Option<&str>,
    ) -> Option<SdkTracerProvider> {
        let exporter = match protocol {
            OtlpProtocol::Http => opentelemetry_otlp::SpanExporter::builder()
                .with_http()
                .build(),
            OtlpProtocol::Grpc => opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .build(),
        };
        let exporter = exporter.ok()?;

        Some(
            SdkTracerProvider::builder()
                .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
                    1.0,
                ))))
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(resource(name, version))
                .with_batch_exporter(exporter)
                .build(),
        )
    }
}

/// Service identity and log filter for the subscriber.
///
/// The service name and version can be overridden via `OTEL_SERVICE_NAME`
/// and `OTEL_SERVICE_VERSION`.
#[derive(Debug, Default)]
pub struct Telemetry {
    name: Option<String>,
    version: Option<String>,
    log_level: Option<String>,
}

impl Telemetry {
    /// Creates a new, empty [`Telemetry`] instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the service name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the service version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the log level filter used when `RUST_LOG` is not set.
    ///
    /// Accepts any valid [`EnvFilter`] directive string (e.g. `"debug"`,
    /// `"wallet_provider=trace"`).
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    /// Log filter: `RUST_LOG` first, then the configured level, then `info`.
    fn filter(&self) -> EnvFilter {
        let fallback = self.log_level.as_deref().unwrap_or("info");
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(fallback))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }

    /// Installs the global subscriber.
    ///
    /// Returns [`TelemetryGuard`] that flushes exporters on drop. Calling this
    /// more than once keeps the first subscriber.
    pub fn register(self) -> TelemetryGuard {
        #[cfg(feature = "telemetry")]
        {
            use opentelemetry::trace::TracerProvider;
            use tracing_opentelemetry::OpenTelemetryLayer;

            let protocol = otlp::detect_protocol();
            let tracer_provider = protocol.and_then(|p| {
                otlp::init_tracer(p, self.name.as_deref(), self.version.as_deref())
            });
            // Option<Layer> is a no-op when None
            let otel_layer = tracer_provider
                .as_ref()
                .map(|tp| OpenTelemetryLayer::new(tp.tracer("wallet-provider")));

            let installed = tracing_subscriber::registry()
                .with(self.filter())
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .with(otel_layer)
                .try_init()
                .is_ok();

            if installed && tracer_provider.is_some() {
                tracing::info!("OpenTelemetry exporter registered");
            } else if installed {
                tracing::debug!("OpenTelemetry is not configured, console logging only");
            }

            TelemetryGuard { tracer_provider }
        }

        #[cfg(not(feature = "telemetry"))]
        {
            let _ = tracing_subscriber::registry()
                .with(self.filter())
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init();
            TelemetryGuard {}
        }
    }
}

/// Owns the tracer provider; performs graceful shutdown on drop.
#[derive(Debug)]
pub struct TelemetryGuard {
    #[cfg(feature = "telemetry")]
    tracer_provider: Option<opentelemetry_sdk::trace::SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        #[cfg(feature = "telemetry")]
        if let Some(ref tp) = self.tracer_provider
            && let Err(err) = tp.shutdown()
        {
            tracing::error!(?err, "tracer provider shutdown error");
        }
    }
}
