//! Logging and OpenTelemetry setup
//!
//! The library itself only emits `tracing` events and spans and records
//! metrics through the global OpenTelemetry meter. This module is the opt-in
//! bootstrap an application calls once at startup to route all of that
//! somewhere: JSON logs on stdout, and traces and metrics to an OTLP
//! collector over gRPC.
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: collector endpoint (default `http://localhost:4317`)
//! - `RUST_LOG`: log filter, takes precedence over [`ObservabilityConfig::log_level`]
//!
//! ```rust,no_run
//! use xrow_core::ObservabilityConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ObservabilityConfig::new("billing-rpc")
//!         .with_endpoint("http://collector:4317")
//!         .with_log_level("debug");
//!
//!     xrow_core::init_observability(config).expect("observability");
//!
//!     // ... serve requests ...
//!
//!     xrow_core::shutdown_observability();
//! }
//! ```

use std::sync::Mutex;
use std::time::Duration;

use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{Error, Result};

/// How often metrics are pushed to the collector
const METRICS_INTERVAL: Duration = Duration::from_secs(30);

/// Providers installed by [`init_observability`], kept for shutdown
static PROVIDERS: Mutex<Option<Providers>> = Mutex::new(None);

struct Providers {
    tracer: Option<SdkTracerProvider>,
    meter: Option<SdkMeterProvider>,
}

/// Observability settings
///
/// Each pillar can be switched off on its own. With traces and metrics off
/// nothing is exported and only local JSON logs remain.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Reported as `service.name`
    pub service_name: String,
    /// Reported as `service.version`
    pub service_version: String,
    /// gRPC endpoint of the OTLP collector
    pub otlp_endpoint: String,
    pub enable_traces: bool,
    pub enable_metrics: bool,
    /// Print JSON log lines to stdout
    pub enable_logs: bool,
    /// Filter directive used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "xrow".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
            enable_traces: true,
            enable_metrics: true,
            enable_logs: true,
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl ObservabilityConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    pub fn with_logs(mut self, enable: bool) -> Self {
        self.enable_logs = enable;
        self
    }

    fn resource(&self) -> Resource {
        Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    self.service_name.clone(),
                ),
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    self.service_version.clone(),
                ),
            ])
            .build()
    }
}

fn setup_error(stage: &str, err: impl std::fmt::Display) -> Error {
    Error::Internal(format!("{} setup failed: {}", stage, err))
}

/// Install the global subscriber and OpenTelemetry providers
///
/// Call once per process. A second call fails because the global `tracing`
/// subscriber can only be set once. Exporters need a running Tokio runtime.
pub fn init_observability(config: ObservabilityConfig) -> Result<()> {
    let tracer_provider = if config.enable_traces {
        Some(init_tracer_provider(&config)?)
    } else {
        None
    };

    let meter_provider = if config.enable_metrics {
        Some(init_meter_provider(&config)?)
    } else {
        None
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| setup_error("log filter", e))?;

    let telemetry_layer = tracer_provider.as_ref().map(|provider| {
        use opentelemetry::trace::TracerProvider as _;
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service_name.clone()))
    });

    let fmt_layer = config.enable_logs.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .json()
    });

    tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| setup_error("subscriber", e))?;

    if let Ok(mut installed) = PROVIDERS.lock() {
        *installed = Some(Providers {
            tracer: tracer_provider,
            meter: meter_provider,
        });
    }

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = %config.otlp_endpoint,
        traces = config.enable_traces,
        metrics = config.enable_metrics,
        "Observability initialized"
    );

    Ok(())
}

fn init_tracer_provider(config: &ObservabilityConfig) -> Result<SdkTracerProvider> {
    use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler};

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()
        .map_err(|e| setup_error("span exporter", e))?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(config.resource())
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .build();

    global::set_tracer_provider(provider.clone());
    Ok(provider)
}

fn init_meter_provider(config: &ObservabilityConfig) -> Result<SdkMeterProvider> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()
        .map_err(|e| setup_error("metric exporter", e))?;

    let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
        .with_interval(METRICS_INTERVAL)
        .build();

    let provider = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build();

    global::set_meter_provider(provider.clone());
    Ok(provider)
}

/// Flush and shut down the providers installed by [`init_observability`]
///
/// Safe to call more than once; later calls find nothing to shut down.
pub fn shutdown_observability() {
    let providers = PROVIDERS.lock().ok().and_then(|mut installed| installed.take());
    let Some(providers) = providers else {
        return;
    };

    tracing::info!("Shutting down observability");

    if let Some(tracer) = providers.tracer {
        if let Err(e) = tracer.shutdown() {
            tracing::warn!(error = %e, "Tracer provider shutdown failed");
        }
    }
    if let Some(meter) = providers.meter {
        if let Err(e) = meter.shutdown() {
            tracing::warn!(error = %e, "Meter provider shutdown failed");
        }
    }
}
