//! OpenTelemetry initialization and utilities
//!
//! Provides functions to set up distributed tracing with OTLP export.

use opentelemetry::trace::TraceError;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    runtime,
    trace::{self, Sampler},
    Resource,
};
use std::env;
use tracing_subscriber::{registry::LookupSpan, Layer};

pub const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Initialize the OTLP tracer and return a layer for the subscriber
pub fn init_telemetry<S>(_subscriber: &S) -> Result<Box<dyn Layer<S> + Send + Sync>, TraceError>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a> + Send + Sync,
{
    global::set_text_map_propagator(TraceContextPropagator::new());

    let otlp_endpoint =
        env::var(OTLP_ENDPOINT_ENV).unwrap_or_else(|_| "http://localhost:4317".to_string());

    // Spans carry CIDs and gateway URLs; keep them off the wire in clear text
    if !is_local_or_tls(&otlp_endpoint) {
        tracing::warn!(
            "Unencrypted telemetry endpoint detected for remote host {}",
            otlp_endpoint
        );
    }

    let resource = Resource::new(vec![
        KeyValue::new("service.name", "filecoin-pin-provider"),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ]);

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(&otlp_endpoint);

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            trace::config()
                .with_resource(resource)
                .with_sampler(Sampler::AlwaysOn),
        )
        .install_batch(runtime::Tokio)?;

    Ok(tracing_opentelemetry::layer().with_tracer(tracer).boxed())
}

fn is_local_or_tls(endpoint: &str) -> bool {
    !endpoint.starts_with("http://")
        || endpoint.contains("localhost")
        || endpoint.contains("127.0.0.1")
        || endpoint.contains("[::1]")
}

/// Flush and shut down the tracer provider
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
