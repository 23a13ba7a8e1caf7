//! Tracing subscriber setup with an optional OTLP span exporter.

use std::time::Duration;

use opentelemetry::trace::TracerProvider;
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{BatchSpanProcessor, Sampler, SdkTracerProvider};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::TelemetryConfig;

/// Keeps the tracer provider alive. Call [`TelemetryGuard::shutdown`] before
/// exit to flush buffered spans.
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    pub fn shutdown(mut self) {
        if let Some(provider) = self.provider.take()
            && let Err(e) = provider.shutdown()
        {
            tracing::warn!(error = %e, "tracer provider shutdown failed");
        }
    }
}

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// The fmt layer is always present. With telemetry enabled an OpenTelemetry
/// layer is stacked on top; an exporter that cannot be built is logged and
/// the server continues with fmt output only.
pub fn init(config: &TelemetryConfig) -> TelemetryGuard {
    let fmt_layer = tracing_subscriber::fmt::layer();

    if !config.enabled {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt_layer)
            .init();
        return TelemetryGuard { provider: None };
    }

    let exporter = match build_exporter(config) {
        Ok(exporter) => exporter,
        Err(e) => {
            tracing_subscriber::registry()
                .with(env_filter())
                .with(fmt_layer)
                .init();
            tracing::error!(
                error = %e,
                endpoint = %config.endpoint,
                protocol = %config.protocol,
                "failed to build OTLP exporter, continuing without span export"
            );
            return TelemetryGuard { provider: None };
        }
    };

    let mut attributes = vec![
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ];
    for (k, v) in &config.resource_attributes {
        attributes.push(KeyValue::new(k.clone(), v.clone()));
    }
    let resource = Resource::builder().with_attributes(attributes).build();

    let provider = SdkTracerProvider::builder()
        .with_span_processor(BatchSpanProcessor::builder(exporter).build())
        .with_sampler(sampler(config.sample_ratio))
        .with_resource(resource)
        .build();
    global::set_tracer_provider(provider.clone());

    let otel_layer = tracing_opentelemetry::layer().with_tracer(provider.tracer("pockity"));

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt_layer)
        .with(otel_layer)
        .init();

    info!(
        endpoint = %config.endpoint,
        protocol = %config.protocol,
        sample_ratio = config.sample_ratio,
        "span export enabled"
    );

    TelemetryGuard {
        provider: Some(provider),
    }
}

fn sampler(ratio: f64) -> Sampler {
    if ratio >= 1.0 {
        Sampler::AlwaysOn
    } else if ratio <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(ratio)
    }
}

fn build_exporter(
    config: &TelemetryConfig,
) -> Result<opentelemetry_otlp::SpanExporter, opentelemetry::trace::TraceError> {
    let timeout = Duration::from_secs(config.timeout_seconds);
    match config.protocol.as_str() {
        "http" => opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(&config.endpoint)
            .with_timeout(timeout)
            .build(),
        other => {
            if other != "grpc" {
                tracing::warn!(protocol = %other, "unknown telemetry protocol, using grpc");
            }
            opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(&config.endpoint)
                .with_timeout(timeout)
                .build()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampler_bounds() {
        assert!(matches!(sampler(1.0), Sampler::AlwaysOn));
        assert!(matches!(sampler(0.0), Sampler::AlwaysOff));
        assert!(matches!(sampler(0.5), Sampler::TraceIdRatioBased(_)));
    }
}
