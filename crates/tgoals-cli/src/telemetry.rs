//! Log output for the `tgoals` binary.
//!
//! `RUST_LOG` overrides the level picked from `verbose` (`info` or `warn`).
//! `TGOALS_LOG_FORMAT=json` switches to newline-delimited JSON. Setting
//! `OTEL_EXPORTER_OTLP_ENDPOINT` also exports runtime spans over OTLP/HTTP.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. Hold the returned guard until exit.
pub fn init_tracing(service_name: &str, verbose: bool) -> TracerProviderGuard {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose)));
    let use_json = std::env::var("TGOALS_LOG_FORMAT").as_deref() == Ok("json");
    let provider = build_provider(service_name);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            provider
                .as_ref()
                .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("tgoals"))),
        )
        .with(use_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!use_json).then(|| tracing_subscriber::fmt::layer().compact()))
        .init();

    TracerProviderGuard(provider)
}

fn default_level(verbose: bool) -> &'static str {
    if verbose { "info" } else { "warn" }
}

/// Flushes and shuts the span exporter down on drop.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("[tgoals] span exporter shutdown error: {e}");
        }
    }
}

fn build_provider(service_name: &str) -> Option<SdkTracerProvider> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[tgoals] OTLP exporter init failed: {e}"))
        .ok()?;

    // No async runtime in the CLI: export synchronously.
    Some(
        SdkTracerProvider::builder()
            .with_resource(Resource::builder().with_service_name(service_name.to_string()).build())
            .with_simple_exporter(exporter)
            .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_the_default_level() {
        assert_eq!(default_level(true), "info");
        assert_eq!(default_level(false), "warn");
    }

    #[test]
    fn no_exporter_without_endpoint() {
        // SAFETY: no other test reads this variable.
        unsafe { std::env::remove_var("OTEL_EXPORTER_OTLP_ENDPOINT") };
        assert!(build_provider("tgoals-test").is_none());
        drop(TracerProviderGuard(None));
    }
}
