//! Prometheus metrics exporter.
//!
//! Uses the built-in HTTP listener from `metrics-exporter-prometheus`;
//! the request-duration histogram gets explicit buckets sized for
//! sub-millisecond pipeline runs.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

use logtest_core::config::MetricsConfig;
use logtest_core::metrics as m;

/// Parses and checks the scrape address from `config`.
pub fn listen_addr(config: &MetricsConfig) -> Result<SocketAddr> {
    if config.endpoint != "/metrics" {
        anyhow::bail!(
            "unsupported metrics endpoint '{}': only '/metrics' is served",
            config.endpoint
        );
    }

    format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .with_context(|| format!("invalid metrics listen address '{}'", config.listen_addr))
}

/// Install the global metrics recorder and start the HTTP listener.
///
/// Call once per process. Afterwards every `metrics::counter!()`,
/// `metrics::gauge!()` and `metrics::histogram!()` call is exported.
///
/// # Errors
///
/// - The endpoint or listen address is invalid
/// - Socket binding fails or a global recorder is already installed
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    let addr = listen_addr(config)?;
    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces; restrict listen_addr in untrusted networks"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(m::REQUEST_DURATION_SECONDS.to_owned()),
            m::REQUEST_DURATION_BUCKETS,
        )
        .context("invalid request duration buckets")?
        .install()
        .context("failed to install metrics recorder")?;

    m::describe_all();
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");
    Ok(())
}
