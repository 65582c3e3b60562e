//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for:
//! - `EventHub` fan-out (observers, deliveries, evictions)
//! - Cargo lifecycle transitions and failures
//!
//! # Example
//!
//! ```rust,no_run
//! use fleetops_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Start metrics server on port 9090
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address to bind to (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the global recorder and spawn the HTTP listener.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or a different recorder
    /// is already installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        // Register all metric descriptions
        register_metrics();

        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            // Configure histogram buckets for latency measurements
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        let handle = recorder.handle();
        let addr = self.addr;
        match metrics::set_global_recorder(recorder) {
            Ok(()) => {
                tokio::spawn(async move {
                    // ExporterError carries no Display/Debug
                    if exporter.await.is_err() {
                        tracing::error!(addr = %addr, "Metrics exporter stopped");
                    }
                });
                self.handle = Some(handle);
                tracing::info!(
                    addr = %self.addr,
                    "Metrics server started - available at http://{}/metrics",
                    self.addr
                );
                Ok(())
            }
            Err(_) => {
                // In tests, multiple MetricsServer instances may be created
                tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                Ok(())
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if server hasn't been started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Hub Metrics
    describe_gauge!("hub_observers", "Currently registered observers");
    describe_counter!(
        "hub_messages_delivered_total",
        "Messages accepted by observer queues"
    );
    describe_counter!(
        "hub_observers_evicted_total",
        "Observers removed because their queue was full or closed"
    );

    // Lifecycle Metrics
    describe_counter!(
        "lifecycle_transitions_total",
        "Committed cargo lifecycle operations, by kind"
    );
    describe_counter!(
        "lifecycle_errors_total",
        "Failed cargo lifecycle operations, by error kind"
    );
    describe_histogram!(
        "lifecycle_operation_duration_seconds",
        "Time from transaction start to commit"
    );
}

/// Lifecycle metrics recorder.
pub struct LifecycleMetrics;

impl LifecycleMetrics {
    /// Record a committed operation.
    pub fn record_transition(kind: &'static str, duration: Duration) {
        counter!("lifecycle_transitions_total", "kind" => kind).increment(1);
        histogram!("lifecycle_operation_duration_seconds", "kind" => kind)
            .record(duration.as_secs_f64());
    }

    /// Record a failed operation.
    pub fn record_error(kind: &'static str) {
        counter!("lifecycle_errors_total", "kind" => kind).increment(1);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn test_metrics_server_creation() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let server = MetricsServer::new(addr);
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
    }

    #[tokio::test]
    async fn test_metrics_server_start() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let mut server = MetricsServer::new(addr);

        let result = server.start();
        assert!(result.is_ok());

        // handle is None if another test already installed a recorder
        if server.handle().is_some() {
            LifecycleMetrics::record_transition("assign", Duration::from_millis(3));
            let rendered = server.render().unwrap();
            assert!(rendered.contains("lifecycle_transitions_total"));
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: the macros are no-ops and must not panic
        LifecycleMetrics::record_transition("assign", Duration::from_millis(3));
        LifecycleMetrics::record_error("not_found");
    }
}
