//! Prometheus exporter setup.
//!
//! Counters and histograms are recorded with the `metrics` macros throughout
//! the pipeline; they are only exported when a listener address is configured.

use crate::error::{PipelineError, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

pub const FETCH_REQUESTS_TOTAL: &str = "housing_vol_fetch_requests_total";
pub const FETCH_ERRORS_TOTAL: &str = "housing_vol_fetch_errors_total";
pub const FETCH_DURATION_SECONDS: &str = "housing_vol_fetch_duration_seconds";
pub const MARKETS_SKIPPED_TOTAL: &str = "housing_vol_markets_skipped_total";
pub const TABLE_ROWS: &str = "housing_vol_table_rows";
pub const PIPELINE_DURATION_SECONDS: &str = "housing_vol_pipeline_duration_seconds";

/// Install the Prometheus recorder with its own HTTP listener on `addr`.
/// Must be called from inside a tokio runtime.
pub fn init_metrics(addr: &str) -> Result<()> {
    let socket: SocketAddr = addr
        .parse()
        .map_err(|e| PipelineError::Config(format!("Invalid metrics_addr '{addr}': {e}")))?;

    PrometheusBuilder::new()
        .with_http_listener(socket)
        .install()
        .map_err(|e| PipelineError::Config(format!("Failed to install Prometheus recorder: {e}")))?;

    info!("Metrics exporter listening on http://{}/metrics", socket);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unparseable_address() {
        assert!(matches!(
            init_metrics("not-an-address"),
            Err(PipelineError::Config(_))
        ));
    }
}
