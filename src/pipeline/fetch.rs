use crate::config::RetryPolicy;
use crate::error::Result;
use crate::observability::{FETCH_DURATION_SECONDS, FETCH_ERRORS_TOTAL, FETCH_REQUESTS_TOTAL};
use crate::types::{FetchedSeries, MarketDataApi, ParclId};
use metrics::{counter, histogram};
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Fetch one market's history, retrying transient failures up to the
/// policy's attempt limit. Client errors and bad payloads fail immediately.
#[instrument(skip(api, retry), fields(api_name = %api.api_name()))]
pub async fn fetch_history(
    api: &dyn MarketDataApi,
    parcl_id: ParclId,
    retry: &RetryPolicy,
) -> Result<FetchedSeries> {
    let api_name = api.api_name();
    let mut attempt = 1;
    loop {
        counter!(FETCH_REQUESTS_TOTAL, "api" => api_name).increment(1);
        let started = Instant::now();
        let result = api.get_history(parcl_id).await;
        histogram!(FETCH_DURATION_SECONDS, "api" => api_name)
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(series) => {
                info!("Fetched {} records", series.records.len());
                return Ok(series);
            }
            Err(e) => {
                counter!(FETCH_ERRORS_TOTAL, "api" => api_name).increment(1);
                if attempt >= retry.max_attempts || !e.is_transient() {
                    return Err(e);
                }
                warn!(
                    "Attempt {}/{} failed: {}; retrying in {}ms",
                    attempt, retry.max_attempts, e, retry.delay_ms
                );
                tokio::time::sleep(retry.delay()).await;
                attempt += 1;
            }
        }
    }
}
