//! Market volatility pipeline: resolve the selection against the provider
//! catalog, fetch and normalize each market's history, and merge the results
//! into one table.

pub mod catalog;
pub mod fetch;
pub mod merge;
pub mod normalize;

use crate::config::{Config, FailurePolicy, RetryPolicy, UnmatchedPolicy};
use crate::error::{PipelineError, Result};
use crate::observability::{MARKETS_SKIPPED_TOTAL, PIPELINE_DURATION_SECONDS, TABLE_ROWS};
use crate::types::{Entity, MarketDataApi, NormalizedRecord, ParclId, UnifiedTable};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

pub use catalog::{clean_market_name, resolve_entities, EntityCatalog};
pub use fetch::fetch_history;
pub use merge::merge_series;
pub use normalize::normalize_series;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub concurrency: usize,
    pub failure_policy: FailurePolicy,
    pub unmatched_policy: UnmatchedPolicy,
    pub retry: RetryPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            concurrency: crate::constants::DEFAULT_CONCURRENCY,
            failure_policy: FailurePolicy::default(),
            unmatched_policy: UnmatchedPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&Config> for PipelineOptions {
    fn from(config: &Config) -> Self {
        Self {
            concurrency: config.concurrency,
            failure_policy: config.failure_policy,
            unmatched_policy: config.unmatched_policy,
            retry: config.retry.clone(),
        }
    }
}

/// A market dropped under `FailurePolicy::Skip`
#[derive(Debug, Clone)]
pub struct SkippedMarket {
    pub parcl_id: ParclId,
    pub reason: String,
}

/// Result of a complete pipeline run
#[derive(Debug)]
pub struct PipelineOutput {
    pub catalog: EntityCatalog,
    pub table: UnifiedTable,
    pub skipped: Vec<SkippedMarket>,
}

pub struct Pipeline;

impl Pipeline {
    /// Fetch and normalize a single market
    async fn process_market(
        api: &dyn MarketDataApi,
        entity: &Entity,
        retry: &RetryPolicy,
    ) -> Result<Vec<NormalizedRecord>> {
        let series = fetch_history(api, entity.parcl_id, retry).await?;
        normalize_series(entity, series)
    }

    /// Run the complete pipeline against a market data source.
    ///
    /// Markets are processed concurrently (at most `options.concurrency` at a
    /// time). Each worker fills its own slot; the table is assembled in
    /// selection order once every worker has finished. Under
    /// `FailurePolicy::Abort` the error returned is that of the earliest
    /// failing market in selection order, whichever finished first.
    #[instrument(skip_all, fields(api_name = %api.api_name(), selected = selection.len()))]
    pub async fn run(
        api: Arc<dyn MarketDataApi>,
        selection: &[ParclId],
        options: &PipelineOptions,
    ) -> Result<PipelineOutput> {
        let started = Instant::now();
        let api_name = api.api_name();

        info!("Fetching market catalog");
        let markets = api.get_markets().await?;
        let catalog = resolve_entities(selection, &markets, options.unmatched_policy)?;
        info!("Resolved {} of {} selected markets", catalog.len(), selection.len());

        let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut handles = Vec::with_capacity(catalog.len());
        for (slot, entity) in catalog.iter().cloned().enumerate() {
            let api = Arc::clone(&api);
            let semaphore = Arc::clone(&semaphore);
            let retry = options.retry.clone();
            handles.push(tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = Self::process_market(api.as_ref(), &entity, &retry).await;
                (slot, entity.parcl_id, result)
            }));
        }

        let mut slots: Vec<Option<Vec<NormalizedRecord>>> = vec![None; catalog.len()];
        let mut skipped = Vec::new();
        // Earliest failing slot under Abort; later slots are cancelled
        let mut failure: Option<(usize, PipelineError)> = None;
        while let Some(joined) = tasks.join_next().await {
            let (slot, parcl_id, result) = match joined {
                Ok(done) => done,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => return Err(PipelineError::from(e)),
            };
            match result {
                Ok(rows) => slots[slot] = Some(rows),
                Err(e) => match options.failure_policy {
                    FailurePolicy::Abort => {
                        if failure.as_ref().map_or(true, |(first, _)| slot < *first) {
                            for handle in &handles[slot + 1..] {
                                handle.abort();
                            }
                            failure = Some((slot, e));
                        }
                    }
                    FailurePolicy::Skip => {
                        warn!(parcl_id, "Skipping market: {}", e);
                        counter!(MARKETS_SKIPPED_TOTAL, "api" => api_name).increment(1);
                        skipped.push(SkippedMarket {
                            parcl_id,
                            reason: e.to_string(),
                        });
                    }
                },
            }
        }
        if let Some((_, e)) = failure {
            return Err(e);
        }

        let table = merge_series(slots.into_iter().flatten());
        if table.is_empty() {
            warn!("No market produced any rows; the chart will be empty");
        }

        histogram!(TABLE_ROWS, "api" => api_name).record(table.len() as f64);
        histogram!(PIPELINE_DURATION_SECONDS, "api" => api_name)
            .record(started.elapsed().as_secs_f64());
        info!(
            "Pipeline finished: {} rows across {} markets ({} skipped)",
            table.len(),
            table.markets().len(),
            skipped.len()
        );

        Ok(PipelineOutput {
            catalog,
            table,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FetchedSeries, MarketDescriptor, MetricRecord};
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::time::Duration;

    /// In-memory source; `delays` lets later markets finish first
    struct FakeApi {
        markets: Vec<MarketDescriptor>,
        history: HashMap<ParclId, Vec<MetricRecord>>,
        delays: HashMap<ParclId, u64>,
    }

    #[async_trait::async_trait]
    impl MarketDataApi for FakeApi {
        fn api_name(&self) -> &'static str {
            "fake"
        }

        async fn get_markets(&self) -> Result<Vec<MarketDescriptor>> {
            Ok(self.markets.clone())
        }

        async fn get_history(&self, parcl_id: ParclId) -> Result<FetchedSeries> {
            if let Some(ms) = self.delays.get(&parcl_id) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            match self.history.get(&parcl_id) {
                Some(records) => Ok(FetchedSeries {
                    parcl_id,
                    records: records.clone(),
                }),
                None => Err(PipelineError::Api {
                    url: format!("fake://{parcl_id}"),
                    status: 404,
                    body: "not found".into(),
                }),
            }
        }
    }

    fn day(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, 1).unwrap()
    }

    fn fake() -> FakeApi {
        let markets = (1..=3)
            .map(|id| MarketDescriptor {
                parcl_id: id,
                name: format!("Market{id} City"),
                region: "XX".into(),
            })
            .collect();
        let mut history = HashMap::new();
        history.insert(1, vec![MetricRecord::new(day(1), 0.1), MetricRecord::new(day(2), 0.2)]);
        history.insert(2, vec![MetricRecord::new(day(1), 0.05)]);
        history.insert(3, vec![MetricRecord::new(day(1), 0.3), MetricRecord::new(day(2), 0.0)]);
        FakeApi {
            markets,
            history,
            delays: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_table_follows_selection_order_not_completion_order() {
        let mut api = fake();
        api.delays.insert(1, 50);
        let api: Arc<dyn MarketDataApi> = Arc::new(api);

        let output = Pipeline::run(api, &[1, 2], &PipelineOptions::default()).await.unwrap();

        assert_eq!(output.table.len(), 3);
        assert_eq!(output.table.markets(), vec!["Market1", "Market2"]);
        let ids: Vec<ParclId> = output.table.rows().iter().map(|r| r.parcl_id).collect();
        assert_eq!(ids, vec![1, 1, 2]);
    }

    #[tokio::test]
    async fn test_abort_policy_fails_whole_run() {
        let api: Arc<dyn MarketDataApi> = Arc::new(fake());
        let err = Pipeline::run(api, &[1, 3], &PipelineOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::BaselineDivisionByZero { parcl_id: 3, .. }));
    }

    #[tokio::test]
    async fn test_abort_reports_earliest_failure_in_selection_order() {
        let mut api = fake();
        api.markets.push(MarketDescriptor {
            parcl_id: 4,
            name: "Nowhere".into(),
            region: "XX".into(),
        });
        // 4 fails slowly, 3 fails immediately
        api.delays.insert(4, 50);
        let api: Arc<dyn MarketDataApi> = Arc::new(api);

        let err = Pipeline::run(api, &[4, 3, 1], &PipelineOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_skip_policy_drops_failing_markets() {
        let mut missing_history = fake();
        missing_history.markets.push(MarketDescriptor {
            parcl_id: 4,
            name: "Nowhere".into(),
            region: "XX".into(),
        });
        let api: Arc<dyn MarketDataApi> = Arc::new(missing_history);
        let options = PipelineOptions {
            failure_policy: FailurePolicy::Skip,
            concurrency: 1,
            ..PipelineOptions::default()
        };

        let output = Pipeline::run(api, &[3, 1, 4, 2], &options).await.unwrap();

        assert_eq!(output.table.markets(), vec!["Market1", "Market2"]);
        let mut skipped: Vec<ParclId> = output.skipped.iter().map(|s| s.parcl_id).collect();
        skipped.sort_unstable();
        assert_eq!(skipped, vec![3, 4]);
        assert_eq!(output.catalog.len(), 4);
    }

    #[tokio::test]
    async fn test_unmatched_selection_dropped_by_default() {
        let api: Arc<dyn MarketDataApi> = Arc::new(fake());
        let output = Pipeline::run(api, &[2, 99], &PipelineOptions::default()).await.unwrap();
        assert_eq!(output.catalog.ids(), vec![2]);
        assert_eq!(output.table.len(), 1);
    }
}
