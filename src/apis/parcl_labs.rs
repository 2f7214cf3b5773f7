use crate::constants::MARKETS_PATH;
use crate::error::{PipelineError, Result};
use crate::types::{FetchedSeries, MarketDataApi, MarketDescriptor, MetricRecord, ParclId};
use chrono::{DateTime, NaiveDate};
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, instrument};

pub const PARCL_LABS_API: &str = "parcl_labs";

/// Longest slice of an error response body kept in `PipelineError::Api`
const ERROR_BODY_LIMIT: usize = 200;

/// Client for the Parcl Labs markets and financial-history endpoints.
///
/// Each call is a single attempt bounded by the configured timeout; retries
/// are layered on top by the pipeline.
pub struct ParclLabsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
pub struct HistoryPayload {
    pub metrics: Vec<RawMetric>,
}

#[derive(Debug, Deserialize)]
pub struct RawMetric {
    pub date: String,
    pub annual_volatility: Option<f64>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl ParclLabsClient {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("housing_vol/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn history_url(&self, parcl_id: ParclId) -> String {
        self.url(&format!("financials/{parcl_id}/history"))
    }

    fn transport_error(&self, url: &str, err: reqwest::Error) -> PipelineError {
        if err.is_timeout() {
            PipelineError::Timeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            PipelineError::Http(err)
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .header(AUTHORIZATION, self.api_key.as_str())
            .send()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Api {
                url: url.to_string(),
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        let bytes = resp.bytes().await.map_err(|e| self.transport_error(url, e))?;
        serde_json::from_slice(&bytes).map_err(|e| PipelineError::MalformedPayload {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl MarketDataApi for ParclLabsClient {
    fn api_name(&self) -> &'static str {
        PARCL_LABS_API
    }

    #[instrument(skip(self))]
    async fn get_markets(&self) -> Result<Vec<MarketDescriptor>> {
        let markets: Vec<MarketDescriptor> = self.get_json(&self.url(MARKETS_PATH)).await?;
        info!("Fetched {} markets from the catalog", markets.len());
        Ok(markets)
    }

    #[instrument(skip(self))]
    async fn get_history(&self, parcl_id: ParclId) -> Result<FetchedSeries> {
        let url = self.history_url(parcl_id);
        let payload: HistoryPayload = self.get_json(&url).await?;
        let records = records_from_payload(&url, payload)?;
        debug!("Parsed {} history records", records.len());
        Ok(FetchedSeries { parcl_id, records })
    }
}

/// Convert the wire payload into metric records sorted ascending by date.
/// Ties keep provider order.
pub fn records_from_payload(url: &str, payload: HistoryPayload) -> Result<Vec<MetricRecord>> {
    let malformed = |message: String| PipelineError::MalformedPayload {
        url: url.to_string(),
        message,
    };

    let mut records = payload
        .metrics
        .into_iter()
        .enumerate()
        .map(|(i, raw)| {
            let date = parse_date(&raw.date).ok_or_else(|| {
                malformed(format!("metrics[{i}]: unparseable date '{}'", raw.date))
            })?;
            let annual_volatility = raw
                .annual_volatility
                .filter(|v| v.is_finite())
                .ok_or_else(|| malformed(format!("metrics[{i}]: missing annual_volatility")))?;
            let extra = raw
                .other
                .into_iter()
                .filter_map(|(key, value)| value.as_f64().map(|v| (key, v)))
                .collect();
            Ok(MetricRecord {
                date,
                annual_volatility,
                extra,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    records.sort_by(|a, b| a.date.cmp(&b.date));
    Ok(records)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> HistoryPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_records_sorted_by_date() {
        let records = records_from_payload(
            "http://test",
            payload(json!({
                "metrics": [
                    {"date": "2020-03-01", "annual_volatility": 0.3},
                    {"date": "2020-01-01", "annual_volatility": 0.1},
                    {"date": "2020-02-01", "annual_volatility": 0.2}
                ]
            })),
        )
        .unwrap();

        let dates: Vec<String> = records.iter().map(|r| r.date.to_string()).collect();
        assert_eq!(dates, vec!["2020-01-01", "2020-02-01", "2020-03-01"]);
        assert_eq!(records[0].annual_volatility, 0.1);
    }

    #[test]
    fn test_extra_numeric_metrics_are_kept() {
        let records = records_from_payload(
            "http://test",
            payload(json!({
                "metrics": [{
                    "date": "2021-06-01T00:00:00Z",
                    "annual_volatility": 0.12,
                    "sharpe_ratio": 1.5,
                    "currency": "USD"
                }]
            })),
        )
        .unwrap();

        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2021, 6, 1).unwrap());
        assert_eq!(records[0].extra.get("sharpe_ratio"), Some(&1.5));
        assert!(!records[0].extra.contains_key("currency"));
    }

    #[test]
    fn test_missing_volatility_is_malformed() {
        let err = records_from_payload(
            "http://test",
            payload(json!({
                "metrics": [{"date": "2020-01-01", "annual_volatility": null}]
            })),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedPayload { .. }));
    }

    #[test]
    fn test_bad_date_is_malformed() {
        let err = records_from_payload(
            "http://test",
            payload(json!({
                "metrics": [{"date": "January 2020", "annual_volatility": 0.1}]
            })),
        )
        .unwrap_err();
        assert!(err.to_string().contains("January 2020"));
    }

    #[test]
    fn test_urls_are_joined_without_double_slash() {
        let client =
            ParclLabsClient::new("http://localhost:1/v1/", "key".into(), Duration::from_secs(1))
                .unwrap();
        assert_eq!(client.url(MARKETS_PATH), "http://localhost:1/v1/place/markets");
        assert_eq!(
            client.history_url(42),
            "http://localhost:1/v1/financials/42/history"
        );
    }
}
