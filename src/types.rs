use crate::error::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Provider-assigned market identifier
pub type ParclId = u64;

/// Market descriptor as listed by the provider's markets endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDescriptor {
    pub parcl_id: ParclId,
    pub name: String,
    #[serde(rename = "state")]
    pub region: String,
}

/// A market selected for charting, with its cleaned display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub parcl_id: ParclId,
    pub name: String,
    pub region: String,
}

/// One dated observation of a market's financial metrics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub date: NaiveDate,
    pub annual_volatility: f64,
    /// Any other numeric metrics the provider sent alongside volatility
    pub extra: BTreeMap<String, f64>,
}

impl MetricRecord {
    pub fn new(date: NaiveDate, annual_volatility: f64) -> Self {
        Self {
            date,
            annual_volatility,
            extra: BTreeMap::new(),
        }
    }
}

/// A market's history, sorted ascending by date
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedSeries {
    pub parcl_id: ParclId,
    pub records: Vec<MetricRecord>,
}

/// A metric record tagged with its market and its change relative to the
/// market's earliest observation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub parcl_id: ParclId,
    pub market: String,
    #[serde(flatten)]
    pub record: MetricRecord,
    pub pct_change: f64,
}

/// All normalized rows across markets, grouped in selection order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnifiedTable {
    rows: Vec<NormalizedRecord>,
}

impl UnifiedTable {
    pub fn from_rows(rows: Vec<NormalizedRecord>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[NormalizedRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct market labels in first-seen order
    pub fn markets(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for row in &self.rows {
            if !seen.contains(&row.market.as_str()) {
                seen.push(row.market.as_str());
            }
        }
        seen
    }

    /// Rows belonging to one market label, in table order
    pub fn series<'a>(
        &'a self,
        market: &'a str,
    ) -> impl Iterator<Item = &'a NormalizedRecord> + 'a {
        self.rows.iter().filter(move |row| row.market == market)
    }
}

/// Source of market catalog and history data
#[async_trait::async_trait]
pub trait MarketDataApi: Send + Sync {
    /// Short name used in logs and metrics labels
    fn api_name(&self) -> &'static str;

    /// Fetch every market the provider knows about
    async fn get_markets(&self) -> Result<Vec<MarketDescriptor>>;

    /// Fetch one market's history, sorted ascending by date
    async fn get_history(&self, parcl_id: ParclId) -> Result<FetchedSeries>;
}
