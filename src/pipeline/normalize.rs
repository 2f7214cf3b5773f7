use crate::error::{PipelineError, Result};
use crate::types::{Entity, FetchedSeries, NormalizedRecord};

/// Express every observation relative to the market's earliest one:
/// `1 - first / current`.
///
/// The series must already be sorted by date. The first record's change is
/// 0 by definition, so a zero baseline never divides. A zero value anywhere
/// after the first record is reported instead of producing an infinite ratio.
pub fn normalize_series(entity: &Entity, series: FetchedSeries) -> Result<Vec<NormalizedRecord>> {
    let parcl_id = series.parcl_id;
    let baseline = match series.records.first() {
        Some(first) => first.annual_volatility,
        None => return Err(PipelineError::EmptySeries { parcl_id }),
    };

    series
        .records
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            let pct_change = if i == 0 {
                0.0
            } else if record.annual_volatility == 0.0 {
                return Err(PipelineError::BaselineDivisionByZero {
                    parcl_id,
                    date: record.date,
                });
            } else {
                1.0 - baseline / record.annual_volatility
            };
            Ok(NormalizedRecord {
                parcl_id,
                market: entity.name.clone(),
                record,
                pct_change,
            })
        })
        .collect()
}
