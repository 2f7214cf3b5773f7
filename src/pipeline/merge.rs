use crate::types::{NormalizedRecord, UnifiedTable};

/// Concatenate per-market rows in the order given. Rows are neither
/// re-sorted nor de-duplicated.
pub fn merge_series<I>(per_market: I) -> UnifiedTable
where
    I: IntoIterator<Item = Vec<NormalizedRecord>>,
{
    let mut rows = Vec::new();
    for series in per_market {
        rows.extend(series);
    }
    UnifiedTable::from_rows(rows)
}
