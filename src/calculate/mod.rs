//! Statistics calculation engine.
//!
//! Computes aggregate SLA timings from a loaded [`SlaTable`]:
//! - Whole-table mean per stage
//! - Per-group means (period, vendor, transaction type)
//! - Row counts per period with a synthetic TOTAL row
//! - Trend series ordered by an explicit period ordering
//!
//! Null durations are excluded from every mean. A group with no usable
//! value has a `None` mean, never zero.

use std::collections::HashMap;

use crate::models::{
    AggregateRow, CountTable, DurationValue, GroupKey, PeriodOrdering, SlaRecord, SlaTable,
    StageMean,
};

/// Whether a trend series includes periods that have no records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Density {
    /// Periods without records are left out.
    #[default]
    Sparse,
    /// Periods without records appear as fully-null rows.
    Dense,
}

/// Which vendors to keep before aggregating.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VendorSelection {
    #[default]
    All,
    Only(Vec<String>),
}

impl VendorSelection {
    /// Parse a comma-separated list. Empty input or an `ALL` entry selects everything.
    pub fn parse(s: &str) -> Self {
        let names: Vec<String> = s
            .split(',')
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        if names.is_empty() || names.iter().any(|n| n.eq_ignore_ascii_case("ALL")) {
            VendorSelection::All
        } else {
            VendorSelection::Only(names)
        }
    }

    fn matches(&self, record: &SlaRecord) -> bool {
        match self {
            VendorSelection::All => true,
            VendorSelection::Only(names) => record
                .vendor
                .as_ref()
                .is_some_and(|v| names.iter().any(|n| n == v)),
        }
    }
}

/// Arithmetic mean of the non-null values, with the number of values used.
pub fn mean_of<I>(values: I) -> (Option<f64>, usize)
where
    I: IntoIterator<Item = DurationValue>,
{
    let mut sum = 0f64;
    let mut count = 0usize;
    for v in values.into_iter().flatten() {
        sum += v as f64;
        count += 1;
    }
    if count == 0 {
        (None, 0)
    } else {
        (Some(sum / count as f64), count)
    }
}

fn stage_means(records: &[&SlaRecord], stages: &[String]) -> Vec<StageMean> {
    stages
        .iter()
        .map(|stage| {
            let (mean_seconds, count) = mean_of(records.iter().map(|r| r.duration(stage)));
            StageMean {
                stage: stage.clone(),
                mean_seconds,
                count,
            }
        })
        .collect()
}

/// Whole-table mean per stage.
pub fn overall_means(table: &SlaTable, stages: &[String]) -> Vec<StageMean> {
    let records: Vec<&SlaRecord> = table.records.iter().collect();
    stage_means(&records, stages)
}

fn key_of(record: &SlaRecord, key: GroupKey) -> Option<&str> {
    match key {
        GroupKey::Period => record.period.as_deref(),
        GroupKey::Vendor => record.vendor.as_deref(),
        GroupKey::TransactionType => record.transaction_type.as_deref(),
    }
}

/// Partition records by a key, returning partitions in output order.
///
/// Period partitions follow the table's [`PeriodOrdering`]; a period missing
/// from the ordering goes after the known ones in first-appearance order.
/// Vendor and transaction-type partitions are sorted by key. Records without
/// a key are not part of any partition.
fn partition<'a>(table: &'a SlaTable, key: GroupKey) -> Vec<(String, Vec<&'a SlaRecord>)> {
    let mut order: Vec<&'a str> = Vec::new();
    let mut groups: HashMap<&'a str, Vec<&'a SlaRecord>> = HashMap::new();
    for record in &table.records {
        if let Some(k) = key_of(record, key) {
            groups
                .entry(k)
                .or_insert_with(|| {
                    order.push(k);
                    Vec::new()
                })
                .push(record);
        }
    }

    match key {
        GroupKey::Period => {
            let index = table.periods.index();
            order.sort_by_key(|k| index.get(k).copied().unwrap_or(usize::MAX));
        }
        GroupKey::Vendor | GroupKey::TransactionType => order.sort(),
    }

    order
        .into_iter()
        .map(|k| (k.to_string(), groups.remove(k).unwrap_or_default()))
        .collect()
}

/// Mean of each requested stage per group.
pub fn mean_by_group(table: &SlaTable, key: GroupKey, stages: &[String]) -> Vec<AggregateRow> {
    partition(table, key)
        .into_iter()
        .map(|(k, records)| AggregateRow {
            stages: stage_means(&records, stages),
            records: records.len(),
            key: k,
        })
        .collect()
}

/// Record counts per group, followed by a TOTAL row.
pub fn count_by_group(table: &SlaTable, key: GroupKey) -> CountTable {
    let groups = partition(table, key)
        .into_iter()
        .map(|(k, records)| (k, records.len()))
        .collect();
    CountTable::from_groups(groups)
}

/// Per-period means in exactly the order of `periods_ordered`.
///
/// Records whose period is not in `periods_ordered` are ignored.
pub fn trend_over_period(
    table: &SlaTable,
    periods_ordered: &PeriodOrdering,
    stages: &[String],
    density: Density,
) -> Vec<AggregateRow> {
    let mut by_period: HashMap<&str, Vec<&SlaRecord>> = HashMap::new();
    for record in &table.records {
        if let Some(p) = record.period.as_deref() {
            by_period.entry(p).or_default().push(record);
        }
    }

    periods_ordered
        .periods()
        .iter()
        .filter_map(|period| match by_period.get(period.as_str()) {
            Some(records) => Some(AggregateRow {
                key: period.clone(),
                records: records.len(),
                stages: stage_means(records, stages),
            }),
            None if density == Density::Dense => Some(AggregateRow {
                key: period.clone(),
                records: 0,
                stages: stage_means(&[], stages),
            }),
            None => None,
        })
        .collect()
}

/// Keep only the records that match a vendor selection.
pub fn filter_vendors(table: &SlaTable, selection: &VendorSelection) -> SlaTable {
    if *selection == VendorSelection::All {
        return table.clone();
    }
    let records = table
        .records
        .iter()
        .filter(|r| selection.matches(r))
        .cloned()
        .collect();
    SlaTable::new(table.stages.clone(), records, table.periods.clone())
}
