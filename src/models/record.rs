//! Parsed SLA records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::PeriodOrdering;

/// Elapsed seconds for one stage of one record. `None` means the source cell
/// was empty or unparseable, which is not the same as zero elapsed time.
pub type DurationValue = Option<u64>;

/// One row of an uploaded SLA table after duration parsing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SlaRecord {
    pub period: Option<String>,
    pub transaction_type: Option<String>,
    pub vendor: Option<String>,
    /// Parsed durations keyed by logical stage name.
    pub durations: BTreeMap<String, DurationValue>,
}

impl SlaRecord {
    pub fn new(period: impl Into<String>) -> Self {
        Self {
            period: Some(period.into()),
            ..Default::default()
        }
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = Some(vendor.into());
        self
    }

    pub fn with_transaction_type(mut self, transaction_type: impl Into<String>) -> Self {
        self.transaction_type = Some(transaction_type.into());
        self
    }

    pub fn with_duration(mut self, stage: impl Into<String>, seconds: DurationValue) -> Self {
        self.durations.insert(stage.into(), seconds);
        self
    }

    /// Duration for a stage. A stage the record does not carry reads as `None`.
    pub fn duration(&self, stage: &str) -> DurationValue {
        self.durations.get(stage).copied().flatten()
    }
}

/// A loaded table: records, the stages they carry, and the period ordering
/// every grouping by period must follow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaTable {
    pub stages: Vec<String>,
    pub records: Vec<SlaRecord>,
    pub periods: PeriodOrdering,
}

impl SlaTable {
    pub fn new(stages: Vec<String>, records: Vec<SlaRecord>, periods: PeriodOrdering) -> Self {
        Self {
            stages,
            records,
            periods,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct vendors, sorted.
    pub fn vendors(&self) -> Vec<String> {
        let mut vendors: Vec<String> = self
            .records
            .iter()
            .filter_map(|r| r.vendor.clone())
            .collect();
        vendors.sort();
        vendors.dedup();
        vendors
    }
}
