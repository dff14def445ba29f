//! Aggregation results.

use serde::{Deserialize, Serialize};

/// Key of the synthetic row appended to every [`CountTable`].
pub const TOTAL_KEY: &str = "TOTAL";

/// Categorical field records can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    Period,
    Vendor,
    TransactionType,
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupKey::Period => write!(f, "period"),
            GroupKey::Vendor => write!(f, "vendor"),
            GroupKey::TransactionType => write!(f, "transaction_type"),
        }
    }
}

/// Mean of one stage over a set of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMean {
    pub stage: String,
    /// Mean elapsed seconds over the non-null values, `None` if there were none.
    pub mean_seconds: Option<f64>,
    /// Number of non-null values that contributed to the mean.
    pub count: usize,
}

/// One group of records with a mean per requested stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub key: String,
    /// Records in the partition, whether or not their durations are null.
    pub records: usize,
    pub stages: Vec<StageMean>,
}

impl AggregateRow {
    pub fn stage(&self, stage: &str) -> Option<&StageMean> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Mean seconds for a stage; `None` for unknown stages and all-null groups.
    pub fn mean(&self, stage: &str) -> Option<f64> {
        self.stage(stage).and_then(|s| s.mean_seconds)
    }
}

/// One line of a [`CountTable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRow {
    pub key: String,
    pub count: usize,
    /// Set only on the synthetic TOTAL row.
    #[serde(default)]
    pub is_total: bool,
}

/// Row counts per group followed by exactly one synthetic TOTAL row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountTable {
    rows: Vec<CountRow>,
}

impl CountTable {
    /// Build a table from real group counts; the TOTAL row is appended here.
    pub fn from_groups(groups: Vec<(String, usize)>) -> Self {
        let total: usize = groups.iter().map(|(_, c)| *c).sum();
        let mut rows: Vec<CountRow> = groups
            .into_iter()
            .map(|(key, count)| CountRow {
                key,
                count,
                is_total: false,
            })
            .collect();
        rows.push(CountRow {
            key: TOTAL_KEY.to_string(),
            count: total,
            is_total: true,
        });
        Self { rows }
    }

    /// All rows, TOTAL last.
    pub fn rows(&self) -> &[CountRow] {
        &self.rows
    }

    /// Real groups only. Charts and re-aggregation use this.
    pub fn groups(&self) -> impl Iterator<Item = &CountRow> {
        self.rows.iter().filter(|r| !r.is_total)
    }

    pub fn total(&self) -> usize {
        self.rows
            .iter()
            .find(|r| r.is_total)
            .map(|r| r.count)
            .unwrap_or(0)
    }

    pub fn sum_groups(&self) -> usize {
        self.groups().map(|r| r.count).sum()
    }

    pub fn get(&self, key: &str) -> Option<usize> {
        self.groups().find(|r| r.key == key).map(|r| r.count)
    }
}
