//! Ingestion pipeline.
//!
//! Turns an uploaded [`RawTable`] into an [`SlaTable`]: resolves which
//! columns hold the period, vendor, transaction type and stage durations,
//! orders the periods, applies the requested period range and only then
//! parses the duration cells of the rows that survive.

use regex::RegexBuilder;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ColumnConfig;
use crate::duration::parse_duration;
use crate::models::{PeriodOrdering, RawTable, SlaRecord, SlaTable};

/// Schema problems that make a table unusable.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("No {role} column found (looked for: {})", .candidates.join(", "))]
    MissingColumn {
        role: &'static str,
        candidates: Vec<String>,
    },

    #[error("Unknown period: {0}")]
    UnknownPeriod(String),

    #[error("Invalid period range: {from} comes after {to}")]
    InvalidRange { from: String, to: String },

    #[error("Invalid stage pattern: {0}")]
    InvalidStagePattern(String),
}

/// Column positions resolved against a table's headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub period: usize,
    pub period_header: String,
    pub vendor: Option<usize>,
    pub transaction_type: Option<usize>,
    /// (logical stage name, column index), in report order.
    pub stages: Vec<(String, usize)>,
}

impl ResolvedColumns {
    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|(name, _)| name.clone()).collect()
    }
}

/// Inclusive period bounds. An absent bound means "from the first" or
/// "through the last" period.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodRange {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl PeriodRange {
    pub fn new(from: Option<String>, to: Option<String>) -> Self {
        Self {
            from: from.filter(|s| !s.trim().is_empty()),
            to: to.filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn all() -> Self {
        Self::default()
    }

    /// Ordinal bounds within an ordering.
    fn bounds(&self, ordering: &PeriodOrdering) -> Result<Option<(usize, usize)>, IngestError> {
        if ordering.is_empty() {
            return Ok(None);
        }
        let lookup = |p: &str| {
            ordering
                .position(p)
                .ok_or_else(|| IngestError::UnknownPeriod(p.to_string()))
        };
        let lo = match &self.from {
            Some(p) => lookup(p.trim())?,
            None => 0,
        };
        let hi = match &self.to {
            Some(p) => lookup(p.trim())?,
            None => ordering.len() - 1,
        };
        if lo > hi {
            return Err(IngestError::InvalidRange {
                from: ordering.periods()[lo].clone(),
                to: ordering.periods()[hi].clone(),
            });
        }
        Ok(Some((lo, hi)))
    }
}

/// Find the period, vendor, transaction-type and stage columns.
///
/// A missing period column is fatal. Missing vendor or transaction-type
/// columns are not; configured stages whose header is absent are skipped.
pub fn resolve_columns(
    table: &RawTable,
    columns: &ColumnConfig,
) -> Result<ResolvedColumns, IngestError> {
    let (period, period_header) = columns
        .period
        .iter()
        .find_map(|candidate| table.column_index(candidate).map(|i| (i, candidate.clone())))
        .ok_or_else(|| IngestError::MissingColumn {
            role: "period",
            candidates: columns.period.clone(),
        })?;

    let vendor = table.column_index(&columns.vendor);
    let transaction_type = table.column_index(&columns.transaction_type);

    let stages = if columns.stages.is_empty() {
        let pattern = RegexBuilder::new(&columns.stage_pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| IngestError::InvalidStagePattern(e.to_string()))?;
        let categorical = [Some(period), vendor, transaction_type];
        table
            .headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !categorical.contains(&Some(*i)))
            .filter(|(_, h)| pattern.is_match(h))
            .map(|(i, h)| (h.clone(), i))
            .collect()
    } else {
        columns
            .stages
            .iter()
            .filter_map(|mapping| match table.column_index(&mapping.column) {
                Some(i) => Some((mapping.name.clone(), i)),
                None => {
                    warn!(
                        "Stage {} not loaded: column {:?} is not in the upload",
                        mapping.name, mapping.column
                    );
                    None
                }
            })
            .collect()
    };

    debug!(
        "Resolved columns: period={:?}, vendor={:?}, transaction_type={:?}, stages={:?}",
        period_header, vendor, transaction_type, stages
    );

    Ok(ResolvedColumns {
        period,
        period_header,
        vendor,
        transaction_type,
        stages,
    })
}

fn period_labels(table: &RawTable, period: usize) -> Vec<Option<String>> {
    (0..table.len())
        .map(|row| table.cell(row, period).label())
        .collect()
}

/// Ordering of every period present in the table.
pub fn period_ordering(
    table: &RawTable,
    columns: &ColumnConfig,
) -> Result<PeriodOrdering, IngestError> {
    let resolved = resolve_columns(table, columns)?;
    Ok(PeriodOrdering::infer(
        period_labels(table, resolved.period).into_iter().flatten(),
    ))
}

/// Build an [`SlaTable`] from an upload, restricted to a period range.
///
/// The resulting table's ordering only covers the selected range. Rows
/// without a period are dropped.
pub fn load_table(
    table: &RawTable,
    columns: &ColumnConfig,
    range: &PeriodRange,
) -> Result<SlaTable, IngestError> {
    let resolved = resolve_columns(table, columns)?;
    let labels = period_labels(table, resolved.period);
    let ordering = PeriodOrdering::infer(labels.iter().flatten().cloned());

    let Some((lo, hi)) = range.bounds(&ordering)? else {
        info!("Upload has no period values; nothing to aggregate");
        return Ok(SlaTable::new(resolved.stage_names(), Vec::new(), ordering));
    };
    let selected = ordering.slice(lo, hi);
    let index = ordering.index();

    let mut without_period = 0usize;
    let mut records = Vec::new();
    for (row, label) in labels.into_iter().enumerate() {
        let Some(period) = label else {
            without_period += 1;
            continue;
        };
        match index.get(period.as_str()) {
            Some(pos) if (lo..=hi).contains(pos) => {}
            _ => continue,
        }

        let mut record = SlaRecord::new(period);
        record.vendor = resolved.vendor.and_then(|c| table.cell(row, c).label());
        record.transaction_type = resolved
            .transaction_type
            .and_then(|c| table.cell(row, c).label());
        for (stage, column) in &resolved.stages {
            record
                .durations
                .insert(stage.clone(), parse_duration(table.cell(row, *column)));
        }
        records.push(record);
    }

    if without_period > 0 {
        warn!("Dropped {} rows without a period", without_period);
    }
    info!(
        "Loaded {} of {} rows ({} stages, periods {}..{})",
        records.len(),
        table.len(),
        resolved.stages.len(),
        selected.first().unwrap_or("-"),
        selected.last().unwrap_or("-")
    );

    Ok(SlaTable::new(resolved.stage_names(), records, selected))
}
