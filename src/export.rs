use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::ScoredRecord;

/// One row of the flagged-campaign export. Field order is the CSV column
/// order; missing ASP/CPO serialize as empty fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Retailer")]
    pub retailer: String,
    #[serde(rename = "Line Item")]
    pub line_item: String,
    #[serde(rename = "Broken_Metrics")]
    pub broken_metrics: String,
    #[serde(rename = "Suggested_Fix")]
    pub suggested_fix: Option<String>,
    #[serde(rename = "CTR")]
    pub ctr: f64,
    #[serde(rename = "CVR")]
    pub cvr: f64,
    #[serde(rename = "ASP")]
    pub asp: Option<f64>,
    #[serde(rename = "CPO")]
    pub cpo: Option<f64>,
    #[serde(rename = "Revenue")]
    pub revenue: f64,
}

impl FlaggedRow {
    pub fn from_scored(scored: &ScoredRecord) -> Self {
        let record = &scored.record;
        FlaggedRow {
            date: record.date,
            retailer: record.retailer.clone(),
            line_item: record.line_item.clone(),
            broken_metrics: scored.broken_metrics.clone(),
            suggested_fix: scored.suggested_fix.clone(),
            ctr: record.ctr,
            cvr: record.cvr,
            asp: record.asp,
            cpo: record.cpo,
            revenue: record.revenue,
        }
    }
}

/// Writes the flagged subset as CSV in the given order, returning the row
/// count.
pub fn write_csv<W: std::io::Write>(writer: W, flagged: &[ScoredRecord]) -> anyhow::Result<usize> {
    let mut writer = csv::Writer::from_writer(writer);
    let mut written = 0usize;
    for scored in flagged {
        writer.serialize(FlaggedRow::from_scored(scored))?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

pub fn write_csv_file(path: &Path, flagged: &[ScoredRecord]) -> anyhow::Result<usize> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_csv(file, flagged)
}
