use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Write;

use crate::issues;
use crate::models::{CampaignRecord, Metric, RollingPoint, ScoredRecord};

#[derive(Debug, Clone)]
pub struct ParetoEntry {
    pub retailer: String,
    pub revenue: f64,
    pub cumulative_share: f64,
}

/// Revenue contribution by retailer, descending, with cumulative share.
pub fn revenue_pareto(records: &[CampaignRecord]) -> Vec<ParetoEntry> {
    let mut totals: HashMap<String, f64> = HashMap::new();
    for record in records {
        *totals.entry(record.retailer.clone()).or_insert(0.0) += record.revenue;
    }

    let mut entries: Vec<(String, f64)> = totals.into_iter().collect();
    entries.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    let total: f64 = entries.iter().map(|(_, revenue)| revenue).sum();
    let mut cumulative = 0.0;
    entries
        .into_iter()
        .map(|(retailer, revenue)| {
            cumulative += revenue;
            ParetoEntry {
                retailer,
                revenue,
                cumulative_share: if total > 0.0 { cumulative / total } else { 0.0 },
            }
        })
        .collect()
}

/// Frequency of normalized issue combinations across the flagged subset,
/// descending.
pub fn issue_combo_counts(flagged: &[ScoredRecord]) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for scored in flagged {
        if let Some(combo) = issues::combo_key(&scored.broken_metrics) {
            *counts.entry(combo).or_insert(0) += 1;
        }
    }

    let mut entries: Vec<(String, usize)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries
}

pub fn build_report(
    source: &str,
    records: &[CampaignRecord],
    flagged: &[ScoredRecord],
    smoothed: &[(Metric, Vec<RollingPoint>)],
    window: usize,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Campaign Performance Report");
    let _ = writeln!(
        output,
        "Generated from {} ({} records, {} flagged for review)",
        source,
        records.len(),
        flagged.len()
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Revenue Pareto");
    let pareto = revenue_pareto(records);
    if pareto.is_empty() {
        let _ = writeln!(output, "No records loaded.");
    } else {
        for entry in pareto.iter() {
            let _ = writeln!(
                output,
                "- {}: revenue {:.2} (cumulative {:.1}%)",
                entry.retailer,
                entry.revenue,
                entry.cumulative_share * 100.0
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Issue Mix");
    let combos = issue_combo_counts(flagged);
    if combos.is_empty() {
        let _ = writeln!(output, "No campaigns flagged in this dataset.");
    } else {
        for (combo, count) in combos.iter() {
            let _ = writeln!(output, "- {combo}: {count} campaigns");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Campaigns Needing Review");
    if flagged.is_empty() {
        let _ = writeln!(output, "No campaigns flagged in this dataset.");
    } else {
        let mut ranked: Vec<&ScoredRecord> = flagged.iter().collect();
        ranked.sort_by(|a, b| {
            b.worst_abs_z()
                .partial_cmp(&a.worst_abs_z())
                .unwrap_or(Ordering::Equal)
        });
        for scored in ranked.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} {} / {}: {} -> {}",
                scored.record.date,
                scored.record.retailer,
                scored.record.line_item,
                scored.broken_metrics,
                scored.suggested_fix.as_deref().unwrap_or("-")
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Rolling Anomalies (window {window})");
    if smoothed.is_empty() {
        let _ = writeln!(output, "No smoothed series requested.");
    } else {
        for (metric, points) in smoothed.iter() {
            let anomalies: Vec<&RollingPoint> =
                points.iter().filter(|point| point.anomaly).collect();
            match anomalies.last() {
                Some(latest) => {
                    let _ = writeln!(
                        output,
                        "- {}: {} anomalies across {} points (latest {})",
                        metric,
                        anomalies.len(),
                        points.len(),
                        latest.date
                    );
                }
                None => {
                    let _ = writeln!(
                        output,
                        "- {}: no anomalies across {} points",
                        metric,
                        points.len()
                    );
                }
            }
        }
    }

    output
}
