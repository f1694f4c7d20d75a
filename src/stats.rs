use std::collections::HashMap;

use crate::issues;
use crate::models::{CampaignRecord, Flag, Metric, MetricScore, ScoredRecord};

pub const Z_FLAG_THRESHOLD: f64 = 2.0;

/// Scores every record against its own retailer's distribution for each
/// tracked metric, then attaches the issue signature and suggested fix.
/// Output order matches input order; partition iteration order cannot leak
/// into any individual record's result.
pub fn score_records(records: &[CampaignRecord]) -> Vec<ScoredRecord> {
    let mut partitions: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, record) in records.iter().enumerate() {
        partitions
            .entry(record.retailer.as_str())
            .or_default()
            .push(idx);
    }

    let mut scores = vec![[MetricScore::default(); 5]; records.len()];

    for indices in partitions.values() {
        for metric in Metric::ALL {
            let values: Vec<f64> = indices
                .iter()
                .filter_map(|&idx| records[idx].metric(metric))
                .collect();
            let Some((mean, std)) = mean_and_std(&values) else {
                continue;
            };
            if std <= 0.0 || !std.is_finite() {
                // Degenerate partition: no z-score, no flag.
                continue;
            }
            for &idx in indices.iter() {
                if let Some(value) = records[idx].metric(metric) {
                    let z = (value - mean) / std;
                    scores[idx][metric as usize] = MetricScore {
                        z: Some(z),
                        flag: flag_for(z),
                    };
                }
            }
        }
    }

    records
        .iter()
        .zip(scores)
        .map(|(record, scores)| issues::annotate(record.clone(), scores))
        .collect()
}

pub fn flag_for(z: f64) -> Option<Flag> {
    if z > Z_FLAG_THRESHOLD {
        Some(Flag::High)
    } else if z < -Z_FLAG_THRESHOLD {
        Some(Flag::Low)
    } else {
        None
    }
}

/// Sample mean and standard deviation (n-1 denominator). `None` when fewer
/// than two values are present.
fn mean_and_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some((mean, variance.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(retailer: &str, day: u32, ctr: f64) -> CampaignRecord {
        CampaignRecord {
            date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            retailer: retailer.to_string(),
            line_item: format!("{retailer} promo {day}"),
            ctr,
            cvr: 0.05,
            revenue: 100.0,
            costs: 40.0,
            orders: 10.0,
            asp: Some(10.0),
            cpo: Some(4.0),
        }
    }

    #[test]
    fn spike_is_flagged_high_with_ctr_token() {
        let mut records: Vec<CampaignRecord> =
            (1..=9).map(|day| record("A", day, 1.0)).collect();
        records.push(record("A", 10, 100.0));

        let scored = score_records(&records);
        let last = scored.last().unwrap();
        let ctr = last.score(Metric::Ctr);
        assert!(ctr.z.unwrap() > 2.0);
        assert_eq!(ctr.flag, Some(Flag::High));
        assert!(last.broken_metrics.contains("CTR+"));
    }

    #[test]
    fn z_scores_standardize_within_retailer() {
        let values = [1.0, 3.0, 4.0, 7.0, 9.0, 12.0];
        let records: Vec<CampaignRecord> = values
            .iter()
            .enumerate()
            .map(|(idx, &ctr)| record("A", idx as u32 + 1, ctr))
            .collect();

        let scored = score_records(&records);
        let zs: Vec<f64> = scored
            .iter()
            .map(|s| s.score(Metric::Ctr).z.unwrap())
            .collect();

        let n = zs.len() as f64;
        let mean = zs.iter().sum::<f64>() / n;
        let sample_var = zs.iter().map(|z| (z - mean).powi(2)).sum::<f64>() / (n - 1.0);
        assert!(mean.abs() < 1e-9);
        assert!((sample_var.sqrt() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn partitions_never_cross_retailers() {
        // Retailer A is flat at 1.0; retailer B's huge values would flag
        // A's records if distributions leaked across the partition.
        let mut records: Vec<CampaignRecord> =
            (1..=5).map(|day| record("A", day, 1.0)).collect();
        records.extend((1..=5).map(|day| record("B", day, 1000.0 * day as f64)));

        let scored = score_records(&records);
        for flat in scored.iter().filter(|s| s.record.retailer == "A") {
            assert_eq!(flat.score(Metric::Ctr).z, None);
            assert_eq!(flat.score(Metric::Ctr).flag, None);
        }
    }

    #[test]
    fn zero_std_yields_no_flag() {
        let records: Vec<CampaignRecord> =
            (1..=4).map(|day| record("A", day, 2.5)).collect();
        let scored = score_records(&records);
        for s in &scored {
            assert_eq!(s.score(Metric::Ctr).z, None);
            assert_eq!(s.score(Metric::Ctr).flag, None);
            assert!(!s.needs_review());
        }
    }

    #[test]
    fn single_record_partition_is_unscored() {
        let records = vec![record("Solo", 1, 9.0)];
        let scored = score_records(&records);
        assert_eq!(scored[0].score(Metric::Ctr).z, None);
        assert!(!scored[0].needs_review());
    }

    #[test]
    fn missing_metric_value_gets_no_z() {
        let mut records: Vec<CampaignRecord> =
            (1..=5).map(|day| record("A", day, day as f64)).collect();
        // Orders = 0 drops ASP/CPO for this row; the z must be missing,
        // not NaN or infinite.
        records[2].orders = 0.0;
        records[2].asp = None;
        records[2].cpo = None;

        let scored = score_records(&records);
        assert_eq!(scored[2].score(Metric::Asp).z, None);
        assert_eq!(scored[2].score(Metric::Cpo).z, None);
        for s in &scored {
            for metric in Metric::ALL {
                if let Some(z) = s.score(metric).z {
                    assert!(z.is_finite());
                }
            }
        }
    }

    #[test]
    fn flag_threshold_is_strict() {
        assert_eq!(flag_for(2.0), None);
        assert_eq!(flag_for(-2.0), None);
        assert_eq!(flag_for(2.01), Some(Flag::High));
        assert_eq!(flag_for(-2.01), Some(Flag::Low));
        assert_eq!(flag_for(0.0), None);
    }
}
