use chrono::NaiveDate;

use crate::models::{CampaignRecord, Metric, RollingPoint};

pub const DEFAULT_WINDOW: usize = 7;
pub const MAD_MULTIPLIER: f64 = 3.0;

/// Smooths one metric's series with a trailing rolling window and flags
/// points deviating more than 3x the rolling MAD from the rolling mean.
///
/// Missing values are dropped before windowing, so the window slides over
/// observations, not calendar days: date gaps neither reset nor bridge it.
/// The comparison is strict, so a deviation exactly equal to the band (in
/// particular zero deviation with zero MAD) is not an anomaly.
pub fn smooth(records: &[CampaignRecord], metric: Metric, window: usize) -> Vec<RollingPoint> {
    let window = window.max(1);
    let mut series: Vec<(NaiveDate, f64)> = records
        .iter()
        .filter_map(|record| record.metric(metric).map(|value| (record.date, value)))
        .collect();
    series.sort_by_key(|&(date, _)| date);

    let values: Vec<f64> = series.iter().map(|&(_, value)| value).collect();

    series
        .iter()
        .enumerate()
        .map(|(idx, &(date, value))| {
            if idx + 1 < window {
                return RollingPoint {
                    date,
                    value,
                    rolling_mean: None,
                    rolling_mad: None,
                    anomaly: false,
                };
            }
            let slice = &values[idx + 1 - window..=idx];
            let mean = slice.iter().sum::<f64>() / slice.len() as f64;
            let mad = median_abs_deviation(slice);
            RollingPoint {
                date,
                value,
                rolling_mean: Some(mean),
                rolling_mad: Some(mad),
                anomaly: (value - mean).abs() > MAD_MULTIPLIER * mad,
            }
        })
        .collect()
}

/// Median of absolute deviations from the median: two nested medians, not
/// a mean absolute deviation.
fn median_abs_deviation(window: &[f64]) -> f64 {
    let mut sorted = window.to_vec();
    let center = median(&mut sorted);
    let mut deviations: Vec<f64> = window.iter().map(|value| (value - center).abs()).collect();
    median(&mut deviations)
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(day: u32, ctr: f64) -> CampaignRecord {
        CampaignRecord {
            date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            retailer: "A".to_string(),
            line_item: format!("promo {day}"),
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
    fn median_handles_odd_and_even_lengths() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(median(&mut [5.0]), 5.0);
    }

    #[test]
    fn mad_is_median_of_deviations() {
        // median = 4, |x - 4| = [3, 2, 0, 2, 5], median of that = 2
        assert_eq!(median_abs_deviation(&[1.0, 2.0, 4.0, 6.0, 9.0]), 2.0);
        assert_eq!(median_abs_deviation(&[7.0, 7.0, 7.0]), 0.0);
    }

    #[test]
    fn warmup_points_are_never_anomalies() {
        let records: Vec<CampaignRecord> = (1..=20)
            .map(|day| record(day, if day % 2 == 0 { 500.0 } else { 0.001 }))
            .collect();
        let points = smooth(&records, Metric::Ctr, DEFAULT_WINDOW);
        for point in points.iter().take(DEFAULT_WINDOW - 1) {
            assert_eq!(point.rolling_mean, None);
            assert_eq!(point.rolling_mad, None);
            assert!(!point.anomaly);
        }
        assert!(points[DEFAULT_WINDOW - 1].rolling_mean.is_some());
    }

    #[test]
    fn flat_series_reports_no_anomalies() {
        let records: Vec<CampaignRecord> = (1..=14).map(|day| record(day, 3.0)).collect();
        let points = smooth(&records, Metric::Ctr, DEFAULT_WINDOW);
        assert_eq!(points.len(), 14);
        for point in &points {
            assert!(!point.anomaly);
        }
        // In-window points carry a defined zero MAD.
        assert_eq!(points[13].rolling_mad, Some(0.0));
    }

    #[test]
    fn spike_after_flat_run_is_anomalous() {
        let mut records: Vec<CampaignRecord> = (1..=9).map(|day| record(day, 1.0)).collect();
        records.push(record(10, 100.0));

        let points = smooth(&records, Metric::Ctr, DEFAULT_WINDOW);
        let last = points.last().unwrap();
        // Window is [1,1,1,1,1,1,100]: median 1, MAD 0, any nonzero
        // deviation from the mean qualifies.
        assert_eq!(last.rolling_mad, Some(0.0));
        assert!(last.anomaly);
        assert!(!points[8].anomaly);
    }

    #[test]
    fn series_is_sorted_before_windowing() {
        let mut records: Vec<CampaignRecord> = (1..=10).map(|day| record(day, 1.0)).collect();
        records.swap(0, 9);
        let points = smooth(&records, Metric::Ctr, DEFAULT_WINDOW);
        let dates: Vec<NaiveDate> = points.iter().map(|p| p.date).collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);
    }

    #[test]
    fn missing_values_are_dropped_not_bridged() {
        let mut records: Vec<CampaignRecord> = (1..=10).map(|day| record(day, 1.0)).collect();
        for rec in records.iter_mut().take(4) {
            rec.orders = 0.0;
            rec.asp = None;
            rec.cpo = None;
        }
        let points = smooth(&records, Metric::Asp, DEFAULT_WINDOW);
        assert_eq!(points.len(), 6);
        for point in &points {
            assert_eq!(point.rolling_mean, None);
            assert!(!point.anomaly);
        }
    }
}
