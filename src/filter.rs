use chrono::NaiveDate;

use crate::models::{Metric, ScoredRecord};

/// Explicit filter selections applied to the flagged subset. An empty
/// retailer list means all retailers; date bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub retailers: Vec<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub metric: Option<Metric>,
    pub search: Option<String>,
}

impl Filters {
    pub fn matches(&self, scored: &ScoredRecord) -> bool {
        let record = &scored.record;
        if !self.retailers.is_empty() && !self.retailers.contains(&record.retailer) {
            return false;
        }
        if let Some(from) = self.from {
            if record.date < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if record.date > to {
                return false;
            }
        }
        if let Some(metric) = self.metric {
            if scored.score(metric).flag.is_none() {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            if !record.line_item.to_lowercase().contains(&needle) {
                return false;
            }
        }
        true
    }
}

/// Records needing review that pass the filters, in input order.
pub fn flagged_subset(scored: &[ScoredRecord], filters: &Filters) -> Vec<ScoredRecord> {
    scored
        .iter()
        .filter(|record| record.needs_review() && filters.matches(record))
        .cloned()
        .collect()
}
