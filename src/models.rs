use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The five metrics tracked for per-retailer outlier detection. Declaration
/// order fixes issue-signature token order and export column layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    Ctr,
    Cvr,
    Revenue,
    Asp,
    Cpo,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Ctr,
        Metric::Cvr,
        Metric::Revenue,
        Metric::Asp,
        Metric::Cpo,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Ctr => "CTR",
            Metric::Cvr => "CVR",
            Metric::Revenue => "Revenue",
            Metric::Asp => "ASP",
            Metric::Cpo => "CPO",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "CTR" => Ok(Metric::Ctr),
            "CVR" => Ok(Metric::Cvr),
            "REVENUE" => Ok(Metric::Revenue),
            "ASP" => Ok(Metric::Asp),
            "CPO" => Ok(Metric::Cpo),
            other => Err(format!(
                "unknown metric {other:?}, expected one of CTR, CVR, Revenue, ASP, CPO"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Flag {
    High,
    Low,
}

impl Flag {
    pub fn sign(&self) -> char {
        match self {
            Flag::High => '+',
            Flag::Low => '-',
        }
    }
}

/// One (Date, Retailer, Line Item) observation. ASP and CPO are derived at
/// load time and missing when Orders is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub date: NaiveDate,
    pub retailer: String,
    pub line_item: String,
    pub ctr: f64,
    pub cvr: f64,
    pub revenue: f64,
    pub costs: f64,
    pub orders: f64,
    pub asp: Option<f64>,
    pub cpo: Option<f64>,
}

impl CampaignRecord {
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Ctr => Some(self.ctr),
            Metric::Cvr => Some(self.cvr),
            Metric::Revenue => Some(self.revenue),
            Metric::Asp => self.asp,
            Metric::Cpo => self.cpo,
        }
    }
}

/// Z-score and flag for one metric of one record. Both are `None` when the
/// retailer partition has degenerate statistics or the value is missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricScore {
    pub z: Option<f64>,
    pub flag: Option<Flag>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredRecord {
    pub record: CampaignRecord,
    pub scores: [MetricScore; 5],
    pub broken_metrics: String,
    pub suggested_fix: Option<String>,
}

impl ScoredRecord {
    pub fn needs_review(&self) -> bool {
        !self.broken_metrics.is_empty()
    }

    pub fn score(&self, metric: Metric) -> MetricScore {
        self.scores[metric as usize]
    }

    pub fn worst_abs_z(&self) -> f64 {
        self.scores
            .iter()
            .filter_map(|score| score.z)
            .map(f64::abs)
            .fold(0.0, f64::max)
    }
}

/// One point of a smoothed series. Rolling statistics are `None` until the
/// trailing window is full; such points are never anomalies.
#[derive(Debug, Clone, Serialize)]
pub struct RollingPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub rolling_mean: Option<f64>,
    pub rolling_mad: Option<f64>,
    pub anomaly: bool,
}
