use crate::models::{CampaignRecord, Flag, Metric, MetricScore, ScoredRecord};

pub const GENERIC_FIX: &str = "Check channel-level strategy.";

type Scores = [MetricScore; 5];

pub fn annotate(record: CampaignRecord, scores: Scores) -> ScoredRecord {
    let broken_metrics = signature(&scores);
    let suggested_fix = suggest_fix(&scores).map(str::to_string);
    ScoredRecord {
        record,
        scores,
        broken_metrics,
        suggested_fix,
    }
}

/// Compact issue signature, e.g. "CTR+, Revenue-". Tokens follow metric
/// declaration order regardless of flag severity; empty means not flagged.
pub fn signature(scores: &Scores) -> String {
    let mut tokens = Vec::new();
    for metric in Metric::ALL {
        if let Some(flag) = scores[metric as usize].flag {
            tokens.push(format!("{}{}", metric.label(), flag.sign()));
        }
    }
    tokens.join(", ")
}

fn flagged(scores: &Scores, metric: Metric, flag: Flag) -> bool {
    scores[metric as usize].flag == Some(flag)
}

/// Ordered decision table, first match wins. Rule order is part of the
/// output contract; reordering changes which suggestion a record receives.
pub fn suggest_fix(scores: &Scores) -> Option<&'static str> {
    if scores.iter().all(|score| score.flag.is_none()) {
        return None;
    }
    let rules: [(fn(&Scores) -> bool, &'static str); 4] = [
        (
            |s| flagged(s, Metric::Ctr, Flag::High) && flagged(s, Metric::Revenue, Flag::Low),
            "High engagement, low conversion. Check targeting.",
        ),
        (
            |s| flagged(s, Metric::Asp, Flag::High) && flagged(s, Metric::Cpo, Flag::High),
            "High pricing/cost inefficiency. Consider promo adjustments.",
        ),
        (
            |s| flagged(s, Metric::Ctr, Flag::Low),
            "Poor engagement. Refresh creative.",
        ),
        (
            |s| flagged(s, Metric::Cvr, Flag::Low),
            "Low conversion. Audit checkout or product appeal.",
        ),
    ];

    for &(applies, message) in rules.iter() {
        if applies(scores) {
            return Some(message);
        }
    }
    Some(GENERIC_FIX)
}

/// Normalizes a signature for frequency counting: tokens sorted and
/// deduplicated. `None` for the empty signature.
pub fn combo_key(signature: &str) -> Option<String> {
    if signature.is_empty() {
        return None;
    }
    let mut tokens: Vec<&str> = signature.split(", ").collect();
    tokens.sort_unstable();
    tokens.dedup();
    Some(tokens.join(", "))
}
