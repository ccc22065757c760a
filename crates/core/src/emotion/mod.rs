use crate::classify::ClassificationResult;
use serde::{Deserialize, Serialize};

/// Per-label mean probability across every window of a take, plus the
/// dominant label. Ties on the mean break toward the label seen first in
/// the result sequence, so the outcome is stable across runs.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AggregatedEmotionProfile {
    /// First-seen label order; means in [0,1].
    pub label_means: Vec<(String, f32)>,
    pub dominant_label: String,
    pub dominant_mean: f32,
}

impl AggregatedEmotionProfile {
    pub fn mean_for(&self, label: &str) -> Option<f32> {
        self.label_means
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, m)| *m)
    }

    /// Means scaled to percentages, for display.
    pub fn label_percentages(&self) -> Vec<(String, f32)> {
        self.label_means
            .iter()
            .map(|(l, m)| (l.clone(), m * 100.0))
            .collect()
    }

    pub fn dominant_percentage(&self) -> f32 {
        self.dominant_mean * 100.0
    }
}

/// Aggregate per-window classifier outputs into one profile.
///
/// A label's mean is averaged over the results that reported it, not over
/// every result; a label missing from one window's map simply does not
/// contribute there. An empty input yields `None` — the explicit no-data
/// state — never an all-zero profile.
pub fn aggregate(results: &[ClassificationResult]) -> Option<AggregatedEmotionProfile> {
    if results.is_empty() {
        return None;
    }

    let mut order: Vec<String> = Vec::new();
    let mut sums: std::collections::HashMap<String, (f32, u32)> =
        std::collections::HashMap::new();

    for result in results {
        for (label, p) in &result.probabilities {
            let entry = sums.entry(label.clone()).or_insert_with(|| {
                order.push(label.clone());
                (0.0, 0)
            });
            entry.0 += p;
            entry.1 += 1;
        }
    }

    let label_means: Vec<(String, f32)> = order
        .into_iter()
        .map(|label| {
            let (sum, count) = sums[&label];
            let mean = sum / count as f32;
            (label, mean)
        })
        .collect();

    // First-seen order wins on an exact tie; strict comparison keeps the
    // earlier label.
    let (dominant_label, dominant_mean) = label_means
        .iter()
        .fold(None::<(&String, f32)>, |best, (label, mean)| match best {
            Some((_, best_mean)) if *mean <= best_mean => best,
            _ => Some((label, *mean)),
        })
        .map(|(l, m)| (l.clone(), m))?;

    Some(AggregatedEmotionProfile {
        label_means,
        dominant_label,
        dominant_mean,
    })
}
