use crate::classify::{ClassificationResult, Result, VoiceClassifier};
use futures::future::BoxFuture;
use futures::FutureExt;

#[cfg(test)]
pub const EMOTION_LABELS: [&str; 6] = ["angry", "disgust", "fearful", "happy", "neutral", "sad"];

/// Heuristic stand-in for an on-device emotion model, scoring a window from
/// its RMS energy and zero-crossing rate. Lets the pipeline run end-to-end
/// without model weights; any real model plugs in through
/// [`VoiceClassifier`].
#[derive(Clone, Copy, Debug)]
pub struct BasicVoiceClassifier {
    input_len: usize,
}

impl BasicVoiceClassifier {
    pub fn new(input_len: usize) -> Self {
        Self { input_len }
    }

    fn score_window(window: &[f32]) -> ClassificationResult {
        let energy = rms(window);
        let zcr = zero_crossing_rate(window);

        // Loud + busy reads as agitation, loud + tonal as excitement,
        // quiet + busy as tension, quiet + flat as low mood.
        let mut scores = [
            ("angry", 0.5 + 4.0 * energy + 2.0 * zcr),
            ("disgust", 0.4 + zcr),
            ("fearful", 0.5 + 3.0 * zcr),
            ("happy", 0.5 + 5.0 * energy),
            ("neutral", 1.0),
            ("sad", 1.0 - 2.0 * energy.min(0.4)),
        ];
        for (_, s) in scores.iter_mut() {
            *s = s.max(0.05);
        }

        let total: f32 = scores.iter().map(|(_, s)| s).sum();
        let probabilities: Vec<(String, f32)> = scores
            .iter()
            .map(|(l, s)| ((*l).to_owned(), s / total))
            .collect();

        let label = probabilities
            .iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(l, _)| l.clone())
            .unwrap_or_else(|| "neutral".to_owned());

        ClassificationResult {
            label,
            probabilities,
        }
    }
}

impl Default for BasicVoiceClassifier {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_WINDOW_LEN)
    }
}

impl VoiceClassifier for BasicVoiceClassifier {
    fn input_len(&self) -> usize {
        self.input_len
    }

    fn classify(&self, window: &[f32]) -> BoxFuture<'_, Result<ClassificationResult>> {
        let result = Self::score_window(window);
        async move { Ok(result) }.boxed()
    }
}

fn rms(window: &[f32]) -> f32 {
    if window.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = window.iter().map(|s| s * s).sum();
    (sum_sq / window.len() as f32).sqrt()
}

fn zero_crossing_rate(window: &[f32]) -> f32 {
    if window.len() < 2 {
        return 0.0;
    }
    let crossings = window
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count();
    crossings as f32 / (window.len() - 1) as f32
}
