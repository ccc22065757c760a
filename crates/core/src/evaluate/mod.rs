use crate::audio::{self, SignalResampler};
use crate::audio::window::Windows;
use crate::classify::{ClassificationAdapter, VoiceClassifier};
use crate::config::AnalysisConfig;
use crate::emotion::{aggregate, AggregatedEmotionProfile};
use crate::score::{score_transcript, ScoreResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::Sender;

/// Identity of one recorded attempt at a practice session.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TakeId(pub String);

impl TakeId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for TakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything one evaluation needs: the recorded media and the two text
/// inputs. The transcript comes from an external speech-to-text engine;
/// only its final string matters here.
#[derive(Clone, Debug)]
pub struct TakeInput {
    pub take: TakeId,
    pub media: Bytes,
    pub extension_hint: Option<String>,
    pub transcript: String,
    pub expected_script: String,
}

/// Terminal artifact of one take's evaluation. `emotion` is absent when the
/// audio path failed or produced no windows; consumers render that as an
/// explicit no-data state rather than a fabricated profile.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    pub take: TakeId,
    pub score: ScoreResult,
    pub emotion: Option<AggregatedEmotionProfile>,
}

/// Progress protocol toward the consuming layer, so it can show loading and
/// failure states distinct from a valid result.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum EvaluationUpdate {
    Started { take: TakeId },
    Completed(EvaluationResult),
    Failed { take: TakeId, reason: String },
}

#[derive(thiserror::Error, Debug)]
pub enum EvaluateError {
    #[error("window length {window_len} does not match classifier input length {input_len}")]
    WindowInputMismatch { window_len: usize, input_len: usize },

    #[error("update channel closed")]
    ChannelClosed,
}

/// Runs the evaluation pipeline, one independent task per take.
///
/// Submitting a take that is already in flight supersedes the earlier
/// attempt: that attempt still runs to completion, but its result is
/// discarded instead of published.
#[derive(Clone)]
pub struct Evaluator {
    config: AnalysisConfig,
    adapter: ClassificationAdapter,
    // Take -> latest claimed generation. An entry lives only while its
    // latest attempt is in flight; publishing prunes it.
    generations: Arc<std::sync::Mutex<HashMap<TakeId, u64>>>,
}

impl Evaluator {
    pub fn new(
        config: AnalysisConfig,
        classifier: Arc<dyn VoiceClassifier>,
    ) -> Result<Self, EvaluateError> {
        let window_len = config.window.window_len();
        let input_len = classifier.input_len();
        if window_len != input_len {
            return Err(EvaluateError::WindowInputMismatch {
                window_len,
                input_len,
            });
        }
        Ok(Self {
            config,
            adapter: ClassificationAdapter::new(classifier),
            generations: Arc::new(std::sync::Mutex::new(HashMap::new())),
        })
    }

    /// Evaluate one take to completion. Scoring and the audio path run
    /// concurrently; an audio failure leaves `emotion` empty and never
    /// touches the score.
    pub async fn evaluate(&self, input: &TakeInput) -> EvaluationResult {
        let (emotion, score) = tokio::join!(
            self.analyze_emotion(input),
            Self::score(input),
        );
        EvaluationResult {
            take: input.take.clone(),
            score,
            emotion,
        }
    }

    /// Spawn the evaluation as its own task, publishing progress on
    /// `updates`. Returns the task handle; dropping it does not cancel the
    /// evaluation.
    ///
    /// The attempt's generation is claimed before the task is spawned, so
    /// two `submit` calls for the same take supersede each other in call
    /// order regardless of how the runtime schedules their tasks. A panic
    /// inside the evaluation surfaces as [`EvaluationUpdate::Failed`]
    /// rather than silence.
    pub fn submit(
        &self,
        input: TakeInput,
        updates: Sender<EvaluationUpdate>,
    ) -> tokio::task::JoinHandle<Result<(), EvaluateError>> {
        let this = self.clone();
        let take = input.take.clone();
        let generation = self.begin_attempt(&take);
        tokio::spawn(async move {
            if updates
                .send(EvaluationUpdate::Started { take: take.clone() })
                .await
                .is_err()
            {
                tracing::warn!(take = %take, "update channel closed before start");
                this.finish_attempt(&take, generation);
                return Err(EvaluateError::ChannelClosed);
            }

            // Evaluate in an inner task so a panic is caught here and
            // reported to the consumer instead of killing the update flow.
            let outcome = tokio::spawn({
                let this = this.clone();
                async move { this.evaluate(&input).await }
            })
            .await;

            if !this.attempt_is_current(&take, generation) {
                tracing::debug!(take = %take, generation, "superseded attempt discarded");
                return Ok(());
            }

            let update = match outcome {
                Ok(result) => EvaluationUpdate::Completed(result),
                Err(e) => {
                    tracing::error!(take = %take, error = %e, "evaluation task failed");
                    EvaluationUpdate::Failed {
                        take: take.clone(),
                        reason: e.to_string(),
                    }
                }
            };

            let sent = updates.send(update).await.map_err(|_| {
                tracing::warn!(take = %take, "update channel closed before completion");
                EvaluateError::ChannelClosed
            });
            this.finish_attempt(&take, generation);
            sent
        })
    }

    fn begin_attempt(&self, take: &TakeId) -> u64 {
        let mut generations = self.generations.lock().expect("generations mutex poisoned");
        let entry = generations.entry(take.clone()).or_insert(0);
        *entry += 1;
        *entry
    }

    fn attempt_is_current(&self, take: &TakeId, generation: u64) -> bool {
        let generations = self.generations.lock().expect("generations mutex poisoned");
        generations.get(take).copied() == Some(generation)
    }

    fn finish_attempt(&self, take: &TakeId, generation: u64) {
        let mut generations = self.generations.lock().expect("generations mutex poisoned");
        if generations.get(take).copied() == Some(generation) {
            generations.remove(take);
        }
    }

    async fn score(input: &TakeInput) -> ScoreResult {
        score_transcript(&input.transcript, &input.expected_script)
    }

    async fn analyze_emotion(&self, input: &TakeInput) -> Option<AggregatedEmotionProfile> {
        let buffer = match audio::decode_media(
            input.media.clone(),
            input.extension_hint.as_deref(),
        ) {
            Ok(buffer) => buffer,
            Err(e) => {
                tracing::warn!(take = %input.take, error = %e, "audio decode failed; skipping emotion analysis");
                return None;
            }
        };

        let resampler = match SignalResampler::new(self.config.target_sample_rate) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(take = %input.take, error = %e, "resampler unavailable");
                return None;
            }
        };
        let mono = match resampler.resample(&buffer) {
            Ok(mono) => mono,
            Err(e) => {
                tracing::warn!(take = %input.take, error = %e, "resampling failed; skipping emotion analysis");
                return None;
            }
        };

        let windows = Windows::new(&mono, self.config.window);
        if windows.len() == 0 {
            tracing::info!(
                take = %input.take,
                samples = mono.samples.len(),
                "insufficient audio for emotion analysis"
            );
            return None;
        }

        let results = self.adapter.classify_all(windows).await;
        let profile = aggregate(&results);
        if profile.is_none() {
            tracing::warn!(take = %input.take, "no windows classified; no emotion data");
        }
        profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::test_wav;
    use crate::classify::testing::{result, ScriptedClassifier};
    use crate::classify::{BasicVoiceClassifier, ClassificationError, ClassificationResult};
    use crate::config::WindowParams;

    fn small_config() -> AnalysisConfig {
        AnalysisConfig::new(16_000, WindowParams::new(1_600, 800).expect("valid params"))
            .expect("valid config")
    }

    fn wav_input(take: &str, frames: u32, transcript: &str, expected: &str) -> TakeInput {
        TakeInput {
            take: TakeId::new(take),
            media: Bytes::from(test_wav::generate(16_000, 1, frames)),
            extension_hint: Some("wav".to_owned()),
            transcript: transcript.to_owned(),
            expected_script: expected.to_owned(),
        }
    }

    #[test]
    fn rejects_classifier_with_mismatched_input_length() {
        let err = Evaluator::new(
            small_config(),
            Arc::new(BasicVoiceClassifier::new(15_600)),
        )
        .err()
        .expect("mismatch rejected");
        assert!(matches!(err, EvaluateError::WindowInputMismatch { .. }));
    }

    #[tokio::test]
    async fn full_take_produces_score_and_emotion() {
        let evaluator = Evaluator::new(
            small_config(),
            Arc::new(BasicVoiceClassifier::new(1_600)),
        )
        .expect("matching lengths");
        let input = wav_input("take-1", 4_000, "hello world", "hello world");
        let result = evaluator.evaluate(&input).await;
        assert_eq!(result.take, TakeId::new("take-1"));
        assert_eq!(result.score.score, 100);
        let profile = result.emotion.expect("enough audio for windows");
        assert!(!profile.dominant_label.is_empty());
    }

    #[tokio::test]
    async fn undecodable_media_still_scores_the_transcript() {
        let evaluator = Evaluator::new(
            small_config(),
            Arc::new(BasicVoiceClassifier::new(1_600)),
        )
        .expect("matching lengths");
        let input = TakeInput {
            take: TakeId::new("take-bad-media"),
            media: Bytes::from_static(b"definitely not media"),
            extension_hint: None,
            transcript: "hello world".to_owned(),
            expected_script: "hello world".to_owned(),
        };
        let result = evaluator.evaluate(&input).await;
        assert_eq!(result.score.score, 100);
        assert_eq!(result.emotion, None);
    }

    #[tokio::test]
    async fn too_little_audio_yields_no_emotion_data() {
        let evaluator = Evaluator::new(
            small_config(),
            Arc::new(BasicVoiceClassifier::new(1_600)),
        )
        .expect("matching lengths");
        // 100 frames is far below one 1600-sample window.
        let input = wav_input("take-short", 100, "a", "a");
        let result = evaluator.evaluate(&input).await;
        assert_eq!(result.emotion, None);
        assert_eq!(result.score.score, 100);
    }

    #[tokio::test]
    async fn all_windows_failing_yields_no_emotion_data() {
        let failing = ScriptedClassifier::new(
            1_600,
            (0..8)
                .map(|i| {
                    Err(ClassificationError::InferenceFailure(format!(
                        "window {i} failed"
                    )))
                })
                .collect(),
        );
        let evaluator =
            Evaluator::new(small_config(), Arc::new(failing)).expect("matching lengths");
        let input = wav_input("take-all-fail", 4_000, "a", "a");
        let result = evaluator.evaluate(&input).await;
        assert_eq!(result.emotion, None);
    }

    #[tokio::test]
    async fn partial_window_failures_still_aggregate() {
        let mixed = ScriptedClassifier::new(
            1_600,
            vec![
                Ok(result("happy", &[("happy", 0.8), ("sad", 0.2)])),
                Err(ClassificationError::InferenceFailure("boom".into())),
                Ok(result("happy", &[("happy", 0.4), ("sad", 0.6)])),
            ],
        );
        let evaluator =
            Evaluator::new(small_config(), Arc::new(mixed)).expect("matching lengths");
        // 3200 frames -> windows at 0, 800, 1600: exactly three.
        let input = wav_input("take-mixed", 3_200, "a", "a");
        let profile = evaluator
            .evaluate(&input)
            .await
            .emotion
            .expect("two windows survive");
        assert_eq!(profile.dominant_label, "happy");
        assert!((profile.mean_for("happy").unwrap() - 0.6).abs() < 1e-6);
    }

    #[tokio::test]
    async fn submit_publishes_started_then_completed() {
        let evaluator = Evaluator::new(
            small_config(),
            Arc::new(BasicVoiceClassifier::new(1_600)),
        )
        .expect("matching lengths");
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        let input = wav_input("take-updates", 4_000, "hi there", "hi there");
        evaluator
            .submit(input, tx)
            .await
            .expect("task join")
            .expect("published");

        let started = rx.recv().await.expect("started update");
        assert_eq!(
            started,
            EvaluationUpdate::Started {
                take: TakeId::new("take-updates")
            }
        );
        match rx.recv().await.expect("completed update") {
            EvaluationUpdate::Completed(result) => {
                assert_eq!(result.score.score, 100);
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resubmitted_take_supersedes_the_earlier_attempt() {
        let evaluator = Evaluator::new(
            small_config(),
            Arc::new(BasicVoiceClassifier::new(1_600)),
        )
        .expect("matching lengths");
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);

        // Generations are claimed in submit-call order, before either task
        // runs, so the first attempt is stale no matter how the runtime
        // schedules the two tasks.
        let first = wav_input("take-redo", 4_000, "first attempt", "first attempt");
        let second = wav_input("take-redo", 4_000, "second attempt", "second attempt");
        let h1 = evaluator.submit(first, tx.clone());
        let h2 = evaluator.submit(second, tx.clone());
        h1.await.expect("task join").expect("discarded cleanly");
        h2.await.expect("task join").expect("published");
        drop(tx);

        // Only the second attempt's result appears.
        let mut completed = Vec::new();
        while let Some(update) = rx.recv().await {
            if let EvaluationUpdate::Completed(result) = update {
                completed.push(result);
            }
        }
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].score.matched, vec!["second", "attempt"]);
    }

    #[tokio::test]
    async fn classifier_panic_publishes_failed_update() {
        struct PanickingClassifier;

        impl crate::classify::VoiceClassifier for PanickingClassifier {
            fn input_len(&self) -> usize {
                1_600
            }

            fn classify(
                &self,
                _window: &[f32],
            ) -> futures::future::BoxFuture<'_, crate::classify::Result<ClassificationResult>>
            {
                use futures::FutureExt;
                async move { panic!("classifier crashed") }.boxed()
            }
        }

        let evaluator =
            Evaluator::new(small_config(), Arc::new(PanickingClassifier)).expect("matching lengths");
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        let input = wav_input("take-panic", 4_000, "a", "a");
        evaluator
            .submit(input, tx)
            .await
            .expect("task join")
            .expect("failure published");

        assert_eq!(
            rx.recv().await.expect("started update"),
            EvaluationUpdate::Started {
                take: TakeId::new("take-panic")
            }
        );
        match rx.recv().await.expect("failed update") {
            EvaluationUpdate::Failed { take, reason } => {
                assert_eq!(take, TakeId::new("take-panic"));
                assert!(!reason.is_empty());
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn generation_entry_pruned_after_publish() {
        let evaluator = Evaluator::new(
            small_config(),
            Arc::new(BasicVoiceClassifier::new(1_600)),
        )
        .expect("matching lengths");
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        let input = wav_input("take-prune", 4_000, "a", "a");
        evaluator
            .submit(input, tx)
            .await
            .expect("task join")
            .expect("published");
        while rx.try_recv().is_ok() {}

        let generations = evaluator.generations.lock().expect("generations lock");
        assert!(generations.is_empty());
    }

    #[tokio::test]
    async fn concurrent_takes_do_not_interfere() {
        let evaluator = Evaluator::new(
            small_config(),
            Arc::new(BasicVoiceClassifier::new(1_600)),
        )
        .expect("matching lengths");
        let a = wav_input("take-a", 4_000, "alpha", "alpha");
        let b = wav_input("take-b", 4_000, "beta", "gamma");
        let (ra, rb) = tokio::join!(evaluator.evaluate(&a), evaluator.evaluate(&b));
        assert_eq!(ra.score.score, 100);
        assert_eq!(rb.score.score, 0);
        assert_eq!(ra.take, TakeId::new("take-a"));
        assert_eq!(rb.take, TakeId::new("take-b"));
    }
}
