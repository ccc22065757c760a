mod basic;

pub use basic::BasicVoiceClassifier;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Arg-max label plus the probability reported for every label the
/// classifier knows. The vector preserves the classifier's declared
/// label-space order; probabilities for one result sum to 1 (the external
/// model's contract, not re-validated here).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ClassificationResult {
    pub label: String,
    pub probabilities: Vec<(String, f32)>,
}

#[derive(thiserror::Error, Debug)]
pub enum ClassificationError {
    #[error("classifier inference failed: {0}")]
    InferenceFailure(String),

    #[error("window has {got} samples, classifier requires {required}")]
    WindowLengthMismatch { got: usize, required: usize },
}

pub type Result<T> = std::result::Result<T, ClassificationError>;

/// Boundary to the external voice-emotion model: one fixed-length f32
/// window in, one label + distribution out.
pub trait VoiceClassifier: Send + Sync {
    /// Number of samples each window must contain.
    fn input_len(&self) -> usize;

    /// Whether the underlying model tolerates concurrent calls. When false
    /// the adapter serializes access.
    fn reentrant(&self) -> bool {
        true
    }

    fn classify(&self, window: &[f32]) -> BoxFuture<'_, Result<ClassificationResult>>;
}

/// Marshals windows into the classifier and shields callers from its
/// concurrency constraints.
#[derive(Clone)]
pub struct ClassificationAdapter {
    classifier: Arc<dyn VoiceClassifier>,
    serialize: Option<Arc<tokio::sync::Mutex<()>>>,
}

impl ClassificationAdapter {
    pub fn new(classifier: Arc<dyn VoiceClassifier>) -> Self {
        let serialize = if classifier.reentrant() {
            None
        } else {
            Some(Arc::new(tokio::sync::Mutex::new(())))
        };
        Self {
            classifier,
            serialize,
        }
    }

    pub fn input_len(&self) -> usize {
        self.classifier.input_len()
    }

    pub async fn classify_window(&self, window: &[f32]) -> Result<ClassificationResult> {
        let required = self.classifier.input_len();
        if window.len() != required {
            return Err(ClassificationError::WindowLengthMismatch {
                got: window.len(),
                required,
            });
        }

        let _guard = match &self.serialize {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };
        self.classifier.classify(window).await
    }

    /// Run every window through the classifier, dropping windows whose
    /// inference fails. A failed window is logged and omitted; it is never
    /// retried and never replaced with a default distribution.
    pub async fn classify_all<'a, I>(&self, windows: I) -> Vec<ClassificationResult>
    where
        I: IntoIterator<Item = &'a [f32]>,
    {
        let mut results = Vec::new();
        for (index, window) in windows.into_iter().enumerate() {
            match self.classify_window(window).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::warn!(window = index, error = %e, "window classification failed");
                }
            }
        }
        results
    }
}
