use std::sync::Arc;
use tracing::{debug, warn};

use super::request::ClassificationRequest;
use super::verdict::ClassificationVerdict;
use super::{Classifier, Justifier};

/// Strict fallback chain: the first non-unknown verdict wins.
#[derive(Clone, Default)]
pub struct ClassifierGateway {
    classifiers: Vec<Arc<dyn Classifier>>,
    justifier: Option<Arc<dyn Justifier>>,
}

impl ClassifierGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider. Order of calls is order of fallback.
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifiers.push(classifier);
        self
    }

    pub fn with_justifier(mut self, justifier: Arc<dyn Justifier>) -> Self {
        self.justifier = Some(justifier);
        self
    }

    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }

    pub fn wants_screenshot(&self) -> bool {
        self.classifiers.iter().any(|c| c.accepts_screenshot())
    }

    pub async fn classify(&self, request: &ClassificationRequest) -> ClassificationVerdict {
        for classifier in &self.classifiers {
            let source = classifier.source();
            let verdict = classifier.classify(request).await;
            debug!(?source, ?verdict, "classifier answered");
            if verdict.is_known() {
                return ClassificationVerdict {
                    verdict,
                    source: Some(source),
                };
            }
        }

        if !self.classifiers.is_empty() {
            warn!("all classifiers returned unknown");
        }
        ClassificationVerdict::unknown()
    }

    /// Best effort; None when no justifier is configured or it failed.
    pub async fn justify(&self, request: &ClassificationRequest, on_task: bool) -> Option<String> {
        let justifier = self.justifier.as_ref()?;
        justifier
            .justify(request, on_task)
            .await
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
    }
}
