//! Classifier gateway: an ordered chain of provider adapters that each turn a
//! `ClassificationRequest` into a `Verdict`.

pub mod gateway;
pub mod request;
pub mod verdict;

use std::future::Future;
use std::pin::Pin;

pub use gateway::ClassifierGateway;
pub use request::{ClassificationRequest, Screenshot};
pub use verdict::{ClassificationVerdict, ClassifierSource, Verdict};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One provider in the fallback chain.
///
/// Implementations must never fail: every upstream problem maps to `Verdict::Unknown`.
pub trait Classifier: Send + Sync {
    fn source(&self) -> ClassifierSource;

    fn classify<'a>(&'a self, request: &'a ClassificationRequest) -> BoxFuture<'a, Verdict>;

    /// Whether a screenshot improves this provider's answer.
    fn accepts_screenshot(&self) -> bool {
        false
    }
}

/// Produces the short reason string shown next to the productivity badge.
pub trait Justifier: Send + Sync {
    fn justify<'a>(
        &'a self,
        request: &'a ClassificationRequest,
        on_task: bool,
    ) -> BoxFuture<'a, Option<String>>;
}
