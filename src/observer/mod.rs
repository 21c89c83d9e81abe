//! Where the focused tab comes from, and how the visible page is captured.

pub mod capture;

use std::sync::{Arc, RwLock};

use crate::kernel::event::TabSnapshot;
use crate::kernel::time::Timestamp;

pub use capture::{NoCapture, ScreenCapture};

/// Reports the currently focused browser tab.
pub trait TabSource: Send + Sync {
    fn active_tab(&self) -> Option<TabSnapshot>;
}

/// A tab source fed from outside (console input, a browser bridge).
/// The last reported tab stays current until cleared or replaced.
#[derive(Debug, Clone, Default)]
pub struct ReportedTab {
    inner: Arc<RwLock<Option<TabSnapshot>>>,
}

impl ReportedTab {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, url: impl Into<String>, title: impl Into<String>, now: Timestamp) {
        let snapshot = TabSnapshot {
            url: url.into(),
            title: title.into(),
            observed_at: now,
        };
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = Some(snapshot);
    }

    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl TabSource for ReportedTab {
    fn active_tab(&self) -> Option<TabSnapshot> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
