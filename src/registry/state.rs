use std::fmt;

use crate::metrics::QueueSnapshot;
use crate::request::{MediaCategory, SegmentRequest};

/// Lifecycle state of a request held by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    /// Handed to the fetcher, outcome pending.
    Loading,
    /// Loaded successfully, or a stream-completion marker.
    Executed,
    /// Aborted; not retained.
    Canceled,
    /// Failed after the fetcher gave up.
    Failed,
}

impl RequestState {
    /// Returns the lowercase label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Executed => "executed",
            Self::Canceled => "canceled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The registry's state collections. A request sits in at most one.
#[derive(Debug, Default)]
pub(super) struct Collections {
    pub(super) loading: Vec<SegmentRequest>,
    pub(super) executed: Vec<SegmentRequest>,
    pub(super) failed: Vec<SegmentRequest>,
}

impl Collections {
    pub(super) fn for_state(&self, state: RequestState) -> &[SegmentRequest] {
        match state {
            RequestState::Loading => &self.loading,
            RequestState::Executed => &self.executed,
            RequestState::Failed => &self.failed,
            RequestState::Canceled => &[],
        }
    }

    pub(super) fn snapshot(&self, category: MediaCategory) -> QueueSnapshot {
        let of_category = |requests: &[SegmentRequest]| {
            requests
                .iter()
                .filter(|request| request.media_category == category)
                .cloned()
                .collect()
        };
        QueueSnapshot {
            loading: of_category(&self.loading),
            executed: of_category(&self.executed),
        }
    }

    pub(super) fn clear(&mut self) {
        self.loading.clear();
        self.executed.clear();
        self.failed.clear();
    }
}
