//! Request queries over the registry's collections.

use super::state::RequestState;
use crate::request::{MediaCategory, RequestAction, RequestKind, SegmentRequest};

/// Selects requests by state and field values, or by timeline position.
///
/// Field criteria are exact matches and all must hold. Setting a
/// [`time`](Self::time) switches to interval matching instead: per state,
/// the newest request whose window contains the time is returned.
///
/// ```
/// use segment_loader::registry::{RequestFilter, RequestState};
/// use segment_loader::request::MediaCategory;
///
/// let filter = RequestFilter::new(RequestState::Executed)
///     .media_category(MediaCategory::Video)
///     .quality(2);
/// assert_eq!(filter.state_list(), &[RequestState::Executed]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestFilter {
    states: Vec<RequestState>,
    media_category: Option<MediaCategory>,
    kind: Option<RequestKind>,
    action: Option<RequestAction>,
    quality: Option<u32>,
    index: Option<u64>,
    adaptation_index: Option<u32>,
    url: Option<String>,
    start_time: Option<f64>,
    time: Option<f64>,
    threshold: Option<f64>,
}

impl RequestFilter {
    /// Selects requests in one state.
    #[must_use]
    pub fn new(state: RequestState) -> Self {
        Self::states([state])
    }

    /// Selects requests in any of `states`, reported in that order.
    #[must_use]
    pub fn states(states: impl IntoIterator<Item = RequestState>) -> Self {
        Self {
            states: states.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Adds another state.
    #[must_use]
    pub fn with_state(mut self, state: RequestState) -> Self {
        self.states.push(state);
        self
    }

    /// Requires a media category.
    #[must_use]
    pub fn media_category(mut self, category: MediaCategory) -> Self {
        self.media_category = Some(category);
        self
    }

    /// Requires a request kind.
    #[must_use]
    pub fn kind(mut self, kind: RequestKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Requires an action.
    #[must_use]
    pub fn action(mut self, action: RequestAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Requires a quality level.
    #[must_use]
    pub fn quality(mut self, quality: u32) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Requires a segment index.
    #[must_use]
    pub fn index(mut self, index: u64) -> Self {
        self.index = Some(index);
        self
    }

    /// Requires an adaptation index.
    #[must_use]
    pub fn adaptation_index(mut self, adaptation_index: u32) -> Self {
        self.adaptation_index = Some(adaptation_index);
        self
    }

    /// Requires a URL.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Requires an exact start time.
    #[must_use]
    pub fn start_time(mut self, start_time: f64) -> Self {
        self.start_time = Some(start_time);
        self
    }

    /// Matches the request whose window contains `time`, in seconds.
    #[must_use]
    pub fn time(mut self, time: f64) -> Self {
        self.time = Some(time);
        self
    }

    /// Tolerance for [`time`](Self::time) matching, in seconds.
    ///
    /// Defaults to half of each candidate's duration.
    #[must_use]
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Returns the selected states.
    #[must_use]
    pub fn state_list(&self) -> &[RequestState] {
        &self.states
    }

    /// Applies the criteria to one state collection.
    pub(super) fn apply<'a>(&self, requests: &'a [SegmentRequest]) -> Vec<&'a SegmentRequest> {
        if let Some(time) = self.time {
            return requests
                .iter()
                .rev()
                .find(|request| self.contains_time(request, time))
                .into_iter()
                .collect();
        }
        requests
            .iter()
            .filter(|request| self.matches_fields(request))
            .collect()
    }

    fn contains_time(&self, request: &SegmentRequest, time: f64) -> bool {
        let Some(start) = request.start_time else {
            return false;
        };
        let end = start + request.duration;
        if start.is_nan() || end.is_nan() {
            return false;
        }
        let threshold = self.threshold.unwrap_or(request.duration / 2.0);
        time + threshold >= start && time - threshold < end
    }

    #[allow(clippy::float_cmp)]
    fn matches_fields(&self, request: &SegmentRequest) -> bool {
        fn check<T: PartialEq>(wanted: Option<T>, actual: T) -> bool {
            wanted.is_none_or(|wanted| wanted == actual)
        }

        check(self.media_category, request.media_category)
            && check(self.kind, request.kind)
            && check(self.action, request.action)
            && check(self.quality.map(Some), request.quality)
            && check(self.index.map(Some), request.index)
            && check(self.adaptation_index.map(Some), request.adaptation_index)
            && check(self.url.as_deref(), request.url.as_str())
            && check(self.start_time.map(Some), request.start_time)
    }
}
