//! Fragment lifecycle registry.
//!
//! The [`FragmentRegistry`] tracks every request it executes through the
//! states of [`RequestState`] and answers "what has been loaded, what is
//! loading, what failed" for an adaptive controller.
//!
//! # Lifecycle
//!
//! - A stream-completion marker goes straight to executed.
//! - A download goes to loading and is handed to the [`SegmentFetcher`].
//! - Success moves it to executed, failure to failed.
//! - [`abort_requests`](FragmentRegistry::abort_requests) drops everything
//!   loading; outcomes that arrive afterwards are ignored.
//!
//! Downstream consumers receive [`FragmentEvent`]s over an unbounded channel
//! returned by [`FragmentRegistry::new`].

mod events;
mod filter;
mod state;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, info, instrument, trace};

use crate::fetch::{LoadOutcome, SegmentFetcher};
use crate::metrics::{MetricsSink, QueueSnapshot, SchedulingInfo};
use crate::request::{RequestId, SegmentRequest};

pub use events::FragmentEvent;
pub use filter::RequestFilter;
pub use state::RequestState;

use events::ProgressForwarder;
use state::Collections;

/// Tracks requests from enqueue to a terminal state.
pub struct FragmentRegistry {
    fetcher: Arc<SegmentFetcher>,
    metrics: Arc<dyn MetricsSink>,
    collections: Mutex<Collections>,
    events: mpsc::UnboundedSender<FragmentEvent>,
}

impl std::fmt::Debug for FragmentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentRegistry")
            .field("fetcher", &self.fetcher)
            .field("collections", &*self.lock())
            .finish_non_exhaustive()
    }
}

impl FragmentRegistry {
    /// Creates a registry and the receiving end of its event channel.
    #[must_use]
    pub fn new(
        fetcher: Arc<SegmentFetcher>,
        metrics: Arc<dyn MetricsSink>,
    ) -> (Self, mpsc::UnboundedReceiver<FragmentEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let registry = Self {
            fetcher,
            metrics,
            collections: Mutex::new(Collections::default()),
            events,
        };
        (registry, receiver)
    }

    /// Returns the fetcher requests are handed to.
    #[must_use]
    pub fn fetcher(&self) -> &Arc<SegmentFetcher> {
        &self.fetcher
    }

    /// Executes a request and returns the state it ends in.
    ///
    /// Completion markers return at once; downloads return when the fetcher
    /// is done with them. [`RequestState::Canceled`] means the request was
    /// aborted while loading.
    #[instrument(skip(self, request), fields(request_id = %request.id(), media = %request.media_category))]
    pub async fn execute_request(&self, request: SegmentRequest) -> RequestState {
        let category = request.media_category;
        if request.is_complete_marker() {
            let snapshot = {
                let mut collections = self.lock();
                collections.executed.push(request.clone());
                collections.snapshot(category)
            };
            self.record(&request, RequestState::Executed, snapshot);
            debug!("stream completed");
            self.send(FragmentEvent::StreamCompleted { request });
            return RequestState::Executed;
        }

        let snapshot = {
            let mut collections = self.lock();
            collections.loading.push(request.clone());
            collections.snapshot(category)
        };
        self.record(&request, RequestState::Loading, snapshot);
        self.send(FragmentEvent::LoadingStarted {
            request: request.clone(),
        });

        let request_id = request.id();
        let mut forwarder = ProgressForwarder {
            events: &self.events,
            request_id,
            media_category: request.media_category,
        };
        let outcome = self.fetcher.load(Some(request), &mut forwarder).await;
        self.on_loading_completed(request_id, outcome)
    }

    fn on_loading_completed(&self, request_id: RequestId, outcome: LoadOutcome) -> RequestState {
        let (request, error) = match outcome {
            LoadOutcome::Success { request, .. } => (request, None),
            LoadOutcome::Failure {
                request: Some(request),
                error,
            } => (request, Some(error)),
            LoadOutcome::Failure { request: None, .. } => return RequestState::Failed,
            LoadOutcome::Aborted { .. } => {
                self.lock().loading.retain(|loading| loading.id() != request_id);
                debug!("load aborted");
                return RequestState::Canceled;
            }
        };
        let state = if error.is_some() {
            RequestState::Failed
        } else {
            RequestState::Executed
        };

        let category = request.media_category;
        let snapshot = {
            let mut collections = self.lock();
            let Some(position) = collections
                .loading
                .iter()
                .position(|loading| loading.id() == request_id)
            else {
                debug!(state = %state, "outcome for canceled request dropped");
                return RequestState::Canceled;
            };
            collections.loading.remove(position);
            match state {
                RequestState::Failed => collections.failed.push(request.clone()),
                _ => collections.executed.push(request.clone()),
            }
            collections.snapshot(category)
        };

        info!(state = %state, bytes = request.bytes_loaded, "request finished");
        self.record(&request, state, snapshot);
        self.send(FragmentEvent::LoadingCompleted { request, error });
        state
    }

    /// Aborts pending fetcher timers and forgets every loading request.
    pub fn abort_requests(&self) {
        self.fetcher.abort();
        let canceled = {
            let mut collections = self.lock();
            let canceled = collections.loading.len();
            collections.loading.clear();
            canceled
        };
        debug!(canceled, "loading requests aborted");
    }

    /// Returns clones of the requests selected by `filter`, grouped by state
    /// in the filter's state order.
    #[must_use]
    pub fn get_requests(&self, filter: &RequestFilter) -> Vec<SegmentRequest> {
        let collections = self.lock();
        filter
            .state_list()
            .iter()
            .flat_map(|state| filter.apply(collections.for_state(*state)))
            .cloned()
            .collect()
    }

    /// Returns true if an equivalent fragment has been executed.
    ///
    /// Equivalent means the same media category and one of: both
    /// completion markers; both media fragments with the same start time
    /// and adaptation index; both initialization fragments with the same
    /// quality.
    #[must_use]
    pub fn is_fragment_loaded(&self, request: &SegmentRequest) -> bool {
        self.lock()
            .executed
            .iter()
            .any(|executed| same_fragment(executed, request))
    }

    /// Drops executed requests whose start time is below `time`.
    ///
    /// Requests without a start time are kept.
    pub fn remove_executed_requests_before_time(&self, time: f64) {
        let mut collections = self.lock();
        let before = collections.executed.len();
        collections
            .executed
            .retain(|request| request.start_time.is_none_or(|start| start >= time));
        trace!(time, removed = before - collections.executed.len(), "pruned executed requests");
    }

    /// Aborts and clears every collection.
    pub fn reset(&self) {
        self.fetcher.abort();
        self.lock().clear();
        debug!("registry reset");
    }

    /// Probes whether the request's resource exists.
    pub async fn check_for_existence(&self, request: Option<&SegmentRequest>) -> bool {
        self.fetcher.check_for_existence(request).await
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Records scheduling info together with the category's queue snapshot.
    fn record(&self, request: &SegmentRequest, state: RequestState, snapshot: QueueSnapshot) {
        self.metrics
            .record_scheduling_info(SchedulingInfo::for_request(request, state));
        self.metrics
            .record_requests_queue(request.media_category, snapshot);
    }

    fn send(&self, event: FragmentEvent) {
        if self.events.send(event).is_err() {
            trace!("event receiver dropped");
        }
    }
}

#[allow(clippy::float_cmp)]
fn same_fragment(a: &SegmentRequest, b: &SegmentRequest) -> bool {
    if a.media_category != b.media_category {
        return false;
    }
    let both_complete = a.is_complete_marker() && b.is_complete_marker();
    let same_media = a.is_media_fragment()
        && b.is_media_fragment()
        && a.start_time == b.start_time
        && a.adaptation_index == b.adaptation_index;
    let same_init = a.is_init_fragment() && b.is_init_fragment() && a.quality == b.quality;
    both_complete || same_media || same_init
}
