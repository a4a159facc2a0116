//! Metrics and error reporting contracts consumed by the fetcher and registry.
//!
//! Both contracts are synchronous and infallible. Implementations must be
//! cheap; they are called from inside the load loop.

mod reporter;

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use tracing::debug;

use crate::registry::RequestState;
use crate::request::{ByteRange, MediaCategory, RequestKind, SegmentRequest};

pub use reporter::{DownloadErrorKind, DownloadErrorReport, ErrorLog, ErrorReporter, LogErrorReporter};

/// Timing of one emitted chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trace {
    /// Wall-clock start of the interval that produced the chunk.
    pub start: SystemTime,
    /// Interval length.
    pub duration: Duration,
    /// Chunk size in bytes.
    pub bytes: u64,
}

/// One HTTP attempt as seen by the metrics sink.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequestMetric {
    /// Pipeline of the request.
    pub media_category: MediaCategory,
    /// Track id, if the caller set one.
    pub track_id: Option<String>,
    /// Kind of resource fetched.
    pub kind: RequestKind,
    /// URL after rewriting, as sent.
    pub url: String,
    /// URL the response came from, after redirects.
    pub resolved_url: String,
    /// Service location, if the caller set one.
    pub service_location: Option<String>,
    /// Requested byte range.
    pub range: Option<ByteRange>,
    /// When the attempt was issued.
    pub start: Option<SystemTime>,
    /// When the first body byte arrived.
    pub first_byte: Option<SystemTime>,
    /// When the attempt ended.
    pub end: Option<SystemTime>,
    /// HTTP status code.
    pub status: u16,
    /// Planned fragment duration in seconds.
    pub planned_duration: f64,
    /// Response headers joined as `name: value\r\n`.
    pub headers: String,
    /// Chunk traces; `None` for non-2xx attempts.
    pub traces: Option<Vec<Trace>>,
}

/// Scheduling telemetry recorded on every registry transition.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulingInfo {
    /// Pipeline of the request.
    pub media_category: MediaCategory,
    /// Kind of resource.
    pub kind: RequestKind,
    /// Fragment start time in seconds.
    pub start_time: Option<f64>,
    /// Availability start time of the fragment.
    pub availability_start_time: Option<SystemTime>,
    /// Planned duration in seconds.
    pub duration: f64,
    /// Quality level.
    pub quality: Option<u32>,
    /// Requested byte range.
    pub range: Option<ByteRange>,
    /// State the request just entered.
    pub state: RequestState,
}

impl SchedulingInfo {
    /// Builds the record for a request entering `state`.
    #[must_use]
    pub fn for_request(request: &SegmentRequest, state: RequestState) -> Self {
        Self {
            media_category: request.media_category,
            kind: request.kind,
            start_time: request.start_time,
            availability_start_time: request.availability_start_time,
            duration: request.duration,
            quality: request.quality,
            range: request.range,
            state,
        }
    }
}

/// Requests of one category by state, taken after a transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueSnapshot {
    /// Requests still loading.
    pub loading: Vec<SegmentRequest>,
    /// Requests already executed.
    pub executed: Vec<SegmentRequest>,
}

/// Receives metrics from the fetcher and the registry.
pub trait MetricsSink: Send + Sync {
    /// Records one HTTP attempt.
    fn record_http_request(&self, metric: HttpRequestMetric);

    /// Records a registry state transition.
    fn record_scheduling_info(&self, info: SchedulingInfo);

    /// Records the queue of one category after a transition.
    fn record_requests_queue(&self, category: MediaCategory, snapshot: QueueSnapshot);
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_http_request(&self, _metric: HttpRequestMetric) {}

    fn record_scheduling_info(&self, _info: SchedulingInfo) {}

    fn record_requests_queue(&self, _category: MediaCategory, _snapshot: QueueSnapshot) {}
}

/// In-memory sink that keeps every record for later inspection.
#[derive(Debug, Default)]
pub struct MetricsLog {
    http: Mutex<Vec<HttpRequestMetric>>,
    scheduling: Mutex<Vec<SchedulingInfo>>,
    queues: Mutex<Vec<(MediaCategory, QueueSnapshot)>>,
}

impl MetricsLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// HTTP attempts recorded so far, oldest first.
    #[must_use]
    pub fn http_requests(&self) -> Vec<HttpRequestMetric> {
        self.http.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Scheduling records so far, oldest first.
    #[must_use]
    pub fn scheduling_info(&self) -> Vec<SchedulingInfo> {
        self.scheduling
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Queue snapshots so far, oldest first.
    #[must_use]
    pub fn requests_queues(&self) -> Vec<(MediaCategory, QueueSnapshot)> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl MetricsSink for MetricsLog {
    fn record_http_request(&self, metric: HttpRequestMetric) {
        debug!(
            url = %metric.url,
            status = metric.status,
            traces = metric.traces.as_ref().map_or(0, Vec::len),
            "http request metric"
        );
        self.http
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(metric);
    }

    fn record_scheduling_info(&self, info: SchedulingInfo) {
        self.scheduling
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(info);
    }

    fn record_requests_queue(&self, category: MediaCategory, snapshot: QueueSnapshot) {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((category, snapshot));
    }
}
