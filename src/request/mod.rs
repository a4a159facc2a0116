//! Segment request model shared by the fetcher and the registry.
//!
//! A [`SegmentRequest`] describes one logical fetch: what to download, which
//! media pipeline it feeds, and where the fragment sits on the timeline. The
//! same instance travels through every retry of that fetch, carrying the
//! remaining retry budget and the timing marks of the latest attempt.

mod range;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

pub use range::ByteRange;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a request for the lifetime of the process.
///
/// Two requests for the same URL always get distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric id.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Media pipeline a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaCategory {
    /// Video track segments.
    Video,
    /// Audio track segments.
    Audio,
    /// Text/subtitle track segments.
    Text,
    /// Anything not tied to a media track (manifests, xlink documents).
    Other,
}

impl MediaCategory {
    /// All categories, in configuration order.
    pub const ALL: [Self; 4] = [Self::Video, Self::Audio, Self::Text, Self::Other];

    /// Returns the lowercase label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Text => "text",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MediaCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "text" => Ok(Self::Text),
            "other" => Ok(Self::Other),
            _ => Err(format!("invalid media category: {s}")),
        }
    }
}

/// What kind of resource a request fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Media presentation description.
    Manifest,
    /// Remote element referenced by an xlink in the manifest.
    XlinkExpansion,
    /// Initialization segment (`ftyp` + `moov`).
    InitSegment,
    /// Media segment (`moof` + `mdat` runs).
    MediaSegment,
    /// Segment index.
    IndexSegment,
    /// Bitstream switching segment.
    BitstreamSwitching,
    /// Anything else.
    Other,
}

impl RequestKind {
    /// Returns the label used in metrics records.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manifest => "manifest",
            Self::XlinkExpansion => "xlink-expansion",
            Self::InitSegment => "init-segment",
            Self::MediaSegment => "media-segment",
            Self::IndexSegment => "index-segment",
            Self::BitstreamSwitching => "bitstream-switching-segment",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the registry should do with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestAction {
    /// Fetch the resource.
    Download,
    /// Marks the end of the stream; nothing is fetched.
    Complete,
}

/// Wall-clock marks of the most recent attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimingMarks {
    /// When the attempt was issued.
    pub start: Option<SystemTime>,
    /// When the first non-empty body block arrived.
    pub first_byte: Option<SystemTime>,
    /// When the body stream ended.
    pub end: Option<SystemTime>,
}

/// One logical segment fetch, reused across its retries.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRequest {
    id: RequestId,
    /// Resource URL before rewriting.
    pub url: String,
    /// Optional byte range within the resource.
    pub range: Option<ByteRange>,
    /// Pipeline the request feeds.
    pub media_category: MediaCategory,
    /// Resource kind, used for error classification and metrics.
    pub kind: RequestKind,
    /// Download or end-of-stream marker.
    pub action: RequestAction,
    /// HEAD-only probe that resolves to a boolean.
    pub check_for_existence_only: bool,
    /// Retries left before the failure is reported.
    pub retries_remaining: u32,
    /// Earliest instant the fetch may start.
    pub not_before: Option<Instant>,
    /// Timing marks of the latest attempt.
    pub timing: TimingMarks,
    /// Body bytes received by the latest attempt.
    pub bytes_loaded: u64,
    /// Total body bytes, known once the stream ends.
    pub bytes_total: Option<u64>,
    /// Presentation start time in seconds, when the fragment is on the timeline.
    pub start_time: Option<f64>,
    /// Planned fragment duration in seconds.
    pub duration: f64,
    /// Segment index; `None` for initialization fragments.
    pub index: Option<u64>,
    /// Quality level (representation index).
    pub quality: Option<u32>,
    /// Adaptation set index.
    pub adaptation_index: Option<u32>,
    /// Availability start time of the fragment, for live streams.
    pub availability_start_time: Option<SystemTime>,
    /// Track identifier reported with metrics.
    pub track_id: Option<String>,
    /// Service location (base URL id) reported with metrics.
    pub service_location: Option<String>,
}

impl SegmentRequest {
    /// Creates a download request with a fresh id and no timeline position.
    #[must_use]
    pub fn new(url: impl Into<String>, kind: RequestKind, media_category: MediaCategory) -> Self {
        Self {
            id: RequestId::next(),
            url: url.into(),
            range: None,
            media_category,
            kind,
            action: RequestAction::Download,
            check_for_existence_only: false,
            retries_remaining: 0,
            not_before: None,
            timing: TimingMarks::default(),
            bytes_loaded: 0,
            bytes_total: None,
            start_time: None,
            duration: 0.0,
            index: None,
            quality: None,
            adaptation_index: None,
            availability_start_time: None,
            track_id: None,
            service_location: None,
        }
    }

    /// Creates an end-of-stream marker for a media pipeline.
    #[must_use]
    pub fn complete_marker(media_category: MediaCategory) -> Self {
        let mut request = Self::new(String::new(), RequestKind::MediaSegment, media_category);
        request.action = RequestAction::Complete;
        request
    }

    /// Creates a HEAD probe for the same resource as `request`.
    ///
    /// The probe gets its own id so it never collides with the probed request.
    #[must_use]
    pub fn existence_probe(request: &Self) -> Self {
        let mut probe = Self::new(request.url.clone(), request.kind, request.media_category);
        probe.range = request.range;
        probe.check_for_existence_only = true;
        probe
    }

    /// Returns the stable request id.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Sets the byte range.
    #[must_use]
    pub fn with_range(mut self, range: ByteRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Places the fragment on the timeline.
    #[must_use]
    pub fn with_timeline(mut self, start_time: f64, duration: f64) -> Self {
        self.start_time = Some(start_time);
        self.duration = duration;
        self
    }

    /// Sets the segment index, making this a media fragment.
    #[must_use]
    pub fn with_index(mut self, index: u64) -> Self {
        self.index = Some(index);
        self
    }

    /// Sets the quality level.
    #[must_use]
    pub fn with_quality(mut self, quality: u32) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Sets the adaptation set index.
    #[must_use]
    pub fn with_adaptation_index(mut self, adaptation_index: u32) -> Self {
        self.adaptation_index = Some(adaptation_index);
        self
    }

    /// Defers the fetch until `instant`.
    #[must_use]
    pub fn not_before(mut self, instant: Instant) -> Self {
        self.not_before = Some(instant);
        self
    }

    /// Sets the track id reported with metrics.
    #[must_use]
    pub fn with_track_id(mut self, track_id: impl Into<String>) -> Self {
        self.track_id = Some(track_id.into());
        self
    }

    /// Sets the service location reported with metrics.
    #[must_use]
    pub fn with_service_location(mut self, service_location: impl Into<String>) -> Self {
        self.service_location = Some(service_location.into());
        self
    }

    /// Sets the availability start time.
    #[must_use]
    pub fn with_availability_start_time(mut self, at: SystemTime) -> Self {
        self.availability_start_time = Some(at);
        self
    }

    /// Returns true for end-of-stream markers.
    #[must_use]
    pub fn is_complete_marker(&self) -> bool {
        self.action == RequestAction::Complete
    }

    /// Returns true for downloads that carry a segment index.
    #[must_use]
    pub fn is_media_fragment(&self) -> bool {
        self.action == RequestAction::Download && self.index.is_some()
    }

    /// Returns true for downloads without a segment index.
    #[must_use]
    pub fn is_init_fragment(&self) -> bool {
        self.action == RequestAction::Download && self.index.is_none()
    }

    /// Clears the per-attempt progress before a new attempt.
    pub(crate) fn reset_attempt(&mut self) {
        self.timing = TimingMarks {
            start: Some(SystemTime::now()),
            first_byte: None,
            end: None,
        };
        self.bytes_loaded = 0;
        self.bytes_total = None;
    }
}

impl fmt::Display for SegmentRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SegmentRequest {{ id: {}, url: {}, media: {}, kind: {} }}",
            self.id, self.url, self.media_category, self.kind
        )
    }
}
