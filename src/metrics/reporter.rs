//! Download error classification and reporting.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use tracing::warn;

use crate::request::{RequestId, RequestKind, SegmentRequest};

/// Class of a download failure, derived from the request kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadErrorKind {
    /// The manifest could not be loaded.
    Manifest,
    /// A remote xlink element could not be loaded.
    XlinkExpansion,
    /// An initialization segment could not be loaded.
    Initialization,
    /// Any other segment could not be loaded.
    Content,
}

impl DownloadErrorKind {
    /// Returns the short label used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manifest => "manifest",
            Self::XlinkExpansion => "xlink",
            Self::Initialization => "initialization",
            Self::Content => "content",
        }
    }
}

impl From<RequestKind> for DownloadErrorKind {
    fn from(kind: RequestKind) -> Self {
        match kind {
            RequestKind::Manifest => Self::Manifest,
            RequestKind::XlinkExpansion => Self::XlinkExpansion,
            RequestKind::InitSegment => Self::Initialization,
            RequestKind::MediaSegment
            | RequestKind::IndexSegment
            | RequestKind::BitstreamSwitching
            | RequestKind::Other => Self::Content,
        }
    }
}

impl fmt::Display for DownloadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Receives a download failure once retries are exhausted.
pub trait ErrorReporter: Send + Sync {
    /// Reports one failed logical fetch.
    fn report_download_error(&self, kind: DownloadErrorKind, url: &str, request: &SegmentRequest);
}

/// Reporter that logs failures through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogErrorReporter;

impl ErrorReporter for LogErrorReporter {
    fn report_download_error(&self, kind: DownloadErrorKind, url: &str, request: &SegmentRequest) {
        warn!(
            request_id = %request.id(),
            kind = %kind,
            url,
            media = %request.media_category,
            "download failed"
        );
    }
}

/// One reported failure, as kept by [`ErrorLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadErrorReport {
    /// Failure class.
    pub kind: DownloadErrorKind,
    /// URL of the failed fetch.
    pub url: String,
    /// Id of the failed request.
    pub request_id: RequestId,
}

/// In-memory reporter for inspection.
#[derive(Debug, Default)]
pub struct ErrorLog {
    reports: Mutex<Vec<DownloadErrorReport>>,
}

impl ErrorLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports so far, oldest first.
    #[must_use]
    pub fn reports(&self) -> Vec<DownloadErrorReport> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ErrorReporter for ErrorLog {
    fn report_download_error(&self, kind: DownloadErrorKind, url: &str, request: &SegmentRequest) {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(DownloadErrorReport {
                kind,
                url: url.to_string(),
                request_id: request.id(),
            });
    }
}
