//! Error types for the fetch module.
//!
//! [`TransportError`] describes one failed attempt; [`LoadError`] is the
//! terminal failure of a whole logical load, after any retries.

use thiserror::Error;

use crate::chunk::ParseError;
use crate::metrics::DownloadErrorKind;

/// Boxed source error carried by transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by a [`Transport`](super::Transport) or while reading a body.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level error (DNS resolution, connection refused, TLS errors).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying error.
        #[source]
        source: BoxError,
    },

    /// Request timed out.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-2xx response.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned the status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response body stream failed part way.
    #[error("body stream error fetching {url}: {source}")]
    Body {
        /// The URL whose body failed.
        url: String,
        /// The underlying error.
        #[source]
        source: BoxError,
    },

    /// The URL could not be parsed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl TransportError {
    /// Creates a network error.
    pub fn network(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Network {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a body stream error.
    pub fn body(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Body {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Returns the HTTP status, for status errors.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Terminal failure of a load.
#[derive(Debug, Error)]
pub enum LoadError {
    /// `load` was called without a request.
    #[error("missing request")]
    NullRequest,

    /// Every attempt failed at the transport or HTTP level.
    #[error("{kind} download failed for {url} after {attempts} attempt(s): {source}")]
    Download {
        /// URL of the request.
        url: String,
        /// Failure class derived from the request kind.
        kind: DownloadErrorKind,
        /// Attempts made, including the first.
        attempts: u32,
        /// Error of the last attempt.
        #[source]
        source: TransportError,
    },

    /// The body stream failed after chunks had already been delivered.
    ///
    /// Not retried: a new attempt would repeat chunks the consumer already
    /// holds.
    #[error("{kind} download of {url} interrupted after {delivered} chunk(s): {source}")]
    Interrupted {
        /// URL of the request.
        url: String,
        /// Failure class derived from the request kind.
        kind: DownloadErrorKind,
        /// Chunks handed to `progress` before the failure.
        delivered: usize,
        /// The body error.
        #[source]
        source: TransportError,
    },

    /// The body did not frame as container boxes.
    #[error("parse failure in {url}: {source}")]
    Parse {
        /// URL of the request.
        url: String,
        /// The framing error.
        #[source]
        source: ParseError,
    },
}

impl LoadError {
    /// Creates a download error.
    pub fn download(
        url: impl Into<String>,
        kind: DownloadErrorKind,
        attempts: u32,
        source: TransportError,
    ) -> Self {
        Self::Download {
            url: url.into(),
            kind,
            attempts,
            source,
        }
    }

    /// Creates an interrupted-delivery error.
    pub fn interrupted(
        url: impl Into<String>,
        kind: DownloadErrorKind,
        delivered: usize,
        source: TransportError,
    ) -> Self {
        Self::Interrupted {
            url: url.into(),
            kind,
            delivered,
            source,
        }
    }

    /// Creates a parse error.
    pub fn parse(url: impl Into<String>, source: ParseError) -> Self {
        Self::Parse {
            url: url.into(),
            source,
        }
    }

    /// Short reason distinguishing the failure classes.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NullRequest => "missing request",
            Self::Download { .. } => "no attempts remaining",
            Self::Interrupted { .. } => "interrupted after delivery",
            Self::Parse { .. } => "parse failure",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_http_status_display() {
        let error = TransportError::http_status("https://cdn/seg.m4s", 404);
        let msg = error.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(msg.contains("https://cdn/seg.m4s"), "Expected URL in: {msg}");
        assert_eq!(error.status(), Some(404));
    }

    #[test]
    fn test_transport_error_network_keeps_source() {
        let error = TransportError::network("https://cdn/seg.m4s", "connection reset");
        assert!(std::error::Error::source(&error).is_some());
        assert_eq!(error.status(), None);
    }

    #[test]
    fn test_load_error_reasons() {
        assert_eq!(LoadError::NullRequest.reason(), "missing request");

        let download = LoadError::download(
            "https://cdn/seg.m4s",
            DownloadErrorKind::Content,
            3,
            TransportError::timeout("https://cdn/seg.m4s"),
        );
        assert_eq!(download.reason(), "no attempts remaining");
        let msg = download.to_string();
        assert!(msg.contains("content"), "Expected kind in: {msg}");
        assert!(msg.contains("3 attempt"), "Expected attempts in: {msg}");

        let parse = LoadError::parse(
            "https://cdn/seg.m4s",
            ParseError::UnknownBox {
                box_type: "zzzz".to_string(),
                offset: 0,
            },
        );
        assert_eq!(parse.reason(), "parse failure");

        let interrupted = LoadError::interrupted(
            "https://cdn/seg.m4s",
            DownloadErrorKind::Content,
            2,
            TransportError::body("https://cdn/seg.m4s", "connection reset"),
        );
        assert_eq!(interrupted.reason(), "interrupted after delivery");
        let msg = interrupted.to_string();
        assert!(msg.contains("2 chunk"), "Expected delivered count in: {msg}");
    }
}
