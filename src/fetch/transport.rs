//! Transport and URL rewriting seams.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;

use super::error::TransportError;
use crate::config::CredentialsMode;
use crate::request::ByteRange;

/// Stream of body blocks, in arrival order.
pub type BodyStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// HTTP method of a transport call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Fetch the resource.
    Get,
    /// Probe the resource without a body.
    Head,
}

impl Method {
    /// Returns the method name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// GET or HEAD.
    pub method: Method,
    /// Final URL, after rewriting.
    pub url: String,
    /// Optional byte range.
    pub range: Option<ByteRange>,
    /// Whether stored cookies go with the request.
    pub credentials: CredentialsMode,
}

impl TransportRequest {
    /// Returns the `Range` header value, if a range is set.
    #[must_use]
    pub fn range_header(&self) -> Option<String> {
        self.range.map(|range| range.header_value())
    }
}

/// Response headers and the body stream of one transport call.
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Reason phrase.
    pub status_text: String,
    /// URL the response came from, after redirects.
    pub url: String,
    /// Response headers in arrival order.
    pub headers: Vec<(String, String)>,
    /// Body blocks.
    pub body: BodyStream,
}

impl TransportResponse {
    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Issues HTTP calls on behalf of the fetcher.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request and returns once response headers are available.
    ///
    /// Non-2xx statuses are not errors at this level.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no response could be obtained.
    async fn issue(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Rewrites a URL right before it is sent.
pub trait UrlRewriter: Send + Sync {
    /// Returns the URL to send.
    fn rewrite(&self, url: &str) -> String;
}

impl<F> UrlRewriter for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn rewrite(&self, url: &str) -> String {
        self(url)
    }
}

/// Rewriter that returns its input.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityRewriter;

impl UrlRewriter for IdentityRewriter {
    fn rewrite(&self, url: &str) -> String {
        url.to_string()
    }
}

/// Joins headers as `name: value\r\n` lines.
#[must_use]
pub fn join_headers(headers: &[(String, String)]) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{name}: {value}\r\n"))
        .collect()
}
