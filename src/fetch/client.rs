//! reqwest-backed [`Transport`].

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::RANGE;
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS, default_user_agent};
use super::error::TransportError;
use super::transport::{Method, Transport, TransportRequest, TransportResponse};
use crate::config::CredentialsMode;

/// HTTP transport over reqwest with streaming bodies.
///
/// Holds two pooled clients: one with a cookie store, used for
/// [`CredentialsMode::Include`], and one without, used for
/// [`CredentialsMode::Omit`]. Create it once and share it.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use segment_loader::config::LoaderSettings;
/// use segment_loader::fetch::{ReqwestTransport, SegmentFetcher};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = Arc::new(ReqwestTransport::new()?);
/// let fetcher = SegmentFetcher::new(transport, LoaderSettings::default());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    with_credentials: Client,
    without_credentials: Client,
}

impl ReqwestTransport {
    /// Creates a transport with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes
    /// - Gzip decompression: enabled
    ///
    /// # Errors
    ///
    /// Returns the reqwest error if a client cannot be built.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a transport with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns the reqwest error if a client cannot be built.
    #[instrument(level = "debug")]
    pub fn with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            with_credentials: build_client(true, connect_timeout_secs, read_timeout_secs)?,
            without_credentials: build_client(false, connect_timeout_secs, read_timeout_secs)?,
        })
    }

    fn client_for(&self, credentials: CredentialsMode) -> &Client {
        match credentials {
            CredentialsMode::Include => &self.with_credentials,
            CredentialsMode::Omit => &self.without_credentials,
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn issue(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let parsed =
            Url::parse(&request.url).map_err(|_| TransportError::invalid_url(&request.url))?;

        let client = self.client_for(request.credentials);
        let mut builder = match request.method {
            Method::Get => client.get(parsed),
            Method::Head => client.head(parsed),
        };
        if let Some(range) = request.range_header() {
            builder = builder.header(RANGE, range);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::timeout(&request.url)
            } else {
                TransportError::network(&request.url, e)
            }
        })?;

        let status = response.status();
        let url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        debug!(status = status.as_u16(), resolved = %url, "response headers received");

        let body_url = url.clone();
        let body = response
            .bytes_stream()
            .map(move |block| {
                block.map_err(|e| {
                    if e.is_timeout() {
                        TransportError::timeout(&body_url)
                    } else {
                        TransportError::body(&body_url, e)
                    }
                })
            })
            .boxed();

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            url,
            headers,
            body,
        })
    }
}

fn build_client(
    cookie_store: bool,
    connect_timeout_secs: u64,
    read_timeout_secs: u64,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .read_timeout(Duration::from_secs(read_timeout_secs))
        .gzip(true)
        .cookie_store(cookie_store)
        .user_agent(default_user_agent())
        .build()
}
