//! The per-request load loop: deferral, attempts, retries, reporting.

use std::sync::Arc;
use std::time::SystemTime;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::error::{LoadError, TransportError};
use super::transport::{
    IdentityRewriter, Method, Transport, TransportRequest, TransportResponse, UrlRewriter,
    join_headers,
};
use crate::chunk::{Chunk, ChunkReassembler, ParseError};
use crate::config::{CategorySettings, LoaderSettings};
use crate::metrics::{
    DownloadErrorKind, ErrorReporter, HttpRequestMetric, LogErrorReporter, MetricsSink,
    NoopMetrics, Trace,
};
use crate::request::SegmentRequest;
use crate::throughput::{SampleBoundary, ThroughputSampler};

/// Observer of one load.
///
/// Calls arrive as `progress*`, then exactly one of `success`/`error`, then
/// `complete`. An aborted load gets none of the terminal calls.
pub trait LoadCallbacks: Send {
    /// A complete chunk arrived.
    fn progress(&mut self, _chunk: &Chunk) {}

    /// The stream ended with a 2xx status.
    fn success(&mut self, _response: &ResponseSummary) {}

    /// The load failed for good.
    fn error(&mut self, _error: &LoadError) {}

    /// The load is over.
    fn complete(&mut self) {}
}

/// Callbacks that ignore everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCallbacks;

impl LoadCallbacks for NoCallbacks {}

/// Response details of a successful attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSummary {
    /// HTTP status code.
    pub status: u16,
    /// Reason phrase.
    pub status_text: String,
    /// URL the response came from.
    pub url: String,
    /// Response headers in arrival order.
    pub headers: Vec<(String, String)>,
    /// Body bytes received.
    pub bytes: u64,
    /// Chunks delivered through `progress`.
    pub chunks: usize,
}

/// How a load ended.
#[derive(Debug)]
pub enum LoadOutcome {
    /// The last attempt succeeded.
    Success {
        /// The request with the marks of its last attempt.
        request: SegmentRequest,
        /// Response details.
        response: ResponseSummary,
    },
    /// The load failed for good.
    Failure {
        /// The request, unless none was given.
        request: Option<SegmentRequest>,
        /// What went wrong.
        error: LoadError,
    },
    /// The load was cut short by [`SegmentFetcher::abort`].
    Aborted {
        /// The request as it was when the timer was cancelled.
        request: SegmentRequest,
    },
}

impl LoadOutcome {
    /// Returns true for [`LoadOutcome::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the request, if there was one.
    #[must_use]
    pub fn request(&self) -> Option<&SegmentRequest> {
        match self {
            Self::Success { request, .. } | Self::Aborted { request } => Some(request),
            Self::Failure { request, .. } => request.as_ref(),
        }
    }
}

enum AttemptError {
    Transport(TransportError),
    /// The body failed after `delivered` chunks reached `progress`.
    Interrupted {
        source: TransportError,
        delivered: usize,
    },
    Parse(ParseError),
}

/// Executes segment requests against a [`Transport`].
///
/// One fetcher serves many concurrent loads; every load owns its own
/// reassembly state. [`abort`](Self::abort) applies to the loads running at
/// the moment it is called.
pub struct SegmentFetcher {
    transport: Arc<dyn Transport>,
    settings: LoaderSettings,
    sampler: Arc<ThroughputSampler>,
    metrics: Arc<dyn MetricsSink>,
    errors: Arc<dyn ErrorReporter>,
    rewriter: Arc<dyn UrlRewriter>,
    abort: watch::Sender<u64>,
}

impl std::fmt::Debug for SegmentFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentFetcher")
            .field("settings", &self.settings)
            .field("abort_generation", &*self.abort.borrow())
            .finish_non_exhaustive()
    }
}

impl SegmentFetcher {
    /// Creates a fetcher with no-op metrics, log-based error reporting and
    /// identity URL rewriting.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, settings: LoaderSettings) -> Self {
        let (abort, _) = watch::channel(0);
        Self {
            transport,
            sampler: Arc::new(ThroughputSampler::from_settings(&settings.throughput)),
            settings,
            metrics: Arc::new(NoopMetrics),
            errors: Arc::new(LogErrorReporter),
            rewriter: Arc::new(IdentityRewriter),
            abort,
        }
    }

    /// Uses a shared throughput sampler.
    #[must_use]
    pub fn with_sampler(mut self, sampler: Arc<ThroughputSampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// Uses a metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Uses an error reporter.
    #[must_use]
    pub fn with_error_reporter(mut self, errors: Arc<dyn ErrorReporter>) -> Self {
        self.errors = errors;
        self
    }

    /// Uses a URL rewriter.
    #[must_use]
    pub fn with_url_rewriter(mut self, rewriter: Arc<dyn UrlRewriter>) -> Self {
        self.rewriter = rewriter;
        self
    }

    /// Returns the loader settings.
    #[must_use]
    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    /// Returns the throughput sampler fed by this fetcher.
    #[must_use]
    pub fn sampler(&self) -> &Arc<ThroughputSampler> {
        &self.sampler
    }

    /// Aborts every load started before this call.
    ///
    /// Pending deferral and retry timers are cancelled at once. A load whose
    /// transport call is in flight finishes that attempt, but schedules no
    /// further retry and reports no failure.
    pub fn abort(&self) {
        self.abort
            .send_modify(|generation| *generation = generation.wrapping_add(1));
        debug!("pending fetch timers aborted");
    }

    /// Runs one logical load to its end.
    #[instrument(
        skip(self, request, callbacks),
        fields(request_id = tracing::field::Empty, url = tracing::field::Empty)
    )]
    pub async fn load<C>(&self, request: Option<SegmentRequest>, callbacks: &mut C) -> LoadOutcome
    where
        C: LoadCallbacks + ?Sized,
    {
        let Some(mut request) = request else {
            let error = LoadError::NullRequest;
            debug!("load called without a request");
            callbacks.error(&error);
            callbacks.complete();
            return LoadOutcome::Failure {
                request: None,
                error,
            };
        };

        let span = tracing::Span::current();
        span.record("request_id", tracing::field::display(request.id()));
        span.record("url", request.url.as_str());

        let settings = *self.settings.for_category(request.media_category);
        request.retries_remaining = if request.check_for_existence_only {
            0
        } else {
            settings.retry_attempts
        };

        let generation = *self.abort.borrow();
        let mut attempts = 0u32;
        loop {
            if let Some(not_before) = request.not_before.filter(|at| *at > Instant::now()) {
                debug!(
                    delay_ms = not_before.duration_since(Instant::now()).as_millis(),
                    "deferring attempt"
                );
                if !self.wait_until(not_before, generation).await {
                    debug!("deferred load aborted");
                    return LoadOutcome::Aborted { request };
                }
            }

            attempts += 1;
            let error = match self.attempt(&mut request, &settings, callbacks).await {
                Ok(response) => {
                    info!(
                        attempt = attempts,
                        status = response.status,
                        bytes = response.bytes,
                        chunks = response.chunks,
                        "load succeeded"
                    );
                    callbacks.success(&response);
                    callbacks.complete();
                    return LoadOutcome::Success { request, response };
                }
                Err(_) if self.is_aborted(generation) => {
                    debug!(attempt = attempts, "attempt failed after abort");
                    return LoadOutcome::Aborted { request };
                }
                Err(AttemptError::Parse(source)) => {
                    warn!(attempt = attempts, error = %source, "segment framing failed");
                    LoadError::parse(&request.url, source)
                }
                Err(AttemptError::Interrupted { source, delivered }) => {
                    warn!(
                        attempt = attempts,
                        delivered,
                        error = %source,
                        "body failed after chunks were delivered"
                    );
                    let kind = DownloadErrorKind::from(request.kind);
                    self.report(kind, &request);
                    LoadError::interrupted(&request.url, kind, delivered, source)
                }
                Err(AttemptError::Transport(source)) => {
                    if request.retries_remaining > 0 {
                        request.retries_remaining -= 1;
                        warn!(
                            attempt = attempts,
                            retries_remaining = request.retries_remaining,
                            delay_ms = settings.retry_delay_ms,
                            error = %source,
                            "attempt failed, retrying"
                        );
                        let deadline = Instant::now() + settings.retry_delay();
                        if !self.wait_until(deadline, generation).await {
                            debug!("retry aborted");
                            return LoadOutcome::Aborted { request };
                        }
                        continue;
                    }

                    let kind = DownloadErrorKind::from(request.kind);
                    self.report(kind, &request);
                    LoadError::download(&request.url, kind, attempts, source)
                }
            };

            callbacks.error(&error);
            callbacks.complete();
            return LoadOutcome::Failure {
                request: Some(request),
                error,
            };
        }
    }

    /// Probes whether the request's resource exists with a HEAD call.
    ///
    /// Never retries, records no metrics and reports no errors.
    #[instrument(skip(self, request))]
    pub async fn check_for_existence(&self, request: Option<&SegmentRequest>) -> bool {
        let Some(request) = request else {
            return false;
        };
        let probe = SegmentRequest::existence_probe(request);
        self.load(Some(probe), &mut NoCallbacks).await.is_success()
    }

    fn is_aborted(&self, generation: u64) -> bool {
        *self.abort.borrow() != generation
    }

    fn report(&self, kind: DownloadErrorKind, request: &SegmentRequest) {
        if request.check_for_existence_only {
            debug!("existence probe failed");
        } else {
            self.errors.report_download_error(kind, &request.url, request);
        }
    }

    /// Sleeps until `deadline`; returns false if the abort generation moved
    /// away from `generation` before or during the wait.
    async fn wait_until(&self, deadline: Instant, generation: u64) -> bool {
        let mut aborted = self.abort.subscribe();
        if *aborted.borrow_and_update() != generation {
            return false;
        }
        tokio::select! {
            biased;
            changed = aborted.changed() => changed.is_err(),
            () = tokio::time::sleep_until(deadline) => true,
        }
    }

    async fn attempt<C>(
        &self,
        request: &mut SegmentRequest,
        settings: &CategorySettings,
        callbacks: &mut C,
    ) -> Result<ResponseSummary, AttemptError>
    where
        C: LoadCallbacks + ?Sized,
    {
        request.reset_attempt();
        let started = Instant::now();
        let url = self.rewriter.rewrite(&request.url);
        let method = if request.check_for_existence_only {
            Method::Head
        } else {
            Method::Get
        };
        debug!(%method, %url, "issuing attempt");

        let response = self
            .transport
            .issue(TransportRequest {
                method,
                url,
                range: request.range,
                credentials: settings.credentials,
            })
            .await
            .map_err(AttemptError::Transport)?;

        let succeeded = response.is_success();
        let TransportResponse {
            status,
            status_text,
            url: resolved_url,
            headers,
            mut body,
        } = response;

        if !succeeded {
            request.timing.end = Some(SystemTime::now());
            self.record_http_request(request, &resolved_url, status, &headers, None);
            return Err(AttemptError::Transport(TransportError::http_status(
                resolved_url,
                status,
            )));
        }

        let mut reassembler = ChunkReassembler::new();
        let mut boundary = SampleBoundary::starting_at(started);
        let mut traces = Vec::new();

        while let Some(block) = body.next().await {
            let block = block.map_err(|source| match traces.len() {
                0 => AttemptError::Transport(source),
                delivered => AttemptError::Interrupted { source, delivered },
            })?;
            if block.is_empty() {
                continue;
            }
            if request.timing.first_byte.is_none() {
                request.timing.first_byte = Some(SystemTime::now());
            }
            request.bytes_loaded += block.len() as u64;

            let ready = reassembler.push(&block).map_err(AttemptError::Parse)?;
            for chunk in ready {
                self.deliver(&chunk, request, &mut boundary, &mut traces, callbacks);
            }
        }
        if let Some(chunk) = reassembler.finish().map_err(AttemptError::Parse)? {
            self.deliver(&chunk, request, &mut boundary, &mut traces, callbacks);
        }

        request.timing.end = Some(SystemTime::now());
        request.bytes_total = Some(request.bytes_loaded);
        let chunks = traces.len();
        self.record_http_request(request, &resolved_url, status, &headers, Some(traces));

        Ok(ResponseSummary {
            status,
            status_text,
            url: resolved_url,
            headers,
            bytes: request.bytes_loaded,
            chunks,
        })
    }

    fn deliver<C>(
        &self,
        chunk: &Chunk,
        request: &SegmentRequest,
        boundary: &mut SampleBoundary,
        traces: &mut Vec<Trace>,
        callbacks: &mut C,
    ) where
        C: LoadCallbacks + ?Sized,
    {
        let (start, duration) = boundary.split(Instant::now());
        self.sampler
            .record_chunk(request.media_category, chunk.len(), duration);
        traces.push(Trace {
            start,
            duration,
            bytes: chunk.len() as u64,
        });
        callbacks.progress(chunk);
    }

    fn record_http_request(
        &self,
        request: &SegmentRequest,
        resolved_url: &str,
        status: u16,
        headers: &[(String, String)],
        traces: Option<Vec<Trace>>,
    ) {
        if request.check_for_existence_only {
            return;
        }
        self.metrics.record_http_request(HttpRequestMetric {
            media_category: request.media_category,
            track_id: request.track_id.clone(),
            kind: request.kind,
            url: request.url.clone(),
            resolved_url: resolved_url.to_string(),
            service_location: request.service_location.clone(),
            range: request.range,
            start: request.timing.start,
            first_byte: request.timing.first_byte,
            end: request.timing.end,
            status,
            planned_duration: request.duration,
            headers: join_headers(headers),
            traces,
        });
    }
}
