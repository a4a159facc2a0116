//! Shared helpers for integration tests: box builders, settings, and a
//! scripted in-memory transport.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use segment_loader::fetch::{Transport, TransportError, TransportRequest, TransportResponse};
use segment_loader::{LoaderSettings, MediaCategory};
use tokio::time::Instant;

/// Builds one top-level box of `size` bytes, padded with zeros.
pub fn make_box(tag: &[u8; 4], size: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(size as usize);
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(tag);
    out.resize(size as usize, 0);
    out
}

/// `styp` + two `moof`/`mdat` pairs: chunks of 424 and 596 bytes.
pub fn cmaf_segment() -> Vec<u8> {
    [
        make_box(b"styp", 24),
        make_box(b"moof", 100),
        make_box(b"mdat", 300),
        make_box(b"moof", 96),
        make_box(b"mdat", 500),
    ]
    .concat()
}

/// Settings with the same retry policy for every category.
pub fn settings(retry_attempts: u32, retry_delay_ms: u64) -> LoaderSettings {
    let mut settings = LoaderSettings::default();
    for category in MediaCategory::ALL {
        let entry = settings.for_category_mut(category);
        entry.retry_attempts = retry_attempts;
        entry.retry_delay_ms = retry_delay_ms;
    }
    settings
}

/// One scripted reply.
pub enum Reply {
    /// A response with `status` whose body arrives as `blocks`, each after
    /// `gap` of (virtual) time.
    Body {
        status: u16,
        blocks: Vec<Vec<u8>>,
        gap: Duration,
    },
    /// A 200 response whose body yields `blocks`, then fails.
    BrokenBody(Vec<Vec<u8>>),
    /// A transport-level failure after `delay` of (virtual) time.
    FailAfter(Duration),
    /// A transport-level failure.
    Fail,
}

impl Reply {
    /// A 200 response delivering `body` in one block.
    pub fn ok(body: Vec<u8>) -> Self {
        Self::Body {
            status: 200,
            blocks: vec![body],
            gap: Duration::ZERO,
        }
    }
}

/// Transport that plays back replies per URL, in order.
///
/// URLs without a scripted reply fail at the transport level.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<Vec<(String, VecDeque<Reply>)>>,
    calls: Mutex<Vec<(TransportRequest, Instant)>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues a reply for `url`.
    pub fn script(&self, url: &str, reply: Reply) {
        let mut replies = self.replies.lock().unwrap();
        match replies.iter_mut().find(|(scripted, _)| scripted.as_str() == url) {
            Some((_, queue)) => queue.push_back(reply),
            None => replies.push((url.to_string(), VecDeque::from([reply]))),
        }
    }

    /// Every call made so far, with the instant it was issued.
    pub fn calls(&self) -> Vec<(TransportRequest, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    fn next_reply(&self, url: &str) -> Option<Reply> {
        self.replies
            .lock()
            .unwrap()
            .iter_mut()
            .find(|(scripted, _)| scripted.as_str() == url)
            .and_then(|(_, queue)| queue.pop_front())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn issue(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((request.clone(), Instant::now()));

        match self.next_reply(&request.url) {
            None | Some(Reply::Fail) => {
                Err(TransportError::network(&request.url, "scripted failure"))
            }
            Some(Reply::FailAfter(delay)) => {
                tokio::time::sleep(delay).await;
                Err(TransportError::network(&request.url, "scripted failure"))
            }
            Some(Reply::BrokenBody(blocks)) => {
                let failure = TransportError::body(&request.url, "scripted body failure");
                let body = stream::iter(blocks)
                    .map(|block| Ok(Bytes::from(block)))
                    .chain(stream::iter([Err(failure)]))
                    .boxed();
                Ok(TransportResponse {
                    status: 200,
                    status_text: String::new(),
                    url: request.url,
                    headers: Vec::new(),
                    body,
                })
            }
            Some(Reply::Body {
                status,
                blocks,
                gap,
            }) => {
                let body = stream::iter(blocks)
                    .then(move |block| async move {
                        tokio::time::sleep(gap).await;
                        Ok::<_, TransportError>(Bytes::from(block))
                    })
                    .boxed();
                Ok(TransportResponse {
                    status,
                    status_text: String::new(),
                    url: request.url,
                    headers: vec![("content-type".to_string(), "video/mp4".to_string())],
                    body,
                })
            }
        }
    }
}
