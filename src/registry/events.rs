use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

use crate::chunk::Chunk;
use crate::fetch::{LoadCallbacks, LoadError};
use crate::request::{MediaCategory, RequestId, SegmentRequest};

/// Notification sent to the downstream consumer of a registry.
#[derive(Debug)]
pub enum FragmentEvent {
    /// A download was handed to the fetcher.
    LoadingStarted {
        /// The request as enqueued.
        request: SegmentRequest,
    },
    /// A complete chunk of a loading request arrived.
    LoadingProgress {
        /// Id of the loading request.
        request_id: RequestId,
        /// Pipeline the chunk belongs to.
        media_category: MediaCategory,
        /// The chunk.
        chunk: Chunk,
    },
    /// A loading request reached a terminal state.
    LoadingCompleted {
        /// The request with the marks of its last attempt.
        request: SegmentRequest,
        /// The failure, if it did not succeed.
        error: Option<LoadError>,
    },
    /// A stream-completion marker was executed.
    StreamCompleted {
        /// The marker.
        request: SegmentRequest,
    },
}

impl FragmentEvent {
    /// Id of the request the event is about.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::LoadingStarted { request }
            | Self::LoadingCompleted { request, .. }
            | Self::StreamCompleted { request } => request.id(),
            Self::LoadingProgress { request_id, .. } => *request_id,
        }
    }
}

/// Forwards a load's chunks as [`FragmentEvent::LoadingProgress`].
pub(super) struct ProgressForwarder<'a> {
    pub(super) events: &'a UnboundedSender<FragmentEvent>,
    pub(super) request_id: RequestId,
    pub(super) media_category: MediaCategory,
}

impl LoadCallbacks for ProgressForwarder<'_> {
    fn progress(&mut self, chunk: &Chunk) {
        let event = FragmentEvent::LoadingProgress {
            request_id: self.request_id,
            media_category: self.media_category,
            chunk: chunk.clone(),
        };
        if self.events.send(event).is_err() {
            trace!(request_id = %self.request_id, "event receiver dropped");
        }
    }
}
