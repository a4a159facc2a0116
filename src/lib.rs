//! Segment Loader Library
//!
//! Low-latency chunked loading of CMAF-style media segments. Segment bodies
//! are streamed, reassembled into box-aligned chunks as they arrive, sampled
//! for throughput, and tracked through a fragment lifecycle registry.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`request`] - Segment request model and byte ranges
//! - [`chunk`] - Box-aligned chunk reassembly
//! - [`throughput`] - Rolling per-category throughput estimation
//! - [`fetch`] - Segment fetcher, transport seam and reqwest transport
//! - [`registry`] - Fragment lifecycle registry and queries
//! - [`metrics`] - Metrics sink and error reporter contracts
//! - [`config`] - Per-category loader settings

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod chunk;
pub mod config;
pub mod fetch;
pub mod metrics;
pub mod registry;
pub mod request;
pub mod throughput;

// Re-export commonly used types
pub use chunk::{Chunk, ChunkReassembler, ParseError};
pub use config::{CategorySettings, ConfigError, CredentialsMode, LoaderSettings};
pub use fetch::{
    LoadCallbacks, LoadError, LoadOutcome, ReqwestTransport, SegmentFetcher, Transport,
    TransportError,
};
pub use metrics::{DownloadErrorKind, ErrorReporter, MetricsLog, MetricsSink};
pub use registry::{FragmentEvent, FragmentRegistry, RequestFilter, RequestState};
pub use request::{ByteRange, MediaCategory, RequestId, RequestKind, SegmentRequest};
pub use throughput::{ThroughputSample, ThroughputSampler};
