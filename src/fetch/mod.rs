//! Segment fetching over a pluggable HTTP transport.
//!
//! This module provides the [`SegmentFetcher`], which owns the network
//! lifecycle of one logical request at a time:
//!
//! - defers the first attempt until the request's not-before instant
//! - streams the body through a [`ChunkReassembler`](crate::chunk::ChunkReassembler)
//!   and hands every completed chunk to [`LoadCallbacks::progress`]
//! - feeds one throughput sample per chunk to the shared sampler
//! - retries non-2xx and transport failures per the category's settings
//! - records HTTP metrics and reports the final failure once
//!
//! The production transport is [`ReqwestTransport`]; tests substitute their
//! own [`Transport`] implementations.

mod client;
mod constants;
mod error;
mod fetcher;
mod transport;

pub use client::ReqwestTransport;
pub use constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
pub use error::{BoxError, LoadError, TransportError};
pub use fetcher::{LoadCallbacks, LoadOutcome, NoCallbacks, ResponseSummary, SegmentFetcher};
pub use transport::{
    BodyStream, IdentityRewriter, Method, Transport, TransportRequest, TransportResponse,
    UrlRewriter, join_headers,
};
