//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use segment_loader::config::{MAX_RETRY_ATTEMPTS, MAX_RETRY_DELAY_MS};
use segment_loader::{ByteRange, MediaCategory};

/// Fetch media segments chunk by chunk.
///
/// Each URL is loaded through the fragment registry; completed chunks,
/// the final request state and the throughput estimate are logged.
#[derive(Parser, Debug)]
#[command(name = "segment-loader")]
#[command(author, version, about)]
pub struct Args {
    /// Segment URLs to fetch
    pub urls: Vec<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Media category of the segments (video, audio, text, other)
    #[arg(short = 'm', long, default_value_t = MediaCategory::Video)]
    pub media: MediaCategory,

    /// Retry attempts after the first failure (0-10), overrides the config file
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_RETRY_ATTEMPTS)))]
    pub max_retries: Option<u32>,

    /// Delay between attempts in milliseconds (0-60000), overrides the config file
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=MAX_RETRY_DELAY_MS))]
    pub retry_delay: Option<u64>,

    /// Byte range to request, e.g. 0-499 or 500-
    #[arg(long)]
    pub range: Option<ByteRange>,

    /// JSON loader settings file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only check that each URL exists (HEAD), without downloading
    #[arg(long)]
    pub probe: bool,
}
