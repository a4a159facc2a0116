//! CLI entry point for the segment loader.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use segment_loader::metrics::LogErrorReporter;
use segment_loader::{
    FragmentEvent, FragmentRegistry, LoaderSettings, MetricsLog, ReqwestTransport, RequestKind,
    RequestState, SegmentFetcher, SegmentRequest,
};
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    if args.urls.is_empty() {
        info!("No input provided. Pass segment URLs as arguments.");
        info!("Example: segment-loader https://cdn.example.com/video/seg1.m4s");
        return Ok(());
    }

    let settings = load_settings(&args)?;
    let transport = Arc::new(ReqwestTransport::new().context("failed to build HTTP client")?);
    let metrics = Arc::new(MetricsLog::new());
    let fetcher = Arc::new(
        SegmentFetcher::new(transport, settings)
            .with_metrics(metrics.clone())
            .with_error_reporter(Arc::new(LogErrorReporter)),
    );
    let (registry, mut events) = FragmentRegistry::new(Arc::clone(&fetcher), metrics.clone());

    let consumer = tokio::spawn(async move {
        let mut chunks = 0usize;
        let mut bytes = 0usize;
        while let Some(event) = events.recv().await {
            if let FragmentEvent::LoadingProgress {
                request_id, chunk, ..
            } = &event
            {
                chunks += 1;
                bytes += chunk.len();
                debug!(request_id = %request_id, bytes = chunk.len(), "chunk received");
            }
        }
        (chunks, bytes)
    });

    let mut failed = 0usize;
    for (index, url) in args.urls.iter().enumerate() {
        let mut request = SegmentRequest::new(url.as_str(), RequestKind::MediaSegment, args.media)
            .with_index(index as u64);
        if let Some(range) = args.range {
            request = request.with_range(range);
        }

        if args.probe {
            let exists = registry.check_for_existence(Some(&request)).await;
            info!(url = %url, exists, "existence probe");
            if !exists {
                failed += 1;
            }
            continue;
        }

        let state = registry.execute_request(request).await;
        if state != RequestState::Executed {
            failed += 1;
        }
        info!(
            url = %url,
            state = %state,
            throughput_bps = fetcher.sampler().estimate_bps(args.media),
            "segment finished"
        );
    }

    drop(registry);
    let (chunks, bytes) = consumer.await.context("event consumer panicked")?;
    info!(
        segments = args.urls.len(),
        failed,
        chunks,
        bytes,
        http_requests = metrics.http_requests().len(),
        "Load complete"
    );

    if failed > 0 {
        warn!(failed, "some segments did not load");
        anyhow::bail!("{failed} of {} segment(s) did not load", args.urls.len());
    }
    Ok(())
}

fn load_settings(args: &Args) -> Result<LoaderSettings> {
    let mut settings = match &args.config {
        Some(path) => LoaderSettings::from_json_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => LoaderSettings::default(),
    };

    let category = settings.for_category_mut(args.media);
    if let Some(retries) = args.max_retries {
        category.retry_attempts = retries;
    }
    if let Some(delay) = args.retry_delay {
        category.retry_delay_ms = delay;
    }
    settings.validate()?;
    Ok(settings)
}
