//! Integration tests for the fragment registry.
//!
//! A scripted transport with a paused clock drives the registry so timing and
//! throughput are deterministic.

mod support;

use std::sync::Arc;
use std::time::Duration;

use segment_loader::metrics::ErrorLog;
use segment_loader::{
    FragmentEvent, FragmentRegistry, MediaCategory, MetricsLog, RequestFilter, RequestKind,
    RequestState, SegmentFetcher, SegmentRequest,
};
use tokio::sync::mpsc::UnboundedReceiver;

use support::{Reply, ScriptedTransport, cmaf_segment, make_box, settings};

fn registry(
    transport: Arc<ScriptedTransport>,
    retry_attempts: u32,
) -> (FragmentRegistry, UnboundedReceiver<FragmentEvent>, Arc<MetricsLog>) {
    let metrics = Arc::new(MetricsLog::new());
    let fetcher = SegmentFetcher::new(transport, settings(retry_attempts, 1000))
        .with_metrics(metrics.clone());
    let (registry, events) = FragmentRegistry::new(Arc::new(fetcher), metrics.clone());
    (registry, events, metrics)
}

fn segment(category: MediaCategory, index: u64) -> SegmentRequest {
    SegmentRequest::new(
        format!("https://cdn/{category}/seg{index}.m4s"),
        RequestKind::MediaSegment,
        category,
    )
    .with_index(index)
    .with_timeline(index as f64 * 2.0, 2.0)
    .with_adaptation_index(0)
}

fn collect(events: &mut UnboundedReceiver<FragmentEvent>) -> Vec<FragmentEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test]
async fn test_chunked_delivery_feeds_throughput_per_chunk() {
    tokio::time::pause();

    let body = cmaf_segment();
    let transport = ScriptedTransport::new();
    // 424-byte chunk after 100 ms, then the 596-byte chunk 100 ms later
    transport.script(
        "https://cdn/video/seg0.m4s",
        Reply::Body {
            status: 200,
            blocks: vec![body[..424].to_vec(), body[424..].to_vec()],
            gap: Duration::from_millis(100),
        },
    );
    let (registry, mut events, _metrics) = registry(transport, 0);

    let state = registry.execute_request(segment(MediaCategory::Video, 0)).await;
    assert_eq!(state, RequestState::Executed);

    let sampler = registry.fetcher().sampler();
    let samples = sampler.samples(MediaCategory::Video);
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0].bits, 424 * 8);
    assert_eq!(samples[0].millis, 100);
    assert_eq!(samples[1].bits, 596 * 8);
    // (424 + 596) * 8 bits over 200 ms
    assert_eq!(sampler.estimate(MediaCategory::Video), Some(40.8));

    let progress: Vec<usize> = collect(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            FragmentEvent::LoadingProgress { chunk, .. } => Some(chunk.len()),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![424, 596]);
}

#[tokio::test]
async fn test_audio_and_video_load_concurrently() {
    tokio::time::pause();

    let transport = ScriptedTransport::new();
    for category in [MediaCategory::Audio, MediaCategory::Video] {
        transport.script(
            &format!("https://cdn/{category}/seg0.m4s"),
            Reply::Body {
                status: 200,
                blocks: vec![make_box(b"moof", 64), make_box(b"mdat", 512)],
                gap: Duration::from_millis(50),
            },
        );
    }
    let (registry, _events, metrics) = registry(transport.clone(), 0);

    let started = tokio::time::Instant::now();
    let (audio, video) = tokio::join!(
        registry.execute_request(segment(MediaCategory::Audio, 0)),
        registry.execute_request(segment(MediaCategory::Video, 0)),
    );

    assert_eq!(audio, RequestState::Executed);
    assert_eq!(video, RequestState::Executed);
    // Both bodies take 100 ms; run back to back they would take 200 ms.
    assert!(started.elapsed() < Duration::from_millis(200));

    let audio_only = RequestFilter::new(RequestState::Executed).media_category(MediaCategory::Audio);
    assert_eq!(registry.get_requests(&audio_only).len(), 1);

    // one snapshot when loading starts and one when it finishes, per category
    let queues = metrics.requests_queues();
    assert_eq!(queues.len(), 4);
    for (category, snapshot) in queues {
        assert!(snapshot.executed.iter().all(|r| r.media_category == category));
        assert!(snapshot.loading.iter().all(|r| r.media_category == category));
    }
}

#[tokio::test]
async fn test_loading_and_executed_stay_disjoint() {
    tokio::time::pause();

    let transport = ScriptedTransport::new();
    transport.script(
        "https://cdn/video/seg1.m4s",
        Reply::Body {
            status: 200,
            blocks: vec![make_box(b"mdat", 64)],
            gap: Duration::from_secs(1),
        },
    );
    let (registry, _events, _metrics) = registry(transport, 0);
    let registry = Arc::new(registry);
    let request = segment(MediaCategory::Video, 1);

    let task = {
        let registry = Arc::clone(&registry);
        let request = request.clone();
        tokio::spawn(async move { registry.execute_request(request).await })
    };
    tokio::time::sleep(Duration::from_millis(500)).await;

    let loading = registry.get_requests(&RequestFilter::new(RequestState::Loading));
    let executed = registry.get_requests(&RequestFilter::new(RequestState::Executed));
    assert_eq!(loading.len(), 1);
    assert!(executed.is_empty());
    assert!(!registry.is_fragment_loaded(&request));

    assert_eq!(task.await.unwrap(), RequestState::Executed);
    assert!(registry.get_requests(&RequestFilter::new(RequestState::Loading)).is_empty());
    assert!(registry.is_fragment_loaded(&request));
}

#[tokio::test]
async fn test_retry_after_transport_failure_succeeds() {
    tokio::time::pause();

    let transport = ScriptedTransport::new();
    transport.script("https://cdn/video/seg2.m4s", Reply::Fail);
    transport.script("https://cdn/video/seg2.m4s", Reply::ok(make_box(b"mdat", 16)));
    let (registry, mut events, metrics) = registry(transport.clone(), 1);

    let state = registry.execute_request(segment(MediaCategory::Video, 2)).await;

    assert_eq!(state, RequestState::Executed);
    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].1.duration_since(calls[0].1) >= Duration::from_millis(1000));
    // transport failures record no HTTP metric
    assert_eq!(metrics.http_requests().len(), 1);

    let completed = collect(&mut events)
        .into_iter()
        .filter(|event| matches!(event, FragmentEvent::LoadingCompleted { error: None, .. }))
        .count();
    assert_eq!(completed, 1);
}

#[tokio::test]
async fn test_abort_requests_cancels_pending_retry() {
    tokio::time::pause();

    let transport = ScriptedTransport::new();
    let (registry, mut events, _metrics) = registry(transport.clone(), 3);
    let registry = Arc::new(registry);
    let request = segment(MediaCategory::Audio, 4);

    let task = {
        let registry = Arc::clone(&registry);
        let request = request.clone();
        tokio::spawn(async move { registry.execute_request(request).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    registry.abort_requests();

    assert_eq!(task.await.unwrap(), RequestState::Canceled);
    assert_eq!(transport.calls().len(), 1);
    let all = RequestFilter::states([RequestState::Loading, RequestState::Executed, RequestState::Failed]);
    assert!(registry.get_requests(&all).is_empty());
    assert!(
        collect(&mut events)
            .iter()
            .all(|event| matches!(event, FragmentEvent::LoadingStarted { .. }))
    );
}

#[tokio::test]
async fn test_abort_while_attempt_in_flight_stops_retries_and_reports() {
    tokio::time::pause();

    let transport = ScriptedTransport::new();
    let url = "https://cdn/video/seg5.m4s";
    for _ in 0..3 {
        transport.script(url, Reply::FailAfter(Duration::from_millis(500)));
    }
    let metrics = Arc::new(MetricsLog::new());
    let errors = Arc::new(ErrorLog::new());
    let fetcher = SegmentFetcher::new(transport.clone(), settings(2, 100))
        .with_metrics(metrics.clone())
        .with_error_reporter(errors.clone());
    let (registry, _events) = FragmentRegistry::new(Arc::new(fetcher), metrics);
    let registry = Arc::new(registry);

    let task = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.execute_request(segment(MediaCategory::Video, 5)).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    registry.abort_requests();

    assert_eq!(task.await.unwrap(), RequestState::Canceled);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(transport.calls().len(), 1);
    assert!(errors.reports().is_empty());
}

#[tokio::test]
async fn test_interrupted_body_fails_without_duplicate_chunks() {
    tokio::time::pause();

    let transport = ScriptedTransport::new();
    let url = "https://cdn/audio/seg6.m4s";
    transport.script(url, Reply::BrokenBody(vec![make_box(b"mdat", 16)]));
    transport.script(
        url,
        Reply::Body {
            status: 200,
            blocks: vec![make_box(b"mdat", 16), make_box(b"mdat", 16)],
            gap: Duration::ZERO,
        },
    );
    let (registry, mut events, _metrics) = registry(transport.clone(), 3);

    let state = registry.execute_request(segment(MediaCategory::Audio, 6)).await;

    assert_eq!(state, RequestState::Failed);
    assert_eq!(transport.calls().len(), 1);
    let progress = collect(&mut events)
        .into_iter()
        .filter(|event| matches!(event, FragmentEvent::LoadingProgress { .. }))
        .count();
    assert_eq!(progress, 1);
}

#[tokio::test]
async fn test_existence_check_passes_through() {
    let transport = ScriptedTransport::new();
    transport.script(
        "https://cdn/text/seg0.m4s",
        Reply::Body {
            status: 200,
            blocks: Vec::new(),
            gap: Duration::ZERO,
        },
    );
    let (registry, _events, _metrics) = registry(transport.clone(), 3);

    assert!(registry.check_for_existence(Some(&segment(MediaCategory::Text, 0))).await);
    assert!(!registry.check_for_existence(Some(&segment(MediaCategory::Text, 1))).await);
    assert!(!registry.check_for_existence(None).await);
    assert_eq!(transport.calls().len(), 2);
}
