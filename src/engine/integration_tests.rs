//! Engine integration tests against local mock servers
//!
//! The download mock honors `Range` headers the way a real speed-test host
//! does, so the ranged, fallback and time-cap paths run end to end.

use super::*;
use crate::{
    catalog::{Catalog, ServerDescriptor},
    client::TransferClient,
    logging::Logger,
    models::EngineSettings,
    types::{IpPreference, UploadMode},
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, Request, Respond, ResponseTemplate,
};

const PAYLOAD: u64 = 10_000;

/// Serves `bytes=S-E` requests with exactly that many bytes
struct RangeResponder {
    total: u64,
    /// Range start that answers 500 instead
    fail_at: Option<u64>,
    delay: Duration,
}

impl RangeResponder {
    fn new(total: u64) -> Self {
        Self { total, fail_at: None, delay: Duration::ZERO }
    }
}

fn parse_range(value: &str) -> Option<(u64, u64)> {
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let range = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_range);

        let template = match range {
            Some((start, _)) if Some(start) == self.fail_at => ResponseTemplate::new(500),
            Some((start, end)) => {
                ResponseTemplate::new(206).set_body_bytes(vec![0u8; (end - start + 1) as usize])
            }
            None => ResponseTemplate::new(200).set_body_bytes(vec![0u8; self.total as usize]),
        };
        template.set_delay(self.delay)
    }
}

#[derive(Default)]
struct ChunkCounter {
    chunks: AtomicUsize,
    elapsed: Mutex<Duration>,
}

impl ProgressObserver for ChunkCounter {
    fn on_chunk(&self, _phase: Phase, _index: usize, _total: usize, _bytes: u64, elapsed: Duration) {
        self.chunks.fetch_add(1, Ordering::SeqCst);
        *self.elapsed.lock().unwrap() += elapsed;
    }
}

/// Plain TCP server: HEAD without range support, GET trickling its body
///
/// Each connection serves one request. The GET announces `total` bytes and
/// sends `step` of them every `pause`.
async fn trickle_server(total: u64, step: usize, pause: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(serve_trickle(socket, total, step, pause));
        }
    });
    format!("http://{}", addr)
}

async fn serve_trickle(mut socket: TcpStream, total: u64, step: usize, pause: Duration) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }

    if request.starts_with(b"HEAD") {
        let _ = socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .await;
        return;
    }

    let head = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n", total);
    if socket.write_all(head.as_bytes()).await.is_err() {
        return;
    }
    let mut sent = 0u64;
    while sent < total {
        let len = step.min((total - sent) as usize);
        if socket.write_all(&vec![0u8; len]).await.is_err() || socket.flush().await.is_err() {
            return;
        }
        sent += len as u64;
        tokio::time::sleep(pause).await;
    }
}

async fn mount_head(server: &MockServer, route: &str, ranges: bool) {
    let mut template = ResponseTemplate::new(200);
    if ranges {
        template = template.insert_header("accept-ranges", "bytes");
    }
    Mock::given(method("HEAD"))
        .and(path(route))
        .respond_with(template)
        .mount(server)
        .await;
}

fn descriptor(name: &str, server: &MockServer, route: &str) -> ServerDescriptor {
    ServerDescriptor::new(name, format!("{}{}?bytes=BYTES", server.uri(), route)).unwrap()
}

fn settings(download: Catalog, upload: Catalog) -> EngineSettings {
    let mut settings = EngineSettings::with_catalogs(download, upload);
    settings.size_bytes = PAYLOAD;
    settings.chunk_count = 10;
    settings.upload_chunk_bytes = 4_000;
    settings.download_cap = Duration::from_secs(5);
    settings.upload_cap = Duration::from_secs(5);
    settings.capability_timeout = Duration::from_secs(2);
    settings
}

fn client() -> TransferClient {
    TransferClient::new(IpPreference::Auto).unwrap()
}

#[tokio::test]
async fn test_ranged_download_success() {
    let server = MockServer::start().await;
    mount_head(&server, "/file", true).await;
    Mock::given(method("GET"))
        .and(path("/file"))
        .respond_with(RangeResponder::new(PAYLOAD))
        .expect(10)
        .mount(&server)
        .await;

    let catalog = Catalog::new(vec![descriptor("mock", &server, "/file")]).unwrap();
    let settings = settings(catalog.clone(), catalog);
    let client = client();
    let counter = ChunkCounter::default();

    let report = DownloadEngine::new(&client, &settings, Logger::silent(), &counter).run().await;

    assert_eq!(report.server, "mock");
    assert_eq!(report.sample.bytes, PAYLOAD);
    assert_eq!(report.sample.outcome, Outcome::Success);
    assert_eq!(report.sample.strategy, TransferStrategy::RangedChunked);
    assert!(!report.sample.time_capped);
    assert!(report.sample.mbytes_per_sec > 0.0);
    assert_eq!(counter.chunks.load(Ordering::SeqCst), 10);

    // seconds is the sum of per-chunk request times, not phase wall time
    let chunk_seconds = counter.elapsed.lock().unwrap().as_secs_f64();
    assert!((report.sample.seconds - chunk_seconds).abs() < 1e-6);
}

#[tokio::test]
async fn test_failed_chunk_falls_back_to_full_fetch() {
    let server = MockServer::start().await;
    mount_head(&server, "/file", true).await;
    Mock::given(method("GET"))
        .and(path("/file"))
        .respond_with(RangeResponder { fail_at: Some(2_000), ..RangeResponder::new(PAYLOAD) })
        .mount(&server)
        .await;

    let catalog = Catalog::new(vec![descriptor("mock", &server, "/file")]).unwrap();
    let settings = settings(catalog.clone(), catalog);
    let client = client();

    let report = DownloadEngine::new(&client, &settings, Logger::silent(), &NoProgress).run().await;

    assert_eq!(report.attempts.len(), 2);
    assert_eq!(report.attempts[0].strategy, TransferStrategy::RangedChunked);
    assert!(report.attempts[0].result.contains("chunk 3 of 10"));
    assert_eq!(report.sample.strategy, TransferStrategy::FullFetch);
    assert_eq!(report.sample.outcome, Outcome::Success);
    // the failed ranged attempt contributes nothing
    assert_eq!(report.sample.bytes, PAYLOAD);
}

#[tokio::test]
async fn test_missing_range_support_goes_straight_to_full_fetch() {
    let server = MockServer::start().await;
    mount_head(&server, "/file", false).await;
    Mock::given(method("GET"))
        .and(path("/file"))
        .respond_with(RangeResponder::new(PAYLOAD))
        .expect(1)
        .mount(&server)
        .await;

    let catalog = Catalog::new(vec![descriptor("mock", &server, "/file")]).unwrap();
    let settings = settings(catalog.clone(), catalog);
    let client = client();

    let engine = DownloadEngine::new(&client, &settings, Logger::silent(), &NoProgress);
    let descriptor = &settings.download_catalog.servers()[0];
    let url = descriptor.url_for(PAYLOAD);
    let plan = engine.plan(descriptor, &url, &TimeCap::start(settings.download_cap)).await;
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].strategy, TransferStrategy::FullFetch);

    let report = engine.run().await;
    assert_eq!(report.sample.strategy, TransferStrategy::FullFetch);
    assert_eq!(report.sample.bytes, PAYLOAD);
}

#[tokio::test]
async fn test_slow_chunks_stop_at_time_cap() {
    let server = MockServer::start().await;
    mount_head(&server, "/file", true).await;
    Mock::given(method("GET"))
        .and(path("/file"))
        .respond_with(RangeResponder { delay: Duration::from_millis(300), ..RangeResponder::new(PAYLOAD) })
        .mount(&server)
        .await;

    let catalog = Catalog::new(vec![descriptor("mock", &server, "/file")]).unwrap();
    let mut settings = settings(catalog.clone(), catalog);
    settings.download_cap = Duration::from_secs(1);
    let client = client();
    let counter = ChunkCounter::default();

    let started = std::time::Instant::now();
    let report = DownloadEngine::new(&client, &settings, Logger::silent(), &counter).run().await;

    let chunks = counter.chunks.load(Ordering::SeqCst);
    assert!(chunks >= 1 && chunks < 10, "got {} chunks", chunks);
    assert_eq!(report.sample.outcome, Outcome::PartialFailure);
    assert!(report.sample.time_capped);
    assert_eq!(report.sample.bytes, chunks as u64 * 1_000);
    assert!(report.sample.mbytes_per_sec > 0.0);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_time_cap_covers_every_server_in_the_phase() {
    let mut servers = Vec::new();
    for _ in 0..3 {
        let server = MockServer::start().await;
        mount_head(&server, "/file", true).await;
        Mock::given(method("GET"))
            .and(path("/file"))
            .respond_with(RangeResponder { delay: Duration::from_millis(1_500), ..RangeResponder::new(PAYLOAD) })
            .mount(&server)
            .await;
        servers.push(server);
    }

    let catalog = Catalog::new(
        servers
            .iter()
            .enumerate()
            .map(|(i, server)| descriptor(&format!("slow-{}", i), server, "/file"))
            .collect(),
    )
    .unwrap();
    let mut settings = settings(catalog.clone(), catalog);
    settings.download_cap = Duration::from_secs(1);
    let client = client();

    let started = std::time::Instant::now();
    let report = DownloadEngine::new(&client, &settings, Logger::silent(), &NoProgress).run().await;
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(2_500), "phase took {:?}", elapsed);
    assert_eq!(report.sample.outcome, Outcome::Failed);
    assert!(!report.attempts.is_empty());
    assert!(report.attempts.iter().all(|a| a.server == "slow-0"));
    assert_eq!(report.server, "slow-0");
}

#[tokio::test]
async fn test_full_fetch_cut_off_by_time_cap_keeps_partial_bytes() {
    let base = trickle_server(PAYLOAD, 1_000, Duration::from_millis(300)).await;
    let server = ServerDescriptor::new("trickle", format!("{}/file?bytes=BYTES", base)).unwrap();
    let catalog = Catalog::new(vec![server]).unwrap();
    let mut settings = settings(catalog.clone(), catalog);
    settings.download_cap = Duration::from_secs(1);
    let client = client();

    let started = std::time::Instant::now();
    let report = DownloadEngine::new(&client, &settings, Logger::silent(), &NoProgress).run().await;

    assert_eq!(report.server, "trickle");
    assert_eq!(report.sample.strategy, TransferStrategy::FullFetch);
    assert_eq!(report.sample.outcome, Outcome::PartialFailure);
    assert!(report.sample.time_capped);
    assert!(report.sample.bytes > 0 && report.sample.bytes < PAYLOAD, "got {} bytes", report.sample.bytes);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_empty_body_reports_failed_sample() {
    let server = MockServer::start().await;
    mount_head(&server, "/empty", false).await;
    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let catalog = Catalog::new(vec![descriptor("Empty Host", &server, "/empty")]).unwrap();
    let settings = settings(catalog.clone(), catalog);
    let client = client();

    let (sample, name) = DownloadEngine::new(&client, &settings, Logger::silent(), &NoProgress)
        .run()
        .await
        .into_pair();

    assert_eq!(name, "Empty Host");
    assert_eq!(sample.outcome, Outcome::Failed);
    assert_eq!(sample.bytes, 0);
    assert_eq!(sample.mbytes_per_sec, 0.0);
    assert_eq!(sample.mbits_per_sec, 0.0);
    assert!(sample.server.contains("/empty"));
}

#[tokio::test]
async fn test_catalog_falls_through_to_next_server() {
    let broken = MockServer::start().await;
    mount_head(&broken, "/file", false).await;
    Mock::given(method("GET"))
        .and(path("/file"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&broken)
        .await;

    let healthy = MockServer::start().await;
    mount_head(&healthy, "/file", true).await;
    Mock::given(method("GET"))
        .and(path("/file"))
        .respond_with(RangeResponder::new(PAYLOAD))
        .mount(&healthy)
        .await;

    let catalog = Catalog::new(vec![
        descriptor("broken", &broken, "/file"),
        descriptor("healthy", &healthy, "/file"),
    ])
    .unwrap();
    let settings = settings(catalog.clone(), catalog);
    let client = client();

    let report = DownloadEngine::new(&client, &settings, Logger::silent(), &NoProgress).run().await;

    assert_eq!(report.server, "healthy");
    assert_eq!(report.sample.outcome, Outcome::Success);
    assert_eq!(report.attempts[0].server, "broken");
}

#[tokio::test]
async fn test_pinned_server_does_not_fall_through() {
    let broken = MockServer::start().await;
    mount_head(&broken, "/file", false).await;
    Mock::given(method("GET"))
        .and(path("/file"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&broken)
        .await;

    let pinned = Catalog::pinned(descriptor("chosen", &broken, "/file"));
    let settings = settings(pinned.clone(), pinned);
    let client = client();

    let report = DownloadEngine::new(&client, &settings, Logger::silent(), &NoProgress).run().await;

    assert_eq!(report.server, "chosen");
    assert_eq!(report.sample.outcome, Outcome::Failed);
    assert!(report.attempts.iter().all(|a| a.server == "chosen"));
}

#[tokio::test]
async fn test_chunked_upload_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/up"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let catalog = Catalog::new(vec![descriptor("sink", &server, "/up")]).unwrap();
    let settings = settings(catalog.clone(), catalog);
    let client = client();

    let report = UploadEngine::new(&client, &settings, Logger::silent(), &NoProgress).run().await;

    assert_eq!(report.server, "sink");
    assert_eq!(report.sample.bytes, PAYLOAD);
    assert_eq!(report.sample.outcome, Outcome::Success);
    assert_eq!(report.sample.strategy, TransferStrategy::UploadChunked);
}

#[tokio::test]
async fn test_single_shot_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/up"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let catalog = Catalog::new(vec![descriptor("sink", &server, "/up")]).unwrap();
    let mut settings = settings(catalog.clone(), catalog);
    settings.upload_mode = UploadMode::Single;
    let client = client();

    let report = UploadEngine::new(&client, &settings, Logger::silent(), &NoProgress).run().await;

    assert_eq!(report.sample.bytes, PAYLOAD);
    assert_eq!(report.sample.strategy, TransferStrategy::UploadSingle);
}

#[tokio::test]
async fn test_upload_falls_back_to_next_server() {
    let rejecting = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&rejecting)
        .await;

    let accepting = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&accepting)
        .await;

    let catalog = Catalog::new(vec![
        descriptor("rejecting", &rejecting, "/up"),
        descriptor("accepting", &accepting, "/up"),
    ])
    .unwrap();
    let settings = settings(catalog.clone(), catalog);
    let client = client();

    let report = UploadEngine::new(&client, &settings, Logger::silent(), &NoProgress).run().await;

    assert_eq!(report.server, "accepting");
    assert_eq!(report.attempts.len(), 2);
    assert_eq!(report.attempts[0].server, "rejecting");
    assert_eq!(report.sample.outcome, Outcome::Success);
}

#[tokio::test]
async fn test_upload_keeps_bytes_sent_before_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let catalog = Catalog::new(vec![descriptor("flaky", &server, "/up")]).unwrap();
    let settings = settings(catalog.clone(), catalog);
    let client = client();

    let report = UploadEngine::new(&client, &settings, Logger::silent(), &NoProgress).run().await;

    assert_eq!(report.server, "flaky");
    assert_eq!(report.sample.bytes, 4_000);
    assert_eq!(report.sample.outcome, Outcome::PartialFailure);
    assert!(!report.sample.time_capped);
}

#[tokio::test]
async fn test_single_upload_cut_off_by_time_cap_counts_sent_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/up"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(2_500)))
        .mount(&server)
        .await;

    let catalog = Catalog::new(vec![descriptor("slow sink", &server, "/up")]).unwrap();
    let mut settings = settings(catalog.clone(), catalog);
    settings.upload_mode = UploadMode::Single;
    settings.upload_cap = Duration::from_secs(1);
    let client = client();

    let started = std::time::Instant::now();
    let report = UploadEngine::new(&client, &settings, Logger::silent(), &NoProgress).run().await;

    assert_eq!(report.server, "slow sink");
    assert_eq!(report.sample.strategy, TransferStrategy::UploadSingle);
    assert_eq!(report.sample.outcome, Outcome::PartialFailure);
    assert!(report.sample.time_capped);
    assert_eq!(report.sample.bytes, PAYLOAD);
    assert!(started.elapsed() < Duration::from_millis(2_000));
}

#[tokio::test]
async fn test_chunked_upload_cut_off_by_time_cap_counts_sent_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/up"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(2_500)))
        .mount(&server)
        .await;

    let catalog = Catalog::new(vec![descriptor("slow sink", &server, "/up")]).unwrap();
    let mut settings = settings(catalog.clone(), catalog);
    settings.upload_cap = Duration::from_secs(1);
    let client = client();

    let report = UploadEngine::new(&client, &settings, Logger::silent(), &NoProgress).run().await;

    assert_eq!(report.sample.strategy, TransferStrategy::UploadChunked);
    assert_eq!(report.sample.outcome, Outcome::PartialFailure);
    assert!(report.sample.time_capped);
    assert_eq!(report.sample.bytes, 4_000);
    assert_eq!(report.attempts.len(), 1);
}
