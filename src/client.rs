//! HTTP transport used by the transfer engines
//!
//! Wraps one `reqwest::Client` per run. Every call carries an explicit
//! timeout; body reads are counted chunk by chunk so that only payload bytes
//! enter the measurement.

use crate::{
    defaults::UPLOAD_BLOCK_BYTES,
    engine::budget::TimeCap,
    error::{AppError, Result},
    types::IpPreference,
};
use futures::stream::{self, Stream};
use reqwest::{
    header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_TYPE, RANGE},
    Body, Client, Response, StatusCode,
};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::time::timeout;

const USER_AGENT: &str = concat!("speedbuffy/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Inclusive byte range `start..=end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Range` header value
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }

    /// Split `total` bytes into `parts` contiguous ranges; the last absorbs the remainder
    pub fn partition(total: u64, parts: u32) -> Vec<ByteRange> {
        if total == 0 || parts == 0 {
            return Vec::new();
        }
        let parts = u64::from(parts).min(total);
        let base = total / parts;

        (0..parts)
            .map(|i| {
                let start = i * base;
                let end = if i == parts - 1 { total - 1 } else { start + base - 1 };
                ByteRange { start, end }
            })
            .collect()
    }
}

/// Result of the capability HEAD probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSupport {
    pub status: u16,
    pub accepts_ranges: bool,
    pub content_length: Option<u64>,
}

/// Body fully read from one request
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedBody {
    pub status: u16,
    pub bytes: u64,
    pub elapsed: Duration,
}

/// Body read under a time cap, possibly cut short
#[derive(Debug, Clone, PartialEq)]
pub struct StreamedBody {
    pub status: u16,
    pub bytes: u64,
    pub elapsed: Duration,
    /// The cap expired before the body ended
    pub capped: bool,
    /// The connection broke after some bytes arrived
    pub interrupted: bool,
}

/// Outcome of one upload request
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReceipt {
    /// Response status; `None` when the limit expired before a response
    pub status: Option<u16>,
    /// Payload bytes handed to the connection
    pub bytes: u64,
    pub elapsed: Duration,
    /// The limit expired mid-request after some payload was sent
    pub capped: bool,
}

/// HTTP transport shared by the download and upload engines
#[derive(Clone)]
pub struct TransferClient {
    client: Client,
}

impl TransferClient {
    /// Create a client bound to the preferred address family
    pub fn new(ip_preference: IpPreference) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .local_address(ip_preference.local_address())
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// HEAD the URL and report whether it advertises byte ranges
    pub async fn range_support(&self, url: &str, limit: Duration) -> Result<RangeSupport> {
        let response = self.client.head(url).timeout(limit).send().await?;
        let status = response.status();
        let headers = response.headers();

        let accepts_ranges = headers
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').any(|unit| unit.trim().eq_ignore_ascii_case("bytes")))
            .unwrap_or(false);

        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());

        Ok(RangeSupport {
            status: status.as_u16(),
            accepts_ranges: status.is_success() && accepts_ranges,
            content_length,
        })
    }

    /// GET one byte range and count its body
    ///
    /// Non-2xx statuses are errors. The caller checks the byte count.
    pub async fn fetch_range(&self, url: &str, range: ByteRange, limit: Duration) -> Result<FetchedBody> {
        let started = Instant::now();

        let request = async {
            let response = self
                .client
                .get(url)
                .header(RANGE, range.header_value())
                .send()
                .await?;
            let status = ensure_success(&response)?;

            let mut response = response;
            let mut bytes = 0u64;
            while let Some(chunk) = response.chunk().await? {
                bytes += chunk.len() as u64;
            }
            Ok::<_, AppError>((status, bytes))
        };

        let (status, bytes) = timeout(limit, request)
            .await
            .map_err(|_| AppError::timeout(format!("Range {} timed out after {:.2}s", range.header_value(), limit.as_secs_f64())))??;

        Ok(FetchedBody { status, bytes, elapsed: started.elapsed() })
    }

    /// GET the whole resource, counting bytes until it ends or the cap expires
    ///
    /// Each read is bounded by the remaining budget (and by `ceiling` overall),
    /// so a slow body yields a capped partial count instead of an error.
    pub async fn fetch_streaming(&self, url: &str, cap: &TimeCap, ceiling: Duration) -> Result<StreamedBody> {
        let started = Instant::now();
        let deadline = started + ceiling;

        let send_limit = cap.request_timeout_within(ceiling);
        let mut response = timeout(send_limit, self.client.get(url).send())
            .await
            .map_err(|_| AppError::timeout(format!("No response from {} within {:.2}s", url, send_limit.as_secs_f64())))??;
        let status = ensure_success(&response)?;

        let mut bytes = 0u64;
        let mut capped = false;
        let mut interrupted = false;
        loop {
            let remaining = cap
                .remaining()
                .min(deadline.saturating_duration_since(Instant::now()));
            if remaining.is_zero() {
                capped = true;
                break;
            }

            match timeout(remaining, response.chunk()).await {
                Ok(Ok(Some(chunk))) => bytes += chunk.len() as u64,
                Ok(Ok(None)) => break,
                // Body broke mid-stream; what arrived is still a measurement
                Ok(Err(_)) if bytes > 0 => {
                    interrupted = true;
                    break;
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    capped = true;
                    break;
                }
            }
        }

        Ok(StreamedBody { status, bytes, elapsed: started.elapsed(), capped, interrupted })
    }

    /// POST `len` generated bytes as one streamed body
    ///
    /// When `limit` expires after part of the payload went out, the bytes
    /// sent so far come back as a capped receipt rather than an error.
    pub async fn upload(&self, url: &str, len: u64, limit: Duration) -> Result<UploadReceipt> {
        let started = Instant::now();
        let sent = Arc::new(AtomicU64::new(0));

        let request = async {
            let response = self
                .client
                .post(url)
                .header(CONTENT_TYPE, "application/octet-stream")
                .header(CONTENT_LENGTH, len)
                .body(Body::wrap_stream(payload_stream(len, Arc::clone(&sent))))
                .send()
                .await?;
            let status = ensure_success(&response)?;

            let mut response = response;
            while response.chunk().await?.is_some() {}
            Ok::<_, AppError>(status)
        };

        match timeout(limit, request).await {
            Ok(status) => Ok(UploadReceipt {
                status: Some(status?),
                bytes: len,
                elapsed: started.elapsed(),
                capped: false,
            }),
            Err(_) => {
                let bytes = sent.load(Ordering::Relaxed);
                if bytes == 0 {
                    return Err(AppError::timeout(format!(
                        "Upload to {} timed out after {:.2}s",
                        url,
                        limit.as_secs_f64()
                    )));
                }
                Ok(UploadReceipt { status: None, bytes, elapsed: started.elapsed(), capped: true })
            }
        }
    }
}

fn ensure_success(response: &Response) -> Result<u16> {
    let status: StatusCode = response.status();
    if status.is_success() {
        Ok(status.as_u16())
    } else {
        Err(AppError::http_request(format!("{} returned HTTP {}", response.url(), status.as_u16())))
    }
}

/// Lazily generated upload payload, `len` bytes in fixed-size blocks
///
/// Every block pulled by the transport is added to `sent`.
pub fn payload_stream(
    len: u64,
    sent: Arc<AtomicU64>,
) -> impl Stream<Item = std::result::Result<Vec<u8>, std::io::Error>> + Send + Sync + 'static {
    let block: Vec<u8> = (0..UPLOAD_BLOCK_BYTES).map(|i| (i % 251) as u8).collect();
    stream::unfold(len, move |remaining| {
        let block = block.clone();
        let sent = Arc::clone(&sent);
        async move {
            if remaining == 0 {
                return None;
            }
            let take = remaining.min(block.len() as u64) as usize;
            let mut chunk = block;
            chunk.truncate(take);
            sent.fetch_add(take as u64, Ordering::Relaxed);
            Some((Ok(chunk), remaining - take as u64))
        }
    })
}
