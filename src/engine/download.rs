//! Download phase: capability probe, ranged-chunked fetch, fallbacks
//!
//! Per server: `START -> CAPABILITY_CHECK -> {RANGED_CHUNKED | FULL_FETCH}`.
//! With range support the strategies are tried in order: ranged over the
//! original scheme, ranged over plain http when the server is declared https,
//! then one full fetch. Without range support only the full fetch runs.
//!
//! One time cap covers the whole phase. Capability checks, strategies and
//! fallback servers all spend from it; once it is gone nothing new starts.

use super::{finalize, Accumulator, AttemptOutcome, AttemptRecord, Phase, PhaseReport, ProgressObserver, TimeCap};
use crate::{
    catalog::ServerDescriptor,
    client::{ByteRange, TransferClient},
    logging::Logger,
    models::{EngineSettings, SpeedSample},
    types::TransferStrategy,
};

/// A strategy bound to the URL it runs against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStrategy {
    pub strategy: TransferStrategy,
    pub url: String,
}

/// Download throughput measurement over the download catalog
pub struct DownloadEngine<'a> {
    client: &'a TransferClient,
    settings: &'a EngineSettings,
    logger: Logger,
    observer: &'a dyn ProgressObserver,
}

impl<'a> DownloadEngine<'a> {
    pub fn new(
        client: &'a TransferClient,
        settings: &'a EngineSettings,
        logger: Logger,
        observer: &'a dyn ProgressObserver,
    ) -> Self {
        Self { client, settings, logger, observer }
    }

    /// Run the phase; never fails, a total failure is a zeroed report
    pub async fn run(&self) -> PhaseReport {
        let catalog = &self.settings.download_catalog;
        let cap = TimeCap::start(self.settings.download_cap);
        let mut attempts = Vec::new();
        let mut last: Option<(&str, String)> = None;

        for server in catalog.iter() {
            if cap.exhausted() {
                self.logger
                    .warn("download time cap spent, not trying further servers")
                    .field("next_server", server.name())
                    .log()
                    .await;
                break;
            }

            let url = server.url_for(self.settings.size_bytes);
            last = Some((server.name(), url.clone()));

            if let Some(sample) = self.attempt_server(server, &url, &cap, &mut attempts).await {
                self.logger
                    .info("download measured")
                    .field("server", server.name())
                    .field("bytes", sample.bytes)
                    .field("seconds", sample.seconds)
                    .field("outcome", sample.outcome.as_str())
                    .log()
                    .await;
                return PhaseReport::succeeded(server.name(), sample, attempts);
            }

            if catalog.is_pinned() {
                self.logger
                    .warn("selected download server failed, not falling back")
                    .field("server", server.name())
                    .log()
                    .await;
                break;
            }
        }

        self.logger.warn("all download servers failed").log().await;
        PhaseReport::exhausted(
            last.as_ref().map(|(name, _)| *name),
            last.as_ref().map(|(_, url)| url.as_str()),
            attempts,
        )
    }

    async fn attempt_server(
        &self,
        server: &ServerDescriptor,
        url: &str,
        cap: &TimeCap,
        attempts: &mut Vec<AttemptRecord>,
    ) -> Option<SpeedSample> {
        let plan = self.plan(server, url, cap).await;

        for step in plan {
            if cap.exhausted() {
                break;
            }

            self.observer.on_attempt(Phase::Download, server.name(), step.strategy);
            let outcome = match step.strategy {
                TransferStrategy::FullFetch => self.full_fetch(&step.url, cap).await,
                strategy => self.ranged(&step.url, strategy, cap).await,
            };

            let result = match &outcome {
                AttemptOutcome::Failed(reason) => reason.clone(),
                other => other.label().to_string(),
            };
            self.logger
                .debug("download attempt finished")
                .field("server", server.name())
                .field("url", &step.url)
                .field("strategy", step.strategy.as_str())
                .field("result", &result)
                .log()
                .await;
            attempts.push(AttemptRecord {
                server: server.name().to_string(),
                url: step.url.clone(),
                strategy: step.strategy,
                result,
            });

            if let Some(sample) = outcome.into_sample() {
                return Some(sample);
            }
        }

        None
    }

    /// Capability check, then the ordered strategy list for this server
    pub async fn plan(&self, server: &ServerDescriptor, url: &str, cap: &TimeCap) -> Vec<PlannedStrategy> {
        let limit = cap.request_timeout_within(self.settings.capability_timeout);
        let support = match self.client.range_support(url, limit).await {
            Ok(support) => support,
            Err(e) => {
                self.logger
                    .debug("capability check failed")
                    .field("url", url)
                    .error_info(&e)
                    .log()
                    .await;
                return plan_strategies(server, url, false);
            }
        };

        self.logger
            .debug("capability check")
            .field("url", url)
            .field("status", support.status)
            .field("accept_ranges", support.accepts_ranges)
            .field("content_length", support.content_length)
            .log()
            .await;

        plan_strategies(server, url, support.accepts_ranges)
    }

    /// Sequential byte-range requests; the first bad chunk aborts the strategy
    async fn ranged(&self, url: &str, strategy: TransferStrategy, cap: &TimeCap) -> AttemptOutcome {
        let ranges = ByteRange::partition(self.settings.size_bytes, self.settings.chunk_count);
        let total = ranges.len();
        let mut acc = Accumulator::new();

        for (index, range) in ranges.into_iter().enumerate() {
            if cap.exhausted() {
                self.logger
                    .debug("time cap reached, finalizing")
                    .field("url", url)
                    .field("chunks_done", index)
                    .field("chunks", acc.chunks())
                    .log()
                    .await;
                return finalize(&acc, url, strategy, false, true);
            }

            match self.client.fetch_range(url, range, cap.request_timeout()).await {
                Ok(body) if body.bytes == range.len() => {
                    acc.record(body.bytes, body.elapsed);
                    self.observer.on_chunk(Phase::Download, index, total, body.bytes, body.elapsed);
                    self.logger
                        .debug("chunk")
                        .field("index", index)
                        .field("status", body.status)
                        .field("bytes", body.bytes)
                        .field("ms", body.elapsed.as_secs_f64() * 1000.0)
                        .log()
                        .await;
                }
                Ok(body) => {
                    return AttemptOutcome::Failed(format!(
                        "chunk {} of {} returned {} bytes, expected {}",
                        index + 1,
                        total,
                        body.bytes,
                        range.len()
                    ));
                }
                Err(e) if cap.exhausted() && !acc.is_empty() => {
                    self.logger
                        .debug("chunk cut off by time cap")
                        .field("index", index)
                        .field("chunks", acc.chunks())
                        .error_info(&e)
                        .log()
                        .await;
                    return finalize(&acc, url, strategy, false, true);
                }
                Err(e) => {
                    return AttemptOutcome::Failed(format!("chunk {} of {} failed: {}", index + 1, total, e));
                }
            }
        }

        self.logger
            .debug("all chunks received")
            .field("url", url)
            .field("chunks", acc.chunks())
            .log()
            .await;
        finalize(&acc, url, strategy, true, false)
    }

    /// One unranged request bounded by what is left of the phase budget
    async fn full_fetch(&self, url: &str, cap: &TimeCap) -> AttemptOutcome {
        match self.client.fetch_streaming(url, cap, cap.remaining()).await {
            Ok(body) => {
                let mut acc = Accumulator::new();
                acc.record(body.bytes, body.elapsed);
                self.observer.on_chunk(Phase::Download, 0, 1, body.bytes, body.elapsed);
                self.logger
                    .debug("full fetch")
                    .field("url", url)
                    .field("status", body.status)
                    .field("bytes", body.bytes)
                    .field("capped", body.capped)
                    .field("interrupted", body.interrupted)
                    .log()
                    .await;
                let complete = !body.capped && !body.interrupted;
                finalize(&acc, url, TransferStrategy::FullFetch, complete, body.capped)
            }
            Err(e) => AttemptOutcome::Failed(format!("full fetch failed: {}", e)),
        }
    }
}

/// Ordered strategies for one server given its range capability
///
/// The plain-http retry only exists for servers declared https.
pub fn plan_strategies(server: &ServerDescriptor, url: &str, accepts_ranges: bool) -> Vec<PlannedStrategy> {
    let full = PlannedStrategy { strategy: TransferStrategy::FullFetch, url: url.to_string() };
    if !accepts_ranges {
        return vec![full];
    }

    let mut plan = vec![PlannedStrategy { strategy: TransferStrategy::RangedChunked, url: url.to_string() }];
    if server.scheme().is_encrypted() {
        if let Some(plain) = plain_http_url(url) {
            plan.push(PlannedStrategy { strategy: TransferStrategy::RangedChunkedPlain, url: plain });
        }
    }
    plan.push(full);
    plan
}

/// The same host, port and path over plain http
pub fn plain_http_url(url: &str) -> Option<String> {
    let mut parsed = url::Url::parse(url).ok()?;
    parsed.set_scheme("http").ok()?;
    Some(parsed.to_string())
}
