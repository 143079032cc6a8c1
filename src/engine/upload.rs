//! Upload phase: generated payload, chunked or single-shot, catalog fallback
//!
//! Uploads have no range capability; the only fallback is the next catalog
//! server with a fresh payload. A chunk failure after at least one accepted
//! chunk finalizes the attempt with the bytes already sent. The phase shares
//! one time cap across servers; a request cut off by it still counts the
//! payload bytes it handed to the connection.

use super::{finalize, Accumulator, AttemptOutcome, AttemptRecord, Phase, PhaseReport, ProgressObserver, TimeCap};
use crate::{
    client::TransferClient,
    logging::Logger,
    models::EngineSettings,
    types::{TransferStrategy, UploadMode},
};

/// Upload throughput measurement over the upload catalog
pub struct UploadEngine<'a> {
    client: &'a TransferClient,
    settings: &'a EngineSettings,
    logger: Logger,
    observer: &'a dyn ProgressObserver,
}

impl<'a> UploadEngine<'a> {
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
        let catalog = &self.settings.upload_catalog;
        let strategy = match self.settings.upload_mode {
            UploadMode::Chunked => TransferStrategy::UploadChunked,
            UploadMode::Single => TransferStrategy::UploadSingle,
        };
        let cap = TimeCap::start(self.settings.upload_cap);
        let mut attempts = Vec::new();
        let mut last: Option<(&str, String)> = None;

        for server in catalog.iter() {
            if cap.exhausted() {
                self.logger
                    .warn("upload time cap spent, not trying further servers")
                    .field("next_server", server.name())
                    .log()
                    .await;
                break;
            }

            let url = server.url_for(self.settings.size_bytes);
            last = Some((server.name(), url.clone()));
            self.observer.on_attempt(Phase::Upload, server.name(), strategy);

            let outcome = match self.settings.upload_mode {
                UploadMode::Chunked => self.chunked(&url, &cap).await,
                UploadMode::Single => self.single(&url, &cap).await,
            };

            let result = match &outcome {
                AttemptOutcome::Failed(reason) => reason.clone(),
                other => other.label().to_string(),
            };
            self.logger
                .debug("upload attempt finished")
                .field("server", server.name())
                .field("url", &url)
                .field("strategy", strategy.as_str())
                .field("result", &result)
                .log()
                .await;
            attempts.push(AttemptRecord {
                server: server.name().to_string(),
                url: url.clone(),
                strategy,
                result,
            });

            if let Some(sample) = outcome.into_sample() {
                self.logger
                    .info("upload measured")
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
                    .warn("selected upload server failed, not falling back")
                    .field("server", server.name())
                    .log()
                    .await;
                break;
            }
        }

        self.logger.warn("all upload servers failed").log().await;
        PhaseReport::exhausted(
            last.as_ref().map(|(name, _)| *name),
            last.as_ref().map(|(_, url)| url.as_str()),
            attempts,
        )
    }

    /// Fixed-size chunks, each its own POST, checked against the cap before sending
    async fn chunked(&self, url: &str, cap: &TimeCap) -> AttemptOutcome {
        let sizes = chunk_sizes(self.settings.size_bytes, self.settings.upload_chunk_bytes);
        let total = sizes.len();
        let mut acc = Accumulator::new();

        for (index, len) in sizes.into_iter().enumerate() {
            if cap.exhausted() {
                self.logger
                    .debug("time cap reached, finalizing")
                    .field("url", url)
                    .field("chunks_done", index)
                    .field("chunks", acc.chunks())
                    .log()
                    .await;
                return finalize(&acc, url, TransferStrategy::UploadChunked, false, true);
            }

            match self.client.upload(url, len, cap.request_timeout()).await {
                Ok(receipt) => {
                    acc.record(receipt.bytes, receipt.elapsed);
                    self.observer.on_chunk(Phase::Upload, index, total, receipt.bytes, receipt.elapsed);
                    self.logger
                        .debug("chunk")
                        .field("index", index)
                        .field("status", receipt.status)
                        .field("bytes", receipt.bytes)
                        .field("ms", receipt.elapsed.as_secs_f64() * 1000.0)
                        .field("capped", receipt.capped)
                        .log()
                        .await;
                    if receipt.capped {
                        self.logger
                            .debug("chunk cut off by time cap")
                            .field("url", url)
                            .field("chunks", acc.chunks())
                            .log()
                            .await;
                        return finalize(&acc, url, TransferStrategy::UploadChunked, false, true);
                    }
                }
                Err(e) if !acc.is_empty() => {
                    self.logger
                        .debug("upload chunk failed, keeping bytes sent so far")
                        .field("index", index)
                        .field("chunks", acc.chunks())
                        .error_info(&e)
                        .log()
                        .await;
                    return finalize(&acc, url, TransferStrategy::UploadChunked, false, cap.exhausted());
                }
                Err(e) => {
                    return AttemptOutcome::Failed(format!("chunk {} of {} failed: {}", index + 1, total, e));
                }
            }
        }

        self.logger
            .debug("all chunks accepted")
            .field("url", url)
            .field("chunks", acc.chunks())
            .log()
            .await;
        finalize(&acc, url, TransferStrategy::UploadChunked, true, false)
    }

    /// The whole payload in one streamed POST, bounded by the cap
    async fn single(&self, url: &str, cap: &TimeCap) -> AttemptOutcome {
        match self.client.upload(url, self.settings.size_bytes, cap.request_timeout()).await {
            Ok(receipt) => {
                let mut acc = Accumulator::new();
                acc.record(receipt.bytes, receipt.elapsed);
                self.observer.on_chunk(Phase::Upload, 0, 1, receipt.bytes, receipt.elapsed);
                self.logger
                    .debug("single-shot upload")
                    .field("url", url)
                    .field("status", receipt.status)
                    .field("bytes", receipt.bytes)
                    .field("capped", receipt.capped)
                    .log()
                    .await;
                finalize(&acc, url, TransferStrategy::UploadSingle, !receipt.capped, receipt.capped)
            }
            Err(e) => AttemptOutcome::Failed(format!("single-shot upload failed: {}", e)),
        }
    }
}

/// Split `total` into `chunk`-sized pieces; the last piece carries the remainder
pub fn chunk_sizes(total: u64, chunk: u64) -> Vec<u64> {
    if total == 0 {
        return Vec::new();
    }
    let chunk = chunk.clamp(1, total);
    let mut sizes = vec![chunk; (total / chunk) as usize];
    let rest = total % chunk;
    if rest > 0 {
        sizes.push(rest);
    }
    sizes
}
