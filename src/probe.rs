//! Latency prober: a bounded series of reachability probes to one target
//!
//! Loss, mean and jitter come from the individually recorded round-trip
//! times. Jitter is the population standard deviation of those RTTs, the
//! same quantity `ping` prints as `mdev`.

use crate::{
    engine::ProgressObserver,
    error::{AppError, Result},
    logging::Logger,
    models::{metrics::loss_percent, LatencySample, LatencySettings},
    types::IpPreference,
};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::{net::TcpStream, sync::OnceCell, time::timeout};

/// One reachability probe primitive
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Identifier reported in the sample
    fn target(&self) -> &str;

    /// Send one probe and return its round-trip time
    async fn probe(&self, limit: Duration) -> Result<Duration>;
}

/// Probe that times a TCP handshake to `target:port`
///
/// A completed connect and an active refusal both prove the host answered.
pub struct TcpConnectProbe {
    target: String,
    port: u16,
    ip_preference: IpPreference,
    address: OnceCell<SocketAddr>,
}

impl TcpConnectProbe {
    pub fn new(target: &str, port: u16, ip_preference: IpPreference) -> Self {
        Self {
            target: target.trim().to_string(),
            port,
            ip_preference,
            address: OnceCell::new(),
        }
    }

    /// Resolve once so name lookup never lands inside a measured RTT
    async fn address(&self) -> Result<SocketAddr> {
        self.address
            .get_or_try_init(|| async {
                let host = self.target.trim_start_matches('[').trim_end_matches(']');
                let candidates = tokio::net::lookup_host((host, self.port))
                    .await
                    .map_err(|e| AppError::unreachable(format!("Cannot resolve {}: {}", self.target, e)))?;

                candidates
                    .into_iter()
                    .find(|addr| self.ip_preference.accepts(&addr.ip()))
                    .ok_or_else(|| {
                        AppError::unreachable(format!(
                            "{} has no address for IP version {}",
                            self.target, self.ip_preference
                        ))
                    })
            })
            .await
            .copied()
    }
}

#[async_trait]
impl ReachabilityProbe for TcpConnectProbe {
    fn target(&self) -> &str {
        &self.target
    }

    async fn probe(&self, limit: Duration) -> Result<Duration> {
        let address = self.address().await?;
        let started = Instant::now();

        match timeout(limit, TcpStream::connect(address)).await {
            Ok(Ok(_stream)) => Ok(started.elapsed()),
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => Ok(started.elapsed()),
            Ok(Err(e)) => Err(AppError::unreachable(format!("{}: {}", address, e))),
            Err(_) => Err(AppError::timeout(format!("{} did not answer within {}ms", address, limit.as_millis()))),
        }
    }
}

/// Runs the liveness check and the probe series
pub struct LatencyProber<'a> {
    logger: Logger,
    observer: &'a dyn ProgressObserver,
    interval: Duration,
}

impl<'a> LatencyProber<'a> {
    pub fn new(logger: Logger, observer: &'a dyn ProgressObserver, interval: Duration) -> Self {
        Self { logger, observer, interval }
    }

    /// Probe with the configured target, count and timeout
    pub async fn run(&self, settings: &LatencySettings, ip_preference: IpPreference) -> LatencySample {
        let probe = TcpConnectProbe::new(&settings.target, settings.port, ip_preference);
        self.probe(&probe, settings.count, settings.probe_timeout).await
    }

    /// Issue `count` sequential probes; dropped probes count as loss
    pub async fn probe<P>(&self, probe: &P, count: u32, per_probe_timeout: Duration) -> LatencySample
    where
        P: ReachabilityProbe + ?Sized,
    {
        let target = probe.target();

        if let Err(e) = probe.probe(per_probe_timeout).await {
            self.logger
                .warn("target unreachable, skipping probes")
                .field("target", target)
                .error_info(&e)
                .log()
                .await;
            return LatencySample::unreachable(target, count);
        }

        let series_start = Instant::now();
        let mut rtts_ms = Vec::with_capacity(count as usize);

        for index in 0..count {
            if !self.interval.is_zero() {
                tokio::time::sleep(self.interval).await;
            }

            match probe.probe(per_probe_timeout).await {
                Ok(rtt) => {
                    let rtt_ms = rtt.as_secs_f64() * 1000.0;
                    rtts_ms.push(rtt_ms);
                    self.logger
                        .debug("probe")
                        .field("target", target)
                        .field("index", index)
                        .field("rtt_ms", rtt_ms)
                        .log()
                        .await;
                }
                Err(e) => {
                    self.logger
                        .debug("probe dropped")
                        .field("target", target)
                        .field("index", index)
                        .error_info(&e)
                        .log()
                        .await;
                }
            }

            let done = index + 1;
            let running_loss = loss_percent(done, rtts_ms.len() as u32);
            self.observer.on_probe(done, series_start.elapsed(), running_loss);
        }

        let sample = LatencySample::from_rtts(target, count, &rtts_ms);
        self.logger
            .info("latency measured")
            .field("target", target)
            .field("sent", sample.sent)
            .field("received", sample.received)
            .field("loss_pct", sample.loss_pct)
            .field("avg_ms", sample.avg_ms)
            .field("jitter_ms", sample.jitter_ms)
            .log()
            .await;
        sample
    }
}
