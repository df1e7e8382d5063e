//! Periodic collection loop.
//!
//! ```text
//! run()
//!  └─ loop until stopped
//!      ├─ platform_info()                      once per run
//!      └─ loop until stopped                   one poll cycle
//!          ├─ system → network → topn → processes
//!          ├─ sink.write(batch)                one flush
//!          └─ pause(interval)
//!     on error: log, then return (FailFast) or pause(cooldown) and rerun
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, MetricsConfig};
use crate::normalize::{NormalizeError, NormalizedEvent, Normalizer};
use crate::sink::{EventSink, SinkError};
use crate::stats::{PlatformInfo, StatsError, StatsProvider};

/// Upper bound of the post-failure cooldown.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(1);

/// Granularity of stop checks while sleeping.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// What the loop does after a failed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Log the error and return it from `run()`.
    FailFast,
    /// Log the error, pause for `cooldown`, then restart the run.
    RestartWithBackoff { cooldown: Duration },
}

impl RestartPolicy {
    /// Resilient policy with a cooldown of `min(1s, interval / 2)`, at least 1ns.
    pub fn default_for(interval: Duration) -> Self {
        RestartPolicy::RestartWithBackoff {
            cooldown: DEFAULT_COOLDOWN
                .min(interval / 2)
                .max(Duration::from_nanos(1)),
        }
    }

    fn validate(&self, interval: Duration) -> Result<(), ConfigError> {
        match *self {
            RestartPolicy::FailFast => Ok(()),
            RestartPolicy::RestartWithBackoff { cooldown } => {
                if cooldown.is_zero() || cooldown >= interval {
                    Err(ConfigError::InvalidCooldown)
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Cloneable handle that asks a running monitor to stop.
///
/// The current cycle finishes (including its flush); no new cycle starts.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Error type for a failed poll cycle.
#[derive(Debug)]
pub enum MonitorError {
    Stats(StatsError),
    Normalize(NormalizeError),
    Sink(SinkError),
}

impl std::fmt::Display for MonitorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorError::Stats(e) => write!(f, "stats collection failed: {}", e),
            MonitorError::Normalize(e) => write!(f, "normalization failed: {}", e),
            MonitorError::Sink(e) => write!(f, "sink write failed: {}", e),
        }
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MonitorError::Stats(e) => Some(e),
            MonitorError::Normalize(e) => Some(e),
            MonitorError::Sink(e) => Some(e),
        }
    }
}

impl From<StatsError> for MonitorError {
    fn from(e: StatsError) -> Self {
        MonitorError::Stats(e)
    }
}

impl From<NormalizeError> for MonitorError {
    fn from(e: NormalizeError) -> Self {
        MonitorError::Normalize(e)
    }
}

impl From<SinkError> for MonitorError {
    fn from(e: SinkError) -> Self {
        MonitorError::Sink(e)
    }
}

/// Polls a stats provider at a fixed interval and ships one batch per cycle.
pub struct ProcMonitor<S, K, N> {
    stats: S,
    sink: K,
    normalizer: N,
    interval: Duration,
    metrics: MetricsConfig,
    policy: RestartPolicy,
    stop: StopHandle,
}

impl<S, K, N> ProcMonitor<S, K, N>
where
    S: StatsProvider,
    K: EventSink,
    N: Normalizer,
{
    /// Creates a monitor with the default restart policy.
    pub fn new(
        stats: S,
        sink: K,
        interval: Duration,
        metrics: MetricsConfig,
        normalizer: N,
    ) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        metrics.validate()?;

        // Derived, not user supplied: only explicit policies are validated.
        Ok(Self {
            stats,
            sink,
            normalizer,
            interval,
            metrics,
            policy: RestartPolicy::default_for(interval),
            stop: StopHandle::default(),
        })
    }

    pub fn with_restart_policy(mut self, policy: RestartPolicy) -> Result<Self, ConfigError> {
        policy.validate(self.interval)?;
        self.policy = policy;
        Ok(self)
    }

    pub fn restart_policy(&self) -> RestartPolicy {
        self.policy
    }

    /// Requests a cooperative stop. Idempotent.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Handle for stopping the monitor from another thread or a signal handler.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Runs until stopped.
    ///
    /// Returns `Err` only under [`RestartPolicy::FailFast`].
    pub fn run(&mut self) -> Result<(), MonitorError> {
        info!(
            "Monitor started: interval={:?}, metrics=[{}], policy={:?}",
            self.interval,
            self.metrics.describe(),
            self.policy
        );

        let mut restarts = 0u64;
        while !self.stop.is_stopped() {
            let err = match self.run_cycles() {
                Ok(()) => break,
                Err(e) => e,
            };

            error!("Poll cycle failed: {}", err);
            match self.policy {
                RestartPolicy::FailFast => return Err(err),
                RestartPolicy::RestartWithBackoff { cooldown } => {
                    restarts += 1;
                    warn!("Restarting in {:?} (restart #{})", cooldown, restarts);
                    self.pause(cooldown);
                }
            }
        }

        info!("Monitor stopped");
        Ok(())
    }

    /// One run: fetch platform info, then poll until stopped or a cycle fails.
    fn run_cycles(&mut self) -> Result<(), MonitorError> {
        let platform = self.stats.platform_info()?;
        debug!(
            "Platform: host={}, {} cpus, {} bytes memory",
            platform.hostname, platform.cpu_count, platform.mem_total
        );

        let mut cycle = 0u64;
        while !self.stop.is_stopped() {
            let started = Instant::now();
            let batch = self.collect_cycle(&platform)?;
            let events = batch.len();
            self.sink.write(batch)?;

            cycle += 1;
            debug!(
                "Cycle #{}: {} events flushed in {:?}",
                cycle,
                events,
                started.elapsed()
            );

            self.pause(self.interval);
        }
        Ok(())
    }

    /// Collects every enabled category in fixed order.
    /// Any failure drops what was gathered so far.
    fn collect_cycle(
        &mut self,
        platform: &PlatformInfo,
    ) -> Result<Vec<NormalizedEvent>, MonitorError> {
        let mut batch = Vec::new();

        if self.metrics.system() {
            let raw = self.stats.collect_system_stats()?;
            batch.extend(self.normalizer.normalize(platform, raw)?);
        }
        if self.metrics.network_usage() {
            let raw = self.stats.collect_network_io_stats()?;
            batch.extend(self.normalizer.normalize(platform, raw)?);
        }
        if let Some(n) = self.metrics.topn_process() {
            let raw = self.stats.collect_topn_process_stats(n)?;
            batch.extend(self.normalizer.normalize(platform, raw)?);
        }
        if let Some(names) = self.metrics.processes() {
            let raw = self.stats.collect_process_stats(names)?;
            batch.extend(self.normalizer.normalize(platform, raw)?);
        }

        Ok(batch)
    }

    /// Sleeps for `duration`, waking early once stop is requested.
    fn pause(&self, duration: Duration) {
        let mut remaining = duration;
        while remaining > Duration::ZERO && !self.stop.is_stopped() {
            let slice = remaining.min(SLEEP_SLICE);
            std::thread::sleep(slice);
            remaining = remaining.saturating_sub(slice);
        }
    }
}
