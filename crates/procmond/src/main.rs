//! procmond - Host metrics forwarder daemon.
//!
//! Polls /proc at a fixed interval and ships normalized events to a Splunk
//! HTTP Event Collector (or to stdout as JSON lines).

use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use procmon_core::collector::{ProcfsStats, RealFs};
use procmon_core::config::MetricsConfig;
use procmon_core::monitor::{ProcMonitor, RestartPolicy};
use procmon_core::normalize::EnvelopeNormalizer;
use procmon_core::sink::{EventSink, HecConfig, HecSink, JsonLinesSink};

/// Host metrics forwarder daemon.
#[derive(Parser, Debug)]
#[command(name = "procmond", about = "Host metrics forwarder daemon", version)]
struct Args {
    /// HEC base URL (e.g. https://splunk:8088) or full event endpoint.
    #[arg(long, env = "PROCMON_HEC_URL", required_unless_present = "stdout")]
    hec_url: Option<String>,

    /// HEC token.
    #[arg(
        long,
        env = "PROCMON_HEC_TOKEN",
        hide_env_values = true,
        required_unless_present = "stdout"
    )]
    hec_token: Option<String>,

    /// HEC request timeout in seconds.
    #[arg(long, default_value = "10")]
    hec_timeout: u64,

    /// Accept invalid TLS certificates from the HEC endpoint.
    #[arg(long)]
    hec_insecure: bool,

    /// Poll interval in seconds.
    #[arg(short, long, env = "PROCMON_INTERVAL", default_value = "2")]
    interval: u64,

    /// Metric category: system, network_usage, topn_process=N, processes=a,b.
    /// Repeatable; the environment variable is `;` separated.
    #[arg(
        short,
        long = "metric",
        env = "PROCMON_METRICS",
        value_delimiter = ';',
        default_value = "system"
    )]
    metrics: Vec<String>,

    /// Report only this network interface.
    #[arg(long)]
    network_interface: Option<String>,

    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// What to do after a failed poll cycle.
    #[arg(long, value_enum, default_value_t = PolicyArg::Restart)]
    restart_policy: PolicyArg,

    /// Pause before restarting after a failure, in milliseconds.
    /// Defaults to min(1000, interval / 2).
    #[arg(long)]
    cooldown_ms: Option<u64>,

    /// Write JSON lines to stdout instead of sending to HEC.
    #[arg(long)]
    stdout: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    FailFast,
    Restart,
}

impl Args {
    fn restart_policy(&self, interval: Duration) -> RestartPolicy {
        match (self.restart_policy, self.cooldown_ms) {
            (PolicyArg::FailFast, _) => RestartPolicy::FailFast,
            (PolicyArg::Restart, Some(ms)) => RestartPolicy::RestartWithBackoff {
                cooldown: Duration::from_millis(ms),
            },
            (PolicyArg::Restart, None) => RestartPolicy::default_for(interval),
        }
    }

    /// `--cooldown-ms` has no effect when failures are not restarted.
    fn cooldown_ignored(&self) -> bool {
        self.restart_policy == PolicyArg::FailFast && self.cooldown_ms.is_some()
    }

    fn hec_config(&self) -> Option<HecConfig> {
        let url = self.hec_url.as_deref()?;
        let token = self.hec_token.as_deref()?;
        let mut config = HecConfig::new(url, token);
        config.timeout = Duration::from_secs(self.hec_timeout);
        config.accept_invalid_certs = self.hec_insecure;
        Some(config)
    }
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Logs go to stderr so `--stdout` output stays clean.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["procmond", "procmon_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn fail(message: String) -> ! {
    error!("{}", message);
    eprintln!("procmond: {}", message);
    std::process::exit(1);
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    info!("procmond {} starting", procmon_core::VERSION);

    let interval = Duration::from_secs(args.interval);
    if args.cooldown_ignored() {
        warn!("--cooldown-ms is ignored with --restart-policy fail-fast");
    }
    let metrics = match MetricsConfig::from_specs(&args.metrics) {
        Ok(m) => m,
        Err(e) => fail(format!("invalid configuration: {}", e)),
    };

    let mut stats = ProcfsStats::new(RealFs::new(), &args.proc_path);
    if let Some(ref interface) = args.network_interface {
        stats = stats.with_network_interface(interface.as_str());
    }

    let sink: Box<dyn EventSink> = if args.stdout {
        info!("Sink: JSON lines on stdout");
        Box::new(JsonLinesSink::new(std::io::stdout()))
    } else {
        let Some(config) = args.hec_config() else {
            fail("--hec-url and --hec-token are required without --stdout".to_string())
        };
        let hec = match HecSink::new(&config) {
            Ok(hec) => hec,
            Err(e) => fail(format!("failed to create HEC sink: {}", e)),
        };
        info!(
            "Sink: HEC at {} (timeout {:?}{})",
            hec.endpoint(),
            config.timeout,
            if config.accept_invalid_certs {
                ", certificate checks disabled"
            } else {
                ""
            }
        );
        Box::new(hec)
    };

    info!(
        "Config: interval={}s, proc={}, metrics=[{}]",
        args.interval,
        args.proc_path,
        metrics.describe()
    );

    let mut monitor = match ProcMonitor::new(
        stats,
        sink,
        interval,
        metrics,
        EnvelopeNormalizer::new(),
    )
    .and_then(|m| m.with_restart_policy(args.restart_policy(interval)))
    {
        Ok(m) => m,
        Err(e) => fail(format!("invalid configuration: {}", e)),
    };

    // Setup graceful shutdown
    let stop = monitor.stop_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        stop.stop();
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    if let Err(e) = monitor.run() {
        fail(format!("monitor failed: {}", e));
    }

    info!("procmond stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("procmond").chain(args.iter().copied()))
    }

    #[test]
    fn test_stdout_needs_no_hec() {
        let args = parse(&["--stdout"]).unwrap();
        assert!(args.stdout);
        assert_eq!(args.interval, 2);
        assert_eq!(args.metrics, vec!["system"]);
        assert_eq!(args.restart_policy, PolicyArg::Restart);
        assert!(args.hec_config().is_none());
    }

    #[test]
    fn test_repeated_metrics() {
        let args = parse(&[
            "--stdout",
            "--metric",
            "system",
            "--metric",
            "processes=sshd,nginx",
            "--metric",
            "topn_process=5;network_usage",
        ])
        .unwrap();
        assert_eq!(
            args.metrics,
            vec![
                "system",
                "processes=sshd,nginx",
                "topn_process=5",
                "network_usage"
            ]
        );
        assert!(MetricsConfig::from_specs(&args.metrics).is_ok());
    }

    #[test]
    fn test_hec_config() {
        let args = parse(&[
            "--hec-url",
            "https://splunk:8088",
            "--hec-token",
            "abc",
            "--hec-timeout",
            "3",
            "--hec-insecure",
        ])
        .unwrap();

        let config = args.hec_config().unwrap();
        assert_eq!(config.url, "https://splunk:8088");
        assert_eq!(config.token, "abc");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert!(config.accept_invalid_certs);
    }

    #[test]
    fn test_restart_policy_args() {
        let interval = Duration::from_secs(2);

        let args = parse(&["--stdout"]).unwrap();
        assert_eq!(
            args.restart_policy(interval),
            RestartPolicy::default_for(interval)
        );

        let args = parse(&["--stdout", "--cooldown-ms", "250"]).unwrap();
        assert_eq!(
            args.restart_policy(interval),
            RestartPolicy::RestartWithBackoff {
                cooldown: Duration::from_millis(250)
            }
        );

        let args = parse(&["--stdout", "--restart-policy", "fail-fast"]).unwrap();
        assert_eq!(args.restart_policy(interval), RestartPolicy::FailFast);
        assert!(!args.cooldown_ignored());
    }

    #[test]
    fn test_cooldown_with_fail_fast_is_flagged() {
        let args = parse(&[
            "--stdout",
            "--restart-policy",
            "fail-fast",
            "--cooldown-ms",
            "250",
        ])
        .unwrap();
        assert!(args.cooldown_ignored());
        assert_eq!(
            args.restart_policy(Duration::from_secs(2)),
            RestartPolicy::FailFast
        );

        let args = parse(&["--stdout", "--cooldown-ms", "250"]).unwrap();
        assert!(!args.cooldown_ignored());
    }

    #[test]
    fn test_verbosity_flags() {
        let args = parse(&["--stdout", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
        assert!(!args.quiet);

        let args = parse(&["--stdout", "-q"]).unwrap();
        assert!(args.quiet);
    }
}
