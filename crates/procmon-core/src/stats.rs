//! Stats provider contract.
//!
//! The monitor loop only talks to a `StatsProvider`; how the numbers are
//! obtained (procfs, a mock, something else) is up to the implementation.

use serde::Serialize;
use serde_json::Value;

use crate::collector::procfs::ParseError;

/// Host description fetched once per monitor run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlatformInfo {
    pub hostname: String,
    /// `system=.. node=.. release=.. version=.. machine=..`
    pub platform: String,
    pub cpu_count: usize,
    /// Total physical memory in bytes.
    pub mem_total: u64,
    /// Boot time, `YYYY-mm-dd HH:MM:SS` in UTC.
    pub boot_time: String,
    pub network_interfaces: Vec<String>,
}

impl PlatformInfo {
    /// Creates platform info carrying only a hostname.
    pub fn with_hostname(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ..Self::default()
        }
    }
}

/// Output of a single collection call.
///
/// Providers may return one record or many; normalizers treat both the same.
#[derive(Debug, Clone, PartialEq)]
pub enum RawMetrics {
    One(Value),
    Many(Vec<Value>),
}

impl RawMetrics {
    /// Flattens into a list of records, preserving provider order.
    pub fn into_records(self) -> Vec<Value> {
        match self {
            RawMetrics::One(record) => vec![record],
            RawMetrics::Many(records) => records,
        }
    }

    /// Number of records carried.
    pub fn len(&self) -> usize {
        match self {
            RawMetrics::One(_) => 1,
            RawMetrics::Many(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Value> for RawMetrics {
    fn from(record: Value) -> Self {
        RawMetrics::One(record)
    }
}

impl From<Vec<Value>> for RawMetrics {
    fn from(records: Vec<Value>) -> Self {
        RawMetrics::Many(records)
    }
}

/// Error type for stats collection failures.
#[derive(Debug)]
pub enum StatsError {
    /// I/O error reading a stats source.
    Io(std::io::Error),
    /// Malformed stats source content.
    Parse(ParseError),
    /// Configured network interface is not present.
    InterfaceNotFound(String),
    /// Collected stats could not be encoded as JSON.
    Encode(serde_json::Error),
    /// Implementation specific failure.
    Other(String),
}

impl std::fmt::Display for StatsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatsError::Io(e) => write!(f, "I/O error: {}", e),
            StatsError::Parse(e) => write!(f, "{}", e),
            StatsError::InterfaceNotFound(name) => {
                write!(f, "network interface '{}' not found", name)
            }
            StatsError::Encode(e) => write!(f, "failed to encode stats: {}", e),
            StatsError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for StatsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StatsError::Io(e) => Some(e),
            StatsError::Parse(e) => Some(e),
            StatsError::Encode(e) => Some(e),
            StatsError::InterfaceNotFound(_) | StatsError::Other(_) => None,
        }
    }
}

impl From<std::io::Error> for StatsError {
    fn from(e: std::io::Error) -> Self {
        StatsError::Io(e)
    }
}

impl From<ParseError> for StatsError {
    fn from(e: ParseError) -> Self {
        StatsError::Parse(e)
    }
}

impl From<serde_json::Error> for StatsError {
    fn from(e: serde_json::Error) -> Self {
        StatsError::Encode(e)
    }
}

/// Source of host metrics polled by the monitor.
///
/// Calls are blocking. Methods take `&mut self` so implementations can keep
/// the previous sample around for rate calculations.
pub trait StatsProvider {
    /// Returns static host information.
    fn platform_info(&mut self) -> Result<PlatformInfo, StatsError>;

    /// Collects system-wide CPU and memory usage.
    fn collect_system_stats(&mut self) -> Result<RawMetrics, StatsError>;

    /// Collects the `n` heaviest processes by CPU and by memory.
    fn collect_topn_process_stats(&mut self, n: usize) -> Result<RawMetrics, StatsError>;

    /// Collects stats for processes whose name is in `names`.
    /// An empty list selects every process.
    fn collect_process_stats(&mut self, names: &[String]) -> Result<RawMetrics, StatsError>;

    /// Collects network I/O counters.
    fn collect_network_io_stats(&mut self) -> Result<RawMetrics, StatsError>;
}

impl<P: StatsProvider + ?Sized> StatsProvider for Box<P> {
    fn platform_info(&mut self) -> Result<PlatformInfo, StatsError> {
        (**self).platform_info()
    }

    fn collect_system_stats(&mut self) -> Result<RawMetrics, StatsError> {
        (**self).collect_system_stats()
    }

    fn collect_topn_process_stats(&mut self, n: usize) -> Result<RawMetrics, StatsError> {
        (**self).collect_topn_process_stats(n)
    }

    fn collect_process_stats(&mut self, names: &[String]) -> Result<RawMetrics, StatsError> {
        (**self).collect_process_stats(names)
    }

    fn collect_network_io_stats(&mut self) -> Result<RawMetrics, StatsError> {
        (**self).collect_network_io_stats()
    }
}
