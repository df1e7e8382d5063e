//! procmon-core - host metrics collection and forwarding.
//!
//! Provides:
//! - `stats` - the stats provider contract and raw metric types
//! - `collector` - `/proc` based stats provider (real and mock filesystems)
//! - `normalize` - conversion of raw metrics into sink events
//! - `sink` - event sinks (Splunk HEC, JSON lines)
//! - `config` - metric category configuration
//! - `monitor` - the poll/flush loop with stop and restart handling

pub mod collector;
pub mod config;
pub mod monitor;
pub mod normalize;
pub mod sink;
pub mod stats;

/// Crate version, shared with the daemon's `--version` output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
