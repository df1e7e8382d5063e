//! `/proc` based stats provider.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  ProcfsStats                 │
//! │  - /proc/stat, /proc/meminfo  (system)       │
//! │  - /proc/[pid]/{stat,comm,cmdline} (procs)   │
//! │  - /proc/net/dev              (network)      │
//! │  - /proc/sys/kernel/*         (platform)     │
//! └──────────────────────┬───────────────────────┘
//!                        │
//!                 ┌──────▼──────┐
//!                 │  FileSystem │ (trait)
//!                 └──────┬──────┘
//!              ┌─────────┴─────────┐
//!       ┌──────▼──────┐     ┌──────▼──────┐
//!       │   RealFs    │     │   MockFs    │
//!       │  (Linux)    │     │  (Testing)  │
//!       └─────────────┘     └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use procmon_core::collector::{MockFs, ProcfsStats};
//! use procmon_core::stats::StatsProvider;
//!
//! let mut stats = ProcfsStats::new(MockFs::typical_host(), "/proc");
//! let info = stats.platform_info().unwrap();
//! assert_eq!(info.hostname, "web-01");
//! ```

pub mod mock;
pub mod procfs;
pub mod traits;

pub use mock::MockFs;
pub use procfs::ProcfsStats;
pub use traits::{FileSystem, RealFs};
