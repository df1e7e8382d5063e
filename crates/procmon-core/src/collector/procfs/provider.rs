//! `StatsProvider` implementation reading `/proc`.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::DateTime;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::collector::procfs::parser::{
    COMM_MAX_LEN, CpuTimes, GlobalStat, MemInfo, NetDevStats, PidStat, parse_cmdline,
    parse_global_stat, parse_meminfo, parse_net_dev, parse_pid_stat, process_name,
};
use crate::collector::traits::FileSystem;
use crate::stats::{PlatformInfo, RawMetrics, StatsError, StatsProvider};

/// Page size used to convert rss pages to bytes.
const PAGE_SIZE: u64 = 4096;

/// Per-process usage record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessSample {
    pub name: String,
    pub pid: u32,
    /// CPU usage since the previous sample; can exceed 100 on multi-core hosts.
    pub cpu_percent: f64,
    /// Resident memory as a share of physical memory.
    pub memory_percent: f64,
    pub memory_info_rss: u64,
    pub memory_info_vms: u64,
    pub cmd: String,
}

/// Network I/O counters for one interface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetIoCounters {
    pub interface: String,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub errin: u64,
    pub errout: u64,
    pub dropin: u64,
    pub dropout: u64,
}

impl From<NetDevStats> for NetIoCounters {
    fn from(dev: NetDevStats) -> Self {
        Self {
            interface: dev.interface,
            bytes_sent: dev.tx_bytes,
            bytes_recv: dev.rx_bytes,
            packets_sent: dev.tx_packets,
            packets_recv: dev.rx_packets,
            errin: dev.rx_errs,
            errout: dev.tx_errs,
            dropin: dev.rx_drop,
            dropout: dev.tx_drop,
        }
    }
}

#[derive(Serialize)]
struct TopProcesses<'a> {
    topn_cpu_processes: Vec<&'a ProcessSample>,
    topn_memory_processes: Vec<&'a ProcessSample>,
}

/// Raw inputs of one process scan, before CPU deltas are applied.
struct ProcessScan {
    /// Aggregate CPU ticks across all CPUs at scan time.
    total_ticks: u64,
    cpu_count: usize,
    mem_total_bytes: u64,
    processes: Vec<(PidStat, String)>,
}

/// Previous-sample state for per-process CPU percentages.
#[derive(Debug, Default)]
struct CpuSampler {
    prev_total: Option<u64>,
    prev_ticks: HashMap<u32, u64>,
}

impl CpuSampler {
    fn sample(&mut self, scan: ProcessScan) -> Vec<ProcessSample> {
        // Wall time elapsed since the previous scan, in per-CPU ticks.
        let wall_ticks = self.prev_total.map(|prev| {
            scan.total_ticks.saturating_sub(prev) as f64 / scan.cpu_count.max(1) as f64
        });

        let mut ticks = HashMap::with_capacity(scan.processes.len());
        let mut samples = Vec::with_capacity(scan.processes.len());

        for (stat, cmd) in scan.processes {
            let used = stat.utime + stat.stime;
            let cpu_percent = match (wall_ticks, self.prev_ticks.get(&stat.pid)) {
                (Some(wall), Some(&prev)) => process_cpu_percent(used.saturating_sub(prev), wall),
                _ => 0.0,
            };
            ticks.insert(stat.pid, used);

            let rss = stat.rss * PAGE_SIZE;
            samples.push(ProcessSample {
                name: stat.comm,
                pid: stat.pid,
                cpu_percent,
                memory_percent: percent(rss, scan.mem_total_bytes),
                memory_info_rss: rss,
                memory_info_vms: stat.vsize,
                cmd,
            });
        }

        self.prev_total = Some(scan.total_ticks);
        self.prev_ticks = ticks;
        samples
    }
}

/// Stats provider reading the `/proc` filesystem.
///
/// Keeps the previous CPU samples so percentages cover the time between two
/// polls rather than blocking inside a collection call.
pub struct ProcfsStats<F: FileSystem> {
    fs: F,
    proc_path: PathBuf,
    network_interface: Option<String>,
    prev_cpus: Option<Vec<CpuTimes>>,
    // Top-N and named scans run back to back in one cycle. Separate samplers
    // keep each delta spanning a whole poll interval.
    topn_sampler: CpuSampler,
    named_sampler: CpuSampler,
}

impl<F: FileSystem> ProcfsStats<F> {
    /// Creates a provider.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    pub fn new(fs: F, proc_path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            network_interface: None,
            prev_cpus: None,
            topn_sampler: CpuSampler::default(),
            named_sampler: CpuSampler::default(),
        }
    }

    /// Restricts network stats to a single interface.
    ///
    /// Collection then returns one record and fails if the interface is missing.
    pub fn with_network_interface(mut self, interface: impl Into<String>) -> Self {
        self.network_interface = Some(interface.into());
        self
    }

    fn read(&self, relative: &str) -> Result<String, StatsError> {
        Ok(self.fs.read_to_string(&self.proc_path.join(relative))?)
    }

    fn read_stat(&self) -> Result<GlobalStat, StatsError> {
        Ok(parse_global_stat(&self.read("stat")?)?)
    }

    fn read_meminfo(&self) -> Result<MemInfo, StatsError> {
        Ok(parse_meminfo(&self.read("meminfo")?)?)
    }

    fn read_net_dev(&self) -> Result<Vec<NetDevStats>, StatsError> {
        Ok(parse_net_dev(&self.read("net/dev")?)?)
    }

    fn list_pids(&self) -> Result<Vec<u32>, StatsError> {
        let mut pids: Vec<u32> = self
            .fs
            .read_dir(&self.proc_path)?
            .iter()
            .filter_map(|path| path.file_name()?.to_str()?.parse().ok())
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }

    /// Reads a per-process file, replacing invalid UTF-8 (`comm` is arbitrary bytes).
    fn read_lossy(&self, relative: &str) -> Result<String, StatsError> {
        let bytes = self.fs.read(&self.proc_path.join(relative))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads one process, returning `None` when its name is not selected.
    fn read_process(
        &self,
        pid: u32,
        names: &[String],
    ) -> Result<Option<(PidStat, String)>, StatsError> {
        let mut stat = parse_pid_stat(&self.read_lossy(&format!("{}/stat", pid))?)?;
        let read_cmdline = || {
            self.read_lossy(&format!("{}/cmdline", pid))
                .unwrap_or_default()
        };

        let mut raw_cmdline = None;
        if stat.comm.len() >= COMM_MAX_LEN {
            let raw = read_cmdline();
            stat.comm = process_name(&stat.comm, &raw);
            raw_cmdline = Some(raw);
        }
        if !names.is_empty() && !names.contains(&stat.comm) {
            return Ok(None);
        }

        let cmd = parse_cmdline(&raw_cmdline.unwrap_or_else(read_cmdline));
        Ok(Some((stat, cmd)))
    }

    fn scan_processes(&self, names: &[String]) -> Result<ProcessScan, StatsError> {
        let stat = self.read_stat()?;
        let meminfo = self.read_meminfo()?;

        let mut processes = Vec::new();
        for pid in self.list_pids()? {
            match self.read_process(pid, names) {
                Ok(Some(process)) => processes.push(process),
                Ok(None) => {}
                // Processes exit between listing and reading; skip them.
                Err(e) => warn!("Skipping process {}: {}", pid, e),
            }
        }

        Ok(ProcessScan {
            total_ticks: stat.aggregate().map(CpuTimes::total).unwrap_or(0),
            cpu_count: stat.cpu_count(),
            mem_total_bytes: meminfo.mem_total * 1024,
            processes,
        })
    }
}

impl<F: FileSystem> StatsProvider for ProcfsStats<F> {
    fn platform_info(&mut self) -> Result<PlatformInfo, StatsError> {
        let hostname = self.read("sys/kernel/hostname")?.trim().to_string();
        let kernel = |name: &str| {
            self.read(&format!("sys/kernel/{}", name))
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|_| "unknown".to_string())
        };
        let platform = format!(
            "system={} node={} release={} version={} machine={}",
            kernel("ostype"),
            hostname,
            kernel("osrelease"),
            kernel("version"),
            std::env::consts::ARCH
        );

        let stat = self.read_stat()?;
        let meminfo = self.read_meminfo()?;
        let network_interfaces = self
            .read_net_dev()?
            .into_iter()
            .map(|dev| dev.interface)
            .collect();

        let boot_time = DateTime::from_timestamp(stat.btime as i64, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();

        Ok(PlatformInfo {
            hostname,
            platform,
            cpu_count: stat.cpu_count(),
            mem_total: meminfo.mem_total * 1024,
            boot_time,
            network_interfaces,
        })
    }

    fn collect_system_stats(&mut self) -> Result<RawMetrics, StatsError> {
        let stat = self.read_stat()?;
        let mem = self.read_meminfo()?;

        let mut record = Map::new();

        let prev = self.prev_cpus.take();
        for cpu in &stat.cpus {
            let before = prev
                .as_ref()
                .and_then(|p| p.iter().find(|c| c.cpu_id == cpu.cpu_id));
            let usage = cpu_usage_percent(before, cpu);
            let key = match cpu.cpu_id {
                None => "cpu_usage".to_string(),
                Some(id) => format!("cpu_percent_{}", id),
            };
            record.insert(key, Value::from(usage));
        }
        self.prev_cpus = Some(stat.cpus);

        let total = mem.mem_total * 1024;
        let available = mem.mem_available * 1024;
        let free = mem.mem_free * 1024;
        let buffers = mem.buffers * 1024;
        let cached = mem.cached * 1024;
        let used = total
            .saturating_sub(free)
            .saturating_sub(buffers)
            .saturating_sub(cached);

        record.insert("total".to_string(), Value::from(total));
        record.insert("available".to_string(), Value::from(available));
        record.insert(
            "percent".to_string(),
            Value::from(round1(percent(total.saturating_sub(available), total))),
        );
        record.insert("used".to_string(), Value::from(used));
        record.insert("free".to_string(), Value::from(free));
        record.insert("active".to_string(), Value::from(mem.active * 1024));
        record.insert("inactive".to_string(), Value::from(mem.inactive * 1024));
        record.insert("buffers".to_string(), Value::from(buffers));
        record.insert("cached".to_string(), Value::from(cached));
        record.insert("shared".to_string(), Value::from(mem.shmem * 1024));
        record.insert("slab".to_string(), Value::from(mem.slab * 1024));

        Ok(RawMetrics::One(Value::Object(record)))
    }

    fn collect_topn_process_stats(&mut self, n: usize) -> Result<RawMetrics, StatsError> {
        let scan = self.scan_processes(&[])?;
        let samples = self.topn_sampler.sample(scan);

        // Stable sorts: ties keep pid order.
        let mut by_cpu: Vec<&ProcessSample> = samples.iter().collect();
        by_cpu.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent));
        by_cpu.truncate(n);

        let mut by_memory: Vec<&ProcessSample> = samples.iter().collect();
        by_memory.sort_by(|a, b| b.memory_percent.total_cmp(&a.memory_percent));
        by_memory.truncate(n);

        debug!("Top {} of {} processes selected", n, samples.len());

        let top = TopProcesses {
            topn_cpu_processes: by_cpu,
            topn_memory_processes: by_memory,
        };
        Ok(RawMetrics::One(serde_json::to_value(top)?))
    }

    fn collect_process_stats(&mut self, names: &[String]) -> Result<RawMetrics, StatsError> {
        let scan = self.scan_processes(names)?;
        let samples = self.named_sampler.sample(scan);
        debug!("Collected {} matching processes", samples.len());

        let records = samples
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RawMetrics::Many(records))
    }

    fn collect_network_io_stats(&mut self) -> Result<RawMetrics, StatsError> {
        let devices = self.read_net_dev()?;

        match &self.network_interface {
            Some(name) => {
                let dev = devices
                    .into_iter()
                    .find(|dev| &dev.interface == name)
                    .ok_or_else(|| StatsError::InterfaceNotFound(name.clone()))?;
                Ok(RawMetrics::One(serde_json::to_value(NetIoCounters::from(
                    dev,
                ))?))
            }
            None => {
                let records = devices
                    .into_iter()
                    .map(|dev| serde_json::to_value(NetIoCounters::from(dev)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(RawMetrics::Many(records))
            }
        }
    }
}

/// Busy share of CPU time between two samples, or since boot without `prev`.
fn cpu_usage_percent(prev: Option<&CpuTimes>, now: &CpuTimes) -> f64 {
    let (total, idle) = match prev {
        Some(p) => (
            now.total().saturating_sub(p.total()),
            now.idle_total().saturating_sub(p.idle_total()),
        ),
        None => (now.total(), now.idle_total()),
    };
    if total == 0 {
        return 0.0;
    }
    round1(total.saturating_sub(idle) as f64 / total as f64 * 100.0)
}

fn process_cpu_percent(used_ticks: u64, wall_ticks: f64) -> f64 {
    if wall_ticks <= 0.0 {
        return 0.0;
    }
    round1(used_ticks as f64 / wall_ticks * 100.0)
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
