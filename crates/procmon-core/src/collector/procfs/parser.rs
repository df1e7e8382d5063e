//! Parsers for `/proc` filesystem files.
//!
//! Pure functions over file contents, so they can be tested with plain strings.

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Fields of `/proc/[pid]/stat` used for per-process usage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PidStat {
    pub pid: u32,
    pub comm: String,
    pub state: char,
    /// User mode time in clock ticks.
    pub utime: u64,
    /// Kernel mode time in clock ticks.
    pub stime: u64,
    /// Virtual memory size in bytes.
    pub vsize: u64,
    /// Resident set size in pages.
    pub rss: u64,
}

/// Parses `/proc/[pid]/stat` content.
///
/// `comm` may contain spaces and parentheses, so it is delimited by the first
/// `(` and the last `)`.
pub fn parse_pid_stat(content: &str) -> Result<PidStat, ParseError> {
    let content = content.trim();

    let open_paren = content
        .find('(')
        .ok_or_else(|| ParseError::new("missing '(' in stat"))?;
    let close_paren = content
        .rfind(')')
        .ok_or_else(|| ParseError::new("missing ')' in stat"))?;
    if close_paren <= open_paren {
        return Err(ParseError::new("invalid parentheses in stat"));
    }

    let pid: u32 = content[..open_paren]
        .trim()
        .parse()
        .map_err(|_| ParseError::new("invalid pid"))?;
    let comm = content[open_paren + 1..close_paren].to_string();

    let fields: Vec<&str> = content[close_paren + 1..].split_whitespace().collect();
    if fields.len() < 22 {
        return Err(ParseError::new(format!(
            "not enough fields in stat: expected 22+, got {}",
            fields.len()
        )));
    }

    let field = |idx: usize, name: &str| -> Result<u64, ParseError> {
        fields[idx]
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {}", name)))
    };

    // rss is signed in the kernel ABI
    let rss: i64 = fields[21]
        .parse()
        .map_err(|_| ParseError::new("invalid rss"))?;

    Ok(PidStat {
        pid,
        comm,
        state: fields[0].chars().next().unwrap_or('?'),
        utime: field(11, "utime")?,
        stime: field(12, "stime")?,
        vsize: field(20, "vsize")?,
        rss: rss.max(0) as u64,
    })
}

/// Joins a NUL separated `/proc/[pid]/cmdline` into a space separated string.
pub fn parse_cmdline(content: &str) -> String {
    content
        .split('\0')
        .filter(|arg| !arg.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Longest `comm` the kernel keeps; longer names are truncated to this.
pub const COMM_MAX_LEN: usize = 15;

/// Restores a process name truncated in `comm`.
///
/// When `comm` is at the kernel limit and the basename of `argv[0]` extends
/// it, the basename is the full name. Otherwise `comm` is returned.
pub fn process_name(comm: &str, raw_cmdline: &str) -> String {
    if comm.len() >= COMM_MAX_LEN
        && let Some(argv0) = raw_cmdline.split('\0').next()
        && let Some(base) = argv0.rsplit('/').next()
        && base.len() > comm.len()
        && base.starts_with(comm)
    {
        return base.to_string();
    }
    comm.to_string()
}

/// Parsed data from `/proc/meminfo`, in kB.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemInfo {
    pub mem_total: u64,
    pub mem_free: u64,
    pub mem_available: u64,
    pub buffers: u64,
    pub cached: u64,
    pub active: u64,
    pub inactive: u64,
    pub shmem: u64,
    pub slab: u64,
}

/// Parses `/proc/meminfo` content. `MemTotal` is required.
pub fn parse_meminfo(content: &str) -> Result<MemInfo, ParseError> {
    let mut info = MemInfo::default();
    let mut has_total = false;

    for line in content.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let value = rest
            .split_whitespace()
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        match key.trim() {
            "MemTotal" => {
                info.mem_total = value;
                has_total = true;
            }
            "MemFree" => info.mem_free = value,
            "MemAvailable" => info.mem_available = value,
            "Buffers" => info.buffers = value,
            "Cached" => info.cached = value,
            "Active" => info.active = value,
            "Inactive" => info.inactive = value,
            "Shmem" => info.shmem = value,
            "Slab" => info.slab = value,
            _ => {}
        }
    }

    if !has_total {
        return Err(ParseError::new("missing MemTotal in meminfo"));
    }
    Ok(info)
}

/// One `cpu` line of `/proc/stat`, in clock ticks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuTimes {
    /// `None` for the aggregate `cpu` line.
    pub cpu_id: Option<u32>,
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    /// All ticks. Guest time is already accounted in `user`/`nice`.
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    pub fn idle_total(&self) -> u64 {
        self.idle + self.iowait
    }
}

/// Parsed data from `/proc/stat`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalStat {
    pub cpus: Vec<CpuTimes>,
    /// Boot time, seconds since epoch.
    pub btime: u64,
}

impl GlobalStat {
    /// The aggregate `cpu` line, if present.
    pub fn aggregate(&self) -> Option<&CpuTimes> {
        self.cpus.iter().find(|c| c.cpu_id.is_none())
    }

    /// Number of per-CPU lines.
    pub fn cpu_count(&self) -> usize {
        self.cpus.iter().filter(|c| c.cpu_id.is_some()).count()
    }
}

/// Parses `/proc/stat` content. The aggregate `cpu` line is required.
pub fn parse_global_stat(content: &str) -> Result<GlobalStat, ParseError> {
    let mut stat = GlobalStat::default();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(&key) = parts.first() else {
            continue;
        };

        if let Some(suffix) = key.strip_prefix("cpu") {
            let cpu_id = if suffix.is_empty() {
                None
            } else {
                Some(
                    suffix
                        .parse()
                        .map_err(|_| ParseError::new(format!("invalid cpu line '{}'", key)))?,
                )
            };
            let get_val =
                |idx: usize| -> u64 { parts.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

            stat.cpus.push(CpuTimes {
                cpu_id,
                user: get_val(1),
                nice: get_val(2),
                system: get_val(3),
                idle: get_val(4),
                iowait: get_val(5),
                irq: get_val(6),
                softirq: get_val(7),
                steal: get_val(8),
            });
        } else if key == "btime" {
            stat.btime = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);
        }
    }

    if stat.aggregate().is_none() {
        return Err(ParseError::new("missing aggregate cpu line in stat"));
    }
    Ok(stat)
}

/// Per-interface counters from `/proc/net/dev`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetDevStats {
    pub interface: String,
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub rx_errs: u64,
    pub rx_drop: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errs: u64,
    pub tx_drop: u64,
}

/// Parses `/proc/net/dev` content.
///
/// Format:
/// Inter-|   Receive                                                |  Transmit
///  face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
///    lo: 1234567     1234    0    0    0     0          0         0  1234567     1234    0    0    0     0       0          0
pub fn parse_net_dev(content: &str) -> Result<Vec<NetDevStats>, ParseError> {
    let mut devices = Vec::new();

    for line in content.lines() {
        if line.contains('|') || line.trim().is_empty() {
            continue;
        }

        let Some((interface, counters)) = line.split_once(':') else {
            return Err(ParseError::new(format!("invalid net/dev line '{}'", line.trim())));
        };
        let values: Vec<&str> = counters.split_whitespace().collect();
        if values.len() < 16 {
            return Err(ParseError::new(format!(
                "not enough fields for interface '{}': expected 16, got {}",
                interface.trim(),
                values.len()
            )));
        }

        let get_val =
            |idx: usize| -> u64 { values.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

        devices.push(NetDevStats {
            interface: interface.trim().to_string(),
            rx_bytes: get_val(0),
            rx_packets: get_val(1),
            rx_errs: get_val(2),
            rx_drop: get_val(3),
            tx_bytes: get_val(8),
            tx_packets: get_val(9),
            tx_errs: get_val(10),
            tx_drop: get_val(11),
        });
    }

    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pid_stat_basic() {
        let content = "1234 (bash) S 1233 1234 1234 34816 1235 4194304 5000 50000 10 20 100 50 200 100 20 0 1 0 100000 25000000 2000 18446744073709551615 0 0 0 0 0 0 65536 3670020 1266777851 0 0 0 17 2 0 0 5 0 0 0 0 0 0 0 0 0 0";
        let stat = parse_pid_stat(content).unwrap();

        assert_eq!(stat.pid, 1234);
        assert_eq!(stat.comm, "bash");
        assert_eq!(stat.state, 'S');
        assert_eq!(stat.utime, 100);
        assert_eq!(stat.stime, 50);
        assert_eq!(stat.vsize, 25000000);
        assert_eq!(stat.rss, 2000);
    }

    #[test]
    fn test_parse_pid_stat_comm_with_spaces_and_parens() {
        let content = "5001 (Web (Content)) S 1 5001 5001 0 -1 4194304 1000 0 0 0 10 5 0 0 20 0 1 0 500100 10000000 1000 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0 0 0 0 0 0 0 0 0";
        let stat = parse_pid_stat(content).unwrap();

        assert_eq!(stat.pid, 5001);
        assert_eq!(stat.comm, "Web (Content)");
        assert_eq!(stat.utime, 10);
        assert_eq!(stat.rss, 1000);
    }

    #[test]
    fn test_parse_pid_stat_truncated() {
        let err = parse_pid_stat("42 (sleep) S 1 42").unwrap_err();
        assert!(err.message.contains("not enough fields"));

        assert!(parse_pid_stat("no parens here").is_err());
    }

    #[test]
    fn test_parse_cmdline() {
        assert_eq!(parse_cmdline("/bin/bash\0--login\0"), "/bin/bash --login");
        assert_eq!(parse_cmdline(""), "");
    }

    #[test]
    fn test_process_name_restores_truncated_comm() {
        assert_eq!(
            process_name("systemd-journal", "/lib/systemd/systemd-journald\0"),
            "systemd-journald"
        );
        // argv[0] rewritten by the process: keep comm.
        assert_eq!(
            process_name("postgres-worker", "postgres: checkpointer\0"),
            "postgres-worker"
        );
        // Short names are never truncated.
        assert_eq!(process_name("bash", "/bin/bash-static\0"), "bash");
        assert_eq!(process_name("kworker/0:1H-kb", ""), "kworker/0:1H-kb");
    }

    #[test]
    fn test_parse_meminfo() {
        let content = "\
MemTotal:       16384000 kB
MemFree:         8192000 kB
MemAvailable:   12000000 kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapCached:            0 kB
Shmem:             65536 kB
Slab:             512000 kB
";
        let info = parse_meminfo(content).unwrap();

        assert_eq!(info.mem_total, 16384000);
        assert_eq!(info.mem_free, 8192000);
        assert_eq!(info.mem_available, 12000000);
        assert_eq!(info.buffers, 512000);
        // SwapCached must not shadow Cached
        assert_eq!(info.cached, 2048000);
        assert_eq!(info.shmem, 65536);
        assert_eq!(info.slab, 512000);
    }

    #[test]
    fn test_parse_meminfo_requires_total() {
        assert!(parse_meminfo("MemFree: 10 kB\n").is_err());
    }

    #[test]
    fn test_parse_global_stat() {
        let content = "\
cpu  10000 500 3000 80000 1000 200 100 0 0 0
cpu0 5000 250 1500 40000 500 100 50 0 0 0
cpu1 5000 250 1500 40000 500 100 50 0 0 0
ctxt 500000
btime 1700000000
";
        let stat = parse_global_stat(content).unwrap();

        assert_eq!(stat.cpus.len(), 3);
        assert_eq!(stat.cpu_count(), 2);
        assert_eq!(stat.btime, 1700000000);

        let total = stat.aggregate().unwrap();
        assert_eq!(total.total(), 94800);
        assert_eq!(total.idle_total(), 81000);
        assert_eq!(stat.cpus[2].cpu_id, Some(1));
    }

    #[test]
    fn test_parse_global_stat_requires_aggregate() {
        assert!(parse_global_stat("btime 1\n").is_err());
    }

    #[test]
    fn test_parse_net_dev() {
        let content = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 1234567     1234    0    0    0     0          0         0  1234567     1234    0    0    0     0       0          0
  eth0: 9876543     5678    1    2    0     0          0        10 87654321     4321    3    4    0     0       0          0
";
        let devices = parse_net_dev(content).unwrap();

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].interface, "lo");
        assert_eq!(devices[0].rx_bytes, 1234567);

        assert_eq!(devices[1].interface, "eth0");
        assert_eq!(devices[1].rx_bytes, 9876543);
        assert_eq!(devices[1].rx_packets, 5678);
        assert_eq!(devices[1].rx_errs, 1);
        assert_eq!(devices[1].rx_drop, 2);
        assert_eq!(devices[1].tx_bytes, 87654321);
        assert_eq!(devices[1].tx_packets, 4321);
        assert_eq!(devices[1].tx_errs, 3);
        assert_eq!(devices[1].tx_drop, 4);
    }

    #[test]
    fn test_parse_net_dev_short_line() {
        let err = parse_net_dev("  eth0: 1 2 3\n").unwrap_err();
        assert!(err.message.contains("eth0"));
    }
}
