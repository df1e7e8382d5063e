//! In-memory filesystem for exercising `ProcfsStats` without a real `/proc`.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use crate::collector::traits::FileSystem;

/// In-memory filesystem.
///
/// Directory listings come back sorted, which keeps provider output
/// deterministic in tests.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    files: BTreeMap<PathBuf, Vec<u8>>,
    directories: BTreeSet<PathBuf>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file, creating parent directories as needed.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.files.insert(path, content.into());
    }

    /// Adds a directory and all of its ancestors.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        for ancestor in path.as_ref().ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.directories.insert(ancestor.to_path_buf());
        }
    }

    /// Removes a file. Used to simulate a process exiting mid-scan.
    pub fn remove_file(&mut self, path: impl AsRef<Path>) {
        self.files.remove(path.as_ref());
    }

    /// Adds `/proc/[pid]/{stat,comm,cmdline}` for a process.
    ///
    /// `utime`/`stime` are in clock ticks, `vsize` in bytes and `rss` in pages.
    #[allow(clippy::too_many_arguments)]
    pub fn add_process(
        &mut self,
        pid: u32,
        comm: &str,
        cmdline: &[&str],
        utime: u64,
        stime: u64,
        vsize: u64,
        rss: u64,
    ) {
        let base = PathBuf::from(format!("/proc/{}", pid));
        self.add_file(base.join("stat"), stat_line(pid, comm, utime, stime, vsize, rss));
        self.add_file(base.join("comm"), format!("{}\n", comm));

        let mut raw_cmdline = String::new();
        for arg in cmdline {
            raw_cmdline.push_str(arg);
            raw_cmdline.push('\0');
        }
        self.add_file(base.join("cmdline"), raw_cmdline);
    }
}

/// Builds a `/proc/[pid]/stat` line with 44 fields after `comm`.
pub(crate) fn stat_line(
    pid: u32,
    comm: &str,
    utime: u64,
    stime: u64,
    vsize: u64,
    rss: u64,
) -> String {
    format!(
        "{pid} ({comm}) S 1 {pid} {pid} 0 -1 4194304 1000 0 10 0 {utime} {stime} 0 0 20 0 1 0 5000 {vsize} {rss} \
         18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0 0 0 0 0 0 0 0 0"
    )
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        String::from_utf8(self.read(path)?)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {:?}", path),
            )
        })
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.directories.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {:?}", path),
            ));
        }

        let mut entries = BTreeSet::new();
        for child in self.files.keys().chain(self.directories.iter()) {
            if child.parent() == Some(path) {
                entries.insert(child.clone());
            }
        }
        Ok(entries.into_iter().collect())
    }
}

impl MockFs {
    /// A 4-CPU host named `web-01` with a handful of processes.
    ///
    /// Processes: systemd (1), sshd (412), bash (1000), postgres (1001, 1002).
    /// The two postgres backends hold the most resident memory.
    pub fn typical_host() -> Self {
        let mut fs = Self::new();

        fs.add_file("/proc/sys/kernel/hostname", "web-01\n");
        fs.add_file("/proc/sys/kernel/ostype", "Linux\n");
        fs.add_file("/proc/sys/kernel/osrelease", "6.1.0-18-amd64\n");
        fs.add_file(
            "/proc/sys/kernel/version",
            "#1 SMP PREEMPT_DYNAMIC Debian 6.1.76-1 (2024-02-01)\n",
        );

        fs.add_file(
            "/proc/stat",
            "\
cpu  10000 500 3000 80000 1000 200 100 0 0 0
cpu0 2500 125 750 20000 250 50 25 0 0 0
cpu1 2500 125 750 20000 250 50 25 0 0 0
cpu2 2500 125 750 20000 250 50 25 0 0 0
cpu3 2500 125 750 20000 250 50 25 0 0 0
intr 1000000 50 0 0 0 0 0 0 0 1 0 0 0 100 0 0 1000
ctxt 500000
btime 1700000000
processes 10000
procs_running 2
procs_blocked 0
",
        );

        fs.add_file(
            "/proc/meminfo",
            "\
MemTotal:       16384000 kB
MemFree:         8192000 kB
MemAvailable:   12000000 kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapCached:            0 kB
Active:          4096000 kB
Inactive:        2048000 kB
SwapTotal:       4096000 kB
SwapFree:        4096000 kB
Shmem:             65536 kB
Slab:             512000 kB
SReclaimable:     256000 kB
",
        );

        fs.add_file(
            "/proc/net/dev",
            "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 12345678     9876    0    0    0     0          0         0 12345678     9876    0    0    0     0       0          0
  eth0: 987654321   654321    5   10    0     0          0       100 123456789   456789    2    5    0     0       0          0
",
        );

        fs.add_process(1, "systemd", &["/sbin/init"], 1000, 500, 170_000_000, 3000);
        fs.add_process(
            412,
            "sshd",
            &["sshd: /usr/sbin/sshd", "-D"],
            40,
            20,
            15_000_000,
            1500,
        );
        fs.add_process(1000, "bash", &["/bin/bash", "--login"], 100, 50, 25_000_000, 2000);
        fs.add_process(
            1001,
            "postgres",
            &["postgres: checkpointer"],
            3000,
            900,
            400_000_000,
            50_000,
        );
        fs.add_process(
            1002,
            "postgres",
            &["postgres: walwriter"],
            800,
            300,
            400_000_000,
            20_000,
        );

        fs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_fs_read_dir_is_sorted() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/20/stat", "b");
        fs.add_file("/proc/3/stat", "a");
        fs.add_file("/proc/uptime", "1.0 2.0\n");

        let entries = fs.read_dir(Path::new("/proc")).unwrap();
        assert_eq!(
            entries,
            vec![
                PathBuf::from("/proc/20"),
                PathBuf::from("/proc/3"),
                PathBuf::from("/proc/uptime"),
            ]
        );
    }

    #[test]
    fn test_mock_fs_missing_paths() {
        let fs = MockFs::new();
        let err = fs.read_to_string(Path::new("/proc/stat")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(fs.read_dir(Path::new("/proc")).is_err());
    }

    #[test]
    fn test_add_process_writes_nul_separated_cmdline() {
        let mut fs = MockFs::new();
        fs.add_process(7, "nginx", &["nginx", "-g", "daemon off;"], 1, 1, 1, 1);

        let cmdline = fs.read_to_string(Path::new("/proc/7/cmdline")).unwrap();
        assert_eq!(cmdline, "nginx\0-g\0daemon off;\0");
        let comm = fs.read_to_string(Path::new("/proc/7/comm")).unwrap();
        assert_eq!(comm, "nginx\n");
    }

    #[test]
    fn test_read_non_utf8_file() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/9/comm", vec![b'a', 0xff, b'\n']);

        assert_eq!(fs.read(Path::new("/proc/9/comm")).unwrap(), vec![b'a', 0xff, b'\n']);
        let err = fs.read_to_string(Path::new("/proc/9/comm")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_remove_file() {
        let mut fs = MockFs::typical_host();
        fs.remove_file("/proc/1000/stat");
        assert!(fs.read_to_string(Path::new("/proc/1000/stat")).is_err());
        assert!(fs.read_to_string(Path::new("/proc/1000/comm")).is_ok());
    }
}
