//! Filesystem access seam for the procfs provider.
//!
//! Production code reads the real `/proc`; tests plug in `MockFs`.

use std::io;
use std::path::{Path, PathBuf};

/// Read-only filesystem operations needed by `ProcfsStats`.
pub trait FileSystem: Send + Sync {
    /// Reads a whole file as UTF-8.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Reads a whole file as raw bytes.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Lists entries of a directory as full paths.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// `std::fs` backed filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(path)? {
            paths.push(entry?.path());
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_fs_reads_files_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("42")).unwrap();
        std::fs::write(dir.path().join("42").join("comm"), "bash\n").unwrap();

        let fs = RealFs::new();
        let content = fs
            .read_to_string(&dir.path().join("42").join("comm"))
            .unwrap();
        assert_eq!(content, "bash\n");
        assert_eq!(
            fs.read(&dir.path().join("42").join("comm")).unwrap(),
            b"bash\n"
        );

        let entries = fs.read_dir(dir.path()).unwrap();
        assert_eq!(entries, vec![dir.path().join("42")]);
    }

    #[test]
    fn test_real_fs_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RealFs::new()
            .read_to_string(&dir.path().join("missing"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
