//! In-memory mock filesystem for testing collectors without real `/proc`.

use crate::collector::traits::{FileSystem, FsStat};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// In-memory filesystem for testing.
///
/// Stores file contents and per-mount space accounting, allowing tests to
/// simulate `/proc` states (and unreadable volumes) without Linux.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    /// Map from path to file contents.
    files: HashMap<PathBuf, String>,
    /// Space accounting per mount point.
    volumes: HashMap<PathBuf, FsStat>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file with the given content.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        self.files.insert(path.as_ref().to_path_buf(), content.into());
    }

    /// Removes a file, simulating a counter source that disappeared.
    pub fn remove_file(&mut self, path: impl AsRef<Path>) {
        self.files.remove(path.as_ref());
    }

    /// Registers space accounting for a mount point.
    pub fn add_volume(&mut self, mountpoint: impl AsRef<Path>, stat: FsStat) {
        self.volumes.insert(mountpoint.as_ref().to_path_buf(), stat);
    }

    /// Drops space accounting for a mount point so that querying it fails.
    pub fn remove_volume(&mut self, mountpoint: impl AsRef<Path>) {
        self.volumes.remove(mountpoint.as_ref());
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {:?}", path),
            )
        })
    }

    fn statvfs(&self, path: &Path) -> io::Result<FsStat> {
        self.volumes.get(path).copied().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("cannot stat volume: {:?}", path),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_fs_add_file() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/meminfo", "MemTotal: 16384 kB\n");

        let content = fs.read_to_string(Path::new("/proc/meminfo")).unwrap();
        assert_eq!(content, "MemTotal: 16384 kB\n");
    }

    #[test]
    fn test_mock_fs_remove_file() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/stat", "cpu 1 2 3 4\n");
        fs.remove_file("/proc/stat");

        let err = fs.read_to_string(Path::new("/proc/stat")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_mock_fs_volumes() {
        let mut fs = MockFs::new();
        let stat = FsStat {
            total: 1000,
            free: 400,
            available: 300,
        };
        fs.add_volume("/", stat);

        assert_eq!(fs.statvfs(Path::new("/")).unwrap(), stat);
        assert!(fs.statvfs(Path::new("/data")).is_err());
    }
}
