//! System collector for host-wide counters from `/proc/` and mounted volumes.

use crate::collector::procfs::parser::{
    CpuStat, DiskStats, MemInfo, MountEntry, NetDevStats, parse_cpu_stat, parse_diskstats,
    parse_meminfo, parse_mounts, parse_net_dev, parse_vmstat,
};
use crate::collector::traits::FileSystem;
use std::collections::HashSet;
use std::path::Path;

const KIB: u64 = 1024;

/// Kernel page size assumed for the swap paging counters.
const PAGE_SIZE: u64 = 4096;

/// Filesystem types that never back a real volume.
const PSEUDO_FILESYSTEMS: &[&str] = &[
    "autofs",
    "binfmt_misc",
    "bpf",
    "cgroup",
    "cgroup2",
    "configfs",
    "debugfs",
    "devpts",
    "devtmpfs",
    "fusectl",
    "hugetlbfs",
    "mqueue",
    "nsfs",
    "overlay",
    "proc",
    "pstore",
    "securityfs",
    "squashfs",
    "sysfs",
    "tmpfs",
    "tracefs",
];

/// Error type for collection failures.
#[derive(Debug)]
pub enum CollectError {
    /// I/O error reading a counter source.
    Io(std::io::Error),
    /// Parse error in a counter source.
    Parse(String),
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Io(e) => write!(f, "I/O error: {}", e),
            CollectError::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectError::Io(e) => Some(e),
            CollectError::Parse(_) => None,
        }
    }
}

impl From<std::io::Error> for CollectError {
    fn from(e: std::io::Error) -> Self {
        CollectError::Io(e)
    }
}

/// Physical memory usage, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    pub total: u64,
    /// Total minus free memory, buffers and page cache.
    pub used: u64,
    pub buffers: u64,
    pub cached: u64,
    /// Memory available for new allocations without swapping.
    pub available: u64,
}

/// Swap usage and cumulative paging, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub swapped_in: u64,
    pub swapped_out: u64,
}

/// Space usage of one volume, in bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    /// Used share of the space available to unprivileged users, rounded to
    /// one decimal.
    pub percent: f64,
}

/// Collects host-wide metrics from `/proc/` and `statvfs`.
#[derive(Debug, Clone)]
pub struct SystemCollector<F: FileSystem> {
    fs: F,
    proc_path: String,
}

impl<F: FileSystem> SystemCollector<F> {
    /// Creates a new system collector.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }

    fn read(&self, name: &str) -> Result<String, CollectError> {
        let path = format!("{}/{}", self.proc_path, name);
        Ok(self.fs.read_to_string(Path::new(&path))?)
    }

    /// Per-CPU jiffy counters from `/proc/stat`, ordered by CPU index.
    pub fn cpu_times(&self) -> Result<Vec<CpuStat>, CollectError> {
        let content = self.read("stat")?;
        parse_cpu_stat(&content).map_err(|e| CollectError::Parse(e.message))
    }

    /// Memory usage from `/proc/meminfo`, in bytes.
    pub fn memory(&self) -> Result<MemoryUsage, CollectError> {
        let mem = self.meminfo()?;
        // Reclaimable slab is page cache for accounting purposes.
        let cached = mem.cached.saturating_add(mem.s_reclaimable);
        let used = mem
            .mem_total
            .saturating_sub(mem.mem_free)
            .saturating_sub(mem.buffers)
            .saturating_sub(cached);

        Ok(MemoryUsage {
            total: mem.mem_total.saturating_mul(KIB),
            used: used.saturating_mul(KIB),
            buffers: mem.buffers.saturating_mul(KIB),
            cached: cached.saturating_mul(KIB),
            available: mem.mem_available.saturating_mul(KIB),
        })
    }

    /// Swap usage from `/proc/meminfo` and paging totals from `/proc/vmstat`,
    /// in bytes.
    pub fn swap(&self) -> Result<SwapUsage, CollectError> {
        let mem = self.meminfo()?;
        let content = self.read("vmstat")?;
        let vm = parse_vmstat(&content).map_err(|e| CollectError::Parse(e.message))?;

        Ok(SwapUsage {
            total: mem.swap_total.saturating_mul(KIB),
            used: mem.swap_total.saturating_sub(mem.swap_free).saturating_mul(KIB),
            free: mem.swap_free.saturating_mul(KIB),
            swapped_in: vm.pswpin.wrapping_mul(PAGE_SIZE),
            swapped_out: vm.pswpout.wrapping_mul(PAGE_SIZE),
        })
    }

    /// Network interface counters from `/proc/net/dev`.
    pub fn net_io(&self) -> Result<Vec<NetDevStats>, CollectError> {
        let content = self.read("net/dev")?;
        parse_net_dev(&content).map_err(|e| CollectError::Parse(e.message))
    }

    /// Block device counters from `/proc/diskstats`.
    pub fn disk_io(&self) -> Result<Vec<DiskStats>, CollectError> {
        let content = self.read("diskstats")?;
        parse_diskstats(&content).map_err(|e| CollectError::Parse(e.message))
    }

    fn meminfo(&self) -> Result<MemInfo, CollectError> {
        let content = self.read("meminfo")?;
        parse_meminfo(&content).map_err(|e| CollectError::Parse(e.message))
    }

    /// Mounted volumes backed by a block device, one entry per mount point.
    pub fn partitions(&self) -> Result<Vec<MountEntry>, CollectError> {
        let content = self.read("mounts")?;
        let mounts = parse_mounts(&content).map_err(|e| CollectError::Parse(e.message))?;

        let mut seen = HashSet::new();
        Ok(mounts
            .into_iter()
            .filter(|m| m.device.starts_with('/'))
            .filter(|m| !PSEUDO_FILESYSTEMS.contains(&m.fstype.as_str()))
            .filter(|m| seen.insert(m.mountpoint.clone()))
            .collect())
    }

    /// Space usage of the volume mounted at `mountpoint`.
    pub fn disk_usage(&self, mountpoint: &str) -> Result<DiskUsage, CollectError> {
        let stat = self.fs.statvfs(Path::new(mountpoint))?;

        let used = stat.total.saturating_sub(stat.free);
        let usable = used.saturating_add(stat.available);
        let percent = if usable > 0 {
            (used as f64 / usable as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };

        Ok(DiskUsage {
            total: stat.total,
            used,
            free: stat.available,
            percent,
        })
    }
}
