//! Host counter sources for Linux.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               SystemCollector                │
//! │  - /proc/stat        - /proc/net/dev         │
//! │  - /proc/meminfo     - /proc/diskstats       │
//! │  - /proc/vmstat      - /proc/mounts          │
//! │  - statvfs(mountpoint)                       │
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
//! ```ignore
//! use cdagent_core::collector::{RealFs, SystemCollector};
//!
//! let collector = SystemCollector::new(RealFs::new(), "/proc");
//! let mem = collector.meminfo()?;
//! ```

pub mod mock;
pub mod procfs;
pub mod traits;

pub use mock::MockFs;
pub use procfs::{CollectError, DiskUsage, MemoryUsage, SwapUsage, SystemCollector};
pub use traits::{FileSystem, FsStat, RealFs};
