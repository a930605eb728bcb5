//! Collectors for the Linux `/proc` filesystem.
//!
//! Parsers are pure functions over file contents; `SystemCollector` wires
//! them to a `FileSystem` so the same code runs against the host or a mock.

pub mod parser;
pub mod system;

pub use parser::{CpuStat, DiskStats, MemInfo, MountEntry, NetDevStats, ParseError, VmstatInfo};
pub use system::{CollectError, DiskUsage, MemoryUsage, SwapUsage, SystemCollector};
