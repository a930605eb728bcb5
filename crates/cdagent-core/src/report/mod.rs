//! Reporters: one per collectd plugin.
//!
//! A reporter reads its counters through a [`SystemCollector`], shapes them
//! into metric groups and pushes them through a [`BatchAssembler`] seeded
//! with its plugin header. Failures come in two tiers: a per-group
//! collection failure is logged and the group skipped, anything else is
//! returned as a [`SweepError`] and stops the sweep.
//!
//! [`SystemCollector`]: crate::collector::SystemCollector
//! [`BatchAssembler`]: crate::protocol::BatchAssembler

pub mod cpu;
pub mod disk_io;
pub mod disk_usage;
pub mod memory;
pub mod network;

pub use cpu::{CpuPercent, CpuReporter, cpu_percent};
pub use disk_io::DiskIoReporter;
pub use disk_usage::DiskUsageReporter;
pub use memory::MemoryReporter;
pub use network::NetworkReporter;

use crate::collector::CollectError;
use crate::protocol::{BatchStats, EncodeError, Header, build_header};
use crate::transport::Transport;

/// Values shared by every header of one sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepContext {
    pub host: String,
    /// Sweep start, unix seconds.
    pub time: i64,
    /// Nominal interval, seconds.
    pub interval: i64,
}

impl SweepContext {
    pub fn new(host: impl Into<String>, time: i64, interval: i64) -> Self {
        Self {
            host: host.into(),
            time,
            interval,
        }
    }

    /// Builds the header for `plugin` in this sweep.
    pub fn header(&self, plugin: &str) -> Result<Header, EncodeError> {
        build_header(plugin, &self.host, self.time, self.interval)
    }
}

/// What one reporter produced in one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub groups: usize,
    /// Groups dropped after a collection failure.
    pub skipped: usize,
    pub datagrams: usize,
    pub bytes: usize,
}

impl ReportSummary {
    pub(crate) fn new(stats: BatchStats, skipped: usize) -> Self {
        Self {
            groups: stats.groups,
            skipped,
            datagrams: stats.datagrams,
            bytes: stats.bytes,
        }
    }
}

/// Error that ends a sweep.
#[derive(Debug)]
pub enum SweepError {
    /// A part could not be encoded.
    Encode {
        plugin: &'static str,
        source: EncodeError,
    },
    /// A counter source the whole plugin depends on failed.
    Collect {
        plugin: &'static str,
        source: CollectError,
    },
}

impl SweepError {
    pub(crate) fn encode(plugin: &'static str) -> impl FnOnce(EncodeError) -> SweepError {
        move |source| SweepError::Encode { plugin, source }
    }

    pub(crate) fn collect(plugin: &'static str) -> impl FnOnce(CollectError) -> SweepError {
        move |source| SweepError::Collect { plugin, source }
    }

    /// Plugin whose reporter failed.
    pub fn plugin(&self) -> &'static str {
        match self {
            SweepError::Encode { plugin, .. } | SweepError::Collect { plugin, .. } => plugin,
        }
    }
}

impl std::fmt::Display for SweepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SweepError::Encode { plugin, source } => {
                write!(f, "{}: encoding failed: {}", plugin, source)
            }
            SweepError::Collect { plugin, source } => {
                write!(f, "{}: collection failed: {}", plugin, source)
            }
        }
    }
}

impl std::error::Error for SweepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SweepError::Encode { source, .. } => Some(source),
            SweepError::Collect { source, .. } => Some(source),
        }
    }
}

/// Produces the datagrams of one collectd plugin.
pub trait Reporter: Send {
    /// Plugin name written into the header.
    fn plugin(&self) -> &'static str;

    /// Samples the counters and sends them through `transport`.
    fn report(
        &mut self,
        ctx: &SweepContext,
        transport: &dyn Transport,
    ) -> Result<ReportSummary, SweepError>;
}
