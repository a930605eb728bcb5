//! One sweep over all reporters.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::collector::{FileSystem, SystemCollector};
use crate::report::{
    CpuReporter, DiskIoReporter, DiskUsageReporter, MemoryReporter, NetworkReporter, Reporter,
    SweepContext, SweepError,
};
use crate::transport::Transport;

/// Totals of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub plugins: usize,
    pub groups: usize,
    pub skipped: usize,
    pub datagrams: usize,
    pub bytes: usize,
    pub elapsed: Duration,
}

/// Work the scheduler runs once per interval.
pub trait Sweep: Send {
    /// Runs one sweep stamped with `time` (unix seconds).
    fn sweep(&mut self, time: i64) -> Result<SweepStats, SweepError>;
}

/// Runs its reporters in order and sends their datagrams to one transport.
pub struct Agent {
    host: String,
    interval: i64,
    reporters: Vec<Box<dyn Reporter>>,
    transport: Arc<dyn Transport>,
}

impl Agent {
    /// Creates an agent without reporters.
    pub fn new(host: impl Into<String>, interval: i64, transport: Arc<dyn Transport>) -> Self {
        Self {
            host: host.into(),
            interval,
            reporters: Vec::new(),
            transport,
        }
    }

    /// Creates an agent with the standard reporters reading `proc_path`:
    /// cpu, interface, df, memory and disk, in that order.
    pub fn standard<F>(
        fs: F,
        proc_path: &str,
        host: impl Into<String>,
        interval: i64,
        transport: Arc<dyn Transport>,
    ) -> Self
    where
        F: FileSystem + Clone + 'static,
    {
        let collector = SystemCollector::new(fs, proc_path);
        Self::new(host, interval, transport)
            .with_reporter(CpuReporter::new(collector.clone()))
            .with_reporter(NetworkReporter::new(collector.clone()))
            .with_reporter(DiskUsageReporter::new(collector.clone()))
            .with_reporter(MemoryReporter::new(collector.clone()))
            .with_reporter(DiskIoReporter::new(collector))
    }

    /// Appends a reporter; reporters run in insertion order.
    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Plugin names in sweep order.
    pub fn plugins(&self) -> Vec<&'static str> {
        self.reporters.iter().map(|r| r.plugin()).collect()
    }
}

impl Sweep for Agent {
    fn sweep(&mut self, time: i64) -> Result<SweepStats, SweepError> {
        let started = Instant::now();
        let ctx = SweepContext::new(self.host.clone(), time, self.interval);
        let mut stats = SweepStats::default();

        for reporter in &mut self.reporters {
            let summary = reporter.report(&ctx, self.transport.as_ref())?;
            debug!(
                plugin = reporter.plugin(),
                groups = summary.groups,
                skipped = summary.skipped,
                datagrams = summary.datagrams,
                bytes = summary.bytes,
                "plugin reported"
            );
            stats.plugins += 1;
            stats.groups += summary.groups;
            stats.skipped += summary.skipped;
            stats.datagrams += summary.datagrams;
            stats.bytes += summary.bytes;
        }

        stats.elapsed = started.elapsed();
        info!(
            "Sweep at {}: {} groups in {} datagrams ({} bytes), {} skipped, took {:?}",
            time, stats.groups, stats.datagrams, stats.bytes, stats.skipped, stats.elapsed
        );
        Ok(stats)
    }
}
