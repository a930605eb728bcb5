//! `df` plugin: used space per mounted volume.

use tracing::error;

use super::{ReportSummary, Reporter, SweepContext, SweepError};
use crate::collector::{FileSystem, SystemCollector};
use crate::protocol::{BatchAssembler, MetricGroup, Value};
use crate::transport::Transport;

const PLUGIN: &str = "df";

/// Plugin instance for a mount point: the path without its leading slash,
/// `root` for `/`.
pub fn volume_name(mountpoint: &str) -> &str {
    match mountpoint.strip_prefix('/').unwrap_or(mountpoint) {
        "" => "root",
        name => name,
    }
}

/// Reports the used percentage of every block-backed volume. A volume that
/// cannot be queried is logged and skipped.
pub struct DiskUsageReporter<F: FileSystem> {
    collector: SystemCollector<F>,
}

impl<F: FileSystem> DiskUsageReporter<F> {
    pub fn new(collector: SystemCollector<F>) -> Self {
        Self { collector }
    }
}

impl<F: FileSystem> Reporter for DiskUsageReporter<F> {
    fn plugin(&self) -> &'static str {
        PLUGIN
    }

    fn report(
        &mut self,
        ctx: &SweepContext,
        transport: &dyn Transport,
    ) -> Result<ReportSummary, SweepError> {
        let partitions = self
            .collector
            .partitions()
            .map_err(SweepError::collect(PLUGIN))?;

        let header = ctx.header(PLUGIN).map_err(SweepError::encode(PLUGIN))?;
        let mut batch = BatchAssembler::new(header, transport);
        let mut skipped = 0;
        for partition in &partitions {
            let usage = match self.collector.disk_usage(&partition.mountpoint) {
                Ok(usage) => usage,
                Err(e) => {
                    error!(mountpoint = %partition.mountpoint, error = %e, "disk usage unavailable");
                    skipped += 1;
                    continue;
                }
            };

            let group = MetricGroup::builder()
                .plugin_instance(volume_name(&partition.mountpoint))
                .type_name("percent_bytes")
                .type_instance("free")
                .values(&[Value::Gauge(usage.percent)])
                .build()
                .map_err(SweepError::encode(PLUGIN))?;
            batch.try_append(&group);
        }

        Ok(ReportSummary::new(batch.finish(), skipped))
    }
}
