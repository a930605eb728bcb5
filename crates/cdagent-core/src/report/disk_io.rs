//! `disk` plugin: per-device I/O counters.

use super::{ReportSummary, Reporter, SweepContext, SweepError};
use crate::collector::procfs::DiskStats;
use crate::collector::{FileSystem, SystemCollector};
use crate::protocol::{BatchAssembler, EncodeError, MetricGroup, Value};
use crate::transport::Transport;

const PLUGIN: &str = "disk";

/// `/proc/diskstats` counts 512-byte sectors regardless of the device.
const SECTOR_SIZE: u64 = 512;

pub struct DiskIoReporter<F: FileSystem> {
    collector: SystemCollector<F>,
}

impl<F: FileSystem> DiskIoReporter<F> {
    pub fn new(collector: SystemCollector<F>) -> Self {
        Self { collector }
    }
}

fn group(disk: &DiskStats) -> Result<MetricGroup, EncodeError> {
    MetricGroup::builder()
        .plugin_instance(&disk.device)
        .type_name("disk_octets")
        .values(&[
            Value::Counter(disk.read_sectors.wrapping_mul(SECTOR_SIZE)),
            Value::Counter(disk.write_sectors.wrapping_mul(SECTOR_SIZE)),
        ])
        .type_name("disk_ops")
        .values(&[Value::Counter(disk.reads), Value::Counter(disk.writes)])
        .build()
}

impl<F: FileSystem> Reporter for DiskIoReporter<F> {
    fn plugin(&self) -> &'static str {
        PLUGIN
    }

    fn report(
        &mut self,
        ctx: &SweepContext,
        transport: &dyn Transport,
    ) -> Result<ReportSummary, SweepError> {
        let disks = self
            .collector
            .disk_io()
            .map_err(SweepError::collect(PLUGIN))?;

        let header = ctx.header(PLUGIN).map_err(SweepError::encode(PLUGIN))?;
        let mut batch = BatchAssembler::new(header, transport);
        for disk in &disks {
            let group = group(disk).map_err(SweepError::encode(PLUGIN))?;
            batch.try_append(&group);
        }

        Ok(ReportSummary::new(batch.finish(), 0))
    }
}
