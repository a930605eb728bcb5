//! `memory` plugin, with a trailing `swap` group under the same header.

use super::{ReportSummary, Reporter, SweepContext, SweepError};
use crate::collector::{FileSystem, MemoryUsage, SwapUsage, SystemCollector};
use crate::protocol::{BatchAssembler, EncodeError, MetricGroup, Value};
use crate::transport::Transport;

const PLUGIN: &str = "memory";
const SWAP_PLUGIN: &str = "swap";

pub struct MemoryReporter<F: FileSystem> {
    collector: SystemCollector<F>,
}

impl<F: FileSystem> MemoryReporter<F> {
    pub fn new(collector: SystemCollector<F>) -> Self {
        Self { collector }
    }
}

fn memory_group(mem: &MemoryUsage) -> Result<MetricGroup, EncodeError> {
    MetricGroup::builder()
        .type_name("memory")
        .type_instance("used")
        .values(&[Value::Gauge(mem.used as f64)])
        .type_instance("buffers")
        .values(&[Value::Gauge(mem.buffers as f64)])
        .type_instance("cached")
        .values(&[Value::Gauge(mem.cached as f64)])
        .type_instance("free")
        .values(&[Value::Gauge(mem.available as f64)])
        .build()
}

fn swap_group(swap: &SwapUsage) -> Result<MetricGroup, EncodeError> {
    let derive = |bytes: u64| Value::Derive(i64::try_from(bytes).unwrap_or(i64::MAX));

    MetricGroup::builder()
        .plugin(SWAP_PLUGIN)
        .type_name("swap")
        .type_instance("used")
        .values(&[Value::Gauge(swap.used as f64)])
        .type_instance("free")
        .values(&[Value::Gauge(swap.free as f64)])
        .type_name("swap_io")
        .type_instance("in")
        .values(&[derive(swap.swapped_in)])
        .type_instance("out")
        .values(&[derive(swap.swapped_out)])
        .build()
}

impl<F: FileSystem> Reporter for MemoryReporter<F> {
    fn plugin(&self) -> &'static str {
        PLUGIN
    }

    fn report(
        &mut self,
        ctx: &SweepContext,
        transport: &dyn Transport,
    ) -> Result<ReportSummary, SweepError> {
        let mem = self
            .collector
            .memory()
            .map_err(SweepError::collect(PLUGIN))?;
        let swap = self
            .collector
            .swap()
            .map_err(SweepError::collect(SWAP_PLUGIN))?;

        let header = ctx.header(PLUGIN).map_err(SweepError::encode(PLUGIN))?;
        let mut batch = BatchAssembler::new(header, transport);
        batch.try_append(&memory_group(&mem).map_err(SweepError::encode(PLUGIN))?);
        batch.try_append(&swap_group(&swap).map_err(SweepError::encode(SWAP_PLUGIN))?);

        Ok(ReportSummary::new(batch.finish(), 0))
    }
}
