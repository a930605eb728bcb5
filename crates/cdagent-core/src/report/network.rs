//! `interface` plugin: per-interface traffic counters.

use super::{ReportSummary, Reporter, SweepContext, SweepError};
use crate::collector::procfs::NetDevStats;
use crate::collector::{FileSystem, SystemCollector};
use crate::protocol::{BatchAssembler, EncodeError, MetricGroup, Value};
use crate::transport::Transport;

const PLUGIN: &str = "interface";

pub struct NetworkReporter<F: FileSystem> {
    collector: SystemCollector<F>,
}

impl<F: FileSystem> NetworkReporter<F> {
    pub fn new(collector: SystemCollector<F>) -> Self {
        Self { collector }
    }
}

/// One group per interface with (rx, tx) counter pairs.
fn group(nic: &NetDevStats) -> Result<MetricGroup, EncodeError> {
    MetricGroup::builder()
        .plugin_instance(&nic.interface)
        .type_name("if_octets")
        .values(&[Value::Counter(nic.rx_bytes), Value::Counter(nic.tx_bytes)])
        .type_name("if_packets")
        .values(&[Value::Counter(nic.rx_packets), Value::Counter(nic.tx_packets)])
        .type_name("if_dropped")
        .values(&[Value::Counter(nic.rx_drop), Value::Counter(nic.tx_drop)])
        .type_name("if_errors")
        .values(&[Value::Counter(nic.rx_errs), Value::Counter(nic.tx_errs)])
        .build()
}

impl<F: FileSystem> Reporter for NetworkReporter<F> {
    fn plugin(&self) -> &'static str {
        PLUGIN
    }

    fn report(
        &mut self,
        ctx: &SweepContext,
        transport: &dyn Transport,
    ) -> Result<ReportSummary, SweepError> {
        let nics = self
            .collector
            .net_io()
            .map_err(SweepError::collect(PLUGIN))?;

        let header = ctx.header(PLUGIN).map_err(SweepError::encode(PLUGIN))?;
        let mut batch = BatchAssembler::new(header, transport);
        for nic in &nics {
            let group = group(nic).map_err(SweepError::encode(PLUGIN))?;
            batch.try_append(&group);
        }

        Ok(ReportSummary::new(batch.finish(), 0))
    }
}
