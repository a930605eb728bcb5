//! `cpu` plugin: per-core utilisation percentages.

use tracing::debug;

use super::{ReportSummary, Reporter, SweepContext, SweepError};
use crate::collector::procfs::CpuStat;
use crate::collector::{FileSystem, SystemCollector};
use crate::protocol::{BatchAssembler, EncodeError, MetricGroup, Value};
use crate::transport::Transport;

const PLUGIN: &str = "cpu";

/// Share of elapsed time per state, 0-100.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuPercent {
    pub idle: f64,
    pub user: f64,
    /// Hard and soft interrupt time.
    pub interrupt: f64,
    pub system: f64,
}

/// Percentages over the interval between two samples of the same core.
///
/// Counters that went backwards (core hotplug, counter reset) count as no
/// time spent.
pub fn cpu_percent(prev: &CpuStat, cur: &CpuStat) -> CpuPercent {
    let elapsed = cur.total().saturating_sub(prev.total());
    if elapsed == 0 {
        return CpuPercent::default();
    }

    let share = |now: u64, before: u64| now.saturating_sub(before) as f64 / elapsed as f64 * 100.0;
    CpuPercent {
        idle: share(cur.idle, prev.idle),
        user: share(cur.user, prev.user),
        interrupt: share(cur.interrupt(), prev.interrupt()),
        system: share(cur.system, prev.system),
    }
}

/// Reports `idle`, `user`, `interrupt` and `system` percent gauges for each
/// core, one group per core.
pub struct CpuReporter<F: FileSystem> {
    collector: SystemCollector<F>,
    /// Counters of the previous sweep; the first sweep measures since boot.
    previous: Vec<CpuStat>,
}

impl<F: FileSystem> CpuReporter<F> {
    pub fn new(collector: SystemCollector<F>) -> Self {
        Self {
            collector,
            previous: Vec::new(),
        }
    }

    fn group(index: usize, pct: &CpuPercent) -> Result<MetricGroup, EncodeError> {
        let mut builder = MetricGroup::builder().plugin_instance(&index.to_string());
        for (state, value) in [
            ("idle", pct.idle),
            ("user", pct.user),
            ("interrupt", pct.interrupt),
            ("system", pct.system),
        ] {
            builder = builder
                .type_instance(state)
                .type_name("percent")
                .values(&[Value::Gauge(value.trunc())]);
        }
        builder.build()
    }
}

impl<F: FileSystem> Reporter for CpuReporter<F> {
    fn plugin(&self) -> &'static str {
        PLUGIN
    }

    fn report(
        &mut self,
        ctx: &SweepContext,
        transport: &dyn Transport,
    ) -> Result<ReportSummary, SweepError> {
        let current = self
            .collector
            .cpu_times()
            .map_err(SweepError::collect(PLUGIN))?;
        if !self.previous.is_empty() && self.previous.len() != current.len() {
            debug!(
                before = self.previous.len(),
                now = current.len(),
                "cpu count changed"
            );
        }

        let header = ctx.header(PLUGIN).map_err(SweepError::encode(PLUGIN))?;
        let mut batch = BatchAssembler::new(header, transport);
        let boot = CpuStat::default();
        for (index, cur) in current.iter().enumerate() {
            let prev = self.previous.get(index).unwrap_or(&boot);
            let pct = cpu_percent(prev, cur);
            let group = Self::group(index, &pct).map_err(SweepError::encode(PLUGIN))?;
            batch.try_append(&group);
        }

        self.previous = current;
        Ok(ReportSummary::new(batch.finish(), 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MockFs;
    use crate::protocol::Part;
    use crate::report::test_support::{body_parts, context};
    use crate::transport::RecordingTransport;

    fn reporter(fs: MockFs) -> CpuReporter<MockFs> {
        CpuReporter::new(SystemCollector::new(fs, "/proc"))
    }

    #[test]
    fn test_cpu_percent() {
        let prev = CpuStat::default();
        let cur = CpuStat {
            user: 20,
            system: 10,
            idle: 60,
            irq: 5,
            softirq: 5,
            ..Default::default()
        };
        let pct = cpu_percent(&prev, &cur);
        assert_eq!(pct.user, 20.0);
        assert_eq!(pct.system, 10.0);
        assert_eq!(pct.idle, 60.0);
        assert_eq!(pct.interrupt, 10.0);
    }

    #[test]
    fn test_cpu_percent_no_elapsed_time() {
        let stat = CpuStat {
            user: 5,
            idle: 5,
            ..Default::default()
        };
        assert_eq!(cpu_percent(&stat, &stat), CpuPercent::default());
    }

    #[test]
    fn test_report_first_sweep() {
        let mut reporter = reporter(MockFs::typical_system());
        let transport = RecordingTransport::new();

        let summary = reporter.report(&context(), &transport).unwrap();
        assert_eq!(summary.groups, 4);
        assert_eq!(summary.datagrams, 1);
        assert_eq!(summary.skipped, 0);

        let parts = body_parts(&transport);
        assert_eq!(parts.len(), 4 * 13);
        // cpu0: 2500 user, 750 system, 20000 idle, 75 irq+softirq of 23700
        assert_eq!(
            &parts[..13],
            &[
                Part::PluginInstance("0".into()),
                Part::TypeInstance("idle".into()),
                Part::Type("percent".into()),
                Part::Values(vec![Value::Gauge(84.0)]),
                Part::TypeInstance("user".into()),
                Part::Type("percent".into()),
                Part::Values(vec![Value::Gauge(10.0)]),
                Part::TypeInstance("interrupt".into()),
                Part::Type("percent".into()),
                Part::Values(vec![Value::Gauge(0.0)]),
                Part::TypeInstance("system".into()),
                Part::Type("percent".into()),
                Part::Values(vec![Value::Gauge(3.0)]),
            ]
        );
        assert_eq!(parts[39], Part::PluginInstance("3".into()));
    }

    #[test]
    fn test_report_uses_previous_sample() {
        let mut reporter = reporter(MockFs::typical_system());
        let transport = RecordingTransport::new();

        reporter.report(&context(), &transport).unwrap();
        transport.take();
        reporter.report(&context(), &transport).unwrap();

        // unchanged counters: no time elapsed on any core
        let gauges: Vec<Part> = body_parts(&transport)
            .into_iter()
            .filter(|p| matches!(p, Part::Values(_)))
            .collect();
        assert_eq!(gauges.len(), 16);
        assert!(
            gauges
                .iter()
                .all(|p| *p == Part::Values(vec![Value::Gauge(0.0)]))
        );
    }

    #[test]
    fn test_report_missing_stat_is_fatal() {
        let mut fs = MockFs::typical_system();
        fs.remove_file("/proc/stat");
        let transport = RecordingTransport::new();

        let err = reporter(fs).report(&context(), &transport).unwrap_err();
        assert!(matches!(err, SweepError::Collect { plugin: "cpu", .. }));
        assert!(transport.datagrams().is_empty());
    }
}
