//! ## flowvakt-engine::maintenance
//! **Flow table upkeep outside the packet path**
//!
//! Idle pruning and periodic reporting. Both walk the whole table, so they
//! run on a timer in their own task and never from a pipeline.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument};

use flowvakt_config::FlowvaktConfig;
use flowvakt_core::flow::{FlowKey, FlowMetrics, FlowMetricsStore, FlowStats};
use flowvakt_core::time::Clock;
use flowvakt_telemetry::MetricsRecorder;

use crate::error::RuntimeError;

/// Point-in-time view of the flow table.
#[derive(Debug, Clone, Serialize)]
pub struct FlowReport {
    /// Clock reading the report was taken at.
    pub taken_at_ns: u64,
    pub active_flows: usize,
    pub max_entries: usize,
    pub flows: Vec<FlowReportEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowReportEntry {
    pub key: FlowKey,
    pub metrics: FlowMetrics,
    pub stats: FlowStats,
}

impl FlowReport {
    pub fn capture(store: &FlowMetricsStore, now_ns: u64) -> Self {
        let flows: Vec<FlowReportEntry> = store
            .snapshot()
            .into_iter()
            .map(|entry| FlowReportEntry {
                key: entry.key,
                stats: FlowStats::from_metrics(&entry.metrics),
                metrics: entry.metrics,
            })
            .collect();

        Self {
            taken_at_ns: now_ns,
            active_flows: flows.len(),
            max_entries: store.max_entries(),
            flows,
        }
    }

    pub fn write_yaml<W: Write>(&self, out: W) -> Result<(), RuntimeError> {
        serde_yaml::to_writer(out, self)?;
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), RuntimeError> {
        let mut out = BufWriter::new(File::create(path)?);
        self.write_yaml(&mut out)?;
        out.flush()?;
        Ok(())
    }
}

/// Periodic pruning and reporting for one flow table.
pub struct FlowMaintenance {
    store: Arc<FlowMetricsStore>,
    clock: Arc<dyn Clock>,
    metrics: MetricsRecorder,
    idle_timeout: Option<Duration>,
    prune_interval: Duration,
    report_interval: Duration,
}

impl FlowMaintenance {
    pub fn new(
        store: Arc<FlowMetricsStore>,
        clock: Arc<dyn Clock>,
        metrics: MetricsRecorder,
        config: &FlowvaktConfig,
    ) -> Self {
        let flow_table = &config.core.flow_table;
        Self {
            store,
            clock,
            metrics,
            idle_timeout: flow_table.idle_timeout_secs.map(Duration::from_secs),
            prune_interval: Duration::from_secs(flow_table.prune_interval_secs),
            report_interval: Duration::from_secs(config.telemetry.report_interval_secs),
        }
    }

    /// Removes idle flows, if an idle timeout is configured.
    pub fn prune(&self) -> usize {
        let Some(idle_timeout) = self.idle_timeout else {
            return 0;
        };

        let removed = self.store.prune_idle(self.clock.now_ns(), idle_timeout);
        self.metrics.flows_pruned.inc_by(removed as u64);
        self.metrics.active_flows.set(self.store.len() as i64);
        if removed > 0 {
            debug!(removed, remaining = self.store.len(), "Pruned idle flows");
        }
        removed
    }

    pub fn report(&self) -> FlowReport {
        let report = FlowReport::capture(&self.store, self.clock.now_ns());
        self.metrics.active_flows.set(report.active_flows as i64);

        info!(
            active_flows = report.active_flows,
            max_entries = report.max_entries,
            "Flow table report"
        );
        for flow in &report.flows {
            debug!(
                flow = %flow.key,
                packets_in = flow.metrics.packets_in,
                packets_out = flow.metrics.packets_out,
                bytes_in = flow.metrics.bytes_in,
                bytes_out = flow.metrics.bytes_out,
                in_pps = flow.stats.in_pps,
                out_pps = flow.stats.out_pps,
                in_out_byte_ratio = flow.stats.in_out_byte_ratio,
                "Flow"
            );
        }
        report
    }

    /// Runs until `shutdown` flips to `true` or its sender goes away.
    #[instrument(name = "flow_maintenance", skip_all)]
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut prune = interval(self.prune_interval);
        let mut report = interval(self.report_interval);
        prune.set_missed_tick_behavior(MissedTickBehavior::Delay);
        report.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Both intervals fire immediately; skip that first tick.
        prune.tick().await;
        report.tick().await;

        loop {
            tokio::select! {
                _ = prune.tick() => {
                    self.prune();
                }
                _ = report.tick() => {
                    self.report();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("Flow maintenance stopped");
    }
}
