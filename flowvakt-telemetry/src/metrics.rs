//! ## flowvakt-telemetry::metrics
//! **Prometheus counters for the packet pipelines and the flow table**
//!
//! Pipelines hold a [`DirectionMetrics`] with label values already resolved,
//! so the per-packet path never hashes label sets for the common outcomes.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub packets_observed: IntCounterVec,
    pub packets_skipped: IntCounterVec,
    pub events: IntCounterVec,
    pub flow_updates: IntCounterVec,
    pub flows_pruned: IntCounter,
    pub active_flows: IntGauge,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let packets_observed = IntCounterVec::new(
            Opts::new("flowvakt_packets_total", "Frames seen by a pipeline"),
            &["direction"],
        )?;
        let packets_skipped = IntCounterVec::new(
            Opts::new(
                "flowvakt_packets_skipped_total",
                "Frames passed through without classification",
            ),
            &["direction", "reason"],
        )?;
        let events = IntCounterVec::new(
            Opts::new("flowvakt_events_total", "Packet records offered to the event bus"),
            &["direction", "outcome"],
        )?;
        let flow_updates = IntCounterVec::new(
            Opts::new("flowvakt_flow_updates_total", "Flow table operations"),
            &["direction", "outcome"],
        )?;
        let flows_pruned = IntCounter::new("flowvakt_flows_pruned_total", "Idle flows removed")?;
        let active_flows = IntGauge::new("flowvakt_active_flows", "Flows currently tracked")?;

        registry.register(Box::new(packets_observed.clone()))?;
        registry.register(Box::new(packets_skipped.clone()))?;
        registry.register(Box::new(events.clone()))?;
        registry.register(Box::new(flow_updates.clone()))?;
        registry.register(Box::new(flows_pruned.clone()))?;
        registry.register(Box::new(active_flows.clone()))?;

        Ok(Self {
            registry,
            packets_observed,
            packets_skipped,
            events,
            flow_updates,
            flows_pruned,
            active_flows,
        })
    }

    /// Counters for one pipeline, labelled with `direction`.
    pub fn direction(&self, direction: &'static str) -> DirectionMetrics {
        DirectionMetrics {
            direction,
            observed: self.packets_observed.with_label_values(&[direction]),
            events_published: self.events.with_label_values(&[direction, "published"]),
            events_dropped: self.events.with_label_values(&[direction, "dropped"]),
            flows_created: self.flow_updates.with_label_values(&[direction, "created"]),
            flows_updated: self.flow_updates.with_label_values(&[direction, "updated"]),
            flows_ignored: self.flow_updates.with_label_values(&[direction, "ignored"]),
            flows_rejected: self.flow_updates.with_label_values(&[direction, "rejected"]),
            skipped: self.packets_skipped.clone(),
        }
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Resolved counters for a single direction.
#[derive(Debug, Clone)]
pub struct DirectionMetrics {
    direction: &'static str,
    pub observed: IntCounter,
    pub events_published: IntCounter,
    pub events_dropped: IntCounter,
    pub flows_created: IntCounter,
    pub flows_updated: IntCounter,
    pub flows_ignored: IntCounter,
    pub flows_rejected: IntCounter,
    skipped: IntCounterVec,
}

impl DirectionMetrics {
    pub fn inc_skipped(&self, reason: &str) {
        self.skipped
            .with_label_values(&[self.direction, reason])
            .inc();
    }
}
