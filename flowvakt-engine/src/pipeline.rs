//! ## flowvakt-engine::pipeline
//! **Per-direction packet pipelines**
//!
//! A frame goes link → network → transport → record, then the record is
//! published on the event bus and folded into the flow table. Every stage
//! can end processing early, and every outcome is the same [`Verdict::Pass`]:
//! observation never changes delivery.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use flowvakt_capture::Frame;
use flowvakt_core::events::{EventBus, EventError};
use flowvakt_core::flow::{build_key, FlowMetricsStore, FlowUpdate};
use flowvakt_core::packet::{Direction, PacketRecord};
use flowvakt_core::time::Clock;
use flowvakt_protocols::{
    parse_link, parse_network_layer, parse_transport, LinkCast, SkipReason, TRANSPORT_PROBE_LEN,
};
use flowvakt_telemetry::{DirectionMetrics, MetricsRecorder};

/// What happens to an observed frame. There is only one answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Pass,
}

/// Classification pipeline bound to one observation direction.
pub struct Pipeline {
    direction: Direction,
    store: Arc<FlowMetricsStore>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    metrics: DirectionMetrics,
}

impl Pipeline {
    pub fn new(
        direction: Direction,
        store: Arc<FlowMetricsStore>,
        bus: EventBus,
        clock: Arc<dyn Clock>,
        metrics: &MetricsRecorder,
    ) -> Self {
        Self {
            direction,
            store,
            bus,
            clock,
            metrics: metrics.direction(direction.as_str()),
        }
    }

    /// Pipeline for traffic arriving at the host.
    pub fn ingress(
        store: Arc<FlowMetricsStore>,
        bus: EventBus,
        clock: Arc<dyn Clock>,
        metrics: &MetricsRecorder,
    ) -> Self {
        Self::new(Direction::Inbound, store, bus, clock, metrics)
    }

    /// Pipeline for traffic leaving the host.
    pub fn egress(
        store: Arc<FlowMetricsStore>,
        bus: EventBus,
        clock: Arc<dyn Clock>,
        metrics: &MetricsRecorder,
    ) -> Self {
        Self::new(Direction::Outbound, store, bus, clock, metrics)
    }

    /// Observes one frame.
    #[inline]
    pub fn process(&self, frame: Frame<'_>) -> Verdict {
        self.metrics.observed.inc();

        if let Err(reason) = self.classify(frame) {
            trace!(direction = %self.direction, %reason, "Frame skipped");
            self.metrics.inc_skipped(reason.label());
        }
        Verdict::Pass
    }

    fn classify(&self, frame: Frame<'_>) -> Result<(), SkipReason> {
        let data = frame.data;

        if parse_link(data)?.cast != LinkCast::Unicast {
            return Err(SkipReason::NotUnicast);
        }

        let network = parse_network_layer(data)?;

        // Both transport headers must fit before either is read.
        if data.len().saturating_sub(network.header_end) < TRANSPORT_PROBE_LEN {
            return Err(SkipReason::TruncatedTransport);
        }
        let transport = parse_transport(data, network.header_end, network.protocol, &*self.clock)?;

        let record = PacketRecord {
            src_ip: network.src,
            dst_ip: network.dst,
            src_port: transport.src_port,
            dst_port: transport.dst_port,
            protocol: network.protocol,
            flags: transport.flags,
            timestamp: transport.timestamp,
            direction: self.direction,
            length: frame.wire_len,
        };

        self.emit(record);
        self.track(&record);
        Ok(())
    }

    fn emit(&self, record: PacketRecord) {
        match self.bus.publish(record) {
            Ok(()) => self.metrics.events_published.inc(),
            Err(EventError::QueueFull) => {
                self.metrics.events_dropped.inc();
                let dropped = self.metrics.events_dropped.get();
                if dropped.is_power_of_two() {
                    warn!(direction = %self.direction, dropped, "Event bus full, dropping records");
                }
            }
            Err(err) => {
                self.metrics.events_dropped.inc();
                trace!(direction = %self.direction, error = %err, "Record not published");
            }
        }
    }

    fn track(&self, record: &PacketRecord) {
        let key = build_key(record, self.direction);

        match self.store.record_packet(key, record) {
            Ok(FlowUpdate::Created) => {
                self.metrics.flows_created.inc();
                debug!(flow = %key, "Flow opened");
            }
            Ok(FlowUpdate::Updated) => self.metrics.flows_updated.inc(),
            Ok(FlowUpdate::Ignored) => {
                self.metrics.flows_ignored.inc();
                trace!(flow = %key, "Mid-stream packet for untracked flow");
            }
            Err(err) => {
                self.metrics.flows_rejected.inc();
                let rejected = self.metrics.flows_rejected.get();
                if rejected.is_power_of_two() {
                    warn!(flow = %key, error = %err, rejected, "Flow not recorded");
                }
            }
        }
    }
}

impl Clone for Pipeline {
    fn clone(&self) -> Self {
        Self {
            direction: self.direction,
            store: Arc::clone(&self.store),
            bus: self.bus.share(),
            clock: Arc::clone(&self.clock),
            metrics: self.metrics.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowvakt_core::time::VirtualClock;
    use flowvakt_protocols::testing::{FrameBuilder, BROADCAST_MAC, TCP_FLAG_ACK, TCP_FLAG_SYN};
    use std::net::Ipv4Addr;
    use tracing_test::traced_test;

    struct Harness {
        store: Arc<FlowMetricsStore>,
        bus: EventBus,
        metrics: MetricsRecorder,
        ingress: Pipeline,
        egress: Pipeline,
    }

    fn harness(max_entries: usize, capacity: usize) -> Harness {
        let store = Arc::new(FlowMetricsStore::with_max_entries(max_entries));
        let bus = EventBus::with_capacity(capacity).unwrap();
        let clock: Arc<dyn Clock> = Arc::new(VirtualClock::new(1_000));
        let metrics = MetricsRecorder::new().unwrap();
        Harness {
            ingress: Pipeline::ingress(store.clone(), bus.share(), clock.clone(), &metrics),
            egress: Pipeline::egress(store.clone(), bus.share(), clock, &metrics),
            store,
            bus,
            metrics,
        }
    }

    fn skipped(metrics: &MetricsRecorder, direction: &str, reason: &str) -> u64 {
        metrics
            .packets_skipped
            .with_label_values(&[direction, reason])
            .get()
    }

    #[test]
    fn records_carry_direction_and_wire_length() {
        let h = harness(16, 16);
        let frame = FrameBuilder::tcp_v4([10, 0, 0, 2], 51000, [10, 0, 0, 1], 443)
            .tcp_flags(TCP_FLAG_SYN)
            .build();

        assert_eq!(h.egress.process(Frame::new(&frame, 1514)), Verdict::Pass);

        let record = h.bus.recv().unwrap();
        assert_eq!(record.direction, Direction::Outbound);
        assert_eq!(record.length, 1514);
        assert_eq!(record.src_ip, Ipv4Addr::new(10, 0, 0, 2).to_ipv6_mapped());
        assert_eq!((record.src_port, record.dst_port), (51000, 443));
        assert!(record.flags.syn);
        assert_eq!(record.timestamp, 1_000);
        assert_eq!(h.store.len(), 1);
    }

    #[test]
    fn non_unicast_frames_pass_untouched() {
        let h = harness(16, 16);
        let frame = FrameBuilder::udp_v4([10, 0, 0, 2], 68, [255, 255, 255, 255], 67)
            .destination_mac(BROADCAST_MAC)
            .build();

        assert_eq!(h.ingress.process(Frame::whole(&frame)), Verdict::Pass);
        assert!(h.bus.is_empty());
        assert!(h.store.is_empty());
        assert_eq!(skipped(&h.metrics, "inbound", "not_unicast"), 1);
    }

    #[test]
    fn short_transport_region_is_skipped() {
        let h = harness(16, 16);
        // 34 bytes of headers + 8 of UDP, nothing else: less than the probe.
        let frame = FrameBuilder::udp_v4([10, 0, 0, 2], 5353, [10, 0, 0, 1], 53)
            .unpadded()
            .build();

        assert_eq!(h.egress.process(Frame::whole(&frame)), Verdict::Pass);
        assert!(h.bus.is_empty());
        assert_eq!(skipped(&h.metrics, "outbound", "truncated_transport"), 1);
    }

    #[test]
    fn mid_stream_packets_are_published_but_not_tracked() {
        let h = harness(16, 16);
        let frame = FrameBuilder::tcp_v4([10, 0, 0, 1], 443, [10, 0, 0, 2], 51000)
            .tcp_flags(TCP_FLAG_ACK)
            .build();

        h.ingress.process(Frame::whole(&frame));
        assert_eq!(h.bus.len(), 1);
        assert!(h.store.is_empty());
        assert_eq!(
            h.metrics
                .flow_updates
                .with_label_values(&["inbound", "ignored"])
                .get(),
            1
        );
    }

    #[traced_test]
    #[test]
    fn full_flow_table_is_logged_and_passes() {
        let h = harness(1, 16);
        let first = FrameBuilder::udp_v4([10, 0, 0, 2], 1000, [10, 0, 0, 1], 53).build();
        let second = FrameBuilder::udp_v4([10, 0, 0, 2], 1001, [10, 0, 0, 1], 53).build();

        assert_eq!(h.egress.process(Frame::whole(&first)), Verdict::Pass);
        assert_eq!(h.egress.process(Frame::whole(&second)), Verdict::Pass);

        assert_eq!(h.store.len(), 1);
        assert_eq!(h.bus.len(), 2);
        assert_eq!(
            h.metrics
                .flow_updates
                .with_label_values(&["outbound", "rejected"])
                .get(),
            1
        );
        assert!(logs_contain("Flow not recorded"));
        assert!(logs_contain("Flow table is full (1 entries)"));
    }

    #[test]
    fn full_bus_drops_newest_and_still_tracks() {
        let h = harness(16, 1);
        let first = FrameBuilder::udp_v4([10, 0, 0, 2], 1000, [10, 0, 0, 1], 53).build();
        let second = FrameBuilder::udp_v4([10, 0, 0, 2], 1001, [10, 0, 0, 1], 53).build();

        h.egress.process(Frame::whole(&first));
        h.egress.process(Frame::whole(&second));

        assert_eq!(h.bus.recv().unwrap().src_port, 1000);
        assert!(h.bus.recv().is_none());
        assert_eq!(h.bus.dropped(), 1);
        assert_eq!(h.store.len(), 2);
    }
}
