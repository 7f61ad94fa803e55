use serde::{Deserialize, Serialize};

use crate::packet::{Direction, PacketRecord};

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Aggregate counters for one flow.
///
/// Counters wrap on overflow rather than saturate, matching kernel map
/// counters that consumers already diff.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowMetrics {
    pub packets_in: u32,
    pub packets_out: u32,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub ts_start: u64,
    pub ts_current: u64,
}

impl FlowMetrics {
    /// Counters for a flow opened by `record`.
    pub fn start(record: &PacketRecord) -> Self {
        let mut metrics = Self {
            ts_start: record.timestamp,
            ts_current: record.timestamp,
            ..Self::default()
        };
        metrics.count(record);
        metrics
    }

    /// Folds one more packet of an existing flow into the counters.
    ///
    /// Workers can finish out of timestamp order; `ts_current` only moves
    /// forward.
    #[inline]
    pub fn observe(&mut self, record: &PacketRecord) {
        self.ts_current = self.ts_current.max(record.timestamp);
        self.count(record);
    }

    #[inline]
    fn count(&mut self, record: &PacketRecord) {
        match record.direction {
            Direction::Outbound => {
                self.packets_out = self.packets_out.wrapping_add(1);
                self.bytes_out = self.bytes_out.wrapping_add(u64::from(record.length));
            }
            Direction::Inbound => {
                self.packets_in = self.packets_in.wrapping_add(1);
                self.bytes_in = self.bytes_in.wrapping_add(u64::from(record.length));
            }
        }
    }

    /// Nanoseconds between the first and latest packet.
    #[inline]
    pub fn duration_ns(&self) -> u64 {
        self.ts_current.saturating_sub(self.ts_start)
    }
}

/// Rates and ratios derived from a flow's counters, for reporting.
///
/// Any value whose denominator is zero is reported as `0.0`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct FlowStats {
    pub in_pps: f64,
    pub out_pps: f64,
    pub in_bytes_per_packet: f64,
    pub out_bytes_per_packet: f64,
    pub in_out_byte_ratio: f64,
    pub in_out_packet_ratio: f64,
}

impl FlowStats {
    pub fn from_metrics(metrics: &FlowMetrics) -> Self {
        let secs = metrics.duration_ns() as f64 / NANOS_PER_SEC;
        let packets_in = f64::from(metrics.packets_in);
        let packets_out = f64::from(metrics.packets_out);

        Self {
            in_pps: ratio(packets_in, secs),
            out_pps: ratio(packets_out, secs),
            in_bytes_per_packet: ratio(metrics.bytes_in as f64, packets_in),
            out_bytes_per_packet: ratio(metrics.bytes_out as f64, packets_out),
            in_out_byte_ratio: ratio(metrics.bytes_in as f64, metrics.bytes_out as f64),
            in_out_packet_ratio: ratio(packets_in, packets_out),
        }
    }
}

#[inline]
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}
