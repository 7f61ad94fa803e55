//! Consumers of the event bus.
use std::io::Write;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use flowvakt_core::packet::{display_addr, PacketRecord};

use crate::error::RuntimeError;

/// Trait for processing packet records drained from the event bus.
#[async_trait]
pub trait EventProcessor: Send + Sync {
    /// Processes a single record.
    async fn process(&self, record: &PacketRecord) -> Result<(), RuntimeError>;

    /// Called once after the bus is closed and drained.
    async fn finish(&self) -> Result<(), RuntimeError> {
        Ok(())
    }
}

/// Logs every record at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceProcessor;

#[async_trait]
impl EventProcessor for TraceProcessor {
    async fn process(&self, record: &PacketRecord) -> Result<(), RuntimeError> {
        trace!(
            direction = %record.direction,
            protocol = %record.protocol,
            src = %display_addr(record.src_ip),
            src_port = record.src_port,
            dst = %display_addr(record.dst_ip),
            dst_port = record.dst_port,
            syn = record.flags.syn,
            ack = record.flags.ack,
            fin = record.flags.fin,
            length = record.length,
            "Packet"
        );
        Ok(())
    }
}

/// Appends records to a writer in their fixed wire layout.
pub struct RecordWriter<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> RecordWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[async_trait]
impl<W: Write + Send> EventProcessor for RecordWriter<W> {
    async fn process(&self, record: &PacketRecord) -> Result<(), RuntimeError> {
        self.out.lock().write_all(&record.to_wire())?;
        Ok(())
    }

    async fn finish(&self) -> Result<(), RuntimeError> {
        self.out.lock().flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowvakt_core::packet::{Direction, TcpFlags, TransportProtocol, WIRE_LEN};
    use std::net::Ipv4Addr;

    fn record(src_port: u16) -> PacketRecord {
        PacketRecord {
            src_ip: Ipv4Addr::new(10, 0, 0, 2).to_ipv6_mapped(),
            dst_ip: Ipv4Addr::new(10, 0, 0, 1).to_ipv6_mapped(),
            src_port,
            dst_port: 53,
            protocol: TransportProtocol::Udp,
            flags: TcpFlags::default(),
            timestamp: 99,
            direction: Direction::Outbound,
            length: 74,
        }
    }

    #[tokio::test]
    async fn writer_emits_wire_records_back_to_back() {
        let writer = RecordWriter::new(Vec::new());
        writer.process(&record(1000)).await.unwrap();
        writer.process(&record(1001)).await.unwrap();
        writer.finish().await.unwrap();

        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), 2 * WIRE_LEN);
        let second = PacketRecord::from_wire(&bytes[WIRE_LEN..]).unwrap();
        assert_eq!(second, record(1001));
    }
}
