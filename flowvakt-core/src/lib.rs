//! # flowvakt-core
//!
//! Data model and shared state for per-flow traffic telemetry.
//!
//! ### Expectations (Production):
//! - Fixed-size, `Copy` packet records; no heap allocation per packet
//! - Create-vs-update decisions on the flow table are atomic per key
//! - Event emission never blocks a producer
//!
//! ### Key Submodules:
//! - `packet`: `PacketRecord`, direction, transport protocol and its wire layout
//! - `flow`: canonical `FlowKey`, `FlowMetrics` and the concurrent `FlowMetricsStore`
//! - `events`: bounded, lossy multi-producer `EventBus`
//! - `time`: monotonic and virtual clocks

pub mod error;
pub mod events;
pub mod flow;
pub mod packet;
pub mod time;

pub mod prelude {
    pub use crate::error::*;
    pub use crate::events::*;
    pub use crate::flow::*;
    pub use crate::packet::*;
    pub use crate::time::*;
}

pub use error::{FlowStoreError, WireError};
