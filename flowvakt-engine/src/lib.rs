//! # flowvakt Engine
//!
//! Packet pipelines and the runtime that wires them to capture, the event
//! bus consumer and flow table maintenance.

pub mod error;
pub mod maintenance;
pub mod pipeline;
pub mod processor;
pub mod runtime;

pub use error::RuntimeError;
pub use maintenance::{FlowMaintenance, FlowReport};
pub use pipeline::{Pipeline, Verdict};
pub use processor::{EventProcessor, RecordWriter, TraceProcessor};
pub use runtime::{Attachment, RunSummary, Runtime};

pub mod prelude {
    pub use super::{
        EventProcessor, FlowMaintenance, FlowReport, Pipeline, Runtime, RuntimeError, Verdict,
    };
}
