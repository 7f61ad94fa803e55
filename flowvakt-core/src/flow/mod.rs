//! ## flowvakt-core::flow
//! **Canonical flow identity and per-flow counters**
//!
//! - `key`: direction-invariant 5-tuple
//! - `metrics`: counters and derived statistics for one flow
//! - `store`: concurrent flow table with atomic create-or-update

pub mod key;
pub mod metrics;
pub mod store;

pub use key::{build_key, FlowKey};
pub use metrics::{FlowMetrics, FlowStats};
pub use store::{FlowEntry, FlowMetricsStore, FlowUpdate};
