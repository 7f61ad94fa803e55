//! ## flowvakt-core::events
//! **Bounded multi-producer event bus for classified packets**
//!
//! One record is published per classified packet. Producers never wait: when
//! the bus is full the newest record is dropped and counted.

pub mod bus;

pub use bus::{EventBus, EventError};
