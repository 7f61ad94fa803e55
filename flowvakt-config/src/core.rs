//! Core system configuration parameters.
//!
//! Sizing of the shared state every pipeline writes into:
//! - Event bus capacity
//! - Flow table bounds and maintenance cadence

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Core system configuration parameters.
#[derive(Default, Debug, Serialize, Deserialize, Validate, Clone)]
pub struct CoreConfig {
    /// Event bus between the pipelines and the event consumer.
    #[serde(default)]
    #[validate(nested)]
    pub event_bus: EventBusConfig,

    /// Flow metrics table.
    #[serde(default)]
    #[validate(nested)]
    pub flow_table: FlowTableConfig,
}

/// Event bus configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct EventBusConfig {
    /// Capacity of the event bus (must be a power of two).
    #[serde(default = "default_capacity")]
    #[validate(range(min = 128, max = 16777216))]
    #[validate(custom(function = validation::validate_power_of_two))]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    4096
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

/// Flow table configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct FlowTableConfig {
    /// Upper bound on concurrently tracked flows.
    #[serde(default = "default_max_entries")]
    #[validate(range(min = 1, max = 16777216))]
    pub max_entries: usize,

    /// Flows idle longer than this are pruned. `None` keeps flows forever.
    #[serde(default = "default_idle_timeout")]
    #[validate(range(min = 1, max = 86400))]
    pub idle_timeout_secs: Option<u64>,

    /// How often the maintenance task looks for idle flows.
    #[serde(default = "default_prune_interval")]
    #[validate(range(min = 1, max = 3600))]
    pub prune_interval_secs: u64,
}

fn default_max_entries() -> usize {
    1 << 24
}

fn default_idle_timeout() -> Option<u64> {
    Some(60)
}

fn default_prune_interval() -> u64 {
    10
}

impl Default for FlowTableConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            idle_timeout_secs: default_idle_timeout(),
            prune_interval_secs: default_prune_interval(),
        }
    }
}
