use thiserror::Error;

/// Flow table failures. None of these ever reach the packet path; the
/// pipeline logs them and lets the packet through.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FlowStoreError {
    #[error("Flow table is full ({max_entries} entries)")]
    TableFull { max_entries: usize },
}

/// Errors decoding a packet record from its wire layout.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("Record truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Unknown transport protocol number {0}")]
    UnknownProtocol(u8),
}
