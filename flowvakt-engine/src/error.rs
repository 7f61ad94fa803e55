use thiserror::Error;
use tokio::task::JoinError;

use flowvakt_capture::CaptureError;
use flowvakt_core::events::EventError;
use flowvakt_core::packet::Direction;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Event bus error: {0}")]
    EventBus(#[from] EventError),

    #[error("Metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("{0} capture is already attached")]
    AlreadyAttached(Direction),

    #[error("Event processing error: {0}")]
    Processing(String),

    #[error("Report serialization error: {0}")]
    Report(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<JoinError> for RuntimeError {
    fn from(err: JoinError) -> Self {
        RuntimeError::Processing(err.to_string())
    }
}
