// Link domain model - Lifecycle of the connection to the sensor device
use chrono::{DateTime, Local};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Subscribed,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Subscribed => "subscribed",
            ConnectionState::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LastReading {
    pub index: u64,
    pub value: f64,
    pub at: DateTime<Local>,
}

/// Read-only view of the ingestion link, published by the worker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkStatus {
    pub state: ConnectionState,
    /// Number of connection attempts started so far.
    pub attempts: u32,
    pub last_reading: Option<LastReading>,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_disconnected() {
        let status = LinkStatus::default();
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert_eq!(status.attempts, 0);
        assert!(status.last_reading.is_none());
        assert_eq!(status.state.to_string(), "disconnected");
    }
}
