// Sensor device port - Interface the ingestion worker consumes
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::time::Duration;
use thiserror::Error;

/// An entity exposed by the device (listed for information only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityInfo {
    pub id: String,
    pub name: Option<String>,
}

impl std::fmt::Display for EntityInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", self.id, name),
            None => f.write_str(&self.id),
        }
    }
}

/// Raw state carried by a notification, before numeric conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    Number(f64),
    Text(String),
    /// Booleans, objects and anything else that is not a reading.
    Other(String),
    Missing,
}

/// A single state-change notification from the device.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorState {
    pub entity_id: String,
    pub name: Option<String>,
    pub value: StateValue,
}

#[derive(Debug, Error, PartialEq)]
pub enum ReadingError {
    #[error("state {0:?} is not numeric")]
    NotNumeric(String),
    #[error("state {0} is not a finite number")]
    NotFinite(f64),
    #[error("notification carries no state")]
    Missing,
}

impl SensorState {
    pub fn new(entity_id: impl Into<String>, value: StateValue) -> Self {
        Self {
            entity_id: entity_id.into(),
            name: None,
            value,
        }
    }

    /// Convert the carried state into a reading.
    ///
    /// Text states are read from their first token so that values reported
    /// with a unit suffix (`"42.5 %"`) still convert.
    pub fn reading(&self) -> Result<f64, ReadingError> {
        let value = match &self.value {
            StateValue::Number(v) => *v,
            StateValue::Text(text) => text
                .split_whitespace()
                .next()
                .and_then(|token| token.parse::<f64>().ok())
                .ok_or_else(|| ReadingError::NotNumeric(text.clone()))?,
            StateValue::Other(raw) => return Err(ReadingError::NotNumeric(raw.clone())),
            StateValue::Missing => return Err(ReadingError::Missing),
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(ReadingError::NotFinite(value))
        }
    }
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("device did not answer the subscription within {0:?}")]
    HandshakeTimeout(Duration),
    #[error("device rejected the subscription with status {0}")]
    Rejected(reqwest::StatusCode),
    #[error("no data from device for {0:?}")]
    Idle(Duration),
    #[error("device is not connected")]
    NotConnected,
    #[error("connection to device lost")]
    ConnectionLost,
}

/// Notifications until the link drops; the end of the stream is the
/// connection-lost signal.
pub type StateStream = BoxStream<'static, Result<SensorState, DeviceError>>;

#[async_trait]
pub trait SensorDevice: Send {
    /// Open the link and complete the handshake
    async fn connect(&mut self) -> Result<(), DeviceError>;

    /// Entities currently exposed by the device
    async fn list_entities(&mut self) -> Result<Vec<EntityInfo>, DeviceError>;

    /// Start receiving state changes
    async fn subscribe_states(&mut self) -> Result<StateStream, DeviceError>;

    /// Tear down the link; safe to call in any state
    async fn disconnect(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_states_convert() {
        let state = SensorState::new("sensor-soil", StateValue::Number(41.5));
        assert_eq!(state.reading(), Ok(41.5));

        let state = SensorState::new("sensor-soil", StateValue::Text("42.5 %".to_string()));
        assert_eq!(state.reading(), Ok(42.5));

        let state = SensorState::new("sensor-soil", StateValue::Text(" 7".to_string()));
        assert_eq!(state.reading(), Ok(7.0));
    }

    #[test]
    fn test_malformed_states_are_rejected() {
        let state = SensorState::new("sensor-soil", StateValue::Text("wet".to_string()));
        assert_eq!(state.reading(), Err(ReadingError::NotNumeric("wet".to_string())));

        let state = SensorState::new("sensor-soil", StateValue::Text("NaN %".to_string()));
        assert!(matches!(state.reading(), Err(ReadingError::NotFinite(_))));

        let state = SensorState::new("binary_sensor-door", StateValue::Other("true".to_string()));
        assert!(matches!(state.reading(), Err(ReadingError::NotNumeric(_))));

        let state = SensorState::new("sensor-soil", StateValue::Missing);
        assert_eq!(state.reading(), Err(ReadingError::Missing));
    }
}
