// Ingestion service - Keeps a subscription to the device alive and feeds the sample buffer
use crate::application::sensor_device::{DeviceError, SensorDevice, SensorState};
use crate::domain::link::{ConnectionState, LastReading, LinkStatus};
use crate::domain::sample::SampleBuffer;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// What to do after the link to the device fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Stop ingesting for the rest of the session.
    Terminate,
    /// Wait a fixed delay, then connect again. Repeats forever.
    Retry { delay: Duration },
}

pub struct IngestionWorker<D> {
    device: D,
    buffer: Arc<SampleBuffer>,
    policy: ReconnectPolicy,
    entity_filter: Option<String>,
    status: watch::Sender<LinkStatus>,
}

impl<D: SensorDevice> IngestionWorker<D> {
    /// Create a worker plus the receiving side of its status channel.
    pub fn new(
        device: D,
        buffer: Arc<SampleBuffer>,
        policy: ReconnectPolicy,
        entity_filter: Option<String>,
    ) -> (Self, watch::Receiver<LinkStatus>) {
        let (status, rx) = watch::channel(LinkStatus::default());
        let worker = Self {
            device,
            buffer,
            policy,
            entity_filter,
            status,
        };
        (worker, rx)
    }

    /// Run until the policy says stop. With `Retry` this never returns.
    pub async fn run(mut self) {
        loop {
            self.status.send_modify(|s| {
                s.state = ConnectionState::Connecting;
                s.attempts += 1;
            });

            let err = match self.session().await {
                Ok(()) => DeviceError::ConnectionLost,
                Err(e) => e,
            };

            self.status.send_modify(|s| {
                s.state = ConnectionState::Failed;
                s.last_error = Some(err.to_string());
            });
            self.device.disconnect().await;

            match self.policy {
                ReconnectPolicy::Terminate => {
                    tracing::error!("Device link failed: {}; ingestion stopped", err);
                    return;
                }
                ReconnectPolicy::Retry { delay } => {
                    tracing::warn!("Device link failed: {}; reconnecting in {:?}", err, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// One connect → list → subscribe cycle. Returns `Ok` when the device
    /// closes the state stream.
    async fn session(&mut self) -> Result<(), DeviceError> {
        self.device.connect().await?;
        self.set_state(ConnectionState::Connected);
        tracing::info!("Connected to sensor device");

        let entities = self.device.list_entities().await?;
        for entity in &entities {
            tracing::info!("Found entity: {}", entity);
        }

        let mut states = self.device.subscribe_states().await?;
        self.set_state(ConnectionState::Subscribed);
        tracing::info!("Subscribed to state updates");

        while let Some(update) = states.next().await {
            self.handle_update(update?);
        }

        Ok(())
    }

    fn handle_update(&self, update: SensorState) {
        if let Some(wanted) = &self.entity_filter {
            if &update.entity_id != wanted {
                tracing::debug!("Ignoring state from {}", update.entity_id);
                return;
            }
        }

        match update.reading() {
            Ok(value) => {
                let sample = self.buffer.append(value);
                tracing::info!("Moisture: {}%", value);
                self.status.send_modify(|s| {
                    s.last_reading = Some(LastReading {
                        index: sample.index,
                        value,
                        at: chrono::Local::now(),
                    });
                });
            }
            Err(e) => {
                tracing::warn!("Dropping state from {}: {}", update.entity_id, e);
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.status.send_modify(|s| s.state = state);
    }
}
