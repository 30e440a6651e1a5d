// ESPHome device adapter - State notifications over the web server event source
use crate::application::sensor_device::{
    DeviceError, EntityInfo, SensorDevice, SensorState, StateStream, StateValue,
};
use crate::infrastructure::event_source::{EventSourceParser, ServerEvent};
use async_trait::async_trait;
use futures::stream::BoxStream;
use reqwest::header::ACCEPT;
use reqwest::Url;
use serde::Deserialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio_stream::StreamExt;

type EventStream = BoxStream<'static, Result<ServerEvent, DeviceError>>;

#[derive(Debug, Clone)]
pub struct EsphomeSettings {
    pub events_url: Url,
    pub username: String,
    pub credential: String,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub discovery_window: Duration,
}

pub struct EsphomeEventClient {
    http: reqwest::Client,
    settings: EsphomeSettings,
    events: Option<EventStream>,
    // states read while listing entities, replayed on subscribe
    pending: VecDeque<SensorState>,
}

#[derive(Debug, Deserialize)]
struct StatePayload {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: Option<serde_json::Value>,
    #[serde(default)]
    state: Option<serde_json::Value>,
}

impl EsphomeEventClient {
    pub fn new(settings: EsphomeSettings) -> Result<Self, DeviceError> {
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()?;

        Ok(Self {
            http,
            settings,
            events: None,
            pending: VecDeque::new(),
        })
    }
}

#[async_trait]
impl SensorDevice for EsphomeEventClient {
    async fn connect(&mut self) -> Result<(), DeviceError> {
        self.disconnect().await;

        let mut request = self
            .http
            .get(self.settings.events_url.clone())
            .header(ACCEPT, "text/event-stream");
        if !self.settings.credential.is_empty() {
            request = request.basic_auth(&self.settings.username, Some(&self.settings.credential));
        }

        tracing::debug!("Opening event stream at {}", self.settings.events_url);
        // reqwest's own timeout would also cut the long-lived body
        let response = tokio::time::timeout(self.settings.connect_timeout, request.send())
            .await
            .map_err(|_| DeviceError::HandshakeTimeout(self.settings.connect_timeout))??;
        if !response.status().is_success() {
            return Err(DeviceError::Rejected(response.status()));
        }

        self.events = Some(event_stream(response, self.settings.idle_timeout));
        Ok(())
    }

    async fn list_entities(&mut self) -> Result<Vec<EntityInfo>, DeviceError> {
        let events = self.events.as_mut().ok_or(DeviceError::NotConnected)?;

        // The device pushes every entity's current state right after connecting.
        let deadline = tokio::time::Instant::now() + self.settings.discovery_window;
        let mut entities: Vec<EntityInfo> = Vec::new();
        loop {
            let next = match tokio::time::timeout_at(deadline, events.next()).await {
                Ok(next) => next,
                Err(_) => break,
            };

            // a closed stream surfaces on subscribe, after the queued states
            let Some(event) = next.transpose()? else {
                break;
            };
            if let Some(state) = parse_state_event(&event) {
                if !entities.iter().any(|e| e.id == state.entity_id) {
                    entities.push(EntityInfo {
                        id: state.entity_id.clone(),
                        name: state.name.clone(),
                    });
                }
                self.pending.push_back(state);
            }
        }

        Ok(entities)
    }

    async fn subscribe_states(&mut self) -> Result<StateStream, DeviceError> {
        let mut events = self.events.take().ok_or(DeviceError::NotConnected)?;
        let pending = std::mem::take(&mut self.pending);

        Ok(Box::pin(async_stream::stream! {
            for state in pending {
                yield Ok(state);
            }
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => {
                        if let Some(state) = parse_state_event(&event) {
                            yield Ok(state);
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        }))
    }

    async fn disconnect(&mut self) {
        // dropping the response body closes the connection
        self.events = None;
        self.pending.clear();
    }
}

fn event_stream(response: reqwest::Response, idle_timeout: Duration) -> EventStream {
    Box::pin(async_stream::stream! {
        let mut parser = EventSourceParser::default();
        let chunks = response.bytes_stream().timeout(idle_timeout);
        tokio::pin!(chunks);

        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(Ok(bytes)) => {
                    for event in parser.feed(&bytes) {
                        yield Ok(event);
                    }
                }
                Ok(Err(e)) => {
                    yield Err(DeviceError::Transport(e));
                    break;
                }
                Err(_) => {
                    yield Err(DeviceError::Idle(idle_timeout));
                    break;
                }
            }
        }
    })
}

/// Decode a `state` event; other event kinds and undecodable payloads yield `None`.
fn parse_state_event(event: &ServerEvent) -> Option<SensorState> {
    if event.event != "state" {
        tracing::trace!("Skipping {} event", event.event);
        return None;
    }

    let payload: StatePayload = match serde_json::from_str(&event.data) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Undecodable state event {:?}: {}", event.data, e);
            return None;
        }
    };

    // A numeric `value` is the raw reading; `state` is the formatted text.
    let value = match (payload.value, payload.state) {
        (Some(serde_json::Value::Number(n)), _) => n
            .as_f64()
            .map(StateValue::Number)
            .unwrap_or_else(|| StateValue::Other(n.to_string())),
        (_, Some(raw)) | (Some(raw), None) => state_value(raw),
        (None, None) => StateValue::Missing,
    };

    Some(SensorState {
        name: payload.name,
        ..SensorState::new(payload.id, value)
    })
}

fn state_value(raw: serde_json::Value) -> StateValue {
    match raw {
        serde_json::Value::Number(n) => n
            .as_f64()
            .map(StateValue::Number)
            .unwrap_or_else(|| StateValue::Other(n.to_string())),
        serde_json::Value::String(s) => StateValue::Text(s),
        serde_json::Value::Null => StateValue::Missing,
        other => StateValue::Other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn state_event(data: &str) -> ServerEvent {
        ServerEvent {
            event: "state".to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_parse_prefers_numeric_value() {
        let state = parse_state_event(&state_event(
            r#"{"id":"sensor-soil_moisture","name":"Soil Moisture","value":43.1,"state":"43.1 %"}"#,
        ))
        .unwrap();

        assert_eq!(state.entity_id, "sensor-soil_moisture");
        assert_eq!(state.name.as_deref(), Some("Soil Moisture"));
        assert_eq!(state.value, StateValue::Number(43.1));
    }

    #[test]
    fn test_parse_falls_back_to_state_text() {
        let state = parse_state_event(&state_event(r#"{"id":"sensor-soil","state":"39 %"}"#)).unwrap();
        assert_eq!(state.value, StateValue::Text("39 %".to_string()));
        assert_eq!(state.reading(), Ok(39.0));

        let state = parse_state_event(&state_event(
            r#"{"id":"binary_sensor-leak","value":true,"state":"ON"}"#,
        ))
        .unwrap();
        assert_eq!(state.value, StateValue::Text("ON".to_string()));

        let state = parse_state_event(&state_event(r#"{"id":"sensor-soil"}"#)).unwrap();
        assert_eq!(state.value, StateValue::Missing);
    }

    #[test]
    fn test_parse_skips_other_events_and_bad_json() {
        let ping = ServerEvent {
            event: "ping".to_string(),
            data: "{}".to_string(),
        };
        assert!(parse_state_event(&ping).is_none());
        assert!(parse_state_event(&state_event("not json")).is_none());
    }

    async fn serve_once(response: &'static str) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        Url::parse(&format!("http://{addr}/events")).unwrap()
    }

    fn settings(events_url: Url) -> EsphomeSettings {
        EsphomeSettings {
            events_url,
            username: "admin".to_string(),
            credential: String::new(),
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(5),
            discovery_window: Duration::from_millis(300),
        }
    }

    #[tokio::test]
    async fn test_discovery_and_subscription_over_http() {
        let url = serve_once(concat!(
            "HTTP/1.1 200 OK\r\n",
            "Content-Type: text/event-stream\r\n",
            "Connection: close\r\n",
            "\r\n",
            "event: ping\ndata: {\"title\":\"garden\"}\n\n",
            "event: state\ndata: {\"id\":\"sensor-soil_moisture\",\"name\":\"Soil Moisture\",\"value\":40.5,\"state\":\"40.5 %\"}\n\n",
            "event: state\ndata: {\"id\":\"sensor-wifi\",\"value\":-60,\"state\":\"-60 dBm\"}\n\n",
            "event: state\ndata: {\"id\":\"sensor-soil_moisture\",\"value\":41.0,\"state\":\"41.0 %\"}\n\n",
        ))
        .await;

        let mut client = EsphomeEventClient::new(settings(url)).unwrap();
        client.connect().await.unwrap();

        let entities = client.list_entities().await.unwrap();
        let ids: Vec<&str> = entities.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["sensor-soil_moisture", "sensor-wifi"]);

        let states: Vec<_> = client.subscribe_states().await.unwrap().collect().await;
        let readings: Vec<(String, f64)> = states
            .into_iter()
            .map(|s| {
                let s = s.unwrap();
                let value = s.reading().unwrap();
                (s.entity_id, value)
            })
            .collect();
        assert_eq!(
            readings,
            vec![
                ("sensor-soil_moisture".to_string(), 40.5),
                ("sensor-wifi".to_string(), -60.0),
                ("sensor-soil_moisture".to_string(), 41.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_rejected_status_is_an_error() {
        let url = serve_once("HTTP/1.1 401 Unauthorized\r\nContent-Length: 0\r\n\r\n").await;

        let mut client = EsphomeEventClient::new(settings(url)).unwrap();
        match client.connect().await {
            Err(DeviceError::Rejected(status)) => assert_eq!(status.as_u16(), 401),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_silent_device_times_out_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // accept and hold the socket without ever answering
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let url = Url::parse(&format!("http://{addr}/events")).unwrap();
        let mut client = EsphomeEventClient::new(EsphomeSettings {
            connect_timeout: Duration::from_millis(200),
            ..settings(url)
        })
        .unwrap();

        let result = tokio::time::timeout(Duration::from_secs(3), client.connect())
            .await
            .expect("connect should give up on its own");
        match result {
            Err(DeviceError::HandshakeTimeout(limit)) => {
                assert_eq!(limit, Duration::from_millis(200))
            }
            other => panic!("expected handshake timeout, got {other:?}"),
        }
        assert!(matches!(
            client.subscribe_states().await,
            Err(DeviceError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_subscribe_requires_connection() {
        let url = Url::parse("http://127.0.0.1:9/events").unwrap();
        let mut client = EsphomeEventClient::new(settings(url)).unwrap();

        assert!(matches!(
            client.list_entities().await,
            Err(DeviceError::NotConnected)
        ));
        assert!(matches!(
            client.subscribe_states().await,
            Err(DeviceError::NotConnected)
        ));
    }
}
