use crate::application::analysis_service::AnalysisSettings;
use crate::application::ingestion_service::ReconnectPolicy;
use crate::domain::period::CentralTendency;
use crate::infrastructure::esphome_client::EsphomeSettings;
use reqwest::Url;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_CONFIG: &str = "config/soilmon";
const ENV_PREFIX: &str = "SOILMON";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("buffer.capacity must be at least 1")]
    ZeroCapacity,
    #[error("device address {0:?} is not a valid host")]
    InvalidHost(String),
    #[error("device.port must be non-zero")]
    ZeroPort,
    #[error("{field} must be a positive number of seconds, got {value}")]
    NonPositiveSeconds { field: &'static str, value: f64 },
    #[error("{field} must be a finite, non-negative number, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("{field} is too large, got {value}")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("analysis.peak_min_distance must be at least 1")]
    ZeroDistance,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MonitorConfig {
    pub device: DeviceConfig,
    pub buffer: BufferConfig,
    pub display: DisplayConfig,
    pub analysis: AnalysisConfig,
    pub reconnect: ReconnectConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeviceConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub credential: String,
    /// Only readings from this entity are buffered when set.
    pub entity_id: Option<String>,
    pub connect_timeout_seconds: f64,
    pub idle_timeout_seconds: f64,
    pub discovery_window_seconds: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.198".to_string(),
            port: 80,
            username: "admin".to_string(),
            credential: String::new(),
            entity_id: None,
            connect_timeout_seconds: 10.0,
            idle_timeout_seconds: 60.0,
            discovery_window_seconds: 1.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BufferConfig {
    pub capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    pub redraw_interval_seconds: f64,
    pub title: String,
    pub y_label: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            redraw_interval_seconds: 1.0,
            title: "Soil Moisture Sensor Data".to_string(),
            y_label: "Moisture (%)".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    pub peak_prominence: f64,
    pub peak_min_distance: usize,
    pub sample_period_seconds: f64,
    pub central_tendency: CentralTendency,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            peak_prominence: 1.0,
            peak_min_distance: 20,
            sample_period_seconds: 0.2,
            central_tendency: CentralTendency::Mean,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectMode {
    #[default]
    Retry,
    Terminate,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReconnectConfig {
    pub policy: ReconnectMode,
    pub delay_seconds: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            policy: ReconnectMode::Retry,
            delay_seconds: 5.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub file: PathBuf,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("soilmon.log"),
            level: "info".to_string(),
        }
    }
}

/// Load configuration from `path` (or `config/soilmon`) and `SOILMON_*` variables.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<MonitorConfig> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name(DEFAULT_CONFIG).required(false),
    };

    let settings = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

fn positive_seconds(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(ConfigError::NonPositiveSeconds { field, value });
    }
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::OutOfRange { field, value })
}

fn non_negative(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

impl MonitorConfig {
    /// Check every setting; the first problem found is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        self.esphome_settings()?;
        self.analysis_settings()?;
        self.reconnect_policy()?;
        self.redraw_interval()?;
        Ok(())
    }

    pub fn events_url(&self) -> Result<Url, ConfigError> {
        let host = self.device.host.trim();
        let invalid = || ConfigError::InvalidHost(self.device.host.clone());

        if host.is_empty() || host.contains(['/', '@', '?', '#']) || host.contains(char::is_whitespace) {
            return Err(invalid());
        }
        if self.device.port == 0 {
            return Err(ConfigError::ZeroPort);
        }

        let url = Url::parse(&format!("http://{}:{}/events", host, self.device.port))
            .map_err(|_| invalid())?;
        if url.port_or_known_default() != Some(self.device.port) {
            return Err(invalid());
        }
        Ok(url)
    }

    pub fn esphome_settings(&self) -> Result<EsphomeSettings, ConfigError> {
        Ok(EsphomeSettings {
            events_url: self.events_url()?,
            username: self.device.username.clone(),
            credential: self.device.credential.clone(),
            connect_timeout: positive_seconds(
                "device.connect_timeout_seconds",
                self.device.connect_timeout_seconds,
            )?,
            idle_timeout: positive_seconds(
                "device.idle_timeout_seconds",
                self.device.idle_timeout_seconds,
            )?,
            discovery_window: positive_seconds(
                "device.discovery_window_seconds",
                self.device.discovery_window_seconds,
            )?,
        })
    }

    pub fn analysis_settings(&self) -> Result<AnalysisSettings, ConfigError> {
        if self.analysis.peak_min_distance == 0 {
            return Err(ConfigError::ZeroDistance);
        }
        positive_seconds(
            "analysis.sample_period_seconds",
            self.analysis.sample_period_seconds,
        )?;

        Ok(AnalysisSettings {
            peak_prominence: non_negative("analysis.peak_prominence", self.analysis.peak_prominence)?,
            peak_min_distance: self.analysis.peak_min_distance,
            sample_period_seconds: self.analysis.sample_period_seconds,
            central_tendency: self.analysis.central_tendency,
        })
    }

    pub fn reconnect_policy(&self) -> Result<ReconnectPolicy, ConfigError> {
        // a zero delay would spin against a device that refuses instantly
        Ok(match self.reconnect.policy {
            ReconnectMode::Terminate => ReconnectPolicy::Terminate,
            ReconnectMode::Retry => ReconnectPolicy::Retry {
                delay: positive_seconds("reconnect.delay_seconds", self.reconnect.delay_seconds)?,
            },
        })
    }

    pub fn redraw_interval(&self) -> Result<Duration, ConfigError> {
        positive_seconds(
            "display.redraw_interval_seconds",
            self.display.redraw_interval_seconds,
        )
    }
}
