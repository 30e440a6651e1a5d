// Application layer - Use cases wired against the device port
pub mod analysis_service;
pub mod ingestion_service;
pub mod sensor_device;
