// Main entry point - Dependency injection and session lifecycle
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Context;

use crate::application::analysis_service::PeriodAnalyzer;
use crate::application::ingestion_service::IngestionWorker;
use crate::domain::period::PeriodReport;
use crate::domain::sample::SampleBuffer;
use crate::infrastructure::config::load_config;
use crate::infrastructure::esphome_client::EsphomeEventClient;
use crate::infrastructure::logging::init_tracing;
use crate::presentation::dashboard::Dashboard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load and validate configuration; nothing interactive starts on failure
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = load_config(config_path.as_deref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    // Initialize tracing
    init_tracing(&config.logging)?;

    // Shared sample buffer (domain layer)
    let buffer = Arc::new(SampleBuffer::new(config.buffer.capacity)?);

    // Device adapter and ingestion worker (infrastructure + application layers)
    let device = EsphomeEventClient::new(config.esphome_settings()?)?;
    let (worker, status) = IngestionWorker::new(
        device,
        buffer.clone(),
        config.reconnect_policy()?,
        config.device.entity_id.clone(),
    );
    tracing::info!("Starting ingestion from {}", config.events_url()?);
    let ingestion = tokio::spawn(worker.run());

    // Terminal dashboard blocks until the user closes it (presentation layer)
    let mut dashboard = Dashboard::new(
        buffer.clone(),
        status,
        config.display.clone(),
        config.redraw_interval()?,
    );
    let ui_result = tokio::task::spawn_blocking(move || dashboard.run()).await;

    ingestion.abort();

    // Post-run analysis always runs, whatever happened to the link or the terminal
    let analyzer = PeriodAnalyzer::new(config.analysis_settings()?);
    if buffer.is_empty() {
        tracing::warn!("No samples were collected during the session");
    }
    let report = analyzer.analyze(&buffer.snapshot());
    tracing::info!(
        "Analysed {} samples, {} peaks",
        report.samples(),
        report.peak_count()
    );
    if let PeriodReport::Periodic { tendency, avg_interval, .. } = &report {
        tracing::info!("Peak interval ({}): {:.2} samples", tendency, avg_interval);
    }
    println!("{}", report);

    ui_result
        .context("Dashboard thread panicked")?
        .context("Terminal dashboard failed")?;

    Ok(())
}
