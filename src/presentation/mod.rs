// Presentation layer - Terminal chart and console output
pub mod chart_view;
pub mod dashboard;
pub mod report;
