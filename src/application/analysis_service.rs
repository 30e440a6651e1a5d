// Analysis service - Post-run periodicity estimate over the collected samples
use crate::domain::peaks::find_peaks;
use crate::domain::period::{peak_intervals, CentralTendency, PeriodReport};
use crate::domain::sample::Sample;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSettings {
    pub peak_prominence: f64,
    pub peak_min_distance: usize,
    /// Time between two consecutive samples on the device, in seconds.
    pub sample_period_seconds: f64,
    pub central_tendency: CentralTendency,
}

#[derive(Debug, Clone)]
pub struct PeriodAnalyzer {
    settings: AnalysisSettings,
}

impl PeriodAnalyzer {
    pub fn new(settings: AnalysisSettings) -> Self {
        Self { settings }
    }

    pub fn analyze(&self, samples: &[Sample]) -> PeriodReport {
        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        let peaks = find_peaks(
            &values,
            self.settings.peak_prominence,
            self.settings.peak_min_distance,
        );
        tracing::debug!("Detected peaks at {:?}", peaks);

        let intervals = peak_intervals(&peaks);
        match self.settings.central_tendency.of(&intervals) {
            Some(avg_interval) => PeriodReport::Periodic {
                samples: samples.len(),
                peak_count: peaks.len(),
                tendency: self.settings.central_tendency,
                avg_interval,
                period_seconds: avg_interval * self.settings.sample_period_seconds,
            },
            None => PeriodReport::Insufficient {
                samples: samples.len(),
                peak_count: peaks.len(),
            },
        }
    }
}
