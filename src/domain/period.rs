// Period domain model - Interval statistics over detected peaks
use serde::Deserialize;
use std::fmt;

/// How consecutive peak intervals are summarised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CentralTendency {
    #[default]
    Mean,
    Median,
}

impl CentralTendency {
    /// Central value of `values`, or `None` when there is nothing to summarise.
    pub fn of(self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }

        match self {
            CentralTendency::Mean => Some(values.iter().sum::<f64>() / values.len() as f64),
            CentralTendency::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(f64::total_cmp);
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    Some((sorted[mid - 1] + sorted[mid]) / 2.0)
                } else {
                    Some(sorted[mid])
                }
            }
        }
    }
}

impl fmt::Display for CentralTendency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CentralTendency::Mean => f.write_str("mean"),
            CentralTendency::Median => f.write_str("median"),
        }
    }
}

/// Outcome of the post-run periodicity analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum PeriodReport {
    Insufficient {
        samples: usize,
        peak_count: usize,
    },
    Periodic {
        samples: usize,
        peak_count: usize,
        tendency: CentralTendency,
        /// Central interval between peaks, in samples.
        avg_interval: f64,
        period_seconds: f64,
    },
}

impl PeriodReport {
    pub fn samples(&self) -> usize {
        match self {
            PeriodReport::Insufficient { samples, .. } => *samples,
            PeriodReport::Periodic { samples, .. } => *samples,
        }
    }

    pub fn peak_count(&self) -> usize {
        match self {
            PeriodReport::Insufficient { peak_count, .. } => *peak_count,
            PeriodReport::Periodic { peak_count, .. } => *peak_count,
        }
    }
}

/// Gaps between consecutive peak positions.
pub fn peak_intervals(peaks: &[usize]) -> Vec<f64> {
    peaks.windows(2).map(|w| (w[1] - w[0]) as f64).collect()
}
