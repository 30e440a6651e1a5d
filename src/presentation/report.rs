// Console report - Final analysis text printed after the dashboard closes
use crate::domain::period::PeriodReport;
use std::fmt;

impl fmt::Display for PeriodReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodReport::Insufficient { .. } => {
                write!(f, "Not enough peaks detected to calculate an average interval.")
            }
            PeriodReport::Periodic {
                peak_count,
                avg_interval,
                period_seconds,
                ..
            } => {
                writeln!(f, "Detected {} peaks.", peak_count)?;
                writeln!(f, "Average number of samples between peaks: {:.2}", avg_interval)?;
                write!(f, "Average period time: {:.2} s", period_seconds)
            }
        }
    }
}
