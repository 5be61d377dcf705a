//! Per-conversion phase timings

use std::time::{Duration, Instant};

/// Timing information for one conversion
#[derive(Debug)]
pub struct ConversionMetrics {
    item: String,
    start: Instant,
    phases: Vec<(String, Duration)>,
}

impl ConversionMetrics {
    /// Start measuring a conversion of `item`
    pub fn new(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            start: Instant::now(),
            phases: Vec::new(),
        }
    }

    /// Add a phase timing
    pub fn add_phase(&mut self, name: impl Into<String>, duration: Duration) {
        self.phases.push((name.into(), duration));
    }

    /// Time a closure and record it as a phase
    pub fn time_phase<F, R>(&mut self, name: impl Into<String>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let phase_start = Instant::now();
        let result = f();
        self.phases.push((name.into(), phase_start.elapsed()));
        result
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn phases(&self) -> &[(String, Duration)] {
        &self.phases
    }

    /// Hand the recorded phases over, e.g. to a report
    pub fn into_phases(self) -> Vec<(String, Duration)> {
        self.phases
    }

    /// Format a duration for display
    pub fn format_duration(d: Duration) -> String {
        let ms = d.as_secs_f64() * 1000.0;
        if ms < 1.0 {
            format!("{}µs", d.as_micros())
        } else if ms < 1000.0 {
            format!("{:.2}ms", ms)
        } else {
            format!("{:.2}s", d.as_secs_f64())
        }
    }

    /// Generate a formatted timing report
    pub fn report(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("=== Conversion: {} ===", self.item));
        lines.push(format!(
            "Total elapsed: {}",
            Self::format_duration(self.elapsed())
        ));

        if !self.phases.is_empty() {
            lines.push(String::new());
            lines.push("--- Phases ---".to_string());
            for (name, duration) in &self.phases {
                lines.push(format!(
                    "  {:<20} {:>10}",
                    name,
                    Self::format_duration(*duration)
                ));
            }
        }

        lines.push("=".repeat(40));
        lines.join("\n")
    }

    /// Log the report at debug level
    pub fn log_report(&self) {
        for line in self.report().lines() {
            if line.is_empty() {
                continue;
            }
            tracing::debug!("{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_phase_records_in_order() {
        let mut metrics = ConversionMetrics::new("app.xapk");
        let value = metrics.time_phase("inspect", || 41 + 1);
        metrics.add_phase("repack", Duration::from_millis(3));

        assert_eq!(value, 42);
        let names: Vec<_> = metrics.phases().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["inspect", "repack"]);

        let report = metrics.report();
        assert!(report.contains("app.xapk"));
        assert!(report.contains("repack"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(
            ConversionMetrics::format_duration(Duration::from_millis(1500)),
            "1.50s"
        );
        assert_eq!(
            ConversionMetrics::format_duration(Duration::from_millis(20)),
            "20.00ms"
        );
        assert_eq!(
            ConversionMetrics::format_duration(Duration::from_micros(5)),
            "5µs"
        );
    }
}
