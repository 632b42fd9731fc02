//! Timestamp smoothing by linear regression over a sliding window.
//!
//! Frame grabbers and trackers deliver samples at a nominally constant rate
//! but stamp them with jittery host times. Fitting `raw_time ≈ a * index + b`
//! over the recent window recovers the underlying constant-rate clock; the
//! fitted value at the incoming index becomes the filtered timestamp.

use std::collections::VecDeque;

/// Default number of recent (frame index, raw time) pairs retained.
pub const DEFAULT_FILTER_WINDOW: usize = 20;

/// Residuals beyond this many standard deviations flag the sample invalid.
const OUTLIER_SIGMA: f64 = 3.0;
/// Absolute residual floor so tiny warm-up windows do not reject everything.
const OUTLIER_FLOOR_SEC: f64 = 1e-3;

/// Result of filtering one (frame index, raw time) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilteredTimestamp {
    /// The smoothed timestamp.
    pub time: f64,
    /// False when the raw pair looks like an outlier (jittery stamp or
    /// non-increasing frame index); the caller should drop the sample.
    pub probably_valid: bool,
}

/// One diagnostic record of the filter's behaviour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimestampReportEntry {
    pub frame_index: u64,
    pub raw_time: f64,
    pub filtered_time: f64,
}

/// Sliding-window timestamp filter.
#[derive(Debug, Clone)]
pub struct TimestampFilter {
    window_size: usize,
    window: VecDeque<(u64, f64)>,
    reporting: bool,
    report: Vec<TimestampReportEntry>,
}

impl TimestampFilter {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            window: VecDeque::with_capacity(window_size.max(1)),
            reporting: false,
            report: Vec::new(),
        }
    }

    /// Number of recent pairs retained for the fit.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Change the window size. Shrinking evicts the oldest pairs.
    pub fn set_window_size(&mut self, window_size: usize) {
        self.window_size = window_size;
        while self.window.len() > window_size.max(1) {
            self.window.pop_front();
        }
    }

    /// Toggle recording of (index, raw, filtered) triples.
    pub fn set_reporting(&mut self, enable: bool) {
        self.reporting = enable;
        if !enable {
            self.report.clear();
        }
    }

    pub fn reporting(&self) -> bool {
        self.reporting
    }

    /// Recorded diagnostic triples, oldest first.
    pub fn report(&self) -> &[TimestampReportEntry] {
        &self.report
    }

    /// Record a triple for a sample whose filtered time was supplied by the
    /// producer instead of computed here.
    pub fn add_to_report(&mut self, frame_index: u64, raw_time: f64, filtered_time: f64) {
        if self.reporting {
            self.report.push(TimestampReportEntry {
                frame_index,
                raw_time,
                filtered_time,
            });
        }
    }

    /// Drop the window contents (not the report).
    pub fn clear(&mut self) {
        self.window.clear();
    }

    /// Map a raw (frame index, raw time) pair to a filtered timestamp.
    pub fn filter(&mut self, frame_index: u64, raw_time: f64) -> FilteredTimestamp {
        let index_increased = self
            .window
            .back()
            .map(|&(last_index, _)| frame_index > last_index)
            .unwrap_or(true);

        self.window.push_back((frame_index, raw_time));
        while self.window.len() > self.window_size.max(1) {
            self.window.pop_front();
        }

        // A regression needs at least two points; until then (or when
        // smoothing is disabled with a window of one) the raw time passes
        // through.
        if self.window_size <= 1 || self.window.len() < 2 {
            let result = FilteredTimestamp {
                time: raw_time,
                probably_valid: index_increased,
            };
            self.add_to_report(frame_index, raw_time, result.time);
            return result;
        }

        let (slope, intercept) = match self.fit_line() {
            Some(fit) => fit,
            None => {
                // Degenerate window (all identical indices): cannot fit.
                let result = FilteredTimestamp {
                    time: raw_time,
                    probably_valid: false,
                };
                self.add_to_report(frame_index, raw_time, result.time);
                return result;
            }
        };

        let predicted = slope * frame_index as f64 + intercept;
        let residual = (predicted - raw_time).abs();
        let threshold = (OUTLIER_SIGMA * self.residual_stddev(slope, intercept))
            .max(OUTLIER_FLOOR_SEC);

        let result = FilteredTimestamp {
            time: predicted,
            probably_valid: index_increased && residual <= threshold,
        };
        self.add_to_report(frame_index, raw_time, result.time);
        result
    }

    /// Least-squares fit of `time = slope * index + intercept` over the
    /// window. `None` when the indices carry no spread.
    fn fit_line(&self) -> Option<(f64, f64)> {
        let n = self.window.len() as f64;
        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        let mut sum_xx = 0.0;
        let mut sum_xy = 0.0;
        for &(index, time) in &self.window {
            let x = index as f64;
            sum_x += x;
            sum_y += time;
            sum_xx += x * x;
            sum_xy += x * time;
        }
        let denom = n * sum_xx - sum_x * sum_x;
        if denom.abs() < f64::EPSILON {
            return None;
        }
        let slope = (n * sum_xy - sum_x * sum_y) / denom;
        let intercept = (sum_y - slope * sum_x) / n;
        Some((slope, intercept))
    }

    fn residual_stddev(&self, slope: f64, intercept: f64) -> f64 {
        let n = self.window.len();
        if n < 2 {
            return 0.0;
        }
        let sum_sq: f64 = self
            .window
            .iter()
            .map(|&(index, time)| {
                let r = time - (slope * index as f64 + intercept);
                r * r
            })
            .sum();
        (sum_sq / (n - 1) as f64).sqrt()
    }
}

impl Default for TimestampFilter {
    fn default() -> Self {
        Self::new(DEFAULT_FILTER_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_passes_through() {
        let mut filter = TimestampFilter::new(10);
        let out = filter.filter(0, 5.0);
        assert_eq!(out.time, 5.0);
        assert!(out.probably_valid);
    }

    #[test]
    fn test_perfect_clock_is_preserved() {
        let mut filter = TimestampFilter::new(10);
        for i in 0..20u64 {
            let t = 100.0 + i as f64 * 0.033;
            let out = filter.filter(i, t);
            assert!(out.probably_valid, "sample {i} flagged invalid");
            assert!((out.time - t).abs() < 1e-9, "sample {i} moved by {}", out.time - t);
        }
    }

    #[test]
    fn test_jitter_is_smoothed() {
        let mut filter = TimestampFilter::new(20);
        let mut worst_raw = 0.0f64;
        let mut worst_filtered = 0.0f64;
        for i in 0..40u64 {
            let ideal = i as f64 * 0.01;
            // deterministic sub-threshold jitter
            let jitter = if i % 2 == 0 { 2e-4 } else { -2e-4 };
            let out = filter.filter(i, ideal + jitter);
            assert!(out.probably_valid);
            if i >= 20 {
                worst_raw = worst_raw.max(jitter.abs());
                worst_filtered = worst_filtered.max((out.time - ideal).abs());
            }
        }
        assert!(worst_filtered < worst_raw);
    }

    #[test]
    fn test_large_outlier_is_flagged() {
        let mut filter = TimestampFilter::new(20);
        for i in 0..20u64 {
            filter.filter(i, i as f64 * 0.01);
        }
        // A stamp half a second off the fitted line is not plausible
        let out = filter.filter(20, 20.0 * 0.01 + 0.5);
        assert!(!out.probably_valid);
    }

    #[test]
    fn test_non_increasing_index_is_flagged() {
        let mut filter = TimestampFilter::new(10);
        filter.filter(5, 0.05);
        let out = filter.filter(5, 0.06);
        assert!(!out.probably_valid);
        let out = filter.filter(4, 0.07);
        assert!(!out.probably_valid);
    }

    #[test]
    fn test_window_of_one_disables_smoothing() {
        let mut filter = TimestampFilter::new(1);
        filter.filter(0, 1.0);
        let out = filter.filter(1, 42.5);
        assert_eq!(out.time, 42.5);
        assert!(out.probably_valid);
    }

    #[test]
    fn test_report_records_triples() {
        let mut filter = TimestampFilter::new(10);
        filter.set_reporting(true);
        filter.filter(0, 1.0);
        filter.add_to_report(1, 2.0, 2.5);
        let report = filter.report();
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].frame_index, 0);
        assert_eq!(report[1].filtered_time, 2.5);
    }

    #[test]
    fn test_reporting_disabled_by_default() {
        let mut filter = TimestampFilter::default();
        filter.filter(0, 1.0);
        assert!(filter.report().is_empty());
    }
}
