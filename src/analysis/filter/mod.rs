// SignalFilter - per-Series smoothing of the raw pen channels
//
// Two strategies:
// - smoothing (Savitzky–Golay) feeds every downstream kinematic value and
//   writes the `_filtered` sample fields
// - curvature traces (zero-phase Butterworth at 5 Hz and 10 Hz) are only
//   consumed by the velocity+curvature stroke detector and never stored
//
// Raw fields are never modified. Any filter failure degrades to the raw
// signal with a warning.

use log::{debug, warn};
use std::fmt;

use crate::config::FilterConfig;
use crate::samples::Sample;

pub mod butterworth;
pub mod savgol;

pub use butterworth::ButterworthLowpass;
pub use savgol::SavitzkyGolay;

/// Window/order used when a Series is shorter than the primary window
pub const FALLBACK_WINDOW: usize = 5;
pub const FALLBACK_ORDER: usize = 3;
/// Series must be longer than this to use the fallback window
pub const FALLBACK_MIN_LEN: usize = 10;

pub const CURVATURE_FILTER_ORDER: usize = 4;
pub const CURVATURE_CUTOFF_LOW_HZ: f64 = 5.0;
pub const CURVATURE_CUTOFF_HIGH_HZ: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    TooShort { len: usize, required: usize },
    InvalidParameters(String),
    NonFinite,
    Singular,
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::TooShort { len, required } => {
                write!(f, "signal of {} samples, need at least {}", len, required)
            }
            FilterError::InvalidParameters(detail) => write!(f, "invalid parameters: {}", detail),
            FilterError::NonFinite => write!(f, "signal contains non-finite values"),
            FilterError::Singular => write!(f, "singular fit matrix"),
        }
    }
}

impl std::error::Error for FilterError {}

/// Which smoothing path a Series went through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Smoothing {
    Primary,
    Fallback,
    PassThrough,
}

#[derive(Debug, Clone)]
pub struct SignalFilter {
    enabled: bool,
    primary: Option<SavitzkyGolay>,
    fallback: Option<SavitzkyGolay>,
}

impl SignalFilter {
    pub fn new(config: &FilterConfig) -> Self {
        let primary = SavitzkyGolay::new(config.savgol_window_length, config.savgol_poly_order)
            .map_err(|err| warn!("[SignalFilter] Primary smoothing window unusable: {}", err))
            .ok();
        let fallback = SavitzkyGolay::new(FALLBACK_WINDOW, FALLBACK_ORDER).ok();

        Self {
            enabled: config.filter_imported_pen_data,
            primary,
            fallback,
        }
    }

    /// Write `x/y/pressure_filtered` for one Series slice
    pub fn smooth(&self, series: &mut [Sample]) -> Smoothing {
        let n = series.len();
        let chosen = if !self.enabled {
            None
        } else {
            match (&self.primary, &self.fallback) {
                (Some(primary), _) if n >= primary.window() => Some((primary, Smoothing::Primary)),
                (_, Some(fallback)) if n > FALLBACK_MIN_LEN => {
                    Some((fallback, Smoothing::Fallback))
                }
                _ => None,
            }
        };

        let Some((filter, mode)) = chosen else {
            pass_through(series);
            return Smoothing::PassThrough;
        };

        let x: Vec<f64> = series.iter().map(|s| s.x as f64).collect();
        let y: Vec<f64> = series.iter().map(|s| s.y as f64).collect();
        let p: Vec<f64> = series.iter().map(|s| s.pressure as f64).collect();

        let smoothed = filter
            .apply(&x)
            .and_then(|fx| Ok((fx, filter.apply(&y)?, filter.apply(&p)?)));

        match smoothed {
            Ok((fx, fy, fp)) => {
                for (i, sample) in series.iter_mut().enumerate() {
                    sample.x_filtered = fx[i];
                    sample.y_filtered = fy[i];
                    sample.pressure_filtered = fp[i].max(0.0);
                }
                debug!(
                    "[SignalFilter] Smoothed {} samples ({:?}, window {})",
                    n,
                    mode,
                    filter.window()
                );
                mode
            }
            Err(err) => {
                warn!(
                    "[SignalFilter] Smoothing failed on {} samples ({}), using raw values",
                    n, err
                );
                pass_through(series);
                Smoothing::PassThrough
            }
        }
    }
}

fn pass_through(series: &mut [Sample]) {
    for sample in series.iter_mut() {
        sample.x_filtered = sample.x as f64;
        sample.y_filtered = sample.y as f64;
        sample.pressure_filtered = (sample.pressure as f64).max(0.0);
    }
}

/// Two low-passed copies of a Series' x/y trace
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurvatureTraces {
    pub x_low: Vec<f64>,
    pub y_low: Vec<f64>,
    pub x_high: Vec<f64>,
    pub y_high: Vec<f64>,
}

impl CurvatureTraces {
    /// Filter raw x/y of `series` at the low and high cutoff
    ///
    /// Pad length is `min(series length, sampling rate)`. A trace whose
    /// filter fails is replaced by the raw signal.
    pub fn compute(series: &[Sample], sample_rate: f64) -> Self {
        let x: Vec<f64> = series.iter().map(|s| s.x as f64).collect();
        let y: Vec<f64> = series.iter().map(|s| s.y as f64).collect();
        let pad = series.len().min(sample_rate.max(0.0).round() as usize);

        let lowpass = |signal: &[f64], cutoff: f64| -> Vec<f64> {
            ButterworthLowpass::new(CURVATURE_FILTER_ORDER, cutoff, sample_rate)
                .and_then(|filter| filter.filtfilt(signal, pad))
                .unwrap_or_else(|err| {
                    warn!(
                        "[SignalFilter] {} Hz low-pass failed on {} samples ({}), using raw trace",
                        cutoff,
                        signal.len(),
                        err
                    );
                    signal.to_vec()
                })
        };

        Self {
            x_low: lowpass(&x, CURVATURE_CUTOFF_LOW_HZ),
            y_low: lowpass(&y, CURVATURE_CUTOFF_LOW_HZ),
            x_high: lowpass(&x, CURVATURE_CUTOFF_HIGH_HZ),
            y_high: lowpass(&y, CURVATURE_CUTOFF_HIGH_HZ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::{PenState, RawSample};

    fn series(len: usize) -> Vec<Sample> {
        (0..len)
            .map(|i| {
                Sample::from(RawSample {
                    time: i as f64 / 100.0,
                    x: (i as i32) * 10 + if i % 2 == 0 { 3 } else { -3 },
                    y: 500,
                    pressure: if i % 3 == 0 { 0 } else { 20 },
                    state: PenState::NONE,
                })
            })
            .collect()
    }

    #[test]
    fn test_window_selection_by_series_length() {
        let filter = SignalFilter::new(&FilterConfig::default());

        let mut long = series(40);
        assert_eq!(filter.smooth(&mut long), Smoothing::Primary);

        let mut medium = series(12);
        assert_eq!(filter.smooth(&mut medium), Smoothing::Fallback);

        let mut short = series(10);
        assert_eq!(filter.smooth(&mut short), Smoothing::PassThrough);
        assert_eq!(short[3].x_filtered, short[3].x as f64);
    }

    #[test]
    fn test_disabled_filter_copies_raw_values() {
        let config = FilterConfig {
            filter_imported_pen_data: false,
            ..FilterConfig::default()
        };
        let mut samples = series(40);
        assert_eq!(
            SignalFilter::new(&config).smooth(&mut samples),
            Smoothing::PassThrough
        );
        for s in &samples {
            assert_eq!(s.x_filtered, s.x as f64);
            assert_eq!(s.pressure_filtered, s.pressure as f64);
        }
    }

    #[test]
    fn test_pass_through_clamps_negative_pressure() {
        let mut short = series(6);
        short[1].pressure = -3;
        assert_eq!(
            SignalFilter::new(&FilterConfig::default()).smooth(&mut short),
            Smoothing::PassThrough
        );
        assert_eq!(short[1].pressure_filtered, 0.0);
        assert_eq!(short[2].pressure_filtered, 20.0);
        assert_eq!(short[1].pressure, -3);
    }

    #[test]
    fn test_smoothing_keeps_raw_fields_and_clamps_pressure() {
        let mut samples = series(40);
        let before = samples.clone();
        SignalFilter::new(&FilterConfig::default()).smooth(&mut samples);

        for (s, b) in samples.iter().zip(&before) {
            assert_eq!((s.x, s.y, s.pressure), (b.x, b.y, b.pressure));
            assert!(s.pressure_filtered >= 0.0);
            assert!((s.y_filtered - 500.0).abs() < 1e-6);
        }
        // Zig-zag jitter is flattened
        let jitter: f64 = samples[10..30]
            .windows(2)
            .map(|w| ((w[1].x_filtered - w[0].x_filtered) - 10.0).abs())
            .sum();
        assert!(jitter < 20.0, "residual jitter {}", jitter);
    }

    #[test]
    fn test_curvature_traces_fall_back_on_single_sample() {
        let samples = series(1);
        let traces = CurvatureTraces::compute(&samples, 100.0);
        assert_eq!(traces.x_low, vec![samples[0].x as f64]);
        assert_eq!(traces.y_high, vec![500.0]);
    }

    #[test]
    fn test_curvature_traces_have_series_length() {
        let samples = series(64);
        let traces = CurvatureTraces::compute(&samples, 100.0);
        assert_eq!(traces.x_low.len(), 64);
        assert_eq!(traces.x_high.len(), 64);
        // Constant y stays constant
        assert!(traces.y_low.iter().all(|v| (v - 500.0).abs() < 1e-6));
    }
}
