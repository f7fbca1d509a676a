//! Configuration management for the segmentation pipeline
//!
//! This module provides runtime configuration loading from JSON files so
//! that filter, device and stroke-detection parameters can be tuned per
//! recording setup without recompilation. Field names follow the pipeline's
//! option names (e.g. `stroke_detect_min_stroke_length`), which are accepted
//! as aliases of the shorter per-section names.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::PipelineError;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub series: SeriesDetectionConfig,
    #[serde(default)]
    pub strokes: StrokeDetectionConfig,
    #[serde(default)]
    pub segments: SegmentConfig,
}

/// Savitzky–Golay smoothing parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilterConfig {
    /// Smooth x/y/pressure before kinematics; raw copies otherwise
    pub filter_imported_pen_data: bool,
    /// Primary window length in samples (odd)
    #[serde(alias = "filter_window_length")]
    pub savgol_window_length: usize,
    /// Polynomial order of the primary window
    #[serde(alias = "filter_poly_order")]
    pub savgol_poly_order: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            filter_imported_pen_data: true,
            savgol_window_length: 15,
            savgol_poly_order: 5,
        }
    }
}

/// Digitizer characteristics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device units per millimetre
    #[serde(alias = "device_spatial_resolution")]
    pub spatial_resolution: f64,
    /// Seconds between samples; 0 means estimate from the data
    #[serde(alias = "device_temporal_resolution")]
    pub temporal_resolution: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            spatial_resolution: 100.0,
            temporal_resolution: 0.0,
        }
    }
}

/// Series detection parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SeriesDetectionConfig {
    /// Start a new Series after a sampling gap longer than this; 0 disables
    #[serde(alias = "series_detect_max_isi_msec")]
    pub max_isi_msec: f64,
}

/// Which trace the stroke detector searches for boundary candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokeAlgorithm {
    /// Extrema of `xy_velocity`
    Velocity,
    /// Velocity minima confirmed by a heading-angle change
    #[serde(alias = "velocity+curvature")]
    VelocityCurvature,
    /// Extrema of `y_filtered`
    YFiltered,
}

/// Plateau resolution for the peak detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgePolicy {
    /// Plateaus are ambiguous and dropped
    None,
    /// First index of a plateau
    Rising,
    /// Last index of a plateau
    Falling,
    /// First and last index of a plateau
    Both,
}

/// Which extrema become boundary candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtremaKind {
    Peak,
    Valley,
    Both,
}

/// Range that one stroke detection pass covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokeScope {
    Series,
    Run,
}

/// Stroke detection parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StrokeDetectionConfig {
    #[serde(alias = "stroke_detect_algorithm")]
    pub algorithm: StrokeAlgorithm,
    #[serde(alias = "stroke_detect_edge_type")]
    pub edge_type: EdgePolicy,
    #[serde(alias = "stroke_detect_peak_or_valley")]
    pub peak_or_valley: ExtremaKind,
    /// Minimum index distance between accepted extrema
    #[serde(alias = "stroke_detect_min_p2p_sample_count")]
    pub min_p2p_sample_count: usize,
    /// Arc length (mm) looked back/ahead of a candidate for heading angles
    #[serde(alias = "stroke_detect_inter_sample_distance")]
    pub inter_sample_distance: f64,
    /// Minimum |dalpha| in degrees for a curvature boundary
    #[serde(alias = "stroke_detect_abs_dalpha_thresh")]
    pub abs_dalpha_thresh: f64,
    /// Minimum arc length (mm) of a MOTION stroke
    #[serde(alias = "stroke_detect_min_stroke_length")]
    pub min_stroke_length: f64,
    /// Minimum mean velocity (mm/s) of a MOTION stroke
    #[serde(alias = "stroke_detect_min_stroke_velocity")]
    pub min_stroke_velocity: f64,
    pub scope: StrokeScope,
}

impl Default for StrokeDetectionConfig {
    fn default() -> Self {
        Self {
            algorithm: StrokeAlgorithm::Velocity,
            edge_type: EdgePolicy::Rising,
            peak_or_valley: ExtremaKind::Valley,
            min_p2p_sample_count: 5,
            inter_sample_distance: 0.5,
            abs_dalpha_thresh: 45.0,
            min_stroke_length: 0.25,
            min_stroke_velocity: 2.0,
            scope: StrokeScope::Series,
        }
    }
}

/// Segment creation parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmentConfig {
    /// Trim hover samples off both ends of a new segment's index range
    #[serde(alias = "new_segment_trim_0_pressure_points")]
    pub trim_zero_pressure_points: bool,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            trim_zero_pressure_points: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing or
    /// the JSON is invalid (the failure is logged).
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Reject values that would make the pipeline meaningless
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.filter.savgol_window_length < 3 {
            return Err(PipelineError::invalid_config(
                "filter.savgol_window_length",
                "must be >= 3",
            ));
        }
        if self.filter.savgol_poly_order >= self.filter.savgol_window_length {
            return Err(PipelineError::invalid_config(
                "filter.savgol_poly_order",
                format!(
                    "must be smaller than the window length ({})",
                    self.filter.savgol_window_length
                ),
            ));
        }
        if !(self.device.spatial_resolution.is_finite() && self.device.spatial_resolution > 0.0) {
            return Err(PipelineError::invalid_config(
                "device.spatial_resolution",
                "must be a positive number",
            ));
        }
        if self.device.temporal_resolution < 0.0 {
            return Err(PipelineError::invalid_config(
                "device.temporal_resolution",
                "must be >= 0 (0 = estimate)",
            ));
        }
        if self.series.max_isi_msec < 0.0 {
            return Err(PipelineError::invalid_config(
                "series.max_isi_msec",
                "must be >= 0 (0 = disabled)",
            ));
        }
        if self.strokes.min_p2p_sample_count == 0 {
            return Err(PipelineError::invalid_config(
                "strokes.min_p2p_sample_count",
                "must be >= 1",
            ));
        }
        let thresholds = [
            ("strokes.inter_sample_distance", self.strokes.inter_sample_distance),
            ("strokes.abs_dalpha_thresh", self.strokes.abs_dalpha_thresh),
            ("strokes.min_stroke_length", self.strokes.min_stroke_length),
            ("strokes.min_stroke_velocity", self.strokes.min_stroke_velocity),
        ];
        for (field, value) in thresholds {
            if !(value.is_finite() && value >= 0.0) {
                return Err(PipelineError::invalid_config(
                    field,
                    "must be a finite number >= 0",
                ));
            }
        }
        Ok(())
    }
}
