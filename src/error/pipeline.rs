// Pipeline error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Pipeline error code constants
///
/// Error code range: 4001-4002
pub struct PipelineErrorCodes {}

impl PipelineErrorCodes {
    /// A configuration value cannot drive the pipeline
    pub const INVALID_CONFIG: i32 = 4001;

    /// Sample times decrease somewhere in a normalized array
    pub const NON_MONOTONIC_TIME: i32 = 4002;
}

/// Log a pipeline error with structured context
pub fn log_pipeline_error(err: &PipelineError, context: &str) {
    error!(
        "Pipeline error in {}: code={}, component=SegmentationPipeline, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised before any derived field is written
///
/// Degenerate data (short Series, failed filters, missing candidates) is
/// handled by fallbacks and never reaches this type.
///
/// Error code ranges: 4001-4002
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Configuration value rejected by validation
    InvalidConfig { field: String, reason: String },

    /// Time column decreases at `index`
    NonMonotonicTime { index: usize },
}

impl PipelineError {
    pub(crate) fn invalid_config(field: &str, reason: impl Into<String>) -> Self {
        PipelineError::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl ErrorCode for PipelineError {
    fn code(&self) -> i32 {
        match self {
            PipelineError::InvalidConfig { .. } => PipelineErrorCodes::INVALID_CONFIG,
            PipelineError::NonMonotonicTime { .. } => PipelineErrorCodes::NON_MONOTONIC_TIME,
        }
    }

    fn message(&self) -> String {
        match self {
            PipelineError::InvalidConfig { field, reason } => {
                format!("Invalid config value for {}: {}", field, reason)
            }
            PipelineError::NonMonotonicTime { index } => {
                format!("Sample time decreases at index {}", index)
            }
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PipelineError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for PipelineError {}
