// Error types for the pen segmentation engine
//
// This module defines custom error types for pipeline and segment-tree
// operations, providing structured error handling with stable error codes
// that report generators and the CLI can surface unchanged.

mod pipeline;
mod segment;

pub use pipeline::{log_pipeline_error, PipelineError, PipelineErrorCodes};
pub use segment::{log_segment_error, SegmentError, SegmentErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the library and CLI boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
