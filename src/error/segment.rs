// Segment tree error types and constants

use crate::error::ErrorCode;
use crate::segment::SegmentId;
use log::error;
use std::fmt;

/// Segment error code constants
///
/// Single source of truth for the numeric codes reported by segment-tree
/// operations.
///
/// Error code range: 3001-3007
pub struct SegmentErrorCodes {}

impl SegmentErrorCodes {
    /// Requested parent segment does not exist
    pub const UNKNOWN_PARENT: i32 = 3001;

    /// Requested segment does not exist
    pub const UNKNOWN_SEGMENT: i32 = 3002;

    /// Segment is locked against rename/delete
    pub const LOCKED: i32 = 3003;

    /// The root segment cannot be removed or renamed
    pub const ROOT_IMMUTABLE: i32 = 3004;

    /// Start time is after end time, or a bound is not finite
    pub const INVALID_TIME_RANGE: i32 = 3005;

    /// Time range is not inside the parent's time range
    pub const OUTSIDE_PARENT_RANGE: i32 = 3006;

    /// Sample index range is empty or past the end of the array
    pub const INVALID_SAMPLE_RANGE: i32 = 3007;
}

/// Log a segment error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_segment_error(err: &SegmentError, context: &str) {
    error!(
        "Segment error in {}: code={}, component=SegmentTree, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Segment-tree errors
///
/// Every variant describes a rejected operation; the tree and the sample
/// store are left exactly as they were before the call.
///
/// Error code ranges: 3001-3007
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentError {
    /// Parent id does not name a live segment
    UnknownParent { id: SegmentId },

    /// Segment id does not name a live segment
    UnknownSegment { id: SegmentId },

    /// Segment is locked
    Locked { id: SegmentId },

    /// Root segment cannot be removed or renamed
    RootImmutable,

    /// Invalid start/end pair
    InvalidTimeRange { start: f64, end: f64 },

    /// Requested range escapes the parent's range
    OutsideParentRange {
        parent: SegmentId,
        start: f64,
        end: f64,
        parent_start: f64,
        parent_end: f64,
    },

    /// Invalid inclusive sample index range
    InvalidSampleRange { start: usize, end: usize },
}

impl ErrorCode for SegmentError {
    fn code(&self) -> i32 {
        match self {
            SegmentError::UnknownParent { .. } => SegmentErrorCodes::UNKNOWN_PARENT,
            SegmentError::UnknownSegment { .. } => SegmentErrorCodes::UNKNOWN_SEGMENT,
            SegmentError::Locked { .. } => SegmentErrorCodes::LOCKED,
            SegmentError::RootImmutable => SegmentErrorCodes::ROOT_IMMUTABLE,
            SegmentError::InvalidTimeRange { .. } => SegmentErrorCodes::INVALID_TIME_RANGE,
            SegmentError::OutsideParentRange { .. } => SegmentErrorCodes::OUTSIDE_PARENT_RANGE,
            SegmentError::InvalidSampleRange { .. } => SegmentErrorCodes::INVALID_SAMPLE_RANGE,
        }
    }

    fn message(&self) -> String {
        match self {
            SegmentError::UnknownParent { id } => {
                format!("Parent segment {} does not exist", id)
            }
            SegmentError::UnknownSegment { id } => format!("Segment {} does not exist", id),
            SegmentError::Locked { id } => format!("Segment {} is locked", id),
            SegmentError::RootImmutable => "Root segment cannot be modified".to_string(),
            SegmentError::InvalidTimeRange { start, end } => {
                format!("Invalid time range [{}, {}]", start, end)
            }
            SegmentError::OutsideParentRange {
                parent,
                start,
                end,
                parent_start,
                parent_end,
            } => format!(
                "Time range [{}, {}] is outside parent {} range [{}, {}]",
                start, end, parent, parent_start, parent_end
            ),
            SegmentError::InvalidSampleRange { start, end } => {
                format!("Invalid sample index range {}..={}", start, end)
            }
        }
    }
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SegmentError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SegmentError {}
