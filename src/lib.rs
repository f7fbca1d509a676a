// Pen Segmenter Core - digitizer trace segmentation engine
// Batch pipeline turning raw pen samples into Series, Runs, Strokes and a
// hierarchical segment tree

// Module declarations
pub mod analysis;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod project;
pub mod report;
pub mod samples;
pub mod segment;
pub mod testing;

// Re-exports for convenience
pub use analysis::runs::Run;
pub use analysis::series::Series;
pub use analysis::strokes::{Stroke, StrokeKey, StrokeKind};
pub use analysis::{PipelineOutput, PipelineProgress, SegmentationPipeline};
pub use config::AppConfig;
pub use error::{ErrorCode, PipelineError, SegmentError};
pub use project::Project;
pub use samples::{PenState, RawSample, Sample, SampleStore};
pub use segment::{Query, Segment, SegmentExtent, SegmentId, SegmentTree};

/// Install the fmt subscriber used by binaries and integration tests
///
/// Events go to stderr so JSON on stdout stays clean; a second call is
/// ignored.
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}
