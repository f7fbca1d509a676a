// Analysis module - batch segmentation pipeline
//
// This module orchestrates the complete signal pipeline over one loaded
// sample array and produces the Series/Run/Stroke tables.
//
// Architecture:
// - SegmentationPipeline: validated configuration + run loop
// - Pipeline: SeriesDetector → per Series (SignalFilter → Kinematics →
//   RunDetector → PeakDetector → StrokeBoundaryClassifier)
// - Output: PipelineOutput, with derived sample fields written in place
//
// Series are processed sequentially on the caller's thread. Each Series
// writes only its own slice of the sample array. A progress callback is
// polled after every Series; returning `ControlFlow::Break` stops before the
// next one and the output is marked as cancelled. The Series table is always
// complete; samples of unprocessed Series have their derived fields zeroed.

use serde::Serialize;
use std::ops::ControlFlow;
use std::time::Instant;

use crate::config::{AppConfig, StrokeScope};
use crate::error::PipelineError;
use crate::samples::SampleStore;

pub mod curvature;
pub mod filter;
pub mod kinematics;
pub mod peaks;
pub mod runs;
pub mod series;
pub mod strokes;

use curvature::CurvatureWorkspace;
use filter::SignalFilter;
use kinematics::KinematicsCalculator;
use runs::{Run, RunDetector};
use series::{Series, SeriesDetector};
use strokes::{Stroke, StrokeBoundaryClassifier};

/// Reported to the progress callback after each Series
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PipelineProgress {
    pub series_id: u32,
    pub series_done: usize,
    pub series_total: usize,
}

impl PipelineProgress {
    /// Completed fraction (0.0-1.0)
    pub fn fraction(&self) -> f64 {
        if self.series_total == 0 {
            1.0
        } else {
            self.series_done as f64 / self.series_total as f64
        }
    }
}

/// Derived facts of one pipeline run
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineOutput {
    pub series: Vec<Series>,
    pub runs: Vec<Run>,
    pub strokes: Vec<Stroke>,
    /// Seconds per sample used for every derivative
    pub temporal_resolution: f64,
    /// Series whose runs and strokes were computed
    pub series_completed: usize,
    /// True when the progress callback stopped the run early; runs and
    /// strokes then cover the first `series_completed` Series only
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct SegmentationPipeline {
    config: AppConfig,
}

impl SegmentationPipeline {
    pub fn new(config: AppConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run to completion
    pub fn run(&self, store: &mut SampleStore) -> PipelineOutput {
        self.run_with_progress(store, &mut |_| ControlFlow::Continue(()))
    }

    /// Run, polling `progress` between Series
    pub fn run_with_progress(
        &self,
        store: &mut SampleStore,
        progress: &mut dyn FnMut(&PipelineProgress) -> ControlFlow<()>,
    ) -> PipelineOutput {
        let started = Instant::now();
        let dt = store.temporal_resolution(self.config.device.temporal_resolution);
        let spatial = self.config.device.spatial_resolution;

        let series = SeriesDetector::new(&self.config.series).detect(store.samples());
        tracing::info!(
            "[Pipeline] Starting: {} samples, {} series, dt {:.6}s, algorithm {:?}",
            store.len(),
            series.len(),
            dt,
            self.config.strokes.algorithm
        );

        let filter = SignalFilter::new(&self.config.filter);
        let kinematics = KinematicsCalculator::new(spatial, dt);
        let classifier = StrokeBoundaryClassifier::new(&self.config.strokes, spatial, dt);
        let mut run_detector = RunDetector::new();

        let mut output = PipelineOutput {
            series: series.clone(),
            temporal_resolution: dt,
            ..PipelineOutput::default()
        };

        for (done, current) in series.iter().enumerate() {
            let slice = &mut store.samples_mut()[current.range()];
            let smoothing = filter.smooth(slice);
            kinematics.apply(slice);

            let samples = store.samples();
            let runs = run_detector.detect(samples, current);
            let workspace = classifier
                .needs_curvature()
                .then(|| CurvatureWorkspace::new(samples, current.range(), spatial, dt));

            let strokes: Vec<Stroke> = match self.config.strokes.scope {
                StrokeScope::Series => {
                    classifier.classify(samples, current.range(), current.id, workspace.as_ref())
                }
                StrokeScope::Run => runs
                    .iter()
                    .flat_map(|run| {
                        classifier.classify(
                            samples,
                            run.start_ix..=run.end_ix,
                            run.id,
                            workspace.as_ref(),
                        )
                    })
                    .collect(),
            };

            tracing::debug!(
                "[Pipeline] Series {} [{}..={}]: {:?} smoothing, {} runs, {} strokes",
                current.id,
                current.start_ix,
                current.end_ix,
                smoothing,
                runs.len(),
                strokes.len()
            );

            output.series_completed = done + 1;
            output.runs.extend(runs);
            output.strokes.extend(strokes);

            let report = PipelineProgress {
                series_id: current.id,
                series_done: done + 1,
                series_total: series.len(),
            };
            if progress(&report).is_break() && done + 1 < series.len() {
                tracing::info!(
                    "[Pipeline] Cancelled after series {} of {}",
                    done + 1,
                    series.len()
                );
                output.cancelled = true;
                break;
            }
        }

        if let Some(first) = series.get(output.series_completed) {
            if let Some(last) = series.last() {
                store.clear_derived(first.start_ix..=last.end_ix);
            }
        }

        tracing::info!(
            "[Pipeline] Finished in {:.1} ms: {} of {} series, {} runs, {} strokes",
            started.elapsed().as_secs_f64() * 1000.0,
            output.series_completed,
            output.series.len(),
            output.runs.len(),
            output.strokes.len()
        );
        output
    }
}
