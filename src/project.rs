// Project - explicit context for one loaded recording
//
// Owns the sample array, the configuration it was processed with, the
// pipeline output, the segment tree and the reverse-lookup tables. Every
// query and mutation goes through a `&Project` / `&mut Project`, so there is
// exactly one logical owner of the segmentation state at a time.

use log::info;
use std::ops::ControlFlow;

use crate::analysis::runs::Run;
use crate::analysis::series::Series;
use crate::analysis::strokes::{Stroke, StrokeKey, StrokeKind};
use crate::analysis::{PipelineOutput, PipelineProgress, SegmentationPipeline};
use crate::config::AppConfig;
use crate::error::{log_pipeline_error, log_segment_error, PipelineError, SegmentError};
use crate::samples::{RawSample, Sample, SampleStore};
use crate::segment::{Query, Segment, SegmentExtent, SegmentId, SegmentTree, SpanTable};

#[derive(Debug)]
pub struct Project {
    name: String,
    pipeline: SegmentationPipeline,
    store: SampleStore,
    output: PipelineOutput,
    tree: SegmentTree,
    runs: SpanTable<Run>,
    strokes: SpanTable<Stroke>,
}

impl Project {
    /// Normalize `rows`, run the pipeline and create the root segment
    pub fn load(
        name: &str,
        rows: Vec<RawSample>,
        config: AppConfig,
    ) -> Result<Self, PipelineError> {
        Self::from_store(name, SampleStore::from_raw(rows), config)
    }

    /// Same as [`Project::load`] for an array that is already normalized
    pub fn from_samples(
        name: &str,
        samples: Vec<Sample>,
        config: AppConfig,
    ) -> Result<Self, PipelineError> {
        Self::from_store(name, SampleStore::from_normalized(samples)?, config)
    }

    fn from_store(
        name: &str,
        mut store: SampleStore,
        config: AppConfig,
    ) -> Result<Self, PipelineError> {
        let pipeline = SegmentationPipeline::new(config).map_err(|err| {
            log_pipeline_error(&err, "Project::load");
            err
        })?;
        let output = pipeline.run(&mut store);
        let tree = SegmentTree::new(name, &mut store);
        let (runs, strokes) = lookup_tables(&output, store.len());

        info!(
            "[Project] Loaded '{}': {} samples, {} series, {} runs, {} strokes",
            name,
            store.len(),
            output.series.len(),
            output.runs.len(),
            output.strokes.len()
        );

        Ok(Self {
            name: name.to_string(),
            pipeline,
            store,
            output,
            tree,
            runs,
            strokes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &AppConfig {
        self.pipeline.config()
    }

    pub fn store(&self) -> &SampleStore {
        &self.store
    }

    pub fn samples(&self) -> &[Sample] {
        self.store.samples()
    }

    pub fn output(&self) -> &PipelineOutput {
        &self.output
    }

    pub fn series(&self) -> &[Series] {
        &self.output.series
    }

    pub fn runs(&self) -> &[Run] {
        self.runs.spans()
    }

    pub fn strokes(&self) -> &[Stroke] {
        self.strokes.spans()
    }

    pub fn tree(&self) -> &SegmentTree {
        &self.tree
    }

    /// Tree access for metadata edits (rename, lock, tags, cond vars)
    pub fn tree_mut(&mut self) -> &mut SegmentTree {
        &mut self.tree
    }

    /// Swap the configuration and recompute every derived table
    ///
    /// Segments and sample ownership are kept.
    pub fn reconfigure(&mut self, config: AppConfig) -> Result<&PipelineOutput, PipelineError> {
        self.pipeline = SegmentationPipeline::new(config).map_err(|err| {
            log_pipeline_error(&err, "Project::reconfigure");
            err
        })?;
        Ok(self.rerun_pipeline())
    }

    pub fn rerun_pipeline(&mut self) -> &PipelineOutput {
        self.rerun_pipeline_with_progress(&mut |_| ControlFlow::Continue(()))
    }

    pub fn rerun_pipeline_with_progress(
        &mut self,
        progress: &mut dyn FnMut(&PipelineProgress) -> ControlFlow<()>,
    ) -> &PipelineOutput {
        self.output = self.pipeline.run_with_progress(&mut self.store, progress);
        let (runs, strokes) = lookup_tables(&self.output, self.store.len());
        self.runs = runs;
        self.strokes = strokes;
        &self.output
    }

    /// Create a segment; failures are logged and leave the project as is
    pub fn create_segment(
        &mut self,
        name: &str,
        parent: SegmentId,
        extent: SegmentExtent,
    ) -> Result<SegmentId, SegmentError> {
        let trim = self.config().segments.trim_zero_pressure_points;
        self.tree
            .create(&mut self.store, name, parent, extent, trim)
            .map_err(|err| {
                log_segment_error(&err, "Project::create_segment");
                err
            })
    }

    /// Remove an unlocked segment; its children move up to its parent
    pub fn remove_segment(&mut self, id: SegmentId) -> Result<Segment, SegmentError> {
        self.tree.remove(&mut self.store, id).map_err(|err| {
            log_segment_error(&err, "Project::remove_segment");
            err
        })
    }

    /// Index range of `[start, end]` using the configured trimming
    pub fn time_range_to_index_range(&self, start: f64, end: f64) -> Option<(usize, usize)> {
        self.store.time_range_to_index_range(
            start,
            end,
            self.config().segments.trim_zero_pressure_points,
        )
    }

    pub fn leveled_segments(&self) -> Vec<Vec<&Segment>> {
        self.tree.leveled_segments()
    }

    pub fn contains(&self, id: SegmentId, query: &Query) -> Result<bool, SegmentError> {
        self.tree.contains(&self.store, id, query)
    }

    /// Most specific segment owning sample `ix`
    pub fn segment_for_sample(&self, ix: usize) -> Option<SegmentId> {
        self.store.get(ix).map(|s| s.segment_id)
    }

    pub fn series_for_sample(&self, ix: usize) -> Option<u32> {
        let series = &self.output.series;
        let pos = series.partition_point(|s| s.end_ix < ix);
        series
            .get(pos)
            .filter(|s| s.start_ix <= ix)
            .map(|s| s.id)
    }

    pub fn run_for_sample(&self, ix: usize) -> Option<u32> {
        self.runs.lookup(ix).map(|run| run.id)
    }

    pub fn stroke_for_sample(&self, ix: usize) -> Option<StrokeKey> {
        self.stroke_at(ix).map(|stroke| stroke.key())
    }

    pub fn stroke_at(&self, ix: usize) -> Option<&Stroke> {
        self.strokes.lookup(ix)
    }

    /// One child segment per Run lying inside `parent`
    pub fn segment_runs(&mut self, parent: SegmentId) -> Result<Vec<SegmentId>, SegmentError> {
        let (start, end) = self.parent_range(parent)?;
        let spans: Vec<(String, usize, usize)> = self
            .runs
            .spans()
            .iter()
            .filter(|run| start <= run.start_time && run.end_time <= end)
            .map(|run| (format!("run {}", run.id), run.start_ix, run.end_ix))
            .collect();
        self.create_children(parent, spans)
    }

    /// One child segment per Stroke inside `parent`, optionally one kind only
    pub fn segment_strokes(
        &mut self,
        parent: SegmentId,
        kind: Option<StrokeKind>,
    ) -> Result<Vec<SegmentId>, SegmentError> {
        let (start, end) = self.parent_range(parent)?;
        let spans: Vec<(String, usize, usize)> = self
            .strokes
            .spans()
            .iter()
            .filter(|stroke| kind.map_or(true, |k| stroke.kind == k))
            .filter(|stroke| start <= stroke.start_time && stroke.end_time <= end)
            .map(|stroke| {
                let label = match stroke.kind {
                    StrokeKind::Motion => "stroke",
                    StrokeKind::Pause => "pause",
                };
                (
                    format!("{} {}.{}", label, stroke.parent_id, stroke.id),
                    stroke.start_ix,
                    stroke.end_ix,
                )
            })
            .collect();
        self.create_children(parent, spans)
    }

    fn parent_range(&self, parent: SegmentId) -> Result<(f64, f64), SegmentError> {
        self.tree
            .get(parent)
            .map(|segment| segment.time_range())
            .ok_or(SegmentError::UnknownParent { id: parent })
    }

    fn create_children(
        &mut self,
        parent: SegmentId,
        spans: Vec<(String, usize, usize)>,
    ) -> Result<Vec<SegmentId>, SegmentError> {
        let mut created = Vec::with_capacity(spans.len());
        for (name, lo, hi) in spans {
            created.push(self.create_segment(&name, parent, SegmentExtent::Samples(lo..=hi))?);
        }
        Ok(created)
    }
}

fn lookup_tables(output: &PipelineOutput, sample_count: usize) -> (SpanTable<Run>, SpanTable<Stroke>) {
    (
        SpanTable::new("run", output.runs.clone(), sample_count),
        SpanTable::new("stroke", output.strokes.clone(), sample_count),
    )
}
