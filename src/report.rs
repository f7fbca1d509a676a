// Report rows - flat views of a processed Project
//
// Two report shapes are produced:
// - sample_rows: one row per sample with its Series/Run/Stroke/Segment owners
// - segment_levels: one table per tree depth with per-segment statistics
//
// Rows are plain serde structs; writing them to a file format is left to the
// caller (the CLI prints them as JSON).

use serde::Serialize;

use crate::analysis::strokes::StrokeKind;
use crate::project::Project;
use crate::segment::{CondVars, Segment, SegmentId};

/// Sample-level report row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRow {
    pub index: usize,
    pub time: f64,
    pub x: i32,
    pub y: i32,
    pub pressure: i32,
    pub x_filtered: f64,
    pub y_filtered: f64,
    pub xy_velocity: f64,
    pub xy_acceleration: f64,
    pub series_id: Option<u32>,
    pub run_id: Option<u32>,
    pub stroke_id: Option<u32>,
    pub stroke_kind: Option<StrokeKind>,
    pub segment_id: SegmentId,
}

/// Segment-level report row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentRow {
    pub id: SegmentId,
    pub name: String,
    pub parent: Option<SegmentId>,
    pub depth: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub sample_count: usize,
    /// Filtered path length in mm
    pub path_length: f64,
    /// Mean of `xy_velocity` in mm/s
    pub mean_velocity: f64,
    pub tags: Vec<String>,
    pub cond_vars: Option<CondVars>,
}

pub fn sample_rows(project: &Project) -> Vec<SampleRow> {
    project
        .samples()
        .iter()
        .enumerate()
        .map(|(index, s)| {
            let stroke = project.stroke_at(index);
            SampleRow {
                index,
                time: s.time,
                x: s.x,
                y: s.y,
                pressure: s.pressure,
                x_filtered: s.x_filtered,
                y_filtered: s.y_filtered,
                xy_velocity: s.xy_velocity,
                xy_acceleration: s.xy_acceleration,
                series_id: project.series_for_sample(index),
                run_id: project.run_for_sample(index),
                stroke_id: stroke.map(|st| st.id),
                stroke_kind: stroke.map(|st| st.kind),
                segment_id: s.segment_id,
            }
        })
        .collect()
}

/// Non-root segments grouped by depth; entry 0 holds depth 1
pub fn segment_levels(project: &Project) -> Vec<Vec<SegmentRow>> {
    project
        .leveled_segments()
        .into_iter()
        .enumerate()
        .map(|(level, segments)| {
            segments
                .into_iter()
                .map(|segment| segment_row(project, segment, level + 1))
                .collect()
        })
        .collect()
}

fn segment_row(project: &Project, segment: &Segment, depth: usize) -> SegmentRow {
    let spatial = project.config().device.spatial_resolution;
    let (path_length, mean_velocity) = match segment.index_range() {
        Some((lo, hi)) => {
            let samples = &project.samples()[lo..=hi];
            let path: f64 = samples
                .windows(2)
                .map(|w| {
                    (w[1].x_filtered - w[0].x_filtered)
                        .hypot(w[1].y_filtered - w[0].y_filtered)
                })
                .sum();
            let mean = samples.iter().map(|s| s.xy_velocity).sum::<f64>() / samples.len() as f64;
            (path / spatial, mean)
        }
        None => (0.0, 0.0),
    };

    SegmentRow {
        id: segment.id(),
        name: segment.name().to_string(),
        parent: segment.parent(),
        depth,
        start_time: segment.start_time(),
        end_time: segment.end_time(),
        duration: segment.duration(),
        sample_count: segment.sample_count(),
        path_length,
        mean_velocity,
        tags: segment.tags().to_vec(),
        cond_vars: project.tree().effective_cond_vars(segment.id()).cloned(),
    }
}
