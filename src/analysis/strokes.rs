// StrokeBoundaryClassifier - typed MOTION/PAUSE spans from extrema
//
// One detection pass covers one range (a Series or a Run). Candidate
// boundaries come from one of three traces:
// - velocity: extrema of xy_velocity
// - velocity_curvature: 5 Hz velocity minima kept only where the heading
//   turns by more than abs_dalpha_thresh
// - y_filtered: extrema of the vertical position
//
// Reduction: the range's first and last index are added to the boundaries,
// then every boundary-to-boundary span is tested against the minimum stroke
// length and mean velocity. Failing spans become PAUSE and merge into an
// open PAUSE; a passing span flushes the open PAUSE and is emitted as
// MOTION. Spans are index-disjoint: span j covers [b_j, b_{j+1} - 1] and the
// last one ends on the range end.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use super::curvature::CurvatureWorkspace;
use super::peaks::PeakDetector;
use crate::config::{StrokeAlgorithm, StrokeDetectionConfig, StrokeScope};
use crate::samples::Sample;
use crate::segment::IndexSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StrokeKind {
    Motion,
    Pause,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// 1-based within its pass
    pub id: u32,
    /// Series or Run id, per `scope`
    pub parent_id: u32,
    pub scope: StrokeScope,
    pub start_ix: usize,
    pub start_time: f64,
    /// Inclusive
    pub end_ix: usize,
    pub end_time: f64,
    pub kind: StrokeKind,
}

impl Stroke {
    pub fn key(&self) -> StrokeKey {
        StrokeKey {
            parent_id: self.parent_id,
            stroke_id: self.id,
        }
    }
}

impl IndexSpan for Stroke {
    fn start_ix(&self) -> usize {
        self.start_ix
    }

    fn end_ix(&self) -> usize {
        self.end_ix
    }
}

/// Stroke ids restart per pass, so a stroke is named by its parent too
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StrokeKey {
    pub parent_id: u32,
    pub stroke_id: u32,
}

#[derive(Debug, Clone)]
pub struct StrokeBoundaryClassifier {
    config: StrokeDetectionConfig,
    spatial_resolution: f64,
    temporal_resolution: f64,
}

impl StrokeBoundaryClassifier {
    pub fn new(
        config: &StrokeDetectionConfig,
        spatial_resolution: f64,
        temporal_resolution: f64,
    ) -> Self {
        Self {
            config: config.clone(),
            spatial_resolution,
            temporal_resolution,
        }
    }

    /// Whether `classify` can use a curvature workspace
    pub fn needs_curvature(&self) -> bool {
        self.config.algorithm == StrokeAlgorithm::VelocityCurvature
    }

    /// Strokes covering `range`, ids from 1
    ///
    /// `workspace` is only read by the curvature algorithm; when it is
    /// missing or does not cover `range` one is built for the range.
    pub fn classify(
        &self,
        samples: &[Sample],
        range: RangeInclusive<usize>,
        parent_id: u32,
        workspace: Option<&CurvatureWorkspace>,
    ) -> Vec<Stroke> {
        let candidates = self.candidates(samples, range.clone(), workspace);

        match candidates.len() {
            0 => {
                warn!(
                    "[StrokeClassifier] No stroke boundary candidates in {:?} {} samples {}..={}",
                    self.config.scope,
                    parent_id,
                    range.start(),
                    range.end()
                );
                Vec::new()
            }
            1 => {
                debug!(
                    "[StrokeClassifier] Single boundary candidate in {:?} {}, emitting one MOTION stroke",
                    self.config.scope, parent_id
                );
                vec![self.stroke(
                    samples,
                    1,
                    parent_id,
                    *range.start(),
                    *range.end(),
                    StrokeKind::Motion,
                )]
            }
            _ => self.reduce(samples, range, parent_id, candidates),
        }
    }

    /// Candidate boundary indices (absolute, ascending) inside `range`
    pub fn candidates(
        &self,
        samples: &[Sample],
        range: RangeInclusive<usize>,
        workspace: Option<&CurvatureWorkspace>,
    ) -> Vec<usize> {
        let lo = *range.start();
        let detector = PeakDetector::new()
            .min_distance(self.config.min_p2p_sample_count)
            .edge_policy(self.config.edge_type);

        let trace: Vec<f64> = match self.config.algorithm {
            StrokeAlgorithm::Velocity => {
                samples[range.clone()].iter().map(|s| s.xy_velocity).collect()
            }
            StrokeAlgorithm::YFiltered => {
                samples[range.clone()].iter().map(|s| s.y_filtered).collect()
            }
            StrokeAlgorithm::VelocityCurvature => {
                return self.curvature_candidates(samples, range, workspace, detector);
            }
        };

        detector
            .detect_extrema(&trace, self.config.peak_or_valley)
            .into_iter()
            .map(|ix| lo + ix)
            .collect()
    }

    fn curvature_candidates(
        &self,
        samples: &[Sample],
        range: RangeInclusive<usize>,
        workspace: Option<&CurvatureWorkspace>,
        detector: PeakDetector,
    ) -> Vec<usize> {
        let covered = |ws: &&CurvatureWorkspace| {
            ws.covers().map_or(false, |c| {
                c.start() <= range.start() && range.end() <= c.end()
            })
        };
        let local;
        let ws = match workspace.filter(covered) {
            Some(ws) => ws,
            None => {
                local = CurvatureWorkspace::new(
                    samples,
                    range.clone(),
                    self.spatial_resolution,
                    self.temporal_resolution,
                );
                &local
            }
        };

        let valleys = detector.valley(true);
        let radius = self.config.min_p2p_sample_count / 2;
        ws.candidates(range.clone(), &valleys, radius)
            .into_iter()
            .filter(|&c| {
                ws.dalpha(range.clone(), c, self.config.inter_sample_distance)
                    .map_or(false, |dalpha| dalpha.abs() > self.config.abs_dalpha_thresh)
            })
            .collect()
    }

    /// Boundary list to typed, gapless spans
    fn reduce(
        &self,
        samples: &[Sample],
        range: RangeInclusive<usize>,
        parent_id: u32,
        candidates: Vec<usize>,
    ) -> Vec<Stroke> {
        let (lo, hi) = (*range.start(), *range.end());
        let mut bounds = candidates;
        bounds.push(lo);
        bounds.push(hi);
        bounds.retain(|ix| range.contains(ix));
        bounds.sort_unstable();
        bounds.dedup();

        let arc = self.arc_length(&samples[range.clone()]);
        let mut strokes = Vec::new();
        let mut open_pause: Option<(usize, usize)> = None;
        let mut next_id = 1;

        for (j, pair) in bounds.windows(2).enumerate() {
            let (from, to) = (pair[0], pair[1]);
            let end = if j + 2 == bounds.len() { to } else { to - 1 };

            let length = arc[to - lo] - arc[from - lo];
            let window = &samples[from..=to];
            let mean_velocity =
                window.iter().map(|s| s.xy_velocity).sum::<f64>() / window.len() as f64;
            let is_motion = length >= self.config.min_stroke_length
                && mean_velocity >= self.config.min_stroke_velocity;

            if is_motion {
                if let Some((ps, pe)) = open_pause.take() {
                    strokes.push(self.stroke(samples, next_id, parent_id, ps, pe, StrokeKind::Pause));
                    next_id += 1;
                }
                strokes.push(self.stroke(samples, next_id, parent_id, from, end, StrokeKind::Motion));
                next_id += 1;
            } else {
                open_pause = match open_pause {
                    Some((ps, _)) => Some((ps, end)),
                    None => Some((from, end)),
                };
            }
        }
        if let Some((ps, pe)) = open_pause {
            strokes.push(self.stroke(samples, next_id, parent_id, ps, pe, StrokeKind::Pause));
        }

        debug!(
            "[StrokeClassifier] {:?} {}: {} boundaries -> {} strokes",
            self.config.scope,
            parent_id,
            bounds.len(),
            strokes.len()
        );
        strokes
    }

    /// Cumulative filtered path length in mm, relative to the slice start
    fn arc_length(&self, slice: &[Sample]) -> Vec<f64> {
        let mut total = 0.0;
        let mut out = Vec::with_capacity(slice.len());
        for (i, s) in slice.iter().enumerate() {
            if i > 0 {
                let prev = &slice[i - 1];
                total += (s.x_filtered - prev.x_filtered).hypot(s.y_filtered - prev.y_filtered)
                    / self.spatial_resolution;
            }
            out.push(total);
        }
        out
    }

    fn stroke(
        &self,
        samples: &[Sample],
        id: u32,
        parent_id: u32,
        start_ix: usize,
        end_ix: usize,
        kind: StrokeKind,
    ) -> Stroke {
        Stroke {
            id,
            parent_id,
            scope: self.config.scope,
            start_ix,
            start_time: samples[start_ix].time,
            end_ix,
            end_time: samples[end_ix].time,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EdgePolicy, ExtremaKind};
    use crate::samples::{PenState, RawSample};

    /// 1 mm per sample for indices 0..10, then at rest; 100 units/mm, 100 Hz
    fn move_then_rest(len: usize) -> Vec<Sample> {
        (0..len)
            .map(|i| {
                let mut s = Sample::from(RawSample {
                    time: i as f64 * 0.01,
                    x: 0,
                    y: 0,
                    pressure: 100,
                    state: PenState::NONE,
                });
                s.x_filtered = (i.min(10) * 100) as f64;
                s.xy_velocity = if i < 10 { 100.0 } else { 0.0 };
                s
            })
            .collect()
    }

    fn classifier(config: StrokeDetectionConfig) -> StrokeBoundaryClassifier {
        StrokeBoundaryClassifier::new(&config, 100.0, 0.01)
    }

    fn layout(strokes: &[Stroke]) -> Vec<(u32, usize, usize, StrokeKind)> {
        strokes
            .iter()
            .map(|s| (s.id, s.start_ix, s.end_ix, s.kind))
            .collect()
    }

    fn assert_covers(strokes: &[Stroke], lo: usize, hi: usize) {
        assert_eq!(strokes.first().map(|s| s.start_ix), Some(lo));
        assert_eq!(strokes.last().map(|s| s.end_ix), Some(hi));
        for pair in strokes.windows(2) {
            assert_eq!(pair[0].end_ix + 1, pair[1].start_ix, "gap or overlap");
        }
        for (i, s) in strokes.iter().enumerate() {
            assert_eq!(s.id, i as u32 + 1);
        }
    }

    #[test]
    fn test_reduce_merges_consecutive_pauses() {
        let samples = move_then_rest(21);
        let strokes = classifier(StrokeDetectionConfig::default()).reduce(
            &samples,
            0..=20,
            3,
            vec![5, 10, 15],
        );

        assert_eq!(
            layout(&strokes),
            vec![
                (1, 0, 4, StrokeKind::Motion),
                (2, 5, 9, StrokeKind::Motion),
                (3, 10, 20, StrokeKind::Pause),
            ]
        );
        assert!(strokes.iter().all(|s| s.parent_id == 3));
        assert_covers(&strokes, 0, 20);
    }

    #[test]
    fn test_pause_is_flushed_before_motion() {
        // Rest first, then move: reverse the profile
        let mut samples = move_then_rest(21);
        samples.reverse();
        for (i, s) in samples.iter_mut().enumerate() {
            s.time = i as f64 * 0.01;
        }
        // After reversing, the moving samples are 11..=20 (velocity 100)
        let strokes = classifier(StrokeDetectionConfig::default()).reduce(
            &samples,
            0..=20,
            1,
            vec![5, 10, 15],
        );
        assert_eq!(
            layout(&strokes),
            vec![
                (1, 0, 9, StrokeKind::Pause),
                (2, 10, 14, StrokeKind::Motion),
                (3, 15, 20, StrokeKind::Motion),
            ]
        );
        assert_covers(&strokes, 0, 20);
    }

    #[test]
    fn test_thresholds_control_pause() {
        let samples = move_then_rest(21);
        let strict = StrokeDetectionConfig {
            min_stroke_length: 100.0,
            ..StrokeDetectionConfig::default()
        };
        let strokes = classifier(strict).reduce(&samples, 0..=20, 1, vec![5, 10]);
        assert_eq!(layout(&strokes), vec![(1, 0, 20, StrokeKind::Pause)]);
    }

    #[test]
    fn test_zero_candidates_emit_nothing() {
        // Monotone velocity: no valleys
        let mut samples = move_then_rest(12);
        for (i, s) in samples.iter_mut().enumerate() {
            s.xy_velocity = i as f64;
        }
        let strokes = classifier(StrokeDetectionConfig::default()).classify(&samples, 0..=11, 1, None);
        assert!(strokes.is_empty());
    }

    #[test]
    fn test_single_candidate_is_one_motion_stroke() {
        let mut samples = move_then_rest(12);
        let profile = [5.0, 4.0, 3.0, 2.0, 1.0, 0.5, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        for (s, v) in samples.iter_mut().zip(profile) {
            s.xy_velocity = v;
        }
        let c = classifier(StrokeDetectionConfig::default());
        assert_eq!(c.candidates(&samples, 0..=11, None), vec![5]);

        let strokes = c.classify(&samples, 0..=11, 4, None);
        assert_eq!(layout(&strokes), vec![(1, 0, 11, StrokeKind::Motion)]);
        assert_eq!(strokes[0].parent_id, 4);
    }

    #[test]
    fn test_candidates_are_absolute_indices() {
        let mut samples = move_then_rest(30);
        for (i, s) in samples.iter_mut().enumerate() {
            s.xy_velocity = ((i as f64) * 0.7).sin() + 2.0;
        }
        let config = StrokeDetectionConfig {
            min_p2p_sample_count: 1,
            ..StrokeDetectionConfig::default()
        };
        let c = classifier(config);
        let whole = c.candidates(&samples, 0..=29, None);
        let tail = c.candidates(&samples, 10..=29, None);
        assert!(tail.iter().all(|ix| (10..=29).contains(ix)));
        // Interior minima of the tail match those of the whole trace
        for ix in tail.iter().filter(|&&ix| ix > 10 && ix < 29) {
            assert!(whole.contains(ix), "{} missing from {:?}", ix, whole);
        }
    }

    #[test]
    fn test_y_filtered_peaks_and_valleys() {
        let mut samples = move_then_rest(20);
        for (i, s) in samples.iter_mut().enumerate() {
            s.y_filtered = [0.0, 5.0, 0.0, -5.0][i % 4];
        }
        let config = StrokeDetectionConfig {
            algorithm: StrokeAlgorithm::YFiltered,
            peak_or_valley: ExtremaKind::Both,
            min_p2p_sample_count: 1,
            edge_type: EdgePolicy::Rising,
            ..StrokeDetectionConfig::default()
        };
        let candidates = classifier(config).candidates(&samples, 0..=19, None);
        assert_eq!(candidates, vec![1, 3, 5, 7, 9, 11, 13, 15, 17]);
    }

    #[test]
    fn test_stroke_kind_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&StrokeKind::Motion).unwrap(),
            "\"MOTION\""
        );
        assert_eq!(serde_json::to_string(&StrokeKind::Pause).unwrap(), "\"PAUSE\"");
    }
}
