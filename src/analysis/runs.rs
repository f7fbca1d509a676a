// RunDetector - pressed-contact Runs within a Series
//
// FIRST_PRESS bits, when present in a Series, are authoritative Run starts:
// a Run spans from one marker to the sample before the next one and is then
// trimmed back to its last pressed sample. A Series that begins pressed
// without a marker still gets a Run at its first sample. Without any marker
// Runs are the maximal contiguous `pressure > 0` regions.
//
// Run ids are global: one detector instance numbers every Series it sees.

use log::debug;
use serde::{Deserialize, Serialize};

use super::series::Series;
use crate::samples::{PenState, Sample};
use crate::segment::IndexSpan;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// 1-based, unique across the sample array
    pub id: u32,
    pub series_id: u32,
    pub start_ix: usize,
    pub start_time: f64,
    /// Inclusive
    pub end_ix: usize,
    pub end_time: f64,
}

impl Run {
    pub fn len(&self) -> usize {
        self.end_ix - self.start_ix + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl IndexSpan for Run {
    fn start_ix(&self) -> usize {
        self.start_ix
    }

    fn end_ix(&self) -> usize {
        self.end_ix
    }
}

#[derive(Debug, Clone)]
pub struct RunDetector {
    next_id: u32,
}

impl Default for RunDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl RunDetector {
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Runs of one Series, in index order
    ///
    /// `samples` is the whole array; only the Series' range is read.
    pub fn detect(&mut self, samples: &[Sample], series: &Series) -> Vec<Run> {
        let pressed = |ix: usize| samples[ix].is_pressed();

        let markers: Vec<usize> = series
            .range()
            .filter(|&ix| samples[ix].state.contains(PenState::FIRST_PRESS))
            .collect();

        let spans = if markers.is_empty() {
            contiguous_pressed(series, pressed)
        } else {
            let mut starts = markers;
            let first = series.start_ix;
            let starts_pressed =
                pressed(first) || samples[first].state.contains(PenState::PRESSED);
            if starts[0] != first && starts_pressed {
                starts.insert(0, first);
            }
            marker_spans(series, &starts, pressed)
        };

        spans
            .into_iter()
            .map(|(start_ix, end_ix)| {
                let run = Run {
                    id: self.next_id,
                    series_id: series.id,
                    start_ix,
                    start_time: samples[start_ix].time,
                    end_ix,
                    end_time: samples[end_ix].time,
                };
                self.next_id += 1;
                run
            })
            .collect()
    }
}

/// Maximal `pressure > 0` regions inside the Series
fn contiguous_pressed(series: &Series, pressed: impl Fn(usize) -> bool) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut open: Option<usize> = None;

    for ix in series.range() {
        match (open, pressed(ix)) {
            (None, true) => open = Some(ix),
            (Some(start), false) => {
                spans.push((start, ix - 1));
                open = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        spans.push((start, series.end_ix));
    }
    spans
}

/// Marker-to-marker spans trimmed to their last pressed sample
fn marker_spans(
    series: &Series,
    starts: &[usize],
    pressed: impl Fn(usize) -> bool,
) -> Vec<(usize, usize)> {
    let mut spans = Vec::with_capacity(starts.len());

    for (pos, &start) in starts.iter().enumerate() {
        let limit = starts.get(pos + 1).map_or(series.end_ix, |next| next - 1);
        match (start..=limit).rev().find(|&ix| pressed(ix)) {
            Some(end) => spans.push((start, end)),
            None => debug!(
                "[RunDetector] Series {}: press marker at {} has no pressed sample before {}, skipped",
                series.id, start, limit
            ),
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::series::SeriesDetector;
    use crate::samples::RawSample;
    use crate::testing::SyntheticTrace;

    fn pressed_samples(pressures: &[i32], marks: &[(usize, PenState)]) -> Vec<Sample> {
        let mut samples: Vec<Sample> = pressures
            .iter()
            .enumerate()
            .map(|(i, &pressure)| {
                Sample::from(RawSample {
                    time: i as f64 * 0.01,
                    x: i as i32,
                    y: 0,
                    pressure,
                    state: PenState::NONE,
                })
            })
            .collect();
        for &(ix, state) in marks {
            samples[ix].state = samples[ix].state | state;
        }
        samples
    }

    fn whole(samples: &[Sample]) -> Series {
        Series {
            id: 1,
            start_ix: 0,
            start_time: samples[0].time,
            end_ix: samples.len() - 1,
            end_time: samples[samples.len() - 1].time,
        }
    }

    fn spans(runs: &[Run]) -> Vec<(usize, usize)> {
        runs.iter().map(|r| (r.start_ix, r.end_ix)).collect()
    }

    fn dip_40_to_45() -> Vec<i32> {
        (0..100)
            .map(|i| if (40..=45).contains(&i) { 0 } else { 300 })
            .collect()
    }

    #[test]
    fn test_pressure_dip_with_press_markers() {
        let samples = pressed_samples(
            &dip_40_to_45(),
            &[(0, PenState::FIRST_PRESS), (46, PenState::FIRST_PRESS)],
        );
        let runs = RunDetector::new().detect(&samples, &whole(&samples));
        assert_eq!(spans(&runs), vec![(0, 39), (46, 99)]);
        assert_eq!(runs[0].len(), 40);
        assert_eq!(runs.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_pressure_dip_without_markers() {
        let samples = pressed_samples(&dip_40_to_45(), &[]);
        let runs = RunDetector::new().detect(&samples, &whole(&samples));
        assert_eq!(spans(&runs), vec![(0, 39), (46, 99)]);
    }

    #[test]
    fn test_series_starting_pressed_without_marker() {
        let mut pressures = vec![200; 20];
        pressures[8] = 0;
        pressures[9] = 0;
        let samples = pressed_samples(&pressures, &[(10, PenState::FIRST_PRESS)]);
        let runs = RunDetector::new().detect(&samples, &whole(&samples));
        assert_eq!(spans(&runs), vec![(0, 7), (10, 19)]);
    }

    #[test]
    fn test_marker_without_pressure_is_skipped() {
        let mut pressures = vec![0; 12];
        for p in &mut pressures[2..5] {
            *p = 100;
        }
        let samples = pressed_samples(
            &pressures,
            &[(2, PenState::FIRST_PRESS), (7, PenState::FIRST_PRESS)],
        );
        let runs = RunDetector::new().detect(&samples, &whole(&samples));
        assert_eq!(spans(&runs), vec![(2, 4)]);
    }

    #[test]
    fn test_hover_only_series_has_no_runs() {
        let samples = pressed_samples(&[0; 10], &[]);
        assert!(RunDetector::new().detect(&samples, &whole(&samples)).is_empty());
    }

    #[test]
    fn test_ids_are_global_across_series() {
        let mut pressures = vec![100; 20];
        pressures[5] = 0;
        pressures[15] = 0;
        let samples = pressed_samples(&pressures, &[(10, PenState::FIRST_ENTER)]);
        let series = SeriesDetector::default().detect(&samples);
        assert_eq!(series.len(), 2);

        let mut detector = RunDetector::new();
        let runs: Vec<Run> = series
            .iter()
            .flat_map(|s| detector.detect(&samples, s))
            .collect();
        assert_eq!(spans(&runs), vec![(0, 4), (6, 9), (10, 14), (16, 19)]);
        assert_eq!(runs.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(
            runs.iter().map(|r| r.series_id).collect::<Vec<_>>(),
            vec![1, 1, 2, 2]
        );
    }

    #[test]
    fn test_runs_are_contained_in_their_series() {
        for seed in 0..5 {
            let samples = SyntheticTrace::new(seed).words(3).build_samples();
            let series = SeriesDetector::default().detect(&samples);
            let mut detector = RunDetector::new();

            for s in &series {
                let runs = detector.detect(&samples, s);
                for run in &runs {
                    assert_eq!(run.series_id, s.id);
                    assert!(s.start_ix <= run.start_ix && run.end_ix <= s.end_ix);
                    assert!(samples[run.end_ix].is_pressed());
                }
                for pair in runs.windows(2) {
                    assert!(pair[0].end_ix < pair[1].start_ix, "runs overlap");
                }
            }
        }
    }
}
