// SeriesDetector - partitions the sample array into contiguous Series
//
// A Series starts at index 0 and at every FIRST_ENTER sample. With a
// positive max_isi_msec a sampling gap longer than that interval also
// starts one. Series are gapless by construction.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::config::SeriesDetectionConfig;
use crate::samples::{PenState, Sample};
use crate::segment::IndexSpan;

/// Contiguous span of samples between pen re-entries
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// 1-based
    pub id: u32,
    pub start_ix: usize,
    pub start_time: f64,
    /// Inclusive
    pub end_ix: usize,
    pub end_time: f64,
}

impl Series {
    pub fn len(&self) -> usize {
        self.end_ix - self.start_ix + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn range(&self) -> RangeInclusive<usize> {
        self.start_ix..=self.end_ix
    }
}

impl IndexSpan for Series {
    fn start_ix(&self) -> usize {
        self.start_ix
    }

    fn end_ix(&self) -> usize {
        self.end_ix
    }
}

#[derive(Debug, Clone, Default)]
pub struct SeriesDetector {
    /// Seconds; `None` disables gap splitting
    max_isi: Option<f64>,
}

impl SeriesDetector {
    pub fn new(config: &SeriesDetectionConfig) -> Self {
        let max_isi = (config.max_isi_msec.is_finite() && config.max_isi_msec > 0.0)
            .then(|| config.max_isi_msec / 1000.0);
        Self { max_isi }
    }

    pub fn detect(&self, samples: &[Sample]) -> Vec<Series> {
        if samples.is_empty() {
            return Vec::new();
        }

        let mut starts = vec![0];
        for ix in 1..samples.len() {
            let entered = samples[ix].state.contains(PenState::FIRST_ENTER);
            let gap = self
                .max_isi
                .map_or(false, |max| samples[ix].time - samples[ix - 1].time > max);
            if entered || gap {
                starts.push(ix);
            }
        }

        let last_ix = samples.len() - 1;
        starts
            .iter()
            .enumerate()
            .map(|(pos, &start_ix)| {
                let end_ix = starts.get(pos + 1).map_or(last_ix, |next| next - 1);
                Series {
                    id: pos as u32 + 1,
                    start_ix,
                    start_time: samples[start_ix].time,
                    end_ix,
                    end_time: samples[end_ix].time,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::RawSample;
    use crate::testing::SyntheticTrace;

    fn samples_with_states(states: &[u8], dt: f64) -> Vec<Sample> {
        states
            .iter()
            .enumerate()
            .map(|(i, &state)| {
                Sample::from(RawSample {
                    time: i as f64 * dt,
                    x: 0,
                    y: 0,
                    pressure: 0,
                    state: PenState(state),
                })
            })
            .collect()
    }

    #[test]
    fn test_no_enter_bits_gives_single_series() {
        let samples = samples_with_states(&[0; 12], 0.01);
        let series = SeriesDetector::default().detect(&samples);
        assert_eq!(series.len(), 1);
        assert_eq!((series[0].start_ix, series[0].end_ix), (0, 11));
        assert_eq!(series[0].id, 1);
    }

    #[test]
    fn test_split_on_first_enter() {
        let mut states = [0u8; 12];
        states[0] = PenState::FIRST_ENTER.0;
        states[5] = PenState::FIRST_ENTER.0 | PenState::HOVERING.0;
        states[9] = PenState::FIRST_ENTER.0;
        let samples = samples_with_states(&states, 0.01);

        let series = SeriesDetector::default().detect(&samples);
        let spans: Vec<(usize, usize)> = series.iter().map(|s| (s.start_ix, s.end_ix)).collect();
        assert_eq!(spans, vec![(0, 4), (5, 8), (9, 11)]);
        assert_eq!(series.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!((series[1].start_time - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_split_on_sampling_gap() {
        let mut samples = samples_with_states(&[0; 8], 0.01);
        for sample in &mut samples[4..] {
            sample.time += 0.5;
        }

        let disabled = SeriesDetector::new(&SeriesDetectionConfig { max_isi_msec: 0.0 });
        assert_eq!(disabled.detect(&samples).len(), 1);

        let enabled = SeriesDetector::new(&SeriesDetectionConfig { max_isi_msec: 50.0 });
        let series = enabled.detect(&samples);
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].start_ix, 4);
    }

    #[test]
    fn test_empty_input_has_no_series() {
        assert!(SeriesDetector::default().detect(&[]).is_empty());
    }

    #[test]
    fn test_series_cover_array_without_gaps() {
        for seed in 0..5 {
            let samples = SyntheticTrace::new(seed).words(4).build_samples();
            let series = SeriesDetector::default().detect(&samples);
            assert!(!series.is_empty());
            assert_eq!(series[0].start_ix, 0);
            assert_eq!(series.last().map(|s| s.end_ix), Some(samples.len() - 1));
            for pair in series.windows(2) {
                assert_eq!(pair[0].end_ix + 1, pair[1].start_ix, "gap or overlap");
            }
            let covered: usize = series.iter().map(|s| s.len()).sum();
            assert_eq!(covered, samples.len());
        }
    }
}
