//! SampleStore - owner of the canonical sample array
//!
//! Every other component reads and writes samples through this type. The
//! store guarantees a non-decreasing, zero-based time column; derived fields
//! are written in place by the pipeline one Series slice at a time.

use std::ops::RangeInclusive;

use log::{debug, warn};

use super::{RawSample, Sample};
use crate::error::PipelineError;
use crate::segment::SegmentId;

/// Sampling rate assumed when neither configuration nor data give one
pub const DEFAULT_SAMPLING_RATE_HZ: f64 = 120.0;

/// Maximum number of dropped indices spelled out in the warning
const MAX_LOGGED_DROPS: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct SampleStore {
    samples: Vec<Sample>,
}

impl SampleStore {
    /// Build a store from importer rows
    ///
    /// Rows whose time is smaller than the last kept row are dropped with a
    /// warning, time is rebased to start at zero and all derived fields
    /// start zeroed.
    pub fn from_raw(rows: Vec<RawSample>) -> Self {
        let mut samples = Vec::with_capacity(rows.len());
        let mut dropped = Vec::new();
        let mut last_time = f64::NEG_INFINITY;

        for (ix, row) in rows.into_iter().enumerate() {
            if !row.time.is_finite() || row.time < last_time {
                dropped.push(ix);
                continue;
            }
            last_time = row.time;
            samples.push(Sample::from(row));
        }

        if !dropped.is_empty() {
            let shown: Vec<usize> = dropped.iter().copied().take(MAX_LOGGED_DROPS).collect();
            warn!(
                "[SampleStore] Dropped {} non-monotonic sample rows (indices {:?}{})",
                dropped.len(),
                shown,
                if dropped.len() > MAX_LOGGED_DROPS { ", ..." } else { "" }
            );
        }

        if let Some(t0) = samples.first().map(|s| s.time) {
            for sample in &mut samples {
                sample.time -= t0;
            }
        }

        Self { samples }
    }

    /// Wrap an array that is already normalized, verifying time ordering
    pub fn from_normalized(samples: Vec<Sample>) -> Result<Self, PipelineError> {
        for ix in 1..samples.len() {
            if !(samples[ix].time >= samples[ix - 1].time) {
                return Err(PipelineError::NonMonotonicTime { index: ix });
            }
        }
        Ok(Self { samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [Sample] {
        &mut self.samples
    }

    pub fn get(&self, ix: usize) -> Option<&Sample> {
        self.samples.get(ix)
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }

    /// First and last sample time
    pub fn time_bounds(&self) -> Option<(f64, f64)> {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => Some((first.time, last.time)),
            _ => None,
        }
    }

    /// Seconds per sample used for every derivative
    ///
    /// Falls back from the configured value to the mean inter-sample
    /// interval, then to [`DEFAULT_SAMPLING_RATE_HZ`].
    pub fn temporal_resolution(&self, configured: f64) -> f64 {
        if configured.is_finite() && configured > 0.0 {
            return configured;
        }

        if let (Some((t0, t1)), true) = (self.time_bounds(), self.samples.len() > 1) {
            let mean_isi = (t1 - t0) / (self.samples.len() - 1) as f64;
            if mean_isi.is_finite() && mean_isi > 0.0 {
                debug!(
                    "[SampleStore] Estimated temporal resolution {:.6}s from {} samples",
                    mean_isi,
                    self.samples.len()
                );
                return mean_isi;
            }
        }

        warn!(
            "[SampleStore] Temporal resolution is degenerate, assuming {} Hz",
            DEFAULT_SAMPLING_RATE_HZ
        );
        1.0 / DEFAULT_SAMPLING_RATE_HZ
    }

    /// First and last index whose time lies in `[start, end]`
    ///
    /// With `trim_zero_pressure` the edges are moved inwards past samples
    /// with `pressure <= 0`. Returns `None` when nothing matches.
    pub fn time_range_to_index_range(
        &self,
        start: f64,
        end: f64,
        trim_zero_pressure: bool,
    ) -> Option<(usize, usize)> {
        if start.is_nan() || end.is_nan() || start > end {
            return None;
        }

        let first = self.samples.partition_point(|s| s.time < start);
        let past_last = self.samples.partition_point(|s| s.time <= end);
        if first >= past_last {
            return None;
        }
        let mut lo = first;
        let mut hi = past_last - 1;

        if trim_zero_pressure {
            while lo <= hi && !self.samples[lo].is_pressed() {
                lo += 1;
            }
            if lo > hi {
                return None;
            }
            while hi > lo && !self.samples[hi].is_pressed() {
                hi -= 1;
            }
        }

        Some((lo, hi))
    }

    /// Set `segment_id` for every sample in range
    pub(crate) fn assign_segment(&mut self, range: RangeInclusive<usize>, id: SegmentId) {
        for sample in &mut self.samples[range] {
            sample.segment_id = id;
        }
    }

    /// Zero every derived field in `range`; ownership is kept
    pub(crate) fn clear_derived(&mut self, range: RangeInclusive<usize>) {
        for sample in &mut self.samples[range] {
            sample.x_filtered = 0.0;
            sample.y_filtered = 0.0;
            sample.pressure_filtered = 0.0;
            sample.x_velocity = 0.0;
            sample.y_velocity = 0.0;
            sample.xy_velocity = 0.0;
            sample.xy_acceleration = 0.0;
        }
    }

    /// Move samples owned by `from` to `to`; others in range are untouched
    pub(crate) fn reassign_segment(
        &mut self,
        range: RangeInclusive<usize>,
        from: SegmentId,
        to: SegmentId,
    ) -> usize {
        let mut moved = 0;
        for sample in &mut self.samples[range] {
            if sample.segment_id == from {
                sample.segment_id = to;
                moved += 1;
            }
        }
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::PenState;

    fn raw(time: f64, pressure: i32) -> RawSample {
        RawSample {
            time,
            x: 0,
            y: 0,
            pressure,
            state: PenState::NONE,
        }
    }

    #[test]
    fn test_from_raw_rebases_time_and_drops_backwards_rows() {
        let rows = vec![
            raw(10.0, 0),
            raw(10.01, 0),
            raw(10.005, 0), // goes backwards
            raw(10.02, 0),
            raw(10.02, 0), // equal time is kept
            raw(f64::NAN, 0),
            raw(10.03, 0),
        ];
        let store = SampleStore::from_raw(rows);
        assert_eq!(store.len(), 5);
        assert_eq!(store.samples()[0].time, 0.0);
        let times: Vec<f64> = store.samples().iter().map(|s| s.time).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        assert!((store.samples()[4].time - 0.03).abs() < 1e-9);
    }

    #[test]
    fn test_from_normalized_rejects_backwards_time() {
        let mut samples: Vec<Sample> = (0..4).map(|i| Sample::from(raw(i as f64, 0))).collect();
        samples[2].time = 0.5;
        assert_eq!(
            SampleStore::from_normalized(samples).unwrap_err(),
            PipelineError::NonMonotonicTime { index: 2 }
        );
    }

    #[test]
    fn test_temporal_resolution_fallbacks() {
        let store = SampleStore::from_raw((0..11).map(|i| raw(i as f64 * 0.01, 0)).collect());
        assert_eq!(store.temporal_resolution(0.005), 0.005);
        assert!((store.temporal_resolution(0.0) - 0.01).abs() < 1e-12);
        assert!((store.temporal_resolution(f64::NAN) - 0.01).abs() < 1e-12);

        // All samples at the same instant: mean interval is 0
        let flat = SampleStore::from_raw(vec![raw(1.0, 0), raw(1.0, 0)]);
        assert_eq!(flat.temporal_resolution(0.0), 1.0 / DEFAULT_SAMPLING_RATE_HZ);

        let empty = SampleStore::default();
        assert_eq!(empty.temporal_resolution(0.0), 1.0 / DEFAULT_SAMPLING_RATE_HZ);
    }

    #[test]
    fn test_time_range_to_index_range() {
        let pressures = [0, 0, 5, 6, 0, 7, 0, 0];
        let store = SampleStore::from_raw(
            pressures
                .iter()
                .enumerate()
                .map(|(i, &p)| raw(i as f64 / 10.0, p))
                .collect(),
        );

        assert_eq!(store.time_range_to_index_range(0.0, 0.7, false), Some((0, 7)));
        assert_eq!(store.time_range_to_index_range(0.15, 0.45, false), Some((2, 4)));
        assert_eq!(store.time_range_to_index_range(0.0, 0.7, true), Some((2, 5)));
        assert_eq!(store.time_range_to_index_range(0.55, 0.8, true), None);
        assert_eq!(store.time_range_to_index_range(0.71, 0.79, false), None);
        assert_eq!(store.time_range_to_index_range(0.5, 0.2, false), None);
    }

    #[test]
    fn test_reassign_only_touches_matching_owner() {
        let mut store = SampleStore::from_raw((0..6).map(|i| raw(i as f64, 1)).collect());
        store.assign_segment(1..=4, SegmentId(2));
        store.assign_segment(2..=3, SegmentId(3));
        let moved = store.reassign_segment(0..=5, SegmentId(2), SegmentId(1));
        assert_eq!(moved, 2);
        let ids: Vec<u32> = store.samples().iter().map(|s| s.segment_id.0).collect();
        assert_eq!(ids, vec![0, 1, 3, 3, 1, 0]);
    }
}
