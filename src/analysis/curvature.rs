// Curvature workspace - per-Series scratch state of the velocity+curvature
// stroke detector
//
// Built once per Series from the two Butterworth traces and dropped when
// the Series is done. Indices stored here are relative to `offset` (the
// Series' first sample); the public methods take absolute indices.
//
// Candidate selection:
// 1. Velocity minima of the 5 Hz trace
// 2. Each one is moved to the slowest 10 Hz minimum within
//    min_p2p_sample_count / 2 samples (kept in place if there is none)
// 3. Heading change across the candidate, measured on the 10 Hz trace
//    between points at least `inter_sample_distance` mm of arc length
//    before and after it; in Run scope these points may lie outside the
//    Run but never outside the Series

use std::ops::RangeInclusive;

use super::filter::CurvatureTraces;
use super::kinematics::differentiate;
use super::peaks::PeakDetector;
use crate::samples::Sample;

#[derive(Debug, Clone, Default)]
pub struct CurvatureWorkspace {
    offset: usize,
    /// 10 Hz trace in mm
    x: Vec<f64>,
    y: Vec<f64>,
    /// Cumulative path length of the 10 Hz trace in mm
    arc_length: Vec<f64>,
    /// mm/s
    speed_low: Vec<f64>,
    speed_high: Vec<f64>,
}

impl CurvatureWorkspace {
    /// Filter and differentiate `samples[range]`
    ///
    /// `dt` is the temporal resolution; its inverse is the filter's
    /// sampling rate.
    pub fn new(
        samples: &[Sample],
        range: RangeInclusive<usize>,
        spatial_resolution: f64,
        dt: f64,
    ) -> Self {
        let offset = *range.start();
        let traces = CurvatureTraces::compute(&samples[range], 1.0 / dt);
        let to_mm = |trace: &[f64]| -> Vec<f64> {
            trace.iter().map(|v| v / spatial_resolution).collect()
        };

        let x = to_mm(&traces.x_high);
        let y = to_mm(&traces.y_high);
        let speed = |tx: &[f64], ty: &[f64]| -> Vec<f64> {
            let vx = differentiate(tx, spatial_resolution * dt);
            let vy = differentiate(ty, spatial_resolution * dt);
            vx.iter().zip(&vy).map(|(a, b)| a.hypot(*b)).collect()
        };
        let speed_low = speed(&traces.x_low, &traces.y_low);
        let speed_high = speed(&traces.x_high, &traces.y_high);

        let mut arc_length = Vec::with_capacity(x.len());
        let mut total = 0.0;
        for i in 0..x.len() {
            if i > 0 {
                total += (x[i] - x[i - 1]).hypot(y[i] - y[i - 1]);
            }
            arc_length.push(total);
        }

        Self {
            offset,
            x,
            y,
            arc_length,
            speed_low,
            speed_high,
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Absolute index range the workspace covers
    pub fn covers(&self) -> Option<RangeInclusive<usize>> {
        (!self.is_empty()).then(|| self.offset..=self.offset + self.len() - 1)
    }

    /// Refined velocity-minimum candidates inside `range`, ascending
    ///
    /// `detector` is used as given; callers configure it for valleys.
    pub fn candidates(
        &self,
        range: RangeInclusive<usize>,
        detector: &PeakDetector,
        refine_radius: usize,
    ) -> Vec<usize> {
        let Some((lo, hi)) = self.relative(&range) else {
            return Vec::new();
        };

        let coarse = detector.detect(&self.speed_low[lo..=hi]);
        let fine = detector.detect(&self.speed_high[lo..=hi]);

        let mut refined: Vec<usize> = coarse
            .iter()
            .map(|&c| {
                fine.iter()
                    .copied()
                    .filter(|&f| f.abs_diff(c) <= refine_radius)
                    .min_by(|&a, &b| {
                        self.speed_high[lo + a].total_cmp(&self.speed_high[lo + b])
                    })
                    .unwrap_or(c)
            })
            .map(|rel| self.offset + lo + rel)
            .collect();
        refined.sort_unstable();
        refined.dedup();
        refined
    }

    /// Heading change in degrees across `candidate`, in (-180, 180]
    ///
    /// `candidate` must lie inside `range`. The look-behind/ahead points are
    /// searched over the whole Series and fall back to its first/last
    /// sample when the path is too short.
    pub fn dalpha(
        &self,
        range: RangeInclusive<usize>,
        candidate: usize,
        inter_sample_distance: f64,
    ) -> Option<f64> {
        let (lo, hi) = self.relative(&range)?;
        let j = candidate.checked_sub(self.offset)?;
        if j < lo || j > hi {
            return None;
        }

        let s = &self.arc_length;
        let last = self.len() - 1;
        let pre = (0..j)
            .rev()
            .find(|&i| s[j] - s[i] >= inter_sample_distance)
            .unwrap_or(0);
        let post = (j + 1..=last)
            .find(|&i| s[i] - s[j] >= inter_sample_distance)
            .unwrap_or(last);

        let alpha1 = heading(self.x[j] - self.x[pre], self.y[j] - self.y[pre]);
        let alpha2 = heading(self.x[post] - self.x[j], self.y[post] - self.y[j]);
        Some(normalize_degrees(alpha2 - alpha1))
    }

    fn relative(&self, range: &RangeInclusive<usize>) -> Option<(usize, usize)> {
        let lo = range.start().checked_sub(self.offset)?;
        let hi = range.end().checked_sub(self.offset)?;
        (lo <= hi && hi < self.len()).then_some((lo, hi))
    }
}

/// Direction of travel in degrees, `atan2(dy, dx)`
pub fn heading(dx: f64, dy: f64) -> f64 {
    dy.atan2(dx).to_degrees()
}

/// Map an angle in degrees into (-180, 180]
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}
