// KinematicsCalculator - velocity and acceleration from filtered x/y
//
// One level of differencing per derivative, divided by a single temporal
// resolution for the whole Series rather than per-sample intervals, which
// would amplify timestamp jitter. The last element of every derivative is
// copied from the one before so arrays keep the Series length.
//
// Units: filtered x/y are device units, velocity is mm/s, acceleration is
// mm/s².

use crate::samples::Sample;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicsCalculator {
    /// Device units per millimetre
    spatial_resolution: f64,
    /// Seconds per sample
    dt: f64,
}

impl KinematicsCalculator {
    pub fn new(spatial_resolution: f64, temporal_resolution: f64) -> Self {
        Self {
            spatial_resolution,
            dt: temporal_resolution,
        }
    }

    /// Write velocity/acceleration fields for one Series slice
    pub fn apply(&self, series: &mut [Sample]) {
        let x: Vec<f64> = series.iter().map(|s| s.x_filtered).collect();
        let y: Vec<f64> = series.iter().map(|s| s.y_filtered).collect();

        let scale = self.spatial_resolution * self.dt;
        let vx = differentiate(&x, scale);
        let vy = differentiate(&y, scale);
        let speed: Vec<f64> = vx.iter().zip(&vy).map(|(a, b)| a.hypot(*b)).collect();
        let accel = differentiate(&speed, self.dt);

        for (i, sample) in series.iter_mut().enumerate() {
            sample.x_velocity = vx[i];
            sample.y_velocity = vy[i];
            sample.xy_velocity = speed[i];
            sample.xy_acceleration = accel[i];
        }
    }
}

/// `diff(values) / divisor` padded back to the input length
///
/// A single value has no difference and yields `[0.0]`.
pub fn differentiate(values: &[f64], divisor: f64) -> Vec<f64> {
    match values.len() {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => {
            let mut out: Vec<f64> = values.windows(2).map(|w| (w[1] - w[0]) / divisor).collect();
            let last = out[out.len() - 1];
            out.push(last);
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::{PenState, RawSample};

    #[test]
    fn test_differentiate_duplicates_last_element() {
        assert_eq!(differentiate(&[0.0, 1.0, 3.0, 6.0], 1.0), vec![1.0, 2.0, 3.0, 3.0]);
        assert_eq!(differentiate(&[0.0, 2.0], 2.0), vec![1.0, 1.0]);
        assert_eq!(differentiate(&[5.0], 1.0), vec![0.0]);
        assert!(differentiate(&[], 1.0).is_empty());
    }

    #[test]
    fn test_constant_velocity_diagonal() {
        // 3 units right, 4 units up per sample at 100 Hz, 10 units/mm
        let mut series: Vec<Sample> = (0..6)
            .map(|i| {
                let mut s = Sample::from(RawSample {
                    time: i as f64 * 0.01,
                    x: 0,
                    y: 0,
                    pressure: 1,
                    state: PenState::NONE,
                });
                s.x_filtered = 3.0 * i as f64;
                s.y_filtered = 4.0 * i as f64;
                s
            })
            .collect();

        KinematicsCalculator::new(10.0, 0.01).apply(&mut series);
        for s in &series {
            assert!((s.x_velocity - 30.0).abs() < 1e-9);
            assert!((s.y_velocity - 40.0).abs() < 1e-9);
            assert!((s.xy_velocity - 50.0).abs() < 1e-9);
            assert!(s.xy_acceleration.abs() < 1e-6);
        }
    }

    #[test]
    fn test_uses_fixed_dt_not_sample_times() {
        let mut series: Vec<Sample> = [0.0, 0.001, 0.5]
            .iter()
            .enumerate()
            .map(|(i, &t)| {
                let mut s = Sample::from(RawSample {
                    time: t,
                    x: 0,
                    y: 0,
                    pressure: 1,
                    state: PenState::NONE,
                });
                s.x_filtered = i as f64;
                s
            })
            .collect();

        KinematicsCalculator::new(1.0, 0.1).apply(&mut series);
        assert!(series.iter().all(|s| (s.x_velocity - 10.0).abs() < 1e-9));
    }
}
