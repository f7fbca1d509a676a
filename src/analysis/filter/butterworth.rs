// Zero-phase Butterworth low-pass
//
// An order-N Butterworth low-pass is realised as N/2 cascaded biquads
// (bilinear transform with frequency pre-warping). Each section runs in
// direct form II transposed, starting from its steady state for the first
// input value so a constant signal passes through untouched. Zero phase is
// obtained by filtering forward, then backward over the reversed output.
//
// Edge transients are absorbed by mirror-reflecting `pad` samples onto both
// ends before filtering and cutting them off afterwards.

use std::f64::consts::PI;

use super::FilterError;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    fn lowpass(cutoff_hz: f64, sample_rate: f64, q: f64) -> Self {
        let k = (PI * cutoff_hz / sample_rate).tan();
        let k2 = k * k;
        let norm = 1.0 / (1.0 + k / q + k2);

        let b0 = k2 * norm;
        Self {
            b0,
            b1: 2.0 * b0,
            b2: b0,
            a1: 2.0 * (k2 - 1.0) * norm,
            a2: (1.0 - k / q + k2) * norm,
        }
    }

    /// Filter in place from the steady state of `signal[0]`
    fn run(&self, signal: &mut [f64]) {
        let Some(&first) = signal.first() else {
            return;
        };
        let gain = (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2);
        let mut z2 = (self.b2 - self.a2 * gain) * first;
        let mut z1 = (self.b1 - self.a1 * gain) * first + z2;

        for v in signal.iter_mut() {
            let x = *v;
            let y = self.b0 * x + z1;
            z1 = self.b1 * x - self.a1 * y + z2;
            z2 = self.b2 * x - self.a2 * y;
            *v = y;
        }
    }
}

#[derive(Debug, Clone)]
pub struct ButterworthLowpass {
    sections: Vec<Biquad>,
}

impl ButterworthLowpass {
    /// Design an even-order low-pass
    pub fn new(order: usize, cutoff_hz: f64, sample_rate: f64) -> Result<Self, FilterError> {
        if order == 0 || order % 2 != 0 {
            return Err(FilterError::InvalidParameters(format!(
                "order {} (must be even and > 0)",
                order
            )));
        }
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(FilterError::InvalidParameters(format!(
                "sample rate {}",
                sample_rate
            )));
        }
        if !(cutoff_hz > 0.0 && cutoff_hz < sample_rate / 2.0) {
            return Err(FilterError::InvalidParameters(format!(
                "cutoff {} Hz outside (0, {}) Hz",
                cutoff_hz,
                sample_rate / 2.0
            )));
        }

        let sections = (0..order / 2)
            .map(|k| {
                let theta = PI * (2 * k + 1) as f64 / (2 * order) as f64;
                Biquad::lowpass(cutoff_hz, sample_rate, 1.0 / (2.0 * theta.cos()))
            })
            .collect();
        Ok(Self { sections })
    }

    /// Forward-backward filtering of a reflection-padded copy of `signal`
    pub fn filtfilt(&self, signal: &[f64], pad: usize) -> Result<Vec<f64>, FilterError> {
        let n = signal.len();
        if n < 2 {
            return Err(FilterError::TooShort {
                len: n,
                required: 2,
            });
        }
        if signal.iter().any(|v| !v.is_finite()) {
            return Err(FilterError::NonFinite);
        }

        let mut work = reflect_pad(signal, pad);
        for section in &self.sections {
            section.run(&mut work);
        }
        work.reverse();
        for section in &self.sections {
            section.run(&mut work);
        }
        work.reverse();

        Ok(work[pad..pad + n].to_vec())
    }
}

/// Mirror `pad` samples onto each end, edge sample not repeated
///
/// Pads longer than the signal keep bouncing between both ends.
fn reflect_pad(signal: &[f64], pad: usize) -> Vec<f64> {
    let n = signal.len();
    let period = 2 * (n - 1);
    let bounce = |offset: usize| {
        let r = offset % period;
        if r > n - 1 {
            period - r
        } else {
            r
        }
    };

    let mut out = Vec::with_capacity(n + 2 * pad);
    out.extend((1..=pad).rev().map(|k| signal[bounce(k)]));
    out.extend_from_slice(signal);
    out.extend((1..=pad).map(|k| signal[n - 1 - bounce(k)]));
    out
}
