//! Deterministic synthetic handwriting for tests, fixtures and the CLI.
//!
//! A trace is a sequence of "words". Every word starts with a short hover
//! approach whose first sample carries FIRST_ENTER, followed by "letters":
//! pressed polylines of a few straight legs with a cosine speed profile, so
//! the pen comes to rest at every corner. Letters are separated by short
//! hover lifts. Position jitter comes from a seeded [`StdRng`], making every
//! trace reproducible from its seed.

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::samples::{PenState, RawSample, Sample, SampleStore};

/// Parameters of a synthetic trace; serializable so fixtures can record
/// how they were generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticTrace {
    pub seed: u64,
    pub words: usize,
    pub letters_per_word: usize,
    pub legs_per_letter: usize,
    pub sample_rate_hz: f64,
    /// Device units per millimetre
    pub spatial_resolution: f64,
    /// Uniform position noise amplitude in device units
    pub jitter: f64,
    /// Mark pressed-run starts with FIRST_PRESS
    pub press_markers: bool,
    /// Pause between words in seconds
    pub word_gap_sec: f64,
}

impl SyntheticTrace {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            words: 2,
            letters_per_word: 3,
            legs_per_letter: 3,
            sample_rate_hz: 100.0,
            spatial_resolution: 100.0,
            jitter: 2.0,
            press_markers: true,
            word_gap_sec: 0.1,
        }
    }

    pub fn words(mut self, words: usize) -> Self {
        self.words = words;
        self
    }

    pub fn letters_per_word(mut self, letters: usize) -> Self {
        self.letters_per_word = letters.max(1);
        self
    }

    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.max(0.0);
        self
    }

    pub fn press_markers(mut self, press_markers: bool) -> Self {
        self.press_markers = press_markers;
        self
    }

    /// Number of pressed Runs the trace contains
    pub fn expected_runs(&self) -> usize {
        self.words * self.letters_per_word
    }

    pub fn build_raw(&self) -> Vec<RawSample> {
        let mut gen = Generator {
            trace: self,
            rng: StdRng::seed_from_u64(self.seed),
            out: Vec::new(),
            time: 0.0,
            x: 0.0,
            y: 0.0,
        };

        for word in 0..self.words {
            if word > 0 {
                gen.time += self.word_gap_sec;
                gen.x += 5.0;
            }
            gen.hover(12, 3.0, true);
            for letter in 0..self.letters_per_word {
                if letter > 0 {
                    gen.hover(8, 2.0, false);
                }
                gen.letter();
            }
        }

        gen.out
    }

    pub fn build_samples(&self) -> Vec<Sample> {
        self.build_raw().into_iter().map(Sample::from).collect()
    }

    pub fn build_store(&self) -> SampleStore {
        SampleStore::from_raw(self.build_raw())
    }
}

struct Generator<'a> {
    trace: &'a SyntheticTrace,
    rng: StdRng,
    out: Vec<RawSample>,
    time: f64,
    /// Pen position in mm
    x: f64,
    y: f64,
}

impl Generator<'_> {
    fn push(&mut self, pressure: i32, state: PenState) {
        let scale = self.trace.spatial_resolution;
        let jx = self.noise();
        let jy = self.noise();
        self.out.push(RawSample {
            time: self.time,
            x: (self.x * scale + jx).round() as i32,
            y: (self.y * scale + jy).round() as i32,
            pressure,
            state,
        });
        self.time += 1.0 / self.trace.sample_rate_hz;
    }

    fn noise(&mut self) -> f64 {
        if self.trace.jitter > 0.0 {
            self.rng.gen_range(-self.trace.jitter..=self.trace.jitter)
        } else {
            0.0
        }
    }

    /// Hover move of `distance_mm` to the right
    fn hover(&mut self, samples: usize, distance_mm: f64, enter: bool) {
        let step = distance_mm / samples as f64;
        for i in 0..samples {
            let mut state = PenState::HOVERING;
            if i == 0 {
                state = state | PenState::FIRST_HOVER;
                if enter {
                    state = state | PenState::FIRST_ENTER;
                }
            }
            self.push(0, state);
            self.x += step;
        }
    }

    /// Pressed polyline; the pen decelerates to rest at each corner
    fn letter(&mut self) {
        let mut heading: f64 = self.rng.gen_range(40.0..140.0);
        let legs = self.trace.legs_per_letter.max(1);

        for leg in 0..legs {
            if leg > 0 {
                let turn: f64 = self.rng.gen_range(100.0..160.0);
                heading += if self.rng.gen_bool(0.5) { turn } else { -turn };
            }
            let length: f64 = self.rng.gen_range(4.0..8.0);
            let steps: usize = self.rng.gen_range(20..32);
            let (dx, dy) = (heading.to_radians().cos(), heading.to_radians().sin());
            let (x0, y0) = (self.x, self.y);

            for step in 0..steps {
                let phase = step as f64 / steps as f64;
                let travel = length * (1.0 - (PI * phase).cos()) / 2.0;
                self.x = x0 + dx * travel;
                self.y = y0 + dy * travel;

                let first = leg == 0 && step == 0;
                let mut state = PenState::PRESSED;
                if first && self.trace.press_markers {
                    state = state | PenState::FIRST_PRESS;
                }
                let pressure = 300 + (200.0 * (PI * phase).sin()) as i32;
                self.push(pressure, state);
            }
            self.x = x0 + dx * length;
            self.y = y0 + dy * length;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_trace() {
        let a = SyntheticTrace::new(42).words(3).build_raw();
        let b = SyntheticTrace::new(42).words(3).build_raw();
        assert_eq!(a, b);

        let c = SyntheticTrace::new(43).words(3).build_raw();
        assert_ne!(a, c);
    }

    #[test]
    fn test_trace_structure() {
        let trace = SyntheticTrace::new(1).words(2).letters_per_word(2);
        let raw = trace.build_raw();

        let enters = raw
            .iter()
            .filter(|s| s.state.contains(PenState::FIRST_ENTER))
            .count();
        let presses = raw
            .iter()
            .filter(|s| s.state.contains(PenState::FIRST_PRESS))
            .count();
        assert_eq!(enters, 2);
        assert_eq!(presses, trace.expected_runs());
        assert!(raw[0].state.contains(PenState::FIRST_ENTER));
        assert!(raw.windows(2).all(|w| w[0].time < w[1].time));
        assert!(raw
            .iter()
            .filter(|s| s.state.contains(PenState::PRESSED))
            .all(|s| s.pressure > 0));
    }

    #[test]
    fn test_without_press_markers() {
        let raw = SyntheticTrace::new(1).press_markers(false).build_raw();
        assert!(raw.iter().all(|s| !s.state.contains(PenState::FIRST_PRESS)));
    }
}
