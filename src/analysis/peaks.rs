// PeakDetector - deterministic local-extrema finder
//
// Pure function of its input: no pen semantics, no state between calls.
//
// Algorithm:
// 1. Work on the signal (negated in valley mode)
// 2. Candidate = index where the first difference turns from positive to
//    negative; a flat run between a rise and a fall is a plateau and is
//    resolved by the edge policy
// 3. Drop candidates below min_height
// 4. Ascending scan enforcing min_distance; the earlier candidate always
//    wins, so equal-height neighbours resolve to the lower index
//
// The first and last sample are never candidates. NaN samples never are
// either and break any rise/fall they touch.

use crate::config::{EdgePolicy, ExtremaKind};

/// Local-extrema finder configured through builder methods
#[derive(Debug, Clone, PartialEq)]
pub struct PeakDetector {
    min_height: Option<f64>,
    min_distance: usize,
    edge_policy: EdgePolicy,
    valley: bool,
}

impl Default for PeakDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PeakDetector {
    /// Peaks, no height bound, `min_distance = 1`, rising-edge plateaus
    pub fn new() -> Self {
        Self {
            min_height: None,
            min_distance: 1,
            edge_policy: EdgePolicy::Rising,
            valley: false,
        }
    }

    /// Lower bound on a peak's value
    ///
    /// In valley mode the bound flips: a valley is kept when its value is
    /// `<= min_height`.
    pub fn min_height(mut self, min_height: f64) -> Self {
        self.min_height = Some(min_height);
        self
    }

    /// Minimum index separation between accepted extrema, clamped to 1
    pub fn min_distance(mut self, min_distance: usize) -> Self {
        self.min_distance = min_distance.max(1);
        self
    }

    pub fn edge_policy(mut self, edge_policy: EdgePolicy) -> Self {
        self.edge_policy = edge_policy;
        self
    }

    /// Detect minima instead of maxima
    pub fn valley(mut self, valley: bool) -> Self {
        self.valley = valley;
        self
    }

    /// Strictly ascending indices of accepted extrema
    ///
    /// Empty or too-short input yields an empty vector.
    pub fn detect(&self, signal: &[f64]) -> Vec<usize> {
        if signal.len() < 3 {
            return Vec::new();
        }

        let sign = if self.valley { -1.0 } else { 1.0 };
        let work: Vec<f64> = signal.iter().map(|v| v * sign).collect();
        let floor = self.min_height.map(|h| h * sign);

        let mut accepted: Vec<usize> = Vec::new();
        for ix in self.candidates(&work) {
            if let Some(floor) = floor {
                if !(work[ix] >= floor) {
                    continue;
                }
            }
            let far_enough = accepted
                .last()
                .map_or(true, |&last| ix - last >= self.min_distance);
            if far_enough {
                accepted.push(ix);
            }
        }
        accepted
    }

    /// Peaks, valleys or both, merged in ascending order
    ///
    /// `min_distance` is enforced within each kind, not across kinds.
    pub fn detect_extrema(&self, signal: &[f64], kind: ExtremaKind) -> Vec<usize> {
        match kind {
            ExtremaKind::Peak => self.clone().valley(false).detect(signal),
            ExtremaKind::Valley => self.clone().valley(true).detect(signal),
            ExtremaKind::Both => {
                let mut merged = self.clone().valley(false).detect(signal);
                merged.extend(self.clone().valley(true).detect(signal));
                merged.sort_unstable();
                merged.dedup();
                merged
            }
        }
    }

    /// Local maxima of `work` before height/distance filtering, ascending
    fn candidates(&self, work: &[f64]) -> Vec<usize> {
        let n = work.len();
        let mut out = Vec::new();
        let mut ix = 1;

        while ix < n - 1 {
            if !(work[ix - 1] < work[ix]) {
                ix += 1;
                continue;
            }

            // Rising into ix; walk the plateau (if any)
            let mut last = ix;
            while last + 1 < n && work[last + 1] == work[ix] {
                last += 1;
            }
            if last == n - 1 {
                break;
            }

            if work[last + 1] < work[ix] {
                if last == ix {
                    out.push(ix);
                } else {
                    match self.edge_policy {
                        EdgePolicy::None => {}
                        EdgePolicy::Rising => out.push(ix),
                        EdgePolicy::Falling => out.push(last),
                        EdgePolicy::Both => {
                            out.push(ix);
                            out.push(last);
                        }
                    }
                }
            }
            ix = last + 1;
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_two_symmetric_peaks() {
        let signal = [0.0, 1.0, 3.0, 1.0, 0.0, 1.0, 3.0, 1.0, 0.0];
        let peaks = PeakDetector::new().min_distance(1).detect(&signal);
        assert_eq!(peaks, vec![2, 6]);
    }

    #[test]
    fn test_equal_peaks_within_min_distance_keep_earlier() {
        let signal = [0.0, 3.0, 0.0, 3.0, 0.0];
        let peaks = PeakDetector::new().min_distance(3).detect(&signal);
        assert_eq!(peaks, vec![1], "earlier candidate must win the tie");

        // Far enough apart: both survive
        let peaks = PeakDetector::new().min_distance(2).detect(&signal);
        assert_eq!(peaks, vec![1, 3]);
    }

    #[test]
    fn test_plateau_edge_policies() {
        let signal = [0.0, 1.0, 2.0, 2.0, 2.0, 1.0, 0.0];
        let run = |policy| PeakDetector::new().edge_policy(policy).detect(&signal);

        assert_eq!(run(EdgePolicy::Rising), vec![2]);
        assert_eq!(run(EdgePolicy::Falling), vec![4]);
        assert_eq!(run(EdgePolicy::Both), vec![2, 4]);
        assert!(run(EdgePolicy::None).is_empty());
    }

    #[test]
    fn test_plateau_not_followed_by_fall_is_ignored() {
        // Step up then flat to the end
        assert!(PeakDetector::new().detect(&[0.0, 1.0, 1.0]).is_empty());
        // Starts flat, then falls: no rise into the plateau
        assert!(PeakDetector::new().detect(&[1.0, 1.0, 0.0]).is_empty());
        // Rise, plateau, rise again: shoulder, not a peak
        assert_eq!(
            PeakDetector::new()
                .edge_policy(EdgePolicy::Both)
                .detect(&[0.0, 1.0, 1.0, 2.0, 0.0]),
            vec![3]
        );
    }

    #[test]
    fn test_valley_mode_and_height() {
        let signal = [3.0, 1.0, 3.0, -2.0, 3.0];
        assert_eq!(PeakDetector::new().valley(true).detect(&signal), vec![1, 3]);
        assert_eq!(
            PeakDetector::new().valley(true).min_height(0.0).detect(&signal),
            vec![3]
        );

        let peaks = PeakDetector::new()
            .min_height(3.0)
            .detect(&[0.0, 5.0, 0.0, 2.0, 0.0]);
        assert_eq!(peaks, vec![1]);
    }

    #[test]
    fn test_detect_extrema_both_merges_sorted() {
        let signal = [0.0, 2.0, 0.0, 2.0, 0.0];
        let detector = PeakDetector::new();
        assert_eq!(detector.detect_extrema(&signal, ExtremaKind::Peak), vec![1, 3]);
        assert_eq!(detector.detect_extrema(&signal, ExtremaKind::Valley), vec![2]);
        assert_eq!(
            detector.detect_extrema(&signal, ExtremaKind::Both),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_short_and_degenerate_input() {
        let detector = PeakDetector::new();
        assert!(detector.detect(&[]).is_empty());
        assert!(detector.detect(&[1.0]).is_empty());
        assert!(detector.detect(&[0.0, 1.0]).is_empty());
        assert!(detector.detect(&[2.0, 2.0, 2.0, 2.0]).is_empty());
        assert_eq!(
            detector.detect(&[0.0, f64::NAN, 0.0, 2.0, 0.0]),
            vec![3],
            "NaN samples must not produce candidates"
        );
    }

    #[test]
    fn test_zero_min_distance_is_clamped() {
        let detector = PeakDetector::new().min_distance(0);
        assert_eq!(detector.detect(&[0.0, 1.0, 0.0, 1.0, 0.0]), vec![1, 3]);
    }

    #[test]
    fn test_deterministic_and_separated_on_noise() {
        let mut rng = StdRng::seed_from_u64(7);
        let signal: Vec<f64> = (0..500).map(|_| rng.gen_range(-1.0..1.0)).collect();

        for min_distance in [1, 2, 5, 13] {
            for policy in [
                EdgePolicy::None,
                EdgePolicy::Rising,
                EdgePolicy::Falling,
                EdgePolicy::Both,
            ] {
                for valley in [false, true] {
                    let detector = PeakDetector::new()
                        .min_distance(min_distance)
                        .edge_policy(policy)
                        .valley(valley);
                    let first = detector.detect(&signal);
                    let second = detector.detect(&signal);
                    assert_eq!(first, second, "detector output must be deterministic");
                    assert!(!first.is_empty());
                    for pair in first.windows(2) {
                        assert!(
                            pair[1] - pair[0] >= min_distance,
                            "peaks {:?} closer than {}",
                            pair,
                            min_distance
                        );
                    }
                }
            }
        }
    }
}
