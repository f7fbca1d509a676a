// Savitzky–Golay smoothing
//
// Least-squares polynomial fit over a sliding window. The projection
// matrix (AᵀA)⁻¹Aᵀ of the centred Vandermonde matrix A is computed once per
// (window, order); its first row is the smoothing kernel. The first and
// last half-window samples are evaluated from the polynomial fitted to the
// first/last full window instead of being padded.
//
// Window positions are scaled to [-1, 1] before fitting so the normal
// equations stay well conditioned for long windows.

use super::FilterError;

#[derive(Debug, Clone)]
pub struct SavitzkyGolay {
    window: usize,
    order: usize,
    half: usize,
    /// (order + 1) x window
    projection: Vec<Vec<f64>>,
}

impl SavitzkyGolay {
    /// Build a filter; an even window is widened by one sample
    pub fn new(window: usize, order: usize) -> Result<Self, FilterError> {
        let window = if window % 2 == 0 { window + 1 } else { window };
        if window < 3 || order >= window {
            return Err(FilterError::InvalidParameters(format!(
                "window {} / order {}",
                window, order
            )));
        }

        let half = window / 2;
        let cols = order + 1;
        let positions: Vec<f64> = (0..window)
            .map(|k| (k as f64 - half as f64) / half as f64)
            .collect();

        // A[k][j] = u_k^j
        let vandermonde: Vec<Vec<f64>> = positions
            .iter()
            .map(|&u| (0..cols).map(|j| u.powi(j as i32)).collect())
            .collect();

        let mut normal = vec![vec![0.0; cols]; cols];
        for (r, row) in normal.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = vandermonde.iter().map(|a| a[r] * a[c]).sum();
            }
        }
        let inverse = invert(normal).ok_or(FilterError::Singular)?;

        let projection = (0..cols)
            .map(|r| {
                (0..window)
                    .map(|k| (0..cols).map(|c| inverse[r][c] * vandermonde[k][c]).sum::<f64>())
                    .collect()
            })
            .collect();

        Ok(Self {
            window,
            order,
            half,
            projection,
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Smoothing kernel applied at the window centre
    pub fn coefficients(&self) -> &[f64] {
        &self.projection[0]
    }

    pub fn apply(&self, signal: &[f64]) -> Result<Vec<f64>, FilterError> {
        let n = signal.len();
        if n < self.window {
            return Err(FilterError::TooShort {
                len: n,
                required: self.window,
            });
        }
        if signal.iter().any(|v| !v.is_finite()) {
            return Err(FilterError::NonFinite);
        }

        let kernel = self.coefficients();
        let mut out = vec![0.0; n];
        for i in self.half..n - self.half {
            let window = &signal[i - self.half..=i + self.half];
            out[i] = kernel.iter().zip(window).map(|(k, v)| k * v).sum();
        }

        let head = self.fit(&signal[..self.window]);
        for (i, slot) in out.iter_mut().take(self.half).enumerate() {
            *slot = self.evaluate(&head, i);
        }

        let tail_start = n - self.window;
        let tail = self.fit(&signal[tail_start..]);
        for k in self.half + 1..self.window {
            out[tail_start + k] = self.evaluate(&tail, k);
        }

        Ok(out)
    }

    /// Polynomial coefficients fitted to one full window
    fn fit(&self, window: &[f64]) -> Vec<f64> {
        self.projection
            .iter()
            .map(|row| row.iter().zip(window).map(|(p, v)| p * v).sum())
            .collect()
    }

    /// Value of the fitted polynomial at window position `k`
    fn evaluate(&self, poly: &[f64], k: usize) -> f64 {
        let u = (k as f64 - self.half as f64) / self.half as f64;
        poly.iter().rev().fold(0.0, |acc, c| acc * u + c)
    }
}

/// Gauss-Jordan inverse with partial pivoting
fn invert(mut m: Vec<Vec<f64>>) -> Option<Vec<Vec<f64>>> {
    let n = m.len();
    let mut inv: Vec<Vec<f64>> = (0..n)
        .map(|r| (0..n).map(|c| if r == c { 1.0 } else { 0.0 }).collect())
        .collect();

    for col in 0..n {
        let pivot = (col..n).max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))?;
        if m[pivot][col].abs() < 1e-12 {
            return None;
        }
        m.swap(col, pivot);
        inv.swap(col, pivot);

        let scale = m[col][col];
        for c in 0..n {
            m[col][c] /= scale;
            inv[col][c] /= scale;
        }

        let pivot_row = m[col].clone();
        let pivot_inv = inv[col].clone();
        for r in 0..n {
            if r == col {
                continue;
            }
            let factor = m[r][col];
            if factor == 0.0 {
                continue;
            }
            for c in 0..n {
                m[r][c] -= factor * pivot_row[c];
                inv[r][c] -= factor * pivot_inv[c];
            }
        }
    }

    Some(inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_known_quadratic_kernel() {
        let filter = SavitzkyGolay::new(5, 2).unwrap();
        let expected = [-3.0, 12.0, 17.0, 12.0, -3.0].map(|v| v / 35.0);
        for (got, want) in filter.coefficients().iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "{} != {}", got, want);
        }
    }

    #[test]
    fn test_preserves_polynomials_up_to_order() {
        let filter = SavitzkyGolay::new(7, 3).unwrap();
        let signal: Vec<f64> = (0..30)
            .map(|i| {
                let t = i as f64;
                0.02 * t * t * t - 0.5 * t * t + 3.0 * t - 7.0
            })
            .collect();
        let smoothed = filter.apply(&signal).unwrap();
        for (i, (s, r)) in smoothed.iter().zip(&signal).enumerate() {
            assert!((s - r).abs() < 1e-6, "sample {}: {} vs {}", i, s, r);
        }
    }

    #[test]
    fn test_reduces_noise() {
        let mut rng = StdRng::seed_from_u64(11);
        let clean: Vec<f64> = (0..200).map(|i| (i as f64 * 0.05).sin() * 50.0).collect();
        let noisy: Vec<f64> = clean.iter().map(|v| v + rng.gen_range(-5.0..5.0)).collect();

        let smoothed = SavitzkyGolay::new(15, 5).unwrap().apply(&noisy).unwrap();
        let err = |a: &[f64]| -> f64 {
            a.iter().zip(&clean).map(|(x, c)| (x - c).powi(2)).sum::<f64>()
        };
        assert!(err(&smoothed) < err(&noisy) * 0.6);
    }

    #[test]
    fn test_even_window_is_widened() {
        let filter = SavitzkyGolay::new(6, 2).unwrap();
        assert_eq!(filter.window(), 7);
    }

    #[test]
    fn test_invalid_parameters_and_short_input() {
        assert!(matches!(
            SavitzkyGolay::new(5, 5),
            Err(FilterError::InvalidParameters(_))
        ));
        let filter = SavitzkyGolay::new(5, 3).unwrap();
        assert_eq!(
            filter.apply(&[1.0, 2.0, 3.0]).unwrap_err(),
            FilterError::TooShort {
                len: 3,
                required: 5
            }
        );
        assert_eq!(
            filter.apply(&[1.0, 2.0, f64::NAN, 3.0, 4.0]).unwrap_err(),
            FilterError::NonFinite
        );
    }
}
