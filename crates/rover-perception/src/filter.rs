//! Trimmed moving-window filter.
//!
//! Holds the last `capacity` samples.  The output is the mean of the middle
//! `proportion` of the sorted window, so with `proportion = 1.0` it is a plain
//! moving average and with smaller values isolated outliers are discarded
//! entirely.
//!
//! # Example
//!
//! ```rust
//! use rover_perception::Filter;
//!
//! let mut f: Filter<f64> = Filter::new(5, 0.6, 3);
//! for v in [3.0, 3.1, 40.0, 2.9, 3.0] {
//!     f.push(v);
//! }
//! // The 40.0 spike falls outside the middle three samples.
//! assert!((f.get().unwrap() - 3.0).abs() < 0.1);
//! assert!(f.ready());
//! ```

use std::cmp::Ordering;
use std::collections::VecDeque;

/// A fixed-size smoothing window over a scalar time series.
#[derive(Debug, Clone)]
pub struct Filter<T> {
    values: VecDeque<T>,
    capacity: usize,
    proportion: f64,
    min_samples: usize,
}

impl<T> Filter<T>
where
    T: Copy + PartialOrd + Into<f64>,
{
    /// Create an empty filter.
    ///
    /// `capacity` is raised to at least 1, `proportion` is clamped to
    /// `(0, 1]` and `min_samples` to `1..=capacity`.
    pub fn new(capacity: usize, proportion: f64, min_samples: usize) -> Self {
        let capacity = capacity.max(1);
        let proportion = if proportion.is_finite() && proportion > 0.0 {
            proportion.min(1.0)
        } else {
            1.0
        };
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
            proportion,
            min_samples: min_samples.clamp(1, capacity),
        }
    }

    /// Add a sample, evicting the oldest one when the window is full.
    pub fn push(&mut self, value: T) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Filtered value, or `None` when no sample has been pushed.
    pub fn get(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let mut sorted: Vec<f64> = self.values.iter().map(|v| (*v).into()).collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        let n = sorted.len();
        let keep = ((n as f64 * self.proportion).round() as usize).clamp(1, n);
        let start = (n - keep) / 2;
        let kept = &sorted[start..start + keep];
        Some(kept.iter().sum::<f64>() / keep as f64)
    }

    /// `true` once `min_samples` samples are held.
    pub fn ready(&self) -> bool {
        self.values.len() >= self.min_samples
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every sample.
    pub fn reset(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_has_no_value() {
        let f: Filter<f64> = Filter::new(4, 1.0, 2);
        assert!(f.get().is_none());
        assert!(!f.ready());
        assert!(f.is_empty());
    }

    #[test]
    fn full_proportion_is_a_moving_average() {
        let mut f: Filter<f64> = Filter::new(3, 1.0, 1);
        f.push(1.0);
        assert!((f.get().unwrap() - 1.0).abs() < 1e-9);
        f.push(2.0);
        assert!((f.get().unwrap() - 1.5).abs() < 1e-9);
        f.push(3.0);
        assert!((f.get().unwrap() - 2.0).abs() < 1e-9);
        f.push(4.0); // window is now [2, 3, 4]
        assert!((f.get().unwrap() - 3.0).abs() < 1e-9);
        assert_eq!(f.len(), 3);
    }

    #[test]
    fn single_spike_is_trimmed_out() {
        let mut f: Filter<f64> = Filter::new(5, 0.6, 1);
        for v in [10.0, 10.0, 10.0, 10.0] {
            f.push(v);
        }
        f.push(500.0);
        assert!((f.get().unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn ready_after_min_samples() {
        let mut f: Filter<f64> = Filter::new(5, 1.0, 3);
        f.push(1.0);
        f.push(1.0);
        assert!(!f.ready());
        f.push(1.0);
        assert!(f.ready());
    }

    #[test]
    fn reset_clears_samples() {
        let mut f: Filter<f64> = Filter::new(3, 1.0, 1);
        f.push(7.0);
        f.reset();
        assert!(f.get().is_none());
        assert!(!f.ready());
    }

    #[test]
    fn step_change_moves_output_gradually() {
        // For a plain moving average a raw jump of J moves the output by at
        // most J / window per sample.
        for window in 1..=6usize {
            let mut f: Filter<f64> = Filter::new(window, 1.0, 1);
            for _ in 0..window {
                f.push(3.0);
            }
            let mut prev = f.get().unwrap();
            for _ in 0..window {
                f.push(9.0);
                let now = f.get().unwrap();
                assert!(now - prev <= 6.0 / window as f64 + 1e-9, "window {window}");
                assert!(now >= prev);
                prev = now;
            }
            assert!((prev - 9.0).abs() < 1e-9);
        }
    }

    #[test]
    fn integer_samples_are_supported() {
        let mut f: Filter<i32> = Filter::new(4, 1.0, 1);
        f.push(1);
        f.push(2);
        assert!((f.get().unwrap() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn constructor_clamps_parameters() {
        let f: Filter<f64> = Filter::new(0, 7.0, 9);
        assert_eq!(f.capacity(), 1);
        let mut g: Filter<f64> = Filter::new(2, f64::NAN, 0);
        g.push(1.0);
        assert!(g.ready());
    }
}
