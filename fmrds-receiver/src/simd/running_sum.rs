//! Kahan-compensated running average over a fixed-size sliding window.
//!
//! Ported from `hvylya::core::RunningSum`: a compensated summation
//! accumulator that periodically re-accumulates from scratch to bound the
//! drift that naive incremental averaging accrues over millions of samples
//! (this runs continuously for as long as the receiver is tuned).

use std::collections::VecDeque;

/// Trait for values `RunningSum` can accumulate: real or complex samples.
pub trait Accumulate: Copy + Default {
    fn add(self, other: Self) -> Self;
    fn sub(self, other: Self) -> Self;
    fn scale(self, factor: f32) -> Self;
}

impl Accumulate for f32 {
    fn add(self, other: Self) -> Self {
        self + other
    }
    fn sub(self, other: Self) -> Self {
        self - other
    }
    fn scale(self, factor: f32) -> Self {
        self * factor
    }
}

impl Accumulate for num_complex::Complex32 {
    fn add(self, other: Self) -> Self {
        self + other
    }
    fn sub(self, other: Self) -> Self {
        self - other
    }
    fn scale(self, factor: f32) -> Self {
        self * factor
    }
}

/// Running average of the last `window` values added, with Kahan
/// compensation and periodic re-accumulation every `1 / EPSILON` additions
/// to bound floating-point drift.
pub struct RunningSum<T: Accumulate> {
    window: usize,
    history: VecDeque<T>,
    sum: T,
    compensation: T,
    additions_since_resync: usize,
    max_additions_before_resync: usize,
}

impl<T: Accumulate> RunningSum<T> {
    pub fn new(window: usize) -> Self {
        assert!(window > 0, "window must be > 0");
        RunningSum {
            window,
            history: VecDeque::with_capacity(window),
            sum: T::default(),
            compensation: T::default(),
            additions_since_resync: 0,
            // Mirrors the reference's `1 / epsilon` resync cadence for f32.
            max_additions_before_resync: (1.0 / f32::EPSILON) as usize,
        }
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.sum = T::default();
        self.compensation = T::default();
        self.additions_since_resync = 0;
    }

    pub fn empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn full(&self) -> bool {
        self.history.len() >= self.window
    }

    pub fn add(&mut self, value: T) {
        if self.history.len() >= self.window {
            let oldest = self.history.pop_front().unwrap();
            self.kahan_add(oldest.scale(-1.0));
        }
        self.history.push_back(value);
        self.kahan_add(value);

        self.additions_since_resync += 1;
        if self.additions_since_resync >= self.max_additions_before_resync {
            self.resync();
        }
    }

    fn kahan_add(&mut self, value: T) {
        let y = value.sub(self.compensation);
        let t = self.sum.add(y);
        self.compensation = t.sub(self.sum).sub(y);
        self.sum = t;
    }

    fn resync(&mut self) {
        let mut sum = T::default();
        for v in &self.history {
            sum = sum.add(*v);
        }
        self.sum = sum;
        self.compensation = T::default();
        self.additions_since_resync = 0;
    }

    /// Average of the values currently in the window. Panics if empty, as
    /// the reference does with `CHECK(!empty())`.
    pub fn avg(&self) -> T
    where
        T: std::ops::Div<f32, Output = T>,
    {
        assert!(!self.empty(), "RunningSum::avg() called while empty");
        self.sum / (self.history.len() as f32)
    }

    pub fn sum(&self) -> T {
        self.sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avg_of_constant_sequence_is_constant() {
        let mut rs: RunningSum<f32> = RunningSum::new(4);
        for _ in 0..10 {
            rs.add(2.0);
        }
        assert!((rs.avg() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn window_slides() {
        let mut rs: RunningSum<f32> = RunningSum::new(3);
        rs.add(1.0);
        rs.add(2.0);
        rs.add(3.0);
        assert!((rs.avg() - 2.0).abs() < 1e-6);
        rs.add(9.0);
        // Window now holds [2, 3, 9].
        assert!((rs.avg() - (14.0 / 3.0)).abs() < 1e-5);
    }

    #[test]
    #[should_panic]
    fn avg_on_empty_panics() {
        let rs: RunningSum<f32> = RunningSum::new(3);
        rs.avg();
    }
}
