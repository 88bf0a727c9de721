//! Per-branch signal-to-noise ratio estimation.
//!
//! Ported from `hvylya::filters::fm::FmSnrEstimator`: tracks two running
//! power sums over a sliding window -- one over the branch's own
//! (lowpass, presumed-signal-dominated) samples, one over a shared noise
//! reference extracted from spectrum the receiver has no signal in --
//! and periodically emits `10*log10(signal_power / noise_power)` scaled
//! by the branch's own noise multiplier (accounting for the differing
//! bandwidths signal and noise were measured over).

use crate::simd::running_sum::RunningSum;

pub struct SnrEstimator {
    signal_power: RunningSum<f32>,
    noise_power: RunningSum<f32>,
    noise_multiplier: f32,
    emit_every: usize,
    samples_since_emit: usize,
    last_snr_db: f32,
}

impl SnrEstimator {
    /// `window_size` is the number of samples the running power sums
    /// average over; `noise_multiplier` rescales the noise branch's
    /// measured power to the signal branch's bandwidth (e.g. the ratio
    /// of the two branches' filter bandwidths); `emit_every` is how many
    /// processed samples pass between SNR recomputations (the reference
    /// recomputes roughly once per 1000 samples rather than per-sample).
    pub fn new(window_size: usize, noise_multiplier: f32, emit_every: usize) -> Self {
        SnrEstimator {
            signal_power: RunningSum::new(window_size),
            noise_power: RunningSum::new(window_size),
            noise_multiplier,
            emit_every: emit_every.max(1),
            samples_since_emit: 0,
            last_snr_db: f32::NEG_INFINITY,
        }
    }

    pub fn reset(&mut self) {
        self.signal_power.clear();
        self.noise_power.clear();
        self.samples_since_emit = 0;
        self.last_snr_db = f32::NEG_INFINITY;
    }

    /// Feeds one sample of the branch signal and the shared noise
    /// reference; returns `Some(snr_db)` whenever the emit cadence
    /// elapses, `None` otherwise.
    pub fn update(&mut self, signal_sample: f32, noise_sample: f32) -> Option<f32> {
        self.signal_power.add(signal_sample * signal_sample);
        self.noise_power.add(noise_sample * noise_sample);

        self.samples_since_emit += 1;
        if self.samples_since_emit < self.emit_every {
            return None;
        }
        self.samples_since_emit = 0;

        if self.signal_power.empty() || self.noise_power.empty() {
            return None;
        }

        let signal = self.signal_power.avg();
        let noise = self.noise_power.avg() * self.noise_multiplier;

        if noise <= 0.0 || signal <= 0.0 {
            self.last_snr_db = f32::NEG_INFINITY;
        } else {
            self.last_snr_db = 10.0 * (signal / noise).log10();
        }
        Some(self.last_snr_db)
    }

    pub fn last_snr_db(&self) -> f32 {
        self.last_snr_db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_signal_over_weak_noise_yields_positive_snr() {
        let mut snr = SnrEstimator::new(100, 1.0, 50);
        let mut last = None;
        for _ in 0..200 {
            last = snr.update(1.0, 0.01).or(last);
        }
        assert!(last.unwrap() > 0.0);
    }

    #[test]
    fn equal_power_yields_roughly_zero_db() {
        let mut snr = SnrEstimator::new(100, 1.0, 50);
        let mut last = None;
        for _ in 0..200 {
            last = snr.update(1.0, 1.0).or(last);
        }
        assert!(last.unwrap().abs() < 0.5);
    }
}
