//! Blind Constant Modulus Algorithm (CMA) equalizer.
//!
//! Ported from `hvylya::filters::fm::FmCmaEqualizer`: a decision-directed
//! recursive equalizer whose output is always unit modulus by construction
//! (appropriate for FM's constant-envelope IF signal), and whose tap
//! vector is estimated from a regularized least-squares fit of
//! decaying-accumulated input/output correlations rather than a
//! stochastic-gradient update. Tap 0 doubles as the overall AGC/phase
//! gain; the remaining taps are enabled or disabled one at a time as the
//! correlation accumulators gain confidence, with the enabled tap count
//! regularized to stay within `MIN_CHANNELS..=MAX_CHANNELS` and the
//! per-sample bookkeeping (taps/gain/accumulator update cadence) relaxing
//! automatically once the estimate stops moving.

use num_complex::{Complex32, Complex64};

const MIN_ABS_VALUE: f32 = 1e-20;

const MIN_NORM_WEIGHT: f32 = 1e-20;
const MAX_NORM_WEIGHT: f32 = 1e-2;
const NORM_WEIGHT_STEP: f32 = 1e-2;
const NORM_WEIGHTS: [f32; 3] = [1.0, 0.5, 0.25];

const MIN_TAP_REG: f32 = 1e-5;
const MAX_TAP_REG: f32 = 1e-2;
const TAP_REG_STEP: f32 = 1e-3;

const TAP_SUM_COEF: f32 = 1.0 / 250.0;

const GAIN_UPDATE_ACCURACY: f32 = 1e-10;
const TAPS_UPDATE_ACCURACY: f32 = 1e-10;

const GAIN_ROOT_ACCURACY: f32 = 1e-8;
const GAIN_MAX_ROOT_ITERATIONS: usize = 5;

const DECAY: f64 = 0.99999;
const MIN_WEIGHT: f64 = 9516.0;

const MIN_TAPS_UPDATE_INTERVAL: usize = 10;
const MAX_TAPS_UPDATE_INTERVAL: usize = 1000;

const MIN_GAIN_UPDATE_INTERVAL: usize = 10;
const MAX_GAIN_UPDATE_INTERVAL: usize = 100;

const DISABLED_TAPS_UPDATE_INTERVAL: usize = 100;

const TAPS_FREQ_DIVIDER: usize = 50;

const MIN_CHANNELS: usize = 2;
const MAX_CHANNELS: usize = 8;

/// Blind equalizer over a power-of-two number of taps.
pub struct CmaEqualizer {
    taps_count: usize,
    taps_count_mask: usize,

    /// Tap 0 is the AGC/phase gain tap; `taps[1..]` are multipath taps,
    /// indexed by physical delay, nonzero only while enabled.
    taps: Vec<Complex32>,
    /// Physical delay index of each enabled tap, `taps_indices[0] == 0`
    /// always; only the first `taps_enabled_count` entries are live.
    taps_indices: Vec<usize>,
    taps_enabled: Vec<bool>,
    /// Ring of past equalizer outputs (and, transiently, the raw input
    /// sample about to be equalized), mirrored at `+taps_count` so any
    /// window of `taps_count` consecutive samples is contiguous.
    outputs: Vec<Complex32>,
    /// `-taps[taps_indices[i]] * gain` for `i >= 1`, `gain` for `i == 0`;
    /// precomputed so `get_output` is a single dot product.
    adjusted_taps: Vec<Complex32>,

    decays: Vec<f64>,
    weight_updates: Vec<f64>,

    /// Decaying correlation accumulators, Hermitian-Toeplitz indexed by
    /// delay: `a[d]` correlates the output at lag 0 with the output at
    /// lag `d`, `b[d]` correlates the raw input with the output at lag
    /// `d`. Double precision: these decay over thousands of samples.
    a: Vec<Complex64>,
    b: Vec<Complex64>,
    a_interm: Vec<Complex32>,
    b_interm: Vec<Complex32>,

    taps_update_freq: usize,
    gain_update_freq: usize,
    accum_update_freq: usize,
    left_until_taps_updates: usize,
    left_until_gain_updates: usize,
    left_until_disabled_taps_updates: usize,
    left_until_accum_updates: usize,
    taps_enabled_count: usize,
    accumulated_samples: usize,
    cur_output_index: usize,

    gain: Complex32,
    cur_weight: f64,
    norm_weight: f32,
    tap0_mag2: f32,
    tap_reg: f32,
    last_taps_diff: f32,
    min_samples_accumulated: bool,
}

impl CmaEqualizer {
    /// `taps_count` must be a power of two (the output ring is addressed
    /// with a bitmask, not a modulo).
    pub fn new(taps_count: usize) -> Self {
        assert!(taps_count > 0);
        assert!(
            taps_count.is_power_of_two(),
            "CMA equalizer tap count must be a power of two"
        );

        let mut taps = vec![Complex32::new(0.0, 0.0); taps_count];
        taps[0] = Complex32::new(1.0, 0.0);
        let mut taps_enabled = vec![false; taps_count];
        taps_enabled[0] = true;
        let mut adjusted_taps = vec![Complex32::new(0.0, 0.0); taps_count];
        adjusted_taps[0] = Complex32::new(1.0, 0.0);
        let mut taps_indices = vec![0usize; taps_count];
        taps_indices[0] = 0;

        let mut decays = vec![0.0f64; MAX_TAPS_UPDATE_INTERVAL + 1];
        let mut weight_updates = vec![0.0f64; MAX_TAPS_UPDATE_INTERVAL + 1];
        decays[0] = 1.0;
        for i in 1..=MAX_TAPS_UPDATE_INTERVAL {
            decays[i] = decays[i - 1] * DECAY;
            weight_updates[i] = (1.0 - decays[i]) / (1.0 - DECAY);
        }

        CmaEqualizer {
            taps_count,
            taps_count_mask: taps_count - 1,
            taps,
            taps_indices,
            taps_enabled,
            outputs: vec![Complex32::new(0.0, 0.0); 2 * taps_count],
            adjusted_taps,
            decays,
            weight_updates,
            a: vec![Complex64::new(0.0, 0.0); taps_count],
            b: vec![Complex64::new(0.0, 0.0); taps_count],
            a_interm: vec![Complex32::new(0.0, 0.0); taps_count],
            b_interm: vec![Complex32::new(0.0, 0.0); taps_count],

            taps_update_freq: MIN_TAPS_UPDATE_INTERVAL,
            gain_update_freq: MIN_GAIN_UPDATE_INTERVAL,
            accum_update_freq: 1,
            left_until_taps_updates: MIN_TAPS_UPDATE_INTERVAL - 1,
            left_until_gain_updates: 0,
            left_until_disabled_taps_updates: 0,
            left_until_accum_updates: 0,
            taps_enabled_count: 1,
            accumulated_samples: 0,
            cur_output_index: 0,

            gain: Complex32::new(1.0, 0.0),
            cur_weight: 0.0,
            norm_weight: 1e-5,
            tap0_mag2: 1.0,
            tap_reg: 1e-3,
            last_taps_diff: 0.0,
            min_samples_accumulated: false,
        }
    }

    /// Re-initializes to the same state `new` would produce.
    pub fn reset(&mut self) {
        *self = Self::new(self.taps_count);
    }

    pub fn taps_enabled_count(&self) -> usize {
        self.taps_enabled_count
    }

    /// Tap 0 (the AGC/phase gain tap) followed by every other tap in
    /// physical-delay order (zero where disabled).
    pub fn taps(&self) -> &[Complex32] {
        &self.taps
    }

    pub fn process(&mut self, input: &[Complex32]) -> Vec<Complex32> {
        let mut output = Vec::with_capacity(input.len());
        for &sample in input {
            let new_output = self.get_output(sample);

            self.outputs[self.cur_output_index] = new_output;
            self.outputs[self.cur_output_index + self.taps_count] = new_output;
            output.push(new_output);

            self.update_interm_accumulators(sample, new_output);

            if self.left_until_taps_updates == 0 {
                self.update_accumulators();

                if self.min_samples_accumulated {
                    self.update_norm_weight();

                    if self.left_until_gain_updates == 0 {
                        let prev_gain = self.gain;
                        self.update_gain();
                        let gain_diff = prev_gain - self.gain;
                        if gain_diff.norm_sqr() < GAIN_UPDATE_ACCURACY {
                            self.gain_update_freq =
                                (self.gain_update_freq + 1).min(MAX_GAIN_UPDATE_INTERVAL);
                        } else {
                            self.gain_update_freq = self
                                .gain_update_freq
                                .saturating_sub(1)
                                .max(MIN_GAIN_UPDATE_INTERVAL);
                        }
                        self.left_until_gain_updates = self.gain_update_freq - 1;
                    } else {
                        self.left_until_gain_updates -= 1;
                    }

                    self.last_taps_diff = 0.0;
                    let calc_disabled_taps = self.left_until_disabled_taps_updates == 0;
                    let tap_mag_sum = self.update_taps(calc_disabled_taps);
                    self.update_tap_reg(tap_mag_sum);

                    if self.last_taps_diff < TAPS_UPDATE_ACCURACY {
                        self.taps_update_freq =
                            (self.taps_update_freq + 1).min(MAX_TAPS_UPDATE_INTERVAL);
                    } else {
                        self.taps_update_freq = self
                            .taps_update_freq
                            .saturating_sub(1)
                            .max(MIN_TAPS_UPDATE_INTERVAL);
                    }
                    self.accum_update_freq = (self.taps_update_freq / TAPS_FREQ_DIVIDER).max(1);
                    self.left_until_accum_updates = self.accum_update_freq - 1;

                    if self.left_until_disabled_taps_updates != 0 {
                        self.left_until_disabled_taps_updates -= 1;
                    } else {
                        self.left_until_disabled_taps_updates = DISABLED_TAPS_UPDATE_INTERVAL - 1;
                    }
                } else if self.cur_weight > MIN_WEIGHT {
                    self.norm_weight *= (self.b[0] / self.cur_weight).norm() as f32;
                    self.min_samples_accumulated = true;
                }

                self.left_until_taps_updates = self.taps_update_freq - 1;
            } else {
                self.left_until_taps_updates -= 1;
            }

            self.cur_output_index =
                (self.cur_output_index + self.taps_count - 1) & self.taps_count_mask;
        }
        output
    }

    fn get_output(&mut self, sample: Complex32) -> Complex32 {
        self.outputs[self.cur_output_index] = sample;
        let mut corrected = Complex32::new(0.0, 0.0);
        for i in 0..self.taps_enabled_count {
            corrected +=
                self.outputs[self.cur_output_index + self.taps_indices[i]] * self.adjusted_taps[i];
        }
        let mag = corrected.norm();
        if mag > 0.0 {
            corrected / mag
        } else {
            corrected
        }
    }

    fn update_interm_accumulators(&mut self, sample: Complex32, new_output: Complex32) {
        if self.left_until_accum_updates == 0 {
            let coef = new_output.conj();
            let decay = DECAY as f32;
            for i in 0..self.taps_count {
                let out = self.outputs[i + self.cur_output_index];
                let coef_out = coef * out;
                let out_sample = sample * out.conj();
                self.a_interm[i] = self.a_interm[i] * decay + coef_out;
                self.b_interm[i] = self.b_interm[i] * decay + out_sample;
            }
            self.accumulated_samples += 1;
            self.left_until_accum_updates = self.accum_update_freq - 1;
        } else {
            self.left_until_accum_updates -= 1;
        }
    }

    fn update_accumulators(&mut self) {
        let acc_decay = self.decays[self.accumulated_samples];
        for i in 0..self.taps_count {
            let a_interm = Complex64::new(self.a_interm[i].re as f64, self.a_interm[i].im as f64);
            let b_interm = Complex64::new(self.b_interm[i].re as f64, self.b_interm[i].im as f64);
            self.a[i] = self.a[i] * acc_decay + a_interm;
            self.b[i] = self.b[i] * acc_decay + b_interm;
        }
        for v in self.a_interm.iter_mut() {
            *v = Complex32::new(0.0, 0.0);
        }
        for v in self.b_interm.iter_mut() {
            *v = Complex32::new(0.0, 0.0);
        }

        self.cur_weight = acc_decay * self.cur_weight + self.weight_updates[self.accumulated_samples];
        self.accumulated_samples = 0;
    }

    fn update_norm_weight(&mut self) {
        let mut taps_dir = 0.0f32;
        for (k, &w) in NORM_WEIGHTS.iter().enumerate() {
            taps_dir += w * self.taps[k + 1].re;
        }
        let clamped_dir = taps_dir.clamp(-1.0, 1.0);
        self.norm_weight = (self.norm_weight * (1.0 + NORM_WEIGHT_STEP * clamped_dir))
            .clamp(MIN_NORM_WEIGHT, MAX_NORM_WEIGHT);
    }

    /// `col < row` reads the Hermitian mirror; the accumulator only ever
    /// stores non-negative lags.
    fn get_correlation(&self, row: usize, col: usize) -> Complex32 {
        let c = if col < row {
            self.a[row - col].conj()
        } else {
            self.a[col - row]
        };
        Complex32::new(c.re as f32, c.im as f32)
    }

    /// Newton-solves the cubic `r^3 - |sum|*r^2 - norm_weight*r -
    /// norm_weight*|sum| = 0` for the gain tap's magnitude correction.
    fn update_gain(&mut self) {
        let mut sum = Complex32::new(self.b[0].re as f32, self.b[0].im as f32);
        for j in 1..self.taps_enabled_count {
            let tap_index = self.taps_indices[j];
            sum -= self.taps[tap_index] * self.get_correlation(0, tap_index);
        }
        sum /= self.cur_weight as f32;
        let sum_mag = sum.norm();

        let coef_b = -sum_mag;
        let coef_c = -self.norm_weight;
        let coef_d = -self.norm_weight * sum_mag;

        let mut r = sum_mag;
        let mut iterations = 0;
        loop {
            let rr = r * r;
            let br = coef_b * r;
            let root_error = (rr + br + coef_c) * r + coef_d;
            let derivative = (3.0 * rr + 2.0 * br + coef_c).max(MIN_ABS_VALUE);
            r -= root_error / derivative;
            iterations += 1;
            if root_error.abs() <= GAIN_ROOT_ACCURACY || iterations >= GAIN_MAX_ROOT_ITERATIONS {
                break;
            }
        }

        let new_tap0 = if sum_mag > 0.0 {
            sum * (r / sum_mag)
        } else {
            sum
        };
        self.taps[0] = new_tap0;
        self.tap0_mag2 = new_tap0.norm_sqr();
        self.gain = Complex32::new(1.0, 0.0) / new_tap0;
        self.adjusted_taps[0] = self.gain;
    }

    /// Regularized least-squares re-estimate of every candidate tap,
    /// enabling/disabling taps whose magnitude crosses the soft
    /// threshold `tap_reg_ / tap_left_inv`. Returns the sum of surviving
    /// tap magnitudes, used by `update_tap_reg`.
    fn update_taps(&mut self, calc_disabled_taps: bool) -> f32 {
        let mut tap_mag_sum = 0.0f32;
        let cur_weight_f32 = self.cur_weight as f32;
        let tap_norm_inv = self.norm_weight / (self.tap0_mag2 * cur_weight_f32 * cur_weight_f32);
        let tap_norm_inv2 =
            Complex32::new(self.norm_weight, 0.0) / (self.taps[0].conj() * cur_weight_f32);
        let cur_weight_inv = 1.0 / cur_weight_f32;

        let mut new_indices = Vec::with_capacity(self.taps_enabled_count + 1);
        new_indices.push(0usize);
        let mut new_adjusted = Vec::with_capacity(self.taps_enabled_count + 1);
        new_adjusted.push(self.adjusted_taps[0]);

        for i in 1..self.taps_count {
            if !self.taps_enabled[i] && !calc_disabled_taps {
                continue;
            }

            let b0 = Complex32::new(self.b[0].re as f32, self.b[0].im as f32);
            let bi = Complex32::new(self.b[i].re as f32, self.b[i].im as f32);
            let corr_i0 = self.get_correlation(i, 0);

            let mut tap_norm_right = b0;
            let mut tap_fit_right = bi - self.taps[0] * corr_i0;

            for j in 1..self.taps_enabled_count {
                let tap_index = self.taps_indices[j];
                if tap_index != i {
                    let tap = self.taps[tap_index];
                    tap_fit_right -= tap * self.get_correlation(i, tap_index);
                    tap_norm_right -= tap * self.get_correlation(0, tap_index);
                }
            }

            let tap_norm_left = corr_i0.norm_sqr() * tap_norm_inv;
            tap_norm_right *= tap_norm_inv;
            tap_norm_right -= tap_norm_inv2;
            tap_norm_right *= corr_i0;

            let tap_fit_left = 1.0f32;
            tap_fit_right *= cur_weight_inv;

            let tap_left = tap_norm_left + tap_fit_left;
            let tap_left_inv = 1.0 / tap_left;
            let tap_right = tap_norm_right + tap_fit_right;

            let new_tap = tap_right * tap_left_inv;
            let new_tap_mag2 = new_tap.norm_sqr();
            let new_tap_mag = new_tap_mag2.sqrt();
            let reg = self.tap_reg * tap_left_inv;

            tap_mag_sum += new_tap_mag;

            if new_tap_mag > reg {
                let new_tap_corrected = new_tap * (1.0 - reg / new_tap_mag);
                let tap_diff = new_tap_corrected - self.taps[i];
                self.last_taps_diff += tap_diff.norm_sqr();
                self.taps[i] = new_tap_corrected;
                self.taps_enabled[i] = true;
                new_indices.push(i);
                new_adjusted.push(-new_tap_corrected * self.gain);
            } else {
                self.last_taps_diff += self.taps[i].norm_sqr();
                self.taps[i] = Complex32::new(0.0, 0.0);
                self.taps_enabled[i] = false;
            }
        }

        self.taps_enabled_count = new_indices.len();
        self.taps_indices[..new_indices.len()].copy_from_slice(&new_indices);
        self.adjusted_taps[..new_adjusted.len()].copy_from_slice(&new_adjusted);

        tap_mag_sum
    }

    fn update_tap_reg(&mut self, tap_mag_sum: f32) {
        let step = if self.taps_enabled_count < MIN_CHANNELS {
            -TAP_REG_STEP
        } else if self.taps_enabled_count > MAX_CHANNELS || self.taps_enabled[1] {
            TAP_REG_STEP
        } else {
            (tap_mag_sum * TAP_SUM_COEF - self.tap_reg).clamp(-TAP_REG_STEP, TAP_REG_STEP)
        };
        self.tap_reg = (self.tap_reg * (1.0 + step)).clamp(MIN_TAP_REG, MAX_TAP_REG);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_always_unit_modulus() {
        let mut eq = CmaEqualizer::new(32);
        let input: Vec<Complex32> = (0..5_000)
            .map(|i| {
                let phase = i as f32 * 0.073;
                Complex32::new(phase.cos(), phase.sin())
            })
            .collect();
        let out = eq.process(&input);
        assert_eq!(out.len(), input.len());
        for (i, s) in out.iter().enumerate().skip(1) {
            assert!((s.norm() - 1.0).abs() < 1e-4, "sample {i} not unit modulus: {s:?}");
        }
    }

    #[test]
    fn reset_restores_initial_single_tap_state() {
        let mut eq = CmaEqualizer::new(32);
        let input: Vec<Complex32> = (0..2_000)
            .map(|i| {
                let phase = i as f32 * 0.021 + (i as f32 * 0.4).sin() * 0.3;
                Complex32::new(phase.cos(), phase.sin())
            })
            .collect();
        let _ = eq.process(&input);
        eq.reset();
        assert_eq!(eq.taps_enabled_count(), 1);
        assert_eq!(eq.taps()[0], Complex32::new(1.0, 0.0));
    }

    /// A clean, already constant-modulus single-tone input carries no
    /// multipath to correct; the equalizer should settle on (at most a
    /// small handful of) active taps and keep the gain tap near unit
    /// magnitude rather than drifting off.
    #[test]
    fn clean_tone_keeps_few_taps_enabled_and_gain_near_unity() {
        let mut eq = CmaEqualizer::new(32);
        let input: Vec<Complex32> = (0..60_000)
            .map(|i| {
                let phase = i as f32 * 0.0513;
                Complex32::new(phase.cos(), phase.sin())
            })
            .collect();
        let _ = eq.process(&input);

        assert!(
            eq.taps_enabled_count() <= MAX_CHANNELS,
            "got {} enabled taps",
            eq.taps_enabled_count()
        );
        let tap0_mag = eq.taps()[0].norm();
        assert!(tap0_mag > 0.2 && tap0_mag.is_finite(), "tap0 magnitude {tap0_mag}");
    }

    #[test]
    fn new_requires_power_of_two_taps_count() {
        let result = std::panic::catch_unwind(|| CmaEqualizer::new(5));
        assert!(result.is_err());
    }
}
