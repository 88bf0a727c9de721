//! RDS 57 kHz subcarrier demodulation.
//!
//! Ported from `hvylya::filters::fm::RdsDemodulator`: the bandpass
//! output around 57 kHz is multiplied by either the real or imaginary
//! part of the tripled pilot carrier (three times 19 kHz = 57 kHz),
//! whichever phase carries more energy. Which phase that is gets
//! re-evaluated periodically by comparing two running sums of
//! demodulated amplitude, then reused for the next `SKIP_RATE` samples
//! so the phase decision doesn't itself need to run every sample.

use num_complex::Complex32;

use crate::simd::running_sum::RunningSum;

/// ~32K samples was found sufficient by the reference; kept generous.
const AVERAGING_WINDOW_SIZE: usize = 50_000;
/// At a 250 kHz intermediate rate this re-evaluates the phase roughly
/// once every 40 us; skipping `SKIP_RATE` samples between re-evaluations
/// amortizes that cost to about once every 2 seconds of full-window fill.
const SKIP_RATE: usize = 10;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Real,
    Imag,
}

pub struct RdsDemodulator {
    amplitude_real: RunningSum<f32>,
    amplitude_imag: RunningSum<f32>,
    best_phase: Phase,
    best_phase_found: bool,
    skipped_samples: usize,
}

impl RdsDemodulator {
    pub fn new() -> Self {
        RdsDemodulator {
            amplitude_real: RunningSum::new(AVERAGING_WINDOW_SIZE),
            amplitude_imag: RunningSum::new(AVERAGING_WINDOW_SIZE),
            best_phase: Phase::Real,
            best_phase_found: false,
            skipped_samples: 0,
        }
    }

    pub fn reset(&mut self) {
        self.amplitude_real.clear();
        self.amplitude_imag.clear();
        self.best_phase_found = false;
        self.skipped_samples = 0;
    }

    /// `rds_band` is the bandpass-filtered real signal around 57 kHz;
    /// `carrier` is the tripled pilot phasor (`pll^3`). Returns the
    /// demodulated baseband, one sample per input pair.
    pub fn process(&mut self, rds_band: &[f32], carrier: &[Complex32]) -> Vec<f32> {
        let n = rds_band.len().min(carrier.len());
        let mut output = Vec::with_capacity(n);

        for i in 0..n {
            let rds_value = rds_band[i];
            let demod = carrier[i];

            if self.best_phase_found && self.skipped_samples < SKIP_RATE {
                output.push(match self.best_phase {
                    Phase::Real => demod.re * rds_value,
                    Phase::Imag => demod.im * rds_value,
                });
                self.skipped_samples += 1;
                continue;
            }

            let demod_real = demod.re * rds_value;
            let demod_imag = demod.im * rds_value;

            self.amplitude_real.add(demod_real.abs());
            self.amplitude_imag.add(demod_imag.abs());

            self.best_phase = if self.amplitude_real.sum() > self.amplitude_imag.sum() {
                Phase::Real
            } else {
                Phase::Imag
            };

            if self.amplitude_real.full() {
                self.best_phase_found = true;
            }

            output.push(match self.best_phase {
                Phase::Real => demod_real,
                Phase::Imag => demod_imag,
            });
            self.skipped_samples = 0;
        }

        output
    }
}

impl Default for RdsDemodulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locks_onto_the_stronger_phase() {
        let mut demod = RdsDemodulator::new();
        let n = 200;
        let rds_band = vec![1.0; n];
        // Real part dominant.
        let carrier = vec![Complex32::new(1.0, 0.1); n];
        let out = demod.process(&rds_band, &carrier);
        assert_eq!(out.len(), n);
        assert!(out.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }
}
