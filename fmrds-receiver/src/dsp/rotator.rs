//! Complex local oscillator / frequency translator.
//!
//! Ported from `hvylya::filters::Rotator`: multiplies each input sample by
//! `exp(-j*2*pi*f*n)`, advancing the phasor incrementally rather than
//! calling `sin`/`cos` per sample, and periodically renormalizing its
//! magnitude back to unity so rounding error doesn't let the rotation
//! phasor drift off the unit circle over millions of samples.

use num_complex::Complex32;

/// Renormalize every this-many samples (reference: enough vector lanes
/// worth of rotations that the magnitude drift stays negligible between
/// renormalizations; we use a plain scalar cadence here).
const RENORMALIZE_EVERY: usize = 4096;

pub struct Rotator {
    center_frequency: f32,
    decimation_rate: usize,
    step: Complex32,
    phasor: Complex32,
    count: usize,
}

impl Rotator {
    pub fn new(center_frequency: f32, decimation_rate: usize) -> Self {
        let mut r = Rotator {
            center_frequency,
            decimation_rate: decimation_rate.max(1),
            step: Complex32::new(1.0, 0.0),
            phasor: Complex32::new(1.0, 0.0),
            count: 0,
        };
        r.reset();
        r
    }

    pub fn set_frequency(&mut self, center_frequency: f32, decimation_rate: usize) {
        self.center_frequency = center_frequency;
        self.decimation_rate = decimation_rate.max(1);
        self.reset();
    }

    pub fn reset(&mut self) {
        let freq_shift = 2.0 * std::f32::consts::PI * self.center_frequency * self.decimation_rate as f32;
        // exp(-j*freq_shift)
        self.step = Complex32::new(freq_shift.cos(), -freq_shift.sin());
        self.phasor = Complex32::new(1.0, 0.0);
        self.count = 0;
    }

    /// Translates a real lowpass tap set up to `center_frequency` (cycles
    /// per sample) by multiplying each tap by the oscillator it would take
    /// to mix that tap's delay position up to the target band -- turning a
    /// real baseband-prototype filter into the complex bandpass-to-analytic
    /// tap set [`crate::dsp::fir::HilbertFir`] and [`super::fft::FftTranslatingFilter`]
    /// expect. Matches the reference's `Rotator::createTaps`.
    pub fn create_taps(center_frequency: f32, taps: &[f32]) -> Vec<Complex32> {
        taps.iter()
            .enumerate()
            .map(|(n, &tap)| {
                let phase = 2.0 * std::f32::consts::PI * center_frequency * n as f32;
                Complex32::new(tap * phase.cos(), tap * phase.sin())
            })
            .collect()
    }

    pub fn rotate(&mut self, data: &mut [Complex32]) {
        for sample in data.iter_mut() {
            *sample *= self.phasor;
            self.phasor *= self.step;
            self.count += 1;
            if self.count >= RENORMALIZE_EVERY {
                self.phasor /= self.phasor.norm();
                self.count = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_signal_traces_unit_circle() {
        let mut rot = Rotator::new(0.01, 1);
        let mut data = vec![Complex32::new(1.0, 0.0); 100];
        rot.rotate(&mut data);
        for s in data {
            assert!((s.norm() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn create_taps_preserves_magnitude() {
        let taps = vec![0.1, 0.2, 0.3, 0.2, 0.1];
        let complex_taps = Rotator::create_taps(0.076, &taps);
        for (real, complex) in taps.iter().zip(complex_taps.iter()) {
            assert!((complex.norm() - real.abs()).abs() < 1e-6);
        }
    }

    #[test]
    fn zero_frequency_is_identity() {
        let mut rot = Rotator::new(0.0, 1);
        let mut data = vec![Complex32::new(3.0, -2.0), Complex32::new(1.0, 1.0)];
        let original = data.clone();
        rot.rotate(&mut data);
        for (a, b) in data.iter().zip(original.iter()) {
            assert!((a - b).norm() < 1e-5);
        }
    }
}
