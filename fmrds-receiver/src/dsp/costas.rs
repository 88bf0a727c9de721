//! Optional RDS subcarrier phase-correction loop.
//!
//! Ported from `hvylya::filters::CostasLoop`: rotates the tripled pilot
//! phasor by an adaptively estimated phase offset, driven by a
//! decision-directed error (`Re(lowpass(rotated*signal)) *
//! Im(lowpass(-rotated*signal))`) fed through a pair of first-order
//! lowpass branches. Disabled by default in `receiver::FmReceiver` (the
//! reference gates it behind `ADJUST_RDS_CARRIER_PHASE`); kept here as a
//! selectable correction stage for tuners whose RDS carrier phase drifts.

use num_complex::Complex32;

struct FirstOrderLowpass {
    feedback: f32,
    feedforward: f32,
    last_in: f32,
    last_out: f32,
}

impl FirstOrderLowpass {
    fn new(corner_freq: f32) -> Self {
        // Bilinear-transformed first-order lowpass, matching the
        // reference's `IirFiltersDesigner::createLowpassFirstOrderFilter`.
        let w = (corner_freq / 2.0).tan();
        let fb = (w - 1.0) / (w + 1.0);
        let ff = w / (1.0 + w);
        FirstOrderLowpass {
            feedback: fb,
            feedforward: ff,
            last_in: 0.0,
            last_out: 0.0,
        }
    }

    fn filter(&mut self, input: f32) -> f32 {
        let output = self.feedforward * (self.last_in + input) - self.feedback * self.last_out;
        self.last_in = input;
        self.last_out = output;
        output
    }

    fn reset(&mut self) {
        self.last_in = 0.0;
        self.last_out = 0.0;
    }
}

pub struct CostasLoop {
    phase_error_gain: f32,
    rotation: Complex32,
    branch_real: FirstOrderLowpass,
    branch_imag: FirstOrderLowpass,
}

impl CostasLoop {
    pub fn new(lowpass_freq: f32, phase_error_gain: f32) -> Self {
        CostasLoop {
            phase_error_gain,
            rotation: Complex32::new(1.0, 0.0),
            branch_real: FirstOrderLowpass::new(lowpass_freq),
            branch_imag: FirstOrderLowpass::new(lowpass_freq),
        }
    }

    pub fn reset(&mut self) {
        self.rotation = Complex32::new(1.0, 0.0);
        self.branch_real.reset();
        self.branch_imag.reset();
    }

    /// `signal` is the real-valued reference to phase-lock against (e.g.
    /// the RDS bandpass output); `pilot` is the phasor to correct (the
    /// tripled 19 kHz pilot). Returns the corrected phasor.
    pub fn process(&mut self, signal: &[f32], pilot: &[Complex32]) -> Vec<Complex32> {
        let n = signal.len().min(pilot.len());
        let mut output = Vec::with_capacity(n);

        for i in 0..n {
            let rotated = pilot[i] * self.rotation;
            output.push(rotated);

            let phase_error = self.branch_real.filter(rotated.re * signal[i])
                * self.branch_imag.filter(-rotated.im * signal[i]);

            let correction = Complex32::new(0.0, -phase_error * self.phase_error_gain).exp();
            self.rotation *= correction;
            self.rotation /= self.rotation.norm();
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_phase_error_keeps_rotation_fixed() {
        let mut costas = CostasLoop::new(0.01, 0.5);
        let signal = vec![0.0; 50];
        let pilot = vec![Complex32::new(1.0, 0.0); 50];
        let out = costas.process(&signal, &pilot);
        for s in out {
            assert!((s.norm() - 1.0).abs() < 1e-4);
        }
    }
}
