//! Rational-ratio resampler: interpolate by `L`, lowpass, then decimate
//! by `M`, realized with a single polyphase filter bank so the
//! intermediate upsampled stream is never actually materialized.
//!
//! Ported from `hvylya::filters::ResamplerFilter`: for an `L/M`
//! conversion, a prototype lowpass with cutoff `min(1/L, 1/M)` (in the
//! upsampled-by-`L` rate) is split into `L` polyphase sub-filters, one
//! per output phase; the output index picks which sub-filter and which
//! input-history offset to use, stepping the input pointer by `M/L`
//! fractional positions per output sample.

pub struct RationalResampler {
    interpolation: usize,
    decimation: usize,
    /// `phases[p]` holds the sub-filter taps for polyphase branch `p`.
    phases: Vec<Vec<f32>>,
    taps_per_phase: usize,
    history: Vec<f32>,
    /// Position within the upsampled timeline, modulo `interpolation`.
    phase_index: usize,
    /// How many upsampled-by-`interpolation` steps to advance once a
    /// phase's output has been produced, before wrapping.
    input_advance: usize,
}

impl RationalResampler {
    /// `prototype_taps` is a lowpass FIR (already designed for cutoff
    /// `min(1/interpolation, 1/decimation)` of the upsampled rate) whose
    /// length must be a multiple of `interpolation` for clean polyphase
    /// decomposition.
    pub fn new(interpolation: usize, decimation: usize, prototype_taps: Vec<f32>) -> Self {
        assert!(interpolation > 0 && decimation > 0);
        assert!(
            prototype_taps.len() % interpolation == 0,
            "prototype tap count must be a multiple of the interpolation factor"
        );

        let taps_per_phase = prototype_taps.len() / interpolation;
        let mut phases = vec![Vec::with_capacity(taps_per_phase); interpolation];
        for (i, &tap) in prototype_taps.iter().enumerate() {
            phases[i % interpolation].push(tap * interpolation as f32);
        }

        let history = vec![0.0; taps_per_phase.saturating_sub(1).max(1)];

        RationalResampler {
            interpolation,
            decimation,
            phases,
            taps_per_phase,
            history,
            phase_index: 0,
            input_advance: 0,
        }
    }

    pub fn reset(&mut self) {
        for h in self.history.iter_mut() {
            *h = 0.0;
        }
        self.phase_index = 0;
        self.input_advance = 0;
    }

    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        let mut window = Vec::with_capacity(self.history.len() + input.len());
        window.extend_from_slice(&self.history);
        window.extend_from_slice(input);

        let taps_per_phase = self.taps_per_phase;
        if window.len() < taps_per_phase {
            self.history = window;
            return Vec::new();
        }

        let mut output = Vec::new();
        // `base` indexes the oldest sample of the current convolution
        // window within `window`.
        let mut base = 0usize;

        loop {
            if base + taps_per_phase > window.len() {
                break;
            }

            let phase_taps = &self.phases[self.phase_index];
            let mut acc = 0.0f32;
            for (k, &tap) in phase_taps.iter().enumerate() {
                acc += tap * window[base + taps_per_phase - 1 - k];
            }
            output.push(acc);

            // Advance the virtual upsampled-by-`interpolation` index by
            // `decimation` steps; each full `interpolation`-step lap
            // consumes one more raw input sample.
            self.input_advance += self.decimation;
            self.phase_index = self.input_advance % self.interpolation;
            let steps = self.input_advance / self.interpolation;
            self.input_advance %= self.interpolation;
            base += steps;
        }

        let keep_from = base.min(window.len());
        self.history = window[keep_from..].to_vec();
        if self.history.len() > taps_per_phase.saturating_sub(1) {
            let drop = self.history.len() - taps_per_phase.saturating_sub(1);
            self.history.drain(0..drop);
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_prototype(interpolation: usize) -> Vec<f32> {
        // A trivial "prototype" that just picks out one sample per
        // phase (delta-like), enough to exercise the bookkeeping without
        // needing a real lowpass design.
        let mut taps = vec![0.0; interpolation];
        taps[0] = 1.0;
        taps
    }

    #[test]
    fn unity_ratio_passes_through_length() {
        let mut resampler = RationalResampler::new(1, 1, vec![1.0]);
        let out = resampler.process(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn downsample_by_two_halves_rate() {
        let taps = identity_prototype(1);
        let mut resampler = RationalResampler::new(1, 2, taps);
        let input: Vec<f32> = (0..20).map(|i| i as f32).collect();
        let out = resampler.process(&input);
        assert!(out.len() >= 9 && out.len() <= 10);
    }
}
