//! Stereo subcarrier extraction and L/R demultiplexing.
//!
//! Ported from `hvylya::filters::fm::FmStereoExtractor` and
//! `FmStereoDemultiplexer`: the 38 kHz stereo subcarrier is recovered by
//! squaring the locked 19 kHz pilot phasor (`pll^2`), and the L-R
//! difference signal is demodulated by multiplying the bandpass-filtered
//! stereo band by that subcarrier's real part. The demultiplexer then
//! recombines `L+R` (mono) and `w*(L-R)` into discrete left/right
//! channels.

use num_complex::Complex32;

/// Recovers the 38 kHz stereo subcarrier and demodulates the L-R band
/// down to baseband.
pub struct StereoExtractor {
    gain: f32,
}

impl StereoExtractor {
    pub fn new(gain: f32) -> Self {
        StereoExtractor { gain }
    }

    /// `pilot` is the locked 19 kHz carrier from [`super::pll::PllGenerator`];
    /// `stereo_band` is the bandpass-filtered L-R signal around 38 kHz.
    /// Returns the demodulated (but not yet de-emphasized) L-R baseband.
    pub fn process(&self, pilot: &[Complex32], stereo_band: &[f32]) -> Vec<f32> {
        let n = pilot.len().min(stereo_band.len());
        let mut output = Vec::with_capacity(n);
        for i in 0..n {
            let subcarrier = pilot[i] * pilot[i];
            output.push(self.gain * subcarrier.re * stereo_band[i]);
        }
        output
    }
}

/// Recombines the mono (L+R) and stereo-difference (L-R) signals into
/// discrete left/right channel samples.
pub struct StereoDemultiplexer;

impl StereoDemultiplexer {
    pub fn new() -> Self {
        StereoDemultiplexer
    }

    /// `mono` is `L+R` (the de-emphasized mono baseband); `stereo_diff` is
    /// the de-emphasized `L-R` signal from the extractor. Returns
    /// `(left, right)` sample vectors.
    pub fn process(&self, mono: &[f32], stereo_diff: &[f32]) -> (Vec<f32>, Vec<f32>) {
        let n = mono.len().min(stereo_diff.len());
        let mut left = Vec::with_capacity(n);
        let mut right = Vec::with_capacity(n);
        for i in 0..n {
            let sum = mono[i];
            let diff = stereo_diff[i];
            left.push(0.5 * (sum + diff));
            right.push(0.5 * (sum - diff));
        }
        (left, right)
    }
}

impl Default for StereoDemultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_only_signal_has_zero_stereo_difference() {
        let demux = StereoDemultiplexer::new();
        let mono = vec![1.0, 2.0, 3.0];
        let diff = vec![0.0, 0.0, 0.0];
        let (l, r) = demux.process(&mono, &diff);
        assert_eq!(l, r);
        assert_eq!(l, mono);
    }

    #[test]
    fn full_left_signal_separates_correctly() {
        // L = 1, R = 0 => sum = 1, diff = 1
        let demux = StereoDemultiplexer::new();
        let mono = vec![1.0];
        let diff = vec![1.0];
        let (l, r) = demux.process(&mono, &diff);
        assert!((l[0] - 1.0).abs() < 1e-6);
        assert!((r[0] - 0.0).abs() < 1e-6);
    }

    #[test]
    fn extractor_demodulates_to_dc_for_matched_subcarrier() {
        let extractor = StereoExtractor::new(2.0);
        let pilot = vec![Complex32::new(1.0, 0.0); 4];
        let stereo_band = vec![1.0, 1.0, 1.0, 1.0];
        let out = extractor.process(&pilot, &stereo_band);
        assert_eq!(out, vec![2.0, 2.0, 2.0, 2.0]);
    }
}
