//! The fixed ~20-filter FM receiver graph: baseband channel selection, blind
//! equalization, FM demodulation, then a fan-out into mono audio, stereo
//! audio, RDS, and a shared noise reference feeding per-branch SNR
//! estimates.
//!
//! Unlike the generic `pipeline` module, this graph's wiring never changes
//! at runtime, so it is wired directly as a sequence of method calls rather
//! than through the scheduler's dynamic block/edge machinery (see
//! `dsp::mod` for why). Each stage still owns exactly the history/delay
//! state a `pipeline::Block` would carry for it; `FmReceiver::process` is
//! simply the batch-synchronous equivalent of one scheduler sweep through
//! the whole graph.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::collections::VecDeque;

use num_complex::Complex32;

use crate::constants::*;
use crate::dsp::{
    design_bandpass, design_lowpass, CmaEqualizer, Deemphasizer, Fir, FmDiscriminator, HilbertFir,
    PllGenerator, RationalResampler, Rotator, SnrEstimator, StereoDemultiplexer, StereoExtractor,
};
use crate::rds::{decode_group, RdsBitsDecoder, RdsDecodingStats, RdsDemodulator, RdsGroupsDecoder, RdsState};

/// Half-width, in Hz, of the tolerance band the pilot PLL is allowed to
/// search within around the nominal 19 kHz center.
const PILOT_PLL_CAPTURE_RANGE_HZ: f32 = 50.0;

/// SNR estimator running-window length and report cadence, shared by all
/// four branches (pilot/mono/stereo/rds only differ in the signal and
/// noise-multiplier inputs they're fed).
const SNR_WINDOW_SIZE: usize = 4096;
const SNR_EMIT_EVERY: usize = SNR_RATE;

fn next_odd(n: usize) -> usize {
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

/// Windowed-sinc lowpass design without the odd-tap-count restriction of
/// `dsp::fir::design_lowpass`: the polyphase resampler needs a tap count
/// divisible by its interpolation factor, which for an even factor (24)
/// can never also be odd. Same Hamming-windowed-sinc algorithm, just
/// without that constraint.
fn design_polyphase_prototype(sample_rate: u32, cutoff_hz: f32, taps_count: usize) -> Vec<f32> {
    let fc = cutoff_hz / sample_rate as f32;
    let m = (taps_count - 1) as f32;
    let mut taps = vec![0.0f32; taps_count];
    let mut sum = 0.0f32;
    for (n, tap) in taps.iter_mut().enumerate() {
        let k = n as f32 - m / 2.0;
        let sinc = if k == 0.0 {
            2.0 * fc
        } else {
            (2.0 * std::f32::consts::PI * fc * k).sin() / (std::f32::consts::PI * k)
        };
        let window = 0.54 - 0.46 * (2.0 * std::f32::consts::PI * n as f32 / m).cos();
        *tap = sinc * window;
        sum += *tap;
    }
    for tap in taps.iter_mut() {
        *tap /= sum;
    }
    taps
}

/// Rounds `taps_count` up to the next multiple of `interpolation`.
fn round_up_to_multiple(taps_count: usize, interpolation: usize) -> usize {
    let rem = taps_count % interpolation;
    if rem == 0 {
        taps_count
    } else {
        taps_count + (interpolation - rem)
    }
}

/// Fixed per-sample delay line used to time-align two branches derived
/// from the same upstream signal but filtered through stages of differing
/// group delay (e.g. the pilot carrier vs. the RDS bandpass output it's
/// multiplied against). Plain FIFO: `process` emits exactly as many
/// samples as it's fed, each delayed by `delay` relative to when it was
/// pushed in.
struct SampleDelay {
    buffer: VecDeque<Complex32>,
}

impl SampleDelay {
    fn new(delay: usize) -> Self {
        SampleDelay {
            buffer: VecDeque::from(vec![Complex32::new(0.0, 0.0); delay]),
        }
    }

    fn process(&mut self, input: &[Complex32]) -> Vec<Complex32> {
        self.buffer.extend(input.iter().copied());
        let mut output = Vec::with_capacity(input.len());
        for _ in 0..input.len() {
            output.push(self.buffer.pop_front().unwrap_or_default());
        }
        output
    }
}

/// Last-writer-wins SNR readout for the four sub-bands this receiver
/// tracks, matching the reference's one-atomic-per-type scheme.
#[derive(Clone, Copy, Debug, Default)]
pub struct SnrSnapshot {
    pub pilot_db: f32,
    pub mono_db: f32,
    pub stereo_db: f32,
    pub rds_db: f32,
}

struct AtomicSnr(AtomicU32);

impl AtomicSnr {
    fn new(value: f32) -> Self {
        AtomicSnr(AtomicU32::new(value.to_bits()))
    }
    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Demodulated audio for one processed chunk, at the 48 kHz output rate.
pub struct ReceiverOutput {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

/// The fixed FM + RDS receiver graph. Construct once per tuned frequency;
/// feed it successive chunks of 1 MS/s complex baseband via [`Self::process`].
pub struct FmReceiver {
    baseband_select: Fir<Complex32>,
    equalizer: CmaEqualizer,
    demod_prefilter: Fir<Complex32>,
    discriminator: FmDiscriminator,

    pilot_bandpass: HilbertFir,
    pilot_pll: PllGenerator,

    stereo_bandpass: Fir<f32>,
    stereo_pilot_delay: SampleDelay,
    stereo_extractor: StereoExtractor,
    stereo_decimator: Fir<f32>,
    stereo_deemph: Deemphasizer,
    stereo_resampler: RationalResampler,

    mono_lowpass: Fir<f32>,
    mono_deemph: Deemphasizer,
    mono_resampler: RationalResampler,

    stereo_demux: StereoDemultiplexer,

    rds_bandpass: Fir<f32>,
    rds_carrier_delay: SampleDelay,
    rds_demod: RdsDemodulator,
    rds_shape1: Fir<f32>,
    rds_shape2: Fir<f32>,
    rds_bits_carrier_delay: SampleDelay,
    rds_bits: RdsBitsDecoder,
    rds_groups: RdsGroupsDecoder,

    noise_bandpass: HilbertFir,

    pilot_snr: SnrEstimator,
    mono_snr: SnrEstimator,
    stereo_snr: SnrEstimator,
    rds_snr: SnrEstimator,

    rds_state: Arc<Mutex<RdsState>>,
    snr_pilot: AtomicSnr,
    snr_mono: AtomicSnr,
    snr_stereo: AtomicSnr,
    snr_rds: AtomicSnr,
}

impl FmReceiver {
    pub fn new() -> Self {
        let baseband_taps = design_lowpass(INPUT_SAMPLING_RATE, FM_CHANNEL_BANDWIDTH / 2.0, FM_BASEBAND_TAPS_COUNT);
        let demod_prefilter_taps =
            design_lowpass(INTERMEDIATE_SAMPLING_RATE, FM_CHANNEL_BANDWIDTH / 2.0, FM_DEMOD_DECIMATOR_TAPS_COUNT);

        let pilot_prototype =
            design_lowpass(INTERMEDIATE_SAMPLING_RATE, STEREO_PILOT_BANDWIDTH / 2.0, STEREO_PILOT_BANDPASS_TAPS_COUNT);
        let pilot_center = STEREO_PILOT_FREQUENCY / INTERMEDIATE_SAMPLING_RATE as f32;
        let pilot_taps = Rotator::create_taps(pilot_center, &pilot_prototype);

        let pilot_center_rad = 2.0 * std::f32::consts::PI * pilot_center;
        let pilot_tol_rad = 2.0 * std::f32::consts::PI * PILOT_PLL_CAPTURE_RANGE_HZ / INTERMEDIATE_SAMPLING_RATE as f32;

        let stereo_audio_half = AUDIO_BANDWIDTH;
        let stereo_band_low = STEREO_PILOT_FREQUENCY * 2.0 - stereo_audio_half;
        let stereo_band_high = STEREO_PILOT_FREQUENCY * 2.0 + stereo_audio_half;
        let stereo_bandpass_taps =
            design_bandpass(INTERMEDIATE_SAMPLING_RATE, stereo_band_low, stereo_band_high, STEREO_BANDPASS_TAPS_COUNT);

        let mono_lowpass_taps = design_lowpass(INTERMEDIATE_SAMPLING_RATE, AUDIO_BANDWIDTH, MONO_DECIMATOR_TAPS_COUNT);
        let stereo_decimator_taps =
            design_lowpass(INTERMEDIATE_SAMPLING_RATE, AUDIO_BANDWIDTH, STEREO_DECIMATOR_TAPS_COUNT);

        let rds_low = 57_000.0 - RDS_BANDWIDTH / 2.0;
        let rds_high = 57_000.0 + RDS_BANDWIDTH / 2.0;
        let rds_bandpass_taps = design_bandpass(INTERMEDIATE_SAMPLING_RATE, rds_low, rds_high, RDS_BANDPASS_TAPS_COUNT);
        let rds_shape1_taps =
            design_lowpass(INTERMEDIATE_SAMPLING_RATE, RDS_BANDWIDTH / 2.0, RDS_DEMODULATED_TAPS_COUNT);
        let rds_shape2_taps = design_lowpass(
            INTERMEDIATE_SAMPLING_RATE,
            RDS_SYMBOL_RATE,
            next_odd(RDS_SYMBOL_SHAPE_TAPS_COUNT),
        );

        let noise_prototype =
            design_lowpass(INTERMEDIATE_SAMPLING_RATE, NOISE_EXTRACTOR_BANDWIDTH / 2.0, NOISE_EXTRACTOR_TAPS_COUNT);
        let noise_center = NOISE_EXTRACTOR_FREQUENCY / INTERMEDIATE_SAMPLING_RATE as f32;
        let noise_taps = Rotator::create_taps(noise_center, &noise_prototype);

        let resampler_taps_count = round_up_to_multiple(AUDIO_RESAMPLER_TAPS_COUNT, AUDIO_RESAMPLER_INTERPOLATION_RATIO);
        let upsampled_rate = INTERMEDIATE_AUDIO_SAMPLING_RATE * AUDIO_RESAMPLER_INTERPOLATION_RATIO as u32;
        let resampler_taps = design_polyphase_prototype(upsampled_rate, AUDIO_BANDWIDTH, resampler_taps_count);

        let rds_bandpass_delay = (RDS_BANDPASS_TAPS_COUNT - 1) / 2;
        let rds_shaping_delay = (RDS_DEMODULATED_TAPS_COUNT - 1) / 2 + (next_odd(RDS_SYMBOL_SHAPE_TAPS_COUNT) - 1) / 2;
        let pilot_bandpass_delay = (STEREO_PILOT_BANDPASS_TAPS_COUNT - 1) / 2;
        let stereo_bandpass_delay = (STEREO_BANDPASS_TAPS_COUNT - 1) / 2;

        FmReceiver {
            baseband_select: Fir::new(baseband_taps, INTERMEDIATE_DECIMATION_RATIO),
            equalizer: CmaEqualizer::new(FM_EQUALIZER_TAPS_COUNT),
            demod_prefilter: Fir::new(demod_prefilter_taps, 1),
            discriminator: FmDiscriminator::new(INTERMEDIATE_SAMPLING_RATE),

            pilot_bandpass: HilbertFir::new(pilot_taps),
            pilot_pll: PllGenerator::new(PLL_LOOP_BANDWIDTH, pilot_center_rad - pilot_tol_rad, pilot_center_rad + pilot_tol_rad),

            stereo_bandpass: Fir::new(stereo_bandpass_taps, 1),
            // Aligns the pilot-derived 38 kHz subcarrier with the stereo
            // bandpass output: the pilot chain (bandpass + PLL) and the
            // stereo chain have different group delay.
            stereo_pilot_delay: SampleDelay::new(stereo_bandpass_delay.saturating_sub(pilot_bandpass_delay)),
            stereo_extractor: StereoExtractor::new(2.0),
            stereo_decimator: Fir::new(stereo_decimator_taps, AUDIO_DECIMATION_RATIO),
            stereo_deemph: Deemphasizer::new(INTERMEDIATE_AUDIO_SAMPLING_RATE, 50e-6),
            stereo_resampler: RationalResampler::new(
                AUDIO_RESAMPLER_INTERPOLATION_RATIO,
                AUDIO_RESAMPLER_DECIMATION_RATIO,
                resampler_taps.clone(),
            ),

            mono_lowpass: Fir::new(mono_lowpass_taps, AUDIO_DECIMATION_RATIO),
            mono_deemph: Deemphasizer::new(INTERMEDIATE_AUDIO_SAMPLING_RATE, 50e-6),
            mono_resampler: RationalResampler::new(
                AUDIO_RESAMPLER_INTERPOLATION_RATIO,
                AUDIO_RESAMPLER_DECIMATION_RATIO,
                resampler_taps,
            ),

            stereo_demux: StereoDemultiplexer::new(),

            rds_bandpass: Fir::new(rds_bandpass_taps, 1),
            // Aligns the tripled pilot carrier with the RDS bandpass output
            // it demodulates against.
            rds_carrier_delay: SampleDelay::new(rds_bandpass_delay.saturating_sub(pilot_bandpass_delay)),
            rds_demod: RdsDemodulator::new(),
            rds_shape1: Fir::new(rds_shape1_taps, 1),
            rds_shape2: Fir::new(rds_shape2_taps, 1),
            // Further aligns that same carrier with the two additional
            // shaping stages the demodulated baseband passes through
            // before reaching bit-clock recovery.
            rds_bits_carrier_delay: SampleDelay::new(rds_shaping_delay),
            rds_bits: RdsBitsDecoder::new(),
            rds_groups: RdsGroupsDecoder::new(),

            noise_bandpass: HilbertFir::new(noise_taps),

            pilot_snr: SnrEstimator::new(SNR_WINDOW_SIZE, 1.0, SNR_EMIT_EVERY),
            mono_snr: SnrEstimator::new(SNR_WINDOW_SIZE, 1.0, SNR_EMIT_EVERY),
            stereo_snr: SnrEstimator::new(SNR_WINDOW_SIZE, 1.0, SNR_EMIT_EVERY),
            rds_snr: SnrEstimator::new(SNR_WINDOW_SIZE, 1.0, SNR_EMIT_EVERY),

            rds_state: Arc::new(Mutex::new(RdsState::new())),
            snr_pilot: AtomicSnr::new(f32::NAN),
            snr_mono: AtomicSnr::new(f32::NAN),
            snr_stereo: AtomicSnr::new(f32::NAN),
            snr_rds: AtomicSnr::new(f32::NAN),
        }
    }

    pub fn rds_state(&self) -> Arc<Mutex<RdsState>> {
        Arc::clone(&self.rds_state)
    }

    pub fn rds_decoding_stats(&self) -> RdsDecodingStats {
        self.rds_groups.stats()
    }

    pub fn snr_snapshot(&self) -> SnrSnapshot {
        SnrSnapshot {
            pilot_db: self.snr_pilot.load(),
            mono_db: self.snr_mono.load(),
            stereo_db: self.snr_stereo.load(),
            rds_db: self.snr_rds.load(),
        }
    }

    pub fn reset(&mut self) {
        self.baseband_select.reset();
        self.equalizer.reset();
        self.demod_prefilter.reset();
        self.discriminator.reset();
        self.pilot_bandpass.reset();
        self.pilot_pll.reset();
        self.stereo_bandpass.reset();
        self.stereo_decimator.reset();
        self.stereo_deemph.reset();
        self.stereo_resampler.reset();
        self.mono_lowpass.reset();
        self.mono_deemph.reset();
        self.mono_resampler.reset();
        self.rds_bandpass.reset();
        self.rds_demod.reset();
        self.rds_shape1.reset();
        self.rds_shape2.reset();
        self.rds_bits.reset();
        self.rds_groups.reset();
        self.noise_bandpass.reset();
        self.pilot_snr.reset();
        self.mono_snr.reset();
        self.stereo_snr.reset();
        self.rds_snr.reset();
        let now = chrono::Utc::now();
        if let Ok(mut state) = self.rds_state.lock() {
            state.clear(true, now);
        }
        self.snr_pilot.store(f32::NAN);
        self.snr_mono.store(f32::NAN);
        self.snr_stereo.store(f32::NAN);
        self.snr_rds.store(f32::NAN);
    }

    /// Processes one chunk of 1 MS/s complex baseband, returning the
    /// 48 kHz stereo audio it produces. Updates `rds_state()` and
    /// `snr_snapshot()` as a side effect.
    pub fn process(&mut self, iq: &[Complex32]) -> ReceiverOutput {
        let baseband = self.baseband_select.process(iq);
        let equalized = self.equalizer.process(&baseband);
        let cleaned = self.demod_prefilter.process(&equalized);
        let composite = self.discriminator.process(&cleaned);

        // Pilot recovery.
        let pilot_analytic = self.pilot_bandpass.process(&composite);
        let pilot_re: Vec<f32> = pilot_analytic.iter().map(|c| c.re).collect();
        let pilot_im: Vec<f32> = pilot_analytic.iter().map(|c| c.im).collect();
        let pilot = self.pilot_pll.process(&pilot_re, &pilot_im);

        let pilot_squared: Vec<Complex32> = pilot.iter().map(|p| p * p).collect();
        let pilot_squared = self.stereo_pilot_delay.process(&pilot_squared);

        // Mono branch.
        let mono_raw = self.mono_lowpass.process(&composite);
        let mono = self.mono_deemph.process(&mono_raw);
        let mono_48k = self.mono_resampler.process(&mono);

        // Stereo branch.
        let stereo_band = self.stereo_bandpass.process(&composite);
        let stereo_diff_native = self.stereo_extractor.process(&pilot_squared, &stereo_band);
        let stereo_diff_raw = self.stereo_decimator.process(&stereo_diff_native);
        let stereo_diff = self.stereo_deemph.process(&stereo_diff_raw);
        let stereo_diff_48k = self.stereo_resampler.process(&stereo_diff);

        let (left, right) = self.stereo_demux.process(&mono_48k, &stereo_diff_48k);

        // RDS branch.
        let pilot_cubed: Vec<Complex32> = pilot.iter().map(|p| p * p * p).collect();
        let carrier_for_demod = self.rds_carrier_delay.process(&pilot_cubed);
        let rds_band = self.rds_bandpass.process(&composite);
        let rds_demod_raw = self.rds_demod.process(&rds_band, &carrier_for_demod);
        let rds_shaped1 = self.rds_shape1.process(&rds_demod_raw);
        let rds_shaped2 = self.rds_shape2.process(&rds_shaped1);

        let carrier_for_bits = self.rds_bits_carrier_delay.process(&pilot_cubed);
        let bits = self.rds_bits.process(&rds_shaped2, &carrier_for_bits);
        let groups = self.rds_groups.process(&bits);
        if !groups.is_empty() {
            if let Ok(mut state) = self.rds_state.lock() {
                for group in &groups {
                    decode_group(&mut state, group);
                }
            }
        }

        // Noise reference and SNR.
        let noise = self.noise_bandpass.process(&composite);
        let noise_mag: Vec<f32> = noise.iter().map(|c| c.norm()).collect();

        for (i, &mag) in pilot_analytic.iter().map(|c| c.norm()).collect::<Vec<_>>().iter().enumerate() {
            if let Some(&n) = noise_mag.get(i) {
                if let Some(db) = self.pilot_snr.update(mag, n) {
                    self.snr_pilot.store(db);
                }
            }
        }
        for (i, &m) in mono.iter().enumerate() {
            if let Some(&n) = noise_mag.get(i * AUDIO_DECIMATION_RATIO) {
                if let Some(db) = self.mono_snr.update(m, n) {
                    self.snr_mono.store(db);
                }
            }
        }
        for (i, &s) in stereo_diff.iter().enumerate() {
            if let Some(&n) = noise_mag.get(i * AUDIO_DECIMATION_RATIO) {
                if let Some(db) = self.stereo_snr.update(s, n) {
                    self.snr_stereo.store(db);
                }
            }
        }
        for (i, &r) in rds_shaped2.iter().enumerate() {
            if let Some(&n) = noise_mag.get(i) {
                if let Some(db) = self.rds_snr.update(r, n) {
                    self.snr_rds.store(db);
                }
            }
        }

        debug_assert_eq!(left.len(), right.len());
        ReceiverOutput { left, right }
    }
}

impl Default for FmReceiver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_iq(n: usize) -> Vec<Complex32> {
        (0..n)
            .map(|i| {
                let t = i as f32 / INPUT_SAMPLING_RATE as f32;
                let phase = 2.0 * std::f32::consts::PI * 50_000.0 * t;
                Complex32::new(phase.cos(), phase.sin())
            })
            .collect()
    }

    #[test]
    fn processes_a_chunk_without_panicking() {
        let mut receiver = FmReceiver::new();
        let iq = synthetic_iq(40_000);
        let out = receiver.process(&iq);
        assert_eq!(out.left.len(), out.right.len());
    }

    #[test]
    fn reset_clears_rds_state_and_snr() {
        let mut receiver = FmReceiver::new();
        let iq = synthetic_iq(40_000);
        let _ = receiver.process(&iq);
        receiver.reset();
        let snapshot = receiver.snr_snapshot();
        assert!(snapshot.pilot_db.is_nan());
    }

    #[test]
    fn output_rate_is_roughly_48_over_1000_of_input() {
        let mut receiver = FmReceiver::new();
        let iq = synthetic_iq(200_000);
        let out = receiver.process(&iq);
        let expected = (200_000.0 * OUTPUT_AUDIO_SAMPLING_RATE as f64 / INPUT_SAMPLING_RATE as f64) as usize;
        let tolerance = expected / 5 + 50;
        assert!(
            out.left.len() + tolerance >= expected && out.left.len() <= expected + tolerance,
            "expected ~{expected} samples, got {}",
            out.left.len()
        );
    }
}
