//! Fixed numeric constants for the FM/RDS signal chain.
//!
//! Carried over verbatim from the reference `fm_constants.h`: sample rates,
//! decimation/interpolation ratios, filter band edges and tap counts. These
//! are architecture constants, not configuration -- changing them requires
//! re-deriving every dependent filter's taps.

/// I/Q input sampling rate, Hz.
pub const INPUT_SAMPLING_RATE: u32 = 1_000_000;
/// Sampling rate after the first decimation stage, Hz.
pub const INTERMEDIATE_SAMPLING_RATE: u32 = 250_000;
/// Sampling rate of the demodulated audio branches before resampling, Hz.
pub const INTERMEDIATE_AUDIO_SAMPLING_RATE: u32 = 50_000;
/// Final output audio sampling rate, Hz.
pub const OUTPUT_AUDIO_SAMPLING_RATE: u32 = 48_000;
/// RDS symbol rate, Hz (1187.5, half the 2375 Hz RDS bit rate).
pub const RDS_SYMBOL_RATE: f32 = 1187.5;

/// Decimation ratio from `INPUT_SAMPLING_RATE` to `INTERMEDIATE_SAMPLING_RATE`.
pub const INTERMEDIATE_DECIMATION_RATIO: usize = 4;
/// Decimation ratio from `INTERMEDIATE_SAMPLING_RATE` to `INTERMEDIATE_AUDIO_SAMPLING_RATE`.
pub const AUDIO_DECIMATION_RATIO: usize = 5;
/// Rational resampler interpolation numerator (50 kHz -> 48 kHz).
pub const AUDIO_RESAMPLER_INTERPOLATION_RATIO: usize = 24;
/// Rational resampler decimation denominator (50 kHz -> 48 kHz).
pub const AUDIO_RESAMPLER_DECIMATION_RATIO: usize = 25;

/// Stereo pilot tone center frequency, Hz.
pub const STEREO_PILOT_FREQUENCY: f32 = 19_000.0;
/// Noise reference extraction frequency, Hz (above the composite baseband).
pub const NOISE_EXTRACTOR_FREQUENCY: f32 = 65_000.0;

/// FM channel passband / stopband, Hz.
pub const FM_CHANNEL_BANDWIDTH: f32 = 120_000.0;
pub const FM_CHANNEL_STOPBAND: f32 = 130_000.0;

/// Stereo pilot bandpass passband / stopband, Hz.
pub const STEREO_PILOT_BANDWIDTH: f32 = 200.0;
pub const STEREO_PILOT_STOPBAND: f32 = 2_200.0;

/// Mono/stereo audio passband / stopband, Hz.
pub const AUDIO_BANDWIDTH: f32 = 15_000.0;
pub const AUDIO_STOPBAND: f32 = 17_000.0;

/// RDS subcarrier passband / stopband, Hz.
pub const RDS_BANDWIDTH: f32 = 2_400.0;
pub const RDS_STOPBAND: f32 = 3_900.0;

/// Noise-reference extractor passband / stopband, Hz.
pub const NOISE_EXTRACTOR_BANDWIDTH: f32 = 2_000.0;
pub const NOISE_EXTRACTOR_STOPBAND: f32 = 5_000.0;

/// Tap counts for each Parks-McClellan-designed FIR stage. The tap
/// coefficients themselves are produced by external tooling (see
/// `dsp::fir::design_lowpass` / `design_bandpass`) rather than baked in, as
/// the original's generated tap tables are build artifacts, not source.
pub const FM_BASEBAND_TAPS_COUNT: usize = 473;
pub const FM_DEMOD_DECIMATOR_TAPS_COUNT: usize = 65;
pub const STEREO_PILOT_BANDPASS_TAPS_COUNT: usize = 401;
pub const STEREO_BANDPASS_TAPS_COUNT: usize = 433;
pub const MONO_DECIMATOR_TAPS_COUNT: usize = 433;
pub const STEREO_DECIMATOR_TAPS_COUNT: usize = 97;
pub const AUDIO_RESAMPLER_TAPS_COUNT: usize = 457;
pub const RDS_BANDPASS_TAPS_COUNT: usize = 593;
pub const RDS_DEMODULATED_TAPS_COUNT: usize = 593;
pub const RDS_SYMBOL_SHAPE_TAPS_COUNT: usize = 422;
pub const NOISE_EXTRACTOR_TAPS_COUNT: usize = 305;

/// Equalizer tap count (CMA adaptive filter, not Parks-McClellan-designed).
pub const FM_EQUALIZER_TAPS_COUNT: usize = 32;

/// PLL loop bandwidth used for the stereo pilot recovery loop.
pub const PLL_LOOP_BANDWIDTH: f32 = 0.001;

/// Costas loop lowpass corner and phase-error gain, used only when the
/// optional RDS carrier-phase correction path is enabled.
pub const COSTAS_LOWPASS_FREQ: f32 = 0.005 * 2.0 * std::f32::consts::PI;
pub const COSTAS_PHASE_ERROR_GAIN: f32 = 0.5;

/// SNR estimator update/report rate, relative to `INTERMEDIATE_SAMPLING_RATE`.
pub const NOISE_SAMPLING_RATE: u32 = 5_000;
pub const SNR_RATE: usize = 10;
