//! FM-specific signal-processing filters: FIR/FFT convolution, polyphase
//! resampling, oscillators (rotator, PLL, Costas loop), the FM
//! discriminator, stereo extraction/demultiplexing, de-emphasis, the CMA
//! blind equalizer, and the per-branch SNR estimator.
//!
//! Each filter here is a plain, stateful struct with a `process(&mut self,
//! input: &[T]) -> Vec<U>` method operating on whatever chunk size the
//! caller provides, carrying over exactly the history/delay-line state it
//! needs between calls. `receiver::FmReceiver` wires these together
//! directly, a straight-line sequence with no branching or stalls to
//! schedule around; the generic `pipeline` module's
//! `CircularBuffer`/`Block`/`Pipeline` wrap a subset of these same filters
//! (see `pipeline::filters`) for graphs that do need worker-thread
//! scheduling and back-pressure, such as a future branching/fan-out
//! topology.

pub mod cma;
pub mod costas;
pub mod deemphasis;
pub mod discriminator;
pub mod fft;
pub mod fir;
pub mod pll;
pub mod resampler;
pub mod rotator;
pub mod snr;
pub mod stereo;

pub use cma::CmaEqualizer;
pub use costas::CostasLoop;
pub use deemphasis::Deemphasizer;
pub use discriminator::FmDiscriminator;
pub use fft::{FftFilter, FftTranslatingFilter};
pub use fir::{design_bandpass, design_lowpass, Fir, HilbertFir, TapMul};
pub use pll::PllGenerator;
pub use resampler::RationalResampler;
pub use rotator::Rotator;
pub use snr::SnrEstimator;
pub use stereo::{StereoDemultiplexer, StereoExtractor};
